//! Application core: device orchestration, zero direct I/O.
//!
//! Devices, value publication and lifecycle events all sit behind the
//! **port traits** in [`ports`], so the service, the builder and the
//! command path run unchanged against mocks on the host.

pub mod builder;
pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
