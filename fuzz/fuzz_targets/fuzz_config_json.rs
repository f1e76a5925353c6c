//! Fuzz target: `SystemConfig::from_json`
//!
//! Arbitrary text must either parse into a configuration whose bus
//! settings validate, or fail with a configuration error; never panic.
//! Every device entry that decodes is then run through the per-instance
//! validation the builder uses; entries that do not decode carry a
//! configuration error of their own.
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use libfuzzer_sys::fuzz_target;
use ventilink::config::SystemConfig;
use ventilink::error::Error;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    match SystemConfig::from_json(text) {
        Ok(config) => {
            assert!(config.validate().is_ok());
            for instance in &config.current_loops {
                match instance.get() {
                    Ok(cfg) => {
                        let _ = cfg.validate();
                    }
                    Err(e) => assert!(matches!(e, Error::Config(_))),
                }
            }
            if let Some(climate) = &config.climate {
                match climate.get() {
                    Ok(cfg) => {
                        let _ = cfg.validate();
                    }
                    Err(e) => assert!(matches!(e, Error::Config(_))),
                }
            }
        }
        Err(e) => assert!(matches!(e, Error::Config(_))),
    }
});
