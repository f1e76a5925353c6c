fn main() {
    println!("cargo:rerun-if-changed=config/default.json");

    // Host builds (tests, simulation) have no ESP-IDF toolchain to probe.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
