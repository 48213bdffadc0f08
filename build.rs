fn main() {
    println!("cargo:rerun-if-env-changed=FEEDFISH_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=FEEDFISH_WIFI_PASS");

    // Host builds (tests, simulation) have no ESP-IDF toolchain to link.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
