fn main() {
    // ESP-IDF environment propagation is only needed for device builds;
    // host builds (tests, fuzz) skip it entirely.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
