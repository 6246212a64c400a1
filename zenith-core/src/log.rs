pub use log::{trace, debug, info, warn, error};

pub fn initialize() -> Result<(), anyhow::Error> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .filter_module("zenith_rendergraph", log::LevelFilter::Info)
        .filter_module("zenith_task", log::LevelFilter::Warn)
        .parse_default_env()
        .try_init()?;

    Ok(())
}

/// Logger for unit tests, output is captured by the test harness.
/// Safe to call from every test.
pub fn initialize_for_test() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
