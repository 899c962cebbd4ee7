//! Helpers for exercising the engine without a brokerage account.
mod scripted_source;

pub use scripted_source::ScriptedBalanceSource;

/// Initialises logging for tests. Safe to call more than once.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
