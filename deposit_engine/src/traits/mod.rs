//! Seams between the engine and the outside world.
mod balance_source;

pub use balance_source::{BalanceSource, BalanceSourceError};
