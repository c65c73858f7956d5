pub mod config;
pub mod error;
pub mod exchange;
pub mod signal;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use exchange::CandleSource;
pub use signal::{Evidence, Signal, SignalType};
pub use types::*;
