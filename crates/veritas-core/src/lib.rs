pub mod config;
pub mod error;
pub mod history;
pub mod types;

pub use config::VeritasConfig;
pub use error::{Result, VeritasError};
pub use history::pair_history;
pub use types::*;
