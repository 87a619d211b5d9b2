mod config;
mod error;
pub mod helpers;
mod types;

pub use config::*;
pub use error::{is_unique_violation, WatchtowerError};
pub use types::*;
