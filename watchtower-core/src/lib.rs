pub mod db;
mod ledger;
pub use ledger::*;
mod roster;
pub use roster::*;
mod services;
pub use services::*;
mod tokens;
pub use tokens::*;
mod users;
pub use users::*;

#[cfg(test)]
mod test_support;
