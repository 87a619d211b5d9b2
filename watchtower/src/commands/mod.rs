pub mod board;
pub mod check;
mod common;
pub mod controllers;
pub mod healthcheck;
pub mod log;
pub mod status;
pub mod tokens;
pub mod users;
