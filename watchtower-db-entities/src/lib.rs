#![allow(non_snake_case)]

pub mod AccessToken;
pub mod Controller;
pub mod StatusLogEntry;
pub mod User;

pub use Controller::ControllerStatus;
