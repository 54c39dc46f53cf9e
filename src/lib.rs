pub mod cli;
pub mod core;
pub mod debug;
pub mod domain;
pub mod errors;
pub mod logging;
