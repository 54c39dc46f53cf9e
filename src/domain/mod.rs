pub mod cleanup;
pub mod session;
