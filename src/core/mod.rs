pub mod client;
pub mod process;
pub mod shutdown;
pub mod util;
