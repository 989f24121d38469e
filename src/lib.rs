pub mod automation;
pub mod config;
pub mod errors;
pub mod logging;
