// SignalForge - Server Core
//
// Wires the signal pipeline to real job boards, Telegram alerts, a REST
// read surface and recurring collection runs.

pub mod config;
pub mod kernel;
pub mod server;

pub use config::*;
