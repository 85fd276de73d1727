//! Execution modes
//!
//! - `serve`: HTTP server, optionally with the click worker in the same process
//! - `worker`: standalone click consumer

pub mod server;
pub mod worker;

pub use server::run_server;
pub use worker::run_worker;
