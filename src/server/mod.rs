// Server module entry point
// Socket binding with port retry, connection tracking and forced shutdown

pub mod connection;
pub mod listener;
pub mod signal;

// `loop` is a keyword, so the module is named server_loop
#[path = "loop.rs"]
pub mod server_loop;

pub use server_loop::DevServer;
pub use signal::start_signal_handler;
