//! Request handler module
//!
//! Matches request paths against the handler files of the api directory and
//! falls back to the static asset responder for everything else.

pub mod index;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
