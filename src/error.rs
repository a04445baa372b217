//! Error types shared across the request pipeline
//!
//! Parse and serialization errors are returned to the immediate caller.
//! The dispatcher in `handler::router` turns whatever escapes a handler into
//! a uniform error page.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by handler code
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Failure attributable to the client's input, carries the status to answer with
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    ClientInput { status: u16, message: String },
}

impl ApiError {
    pub fn invalid_json() -> Self {
        Self::ClientInput {
            status: 400,
            message: "Invalid JSON".to_string(),
        }
    }

    pub const fn status(&self) -> u16 {
        match self {
            Self::ClientInput { status, .. } => *status,
        }
    }
}

/// Errors raised by the response helpers
#[derive(Debug, Error)]
pub enum ResponseError {
    /// `send`/`json` called on a response that was already written
    #[error("response already finalized")]
    AlreadyFinalized,
    #[error("body could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

/// Errors raised while buffering a request body
#[derive(Debug, Error)]
pub enum ReadBodyError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("failed to read request body: {0}")]
    Read(#[source] HandlerError),
}

/// Errors raised while loading a module into the registry
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot resolve module '{specifier}': {source}")]
    Resolve {
        specifier: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read module {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("module {} requires '{required}' which is outside the api directory", path.display())]
    OutsideRoot { path: PathBuf, required: String },
    #[error("failed to materialize snapshot: {0}")]
    Snapshot(#[source] io::Error),
}

/// Errors raised by a script handler process
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to spawn '{interpreter}': {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: io::Error,
    },
    #[error("request could not be encoded for the handler: {0}")]
    Request(#[source] serde_json::Error),
    #[error("handler process io failed: {0}")]
    Io(#[from] io::Error),
    #[error("handler exited with {status}")]
    Exit { status: std::process::ExitStatus },
    #[error("handler reply is not valid JSON: {0}")]
    Reply(#[source] serde_json::Error),
    #[error("handler reply has invalid base64 body: {0}")]
    Base64(#[source] base64::DecodeError),
}

/// Errors raised by the manifest build command
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to start build '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("build '{command}' exited with {status}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
    },
}

/// Errors raised while binding the listening socket
#[derive(Debug, Error)]
pub enum BindError {
    /// Every attempt hit an address already in use
    #[error("no free port after {attempts} attempts (last tried {last_port})")]
    Exhausted { attempts: u32, last_port: u16 },
    #[error("{0}")]
    InvalidHost(String),
    #[error("failed to bind {addr}: {source}")]
    Fatal {
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_json_is_client_error() {
        let err = ApiError::invalid_json();
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_string(), "Invalid JSON");
    }

    #[test]
    fn test_boxed_api_error_downcasts() {
        let boxed: HandlerError = Box::new(ApiError::invalid_json());
        let api = boxed.downcast_ref::<ApiError>().map(ApiError::status);
        assert_eq!(api, Some(400));
    }
}
