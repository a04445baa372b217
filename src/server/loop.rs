// Server loop module
// Owns the listening socket, accepts connections and force-closes them on shutdown

use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::{accept_connection, ConnectionSet};
use super::listener::bind_with_retry;
use crate::config::AppState;
use crate::error::BindError;
use crate::logger;

/// A bound dev server: listener, port and open connections
pub struct DevServer {
    listener: Option<TcpListener>,
    port: u16,
    connections: Arc<ConnectionSet>,
    state: Arc<AppState>,
}

impl DevServer {
    /// Bind the configured port, falling back to a random port on conflict
    pub fn bind(state: Arc<AppState>) -> Result<Self, BindError> {
        Self::bind_port(state.config.server.port, state)
    }

    pub fn bind_port(port: u16, state: Arc<AppState>) -> Result<Self, BindError> {
        let started = Instant::now();
        let connections = Arc::new(ConnectionSet::new());
        let (listener, local_addr) = bind_with_retry(&state.config, port, &connections)?;

        logger::log_server_listening(&local_addr, &state.config);
        logger::log_success_timed("Ready", started.elapsed());

        Ok(Self {
            listener: Some(listener),
            port: local_addr.port(),
            connections,
            state,
        })
    }

    /// Port actually bound
    pub const fn port(&self) -> u16 {
        self.port
    }

    pub fn connections(&self) -> &Arc<ConnectionSet> {
        &self.connections
    }

    /// Accept connections until `shutdown` is notified, then shut down
    ///
    /// Must run inside a `LocalSet`.
    pub async fn run(mut self, shutdown: Arc<Notify>) {
        let Some(listener) = self.listener.take() else {
            return;
        };

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            accept_connection(stream, peer_addr, &self.state, &self.connections);
                        }
                        Err(e) => {
                            logger::log_error(&format!("Failed to accept connection: {e}"));
                        }
                    }
                }

                () = shutdown.notified() => break,
            }
        }

        self.listener = Some(listener);
        self.shutdown();
    }

    /// Sever every open connection, then close the listening socket
    ///
    /// There is no drain period.
    pub fn shutdown(&mut self) {
        let severed = self.connections.close_all();
        self.listener = None;
        logger::log_info(&format!(
            "Server on port {} closed ({severed} open connections severed)",
            self.port
        ));
    }
}
