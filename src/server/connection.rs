// Connection handling module
// Serves accepted TCP connections and tracks them so shutdown can sever them

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::task::AbortHandle;

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Open connections, keyed by a per-server id
#[derive(Debug, Default)]
pub struct ConnectionSet {
    next_id: AtomicU64,
    open: Mutex<HashMap<u64, AbortHandle>>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, AbortHandle>> {
        self.open
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn insert(&self, id: u64, handle: AbortHandle) {
        self.lock().insert(id, handle);
    }

    fn remove(&self, id: u64) {
        self.lock().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Abort every open connection task, returns how many were severed
    pub fn close_all(&self) -> usize {
        let drained: Vec<AbortHandle> = self.lock().drain().map(|(_, h)| h).collect();
        for handle in &drained {
            handle.abort();
        }
        drained.len()
    }
}

/// Serve `stream` on a local task registered in `connections`
///
/// Must be called from within a `LocalSet`.
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    connections: &Arc<ConnectionSet>,
) {
    let id = connections.next_id();
    let state = Arc::clone(state);
    let tracked = Arc::clone(connections);

    let task = tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);
        let conn = http1::Builder::new().keep_alive(true).serve_connection(
            io,
            service_fn(move |req| handler::handle_request(req, Arc::clone(&state), peer_addr)),
        );
        if let Err(err) = conn.await {
            logger::log_connection_error(&err);
        }
        tracked.remove(id);
    });

    // The local task cannot run before this insert since nothing has yielded
    connections.insert(id, task.abort_handle());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_close_all_aborts_tasks() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let set = ConnectionSet::new();
                let mut joins = Vec::new();
                for _ in 0..3 {
                    let id = set.next_id();
                    let join = tokio::task::spawn_local(async {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                    });
                    set.insert(id, join.abort_handle());
                    joins.push(join);
                }
                assert_eq!(set.len(), 3);

                assert_eq!(set.close_all(), 3);
                assert!(set.is_empty());
                for join in joins {
                    assert!(join.await.unwrap_err().is_cancelled());
                }
            })
            .await;
    }

    #[test]
    fn test_remove_forgets_connection() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let local = tokio::task::LocalSet::new();
        local.block_on(&rt, async {
            let set = ConnectionSet::new();
            let id = set.next_id();
            let join = tokio::task::spawn_local(async {});
            set.insert(id, join.abort_handle());
            set.remove(id);
            assert!(set.is_empty());
            assert_eq!(set.close_all(), 0);
        });
    }
}
