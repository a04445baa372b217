// Listener module
// Binds the listening socket and retries on a random port when the address is taken

use std::io::ErrorKind;
use std::net::SocketAddr;

use rand::Rng;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

use super::connection::ConnectionSet;
use crate::config::Config;
use crate::error::BindError;
use crate::logger;

/// Create a `TcpListener` with `SO_REUSEADDR` enabled.
///
/// `SO_REUSEADDR` only lets the socket reuse a port in `TIME_WAIT`. A port
/// with a live listener still fails with `AddrInUse`.
pub fn create_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

/// Bind `port`, moving to a random fallback port while the address is in use
///
/// Returns the listener with the address it is bound to. Every retry
/// force-closes the connections in `connections`. Gives up after
/// `server.max_bind_attempts` attempts (at least one); any other bind
/// failure is fatal.
pub fn bind_with_retry(
    config: &Config,
    port: u16,
    connections: &ConnectionSet,
) -> Result<(TcpListener, SocketAddr), BindError> {
    let server = &config.server;
    let attempts = server.max_bind_attempts.max(1);
    let mut port = port;

    for attempt in 1..=attempts {
        let addr = config.socket_addr(port).map_err(BindError::InvalidHost)?;
        match create_listener(addr) {
            Ok(listener) => {
                let bound = listener
                    .local_addr()
                    .map_err(|source| BindError::Fatal { addr, source })?;
                return Ok((listener, bound));
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                if attempt == attempts {
                    break;
                }
                let next = random_port(server.fallback_port_min, server.fallback_port_max);
                logger::log_warning(&format!("Port {port} is in use, trying port {next}"));
                connections.close_all();
                port = next;
            }
            Err(source) => return Err(BindError::Fatal { addr, source }),
        }
    }

    Err(BindError::Exhausted {
        attempts,
        last_port: port,
    })
}

fn random_port(min: u16, max: u16) -> u16 {
    let (low, high) = if min <= max { (min, max) } else { (max, min) };
    rand::thread_rng().gen_range(low..=high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_random_port_in_range() {
        for _ in 0..100 {
            let port = random_port(3333, 3443);
            assert!((3333..=3443).contains(&port));
        }
        assert_eq!(random_port(4000, 4000), 4000);
        assert!((10..=20).contains(&random_port(20, 10)));
    }

    #[tokio::test]
    async fn test_bind_free_port() {
        let config = Config::for_root(Path::new("."));
        let (listener, bound) = bind_with_retry(&config, 0, &ConnectionSet::new()).unwrap();
        assert_ne!(bound.port(), 0);
        assert_eq!(listener.local_addr().unwrap(), bound);
    }

    #[tokio::test]
    async fn test_occupied_port_falls_back() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let occupied = taken.local_addr().unwrap().port();

        let config = Config::for_root(Path::new("."));
        let (_listener, bound) =
            bind_with_retry(&config, occupied, &ConnectionSet::new()).unwrap();
        let port = bound.port();
        assert_ne!(port, occupied);
        assert!((3333..=3443).contains(&port));
    }

    #[tokio::test]
    async fn test_exhausted_attempts() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let occupied = taken.local_addr().unwrap().port();

        let mut config = Config::for_root(Path::new("."));
        config.server.fallback_port_min = occupied;
        config.server.fallback_port_max = occupied;
        config.server.max_bind_attempts = 3;

        let err = bind_with_retry(&config, occupied, &ConnectionSet::new()).unwrap_err();
        assert!(matches!(
            err,
            BindError::Exhausted { attempts: 3, last_port } if last_port == occupied
        ));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let occupied = taken.local_addr().unwrap().port();

        let mut config = Config::for_root(Path::new("."));
        config.server.max_bind_attempts = 0;

        let err = bind_with_retry(&config, occupied, &ConnectionSet::new()).unwrap_err();
        assert!(matches!(
            err,
            BindError::Exhausted { attempts: 1, last_port } if last_port == occupied
        ));
    }

    #[tokio::test]
    async fn test_unassignable_address_is_fatal_without_retry() {
        // TEST-NET-1, never configured on a local interface
        let mut config = Config::for_root(Path::new("."));
        config.server.host = "192.0.2.1".to_string();

        let err = bind_with_retry(&config, 3000, &ConnectionSet::new()).unwrap_err();
        match err {
            BindError::Fatal { addr, source } => {
                assert_eq!(addr.port(), 3000);
                assert_eq!(source.kind(), ErrorKind::AddrNotAvailable);
            }
            other => panic!("expected a fatal bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_host_is_fatal() {
        let mut config = Config::for_root(Path::new("."));
        config.server.host = "not-an-ip".to_string();
        let err = bind_with_retry(&config, 0, &ConnectionSet::new()).unwrap_err();
        assert!(matches!(err, BindError::InvalidHost(_)));
    }
}
