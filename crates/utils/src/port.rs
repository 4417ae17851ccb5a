//! Ephemeral port discovery and TCP readiness probing for spawned instances.

use std::{io, net::TcpListener, time::Duration};

use tokio::net::TcpStream;

const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Ask the OS for a free port by binding to port 0 and releasing it again.
///
/// The returned port is only a hint: nothing stops another process from
/// binding it between this call and the moment the instance binds it.
pub fn find_free_port() -> io::Result<u16> {
    let listener = TcpListener::bind(("0.0.0.0", 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Check whether something accepts TCP connections on `host:port`
pub async fn is_service_running(host: &str, port: u16) -> bool {
    matches!(
        tokio::time::timeout(PROBE_CONNECT_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}
