use std::{collections::HashSet, io, sync::Arc};

use tokio::sync::RwLock;
use utils::port::find_free_port;

const MAX_ALLOCATION_ATTEMPTS: usize = 32;

/// Ports handed to instances that have not reached a terminal state.
///
/// The OS only promises a port was free at the moment it was probed. This set
/// keeps two live instances of this process from being given the same one.
#[derive(Clone, Default)]
pub struct PortRegistry {
    reserved: Arc<RwLock<HashSet<u16>>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn allocate(&self) -> io::Result<u16> {
        let mut reserved = self.reserved.write().await;
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let port = find_free_port()?;
            if reserved.insert(port) {
                tracing::debug!(port, "Reserved port");
                return Ok(port);
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            "no unreserved ephemeral port available",
        ))
    }

    pub async fn release(&self, port: u16) {
        if self.reserved.write().await.remove(&port) {
            tracing::debug!(port, "Released port");
        }
    }

    #[cfg(test)]
    pub(crate) async fn reserved_count(&self) -> usize {
        self.reserved.read().await.len()
    }
}
