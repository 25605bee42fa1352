// Neighbor notifications leave the node through one worker thread so mining
// and request handling never block on a slow or dead peer.

use crate::core::TransactionRequest;
use crate::error::{BlockchainError, Result};
use crate::network::{Nodes, PeerClient};
use log::{debug, info, warn};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Drop pending transactions; a block containing them was just sealed
    ClearPool,
    /// Re-run longest-chain resolution
    Consensus,
    /// Admit this client transaction too
    RelayTransaction(TransactionRequest),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> RetryPolicy {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    // base, 2x base, 4x base, ...
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1 << attempt.min(16))
    }
}

pub struct OutboundQueue {
    sender: Mutex<Option<Sender<Notice>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl OutboundQueue {
    pub fn spawn(nodes: Arc<Nodes>, peers: Arc<dyn PeerClient>, policy: RetryPolicy) -> OutboundQueue {
        let (sender, receiver) = mpsc::channel::<Notice>();
        let worker = thread::spawn(move || {
            for notice in receiver {
                for node in nodes.get_nodes() {
                    deliver(peers.as_ref(), node.get_addr(), &notice, policy);
                }
            }
            debug!("Outbound queue drained, worker exiting");
        });
        OutboundQueue {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn push(&self, notice: Notice) -> Result<()> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender
                .send(notice)
                .map_err(|_| BlockchainError::NeighborNotify("outbound worker stopped".to_string())),
            None => Err(BlockchainError::NeighborNotify(
                "outbound queue closed".to_string(),
            )),
        }
    }

    /// Stops accepting notices and waits for queued ones to be delivered.
    pub fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("Outbound worker panicked");
            }
        }
    }
}

impl Drop for OutboundQueue {
    fn drop(&mut self) {
        self.close();
    }
}

fn deliver(peers: &dyn PeerClient, neighbor: &str, notice: &Notice, policy: RetryPolicy) {
    for attempt in 0..policy.max_attempts {
        let result = match notice {
            Notice::ClearPool => peers.clear_pool(neighbor),
            Notice::Consensus => peers.request_consensus(neighbor),
            Notice::RelayTransaction(request) => peers.relay_transaction(neighbor, request),
        };
        match result {
            Ok(()) => {
                debug!("Delivered {notice:?} to {neighbor}");
                return;
            }
            Err(e) if attempt + 1 < policy.max_attempts => {
                let delay = policy.delay(attempt);
                warn!("Notifying {neighbor} failed ({e}), retrying in {delay:?}");
                thread::sleep(delay);
            }
            Err(e) => {
                info!(
                    "Giving up on {neighbor} after {} attempt(s): {e}",
                    policy.max_attempts
                );
            }
        }
    }
}
