use crate::core::{Block, TransactionRequest};
use crate::error::{BlockchainError, Result};
use crate::network::node::endpoint;
use crate::storage::Snapshot;
use log::debug;
use reqwest::blocking::{Client, Response};
use std::time::Duration;

/// Outbound calls a node makes to its neighbors.
pub trait PeerClient: Send + Sync {
    /// `GET {neighbor}/chain`
    fn fetch_chain(&self, neighbor: &str) -> Result<Vec<Block>>;

    /// `PUT {neighbor}/consensus`
    fn request_consensus(&self, neighbor: &str) -> Result<()>;

    /// `DELETE {neighbor}/transactions`
    fn clear_pool(&self, neighbor: &str) -> Result<()>;

    /// `PUT {neighbor}/transactions`
    fn relay_transaction(&self, neighbor: &str, request: &TransactionRequest) -> Result<()>;
}

pub struct HttpPeerClient {
    http: Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Result<HttpPeerClient> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BlockchainError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(HttpPeerClient { http })
    }
}

fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(BlockchainError::Network(format!("{url} answered {status}")))
    }
}

impl PeerClient for HttpPeerClient {
    fn fetch_chain(&self, neighbor: &str) -> Result<Vec<Block>> {
        let url = endpoint(neighbor, "/chain");
        debug!("GET {url}");
        let response = check_status(&url, self.http.get(&url).send()?)?;
        let snapshot: Snapshot = response.json()?;
        Ok(snapshot.chain)
    }

    fn request_consensus(&self, neighbor: &str) -> Result<()> {
        let url = endpoint(neighbor, "/consensus");
        debug!("PUT {url}");
        check_status(&url, self.http.put(&url).send()?)?;
        Ok(())
    }

    fn clear_pool(&self, neighbor: &str) -> Result<()> {
        let url = endpoint(neighbor, "/transactions");
        debug!("DELETE {url}");
        check_status(&url, self.http.delete(&url).send()?)?;
        Ok(())
    }

    fn relay_transaction(&self, neighbor: &str, request: &TransactionRequest) -> Result<()> {
        let url = endpoint(neighbor, "/transactions");
        debug!("PUT {url}");
        check_status(&url, self.http.put(&url).json(request).send()?)?;
        Ok(())
    }
}

/// A client for nodes without neighbors. Every call fails.
pub struct OfflinePeers;

impl PeerClient for OfflinePeers {
    fn fetch_chain(&self, neighbor: &str) -> Result<Vec<Block>> {
        Err(offline(neighbor))
    }

    fn request_consensus(&self, neighbor: &str) -> Result<()> {
        Err(offline(neighbor))
    }

    fn clear_pool(&self, neighbor: &str) -> Result<()> {
        Err(offline(neighbor))
    }

    fn relay_transaction(&self, neighbor: &str, _request: &TransactionRequest) -> Result<()> {
        Err(offline(neighbor))
    }
}

fn offline(neighbor: &str) -> BlockchainError {
    BlockchainError::Network(format!("offline, cannot reach {neighbor}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread;

    // Serves exactly `responses.len()` requests, reporting each request's
    // method, path and body back through the returned channel.
    fn mock_peer(responses: Vec<(u16, String)>) -> (String, mpsc::Receiver<(String, String, String)>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = format!("http://{}", server.server_addr().to_ip().unwrap());
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for (status, body) in responses {
                let mut request = server.recv().unwrap();
                let mut received = String::new();
                request.as_reader().read_to_string(&mut received).unwrap();
                tx.send((
                    request.method().to_string(),
                    request.url().to_string(),
                    received,
                ))
                .unwrap();
                let response = tiny_http::Response::from_string(body).with_status_code(status);
                request.respond(response).unwrap();
            }
        });
        (addr, rx)
    }

    fn client() -> HttpPeerClient {
        HttpPeerClient::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_fetch_chain_decodes_snapshot() {
        let chain = vec![Block::genesis().unwrap()];
        let body = serde_json::to_string(&Snapshot::new(chain.clone())).unwrap();
        let (addr, rx) = mock_peer(vec![(200, body)]);

        let fetched = client().fetch_chain(&addr).unwrap();
        assert_eq!(fetched, chain);
        let (method, path, _) = rx.recv().unwrap();
        assert_eq!((method.as_str(), path.as_str()), ("GET", "/chain"));
    }

    #[test]
    fn test_non_success_status_is_an_error() {
        let (addr, _rx) = mock_peer(vec![(500, "boom".to_string())]);
        assert!(matches!(
            client().fetch_chain(&addr),
            Err(BlockchainError::Network(_))
        ));
    }

    #[test]
    fn test_undecodable_chain_is_an_error() {
        let (addr, _rx) = mock_peer(vec![(200, "{\"chain\":42}".to_string())]);
        assert!(client().fetch_chain(&addr).is_err());
    }

    #[test]
    fn test_notifications_use_expected_routes() {
        let ok = || (200, "{\"message\":\"success\"}".to_string());
        let (addr, rx) = mock_peer(vec![ok(), ok(), ok()]);
        let request = TransactionRequest {
            sender_blockchain_address: Some("a".to_string()),
            recipient_blockchain_address: Some("b".to_string()),
            message: Some("m".to_string()),
            value: Some(1.0),
            sender_public_key: Some("k".to_string()),
            signature: Some("s".to_string()),
        };

        let peers = client();
        peers.request_consensus(&addr).unwrap();
        peers.clear_pool(&addr).unwrap();
        peers.relay_transaction(&addr, &request).unwrap();

        let seen: Vec<_> = rx.iter().take(3).collect();
        assert_eq!(seen[0].0, "PUT");
        assert_eq!(seen[0].1, "/consensus");
        assert_eq!(seen[1].0, "DELETE");
        assert_eq!(seen[1].1, "/transactions");
        assert_eq!(seen[2].0, "PUT");
        let relayed: TransactionRequest = serde_json::from_str(&seen[2].2).unwrap();
        assert_eq!(relayed, request);
    }

    #[test]
    fn test_offline_peers_always_fail() {
        assert!(OfflinePeers.fetch_chain("http://nowhere").is_err());
        assert!(OfflinePeers.clear_pool("http://nowhere").is_err());
    }
}
