use crate::core::{Blockchain, Transaction, TransactionRequest, RECENT_BLOCKS};
use crate::error::{BlockchainError, Result};
use crate::storage::Snapshot;
use crate::wallet::{sign_with_private_key, PublicKey, Wallet};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tiny_http::{Header, Method, Request, Response};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const RESET_MESSAGE: &str = "Blockchain has been reset successfully";

const GET: &[Method] = &[Method::Get];
const PUT: &[Method] = &[Method::Put];
const POST: &[Method] = &[Method::Post];
const POOL_METHODS: &[Method] = &[Method::Get, Method::Post, Method::Put, Method::Delete];

/// The node's REST surface over a shared ledger
#[derive(Clone)]
pub struct Server {
    ledger: Arc<Blockchain>,
    miner: Arc<MinerIdentity>,
}

/// What `/miner/wallet` reveals about the node's own wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinerIdentity {
    pub blockchain_address: String,
    pub public_key: String,
}

impl MinerIdentity {
    pub fn from_wallet(wallet: &Wallet) -> Result<MinerIdentity> {
        Ok(MinerIdentity {
            blockchain_address: wallet.get_address(),
            public_key: wallet.public_key_hex()?,
        })
    }
}

/// Body of `POST /sign`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    pub sender_blockchain_address: String,
    pub recipient_blockchain_address: String,
    pub message: String,
    pub value: f32,
    pub sender_public_key: String,
    pub sender_private_key: String,
}

#[derive(Debug, Serialize)]
struct RegisteredWallet {
    address: String,
    public_key: String,
    private_key: String,
}

#[derive(Debug, Serialize)]
struct PoolView<'a> {
    transactions: &'a [Transaction],
    length: usize,
}

/// A routed response: status code plus a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    fn json<T: Serialize>(status: u16, body: &T) -> ApiResponse {
        match serde_json::to_string(body) {
            Ok(body) => ApiResponse { status, body },
            Err(e) => {
                error!("Failed to encode response: {e}");
                ApiResponse {
                    status: 500,
                    body: json!({"error": "failed to encode response"}).to_string(),
                }
            }
        }
    }

    fn message(status: u16, message: &str) -> ApiResponse {
        ApiResponse::json(status, &json!({ "message": message }))
    }

    fn failure(status: u16, error: &BlockchainError) -> ApiResponse {
        ApiResponse::json(
            status,
            &json!({"message": "fail", "status": "fail", "error": error.to_string()}),
        )
    }

    fn empty() -> ApiResponse {
        ApiResponse {
            status: 200,
            body: String::new(),
        }
    }
}

impl Server {
    pub fn new(ledger: Arc<Blockchain>, miner: MinerIdentity) -> Server {
        Server {
            ledger,
            miner: Arc::new(miner),
        }
    }

    /// Binds `addr` and serves until the ledger is shut down.
    pub fn run(&self, addr: &str) -> Result<()> {
        let http = tiny_http::Server::http(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;
        info!("Server listening on {addr}");
        self.serve(http)
    }

    /// Serves requests from an already-bound listener, one thread each.
    pub fn serve(&self, http: tiny_http::Server) -> Result<()> {
        while !self.ledger.is_shut_down() {
            let request = match http.recv_timeout(POLL_INTERVAL) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    error!("Error accepting request: {e}");
                    continue;
                }
            };
            let server = self.clone();
            thread::spawn(move || server.handle_request(request));
        }
        info!("Server stopped");
        Ok(())
    }

    fn handle_request(&self, mut request: Request) {
        let started = Instant::now();
        let method = request.method().clone();
        let url = request.url().to_string();

        let mut body = String::new();
        let response = match request.as_reader().read_to_string(&mut body) {
            Ok(_) => self.route(&method, &url, &body),
            Err(e) => ApiResponse::failure(400, &BlockchainError::from(e)),
        };
        let status = response.status;

        let mut reply = Response::from_string(response.body).with_status_code(status);
        for header in default_headers() {
            reply.add_header(header);
        }
        if let Err(e) = request.respond(reply) {
            warn!("Failed to answer {method} {url}: {e}");
        }
        info!("{method} {url} {status} {:?}", started.elapsed());
    }

    /// Dispatches one request. Kept free of I/O so it can be driven directly.
    pub fn route(&self, method: &Method, url: &str, body: &str) -> ApiResponse {
        if *method == Method::Options {
            return ApiResponse::empty();
        }
        let (path, query) = split_url(url);

        let allowed: &[Method] = match path.as_str() {
            "/chain" | "/mine" | "/mine/start" | "/miner/blocks" | "/miner/wallet"
            | "/wallets" | "/nodes" | "/balance" => GET,
            "/consensus" => PUT,
            "/transactions" => POOL_METHODS,
            "/wallet/register" | "/reset" | "/sign" => POST,
            _ => return ApiResponse::json(404, &json!({"error": format!("no route for {path}")})),
        };
        if !allowed.contains(method) {
            return ApiResponse::json(
                405,
                &json!({"error": format!("{method} not allowed on {path}")}),
            );
        }

        match (method, path.as_str()) {
            (Method::Get, "/chain") => ApiResponse::json(200, &Snapshot::new(self.ledger.chain())),
            (Method::Get, "/balance") => self.balance(&query),
            (Method::Put, "/consensus") => {
                let replaced = self.ledger.resolve_conflicts();
                ApiResponse::message(200, if replaced { "success" } else { "fail" })
            }
            (Method::Get, "/mine") => self.mine(),
            (Method::Get, "/mine/start") => {
                self.ledger.start_mining();
                ApiResponse::message(200, "success")
            }
            (Method::Get, "/miner/blocks") => {
                ApiResponse::json(200, &self.ledger.get_blocks(RECENT_BLOCKS))
            }
            (Method::Get, "/miner/wallet") => ApiResponse::json(200, self.miner.as_ref()),
            (Method::Get, "/transactions") => {
                let pool = self.ledger.transaction_pool();
                ApiResponse::json(
                    200,
                    &PoolView {
                        transactions: &pool,
                        length: pool.len(),
                    },
                )
            }
            (Method::Post, "/transactions") => self.create_transaction(body),
            (Method::Put, "/transactions") => self.add_transaction(body),
            (Method::Delete, "/transactions") => {
                self.ledger.clear_transaction_pool();
                ApiResponse::message(200, "success")
            }
            (Method::Post, "/wallet/register") => self.register_wallet(),
            (Method::Get, "/wallets") => {
                ApiResponse::json(200, &json!({ "wallets": self.ledger.get_wallets() }))
            }
            (Method::Get, "/nodes") => {
                ApiResponse::json(200, &json!({ "nodes": self.ledger.get_neighbors() }))
            }
            (Method::Post, "/reset") => match self.ledger.reset() {
                Ok(()) => ApiResponse::message(200, RESET_MESSAGE),
                Err(e) => ApiResponse::failure(500, &e),
            },
            (Method::Post, "/sign") => sign(body),
            _ => ApiResponse::json(405, &json!({"error": "method not allowed"})),
        }
    }

    fn balance(&self, query: &[(String, String)]) -> ApiResponse {
        let address = query
            .iter()
            .find(|(key, _)| key == "blockchainAddress")
            .map(|(_, value)| value.as_str())
            .unwrap_or_default();
        if address.is_empty() {
            return ApiResponse::json(
                400,
                &json!({"balance": 0.0, "error": "missing blockchainAddress"}),
            );
        }
        match self.ledger.calculate_total_amount(address) {
            Ok(balance) => ApiResponse::json(200, &json!({"balance": balance, "error": ""})),
            Err(e) => ApiResponse::json(200, &json!({"balance": 0.0, "error": e.to_string()})),
        }
    }

    fn mine(&self) -> ApiResponse {
        match self.ledger.mine() {
            Ok(_) => ApiResponse::message(200, "success"),
            // The block is on the chain even though the neighbors were not told
            Err(e @ BlockchainError::NeighborNotify(_)) => {
                warn!("{e}");
                ApiResponse::message(200, "success")
            }
            Err(e) => ApiResponse::failure(400, &e),
        }
    }

    fn create_transaction(&self, body: &str) -> ApiResponse {
        let request = match parse_request(body) {
            Ok(request) => request,
            Err(e) => return ApiResponse::failure(400, &e),
        };
        match self.ledger.create_transaction(&request) {
            Ok(()) => ApiResponse::json(201, &json!({"message": "success", "status": "success"})),
            Err(e) => ApiResponse::failure(400, &e),
        }
    }

    fn add_transaction(&self, body: &str) -> ApiResponse {
        let request = match parse_request(body) {
            Ok(request) => request,
            Err(e) => return ApiResponse::failure(400, &e),
        };
        match self.ledger.add_transaction_request(&request) {
            Ok(()) => ApiResponse::message(200, "success"),
            Err(e) => ApiResponse::failure(400, &e),
        }
    }

    fn register_wallet(&self) -> ApiResponse {
        let registered = Wallet::new().and_then(|wallet| {
            let address = wallet.get_address();
            self.ledger.register_new_wallet(&address)?;
            Ok(RegisteredWallet {
                address,
                public_key: wallet.public_key_hex()?,
                private_key: wallet.private_key_hex()?,
            })
        });
        match registered {
            Ok(wallet) => ApiResponse::json(201, &wallet),
            Err(e) => ApiResponse::failure(500, &e),
        }
    }
}

fn parse_request(body: &str) -> Result<TransactionRequest> {
    let request: TransactionRequest = serde_json::from_str(body)?;
    if !request.validate() {
        return Err(BlockchainError::Serialization(
            "missing field(s) in transaction request".to_string(),
        ));
    }
    Ok(request)
}

fn sign(body: &str) -> ApiResponse {
    let signed = serde_json::from_str::<SignRequest>(body)
        .map_err(BlockchainError::from)
        .and_then(|request| {
            let public_key = PublicKey::from_hex(&request.sender_public_key)?;
            let transaction = Transaction::new(
                &request.sender_blockchain_address,
                &request.recipient_blockchain_address,
                &request.message,
                request.value,
            );
            sign_with_private_key(&request.sender_private_key, &public_key, &transaction)
        });
    match signed {
        Ok(signature) => ApiResponse::json(200, &json!({ "signature": signature.to_string() })),
        Err(e) => ApiResponse::failure(400, &e),
    }
}

// Path plus decoded query pairs
fn split_url(url: &str) -> (String, Vec<(String, String)>) {
    match reqwest::Url::parse(&format!("http://localhost{url}")) {
        Ok(parsed) => (
            parsed.path().to_string(),
            parsed
                .query_pairs()
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect(),
        ),
        Err(_) => (url.to_string(), vec![]),
    }
}

fn default_headers() -> Vec<Header> {
    [
        ("Content-Type", "application/json"),
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"),
        ("Access-Control-Allow-Headers", "Content-Type"),
    ]
    .iter()
    .filter_map(|(name, value)| Header::from_bytes(name.as_bytes(), value.as_bytes()).ok())
    .collect()
}
