use std::{collections::HashMap, sync::Mutex, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use upg_common::{MicroUsdt, Secret, USDT_DECIMALS};

use crate::{
    db_types::TransactionRecord,
    ledger::{credentials::Credential, CredentialRotation, LedgerError, LedgerSource},
};

const API_KEY_HEADER: &str = "TRON-PRO-API-KEY";
/// Looked-up block numbers kept between polls. The cache is emptied when it grows past this.
const MAX_KNOWN_BLOCKS: usize = 1_000;

#[derive(Debug, Clone)]
pub struct TronGridConfig {
    pub base_url: String,
    /// The wallet that receives payments.
    pub wallet_address: String,
    /// The USDT-TRC20 contract.
    pub contract_address: String,
    pub api_keys: Vec<Secret<String>>,
    pub request_timeout: Duration,
    /// Pause after a 429 before trying the next key.
    pub rate_limit_backoff: Duration,
}

impl Default for TronGridConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.trongrid.io".to_string(),
            wallet_address: String::default(),
            contract_address: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_string(),
            api_keys: vec![],
            request_timeout: Duration::from_secs(10),
            rate_limit_backoff: Duration::from_secs(1),
        }
    }
}

//--------------------------------------   Response shapes   ---------------------------------------------------------
trait ApiResponse {
    fn is_success(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct Trc20TransferPage {
    #[serde(default)]
    data: Vec<Trc20Transfer>,
    #[serde(default)]
    success: bool,
}

impl ApiResponse for Trc20TransferPage {
    fn is_success(&self) -> bool {
        self.success
    }
}

#[derive(Debug, Deserialize)]
struct Trc20Transfer {
    transaction_id: String,
    from: String,
    to: String,
    value: String,
    block_timestamp: i64,
    #[serde(default)]
    block: Option<u64>,
    #[serde(default)]
    token_info: Option<TokenInfo>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    decimals: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NowBlock {
    block_header: BlockHeader,
}

impl ApiResponse for NowBlock {}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    raw_data: BlockRawData,
}

#[derive(Debug, Deserialize)]
struct BlockRawData {
    #[serde(default)]
    number: u64,
}

#[derive(Debug, Deserialize)]
struct TransactionInfo {
    #[serde(default, rename = "blockNumber")]
    block_number: Option<u64>,
}

impl ApiResponse for TransactionInfo {}

//--------------------------------------   TronGridClient   ---------------------------------------------------------
/// A [`LedgerSource`] backed by the TronGrid HTTP API.
pub struct TronGridClient {
    config: TronGridConfig,
    client: Client,
    rotation: Mutex<CredentialRotation>,
    /// Block numbers already fetched for transfers whose listing lacked one.
    known_blocks: Mutex<HashMap<String, u64>>,
}

impl TronGridClient {
    pub fn new(config: TronGridConfig) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LedgerError::TransportFailure(e.to_string()))?;
        let rotation = Mutex::new(CredentialRotation::new(config.api_keys.clone()));
        Ok(Self { config, client, rotation, known_blocks: Mutex::new(HashMap::new()) })
    }

    pub fn config(&self) -> &TronGridConfig {
        &self.config
    }

    /// One attempt per key, plus one, and at least two.
    fn max_attempts(&self) -> usize {
        self.with_rotation(|r| r.len()).max(1) + 1
    }

    fn with_rotation<T, F: FnOnce(&mut CredentialRotation) -> T>(&self, f: F) -> T {
        let mut rotation = self.rotation.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rotation)
    }

    fn mark_failed(&self, credential: &Option<Credential>) {
        if let Some(c) = credential {
            self.with_rotation(|r| r.mark_failed(c.index));
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Sends the request with the next credential in the rotation, moving on to the next key when a key is rejected,
    /// rate limited or the connection fails.
    async fn rest_query<T, B>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, LedgerError>
    where
        T: DeserializeOwned + ApiResponse,
        B: Serialize,
    {
        let url = self.url(path);
        let max_attempts = self.max_attempts();
        let mut last_error = LedgerError::TransportFailure("no request was sent".to_string());
        for attempt in 1..=max_attempts {
            let credential = self.with_rotation(|r| r.next_credential());
            let mut req = self.client.request(method.clone(), url.as_str());
            if !params.is_empty() {
                req = req.query(params);
            }
            if let Some(body) = body {
                req = req.json(body);
            }
            if let Some(c) = &credential {
                req = req.header(API_KEY_HEADER, c.key.reveal().as_str());
            }
            trace!("📡 {method} {url} (attempt {attempt}/{max_attempts})");
            let error = match req.send().await {
                Err(e) => {
                    self.mark_failed(&credential);
                    if e.is_timeout() {
                        LedgerError::TransportFailure(format!("request timed out: {e}"))
                    } else {
                        LedgerError::TransportFailure(e.to_string())
                    }
                },
                Ok(response) => match response.status() {
                    StatusCode::UNAUTHORIZED => {
                        self.mark_failed(&credential);
                        LedgerError::Unauthorized
                    },
                    StatusCode::TOO_MANY_REQUESTS => {
                        self.mark_failed(&credential);
                        tokio::time::sleep(self.config.rate_limit_backoff).await;
                        LedgerError::RateLimited
                    },
                    status if !status.is_success() => LedgerError::ApiError(status.as_u16()),
                    _ => match response.json::<T>().await {
                        Ok(result) if result.is_success() => return Ok(result),
                        Ok(_) => LedgerError::Unsuccessful,
                        Err(e) => LedgerError::Decode(e.to_string()),
                    },
                },
            };
            warn!("📡 {method} {path} failed on attempt {attempt}/{max_attempts}: {error}");
            last_error = error;
        }
        Err(LedgerError::CredentialExhausted(last_error.to_string()))
    }

    fn with_known_blocks<T, F: FnOnce(&mut HashMap<String, u64>) -> T>(&self, f: F) -> T {
        let mut blocks = self.known_blocks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut blocks)
    }

    /// The block a transaction was included in, for listings that do not carry it. Each transaction is looked up once.
    async fn transaction_block(&self, tx_hash: &str) -> Option<u64> {
        if let Some(block) = self.with_known_blocks(|blocks| blocks.get(tx_hash).copied()) {
            return Some(block);
        }
        let body = json!({ "value": tx_hash });
        match self.rest_query::<TransactionInfo, _>(Method::POST, "/wallet/gettransactioninfobyid", &[], Some(&body)).await
        {
            Ok(info) => {
                if let Some(block) = info.block_number {
                    self.with_known_blocks(|blocks| {
                        if blocks.len() >= MAX_KNOWN_BLOCKS {
                            blocks.clear();
                        }
                        blocks.insert(tx_hash.to_string(), block);
                    });
                }
                info.block_number
            },
            Err(e) => {
                warn!("📡 Could not look up the block for {tx_hash}: {e}");
                None
            },
        }
    }

    async fn to_record(&self, transfer: Trc20Transfer, height: u64) -> Result<TransactionRecord, LedgerError> {
        let (contract, decimals) = match transfer.token_info {
            Some(info) => (
                info.address.unwrap_or_else(|| self.config.contract_address.clone()),
                info.decimals.unwrap_or(USDT_DECIMALS),
            ),
            None => (self.config.contract_address.clone(), USDT_DECIMALS),
        };
        let raw = transfer
            .value
            .parse::<u128>()
            .map_err(|e| LedgerError::Decode(format!("transfer value '{}': {e}", transfer.value)))?;
        let amount = MicroUsdt::from_base_units(raw, decimals).map_err(|e| LedgerError::Decode(e.to_string()))?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(transfer.block_timestamp)
            .ok_or_else(|| LedgerError::Decode(format!("block timestamp {}", transfer.block_timestamp)))?;
        let block = match transfer.block {
            Some(b) => Some(b),
            None => self.transaction_block(&transfer.transaction_id).await,
        };
        let confirmations = match block {
            Some(b) if height > 0 => height.saturating_sub(b),
            _ => 0,
        };
        Ok(TransactionRecord {
            tx_hash: transfer.transaction_id,
            from_address: transfer.from,
            to_address: transfer.to,
            amount,
            timestamp,
            block_number: i64::try_from(block.unwrap_or_default()).unwrap_or(i64::MAX),
            confirmations: i64::try_from(confirmations).unwrap_or(i64::MAX),
            contract_address: contract,
            processed: false,
            order_id: None,
            disposition: None,
        })
    }
}

impl LedgerSource for TronGridClient {
    async fn fetch_recent_transfers(&self, limit: usize) -> Vec<TransactionRecord> {
        let path = format!("/v1/accounts/{}/transactions/trc20", self.config.wallet_address);
        let params = [
            ("limit", limit.to_string()),
            ("only_to", "true".to_string()),
            ("contract_address", self.config.contract_address.clone()),
        ];
        let page = match self.rest_query::<Trc20TransferPage, ()>(Method::GET, &path, &params, None).await {
            Ok(page) => page,
            Err(e) => {
                error!("📡 Could not fetch recent transfers: {e}");
                return vec![];
            },
        };
        if page.data.is_empty() {
            return vec![];
        }
        let height = self.current_block_height().await.unwrap_or_else(|e| {
            warn!("📡 Could not fetch the current block height. Confirmations will read as 0. {e}");
            0
        });
        let mut records = Vec::with_capacity(page.data.len());
        for transfer in page.data {
            let tx_hash = transfer.transaction_id.clone();
            match self.to_record(transfer, height).await {
                Ok(record) => records.push(record),
                Err(e) => warn!("📡 Skipping transfer {tx_hash}: {e}"),
            }
        }
        debug!("📡 Fetched {} transfers at block height {height}", records.len());
        records
    }

    async fn current_block_height(&self) -> Result<u64, LedgerError> {
        let block = self.rest_query::<NowBlock, ()>(Method::POST, "/wallet/getnowblock", &[], None).await?;
        Ok(block.block_header.raw_data.number)
    }
}
