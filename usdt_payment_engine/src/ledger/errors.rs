use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Every attempt to reach the ledger API failed. Last error: {0}")]
    CredentialExhausted(String),
    #[error("Could not reach the ledger API: {0}")]
    TransportFailure(String),
    #[error("The ledger API is rate limiting requests")]
    RateLimited,
    #[error("The ledger API rejected the API key")]
    Unauthorized,
    #[error("The ledger API returned status {0}")]
    ApiError(u16),
    #[error("The ledger API reported that the request was unsuccessful")]
    Unsuccessful,
    #[error("Could not decode the ledger API response: {0}")]
    Decode(String),
}
