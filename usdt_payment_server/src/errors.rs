use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use thiserror::Error;
use usdt_payment_engine::{IssuanceError, StoreError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Service temporarily unavailable. {0}")]
    Unavailable(String),
    #[error("A valid bearer token is required")]
    Unauthorized,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<IssuanceError> for ServerError {
    fn from(e: IssuanceError) -> Self {
        match e {
            IssuanceError::ActiveOrderExists { .. } => Self::Conflict(e.to_string()),
            IssuanceError::DuplicateOrder(_) => Self::Conflict(e.to_string()),
            IssuanceError::InvalidPlan(_) => Self::InvalidRequestBody(e.to_string()),
            IssuanceError::AmountSpaceExhausted(_) => Self::Unavailable(e.to_string()),
            IssuanceError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            IssuanceError::Store(StoreError::InvalidTransition { .. }) => Self::Conflict(e.to_string()),
            IssuanceError::Store(e) => Self::BackendError(e.to_string()),
        }
    }
}
