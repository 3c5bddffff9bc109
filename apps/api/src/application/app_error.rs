use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Webhook signature rejected: {0}")]
    Authenticity(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("More than one account matches {email}")]
    DuplicateAccount { email: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidSignature,
    InvalidPayload,
    ConfigurationError,
    DataIntegrityError,
    DatabaseError,
    ProviderError,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::InvalidPayload => "INVALID_PAYLOAD",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::DataIntegrityError => "DATA_INTEGRITY_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::ProviderError => "PROVIDER_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
