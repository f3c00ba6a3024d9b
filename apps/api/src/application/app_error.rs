use thiserror::Error;

pub use biolink_types::ErrorCode;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Too many requests. Please slow down.")]
    RateLimited,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found")]
    NotFound,

    #[error("Plan limit reached: {0}")]
    LimitReached(String),

    #[error("This feature requires a premium subscription")]
    PremiumRequired,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::RateLimited => ErrorCode::RateLimited,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::Forbidden => ErrorCode::Forbidden,
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::LimitReached(_) => ErrorCode::LimitReached,
            AppError::PremiumRequired => ErrorCode::PremiumRequired,
            AppError::InvalidSignature => ErrorCode::InvalidSignature,
            AppError::PaymentGateway(_) => ErrorCode::PaymentGatewayError,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Transient failures where a retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Internal(_) | AppError::RateLimited
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
