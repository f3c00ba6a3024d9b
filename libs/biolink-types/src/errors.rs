use serde::{Deserialize, Serialize};

/// API error codes returned by biolink endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DatabaseError,
    InvalidCredentials,
    Forbidden,
    RateLimited,
    InvalidInput,
    Conflict,
    NotFound,
    LimitReached,
    PremiumRequired,
    InvalidSignature,
    PaymentGatewayError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Forbidden => "FORBIDDEN",
            Self::RateLimited => "RATE_LIMITED",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Conflict => "CONFLICT",
            Self::NotFound => "NOT_FOUND",
            Self::LimitReached => "LIMIT_REACHED",
            Self::PremiumRequired => "PREMIUM_REQUIRED",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::PaymentGatewayError => "PAYMENT_GATEWAY_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body of every failed API response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: Option<String>) -> Self {
        Self { code, message }
    }
}
