use thiserror::Error;

/// Errors raised by the external collaborators the trading cycle depends on
/// (price service, wallet service, swap client, secrets).
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("HTTP request to {service} failed: {reason}")]
    RequestFailed { service: String, reason: String },

    #[error("{service} returned status {status}: {body}")]
    UnexpectedStatus {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Failed to parse {service} response: {reason}")]
    InvalidResponse { service: String, reason: String },

    #[error("{service} reported failure: {reason}")]
    Rejected { service: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ProviderError {
    pub fn request(service: &str, reason: impl ToString) -> Self {
        ProviderError::RequestFailed {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_response(service: &str, reason: impl ToString) -> Self {
        ProviderError::InvalidResponse {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Network-level and 5xx failures are worth retrying; parse errors and
    /// explicit rejections are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RequestFailed { .. } => true,
            ProviderError::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
            ProviderError::InvalidResponse { .. } => false,
            ProviderError::Rejected { .. } => false,
            ProviderError::InvalidConfiguration(_) => false,
        }
    }
}

/// Failures of the position/transaction/strategy/memory stores as seen by the domain.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store query failed: {0}")]
    QueryFailed(String),

    #[error("Stored record is invalid: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid time interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid strategy configuration: {0}")]
    InvalidStrategy(String),

    #[error("Value must be non-negative")]
    MustBeNonNegative,

    #[error("Value must be finite")]
    MustBeFinite,
}

impl From<ValidationError> for String {
    fn from(error: ValidationError) -> Self {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_transience() {
        assert!(ProviderError::request("birdeye", "connection reset").is_transient());
        assert!(ProviderError::UnexpectedStatus {
            service: "birdeye".to_string(),
            status: 503,
            body: String::new(),
        }
        .is_transient());
        assert!(!ProviderError::UnexpectedStatus {
            service: "birdeye".to_string(),
            status: 401,
            body: "unauthorized".to_string(),
        }
        .is_transient());
        assert!(!ProviderError::invalid_response("rpc", "missing field").is_transient());
    }

    #[test]
    fn test_provider_error_display() {
        let error = ProviderError::request("swap-gateway", "timed out");
        assert_eq!(
            error.to_string(),
            "HTTP request to swap-gateway failed: timed out"
        );
    }
}
