//! Trade execution errors with detailed context

use std::fmt;
use thiserror::Error;

/// Why a single trade decision failed to execute.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TradeExecutionError {
    /// Decision carries no token pair
    #[error("Invalid trade decision: missing tokenPair")]
    MissingTokenPair,

    /// Decision carries no strategy assignment id
    #[error("Invalid trade decision: missing strategyAssignmentId")]
    MissingStrategyAssignment,

    /// Close decision without the position it should close
    #[error("No open position to close for {pair}")]
    MissingPosition { pair: String },

    /// No usable price for one leg of the pair
    #[error("Missing price history for {symbol} ({address})")]
    MissingPriceHistory { symbol: String, address: String },

    /// Amount is not a positive finite number
    #[error("Invalid trade amount: {reason}")]
    InvalidAmount { reason: String },

    /// Rejected by the trade parameter checks
    #[error("Trade validation failed: {reason}")]
    ValidationFailed { reason: String },

    /// Rejected by the position size vs liquidity check
    #[error("Position size validation failed: {reason}")]
    PositionSizeRejected { reason: String },

    /// Swap submission failed in a way that may succeed on retry
    #[error("Swap submission failed: {reason}")]
    SwapSubmissionFailed { reason: String },

    /// Swap was refused and retrying will not help
    #[error("Swap rejected: {reason}")]
    SwapRejected { reason: String },

    /// Transaction not yet visible on chain
    #[error("Transaction {hash} not confirmed yet")]
    ConfirmationPending { hash: String },

    /// Transaction landed but failed on chain
    #[error("Transaction {hash} failed on chain: {reason}")]
    ConfirmationFailed { hash: String, reason: String },

    /// One attempt exceeded its time budget
    #[error("Swap attempt timed out after {timeout_ms}ms")]
    AttemptTimedOut { timeout_ms: u64 },

    /// Every attempt failed
    #[error("Swap failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Swap details could not be derived from the confirmation
    #[error("Incomplete swap details: {reason}")]
    SwapDetailsIncomplete { reason: String },

    /// Writing the position or transaction failed
    #[error("Failed to record trade: {reason}")]
    PersistenceFailed { reason: String },
}

impl TradeExecutionError {
    /// Get the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TradeExecutionError::ValidationFailed { .. } => ErrorSeverity::Minor,
            TradeExecutionError::PositionSizeRejected { .. } => ErrorSeverity::Minor,
            TradeExecutionError::InvalidAmount { .. } => ErrorSeverity::Minor,
            TradeExecutionError::ConfirmationPending { .. } => ErrorSeverity::Minor,
            TradeExecutionError::AttemptTimedOut { .. } => ErrorSeverity::Minor,
            TradeExecutionError::MissingTokenPair => ErrorSeverity::Moderate,
            TradeExecutionError::MissingStrategyAssignment => ErrorSeverity::Moderate,
            TradeExecutionError::MissingPosition { .. } => ErrorSeverity::Moderate,
            TradeExecutionError::MissingPriceHistory { .. } => ErrorSeverity::Moderate,
            TradeExecutionError::SwapSubmissionFailed { .. } => ErrorSeverity::Moderate,
            TradeExecutionError::SwapRejected { .. } => ErrorSeverity::Moderate,
            TradeExecutionError::ConfirmationFailed { .. } => ErrorSeverity::Critical,
            TradeExecutionError::RetriesExhausted { .. } => ErrorSeverity::Critical,
            TradeExecutionError::SwapDetailsIncomplete { .. } => ErrorSeverity::Critical,
            TradeExecutionError::PersistenceFailed { .. } => ErrorSeverity::Critical,
        }
    }

    /// Check if this error is recoverable (retrying might help)
    pub fn is_recoverable(&self) -> bool {
        match self {
            TradeExecutionError::SwapSubmissionFailed { .. } => true,
            TradeExecutionError::ConfirmationPending { .. } => true,
            TradeExecutionError::AttemptTimedOut { .. } => true,

            TradeExecutionError::MissingTokenPair => false,
            TradeExecutionError::MissingStrategyAssignment => false,
            TradeExecutionError::MissingPosition { .. } => false,
            TradeExecutionError::MissingPriceHistory { .. } => false,
            TradeExecutionError::InvalidAmount { .. } => false,
            TradeExecutionError::ValidationFailed { .. } => false,
            TradeExecutionError::PositionSizeRejected { .. } => false,
            TradeExecutionError::SwapRejected { .. } => false,
            TradeExecutionError::ConfirmationFailed { .. } => false,
            TradeExecutionError::RetriesExhausted { .. } => false,
            TradeExecutionError::SwapDetailsIncomplete { .. } => false,
            TradeExecutionError::PersistenceFailed { .. } => false,
        }
    }

    /// Whether the swap itself may be sent again. Only a submission the
    /// gateway never accepted qualifies; anything that may have produced a
    /// signature does not.
    pub fn is_resubmittable(&self) -> bool {
        matches!(self, TradeExecutionError::SwapSubmissionFailed { .. })
    }

    /// Get a short error code for logging/monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            TradeExecutionError::MissingTokenPair => "ERR_MISSING_TOKEN_PAIR",
            TradeExecutionError::MissingStrategyAssignment => "ERR_MISSING_ASSIGNMENT",
            TradeExecutionError::MissingPosition { .. } => "ERR_MISSING_POSITION",
            TradeExecutionError::MissingPriceHistory { .. } => "ERR_MISSING_PRICE_HISTORY",
            TradeExecutionError::InvalidAmount { .. } => "ERR_INVALID_AMOUNT",
            TradeExecutionError::ValidationFailed { .. } => "ERR_VALIDATION",
            TradeExecutionError::PositionSizeRejected { .. } => "ERR_POSITION_SIZE",
            TradeExecutionError::SwapSubmissionFailed { .. } => "ERR_SWAP_SUBMISSION",
            TradeExecutionError::SwapRejected { .. } => "ERR_SWAP_REJECTED",
            TradeExecutionError::ConfirmationPending { .. } => "ERR_CONFIRMATION_PENDING",
            TradeExecutionError::ConfirmationFailed { .. } => "ERR_CONFIRMATION_FAILED",
            TradeExecutionError::AttemptTimedOut { .. } => "ERR_ATTEMPT_TIMEOUT",
            TradeExecutionError::RetriesExhausted { .. } => "ERR_RETRIES_EXHAUSTED",
            TradeExecutionError::SwapDetailsIncomplete { .. } => "ERR_SWAP_DETAILS",
            TradeExecutionError::PersistenceFailed { .. } => "ERR_PERSISTENCE",
        }
    }
}

/// Severity levels for trade execution errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Non-critical, expected to occur occasionally
    Minor,
    /// Moderate issues that indicate problems
    Moderate,
    /// Critical issues that require immediate attention
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Minor => write!(f, "Minor"),
            ErrorSeverity::Moderate => write!(f, "Moderate"),
            ErrorSeverity::Critical => write!(f, "Critical"),
        }
    }
}

impl From<TradeExecutionError> for String {
    fn from(error: TradeExecutionError) -> Self {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_pair_message() {
        let error = TradeExecutionError::MissingTokenPair;
        assert!(error.to_string().contains("missing tokenPair"));
        assert_eq!(error.error_code(), "ERR_MISSING_TOKEN_PAIR");
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_missing_price_history_names_token() {
        let error = TradeExecutionError::MissingPriceHistory {
            symbol: "JUP".to_string(),
            address: "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Missing price history for JUP (JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN)"
        );
    }

    #[test]
    fn test_transient_swap_errors_are_recoverable() {
        assert!(TradeExecutionError::SwapSubmissionFailed {
            reason: "503".to_string()
        }
        .is_recoverable());
        assert!(TradeExecutionError::ConfirmationPending {
            hash: "abc".to_string()
        }
        .is_recoverable());
        assert!(TradeExecutionError::AttemptTimedOut { timeout_ms: 30_000 }.is_recoverable());
    }

    #[test]
    fn test_only_unaccepted_submissions_are_resubmittable() {
        assert!(TradeExecutionError::SwapSubmissionFailed {
            reason: "503".to_string()
        }
        .is_resubmittable());
        assert!(!TradeExecutionError::ConfirmationPending {
            hash: "abc".to_string()
        }
        .is_resubmittable());
        assert!(!TradeExecutionError::AttemptTimedOut { timeout_ms: 30_000 }.is_resubmittable());
        assert!(!TradeExecutionError::SwapRejected {
            reason: "insufficient funds".to_string()
        }
        .is_resubmittable());
    }

    #[test]
    fn test_on_chain_failure_is_not_recoverable() {
        let error = TradeExecutionError::ConfirmationFailed {
            hash: "abc".to_string(),
            reason: "slippage exceeded".to_string(),
        };
        assert!(!error.is_recoverable());
        assert_eq!(error.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_validation_failures_are_minor() {
        let error = TradeExecutionError::ValidationFailed {
            reason: "Insufficient liquidity".to_string(),
        };
        assert_eq!(error.severity(), ErrorSeverity::Minor);
        assert_eq!(
            error.to_string(),
            "Trade validation failed: Insufficient liquidity"
        );
    }

    #[test]
    fn test_retries_exhausted_display() {
        let error = TradeExecutionError::RetriesExhausted {
            attempts: 3,
            last_error: "Swap submission failed: timeout".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Swap failed after 3 attempts: Swap submission failed: timeout"
        );
        assert!(ErrorSeverity::Critical > ErrorSeverity::Minor);
    }
}
