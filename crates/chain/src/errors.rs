//! Classification of RPC and contract errors.
//!
//! Providers and contracts report failures as free-form strings (JSON-RPC
//! error messages, revert data, transport errors). The relayer needs to tell
//! a handful of shapes apart to decide between "no-op", "switch strategy",
//! "retry" and "give up", so everything funnels through [`classify`].

use alloy::sol_types::SolError;
use thiserror::Error;

use crate::contracts::ILending;

/// Failure shape of a chain interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureKind {
    /// The lending contract reported there is nothing eligible for liquidation.
    #[error("nothing to liquidate")]
    NothingToLiquidate,
    /// The called contract function does not exist on the deployed contract.
    #[error("contract function not available")]
    MissingFunction,
    /// The RPC provider does not support the requested query method.
    #[error("query method not supported by provider")]
    UnsupportedQuery,
    /// A replacement transaction was rejected because its fee was too low.
    #[error("replacement fee too low")]
    FeeTooLow,
    /// Underpriced transactions, timeouts and transport errors.
    #[error("transient error")]
    Transient,
    /// Anything else.
    #[error("fatal error")]
    Fatal,
}

impl FailureKind {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::FeeTooLow | FailureKind::Transient)
    }
}

/// Revert messages emitted when a selector is unknown to the contract.
const MISSING_FUNCTION_PATTERNS: &[&str] = &[
    "function selector was not recognized",
    "unrecognized function selector",
    "function does not exist",
    "unknown function",
];

/// Provider messages for unsupported JSON-RPC methods.
const UNSUPPORTED_QUERY_PATTERNS: &[&str] = &[
    "method not found",
    "method not supported",
    "unsupported method",
    "does not exist/is not available",
    "-32601",
];

const FEE_TOO_LOW_PATTERNS: &[&str] = &["replacement fee too low", "fee too low"];

const TRANSIENT_PATTERNS: &[&str] = &[
    "underpriced",
    "timeout",
    "timed out",
    "network error",
    "connection",
    "temporarily unavailable",
    "too many requests",
];

/// Hex encoded selector of `NoLiquidatableCollateral()`.
pub fn nothing_to_liquidate_selector() -> String {
    hex::encode(ILending::NoLiquidatableCollateral::SELECTOR)
}

/// Whether `message` carries revert data that is exactly `0x{selector}`.
///
/// The selector must not run on into more hex digits, so a transaction hash
/// or address that happens to start with it does not count.
fn has_revert_selector(message: &str, selector: &str) -> bool {
    let needle = format!("0x{selector}");
    message.match_indices(&needle).any(|(start, _)| {
        let before = message[..start].chars().next_back();
        let after = message[start + needle.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_hexdigit())
    })
}

/// Classify an error message.
///
/// Ordering matters: the "nothing to liquidate" custom error and
/// missing-function reverts are checked before the generic transient
/// patterns since revert payloads may also mention e.g. a connection.
pub fn classify(message: &str) -> FailureKind {
    let lower = message.to_lowercase();

    if lower.contains("noliquidatablecollateral")
        || lower.contains("no eligible positions")
        || has_revert_selector(&lower, &nothing_to_liquidate_selector())
    {
        return FailureKind::NothingToLiquidate;
    }
    if MISSING_FUNCTION_PATTERNS.iter().any(|p| lower.contains(p)) {
        return FailureKind::MissingFunction;
    }
    if UNSUPPORTED_QUERY_PATTERNS.iter().any(|p| lower.contains(p)) {
        return FailureKind::UnsupportedQuery;
    }
    if FEE_TOO_LOW_PATTERNS.iter().any(|p| lower.contains(p)) {
        return FailureKind::FeeTooLow;
    }
    if TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return FailureKind::Transient;
    }
    FailureKind::Fatal
}

/// Classify an `anyhow` error using its full context chain.
pub fn classify_error(err: &anyhow::Error) -> FailureKind {
    classify(&format!("{err:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_to_liquidate() {
        let msg = format!(
            "server returned an error response: error code 3: execution reverted, data: \"0x{}\"",
            nothing_to_liquidate_selector()
        );
        assert_eq!(classify(&msg), FailureKind::NothingToLiquidate);
        assert_eq!(
            classify("execution reverted: NoLiquidatableCollateral()"),
            FailureKind::NothingToLiquidate
        );
        assert_eq!(
            classify("execution reverted: No eligible positions"),
            FailureKind::NothingToLiquidate
        );
    }

    #[test]
    fn test_selector_inside_hash_is_not_a_match() {
        let selector = nothing_to_liquidate_selector();
        let tx_hash = format!("0x{selector}{}", "ab".repeat(28));
        let msg = format!("execution reverted: Ownable: caller is not the owner (tx {tx_hash})");
        assert_eq!(classify(&msg), FailureKind::Fatal);

        let embedded = format!("request timed out for tx 0x1234{selector}5678");
        assert_eq!(classify(&embedded), FailureKind::Transient);

        let revert = format!("execution reverted, data: 0x{selector}");
        assert_eq!(classify(&revert), FailureKind::NothingToLiquidate);
    }

    #[test]
    fn test_missing_function() {
        assert_eq!(
            classify("execution reverted: function selector was not recognized and there's no fallback function"),
            FailureKind::MissingFunction
        );
        assert_eq!(classify("Unknown function"), FailureKind::MissingFunction);
    }

    #[test]
    fn test_unsupported_query() {
        assert_eq!(
            classify("error code -32601: the method eth_getLogs does not exist/is not available"),
            FailureKind::UnsupportedQuery
        );
    }

    #[test]
    fn test_retryable_shapes() {
        assert_eq!(classify("replacement fee too low"), FailureKind::FeeTooLow);
        assert_eq!(
            classify("replacement transaction underpriced"),
            FailureKind::Transient
        );
        assert_eq!(classify("confirmation timeout after 300s"), FailureKind::Transient);
        assert_eq!(classify("network error: connection reset"), FailureKind::Transient);
        assert!(FailureKind::FeeTooLow.is_retryable());
        assert!(FailureKind::Transient.is_retryable());
    }

    #[test]
    fn test_fatal() {
        assert_eq!(classify("execution reverted: Ownable: caller is not the owner"), FailureKind::Fatal);
        assert!(!FailureKind::Fatal.is_retryable());
        assert!(!FailureKind::MissingFunction.is_retryable());
    }

    #[test]
    fn test_classify_error_uses_context_chain() {
        let err = anyhow::anyhow!("request timed out").context("estimate gas");
        assert_eq!(classify_error(&err), FailureKind::Transient);
    }
}
