//! Error type shared by every container operation.

use thiserror::Error;

use crate::value::ValueKind;

/// Errors raised by container reads, writes, windowing and ingestion.
///
/// Every variant is a local, synchronous failure of the call that returned
/// it. Bounds and range errors are programmer errors; `UnexpectedType`,
/// `MissingDecoder` and `Decode` are contract violations at the ingestion
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    /// A sequence position or a sub-range bound past the end.
    #[error("index out of range [{index}] with length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    /// A sub-range whose left bound is greater than its right bound.
    #[error("slice bounds out of range [{left}:{right}]")]
    InvalidRange { left: usize, right: usize },
    /// A mutation attempted on something that is not the right container.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// A value of the wrong shape reached wrapping or ingestion.
    #[error("unexpected type: expected {expected}, found {actual}")]
    UnexpectedType {
        expected: ValueKind,
        actual: ValueKind,
    },
    /// A payload was loaded without a codec configured.
    #[error("no codec configured for payload")]
    MissingDecoder,
    /// The configured codec rejected the payload.
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, OverlayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_bounds() {
        let err = OverlayError::IndexOutOfRange { index: 7, len: 3 };
        assert_eq!(err.to_string(), "index out of range [7] with length 3");

        let err = OverlayError::InvalidRange { left: 4, right: 2 };
        assert_eq!(err.to_string(), "slice bounds out of range [4:2]");
    }

    #[test]
    fn unexpected_type_names_both_kinds() {
        let err = OverlayError::UnexpectedType {
            expected: ValueKind::Map,
            actual: ValueKind::Sequence,
        };
        assert_eq!(err.to_string(), "unexpected type: expected map, found sequence");
    }
}
