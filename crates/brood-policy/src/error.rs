//! Error types for policy inference and restoration.

use std::error::Error;
use std::fmt;

/// Errors from policy inference, breeding, or document restoration.
///
/// None of these are fatal to a running simulation: inference errors
/// fall back to a random action and restoration errors to a cold start.
#[derive(Clone, Debug, PartialEq)]
pub enum PolicyError {
    /// An input vector does not match the network's input width.
    InputWidth {
        /// Width the network was built for.
        expected: usize,
        /// Width that was supplied.
        got: usize,
    },
    /// A forward pass produced a NaN or infinite value.
    NonFinite,
    /// Two policies of different kinds were asked to interact.
    KindMismatch {
        /// Kind of the receiving policy.
        expected: &'static str,
        /// Kind of the other policy.
        got: &'static str,
    },
    /// A stored tensor or value vector has the wrong shape.
    ShapeMismatch {
        /// Name of the offending entry.
        name: String,
        /// Human-readable description of the expected shape.
        expected: String,
    },
    /// A document was written by a different encoding.
    FingerprintMismatch {
        /// Fingerprint of the running encoder.
        expected: u64,
        /// Fingerprint found in the document.
        found: u64,
    },
    /// A document uses an unsupported format version.
    UnsupportedVersion {
        /// Version found in the document.
        found: u32,
    },
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputWidth { expected, got } => {
                write!(f, "input width {got} does not match network width {expected}")
            }
            Self::NonFinite => write!(f, "forward pass produced a non-finite value"),
            Self::KindMismatch { expected, got } => {
                write!(f, "policy kind mismatch: expected {expected}, got {got}")
            }
            Self::ShapeMismatch { name, expected } => {
                write!(f, "entry '{name}' has the wrong shape, expected {expected}")
            }
            Self::FingerprintMismatch { expected, found } => {
                write!(
                    f,
                    "document encoder fingerprint {found:#x} does not match {expected:#x}"
                )
            }
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported policy document version {found}")
            }
        }
    }
}

impl Error for PolicyError {}
