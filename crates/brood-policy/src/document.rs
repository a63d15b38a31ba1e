//! Serializable policy documents.
//!
//! A [`PolicyDocument`] is the on-disk form of a learned policy: the
//! tabular value table or the approximate network's named tensors,
//! plus exploration state and the fingerprint of the perception
//! encoding the policy was trained against.

use crate::error::PolicyError;
use brood_obs::StateKey;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Current document format version.
pub const DOCUMENT_VERSION: u32 = 1;

/// A dense row-major tensor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    /// Dimension sizes.
    pub shape: Vec<usize>,
    /// Row-major values; `data.len()` equals the product of `shape`.
    pub data: Vec<f32>,
}

impl Tensor {
    /// A zero tensor of the given shape.
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; shape.iter().product()],
        }
    }

    /// A zero tensor shaped like `self`.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(&self.shape)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `data` agrees with `shape`.
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.shape.iter().product::<usize>()
    }
}

/// Family-specific learned state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyBody {
    /// Encoded state to per-action values.
    Tabular {
        /// The value table, in first-seen order.
        table: IndexMap<StateKey, Vec<f64>>,
    },
    /// Named network tensors.
    Approximate {
        /// Online network parameters.
        online: IndexMap<String, Tensor>,
        /// Target network parameters.
        target: IndexMap<String, Tensor>,
    },
}

/// Persisted form of a policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Format version.
    pub version: u32,
    /// Fingerprint of the perception encoding.
    pub fingerprint: u64,
    /// Number of actions per state.
    pub action_count: usize,
    /// Exploration rate at save time.
    pub epsilon: f64,
    /// Completed episodes at save time.
    pub episodes: u64,
    /// Learned state.
    pub body: PolicyBody,
}

impl PolicyDocument {
    /// Check version and encoder fingerprint.
    ///
    /// # Errors
    ///
    /// [`PolicyError::UnsupportedVersion`] or
    /// [`PolicyError::FingerprintMismatch`].
    pub fn check_header(&self, fingerprint: u64) -> Result<(), PolicyError> {
        if self.version != DOCUMENT_VERSION {
            return Err(PolicyError::UnsupportedVersion {
                found: self.version,
            });
        }
        if self.fingerprint != fingerprint {
            return Err(PolicyError::FingerprintMismatch {
                expected: fingerprint,
                found: self.fingerprint,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tabular_doc() -> PolicyDocument {
        let mut table = IndexMap::new();
        table.insert(StateKey(0x31), vec![0.5, -1.0, 0.25]);
        table.insert(StateKey(7), vec![0.0, 0.0, 2.0]);
        PolicyDocument {
            version: DOCUMENT_VERSION,
            fingerprint: 0xABCD,
            action_count: 3,
            epsilon: 0.2,
            episodes: 12,
            body: PolicyBody::Tabular { table },
        }
    }

    #[test]
    fn tabular_json_keeps_integer_keys_and_order() {
        let doc = tabular_doc();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"49\""));
        let back: PolicyDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
        let PolicyBody::Tabular { table } = back.body else {
            panic!("expected tabular body");
        };
        assert_eq!(table.keys().copied().collect::<Vec<_>>(), vec![StateKey(0x31), StateKey(7)]);
    }

    #[test]
    fn header_checks() {
        let doc = tabular_doc();
        assert!(doc.check_header(0xABCD).is_ok());
        assert_eq!(
            doc.check_header(1),
            Err(PolicyError::FingerprintMismatch {
                expected: 1,
                found: 0xABCD
            })
        );
        let old = PolicyDocument { version: 0, ..doc };
        assert_eq!(
            old.check_header(0xABCD),
            Err(PolicyError::UnsupportedVersion { found: 0 })
        );
    }

    #[test]
    fn tensor_consistency() {
        let t = Tensor::zeros(&[2, 3]);
        assert_eq!(t.len(), 6);
        assert!(t.is_consistent());
        let bad = Tensor {
            shape: vec![2, 2],
            data: vec![0.0; 3],
        };
        assert!(!bad.is_consistent());
    }
}
