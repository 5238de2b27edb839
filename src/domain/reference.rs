//! Transaction references
//!
//! Human-readable, unique-enough references such as `CONTRIB-9F03A1BC`.
//! The reference is the key the reconciler uses to find which side effects
//! of a money movement were committed.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Contribution,
    AutoSave,
    Withdrawal,
    Reversal,
}

impl ReferenceKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ReferenceKind::Contribution => "CONTRIB",
            ReferenceKind::AutoSave => "AUTOSAVE",
            ReferenceKind::Withdrawal => "WITHDRAW",
            ReferenceKind::Reversal => "REVERSAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionReference(String);

impl TransactionReference {
    /// Generate `<PREFIX>-<8 upper-case hex chars>`
    pub fn generate(kind: ReferenceKind) -> Self {
        let mut bytes = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(format!("{}-{}", kind.prefix(), hex::encode_upper(bytes)))
    }

    /// Reference for the compensating entry of another movement
    pub fn reversal_of(original: &str) -> Self {
        Self(format!("{}-{}", ReferenceKind::Reversal.prefix(), original))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TransactionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TransactionReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contribution_reference_format() {
        let reference = TransactionReference::generate(ReferenceKind::Contribution);
        let (prefix, suffix) = reference.as_str().split_once('-').unwrap();

        assert_eq!(prefix, "CONTRIB");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_auto_save_prefix() {
        let reference = TransactionReference::generate(ReferenceKind::AutoSave);
        assert!(reference.as_str().starts_with("AUTOSAVE-"));
    }

    #[test]
    fn test_reversal_reference() {
        let reference = TransactionReference::reversal_of("CONTRIB-0011AABB");
        assert_eq!(reference.as_str(), "REVERSAL-CONTRIB-0011AABB");
    }
}
