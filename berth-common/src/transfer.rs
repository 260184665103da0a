//! Core transfer identity and status types
//!
//! A transfer is identified by its content hash (40 lowercase hex
//! characters, the BitTorrent v1 info-hash format). The identifier is
//! immutable for the lifetime of a record.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

/// Expected length for info-hash strings (40 hex characters)
pub const INFO_HASH_HEX_LENGTH: usize = 40;

/// Validation error for info-hash strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoHashError {
    /// Hash string has wrong length (must be exactly 40 characters)
    InvalidLength,
    /// Hash string contains non-hexadecimal characters
    InvalidCharacters,
}

impl std::fmt::Display for InfoHashError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLength => write!(f, "info hash must be {} hex characters", INFO_HASH_HEX_LENGTH),
            Self::InvalidCharacters => write!(f, "info hash contains non-hex characters"),
        }
    }
}

/// Stable content identifier for a transfer
///
/// Always stored lowercase; parsing accepts mixed case and normalizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfoHash(String);

impl InfoHash {
    /// Parse and normalize an info-hash string
    ///
    /// # Errors
    ///
    /// Returns an `InfoHashError` variant describing the validation failure.
    pub fn parse(s: &str) -> Result<Self, InfoHashError> {
        if s.len() != INFO_HASH_HEX_LENGTH {
            return Err(InfoHashError::InvalidLength);
        }
        if !s.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(InfoHashError::InvalidCharacters);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Derive an identifier for an opaque transfer descriptor
    ///
    /// Used when a source has no embedded hash (e.g. a raw metadata blob).
    /// SHA-256 truncated to 20 bytes so the result fits the identifier format.
    pub fn derive(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(hex::encode(&digest[..INFO_HASH_HEX_LENGTH / 2]))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InfoHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a tracked transfer
///
/// `Removed` is terminal: the record is deleted from the store when it is
/// reached, so the variant only ever appears in change-sets and events.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransferStatus {
    Queued,
    Checking,
    Downloading,
    Paused,
    Seeding,
    Completed,
    Error,
    Removed,
}

impl TransferStatus {
    /// Whether this status ends the record's lifecycle
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Removed)
    }

    /// Whether a transition from `self` to `to` is allowed
    ///
    /// Same-state transitions are always allowed (commands treat them as
    /// no-ops). Every state may transition to `Removed`.
    pub fn can_transition(self, to: TransferStatus) -> bool {
        use TransferStatus::*;

        if self == to || to == Removed {
            return true;
        }

        match self {
            Queued => matches!(to, Downloading | Checking | Paused | Error),
            Downloading => matches!(to, Paused | Checking | Completed | Seeding | Error),
            Paused => matches!(to, Downloading | Checking | Error),
            Checking => matches!(to, Downloading | Completed | Seeding | Paused | Error),
            Seeding => matches!(to, Completed | Paused | Checking | Error),
            Completed => matches!(to, Seeding | Checking | Error),
            Error => matches!(to, Checking),
            Removed => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const HASH: &str = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";

    #[test]
    fn test_parse_valid() {
        let hash = InfoHash::parse(HASH).unwrap();
        assert_eq!(hash.as_str(), HASH);
    }

    #[test]
    fn test_parse_normalizes_case() {
        let hash = InfoHash::parse(&HASH.to_ascii_uppercase()).unwrap();
        assert_eq!(hash.as_str(), HASH);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert_eq!(InfoHash::parse(""), Err(InfoHashError::InvalidLength));
        assert_eq!(
            InfoHash::parse(&HASH[..39]),
            Err(InfoHashError::InvalidLength)
        );
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        let bad = format!("{}g", &HASH[..39]);
        assert_eq!(InfoHash::parse(&bad), Err(InfoHashError::InvalidCharacters));
    }

    #[test]
    fn test_derive_is_stable_and_valid() {
        let a = InfoHash::derive(b"some descriptor bytes");
        let b = InfoHash::derive(b"some descriptor bytes");
        assert_eq!(a, b);
        assert!(InfoHash::parse(a.as_str()).is_ok());
    }

    #[test]
    fn test_derive_differs_by_input() {
        assert_ne!(InfoHash::derive(b"one"), InfoHash::derive(b"two"));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TransferStatus::Queued,
            TransferStatus::Checking,
            TransferStatus::Downloading,
            TransferStatus::Paused,
            TransferStatus::Seeding,
            TransferStatus::Completed,
            TransferStatus::Error,
            TransferStatus::Removed,
        ] {
            let text = status.to_string();
            assert_eq!(TransferStatus::from_str(&text).unwrap(), status);
        }
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TransferStatus::Downloading).unwrap();
        assert_eq!(json, "\"downloading\"");
    }

    #[test]
    fn test_download_lifecycle_transitions() {
        use TransferStatus::*;
        assert!(Queued.can_transition(Downloading));
        assert!(Downloading.can_transition(Paused));
        assert!(Paused.can_transition(Downloading));
        assert!(Downloading.can_transition(Seeding));
        assert!(Seeding.can_transition(Completed));
        assert!(Completed.can_transition(Seeding));
        assert!(Error.can_transition(Checking));
        assert!(Checking.can_transition(Downloading));
    }

    #[test]
    fn test_every_state_may_be_removed() {
        use TransferStatus::*;
        for status in [Queued, Checking, Downloading, Paused, Seeding, Completed, Error] {
            assert!(status.can_transition(Removed));
        }
    }

    #[test]
    fn test_removed_is_terminal() {
        use TransferStatus::*;
        assert!(Removed.is_terminal());
        for status in [Queued, Downloading, Paused, Seeding, Completed, Error, Checking] {
            assert!(!Removed.can_transition(status));
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn test_error_only_retries_via_recheck() {
        use TransferStatus::*;
        assert!(!Error.can_transition(Downloading));
        assert!(!Error.can_transition(Completed));
        assert!(Error.can_transition(Checking));
    }

    #[test]
    fn test_same_state_is_noop() {
        assert!(TransferStatus::Paused.can_transition(TransferStatus::Paused));
    }
}
