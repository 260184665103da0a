//! Transfer source validation
//!
//! A source locator is either a magnet link carrying a BitTorrent v1
//! info-hash (`xt=urn:btih:...`) or a bare 40-hex info-hash string.
//! Opaque metadata descriptors are handled separately by the add command,
//! which derives an identifier from the descriptor bytes.

use crate::transfer::{INFO_HASH_HEX_LENGTH, InfoHash};

/// URI scheme prefix for magnet links
pub const MAGNET_SCHEME: &str = "magnet:?";

/// Validation error for transfer source locators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Source string is empty or whitespace
    Empty,
    /// Magnet link has no `xt=urn:btih:` parameter
    MissingInfoHash,
    /// Embedded info-hash failed validation
    InvalidInfoHash,
    /// Not a magnet link and not a bare info-hash
    UnrecognizedFormat,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "source is empty"),
            Self::MissingInfoHash => write!(f, "magnet link has no info-hash parameter"),
            Self::InvalidInfoHash => write!(f, "source info-hash is malformed"),
            Self::UnrecognizedFormat => write!(f, "source is neither a magnet link nor an info-hash"),
        }
    }
}

/// A validated source locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSource {
    pub info_hash: InfoHash,
    /// Display name from the `dn=` parameter, when present
    pub display_name: Option<String>,
    /// The locator exactly as received
    pub raw: String,
}

/// Validate a source locator and extract its identity
///
/// # Errors
///
/// Returns a `SourceError` variant describing the validation failure.
pub fn parse_source(source: &str) -> Result<TransferSource, SourceError> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(SourceError::Empty);
    }

    if let Some(query) = trimmed.strip_prefix(MAGNET_SCHEME) {
        let mut info_hash = None;
        let mut display_name = None;

        for param in query.split('&') {
            if let Some(value) = param.strip_prefix("xt=urn:btih:") {
                if value.len() != INFO_HASH_HEX_LENGTH {
                    return Err(SourceError::InvalidInfoHash);
                }
                info_hash =
                    Some(InfoHash::parse(value).map_err(|_| SourceError::InvalidInfoHash)?);
            } else if let Some(value) = param.strip_prefix("dn=") {
                if !value.is_empty() {
                    display_name = Some(value.replace('+', " "));
                }
            }
        }

        let info_hash = info_hash.ok_or(SourceError::MissingInfoHash)?;
        return Ok(TransferSource {
            info_hash,
            display_name,
            raw: trimmed.to_string(),
        });
    }

    // Bare info-hash form
    if trimmed.len() == INFO_HASH_HEX_LENGTH {
        let info_hash = InfoHash::parse(trimmed).map_err(|_| SourceError::InvalidInfoHash)?;
        return Ok(TransferSource {
            info_hash,
            display_name: None,
            raw: trimmed.to_string(),
        });
    }

    Err(SourceError::UnrecognizedFormat)
}
