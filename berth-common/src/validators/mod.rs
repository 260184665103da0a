//! Input validation functions
//!
//! Reusable validators shared between the daemon and clients. Clients can
//! use them for pre-validation, the daemon uses them for enforcement.

mod source;

pub use source::{MAGNET_SCHEME, SourceError, TransferSource, parse_source};
