//! Error types for image construction.

use std::io;

/// Errors that can occur while building an image.
///
/// Every variant names the stream it concerns. The destination is never
/// usable after any of these, so the caller must discard it.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The source is larger than the format allows.
    #[error("{name} is too big: {excess} extra bytes (limit is {limit} bytes)")]
    Oversize {
        name: String,
        /// Bytes over the limit.
        excess: u64,
        limit: u64,
    },

    /// An underlying read, write or seek failed.
    #[error("{name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The source ran dry before the expected byte count was delivered.
    ///
    /// This is a size mismatch between the probe and the actual data, not an
    /// OS fault.
    #[error("{name}: premature end of file ({copied} of {expected} bytes read)")]
    PrematureEnd {
        name: String,
        expected: u64,
        copied: u64,
    },

    /// The position could not be restored after probing the stream length.
    #[error("{name}: cannot restore stream position: {source}")]
    PositionLost {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(name: &str, source: io::Error) -> Self {
        Self::Io {
            name: name.to_owned(),
            source,
        }
    }
}
