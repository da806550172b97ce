//! Photo metadata types and the lookup port.
//!
//! The rewriter never talks HTTP directly; it goes through the [`PhotoLookup`]
//! trait. [`crate::flickr::FlickrClient`] is the production implementation,
//! and tests substitute in-memory fakes. The trait takes the credential per
//! call rather than at construction so one client can serve rewriters holding
//! different keys.

use async_trait::async_trait;
use thiserror::Error;

/// One resolution variant of a photo.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoSource {
    pub url: String,
    /// Pixel width, as emitted into `srcset` width descriptors.
    pub width: u32,
}

/// Resolved metadata for one hosted photo.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub title: String,
    /// The variant designated as the default display image (`src`).
    pub main_source: PhotoSource,
    /// All available variants, in lookup-returned order. This order is
    /// preserved verbatim into `srcset`.
    pub sources: Vec<PhotoSource>,
}

/// Photo lookup failure.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("network error during photo lookup: {message}")]
    Network { message: String },
    #[error("photo API error {code}: {message}")]
    Api { code: u32, message: String },
    #[error("malformed photo API response: {message}")]
    Malformed { message: String },
}

impl LookupError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn api(code: u32, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

/// Port for resolving a photo identifier to its metadata.
#[async_trait]
pub trait PhotoLookup: Send + Sync {
    /// Resolves one photo. Unknown identifiers, bad credentials, and
    /// transport failures all surface as [`LookupError`] — callers treat
    /// them uniformly.
    async fn get_photo(&self, api_key: &str, photo_id: &str) -> Result<Photo, LookupError>;
}
