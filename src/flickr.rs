//! Flickr REST API client.
//!
//! Implements [`PhotoLookup`] over two Flickr endpoints:
//! `flickr.photos.getInfo` (title) and `flickr.photos.getSizes` (available
//! renditions). Both are fetched concurrently per photo.
//!
//! Flickr quirks handled here so the rest of the crate never sees them:
//!
//! - Failures come back as HTTP 200 with a `{"stat": "fail", code, message}`
//!   envelope rather than an error status.
//! - Size widths are serialized as numbers for some renditions and strings
//!   for others.
//! - `getSizes` lists video renditions for video uploads; only `media ==
//!   "photo"` entries become image sources.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::photo::{LookupError, Photo, PhotoLookup, PhotoSource};

const FLICKR_REST_BASE: &str = "https://api.flickr.com/services/rest";

/// Width of Flickr's `Large` rendition, the preferred default display image.
const MAIN_SOURCE_MAX_WIDTH: u32 = 1024;

/// Flickr REST API photo lookup client.
pub struct FlickrClient {
    client: reqwest::Client,
    base_url: String,
}

impl FlickrClient {
    /// Creates a client against the public Flickr REST endpoint.
    pub fn new() -> Result<Self, LookupError> {
        Self::with_base_url(FLICKR_REST_BASE)
    }

    /// Creates a client with a custom endpoint, for tests.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| LookupError::network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        api_key: &str,
        photo_id: &str,
    ) -> Result<T, LookupError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("method", method),
                ("api_key", api_key),
                ("photo_id", photo_id),
                ("format", "json"),
                ("nojsoncallback", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, method, photo_id, "Flickr API request failed");
                if e.is_timeout() {
                    LookupError::network("request timed out")
                } else if e.is_connect() {
                    LookupError::network("failed to connect to Flickr")
                } else {
                    LookupError::network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::network(format!(
                "Flickr API returned {status}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| LookupError::malformed(e.to_string()))
    }

    async fn fetch_title(&self, api_key: &str, photo_id: &str) -> Result<String, LookupError> {
        let body: InfoResponse = self
            .call("flickr.photos.getInfo", api_key, photo_id)
            .await?;
        let photo = body.envelope.into_payload(body.photo)?;
        Ok(photo.title.content)
    }

    async fn fetch_sources(
        &self,
        api_key: &str,
        photo_id: &str,
    ) -> Result<Vec<PhotoSource>, LookupError> {
        let body: SizesResponse = self
            .call("flickr.photos.getSizes", api_key, photo_id)
            .await?;
        let sizes = body.envelope.into_payload(body.sizes)?;
        Ok(image_sources(sizes.size))
    }
}

#[async_trait]
impl PhotoLookup for FlickrClient {
    async fn get_photo(&self, api_key: &str, photo_id: &str) -> Result<Photo, LookupError> {
        debug!(photo_id, "Resolving photo against Flickr");

        let (title, sources) = tokio::try_join!(
            self.fetch_title(api_key, photo_id),
            self.fetch_sources(api_key, photo_id),
        )?;

        let main_source = pick_main_source(&sources).ok_or_else(|| {
            LookupError::malformed(format!("photo {photo_id} has no image sources"))
        })?;

        debug!(photo_id, sources = sources.len(), "Photo resolved");

        Ok(Photo {
            title,
            main_source,
            sources,
        })
    }
}

/// Keep photo renditions only, in Flickr's returned (ascending) order.
fn image_sources(sizes: Vec<SizeEntry>) -> Vec<PhotoSource> {
    sizes
        .into_iter()
        .filter(|s| s.media == "photo")
        .map(|s| PhotoSource {
            url: s.source,
            width: s.width,
        })
        .collect()
}

/// The widest source at or below the `Large` bucket, else the widest overall.
///
/// Keeps the default `src` at a sane display size while `srcset` still
/// offers the full-resolution originals.
fn pick_main_source(sources: &[PhotoSource]) -> Option<PhotoSource> {
    sources
        .iter()
        .filter(|s| s.width <= MAIN_SOURCE_MAX_WIDTH)
        .max_by_key(|s| s.width)
        .or_else(|| sources.iter().max_by_key(|s| s.width))
        .cloned()
}

// -----------------------------------------------------------------------------
// Wire DTOs
// -----------------------------------------------------------------------------

/// Common `stat`/`code`/`message` fields of every Flickr response.
#[derive(Debug, Deserialize)]
struct Envelope {
    stat: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    message: Option<String>,
}

impl Envelope {
    /// Unwraps the payload of a response, mapping `stat: "fail"` envelopes
    /// and payload-less `ok` responses to errors.
    fn into_payload<T>(self, payload: Option<T>) -> Result<T, LookupError> {
        if self.stat != "ok" {
            return Err(LookupError::api(
                self.code,
                self.message.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        payload.ok_or_else(|| LookupError::malformed("response body missing payload"))
    }
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(flatten)]
    envelope: Envelope,
    photo: Option<InfoPhoto>,
}

#[derive(Debug, Deserialize)]
struct InfoPhoto {
    title: TextContent,
}

/// Flickr wraps text values as `{"_content": "..."}`.
#[derive(Debug, Deserialize)]
struct TextContent {
    #[serde(rename = "_content")]
    content: String,
}

#[derive(Debug, Deserialize)]
struct SizesResponse {
    #[serde(flatten)]
    envelope: Envelope,
    sizes: Option<SizesPayload>,
}

#[derive(Debug, Deserialize)]
struct SizesPayload {
    size: Vec<SizeEntry>,
}

#[derive(Debug, Deserialize)]
struct SizeEntry {
    #[serde(deserialize_with = "width_from_number_or_string")]
    width: u32,
    source: String,
    #[serde(default = "default_media")]
    media: String,
}

fn default_media() -> String {
    "photo".to_string()
}

/// Flickr serializes widths as `75` for some renditions and `"800"` for
/// others. Accept both.
fn width_from_number_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        String(String),
    }

    match NumberOrString::deserialize(d)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
