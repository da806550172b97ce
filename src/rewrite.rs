//! The image link rewriter.
//!
//! Scans a document tree for image nodes whose URL uses the `flickr://`
//! scheme, resolves each referenced photo through a [`PhotoLookup`], and
//! replaces the node with an inline `<img>` carrying responsive attributes.
//!
//! ## Flow
//!
//! 1. **Gate**: without an API key the rewrite is a silent no-op. Sites
//!    without Flickr content build without credentials; this is a feature
//!    gate, not an error.
//! 2. **Collect**: one synchronous pre-order walk gathers the photo id of
//!    every matched node (the URL remainder after the scheme prefix, taken
//!    as-is — malformed ids surface later as lookup failures).
//! 3. **Resolve**: all lookups are issued together and driven concurrently,
//!    in collection order. There is no batching, retry, or cancellation:
//!    every lookup runs to completion even when a sibling fails.
//! 4. **Rewrite**: a second pre-order walk pairs each matched node with its
//!    result. Successes become [`Node::Html`]; failures leave the node
//!    untouched and fail the overall call once all successes are applied.
//!
//! ## Failure semantics
//!
//! Per-node mutation is independent: when some lookups fail, the nodes whose
//! lookups succeeded are still rewritten, and the call returns the first
//! (pre-order) failure. The caller decides whether a failed rewrite fails
//! the document build; the partially-rewritten tree it holds is valid markup
//! either way.
//!
//! All attribute values — including the configured `sizes` string and photo
//! titles coming back from the API — go through Maud's attribute escaping.

use futures_util::future::join_all;
use maud::html;
use thiserror::Error;
use tracing::{debug, warn};

use crate::node::{HtmlNode, Node};
use crate::photo::{LookupError, Photo, PhotoLookup, PhotoSource};

/// URL scheme marking an image node as a hosted Flickr photo.
pub const FLICKR_SCHEME: &str = "flickr://";

/// Flickr API credential.
///
/// The rewriter takes an explicit `Option<ApiKey>` instead of probing the
/// environment itself; [`ApiKey::from_env`] exists for pipelines that keep
/// the conventional `FLICKR_API_KEY` contract.
#[derive(Debug, Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Reads `FLICKR_API_KEY`. Unset or empty means no credential.
    pub fn from_env() -> Option<Self> {
        std::env::var("FLICKR_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Per-call rewrite options.
#[derive(Debug, Clone, Default)]
pub struct RewriteOptions {
    /// Emitted verbatim (escaped) as the `sizes` attribute when present.
    pub sizes: Option<String>,
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("photo lookup failed for {id}: {source}")]
    Lookup {
        id: String,
        #[source]
        source: LookupError,
    },
}

/// Rewrites `flickr://` image nodes into responsive `<img>` markup.
pub struct ImageRewriter<L> {
    lookup: L,
    api_key: Option<ApiKey>,
}

impl<L: PhotoLookup> ImageRewriter<L> {
    pub fn new(lookup: L, api_key: Option<ApiKey>) -> Self {
        Self { lookup, api_key }
    }

    /// Rewrites every matched node in `root` in place.
    ///
    /// Without a configured key this returns `Ok(())` immediately and
    /// performs zero lookups. On lookup failure the first (pre-order)
    /// error is returned after every successful rewrite has been applied.
    pub async fn rewrite(
        &self,
        root: &mut Node,
        options: &RewriteOptions,
    ) -> Result<(), RewriteError> {
        let Some(key) = &self.api_key else {
            debug!("no Flickr API key configured, skipping image rewrite");
            return Ok(());
        };

        let ids = collect_photo_ids(root);
        if ids.is_empty() {
            return Ok(());
        }
        debug!(photos = ids.len(), "resolving flickr image links");

        let lookups = ids.iter().map(|id| self.lookup.get_photo(key.as_str(), id));
        let results = join_all(lookups).await;

        // Results pair with matched nodes positionally: the tree was not
        // reshaped between the collect walk and this one.
        let mut remaining = ids.into_iter().zip(results);
        let mut failure: Option<RewriteError> = None;
        root.walk_mut(&mut |node| {
            if let Node::Image(image) = node
                && image.url.starts_with(FLICKR_SCHEME)
            {
                let Some((id, result)) = remaining.next() else {
                    return;
                };
                match result {
                    Ok(photo) => {
                        let value = render_image(&photo, image.alt.as_deref(), options);
                        *node = Node::Html(HtmlNode { value });
                    }
                    Err(source) => {
                        warn!(photo_id = %id, error = %source, "photo lookup failed, node left in place");
                        if failure.is_none() {
                            failure = Some(RewriteError::Lookup { id, source });
                        }
                    }
                }
            }
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Photo ids of all matched nodes, in pre-order.
fn collect_photo_ids(root: &Node) -> Vec<String> {
    let mut ids = Vec::new();
    root.walk(&mut |node| {
        if let Node::Image(image) = node
            && let Some(id) = image.url.strip_prefix(FLICKR_SCHEME)
        {
            ids.push(id.to_string());
        }
    });
    ids
}

/// Renders the `<img>` markup for one resolved photo.
///
/// The node's own alt text wins when non-empty; otherwise the photo title
/// stands in. Maud escapes every attribute value.
fn render_image(photo: &Photo, alt: Option<&str>, options: &RewriteOptions) -> String {
    let alt = match alt {
        Some(alt) if !alt.is_empty() => alt,
        _ => photo.title.as_str(),
    };
    html! {
        img src=(photo.main_source.url)
            srcset=(srcset_value(&photo.sources))
            alt=(alt)
            sizes=[options.sizes.as_deref()];
    }
    .into_string()
}

/// `"<url> <width>w"` per source, joined with `", "`, in source order.
fn srcset_value(sources: &[PhotoSource]) -> String {
    sources
        .iter()
        .map(|s| format!("{} {}w", s.url, s.width))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory lookup recording the order of calls.
    struct FakeLookup {
        photos: HashMap<String, Photo>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeLookup {
        fn new() -> Self {
            Self {
                photos: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_photo(mut self, id: &str, photo: Photo) -> Self {
            self.photos.insert(id.to_string(), photo);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PhotoLookup for FakeLookup {
        async fn get_photo(&self, _api_key: &str, photo_id: &str) -> Result<Photo, LookupError> {
            self.calls.lock().unwrap().push(photo_id.to_string());
            self.photos
                .get(photo_id)
                .cloned()
                .ok_or_else(|| LookupError::api(1, "Photo not found"))
        }
    }

    fn sunset() -> Photo {
        Photo {
            title: "Sunset".to_string(),
            main_source: PhotoSource {
                url: "https://img/a.jpg".to_string(),
                width: 800,
            },
            sources: vec![
                PhotoSource {
                    url: "https://img/a.jpg".to_string(),
                    width: 800,
                },
                PhotoSource {
                    url: "https://img/b.jpg".to_string(),
                    width: 400,
                },
            ],
        }
    }

    fn key() -> Option<ApiKey> {
        Some(ApiKey::new("test-key"))
    }

    fn markup_of(node: &Node) -> &str {
        match node {
            Node::Html(html) => &html.value,
            other => panic!("expected Html node, got {other:?}"),
        }
    }

    // =========================================================================
    // Gate and no-match tests
    // =========================================================================

    #[tokio::test]
    async fn missing_key_performs_no_lookups() {
        let lookup = FakeLookup::new();
        let mut tree = Node::parent("root", vec![Node::image("flickr://123")]);
        let original = tree.clone();

        let rewriter = ImageRewriter::new(lookup, None);
        rewriter
            .rewrite(&mut tree, &RewriteOptions::default())
            .await
            .unwrap();

        assert_eq!(tree, original);
        assert!(rewriter.lookup.calls().is_empty());
    }

    #[tokio::test]
    async fn tree_without_matches_is_untouched() {
        let lookup = FakeLookup::new();
        let mut tree = Node::parent(
            "root",
            vec![
                Node::image("https://example.com/photo.jpg"),
                Node::text("flickr://123"),
                Node::html("<img src=\"flickr://123\">"),
            ],
        );
        let original = tree.clone();

        let rewriter = ImageRewriter::new(lookup, key());
        rewriter
            .rewrite(&mut tree, &RewriteOptions::default())
            .await
            .unwrap();

        assert_eq!(tree, original);
        assert!(rewriter.lookup.calls().is_empty());
    }

    // =========================================================================
    // Rewrite tests
    // =========================================================================

    #[tokio::test]
    async fn rewrites_matched_node_with_responsive_attributes() {
        let lookup = FakeLookup::new().with_photo("123", sunset());
        let mut tree = Node::parent("root", vec![Node::image("flickr://123")]);

        let rewriter = ImageRewriter::new(lookup, key());
        rewriter
            .rewrite(&mut tree, &RewriteOptions::default())
            .await
            .unwrap();

        let markup = markup_of(&tree.children()[0]);
        assert!(markup.contains(r#"src="https://img/a.jpg""#));
        assert!(markup.contains(r#"srcset="https://img/a.jpg 800w, https://img/b.jpg 400w""#));
        assert!(markup.contains(r#"alt="Sunset""#));
        assert!(!markup.contains("sizes"));
    }

    #[tokio::test]
    async fn original_alt_wins_over_title() {
        let lookup = FakeLookup::new().with_photo("123", sunset());
        let mut tree = Node::parent("root", vec![Node::image_with_alt("flickr://123", "Custom")]);

        let rewriter = ImageRewriter::new(lookup, key());
        rewriter
            .rewrite(&mut tree, &RewriteOptions::default())
            .await
            .unwrap();

        let markup = markup_of(&tree.children()[0]);
        assert!(markup.contains(r#"alt="Custom""#));
        assert!(!markup.contains("Sunset"));
    }

    #[tokio::test]
    async fn empty_alt_falls_back_to_title() {
        let lookup = FakeLookup::new().with_photo("123", sunset());
        let mut tree = Node::parent("root", vec![Node::image_with_alt("flickr://123", "")]);

        let rewriter = ImageRewriter::new(lookup, key());
        rewriter
            .rewrite(&mut tree, &RewriteOptions::default())
            .await
            .unwrap();

        assert!(markup_of(&tree.children()[0]).contains(r#"alt="Sunset""#));
    }

    #[tokio::test]
    async fn sizes_option_emitted_verbatim() {
        let lookup = FakeLookup::new().with_photo("123", sunset());
        let mut tree = Node::parent("root", vec![Node::image("flickr://123")]);

        let rewriter = ImageRewriter::new(lookup, key());
        let options = RewriteOptions {
            sizes: Some("(max-width: 600px) 480px".to_string()),
        };
        rewriter.rewrite(&mut tree, &options).await.unwrap();

        assert!(markup_of(&tree.children()[0]).contains(r#"sizes="(max-width: 600px) 480px""#));
    }

    #[tokio::test]
    async fn attribute_values_are_escaped() {
        let mut photo = sunset();
        photo.title = r#"Tom & "Jerry""#.to_string();
        let lookup = FakeLookup::new().with_photo("123", photo);
        let mut tree = Node::parent("root", vec![Node::image("flickr://123")]);

        let rewriter = ImageRewriter::new(lookup, key());
        rewriter
            .rewrite(&mut tree, &RewriteOptions::default())
            .await
            .unwrap();

        let markup = markup_of(&tree.children()[0]);
        assert!(markup.contains(r#"alt="Tom &amp; &quot;Jerry&quot;""#));
    }

    #[tokio::test]
    async fn rewrites_root_level_match() {
        let lookup = FakeLookup::new().with_photo("123", sunset());
        let mut tree = Node::image("flickr://123");

        let rewriter = ImageRewriter::new(lookup, key());
        rewriter
            .rewrite(&mut tree, &RewriteOptions::default())
            .await
            .unwrap();

        assert!(matches!(tree, Node::Html(_)));
    }

    // =========================================================================
    // Failure semantics
    // =========================================================================

    #[tokio::test]
    async fn failed_lookup_fails_call_but_keeps_successful_mutations() {
        let lookup = FakeLookup::new().with_photo("good", sunset());
        let mut tree = Node::parent(
            "root",
            vec![Node::image("flickr://good"), Node::image("flickr://bad")],
        );

        let rewriter = ImageRewriter::new(lookup, key());
        let err = rewriter
            .rewrite(&mut tree, &RewriteOptions::default())
            .await
            .unwrap_err();

        let RewriteError::Lookup { id, .. } = err;
        assert_eq!(id, "bad");

        // The succeeded node is rewritten; the failed one keeps its link.
        assert!(matches!(tree.children()[0], Node::Html(_)));
        assert_eq!(tree.children()[1], Node::image("flickr://bad"));
    }

    #[tokio::test]
    async fn first_preorder_failure_is_reported() {
        let lookup = FakeLookup::new();
        let mut tree = Node::parent(
            "root",
            vec![Node::image("flickr://first"), Node::image("flickr://second")],
        );

        let rewriter = ImageRewriter::new(lookup, key());
        let err = rewriter
            .rewrite(&mut tree, &RewriteOptions::default())
            .await
            .unwrap_err();

        let RewriteError::Lookup { id, .. } = err;
        assert_eq!(id, "first");
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    #[tokio::test]
    async fn lookups_initiated_in_preorder() {
        let lookup = FakeLookup::new()
            .with_photo("1", sunset())
            .with_photo("2", sunset())
            .with_photo("3", sunset());
        let mut tree = Node::parent(
            "root",
            vec![
                Node::parent(
                    "paragraph",
                    vec![Node::text("intro"), Node::image("flickr://1")],
                ),
                Node::image("flickr://2"),
                Node::parent("paragraph", vec![Node::image("flickr://3")]),
            ],
        );

        let rewriter = ImageRewriter::new(lookup, key());
        rewriter
            .rewrite(&mut tree, &RewriteOptions::default())
            .await
            .unwrap();

        assert_eq!(rewriter.lookup.calls(), vec!["1", "2", "3"]);
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn srcset_joins_sources_in_order() {
        let sources = vec![
            PhotoSource {
                url: "https://img/a.jpg".to_string(),
                width: 800,
            },
            PhotoSource {
                url: "https://img/b.jpg".to_string(),
                width: 400,
            },
        ];
        assert_eq!(
            srcset_value(&sources),
            "https://img/a.jpg 800w, https://img/b.jpg 400w"
        );
    }

    #[test]
    fn srcset_empty_for_no_sources() {
        assert_eq!(srcset_value(&[]), "");
    }

    #[test]
    fn api_key_from_env_ignores_empty() {
        // Only this test touches FLICKR_API_KEY.
        unsafe { std::env::set_var("FLICKR_API_KEY", "") };
        assert!(ApiKey::from_env().is_none());
        unsafe { std::env::set_var("FLICKR_API_KEY", "k") };
        assert_eq!(ApiKey::from_env().unwrap().as_str(), "k");
        unsafe { std::env::remove_var("FLICKR_API_KEY") };
    }
}
