//! # Flickr Embed
//!
//! A transform step for static-site content pipelines: scans a parsed
//! markdown document tree for image links using the `flickr://` scheme,
//! resolves each referenced photo against the Flickr API, and rewrites the
//! node in place into responsive `<img>` markup (`src`, `srcset`, optional
//! `sizes`).
//!
//! ```text
//! ![A sunset](flickr://54423178321)
//!     ↓
//! <img src="…_b.jpg" srcset="…_m.jpg 240w, …_z.jpg 640w, …" alt="A sunset">
//! ```
//!
//! The surrounding pipeline owns parsing, rendering, and configuration; this
//! crate only walks the tree it is handed and mutates matched nodes.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`node`] | Document tree model — tagged node variants and pre-order traversal |
//! | [`photo`] | Photo metadata types, the [`PhotoLookup`] port, lookup errors |
//! | [`flickr`] | `reqwest`-backed [`PhotoLookup`] against the Flickr REST API |
//! | [`rewrite`] | The rewriter — collect matches, concurrent lookups, in-place node replacement |
//!
//! # Design Decisions
//!
//! ## Variants Over Records
//!
//! Markdown AST tooling tends to model nodes as one record with a `type`
//! string and many optional fields. Here nodes are a sum type ([`Node`]), and
//! rewriting is a variant transition: a matched `Image` value is replaced by
//! an `Html` value. Stale attributes cannot survive a rewrite because the
//! variant that held them is gone.
//!
//! ## Maud For Markup
//!
//! The emitted `<img>` tag is built with [Maud](https://maud.lambda.xyz/),
//! so every attribute value — photo titles coming back from the API and the
//! caller-supplied `sizes` string alike — is escaped for attribute context.
//! There is no unescaped path.
//!
//! ## Explicit Credential
//!
//! The rewriter takes an `Option<ApiKey>` at construction instead of probing
//! the environment. A missing key is a feature gate, not an error: the
//! rewrite silently no-ops so credential-less builds keep working.
//! [`ApiKey::from_env`] covers pipelines using the conventional
//! `FLICKR_API_KEY` variable.
//!
//! ## All Lookups Run, First Failure Reported
//!
//! Lookups fan out concurrently, one per matched node, and all of them run
//! to completion — a failing sibling cancels nothing. Nodes whose lookup
//! succeeded are rewritten even when the overall call fails; the first
//! pre-order failure is what the caller sees. See [`rewrite`] for the full
//! failure semantics.
//!
//! # Example
//!
//! ```no_run
//! use flickr_embed::{ApiKey, FlickrClient, ImageRewriter, Node, RewriteOptions};
//!
//! # async fn run(mut tree: Node) -> Result<(), Box<dyn std::error::Error>> {
//! let rewriter = ImageRewriter::new(FlickrClient::new()?, ApiKey::from_env());
//! let options = RewriteOptions {
//!     sizes: Some("(max-width: 600px) 480px".to_string()),
//! };
//! rewriter.rewrite(&mut tree, &options).await?;
//! # Ok(())
//! # }
//! ```

pub mod flickr;
pub mod node;
pub mod photo;
pub mod rewrite;

pub use flickr::FlickrClient;
pub use node::{HtmlNode, ImageNode, Node, ParentNode, TextNode};
pub use photo::{LookupError, Photo, PhotoLookup, PhotoSource};
pub use rewrite::{ApiKey, FLICKR_SCHEME, ImageRewriter, RewriteError, RewriteOptions};
