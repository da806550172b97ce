//! Document tree model.
//!
//! The rewriter operates on a markdown document tree produced by an upstream
//! parser. Rather than one loosely-typed record with a `type` string and a
//! pile of optional fields, nodes are a sum type: an `Image` link, a raw
//! `Html` fragment, a `Text` leaf, or a `Parent` container with ordered
//! children. Rewriting a node is a variant transition (an [`Node::Image`]
//! value is replaced by an [`Node::Html`] value at the same position), so
//! "cleared" attributes like `url` and `alt` simply cease to exist instead of
//! lingering as stale `Some`s.
//!
//! Ownership follows the tree: children are owned by their parent, and the
//! whole tree is exclusively owned by the caller for the duration of a
//! rewrite. Tree shape is never altered by this crate — only matched leaf
//! nodes change.
//!
//! Traversal is pre-order depth-first: a node is visited before its children,
//! and siblings in their stored order. This is the order in which photo
//! lookups are issued.

/// One markdown element.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An image link: `![alt](url)`.
    Image(ImageNode),
    /// A raw markup fragment passed through verbatim by the renderer.
    Html(HtmlNode),
    /// Any other leaf element (text, inline code, ...).
    Text(TextNode),
    /// Any container element (root, paragraph, heading, ...).
    Parent(ParentNode),
}

/// An image link node.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageNode {
    /// Link target. `flickr://<id>` URLs mark the node for rewriting.
    pub url: String,
    /// Alternative text; wins over the resolved photo title when non-empty.
    pub alt: Option<String>,
}

/// A raw markup node.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlNode {
    /// Markup emitted as-is by the downstream renderer.
    pub value: String,
}

/// A plain leaf node.
#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub value: String,
}

/// A container node with ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentNode {
    /// Element tag ("root", "paragraph", "heading", ...).
    pub tag: String,
    pub children: Vec<Node>,
}

impl Node {
    /// An image node without alt text.
    pub fn image(url: impl Into<String>) -> Self {
        Node::Image(ImageNode {
            url: url.into(),
            alt: None,
        })
    }

    /// An image node with alt text.
    pub fn image_with_alt(url: impl Into<String>, alt: impl Into<String>) -> Self {
        Node::Image(ImageNode {
            url: url.into(),
            alt: Some(alt.into()),
        })
    }

    /// A raw markup node.
    pub fn html(value: impl Into<String>) -> Self {
        Node::Html(HtmlNode {
            value: value.into(),
        })
    }

    /// A text leaf.
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(TextNode {
            value: value.into(),
        })
    }

    /// A container node.
    pub fn parent(tag: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Parent(ParentNode {
            tag: tag.into(),
            children,
        })
    }

    /// Child nodes, empty for leaf variants.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Parent(p) => &p.children,
            _ => &[],
        }
    }

    /// Visit this node and all descendants pre-order.
    pub fn walk(&self, f: &mut impl FnMut(&Node)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Visit this node and all descendants pre-order, with mutable access.
    ///
    /// The callback runs on a node before its children, so replacing a leaf
    /// variant in place is safe — there are no children left to visit under
    /// the old value.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Node)) {
        f(self);
        if let Node::Parent(p) = self {
            for child in &mut p.children {
                child.walk_mut(f);
            }
        }
    }
}
