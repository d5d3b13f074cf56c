use std::fmt;

use url::Url;

/// Discriminant for [`Node`], mirroring the tagged-variant shape the
/// dispatch engine keys its rewriter table on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Text,
    Link,
    List,
}

/// A parsed Gemtext element. Plain text and reserved-prefix lines both
/// surface as `Text` (see the parser module for why); links carry their
/// parsed target URL and optional friendly name; `List` is the tree root.
#[derive(Debug, Clone)]
pub enum Node {
    Text(TextNode),
    Link(LinkNode),
    List(ListNode),
}

impl Node {
    pub fn node_type(&self) -> NodeType {
        match self {
            Node::Text(_) => NodeType::Text,
            Node::Link(_) => NodeType::Link,
            Node::List(_) => NodeType::List,
        }
    }

    pub fn pos(&self) -> usize {
        match self {
            Node::Text(n) => n.pos,
            Node::Link(n) => n.pos,
            Node::List(n) => n.pos,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(n) => write!(f, "{n}"),
            Node::Link(n) => write!(f, "{n}"),
            Node::List(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextNode {
    pub pos: usize,
    pub text: String,
}

impl fmt::Display for TextNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[derive(Debug, Clone)]
pub struct LinkNode {
    pub pos: usize,
    pub url: Url,
    pub friendly: String,
    /// The original textual representation of the `=>` token, kept for
    /// callers that need the raw source span rather than the parsed URL.
    pub text: String,
}

impl fmt::Display for LinkNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.url, self.friendly)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListNode {
    pub pos: usize,
    pub nodes: Vec<Node>,
}

impl ListNode {
    pub fn new(pos: usize) -> Self {
        Self {
            pos,
            nodes: Vec::new(),
        }
    }

    pub fn append(&mut self, node: Node) {
        self.nodes.push(node);
    }
}

impl fmt::Display for ListNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for n in &self.nodes {
            write!(f, "{n}")?;
        }
        Ok(())
    }
}
