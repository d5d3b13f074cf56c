use std::sync::mpsc::Receiver;

use url::Url;

use super::lexer::{Token, TokenType};
use super::node::{LinkNode, ListNode, Node, TextNode};
use crate::error::{GeminiClientError, Result};

/// Recursive-descent reader over a token stream, with one token of
/// lookahead.
pub struct Parser {
    rx: Receiver<Token>,
    peeked: Option<Token>,
}

impl Parser {
    pub fn new(rx: Receiver<Token>) -> Self {
        Self { rx, peeked: None }
    }

    fn next(&mut self) -> Token {
        match self.peeked.take() {
            Some(t) => t,
            None => self.rx.recv().unwrap_or(Token {
                typ: TokenType::Eof,
                pos: 0,
                val: String::new(),
                line: 0,
            }),
        }
    }

    fn peek(&mut self) -> &Token {
        if self.peeked.is_none() {
            self.peeked = Some(self.next());
        }
        self.peeked.as_ref().expect("just populated")
    }

    /// Parses the full token stream into a `ListNode` root.
    pub fn parse(mut self) -> Result<ListNode> {
        let pos = self.peek().pos;
        let mut root = ListNode::new(pos);

        while self.peek().typ != TokenType::Eof {
            if self.peek().typ == TokenType::Error {
                let err = self.next();
                return Err(GeminiClientError::Parse(err.val));
            }
            let node = self.text_or_link()?;
            root.append(node);
        }
        Ok(root)
    }

    fn text_or_link(&mut self) -> Result<Node> {
        let token = self.next();
        match token.typ {
            TokenType::Text => Ok(Node::Text(TextNode {
                pos: token.pos,
                text: token.val,
            })),
            TokenType::Link => self.link(token),
            // Reserved prefixes are never emitted distinctly by the lexer
            // today; routed here as plain text to match its current
            // behavior for non-link lines.
            TokenType::Heading | TokenType::List | TokenType::Block | TokenType::Prefmt | TokenType::Nil => {
                Ok(Node::Text(TextNode {
                    pos: token.pos,
                    text: token.val,
                }))
            }
            other => Err(GeminiClientError::Parse(format!(
                "unexpected {other:?} in input at byte {}",
                token.pos
            ))),
        }
    }

    fn link(&mut self, token: Token) -> Result<Node> {
        let url_token = self.next();
        if url_token.typ != TokenType::LinkUrl {
            return Err(GeminiClientError::Parse(format!(
                "problem with link input at byte {}",
                token.pos
            )));
        }

        let url = Url::parse(&url_token.val)
            .map_err(|e| GeminiClientError::Parse(format!("problem with link URL {:?}: {e}", url_token.val)))?;

        let mut friendly = String::new();
        if self.peek().typ == TokenType::LinkDesc {
            friendly = self.next().val;
        }

        Ok(Node::Link(LinkNode {
            pos: token.pos,
            url,
            friendly,
            text: token.val,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::lex;
    use super::*;

    #[test]
    fn parses_link_without_description() {
        let root = Parser::new(lex("=> gemini://x/\n".to_string())).parse().unwrap();
        assert_eq!(root.nodes.len(), 1);
        match &root.nodes[0] {
            Node::Link(l) => {
                assert_eq!(l.url.as_str(), "gemini://x/");
                assert_eq!(l.friendly, "");
            }
            other => panic!("expected link node, got {other:?}"),
        }
    }

    #[test]
    fn parses_text_then_link() {
        let root = Parser::new(lex("hello\n=> gemini://x/ world\n".to_string()))
            .parse()
            .unwrap();
        assert_eq!(root.nodes.len(), 2);
        assert!(matches!(root.nodes[0], Node::Text(_)));
        assert!(matches!(root.nodes[1], Node::Link(_)));
    }

    #[test]
    fn unterminated_link_line_is_parse_error() {
        let err = Parser::new(lex("=> gemini://x/".to_string())).parse().unwrap_err();
        assert!(matches!(err, GeminiClientError::Parse(_)));
    }

    #[test]
    fn empty_document_parses_to_empty_root() {
        let root = Parser::new(lex(String::new())).parse().unwrap();
        assert!(root.nodes.is_empty());
    }

    #[test]
    fn round_trip_text_and_link_is_semantically_equivalent() {
        let input = "hello\n=> gemini://x/ world\n";
        let root = Parser::new(lex(input.to_string())).parse().unwrap();
        assert_eq!(root.to_string(), "hellogemini://x/ world");
    }
}
