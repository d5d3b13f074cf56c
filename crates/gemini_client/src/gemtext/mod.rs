mod lexer;
mod node;
mod parser;

pub use lexer::{Token, TokenType, lex};
pub use node::{LinkNode, ListNode, Node, NodeType, TextNode};
pub use parser::Parser;

use crate::error::Result;

/// Lexes and parses a full Gemtext document into its node tree.
pub fn parse(input: String) -> Result<ListNode> {
    Parser::new(lex(input)).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_convenience_function_matches_manual_pipeline() {
        let root = parse("=> gemini://x/ A name\n".to_string()).unwrap();
        assert_eq!(root.nodes.len(), 1);
    }
}
