use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

const LINK_PREFIX: &str = "=>";

/// Lexical class of a [`Token`]. The keyword set mirrors the full reserved
/// prefix table (`=>`, `#`, `*`, `>`, `` ``` ``, `nil`); only `Link` is
/// currently produced distinctly; the rest are reserved for a future
/// lexer state that tokenizes them individually (§4.6/§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Error,
    Char,
    Eof,
    Space,
    Text,
    LinkUrl,
    LinkDesc,
    Link,
    Heading,
    List,
    Block,
    Prefmt,
    Nil,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub typ: TokenType,
    pub pos: usize,
    pub val: String,
    pub line: usize,
}

struct Lexer {
    input: String,
    pos: usize,
    start: usize,
    width: usize,
    line: usize,
    start_line: usize,
}

impl Lexer {
    fn new(input: String) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
            width: 0,
            line: 1,
            start_line: 1,
        }
    }

    fn next(&mut self) -> Option<char> {
        if self.pos >= self.input.len() {
            self.width = 0;
            return None;
        }
        let ch = self.input[self.pos..].chars().next().expect("pos is a char boundary");
        self.width = ch.len_utf8();
        self.pos += self.width;
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn backup(&mut self) {
        self.pos -= self.width;
        if self.width == 1 && self.input.as_bytes()[self.pos] == b'\n' {
            self.line -= 1;
        }
    }

    fn emit(&mut self, typ: TokenType, tx: &SyncSender<Token>) {
        let _ = tx.send(Token {
            typ,
            pos: self.start,
            val: self.input[self.start..self.pos].to_string(),
            line: self.start_line,
        });
        self.start = self.pos;
        self.start_line = self.line;
    }

    fn ignore(&mut self) {
        self.line += self.input[self.start..self.pos].matches('\n').count();
        self.start = self.pos;
        self.start_line = self.line;
    }

    fn accept(&mut self, valid: &str) -> bool {
        match self.next() {
            Some(c) if valid.contains(c) => true,
            Some(_) => {
                self.backup();
                false
            }
            None => false,
        }
    }

    fn accept_run(&mut self, valid: &str) {
        while let Some(c) = self.next() {
            if !valid.contains(c) {
                self.backup();
                break;
            }
        }
    }

    fn errorf(&mut self, message: String, tx: &SyncSender<Token>) {
        let _ = tx.send(Token {
            typ: TokenType::Error,
            pos: self.start,
            val: message,
            line: self.start_line,
        });
    }
}

enum State {
    Plain,
    LeftLink,
    LinkUrl,
}

fn lex_plain(l: &mut Lexer, tx: &SyncSender<Token>) -> Option<State> {
    l.width = 0;
    let rest = &l.input[l.pos..];
    let lf = rest.find('\n');
    let row = &rest[..lf.unwrap_or(rest.len())];

    // A link line gets the same treatment whether or not it's the final,
    // unterminated line of input: lex_link_url is what decides whether a
    // missing trailing newline is an error.
    if row.starts_with(LINK_PREFIX) {
        return Some(State::LeftLink);
    }

    let Some(lf) = lf else {
        l.pos = l.input.len();
        if l.pos > l.start {
            l.emit(TokenType::Text, tx);
        }
        l.emit(TokenType::Eof, tx);
        return None;
    };

    l.pos += lf;
    l.emit(TokenType::Text, tx);
    l.accept("\n");
    l.ignore();
    Some(State::Plain)
}

fn lex_left_link(l: &mut Lexer, tx: &SyncSender<Token>) -> Option<State> {
    l.pos += LINK_PREFIX.len();
    l.emit(TokenType::Link, tx);
    Some(State::LinkUrl)
}

fn lex_link_url(l: &mut Lexer, tx: &SyncSender<Token>) -> Option<State> {
    l.accept_run(" \t");
    l.ignore();

    let Some(lf) = l.input[l.pos..].find('\n') else {
        let line = l.line;
        l.errorf(format!("Line {line} does not end in newline."), tx);
        return None;
    };

    let remain = &l.input[l.pos..l.pos + lf];
    let Some(spc) = remain.find([' ', '\t']) else {
        l.pos += lf;
        l.emit(TokenType::LinkUrl, tx);
        l.accept("\n");
        l.ignore();
        return Some(State::Plain);
    };

    l.pos += spc;
    l.emit(TokenType::LinkUrl, tx);

    l.accept_run(" \t");
    l.ignore();

    if let Some(lf2) = l.input[l.pos..].find('\n') {
        if lf2 > 0 {
            l.pos += lf2;
            l.emit(TokenType::LinkDesc, tx);
        }
    }
    l.accept("\n");
    l.ignore();

    Some(State::Plain)
}

/// Spawns the lexer on a dedicated thread and returns the receiving end of
/// its token stream. Tokens are delivered over a rendezvous channel, so the
/// lexer thread blocks until the parser consumes each one.
pub fn lex(input: String) -> Receiver<Token> {
    let (tx, rx) = mpsc::sync_channel(0);
    thread::spawn(move || {
        let mut lexer = Lexer::new(input);
        let mut state = Some(State::Plain);
        while let Some(s) = state {
            state = match s {
                State::Plain => lex_plain(&mut lexer, &tx),
                State::LeftLink => lex_left_link(&mut lexer, &tx),
                State::LinkUrl => lex_link_url(&mut lexer, &tx),
            };
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str) -> Vec<Token> {
        lex(input.to_string()).iter().collect()
    }

    #[test]
    fn link_line_emits_expected_tokens() {
        let tokens = collect("=> gemini://x/ A name\n");
        let types: Vec<TokenType> = tokens.iter().map(|t| t.typ).collect();
        assert_eq!(
            types,
            vec![
                TokenType::Link,
                TokenType::LinkUrl,
                TokenType::LinkDesc,
                TokenType::Eof,
            ]
        );
        assert_eq!(tokens[1].val, "gemini://x/");
        assert_eq!(tokens[2].val, "A name");
    }

    #[test]
    fn link_line_without_description() {
        let tokens = collect("=> gemini://x/\n");
        let types: Vec<TokenType> = tokens.iter().map(|t| t.typ).collect();
        assert_eq!(types, vec![TokenType::Link, TokenType::LinkUrl, TokenType::Eof]);
    }

    #[test]
    fn link_line_missing_newline_is_error() {
        let tokens = collect("=> gemini://x/");
        assert_eq!(tokens.last().unwrap().typ, TokenType::Error);
    }

    #[test]
    fn plain_text_without_trailing_newline_still_flushes() {
        let tokens = collect("hello");
        let types: Vec<TokenType> = tokens.iter().map(|t| t.typ).collect();
        assert_eq!(types, vec![TokenType::Text, TokenType::Eof]);
        assert_eq!(tokens[0].val, "hello");
    }

    #[test]
    fn text_then_link_line_boundary() {
        let tokens = collect("hello\n=> g://x/ h\n");
        let types: Vec<TokenType> = tokens.iter().map(|t| t.typ).collect();
        assert_eq!(
            types,
            vec![
                TokenType::Text,
                TokenType::Link,
                TokenType::LinkUrl,
                TokenType::LinkDesc,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn consecutive_link_lines() {
        let tokens = collect("=> a/\n=> b/\n");
        let types: Vec<TokenType> = tokens.iter().map(|t| t.typ).collect();
        assert_eq!(
            types,
            vec![
                TokenType::Link,
                TokenType::LinkUrl,
                TokenType::Link,
                TokenType::LinkUrl,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn link_with_tab_separator() {
        let tokens = collect("=> gemini://x/\tname\n");
        assert_eq!(tokens[2].val, "name");
    }
}
