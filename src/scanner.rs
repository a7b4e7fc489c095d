use std::collections::HashMap;
use std::rc::Rc;

use unicode_segmentation::UnicodeSegmentation;

use crate::error::{GlitterError, Span};
use crate::token::{Literal, Token, TokenKind};

struct ScanPosition {
    start: usize,
    current: usize,
    line: usize,
    start_line: usize,
}

/// Lazy scanner over grapheme clusters. Iteration yields every token of the
/// source followed by exactly one `EndOfFile`; errors are collected on the
/// side and drained with [`Scanner::take_errors`] (or [`Scanner::scan`]).
pub struct Scanner {
    source_graphemes: Vec<String>,
    offsets: Vec<usize>,
    source_len: usize,
    path: Rc<str>,
    pos: ScanPosition,
    emit_whitespace: bool,
    prev_significant: Option<TokenKind>,
    errors: Vec<GlitterError>,
    finished: bool,
    keywords: HashMap<&'static str, TokenKind>,
}

impl Scanner {
    /// Scanner that silently skips whitespace and comments.
    pub fn new(source: &str, path: &str) -> Scanner {
        Scanner::build(source, path, false)
    }

    /// Scanner that reports each whitespace/comment run as one
    /// `Whitespace` token.
    pub fn with_whitespace(source: &str, path: &str) -> Scanner {
        Scanner::build(source, path, true)
    }

    fn build(source: &str, path: &str, emit_whitespace: bool) -> Scanner {
        let mut graphemes = Vec::new();
        let mut offsets = Vec::new();
        for (offset, grapheme) in source.grapheme_indices(true) {
            offsets.push(offset);
            graphemes.push(String::from(grapheme));
        }
        Scanner {
            source_graphemes: graphemes,
            offsets,
            source_len: source.len(),
            path: Rc::from(path),
            pos: ScanPosition {
                start: 0,
                current: 0,
                line: 1,
                start_line: 1,
            },
            emit_whitespace,
            prev_significant: None,
            errors: Vec::new(),
            finished: false,
            keywords: keyword_map(),
        }
    }

    /// Drive the scanner to completion, returning all tokens and all
    /// collected errors.
    pub fn scan(mut self) -> (Vec<Token>, Vec<GlitterError>) {
        let mut tokens = Vec::new();
        for token in self.by_ref() {
            tokens.push(token);
        }
        (tokens, self.errors)
    }

    pub fn take_errors(&mut self) -> Vec<GlitterError> {
        std::mem::take(&mut self.errors)
    }

    fn is_at_end(&self) -> bool {
        self.pos.current >= self.source_graphemes.len()
    }

    fn advance(&mut self) -> &str {
        let s = &self.source_graphemes[self.pos.current];
        self.pos.current += 1;
        s
    }

    fn advance_if_matched(&mut self, expected: &str) -> bool {
        if self.is_at_end() || self.source_graphemes[self.pos.current] != expected {
            false
        } else {
            self.pos.current += 1;
            true
        }
    }

    fn peek(&self) -> &str {
        if self.is_at_end() {
            "\0"
        } else {
            &self.source_graphemes[self.pos.current]
        }
    }

    fn peek_next(&self) -> &str {
        if self.pos.current + 1 >= self.source_graphemes.len() {
            "\0"
        } else {
            &self.source_graphemes[self.pos.current + 1]
        }
    }

    fn offset_at(&self, grapheme_index: usize) -> usize {
        if grapheme_index < self.offsets.len() {
            self.offsets[grapheme_index]
        } else {
            self.source_len
        }
    }

    fn make_token(&self, kind: TokenKind, literal: Literal) -> Token {
        let offset = self.offset_at(self.pos.start);
        let end = self.offset_at(self.pos.current);
        let lexeme = self.source_graphemes[self.pos.start..self.pos.current].join("");
        Token::new(
            kind,
            lexeme,
            literal,
            Rc::clone(&self.path),
            offset,
            end - offset,
            self.pos.start_line,
        )
    }

    fn span_at(&self, grapheme_index: usize, graphemes: usize, line: usize) -> Span {
        let offset = self.offset_at(grapheme_index);
        let end = self.offset_at(grapheme_index + graphemes);
        Span {
            offset,
            length: end - offset,
            line,
        }
    }

    fn at_trivia(&self) -> bool {
        match self.peek() {
            " " | "\t" | "\r" | "\n" | "\r\n" => true,
            "/" => matches!(self.peek_next(), "/" | "*"),
            _ => false,
        }
    }

    /// Consume a maximal run of whitespace and comments. Newlines bump the
    /// line counter; an unterminated block comment is reported at its
    /// opening `/*`.
    fn consume_trivia(&mut self) {
        loop {
            match self.peek() {
                " " | "\t" | "\r" => {
                    self.advance();
                }
                "\n" | "\r\n" => {
                    self.pos.line += 1;
                    self.advance();
                }
                "/" if self.peek_next() == "/" => {
                    while self.peek() != "\n" && self.peek() != "\r\n" && !self.is_at_end() {
                        self.advance();
                    }
                }
                "/" if self.peek_next() == "*" => self.block_comment(),
                _ => break,
            }
        }
    }

    fn block_comment(&mut self) {
        let open_index = self.pos.current;
        let open_line = self.pos.line;
        self.advance(); // "/"
        self.advance(); // "*"

        loop {
            if self.is_at_end() {
                self.errors.push(GlitterError::UnterminatedBlockComment {
                    path: Rc::clone(&self.path),
                    span: self.span_at(open_index, 2, open_line),
                });
                return;
            }
            match self.peek() {
                "\n" | "\r\n" => {
                    self.pos.line += 1;
                    self.advance();
                }
                "*" if self.peek_next() == "/" => {
                    self.advance();
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Scan one significant token. `None` means an error was recorded and
    /// scanning should continue at the current position.
    fn scan_token(&mut self) -> Option<Token> {
        let c = self.advance().to_string();
        let token = match c.as_str() {
            "(" => self.make_token(TokenKind::LeftParen, Literal::None),
            ")" => self.make_token(TokenKind::RightParen, Literal::None),
            "{" => self.make_token(TokenKind::LeftBrace, Literal::None),
            "}" => self.make_token(TokenKind::RightBrace, Literal::None),
            "," => self.make_token(TokenKind::Comma, Literal::None),
            "." => self.make_token(TokenKind::Dot, Literal::None),
            "+" => self.make_token(TokenKind::Plus, Literal::None),
            ";" => self.make_token(TokenKind::Semicolon, Literal::None),
            "*" => self.make_token(TokenKind::Star, Literal::None),
            "/" => self.make_token(TokenKind::Slash, Literal::None),
            "!" => {
                let kind = if self.advance_if_matched("=") {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.make_token(kind, Literal::None)
            }
            "=" => {
                let kind = if self.advance_if_matched("=") {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                };
                self.make_token(kind, Literal::None)
            }
            "<" => {
                let kind = if self.advance_if_matched("=") {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                };
                self.make_token(kind, Literal::None)
            }
            ">" => {
                let kind = if self.advance_if_matched("=") {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                };
                self.make_token(kind, Literal::None)
            }
            "-" => {
                if Self::is_digit(self.peek()) && !self.previous_ends_operand() {
                    self.number()
                } else {
                    self.make_token(TokenKind::Minus, Literal::None)
                }
            }
            "\"" => return self.string_literal(),
            c if Self::is_digit(c) => self.number(),
            c if Self::is_alpha(c) => self.identifier(),
            c => {
                self.errors.push(GlitterError::UnexpectedCharacter {
                    found: String::from(c),
                    path: Rc::clone(&self.path),
                    span: self.span_at(self.pos.start, 1, self.pos.start_line),
                });
                return None;
            }
        };
        Some(token)
    }

    fn previous_ends_operand(&self) -> bool {
        self.prev_significant
            .map_or(false, TokenKind::ends_operand)
    }

    fn string_literal(&mut self) -> Option<Token> {
        while self.peek() != "\"" && !self.is_at_end() {
            if matches!(self.peek(), "\n" | "\r\n") {
                self.pos.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.errors.push(GlitterError::UnterminatedString {
                path: Rc::clone(&self.path),
                span: self.span_at(self.pos.start, 1, self.pos.start_line),
            });
            return None;
        }
        self.advance(); // The closing quote.

        let value = self.source_graphemes[self.pos.start + 1..self.pos.current - 1].join("");
        Some(self.make_token(TokenKind::String, Literal::Text(value)))
    }

    fn number(&mut self) -> Token {
        while Self::is_digit(self.peek()) {
            self.advance();
        }

        if self.peek() == "." && Self::is_digit(self.peek_next()) {
            self.advance(); // consume "."
            while Self::is_digit(self.peek()) {
                self.advance();
            }
        }

        let lexeme = self.source_graphemes[self.pos.start..self.pos.current].join("");
        let value: f64 = lexeme.parse().expect("digit scan produced a valid float");
        self.make_token(TokenKind::Number, Literal::Number(value))
    }

    fn identifier(&mut self) -> Token {
        while Self::is_alpha_numeric(self.peek()) {
            self.advance();
        }

        let text = self.source_graphemes[self.pos.start..self.pos.current].join("");
        match self.keywords.get(text.as_str()) {
            Some(kind) => self.make_token(*kind, Literal::None),
            None => self.make_token(TokenKind::Identifier, Literal::Text(text)),
        }
    }

    fn is_digit(c: &str) -> bool {
        matches!(c, "0" | "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9")
    }

    fn is_alpha(c: &str) -> bool {
        let mut chars = c.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => ch == '_' || ch.is_ascii_alphabetic(),
            _ => false,
        }
    }

    fn is_alpha_numeric(c: &str) -> bool {
        Self::is_alpha(c) || Self::is_digit(c)
    }
}

impl Iterator for Scanner {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        loop {
            self.pos.start = self.pos.current;
            self.pos.start_line = self.pos.line;

            if self.is_at_end() {
                self.finished = true;
                return Some(self.make_token(TokenKind::EndOfFile, Literal::None));
            }

            if self.at_trivia() {
                self.consume_trivia();
                if self.emit_whitespace {
                    return Some(self.make_token(TokenKind::Whitespace, Literal::None));
                }
                continue;
            }

            match self.scan_token() {
                Some(token) => {
                    self.prev_significant = Some(token.kind());
                    return Some(token);
                }
                None => continue,
            }
        }
    }
}

fn keyword_map() -> HashMap<&'static str, TokenKind> {
    [
        ("and", TokenKind::And),
        ("or", TokenKind::Or),
        ("if", TokenKind::If),
        ("else", TokenKind::Else),
        ("while", TokenKind::While),
        ("for", TokenKind::For),
        ("return", TokenKind::Return),
        ("function", TokenKind::Function),
        ("var", TokenKind::Var),
        ("let", TokenKind::Let),
        ("true", TokenKind::True),
        ("false", TokenKind::False),
        ("undefined", TokenKind::Undefined),
        ("print", TokenKind::Print),
        ("class", TokenKind::Class),
        ("base", TokenKind::Base),
        ("this", TokenKind::This),
        ("break", TokenKind::Break),
        ("continue", TokenKind::Continue),
        ("foreach", TokenKind::Foreach),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Scanner::new(source, "test").scan();
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        tokens.iter().map(Token::kind).collect()
    }

    #[test]
    fn empty_input_yields_exactly_one_eof() {
        let mut scanner = Scanner::new("", "test");
        let token = scanner.next().unwrap();
        assert_eq!(token.kind(), TokenKind::EndOfFile);
        assert!(scanner.next().is_none());
        assert!(scanner.take_errors().is_empty());
    }

    #[test]
    fn eof_occurs_once_on_every_input() {
        for source in ["", "1 + 2", "// only a comment", "var x = 1;\n"] {
            let (tokens, _) = Scanner::new(source, "test").scan();
            let eofs = tokens
                .iter()
                .filter(|t| t.kind() == TokenKind::EndOfFile)
                .count();
            assert_eq!(eofs, 1, "source {:?}", source);
            assert_eq!(tokens.last().unwrap().kind(), TokenKind::EndOfFile);
        }
    }

    #[test]
    fn lexemes_round_trip_through_spans() {
        let source = "var answer = 4.25 + (3 * n); print \"ok\";";
        let (tokens, errors) = Scanner::new(source, "test").scan();
        assert!(errors.is_empty());
        for token in &tokens {
            let span = token.span();
            assert_eq!(
                token.lexeme(),
                &source[span.offset..span.offset + span.length]
            );
        }
    }

    #[test]
    fn whitespace_and_comments_coalesce_into_one_token() {
        let source = "a  \t// line comment\n  /* block\ncomment */ \r\n  b";
        let (tokens, errors) = Scanner::with_whitespace(source, "test").scan();
        assert!(errors.is_empty());
        let kinds: Vec<TokenKind> = tokens.iter().map(Token::kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Whitespace,
                TokenKind::Identifier,
                TokenKind::EndOfFile,
            ]
        );
        // The run spans lines 1-3, so `b` sits on line 4.
        assert_eq!(tokens[2].line(), 4);
    }

    #[test]
    fn operators_one_and_two_characters() {
        assert_eq!(
            kinds("! != = == < <= > >= / *"),
            vec![
                TokenKind::Bang,
                TokenKind::BangEqual,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Slash,
                TokenKind::Star,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn number_literals_decode() {
        let (tokens, _) = Scanner::new("12 12.5", "test").scan();
        assert_eq!(tokens[0].number(), 12.0);
        assert_eq!(tokens[1].number(), 12.5);
    }

    #[test]
    fn minus_before_digit_after_operand_is_subtraction() {
        assert_eq!(
            kinds("n-2"),
            vec![
                TokenKind::Identifier,
                TokenKind::Minus,
                TokenKind::Number,
                TokenKind::EndOfFile,
            ]
        );
        assert_eq!(
            kinds("(1)-2"),
            vec![
                TokenKind::LeftParen,
                TokenKind::Number,
                TokenKind::RightParen,
                TokenKind::Minus,
                TokenKind::Number,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn minus_before_digit_elsewhere_is_a_negative_literal() {
        let (tokens, _) = Scanner::new("print -2;", "test").scan();
        assert_eq!(tokens[1].kind(), TokenKind::Number);
        assert_eq!(tokens[1].number(), -2.0);
        assert_eq!(tokens[1].lexeme(), "-2");

        let (tokens, _) = Scanner::new("x = -3.5;", "test").scan();
        assert_eq!(tokens[2].number(), -3.5);
    }

    #[test]
    fn string_literal_decodes_without_quotes() {
        let (tokens, _) = Scanner::new("\"Hello World\"", "test").scan();
        assert_eq!(tokens[0].kind(), TokenKind::String);
        assert_eq!(tokens[0].text(), "Hello World");
        assert_eq!(tokens[0].lexeme(), "\"Hello World\"");
    }

    #[test]
    fn string_may_span_newlines() {
        let (tokens, errors) = Scanner::new("\"a\nb\" x", "test").scan();
        assert!(errors.is_empty());
        assert_eq!(tokens[0].text(), "a\nb");
        assert_eq!(tokens[0].line(), 1);
        assert_eq!(tokens[1].line(), 2);
    }

    #[test]
    fn unterminated_string_reports_at_opening_quote() {
        let (tokens, errors) = Scanner::new("x \"oops", "test").scan();
        assert_eq!(tokens.last().unwrap().kind(), TokenKind::EndOfFile);
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            GlitterError::UnterminatedString { span, .. } => {
                assert_eq!(span.offset, 2);
                assert_eq!(span.length, 1);
            }
            other => panic!("expected unterminated string, got {:?}", other),
        }
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        let (_, errors) = Scanner::new("1 /* never closed", "test").scan();
        assert!(matches!(
            errors[0],
            GlitterError::UnterminatedBlockComment { .. }
        ));
    }

    #[test]
    fn unexpected_character_is_reported_and_skipped() {
        let (tokens, errors) = Scanner::new("1 @ 2", "test").scan();
        assert_eq!(
            tokens.iter().map(Token::kind).collect::<Vec<_>>(),
            vec![TokenKind::Number, TokenKind::Number, TokenKind::EndOfFile]
        );
        match &errors[0] {
            GlitterError::UnexpectedCharacter { found, .. } => assert_eq!(found, "@"),
            other => panic!("expected unexpected character, got {:?}", other),
        }
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("var let function foreach classes"),
            vec![
                TokenKind::Var,
                TokenKind::Let,
                TokenKind::Function,
                TokenKind::Foreach,
                TokenKind::Identifier,
                TokenKind::EndOfFile,
            ]
        );
    }
}
