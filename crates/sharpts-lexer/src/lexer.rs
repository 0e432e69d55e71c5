//! Single-pass scanner: source text → token stream.
//!
//! Illegal characters become `TokenKind::Error` tokens and scanning
//! continues — the lexer never aborts early, matching the parser's
//! recover-and-resume philosophy.

use crate::token::{Keyword, LiteralValue, Token, TokenKind};
use sharpts_common::{Atom, Diagnostic, DiagnosticSink, Span};

/// Tracks how many un-closed `{` braces have been opened since the last
/// `${` of a template interpolation, so a later `}` can be told apart from
/// one that should resume scanning the template.
struct TemplateFrame {
    brace_depth: u32,
}

pub struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
    line: u32,
    /// Regex is permitted in the next token position; division is
    /// permitted otherwise. Updated after every emitted token.
    regex_permitted: bool,
    template_stack: Vec<TemplateFrame>,
    diagnostics: DiagnosticSink,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 0,
            regex_permitted: true,
            template_stack: Vec::new(),
            diagnostics: DiagnosticSink::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.scan_token();
            let is_eof = tok.kind == TokenKind::Eof;
            self.regex_permitted = !tok.kind.permits_division_next();
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics.into_sorted())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn advance(&mut self) -> u8 {
        let b = self.bytes[self.pos];
        self.pos += 1;
        b
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.at_end() || self.bytes[self.pos] != expected {
            return false;
        }
        self.pos += 1;
        true
    }

    fn skip_trivia(&mut self) -> bool {
        let mut saw_newline = false;
        loop {
            if self.at_end() {
                break;
            }
            match self.peek() {
                b' ' | b'\t' => {
                    self.pos += 1;
                }
                b'\r' => {
                    self.pos += 1;
                    if self.peek() == b'\n' {
                        self.pos += 1;
                    }
                    self.line += 1;
                    saw_newline = true;
                }
                b'\n' => {
                    self.pos += 1;
                    self.line += 1;
                    saw_newline = true;
                }
                b'/' if self.peek_at(1) == b'/' => {
                    while !self.at_end() && self.peek() != b'\n' {
                        self.pos += 1;
                    }
                }
                b'/' if self.peek_at(1) == b'*' => {
                    self.pos += 2;
                    while !self.at_end() && !(self.peek() == b'*' && self.peek_at(1) == b'/') {
                        if self.peek() == b'\n' {
                            self.line += 1;
                            saw_newline = true;
                        }
                        self.pos += 1;
                    }
                    if !self.at_end() {
                        self.pos += 2;
                    }
                }
                _ => break,
            }
        }
        saw_newline
    }

    fn make(&self, kind: TokenKind, start: usize, preceded_by_newline: bool) -> Token {
        let span = Span::new(start as u32, self.pos as u32);
        Token {
            kind,
            lexeme: Atom::new(span.text(self.source)),
            literal: None,
            line: self.line,
            span,
            preceded_by_newline,
        }
    }

    fn make_literal(
        &self,
        kind: TokenKind,
        start: usize,
        literal: LiteralValue,
        preceded_by_newline: bool,
    ) -> Token {
        let mut tok = self.make(kind, start, preceded_by_newline);
        tok.literal = Some(literal);
        tok
    }

    fn error_token(&mut self, start: usize, message: impl Into<String>) -> Token {
        let span = Span::new(start as u32, self.pos.max(start + 1) as u32);
        self.diagnostics.push(Diagnostic::error(span, message));
        Token {
            kind: TokenKind::Error,
            lexeme: Atom::new(span.text(self.source)),
            literal: None,
            line: self.line,
            span,
            preceded_by_newline: false,
        }
    }

    fn scan_token(&mut self) -> Token {
        let preceded_by_newline = self.skip_trivia();
        if self.at_end() {
            return self.make(TokenKind::Eof, self.pos, preceded_by_newline);
        }
        let start = self.pos;
        let c = self.advance();
        match c {
            b'(' => self.make(TokenKind::OpenParen, start, preceded_by_newline),
            b')' => self.make(TokenKind::CloseParen, start, preceded_by_newline),
            b'{' => {
                if let Some(frame) = self.template_stack.last_mut() {
                    frame.brace_depth += 1;
                }
                self.make(TokenKind::OpenBrace, start, preceded_by_newline)
            }
            b'}' => {
                if let Some(frame) = self.template_stack.last_mut() {
                    if frame.brace_depth == 0 {
                        self.template_stack.pop();
                        return self.scan_template_continuation(start, preceded_by_newline);
                    }
                    frame.brace_depth -= 1;
                }
                self.make(TokenKind::CloseBrace, start, preceded_by_newline)
            }
            b'[' => self.make(TokenKind::OpenBracket, start, preceded_by_newline),
            b']' => self.make(TokenKind::CloseBracket, start, preceded_by_newline),
            b';' => self.make(TokenKind::Semicolon, start, preceded_by_newline),
            b',' => self.make(TokenKind::Comma, start, preceded_by_newline),
            b'@' => self.make(TokenKind::At, start, preceded_by_newline),
            b'~' => self.make(TokenKind::Tilde, start, preceded_by_newline),
            b':' => self.make(TokenKind::Colon, start, preceded_by_newline),
            b'.' => {
                if self.peek() == b'.' && self.peek_at(1) == b'.' {
                    self.pos += 2;
                    self.make(TokenKind::DotDotDot, start, preceded_by_newline)
                } else if self.peek().is_ascii_digit() {
                    self.pos -= 1;
                    self.scan_number(start, preceded_by_newline)
                } else {
                    self.make(TokenKind::Dot, start, preceded_by_newline)
                }
            }
            b'?' => {
                if self.matches(b'?') {
                    if self.matches(b'=') {
                        self.make(TokenKind::QuestionQuestionEquals, start, preceded_by_newline)
                    } else {
                        self.make(TokenKind::QuestionQuestion, start, preceded_by_newline)
                    }
                } else if self.peek() == b'.' && !self.peek_at(1).is_ascii_digit() {
                    self.pos += 1;
                    self.make(TokenKind::QuestionDot, start, preceded_by_newline)
                } else {
                    self.make(TokenKind::Question, start, preceded_by_newline)
                }
            }
            b'=' => {
                if self.matches(b'=') {
                    if self.matches(b'=') {
                        self.make(TokenKind::EqualsEqualsEquals, start, preceded_by_newline)
                    } else {
                        self.make(TokenKind::EqualsEquals, start, preceded_by_newline)
                    }
                } else if self.matches(b'>') {
                    self.make(TokenKind::EqualsGreaterThan, start, preceded_by_newline)
                } else {
                    self.make(TokenKind::Equals, start, preceded_by_newline)
                }
            }
            b'!' => {
                if self.matches(b'=') {
                    if self.matches(b'=') {
                        self.make(TokenKind::ExclamationEqualsEquals, start, preceded_by_newline)
                    } else {
                        self.make(TokenKind::ExclamationEquals, start, preceded_by_newline)
                    }
                } else {
                    self.make(TokenKind::Exclamation, start, preceded_by_newline)
                }
            }
            b'<' => {
                if self.matches(b'<') {
                    if self.matches(b'=') {
                        self.make(TokenKind::LessThanLessThanEquals, start, preceded_by_newline)
                    } else {
                        self.make(TokenKind::LessThanLessThan, start, preceded_by_newline)
                    }
                } else if self.matches(b'=') {
                    self.make(TokenKind::LessThanEquals, start, preceded_by_newline)
                } else {
                    self.make(TokenKind::LessThan, start, preceded_by_newline)
                }
            }
            // Note: the lexer deliberately does NOT split `>>`/`>>>` here —
            // that split is the parser's job when closing nested generic
            // type-argument lists.
            b'>' => {
                if self.matches(b'>') {
                    if self.matches(b'>') {
                        if self.matches(b'=') {
                            self.make(
                                TokenKind::GreaterThanGreaterThanGreaterThanEquals,
                                start,
                                preceded_by_newline,
                            )
                        } else {
                            self.make(
                                TokenKind::GreaterThanGreaterThanGreaterThan,
                                start,
                                preceded_by_newline,
                            )
                        }
                    } else if self.matches(b'=') {
                        self.make(
                            TokenKind::GreaterThanGreaterThanEquals,
                            start,
                            preceded_by_newline,
                        )
                    } else {
                        self.make(TokenKind::GreaterThanGreaterThan, start, preceded_by_newline)
                    }
                } else if self.matches(b'=') {
                    self.make(TokenKind::GreaterThanEquals, start, preceded_by_newline)
                } else {
                    self.make(TokenKind::GreaterThan, start, preceded_by_newline)
                }
            }
            b'+' => {
                if self.matches(b'+') {
                    self.make(TokenKind::PlusPlus, start, preceded_by_newline)
                } else if self.matches(b'=') {
                    self.make(TokenKind::PlusEquals, start, preceded_by_newline)
                } else {
                    self.make(TokenKind::Plus, start, preceded_by_newline)
                }
            }
            b'-' => {
                if self.matches(b'-') {
                    self.make(TokenKind::MinusMinus, start, preceded_by_newline)
                } else if self.matches(b'=') {
                    self.make(TokenKind::MinusEquals, start, preceded_by_newline)
                } else {
                    self.make(TokenKind::Minus, start, preceded_by_newline)
                }
            }
            b'*' => {
                if self.matches(b'*') {
                    if self.matches(b'=') {
                        self.make(TokenKind::AsteriskAsteriskEquals, start, preceded_by_newline)
                    } else {
                        self.make(TokenKind::AsteriskAsterisk, start, preceded_by_newline)
                    }
                } else if self.matches(b'=') {
                    self.make(TokenKind::AsteriskEquals, start, preceded_by_newline)
                } else {
                    self.make(TokenKind::Asterisk, start, preceded_by_newline)
                }
            }
            b'%' => {
                if self.matches(b'=') {
                    self.make(TokenKind::PercentEquals, start, preceded_by_newline)
                } else {
                    self.make(TokenKind::Percent, start, preceded_by_newline)
                }
            }
            b'&' => {
                if self.matches(b'&') {
                    if self.matches(b'=') {
                        self.make(TokenKind::AmpersandAmpersandEquals, start, preceded_by_newline)
                    } else {
                        self.make(TokenKind::AmpersandAmpersand, start, preceded_by_newline)
                    }
                } else if self.matches(b'=') {
                    self.make(TokenKind::AmpersandEquals, start, preceded_by_newline)
                } else {
                    self.make(TokenKind::Ampersand, start, preceded_by_newline)
                }
            }
            b'|' => {
                if self.matches(b'|') {
                    if self.matches(b'=') {
                        self.make(TokenKind::BarBarEquals, start, preceded_by_newline)
                    } else {
                        self.make(TokenKind::BarBar, start, preceded_by_newline)
                    }
                } else if self.matches(b'=') {
                    self.make(TokenKind::BarEquals, start, preceded_by_newline)
                } else {
                    self.make(TokenKind::Bar, start, preceded_by_newline)
                }
            }
            b'^' => {
                if self.matches(b'=') {
                    self.make(TokenKind::CaretEquals, start, preceded_by_newline)
                } else {
                    self.make(TokenKind::Caret, start, preceded_by_newline)
                }
            }
            b'/' => {
                if self.regex_permitted {
                    self.scan_regex(start, preceded_by_newline)
                } else if self.matches(b'=') {
                    self.make(TokenKind::SlashEquals, start, preceded_by_newline)
                } else {
                    self.make(TokenKind::Slash, start, preceded_by_newline)
                }
            }
            b'"' | b'\'' => self.scan_string(c, start, preceded_by_newline),
            b'`' => self.scan_template_head(start, preceded_by_newline),
            b'#' => self.scan_private_identifier(start, preceded_by_newline),
            b'0'..=b'9' => {
                self.pos -= 1;
                self.scan_number(start, preceded_by_newline)
            }
            c if is_identifier_start(c) => {
                self.pos -= 1;
                self.scan_identifier_or_keyword(start, preceded_by_newline)
            }
            _ => self.error_token(start, format!("unexpected character '{}'", c as char)),
        }
    }

    fn scan_identifier_or_keyword(&mut self, start: usize, preceded_by_newline: bool) -> Token {
        while !self.at_end() && is_identifier_continue(self.peek()) {
            self.pos += 1;
        }
        let text = &self.source[start..self.pos];
        let kind = match Keyword::lookup(text) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier,
        };
        self.make(kind, start, preceded_by_newline)
    }

    fn scan_private_identifier(&mut self, start: usize, preceded_by_newline: bool) -> Token {
        while !self.at_end() && is_identifier_continue(self.peek()) {
            self.pos += 1;
        }
        self.make(TokenKind::PrivateIdentifier, start, preceded_by_newline)
    }

    fn scan_number(&mut self, start: usize, preceded_by_newline: bool) -> Token {
        let radix_prefix = if self.peek() == b'0' {
            match self.peek_at(1) {
                b'x' | b'X' => Some((16u32, 2)),
                b'b' | b'B' => Some((2u32, 2)),
                b'o' | b'O' => Some((8u32, 2)),
                _ => None,
            }
        } else {
            None
        };

        let digits_start;
        let radix;
        if let Some((r, skip)) = radix_prefix {
            self.pos += skip;
            digits_start = self.pos;
            radix = r;
            while !self.at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == b'_') {
                self.pos += 1;
            }
        } else {
            radix = 10;
            digits_start = start;
            while !self.at_end() && (self.peek().is_ascii_digit() || self.peek() == b'_') {
                self.pos += 1;
            }
            if self.peek() == b'.' && self.peek_at(1).is_ascii_digit() {
                self.pos += 1;
                while !self.at_end() && (self.peek().is_ascii_digit() || self.peek() == b'_') {
                    self.pos += 1;
                }
            }
            if matches!(self.peek(), b'e' | b'E') {
                let save = self.pos;
                self.pos += 1;
                if matches!(self.peek(), b'+' | b'-') {
                    self.pos += 1;
                }
                if self.peek().is_ascii_digit() {
                    while !self.at_end() && self.peek().is_ascii_digit() {
                        self.pos += 1;
                    }
                } else {
                    self.pos = save;
                }
            }
        }

        if self.peek() == b'n' {
            let digits: String = self.source[digits_start..self.pos]
                .chars()
                .filter(|c| *c != '_')
                .collect();
            self.pos += 1;
            return self.make_literal(
                TokenKind::BigIntLiteral,
                start,
                LiteralValue::BigInt(digits),
                preceded_by_newline,
            );
        }

        let raw: String = self.source[digits_start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        let value = if radix == 10 {
            raw.parse::<f64>().unwrap_or(f64::NAN)
        } else {
            u64::from_str_radix(&raw, radix).map(|v| v as f64).unwrap_or(f64::NAN)
        };
        self.make_literal(
            TokenKind::NumericLiteral,
            start,
            LiteralValue::Number(value),
            preceded_by_newline,
        )
    }

    fn scan_string(&mut self, quote: u8, start: usize, preceded_by_newline: bool) -> Token {
        let mut value = String::new();
        loop {
            if self.at_end() {
                return self.error_token(start, "unterminated string literal");
            }
            let c = self.peek();
            if c == quote {
                self.pos += 1;
                break;
            }
            if c == b'\n' {
                return self.error_token(start, "unterminated string literal");
            }
            if c == b'\\' {
                self.pos += 1;
                value.push(self.scan_escape_sequence());
                continue;
            }
            let ch_len = utf8_char_len(c);
            value.push_str(&self.source[self.pos..self.pos + ch_len]);
            self.pos += ch_len;
        }
        self.make_literal(
            TokenKind::StringLiteral,
            start,
            LiteralValue::Str(value),
            preceded_by_newline,
        )
    }

    fn scan_escape_sequence(&mut self) -> char {
        if self.at_end() {
            return '\\';
        }
        let c = self.advance();
        match c {
            b'n' => '\n',
            b't' => '\t',
            b'r' => '\r',
            b'b' => '\u{8}',
            b'f' => '\u{c}',
            b'v' => '\u{b}',
            b'0' => '\0',
            b'\\' => '\\',
            b'\'' => '\'',
            b'"' => '"',
            b'`' => '`',
            b'\n' => '\n',
            b'u' => {
                if self.peek() == b'{' {
                    self.pos += 1;
                    let start = self.pos;
                    while !self.at_end() && self.peek() != b'}' {
                        self.pos += 1;
                    }
                    let hex = &self.source[start..self.pos];
                    if !self.at_end() {
                        self.pos += 1;
                    }
                    u32::from_str_radix(hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .unwrap_or('\u{FFFD}')
                } else {
                    let start = self.pos;
                    for _ in 0..4 {
                        if !self.at_end() {
                            self.pos += 1;
                        }
                    }
                    let hex = &self.source[start..self.pos.min(start + 4)];
                    u32::from_str_radix(hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .unwrap_or('\u{FFFD}')
                }
            }
            b'x' => {
                let start = self.pos;
                for _ in 0..2 {
                    if !self.at_end() {
                        self.pos += 1;
                    }
                }
                let hex = &self.source[start..self.pos.min(start + 2)];
                u32::from_str_radix(hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or('\u{FFFD}')
            }
            other => other as char,
        }
    }

    fn scan_template_head(&mut self, start: usize, preceded_by_newline: bool) -> Token {
        self.scan_template_part(start, preceded_by_newline, true)
    }

    fn scan_template_continuation(&mut self, start: usize, preceded_by_newline: bool) -> Token {
        self.scan_template_part(start, preceded_by_newline, false)
    }

    /// Shared by a template's opening backtick and its `}`-triggered
    /// continuation after an interpolation.
    fn scan_template_part(&mut self, start: usize, preceded_by_newline: bool, is_head: bool) -> Token {
        let mut value = String::new();
        loop {
            if self.at_end() {
                return self.error_token(start, "unterminated template literal");
            }
            match self.peek() {
                b'`' => {
                    self.pos += 1;
                    let kind = if is_head {
                        TokenKind::NoSubstitutionTemplateLiteral
                    } else {
                        TokenKind::TemplateTail
                    };
                    return self.make_literal(
                        kind,
                        start,
                        LiteralValue::Str(value),
                        preceded_by_newline,
                    );
                }
                b'$' if self.peek_at(1) == b'{' => {
                    self.pos += 2;
                    self.template_stack.push(TemplateFrame { brace_depth: 0 });
                    let kind = if is_head {
                        TokenKind::TemplateHead
                    } else {
                        TokenKind::TemplateMiddle
                    };
                    return self.make_literal(
                        kind,
                        start,
                        LiteralValue::Str(value),
                        preceded_by_newline,
                    );
                }
                b'\\' => {
                    self.pos += 1;
                    value.push(self.scan_escape_sequence());
                }
                b'\n' => {
                    self.line += 1;
                    value.push('\n');
                    self.pos += 1;
                }
                c => {
                    let len = utf8_char_len(c);
                    value.push_str(&self.source[self.pos..self.pos + len]);
                    self.pos += len;
                }
            }
        }
    }

    fn scan_regex(&mut self, start: usize, preceded_by_newline: bool) -> Token {
        let pattern_start = self.pos;
        let mut in_class = false;
        loop {
            if self.at_end() || self.peek() == b'\n' {
                return self.error_token(start, "unterminated regular expression literal");
            }
            match self.peek() {
                b'\\' => {
                    self.pos += 2;
                }
                b'[' => {
                    in_class = true;
                    self.pos += 1;
                }
                b']' => {
                    in_class = false;
                    self.pos += 1;
                }
                b'/' if !in_class => {
                    break;
                }
                _ => self.pos += 1,
            }
        }
        let pattern = self.source[pattern_start..self.pos].to_string();
        self.pos += 1; // closing '/'
        let flags_start = self.pos;
        while !self.at_end() && self.peek().is_ascii_alphabetic() {
            self.pos += 1;
        }
        let flags = self.source[flags_start..self.pos].to_string();
        self.make_literal(
            TokenKind::RegularExpressionLiteral,
            start,
            LiteralValue::Regex { pattern, flags },
            preceded_by_newline,
        )
    }
}

fn is_identifier_start(c: u8) -> bool {
    c == b'_' || c == b'$' || c.is_ascii_alphabetic() || c >= 0x80
}

fn is_identifier_continue(c: u8) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

fn utf8_char_len(first_byte: u8) -> usize {
    if first_byte < 0x80 {
        1
    } else if first_byte >> 5 == 0b110 {
        2
    } else if first_byte >> 4 == 0b1110 {
        3
    } else {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_simple_declaration() {
        let k = kinds("const x = 1;");
        assert_eq!(
            k,
            vec![
                TokenKind::Keyword(Keyword::Const),
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::NumericLiteral,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn distinguishes_division_from_regex() {
        let k = kinds("a / b");
        assert_eq!(k[1], TokenKind::Slash);
        let k2 = kinds("x = /foo/g");
        assert_eq!(k2[2], TokenKind::RegularExpressionLiteral);
    }

    #[test]
    fn does_not_split_shift_operator() {
        let k = kinds("16 >> 2");
        assert_eq!(k[1], TokenKind::GreaterThanGreaterThan);
    }

    #[test]
    fn template_literal_with_interpolation_round_trips() {
        let (tokens, diags) = Lexer::new("`a${1}b`").tokenize();
        assert!(diags.is_empty());
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::TemplateHead,
                TokenKind::NumericLiteral,
                TokenKind::TemplateTail,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn nested_braces_inside_interpolation_do_not_close_template() {
        let (tokens, diags) = Lexer::new("`a${ {x:1}.x }b`").tokenize();
        assert!(diags.is_empty());
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds.first(), Some(&TokenKind::TemplateHead));
        assert_eq!(kinds.last(), Some(&TokenKind::Eof));
        assert_eq!(kinds[kinds.len() - 2], TokenKind::TemplateTail);
    }

    #[test]
    fn bigint_literal_strips_separators_and_suffix() {
        let (tokens, _) = Lexer::new("1_000n").tokenize();
        match &tokens[0].literal {
            Some(LiteralValue::BigInt(s)) => assert_eq!(s, "1000"),
            other => panic!("expected bigint literal, got {other:?}"),
        }
    }

    #[test]
    fn illegal_character_recovers() {
        let (tokens, diags) = Lexer::new("let x = 1; \u{1} let y = 2;").tokenize();
        assert_eq!(diags.len(), 1);
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Error));
        assert!(tokens.iter().filter(|t| t.kind == TokenKind::Keyword(Keyword::Let)).count() == 2);
    }
}
