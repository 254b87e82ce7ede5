//! The lexical scanner.
//!
//! Two layers live here. The decoding layer turns raw units from a [`ByteSource`] into
//! characters (Latin-1, UTF-8 or UTF-16 in either byte order, optionally sniffed from a
//! byte order mark) and keeps line/column bookkeeping. The token layer classifies those
//! characters greedily into identifiers, strings, numbers, sets, comments, whitespace and
//! generic single-character tokens.

use std::{char::REPLACEMENT_CHARACTER, collections::VecDeque, convert::TryFrom};

use thiserror::Error;

use crate::{
    position::Position,
    source::{ByteSource, MemorySource, SourceError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// One byte per character.
    Latin1,
    Utf8,
    Utf16 { big_endian: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identifiers {
    /// Letters are generic tokens.
    Off,
    /// A letter or `_`, then letters, digits or `_`.
    Standard,
    /// Letters only.
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    Off,
    On,
    /// Like `On`, plus `\uXXXX`.
    WithUnicode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalSeparator {
    Char(char),
    /// Either `,` or `.` separates the fraction.
    CommaAndDot,
}

impl DecimalSeparator {
    fn accepts(self, c: char) -> bool {
        match self {
            DecimalSeparator::Char(sep) => c == sep,
            DecimalSeparator::CommaAndDot => c == ',' || c == '.',
        }
    }
}

/// Everything the scanner can be told about its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub encoding: Encoding,
    /// Switch encoding when the input starts with a byte order mark.
    pub detect_bom: bool,
    pub identifiers: Identifiers,
    /// Recognize `'..'` and `".."`.
    pub strings: bool,
    /// Recognize `[..]`.
    pub sets: bool,
    pub escape: Escape,
    /// `#` starts a comment running to the end of the line.
    pub hash_comment: bool,
    /// `//` line comments and `/* */` block comments.
    pub slash_comment: bool,
    /// Block comments may contain other block comments.
    pub nested_comments: bool,
    pub decimal: DecimalSeparator,
    pub hex_literals: bool,
    pub oct_literals: bool,
    pub bin_literals: bool,
    /// Every character is a generic token.
    pub tokens_only: bool,
    /// Stop after this many tokens.
    pub max_scan_tokens: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            encoding: Encoding::Utf8,
            detect_bom: false,
            identifiers: Identifiers::Standard,
            strings: false,
            sets: false,
            escape: Escape::On,
            hash_comment: false,
            slash_comment: true,
            nested_comments: false,
            decimal: DecimalSeparator::Char('.'),
            hex_literals: false,
            oct_literals: false,
            bin_literals: false,
            tokens_only: false,
            max_scan_tokens: None,
        }
    }
}

impl ScanOptions {
    /// How grammar text is read when registering rules.
    pub fn grammar() -> Self {
        Self {
            strings: true,
            sets: true,
            nested_comments: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Generic,
    Identifier,
    DoubleString,
    SingleString,
    /// Fits in 32 bits.
    Integer,
    Real,
    /// Needs 64 bits.
    LongInt,
    Comment,
    Whitespace,
    Set,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Char(char),
    /// Identifier names, unescaped string and set contents, comment bodies, whitespace.
    Text(String),
    Integer(i64),
    Real(f64),
    Error(ScanErrorKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    /// Exactly what was scanned, delimiters and escapes included.
    pub text: String,
    pub position: Position,
}

impl Token {
    fn new(kind: TokenKind, value: TokenValue, text: String, position: Position) -> Self {
        Self {
            kind,
            value,
            text,
            position,
        }
    }

    fn error(err: ScanError) -> Self {
        Self::new(
            TokenKind::Error,
            TokenValue::Error(err.kind),
            String::new(),
            err.position,
        )
    }

    /// The textual value, for the kinds that have one.
    pub fn text_value(&self) -> Option<&str> {
        match &self.value {
            TokenValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanErrorKind {
    #[error("malformed integer")]
    ErrorInInteger,
    #[error("malformed real number")]
    ErrorInReal,
    #[error("unexpected end of comment")]
    UnexpectedEndOfComment,
    #[error("unexpected end of integer")]
    UnexpectedEndOfInteger,
    #[error("unexpected end of real number")]
    UnexpectedEndOfReal,
    #[error("unexpected end of string")]
    UnexpectedEndOfString,
    #[error("unexpected end of set")]
    UnexpectedEndOfSet,
    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} at ({position})")]
pub struct ScanError {
    pub kind: ScanErrorKind,
    pub position: Position,
}

impl ScanError {
    pub fn new(kind: ScanErrorKind, position: Position) -> Self {
        Self { kind, position }
    }
}

type Decoded = (char, Position);

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Scanner {
    #[derivative(Debug = "ignore")]
    source: Box<dyn ByteSource>,
    options: ScanOptions,
    /// The encoding in effect; differs from the options once a byte order mark was seen.
    encoding: Encoding,
    sniffed: bool,
    /// Raw units read ahead of the decoder.
    raw: VecDeque<u8>,
    /// Decoded characters that were put back.
    pending: VecDeque<Decoded>,
    /// Position of the next freshly decoded character.
    position: Position,
    peeked: Option<Option<Token>>,
    scanned: usize,
    failed: bool,
}

impl Scanner {
    pub fn new<S: ByteSource + 'static>(source: S, options: ScanOptions) -> Self {
        Self::boxed(Box::new(source), options)
    }

    pub fn boxed(source: Box<dyn ByteSource>, options: ScanOptions) -> Self {
        Self {
            source,
            encoding: options.encoding,
            options,
            sniffed: false,
            raw: VecDeque::new(),
            pending: VecDeque::new(),
            position: Position::new(),
            peeked: None,
            scanned: 0,
            failed: false,
        }
    }

    pub fn from_text(text: &str, options: ScanOptions) -> Self {
        let options = ScanOptions {
            encoding: Encoding::Utf8,
            ..options
        };
        Self::new(MemorySource::new(text), options)
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// The encoding currently used to decode the input.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Position of the next character to be read.
    pub fn position(&self) -> Position {
        self.pending
            .front()
            .map(|&(_, pos)| pos)
            .unwrap_or(self.position)
    }

    /// Decode and consume the next character.
    ///
    /// This bypasses token classification; don't interleave it with a peeked token.
    pub fn next_char(&mut self) -> Result<Option<char>, ScanError> {
        Ok(self.read()?.map(|(c, _)| c))
    }

    /// Scan the next token. `peek` leaves it in place for the next call.
    pub fn next_token(&mut self, peek: bool) -> Result<Option<Token>, ScanError> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.scan()?,
        };
        if peek {
            self.peeked = Some(token.clone());
        }
        Ok(token)
    }

    // === Decoding ===

    fn raw_unit(&mut self) -> Result<Option<u8>, SourceError> {
        match self.raw.pop_front() {
            Some(b) => Ok(Some(b)),
            None => self.source.next_raw_unit(),
        }
    }

    fn unread_raw(&mut self, bytes: &[u8]) {
        for &b in bytes.iter().rev() {
            self.raw.push_front(b);
        }
    }

    fn sniff(&mut self) -> Result<(), SourceError> {
        if self.options.detect_bom {
            while self.raw.len() < 3 {
                match self.source.next_raw_unit()? {
                    Some(b) => self.raw.push_back(b),
                    None => break,
                }
            }
            let head = self.raw.iter().copied().take(3).collect::<Vec<_>>();
            if head.starts_with(&[0xEF, 0xBB, 0xBF]) {
                self.raw.drain(..3);
                self.encoding = Encoding::Utf8;
            } else if head.starts_with(&[0xFE, 0xFF]) {
                self.raw.drain(..2);
                self.encoding = Encoding::Utf16 { big_endian: true };
            } else if head.starts_with(&[0xFF, 0xFE]) {
                self.raw.drain(..2);
                self.encoding = Encoding::Utf16 { big_endian: false };
            }
        }
        self.sniffed = true;
        Ok(())
    }

    fn decode(&mut self) -> Result<Option<char>, SourceError> {
        if !self.sniffed {
            self.sniff()?;
        }
        match self.encoding {
            Encoding::Latin1 => Ok(self.raw_unit()?.map(char::from)),
            Encoding::Utf8 => self.decode_utf8(),
            Encoding::Utf16 { big_endian } => self.decode_utf16(big_endian),
        }
    }

    fn decode_utf8(&mut self) -> Result<Option<char>, SourceError> {
        let lead = match self.raw_unit()? {
            Some(b) => b,
            None => return Ok(None),
        };
        let (len, mut code) = match lead {
            0x00..=0x7F => return Ok(Some(char::from(lead))),
            0xC0..=0xDF => (1, u32::from(lead & 0x1F)),
            0xE0..=0xEF => (2, u32::from(lead & 0x0F)),
            0xF0..=0xF7 => (3, u32::from(lead & 0x07)),
            _ => return Ok(Some(REPLACEMENT_CHARACTER)),
        };
        let mut seen = vec![lead];
        for _ in 0..len {
            let byte = match self.raw_unit() {
                Ok(Some(b)) => b,
                // half a character; keep what we have for when more arrives
                Ok(None) | Err(SourceError::OutOfData) => {
                    self.unread_raw(&seen);
                    return Err(SourceError::OutOfData);
                }
                Err(e) => return Err(e),
            };
            if byte & 0xC0 != 0x80 {
                self.raw.push_front(byte);
                return Ok(Some(REPLACEMENT_CHARACTER));
            }
            seen.push(byte);
            code = (code << 6) | u32::from(byte & 0x3F);
        }
        Ok(Some(char::from_u32(code).unwrap_or(REPLACEMENT_CHARACTER)))
    }

    fn read_u16(&mut self, big_endian: bool) -> Result<Option<u16>, SourceError> {
        let a = match self.raw_unit()? {
            Some(b) => b,
            None => return Ok(None),
        };
        let b = match self.raw_unit() {
            Ok(Some(b)) => b,
            Ok(None) | Err(SourceError::OutOfData) => {
                self.unread_raw(&[a]);
                return Err(SourceError::OutOfData);
            }
            Err(e) => return Err(e),
        };
        Ok(Some(if big_endian {
            u16::from_be_bytes([a, b])
        } else {
            u16::from_le_bytes([a, b])
        }))
    }

    fn unread_u16(&mut self, unit: u16, big_endian: bool) {
        let bytes = if big_endian {
            unit.to_be_bytes()
        } else {
            unit.to_le_bytes()
        };
        self.unread_raw(&bytes);
    }

    fn decode_utf16(&mut self, big_endian: bool) -> Result<Option<char>, SourceError> {
        let high = match self.read_u16(big_endian)? {
            Some(u) => u,
            None => return Ok(None),
        };
        if !(0xD800..0xDC00).contains(&high) {
            return Ok(Some(
                char::from_u32(u32::from(high)).unwrap_or(REPLACEMENT_CHARACTER),
            ));
        }
        let low = match self.read_u16(big_endian) {
            Ok(Some(u)) => u,
            Ok(None) => return Ok(Some(REPLACEMENT_CHARACTER)),
            Err(e) => {
                self.unread_u16(high, big_endian);
                return Err(e);
            }
        };
        if !(0xDC00..0xE000).contains(&low) {
            self.unread_u16(low, big_endian);
            return Ok(Some(REPLACEMENT_CHARACTER));
        }
        let code = 0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
        Ok(Some(char::from_u32(code).unwrap_or(REPLACEMENT_CHARACTER)))
    }

    fn read(&mut self) -> Result<Option<Decoded>, ScanError> {
        if let Some(item) = self.pending.pop_front() {
            return Ok(Some(item));
        }
        let position = self.position;
        match self.decode() {
            Ok(Some(ch)) => {
                self.position = position.after(ch);
                Ok(Some((ch, position)))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ScanError::new(e.into(), position)),
        }
    }

    fn unread(&mut self, item: Decoded) {
        self.pending.push_front(item);
    }

    fn peek(&mut self) -> Result<Option<char>, ScanError> {
        let item = self.read()?;
        if let Some(item) = item {
            self.unread(item);
        }
        Ok(item.map(|(c, _)| c))
    }

    fn peek2(&mut self) -> Result<(Option<char>, Option<char>), ScanError> {
        let first = self.read()?;
        let second = match first {
            None => None,
            Some(item) => match self.read() {
                Ok(second) => second,
                Err(e) => {
                    self.unread(item);
                    return Err(e);
                }
            },
        };
        if let Some(item) = second {
            self.unread(item);
        }
        if let Some(item) = first {
            self.unread(item);
        }
        Ok((first.map(|(c, _)| c), second.map(|(c, _)| c)))
    }

    /// Consume characters while `pred` holds, appending them to `text`.
    fn take_while<P: Fn(char) -> bool>(
        &mut self,
        text: &mut String,
        pred: P,
    ) -> Result<usize, ScanError> {
        let mut count = 0;
        while let Some(item) = self.read()? {
            if !pred(item.0) {
                self.unread(item);
                break;
            }
            text.push(item.0);
            count += 1;
        }
        Ok(count)
    }

    // === Classification ===

    fn scan(&mut self) -> Result<Option<Token>, ScanError> {
        if let Some(max) = self.options.max_scan_tokens {
            if self.scanned >= max {
                return Ok(None);
            }
        }
        let (first, start) = match self.read()? {
            Some(item) => item,
            None => return Ok(None),
        };
        let token = if self.options.tokens_only {
            generic(first, start)
        } else {
            self.classify(first, start)?
        };
        self.scanned += 1;
        Ok(Some(token))
    }

    fn classify(&mut self, first: char, start: Position) -> Result<Token, ScanError> {
        let o = self.options;
        let mut text = first.to_string();

        if first.is_whitespace() {
            self.take_while(&mut text, char::is_whitespace)?;
            let value = TokenValue::Text(text.clone());
            return Ok(Token::new(TokenKind::Whitespace, value, text, start));
        }

        match first {
            '/' if o.slash_comment => match self.peek()? {
                Some('/') => {
                    self.read()?;
                    text.push('/');
                    self.line_comment(text, start)
                }
                Some('*') => {
                    self.read()?;
                    text.push('*');
                    self.block_comment(text, start)
                }
                _ => Ok(generic(first, start)),
            },
            '#' if o.hash_comment => self.line_comment(text, start),
            '"' | '\'' if o.strings => self.string(first, text, start),
            '[' if o.sets => self.set(text, start),
            '+' | '-' => match self.peek()? {
                Some(d) if d.is_ascii_digit() => {
                    self.read()?;
                    text.push(d);
                    self.number(d, text, start)
                }
                _ => Ok(generic(first, start)),
            },
            c if c.is_ascii_digit() => self.number(c, text, start),
            c if is_identifier_start(o.identifiers, c) => {
                let mode = o.identifiers;
                self.take_while(&mut text, |c| is_identifier_continue(mode, c))?;
                let value = TokenValue::Text(text.clone());
                Ok(Token::new(TokenKind::Identifier, value, text, start))
            }
            _ => Ok(generic(first, start)),
        }
    }

    fn line_comment(&mut self, mut text: String, start: Position) -> Result<Token, ScanError> {
        let opener = text.len();
        self.take_while(&mut text, |c| c != '\n')?;
        let value = TokenValue::Text(text[opener..].to_owned());
        Ok(Token::new(TokenKind::Comment, value, text, start))
    }

    fn block_comment(&mut self, mut text: String, start: Position) -> Result<Token, ScanError> {
        let mut depth = 1usize;
        let mut prev = '\0';
        while depth > 0 {
            let (c, _) = self
                .read()?
                .ok_or_else(|| ScanError::new(ScanErrorKind::UnexpectedEndOfComment, start))?;
            text.push(c);
            if prev == '*' && c == '/' {
                depth -= 1;
                prev = '\0';
            } else if prev == '/' && c == '*' && self.options.nested_comments {
                depth += 1;
                prev = '\0';
            } else {
                prev = c;
            }
        }
        let value = TokenValue::Text(text[2..text.len() - 2].to_owned());
        Ok(Token::new(TokenKind::Comment, value, text, start))
    }

    fn string(&mut self, quote: char, mut text: String, start: Position) -> Result<Token, ScanError> {
        let unterminated = || ScanError::new(ScanErrorKind::UnexpectedEndOfString, start);
        let mut value = String::new();
        loop {
            let (c, _) = self.read()?.ok_or_else(unterminated)?;
            text.push(c);
            if c == quote {
                break;
            }
            if c != '\\' || self.options.escape == Escape::Off {
                value.push(c);
                continue;
            }
            let (e, _) = self.read()?.ok_or_else(unterminated)?;
            text.push(e);
            match e {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                '0' => value.push('\0'),
                '\\' | '"' | '\'' => value.push(e),
                'u' if self.options.escape == Escape::WithUnicode => {
                    let mut hex = String::new();
                    while hex.len() < 4 {
                        match self.read()? {
                            Some((h, _)) if h.is_ascii_hexdigit() => hex.push(h),
                            Some(other) => {
                                self.unread(other);
                                break;
                            }
                            None => break,
                        }
                    }
                    text.push_str(&hex);
                    if hex.len() == 4 {
                        let ch = u32::from_str_radix(&hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .unwrap_or(REPLACEMENT_CHARACTER);
                        value.push(ch);
                    } else {
                        value.push_str("\\u");
                        value.push_str(&hex);
                    }
                }
                other => {
                    value.push('\\');
                    value.push(other);
                }
            }
        }
        let kind = if quote == '"' {
            TokenKind::DoubleString
        } else {
            TokenKind::SingleString
        };
        Ok(Token::new(kind, TokenValue::Text(value), text, start))
    }

    fn set(&mut self, mut text: String, start: Position) -> Result<Token, ScanError> {
        let unterminated = || ScanError::new(ScanErrorKind::UnexpectedEndOfSet, start);
        let mut value = String::new();
        loop {
            let (c, _) = self.read()?.ok_or_else(unterminated)?;
            text.push(c);
            if c == ']' {
                break;
            }
            if c != '\\' || self.options.escape == Escape::Off {
                value.push(c);
                continue;
            }
            let (e, _) = self.read()?.ok_or_else(unterminated)?;
            text.push(e);
            match e {
                ']' | '\\' => value.push(e),
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                other => {
                    value.push('\\');
                    value.push(other);
                }
            }
        }
        Ok(Token::new(TokenKind::Set, TokenValue::Text(value), text, start))
    }

    /// `text` holds the optional sign and the first digit.
    fn number(&mut self, first: char, mut text: String, start: Position) -> Result<Token, ScanError> {
        let o = self.options;
        if first == '0' {
            let radix = match self.peek()? {
                Some('x') | Some('X') if o.hex_literals => Some(16),
                Some('o') | Some('O') if o.oct_literals => Some(8),
                Some('b') | Some('B') if o.bin_literals => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                if let Some((marker, _)) = self.read()? {
                    text.push(marker);
                }
                return self.radix_number(radix, text, start);
            }
        }

        self.take_while(&mut text, |c| c.is_ascii_digit())?;

        let mut real = false;
        if let (Some(sep), Some(next)) = self.peek2()? {
            if o.decimal.accepts(sep) && next.is_ascii_digit() {
                self.read()?;
                text.push(sep);
                self.take_while(&mut text, |c| c.is_ascii_digit())?;
                real = true;
            }
        }

        if let Some(marker) = self.read()? {
            if marker.0 == 'e' || marker.0 == 'E' {
                match self.peek2()? {
                    (Some(d), _) if d.is_ascii_digit() => {
                        text.push(marker.0);
                        self.take_while(&mut text, |c| c.is_ascii_digit())?;
                        real = true;
                    }
                    (Some(sign), next) if sign == '+' || sign == '-' => match next {
                        Some(d) if d.is_ascii_digit() => {
                            self.read()?;
                            text.push(marker.0);
                            text.push(sign);
                            self.take_while(&mut text, |c| c.is_ascii_digit())?;
                            real = true;
                        }
                        None => {
                            return Err(ScanError::new(
                                ScanErrorKind::UnexpectedEndOfReal,
                                start,
                            ))
                        }
                        Some(_) => return Err(ScanError::new(ScanErrorKind::ErrorInReal, start)),
                    },
                    _ => self.unread(marker),
                }
            } else {
                self.unread(marker);
            }
        }

        if real {
            let normalized = text
                .chars()
                .map(|c| if o.decimal.accepts(c) { '.' } else { c })
                .collect::<String>();
            let value = normalized
                .parse::<f64>()
                .map_err(|_| ScanError::new(ScanErrorKind::ErrorInReal, start))?;
            return Ok(Token::new(TokenKind::Real, TokenValue::Real(value), text, start));
        }

        let value = text
            .parse::<i64>()
            .map_err(|_| ScanError::new(ScanErrorKind::ErrorInInteger, start))?;
        Ok(integer(value, text, start))
    }

    fn radix_number(&mut self, radix: u32, mut text: String, start: Position) -> Result<Token, ScanError> {
        let digits_start = text.len();
        let count = self.take_while(&mut text, |c| c.is_digit(radix))?;
        if count == 0 {
            let kind = if self.peek()?.is_none() {
                ScanErrorKind::UnexpectedEndOfInteger
            } else {
                ScanErrorKind::ErrorInInteger
            };
            return Err(ScanError::new(kind, start));
        }
        let magnitude = i128::from_str_radix(&text[digits_start..], radix)
            .map_err(|_| ScanError::new(ScanErrorKind::ErrorInInteger, start))?;
        let signed = if text.starts_with('-') {
            -magnitude
        } else {
            magnitude
        };
        let value = i64::try_from(signed)
            .map_err(|_| ScanError::new(ScanErrorKind::ErrorInInteger, start))?;
        Ok(integer(value, text, start))
    }
}

impl Iterator for Scanner {
    type Item = Token;

    /// Yields an [`TokenKind::Error`] token for the first scan error, then stops.
    fn next(&mut self) -> Option<Token> {
        if self.failed {
            return None;
        }
        match self.next_token(false) {
            Ok(token) => token,
            Err(err) => {
                self.failed = true;
                Some(Token::error(err))
            }
        }
    }
}

fn generic(c: char, position: Position) -> Token {
    Token::new(TokenKind::Generic, TokenValue::Char(c), c.to_string(), position)
}

fn integer(value: i64, text: String, position: Position) -> Token {
    let kind = if i32::try_from(value).is_ok() {
        TokenKind::Integer
    } else {
        TokenKind::LongInt
    };
    Token::new(kind, TokenValue::Integer(value), text, position)
}

fn is_identifier_start(mode: Identifiers, c: char) -> bool {
    match mode {
        Identifiers::Off => false,
        Identifiers::Standard => c.is_alphabetic() || c == '_',
        Identifiers::Plain => c.is_alphabetic(),
    }
}

fn is_identifier_continue(mode: Identifiers, c: char) -> bool {
    match mode {
        Identifiers::Off => false,
        Identifiers::Standard => c.is_alphanumeric() || c == '_',
        Identifiers::Plain => c.is_alphabetic(),
    }
}

#[cfg(test)]
fn kinds(text: &str, options: ScanOptions) -> Vec<TokenKind> {
    Scanner::from_text(text, options).map(|t| t.kind).collect()
}

#[test]
fn classifies_grammar_tokens() {
    use TokenKind::*;
    assert_eq!(
        kinds("abc 12 3.5 \"hi\" 'x' [a-z] // done", ScanOptions::grammar()),
        vec![
            Identifier, Whitespace, Integer, Whitespace, Real, Whitespace, DoubleString,
            Whitespace, SingleString, Whitespace, Set, Whitespace, Comment
        ]
    );
    assert_eq!(kinds("a::=b;", ScanOptions::grammar()), vec![
        Identifier, Generic, Generic, Generic, Identifier, Generic
    ]);
}

#[test]
fn integers_widen_then_fail() {
    let mut scanner = Scanner::from_text("7 3000000000 -12 99999999999999999999", ScanOptions::default());
    let mut numbers = Vec::new();
    for token in &mut scanner {
        if token.kind != TokenKind::Whitespace {
            numbers.push((token.kind, token.value));
        }
    }
    assert_eq!(
        numbers,
        vec![
            (TokenKind::Integer, TokenValue::Integer(7)),
            (TokenKind::LongInt, TokenValue::Integer(3_000_000_000)),
            (TokenKind::Integer, TokenValue::Integer(-12)),
            (TokenKind::Error, TokenValue::Error(ScanErrorKind::ErrorInInteger)),
        ]
    );
}

#[test]
fn reals_and_exponents() {
    let options = ScanOptions {
        decimal: DecimalSeparator::Char(','),
        ..ScanOptions::default()
    };
    let mut scanner = Scanner::from_text("3,25", options);
    let token = scanner.next_token(false).unwrap().unwrap();
    assert_eq!(token.value, TokenValue::Real(3.25));

    let mut scanner = Scanner::from_text("2e3", ScanOptions::default());
    assert_eq!(scanner.next_token(false).unwrap().unwrap().value, TokenValue::Real(2000.0));

    let mut scanner = Scanner::from_text("1e+", ScanOptions::default());
    assert_eq!(
        scanner.next_token(false).unwrap_err().kind,
        ScanErrorKind::UnexpectedEndOfReal
    );

    let mut scanner = Scanner::from_text("1e+x", ScanOptions::default());
    assert_eq!(scanner.next_token(false).unwrap_err().kind, ScanErrorKind::ErrorInReal);

    // a trailing separator is not part of the number
    let mut scanner = Scanner::from_text("4.x", ScanOptions::default());
    assert_eq!(scanner.next_token(false).unwrap().unwrap().value, TokenValue::Integer(4));
    assert_eq!(scanner.next_token(false).unwrap().unwrap().value, TokenValue::Char('.'));
}

#[test]
fn radix_literals() {
    let options = ScanOptions {
        hex_literals: true,
        bin_literals: true,
        ..ScanOptions::default()
    };
    let mut scanner = Scanner::from_text("0x1F 0b101", options);
    assert_eq!(scanner.next_token(false).unwrap().unwrap().value, TokenValue::Integer(31));
    scanner.next_token(false).unwrap();
    assert_eq!(scanner.next_token(false).unwrap().unwrap().value, TokenValue::Integer(5));

    let mut scanner = Scanner::from_text("0x", options);
    assert_eq!(
        scanner.next_token(false).unwrap_err().kind,
        ScanErrorKind::UnexpectedEndOfInteger
    );
}

#[test]
fn strings_unescape() {
    let options = ScanOptions {
        strings: true,
        escape: Escape::WithUnicode,
        ..ScanOptions::default()
    };
    let mut scanner = Scanner::from_text(r#""a\tb\u0041\q""#, options);
    let token = scanner.next_token(false).unwrap().unwrap();
    assert_eq!(token.kind, TokenKind::DoubleString);
    assert_eq!(token.text_value(), Some("a\tbA\\q"));
    assert_eq!(token.text, r#""a\tb\u0041\q""#);
}

#[test]
fn unterminated_constructs() {
    let mut scanner = Scanner::from_text("x \"open", ScanOptions::grammar());
    scanner.next_token(false).unwrap();
    scanner.next_token(false).unwrap();
    let err = scanner.next_token(false).unwrap_err();
    assert_eq!(err.kind, ScanErrorKind::UnexpectedEndOfString);
    assert_eq!(err.position, Position::at(1, 3, 2));

    let mut scanner = Scanner::from_text("[abc", ScanOptions::grammar());
    assert_eq!(scanner.next_token(false).unwrap_err().kind, ScanErrorKind::UnexpectedEndOfSet);

    let mut scanner = Scanner::from_text("/* a /* b */", ScanOptions::grammar());
    assert_eq!(
        scanner.next_token(false).unwrap_err().kind,
        ScanErrorKind::UnexpectedEndOfComment
    );

    // the iterator reports the error once and stops
    let tokens = Scanner::from_text("a 'b", ScanOptions::grammar()).collect::<Vec<_>>();
    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[2].kind, TokenKind::Error);
}

#[test]
fn peeking_leaves_the_token() {
    let mut scanner = Scanner::from_text("ab cd", ScanOptions::default());
    let peeked = scanner.next_token(true).unwrap();
    assert_eq!(scanner.next_token(false).unwrap(), peeked);
    assert_eq!(scanner.next_token(false).unwrap().unwrap().kind, TokenKind::Whitespace);
}

#[test]
fn decodes_utf16_with_bom() {
    let options = ScanOptions {
        encoding: Encoding::Latin1,
        detect_bom: true,
        tokens_only: true,
        ..ScanOptions::default()
    };
    let bytes = vec![0xFE, 0xFF, 0x00, b'h', 0xD8, 0x3D, 0xDE, 0x00];
    let mut scanner = Scanner::new(MemorySource::new(bytes), options);
    assert_eq!(scanner.next_char().unwrap(), Some('h'));
    assert_eq!(scanner.encoding(), Encoding::Utf16 { big_endian: true });
    assert_eq!(scanner.next_char().unwrap(), Some('\u{1F600}'));
    assert_eq!(scanner.next_char().unwrap(), None);
}

#[test]
fn scan_cap_ends_early() {
    let options = ScanOptions {
        max_scan_tokens: Some(2),
        ..ScanOptions::default()
    };
    assert_eq!(kinds("a b c", options).len(), 2);
}
