//! A rewindable stream of decoded characters.
//!
//! Everything consumed stays buffered (up to an optional history cap) so any
//! combinator can push back as far as it needs to.

use std::collections::VecDeque;

use crate::{
    combinators::{self, Backtrack, CharStream},
    error::{ParseError, ParseResult},
    position::Position,
    scan::{ScanOptions, Scanner},
    source::{ByteSource, MemorySource},
};

#[derive(Debug, Clone, Copy)]
struct Unit {
    ch: char,
    position: Position,
}

#[derive(Debug)]
pub struct TokenStream {
    scanner: Scanner,
    /// Consumed and read-ahead characters; `units[0]` sits at absolute position `base`.
    units: VecDeque<Unit>,
    base: usize,
    cursor: usize,
    /// The scanner reported a clean end.
    finished: bool,
    max_history: Option<usize>,
}

impl TokenStream {
    pub fn new(scanner: Scanner) -> Self {
        Self {
            scanner,
            units: VecDeque::new(),
            base: 0,
            cursor: 0,
            finished: false,
            max_history: None,
        }
    }

    pub fn from_source<S: ByteSource + 'static>(source: S, options: ScanOptions) -> Self {
        Self::new(Scanner::new(source, options))
    }

    pub fn from_text(text: &str) -> Self {
        Self::from_source(MemorySource::new(text), ScanOptions::default())
    }

    /// Keep at most this many consumed characters for pushing back.
    pub fn set_max_history(&mut self, max: Option<usize>) {
        self.max_history = max;
        self.trim();
    }

    pub fn source_name(&self) -> &str {
        self.scanner.source_name()
    }

    /// Absolute index of the next character.
    pub fn token_pos(&self) -> usize {
        self.cursor
    }

    /// Line and column of the next character.
    pub fn position(&self) -> Position {
        match self.units.get(self.cursor - self.base) {
            Some(unit) => unit.position,
            None => self.scanner.position(),
        }
    }

    pub fn line(&self) -> usize {
        self.position().line
    }

    pub fn column(&self) -> usize {
        self.position().column
    }

    fn buffered_end(&self) -> usize {
        self.base + self.units.len()
    }

    /// Make sure `count` characters are buffered past the cursor, if the input has them.
    fn fill(&mut self, count: usize) -> Result<bool, ParseError> {
        while self.buffered_end() < self.cursor + count {
            if self.finished {
                return Ok(false);
            }
            let position = self.scanner.position();
            match self.scanner.next_char()? {
                Some(ch) => self.units.push_back(Unit { ch, position }),
                None => self.finished = true,
            }
        }
        Ok(true)
    }

    fn trim(&mut self) {
        if let Some(max) = self.max_history {
            while self.cursor - self.base > max {
                self.units.pop_front();
                self.base += 1;
            }
        }
    }

    /// With `min_count == 0`, whether the stream is still active. Otherwise whether at
    /// least `min_count` more characters can be read.
    pub fn has_data(&mut self, min_count: usize) -> Result<bool, ParseError> {
        if min_count == 0 {
            return Ok(!self.finished || self.cursor < self.buffered_end());
        }
        self.fill(min_count)
    }

    pub fn next_token(&mut self) -> Result<Option<char>, ParseError> {
        if !self.fill(1)? {
            return Ok(None);
        }
        let unit = self.units[self.cursor - self.base];
        self.cursor += 1;
        self.trim();
        Ok(Some(unit.ch))
    }

    pub fn peek_token(&mut self) -> Result<Option<char>, ParseError> {
        if !self.fill(1)? {
            return Ok(None);
        }
        Ok(Some(self.units[self.cursor - self.base].ch))
    }

    /// Rewind by `count` characters.
    pub fn push_back_tokens(&mut self, count: usize) -> Result<(), ParseError> {
        let available = self.cursor - self.base;
        if count > available {
            return Err(ParseError::InvalidRewind { count, available });
        }
        self.cursor -= count;
        Ok(())
    }

    /// Consume buffered characters until the cursor reaches `pos` again.
    pub fn advance_to(&mut self, pos: usize) -> Result<(), ParseError> {
        while self.cursor < pos {
            if self.next_token()?.is_none() {
                return Err(ParseError::OutOfHistory {
                    start: self.cursor,
                    end: pos,
                });
            }
        }
        Ok(())
    }

    /// Consume `literal` if it comes next, otherwise consume nothing.
    pub fn check_tokens(&mut self, literal: &str, case_insensitive: bool) -> Result<bool, ParseError> {
        Ok(combinators::tokens(self, literal, case_insensitive)?.is_match())
    }

    /// The `len` characters starting at absolute position `start`.
    pub fn token_data(&self, start: usize, len: usize) -> Result<String, ParseError> {
        let end = start + len;
        if start < self.base || end > self.buffered_end() {
            return Err(ParseError::OutOfHistory { start, end });
        }
        Ok(self
            .units
            .range(start - self.base..end - self.base)
            .map(|unit| unit.ch)
            .collect())
    }

    /// Skip spaces and tabs.
    pub fn skip_ws(&mut self) -> Result<usize, ParseError> {
        self.skip_while(|c| c == ' ' || c == '\t')
    }

    /// Skip all whitespace, line breaks included.
    pub fn skip_all_ws(&mut self) -> Result<usize, ParseError> {
        self.skip_while(char::is_whitespace)
    }

    fn skip_while<P: Fn(char) -> bool>(&mut self, pred: P) -> Result<usize, ParseError> {
        let mut count = 0;
        while let Some(c) = self.peek_token()? {
            if !pred(c) {
                break;
            }
            self.next_token()?;
            count += 1;
        }
        Ok(count)
    }

    /// Match a single character.
    pub fn parse_token(&mut self, expected: char) -> ParseResult {
        combinators::token(self, expected)
    }
}

impl Backtrack for TokenStream {
    fn token_pos(&self) -> usize {
        self.cursor
    }

    fn push_back_tokens(&mut self, count: usize) -> Result<(), ParseError> {
        TokenStream::push_back_tokens(self, count)
    }
}

impl CharStream for TokenStream {
    fn next_token(&mut self) -> Result<Option<char>, ParseError> {
        TokenStream::next_token(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Outcome;

    #[test]
    fn push_back_replays_characters() {
        let mut stream = TokenStream::from_text("héllo");
        assert_eq!(stream.next_token().unwrap(), Some('h'));
        assert_eq!(stream.next_token().unwrap(), Some('é'));
        assert_eq!(stream.token_pos(), 2);
        stream.push_back_tokens(2).unwrap();
        assert_eq!(stream.token_pos(), 0);
        assert_eq!(stream.next_token().unwrap(), Some('h'));

        assert_eq!(
            stream.push_back_tokens(5),
            Err(ParseError::InvalidRewind {
                count: 5,
                available: 1
            })
        );
    }

    #[test]
    fn check_tokens_is_all_or_nothing() {
        let mut stream = TokenStream::from_text("GET /index");
        assert!(!stream.check_tokens("GEX", false).unwrap());
        assert_eq!(stream.token_pos(), 0);
        assert!(stream.check_tokens("get", true).unwrap());
        assert_eq!(stream.token_pos(), 3);
        assert_eq!(stream.token_data(0, 3).unwrap(), "GET");
        assert_eq!(stream.parse_token(' ').unwrap(), Outcome::Match);
    }

    #[test]
    fn tracks_lines_and_end() {
        let mut stream = TokenStream::from_text("a\nbc");
        assert!(stream.has_data(4).unwrap());
        assert!(!stream.has_data(5).unwrap());
        stream.next_token().unwrap();
        stream.next_token().unwrap();
        assert_eq!((stream.line(), stream.column()), (2, 1));
        stream.advance_to(4).unwrap();
        assert!(!stream.has_data(0).unwrap());
        assert_eq!(stream.next_token().unwrap(), None);
        assert_eq!(stream.position(), Position::at(2, 3, 4));
    }

    #[test]
    fn history_cap_limits_rewinds() {
        let mut stream = TokenStream::from_text("abcdef");
        stream.set_max_history(Some(2));
        for _ in 0..5 {
            stream.next_token().unwrap();
        }
        assert!(stream.push_back_tokens(2).is_ok());
        assert!(stream.push_back_tokens(1).is_err());
        assert!(stream.token_data(0, 1).is_err());
    }
}
