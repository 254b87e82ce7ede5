//! Backtracking parse combinators.
//!
//! These work on anything that can report and rewind its position, so the same
//! functions drive the meta-grammar over rule text and user rules over input.
//! Every combinator leaves the cursor where it found it when it returns
//! [`Outcome::NoMatch`].

use crate::error::{Outcome, ParseError, ParseResult};

/// Use as `max` for repetitions without an upper bound.
pub const UNBOUNDED: usize = usize::MAX;

pub trait Backtrack {
    fn token_pos(&self) -> usize;

    fn push_back_tokens(&mut self, count: usize) -> Result<(), ParseError>;

    fn rewind_to(&mut self, pos: usize) -> Result<(), ParseError> {
        let now = self.token_pos();
        if now > pos {
            self.push_back_tokens(now - pos)
        } else {
            Ok(())
        }
    }
}

pub trait CharStream: Backtrack {
    fn next_token(&mut self) -> Result<Option<char>, ParseError>;
}

/// Match every part in order, or nothing.
pub fn and<S: Backtrack + ?Sized>(
    s: &mut S,
    parts: &mut [&mut dyn FnMut(&mut S) -> ParseResult],
) -> ParseResult {
    let start = s.token_pos();
    for part in parts.iter_mut() {
        if part(s)? == Outcome::NoMatch {
            s.rewind_to(start)?;
            return Ok(Outcome::NoMatch);
        }
    }
    Ok(Outcome::Match)
}

/// The first part that matches wins; later parts are not tried.
pub fn or<S: Backtrack + ?Sized>(
    s: &mut S,
    parts: &mut [&mut dyn FnMut(&mut S) -> ParseResult],
) -> ParseResult {
    let start = s.token_pos();
    for part in parts.iter_mut() {
        match part(s)? {
            Outcome::Match => return Ok(Outcome::Match),
            Outcome::NoMatch => s.rewind_to(start)?,
        }
    }
    Ok(Outcome::NoMatch)
}

/// Match `f` at least `min` and at most `max` times.
///
/// A match that consumes nothing ends the loop and counts as satisfying `min`.
pub fn multiple<S, F>(s: &mut S, mut f: F, min: usize, max: usize) -> ParseResult
where
    S: Backtrack + ?Sized,
    F: FnMut(&mut S) -> ParseResult,
{
    let start = s.token_pos();
    let mut count = 0;
    while count < max {
        let before = s.token_pos();
        match f(s)? {
            Outcome::Match => {
                count += 1;
                if s.token_pos() == before {
                    count = count.max(min);
                    break;
                }
            }
            Outcome::NoMatch => {
                s.rewind_to(before)?;
                break;
            }
        }
    }
    if count >= min {
        Ok(Outcome::Match)
    } else {
        s.rewind_to(start)?;
        Ok(Outcome::NoMatch)
    }
}

/// Run `f`, rewinding if it doesn't match.
pub fn attempt<S, F>(s: &mut S, f: F) -> ParseResult
where
    S: Backtrack + ?Sized,
    F: FnOnce(&mut S) -> ParseResult,
{
    let start = s.token_pos();
    let result = f(s)?;
    if result == Outcome::NoMatch {
        s.rewind_to(start)?;
    }
    Ok(result)
}

/// Like [`attempt`], but a miss still matches.
pub fn optional<S, F>(s: &mut S, f: F) -> ParseResult
where
    S: Backtrack + ?Sized,
    F: FnOnce(&mut S) -> ParseResult,
{
    attempt(s, f)?;
    Ok(Outcome::Match)
}

/// Any single character.
pub fn any<S: CharStream + ?Sized>(s: &mut S) -> ParseResult {
    Ok(s.next_token()?.is_some().into())
}

/// A single character satisfying `pred`.
pub fn class<S, P>(s: &mut S, pred: P) -> ParseResult
where
    S: CharStream + ?Sized,
    P: Fn(char) -> bool,
{
    match s.next_token()? {
        Some(c) if pred(c) => Ok(Outcome::Match),
        Some(_) => {
            s.push_back_tokens(1)?;
            Ok(Outcome::NoMatch)
        }
        None => Ok(Outcome::NoMatch),
    }
}

pub fn token<S: CharStream + ?Sized>(s: &mut S, expected: char) -> ParseResult {
    class(s, |c| c == expected)
}

/// The whole of `literal`, or nothing.
pub fn tokens<S: CharStream + ?Sized>(s: &mut S, literal: &str, case_insensitive: bool) -> ParseResult {
    let start = s.token_pos();
    for expected in literal.chars() {
        let same = match s.next_token()? {
            Some(c) => chars_equal(c, expected, case_insensitive),
            None => false,
        };
        if !same {
            s.rewind_to(start)?;
            return Ok(Outcome::NoMatch);
        }
    }
    Ok(Outcome::Match)
}

pub fn set<S: CharStream + ?Sized>(s: &mut S, spec: &SetSpec) -> ParseResult {
    class(s, |c| spec.contains(c))
}

pub(crate) fn chars_equal(a: char, b: char, case_insensitive: bool) -> bool {
    a == b || (case_insensitive && a.to_lowercase().eq(b.to_lowercase()))
}

/// A parsed character set such as `^a-z#x30-#x39_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SetSpec {
    negated: bool,
    ranges: Vec<(u32, u32)>,
}

impl SetSpec {
    /// A leading `^` negates. `#xHEX` stands for a code point. `a-b` is an inclusive
    /// range; a `-` with nothing after it is literal.
    pub fn parse(spec: &str) -> Self {
        let chars = spec.chars().collect::<Vec<_>>();
        let negated = chars.first() == Some(&'^');
        let mut ranges = Vec::new();
        let mut i = if negated { 1 } else { 0 };
        while i < chars.len() {
            let (lo, next) = read_value(&chars, i);
            let (hi, next) = if next + 1 < chars.len() && chars[next] == '-' {
                read_value(&chars, next + 1)
            } else {
                (lo, next)
            };
            ranges.push((lo, hi));
            i = next;
        }
        Self { negated, ranges }
    }

    pub fn from_ranges(negated: bool, ranges: Vec<(u32, u32)>) -> Self {
        Self { negated, ranges }
    }

    pub fn negated(&self) -> bool {
        self.negated
    }

    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    pub fn contains(&self, c: char) -> bool {
        let code = u32::from(c);
        let inside = self
            .ranges
            .iter()
            .any(|&(lo, hi)| lo <= code && code <= hi);
        inside != self.negated
    }
}

/// One set member starting at `i`; returns its code point and the index after it.
fn read_value(chars: &[char], i: usize) -> (u32, usize) {
    let is_hex = chars[i] == '#'
        && chars.get(i + 1) == Some(&'x')
        && chars.get(i + 2).map_or(false, |c| c.is_ascii_hexdigit());
    if !is_hex {
        return (u32::from(chars[i]), i + 1);
    }
    let digits = chars[i + 2..]
        .iter()
        .take(8)
        .take_while(|c| c.is_ascii_hexdigit())
        .collect::<String>();
    let code = u32::from_str_radix(&digits, 16).unwrap_or(0);
    (code, i + 2 + digits.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::TokenStream;

    #[test]
    fn and_rewinds_on_a_late_miss() {
        let mut s = TokenStream::from_text("abd");
        let result = and(
            &mut s,
            &mut [
                &mut |s: &mut TokenStream| token(s, 'a'),
                &mut |s: &mut TokenStream| token(s, 'b'),
                &mut |s: &mut TokenStream| token(s, 'c'),
            ],
        );
        assert_eq!(result, Ok(Outcome::NoMatch));
        assert_eq!(s.token_pos(), 0);
    }

    #[test]
    fn or_takes_the_first_match() {
        let mut s = TokenStream::from_text("abc");
        let result = or(
            &mut s,
            &mut [
                &mut |s: &mut TokenStream| tokens(s, "a", false),
                &mut |s: &mut TokenStream| tokens(s, "ab", false),
            ],
        );
        assert_eq!(result, Ok(Outcome::Match));
        assert_eq!(s.token_pos(), 1);
    }

    #[test]
    fn multiple_respects_bounds() {
        let digit = |s: &mut TokenStream| class(s, |c| c.is_ascii_digit());

        let mut s = TokenStream::from_text("123x");
        assert_eq!(multiple(&mut s, digit, 2, 4), Ok(Outcome::Match));
        assert_eq!(s.token_pos(), 3);

        let mut s = TokenStream::from_text("12345");
        assert_eq!(multiple(&mut s, digit, 2, 4), Ok(Outcome::Match));
        assert_eq!(s.token_pos(), 4);

        let mut s = TokenStream::from_text("1xyz");
        assert_eq!(multiple(&mut s, digit, 2, 4), Ok(Outcome::NoMatch));
        assert_eq!(s.token_pos(), 0);

        // a zero-width match does not loop forever
        let mut s = TokenStream::from_text("xyz");
        let nothing = |s: &mut TokenStream| optional(s, |s| token(s, '1'));
        assert_eq!(multiple(&mut s, nothing, 3, UNBOUNDED), Ok(Outcome::Match));
        assert_eq!(s.token_pos(), 0);
    }

    #[test]
    fn set_specs() {
        let set = SetSpec::parse("a-cA-C#x30-#x39");
        for c in "bB5".chars() {
            assert!(set.contains(c), "{:?}", c);
        }
        assert!(!set.contains('x'));

        let set = SetSpec::parse("^a-c");
        assert!(!set.contains('b'));
        assert!(set.contains('x'));

        let set = SetSpec::parse("+-");
        assert!(set.contains('-'));
        assert!(set.contains('+'));
        assert!(!set.contains(','));

        assert!(!SetSpec::parse("").contains('a'));
        assert_eq!(SetSpec::parse("#x41").ranges(), &[(0x41, 0x41)]);
    }

    #[test]
    fn case_insensitive_literals() {
        let mut s = TokenStream::from_text("HeLLo");
        assert_eq!(tokens(&mut s, "hello", false), Ok(Outcome::NoMatch));
        assert_eq!(tokens(&mut s, "hello", true), Ok(Outcome::Match));
        assert_eq!(any(&mut s), Ok(Outcome::NoMatch));
    }
}
