//! Leaf rules every engine knows.
//!
//! A name that is neither a registered rule nor a native function falls back to
//! this table, so grammars can say `digit+` without defining `digit`.

use crate::{
    combinators::{self, class, multiple, optional, token, UNBOUNDED},
    error::{Outcome, ParseResult},
    stream::TokenStream,
};

pub type Builtin = fn(&mut TokenStream) -> ParseResult;

const BUILTINS: &[(&str, Builtin)] = &[
    // single characters
    ("any", any as _),
    ("alpha", alpha as _),
    ("hex", hex as _),
    ("digit", digit as _),
    ("char", char_ as _),
    ("upalpha", upalpha as _),
    ("loalpha", loalpha as _),
    ("alphanum", alphanum as _),
    ("ctl", ctl as _),
    ("cr", cr as _),
    ("lf", lf as _),
    ("sp", sp as _),
    ("ht", ht as _),
    ("ws", ws as _),
    ("allws", allws as _),
    ("nonws", nonws as _),
    // runs
    ("crlf", crlf as _),
    ("to_eol", to_eol as _),
    ("to_creol", to_creol as _),
    ("not_creol", not_creol as _),
    // compounds
    ("identifier", identifier as _),
    ("plain_identifier", plain_identifier as _),
    ("string", string as _),
    ("text", text as _),
    ("integer", integer as _),
    ("number", number as _),
    ("unary", unary as _),
];

pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, f)| *f)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(name, _)| *name)
}

fn is_creol(c: char) -> bool {
    c == '\r' || c == '\n'
}

fn is_ws(c: char) -> bool {
    c == ' ' || c == '\t' || is_creol(c)
}

pub fn any(s: &mut TokenStream) -> ParseResult {
    combinators::any(s)
}

/// `[a-zA-Z]`
pub fn alpha(s: &mut TokenStream) -> ParseResult {
    class(s, |c| c.is_ascii_alphabetic())
}

/// `[a-fA-F0-9]`
pub fn hex(s: &mut TokenStream) -> ParseResult {
    class(s, |c| c.is_ascii_hexdigit())
}

pub fn digit(s: &mut TokenStream) -> ParseResult {
    class(s, |c| c.is_ascii_digit())
}

/// `[#x0-#x80]`
pub fn char_(s: &mut TokenStream) -> ParseResult {
    class(s, |c| u32::from(c) <= 0x80)
}

pub fn upalpha(s: &mut TokenStream) -> ParseResult {
    class(s, |c| c.is_ascii_uppercase())
}

pub fn loalpha(s: &mut TokenStream) -> ParseResult {
    class(s, |c| c.is_ascii_lowercase())
}

pub fn alphanum(s: &mut TokenStream) -> ParseResult {
    class(s, |c| c.is_ascii_alphanumeric())
}

/// `[#x0-#x1f#x7f]`
pub fn ctl(s: &mut TokenStream) -> ParseResult {
    class(s, |c| c.is_ascii_control())
}

pub fn cr(s: &mut TokenStream) -> ParseResult {
    token(s, '\r')
}

pub fn lf(s: &mut TokenStream) -> ParseResult {
    token(s, '\n')
}

pub fn sp(s: &mut TokenStream) -> ParseResult {
    token(s, ' ')
}

pub fn ht(s: &mut TokenStream) -> ParseResult {
    token(s, '\t')
}

/// A space or a tab.
pub fn ws(s: &mut TokenStream) -> ParseResult {
    class(s, |c| c == ' ' || c == '\t')
}

/// A space, tab, CR or LF.
pub fn allws(s: &mut TokenStream) -> ParseResult {
    class(s, is_ws)
}

pub fn nonws(s: &mut TokenStream) -> ParseResult {
    class(s, |c| !is_ws(c))
}

pub fn crlf(s: &mut TokenStream) -> ParseResult {
    combinators::tokens(s, "\r\n", false)
}

/// `[^#xa]* [#xa]`
pub fn to_eol(s: &mut TokenStream) -> ParseResult {
    combinators::and(
        s,
        &mut [
            &mut |s: &mut TokenStream| multiple(s, |s| class(s, |c| c != '\n'), 0, UNBOUNDED),
            &mut lf,
        ],
    )
}

/// `[^#xa#xd]* [#xa#xd]`
pub fn to_creol(s: &mut TokenStream) -> ParseResult {
    combinators::and(s, &mut [&mut not_creol, &mut |s: &mut TokenStream| class(s, is_creol)])
}

/// `[^#xa#xd]*`
pub fn not_creol(s: &mut TokenStream) -> ParseResult {
    multiple(s, |s| class(s, |c| !is_creol(c)), 0, UNBOUNDED)
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`
pub fn identifier(s: &mut TokenStream) -> ParseResult {
    if class(s, |c| c.is_ascii_alphabetic() || c == '_')? == Outcome::NoMatch {
        return Ok(Outcome::NoMatch);
    }
    multiple(
        s,
        |s| class(s, |c| c.is_ascii_alphanumeric() || c == '_'),
        0,
        UNBOUNDED,
    )
}

/// `[a-zA-Z]+`
pub fn plain_identifier(s: &mut TokenStream) -> ParseResult {
    multiple(s, alpha, 1, UNBOUNDED)
}

/// A double quoted string; `\"` does not end it.
pub fn string(s: &mut TokenStream) -> ParseResult {
    let start = s.token_pos();
    if token(s, '"')? == Outcome::NoMatch {
        return Ok(Outcome::NoMatch);
    }
    loop {
        match s.next_token()? {
            Some('"') => return Ok(Outcome::Match),
            Some('\\') => {
                if s.next_token()?.is_none() {
                    break;
                }
            }
            Some(_) => {}
            None => break,
        }
    }
    s.push_back_tokens(s.token_pos() - start)?;
    Ok(Outcome::NoMatch)
}

/// One or more characters that aren't whitespace.
pub fn text(s: &mut TokenStream) -> ParseResult {
    multiple(s, nonws, 1, UNBOUNDED)
}

fn sign(s: &mut TokenStream) -> ParseResult {
    optional(s, |s| class(s, |c| c == '-' || c == '+'))
}

fn digits(s: &mut TokenStream) -> ParseResult {
    multiple(s, digit, 1, UNBOUNDED)
}

/// `('-' | '+')? digit+`
pub fn integer(s: &mut TokenStream) -> ParseResult {
    combinators::and(s, &mut [&mut sign, &mut digits])
}

/// `digit+ ('.' digit*)?`
pub fn unary(s: &mut TokenStream) -> ParseResult {
    combinators::and(
        s,
        &mut [
            &mut digits,
            &mut |s: &mut TokenStream| {
                optional(s, |s| {
                    combinators::and(
                        s,
                        &mut [
                            &mut |s: &mut TokenStream| token(s, '.'),
                            &mut |s: &mut TokenStream| multiple(s, digit, 0, UNBOUNDED),
                        ],
                    )
                })
            },
        ],
    )
}

/// `('-' | '+')? digit+ ('.' digit*)? ([eE] ('-' | '+')? digit+)?`
pub fn number(s: &mut TokenStream) -> ParseResult {
    combinators::and(
        s,
        &mut [
            &mut sign,
            &mut unary,
            &mut |s: &mut TokenStream| {
                optional(s, |s| {
                    combinators::and(
                        s,
                        &mut [
                            &mut |s: &mut TokenStream| class(s, |c| c == 'e' || c == 'E'),
                            &mut sign,
                            &mut digits,
                        ],
                    )
                })
            },
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// How much of `input` the builtin called `name` consumes, if it matches.
    fn run(name: &str, input: &str) -> Option<String> {
        let mut s = TokenStream::from_text(input);
        let f = lookup(name).unwrap();
        match f(&mut s).unwrap() {
            Outcome::Match => Some(s.token_data(0, s.token_pos()).unwrap()),
            Outcome::NoMatch => {
                assert_eq!(s.token_pos(), 0, "{} did not rewind on {:?}", name, input);
                None
            }
        }
    }

    #[test]
    fn single_characters() {
        assert_eq!(run("alpha", "q1"), Some("q".to_owned()));
        assert_eq!(run("alpha", "1q"), None);
        assert_eq!(run("hex", "Fz"), Some("F".to_owned()));
        assert_eq!(run("upalpha", "a"), None);
        assert_eq!(run("ctl", "\u{7f}"), Some("\u{7f}".to_owned()));
        assert_eq!(run("ws", "\n"), None);
        assert_eq!(run("allws", "\n"), Some("\n".to_owned()));
        assert_eq!(run("any", ""), None);
    }

    #[test]
    fn line_ends() {
        assert_eq!(run("to_eol", "abc\ndef"), Some("abc\n".to_owned()));
        assert_eq!(run("to_eol", "abc"), None);
        assert_eq!(run("to_creol", "ab\r\n"), Some("ab\r".to_owned()));
        assert_eq!(run("not_creol", "\r\n"), Some(String::new()));
        assert_eq!(run("crlf", "\r\n"), Some("\r\n".to_owned()));
    }

    #[test]
    fn compounds() {
        assert_eq!(run("identifier", "_a1 b"), Some("_a1".to_owned()));
        assert_eq!(run("identifier", "1a"), None);
        assert_eq!(run("plain_identifier", "ab_c"), Some("ab".to_owned()));
        assert_eq!(run("string", r#""a\"b" c"#), Some(r#""a\"b""#.to_owned()));
        assert_eq!(run("string", r#""open"#), None);
        assert_eq!(run("text", "GET /"), Some("GET".to_owned()));
        assert_eq!(run("integer", "-12x"), Some("-12".to_owned()));
        assert_eq!(run("integer", "-x"), None);
        assert_eq!(run("unary", "3.x"), Some("3.".to_owned()));
        assert_eq!(run("number", "+1.5e-3;"), Some("+1.5e-3".to_owned()));
        assert_eq!(run("number", "7e"), Some("7".to_owned()));
    }

    #[test]
    fn every_name_resolves() {
        for name in names() {
            assert!(lookup(name).is_some());
        }
        assert!(lookup("nope").is_none());
    }
}
