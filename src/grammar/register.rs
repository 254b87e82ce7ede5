//! Splitting grammar text into rules and compressing their bodies.

use std::ops::Range;

use crate::{
    error::{Construct, ParseError},
    intern::Identifiers,
    position::Position,
    scan::{ScanError, ScanErrorKind, ScanOptions, Scanner, TokenKind},
};

/// A `name ::= body` pair waiting to be compiled.
#[derive(Debug, Clone)]
pub(crate) struct PendingRule {
    /// 1-based place in its batch.
    pub number: usize,
    pub name: String,
    /// Compressed body text.
    pub body: String,
    /// Where each character of `body` came from in the grammar text.
    pub map: Vec<Position>,
    /// Character range of the whole rule in the grammar text.
    pub span: Range<usize>,
    pub end: Position,
    /// Set when the rule couldn't even be split out of the text.
    pub error: Option<ParseError>,
}

impl PendingRule {
    /// Grammar text position of a character of the compressed body.
    pub fn locate(&self, offset: usize) -> Position {
        self.map.get(offset).copied().unwrap_or(self.end)
    }
}

/// Collects one rule while its tokens go by.
#[derive(Default)]
struct Collector {
    /// Raw text before `::=`.
    head: String,
    start: Option<Position>,
    in_body: bool,
    body: String,
    map: Vec<Position>,
}

impl Collector {
    fn is_blank(&self) -> bool {
        !self.in_body && self.head.trim().is_empty()
    }

    fn write(&mut self, text: &str, at: Position) {
        for c in text.chars() {
            self.body.push(c);
            self.map.push(at);
        }
    }

    fn finish(self, number: usize, end: Position, failure: Option<ParseError>) -> PendingRule {
        let start = self.start.unwrap_or(end);
        let name = if self.in_body {
            self.head[..self.head.len() - 3].trim().to_owned()
        } else {
            String::new()
        };
        let error = failure.or_else(|| {
            let message = if !self.in_body {
                Some("missing '::='")
            } else if name.is_empty() {
                Some("missing rule name")
            } else if name.contains(char::is_whitespace) {
                Some("rule name must be a single identifier")
            } else if self.body.trim().is_empty() {
                Some("empty rule body")
            } else {
                None
            };
            message.map(|message| ParseError::MalformedGrammar {
                rule: if name.is_empty() { self.head.trim().to_owned() } else { name.clone() },
                message: message.to_owned(),
                position: start,
            })
        });
        PendingRule {
            number,
            name,
            body: self.body.trim_end().to_owned(),
            map: self.map,
            span: start.offset..end.offset,
            end,
            error,
        }
    }
}

/// Split `text` into rules, interning identifiers and literals on the way.
///
/// A rule ends at `;` or at the end of the text. Scanning stops at the first construct
/// that never closes; that rule comes back with its error set.
pub(crate) fn split_rules(text: &str, identifiers: &mut Identifiers) -> Vec<PendingRule> {
    let chars = text.chars().collect::<Vec<_>>();
    let mut scanner = Scanner::from_text(text, ScanOptions::grammar());
    let mut rules = Vec::new();
    let mut rule = Collector::default();

    loop {
        let token = match scanner.next_token(false) {
            Ok(Some(token)) => token,
            Ok(None) => break,
            Err(err) => {
                let name = if rule.in_body {
                    rule.head[..rule.head.len() - 3].trim().to_owned()
                } else {
                    rule.head.trim().to_owned()
                };
                let body = render(&rule.body, identifiers);
                let failure = scan_failure(err, &chars, name, body);
                if rule.start.is_none() {
                    rule.start = failure.position();
                }
                let end = scanner.position();
                rules.push(rule.finish(rules.len() + 1, end, Some(failure)));
                return rules;
            }
        };

        if token.kind == TokenKind::Generic && token.text == ";" {
            let end = scanner.position();
            if !rule.is_blank() {
                rules.push(rule.finish(rules.len() + 1, end, None));
            }
            rule = Collector::default();
            continue;
        }
        if rule.start.is_none() && token.kind != TokenKind::Whitespace && token.kind != TokenKind::Comment
        {
            rule.start = Some(token.position);
        }

        if !rule.in_body {
            if token.kind != TokenKind::Comment {
                rule.head.push_str(&token.text);
            }
            if rule.head.ends_with("::=") {
                rule.in_body = true;
            }
            continue;
        }

        let at = token.position;
        match token.kind {
            TokenKind::Identifier => {
                let name = token.text_value().unwrap_or(token.text.as_str());
                let compressed = identifiers.compressed(name);
                rule.write(&compressed, at);
            }
            TokenKind::DoubleString => {
                let literal = token.text_value().unwrap_or_default();
                let compressed = identifiers.compressed(literal);
                rule.write(&format!("\"{}\"", compressed), at);
            }
            TokenKind::SingleString => {
                let literal = token.text_value().unwrap_or_default();
                rule.write(&format!("'{}'", escape(literal, '\'')), at);
            }
            TokenKind::Set => {
                let members = token.text_value().unwrap_or_default();
                rule.write(&format!("[{}]", escape(members, ']')), at);
            }
            TokenKind::Whitespace => {
                if !rule.body.is_empty() && !rule.body.ends_with(' ') {
                    rule.write(" ", at);
                }
            }
            // block comments stay so the rule renders the way it was written
            TokenKind::Comment if token.text.starts_with("/*") => rule.write(&token.text, at),
            TokenKind::Comment => {}
            _ => rule.write(&token.text, at),
        }
    }

    if !rule.is_blank() {
        let end = scanner.position();
        rules.push(rule.finish(rules.len() + 1, end, None));
    }
    rules
}

fn scan_failure(err: ScanError, chars: &[char], rule: String, body: String) -> ParseError {
    let position = err.position;
    let construct = match err.kind {
        ScanErrorKind::UnexpectedEndOfString => match chars.get(position.offset) {
            Some('\'') => Construct::SingleQuote,
            _ => Construct::DoubleQuote,
        },
        ScanErrorKind::UnexpectedEndOfSet => Construct::Set,
        ScanErrorKind::UnexpectedEndOfComment => Construct::Comment,
        kind => {
            return ParseError::MalformedGrammar {
                rule,
                message: kind.to_string(),
                position,
            }
        }
    };
    ParseError::UnbalancedConstruct {
        rule,
        construct,
        position,
        body,
    }
}

/// Backslash-escape `close`, backslashes and line breaks.
fn escape(text: &str, close: char) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == close => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Copy a quoted run (opening delimiter already consumed) up to and including `close`.
fn copy_quoted<I: Iterator<Item = char>>(chars: &mut I, close: char, out: &mut String) {
    while let Some(c) = chars.next() {
        out.push(c);
        if c == close {
            return;
        }
        if c == '\\' {
            if let Some(e) = chars.next() {
                out.push(e);
            }
        }
    }
}

/// Write a compressed body back with the names it stands for.
pub(crate) fn render(body: &str, identifiers: &Identifiers) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '[' => {
                out.push(c);
                copy_quoted(&mut chars, if c == '[' { ']' } else { '\'' }, &mut out);
            }
            '"' => {
                let mut token = String::new();
                while let Some(t) = chars.next_if(|&t| t != '"') {
                    token.push(t);
                }
                chars.next();
                let literal = identifiers.uncompressed(&token).unwrap_or(&token);
                out.push('"');
                out.push_str(&escape(literal, '"'));
                out.push('"');
            }
            '/' if chars.peek() == Some(&'*') => {
                out.push(c);
                let mut depth = 0usize;
                let mut prev = '/';
                for c in &mut chars {
                    out.push(c);
                    if prev == '/' && c == '*' {
                        depth += 1;
                        prev = '\0';
                    } else if prev == '*' && c == '/' {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                        prev = '\0';
                    } else {
                        prev = c;
                    }
                }
            }
            c if c.is_ascii_alphabetic() => {
                let mut token = c.to_string();
                while let Some(t) = chars.next_if(char::is_ascii_alphabetic) {
                    token.push(t);
                }
                out.push_str(identifiers.uncompressed(&token).unwrap_or(&token));
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_compresses() {
        let mut ids = Identifiers::new();
        let rules = split_rules(
            "digits ::= digit+ ;\n// note\nword ::= \"GET\" | 'a;b' [a-z\\]] ;",
            &mut ids,
        );
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|r| r.error.is_none()));

        assert_eq!(rules[0].name, "digits");
        assert_eq!(rules[0].body, format!("{}+", ids.compressed("digit")));
        assert_eq!(rules[1].name, "word");
        assert_eq!(rules[1].number, 2);
        assert_eq!(render(&rules[1].body, &ids), "\"GET\" | 'a;b' [a-z\\]]");
        assert_eq!(rules[1].locate(0), Position::at(3, 10, 37));
    }

    #[test]
    fn a_trailing_rule_needs_no_semicolon() {
        let mut ids = Identifiers::new();
        let rules = split_rules("a ::= b ; c ::= d", &mut ids);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].name, "c");
        assert_eq!(rules[1].span, 10..17);
    }

    #[test]
    fn unterminated_strings_stop_the_batch() {
        let mut ids = Identifiers::new();
        let rules = split_rules("a ::= \"x ;\nb ::= y ;", &mut ids);
        assert_eq!(rules.len(), 1);
        match &rules[0].error {
            Some(ParseError::UnbalancedConstruct {
                rule,
                construct,
                position,
                ..
            }) => {
                assert_eq!(rule, "a");
                assert_eq!(*construct, Construct::DoubleQuote);
                assert_eq!((position.line, position.column), (1, 7));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_heads_are_reported() {
        let mut ids = Identifiers::new();
        let rules = split_rules("just words ; ::= x ; a ::= ;", &mut ids);
        let messages = rules
            .iter()
            .map(|r| match &r.error {
                Some(ParseError::MalformedGrammar { message, .. }) => message.as_str(),
                _ => "ok",
            })
            .collect::<Vec<_>>();
        assert_eq!(messages, vec!["missing '::='", "missing rule name", "empty rule body"]);
    }

    #[test]
    fn block_comments_survive_rendering() {
        let mut ids = Identifiers::new();
        let rules = split_rules("a ::= b /* why /* not */ */ c", &mut ids);
        assert_eq!(render(&rules[0].body, &ids), "b /* why /* not */ */ c");
    }
}
