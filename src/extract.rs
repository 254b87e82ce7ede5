//! Pulling strings out of text with a grammar.
//!
//! Two native rules are registered next to the grammar: `push` takes the text
//! consumed since the last `$` checkpoint, and `push_string` matches a double quoted
//! string and takes its unescaped contents. Values taken inside a branch that later
//! fails are dropped again.
//!
//! ```
//! # use bnf_router::extract::StringParser;
//! let mut parser = StringParser::new(
//!     "args ::= arg (ws+ arg)* ; arg ::= push_string | $ word push ; word ::= [^ \"]+ ;",
//! )
//! .unwrap();
//! let args = parser.parse_arguments("args", r#"open "my file.txt" now"#).unwrap();
//! assert_eq!(args.unwrap(), vec!["open", "my file.txt", "now"]);
//! ```

use crate::{
    builtins, Checkpoint, Engine, GrammarError, ItemId, Outcome, ParseError, ParseResult,
    RejectHook,
};

/// Values taken so far, tagged with the item id that guards them.
pub type Captures = Vec<(ItemId, String)>;

#[derive(Debug)]
pub struct StringParser {
    engine: Engine<Captures>,
}

impl StringParser {
    pub fn new(bnf: &str) -> Result<Self, GrammarError> {
        let mut engine = Engine::<Captures>::new();
        engine.register_function("push", push, true);
        engine.register_function("push_string", push_string, true);
        engine.set_reject_hook(Some(forget_captures as RejectHook<Captures>));
        engine.register_rules(bnf, "<bnf>", true)?;
        Ok(Self { engine })
    }

    pub fn engine(&self) -> &Engine<Captures> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<Captures> {
        &mut self.engine
    }

    /// Run `rule` over `input`. `None` if it doesn't match.
    pub fn parse_arguments(
        &mut self,
        rule: &str,
        input: &str,
    ) -> Result<Option<Vec<String>>, ParseError> {
        self.engine.set_input_text(input);
        self.engine.context_mut().clear();

        let matched = self.engine.parse_rule(rule)?;
        let captures = std::mem::take(self.engine.context_mut());
        Ok(match matched {
            Outcome::Match => Some(captures.into_iter().map(|(_, value)| value).collect()),
            Outcome::NoMatch => None,
        })
    }
}

fn capture(engine: &mut Engine<Captures>, value: String) {
    // an accepted checkpoint ties the value to this branch
    let id = engine.push_token_pos(true);
    engine.context_mut().push((id, value));
}

fn push(engine: &mut Engine<Captures>) -> ParseResult {
    let value = engine.pushed_token_data()?;
    capture(engine, value);
    Ok(Outcome::Match)
}

fn push_string(engine: &mut Engine<Captures>) -> ParseResult {
    let start = engine.token_pos();
    if builtins::string(engine.stream_mut())? == Outcome::NoMatch {
        return Ok(Outcome::NoMatch);
    }
    let quoted = engine.token_data_from(start)?;
    capture(engine, unquote(&quoted));
    Ok(Outcome::Match)
}

fn forget_captures(captures: &mut Captures, rolled_back: &Checkpoint) -> bool {
    captures.retain(|(id, _)| *id < rolled_back.item_id);
    true
}

fn unquote(quoted: &str) -> String {
    let inner = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(quoted);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(e) => out.push(e),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abandoned_branches_leave_no_values() {
        // the first branch captures "a" and then fails on the missing '!'
        let mut parser = StringParser::new("r ::= $ alpha push '!' | $ alpha push '?' ;").unwrap();
        let values = parser.parse_arguments("r", "a?").unwrap();
        assert_eq!(values, Some(vec!["a".to_owned()]));
        assert!(parser.engine().checkpoints().iter().all(|cp| cp.accepted));
    }

    #[test]
    fn quoted_strings_are_unescaped() {
        let mut parser = StringParser::new("r ::= push_string (',' push_string)* ;").unwrap();
        let values = parser.parse_arguments("r", r#""a\"b","c\td""#).unwrap();
        assert_eq!(values, Some(vec!["a\"b".to_owned(), "c\td".to_owned()]));
    }

    #[test]
    fn no_match_gives_none() {
        let mut parser = StringParser::new("r ::= $ digit+ push ;").unwrap();
        assert_eq!(parser.parse_arguments("r", "abc").unwrap(), None);
        assert_eq!(
            parser.parse_arguments("r", "42 abc").unwrap(),
            Some(vec!["42".to_owned()])
        );
    }

    #[test]
    fn push_needs_a_checkpoint() {
        let mut parser = StringParser::new("r ::= alpha push ;").unwrap();
        assert_eq!(
            parser.parse_arguments("r", "a"),
            Err(ParseError::NoCheckpoint)
        );
    }
}
