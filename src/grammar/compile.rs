//! The meta-grammar: compressed rule text in, bytecode out.
//!
//! ```text
//! expression ::= exception+ ('|' exception+)*
//! exception  ::= control ('-' exception)?
//! control    ::= item ('+' | '*' | '?' | INTEGER | '{' INTEGER ',' INTEGER '}')?
//! item       ::= SPACE* ( IDENTIFIER | DQSTRING | QSTRING | group | SET | '$' | '@'
//!                       | '^' | '~' | HEXITEM | comment )
//! group      ::= '(' expression ')'
//! comment    ::= '/*' (comment | any)* '*/'
//! ```
//!
//! The meta-grammar is written with the same combinators user rules run on, over a
//! [`TokenStream`] of the compressed body.

use std::{collections::HashMap, convert::TryInto};

use super::{
    compression, register::render, Opcode, PendingRule, BYTE, BYTE_SIZE, OPCODE_SIZE, RULEPTR,
    RULEPTR_SIZE, STR_SIZE, SYM, SYM_SIZE, U, UNBOUNDED_COUNT, U_SIZE,
};
use crate::{
    builtins,
    combinators::{self, Backtrack, CharStream, SetSpec, UNBOUNDED},
    error::{Construct, Outcome, ParseError, ParseResult},
    intern::{self, Identifiers, Symbol},
    position::Position,
    stream::TokenStream,
};

#[allow(clippy::type_complexity)]
const COMPRESSOR: fn(HashMap<usize, Vec<u8>>) -> (Vec<u8>, Vec<(usize, usize)>) =
    compression::reverse_sort;

/// Parsed rule body.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Call(Symbol),
    Literal(Symbol),
    Set(SetSpec),
    Push,
    Accept,
    Case(bool),
    Sequence(Vec<Node>),
    Choice(Vec<Node>),
    Repeat {
        node: Box<Node>,
        min: usize,
        max: usize,
    },
    Except(Box<Node>, Box<Node>),
    Empty,
}

impl Node {
    fn sequence(items: Vec<Node>) -> Node {
        let mut items = items
            .into_iter()
            .filter(|node| *node != Node::Empty)
            .collect::<Vec<_>>();
        match items.len() {
            0 => Node::Empty,
            1 => items.remove(0),
            _ => Node::Sequence(items),
        }
    }

    fn choice(mut alternatives: Vec<Node>) -> Node {
        if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            Node::Choice(alternatives)
        }
    }
}

/// Compile a split-out rule to bytecode.
pub(crate) fn compile(rule: &PendingRule, identifiers: &mut Identifiers) -> Result<Vec<u8>, ParseError> {
    let node = MetaParser::new(rule, identifiers).parse()?;
    Builder::build(&rule.name, &node)
}

struct MetaParser<'a> {
    rule: &'a PendingRule,
    identifiers: &'a mut Identifiers,
    stream: TokenStream,
    /// Finished nodes; each construct pops what its parts pushed.
    nodes: Vec<Node>,
}

impl Backtrack for MetaParser<'_> {
    fn token_pos(&self) -> usize {
        self.stream.token_pos()
    }

    fn push_back_tokens(&mut self, count: usize) -> Result<(), ParseError> {
        self.stream.push_back_tokens(count)
    }
}

impl CharStream for MetaParser<'_> {
    fn next_token(&mut self) -> Result<Option<char>, ParseError> {
        self.stream.next_token()
    }
}

impl<'a> MetaParser<'a> {
    fn new(rule: &'a PendingRule, identifiers: &'a mut Identifiers) -> Self {
        Self {
            rule,
            identifiers,
            stream: TokenStream::from_text(&rule.body),
            nodes: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Node, ParseError> {
        let matched = self.expression()?;
        self.stream.skip_all_ws()?;
        let at = self.offset();
        match self.stream.peek_token()? {
            None if matched.is_match() => Ok(self.nodes.pop().unwrap_or(Node::Empty)),
            None => Err(self.malformed("empty rule body", at)),
            Some(')') => Err(self.unbalanced(Construct::Group, at)),
            Some('}') => Err(self.unbalanced(Construct::Braces, at)),
            Some(']') => Err(self.unbalanced(Construct::Set, at)),
            Some(c) => Err(self.malformed(format!("unexpected '{}'", c), at)),
        }
    }

    // === Errors ===

    fn offset(&self) -> usize {
        self.stream.position().offset
    }

    fn position(&self, offset: usize) -> Position {
        self.rule.locate(offset)
    }

    fn malformed<S: Into<String>>(&self, message: S, offset: usize) -> ParseError {
        ParseError::MalformedGrammar {
            rule: self.rule.name.clone(),
            message: message.into(),
            position: self.position(offset),
        }
    }

    fn unbalanced(&self, construct: Construct, offset: usize) -> ParseError {
        ParseError::UnbalancedConstruct {
            rule: self.rule.name.clone(),
            construct,
            position: self.position(offset),
            body: render(&self.rule.body, &*self.identifiers),
        }
    }

    // === Grammar ===

    fn space(&mut self) -> ParseResult {
        self.stream.skip_all_ws()?;
        Ok(Outcome::Match)
    }

    fn expression(&mut self) -> ParseResult {
        let mark = self.nodes.len();
        if self.sequence()? == Outcome::NoMatch {
            return Ok(Outcome::NoMatch);
        }
        combinators::multiple(self, Self::alternative, 0, UNBOUNDED)?;
        let alternatives = self.nodes.split_off(mark);
        self.nodes.push(Node::choice(alternatives));
        Ok(Outcome::Match)
    }

    fn alternative(&mut self) -> ParseResult {
        let bar = combinators::and(
            self,
            &mut [&mut Self::space, &mut |p: &mut Self| combinators::token(p, '|')],
        )?;
        if bar == Outcome::NoMatch {
            return Ok(Outcome::NoMatch);
        }
        let at = self.offset() - 1;
        if self.sequence()? == Outcome::NoMatch {
            return Err(self.malformed("expected an expression after '|'", at));
        }
        Ok(Outcome::Match)
    }

    fn sequence(&mut self) -> ParseResult {
        let mark = self.nodes.len();
        if combinators::multiple(self, Self::exception, 1, UNBOUNDED)? == Outcome::NoMatch {
            self.nodes.truncate(mark);
            return Ok(Outcome::NoMatch);
        }
        let items = self.nodes.split_off(mark);
        self.nodes.push(Node::sequence(items));
        Ok(Outcome::Match)
    }

    fn exception(&mut self) -> ParseResult {
        let mark = self.nodes.len();
        if self.control()? == Outcome::NoMatch {
            return Ok(Outcome::NoMatch);
        }
        let has_left = self.nodes.len() > mark;

        let minus = combinators::and(
            self,
            &mut [&mut Self::space, &mut |p: &mut Self| combinators::token(p, '-')],
        )?;
        if minus == Outcome::NoMatch {
            return Ok(Outcome::Match);
        }
        let at = self.offset() - 1;
        if self.exception()? == Outcome::NoMatch {
            return Err(self.malformed("expected an item after '-'", at));
        }

        let mut right = self.nodes.split_off(mark + has_left as usize);
        let left = if has_left { self.nodes.pop() } else { None };
        match (left, right.pop()) {
            (Some(left), Some(right)) => {
                self.nodes
                    .push(Node::Except(Box::new(left), Box::new(right)));
                Ok(Outcome::Match)
            }
            _ => Err(self.malformed("'-' needs an item on both sides", at)),
        }
    }

    fn control(&mut self) -> ParseResult {
        let mark = self.nodes.len();
        if self.item()? == Outcome::NoMatch {
            return Ok(Outcome::NoMatch);
        }

        let start = self.token_pos();
        self.stream.skip_all_ws()?;
        let at = self.offset();
        let bounds = match self.stream.peek_token()? {
            Some(c @ '+') | Some(c @ '*') | Some(c @ '?') => {
                self.stream.next_token()?;
                Some(match c {
                    '+' => (1, UNBOUNDED),
                    '*' => (0, UNBOUNDED),
                    _ => (0, 1),
                })
            }
            Some('{') => {
                self.stream.next_token()?;
                Some(self.braces(at)?)
            }
            Some(c) if c.is_ascii_digit() => {
                let count = self.integer()?;
                Some((count, count))
            }
            _ => None,
        };
        let (min, max) = match bounds {
            Some(bounds) => bounds,
            None => {
                // not ours; give the space back
                self.rewind_to(start)?;
                return Ok(Outcome::Match);
            }
        };
        match self.nodes.pop() {
            Some(node) if self.nodes.len() >= mark => {
                self.nodes.push(Node::Repeat {
                    node: Box::new(node),
                    min,
                    max,
                });
                Ok(Outcome::Match)
            }
            _ => Err(self.malformed("nothing to repeat", at)),
        }
    }

    /// `{min,max}` after the `{`.
    fn braces(&mut self, open: usize) -> Result<(usize, usize), ParseError> {
        let min = self.brace_number("min number", open)?;
        self.expect_in_braces(',', open)?;
        let max = self.brace_number("max number", open)?;
        self.expect_in_braces('}', open)?;
        if min > max {
            return Err(self.malformed("min > max in {min,max}", open));
        }
        Ok((min, max))
    }

    fn brace_number(&mut self, what: &str, open: usize) -> Result<usize, ParseError> {
        self.stream.skip_all_ws()?;
        match self.stream.peek_token()? {
            Some(c) if c.is_ascii_digit() => self.integer(),
            _ => Err(self.brace_error(what, open)?),
        }
    }

    fn expect_in_braces(&mut self, expected: char, open: usize) -> Result<(), ParseError> {
        self.stream.skip_all_ws()?;
        if self.stream.parse_token(expected)?.is_match() {
            return Ok(());
        }
        Err(self.brace_error(&format!("'{}'", expected), open)?)
    }

    /// Running off the end means the braces never closed.
    fn brace_error(&mut self, what: &str, open: usize) -> Result<ParseError, ParseError> {
        Ok(match self.stream.peek_token()? {
            None => self.unbalanced(Construct::Braces, open),
            Some(_) => self.malformed(format!("missing {} in {{min,max}}", what), self.offset()),
        })
    }

    fn integer(&mut self) -> Result<usize, ParseError> {
        let start = self.token_pos();
        let at = self.offset();
        combinators::multiple(
            &mut self.stream,
            |s| combinators::class(s, |c| c.is_ascii_digit()),
            1,
            UNBOUNDED,
        )?;
        let digits = self.stream.token_data(start, self.token_pos() - start)?;
        digits
            .parse()
            .map_err(|_| self.malformed(format!("count {} is too large", digits), at))
    }

    fn item(&mut self) -> ParseResult {
        combinators::and(self, &mut [&mut Self::space, &mut Self::primary])
    }

    fn primary(&mut self) -> ParseResult {
        combinators::or(
            self,
            &mut [
                &mut Self::identifier,
                &mut Self::double_quoted,
                &mut Self::single_quoted,
                &mut Self::group,
                &mut Self::set,
                &mut Self::marker,
                &mut Self::hex,
                &mut Self::comment,
            ],
        )
    }

    /// The compressed token at the cursor, if there is one.
    fn compressed_token(&mut self) -> Result<Option<String>, ParseError> {
        let start = self.token_pos();
        if builtins::plain_identifier(&mut self.stream)? == Outcome::NoMatch {
            return Ok(None);
        }
        Ok(Some(self.stream.token_data(start, self.token_pos() - start)?))
    }

    fn symbol_of(&self, token: String) -> Result<Symbol, ParseError> {
        intern::decode(&token)
            .filter(|&symbol| self.identifiers.name(symbol).is_some())
            .ok_or(ParseError::MissingIdentifier(token))
    }

    fn identifier(&mut self) -> ParseResult {
        let token = match self.compressed_token()? {
            Some(token) => token,
            None => return Ok(Outcome::NoMatch),
        };
        let symbol = self.symbol_of(token)?;
        self.nodes.push(Node::Call(symbol));
        Ok(Outcome::Match)
    }

    fn double_quoted(&mut self) -> ParseResult {
        let open = self.offset();
        if combinators::token(self, '"')? == Outcome::NoMatch {
            return Ok(Outcome::NoMatch);
        }
        let token = self.quoted('"', Construct::DoubleQuote, open)?;
        let symbol = self.symbol_of(token)?;
        self.nodes.push(Node::Literal(symbol));
        Ok(Outcome::Match)
    }

    fn single_quoted(&mut self) -> ParseResult {
        let open = self.offset();
        if combinators::token(self, '\'')? == Outcome::NoMatch {
            return Ok(Outcome::NoMatch);
        }
        let literal = self.quoted('\'', Construct::SingleQuote, open)?;
        if literal.is_empty() {
            self.nodes.push(Node::Empty);
        } else {
            let symbol = self.identifiers.intern(literal);
            self.nodes.push(Node::Literal(symbol));
        }
        Ok(Outcome::Match)
    }

    /// Everything up to the closing `close`, unescaped.
    fn quoted(&mut self, close: char, construct: Construct, open: usize) -> Result<String, ParseError> {
        let mut value = String::new();
        loop {
            match self.stream.next_token()? {
                None => return Err(self.unbalanced(construct, open)),
                Some(c) if c == close => return Ok(value),
                Some('\\') => match self.stream.next_token()? {
                    None => return Err(self.unbalanced(construct, open)),
                    Some(e) => value.push(unescape(e)),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn group(&mut self) -> ParseResult {
        let open = self.offset();
        if combinators::token(self, '(')? == Outcome::NoMatch {
            return Ok(Outcome::NoMatch);
        }
        let matched = self.expression()?;
        self.stream.skip_all_ws()?;
        let at = self.offset();
        match self.stream.next_token()? {
            Some(')') if matched.is_match() => Ok(Outcome::Match),
            Some(')') => Err(self.malformed("empty group", open)),
            None => Err(self.unbalanced(Construct::Group, open)),
            Some(c) => Err(self.malformed(format!("unexpected '{}' in group", c), at)),
        }
    }

    fn set(&mut self) -> ParseResult {
        let open = self.offset();
        if combinators::token(self, '[')? == Outcome::NoMatch {
            return Ok(Outcome::NoMatch);
        }
        let members = self.quoted(']', Construct::Set, open)?;
        self.nodes.push(Node::Set(SetSpec::parse(&members)));
        Ok(Outcome::Match)
    }

    fn marker(&mut self) -> ParseResult {
        let node = match self.stream.peek_token()? {
            Some('$') => Node::Push,
            Some('@') => Node::Accept,
            Some('^') => Node::Case(true),
            Some('~') => Node::Case(false),
            _ => return Ok(Outcome::NoMatch),
        };
        self.stream.next_token()?;
        self.nodes.push(node);
        Ok(Outcome::Match)
    }

    /// `#xHEX`, where `xHEX` went through compression like any identifier.
    fn hex(&mut self) -> ParseResult {
        let start = self.token_pos();
        if combinators::token(self, '#')? == Outcome::NoMatch {
            return Ok(Outcome::NoMatch);
        }
        let name = self
            .compressed_token()?
            .and_then(|token| self.identifiers.uncompressed(&token).map(str::to_owned));
        match name {
            Some(name) if is_hex_name(&name) => {
                self.nodes.push(Node::Set(SetSpec::parse(&format!("#{}", name))));
                Ok(Outcome::Match)
            }
            _ => {
                self.rewind_to(start)?;
                Ok(Outcome::NoMatch)
            }
        }
    }

    /// Comments match without leaving a node.
    fn comment(&mut self) -> ParseResult {
        let open = self.offset();
        if combinators::tokens(self, "/*", false)? == Outcome::NoMatch {
            return Ok(Outcome::NoMatch);
        }
        let mut depth = 1;
        while depth > 0 {
            if combinators::tokens(self, "*/", false)?.is_match() {
                depth -= 1;
            } else if combinators::tokens(self, "/*", false)?.is_match() {
                depth += 1;
            } else if self.stream.next_token()?.is_none() {
                return Err(self.unbalanced(Construct::Comment, open));
            }
        }
        Ok(Outcome::Match)
    }
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        c => c,
    }
}

fn is_hex_name(name: &str) -> bool {
    let digits = match name.strip_prefix('x') {
        Some(digits) => digits,
        None => return false,
    };
    !digits.is_empty() && digits.len() <= 8 && digits.chars().all(|c| c.is_ascii_hexdigit())
}

struct Builder<'r> {
    rule: &'r str,
    bytecode: Vec<u8>,
    /// Indices of byte idxes we need to write strings to mapped to the expected string.
    string_slots: HashMap<usize, Vec<u8>>,
}

impl<'r> Builder<'r> {
    fn build(rule: &'r str, node: &Node) -> Result<Vec<u8>, ParseError> {
        let mut builder = Builder {
            rule,
            bytecode: Vec::new(),
            string_slots: HashMap::new(),
        };
        let mut cursor = 0;
        builder.write_rule(&mut cursor, node)?;

        // Fill in the strings now that we know where the pool starts.
        let Builder {
            bytecode: mut out,
            string_slots,
            ..
        } = builder;
        let (buffer, slots) = COMPRESSOR(string_slots);
        for (slot, bufptr) in slots {
            let ptr = bufptr + out.len();
            let uptr: U = ptr
                .try_into()
                .map_err(|_| too_long(rule, "the string pool"))?;
            let dest = &mut out[slot..slot + U_SIZE];
            debug_assert_eq!(
                dest,
                &[0xff, 0xff],
                "tried to overwrite a non-0xFF string slot at {} in the string buffer: {:x?}",
                slot,
                buffer
            );
            dest.copy_from_slice(&uptr.to_be_bytes());
        }
        out.extend(buffer);
        Ok(out)
    }

    fn write_rule(&mut self, cursor: &mut usize, node: &Node) -> Result<(), ParseError> {
        match node {
            Node::Call(symbol) | Node::Literal(symbol) => {
                self.reserve(OPCODE_SIZE + SYM_SIZE);
                let opc = if let Node::Call(_) = node {
                    Opcode::Call
                } else {
                    Opcode::Literal
                };
                self.write_opcode(cursor, opc);
                self.write_sym(cursor, *symbol);
            }
            Node::Set(set) => {
                self.reserve(OPCODE_SIZE + BYTE_SIZE + STR_SIZE);
                self.write_opcode(cursor, Opcode::Range);
                self.write_byte(cursor, set.negated() as BYTE);
                let mut ranges = Vec::with_capacity(set.ranges().len() * 8);
                for &(lo, hi) in set.ranges() {
                    ranges.extend_from_slice(&lo.to_be_bytes());
                    ranges.extend_from_slice(&hi.to_be_bytes());
                }
                self.write_str(cursor, &ranges)?;
            }
            Node::Push | Node::Accept | Node::Case(_) | Node::Empty => {
                let opc = match node {
                    Node::Push => Opcode::Push,
                    Node::Accept => Opcode::Accept,
                    Node::Case(true) => Opcode::CaseSensitive,
                    Node::Case(false) => Opcode::CaseInsensitive,
                    _ => Opcode::Empty,
                };
                self.reserve(OPCODE_SIZE);
                self.write_opcode(cursor, opc);
            }
            Node::Sequence(items) | Node::Choice(items) => {
                let count: BYTE = items.len().try_into().map_err(|_| ParseError::MalformedGrammar {
                    rule: self.rule.to_owned(),
                    message: format!("can only have up to {} subrules", BYTE::MAX),
                    position: Position::new(),
                })?;
                let opc = if let Node::Sequence(_) = node {
                    Opcode::Sequence
                } else {
                    Opcode::Choice
                };
                self.reserve(OPCODE_SIZE + BYTE_SIZE + items.len() * RULEPTR_SIZE);
                self.write_opcode(cursor, opc);
                self.write_byte(cursor, count);
                for item in items {
                    self.write_ruleptr(cursor, item)?;
                }
            }
            Node::Repeat { node: inner, min, max } => {
                self.reserve(OPCODE_SIZE + RULEPTR_SIZE + 2 * U_SIZE);
                self.write_opcode(cursor, Opcode::Repeat);
                self.write_ruleptr(cursor, inner)?;
                self.write_count(cursor, *min)?;
                self.write_count(cursor, *max)?;
            }
            Node::Except(left, right) => {
                self.reserve(OPCODE_SIZE + 2 * RULEPTR_SIZE);
                self.write_opcode(cursor, Opcode::Except);
                self.write_ruleptr(cursor, left)?;
                self.write_ruleptr(cursor, right)?;
            }
        }
        Ok(())
    }

    /// Push this many 0 bytes onto the end of the stack.
    fn reserve(&mut self, size: usize) {
        let len = self.bytecode.len();
        self.bytecode.resize(len + size, 0);
    }

    /// Write bytes over reserved space and move the cursor forward.
    fn write_bytes(&mut self, cursor: &mut usize, bytes: &[u8]) {
        let end_cursor = *cursor + bytes.len();
        let slice = &mut self.bytecode[*cursor..end_cursor];
        debug_assert!(
            all_zero(slice),
            "tried to overwrite bytes at {}: {:x?} with {:x?}",
            cursor,
            slice,
            bytes,
        );
        slice.copy_from_slice(bytes);
        *cursor = end_cursor;
    }

    fn write_u(&mut self, cursor: &mut usize, u: U) {
        self.write_bytes(cursor, &u.to_be_bytes());
    }

    fn write_byte(&mut self, cursor: &mut usize, byte: BYTE) {
        self.write_bytes(cursor, &[byte]);
    }

    fn write_sym(&mut self, cursor: &mut usize, sym: SYM) {
        self.write_bytes(cursor, &sym.to_be_bytes());
    }

    fn write_opcode(&mut self, cursor: &mut usize, opc: Opcode) {
        self.write_byte(cursor, opc.into());
    }

    /// Repetition bound; [`UNBOUNDED`] is written as [`UNBOUNDED_COUNT`].
    fn write_count(&mut self, cursor: &mut usize, count: usize) -> Result<(), ParseError> {
        let u = if count == UNBOUNDED {
            UNBOUNDED_COUNT
        } else {
            match count.try_into() {
                Ok(u) if u != UNBOUNDED_COUNT => u,
                _ => {
                    return Err(ParseError::MalformedGrammar {
                        rule: self.rule.to_owned(),
                        message: format!(
                            "repetition count {} must be below {}",
                            count, UNBOUNDED_COUNT
                        ),
                        position: Position::new(),
                    })
                }
            }
        };
        self.write_u(cursor, u);
        Ok(())
    }

    /// Pretend to write a string. Save the string to `string_slots`, write the length, and write `0xffff` as the pointer.
    fn write_str(&mut self, cursor: &mut usize, string: &[u8]) -> Result<(), ParseError> {
        let len: U = string
            .len()
            .try_into()
            .map_err(|_| too_long(self.rule, "a string"))?;
        let _prev = self.string_slots.insert(*cursor, string.to_owned());
        debug_assert!(_prev.is_none());

        self.write_u(cursor, U::MAX);
        self.write_u(cursor, len);
        Ok(())
    }

    /// Append the rule to the bytecode and put the pointer at the cursor.
    fn write_ruleptr(&mut self, cursor: &mut usize, node: &Node) -> Result<(), ParseError> {
        // Pointer to where the rule goes, aka the end.
        let rule_ptr = self.bytecode.len();
        let ptr: RULEPTR = rule_ptr
            .try_into()
            .map_err(|_| too_long(self.rule, "the bytecode"))?;
        // Write that rule there
        let mut subcursor = rule_ptr;
        self.write_rule(&mut subcursor, node)?;
        // And write the pointer to *this* cursor.
        self.write_u(cursor, ptr);
        Ok(())
    }
}

fn too_long(rule: &str, what: &str) -> ParseError {
    ParseError::MalformedGrammar {
        rule: rule.to_owned(),
        message: format!("{} got longer than {} bytes", what, U::MAX),
        position: Position::new(),
    }
}

fn all_zero(slice: &[u8]) -> bool {
    slice.iter().all(|b| *b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::split_rules;

    fn parse(text: &str) -> (Result<Node, ParseError>, Identifiers) {
        let mut ids = Identifiers::new();
        let rules = split_rules(text, &mut ids);
        let rule = &rules[0];
        assert!(rule.error.is_none(), "{:?}", rule.error);
        let node = MetaParser::new(rule, &mut ids).parse();
        (node, ids)
    }

    #[test]
    fn precedence() {
        let (node, ids) = parse("r ::= a b | c - d+ ;");
        let sym = |name| ids.find(name).unwrap();
        assert_eq!(
            node.unwrap(),
            Node::Choice(vec![
                Node::Sequence(vec![Node::Call(sym("a")), Node::Call(sym("b"))]),
                Node::Except(
                    Box::new(Node::Call(sym("c"))),
                    Box::new(Node::Repeat {
                        node: Box::new(Node::Call(sym("d"))),
                        min: 1,
                        max: UNBOUNDED
                    })
                ),
            ])
        );
    }

    #[test]
    fn counts_and_markers() {
        let (node, ids) = parse("r ::= $ 'x'{2,3} [0-9]3 @ ~ ;");
        let x = ids.find("x").unwrap();
        assert_eq!(
            node.unwrap(),
            Node::Sequence(vec![
                Node::Push,
                Node::Repeat {
                    node: Box::new(Node::Literal(x)),
                    min: 2,
                    max: 3
                },
                Node::Repeat {
                    node: Box::new(Node::Set(SetSpec::parse("0-9"))),
                    min: 3,
                    max: 3
                },
                Node::Accept,
                Node::Case(false),
            ])
        );
    }

    #[test]
    fn hex_items_and_comments() {
        let (node, _) = parse("r ::= #x41 /* a /* b */ */ ;");
        assert_eq!(node.unwrap(), Node::Set(SetSpec::parse("#x41")));
    }

    #[test]
    fn unbalanced_constructs() {
        let construct = |text| match parse(text).0 {
            Err(ParseError::UnbalancedConstruct { construct, .. }) => construct,
            other => panic!("{} gave {:?}", text, other),
        };
        assert_eq!(construct("r ::= (a b"), Construct::Group);
        assert_eq!(construct("r ::= a b)"), Construct::Group);
        assert_eq!(construct("r ::= a{1,"), Construct::Braces);
    }

    #[test]
    fn malformed_bodies() {
        let message = |text| match parse(text).0 {
            Err(ParseError::MalformedGrammar { message, .. }) => message,
            other => panic!("{} gave {:?}", text, other),
        };
        assert_eq!(message("r ::= a{3,1}"), "min > max in {min,max}");
        assert_eq!(message("r ::= a{,1}"), "missing min number in {min,max}");
        assert_eq!(message("r ::= a |"), "expected an expression after '|'");
        assert_eq!(message("r ::= ()"), "empty group");
        assert_eq!(message("r ::= a -"), "expected an item after '-'");
    }

    #[test]
    fn bytecode_pools_sets() {
        let mut ids = Identifiers::new();
        let rules = split_rules("r ::= [a-c] | [a-c] 'q' ;", &mut ids);
        let bytecode = compile(&rules[0], &mut ids).unwrap();
        assert_eq!(bytecode[0], u8::from(Opcode::Choice));
        assert_eq!(bytecode[1], 2);
        // one copy of the range pair
        let pair = [0, 0, 0, b'a', 0, 0, 0, b'c'];
        let copies = bytecode.windows(8).filter(|w| *w == pair).count();
        assert_eq!(copies, 1);
    }
}
