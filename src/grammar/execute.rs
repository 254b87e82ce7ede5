use std::convert::TryInto;

use super::{CompiledRule, Opcode, BYTE, BYTE_SIZE, SYM, SYM_SIZE, U, UNBOUNDED_COUNT, U_SIZE};
use crate::{
    combinators::{self, Backtrack, UNBOUNDED},
    intern, Engine, Outcome, ParseError, ParseResult,
};

/// eeeexxecutor!
pub(crate) struct Executor<'code> {
    rule: &'code str,
    bytecode: &'code [u8],
}

impl<'code> Executor<'code> {
    pub fn new(rule: &'code CompiledRule) -> Self {
        Self {
            rule: &rule.name,
            bytecode: &rule.bytecode,
        }
    }

    /// Run the top-level rule at the engine's current position.
    pub fn run<C>(&self, engine: &mut Engine<C>) -> ParseResult {
        self.execute_rule(0, engine)
    }

    /// Run a subrule, rolling back whatever it did if it doesn't match.
    fn subrule<C>(&self, ruleptr: usize, engine: &mut Engine<C>) -> ParseResult {
        engine.guarded(|engine| self.execute_rule(ruleptr, engine))
    }

    fn execute_rule<C>(&self, mut bytecode_cursor: usize, engine: &mut Engine<C>) -> ParseResult {
        let opc = self.read_opcode(&mut bytecode_cursor)?;
        log::trace!(
            "{}: {:?} at token {}, args at {}",
            self.rule,
            opc,
            engine.token_pos(),
            bytecode_cursor
        );
        if !matches!(opc, Opcode::Push | Opcode::Accept) {
            engine.add_item();
        }

        match opc {
            Opcode::Literal => {
                let sym = self.read_sym(&mut bytecode_cursor)?;
                let literal = engine
                    .identifiers
                    .name(sym)
                    .ok_or_else(|| ParseError::MissingIdentifier(intern::encode(sym)))?;
                combinators::tokens(&mut engine.stream, literal, !engine.case_sensitive)
            }
            Opcode::Range => {
                let negated = self.read_byte(&mut bytecode_cursor)? != 0;
                let ranges = self.read_string(&mut bytecode_cursor)?;
                if ranges.len() % 8 != 0 {
                    return Err(self.corrupt(format!(
                        "range needs pairs of 4-byte code points but got {} bytes",
                        ranges.len()
                    )));
                }
                combinators::class(&mut engine.stream, |c| {
                    let code = u32::from(c);
                    let inside = ranges.chunks_exact(8).any(|pair| {
                        let lo = u32::from_be_bytes([pair[0], pair[1], pair[2], pair[3]]);
                        let hi = u32::from_be_bytes([pair[4], pair[5], pair[6], pair[7]]);
                        lo <= code && code <= hi
                    });
                    inside != negated
                })
            }
            Opcode::Call => {
                let sym = self.read_sym(&mut bytecode_cursor)?;
                engine.parse_symbol(sym)
            }
            Opcode::Empty => Ok(Outcome::Match),
            Opcode::Sequence => {
                let subrule_count = self.read_byte(&mut bytecode_cursor)?;
                let start = engine.token_pos();
                for _ in 0..subrule_count {
                    let ruleptr = self.read_u(&mut bytecode_cursor)? as usize;
                    if self.subrule(ruleptr, engine)? == Outcome::NoMatch {
                        engine.rewind_to(start)?;
                        return Ok(Outcome::NoMatch);
                    }
                }
                Ok(Outcome::Match)
            }
            Opcode::Choice => {
                let subrule_count = self.read_byte(&mut bytecode_cursor)?;
                for _ in 0..subrule_count {
                    let ruleptr = self.read_u(&mut bytecode_cursor)? as usize;
                    if self.subrule(ruleptr, engine)?.is_match() {
                        return Ok(Outcome::Match);
                    }
                }
                Ok(Outcome::NoMatch)
            }
            Opcode::Repeat => {
                let ruleptr = self.read_u(&mut bytecode_cursor)? as usize;
                let min = self.read_count(&mut bytecode_cursor)?;
                let max = self.read_count(&mut bytecode_cursor)?;
                combinators::multiple(
                    engine,
                    |engine| self.subrule(ruleptr, engine),
                    min,
                    max,
                )
            }
            Opcode::Except => {
                let left = self.read_u(&mut bytecode_cursor)? as usize;
                let right = self.read_u(&mut bytecode_cursor)? as usize;
                engine.guarded(|engine| self.except(left, right, engine))
            }
            Opcode::Push | Opcode::Accept => {
                engine.push_token_pos(opc == Opcode::Accept);
                Ok(Outcome::Match)
            }
            Opcode::CaseSensitive | Opcode::CaseInsensitive => {
                engine.case_sensitive = opc == Opcode::CaseSensitive;
                Ok(Outcome::Match)
            }
        }
    }

    /// Match `left` unless `right` matches exactly the same text.
    fn except<C>(&self, left: usize, right: usize, engine: &mut Engine<C>) -> ParseResult {
        let start = engine.token_pos();
        if self.subrule(left, engine)? == Outcome::NoMatch {
            return Ok(Outcome::NoMatch);
        }
        let left_end = engine.token_pos();

        engine.rewind_to(start)?;
        let restore = engine.item_id();
        let probe = self.subrule(right, engine)?;
        let right_end = engine.token_pos();
        engine.rewind_to(start)?;
        // the probe only looks; nothing it marked survives
        if !engine.reject_item(restore) {
            return Err(ParseError::Rejected(restore));
        }

        if probe.is_match() && right_end == left_end {
            Ok(Outcome::NoMatch)
        } else {
            engine.stream.advance_to(left_end)?;
            Ok(Outcome::Match)
        }
    }

    fn corrupt<S: Into<String>>(&self, message: S) -> ParseError {
        ParseError::CorruptProgram {
            rule: self.rule.to_owned(),
            message: message.into(),
        }
    }

    fn read_bytes(&self, cursor: &mut usize, size: usize, what: &str) -> Result<&'code [u8], ParseError> {
        let next_cursor = *cursor + size;
        match self.bytecode.get(*cursor..next_cursor) {
            Some(it) => {
                *cursor = next_cursor;
                Ok(it)
            }
            None => Err(self.corrupt(format!(
                "went out of bounds when reading {} at {}",
                what, cursor
            ))),
        }
    }

    fn read_u(&self, cursor: &mut usize) -> Result<U, ParseError> {
        let data = self.read_bytes(cursor, U_SIZE, "a u")?;
        Ok(U::from_be_bytes([data[0], data[1]]))
    }

    fn read_byte(&self, cursor: &mut usize) -> Result<BYTE, ParseError> {
        let data = self.read_bytes(cursor, BYTE_SIZE, "a byte")?;
        Ok(data[0])
    }

    fn read_sym(&self, cursor: &mut usize) -> Result<SYM, ParseError> {
        let data = self.read_bytes(cursor, SYM_SIZE, "a sym")?;
        Ok(SYM::from_be_bytes([data[0], data[1], data[2], data[3]]))
    }

    fn read_count(&self, cursor: &mut usize) -> Result<usize, ParseError> {
        Ok(match self.read_u(cursor)? {
            UNBOUNDED_COUNT => UNBOUNDED,
            n => n as usize,
        })
    }

    fn read_opcode(&self, cursor: &mut usize) -> Result<Opcode, ParseError> {
        let byte = self
            .read_byte(cursor)
            .map_err(|_| self.corrupt("went out of bounds when reading an opcode"))?;
        byte.try_into()
            .map_err(|ono: num_enum::TryFromPrimitiveError<Opcode>| {
                self.corrupt(format!("{:#04X} is not an opcode", ono.number))
            })
    }

    fn read_string(&self, cursor: &mut usize) -> Result<&'code [u8], ParseError> {
        let ptr = self.read_u(cursor)? as usize;
        let len = self.read_u(cursor)? as usize;

        self.bytecode.get(ptr..ptr + len).ok_or_else(|| {
            self.corrupt(format!(
                "went out of bounds when reading a string from {}..{}",
                ptr,
                ptr + len
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(bytecode: Vec<u8>) -> ParseResult {
        let rule = CompiledRule {
            name: "broken".to_owned(),
            text: String::new(),
            bytecode,
        };
        let mut engine = Engine::<()>::new();
        engine.set_input_text("abc");
        Executor::new(&rule).run(&mut engine)
    }

    #[test]
    fn corrupt_programs_are_errors() {
        let message = |bytecode| match run(bytecode) {
            Err(ParseError::CorruptProgram { rule, message }) => {
                assert_eq!(rule, "broken");
                message
            }
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(message(vec![]), "went out of bounds when reading an opcode");
        assert_eq!(message(vec![0]), "0x00 is not an opcode");
        assert_eq!(
            message(vec![Opcode::Sequence.into(), 1, 0]),
            "went out of bounds when reading a u at 2"
        );
        assert_eq!(
            message(vec![Opcode::Range.into(), 0, 0, 5, 0, 8]),
            "went out of bounds when reading a string from 5..13"
        );
    }

    #[test]
    fn empty_matches_nothing_and_succeeds() {
        assert_eq!(run(vec![Opcode::Empty.into()]), Ok(Outcome::Match));
    }
}
