//! # bnf-router
//!
//! A grammar interpreter that turns EBNF text into runnable parsers at runtime.
//!
//! Rules are registered by name, either as grammar text or as native functions,
//! and run against a rewindable stream of decoded characters. Every rule answers
//! with a [`ParseResult`]: it matched, it didn't (and consumed nothing), or something
//! went wrong that no amount of backtracking will fix.
//!
//! ```text
//! digits  ::= digit+ ;
//! version ::= 'HTTP/' digits '.' digits ;
//! ```
//!
//! Rule names and literals inside grammar text are interned and written in a
//! compressed form before the rule is compiled; see [`intern`].

#[macro_use]
extern crate derivative;

pub mod builtins;
mod checkpoint;
pub mod combinators;
mod error;
pub mod extract;
mod grammar;
pub mod intern;
pub mod position;
mod registry;
mod repl;
pub mod scan;
pub mod source;
pub mod stream;
pub mod trace;

use std::{collections::HashMap, fmt, sync::Arc, time::Instant};

pub use checkpoint::{Checkpoint, ItemId, RejectHook};
pub use combinators::{SetSpec, UNBOUNDED};
pub use error::{Construct, GrammarError, Outcome, ParseError, ParseResult, RuleError};
pub use grammar::CompiledRule;
pub use position::Position;
pub use source::{ByteSource, FeedSource, MemorySource, ReaderSource};
pub use trace::{LogTrace, RuleKind, TraceEvent, TraceSink};

use combinators::{Backtrack, CharStream};
use intern::{Identifiers, Symbol};
use scan::ScanOptions;
use stream::TokenStream;

/// Signature of rules implemented in Rust.
pub type NativeFn<C> = fn(&mut Engine<C>) -> ParseResult;

/// What a registered name runs.
#[derive(Derivative)]
#[derivative(Debug(bound = ""), Clone(bound = ""))]
pub enum RuleBody<C> {
    Native(#[derivative(Debug(format_with = "native_formatter"))] NativeFn<C>),
    Compiled(Arc<CompiledRule>),
}

fn native_formatter<C>(_: &NativeFn<C>, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    write!(fmt, "<native>")
}

impl<C> RuleBody<C> {
    pub fn kind(&self) -> RuleKind {
        match self {
            RuleBody::Native(_) => RuleKind::Native,
            RuleBody::Compiled(_) => RuleKind::Compiled,
        }
    }
}

/// Rule registry, input stream and parse state.
///
/// `C` is a user context that native rules can reach through
/// [`context_mut`](Engine::context_mut).
#[derive(Derivative)]
#[derivative(Debug(bound = "C: fmt::Debug"))]
pub struct Engine<C = ()> {
    stream: TokenStream,
    /// Options the next input is scanned with.
    input_options: ScanOptions,
    max_history: Option<usize>,

    identifiers: Identifiers,
    rules: HashMap<Symbol, RuleBody<C>>,

    checkpoints: Vec<Checkpoint>,
    item_id: ItemId,
    #[derivative(Debug = "ignore")]
    reject_hook: Option<RejectHook<C>>,

    case_sensitive: bool,
    /// Rules currently running, innermost last.
    call_stack: Vec<Symbol>,

    #[derivative(Debug = "ignore")]
    trace_sink: Option<Box<dyn TraceSink>>,
    /// If this is Some, we're recording profiling information.
    /// Maps rule symbols to how many times they ran and the total number of seconds spent in them
    profiler: Option<HashMap<Symbol, (u64, f64)>>,

    context: C,
}

impl<C: Default> Default for Engine<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Default> Engine<C> {
    pub fn new() -> Self {
        Self::with_context(C::default())
    }
}

impl<C> Engine<C> {
    pub fn with_context(context: C) -> Self {
        Self {
            stream: TokenStream::from_text(""),
            input_options: ScanOptions::default(),
            max_history: None,
            identifiers: Identifiers::new(),
            rules: HashMap::new(),
            checkpoints: Vec::new(),
            item_id: 0,
            reject_hook: None,
            case_sensitive: true,
            call_stack: Vec::new(),
            trace_sink: None,
            profiler: None,
            context,
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    /// Parse from `source` from now on.
    ///
    /// Checkpoints taken against the old input are dropped.
    pub fn set_input<S: ByteSource + 'static>(&mut self, source: S) {
        let mut stream = TokenStream::from_source(source, self.input_options);
        stream.set_max_history(self.max_history);
        self.stream = stream;
        self.checkpoints.clear();
        self.call_stack.clear();
    }

    pub fn set_input_text(&mut self, text: &str) {
        self.set_input(MemorySource::new(text));
    }

    /// Scanner options for inputs set after this call.
    pub fn set_input_options(&mut self, options: ScanOptions) {
        self.input_options = options;
    }

    pub fn input_options(&self) -> ScanOptions {
        self.input_options
    }

    /// Cap how many consumed characters are kept for backtracking. `None` keeps everything.
    pub fn set_max_history(&mut self, max: Option<usize>) {
        self.max_history = max;
        self.stream.set_max_history(max);
    }

    pub fn stream(&self) -> &TokenStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut TokenStream {
        &mut self.stream
    }

    /// Whether literals must match case exactly. Grammar text can flip this with `^` and `~`.
    pub fn set_case_sensitive(&mut self, case_sensitive: bool) {
        self.case_sensitive = case_sensitive;
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn identifiers(&self) -> &Identifiers {
        &self.identifiers
    }

    /// The compressed token standing for `name` in compiled rule text.
    pub fn compressed_identifier(&mut self, name: &str) -> String {
        self.identifiers.compressed(name)
    }

    pub fn uncompressed_identifier(&self, token: &str) -> Result<&str, ParseError> {
        self.identifiers
            .uncompressed(token)
            .ok_or_else(|| ParseError::MissingIdentifier(token.to_owned()))
    }

    /// Drop `name` from the identifier table, along with any rule registered under it.
    ///
    /// Compiled rules that call it will fail with [`ParseError::UnknownRule`].
    pub fn forget_identifier(&mut self, name: &str) -> bool {
        match self.identifiers.forget(name) {
            Some(symbol) => {
                self.rules.remove(&symbol);
                true
            }
            None => false,
        }
    }

    /// Run the rule, native function or built-in called `name` at the current position.
    ///
    /// Checkpoints left by a match stay on the stack for the caller to read, and the
    /// stream keeps everything consumed unless [`set_max_history`](Self::set_max_history)
    /// caps it. [`set_input`](Self::set_input) resets both. An engine that keeps parsing
    /// one long input should cap the history and pop or clear its checkpoints per match.
    pub fn parse_rule(&mut self, name: &str) -> ParseResult {
        let symbol = self.symbol_for(name)?;
        self.parse_symbol(symbol)
    }

    /// Symbol of a runnable name. Built-ins are interned the first time they're asked for.
    fn symbol_for(&mut self, name: &str) -> Result<Symbol, ParseError> {
        match self.identifiers.find(name) {
            Some(symbol) => Ok(symbol),
            None if builtins::lookup(name).is_some() => Ok(self.identifiers.intern(name)),
            None => Err(ParseError::UnknownRule(name.to_owned())),
        }
    }

    pub(crate) fn parse_symbol(&mut self, symbol: Symbol) -> ParseResult {
        let body = self.rules.get(&symbol).cloned();
        let kind = body.as_ref().map_or(RuleKind::Builtin, RuleBody::kind);

        self.trace_enter(symbol, kind);
        let started = self.profiler.as_ref().map(|_| Instant::now());
        self.call_stack.push(symbol);

        let result = self.guarded(|engine| match body {
            Some(RuleBody::Native(func)) => func(engine),
            Some(RuleBody::Compiled(rule)) => grammar::Executor::new(&rule).run(engine),
            None => engine.parse_builtin(symbol),
        });

        self.call_stack.pop();
        if let Some(started) = started {
            self.record_profile(symbol, started.elapsed());
        }
        self.trace_exit(symbol, kind, &result);
        result
    }

    fn parse_builtin(&mut self, symbol: Symbol) -> ParseResult {
        let name = self.identifiers.name(symbol);
        match name.and_then(builtins::lookup) {
            Some(builtin) => builtin(&mut self.stream),
            None => Err(ParseError::UnknownRule(
                name.map_or_else(|| intern::encode(symbol), str::to_owned),
            )),
        }
    }

    /// Run `f`; if it doesn't match, put the stream back, restore case sensitivity and
    /// roll back every checkpoint it left behind. Errors roll back too, but keep the
    /// stream where it is.
    pub(crate) fn guarded<F>(&mut self, f: F) -> ParseResult
    where
        F: FnOnce(&mut Self) -> ParseResult,
    {
        let start = self.stream.token_pos();
        let restore = self.item_id;
        let case_sensitive = self.case_sensitive;
        let result = f(self);
        if !matches!(result, Ok(Outcome::Match)) {
            self.case_sensitive = case_sensitive;
        }
        match result {
            Ok(Outcome::Match) => Ok(Outcome::Match),
            Ok(Outcome::NoMatch) => {
                self.stream.rewind_to(start)?;
                if self.reject_item(restore) {
                    Ok(Outcome::NoMatch)
                } else {
                    Err(ParseError::Rejected(restore))
                }
            }
            Err(err) => {
                self.reject_item(restore);
                Err(err)
            }
        }
    }

    /// Name of the innermost running rule.
    pub fn current_rule(&self) -> Option<&str> {
        self.call_stack
            .last()
            .and_then(|&symbol| self.identifiers.name(symbol))
    }

    /// An error for a native rule to return, naming the rule and the input position.
    pub fn fail<S: Into<String>>(&self, message: S) -> ParseError {
        ParseError::Rule {
            rule: self.current_rule().unwrap_or("<top>").to_owned(),
            message: message.into(),
            position: self.stream.position(),
        }
    }

    // Leaf operations for native rules.

    /// Match one character, honoring case sensitivity.
    pub fn parse_token(&mut self, expected: char) -> ParseResult {
        let case_insensitive = !self.case_sensitive;
        combinators::class(&mut self.stream, |c| {
            combinators::chars_equal(c, expected, case_insensitive)
        })
    }

    /// Match all of `literal`, honoring case sensitivity.
    pub fn parse_tokens(&mut self, literal: &str) -> ParseResult {
        combinators::tokens(&mut self.stream, literal, !self.case_sensitive)
    }

    pub fn parse_set(&mut self, set: &SetSpec) -> ParseResult {
        combinators::set(&mut self.stream, set)
    }

    pub fn parse_any(&mut self) -> ParseResult {
        combinators::any(&mut self.stream)
    }

    /// Run the rule called `name` between `min` and `max` times.
    pub fn parse_multiple(&mut self, name: &str, min: usize, max: usize) -> ParseResult {
        let symbol = self.symbol_for(name)?;
        combinators::multiple(self, |engine| engine.parse_symbol(symbol), min, max)
    }

    /// See [`TokenStream::has_data`].
    pub fn has_data(&mut self, min_count: usize) -> Result<bool, ParseError> {
        self.stream.has_data(min_count)
    }

    pub fn token_pos(&self) -> usize {
        self.stream.token_pos()
    }

    pub fn position(&self) -> Position {
        self.stream.position()
    }

    pub fn next_token(&mut self) -> Result<Option<char>, ParseError> {
        self.stream.next_token()
    }

    pub fn peek_token(&mut self) -> Result<Option<char>, ParseError> {
        self.stream.peek_token()
    }

    pub fn push_back_tokens(&mut self, count: usize) -> Result<(), ParseError> {
        self.stream.push_back_tokens(count)
    }

    pub fn token_data(&self, start: usize, len: usize) -> Result<String, ParseError> {
        self.stream.token_data(start, len)
    }

    /// The text consumed since `start`.
    pub fn token_data_from(&self, start: usize) -> Result<String, ParseError> {
        let end = self.stream.token_pos();
        self.stream.token_data(start, end.saturating_sub(start))
    }

    pub fn skip_ws(&mut self) -> Result<usize, ParseError> {
        self.stream.skip_ws()
    }

    pub fn skip_all_ws(&mut self) -> Result<usize, ParseError> {
        self.stream.skip_all_ws()
    }
}

impl<C> Backtrack for Engine<C> {
    fn token_pos(&self) -> usize {
        self.stream.token_pos()
    }

    fn push_back_tokens(&mut self, count: usize) -> Result<(), ParseError> {
        self.stream.push_back_tokens(count)
    }
}

impl<C> CharStream for Engine<C> {
    fn next_token(&mut self) -> Result<Option<char>, ParseError> {
        self.stream.next_token()
    }
}
