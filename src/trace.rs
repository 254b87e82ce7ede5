//! Rule tracing and profiling.

use std::{collections::HashMap, fmt, time::Duration};

use crate::{intern::Symbol, position::Position, Engine, ParseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Native,
    Compiled,
    Builtin,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuleKind::Native => "native",
            RuleKind::Compiled => "compiled",
            RuleKind::Builtin => "built-in",
        })
    }
}

/// A rule starting (`result` is `None`) or finishing.
#[derive(Debug, Clone, Copy)]
pub struct TraceEvent<'a> {
    pub rule: &'a str,
    pub kind: RuleKind,
    /// How many rules are running around this one.
    pub depth: usize,
    pub position: Position,
    pub result: Option<&'a ParseResult>,
}

/// Receives an event as each rule starts and finishes.
pub trait TraceSink: Send {
    fn enter(&mut self, event: &TraceEvent);
    fn exit(&mut self, event: &TraceEvent);
}

/// Writes every event to the `log` crate at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTrace;

impl TraceSink for LogTrace {
    fn enter(&mut self, event: &TraceEvent) {
        log::debug!(
            "{:indent$}Parsing Rule : {} ({})",
            "",
            event.rule,
            event.position,
            indent = event.depth * 2
        );
    }

    fn exit(&mut self, event: &TraceEvent) {
        let outcome = match event.result {
            Some(Ok(outcome)) => outcome.to_string(),
            Some(Err(err)) => format!("error: {}", err),
            None => "?".to_owned(),
        };
        log::debug!(
            "{:indent$}Exit Rule : {} ({}) Result:{}",
            "",
            event.rule,
            event.position,
            outcome,
            indent = event.depth * 2
        );
    }
}

impl<C> Engine<C> {
    /// Turn [`LogTrace`] on or off.
    pub fn set_tracing(&mut self, on: bool) {
        self.trace_sink = if on { Some(Box::new(LogTrace)) } else { None };
    }

    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.trace_sink = sink;
    }

    pub fn is_tracing(&self) -> bool {
        self.trace_sink.is_some()
    }

    pub(crate) fn trace_enter(&mut self, symbol: Symbol, kind: RuleKind) {
        if let Some(sink) = self.trace_sink.as_mut() {
            let event = TraceEvent {
                rule: self.identifiers.name(symbol).unwrap_or("?"),
                kind,
                depth: self.call_stack.len(),
                position: self.stream.position(),
                result: None,
            };
            sink.enter(&event);
        }
    }

    pub(crate) fn trace_exit(&mut self, symbol: Symbol, kind: RuleKind, result: &ParseResult) {
        if let Some(sink) = self.trace_sink.as_mut() {
            let event = TraceEvent {
                rule: self.identifiers.name(symbol).unwrap_or("?"),
                kind,
                depth: self.call_stack.len(),
                position: self.stream.position(),
                result: Some(result),
            };
            sink.exit(&event);
        }
    }

    /// Start counting rule runs and time. Restarting throws away what was recorded.
    pub fn start_profiling(&mut self) {
        self.profiler = Some(HashMap::new());
    }

    /// Runs and total seconds per rule name so far, or `None` if not profiling.
    pub fn check_profiling(&self) -> Option<HashMap<String, (u64, f64)>> {
        self.profiler.as_ref().map(|profile| self.profile_by_name(profile))
    }

    pub fn stop_profiling(&mut self) -> Option<HashMap<String, (u64, f64)>> {
        let profile = self.profiler.take()?;
        Some(self.profile_by_name(&profile))
    }

    fn profile_by_name(&self, profile: &HashMap<Symbol, (u64, f64)>) -> HashMap<String, (u64, f64)> {
        profile
            .iter()
            .map(|(symbol, stats)| {
                let name = self
                    .identifiers
                    .name(*symbol)
                    .map_or_else(|| crate::intern::encode(*symbol), str::to_owned);
                (name, *stats)
            })
            .collect()
    }

    pub(crate) fn record_profile(&mut self, symbol: Symbol, dt: Duration) {
        if let Some(profiler) = self.profiler.as_mut() {
            let dt = dt.as_secs_f64();
            match profiler.get_mut(&symbol) {
                Some((count, total_time)) => {
                    *count += 1;
                    *total_time += dt;
                }
                None => {
                    profiler.insert(symbol, (1, dt));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl TraceSink for Recorder {
        fn enter(&mut self, event: &TraceEvent) {
            let line = format!("{}> {}", event.depth, event.rule);
            self.0.lock().unwrap().push(line);
        }

        fn exit(&mut self, event: &TraceEvent) {
            let matched = matches!(event.result, Some(Ok(outcome)) if outcome.is_match());
            let line = format!("{}< {} {}", event.depth, event.rule, matched);
            self.0.lock().unwrap().push(line);
        }
    }

    #[test]
    fn sinks_see_nested_rules() {
        let mut engine = Engine::<()>::new();
        engine.register_rule("pair ::= digit digit").unwrap();
        let recorder = Recorder::default();
        engine.set_trace_sink(Some(Box::new(recorder.clone())));
        engine.set_input_text("12");
        assert!(engine.parse_rule("pair").unwrap().is_match());

        let lines = recorder.0.lock().unwrap().clone();
        assert_eq!(
            lines,
            vec![
                "0> pair",
                "1> digit",
                "1< digit true",
                "1> digit",
                "1< digit true",
                "0< pair true",
            ]
        );
    }

    #[test]
    fn profiles_count_runs() {
        let mut engine = Engine::<()>::new();
        engine.register_rule("d ::= digit").unwrap();
        assert!(engine.check_profiling().is_none());
        engine.start_profiling();
        engine.set_input_text("123");
        engine.parse_multiple("d", 0, crate::UNBOUNDED).unwrap();

        let profile = engine.stop_profiling().unwrap();
        // the fourth try runs out of input
        assert_eq!(profile["d"].0, 4);
        assert_eq!(profile["digit"].0, 4);
        assert!(engine.check_profiling().is_none());
    }
}
