//! Registering rules by name.

use std::{fs, io::Read, path::Path, sync::Arc};

use itertools::Itertools;
use log::{debug, warn};

use crate::{
    grammar::{self, render, split_rules, CompiledRule},
    Engine, GrammarError, NativeFn, ParseError, RuleBody, RuleError,
};

impl<C> Engine<C> {
    /// Register a rule implemented in Rust.
    ///
    /// Returns `false` and leaves the old rule alone if `name` is taken and `replace`
    /// is off.
    pub fn register_function(&mut self, name: &str, func: NativeFn<C>, replace: bool) -> bool {
        let symbol = self.identifiers.intern(name);
        if !replace && self.rules.contains_key(&symbol) {
            debug!("keeping the existing rule '{}'", name);
            return false;
        }
        self.rules.insert(symbol, RuleBody::Native(func));
        true
    }

    /// Register every rule in `text`, replacing rules of the same name.
    ///
    /// Returns the first failure; the other rules of the batch are registered regardless.
    pub fn register_rule(&mut self, text: &str) -> Result<(), ParseError> {
        let (_, errors) = self.register_batch(text, true);
        match errors.into_iter().next() {
            Some(err) => Err(err.error),
            None => Ok(()),
        }
    }

    /// Register every rule in `text`, returning how many were installed.
    ///
    /// `source_name` labels the text in error reports. With `replace` off, rules whose
    /// names are already taken are skipped.
    pub fn register_rules(
        &mut self,
        text: &str,
        source_name: &str,
        replace: bool,
    ) -> Result<usize, GrammarError> {
        let (installed, errors) = self.register_batch(text, replace);
        if errors.is_empty() {
            Ok(installed)
        } else {
            Err(GrammarError::new(
                source_name.to_owned(),
                text.to_owned(),
                errors,
                installed,
            ))
        }
    }

    pub fn register_rules_from_path<P: AsRef<Path>>(
        &mut self,
        path: P,
        replace: bool,
    ) -> anyhow::Result<usize> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Ok(self.register_rules(&text, &path.display().to_string(), replace)?)
    }

    pub fn register_rules_from_reader<R: Read>(
        &mut self,
        source_name: &str,
        mut reader: R,
        replace: bool,
    ) -> anyhow::Result<usize> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(self.register_rules(&text, source_name, replace)?)
    }

    fn register_batch(&mut self, text: &str, replace: bool) -> (usize, Vec<RuleError>) {
        let mut installed = 0;
        let mut errors = Vec::new();

        for rule in split_rules(text, &mut self.identifiers) {
            let compiled = match rule.error.clone() {
                Some(err) => Err(err),
                None => grammar::compile(&rule, &mut self.identifiers),
            };
            let bytecode = match compiled {
                Ok(bytecode) => bytecode,
                Err(error) => {
                    warn!("rule #{} not registered: {}", rule.number, error);
                    errors.push(RuleError {
                        number: rule.number,
                        span: rule.span.clone(),
                        error,
                    });
                    continue;
                }
            };

            let symbol = self.identifiers.intern(&rule.name);
            if !replace && self.rules.contains_key(&symbol) {
                debug!("keeping the existing rule '{}'", rule.name);
                continue;
            }
            debug!("registered '{}' ({} bytes)", rule.name, bytecode.len());
            let compiled = CompiledRule {
                name: rule.name,
                text: rule.body,
                bytecode,
            };
            self.rules.insert(symbol, RuleBody::Compiled(Arc::new(compiled)));
            installed += 1;
        }
        (installed, errors)
    }

    /// Remove the rule called `name`. Its identifier stays interned.
    pub fn unregister(&mut self, name: &str) -> bool {
        match self.identifiers.find(name) {
            Some(symbol) => self.rules.remove(&symbol).is_some(),
            None => false,
        }
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.identifiers
            .find(name)
            .map_or(false, |symbol| self.rules.contains_key(&symbol))
    }

    /// Registered rule names, sorted.
    pub fn rule_names(&self) -> Vec<String> {
        self.rules
            .keys()
            .filter_map(|&symbol| self.identifiers.name(symbol))
            .map(str::to_owned)
            .sorted()
            .collect()
    }

    pub fn rule(&self, name: &str) -> Option<&RuleBody<C>> {
        self.identifiers
            .find(name)
            .and_then(|symbol| self.rules.get(&symbol))
    }

    /// The body of a registered rule as grammar text, or `<native>`.
    pub fn get_rule(&self, name: &str) -> Option<String> {
        self.rule(name).map(|body| match body {
            RuleBody::Native(_) => "<native>".to_owned(),
            RuleBody::Compiled(rule) => render(rule.compressed_text(), &self.identifiers),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{Engine, Outcome, ParseError, ParseResult};

    fn never(_: &mut Engine) -> ParseResult {
        Ok(Outcome::NoMatch)
    }

    #[test]
    fn first_definition_wins_without_replace() {
        let mut engine = Engine::<()>::new();
        assert_eq!(engine.register_rules("a ::= 'x' ;", "one", false).unwrap(), 1);
        assert_eq!(engine.register_rules("a ::= 'y' ;", "two", false).unwrap(), 0);
        assert_eq!(engine.get_rule("a").unwrap(), "'x'");

        assert!(!engine.register_function("a", never, false));
        assert_eq!(engine.get_rule("a").unwrap(), "'x'");
        assert!(engine.register_function("a", never, true));
        assert_eq!(engine.get_rule("a").unwrap(), "<native>");

        engine.register_rule("a ::= 'z'").unwrap();
        assert_eq!(engine.get_rule("a").unwrap(), "'z'");
    }

    #[test]
    fn broken_rules_leave_the_old_one() {
        let mut engine = Engine::<()>::new();
        engine.register_rule("a ::= 'x' ;").unwrap();
        let err = engine.register_rules("b ::= 'q' ; a ::= \"x ;", "batch", true).unwrap_err();
        assert_eq!(err.installed(), 1);
        assert_eq!(err.errors().len(), 1);
        assert_eq!(err.errors()[0].number, 2);
        assert!(matches!(
            err.errors()[0].error,
            ParseError::UnbalancedConstruct { .. }
        ));
        assert_eq!(engine.get_rule("a").unwrap(), "'x'");
        assert!(engine.has_rule("b"));
    }

    #[test]
    fn management() {
        let mut engine = Engine::<()>::new();
        engine.register_rule("b ::= a ; a ::= digit").unwrap();
        assert_eq!(engine.rule_names(), vec!["a", "b"]);
        assert!(engine.unregister("a"));
        assert!(!engine.unregister("a"));
        assert!(!engine.has_rule("a"));
        assert_eq!(engine.rule_names(), vec!["b"]);

        engine.set_input_text("1");
        assert_eq!(
            engine.parse_rule("b"),
            Err(ParseError::UnknownRule("a".to_owned()))
        );
    }

    #[test]
    fn reading_grammars() {
        let mut engine = Engine::<()>::new();
        let text: &[u8] = b"greeting ::= 'hi' | 'yo' ;";
        assert_eq!(engine.register_rules_from_reader("inline", text, true).unwrap(), 1);
        assert!(engine.register_rules_from_path("/no/such/grammar.bnf", true).is_err());
    }
}
