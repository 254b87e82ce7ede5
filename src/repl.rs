use termwiz::lineedit::{line_editor_terminal, LineEditor, LineEditorHost, NopLineEditorHost};

use crate::{Construct, Engine, Outcome, ParseError};

const HELP: &str = "\
lines are parsed against the current rule. commands:
  :rule NAME    parse with NAME from now on
  :def TEXT     register grammar text (continues over lines until balanced)
  :show NAME    print a rule
  :rules        list registered rules
  :trace on|off log rule entry and exit
  :quit";

impl<C> Engine<C> {
    /// Read lines from the terminal and parse each one with `rule`.
    pub fn repl(&mut self, rule: &str) -> termwiz::Result<()> {
        let mut rule = rule.to_owned();
        let mut defining = false;

        let mut terminal = line_editor_terminal()?;
        let mut editor = LineEditor::new(&mut terminal);
        let mut host = NopLineEditorHost::default();

        let mut grammar = String::new();

        loop {
            editor.set_prompt(if defining { "...> " } else { "bnf> " });
            let line = match editor.read_line(&mut host)? {
                Some(line) => line,
                None => return Ok(()),
            };
            host.history().add(&line);

            if defining {
                grammar.push('\n');
                grammar.push_str(&line);
            } else if let Some(command) = line.strip_prefix(':') {
                let mut words = command.splitn(2, char::is_whitespace);
                let arg = words.nth(1).map(str::trim).unwrap_or_default();
                match command.split_whitespace().next().unwrap_or_default() {
                    "quit" | "q" => return Ok(()),
                    "rule" if self.has_rule(arg) || crate::builtins::lookup(arg).is_some() => {
                        rule = arg.to_owned();
                    }
                    "rule" => println!("no rule named '{}'", arg),
                    "def" => grammar.push_str(arg),
                    "show" => match self.get_rule(arg) {
                        Some(body) => println!("{} ::= {} ;", arg, body),
                        None => println!("no rule named '{}'", arg),
                    },
                    "rules" => println!("{}", self.rule_names().join(" ")),
                    "trace" => self.set_tracing(arg != "off"),
                    _ => println!("{}", HELP),
                }
                if grammar.is_empty() {
                    continue;
                }
            } else {
                self.try_line(&rule, &line);
                continue;
            }

            match self.register_rules(&grammar, "<repl>", true) {
                Ok(count) => println!("registered {} rule(s)", count),
                Err(ohno) => {
                    let unbalanced = ohno.errors().iter().any(|err| {
                        matches!(
                            err.error,
                            ParseError::UnbalancedConstruct {
                                construct: Construct::Group
                                    | Construct::Comment
                                    | Construct::Braces,
                                ..
                            }
                        )
                    });
                    // we might supply the closer later
                    if unbalanced {
                        defining = true;
                        continue;
                    }
                    if let Err(err) = ohno.eprint() {
                        log::warn!("could not print the report: {}", err);
                    }
                }
            }
            defining = false;
            grammar.clear();
        }
    }

    fn try_line(&mut self, rule: &str, line: &str) {
        self.set_input_text(line);
        match self.parse_rule(rule) {
            Ok(Outcome::Match) => {
                let matched = self.token_data_from(0).unwrap_or_default();
                let rest: String = line.chars().skip(self.token_pos()).collect();
                if rest.is_empty() {
                    println!("match {:?}", matched);
                } else {
                    println!("match {:?}, left over {:?}", matched, rest);
                }
            }
            Ok(Outcome::NoMatch) => println!("no match"),
            Err(err) => println!("error: {}", err),
        }
    }
}
