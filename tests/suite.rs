use std::{ffi::OsString, fs, path::PathBuf};

use bnf_router::{Engine, Outcome, ParseResult};

/// What a line of a `.cases` file expects.
#[derive(Debug, PartialEq)]
enum Expect {
    Match(usize),
    NoMatch,
    Error,
}

/// `rule "input" => match N | nomatch | error`
fn parse_case(line: &str) -> (String, String, Expect) {
    let (call, expect) = line.split_once(" => ").expect("missing ' => '");
    let (rule, quoted) = call.trim().split_once(' ').expect("missing input");
    let quoted = quoted.trim();
    let inner = &quoted[1..quoted.len() - 1];

    let mut input = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            input.push(c);
            continue;
        }
        match chars.next().expect("dangling escape") {
            'n' => input.push('\n'),
            'r' => input.push('\r'),
            't' => input.push('\t'),
            e => input.push(e),
        }
    }

    let expect = match expect.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["match", n] => Expect::Match(n.parse().expect("bad count")),
        ["nomatch"] => Expect::NoMatch,
        ["error"] => Expect::Error,
        other => panic!("bad expectation {:?}", other),
    };
    (rule.to_owned(), input, expect)
}

fn outcome(engine: &Engine, result: ParseResult) -> Expect {
    match result {
        Ok(Outcome::Match) => Expect::Match(engine.token_pos()),
        Ok(Outcome::NoMatch) => Expect::NoMatch,
        Err(_) => Expect::Error,
    }
}

#[test]
fn suite() {
    let root = concat!(env!("CARGO_MANIFEST_DIR"), "/tests");

    let mut paths = Vec::new();

    let mut todo = vec![PathBuf::from(root)];
    while let Some(path) = todo.pop() {
        if path.is_dir() {
            for entry in fs::read_dir(path).unwrap() {
                let entry = entry.unwrap();
                let path = entry.path();
                todo.push(path)
            }
        } else if path.extension() == Some(&OsString::from("bnf")) {
            paths.push(path);
        }
    }

    paths.sort_unstable();
    assert!(!paths.is_empty());

    let mut failures = Vec::new();
    for path in paths {
        let name = path.to_string_lossy().into_owned();
        let source = fs::read_to_string(&path).unwrap();

        let mut engine = Engine::new();
        if let Err(e) = engine.register_rules(&source, &name, true) {
            e.eprint().unwrap();
            panic!("{}", e);
        }

        let cases = fs::read_to_string(path.with_extension("cases")).unwrap();
        for (lineno, line) in cases.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (rule, input, expected) = parse_case(line);
            engine.set_input_text(&input);
            let result = engine.parse_rule(&rule);
            let got = outcome(&engine, result);
            if got != expected {
                failures.push(format!(
                    "{}:{}: {} => expected {:?}, got {:?}",
                    name,
                    lineno + 1,
                    line,
                    expected,
                    got
                ));
            }
        }
    }

    assert!(failures.is_empty(), "\n{}", failures.join("\n"));
}
