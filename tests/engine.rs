use bnf_router::{
    Construct, Engine, FeedSource, Outcome, ParseError, ParseResult, RuleKind, SetSpec,
};

fn digit(engine: &mut Engine) -> ParseResult {
    engine.parse_set(&SetSpec::parse("0-9"))
}

fn refuse(engine: &mut Engine) -> ParseResult {
    Err(engine.fail("refused"))
}

fn engine_with(grammar: &str) -> Engine {
    let mut engine = Engine::new();
    engine.register_rule(grammar).unwrap();
    engine
}

#[test]
fn native_rules_are_found_before_builtins() {
    let mut engine = engine_with("num ::= digit+ ;");
    assert!(engine.register_function("digit", digit, true));
    assert_eq!(engine.rule("digit").unwrap().kind(), RuleKind::Native);

    engine.set_input_text("123abc");
    assert_eq!(engine.parse_rule("num"), Ok(Outcome::Match));
    assert_eq!(engine.token_data_from(0).unwrap(), "123");
    assert_eq!(engine.token_pos(), 3);
}

#[test]
fn failed_branches_leave_no_checkpoints() {
    let mut engine = engine_with("r ::= $ 'a' @ 'x' | $ 'a' 'b' ;");
    engine.set_input_text("ab");
    assert_eq!(engine.parse_rule("r"), Ok(Outcome::Match));
    let checkpoints = engine.checkpoints();
    assert_eq!(checkpoints.len(), 1);
    assert_eq!(checkpoints[0].token_pos, 0);
    assert!(!checkpoints[0].accepted);
    assert_eq!(engine.pushed_token_data().unwrap(), "ab");
}

#[test]
fn no_match_rewinds_everything() {
    let mut engine = engine_with("r ::= 'a' 'b' ('c' | 'd') 'e' ;");
    engine.set_input_text("abdx");
    assert_eq!(engine.parse_rule("r"), Ok(Outcome::NoMatch));
    assert_eq!(engine.token_pos(), 0);
    assert!(engine.checkpoints().is_empty());
}

#[test]
fn alternation_is_first_match() {
    let mut engine = engine_with("r ::= 'a' | 'ab' ;");
    engine.set_input_text("ab");
    assert_eq!(engine.parse_rule("r"), Ok(Outcome::Match));
    assert_eq!(engine.token_pos(), 1);
}

#[test]
fn running_dry_unwinds_checkpoints() {
    let mut engine = engine_with("num ::= $ digit+ ;");
    let mut feed = FeedSource::new();
    feed.push("12");
    engine.set_input(feed);
    assert!(matches!(
        engine.parse_rule("num"),
        Err(ParseError::OutOfData(_))
    ));
    assert!(engine.checkpoints().is_empty());

    let mut feed = FeedSource::new();
    feed.push("12");
    feed.close();
    engine.set_input(feed);
    assert_eq!(engine.parse_rule("num"), Ok(Outcome::Match));
}

#[test]
fn native_errors_name_the_rule() {
    let mut engine = engine_with("outer ::= 'x' inner ;");
    engine.register_function("inner", refuse, true);
    engine.set_input_text("xy");
    match engine.parse_rule("outer") {
        Err(ParseError::Rule {
            rule,
            message,
            position,
        }) => {
            assert_eq!(rule, "inner");
            assert_eq!(message, "refused");
            assert_eq!(position.column, 2);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn broken_registration_keeps_the_old_rule() {
    let mut engine = engine_with("a ::= 'old' ;");
    let err = engine.register_rules("a ::= \"x ;", "<test>", true).unwrap_err();
    assert_eq!(err.installed(), 0);
    match &err.errors()[0].error {
        ParseError::UnbalancedConstruct { rule, construct, .. } => {
            assert_eq!(rule, "a");
            assert_eq!(*construct, Construct::DoubleQuote);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(engine.get_rule("a").unwrap(), "'old'");
}

#[test]
fn unbalanced_groups_render_the_rule() {
    let mut engine = Engine::<()>::new();
    let err = engine.register_rule("r ::= (alpha digit").unwrap_err();
    match err {
        ParseError::UnbalancedConstruct {
            construct, body, ..
        } => {
            assert_eq!(construct, Construct::Group);
            assert_eq!(body, "(alpha digit");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn unterminated_sets_quotes_and_comments() {
    for (grammar, expected, column) in [
        ("r ::= a [abc", Construct::Set, 9),
        ("r ::= 'abc", Construct::SingleQuote, 7),
        ("r ::= a /* abc", Construct::Comment, 9),
    ] {
        let mut engine = Engine::<()>::new();
        match engine.register_rule(grammar).unwrap_err() {
            ParseError::UnbalancedConstruct {
                rule,
                construct,
                position,
                ..
            } => {
                assert_eq!(rule, "r", "{}", grammar);
                assert_eq!(construct, expected, "{}", grammar);
                assert_eq!((position.line, position.column), (1, column), "{}", grammar);
            }
            other => panic!("{}: unexpected {:?}", grammar, other),
        }
        assert!(!engine.has_rule("r"));
    }
}

#[test]
fn rules_render_with_their_names() {
    let engine = engine_with("greeting ::= (\"hello\" | 'hi') ws+ name ; name ::= alpha+ ;");
    assert_eq!(
        engine.get_rule("greeting").unwrap(),
        "(\"hello\" | 'hi') ws+ name"
    );
    assert!(engine.get_rule("nope").is_none());
}

#[test]
fn forgotten_identifiers_break_callers() {
    let mut engine = engine_with("r ::= \"lit\" ;");
    assert!(engine.forget_identifier("lit"));
    engine.set_input_text("lit");
    assert!(matches!(
        engine.parse_rule("r"),
        Err(ParseError::MissingIdentifier(_))
    ));
}

#[test]
fn compressed_identifiers_round_trip() {
    let mut engine = Engine::<()>::new();
    let token = engine.compressed_identifier("request_line");
    assert_eq!(engine.compressed_identifier("request_line"), token);
    assert!(token.chars().all(|c| c.is_ascii_alphabetic()));
    assert_eq!(engine.uncompressed_identifier(&token), Ok("request_line"));
    assert!(engine.uncompressed_identifier("zzzzzz").is_err());
}

#[test]
fn case_toggles_apply_to_later_literals() {
    let mut engine = engine_with("r ::= ~ 'get' ^ 'X' ;");
    engine.set_input_text("GeTX");
    assert_eq!(engine.parse_rule("r"), Ok(Outcome::Match));
    assert!(engine.case_sensitive());

    engine.set_input_text("GeTx");
    assert_eq!(engine.parse_rule("r"), Ok(Outcome::NoMatch));

    engine.set_case_sensitive(false);
    engine.set_input_text("x");
    assert_eq!(engine.parse_tokens("X"), Ok(Outcome::Match));
}

#[test]
fn engines_are_send() {
    fn assert_send<T: Send>() {}
    assert_send::<Engine>();
    assert_send::<Engine<Vec<String>>>();
}

#[test]
fn rules_with_comments_and_counts() {
    let mut engine = engine_with(
        "/* dates /* like 2021-09-01 */ */\n\
         date ::= digit 4 '-' digit{2,2} '-' digit 2 ;",
    );
    engine.set_input_text("2021-09-01T");
    assert_eq!(engine.parse_rule("date"), Ok(Outcome::Match));
    assert_eq!(engine.token_pos(), 10);

    engine.set_input_text("21-09-01");
    assert_eq!(engine.parse_rule("date"), Ok(Outcome::NoMatch));
}

#[test]
fn builtins_run_without_registration() {
    let mut engine = Engine::<()>::new();
    engine.set_input_text("  -12.5e3 rest");
    engine.skip_all_ws().unwrap();
    assert_eq!(engine.parse_rule("number"), Ok(Outcome::Match));
    assert_eq!(engine.token_data_from(2).unwrap(), "-12.5e3");
    assert_eq!(
        engine.parse_rule("no_such_rule"),
        Err(ParseError::UnknownRule("no_such_rule".to_owned()))
    );
}

#[test]
fn failed_rules_restore_case_sensitivity() {
    let mut engine = engine_with("keyword ::= ~ \"select\" ^ ; loud ::= \"SELECT\" ;");
    engine.set_input_text("xyz");
    assert_eq!(engine.parse_rule("keyword"), Ok(Outcome::NoMatch));
    assert!(engine.case_sensitive());

    engine.set_input_text("select");
    assert_eq!(engine.parse_rule("loud"), Ok(Outcome::NoMatch));
    assert_eq!(engine.parse_rule("keyword"), Ok(Outcome::Match));
    assert!(engine.case_sensitive());
}

#[test]
fn long_running_streams_stay_bounded() {
    let mut engine = engine_with("request ::= $ alpha+ lf ;");
    engine.set_max_history(Some(16));
    let mut feed = FeedSource::new();
    for _ in 0..100 {
        feed.push("hello\n");
    }
    feed.close();
    engine.set_input(feed);

    for _ in 0..100 {
        assert_eq!(engine.parse_rule("request"), Ok(Outcome::Match));
        assert_eq!(engine.pushed_token_data().unwrap(), "hello\n");
        assert!(engine.checkpoints().is_empty());
    }
    assert_eq!(engine.token_pos(), 600);
    assert!(engine.token_data(0, 1).is_err());
}
