use std::fs::{self, File};

use anyhow::{anyhow, bail};
use bnf_router::{Engine, Outcome, ReaderSource};
use itertools::Itertools;
use log::LevelFilter;

mod logger;

const USAGE: &str = "\
usage: bnf [OPTIONS] GRAMMAR...

  --rule NAME    start rule (default: the first rule of the first grammar)
  --input PATH   parse the contents of a file
  --text TEXT    parse TEXT
  --repl         parse lines typed at the terminal
  --trace        log every rule entry and exit
  --profile      print per-rule call counts and times
  -v, --verbose  log registration details";

fn main() -> anyhow::Result<()> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        println!("{}", USAGE);
        return Ok(());
    }

    let trace = args.contains("--trace");
    let profile = args.contains("--profile");
    let do_repl = args.contains("--repl");
    let verbose = args.contains(["-v", "--verbose"]);
    let mut rule = args.opt_value_from_str::<_, String>("--rule")?;
    let input = args.opt_value_from_str::<_, String>("--input")?;
    let text = args.opt_value_from_str::<_, String>("--text")?;

    let level = if trace || verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    logger::init(level).map_err(|err| anyhow!("{}", err))?;

    let root = std::env::current_dir()?;
    let mut engine = Engine::<()>::new();
    let mut had_any_files = false;
    while let Some(path_stub) = args.opt_free_from_str::<String>()? {
        let path = root.join(&path_stub);
        let source = fs::read_to_string(&path)?;

        if let Err(ohno) = engine.register_rules(&source, &path_stub, true) {
            ohno.eprint()?;
            bail!("{}", ohno);
        }
        if rule.is_none() {
            rule = first_rule_name(&source);
        }
        had_any_files = true;
    }
    if !had_any_files {
        eprintln!("{}", USAGE);
        bail!("no grammar given");
    }
    let rule = rule.ok_or_else(|| anyhow!("no start rule; pass --rule"))?;

    engine.set_tracing(trace);
    if profile {
        engine.start_profiling();
    }

    if let Some(path) = input {
        let file = File::open(&path)?;
        engine.set_input(ReaderSource::new(path, file));
        report(&mut engine, &rule)?;
    }
    if let Some(text) = text {
        engine.set_input_text(&text);
        report(&mut engine, &rule)?;
    }
    if do_repl {
        engine.repl(&rule).map_err(|err| anyhow!("{}", err))?;
    }

    if let Some(profile) = engine.stop_profiling() {
        let rows = profile
            .into_iter()
            .sorted_by(|a, b| b.1 .1.total_cmp(&a.1 .1))
            .map(|(name, (count, secs))| format!("{:>24} {:>8} {:>12.6}s", name, count, secs))
            .join("\n");
        eprintln!("{:>24} {:>8} {:>13}\n{}", "rule", "calls", "time", rows);
    }

    Ok(())
}

fn report(engine: &mut Engine, rule: &str) -> anyhow::Result<()> {
    match engine.parse_rule(rule)? {
        Outcome::Match => {
            let consumed = engine.token_pos();
            if engine.has_data(1)? {
                println!("matched {} characters, stopped at {}", consumed, engine.position());
            } else {
                println!("matched all {} characters", consumed);
            }
        }
        Outcome::NoMatch => println!("no match"),
    }
    Ok(())
}

/// The name before the first `::=`.
fn first_rule_name(source: &str) -> Option<String> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("//") && !line.starts_with("/*"))
        .find_map(|line| line.split("::=").next().filter(|_| line.contains("::=")))
        .map(|name| name.trim().to_owned())
}
