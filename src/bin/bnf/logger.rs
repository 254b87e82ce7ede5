use log::{Level, LevelFilter, Log, Metadata, Record};

/// Writes log records to stderr.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match record.level() {
            Level::Debug | Level::Trace => eprintln!("{}", record.args()),
            level => eprintln!("[{}] {}", level, record.args()),
        }
    }

    fn flush(&self) {}
}

pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
