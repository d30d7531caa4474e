//! Thread-local log capture so tests can count diagnostics without racing
//! each other through the global logger.

use std::cell::RefCell;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[derive(Debug, Clone)]
pub struct CapturedRecord {
    pub level: Level,
    pub message: String,
}

thread_local! {
    static RECORDS: RefCell<Option<Vec<CapturedRecord>>> = RefCell::new(None);
}

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|records| {
            if let Some(records) = records.borrow_mut().as_mut() {
                records.push(CapturedRecord {
                    level: record.level(),
                    message: record.args().to_string(),
                });
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<CapturedRecord>) {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    RECORDS.with(|records| *records.borrow_mut() = Some(Vec::new()));
    let result = f();
    let records = RECORDS.with(|records| records.borrow_mut().take().unwrap_or_default());
    (result, records)
}

/// Records at `Warn` or more severe.
pub fn diagnostics(records: &[CapturedRecord]) -> usize {
    records.iter().filter(|r| r.level <= Level::Warn).count()
}
