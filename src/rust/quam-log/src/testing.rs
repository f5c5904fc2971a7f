// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! A capturing logger for tests.
//!
//! Records are kept per thread, so tests running in parallel only observe the
//! messages they emitted themselves.

use std::cell::RefCell;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};

thread_local!(static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) });

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let message = record.args().to_string();
        RECORDS.with(|r| r.borrow_mut().push((record.level(), message)));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INSTALL: Once = Once::new();

/// Install the capturing logger. Safe to call from every test.
pub fn install() {
    INSTALL.call_once(|| {
        // Another logger may already be installed by the test binary.
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    RECORDS.with(|r| r.borrow_mut().clear());
}

/// Drain the messages captured on the current thread, keeping those at `level`.
pub fn take_messages(level: Level) -> Vec<String> {
    RECORDS.with(|r| {
        r.borrow_mut()
            .drain(..)
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message)
            .collect()
    })
}

/// Drain the warnings captured on the current thread.
pub fn take_warnings() -> Vec<String> {
    take_messages(Level::Warn)
}
