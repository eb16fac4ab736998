//! Per-engine record of failures swallowed by persistence operations.

use crate::logging::sanitize_message;
use log::{error, warn};

const MAX_MESSAGE_CHARS: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input rejected before any statement ran (missing id, empty criteria).
    Constraint,
    /// The driver reported a failure.
    Driver,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// Operation that failed, e.g. `put:posts`.
    pub context: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ErrorLog {
    records: Vec<ErrorRecord>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn constraint(&mut self, context: &str, message: impl Into<String>) {
        let message = message.into();
        warn!("event=constraint module=engine status=error context={context} message={message}");
        self.records.push(ErrorRecord {
            kind: ErrorKind::Constraint,
            context: context.to_string(),
            message,
        });
    }

    pub(crate) fn driver(&mut self, context: &str, err: &dyn std::fmt::Display) {
        let message = sanitize_message(&err.to_string(), MAX_MESSAGE_CHARS);
        error!("event=driver_error module=engine status=error context={context} error={message}");
        self.records.push(ErrorRecord {
            kind: ErrorKind::Driver,
            context: context.to_string(),
            message,
        });
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&ErrorRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Removes and returns every record.
    pub fn drain(&mut self) -> Vec<ErrorRecord> {
        std::mem::take(&mut self.records)
    }
}
