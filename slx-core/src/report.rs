//! Diagnostic reports and the log sink the pipeline writes them into.

use crate::error::CompilerError;
use crate::source::SourceArea;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Info,
    Warning,
    Error,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Info => write!(f, "info"),
            ReportKind::Warning => write!(f, "warning"),
            ReportKind::Error => write!(f, "error"),
        }
    }
}

/// One diagnostic message. `context` names the stage or file the report
/// originated from; `hints` carry optional follow-up lines.
#[derive(Debug, Clone)]
pub struct Report {
    pub kind: ReportKind,
    pub context: String,
    pub message: String,
    pub area: Option<SourceArea>,
    pub hints: Vec<String>,
}

impl Report {
    pub fn new(kind: ReportKind, message: impl Into<String>) -> Self {
        Report {
            kind,
            context: String::new(),
            message: message.into(),
            area: None,
            hints: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_area(mut self, area: SourceArea) -> Self {
        if area.is_valid() {
            self.area = Some(area);
        }
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.context.is_empty() {
            write!(f, " ({})", self.context)?;
        }
        if let Some(area) = &self.area {
            write!(f, " at {}", area)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Sink for diagnostic reports. Passed in by the caller of the public
/// compile entry point; all stages share one sink per compilation.
pub trait Log {
    fn submit_report(&mut self, report: Report);
}

/// Default log that collects reports and forwards them to the `log` facade.
#[derive(Default)]
pub struct StdLog {
    reports: Vec<Report>,
}

impl StdLog {
    pub fn new() -> Self {
        StdLog::default()
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn has_errors(&self) -> bool {
        self.reports.iter().any(|r| r.kind == ReportKind::Error)
    }

    pub fn error_count(&self) -> usize {
        self.reports.iter().filter(|r| r.kind == ReportKind::Error).count()
    }
}

impl Log for StdLog {
    fn submit_report(&mut self, report: Report) {
        match report.kind {
            ReportKind::Info => log::info!("{}", report),
            ReportKind::Warning => log::warn!("{}", report),
            ReportKind::Error => log::error!("{}", report),
        }
        self.reports.push(report);
    }
}

/// Stage-facing wrapper around the caller's log sink. Counts errors so a
/// stage can keep collecting diagnostics and still report a single
/// pass/fail verdict at its end.
pub struct ReportHandler<'a> {
    log: Option<&'a mut dyn Log>,
    context: String,
    error_count: usize,
    warning_count: usize,
    warnings_enabled: bool,
}

impl<'a> ReportHandler<'a> {
    pub fn new(log: Option<&'a mut dyn Log>, context: impl Into<String>) -> Self {
        ReportHandler {
            log,
            context: context.into(),
            error_count: 0,
            warning_count: 0,
            warnings_enabled: true,
        }
    }

    pub fn with_warnings(mut self, enabled: bool) -> Self {
        self.warnings_enabled = enabled;
        self
    }

    pub fn set_warnings(&mut self, enabled: bool) {
        self.warnings_enabled = enabled;
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn submit(&mut self, report: Report) {
        match report.kind {
            ReportKind::Error => self.error_count += 1,
            ReportKind::Warning => {
                self.warning_count += 1;
                if !self.warnings_enabled {
                    return;
                }
            }
            ReportKind::Info => {}
        }
        if let Some(log) = self.log.as_deref_mut() {
            log.submit_report(report);
        }
    }

    pub fn error(&mut self, message: impl Into<String>, area: SourceArea) {
        let report = Report::new(ReportKind::Error, message)
            .with_context(self.context.clone())
            .with_area(area);
        self.submit(report);
    }

    pub fn warning(&mut self, message: impl Into<String>, area: SourceArea) {
        let report = Report::new(ReportKind::Warning, message)
            .with_context(self.context.clone())
            .with_area(area);
        self.submit(report);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let report = Report::new(ReportKind::Info, message).with_context(self.context.clone());
        self.submit(report);
    }

    pub fn submit_error(&mut self, err: &CompilerError) {
        let area = err.area().unwrap_or(SourceArea::ZERO);
        self.error(err.to_string(), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourcePosition;

    #[test]
    fn test_report_display() {
        let report = Report::new(ReportKind::Error, "unexpected token")
            .with_context("syntax")
            .with_area(SourceArea::new(SourcePosition::new(4, 2), 1));
        assert_eq!(report.to_string(), "error (syntax) at 4:2: unexpected token");
    }

    #[test]
    fn test_handler_counts_suppressed_warnings() {
        let mut log = StdLog::new();
        {
            let mut handler = ReportHandler::new(Some(&mut log), "test").with_warnings(false);
            handler.warning("minor", SourceArea::ZERO);
            handler.error("major", SourceArea::ZERO);
            assert_eq!(handler.warning_count(), 1);
            assert_eq!(handler.error_count(), 1);
        }
        // The suppressed warning never reached the sink.
        assert_eq!(log.reports().len(), 1);
        assert!(log.has_errors());
    }
}
