//! Diagnostics library for compilation reporting
//!
//! This library provides the report stream used by the pass driver:
//! - Multiple severity levels (Error, Warning, Info, Trace)
//! - Messages tagged with the originating pass and function
//! - Pluggable sinks for collecting or streaming reports
//! - Optional source line attribution for messages that have one

use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
    Trace,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "error"),
            DiagnosticSeverity::Warning => write!(f, "warning"),
            DiagnosticSeverity::Info => write!(f, "info"),
            DiagnosticSeverity::Trace => write!(f, "trace"),
        }
    }
}

/// A diagnostic message tagged with its origin
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    /// Name of the pass that produced the message, when one did.
    pub pass: Option<String>,
    /// Function the message refers to, as `source::function`.
    pub function: Option<String>,
    /// Original source line the message refers to, when known.
    pub line: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Info, message)
    }

    pub fn trace(message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Trace, message)
    }

    fn new(severity: DiagnosticSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            pass: None,
            function: None,
            line: None,
            message: message.into(),
        }
    }

    pub fn with_pass(mut self, pass: impl Into<String>) -> Self {
        self.pass = Some(pass.into());
        self
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.severity)?;
        if let Some(pass) = &self.pass {
            write!(f, "[{}]", pass)?;
        }
        write!(f, ":")?;
        if let Some(function) = &self.function {
            write!(f, " in {}:", function)?;
        }
        if let Some(line) = self.line {
            write!(f, " line {}:", line)?;
        }
        write!(f, " {}", self.message)
    }
}

/// Collection of diagnostics
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
    }

    pub fn infos(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Info)
    }

    pub fn traces(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Trace)
    }
}

/// Sink that receives diagnostics as passes produce them
pub trait ReportSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// A shared sink reports through the handle, so the owner of the other
/// handle can inspect what arrived
impl<S: ReportSink> ReportSink for Rc<RefCell<S>> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.borrow_mut().report(diagnostic);
    }
}

/// Sink that retains every diagnostic for later inspection
#[derive(Debug, Default)]
pub struct CollectingReporter {
    pub diagnostics: Diagnostics,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for CollectingReporter {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Sink that writes formatted diagnostics to a stream, dropping
/// anything below `min_severity`
pub struct StreamReporter<W: Write> {
    out: W,
    min_severity: DiagnosticSeverity,
}

impl<W: Write> StreamReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            min_severity: DiagnosticSeverity::Trace,
        }
    }

    pub fn with_min_severity(out: W, min_severity: DiagnosticSeverity) -> Self {
        Self { out, min_severity }
    }
}

impl<W: Write> ReportSink for StreamReporter<W> {
    fn report(&mut self, diagnostic: Diagnostic) {
        // Severity ordering puts Error first, so "at least as severe"
        // means less-than-or-equal here.
        if diagnostic.severity <= self.min_severity {
            let _ = writeln!(self.out, "{}", diagnostic);
        }
    }
}

/// Sink that discards everything
#[derive(Debug, Default)]
pub struct NullReporter;

impl ReportSink for NullReporter {
    fn report(&mut self, _diagnostic: Diagnostic) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic::warning("operand sizes not proven equal")
            .with_pass("DotEliminationPass")
            .with_function("lib.m::dot_all")
            .with_line(12);

        assert_eq!(
            diagnostic.to_string(),
            "warning[DotEliminationPass]: in lib.m::dot_all: line 12: operand sizes not proven equal"
        );
    }

    #[test]
    fn test_collection_filters() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::error("bad phi"));
        diagnostics.push(Diagnostic::trace("applying pass"));
        diagnostics.push(Diagnostic::warning("unused output"));

        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics.errors().count(), 1);
        assert_eq!(diagnostics.warnings().count(), 1);
        assert_eq!(diagnostics.traces().count(), 1);
    }

    #[test]
    fn test_shared_sink_keeps_a_readable_handle() {
        let collector = Rc::new(RefCell::new(CollectingReporter::new()));
        let mut handle: Box<dyn ReportSink> = Box::new(Rc::clone(&collector));
        handle.report(Diagnostic::info("kept"));

        assert_eq!(collector.borrow().diagnostics.len(), 1);
        assert_eq!(collector.borrow().diagnostics.diagnostics[0].message, "kept");
    }

    #[test]
    fn test_stream_reporter_severity_filter() {
        let mut buffer = Vec::new();
        {
            let mut reporter =
                StreamReporter::with_min_severity(&mut buffer, DiagnosticSeverity::Warning);
            reporter.report(Diagnostic::trace("noise"));
            reporter.report(Diagnostic::error("kept"));
        }
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("kept"));
        assert!(!text.contains("noise"));
    }
}
