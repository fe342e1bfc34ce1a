use std::io::IsTerminal;

use clap::builder::styling::Style;

use crate::diagnostics::DiagnosticSink;

/// Diagnostic sink that writes to stderr, with ANSI emphasis when stderr
/// is a terminal.
pub struct TerminalSink {
    styled: bool,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self { styled: std::io::stderr().is_terminal() }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink for TerminalSink {
    fn line(&self, message: &str) {
        eprintln!("{message}");
    }

    fn emphasized(&self, message: &str) {
        if self.styled {
            let style = Style::new().bold();
            eprintln!("{style}{message}{style:#}");
        } else {
            eprintln!("{message}");
        }
    }
}
