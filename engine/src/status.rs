//! Nested status messages for long-running setup steps.

use tracing::info;

/// Receives a stack of human-readable status lines; `pop` closes the innermost one.
pub trait StatusSink {
    /// Open a status line.
    fn push(&mut self, message: &str);
    /// Close the innermost status line.
    fn pop(&mut self);
}

impl StatusSink for () {
    fn push(&mut self, _message: &str) {}
    fn pop(&mut self) {}
}

/// Records every line, indented by depth.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusLog {
    /// Lines in the order they were opened
    pub lines: Vec<String>,
    depth: usize,
}

impl StatusSink for StatusLog {
    fn push(&mut self, message: &str) {
        self.lines.push(format!("{}{message}", "  ".repeat(self.depth)));
        self.depth += 1;
    }

    fn pop(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Logs each line at `info` with its nesting depth.
#[derive(Debug, Default)]
pub struct TracingStatus {
    depth: usize,
}

impl StatusSink for TracingStatus {
    fn push(&mut self, message: &str) {
        info!(depth = self.depth, "{message}");
        self.depth += 1;
    }

    fn pop(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_indents_nested_lines() {
        let mut log = StatusLog::default();
        log.push("Initializing renderer");
        log.push("Generating kernels");
        log.pop();
        log.push("Building kernel program");
        log.pop();
        log.pop();
        log.pop();
        log.push("Done");
        assert_eq!(
            log.lines,
            ["Initializing renderer", "  Generating kernels", "  Building kernel program", "Done"]
        );
    }
}
