//! Operator log sink
//!
//! Operations that touch the cloud directory report what they did as short
//! human-readable lines (`[Mountlist] variant applied`). The front end decides
//! where those lines go; the library never prints.

use std::cell::RefCell;

/// Receives one operator-facing log line at a time, without trailing newline
pub trait LogSink {
    fn line(&self, line: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str),
{
    fn line(&self, line: &str) {
        self(line)
    }
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn line(&self, _line: &str) {}
}

/// Sink that keeps every line in memory, in order
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: RefCell<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|l| l.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn line(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_sink() {
        let seen = RefCell::new(Vec::new());
        let sink = |line: &str| seen.borrow_mut().push(line.to_string());
        sink.line("[Token] saved");
        assert_eq!(seen.borrow().as_slice(), ["[Token] saved"]);
    }

    #[test]
    fn test_memory_sink_order() {
        let sink = MemorySink::new();
        sink.line("first");
        sink.line("second");
        assert_eq!(sink.lines(), vec!["first", "second"]);
        assert!(sink.contains("sec"));
    }
}
