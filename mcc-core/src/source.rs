//! Source Text and Locations
//!
//! Keeps the scanned source lines so diagnostics can render the offending
//! line with a caret, and defines the `Location` attached to every token,
//! AST node, and diagnostic.

/// Retained source text, one entry per line.
#[derive(Debug, Clone, Default)]
pub struct SourceCode {
    lines: Vec<String>,
}

impl SourceCode {
    pub fn new() -> Self {
        // Line numbers are 1-based; keep a dummy line 0.
        Self {
            lines: vec![String::new(), String::new()],
        }
    }

    pub fn append(&mut self, c: char) {
        if let Some(last) = self.lines.last_mut() {
            last.push(c);
        }
    }

    pub fn new_line(&mut self) {
        self.lines.push(String::new());
    }

    pub fn line(&self, line: usize) -> &str {
        self.lines.get(line).map(String::as_str).unwrap_or("")
    }
}

/// A position in the source text (1-based line, 0-based column of the last
/// consumed character).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub col: usize,
}

impl Location {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: ", self.line, self.col)
    }
}
