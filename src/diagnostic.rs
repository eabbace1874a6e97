use std::fmt;

/// Severity of a conversion diagnostic. Errors sort before warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub enum Level {
    Error,
    Warning,
}

impl Level {
    pub fn label(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
        }
    }
}

/// A message tied to a source line; line 0 means the location is unknown.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Diagnostic {
    pub level: Level,
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn error(line: usize, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            line,
            message: message.into(),
        }
    }

    pub fn warning(line: usize, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}: {}", self.level.label(), self.message)
        } else {
            write!(
                f,
                "{} @ line {}: {}",
                self.level.label(),
                self.line,
                self.message
            )
        }
    }
}

/// Renders diagnostics sorted by severity, then line, then message.
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut sorted: Vec<&Diagnostic> = diagnostics.iter().collect();
    sorted.sort();
    sorted
        .iter()
        .map(|diagnostic| diagnostic.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_sort_before_warnings() {
        let diagnostics = vec![
            Diagnostic::warning(2, "b"),
            Diagnostic::error(9, "z"),
            Diagnostic::warning(1, "c"),
            Diagnostic::error(0, "a"),
        ];
        assert_eq!(
            format_diagnostics(&diagnostics),
            "ERROR: a\nERROR @ line 9: z\nWARNING @ line 1: c\nWARNING @ line 2: b"
        );
    }
}
