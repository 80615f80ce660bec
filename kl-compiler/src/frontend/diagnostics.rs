use super::lexer::TokenKind;

/// A recoverable syntax problem recorded by the parser.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Diagnostic {
    #[error("Got {found} at {line}:{col} (expected {expected})")]
    Mismatch {
        expected: TokenKind,
        found: TokenKind,
        line: usize,
        col: usize,
    },

    #[error("Got {found} at {line}:{col} (expected one of {})", fmt_expected(.expected))]
    MismatchAny {
        expected: Vec<TokenKind>,
        found: TokenKind,
        line: usize,
        col: usize,
    },

    #[error("Unexpected end of input at {line}:{col} while parsing {context}")]
    UnexpectedEof {
        context: &'static str,
        line: usize,
        col: usize,
    },

    #[error("Invalid number literal '{text}' at {line}:{col}")]
    InvalidNumber { text: String, line: usize, col: usize },
}

impl Diagnostic {
    pub fn line(&self) -> usize {
        match self {
            Diagnostic::Mismatch { line, .. }
            | Diagnostic::MismatchAny { line, .. }
            | Diagnostic::UnexpectedEof { line, .. }
            | Diagnostic::InvalidNumber { line, .. } => *line,
        }
    }

    pub fn col(&self) -> usize {
        match self {
            Diagnostic::Mismatch { col, .. }
            | Diagnostic::MismatchAny { col, .. }
            | Diagnostic::UnexpectedEof { col, .. }
            | Diagnostic::InvalidNumber { col, .. } => *col,
        }
    }
}

/// Build a friendly comma-separated "expected" list
fn fmt_expected(expected: &[TokenKind]) -> String {
    expected
        .iter()
        .map(|k| k.describe())
        .collect::<Vec<_>>()
        .join(", ")
}
