use logos::Logos;
use std::fmt;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n]+")] // Whitespace
#[logos(skip r"#[^\n]*")] // Shell-style comments starting with '#'
#[logos(skip r"//[^\n]*")] // C++-style line comments starting with '//'
pub enum TokenKind {
    // --- Keywords ---
    #[token("def")]
    Def,
    #[token("extern")]
    Extern,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("end")]
    End,
    #[token("loop")]
    Loop,
    #[token("range")]
    Range,
    #[token("var")]
    Var,

    // --- Identifiers and Numbers ---
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Number,

    // --- Operators ---
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("=")]
    Assign,

    // --- Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("->")]
    Arrow,
    #[token(";")]
    Semicolon,

    /// End-of-stream marker. Never produced by the automaton, appended by [`lex`].
    Eof,
}

impl TokenKind {
    /// True for every kind that can begin an expression.
    pub fn starts_expr(self) -> bool {
        matches!(
            self,
            TokenKind::If | TokenKind::Loop | TokenKind::Var | TokenKind::Ident | TokenKind::Number
        )
    }

    /// True for kinds that end or separate an enclosing form. Recovery never
    /// consumes these, so the form they belong to stays in step.
    pub fn closes_form(self) -> bool {
        matches!(
            self,
            TokenKind::End
                | TokenKind::Else
                | TokenKind::Then
                | TokenKind::RParen
                | TokenKind::Comma
                | TokenKind::Arrow
                | TokenKind::Def
                | TokenKind::Extern
                | TokenKind::Semicolon
                | TokenKind::Eof
        )
    }

    /// Human-readable name used in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Def => "'def'",
            TokenKind::Extern => "'extern'",
            TokenKind::If => "'if'",
            TokenKind::Then => "'then'",
            TokenKind::Else => "'else'",
            TokenKind::End => "'end'",
            TokenKind::Loop => "'loop'",
            TokenKind::Range => "'range'",
            TokenKind::Var => "'var'",
            TokenKind::Ident => "identifier",
            TokenKind::Number => "number",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Lt => "'<'",
            TokenKind::Le => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::Ge => "'>='",
            TokenKind::Assign => "'='",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Comma => "','",
            TokenKind::Arrow => "'->'",
            TokenKind::Semicolon => "';'",
            TokenKind::Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A lexed token with its source text and 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub col: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            col,
        }
    }

    pub fn eof(line: usize, col: usize) -> Self {
        Self::new(TokenKind::Eof, "", line, col)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Ident | TokenKind::Number => {
                write!(f, "{} '{}' at {}:{}", self.kind.describe(), self.text, self.line, self.col)
            }
            kind => write!(f, "{} at {}:{}", kind, self.line, self.col),
        }
    }
}

/// Custom error type for lexical errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalError {
    pub location: usize,
    pub line: usize,
    pub column: usize,
    pub unexpected_char: char,
    pub context: String,
}

impl fmt::Display for LexicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unexpected character '{}' at line {}, column {}\n  Context: {}",
            self.unexpected_char, self.line, self.column, self.context
        )
    }
}

impl std::error::Error for LexicalError {}

/// Byte offsets of every line start, for offset -> (line, col) conversion.
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (i, ch) in source.char_indices() {
            if ch == '\n' {
                starts.push(i + 1);
            }
        }
        Self {
            line_starts: starts,
        }
    }

    /// Convert a byte offset to 1-based (line, column).
    fn line_col(&self, source: &str, byte: usize) -> (usize, usize) {
        let line_idx = match self.line_starts.binary_search(&byte) {
            Ok(idx) => idx,
            Err(insert_pos) => insert_pos.saturating_sub(1),
        };
        let start = self.line_starts.get(line_idx).copied().unwrap_or(0);
        let col = source[start..byte].chars().count();
        (line_idx + 1, col + 1)
    }
}

/// Get context around an error position (the line containing the error)
pub fn get_error_context(source: &str, position: usize) -> String {
    let line_start = source[..position]
        .rfind('\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);

    let line_end = source[position..]
        .find('\n')
        .map(|pos| position + pos)
        .unwrap_or(source.len());

    source[line_start..line_end].trim().to_string()
}

/// Tokenize `source`. The result always ends with exactly one [`TokenKind::Eof`].
pub fn lex(source: &str) -> Result<Vec<Token>, LexicalError> {
    let index = LineIndex::new(source);
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let (line, col) = index.line_col(source, span.start);
        match result {
            Ok(kind) => tokens.push(Token::new(kind, lexer.slice(), line, col)),
            Err(()) => {
                return Err(LexicalError {
                    location: span.start,
                    line,
                    column: col,
                    unexpected_char: source[span.start..].chars().next().unwrap_or('\0'),
                    context: get_error_context(source, span.start),
                });
            }
        }
    }

    let (line, col) = index.line_col(source, source.len());
    tokens.push(Token::eof(line, col));
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_win_over_identifiers() {
        use TokenKind::*;
        assert_eq!(
            kinds("def f x -> loop i range 0, x, 1 -> i end end"),
            vec![
                Def, Ident, Ident, Arrow, Loop, Ident, Range, Number, Comma, Ident, Comma, Number,
                Arrow, Ident, End, End, Eof
            ]
        );
        assert_eq!(kinds("define"), vec![Ident, Eof]);
    }

    #[test]
    fn longest_operator_match() {
        use TokenKind::*;
        assert_eq!(kinds("<= < >= > - -> ="), vec![Le, Lt, Ge, Gt, Minus, Arrow, Assign, Eof]);
    }

    #[test]
    fn positions_are_one_based() {
        let tokens = lex("def f\n  x # comment\n").unwrap();
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (1, 5));
        assert_eq!(tokens[2].text, "x");
        assert_eq!((tokens[2].line, tokens[2].col), (2, 3));
        assert_eq!(tokens[3].kind, TokenKind::Eof);
        assert_eq!(tokens[3].line, 3);
    }

    #[test]
    fn unknown_character_is_reported() {
        let err = lex("def f -> 1 $ 2 end").unwrap_err();
        assert_eq!(err.unexpected_char, '$');
        assert_eq!((err.line, err.column), (1, 12));
        assert_eq!(err.context, "def f -> 1 $ 2 end");
    }

    #[test]
    fn decimal_numbers_keep_their_text() {
        let tokens = lex("2.5").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].text, "2.5");
    }
}
