use std::fmt::Display;

/// Statement-call marker, e.g. `print :: "hi"`.
pub const MARKER_CALL: &str = "::";
/// Isolation marker: tags a statement call for forked execution.
pub const MARKER_ISOLATE: &str = "&";
/// Expansion marker: spreads a vector operand / flags a variadic parameter.
pub const MARKER_EXPAND: &str = "...";

pub const KEYWORD_FN: &str = "fn";
pub const KEYWORD_OP: &str = "op";
pub const KEYWORD_RETURN: &str = "return";
pub const KEYWORD_TRUE: &str = "true";
pub const KEYWORD_FALSE: &str = "false";

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Markup,
    Operator,
    Integer,
    Decimal,
    String,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A lexical unit produced by the external lexer. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token {{\nkind: {},\nvalue: {}}}", self.kind, self.value)
    }
}

impl Token {
    pub fn is_markup(&self, text: &str) -> bool {
        self.kind == TokenKind::Markup && self.value == text
    }

    pub fn is_keyword(&self, text: &str) -> bool {
        self.kind == TokenKind::Keyword && self.value == text
    }

    /// Opening bracket of any of the three pairs.
    pub fn is_open_bracket(&self) -> bool {
        self.kind == TokenKind::Markup && matches!(self.value.as_str(), "(" | "[" | "{")
    }

    pub fn is_close_bracket(&self) -> bool {
        self.kind == TokenKind::Markup && matches!(self.value.as_str(), ")" | "]" | "}")
    }

    pub fn debug(&self) {
        if matches!(
            self.kind,
            TokenKind::String | TokenKind::Identifier | TokenKind::Integer | TokenKind::Decimal
        ) {
            println!("{} ({})", self.kind, self.value);
        } else {
            println!("{} ()", self.kind);
        }
    }
}

/// Returns the closing text matching an opening bracket token.
pub fn closing_bracket(open: &str) -> &'static str {
    match open {
        "(" => ")",
        "[" => "]",
        "{" => "}",
        _ => "",
    }
}
