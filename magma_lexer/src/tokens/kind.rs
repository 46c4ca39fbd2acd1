use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a token
///
/// Serialized as its dotted name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "Keyword.Reserved")]
    KeywordReserved,
    #[serde(rename = "Operator")]
    Operator,
    #[serde(rename = "Name")]
    Name,
    #[serde(rename = "Name.Builtin")]
    NameBuiltin,
    #[serde(rename = "Name.Function")]
    NameFunction,
    #[serde(rename = "Name.Constant")]
    NameConstant,
    #[serde(rename = "String")]
    String,
    #[serde(rename = "String.Escape")]
    StringEscape,
    #[serde(rename = "Number.Hex")]
    NumberHex,
    #[serde(rename = "Number.Bin")]
    NumberBin,
    #[serde(rename = "Number.Float")]
    NumberFloat,
    #[serde(rename = "Number.Integer")]
    NumberInteger,
    #[serde(rename = "Punctuation")]
    Punctuation,
    #[serde(rename = "Whitespace")]
    Whitespace,
    /// Intrinsic documentation blocks
    #[serde(rename = "Comment")]
    Comment,
    #[serde(rename = "Comment.Single")]
    CommentSingle,
    #[serde(rename = "Comment.Multiline")]
    CommentMultiline,
    /// Lines of a pasted error transcript
    #[serde(rename = "Generic.Error")]
    GenericError,
    /// One character no rule recognized
    #[serde(rename = "Error")]
    Error,
    /// Unclassified text
    #[serde(rename = "Text")]
    Text,
}

/// Top-level family of a [`TokenKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenCategory {
    Keyword,
    Name,
    String,
    Number,
    Operator,
    Punctuation,
    Comment,
    Generic,
    Whitespace,
    Text,
    Error,
}

impl TokenKind {
    /// Every kind, in declaration order
    pub const ALL: [TokenKind; 20] = [
        TokenKind::KeywordReserved,
        TokenKind::Operator,
        TokenKind::Name,
        TokenKind::NameBuiltin,
        TokenKind::NameFunction,
        TokenKind::NameConstant,
        TokenKind::String,
        TokenKind::StringEscape,
        TokenKind::NumberHex,
        TokenKind::NumberBin,
        TokenKind::NumberFloat,
        TokenKind::NumberInteger,
        TokenKind::Punctuation,
        TokenKind::Whitespace,
        TokenKind::Comment,
        TokenKind::CommentSingle,
        TokenKind::CommentMultiline,
        TokenKind::GenericError,
        TokenKind::Error,
        TokenKind::Text,
    ];

    /// Dotted display name
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::KeywordReserved => "Keyword.Reserved",
            TokenKind::Operator => "Operator",
            TokenKind::Name => "Name",
            TokenKind::NameBuiltin => "Name.Builtin",
            TokenKind::NameFunction => "Name.Function",
            TokenKind::NameConstant => "Name.Constant",
            TokenKind::String => "String",
            TokenKind::StringEscape => "String.Escape",
            TokenKind::NumberHex => "Number.Hex",
            TokenKind::NumberBin => "Number.Bin",
            TokenKind::NumberFloat => "Number.Float",
            TokenKind::NumberInteger => "Number.Integer",
            TokenKind::Punctuation => "Punctuation",
            TokenKind::Whitespace => "Whitespace",
            TokenKind::Comment => "Comment",
            TokenKind::CommentSingle => "Comment.Single",
            TokenKind::CommentMultiline => "Comment.Multiline",
            TokenKind::GenericError => "Generic.Error",
            TokenKind::Error => "Error",
            TokenKind::Text => "Text",
        }
    }

    pub fn category(&self) -> TokenCategory {
        match self {
            TokenKind::KeywordReserved => TokenCategory::Keyword,
            TokenKind::Operator => TokenCategory::Operator,
            TokenKind::Name
            | TokenKind::NameBuiltin
            | TokenKind::NameFunction
            | TokenKind::NameConstant => TokenCategory::Name,
            TokenKind::String | TokenKind::StringEscape => TokenCategory::String,
            TokenKind::NumberHex
            | TokenKind::NumberBin
            | TokenKind::NumberFloat
            | TokenKind::NumberInteger => TokenCategory::Number,
            TokenKind::Punctuation => TokenCategory::Punctuation,
            TokenKind::Whitespace => TokenCategory::Whitespace,
            TokenKind::Comment | TokenKind::CommentSingle | TokenKind::CommentMultiline => {
                TokenCategory::Comment
            }
            TokenKind::GenericError => TokenCategory::Generic,
            TokenKind::Error => TokenCategory::Error,
            TokenKind::Text => TokenCategory::Text,
        }
    }

    /// Whitespace and comments
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.category(),
            TokenCategory::Whitespace | TokenCategory::Comment
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TokenCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenCategory::Keyword => "Keyword",
            TokenCategory::Name => "Name",
            TokenCategory::String => "String",
            TokenCategory::Number => "Number",
            TokenCategory::Operator => "Operator",
            TokenCategory::Punctuation => "Punctuation",
            TokenCategory::Comment => "Comment",
            TokenCategory::Generic => "Generic",
            TokenCategory::Whitespace => "Whitespace",
            TokenCategory::Text => "Text",
            TokenCategory::Error => "Error",
        }
    }
}

impl fmt::Display for TokenCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown token kind '{0}'")]
pub struct ParseTokenKindError(pub String);

impl FromStr for TokenKind {
    type Err = ParseTokenKindError;

    /// Accepts the dotted name, with or without a leading `Token.`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("Token.").unwrap_or(s);
        TokenKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| ParseTokenKindError(s.to_string()))
    }
}
