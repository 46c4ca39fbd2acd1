use super::kind::TokenKind;
use crate::utils::Span;
use serde::Serialize;
use std::fmt;

/// A classified slice of the input
///
/// `start` and `end` are byte offsets into the text passed to the tokenizer;
/// `text == &input[start..end]` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub start: usize,
    pub end: usize,
}

impl<'src> Token<'src> {
    pub fn new(kind: TokenKind, text: &'src str, start: usize) -> Self {
        Self {
            kind,
            text,
            start,
            end: start + text.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Offset-only span; resolve lines with `SourceMap::span_of`
    pub fn span(&self) -> Span {
        Span::from_offsets(self.start, self.end)
    }
}

impl fmt::Display for Token<'_> {
    /// Pygments raw format: `Token.Kind\t'text'`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token.{}\t{:?}", self.kind, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_computes_end_from_text() {
        let source = "x := 1;";
        let token = Token::new(TokenKind::Operator, &source[2..4], 2);
        assert_eq!(token.end, 4);
        assert_eq!(token.len(), 2);
        assert_eq!(token.span().slice(source), ":=");
    }

    #[test]
    fn test_display_raw_format() {
        let token = Token::new(TokenKind::String, "a\tb", 0);
        assert_eq!(token.to_string(), "Token.String\t\"a\\tb\"");
    }

    #[test]
    fn test_serialize() {
        let token = Token::new(TokenKind::NumberHex, "0xFF", 3);
        let json = serde_json::to_value(token).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "Number.Hex", "text": "0xFF", "start": 3, "end": 7})
        );
    }
}
