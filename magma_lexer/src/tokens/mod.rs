//! Token types produced by the Magma tokenizer
//!
//! A [`Token`] is a classified slice of the input. Kinds form a closed, flat
//! taxonomy ([`TokenKind`]) whose dotted names (`Keyword.Reserved`,
//! `Number.Hex`, ...) are stable so highlighter hosts can map them to styles.

pub mod kind;
pub mod token;

pub use kind::{ParseTokenKindError, TokenCategory, TokenKind};
pub use token::Token;
