//! Shared helpers for the Magma lexer

pub mod span;

pub use span::{Position, SourceMap, Span};
