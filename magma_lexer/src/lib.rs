//! Lexical tokenizer for the Magma computer-algebra language
//!
//! A [`grammar::RuleTable`] holds named states of ordered regex rules;
//! [`lexical::Tokens`] walks text with a state stack and yields classified
//! [`tokens::Token`]s that cover the input exactly.

pub mod config;
pub mod file_processor;
pub mod grammar;
pub mod lexical;
#[macro_use]
pub mod logging;
pub mod tokens;
pub mod utils;

pub use grammar::{default_table, RuleTable, RuleTableBuilder, RuleTableError};
pub use lexical::{tokenize, Checkpoint, LexicalAnalyzer, LexicalMetrics, Tokens};
pub use tokens::{Token, TokenCategory, TokenKind};
