//! Lexical grammar: rule definitions, the table builder, and the Magma states

pub mod keywords;
pub mod magma;
pub mod rules;
pub mod table;

pub use keywords::{is_reserved_word, reserved_words, KeywordCategory};
pub use magma::{default_table, magma_states, magma_table};
pub use rules::{Action, GroupAction, MatchRule, Pattern, RuleDef, StateDef, Transition};
pub use table::{RuleTable, RuleTableBuilder, RuleTableError, StateId, ROOT_STATE};
