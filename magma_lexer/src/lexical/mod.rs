//! Tokenization: the match engine and the metrics-collecting analyzer

pub mod analyzer;
pub mod engine;

use crate::config::runtime::LexicalPreferences;
use crate::file_processor::FileProcessingResult;
use crate::grammar::{default_table, RuleTable, RuleTableError};
use crate::tokens::Token;

pub use analyzer::{count_kind, LexerError, LexicalAnalyzer, LexicalMetrics};
pub use engine::{Checkpoint, RunStats, Tokens};

/// Tokenize with the built-in Magma grammar
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, RuleTableError> {
    Ok(default_table()?.tokenize(source).collect())
}

/// Tokenize a loaded file with default preferences
pub fn tokenize_file_result<'src>(
    table: &RuleTable,
    file_result: &'src FileProcessingResult,
) -> Result<Vec<Token<'src>>, LexerError> {
    LexicalAnalyzer::new().tokenize_file_result(table, file_result)
}

/// Tokenize with custom preferences, returning the run's metrics too
pub fn tokenize_with_preferences<'src>(
    table: &RuleTable,
    source: &'src str,
    preferences: LexicalPreferences,
) -> Result<(Vec<Token<'src>>, LexicalMetrics), LexerError> {
    let mut analyzer = LexicalAnalyzer::with_preferences(preferences);
    let tokens = analyzer.tokenize(table, source)?;
    Ok((tokens, analyzer.metrics().clone()))
}

pub fn create_analyzer() -> LexicalAnalyzer {
    LexicalAnalyzer::new()
}
