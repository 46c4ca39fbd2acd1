//! Lexical analyzer: runs the engine over a whole source and records metrics
//!
//! The engine itself never fails and never logs per token. The analyzer
//! collects the token vector, summarizes the run in [`LexicalMetrics`], and
//! turns anything unusual (fallback tokens, limits, open states) into log
//! events.

use crate::config::compile_time::lexical::{
    MAX_NESTED_LEX_DEPTH, MAX_STATE_STACK_DEPTH_HINT, MAX_TOKEN_COUNT_HINT,
};
use crate::config::runtime::LexicalPreferences;
use crate::file_processor::FileProcessingResult;
use crate::grammar::RuleTable;
use crate::lexical::engine::RunStats;
use crate::logging::codes;
use crate::tokens::{Token, TokenCategory, TokenKind};
use crate::{log_debug, log_error, log_success, log_warning};
use serde::Serialize;
use std::collections::BTreeMap;

/// Lexical analysis errors
///
/// Tokenization itself cannot fail; only a bad start state is rejected.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LexerError {
    #[error("Unknown start state '{state}'")]
    UnknownStartState { state: String },
}

impl LexerError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            LexerError::UnknownStartState { .. } => codes::grammar::UNKNOWN_STATE,
        }
    }
}

/// Summary of one analyzed source
#[derive(Debug, Default, Clone, Serialize)]
pub struct LexicalMetrics {
    pub total_tokens: usize,
    pub total_bytes: usize,
    /// Single-character `Error` tokens from the no-match fallback
    pub fallback_tokens: usize,
    pub category_counts: BTreeMap<TokenCategory, usize>,
    /// Longest token in bytes
    pub longest_token: usize,
    pub max_stack_depth: usize,
    pub nested_passes: usize,
    pub nested_limit_hits: usize,
    /// States still on the stack at end of input, innermost last
    pub open_states: Vec<String>,
}

impl LexicalMetrics {
    pub(crate) fn record_token(&mut self, token: &Token<'_>, detailed: bool) {
        self.total_tokens += 1;
        self.total_bytes += token.len();

        if detailed {
            *self.category_counts.entry(token.kind.category()).or_insert(0) += 1;
            self.longest_token = self.longest_token.max(token.len());
        }
    }

    pub(crate) fn record_run(&mut self, stats: RunStats, open_states: Vec<&str>, detailed: bool) {
        self.fallback_tokens = stats.fallback_tokens;
        self.nested_limit_hits = stats.nested_limit_hits;
        self.open_states = open_states.into_iter().map(str::to_string).collect();

        if detailed {
            self.max_stack_depth = stats.max_stack_depth;
            self.nested_passes = stats.nested_passes;
        }
    }

    pub fn category_count(&self, category: TokenCategory) -> usize {
        self.category_counts.get(&category).copied().unwrap_or(0)
    }

    pub fn has_unrecognized_input(&self) -> bool {
        self.fallback_tokens > 0
    }
}

/// Tokenizes whole sources against a rule table
pub struct LexicalAnalyzer {
    metrics: LexicalMetrics,
    preferences: LexicalPreferences,
}

impl LexicalAnalyzer {
    pub fn new() -> Self {
        Self {
            metrics: LexicalMetrics::default(),
            preferences: LexicalPreferences::default(),
        }
    }

    pub fn with_preferences(preferences: LexicalPreferences) -> Self {
        Self {
            metrics: LexicalMetrics::default(),
            preferences,
        }
    }

    pub fn tokenize<'src>(
        &mut self,
        table: &RuleTable,
        source: &'src str,
    ) -> Result<Vec<Token<'src>>, LexerError> {
        self.tokenize_source(table, source, "<input>")
    }

    pub fn tokenize_file_result<'src>(
        &mut self,
        table: &RuleTable,
        file_result: &'src FileProcessingResult,
    ) -> Result<Vec<Token<'src>>, LexerError> {
        let file = file_result.metadata.path.display().to_string();
        self.tokenize_source(table, &file_result.source, &file)
    }

    /// Tokenize `source`; `name` only labels log events
    pub fn tokenize_source<'src>(
        &mut self,
        table: &RuleTable,
        source: &'src str,
        name: &str,
    ) -> Result<Vec<Token<'src>>, LexerError> {
        self.metrics = LexicalMetrics::default();
        let start_time = std::time::Instant::now();
        let start_state = self.preferences.start_state.as_str();
        let detailed = self.preferences.collect_detailed_metrics;

        let mut run = table.tokenize_in(source, start_state).ok_or_else(|| {
            let error = LexerError::UnknownStartState {
                state: start_state.to_string(),
            };
            log_error!(error.error_code(), "Unknown start state",
                "source" => name,
                "state" => start_state);
            error
        })?;

        log_debug!("Starting lexical analysis",
            "source" => name,
            "bytes" => source.len(),
            "start_state" => start_state,
            "max_nested_depth" => MAX_NESTED_LEX_DEPTH);

        let mut tokens = Vec::new();
        for token in run.by_ref() {
            self.metrics.record_token(&token, detailed);
            tokens.push(token);
        }
        self.metrics
            .record_run(run.stats(), run.open_states(), detailed);

        self.report(name, start_time.elapsed());
        Ok(tokens)
    }

    fn report(&self, name: &str, elapsed: std::time::Duration) {
        let metrics = &self.metrics;

        if metrics.fallback_tokens > 0 && self.preferences.warn_on_unrecognized {
            log_warning!(code = codes::lexical::UNRECOGNIZED_INPUT,
                "Input contained text no rule recognized",
                "source" => name,
                "error_tokens" => metrics.fallback_tokens);
        }

        if metrics.total_tokens > MAX_TOKEN_COUNT_HINT {
            log_warning!(code = codes::lexical::TOKEN_COUNT_HINT_EXCEEDED,
                "Token count is unusually high",
                "source" => name,
                "tokens" => metrics.total_tokens,
                "hint" => MAX_TOKEN_COUNT_HINT);
        }

        if metrics.max_stack_depth > MAX_STATE_STACK_DEPTH_HINT {
            log_warning!(code = codes::lexical::STATE_STACK_HINT_EXCEEDED,
                "State stack grew unusually deep",
                "source" => name,
                "depth" => metrics.max_stack_depth,
                "hint" => MAX_STATE_STACK_DEPTH_HINT);
        }

        if metrics.nested_limit_hits > 0 {
            log_warning!(code = codes::lexical::NESTED_LEX_LIMIT_REACHED,
                "Nested tokenization limit reached; text emitted unclassified",
                "source" => name,
                "hits" => metrics.nested_limit_hits,
                "limit" => MAX_NESTED_LEX_DEPTH);
        }

        if !metrics.open_states.is_empty() {
            log_debug!("States still open at end of input",
                "source" => name,
                "states" => metrics.open_states.join(", "));
        }

        if crate::logging::config::log_performance_events() {
            log_success!(codes::success::TOKENIZATION_COMPLETE,
                "Lexical analysis completed",
                "source" => name,
                "token_count" => metrics.total_tokens,
                "error_tokens" => metrics.fallback_tokens,
                "max_stack_depth" => metrics.max_stack_depth,
                "duration_ms" => format!("{:.2}", elapsed.as_secs_f64() * 1000.0));
        } else {
            log_success!(codes::success::TOKENIZATION_COMPLETE,
                "Lexical analysis completed",
                "source" => name,
                "token_count" => metrics.total_tokens);
        }
    }

    pub fn metrics(&self) -> &LexicalMetrics {
        &self.metrics
    }

    pub fn preferences(&self) -> &LexicalPreferences {
        &self.preferences
    }

    pub fn set_preferences(&mut self, preferences: LexicalPreferences) {
        self.preferences = preferences;
    }
}

impl Default for LexicalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Count of tokens of one kind, for quick checks
pub fn count_kind(tokens: &[Token<'_>], kind: TokenKind) -> usize {
    tokens.iter().filter(|t| t.kind == kind).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::default_table;
    use crate::logging::test_support::memory_logger;
    use assert_matches::assert_matches;

    fn preferences(start_state: &str) -> LexicalPreferences {
        LexicalPreferences {
            start_state: start_state.to_string(),
            collect_detailed_metrics: true,
            warn_on_unrecognized: true,
        }
    }

    #[test]
    fn test_metrics_by_category() {
        let table = default_table().unwrap();
        let mut analyzer = LexicalAnalyzer::with_preferences(preferences("root"));
        let tokens = analyzer.tokenize(table, "x := 1;").unwrap();

        let metrics = analyzer.metrics();
        assert_eq!(metrics.total_tokens, tokens.len());
        assert_eq!(metrics.total_bytes, 7);
        assert_eq!(metrics.category_count(TokenCategory::Name), 1);
        assert_eq!(metrics.category_count(TokenCategory::Operator), 1);
        assert_eq!(metrics.category_count(TokenCategory::Number), 1);
        assert_eq!(metrics.category_count(TokenCategory::Punctuation), 1);
        assert_eq!(metrics.category_count(TokenCategory::Whitespace), 2);
        assert_eq!(metrics.longest_token, 2);
        assert!(!metrics.has_unrecognized_input());
        assert!(metrics.open_states.is_empty());
    }

    #[test]
    fn test_unknown_start_state() {
        let table = default_table().unwrap();
        let mut analyzer = LexicalAnalyzer::with_preferences(preferences("no-such-state"));
        let result = analyzer.tokenize(table, "x");
        assert_matches!(result, Err(LexerError::UnknownStartState { state }) if state == "no-such-state");
    }

    #[test]
    fn test_start_state_is_honoured() {
        let table = default_table().unwrap();
        let mut analyzer = LexicalAnalyzer::with_preferences(preferences("string"));
        let tokens = analyzer.tokenize(table, r#"abc" x"#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[1].text, "\"");
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Name));
    }

    #[test]
    fn test_fallback_warning_is_logged() {
        let memory = memory_logger();
        let table = default_table().unwrap();
        let mut analyzer = LexicalAnalyzer::with_preferences(preferences("root"));
        let tokens = analyzer
            .tokenize_source(table, "intrinsic ; x", "fallback-warning-test")
            .unwrap();

        assert_eq!(count_kind(&tokens, TokenKind::Error), 1);
        assert_eq!(analyzer.metrics().fallback_tokens, 1);

        let warnings: Vec<_> = memory
            .get_events_with_code(codes::lexical::UNRECOGNIZED_INPUT)
            .into_iter()
            .filter(|e| e.context.get("source").map(String::as_str) == Some("fallback-warning-test"))
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].context.get("error_tokens").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_open_states_recorded() {
        let memory = memory_logger();
        let table = default_table().unwrap();
        let mut analyzer = LexicalAnalyzer::with_preferences(preferences("root"));
        analyzer
            .tokenize_source(table, "f(\"unterminated", "open-states-test")
            .unwrap();

        assert_eq!(analyzer.metrics().open_states, vec!["()", "string"]);
        assert!(memory.get_events().iter().any(|e| e.is_debug()
            && e.context.get("source").map(String::as_str) == Some("open-states-test")
            && e.context.get("states").map(String::as_str) == Some("(), string")));
        assert!(memory.get_events().iter().any(|e| e.code == codes::success::TOKENIZATION_COMPLETE
            && e.context.get("source").map(String::as_str) == Some("open-states-test")));
    }

    #[test]
    fn test_metrics_reset_between_runs() {
        let table = default_table().unwrap();
        let mut analyzer = LexicalAnalyzer::new();
        analyzer.tokenize(table, "a b c d e f").unwrap();
        analyzer.tokenize(table, "").unwrap();
        assert_eq!(analyzer.metrics().total_tokens, 0);
    }
}
