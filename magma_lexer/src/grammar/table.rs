//! Rule table construction
//!
//! `RuleTableBuilder::build` validates state references, compiles every
//! pattern once, and splices includes so each state ends up as a flat list
//! of rule ids. The resulting [`RuleTable`] is immutable and `Send + Sync`.

use super::rules::{Action, GroupAction, MatchRule, RuleDef, StateDef, Transition};
use crate::lexical::engine::{Checkpoint, Tokens};
use crate::logging::codes;
use crate::tokens::TokenKind;
use crate::{log_debug, log_error, log_success};
use regex::Regex;
use std::collections::HashMap;

/// Name of the state every run starts from and never pops
pub const ROOT_STATE: &str = "root";

/// Rule table construction errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleTableError {
    #[error("Invalid pattern '{pattern}' in state '{state}': {source}")]
    InvalidPattern {
        state: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Circular include: {}", cycle.join(" -> "))]
    CircularInclude { cycle: Vec<String> },

    #[error("State '{state}' is declared more than once")]
    DuplicateState { state: String },

    #[error("State '{referenced_from}' references undeclared state '{state}'")]
    UnknownState {
        state: String,
        referenced_from: String,
    },

    #[error("Rule table has no '{}' state", ROOT_STATE)]
    MissingRoot,

    #[error("Pattern '{pattern}' in state '{state}' can match the empty string but does not pop")]
    ZeroWidthRule { state: String, pattern: String },
}

impl RuleTableError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            RuleTableError::InvalidPattern { .. } => codes::grammar::INVALID_PATTERN,
            RuleTableError::CircularInclude { .. } => codes::grammar::CIRCULAR_INCLUDE,
            RuleTableError::DuplicateState { .. } => codes::grammar::DUPLICATE_STATE,
            RuleTableError::UnknownState { .. } => codes::grammar::UNKNOWN_STATE,
            RuleTableError::MissingRoot => codes::grammar::MISSING_ROOT,
            RuleTableError::ZeroWidthRule { .. } => codes::grammar::ZERO_WIDTH_RULE,
        }
    }

    pub fn requires_halt(&self) -> bool {
        codes::requires_halt(self.error_code().as_str())
    }

    pub fn severity(&self) -> &'static str {
        codes::get_severity(self.error_code().as_str()).as_str()
    }

    pub fn category(&self) -> &'static str {
        codes::get_category(self.error_code().as_str())
    }
}

/// Index of a state within its [`RuleTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub(crate) usize);

#[derive(Debug)]
pub(crate) enum CompiledGroup {
    Emit(TokenKind),
    Using(StateId),
}

#[derive(Debug)]
pub(crate) enum CompiledAction {
    Emit(TokenKind),
    ByGroups(Vec<CompiledGroup>),
}

#[derive(Debug)]
pub(crate) enum CompiledTransition {
    None,
    Push(StateId),
    Pop,
    Replace(StateId),
    PushSequence(Vec<StateId>),
}

/// Result of a successful rule match; offsets are relative to the cursor
pub(crate) enum RuleMatch<'s> {
    Whole(usize),
    Groups(regex::Captures<'s>),
}

impl RuleMatch<'_> {
    pub(crate) fn len(&self) -> usize {
        match self {
            RuleMatch::Whole(len) => *len,
            RuleMatch::Groups(caps) => caps.get(0).map(|m| m.end()).unwrap_or(0),
        }
    }
}

#[derive(Debug)]
pub(crate) struct CompiledRule {
    regex: Regex,
    word_start: bool,
    not_followed_by: Option<char>,
    pub(crate) action: CompiledAction,
    pub(crate) transition: CompiledTransition,
}

impl CompiledRule {
    /// Match at exactly `pos`, honouring the guards
    pub(crate) fn match_at<'s>(&self, text: &'s str, pos: usize) -> Option<RuleMatch<'s>> {
        if self.word_start && text[..pos].chars().next_back().is_some_and(is_word_char) {
            return None;
        }

        let rest = &text[pos..];
        let found = match self.action {
            CompiledAction::Emit(_) => RuleMatch::Whole(self.regex.find(rest)?.end()),
            CompiledAction::ByGroups(_) => RuleMatch::Groups(self.regex.captures(rest)?),
        };

        if let Some(ch) = self.not_followed_by {
            if rest[found.len()..].starts_with(ch) {
                return None;
            }
        }

        Some(found)
    }
}

/// Word character in the sense of `\w`
pub(crate) fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

#[derive(Debug)]
struct CompiledState {
    name: String,
    /// Flattened, includes already spliced
    rules: Vec<usize>,
}

/// Immutable, flattened rule table
#[derive(Debug)]
pub struct RuleTable {
    states: Vec<CompiledState>,
    rules: Vec<CompiledRule>,
    index: HashMap<String, StateId>,
    root: StateId,
}

impl RuleTable {
    pub fn root(&self) -> StateId {
        self.root
    }

    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.index.get(name).copied()
    }

    pub fn state_name(&self, id: StateId) -> &str {
        &self.states[id.0].name
    }

    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.name.as_str())
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of distinct compiled patterns
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Number of rules tried in a state after include splicing
    pub fn flattened_len(&self, id: StateId) -> usize {
        self.states[id.0].rules.len()
    }

    pub(crate) fn rules_of(&self, id: StateId) -> impl Iterator<Item = &CompiledRule> {
        self.states[id.0].rules.iter().map(|&r| &self.rules[r])
    }

    pub(crate) fn contains(&self, id: StateId) -> bool {
        id.0 < self.states.len()
    }

    /// Tokenize from the root state
    pub fn tokenize<'t, 'src>(&'t self, text: &'src str) -> Tokens<'t, 'src> {
        Tokens::new(self, text, self.seed_stack(self.root))
    }

    /// Tokenize with `state` pushed on top of root; `None` for an unknown state
    pub fn tokenize_in<'t, 'src>(
        &'t self,
        text: &'src str,
        state: &str,
    ) -> Option<Tokens<'t, 'src>> {
        let id = self.state_id(state)?;
        Some(Tokens::new(self, text, self.seed_stack(id)))
    }

    /// Continue a run from a checkpoint taken on the same text
    ///
    /// Returns `None` when the checkpoint does not fit this table or text.
    pub fn resume<'t, 'src>(
        &'t self,
        text: &'src str,
        checkpoint: &Checkpoint,
    ) -> Option<Tokens<'t, 'src>> {
        let offset = checkpoint.offset();
        let stack = checkpoint.stack();
        if offset > text.len()
            || !text.is_char_boundary(offset)
            || stack.first() != Some(&self.root)
            || !stack.iter().all(|id| self.contains(*id))
        {
            return None;
        }
        Some(Tokens::resume_at(self, text, offset, stack.to_vec()))
    }

    pub(crate) fn seed_stack(&self, state: StateId) -> Vec<StateId> {
        if state == self.root {
            vec![self.root]
        } else {
            vec![self.root, state]
        }
    }
}

/// Collects state definitions and builds a [`RuleTable`]
#[derive(Debug, Default)]
pub struct RuleTableBuilder {
    states: Vec<StateDef>,
}

impl RuleTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: StateDef) -> Self {
        self.states.push(state);
        self
    }

    pub fn build(self) -> Result<RuleTable, RuleTableError> {
        match self.build_inner() {
            Ok(table) => {
                log_success!(codes::success::RULE_TABLE_BUILT, "Rule table built",
                    "states" => table.state_count(),
                    "patterns" => table.rule_count()
                );
                for state in &table.states {
                    log_debug!("State flattened",
                        "state" => state.name.as_str(),
                        "rules" => state.rules.len()
                    );
                }
                Ok(table)
            }
            Err(error) => {
                log_error!(error.error_code(), &error.to_string(),
                    "category" => error.category()
                );
                Err(error)
            }
        }
    }

    fn build_inner(self) -> Result<RuleTable, RuleTableError> {
        let mut index = HashMap::new();
        for (i, state) in self.states.iter().enumerate() {
            if index.insert(state.name.clone(), StateId(i)).is_some() {
                return Err(RuleTableError::DuplicateState {
                    state: state.name.clone(),
                });
            }
        }

        let root = *index.get(ROOT_STATE).ok_or(RuleTableError::MissingRoot)?;

        let resolve = |name: &str, from: &str| -> Result<StateId, RuleTableError> {
            index
                .get(name)
                .copied()
                .ok_or_else(|| RuleTableError::UnknownState {
                    state: name.to_string(),
                    referenced_from: from.to_string(),
                })
        };

        // Compile every declared rule once; includes stay symbolic for now
        let mut rules = Vec::new();
        let mut declared: Vec<Vec<Entry>> = Vec::with_capacity(self.states.len());
        for state in &self.states {
            let mut entries = Vec::with_capacity(state.rules.len());
            for rule in &state.rules {
                match rule {
                    RuleDef::Include(target) => {
                        let id = resolve(target.as_str(), state.name.as_str())?;
                        entries.push(Entry::Include(id));
                    }
                    RuleDef::Match(rule) => {
                        rules.push(compile_rule(rule, &state.name, &resolve)?);
                        entries.push(Entry::Rule(rules.len() - 1));
                    }
                }
            }
            declared.push(entries);
        }

        let mut flattened: Vec<Option<Vec<usize>>> = vec![None; self.states.len()];
        let mut visiting = Vec::new();
        for i in 0..self.states.len() {
            flatten(i, &declared, &self.states, &mut flattened, &mut visiting)?;
        }

        let states = self
            .states
            .into_iter()
            .zip(flattened)
            .map(|(state, rules)| CompiledState {
                name: state.name,
                rules: rules.unwrap_or_default(),
            })
            .collect();

        Ok(RuleTable {
            states,
            rules,
            index,
            root,
        })
    }
}

enum Entry {
    Rule(usize),
    Include(StateId),
}

fn compile_rule(
    rule: &MatchRule,
    state: &str,
    resolve: &dyn Fn(&str, &str) -> Result<StateId, RuleTableError>,
) -> Result<CompiledRule, RuleTableError> {
    let regex = Regex::new(&format!("^(?:{})", rule.pattern.source)).map_err(|source| {
        RuleTableError::InvalidPattern {
            state: state.to_string(),
            pattern: rule.pattern.source.clone(),
            source,
        }
    })?;

    if regex.is_match("") && rule.transition != Transition::Pop {
        return Err(RuleTableError::ZeroWidthRule {
            state: state.to_string(),
            pattern: rule.pattern.source.clone(),
        });
    }

    let action = match &rule.action {
        Action::Emit(kind) => CompiledAction::Emit(*kind),
        Action::ByGroups(groups) => CompiledAction::ByGroups(
            groups
                .iter()
                .map(|group| match group {
                    GroupAction::Emit(kind) => Ok(CompiledGroup::Emit(*kind)),
                    GroupAction::Using(target) => {
                        resolve(target.as_str(), state).map(CompiledGroup::Using)
                    }
                })
                .collect::<Result<_, _>>()?,
        ),
    };

    let transition = match &rule.transition {
        Transition::None => CompiledTransition::None,
        Transition::Pop => CompiledTransition::Pop,
        Transition::Push(target) => CompiledTransition::Push(resolve(target.as_str(), state)?),
        Transition::Replace(target) => {
            CompiledTransition::Replace(resolve(target.as_str(), state)?)
        }
        Transition::PushSequence(targets) => CompiledTransition::PushSequence(
            targets
                .iter()
                .map(|target| resolve(target.as_str(), state))
                .collect::<Result<_, _>>()?,
        ),
    };

    Ok(CompiledRule {
        regex,
        word_start: rule.pattern.word_start,
        not_followed_by: rule.pattern.not_followed_by,
        action,
        transition,
    })
}

/// Depth-first include splicing with cycle detection
fn flatten(
    state: usize,
    declared: &[Vec<Entry>],
    defs: &[StateDef],
    flattened: &mut Vec<Option<Vec<usize>>>,
    visiting: &mut Vec<usize>,
) -> Result<(), RuleTableError> {
    if flattened[state].is_some() {
        return Ok(());
    }

    if let Some(at) = visiting.iter().position(|&s| s == state) {
        let mut cycle: Vec<String> = visiting[at..]
            .iter()
            .map(|&s| defs[s].name.clone())
            .collect();
        cycle.push(defs[state].name.clone());
        return Err(RuleTableError::CircularInclude { cycle });
    }

    visiting.push(state);
    let mut rules = Vec::new();
    for entry in &declared[state] {
        match entry {
            Entry::Rule(id) => rules.push(*id),
            Entry::Include(target) => {
                flatten(target.0, declared, defs, flattened, visiting)?;
                if let Some(spliced) = &flattened[target.0] {
                    rules.extend_from_slice(spliced);
                }
            }
        }
    }
    visiting.pop();

    flattened[state] = Some(rules);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::rules::Pattern;
    use assert_matches::assert_matches;

    fn kinds(table: &RuleTable, text: &str) -> Vec<(TokenKind, String)> {
        table
            .tokenize(text)
            .map(|t| (t.kind, t.text.to_string()))
            .collect()
    }

    #[test]
    fn test_includes_are_spliced_in_order() {
        let table = RuleTableBuilder::new()
            .state(
                StateDef::new("root")
                    .rule("a", TokenKind::Name)
                    .include("shared")
                    .rule("c", TokenKind::Name),
            )
            .state(StateDef::new("shared").rule("b", TokenKind::Operator))
            .build()
            .unwrap();

        let root = table.root();
        assert_eq!(table.flattened_len(root), 3);
        assert_eq!(table.rule_count(), 3);
        assert_eq!(
            kinds(&table, "abc"),
            vec![
                (TokenKind::Name, "a".to_string()),
                (TokenKind::Operator, "b".to_string()),
                (TokenKind::Name, "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_circular_include_reports_cycle() {
        let result = RuleTableBuilder::new()
            .state(StateDef::new("root").include("base"))
            .state(StateDef::new("base").include("balancing"))
            .state(StateDef::new("balancing").include("base"))
            .build();

        assert_matches!(
            result,
            Err(RuleTableError::CircularInclude { cycle })
                if cycle == vec!["base", "balancing", "base"]
        );
    }

    #[test]
    fn test_self_include_is_circular() {
        let result = RuleTableBuilder::new()
            .state(StateDef::new("root").include("root"))
            .build();
        assert_matches!(result, Err(RuleTableError::CircularInclude { .. }));
    }

    #[test]
    fn test_invalid_pattern_names_state_and_pattern() {
        let err = RuleTableBuilder::new()
            .state(StateDef::new("root").rule("(unclosed", TokenKind::Name))
            .build()
            .unwrap_err();

        assert_matches!(&err, RuleTableError::InvalidPattern { state, pattern, .. }
            if state == "root" && pattern == "(unclosed");
        assert_eq!(err.error_code(), codes::grammar::INVALID_PATTERN);
        assert!(err.requires_halt());
    }

    #[test]
    fn test_duplicate_state() {
        let result = RuleTableBuilder::new()
            .state(StateDef::new("root").rule("a", TokenKind::Name))
            .state(StateDef::new("root").rule("b", TokenKind::Name))
            .build();
        assert_matches!(result, Err(RuleTableError::DuplicateState { state }) if state == "root");
    }

    #[test]
    fn test_unknown_state_references() {
        let push = RuleTableBuilder::new()
            .state(StateDef::new("root").rule_then("\"", TokenKind::String, Transition::push("string")))
            .build();
        assert_matches!(push, Err(RuleTableError::UnknownState { state, referenced_from })
            if state == "string" && referenced_from == "root");

        let include = RuleTableBuilder::new()
            .state(StateDef::new("root").include("missing"))
            .build();
        assert_matches!(include, Err(RuleTableError::UnknownState { .. }));

        let using = RuleTableBuilder::new()
            .state(StateDef::new("root").groups(
                "(x)",
                vec![GroupAction::Using("nowhere".to_string())],
                Transition::None,
            ))
            .build();
        assert_matches!(using, Err(RuleTableError::UnknownState { .. }));
    }

    #[test]
    fn test_missing_root() {
        let result = RuleTableBuilder::new()
            .state(StateDef::new("base").rule("a", TokenKind::Name))
            .build();
        assert_matches!(result, Err(RuleTableError::MissingRoot));
    }

    #[test]
    fn test_zero_width_rule_must_pop() {
        let result = RuleTableBuilder::new()
            .state(StateDef::new("root").rule("a*", TokenKind::Name))
            .build();
        assert_matches!(result, Err(RuleTableError::ZeroWidthRule { .. }));

        let ok = RuleTableBuilder::new()
            .state(StateDef::new("root").rule("a", TokenKind::Name))
            .state(StateDef::new("maybe").default_pop())
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_build_failure_is_logged() {
        let memory = crate::logging::test_support::memory_logger();
        let _ = RuleTableBuilder::new()
            .state(StateDef::new("root").include("logged-missing-state"))
            .build();

        assert!(memory
            .get_events_with_code(codes::grammar::UNKNOWN_STATE)
            .iter()
            .any(|e| e.message.contains("logged-missing-state")));
    }

    #[test]
    fn test_word_start_guard() {
        let table = RuleTableBuilder::new()
            .state(
                StateDef::new("root")
                    .rule(Pattern::new(r"if\b").word_start(), TokenKind::KeywordReserved)
                    .rule(r"\w+", TokenKind::Name)
                    .rule(r"\s+", TokenKind::Whitespace),
            )
            .build()
            .unwrap();

        assert_eq!(kinds(&table, "if")[0].0, TokenKind::KeywordReserved);
        // "xif" is consumed whole by \w+; "x if" keeps the keyword
        assert_eq!(kinds(&table, "x if")[2].0, TokenKind::KeywordReserved);
        assert_eq!(kinds(&table, "iffy")[0].0, TokenKind::Name);
    }

    #[test]
    fn test_table_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuleTable>();
    }
}
