//! Declarative rule types
//!
//! A grammar is a list of [`StateDef`]s. Each state is an ordered list of
//! [`RuleDef`]s: either a pattern with an action and transition, or an
//! include of another state that is spliced in when the table is built.

use crate::tokens::TokenKind;

/// A regular expression anchored at the cursor, plus look-around guards
///
/// The `regex` crate has no look-around, and patterns are matched against
/// the text from the cursor onwards, so a leading `\b` cannot see the
/// previous character. `word_start` and `not_followed_by` cover the two
/// cases the grammar needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub source: String,
    /// The character before the cursor must not be a word character
    pub word_start: bool,
    /// The match must not be immediately followed by this character
    pub not_followed_by: Option<char>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            word_start: false,
            not_followed_by: None,
        }
    }

    pub fn word_start(mut self) -> Self {
        self.word_start = true;
        self
    }

    pub fn not_followed_by(mut self, ch: char) -> Self {
        self.not_followed_by = Some(ch);
        self
    }
}

impl From<&str> for Pattern {
    fn from(source: &str) -> Self {
        Pattern::new(source)
    }
}

impl From<String> for Pattern {
    fn from(source: String) -> Self {
        Pattern::new(source)
    }
}

/// What a single capture group turns into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupAction {
    Emit(TokenKind),
    /// Re-tokenize the group text starting from the named state
    Using(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// One token for the whole match
    Emit(TokenKind),
    /// One entry per capture group, in group order
    ByGroups(Vec<GroupAction>),
}

/// State-stack change applied after a match
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Transition {
    #[default]
    None,
    Push(String),
    /// No-op when only the bottom state remains
    Pop,
    /// Pop, then push
    Replace(String),
    /// Push each in order; the last one ends on top
    PushSequence(Vec<String>),
}

impl Transition {
    pub fn push(state: &str) -> Self {
        Transition::Push(state.to_string())
    }

    pub fn replace(state: &str) -> Self {
        Transition::Replace(state.to_string())
    }

    pub fn push_sequence(states: &[&str]) -> Self {
        Transition::PushSequence(states.iter().map(|s| s.to_string()).collect())
    }

    /// States this transition refers to
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Transition::None | Transition::Pop => Vec::new(),
            Transition::Push(s) | Transition::Replace(s) => vec![s.as_str()],
            Transition::PushSequence(states) => states.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule {
    pub pattern: Pattern,
    pub action: Action,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleDef {
    Match(MatchRule),
    /// Splice the named state's rules here at build time
    Include(String),
}

/// A named, ordered rule list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDef {
    pub name: String,
    pub rules: Vec<RuleDef>,
}

impl StateDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rules: Vec::new(),
        }
    }

    pub fn rule(self, pattern: impl Into<Pattern>, kind: TokenKind) -> Self {
        self.rule_then(pattern, kind, Transition::None)
    }

    pub fn rule_then(
        self,
        pattern: impl Into<Pattern>,
        kind: TokenKind,
        transition: Transition,
    ) -> Self {
        self.push_rule(pattern.into(), Action::Emit(kind), transition)
    }

    pub fn groups(
        self,
        pattern: impl Into<Pattern>,
        groups: Vec<GroupAction>,
        transition: Transition,
    ) -> Self {
        self.push_rule(pattern.into(), Action::ByGroups(groups), transition)
    }

    /// Zero-width rule that pops when nothing else in the state matched
    pub fn default_pop(self) -> Self {
        self.push_rule(Pattern::new(""), Action::ByGroups(Vec::new()), Transition::Pop)
    }

    pub fn include(mut self, state: &str) -> Self {
        self.rules.push(RuleDef::Include(state.to_string()));
        self
    }

    fn push_rule(mut self, pattern: Pattern, action: Action, transition: Transition) -> Self {
        self.rules.push(RuleDef::Match(MatchRule {
            pattern,
            action,
            transition,
        }));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_builder_keeps_declaration_order() {
        let state = StateDef::new("string")
            .rule(r#"[^\\"]+"#, TokenKind::String)
            .rule_then("\"", TokenKind::String, Transition::Pop)
            .include("escapes");

        assert_eq!(state.rules.len(), 3);
        assert!(matches!(&state.rules[1], RuleDef::Match(r) if r.transition == Transition::Pop));
        assert_eq!(state.rules[2], RuleDef::Include("escapes".to_string()));
    }

    #[test]
    fn test_pattern_guards() {
        let pattern = Pattern::new("[0-9]+\\.").not_followed_by('.').word_start();
        assert!(pattern.word_start);
        assert_eq!(pattern.not_followed_by, Some('.'));
    }

    #[test]
    fn test_transition_targets() {
        let seq = Transition::push_sequence(&["docs", "args", "name"]);
        assert_eq!(seq.targets(), vec!["docs", "args", "name"]);
        assert!(Transition::Pop.targets().is_empty());
    }
}
