//! The match engine
//!
//! [`Tokens`] walks the text left to right. At each cursor position the
//! rules of the state on top of the stack are tried in order and the first
//! match wins. When nothing matches, one character is emitted as
//! `TokenKind::Error`, so every run terminates and covers its input.

use crate::config::compile_time::lexical::MAX_NESTED_LEX_DEPTH;
use crate::grammar::table::{
    CompiledAction, CompiledGroup, CompiledTransition, RuleMatch, RuleTable, StateId,
};
use crate::tokens::{Token, TokenKind};
use std::collections::VecDeque;

/// Saved cursor and state stack, taken between matches
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checkpoint {
    offset: usize,
    stack: Vec<StateId>,
}

impl Checkpoint {
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bottom (root) first
    pub fn stack(&self) -> &[StateId] {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// Counters for a single run, nested passes included
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub fallback_tokens: usize,
    pub max_stack_depth: usize,
    pub nested_passes: usize,
    pub nested_limit_hits: usize,
}

impl RunStats {
    fn absorb(&mut self, nested: RunStats) {
        self.fallback_tokens += nested.fallback_tokens;
        self.max_stack_depth = self.max_stack_depth.max(nested.max_stack_depth);
        self.nested_passes += nested.nested_passes + 1;
        self.nested_limit_hits += nested.nested_limit_hits;
    }
}

/// Lazy token iterator over one text
///
/// Obtained from [`RuleTable::tokenize`], [`RuleTable::tokenize_in`] or
/// [`RuleTable::resume`]. Each run owns its stack; the table is only read.
pub struct Tokens<'t, 'src> {
    table: &'t RuleTable,
    text: &'src str,
    /// Absolute offset of `text` within the outermost input
    base: usize,
    pos: usize,
    stack: Vec<StateId>,
    pending: VecDeque<Token<'src>>,
    depth: usize,
    stats: RunStats,
}

impl<'t, 'src> Tokens<'t, 'src> {
    pub(crate) fn new(table: &'t RuleTable, text: &'src str, stack: Vec<StateId>) -> Self {
        Self::resume_at(table, text, 0, stack)
    }

    pub(crate) fn resume_at(
        table: &'t RuleTable,
        text: &'src str,
        pos: usize,
        stack: Vec<StateId>,
    ) -> Self {
        let stats = RunStats {
            max_stack_depth: stack.len(),
            ..RunStats::default()
        };
        Self {
            table,
            text,
            base: 0,
            pos,
            stack,
            pending: VecDeque::new(),
            depth: 0,
            stats,
        }
    }

    /// Offset of the next token to be yielded
    pub fn offset(&self) -> usize {
        self.pending
            .front()
            .map(|token| token.start)
            .unwrap_or(self.base + self.pos)
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Names of the states still open above root
    pub fn open_states(&self) -> Vec<&'t str> {
        let table = self.table;
        self.stack[1..]
            .iter()
            .map(|id| table.state_name(*id))
            .collect()
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// `None` while tokens of a multi-token match are still queued
    pub fn checkpoint(&self) -> Option<Checkpoint> {
        if !self.pending.is_empty() || self.depth > 0 {
            return None;
        }
        Some(Checkpoint {
            offset: self.base + self.pos,
            stack: self.stack.clone(),
        })
    }

    fn step(&mut self) {
        let table = self.table;
        let state = self.stack.last().copied().unwrap_or_else(|| table.root());

        for rule in table.rules_of(state) {
            let Some(found) = rule.match_at(self.text, self.pos) else {
                continue;
            };

            let len = found.len();
            if len == 0 {
                // Zero-width matches may only pop, and never the root
                if matches!(rule.transition, CompiledTransition::Pop) && self.stack.len() > 1 {
                    self.stack.pop();
                    return;
                }
                continue;
            }

            let start = self.pos;
            let end = start + len;
            self.pos = end;

            match (&rule.action, &found) {
                (CompiledAction::ByGroups(groups), RuleMatch::Groups(caps)) => {
                    self.emit_groups(groups, caps, start, end)
                }
                (CompiledAction::Emit(kind), _) => self.emit(*kind, start, end),
                (CompiledAction::ByGroups(_), RuleMatch::Whole(_)) => {
                    self.emit(TokenKind::Text, start, end)
                }
            }

            self.apply(&rule.transition);
            return;
        }

        self.fallback();
    }

    fn emit(&mut self, kind: TokenKind, start: usize, end: usize) {
        if start < end {
            self.pending
                .push_back(Token::new(kind, &self.text[start..end], self.base + start));
        }
    }

    /// Text outside every group is emitted as `Text` so the match stays covered
    fn emit_groups(
        &mut self,
        groups: &[CompiledGroup],
        caps: &regex::Captures<'_>,
        start: usize,
        end: usize,
    ) {
        let mut cursor = start;
        for (index, group) in groups.iter().enumerate() {
            let Some(m) = caps.get(index + 1) else {
                continue;
            };
            let (group_start, group_end) = (start + m.start(), start + m.end());
            if group_start == group_end || group_start < cursor {
                continue;
            }

            self.emit(TokenKind::Text, cursor, group_start);
            match group {
                CompiledGroup::Emit(kind) => self.emit(*kind, group_start, group_end),
                CompiledGroup::Using(state) => self.sub_lex(*state, group_start, group_end),
            }
            cursor = group_end;
        }
        self.emit(TokenKind::Text, cursor, end);
    }

    fn sub_lex(&mut self, state: StateId, start: usize, end: usize) {
        if self.depth >= MAX_NESTED_LEX_DEPTH {
            self.stats.nested_limit_hits += 1;
            self.emit(TokenKind::Text, start, end);
            return;
        }

        let mut nested = Tokens {
            table: self.table,
            text: &self.text[start..end],
            base: self.base + start,
            pos: 0,
            stack: self.table.seed_stack(state),
            pending: VecDeque::new(),
            depth: self.depth + 1,
            stats: RunStats::default(),
        };
        self.pending.extend(nested.by_ref());
        self.stats.absorb(nested.stats);
    }

    fn apply(&mut self, transition: &CompiledTransition) {
        match transition {
            CompiledTransition::None => {}
            CompiledTransition::Push(id) => self.stack.push(*id),
            CompiledTransition::Pop => self.pop(),
            CompiledTransition::Replace(id) => {
                self.pop();
                self.stack.push(*id);
            }
            CompiledTransition::PushSequence(ids) => self.stack.extend_from_slice(ids),
        }
        self.stats.max_stack_depth = self.stats.max_stack_depth.max(self.stack.len());
    }

    fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    fn fallback(&mut self) {
        let start = self.pos;
        let width = self.text[start..]
            .chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(1);
        self.pos = start + width;
        self.stats.fallback_tokens += 1;
        self.emit(TokenKind::Error, start, self.pos);
    }
}

impl<'src> Iterator for Tokens<'_, 'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Token<'src>> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(token);
            }
            if self.pos >= self.text.len() {
                return None;
            }
            self.step();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GroupAction, RuleTableBuilder, StateDef, Transition};

    fn brackets() -> RuleTable {
        RuleTableBuilder::new()
            .state(
                StateDef::new("root")
                    .rule_then(r"\[", TokenKind::Punctuation, Transition::push("inner"))
                    .rule("[a-z]+", TokenKind::Name),
            )
            .state(
                StateDef::new("inner")
                    .rule_then(r"\]", TokenKind::Punctuation, Transition::Pop)
                    .rule("[0-9]+", TokenKind::NumberInteger),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_fallback_covers_whole_character() {
        let table = brackets();
        let tokens: Vec<_> = table.tokenize("a→b").collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].kind, TokenKind::Error);
        assert_eq!(tokens[1].text, "→");
        assert_eq!((tokens[1].start, tokens[1].end), (1, 4));
    }

    #[test]
    fn test_fallback_is_counted() {
        let table = brackets();
        let mut run = table.tokenize("a!!b");
        run.by_ref().for_each(drop);
        assert_eq!(run.stats().fallback_tokens, 2);
    }

    #[test]
    fn test_open_states_reported_at_end() {
        let table = brackets();
        let mut run = table.tokenize("a[1[");
        let kinds: Vec<_> = run.by_ref().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Name,
                TokenKind::Punctuation,
                TokenKind::NumberInteger,
                TokenKind::Error
            ]
        );
        assert_eq!(run.open_states(), vec!["inner"]);
        assert_eq!(run.stats().max_stack_depth, 2);
    }

    #[test]
    fn test_pop_at_root_is_noop() {
        let table = RuleTableBuilder::new()
            .state(StateDef::new("root").rule_then(r"\)", TokenKind::Punctuation, Transition::Pop))
            .build()
            .unwrap();
        let mut run = table.tokenize(")))");
        assert_eq!(run.by_ref().count(), 3);
        assert_eq!(run.stack_depth(), 1);
    }

    #[test]
    fn test_push_sequence_last_on_top() {
        let table = RuleTableBuilder::new()
            .state(StateDef::new("root").rule_then(
                "go",
                TokenKind::KeywordReserved,
                Transition::push_sequence(&["third", "second", "first"]),
            ))
            .state(StateDef::new("first").rule_then("1", TokenKind::NumberInteger, Transition::Pop))
            .state(StateDef::new("second").rule_then("2", TokenKind::NumberInteger, Transition::Pop))
            .state(StateDef::new("third").rule_then("3", TokenKind::NumberInteger, Transition::Pop))
            .build()
            .unwrap();

        let kinds: Vec<_> = table.tokenize("go123").map(|t| t.kind).collect();
        assert!(!kinds.contains(&TokenKind::Error));

        let reversed: Vec<_> = table.tokenize("go321").map(|t| t.kind).collect();
        assert_eq!(reversed[1], TokenKind::Error);
    }

    #[test]
    fn test_default_pop_leaves_state_without_output() {
        let table = RuleTableBuilder::new()
            .state(
                StateDef::new("root")
                    .rule_then("end", TokenKind::KeywordReserved, Transition::push("after"))
                    .rule(";", TokenKind::Punctuation),
            )
            .state(
                StateDef::new("after")
                    .rule_then("[a-z]+", TokenKind::KeywordReserved, Transition::Pop)
                    .default_pop(),
            )
            .build()
            .unwrap();

        let tokens: Vec<_> = table.tokenize("end;").collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].kind, TokenKind::Punctuation);
    }

    #[test]
    fn test_gap_text_between_groups() {
        let table = RuleTableBuilder::new()
            .state(StateDef::new("root").groups(
                "(a)-(b)!",
                vec![
                    GroupAction::Emit(TokenKind::Name),
                    GroupAction::Emit(TokenKind::Name),
                ],
                Transition::None,
            ))
            .build()
            .unwrap();

        let tokens: Vec<_> = table.tokenize("a-b!").map(|t| (t.kind, t.text)).collect();
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Name, "a"),
                (TokenKind::Text, "-"),
                (TokenKind::Name, "b"),
                (TokenKind::Text, "!"),
            ]
        );
    }

    #[test]
    fn test_sub_lex_uses_absolute_offsets() {
        let table = RuleTableBuilder::new()
            .state(
                StateDef::new("root")
                    .groups(
                        r"<([^>]*)>",
                        vec![GroupAction::Using("inside".to_string())],
                        Transition::None,
                    )
                    .rule(" ", TokenKind::Whitespace),
            )
            .state(
                StateDef::new("inside")
                    .rule("[0-9]+", TokenKind::NumberInteger)
                    .rule(",", TokenKind::Punctuation),
            )
            .build()
            .unwrap();

        let text = " <12,3>";
        let mut run = table.tokenize(text);
        let tokens: Vec<_> = run.by_ref().collect();
        let twelve = tokens.iter().find(|t| t.text == "12").unwrap();
        assert_eq!(twelve.kind, TokenKind::NumberInteger);
        assert_eq!((twelve.start, twelve.end), (2, 4));
        assert!(tokens.iter().all(|t| &text[t.start..t.end] == t.text));
        assert_eq!(run.stats().nested_passes, 1);
    }

    #[test]
    fn test_nested_lex_depth_is_bounded() {
        let table = RuleTableBuilder::new()
            .state(
                StateDef::new("root")
                    .groups(
                        "x(.+)",
                        vec![GroupAction::Using("root".to_string())],
                        Transition::None,
                    )
                    .rule("y", TokenKind::Name),
            )
            .build()
            .unwrap();

        let text = format!("{}y", "x".repeat(MAX_NESTED_LEX_DEPTH + 5));
        let mut run = table.tokenize(&text);
        let tokens: Vec<_> = run.by_ref().collect();

        let covered: usize = tokens.iter().map(|t| t.len()).sum();
        assert_eq!(covered, text.len());
        assert_eq!(run.stats().nested_limit_hits, 1);
        assert_eq!(run.stats().nested_passes, MAX_NESTED_LEX_DEPTH);
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Text));
    }

    #[test]
    fn test_checkpoint_between_matches() {
        let table = brackets();
        let text = "ab[12]cd";
        let mut run = table.tokenize(text);
        run.next();
        run.next();
        let checkpoint = run.checkpoint().unwrap();
        assert_eq!(checkpoint.offset(), 3);
        assert_eq!(checkpoint.depth(), 2);

        let tail: Vec<_> = run.collect();
        let resumed: Vec<_> = table.resume(text, &checkpoint).unwrap().collect();
        assert_eq!(tail, resumed);
    }

    #[test]
    fn test_resume_rejects_bad_checkpoints() {
        let table = brackets();
        let mut run = table.tokenize("a[1]");
        run.next();
        let checkpoint = run.checkpoint().unwrap();

        assert!(table.resume("", &checkpoint).is_none());
        assert!(table.resume("é", &Checkpoint { offset: 1, stack: vec![table.root()] }).is_none());
        assert!(table
            .resume("a[1]", &Checkpoint { offset: 0, stack: vec![StateId(99)] })
            .is_none());
    }
}
