//! The Magma lexical grammar
//!
//! `root` tries REPL error lines first, then intrinsic declarations, then
//! ordinary code (`base`). Bracket states `()` and `{}` nest through
//! self-pushes; `comment-multiline` tracks nested block comments.

use super::keywords::reserved_words;
use super::rules::{GroupAction, Pattern, StateDef, Transition};
use super::table::{RuleTable, RuleTableBuilder, RuleTableError, ROOT_STATE};
use crate::tokens::TokenKind;
use std::sync::OnceLock;

/// Lines Magma prints on failures and at exit
const ERROR_MESSAGES: &[&str] = &[
    r"Runtime error in .*?:.*",
    r"Argument types given:",
    r"User error:.*",
    r"Magma: Internal error",
    r"Machine type: \S+",
    r"Initial seed: \S+",
    r"Time to this point: \S+",
    r"Memory usage: \S+?MB",
    r"Internal error at \S+, line \S+",
    r"Illegal operation",
    r"Time:",
];

/// All state definitions, in declaration order
pub fn magma_states() -> Vec<StateDef> {
    vec![
        StateDef::new(ROOT_STATE)
            .include("error-messages")
            .include("intrinsic")
            .include("base"),
        base(),
        StateDef::new("end")
            .include("whitespace-comments")
            .rule_then(r"\w+", TokenKind::KeywordReserved, Transition::Pop)
            .default_pop(),
        // Only the openers: `base` includes this state, so including `base`
        // back would be circular.
        StateDef::new("balancing")
            .rule_then(r"\(", TokenKind::Punctuation, Transition::push("()"))
            .rule_then(r"\{", TokenKind::Punctuation, Transition::push("{}")),
        StateDef::new("()")
            .rule_then(r"\(", TokenKind::Punctuation, Transition::push("()"))
            .rule_then(r"\)", TokenKind::Punctuation, Transition::Pop)
            .include("base"),
        StateDef::new("{}")
            .rule_then(r"\{", TokenKind::Punctuation, Transition::push("{}"))
            .rule_then(r"\}", TokenKind::Punctuation, Transition::Pop)
            .include("base"),
        StateDef::new("string")
            .rule(r#"[^\\"]+"#, TokenKind::String)
            .rule_then("\"", TokenKind::String, Transition::Pop)
            .rule(r"\\.", TokenKind::StringEscape),
        StateDef::new("whitespace-comments")
            .rule(r"\s+", TokenKind::Whitespace)
            .rule(r"//.*", TokenKind::CommentSingle)
            .rule_then(
                r"/\*",
                TokenKind::CommentMultiline,
                Transition::push("comment-multiline"),
            ),
        StateDef::new("comment-multiline")
            .rule_then(r"\*+/", TokenKind::CommentMultiline, Transition::Pop)
            .rule_then(
                r"/\*",
                TokenKind::CommentMultiline,
                Transition::push("comment-multiline"),
            )
            .rule(r"\*+", TokenKind::CommentMultiline)
            .rule(r"[^*/]+", TokenKind::CommentMultiline)
            .rule("/", TokenKind::CommentMultiline),
        StateDef::new("number")
            .rule("0[xX][a-fA-F0-9]+", TokenKind::NumberHex)
            .rule("0[bB][01]+", TokenKind::NumberBin)
            .rule(r"[0-9]+\.[0-9]+", TokenKind::NumberFloat)
            .rule(
                Pattern::new(r"[0-9]+\.").not_followed_by('.'),
                TokenKind::NumberFloat,
            )
            .rule("[0-9]+", TokenKind::NumberInteger),
        StateDef::new("intrinsic").rule_then(
            Pattern::new(r"intrinsic\b").word_start(),
            TokenKind::KeywordReserved,
            Transition::push_sequence(&[
                "intrinsic-docs",
                "intrinsic-maybe-func",
                "intrinsic-args",
                "intrinsic-name",
            ]),
        ),
        StateDef::new("intrinsic-name")
            .include("whitespace-comments")
            .rule_then(r"'[^']+'|\w+", TokenKind::NameFunction, Transition::Pop),
        StateDef::new("intrinsic-args")
            .include("whitespace-comments")
            .rule_then(r"\(", TokenKind::Punctuation, Transition::replace("()")),
        StateDef::new("intrinsic-maybe-func")
            .include("whitespace-comments")
            .rule_then(
                "->",
                TokenKind::Operator,
                Transition::replace("intrinsic-type-list"),
            )
            .default_pop(),
        StateDef::new("intrinsic-type-list")
            .include("whitespace-comments")
            .groups(
                r"(\S[^{,]*)(,)",
                vec![
                    GroupAction::Using(ROOT_STATE.to_string()),
                    GroupAction::Emit(TokenKind::Punctuation),
                ],
                Transition::None,
            )
            .groups(
                r"(\S[^{,]*)",
                vec![GroupAction::Using(ROOT_STATE.to_string())],
                Transition::Pop,
            ),
        StateDef::new("intrinsic-docs")
            .include("whitespace-comments")
            .rule_then(r"\{", TokenKind::Comment, Transition::replace("intrinsic-comment")),
        StateDef::new("intrinsic-comment")
            .rule_then(r"\{", TokenKind::Comment, Transition::push("intrinsic-comment"))
            .rule_then(r"\}", TokenKind::Comment, Transition::Pop)
            .rule(r"[^{}]+", TokenKind::Comment),
        ERROR_MESSAGES
            .iter()
            .fold(StateDef::new("error-messages"), |state, pattern| {
                state.rule(*pattern, TokenKind::GenericError)
            }),
    ]
}

fn base() -> StateDef {
    let reserved = reserved_words()
        .iter()
        .map(|word| regex::escape(word))
        .collect::<Vec<_>>()
        .join("|");

    StateDef::new("base")
        .include("whitespace-comments")
        .include("number")
        .include("balancing")
        .rule_then(r"end\b", TokenKind::KeywordReserved, Transition::push("end"))
        .rule_then("\"", TokenKind::String, Transition::push("string"))
        .rule(r"'[^']+'", TokenKind::NameBuiltin)
        .rule(r"\.\.|::|:=|:->|->", TokenKind::Operator)
        .rule(r"[^\w\s]", TokenKind::Punctuation)
        .groups(
            Pattern::new(r"(function|procedure)(\s+)(\w+)").word_start(),
            vec![
                GroupAction::Emit(TokenKind::KeywordReserved),
                GroupAction::Emit(TokenKind::Whitespace),
                GroupAction::Emit(TokenKind::NameFunction),
            ],
            Transition::None,
        )
        .rule(
            Pattern::new(format!(r"(?:{})\b", reserved)).word_start(),
            TokenKind::KeywordReserved,
        )
        .rule(r"(true|false)\b", TokenKind::NameConstant)
        .rule(r"[A-Z]+[a-z]+(?:[A-Z]+[a-z]*)*", TokenKind::NameBuiltin)
        .rule(r"\w+", TokenKind::Name)
}

/// Build a fresh Magma rule table
pub fn magma_table() -> Result<RuleTable, RuleTableError> {
    magma_states()
        .into_iter()
        .fold(RuleTableBuilder::new(), RuleTableBuilder::state)
        .build()
}

static DEFAULT_TABLE: OnceLock<Result<RuleTable, RuleTableError>> = OnceLock::new();

/// Process-wide Magma table, built on first use
pub fn default_table() -> Result<&'static RuleTable, RuleTableError> {
    DEFAULT_TABLE
        .get_or_init(magma_table)
        .as_ref()
        .map_err(Clone::clone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magma_table_builds() {
        let table = default_table().unwrap();
        for state in [
            "root",
            "base",
            "end",
            "()",
            "{}",
            "string",
            "comment-multiline",
            "intrinsic-type-list",
            "intrinsic-comment",
        ] {
            assert!(table.state_id(state).is_some(), "missing state {state}");
        }
    }

    #[test]
    fn test_root_tries_error_messages_first() {
        let table = default_table().unwrap();
        let root = table.root();
        // 11 error lines + 1 intrinsic rule before any base rule
        assert!(table.flattened_len(root) > ERROR_MESSAGES.len() + 1);
        let first = table.tokenize("Illegal operation").next().unwrap();
        assert_eq!(first.kind, TokenKind::GenericError);
    }

    #[test]
    fn test_default_table_is_shared() {
        let a = default_table().unwrap() as *const RuleTable;
        let b = default_table().unwrap() as *const RuleTable;
        assert_eq!(a, b);
    }
}
