//! Magma reserved words
//!
//! The six categories come from the Emacs Magma mode. They overlap (`case`,
//! `else`, `when`, ...) and all of them tokenize as `Keyword.Reserved`; the
//! category split exists only to keep the lists maintainable.

use std::collections::BTreeSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordCategory {
    Core,
    Operator,
    Statement,
    Constructor,
    BlockOpen,
    BlockClose,
}

impl KeywordCategory {
    pub const ALL: [KeywordCategory; 6] = [
        KeywordCategory::Core,
        KeywordCategory::Operator,
        KeywordCategory::Statement,
        KeywordCategory::Constructor,
        KeywordCategory::BlockOpen,
        KeywordCategory::BlockClose,
    ];

    pub fn words(&self) -> &'static [&'static str] {
        match self {
            KeywordCategory::Core => CORE,
            KeywordCategory::Operator => OPERATORS,
            KeywordCategory::Statement => STATEMENTS,
            KeywordCategory::Constructor => CONSTRUCTORS,
            KeywordCategory::BlockOpen => BLOCK_OPEN,
            KeywordCategory::BlockClose => BLOCK_CLOSE,
        }
    }
}

const CORE: &[&str] = &[
    "_", "by", "default", "do", "is", "select", "then", "to", "where", "end", "until", "catch",
    "elif", "else", "when", "case", "for", "function", "if", "intrinsic", "procedure", "repeat",
    "try", "while",
];

const OPERATORS: &[&str] = &[
    "adj", "and", "cat", "cmpeq", "cmpne", "diff", "div", "eq", "ge", "gt", "in", "join", "le",
    "lt", "meet", "mod", "ne", "notadj", "notin", "notsubset", "or", "sdiff", "subset", "xor",
    "not",
];

const STATEMENTS: &[&str] = &[
    "assert", "assert2", "assert3", "break", "clear", "continue", "declare", "delete", "error",
    "error", "if", "eval", "exit", "forward", "fprintf", "freeze", "iload", "import", "load",
    "local", "print", "printf", "quit", "random", "read", "readi", "require", "requirege",
    "requirerange", "restore", "return", "save", "time", "vprint", "vprintf", "vtime",
    "assigned", "exists", "forall",
];

const CONSTRUCTORS: &[&str] = &[
    "car", "case", "cop", "elt", "ext", "func", "hom", "ideal", "lideal", "map", "ncl", "pmap",
    "proc", "quo", "rec", "recformat", "rideal", "sub",
];

const BLOCK_OPEN: &[&str] = &[
    "try", "catch", "case", "when", "then", "else", "do", "repeat", "function", "procedure",
    "intrinsic",
];

const BLOCK_CLOSE: &[&str] = &["until", "end", "when", "elif", "else", "catch"];

static RESERVED: OnceLock<Vec<&'static str>> = OnceLock::new();

/// All categories merged and deduplicated, longest first
///
/// Longest-first keeps an alternation from settling on a prefix (`assert`
/// before `assert2`) before the trailing word boundary is checked.
pub fn reserved_words() -> &'static [&'static str] {
    RESERVED.get_or_init(|| {
        let unique: BTreeSet<&'static str> = KeywordCategory::ALL
            .iter()
            .flat_map(|category| category.words().iter().copied())
            .collect();

        let mut words: Vec<&'static str> = unique.into_iter().collect();
        words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        words
    })
}

/// Case-sensitive membership test
pub fn is_reserved_word(word: &str) -> bool {
    reserved_words().contains(&word)
}
