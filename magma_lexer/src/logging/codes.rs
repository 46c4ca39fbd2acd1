//! Consolidated error codes and classification system
//!
//! Single source of truth for all error codes, their metadata, and classification functions.

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// CODE WRAPPER TYPE
// ============================================================================

/// Universal code wrapper for error, warning and success codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(&'static str);

impl Code {
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ERROR CLASSIFICATION TYPES
// ============================================================================

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

/// Complete metadata for a code
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    pub code: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub recoverable: bool,
    pub requires_halt: bool,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

impl ErrorMetadata {
    pub fn new(
        code: &'static str,
        category: &'static str,
        severity: Severity,
        recoverable: bool,
        requires_halt: bool,
        description: &'static str,
        recommended_action: &'static str,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            recoverable,
            requires_halt,
            description,
            recommended_action,
        }
    }
}

// ============================================================================
// ERROR CODE CONSTANTS
// ============================================================================

/// System error codes
pub mod system {
    use super::Code;

    pub const INTERNAL_ERROR: Code = Code::new("ERR001");
    pub const INITIALIZATION_FAILURE: Code = Code::new("ERR002");
    pub const CONFIGURATION_ERROR: Code = Code::new("ERR003");
}

/// File processing error codes
pub mod file_processing {
    use super::Code;

    pub const FILE_NOT_FOUND: Code = Code::new("E005");
    pub const INVALID_EXTENSION: Code = Code::new("E006");
    pub const FILE_TOO_LARGE: Code = Code::new("E007");
    pub const PERMISSION_DENIED: Code = Code::new("E009");
    pub const INVALID_ENCODING: Code = Code::new("E010");
    pub const IO_ERROR: Code = Code::new("E011");
    pub const INVALID_PATH: Code = Code::new("E012");
    pub const TOO_MANY_LINES: Code = Code::new("E013");
}

/// Rule table construction error codes
pub mod grammar {
    use super::Code;

    pub const INVALID_PATTERN: Code = Code::new("E020");
    pub const CIRCULAR_INCLUDE: Code = Code::new("E021");
    pub const DUPLICATE_STATE: Code = Code::new("E022");
    pub const UNKNOWN_STATE: Code = Code::new("E023");
    pub const MISSING_ROOT: Code = Code::new("E024");
    pub const ZERO_WIDTH_RULE: Code = Code::new("E025");
}

/// Tokenization warning codes
pub mod lexical {
    use super::Code;

    pub const UNRECOGNIZED_INPUT: Code = Code::new("W020");
    pub const TOKEN_COUNT_HINT_EXCEEDED: Code = Code::new("W021");
    pub const STATE_STACK_HINT_EXCEEDED: Code = Code::new("W022");
    pub const NESTED_LEX_LIMIT_REACHED: Code = Code::new("W023");
}

// ============================================================================
// SUCCESS CODE CONSTANTS
// ============================================================================

/// Success codes
pub mod success {
    use super::Code;

    pub const SYSTEM_INITIALIZATION_COMPLETED: Code = Code::new("I004");
    pub const FILE_PROCESSING_SUCCESS: Code = Code::new("I006");
    pub const RULE_TABLE_BUILT: Code = Code::new("I010");
    pub const TOKENIZATION_COMPLETE: Code = Code::new("I020");
}

// ============================================================================
// ERROR METADATA REGISTRY
// ============================================================================

static ERROR_REGISTRY: OnceLock<HashMap<&'static str, ErrorMetadata>> = OnceLock::new();

fn get_error_registry() -> &'static HashMap<&'static str, ErrorMetadata> {
    ERROR_REGISTRY.get_or_init(|| {
        let entries = [
            // System errors
            ErrorMetadata::new(
                "ERR001",
                "System",
                Severity::Critical,
                false,
                true,
                "Critical internal system error",
                "File a bug report with the input that triggered it",
            ),
            ErrorMetadata::new(
                "ERR002",
                "System",
                Severity::Critical,
                false,
                true,
                "System initialization failure",
                "Check logging configuration and environment variables",
            ),
            ErrorMetadata::new(
                "ERR003",
                "System",
                Severity::High,
                false,
                true,
                "Configuration file could not be read or parsed",
                "Check the path and TOML syntax of the configuration file",
            ),
            // File processing errors
            ErrorMetadata::new(
                "E005",
                "FileProcessing",
                Severity::Medium,
                false,
                true,
                "File not found at specified path",
                "Check file path and ensure file exists",
            ),
            ErrorMetadata::new(
                "E006",
                "FileProcessing",
                Severity::Low,
                true,
                false,
                "File does not have a .m or .mag extension",
                "Rename the file or disable require_magma_extension",
            ),
            ErrorMetadata::new(
                "E007",
                "FileProcessing",
                Severity::Medium,
                false,
                true,
                "File exceeds maximum size limit",
                "Split the file or rebuild with a larger max_file_size",
            ),
            ErrorMetadata::new(
                "E009",
                "FileProcessing",
                Severity::Medium,
                false,
                true,
                "Permission denied accessing file",
                "Check file permissions and user access rights",
            ),
            ErrorMetadata::new(
                "E010",
                "FileProcessing",
                Severity::Medium,
                false,
                true,
                "Invalid UTF-8 encoding in file",
                "Convert file to UTF-8 encoding",
            ),
            ErrorMetadata::new(
                "E011",
                "FileProcessing",
                Severity::Medium,
                false,
                true,
                "I/O error during file operation",
                "Check disk space, permissions, and file system integrity",
            ),
            ErrorMetadata::new(
                "E012",
                "FileProcessing",
                Severity::Medium,
                false,
                true,
                "Invalid file path provided",
                "Provide a path to a regular file",
            ),
            ErrorMetadata::new(
                "E013",
                "FileProcessing",
                Severity::Medium,
                false,
                true,
                "File exceeds maximum line count",
                "Split the file or rebuild with a larger max_line_count",
            ),
            // Rule table construction errors
            ErrorMetadata::new(
                "E020",
                "Grammar",
                Severity::Critical,
                false,
                true,
                "Rule pattern is not a valid regular expression",
                "Fix the pattern named in the error message",
            ),
            ErrorMetadata::new(
                "E021",
                "Grammar",
                Severity::Critical,
                false,
                true,
                "State includes form a cycle",
                "Remove one include from the reported cycle",
            ),
            ErrorMetadata::new(
                "E022",
                "Grammar",
                Severity::Critical,
                false,
                true,
                "State declared more than once",
                "Merge or rename the duplicate state",
            ),
            ErrorMetadata::new(
                "E023",
                "Grammar",
                Severity::Critical,
                false,
                true,
                "Rule references an undeclared state",
                "Declare the state or fix the reference",
            ),
            ErrorMetadata::new(
                "E024",
                "Grammar",
                Severity::Critical,
                false,
                true,
                "Rule table has no root state",
                "Declare a state named root",
            ),
            ErrorMetadata::new(
                "E025",
                "Grammar",
                Severity::Critical,
                false,
                true,
                "Rule can match the empty string without popping a state",
                "Make the pattern consume input or give it a pop transition",
            ),
            // Tokenization warnings
            ErrorMetadata::new(
                "W020",
                "Lexical",
                Severity::Low,
                true,
                false,
                "Input contained characters no rule recognized",
                "Inspect the Error tokens in the output",
            ),
            ErrorMetadata::new(
                "W021",
                "Lexical",
                Severity::Low,
                true,
                false,
                "Token count exceeded the configured hint",
                "Consider splitting the input",
            ),
            ErrorMetadata::new(
                "W022",
                "Lexical",
                Severity::Low,
                true,
                false,
                "State stack depth exceeded the configured hint",
                "Check the input for unbalanced brackets or comments",
            ),
            ErrorMetadata::new(
                "W023",
                "Lexical",
                Severity::Low,
                true,
                false,
                "Nested re-tokenization depth limit reached",
                "Affected text is emitted as a single Text token",
            ),
            // Success codes
            ErrorMetadata::new(
                "I004",
                "System",
                Severity::Low,
                true,
                false,
                "Logging system initialized",
                "None",
            ),
            ErrorMetadata::new(
                "I006",
                "FileProcessing",
                Severity::Low,
                true,
                false,
                "File loaded successfully",
                "Continue to tokenization",
            ),
            ErrorMetadata::new(
                "I010",
                "Grammar",
                Severity::Low,
                true,
                false,
                "Rule table built successfully",
                "None",
            ),
            ErrorMetadata::new(
                "I020",
                "Lexical",
                Severity::Low,
                true,
                false,
                "Tokenization completed",
                "None",
            ),
        ];

        entries.into_iter().map(|m| (m.code, m)).collect()
    })
}

// ============================================================================
// CLASSIFICATION FUNCTIONS
// ============================================================================

/// Get metadata for a specific code
pub fn get_error_metadata(code: &str) -> Option<&'static ErrorMetadata> {
    get_error_registry().get(code)
}

/// Get error severity from error code
pub fn get_severity(code: &str) -> Severity {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.severity)
        .unwrap_or(Severity::Medium)
}

/// Check if error is recoverable
pub fn is_recoverable(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recoverable)
        .unwrap_or(true)
}

/// Check if error requires immediate halt
pub fn requires_halt(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.requires_halt)
        .unwrap_or(false)
}

/// Get human-readable description for error code
pub fn get_description(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.description)
        .unwrap_or("Unknown error")
}

/// Get recommended action for error code
pub fn get_action(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recommended_action)
        .unwrap_or("No specific action available")
}

/// Get error category from error code
pub fn get_category(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.category)
        .unwrap_or("Unknown")
}
