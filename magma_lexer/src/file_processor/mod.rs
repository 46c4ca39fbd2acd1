//! Source file loading with compile-time limits and global logging integration

mod processor;

use crate::config::compile_time::file_processing::{
    LARGE_FILE_THRESHOLD, MAX_FILE_SIZE, MAX_LINE_COUNT,
};
use crate::config::runtime::FileProcessorPreferences;
use crate::log_debug;
pub use processor::{
    FileMetadata, FileProcessingResult, FileProcessor, FileProcessorError, MAGMA_EXTENSIONS,
};

/// Process a file with default settings
pub fn process_file(file_path: &str) -> Result<FileProcessingResult, FileProcessorError> {
    FileProcessor::new().process_file(file_path)
}

pub fn create_processor() -> FileProcessor {
    FileProcessor::new()
}

pub fn create_processor_from_preferences(prefs: &FileProcessorPreferences) -> FileProcessor {
    FileProcessor::from_preferences(prefs)
}

pub fn should_halt_on_error(error: &FileProcessorError) -> bool {
    error.requires_halt()
}

/// The compile-time size limit; it cannot be raised at runtime
pub fn get_max_file_size() -> u64 {
    MAX_FILE_SIZE
}

pub fn get_large_file_threshold() -> u64 {
    LARGE_FILE_THRESHOLD
}

/// Check that every file-processing code is registered (for startup)
pub fn init_file_processor_logging() -> Result<(), String> {
    use crate::logging::codes;

    let file_codes = [
        codes::file_processing::FILE_NOT_FOUND,
        codes::file_processing::INVALID_EXTENSION,
        codes::file_processing::FILE_TOO_LARGE,
        codes::file_processing::PERMISSION_DENIED,
        codes::file_processing::INVALID_ENCODING,
        codes::file_processing::IO_ERROR,
        codes::file_processing::INVALID_PATH,
        codes::file_processing::TOO_MANY_LINES,
    ];

    for code in &file_codes {
        if codes::get_error_metadata(code.as_str()).is_none() {
            return Err(format!(
                "File processor error code {} not found in metadata registry",
                code.as_str()
            ));
        }
    }

    log_debug!("File processor compile-time configuration loaded",
        "max_file_size" => MAX_FILE_SIZE,
        "large_file_threshold" => LARGE_FILE_THRESHOLD,
        "max_line_count" => MAX_LINE_COUNT);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_module_api() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.m");
        fs::write(&file_path, "print 1;\n").unwrap();

        let result = process_file(file_path.to_str().unwrap());
        assert!(result.is_ok());
    }

    #[test]
    fn test_error_helpers() {
        let error = FileProcessorError::FileNotFound {
            path: "test.m".to_string(),
        };
        assert!(should_halt_on_error(&error));
    }

    #[test]
    fn test_compile_time_limits() {
        assert_eq!(get_max_file_size(), FileProcessor::max_file_size());
        assert!(get_large_file_threshold() <= get_max_file_size());
    }

    #[test]
    fn test_init_logging() {
        assert!(init_file_processor_logging().is_ok());
    }

    #[test]
    fn test_processor_from_preferences() {
        let prefs = FileProcessorPreferences {
            require_magma_extension: true,
            ..FileProcessorPreferences::default()
        };
        assert!(create_processor_from_preferences(&prefs).require_magma_extension);
        assert!(!create_processor().require_magma_extension);
    }
}
