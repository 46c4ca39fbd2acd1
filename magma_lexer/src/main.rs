use magma_lexer::config::runtime::{parse_log_level, LogLevel, RuntimeConfig};
use magma_lexer::file_processor::FileProcessor;
use magma_lexer::grammar::default_table;
use magma_lexer::lexical::{LexicalAnalyzer, LexicalMetrics};
use magma_lexer::logging;
use magma_lexer::tokens::Token;
use magma_lexer::utils::SourceMap;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
    Raw,
}

#[derive(Debug, Default)]
struct CliOptions {
    files: Vec<String>,
    format: Option<OutputFormat>,
    summary: bool,
    config: Option<PathBuf>,
    state: Option<String>,
    log_level: Option<LogLevel>,
    help: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("magma-lex");

    let options = match parse_args(&args[1..]) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("Error: {}", message);
            eprintln!("Usage: {} [options] <file>...", program);
            eprintln!("       {} --help", program);
            std::process::exit(1);
        }
    };

    if options.help {
        print_help(program);
        return Ok(());
    }

    let mut config = match &options.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    if let Some(state) = &options.state {
        config.lexical.start_state = state.clone();
    }
    if let Some(level) = options.log_level {
        config.logging.min_log_level = level;
    }

    logging::config::init_runtime_preferences(config.logging.clone())?;
    logging::init_global_logging()?;

    let table = default_table()?;
    let processor = FileProcessor::from_preferences(&config.file_processor);
    let mut analyzer = LexicalAnalyzer::with_preferences(config.lexical.clone());
    let format = options.format.unwrap_or(OutputFormat::Text);

    let mut failed = false;
    for file in &options.files {
        let result = match processor.process_file(file) {
            Ok(result) => result,
            Err(error) => {
                eprintln!("{}: {} [{}]", file, error, error.error_code());
                failed = true;
                continue;
            }
        };

        let tokens = match analyzer.tokenize_file_result(table, &result) {
            Ok(tokens) => tokens,
            Err(error) => {
                eprintln!("{}: {} [{}]", file, error, error.error_code());
                failed = true;
                continue;
            }
        };

        if options.files.len() > 1 && format == OutputFormat::Text {
            println!("==> {} <==", file);
        }
        print_tokens(&result.source, &tokens, format)?;

        if options.summary {
            print_summary(file, analyzer.metrics(), format)?;
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => options.help = true,
            "--summary" => options.summary = true,
            "--format" => {
                let value = iter.next().ok_or("--format requires a value")?;
                options.format = Some(match value.as_str() {
                    "text" => OutputFormat::Text,
                    "json" => OutputFormat::Json,
                    "raw" => OutputFormat::Raw,
                    other => return Err(format!("Unknown format '{}'", other)),
                });
            }
            "--config" => {
                let value = iter.next().ok_or("--config requires a file")?;
                options.config = Some(PathBuf::from(value));
            }
            "--state" => {
                let value = iter.next().ok_or("--state requires a state name")?;
                options.state = Some(value.clone());
            }
            "--log-level" => {
                let value = iter.next().ok_or("--log-level requires a level")?;
                options.log_level = Some(
                    parse_log_level(value)
                        .ok_or_else(|| format!("Unknown log level '{}'", value))?,
                );
            }
            other if other.starts_with("--") => {
                return Err(format!("Unknown option '{}'", other));
            }
            file => options.files.push(file.to_string()),
        }
    }

    if options.files.is_empty() && !options.help {
        return Err("No input files".to_string());
    }
    Ok(options)
}

fn print_help(program_name: &str) {
    println!("Magma Lexer v{}", env!("CARGO_PKG_VERSION"));
    println!("Tokenizes Magma source files and session transcripts");
    println!();
    println!("USAGE:");
    println!("    {} [options] <file>...", program_name);
    println!();
    println!("OPTIONS:");
    println!("    --help               Show this help message");
    println!("    --format FORMAT      text (default), json, or raw");
    println!("    --summary            Print token metrics after each file");
    println!("    --config FILE        Runtime preferences (TOML)");
    println!("    --state NAME         Start state (default: root)");
    println!("    --log-level LEVEL    error, warning, info, or debug");
    println!();
    println!("OUTPUT:");
    println!("    text    line:column, kind and quoted text, one token per line");
    println!("    json    one JSON array of tokens per file");
    println!("    raw     Token.Kind<TAB>text, one token per line");
    println!();
    println!("EXAMPLES:");
    println!("    {} primes.m", program_name);
    println!("    {} --format raw session.log", program_name);
    println!("    {} --summary --log-level info lib/*.mag", program_name);
}

fn print_tokens(
    source: &str,
    tokens: &[Token<'_>],
    format: OutputFormat,
) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Text => {
            let map = SourceMap::new(source);
            for token in tokens {
                let position = map.position_at(token.start);
                println!(
                    "{}:{}\t{}\t{:?}",
                    position.line, position.column, token.kind, token.text
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(tokens)?),
        OutputFormat::Raw => {
            for token in tokens {
                println!("{}", token);
            }
        }
    }
    Ok(())
}

fn print_summary(
    file: &str,
    metrics: &LexicalMetrics,
    format: OutputFormat,
) -> Result<(), serde_json::Error> {
    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::json!({ "file": file, "metrics": serde_json::to_value(metrics)? })
        );
        return Ok(());
    }

    println!("Summary for {}:", file);
    println!("  Tokens: {} ({} bytes)", metrics.total_tokens, metrics.total_bytes);
    println!("  Unrecognized: {}", metrics.fallback_tokens);
    for (category, count) in &metrics.category_counts {
        println!("  {}: {}", category, count);
    }
    println!("  Longest token: {} bytes", metrics.longest_token);
    println!("  Deepest state stack: {}", metrics.max_stack_depth);
    println!("  Nested passes: {}", metrics.nested_passes);
    if !metrics.open_states.is_empty() {
        println!("  Open at end: {}", metrics.open_states.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let options = parse_args(&args(&[
            "--format", "raw", "--summary", "--state", "string", "a.m", "b.m",
        ]))
        .unwrap();

        assert_eq!(options.format, Some(OutputFormat::Raw));
        assert!(options.summary);
        assert_eq!(options.state.as_deref(), Some("string"));
        assert_eq!(options.files, vec!["a.m", "b.m"]);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["--format", "xml", "a.m"])).is_err());
        assert!(parse_args(&args(&["--format"])).is_err());
        assert!(parse_args(&args(&["--bogus", "a.m"])).is_err());
        assert!(parse_args(&args(&["--log-level", "loud", "a.m"])).is_err());
    }

    #[test]
    fn test_help_needs_no_files() {
        assert!(parse_args(&args(&["--help"])).unwrap().help);
    }

    #[test]
    fn test_log_level_option() {
        let options = parse_args(&args(&["--log-level", "debug", "a.m"])).unwrap();
        assert_eq!(options.log_level, Some(LogLevel::Debug));
    }
}
