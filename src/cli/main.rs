use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use pngmeta::config::{CollisionPolicy, Config};
use pngmeta::pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "pngmeta",
    version,
    about = "Embed or extract hierarchical JSON metadata from PNG images."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    options: Options,
}

#[derive(Args, Debug)]
struct Options {
    /// Path to a JSON config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Separator joining nested keys (default: ".")
    #[arg(short, long, value_name = "SEP", global = true)]
    separator: Option<String>,

    /// Fail on key collisions instead of letting the later key win
    #[arg(long, global = true)]
    strict: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed JSON metadata into a PNG image (in-place)
    Write {
        /// PNG image to update
        png_file: PathBuf,
        /// Input JSON metadata file ("-" for stdin)
        json_file: PathBuf,
        /// Keep existing text chunks that are not being rewritten
        #[arg(long)]
        keep_existing: bool,
    },
    /// Extract metadata from a PNG image to a JSON file
    Read {
        /// Input PNG image
        png_file: PathBuf,
        /// Output JSON file ("-" for stdout)
        json_file: PathBuf,
        /// Spaces of indentation in the output (default: 4)
        #[arg(long, value_name = "N")]
        indent: Option<usize>,
    },
    /// List the text chunks of a PNG image
    Show {
        /// PNG image to inspect
        png_file: PathBuf,
    },
    /// Remove all text chunks from a PNG image (in-place)
    Clear {
        /// PNG image to strip
        png_file: PathBuf,
    },
    /// Write a config file with the current settings and exit
    Init {
        /// Where to write the config
        #[arg(default_value = "pngmeta.json")]
        config_file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.options.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let mut config = Config::load(cli.options.config.as_deref())?;
    if let Some(sep) = cli.options.separator {
        config.separator = sep;
    }
    if cli.options.strict {
        config.on_collision = CollisionPolicy::Reject;
    }

    match cli.command {
        Command::Write {
            png_file,
            json_file,
            keep_existing,
        } => {
            if keep_existing {
                config.keep_existing = true;
            }
            pipeline::write_metadata(&png_file, &json_file, &config)?;
            println!("Metadata embedded into {} (in-place)", png_file.display());
        }
        Command::Read {
            png_file,
            json_file,
            indent,
        } => {
            if let Some(n) = indent {
                config.indent = n;
            }
            let report = pipeline::read_metadata(&png_file, &json_file, &config)?;
            if report.entries_inflated > 0 {
                log::debug!("{} entries came from compressed chunks", report.entries_inflated);
            }
            // Keep stdout clean when it carries the JSON
            if json_file != Path::new(pipeline::STDIO_PATH) {
                println!("Metadata extracted to {}", json_file.display());
            }
        }
        Command::Show { png_file } => print_entries(&png_file)?,
        Command::Clear { png_file } => {
            let removed = pipeline::clear_metadata(&png_file)?;
            println!("Removed {removed} text chunk(s) from {}", png_file.display());
        }
        Command::Init { config_file } => {
            config.save(&config_file)?;
            println!("Config written to {}", config_file.display());
        }
    }

    Ok(())
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

const KEY_WIDTH: usize = 30;
const VAL_WIDTH: usize = 46;

/// Print every text chunk as a keyword / value table.
fn print_entries(path: &Path) -> Result<()> {
    let entries = pipeline::show_metadata(path)?;

    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(KEY_WIDTH + VAL_WIDTH + 5));

    if entries.is_empty() {
        println!("  {DIM}(no text chunks found){RESET}");
        println!();
        return Ok(());
    }

    for entry in &entries {
        let tag = if entry.kind.is_compressed() {
            format!("{}, compressed", entry.kind.chunk_name())
        } else {
            entry.kind.chunk_name().to_string()
        };
        print_row(&entry.keyword, &entry.text, &tag);
    }
    println!();

    Ok(())
}

/// Print a single row in the chunk table.
fn print_row(keyword: &str, val: &str, kind: &str) {
    let key_col = format!("{:<width$}", keyword, width = KEY_WIDTH);
    let indent = " ".repeat(KEY_WIDTH + 5);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {key_col} : {line} {DIM}[{kind}]{RESET}");
        } else {
            println!("{indent}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}
