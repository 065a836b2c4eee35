use crate::commands;
use crate::log_debug;
use crate::output::OutputFormat;
use crate::providers::Provider;
use crate::ui;
use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand, crate_version};
use clap_complete::Shell;
use colored::Colorize;
use std::path::PathBuf;

const LOG_FILE: &str = "casedocs.log";
const LOG_TO_STDERR: &str = "-";

/// CLI structure defining the available commands and global arguments
#[derive(Parser)]
#[command(
    name = "casedocs",
    author,
    version = crate_version!(),
    about = "casedocs: AI-powered case document classification and field extraction",
    long_about = "casedocs groups scanned case documents into logical documents, classifies each one with a multimodal model and extracts the configured fields into a CSV or JSON table.",
    disable_version_flag = true,
    after_help = get_dynamic_help(),
    styles = get_styles(),
)]
pub struct Cli {
    /// Subcommands available for the CLI
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log debug messages to a file
    #[arg(
        short = 'l',
        long = "log",
        global = true,
        help = "Log debug messages to a file"
    )]
    pub log: bool,

    /// Specify a custom log file path, or `-` for stderr
    #[arg(
        long = "log-file",
        global = true,
        help = "Specify a custom log file path ('-' logs to stderr)"
    )]
    pub log_file: Option<String>,

    /// Suppress non-essential output (progress bars, summaries)
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        help = "Suppress non-essential output"
    )]
    pub quiet: bool,

    /// Display the version
    #[arg(
        short = 'v',
        long = "version",
        global = true,
        help = "Display the version"
    )]
    pub version: bool,
}

/// Enumeration of available subcommands
#[derive(Subcommand)]
#[command(subcommand_negates_reqs = true)]
#[command(subcommand_precedence_over_arg = true)]
pub enum Commands {
    /// Classify and extract every case in a batch directory
    #[command(
        about = "Process a batch directory",
        long_about = "Group the page files of every case folder under the batch directory, classify each document group, extract the configured fields and write one row per group."
    )]
    Run {
        /// Directory containing one subdirectory per case
        batch_dir: PathBuf,

        /// Output file (defaults to extracted_data_<timestamp>.<ext>)
        #[arg(short, long, help = "Output file path")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,

        /// Configuration file to use instead of the default lookup
        #[arg(short, long, help = "Path to a casedocs.toml configuration file")]
        config: Option<PathBuf>,

        /// Concurrent classification requests
        #[arg(long, help = "Number of concurrent classification requests")]
        classification_workers: Option<usize>,

        /// Concurrent extraction requests
        #[arg(long, help = "Number of concurrent extraction requests")]
        extraction_workers: Option<usize>,
    },

    /// Show how page files would be grouped, without calling the model
    #[command(
        about = "Show document groups (dry run)",
        long_about = "Discover cases and group their page files exactly as 'run' would, then print the groups. No model requests are made."
    )]
    Group {
        /// Directory containing one subdirectory per case
        batch_dir: PathBuf,

        #[arg(short, long, help = "Path to a casedocs.toml configuration file")]
        config: Option<PathBuf>,
    },

    /// List acceptable document types and their field catalogs
    #[command(about = "List document types and configured fields")]
    Types {
        #[arg(short, long, help = "Path to a casedocs.toml configuration file")]
        config: Option<PathBuf>,

        /// Also list every field with its description
        #[arg(long, help = "Show field names and descriptions")]
        fields: bool,
    },

    /// Print the effective configuration
    #[command(about = "Show the effective configuration")]
    Config {
        #[arg(short, long, help = "Path to a casedocs.toml configuration file")]
        config: Option<PathBuf>,
    },

    /// Generate shell completions
    #[command(about = "Generate shell completion scripts")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Define custom styles for Clap
fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Magenta.on_default().bold())
        .usage(AnsiColor::Cyan.on_default().bold())
        .literal(AnsiColor::Green.on_default().bold())
        .placeholder(AnsiColor::Yellow.on_default())
        .valid(AnsiColor::Blue.on_default().bold())
        .invalid(AnsiColor::Red.on_default().bold())
        .error(AnsiColor::Red.on_default().bold())
}

/// Parse the command-line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Generate dynamic help including available model providers
fn get_dynamic_help() -> String {
    let providers_list = Provider::all_names()
        .iter()
        .map(|p| format!("{}", p.bold()))
        .collect::<Vec<_>>()
        .join(" • ");

    format!("\nAvailable model providers: {providers_list}")
}

/// Main function to parse arguments and handle the command
pub async fn main() -> anyhow::Result<()> {
    let cli = parse_args();

    if cli.version {
        ui::print_version(crate_version!());
        return Ok(());
    }

    if cli.log {
        crate::logger::enable_logging();
        match cli.log_file.as_deref() {
            Some(LOG_TO_STDERR) => crate::logger::set_log_to_stdout(true),
            log_file => crate::logger::set_log_file(log_file.unwrap_or(LOG_FILE))?,
        }
    } else {
        crate::logger::disable_logging();
    }

    if cli.quiet {
        ui::set_quiet_mode(true);
    }

    if let Some(command) = cli.command {
        handle_command(command).await
    } else {
        // If no subcommand is provided, print the help
        let _ = Cli::parse_from(["casedocs", "--help"]);
        Ok(())
    }
}

/// Handle the command based on parsed arguments
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            batch_dir,
            output,
            format,
            config,
            classification_workers,
            extraction_workers,
        } => {
            log_debug!(
                "Handling 'run' command with batch_dir: {}, output: {:?}, format: {:?}, config: {:?}",
                batch_dir.display(),
                output,
                format,
                config
            );
            commands::handle_run_command(commands::RunOptions {
                batch_dir,
                output,
                format,
                config,
                classification_workers,
                extraction_workers,
            })
            .await
        }
        Commands::Group { batch_dir, config } => {
            log_debug!("Handling 'group' command with batch_dir: {}", batch_dir.display());
            commands::handle_group_command(&batch_dir, config.as_deref())
        }
        Commands::Types { config, fields } => {
            commands::handle_types_command(config.as_deref(), fields)
        }
        Commands::Config { config } => commands::handle_config_command(config.as_deref()),
        Commands::Completions { shell } => {
            commands::handle_completions_command(shell);
            Ok(())
        }
    }
}
