use crate::cli::Cli;
use crate::config::Config;
use crate::grouping::{discover_cases, group_batch};
use crate::llm_providers::build_model;
use crate::orchestrator::Orchestrator;
use crate::output::{OutputFormat, default_output_path, write_rows_to_file};
use crate::ui::{self, rgb};
use crate::{log_debug, log_info};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::CommandFactory;
use clap_complete::Shell;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Arguments of the `run` command
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub batch_dir: PathBuf,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    pub config: Option<PathBuf>,
    pub classification_workers: Option<usize>,
    pub extraction_workers: Option<usize>,
}

/// Load and validate configuration, applying the verbose logging switch
fn load_config(path: Option<&Path>, workers: (Option<usize>, Option<usize>)) -> Result<Config> {
    let mut config = Config::load(path)?;
    config.update_workers(workers.0, workers.1);
    config.validate().context("Invalid configuration")?;
    crate::logger::set_verbose_logging(config.performance.verbose_logging);
    if config.performance.verbose_logging {
        log_debug!("Verbose logging enabled - will show HTTP requests and external library logs");
    }
    Ok(config)
}

/// Handle the `run` command
pub async fn handle_run_command(options: RunOptions) -> Result<()> {
    let config = load_config(
        options.config.as_deref(),
        (options.classification_workers, options.extraction_workers),
    )?;

    ui::print_version(clap::crate_version!());

    let model = build_model(&config).inspect_err(|e| {
        ui::print_error(&format!("Error: {e}"));
        ui::print_info("\nPlease ensure the following:");
        ui::print_info(&format!(
            "1. {} is set, or an api_key is configured for the provider.",
            config.provider.api_key_env()
        ));
        ui::print_info("2. The provider name in your configuration is 'google' or 'vertex'.");
    })?;

    let orchestrator = Orchestrator::new(model, &config)?;
    let cases = discover_cases(&options.batch_dir)?;
    ui::print_info(&format!(
        "Found {} case folders in {}",
        cases.len(),
        options.batch_dir.display()
    ));

    let progress = ui::PhaseProgress::new();
    let report = orchestrator
        .run_cases(&cases, &config.files.supported_extensions, &progress)
        .await;

    let output = options
        .output
        .unwrap_or_else(|| default_output_path(options.format, Utc::now()));
    if report.rows.is_empty() {
        ui::print_warning("No document groups were processed; nothing to write.");
    } else {
        write_rows_to_file(&report.rows, &output, options.format)?;
        log_info!("Results for run {} written to {}", report.run_id, output.display());
    }

    ui::print_report(&report);
    let failed = report.failed_groups();
    if failed > 0 {
        ui::print_warning(&format!(
            "{failed} document groups failed; see the Processing_Status column for details."
        ));
    }
    if !report.rows.is_empty() {
        ui::print_success(&format!("Results written to {}", output.display()));
    }
    Ok(())
}

/// Handle the `group` command
pub fn handle_group_command(batch_dir: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path, (None, None))?;
    let groups = group_batch(batch_dir, &config.files.supported_extensions)?;
    if groups.is_empty() {
        ui::print_warning("No processable documents found.");
        return Ok(());
    }

    ui::print_groups(&groups);
    let pages: usize = groups.iter().map(|g| g.page_count()).sum();
    ui::print_message(&format!(
        "\n{} document groups, {} pages",
        groups.len().to_string().bold(),
        pages.to_string().bold()
    ));
    Ok(())
}

/// Handle the `types` command
pub fn handle_types_command(config_path: Option<&Path>, show_fields: bool) -> Result<()> {
    let config = load_config(config_path, (None, None))?;
    let (r, g, b) = rgb::NEON_CYAN;
    let (dr, dg, db) = rgb::DIM_WHITE;

    println!("{}", "\nAcceptable document types\n".bright_magenta().bold());
    for label in config.catalog.labels() {
        let fields = config.catalog.fields_for(&label);
        let summary = match fields {
            Some(specs) if !specs.is_empty() => format!("{} fields", specs.len()),
            Some(_) => "no fields configured".to_string(),
            None => "classification only".to_string(),
        };
        println!(
            "  {:<16} {}",
            label.truecolor(r, g, b).bold(),
            summary.truecolor(dr, dg, db)
        );

        if show_fields && let Some(specs) = fields {
            for spec in specs {
                println!(
                    "      {} {}",
                    spec.name.yellow(),
                    spec.description.truecolor(dr, dg, db).italic()
                );
            }
        }
    }
    println!();
    Ok(())
}

/// Handle the `config` command
pub fn handle_config_command(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path, (None, None))?;
    print_configuration(&config);
    Ok(())
}

/// Handle the `completions` command
pub fn handle_completions_command(shell: Shell) {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
}

fn print_configuration(config: &Config) {
    let purple = rgb::ELECTRIC_PURPLE;
    let cyan = rgb::NEON_CYAN;
    let coral = rgb::CORAL;
    let yellow = rgb::ELECTRIC_YELLOW;
    let green = rgb::SUCCESS_GREEN;
    let dim = rgb::DIM_WHITE;

    println!();
    println!(
        "{}  {}  {}",
        "━━━".truecolor(purple.0, purple.1, purple.2),
        "CASEDOCS CONFIGURATION".truecolor(cyan.0, cyan.1, cyan.2).bold(),
        "━━━".truecolor(purple.0, purple.1, purple.2)
    );
    println!();

    let source = config
        .source
        .as_ref()
        .map_or_else(|| "(built-in defaults)".to_string(), |p| p.display().to_string());
    print_section_header("GLOBAL");
    print_config_row("Source", &source, dim, false);
    print_config_row("Provider", config.provider.name(), cyan, true);

    let provider_config = config.provider_config();
    print_config_row("Model", provider_config.effective_model(config.provider), cyan, false);
    if provider_config.effective_api_key(config.provider).is_some() {
        print_config_row("Credential", "configured", green, false);
    } else {
        print_config_row("Credential", "missing", coral, false);
    }
    if config.provider.requires_project() {
        print_config_row(
            "Project",
            provider_config.effective_project().as_deref().unwrap_or("(unset)"),
            yellow,
            false,
        );
        print_config_row("Location", provider_config.effective_location(), yellow, false);
    }

    println!();
    print_section_header("PERFORMANCE");
    let perf = &config.performance;
    print_config_row("Classify", &perf.classification_workers.to_string(), coral, false);
    print_config_row("Extract", &perf.extraction_workers.to_string(), coral, false);
    print_config_row("Timeout", &format!("{}s", perf.request_timeout_seconds), coral, false);

    println!();
    print_section_header("RETRY");
    let retry = &config.retry;
    print_config_row("Attempts", &retry.max_attempts.to_string(), yellow, false);
    print_config_row(
        "Delay",
        &format!("{}ms → {}ms", retry.initial_delay_ms, retry.max_delay_ms),
        yellow,
        false,
    );
    print_config_row("Backoff", &format!("×{}", retry.backoff_base), yellow, false);
    print_config_row("Jitter", &format!("{}", retry.jitter_fraction), yellow, false);

    println!();
    print_section_header("FILES");
    let extensions: Vec<&str> = config.files.supported_extensions.extensions().collect();
    print_config_row("Extensions", &extensions.join(", "), dim, false);

    println!();
    println!("{}", "─".repeat(40).truecolor(dim.0, dim.1, dim.2));
    println!();
}

fn print_section_header(name: &str) {
    let purple = rgb::ELECTRIC_PURPLE;
    let dim = rgb::DIM_WHITE;
    println!(
        "{} {} {}",
        "─".truecolor(purple.0, purple.1, purple.2),
        name.truecolor(purple.0, purple.1, purple.2).bold(),
        "─"
            .repeat(30 - name.len().min(28))
            .truecolor(dim.0, dim.1, dim.2)
    );
}

fn print_config_row(label: &str, value: &str, value_color: (u8, u8, u8), highlight: bool) {
    let dim = rgb::DIM_WHITE;
    let label_styled = format!("{label:>12}").truecolor(dim.0, dim.1, dim.2);

    let value_styled = if highlight {
        value
            .truecolor(value_color.0, value_color.1, value_color.2)
            .bold()
    } else {
        value.truecolor(value_color.0, value_color.1, value_color.2)
    };

    println!("{label_styled}  {value_styled}");
}
