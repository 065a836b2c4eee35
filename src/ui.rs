use crate::orchestrator::{BatchReport, Phase, Progress};
use crate::types::DocumentGroup;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::fmt::Write;

// RGB tuple constants for use with the `colored` crate's `.truecolor()` method
pub mod rgb {
    pub const ELECTRIC_PURPLE: (u8, u8, u8) = (225, 53, 255);
    pub const NEON_CYAN: (u8, u8, u8) = (128, 255, 234);
    pub const CORAL: (u8, u8, u8) = (255, 106, 193);
    pub const ELECTRIC_YELLOW: (u8, u8, u8) = (241, 250, 140);
    pub const SUCCESS_GREEN: (u8, u8, u8) = (80, 250, 123);
    pub const ERROR_RED: (u8, u8, u8) = (255, 99, 99);
    pub const DIM_WHITE: (u8, u8, u8) = (180, 180, 190);
}

/// Track quiet mode state
static QUIET_MODE: std::sync::LazyLock<Mutex<bool>> =
    std::sync::LazyLock::new(|| Mutex::new(false));

/// Enable or disable quiet mode
pub fn set_quiet_mode(enabled: bool) {
    let mut quiet_mode = QUIET_MODE.lock();
    *quiet_mode = enabled;
}

/// Check if quiet mode is enabled
pub fn is_quiet_mode() -> bool {
    *QUIET_MODE.lock()
}

/// One progress bar per pipeline phase
#[derive(Default)]
pub struct PhaseProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl PhaseProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Progress for PhaseProgress {
    fn phase_started(&self, phase: Phase, total: usize) {
        if is_quiet_mode() {
            return;
        }
        let bar = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{prefix:>14.cyan.bold} [{bar:30.magenta/blue}] {pos}/{len} {elapsed_precise}")
        {
            bar.set_style(style.progress_chars("━╸─"));
        }
        bar.set_prefix(phase.to_string());
        *self.bar.lock() = Some(bar);
    }

    fn item_finished(&self, _phase: Phase) {
        if let Some(bar) = self.bar.lock().as_ref() {
            bar.inc(1);
        }
    }

    fn phase_finished(&self, _phase: Phase) {
        if let Some(bar) = self.bar.lock().take() {
            bar.finish();
        }
    }
}

pub fn print_info(message: &str) {
    if !is_quiet_mode() {
        println!("{}", message.cyan().bold());
    }
}

pub fn print_warning(message: &str) {
    if !is_quiet_mode() {
        println!("{}", message.yellow().bold());
    }
}

pub fn print_error(message: &str) {
    // Always print errors, even in quiet mode
    eprintln!("{}", message.red().bold());
}

pub fn print_success(message: &str) {
    if !is_quiet_mode() {
        println!("{}", message.green().bold());
    }
}

pub fn print_version(version: &str) {
    if !is_quiet_mode() {
        println!(
            "{} {} {}",
            create_gradient_text("casedocs"),
            "version".cyan(),
            version.green()
        );
    }
}

/// Print a simple message (respects quiet mode)
pub fn print_message(message: &str) {
    if !is_quiet_mode() {
        println!("{message}");
    }
}

/// Print document groups as a tree, for dry runs
pub fn print_groups(groups: &[DocumentGroup]) {
    let mut current_case: Option<&str> = None;
    for group in groups {
        if current_case != Some(group.case_id.as_str()) {
            println!("{}", group.case_id.magenta().bold());
            current_case = Some(&group.case_id);
        }
        println!(
            "  {} {}",
            group.base_name.cyan().bold(),
            format!("({} pages)", group.page_count()).dimmed()
        );
        for page in &group.pages {
            println!(
                "    {:>3}  {}",
                page.page_number.to_string().yellow(),
                page.file_name
            );
        }
    }
}

/// Print the summary of a finished run
pub fn print_report(report: &BatchReport) {
    if is_quiet_mode() {
        return;
    }
    let counts = report.status_counts();
    let (r, g, b) = rgb::DIM_WHITE;
    println!();
    println!("{}", create_gradient_text("━━━ Batch complete ━━━"));
    println!(
        "{} {}",
        "Run:".truecolor(r, g, b),
        report.run_id.to_string().bright_white()
    );
    println!(
        "{} {} groups in {:.1}s with {}",
        "Processed:".truecolor(r, g, b),
        report.group_count().to_string().bold(),
        report.elapsed.as_secs_f64(),
        report.model.cyan()
    );
    let (r, g, b) = rgb::SUCCESS_GREEN;
    println!(
        "  {} {}",
        "extracted".truecolor(r, g, b),
        counts.extracted
    );
    let (r, g, b) = rgb::ELECTRIC_YELLOW;
    println!("  {} {}", "partial".truecolor(r, g, b), counts.partial);
    let (r, g, b) = rgb::NEON_CYAN;
    println!("  {} {}", "skipped".truecolor(r, g, b), counts.skipped);
    let (r, g, b) = rgb::ERROR_RED;
    println!(
        "  {} {}",
        "failed".truecolor(r, g, b),
        report.failed_groups()
    );
}

/// Create gradient text from Electric Purple to Neon Cyan
pub fn create_gradient_text(text: &str) -> String {
    let gradient = [
        rgb::ELECTRIC_PURPLE,
        (200, 100, 255),
        (180, 150, 250),
        (150, 200, 245),
        rgb::NEON_CYAN,
    ];

    apply_gradient(text, &gradient)
}

fn apply_gradient(text: &str, gradient: &[(u8, u8, u8)]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let chars_len = chars.len();
    let gradient_len = gradient.len();

    let mut result = String::new();

    if chars_len == 0 || gradient_len == 0 {
        return result;
    }

    for (i, c) in chars.iter().enumerate() {
        let index = if chars_len == 1 {
            0
        } else {
            i * (gradient_len - 1) / (chars_len - 1)
        };
        let (r, g, b) = gradient[index];
        let _ = write!(result, "{}", c.to_string().truecolor(r, g, b));
    }

    result
}
