// ============================================================================
// vbconv-cli/src/output.rs
// ============================================================================
//
// TERMINAL OUTPUT: progress bars, status lines and the batch summary
//
// Batch events from the core are rendered here: one overall bar counting
// finished jobs and one bar per running job. Everything else printed while
// bars are on screen goes through the MultiProgress so lines are not torn.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use vbconv_core::utils::display_name;
use vbconv_core::{format_duration, BatchSummary, Event, JobOutcome};

const STATUS_INDENT: &str = "  ";

/// Print a section heading
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("===== {title} =====").bold());
}

/// Print a label/value line
pub fn print_status(label: &str, value: &str) {
    println!("{STATUS_INDENT}{:<14} {value}", format!("{label}:").bright_cyan());
}

/// Print an error message with red styling
pub fn print_error(message: &str) {
    eprintln!("{} {message}", "Error:".bold().bright_red());
}

/// Print a warning message with yellow styling
pub fn print_warning(message: &str) {
    eprintln!("{} {message}", "Warning:".bold().yellow());
}

fn overall_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} files {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-")
}

fn job_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.bold} [{bar:40.green/white}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Renders a running batch from its event stream.
pub struct BatchDisplay {
    multi: MultiProgress,
    overall: ProgressBar,
    jobs: HashMap<PathBuf, ProgressBar>,
    verbose: bool,
}

impl BatchDisplay {
    pub fn new(total: usize, verbose: bool) -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total as u64));
        overall.set_style(overall_style());
        overall.enable_steady_tick(Duration::from_millis(120));
        Self {
            multi,
            overall,
            jobs: HashMap::new(),
            verbose,
        }
    }

    fn println(&self, line: impl AsRef<str>) {
        // MultiProgress drops printed lines when its target is hidden (no TTY).
        if self.multi.is_hidden() || self.multi.println(line.as_ref()).is_err() {
            eprintln!("{}", line.as_ref());
        }
    }

    fn job_bar(&mut self, job: &Path) -> &ProgressBar {
        let multi = &self.multi;
        self.jobs.entry(job.to_path_buf()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new(100));
            bar.set_style(job_style());
            bar.set_prefix(display_name(job));
            bar
        })
    }

    /// Updates the display for one event.
    pub fn handle(&mut self, event: &Event) {
        match event {
            Event::JobStarted { job, output } => {
                let bar = self.job_bar(job);
                bar.set_message(format!("-> {}", display_name(output)));
            }
            Event::Progress { job, percent } => {
                self.job_bar(job).set_position(u64::from(*percent));
            }
            Event::Log { job: None, message } => self.println(message),
            Event::Log {
                job: Some(job),
                message,
            } => {
                if self.verbose {
                    self.println(format!("[{}] {message}", display_name(job)));
                }
            }
            Event::JobFinished { job, outcome, .. } => {
                if let Some(bar) = self.jobs.remove(job) {
                    bar.finish_and_clear();
                    self.multi.remove(&bar);
                }
                self.overall.inc(1);
                self.println(format!(
                    "{STATUS_INDENT}{} {}",
                    outcome_label(*outcome),
                    display_name(job)
                ));
            }
            Event::BatchFinished { .. } => {
                self.overall.finish_with_message("done");
            }
        }
    }

    /// Marks the batch as stopping after a Ctrl-C.
    pub fn stopping(&self) {
        self.overall.set_message("stopping...");
    }

    /// Clears any bars still on screen.
    pub fn finish(self) {
        for bar in self.jobs.values() {
            bar.finish_and_clear();
        }
        if !self.overall.is_finished() {
            self.overall.abandon();
        }
    }
}

fn outcome_label(outcome: JobOutcome) -> String {
    match outcome {
        JobOutcome::Succeeded => format!("{}", "done     ".green()),
        JobOutcome::Skipped => format!("{}", "skipped  ".bright_black()),
        JobOutcome::Failed => format!("{}", "failed   ".bright_red()),
        JobOutcome::Cancelled => format!("{}", "cancelled".yellow()),
    }
}

/// Prints the end-of-batch summary.
pub fn print_summary(summary: &BatchSummary) {
    let title = if summary.stopped {
        "BATCH STOPPED"
    } else {
        "BATCH COMPLETE"
    };
    print_section(title);
    print_status("Files", &summary.total.to_string());
    print_status("Converted", &format!("{}", summary.succeeded.green()));
    print_status("Skipped", &summary.skipped.to_string());
    if summary.failed > 0 {
        print_status("Failed", &format!("{}", summary.failed.bright_red().bold()));
    } else {
        print_status("Failed", "0");
    }
    if summary.cancelled > 0 {
        print_status("Cancelled", &format!("{}", summary.cancelled.yellow()));
    }
    print_status("Total time", &format_duration(summary.elapsed_secs));
}
