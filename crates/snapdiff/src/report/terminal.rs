use std::io::Write;
use std::time::Duration;

use crate::compare::SnapshotStatus;
use crate::job::JobTimings;

const STAGE_NAMES: [&str; 3] = ["load", "diff", "write"];

fn stage_durations(t: &JobTimings) -> [Duration; 3] {
    [t.load, t.diff, t.write]
}

/// Clear the current terminal line (wipes progress indicator).
pub fn clear_line() {
    print!("\r\x1b[2K");
}

pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

/// Print a single pair result line.
pub fn print_line(name: &str, status: &SnapshotStatus, elapsed: Duration) {
    clear_line();
    let time_suffix = format!("  \x1b[2m{}\x1b[0m", format_duration(elapsed));

    match status {
        SnapshotStatus::Pass => {
            println!("  \x1b[32mPASS\x1b[0m  {name}{time_suffix}");
        }
        SnapshotStatus::Fail {
            mismatched_pixels,
            diff_hash,
        } => {
            println!(
                "  \x1b[31mFAIL\x1b[0m  {name}  ({mismatched_pixels} pixels, hash {diff_hash}){time_suffix}"
            );
        }
        SnapshotStatus::New => {
            println!("  \x1b[33m NEW\x1b[0m  {name}  (no baseline){time_suffix}");
        }
        SnapshotStatus::Gone => {
            println!("  \x1b[33mGONE\x1b[0m  {name}  (no candidate){time_suffix}");
        }
        SnapshotStatus::Error(msg) => {
            println!("  \x1b[31m ERR\x1b[0m  {name}  ({msg}){time_suffix}");
        }
    }
}

/// Print an error line (no timing available).
pub fn print_error_line(name: &str, msg: &str) {
    clear_line();
    println!("  \x1b[31m ERR\x1b[0m  {name}  ({msg})");
}

/// Show diff progress indicator.
pub fn show_progress(done: usize, total: usize) {
    if done < total {
        print!("  Diffing  [{done}/{total}]");
        let _ = std::io::stdout().flush();
    }
}

/// Print an actionable summary listing pair names grouped by status.
/// Only prints sections with at least one entry.
pub fn print_actionable_summary(
    failed: &[String],
    new: &[String],
    gone: &[String],
    errored: &[String],
) {
    if failed.is_empty() && new.is_empty() && gone.is_empty() && errored.is_empty() {
        return;
    }

    clear_line();
    println!();
    println!("Actionable pairs:");

    for (label, names) in [
        ("Failed", failed),
        ("New", new),
        ("Gone", gone),
        ("Errored", errored),
    ] {
        if !names.is_empty() {
            println!();
            println!("  {label} ({}):", names.len());
            for name in names {
                println!("    {name}");
            }
        }
    }
}

/// Per-status counts of a finished run.
#[derive(Debug, Default)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub new: usize,
    pub gone: usize,
    pub errored: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.new + self.gone + self.errored
    }

    pub fn all_passed(&self) -> bool {
        self.total() == self.passed
    }
}

/// Print the final summary.
pub fn print_summary(tally: &Tally, output_dir: &std::path::Path, elapsed: Duration) {
    clear_line();
    println!();
    print!(
        "Pairs:  {} total, \x1b[32m{} passed\x1b[0m, \x1b[31m{} failed\x1b[0m",
        tally.total(),
        tally.passed,
        tally.failed
    );
    if tally.new > 0 {
        print!(", \x1b[33m{} new\x1b[0m", tally.new);
    }
    if tally.gone > 0 {
        print!(", \x1b[33m{} gone\x1b[0m", tally.gone);
    }
    if tally.errored > 0 {
        print!(", \x1b[31m{} errored\x1b[0m", tally.errored);
    }
    println!();
    println!("Time:   {}", format_duration(elapsed));

    if tally.failed > 0 || tally.new > 0 || tally.gone > 0 {
        println!();
        println!("Diff images written to {}", output_dir.display());
    }
}

/// Print a per-pair timing table with all stage breakdowns.
///
/// Sorted by total descending (slowest first). Right-aligned numeric columns.
pub fn print_timing_table(entries: &[(String, JobTimings)]) {
    if entries.is_empty() {
        return;
    }

    let mut sorted: Vec<&(String, JobTimings)> = entries.iter().collect();
    sorted.sort_by(|a, b| b.1.total.cmp(&a.1.total));

    let name_width = sorted
        .iter()
        .map(|(n, _)| n.len())
        .max()
        .unwrap_or(8)
        .clamp(8, 50);

    println!();
    println!("\x1b[1mDiff timings (all pairs):\x1b[0m");
    println!();

    print!("  {:<width$}", "Pair", width = name_width);
    print!("  {:>7}", "total");
    for h in &STAGE_NAMES {
        print!("  {:>7}", h);
    }
    println!();

    let sep_len = name_width + 2 + (STAGE_NAMES.len() + 1) * 9;
    println!("  {}", "\u{2500}".repeat(sep_len));

    for (name, t) in &sorted {
        print!("  {:<width$}", truncate_name(name, name_width), width = name_width);
        print!("  {:>5}ms", t.total.as_millis());
        for d in stage_durations(t) {
            print!("  {:>5}ms", d.as_millis());
        }
        println!();
    }

    if entries.len() > 1 {
        let n = entries.len() as u128;
        let mut sums = [0u128; 3];
        for (_, t) in entries {
            for (i, d) in stage_durations(t).iter().enumerate() {
                sums[i] += d.as_millis();
            }
        }
        println!();
        print!("  {:<width$}", "average", width = name_width);
        print!("  {:>7}", "");
        for s in sums {
            print!("  {:>5}ms", s / n);
        }
        println!();
    }
}

/// Truncate a name to `max` chars, keeping the tail (the unique part).
fn truncate_name(name: &str, max: usize) -> String {
    let len = name.chars().count();
    if len <= max {
        name.to_string()
    } else {
        let skip = len - (max - 1);
        let truncated: String = name.chars().skip(skip).collect();
        format!("\u{2026}{truncated}")
    }
}
