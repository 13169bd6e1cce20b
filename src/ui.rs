//! Terminal output helpers.
//!
//! - `Table` - box-drawn table sized to the terminal width
//! - `print_outcomes` - summary of an `install` run

use crate::module::{ModuleName, Outcome, Status};
use colored::*;
use console::{Term, measure_text_width, truncate_str};

pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Rows with the wrong number of cells are ignored.
    pub fn add_row(&mut self, row: Vec<String>) {
        if row.len() == self.headers.len() {
            self.rows.push(row.into_iter().map(|c| single_line(&c)).collect());
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column widths shrunk (widest first, never below 8) until they fit `max_width`.
    fn column_widths(&self, max_width: usize) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(measure_text_width(cell));
            }
        }

        let overhead = 3 + 3 * widths.len();
        let budget = max_width.saturating_sub(overhead);
        let mut total: usize = widths.iter().sum();
        while total > budget {
            let Some((idx, &widest)) = widths.iter().enumerate().max_by_key(|(_, w)| **w) else {
                break;
            };
            if widest <= 8 {
                break;
            }
            widths[idx] -= 1;
            total -= 1;
        }
        widths
    }

    pub fn render(&self, max_width: usize) -> String {
        if self.headers.is_empty() {
            return String::new();
        }
        let widths = self.column_widths(max_width);

        let border = |left: &str, mid: &str, right: &str| {
            let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("  {}{}{}\n", left, segments.join(mid), right)
        };
        let line = |cells: &[String], bold: bool| {
            let mut out = String::from("  │");
            for (cell, &width) in cells.iter().zip(&widths) {
                let text = truncate_str(cell, width, "...").to_string();
                let padding = width.saturating_sub(measure_text_width(&text));
                let text = if bold { text.bold().to_string() } else { text };
                out.push_str(&format!(" {}{} │", text, " ".repeat(padding)));
            }
            out.push('\n');
            out
        };

        let mut out = border("┌", "┬", "┐");
        out.push_str(&line(&self.headers, true));
        out.push_str(&border("├", "┼", "┤"));
        for row in &self.rows {
            out.push_str(&line(row, false));
        }
        out.push_str(&border("└", "┴", "┘"));
        out
    }

    pub fn print(&self) {
        let (_, width) = Term::stdout().size();
        print!("{}", self.render(width as usize));
    }
}

fn single_line(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            _ => c,
        })
        .collect()
}

pub fn status_label(status: Status) -> ColoredString {
    match status {
        Status::Success => "installed".green(),
        Status::Skipped => "skipped".yellow(),
        Status::Failed => "failed".red(),
    }
}

/// Prints one row per module plus a count line. Returns the number of failures.
pub fn print_outcomes(outcomes: &[(ModuleName, Outcome)]) -> usize {
    let mut table = Table::new(&["Module", "Status", "Revision", "Notes"]);
    for (name, outcome) in outcomes {
        table.add_row(vec![
            name.to_string(),
            status_label(outcome.status).to_string(),
            outcome.revision.clone().unwrap_or_else(|| "-".to_string()),
            outcome.warnings.join("; "),
        ]);
    }
    if !table.is_empty() {
        table.print();
    }

    let failed = outcomes
        .iter()
        .filter(|(_, o)| o.status == Status::Failed)
        .count();
    let skipped = outcomes.iter().filter(|(_, o)| o.is_skipped()).count();
    println!(
        "{} {} installed, {} skipped, {} failed",
        if failed == 0 { "✓".green() } else { "✗".red() },
        outcomes.len() - failed - skipped,
        skipped,
        failed
    );
    failed
}
