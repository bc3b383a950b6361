use colored::Colorize;
use chrono::{DateTime, Utc};

use crate::storage::models::VerificationAction;

/// Format an optional average rating for display
pub fn format_rating(rating: Option<f64>) -> String {
    match rating {
        Some(r) => format!("{:.2}", r),
        None => "-".to_string(),
    }
}

/// Format timestamp in human-readable format
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Verified badge column, colored
pub fn format_verified(verified_at: Option<&DateTime<Utc>>) -> String {
    match verified_at {
        Some(ts) => format!("✓ {}", ts.format("%Y-%m-%d")).green().to_string(),
        None => "✗".dimmed().to_string(),
    }
}

pub fn format_action(action: VerificationAction) -> String {
    match action {
        VerificationAction::Granted => action.to_string().green().to_string(),
        VerificationAction::Revoked => action.to_string().red().to_string(),
    }
}

/// Truncate long identifiers for table columns
pub fn format_id(id: &str, width: usize) -> String {
    if id.chars().count() <= width || width < 4 {
        id.to_string()
    } else {
        let keep: String = id.chars().take(width - 3).collect();
        format!("{}...", keep)
    }
}

/// Print a formatted table border
pub fn print_table_border(width: usize) {
    println!("{}", "=".repeat(width));
}

/// Print a table row with columns
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    let mut row = String::new();
    for (i, col) in columns.iter().enumerate() {
        if i < widths.len() {
            row.push_str(&format!("{:<width$}  ", col, width = widths[i]));
        }
    }
    println!("{}", row.trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rating() {
        assert_eq!(format_rating(Some(4.567)), "4.57");
        assert_eq!(format_rating(None), "-");
    }

    #[test]
    fn test_format_id() {
        assert_eq!(format_id("short", 10), "short");
        assert_eq!(format_id("clx9a8b7c6d5e4f3", 10), "clx9a8b...");
    }
}
