use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use iw_dashboard_common::Result;
use serde::Serialize;

use crate::api::UsersPage;
use crate::histogram::HistogramTable;
use crate::models::{Contest, UserRow};
use crate::pagination::{compute, render_text};
use crate::series::{fmt_grouped, HomeSummary, METERS_PER_MILE};

// --- headless output ---

pub fn print_summary(summary: &HomeSummary, contests: &[Contest]) {
    println!("{}", summary.sentence());
    if !contests.is_empty() {
        println!();
        println!("{:<16} {}", "Contests:", contests.len());
        for c in contests {
            println!("  {:<38} {}", c.contest_id, c.label());
        }
    }
}

pub fn print_users_page(page: &UsersPage) {
    println!(
        "{:<24} {:<32} {:>4} {:>6} {:>12} {:>10} {:>12}",
        "Name", "Email", "Age", "Zip", "Signed up", "DW steps", "IW steps"
    );
    for u in &page.users {
        println!(
            "{:<24} {:<32} {:>4} {:>6} {:>12} {:>10} {:>12}",
            truncate(&u.name, 24),
            truncate(&u.email, 32),
            u.age.map_or("-".into(), |a| a.to_string()),
            u.zip.as_deref().unwrap_or("-"),
            u.signup_label(),
            u.dw_steps.map_or("-".into(), |s| fmt_grouped(s as f64, 0)),
            u.iw_steps.map_or("-".into(), |s| fmt_grouped(s as f64, 0)),
        );
    }
    if page.users.is_empty() {
        println!("No users found.");
    }
    let approx = if page.last_page.is_exact() { "" } else { " (more pages may follow)" };
    println!();
    println!("{}{approx}", render_text(&compute(page.page, Some(page.last_page.page()))));
}

pub fn print_histogram(title: &str, table: &HistogramTable, width: usize) {
    println!("{title}");
    if !table.has_data() {
        println!("No data available.");
        return;
    }
    let label_w = table.rows.iter().map(|r| r.label.len()).max().unwrap_or(0).max(table.field_label.len());
    let max = table.max_count();
    println!("{:<label_w$}  {}", table.field_label, table.count_label);
    for r in &table.rows {
        println!("{:<label_w$}  {} {}", r.label, bar(r.count, max, width), r.count);
    }
}

/// Text bar scaled so `max` fills `width` cells.
pub fn bar(count: u64, max: u64, width: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let len = ((count as f64 / max as f64) * width as f64).round() as usize;
    "\u{2588}".repeat(len.min(width))
}

fn truncate(s: &str, max: usize) -> Cow<'_, str> {
    if s.chars().count() <= max {
        Cow::Borrowed(s)
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        Cow::Owned(format!("{cut}\u{2026}"))
    }
}

// --- JSON export ---

pub fn export_json<T: Serialize + ?Sized>(output_path: &Path, value: &T) -> Result<()> {
    let mut file = std::fs::File::create(output_path)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    writeln!(file)?;
    Ok(())
}

// --- CSV export ---

/// Quote a field when it contains a comma, quote or newline.
pub fn csv_field(raw: &str) -> Cow<'_, str> {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        Cow::Owned(format!("\"{}\"", raw.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(raw)
    }
}

pub fn write_users_csv<W: Write>(mut w: W, users: &[UserRow]) -> Result<()> {
    writeln!(w, "name,email,age,zip,signup_date,dw_count,dw_steps,dw_distance_miles,iw_count,iw_steps,iw_distance_miles,iw_time,is_new,is_active")?;
    let opt = |v: Option<String>| v.unwrap_or_default();
    for u in users {
        writeln!(
            w,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            csv_field(&u.name),
            csv_field(&u.email),
            opt(u.age.map(|v| v.to_string())),
            csv_field(u.zip.as_deref().unwrap_or("")),
            opt(u.signup_date().map(|d| d.to_string())),
            opt(u.dw_count.map(|v| v.to_string())),
            opt(u.dw_steps.map(|v| v.to_string())),
            opt(u.dw_distance.map(|m| format!("{:.2}", m / METERS_PER_MILE))),
            opt(u.iw_count.map(|v| v.to_string())),
            opt(u.iw_steps.map(|v| v.to_string())),
            opt(u.iw_distance.map(|m| format!("{:.2}", m / METERS_PER_MILE))),
            opt(u.iw_time.map(|v| v.to_string())),
            opt(u.is_new.map(|v| v.to_string())),
            opt(u.is_active.map(|v| v.to_string())),
        )?;
    }
    Ok(())
}

pub fn export_users_csv(output_path: &Path, users: &[UserRow]) -> Result<()> {
    let file = std::fs::File::create(output_path)?;
    write_users_csv(std::io::BufWriter::new(file), users)
}

pub fn write_histogram_csv<W: Write>(mut w: W, table: &HistogramTable) -> Result<()> {
    for (label, count) in table.to_rows() {
        writeln!(w, "{},{}", csv_field(&label), csv_field(&count))?;
    }
    Ok(())
}

pub fn export_histogram_csv(output_path: &Path, table: &HistogramTable) -> Result<()> {
    let file = std::fs::File::create(output_path)?;
    write_histogram_csv(std::io::BufWriter::new(file), table)
}
