use serde::{Deserialize, Serialize};

/// Half-open bin as returned by the backend: `[bin_start, bin_end)`.
///
/// Bounds are floats because distance fields bin on float edges. The zero-count
/// filler for the top custom bin carries no `bin_end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    #[serde(default)]
    pub bin_idx: Option<i64>,
    pub bin_start: f64,
    #[serde(default)]
    pub bin_end: Option<f64>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramRow {
    pub label: String,
    pub count: u64,
}

/// Display table: a `(field, "Count")` header and one closed-range row per bin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramTable {
    pub field_label: String,
    pub count_label: String,
    pub rows: Vec<HistogramRow>,
}

impl HistogramTable {
    /// Header only means there is nothing to chart.
    pub fn has_data(&self) -> bool {
        !self.rows.is_empty()
    }

    pub fn max_count(&self) -> u64 {
        self.rows.iter().map(|r| r.count).max().unwrap_or(0)
    }

    /// Header row followed by the data rows.
    pub fn to_rows(&self) -> Vec<(String, String)> {
        std::iter::once((self.field_label.clone(), self.count_label.clone()))
            .chain(self.rows.iter().map(|r| (r.label.clone(), r.count.to_string())))
            .collect()
    }
}

/// Turn backend bins into display rows.
///
/// Exclusive upper bounds become inclusive (`end - 1`), which assumes integer
/// quantities such as ages or step buckets. The last bin aggregates everything
/// above its start, so it is labelled `>{start}`; a lone bin is labelled that way too,
/// as is any bin without an upper bound.
pub fn transform(bins: &[HistogramBin], field: &str) -> HistogramTable {
    let last_idx = bins.len().saturating_sub(1);
    let rows = bins
        .iter()
        .enumerate()
        .map(|(i, b)| HistogramRow {
            label: match b.bin_end {
                Some(end) if i != last_idx => format!("{}-{}", fmt_bound(b.bin_start), fmt_bound(end - 1.0)),
                _ => format!(">{}", fmt_bound(b.bin_start)),
            },
            count: b.count,
        })
        .collect();
    HistogramTable {
        field_label: capitalize(field),
        count_label: "Count".into(),
        rows,
    }
}

/// Whole floats print without a fraction: `3.0` is `3`, `2.5` stays `2.5`.
pub fn fmt_bound(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Chart heading for a histogram of `field` over `path`.
pub fn chart_title(path: &str, field: &str, unit: &str) -> String {
    match path {
        "intentionalwalk" => format!("Intentional Walk ({unit})"),
        "users" => format!("User {field} ({unit})"),
        "dailywalk" => format!("Daily Walk ({unit})"),
        "leaderboard" => format!("Leaderboard ({unit})"),
        _ => format!("{} {field} ({unit})", capitalize(path)),
    }
}
