use crate::models::AdminHome;
use crate::query::GraphMetric;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const METERS_PER_MILE: f64 = 1609.0;
const PLACEHOLDER: &str = "__________";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// One time series from the home graph endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSeries {
    pub metric: GraphMetric,
    pub points: Vec<SeriesPoint>,
}

impl GraphSeries {
    /// Rows are `[["Date","Count"], [iso_datetime, value], ...]`. The header and
    /// anything that does not parse are skipped; distances arrive in meters.
    pub fn from_rows(metric: GraphMetric, rows: &[Value]) -> Self {
        let scale = if metric.is_distance() { METERS_PER_MILE } else { 1.0 };
        let points = rows
            .iter()
            .filter_map(|row| {
                let row = row.as_array()?;
                let date = row.first()?.as_str()?.get(..10)?;
                let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
                let value = row.get(1)?.as_f64()?;
                Some(SeriesPoint { date, value: value / scale })
            })
            .collect();
        Self { metric, points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn max_value(&self) -> f64 {
        self.points.iter().map(|p| p.value).fold(0.0, f64::max)
    }

    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Values scaled to integers for sparkline widgets.
    pub fn sparkline_values(&self) -> Vec<u64> {
        self.points.iter().map(|p| p.value.max(0.0).round() as u64).collect()
    }
}

/// Headline sentence pieces for the home view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeSummary {
    pub users: String,
    pub steps: String,
    pub distance: String,
}

impl From<&AdminHome> for HomeSummary {
    fn from(home: &AdminHome) -> Self {
        let users = match home.accounts_count {
            Some(n) if n > 0 => fmt_grouped(n as f64, 0),
            _ => PLACEHOLDER.into(),
        };
        let steps = match home.accounts_steps {
            Some(n) if n > 0 => fmt_grouped(n as f64 / 1_000_000.0, 1),
            _ => PLACEHOLDER.into(),
        };
        let distance = match home.accounts_distance {
            Some(m) if m > 0.0 => fmt_grouped(m / METERS_PER_MILE, 1),
            _ => PLACEHOLDER.into(),
        };
        Self {
            users: format!("{users} users"),
            steps: format!("{steps} million steps"),
            distance: format!("{distance} miles"),
        }
    }
}

impl HomeSummary {
    pub fn sentence(&self) -> String {
        format!("{} have walked {} / {} so far...", self.users, self.steps, self.distance)
    }
}

/// `1234567.89` with one decimal -> `1,234,567.9`
pub fn fmt_grouped(v: f64, decimals: usize) -> String {
    let s = format!("{:.*}", decimals, v.abs());
    let (int, frac) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s.as_str(), None),
    };
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if v < 0.0 && s.chars().any(|c| c.is_ascii_digit() && c != '0') { "-" } else { "" };
    match frac {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn distance_rows_are_converted_to_miles() {
        let rows = vec![json!(["Date", "Count"]), json!(["2020-04-01T00:00:00", 3218.0]), json!(["2020-04-02T00:00:00", 1609])];
        let s = GraphSeries::from_rows(GraphMetric::DistanceDaily, rows.as_slice());
        assert_eq!(s.points.len(), 2);
        assert_eq!(s.points[0].value, 2.0);
        assert_eq!(s.points[1].date, NaiveDate::from_ymd_opt(2020, 4, 2).unwrap());
        assert_eq!(s.max_value(), 2.0);
    }

    #[test]
    fn step_rows_pass_through() {
        let rows = vec![json!(["Date", "Count"]), json!(["2020-04-01", 12000]), json!(["bad", 1]), json!(null)];
        let s = GraphSeries::from_rows(GraphMetric::StepsDaily, rows.as_slice());
        assert_eq!(s.sparkline_values(), vec![12000]);
    }

    #[test]
    fn summary_formats_with_separators() {
        let home = AdminHome { accounts_count: Some(12345), accounts_steps: Some(987_654_321), accounts_distance: Some(160_900.0) };
        let s = HomeSummary::from(&home);
        assert_eq!(s.users, "12,345 users");
        assert_eq!(s.steps, "987.7 million steps");
        assert_eq!(s.distance, "100.0 miles");
    }

    #[test]
    fn missing_totals_show_placeholder() {
        let s = HomeSummary::from(&AdminHome { accounts_count: Some(0), ..Default::default() });
        assert_eq!(s.sentence(), "__________ users have walked __________ million steps / __________ miles so far...");
    }

    #[test]
    fn grouping() {
        assert_eq!(fmt_grouped(0.0, 0), "0");
        assert_eq!(fmt_grouped(999.0, 0), "999");
        assert_eq!(fmt_grouped(1000.0, 0), "1,000");
        assert_eq!(fmt_grouped(1_234_567.89, 1), "1,234,567.9");
        assert_eq!(fmt_grouped(-1500.0, 0), "-1,500");
    }
}
