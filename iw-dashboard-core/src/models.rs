use crate::histogram::HistogramBin;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminMe {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl AdminMe {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() { self.username.clone() } else { full.to_owned() }
    }
}

/// Headline totals. The backend sums nothing for an empty table, hence the options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminHome {
    #[serde(default)]
    pub accounts_count: Option<u64>,
    #[serde(default)]
    pub accounts_steps: Option<u64>,
    #[serde(default)]
    pub accounts_distance: Option<f64>, // meters
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub contest_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Contest {
    pub fn label(&self) -> String {
        format!("{} - {}", fmt_date_med(self.start), fmt_date_med(self.end))
    }
}

/// `Apr 1, 2020`
pub fn fmt_date_med(d: NaiveDate) -> String {
    d.format("%b %-d, %Y").to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub dw_count: Option<u64>,
    #[serde(default)]
    pub dw_steps: Option<u64>,
    #[serde(default)]
    pub dw_distance: Option<f64>,
    #[serde(default)]
    pub iw_count: Option<u64>,
    #[serde(default)]
    pub iw_steps: Option<u64>,
    #[serde(default)]
    pub iw_distance: Option<f64>,
    #[serde(default)]
    pub iw_time: Option<u64>,
    // only present for contest-scoped listings
    #[serde(default)]
    pub is_new: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UserRow {
    pub fn signup_date(&self) -> Option<NaiveDate> {
        let created = self.created.as_deref()?;
        DateTime::parse_from_rfc3339(created)
            .map(|dt| dt.date_naive())
            .ok()
            .or_else(|| created.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
    }

    pub fn signup_label(&self) -> String {
        self.signup_date().map(fmt_date_med).unwrap_or_default()
    }
}

/// The listing endpoint answers either with a bare list or wrapped in `users`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UsersBody {
    Wrapped { users: Vec<UserRow> },
    Bare(Vec<UserRow>),
}

impl UsersBody {
    pub fn into_users(self) -> Vec<UserRow> {
        match self {
            UsersBody::Wrapped { users } | UsersBody::Bare(users) => users,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsersByZip {
    #[serde(default)]
    pub total: BTreeMap<String, u64>,
    #[serde(default)]
    pub new: Option<BTreeMap<String, u64>>,
}

/// Median contest steps per zip; `all` holds the overall median.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedianStepsByZip {
    pub all: Option<f64>,
    pub by_zip: BTreeMap<String, Option<f64>>,
}

impl MedianStepsByZip {
    pub fn from_map(mut raw: BTreeMap<String, Option<f64>>) -> Self {
        let all = raw.remove("all").flatten();
        Self { all, by_zip: raw }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramResponse {
    pub data: Vec<HistogramBin>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub bin_size: Option<f64>,
    #[serde(default)]
    pub bin_custom: Option<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_body_accepts_both_shapes() {
        let bare: UsersBody = serde_json::from_str(r#"[{"name":"Ann","email":"ann@example.org","age":31}]"#).unwrap();
        let wrapped: UsersBody = serde_json::from_str(r#"{"users":[{"name":"Ann","email":"ann@example.org","is_new":true}]}"#).unwrap();
        assert_eq!(bare.into_users()[0].age, Some(31));
        assert_eq!(wrapped.into_users()[0].is_new, Some(true));
    }

    #[test]
    fn signup_date_reads_iso_timestamps() {
        let u = UserRow { created: Some("2023-04-05T17:10:00.123456-07:00".into()), ..Default::default() };
        assert_eq!(u.signup_label(), "Apr 5, 2023");
        let naive = UserRow { created: Some("2023-04-05T17:10:00".into()), ..Default::default() };
        assert_eq!(naive.signup_label(), "Apr 5, 2023");
    }

    #[test]
    fn contest_label_uses_medium_dates() {
        let c: Contest = serde_json::from_str(r#"{"contest_id":"c1","start":"2023-04-01","end":"2023-04-30"}"#).unwrap();
        assert_eq!(c.label(), "Apr 1, 2023 - Apr 30, 2023");
    }

    #[test]
    fn median_steps_splits_overall_value() {
        let raw: BTreeMap<String, Option<f64>> = serde_json::from_str(r#"{"all":5200.5,"94110":6100.0,"94122":null}"#).unwrap();
        let m = MedianStepsByZip::from_map(raw);
        assert_eq!(m.all, Some(5200.5));
        assert_eq!(m.by_zip.len(), 2);
        assert_eq!(m.by_zip["94122"], None);
    }

    #[test]
    fn empty_top_custom_bin_decodes() {
        let body = r#"{"data":[{"bin_idx":0,"bin_start":18,"bin_end":30,"count":7},{"bin_idx":1,"bin_start":30,"bin_end":45,"count":4},{"bin_idx":2,"bin_start":45,"bin_end":60,"count":1},{"bin_start":60,"count":0,"bin_idx":3}],"unit":"years","bin_custom":[18,30,45,60]}"#;
        let resp: HistogramResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.data[3].bin_end, None);
        assert_eq!(resp.bin_custom, Some(vec![18.0, 30.0, 45.0, 60.0]));
        let table = crate::histogram::transform(&resp.data, "age");
        let labels: Vec<&str> = table.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["18-29", "30-44", "45-59", ">60"]);
    }

    #[test]
    fn float_distance_bins_decode() {
        let body = r#"{"data":[{"bin_idx":0,"bin_start":0.0,"bin_end":3.0,"count":5}],"unit":"miles","bin_size":3.0}"#;
        let resp: HistogramResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.bin_size, Some(3.0));
        assert_eq!(resp.data[0].bin_start, 0.0);
        assert_eq!(crate::histogram::transform(&resp.data, "distance").rows[0].label, ">0");
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let me = AdminMe { id: 1, username: "admin".into(), first_name: String::new(), last_name: String::new(), email: String::new() };
        assert_eq!(me.display_name(), "admin");
    }
}
