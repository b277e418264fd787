use chrono::NaiveDate;
use iw_dashboard_common::{DashboardError, Result};
use serde::{Deserialize, Serialize};

pub type Params = Vec<(String, String)>;

/// Contest and date range filters are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QueryScope {
    #[default]
    All,
    Contest(String),
    DateRange { start: NaiveDate, end: NaiveDate },
}

impl QueryScope {
    /// `2020-04-01` through today, the dashboard's initial range.
    pub fn default_range(today: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(2020, 4, 1).unwrap_or(today);
        QueryScope::DateRange { start, end: today }
    }

    pub fn contest_id(&self) -> Option<&str> {
        match self {
            QueryScope::Contest(id) => Some(id),
            _ => None,
        }
    }

    fn push_params(&self, params: &mut Params) {
        match self {
            QueryScope::All => {}
            QueryScope::Contest(id) => params.push(("contest_id".into(), id.clone())),
            QueryScope::DateRange { start, end } => {
                params.push(("start_date".into(), start.to_string()));
                params.push(("end_date".into(), end.to_string()));
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let QueryScope::DateRange { start, end } = self {
            if start > end {
                return Err(DashboardError::InvalidInput(format!("start_date {start} is after end_date {end}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinSpec {
    Size(u32),
    Count(u32),
    Custom(Vec<u32>),
}

impl BinSpec {
    pub fn validate(&self) -> Result<()> {
        match self {
            BinSpec::Size(0) => Err(DashboardError::InvalidInput("bin_size must be greater than 0.".into())),
            BinSpec::Count(n) if *n < 2 => Err(DashboardError::InvalidInput("bin_count must be greater than 1.".into())),
            BinSpec::Custom(v) if v.is_empty() => Err(DashboardError::InvalidInput("bin_custom must not be empty.".into())),
            BinSpec::Custom(v) if !v.windows(2).all(|w| w[0] < w[1]) => {
                Err(DashboardError::InvalidInput("bin_custom values must be in increasing order.".into()))
            }
            _ => Ok(()),
        }
    }

    /// Parse `0,18,29,44` into custom bin edges.
    pub fn parse_custom(s: &str) -> Result<Self> {
        let edges = s
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| v.parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| DashboardError::InvalidInput(format!("bin_custom could not be parsed: {s}")))?;
        Ok(BinSpec::Custom(edges))
    }

    fn push_params(&self, params: &mut Params) {
        match self {
            BinSpec::Size(n) => params.push(("bin_size".into(), n.to_string())),
            BinSpec::Count(n) => params.push(("bin_count".into(), n.to_string())),
            BinSpec::Custom(v) => params.push((
                "bin_custom".into(),
                v.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(","),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistogramPath {
    Users,
    DailyWalk,
    IntentionalWalk,
    Leaderboard,
}

impl HistogramPath {
    pub const ALL: [HistogramPath; 4] = [
        HistogramPath::Users,
        HistogramPath::DailyWalk,
        HistogramPath::IntentionalWalk,
        HistogramPath::Leaderboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HistogramPath::Users => "users",
            HistogramPath::DailyWalk => "dailywalk",
            HistogramPath::IntentionalWalk => "intentionalwalk",
            HistogramPath::Leaderboard => "leaderboard",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DashboardError::NotFound(format!("Invalid model and/or {s} does not support histograms")))
    }

    pub fn supported_fields(&self) -> &'static [&'static str] {
        match self {
            HistogramPath::Users => &["age"],
            HistogramPath::DailyWalk | HistogramPath::IntentionalWalk => &["steps", "distance"],
            HistogramPath::Leaderboard => &["steps"],
        }
    }
}

pub fn field_unit(field: &str) -> Option<&'static str> {
    match field {
        "steps" => Some("steps"),
        "distance" => Some("miles"),
        "age" => Some("years"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistogramQuery {
    pub path: HistogramPath,
    pub field: String,
    pub scope: QueryScope,
    pub bins: BinSpec,
    #[serde(default)]
    pub is_tester: bool,
}

impl HistogramQuery {
    pub fn new(path: HistogramPath, field: impl Into<String>, bins: BinSpec) -> Self {
        Self { path, field: field.into(), scope: QueryScope::All, bins, is_tester: false }
    }

    pub fn with_scope(mut self, scope: QueryScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let fields = self.path.supported_fields();
        if !fields.contains(&self.field.as_str()) {
            return Err(DashboardError::InvalidInput(format!(
                "{} is not supported for {}. Please use one of {:?}.",
                self.field,
                self.path.as_str(),
                fields
            )));
        }
        self.scope.validate()?;
        self.bins.validate()
    }

    pub fn to_params(&self) -> Params {
        let mut params = vec![("field".to_string(), self.field.clone())];
        self.scope.push_params(&mut params);
        self.bins.push_params(&mut params);
        if self.is_tester {
            params.push(("is_tester".into(), "true".into()));
        }
        params
    }
}

/// Sort column; descending is sent as `-field`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn parse(s: &str) -> Option<Self> {
        let (descending, field) = match s.strip_prefix('-') {
            Some(f) => (true, f),
            None => (false, s),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self { field: field.to_owned(), descending })
    }

    pub fn as_param(&self) -> String {
        if self.descending { format!("-{}", self.field) } else { self.field.clone() }
    }

    /// Clicking the ascending column flips it to descending; anything else sorts ascending.
    pub fn toggle(current: Option<&OrderBy>, field: &str) -> OrderBy {
        let descending = matches!(current, Some(c) if c.field == field && !c.descending);
        OrderBy { field: field.to_owned(), descending }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsersQuery {
    #[serde(default)]
    pub contest_id: Option<String>,
    #[serde(default)]
    pub is_tester: bool,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

impl Default for UsersQuery {
    fn default() -> Self {
        Self { contest_id: None, is_tester: false, order_by: None, query: None, page: 1 }
    }
}

impl UsersQuery {
    /// Every parameter except `page`, in a stable order.
    pub fn filter_params(&self) -> Params {
        let mut params = Params::new();
        if let Some(c) = &self.contest_id {
            params.push(("contest_id".into(), c.clone()));
        }
        if self.is_tester {
            params.push(("is_tester".into(), "true".into()));
        }
        if let Some(o) = &self.order_by {
            params.push(("order_by".into(), o.as_param()));
        }
        if let Some(q) = self.query.as_deref().filter(|q| !q.is_empty()) {
            params.push(("query".into(), q.to_owned()));
        }
        params
    }

    pub fn to_params(&self) -> Params {
        let mut params = self.filter_params();
        if self.page > 1 {
            params.push(("page".into(), self.page.to_string()));
        }
        params
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self { page: page.max(1), ..self.clone() }
    }

    /// A new search text or sort order starts over at page 1.
    pub fn with_search(&self, text: &str) -> Self {
        let query = if text.trim().is_empty() { None } else { Some(text.trim().to_owned()) };
        Self { query, page: 1, ..self.clone() }
    }

    pub fn with_order(&self, field: &str) -> Self {
        Self { order_by: Some(OrderBy::toggle(self.order_by.as_ref(), field)), page: 1, ..self.clone() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphMetric {
    UsersDaily,
    UsersCumulative,
    StepsDaily,
    StepsCumulative,
    DistanceDaily,
    DistanceCumulative,
}

impl GraphMetric {
    pub const ALL: [GraphMetric; 6] = [
        GraphMetric::UsersDaily,
        GraphMetric::UsersCumulative,
        GraphMetric::StepsDaily,
        GraphMetric::StepsCumulative,
        GraphMetric::DistanceDaily,
        GraphMetric::DistanceCumulative,
    ];

    pub fn endpoint(&self) -> &'static str {
        match self {
            GraphMetric::UsersDaily => "home/users/daily",
            GraphMetric::UsersCumulative => "home/users/cumulative",
            GraphMetric::StepsDaily => "home/steps/daily",
            GraphMetric::StepsCumulative => "home/steps/cumulative",
            GraphMetric::DistanceDaily => "home/distance/daily",
            GraphMetric::DistanceCumulative => "home/distance/cumulative",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            GraphMetric::UsersDaily => "Signups (per day)",
            GraphMetric::UsersCumulative => "Signups (total)",
            GraphMetric::StepsDaily => "Steps (per day)",
            GraphMetric::StepsCumulative => "Steps (total)",
            GraphMetric::DistanceDaily => "Distance (miles per day)",
            GraphMetric::DistanceCumulative => "Distance (miles total)",
        }
    }

    pub fn is_distance(&self) -> bool {
        matches!(self, GraphMetric::DistanceDaily | GraphMetric::DistanceCumulative)
    }
}

/// Scope parameters shared by the home graph endpoints.
pub fn graph_params(scope: &QueryScope, is_tester: bool) -> Params {
    let mut params = Params::new();
    scope.push_params(&mut params);
    if is_tester {
        params.push(("is_tester".into(), "true".into()));
    }
    params
}
