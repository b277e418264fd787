use crate::tui::session::Session;
use crate::tui::theme::Theme;
use chrono::NaiveDate;
use iw_dashboard_common::{Config, DashboardError};
use iw_dashboard_core::histogram::{chart_title, transform, HistogramTable};
use iw_dashboard_core::intensity::ZipIntensity;
use iw_dashboard_core::models::{AdminHome, AdminMe, Contest, HistogramResponse, MedianStepsByZip, UsersByZip};
use iw_dashboard_core::query::field_unit;
use iw_dashboard_core::series::{GraphSeries, HomeSummary};
use iw_dashboard_core::{
    AuthContext, BinSpec, Debouncer, HistogramPath, HistogramQuery, OrderBy, PageState, QueryScope, RequestTracker,
    Result, Ticket, UsersPage, UsersQuery,
};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Home,
    Users,
    Histogram,
    Zip,
    Help,
    Login,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Home => "home",
            View::Users => "users",
            View::Histogram => "histogram",
            View::Zip => "zip",
            View::Help => "help",
            View::Login => "login",
        }
    }

    /// Overlays are never restored.
    pub fn parse(s: &str) -> Self {
        match s {
            "users" => View::Users,
            "histogram" => View::Histogram,
            "zip" => View::Zip,
            _ => View::Home,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Focus {
    Sidebar,
    Main,
}

/// Fetch state of one panel.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Load<T> {
    #[default]
    Idle,
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Load<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Load::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Load::Loading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZipMetric {
    Signups,
    Active,
    MedianSteps,
}

impl ZipMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZipMetric::Signups => "signups",
            ZipMetric::Active => "active",
            ZipMetric::MedianSteps => "median_steps",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "active" => ZipMetric::Active,
            "median_steps" => ZipMetric::MedianSteps,
            _ => ZipMetric::Signups,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ZipMetric::Signups => "Signups by zip",
            ZipMetric::Active => "Active users by zip",
            ZipMetric::MedianSteps => "Median steps by zip",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            ZipMetric::Signups => ZipMetric::Active,
            ZipMetric::Active => ZipMetric::MedianSteps,
            ZipMetric::MedianSteps => ZipMetric::Signups,
        }
    }
}

/// One slot per logical query; a newer request for the same slot supersedes the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Me,
    Home,
    Contests,
    Graphs,
    Users,
    Histogram,
    Zip,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Me,
    Home,
    Contests,
    Graphs { scope: QueryScope, is_tester: bool },
    Users(UsersQuery),
    Histogram(HistogramQuery),
    Zip { metric: ZipMetric, contest_id: Option<String>, is_tester: bool },
}

impl Request {
    pub fn key(&self) -> QueryKey {
        match self {
            Request::Me => QueryKey::Me,
            Request::Home => QueryKey::Home,
            Request::Contests => QueryKey::Contests,
            Request::Graphs { .. } => QueryKey::Graphs,
            Request::Users(_) => QueryKey::Users,
            Request::Histogram(_) => QueryKey::Histogram,
            Request::Zip { .. } => QueryKey::Zip,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Response {
    Me(Option<AdminMe>),
    Home(AdminHome),
    Contests(Vec<Contest>),
    Graphs(Vec<GraphSeries>),
    Users(UsersPage),
    Histogram(HistogramQuery, HistogramResponse),
    ZipCounts(UsersByZip),
    ZipMedian(MedianStepsByZip),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramView {
    pub title: String,
    pub unit: String,
    pub table: HistogramTable,
}

/// Sortable users columns: `(order_by field, header)`.
pub const USER_COLUMNS: [(&str, &str); 11] = [
    ("name", "Name"),
    ("email", "Email"),
    ("age", "Age"),
    ("zip", "Zip"),
    ("created", "Signed up"),
    ("dw_count", "Days"),
    ("dw_steps", "Steps"),
    ("dw_distance", "Miles"),
    ("iw_count", "Walks"),
    ("iw_steps", "IW steps"),
    ("iw_time", "IW time"),
];

pub fn default_histogram_presets() -> Vec<HistogramQuery> {
    vec![
        HistogramQuery::new(HistogramPath::Users, "age", BinSpec::Custom(vec![18, 30, 45, 60])),
        HistogramQuery::new(HistogramPath::DailyWalk, "steps", BinSpec::Size(2500)),
        HistogramQuery::new(HistogramPath::DailyWalk, "distance", BinSpec::Count(10)),
        HistogramQuery::new(HistogramPath::IntentionalWalk, "steps", BinSpec::Count(10)),
        HistogramQuery::new(HistogramPath::IntentionalWalk, "distance", BinSpec::Count(10)),
        HistogramQuery::new(HistogramPath::Leaderboard, "steps", BinSpec::Size(10000)),
    ]
}

pub struct App {
    pub config: Config,
    pub theme: Theme,
    pub auth: AuthContext,
    pub view: View,
    pub prev_view: View,
    pub focus: Focus,
    pub status_msg: String,
    pub should_quit: bool,
    pub today: NaiveDate,
    pub show_testers: bool,
    pub contests: Load<Vec<Contest>>,
    pub sidebar_selected: usize, // 0 is "All contests"
    pub sidebar_width: u16,      // clamped 15..=60
    pub sidebar_visible: bool,
    pub summary: Load<HomeSummary>,
    pub graphs: Load<Vec<GraphSeries>>,
    pub users_query: UsersQuery,
    pub users: Load<UsersPage>,
    pub pages: PageState,
    pub users_scroll: usize,
    pub sort_col: usize,
    pub search_input: String,
    pub searching: bool,
    pub search: Debouncer<String>,
    pub histogram_presets: Vec<HistogramQuery>,
    pub histogram_preset: usize,
    pub histogram: Load<HistogramView>,
    pub zip_metric: ZipMetric,
    pub zip: Load<ZipIntensity>,
    pub help_scroll: usize,
    tracker: RequestTracker<QueryKey>,
    outbox: Vec<(Ticket<QueryKey>, Request)>,
}

impl App {
    pub fn new(config: Config, today: NaiveDate) -> Self {
        let sidebar_width = config.display.sidebar_width.unwrap_or(30);
        let debounce = Duration::from_millis(config.search.debounce_ms);
        Self {
            theme: Theme::from_name(&config.display.theme),
            config,
            auth: AuthContext::Unknown,
            view: View::Home,
            prev_view: View::Home,
            focus: Focus::Main,
            status_msg: String::from("Loading..."),
            should_quit: false,
            today,
            show_testers: false,
            contests: Load::Idle,
            sidebar_selected: 0,
            sidebar_width,
            sidebar_visible: true,
            summary: Load::Idle,
            graphs: Load::Idle,
            users_query: UsersQuery::default(),
            users: Load::Idle,
            pages: PageState::new(1),
            users_scroll: 0,
            sort_col: 0,
            search_input: String::new(),
            searching: false,
            search: Debouncer::new(debounce),
            histogram_presets: default_histogram_presets(),
            histogram_preset: 0,
            histogram: Load::Idle,
            zip_metric: ZipMetric::Signups,
            zip: Load::Idle,
            help_scroll: 0,
            tracker: RequestTracker::new(),
            outbox: Vec::new(),
        }
    }

    // --- requests ---

    fn enqueue(&mut self, req: Request) {
        let ticket = self.tracker.begin(req.key());
        tracing::debug!(key = ?req.key(), generation = ticket.generation(), "request queued");
        self.outbox.push((ticket, req));
    }

    /// Requests queued since the last call, for the event loop to dispatch.
    pub fn take_requests(&mut self) -> Vec<(Ticket<QueryKey>, Request)> {
        std::mem::take(&mut self.outbox)
    }

    pub fn start(&mut self) {
        self.enqueue(Request::Me);
        self.contests = Load::Loading;
        self.enqueue(Request::Contests);
        self.refresh();
    }

    /// Contest filter when one is selected, otherwise the default date range.
    pub fn scope(&self) -> QueryScope {
        match &self.users_query.contest_id {
            Some(id) => QueryScope::Contest(id.clone()),
            None => QueryScope::default_range(self.today),
        }
    }

    pub fn refresh(&mut self) {
        match self.view {
            View::Home => {
                self.summary = Load::Loading;
                self.enqueue(Request::Home);
                self.graphs = Load::Loading;
                self.enqueue(Request::Graphs { scope: self.scope(), is_tester: self.show_testers });
            }
            View::Users => self.load_users(),
            View::Histogram => self.load_histogram(),
            View::Zip => self.load_zip(),
            View::Help | View::Login => {}
        }
    }

    fn load_users(&mut self) {
        self.users = Load::Loading;
        self.enqueue(Request::Users(self.users_query.clone()));
    }

    fn load_histogram(&mut self) {
        let Some(preset) = self.histogram_presets.get(self.histogram_preset) else { return };
        let mut q = preset.clone().with_scope(self.scope());
        q.is_tester = self.show_testers;
        self.histogram = Load::Loading;
        self.enqueue(Request::Histogram(q));
    }

    fn load_zip(&mut self) {
        self.zip = Load::Loading;
        self.enqueue(Request::Zip {
            metric: self.zip_metric,
            contest_id: self.users_query.contest_id.clone(),
            is_tester: self.show_testers,
        });
    }

    // --- responses ---

    /// Apply a finished request. Superseded responses are dropped unseen.
    pub fn apply(&mut self, ticket: Ticket<QueryKey>, result: Result<Response>) {
        let Some(result) = self.tracker.accept(&ticket, result) else { return };
        self.auth.observe(&result);
        let resp = match result {
            Ok(r) => r,
            Err(e) => return self.fail(*ticket.key(), e),
        };
        match resp {
            Response::Me(me) => {
                self.auth = AuthContext::from_me(me);
                match self.auth.user() {
                    Some(user) => self.status_msg = format!("Signed in as {}", user.display_name()),
                    None => self.show_login(),
                }
            }
            Response::Home(home) => self.summary = Load::Ready(HomeSummary::from(&home)),
            Response::Contests(contests) => {
                self.sidebar_selected = self
                    .users_query
                    .contest_id
                    .as_ref()
                    .and_then(|id| contests.iter().position(|c| &c.contest_id == id))
                    .map_or(0, |i| i + 1);
                self.contests = Load::Ready(contests);
            }
            Response::Graphs(series) => self.graphs = Load::Ready(series),
            Response::Users(page) => {
                self.pages = PageState { page: page.page, last_page: Some(page.last_page.page()) };
                self.users_scroll = 0;
                self.status_msg = if page.last_page.is_exact() {
                    format!("Page {} of {}", page.page, page.last_page.page())
                } else {
                    format!("Page {} (more pages follow)", page.page)
                };
                self.users = Load::Ready(page);
            }
            Response::Histogram(query, resp) => {
                let unit = if resp.unit.is_empty() { field_unit(&query.field).unwrap_or("").to_owned() } else { resp.unit.clone() };
                self.histogram = Load::Ready(HistogramView {
                    title: chart_title(query.path.as_str(), &query.field, &unit),
                    table: transform(&resp.data, &query.field),
                    unit,
                });
            }
            Response::ZipCounts(counts) => self.zip = Load::Ready(ZipIntensity::from_counts(&counts.total)),
            Response::ZipMedian(median) => self.zip = Load::Ready(ZipIntensity::from_values(&median.by_zip)),
        }
    }

    fn fail(&mut self, key: QueryKey, e: DashboardError) {
        if e.is_unauthenticated() {
            self.show_login();
            return;
        }
        tracing::warn!(?key, error = %e, "request failed");
        let msg = e.user_message().to_string();
        match key {
            QueryKey::Me => {}
            QueryKey::Home => self.summary = Load::Failed(msg.clone()),
            QueryKey::Contests => self.contests = Load::Failed(msg.clone()),
            QueryKey::Graphs => self.graphs = Load::Failed(msg.clone()),
            QueryKey::Users => self.users = Load::Failed(msg.clone()),
            QueryKey::Histogram => self.histogram = Load::Failed(msg.clone()),
            QueryKey::Zip => self.zip = Load::Failed(msg.clone()),
        }
        self.status_msg = msg;
    }

    fn show_login(&mut self) {
        if self.view != View::Login {
            self.prev_view = self.view;
        }
        self.view = View::Login;
        self.status_msg = DashboardError::Unauthenticated.user_message().into();
    }

    // --- navigation ---

    pub fn set_view(&mut self, view: View) {
        if self.view == view {
            return;
        }
        self.view = view;
        let idle = match view {
            View::Home => matches!(self.summary, Load::Idle),
            View::Users => matches!(self.users, Load::Idle),
            View::Histogram => matches!(self.histogram, Load::Idle),
            View::Zip => matches!(self.zip, Load::Idle),
            View::Help | View::Login => false,
        };
        if idle {
            self.refresh();
        }
    }

    pub fn toggle_help(&mut self) {
        if self.view == View::Help {
            self.view = self.prev_view;
            self.help_scroll = 0;
        } else {
            self.prev_view = self.view;
            self.view = View::Help;
        }
    }

    /// Back from the login prompt once a session cookie might exist.
    pub fn retry_login(&mut self) {
        self.view = self.prev_view;
        self.auth = AuthContext::Unknown;
        self.enqueue(Request::Me);
        self.refresh();
    }

    pub fn contest_count(&self) -> usize {
        self.contests.ready().map_or(0, Vec::len)
    }

    pub fn sidebar_down(&mut self) {
        if self.sidebar_selected < self.contest_count() {
            self.sidebar_selected += 1;
        }
    }

    pub fn sidebar_up(&mut self) {
        self.sidebar_selected = self.sidebar_selected.saturating_sub(1);
    }

    pub fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Sidebar => Focus::Main,
            Focus::Main => Focus::Sidebar,
        };
    }

    /// Apply the highlighted sidebar entry as the contest filter.
    pub fn select_contest(&mut self) {
        let contest_id = match self.sidebar_selected {
            0 => None,
            i => self.contests.ready().and_then(|cs| cs.get(i - 1)).map(|c| c.contest_id.clone()),
        };
        if contest_id == self.users_query.contest_id {
            return;
        }
        self.users_query = UsersQuery { contest_id, page: 1, ..self.users_query.clone() };
        self.pages = PageState::new(1);
        self.users_scroll = 0;
        self.invalidate();
    }

    pub fn toggle_testers(&mut self) {
        self.show_testers = !self.show_testers;
        self.users_query = UsersQuery { is_tester: self.show_testers, page: 1, ..self.users_query.clone() };
        self.pages = PageState::new(1);
        self.status_msg = if self.show_testers { "Showing testers".into() } else { "Showing participants".into() };
        self.invalidate();
    }

    /// Filters changed: every panel is stale, reload the visible one.
    fn invalidate(&mut self) {
        self.summary = Load::Idle;
        self.graphs = Load::Idle;
        self.users = Load::Idle;
        self.histogram = Load::Idle;
        self.zip = Load::Idle;
        self.refresh();
    }

    // --- users ---

    pub fn goto_page(&mut self, page: u32) {
        if page == 0 || page == self.pages.page {
            return;
        }
        self.users_query = self.users_query.with_page(page);
        self.pages.page = page;
        self.users_scroll = 0;
        self.load_users();
    }

    pub fn next_page(&mut self) {
        if let Some(p) = self.pages.next() {
            self.goto_page(p);
        }
    }

    pub fn prev_page(&mut self) {
        if let Some(p) = self.pages.prev() {
            self.goto_page(p);
        }
    }

    pub fn last_page(&mut self) {
        if let Some(last) = self.pages.last_page {
            self.goto_page(last);
        }
    }

    pub fn scroll_users(&mut self, delta: isize) {
        let rows = self.users.ready().map_or(0, |p| p.users.len());
        let next = self.users_scroll.saturating_add_signed(delta);
        self.users_scroll = next.min(rows.saturating_sub(1));
    }

    pub fn search_push(&mut self, c: char) {
        self.search_input.push(c);
        self.search.schedule(self.search_input.clone());
    }

    pub fn search_pop(&mut self) {
        self.search_input.pop();
        self.search.schedule(self.search_input.clone());
    }

    /// Enter skips the quiet period.
    pub fn search_submit(&mut self) {
        self.searching = false;
        let text = self.search.cancel().unwrap_or_else(|| self.search_input.clone());
        self.apply_search(&text);
    }

    pub fn apply_search(&mut self, text: &str) {
        let next = self.users_query.with_search(text);
        if next == self.users_query {
            return;
        }
        self.users_query = next;
        self.pages = PageState::new(1);
        self.users_scroll = 0;
        self.load_users();
    }

    /// Called every frame; fires a settled search.
    pub fn tick(&mut self) {
        if let Some(text) = self.search.try_next() {
            self.apply_search(&text);
        }
    }

    pub fn sort_column_next(&mut self) {
        self.sort_col = (self.sort_col + 1) % USER_COLUMNS.len();
    }

    pub fn sort_column_prev(&mut self) {
        self.sort_col = (self.sort_col + USER_COLUMNS.len() - 1) % USER_COLUMNS.len();
    }

    pub fn toggle_order(&mut self) {
        let field = USER_COLUMNS[self.sort_col].0;
        self.users_query = self.users_query.with_order(field);
        self.pages = PageState { page: 1, last_page: self.pages.last_page };
        self.users_scroll = 0;
        self.load_users();
    }

    // --- histogram / zip ---

    pub fn cycle_histogram(&mut self, forward: bool) {
        let n = self.histogram_presets.len();
        if n == 0 {
            return;
        }
        self.histogram_preset = if forward { (self.histogram_preset + 1) % n } else { (self.histogram_preset + n - 1) % n };
        self.load_histogram();
    }

    pub fn cycle_zip_metric(&mut self) {
        self.zip_metric = self.zip_metric.next();
        self.load_zip();
    }

    // --- session ---

    pub fn to_session(&self) -> Session {
        let view = match self.view {
            View::Help | View::Login => self.prev_view,
            v => v,
        };
        Session {
            base_url: self.config.api.base_url.clone(),
            view: view.as_str().into(),
            contest_id: self.users_query.contest_id.clone(),
            order_by: self.users_query.order_by.as_ref().map(OrderBy::as_param),
            histogram_preset: self.histogram_preset,
            zip_metric: self.zip_metric.as_str().into(),
            show_testers: self.show_testers,
            sidebar_width: self.sidebar_width,
        }
    }

    pub fn restore_from_session(&mut self, s: &Session) {
        if s.base_url != self.config.api.base_url {
            return;
        }
        self.view = View::parse(&s.view);
        self.prev_view = self.view;
        self.show_testers = s.show_testers;
        self.users_query = UsersQuery {
            contest_id: s.contest_id.clone(),
            is_tester: s.show_testers,
            order_by: s.order_by.as_deref().and_then(OrderBy::parse),
            ..UsersQuery::default()
        };
        if let Some(o) = &self.users_query.order_by {
            self.sort_col = USER_COLUMNS.iter().position(|(f, _)| *f == o.field).unwrap_or(0);
        }
        self.histogram_preset = s.histogram_preset.min(self.histogram_presets.len().saturating_sub(1));
        self.zip_metric = ZipMetric::parse(&s.zip_metric);
        self.sidebar_width = s.sidebar_width.clamp(15, 60);
    }
}
