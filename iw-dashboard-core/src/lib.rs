pub mod api;
pub mod auth;
pub mod debounce;
pub mod export;
pub mod histogram;
pub mod intensity;
pub mod latest;
pub mod link_header;
pub mod models;
pub mod pagination;
pub mod query;
pub mod series;
pub mod survey;

pub use iw_dashboard_common::{DashboardError, Result};
pub use api::{ApiClient, UsersPage};
pub use auth::AuthContext;
pub use debounce::Debouncer;
pub use histogram::{transform, HistogramBin, HistogramTable};
pub use latest::{RequestTracker, Ticket};
pub use link_header::{last_page_hint, parse_link_header, LastPageHint};
pub use pagination::{compute, page_query, PageLinkToken, PageState};
pub use query::{BinSpec, GraphMetric, HistogramPath, HistogramQuery, OrderBy, QueryScope, UsersQuery};
pub use survey::{SurveyColumns, SurveyUpload};
