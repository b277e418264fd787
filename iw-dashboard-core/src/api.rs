use crate::link_header::{last_page_hint, parse_link_header, LastPageHint, Links};
use crate::models::{
    AdminHome, AdminMe, Contest, HistogramResponse, MedianStepsByZip, UserRow, UsersBody, UsersByZip,
};
use crate::query::{graph_params, GraphMetric, HistogramQuery, Params, QueryScope, UsersQuery};
use crate::series::GraphSeries;
use crate::survey::{merge_survey_ids, SurveyUpload};
use iw_dashboard_common::{ApiConfig, DashboardError, Result};
use reqwest::header::{ACCEPT, COOKIE, LINK};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use url::Url;

/// One page of the users listing plus what the `Link` header says about the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct UsersPage {
    pub users: Vec<UserRow>,
    pub page: u32,
    pub last_page: LastPageHint,
    pub links: Links,
}

/// Admin REST client. Cheap to clone; the connection pool is shared.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    session_cookie: Option<String>,
}

impl ApiClient {
    pub fn new(cfg: &ApiConfig) -> Result<Self> {
        let base = Url::parse(&cfg.base_url)
            .map_err(|e| DashboardError::Config(format!("invalid base_url {}: {e}", cfg.base_url)))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .map_err(|e| DashboardError::Http(e.to_string()))?;
        Ok(Self { http, base, session_cookie: cfg.session_cookie.clone() })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn has_session(&self) -> bool {
        self.session_cookie.is_some()
    }

    /// `/api/admin/{path}` under the base URL, keeping any path prefix.
    pub fn endpoint(&self, path: &str, params: &[(String, String)]) -> Result<Url> {
        self.url_under("api/admin", path, params)
    }

    /// `/api/v2/export/{path}`, the CSV export router.
    pub fn export_endpoint(&self, path: &str, params: &[(String, String)]) -> Result<Url> {
        self.url_under("api/v2/export", path, params)
    }

    fn url_under(&self, prefix: &str, path: &str, params: &[(String, String)]) -> Result<Url> {
        let raw = format!("{}/{prefix}/{}", self.base.as_str().trim_end_matches('/'), path.trim_start_matches('/'));
        let mut url = Url::parse(&raw).map_err(|e| DashboardError::Config(format!("{raw}: {e}")))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    /// Attach the session cookie and send, logging timing. Any status is returned as is.
    async fn perform(&self, mut req: RequestBuilder, url: &Url) -> Result<reqwest::Response> {
        if let Some(session) = &self.session_cookie {
            req = req.header(COOKIE, format!("sessionid={session}"));
        }
        let started = Instant::now();
        tracing::debug!(%url, "request");
        let resp = req.send().await.map_err(transport_error)?;
        tracing::debug!(%url, status = resp.status().as_u16(), elapsed_ms = started.elapsed().as_millis() as u64, "response");
        Ok(resp)
    }

    async fn check(resp: reqwest::Response, path: &str) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(path, error = %e, "could not read error body");
                String::new()
            }
        };
        Err(status_error(status, path, &body))
    }

    async fn send(&self, path: &str, params: &[(String, String)]) -> Result<reqwest::Response> {
        let url = self.endpoint(path, params)?;
        let req = self.http.get(url.clone()).header(ACCEPT, "application/json");
        Self::check(self.perform(req, &url).await?, path).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(String, String)]) -> Result<T> {
        let resp = self.send(path, params).await?;
        let text = resp.text().await.map_err(transport_error)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Signed-in admin, or `None` when the backend answers 204.
    pub async fn me(&self) -> Result<Option<AdminMe>> {
        let resp = self.send("me", &[]).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = resp.text().await.map_err(transport_error)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub async fn home(&self) -> Result<AdminHome> {
        self.get_json("home", &[]).await
    }

    pub async fn contests(&self) -> Result<Vec<Contest>> {
        self.get_json("contests", &[]).await
    }

    pub async fn home_graph(&self, metric: GraphMetric, scope: &QueryScope, is_tester: bool) -> Result<GraphSeries> {
        let rows: Vec<serde_json::Value> = self.get_json(metric.endpoint(), &graph_params(scope, is_tester)).await?;
        Ok(GraphSeries::from_rows(metric, &rows))
    }

    pub async fn users(&self, query: &UsersQuery) -> Result<UsersPage> {
        let resp = self.send("users", &query.to_params()).await?;
        let links = resp
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(parse_link_header);
        let text = resp.text().await.map_err(transport_error)?;
        let body: UsersBody = serde_json::from_str(&text)?;
        let page = query.page.max(1);
        Ok(UsersPage {
            users: body.into_users(),
            page,
            last_page: last_page_hint(page, links.as_ref()),
            links: links.unwrap_or_default(),
        })
    }

    pub async fn users_by_zip(&self, contest_id: Option<&str>, is_tester: bool) -> Result<UsersByZip> {
        self.get_json("users/zip", &zip_params(contest_id, is_tester)).await
    }

    pub async fn users_by_zip_active(&self, contest_id: Option<&str>, is_tester: bool) -> Result<UsersByZip> {
        self.get_json("users/zip/active", &zip_params(contest_id, is_tester)).await
    }

    pub async fn users_by_zip_median_steps(&self, contest_id: Option<&str>, is_tester: bool) -> Result<MedianStepsByZip> {
        let raw: BTreeMap<String, Option<f64>> =
            self.get_json("users/zip/steps", &zip_params(contest_id, is_tester)).await?;
        Ok(MedianStepsByZip::from_map(raw))
    }

    /// Every page of the listing. A `next`-only response means keep going; an
    /// exact last page or an empty page ends the walk.
    pub async fn all_users(&self, query: &UsersQuery) -> Result<Vec<UserRow>> {
        let mut users = Vec::new();
        let mut page_no = 1;
        loop {
            let page = self.users(&query.with_page(page_no)).await?;
            let done = page.users.is_empty() || (page.last_page.is_exact() && page.page >= page.last_page.page());
            tracing::debug!(page = page_no, rows = page.users.len(), "fetched users page");
            users.extend(page.users);
            if done {
                return Ok(users);
            }
            page_no += 1;
        }
    }

    /// Contest-wide users CSV (`users_agg.csv`), one row per participant plus daily steps.
    pub async fn contest_users_csv(&self, contest_id: &str, is_tester: bool) -> Result<Vec<u8>> {
        let params = export_params(contest_id, is_tester)?;
        let url = self.export_endpoint("users", &params)?;
        let req = self.http.get(url.clone()).header(ACCEPT, "text/csv");
        let resp = Self::check(self.perform(req, &url).await?, "export/users").await?;
        Ok(resp.bytes().await.map_err(transport_error)?.to_vec())
    }

    /// Upload a survey file and get the contest export back with its IDs attached.
    ///
    /// Backends whose export router only serves `GET` answer 405; the join then
    /// happens locally on the plain contest export.
    pub async fn export_users_with_ids(&self, contest_id: &str, is_tester: bool, survey: &SurveyUpload) -> Result<Vec<u8>> {
        export_params(contest_id, is_tester)?;
        let url = self.export_endpoint("users", &[])?;
        let file = Part::bytes(survey.bytes.clone())
            .file_name(survey.file_name.clone())
            .mime_str("text/csv")
            .map_err(transport_error)?;
        let form = Form::new()
            .text("contest_id", contest_id.to_owned())
            .text("is_tester", is_tester.to_string())
            .text("email", survey.columns.email.to_string())
            .text("id", survey.columns.id.to_string())
            .part("file", file);
        let req = self.http.post(url.clone()).header(ACCEPT, "text/csv").multipart(form);
        let resp = self.perform(req, &url).await?;
        if resp.status() == StatusCode::METHOD_NOT_ALLOWED {
            tracing::info!("survey upload not supported by backend, joining locally");
            let export = self.contest_users_csv(contest_id, is_tester).await?;
            return merge_survey_ids(&export, &survey.bytes, survey.columns);
        }
        let resp = Self::check(resp, "export/users").await?;
        Ok(resp.bytes().await.map_err(transport_error)?.to_vec())
    }

    /// Validated before sending so bad bin specs never reach the backend.
    pub async fn histogram(&self, query: &HistogramQuery) -> Result<HistogramResponse> {
        query.validate()?;
        let path = format!("{}/histogram", query.path.as_str());
        self.get_json(&path, &query.to_params()).await
    }
}

fn zip_params(contest_id: Option<&str>, is_tester: bool) -> Params {
    let mut params = Params::new();
    if let Some(c) = contest_id {
        params.push(("contest_id".into(), c.to_owned()));
    }
    if is_tester {
        params.push(("is_tester".into(), "true".into()));
    }
    params
}

/// The export router needs a contest and always takes an explicit tester flag.
fn export_params(contest_id: &str, is_tester: bool) -> Result<Params> {
    if contest_id.trim().is_empty() {
        return Err(DashboardError::InvalidInput("contest_id is required for export".into()));
    }
    Ok(vec![("contest_id".into(), contest_id.to_owned()), ("is_tester".into(), is_tester.to_string())])
}

fn transport_error(e: reqwest::Error) -> DashboardError {
    if e.is_timeout() || e.is_connect() {
        DashboardError::Unavailable(e.to_string())
    } else if e.is_decode() {
        DashboardError::Http(format!("malformed body: {e}"))
    } else {
        DashboardError::Http(e.to_string())
    }
}

/// Map a non-success status onto the error taxonomy.
pub fn status_error(status: StatusCode, path: &str, body: &str) -> DashboardError {
    match status {
        StatusCode::UNAUTHORIZED => DashboardError::Unauthenticated,
        StatusCode::UNPROCESSABLE_ENTITY => {
            tracing::warn!(path, body, "backend rejected input");
            DashboardError::InvalidInput(body.to_owned())
        }
        StatusCode::NOT_FOUND => DashboardError::NotFound(path.to_owned()),
        s => DashboardError::Unavailable(format!("HTTP {} from {path}", s.as_u16())),
    }
}
