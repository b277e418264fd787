use iw_dashboard_common::{ApiConfig, DashboardError};
use iw_dashboard_core::export::{export_histogram_csv, export_json, export_users_csv};
use iw_dashboard_core::models::UserRow;
use iw_dashboard_core::survey::merge_survey_ids;
use iw_dashboard_core::{
    transform, ApiClient, BinSpec, GraphMetric, HistogramBin, HistogramPath, HistogramQuery, LastPageHint,
    QueryScope, SurveyUpload, UsersQuery,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

struct Reply {
    status: &'static str,
    headers: Vec<(&'static str, String)>,
    body: String,
}

fn json(status: &'static str, body: &str) -> Reply {
    Reply { status, headers: vec![("Content-Type", "application/json".into())], body: body.into() }
}

fn csv_reply(body: &str) -> Reply {
    Reply { status: "200 OK", headers: vec![("Content-Type", "text/csv".into())], body: body.into() }
}

const CONTEST_EXPORT: &str = "Participant Name,Email,Age\nAnn,ANN@example.org,31\nBo,bo@example.org,40\n";
const SURVEY: &str = "Email address,ID\nann@example.org,S-1\nbo@example.org,S-2\n";

/// Users chain for `query=chain`: pages 1-2 only link `next`, page 3 links an exact `last`.
fn chain_page(query: &str) -> Reply {
    let page: u32 = query
        .split('&')
        .find_map(|kv| kv.strip_prefix("page="))
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);
    let mut r = json("200 OK", &format!(r#"[{{"name":"chain{page}","email":"c{page}@example.org"}}]"#));
    let link = if page < 3 {
        format!(r#"<http://backend/api/admin/users?query=chain&page={}>; rel="next""#, page + 1)
    } else {
        r#"<http://backend/api/admin/users?query=chain&page=2>; rel="prev", <http://backend/api/admin/users?query=chain&page=3>; rel="last""#.into()
    };
    r.headers.push(("Link", link));
    r
}

fn route(method: &str, target: &str, head: &str, body: &str) -> Reply {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    match (method, path) {
        ("POST", "/api/v2/export/users") if body.contains("legacy") => {
            Reply { status: "405 Method Not Allowed", headers: vec![], body: String::new() }
        }
        ("POST", "/api/v2/export/users") => {
            let fields = ["name=\"contest_id\"", "name=\"is_tester\"", "name=\"email\"", "name=\"id\"", "name=\"file\""];
            if fields.iter().all(|f| body.contains(f)) && body.contains("S-2") {
                csv_reply("Participant Name,Email,Age,Survey ID\nAnn,ANN@example.org,31,S-1\n")
            } else {
                json("422 Unprocessable Entity", "missing form fields")
            }
        }
        ("GET", "/api/v2/export/users") if query.contains("contest_id=legacy") && query.contains("is_tester=false") => {
            csv_reply(CONTEST_EXPORT)
        }
        (_, "/api/admin/users") if query.contains("query=chain") => chain_page(query),
        (_, "/api/admin/users") if query.contains("query=runaway") && query.contains("page=2") => {
            let mut r = json("200 OK", "[]");
            r.headers.push(("Link", r#"<http://backend/api/admin/users?query=runaway&page=3>; rel="next""#.into()));
            r
        }
        (_, "/api/admin/users") if query.contains("query=runaway") => {
            let mut r = json("200 OK", r#"[{"name":"Di","email":"di@example.org"}]"#);
            r.headers.push(("Link", r#"<http://backend/api/admin/users?query=runaway&page=2>; rel="next""#.into()));
            r
        }
        (_, "/api/admin/users/histogram") if query.contains("bin_custom") => json(
            "200 OK",
            r#"{"data":[{"bin_idx":0,"bin_start":18,"bin_end":30,"count":7},{"bin_idx":1,"bin_start":30,"bin_end":45,"count":4},{"bin_idx":2,"bin_start":45,"bin_end":60,"count":1},{"bin_start":60,"count":0,"bin_idx":3}],"unit":"years","bin_custom":[18,30,45,60]}"#,
        ),
        (_, "/api/admin/intentionalwalk/histogram") => json(
            "200 OK",
            r#"{"data":[{"bin_idx":0,"bin_start":0.0,"bin_end":3.0,"count":5},{"bin_idx":1,"bin_start":3.0,"bin_end":6.0,"count":2},{"bin_idx":2,"bin_start":6.0,"bin_end":9.5,"count":1}],"unit":"miles","bin_size":3.0}"#,
        ),
        _ => route_admin(path, query, head),
    }
}

fn route_admin(path: &str, query: &str, head: &str) -> Reply {
    match path {
        "/api/admin/me" if head.contains("sessionid=good") => {
            json("200 OK", r#"{"id":3,"username":"admin","first_name":"Ada","last_name":"Lovelace","email":"a@example.org"}"#)
        }
        "/api/admin/me" => Reply { status: "204 No Content", headers: vec![], body: String::new() },
        "/api/admin/home" => json("401 Unauthorized", ""),
        "/api/admin/contests" => json("502 Bad Gateway", "upstream down"),
        "/api/admin/users" if query.contains("query=next") => {
            let mut r = json("200 OK", r#"[{"name":"Bo","email":"bo@example.org"}]"#);
            r.headers.push(("Link", r#"<http://backend/api/admin/users?query=next&page=2>; rel="next""#.into()));
            r
        }
        "/api/admin/users" if query.contains("page=2") => {
            let mut r = json("200 OK", r#"{"users":[{"name":"Ann","email":"ann@example.org","is_new":true,"is_active":false}]}"#);
            r.headers.push((
                "Link",
                r#"<http://backend/api/admin/users?contest_id=c1&page=1>; rel="prev", <http://backend/api/admin/users?contest_id=c1&page=3>; rel="next", <http://backend/api/admin/users?contest_id=c1&page=7>; rel="last""#.into(),
            ));
            r
        }
        "/api/admin/users" => json("200 OK", r#"[{"name":"Cy","email":"cy@example.org","age":40}]"#),
        "/api/admin/users/histogram" => json("422 Unprocessable Entity", r#"{"errors":["bin_count must be greater than 1."]}"#),
        "/api/admin/dailywalk/histogram" => json(
            "200 OK",
            r#"{"data":[{"bin_idx":0,"bin_start":0,"bin_end":5000,"count":3},{"bin_idx":1,"bin_start":5000,"bin_end":10000,"count":9}],"unit":"steps","bin_size":5000}"#,
        ),
        "/api/admin/home/distance/daily" => json("200 OK", r#"[["Date","Count"],["2023-04-01T00:00:00",16090.0]]"#),
        "/api/admin/users/zip/steps" => json("200 OK", r#"{"all":4000.0,"94110":5000.0,"94112":null}"#),
        _ => json("404 Not Found", ""),
    }
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|l| {
            let (k, v) = l.split_once(':')?;
            k.trim().eq_ignore_ascii_case("content-length").then(|| v.trim().parse().ok()).flatten()
        })
        .unwrap_or(0)
}

/// Minimal HTTP/1.1 server answering from `route`, one request per connection.
async fn spawn_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else { break };
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match sock.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let head_end = buf.windows(4).position(|w| w == b"\r\n\r\n").map_or(buf.len(), |i| i + 4);
                let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
                // drain the body so closing the socket does not reset the connection
                let want = head_end + content_length(&head);
                while buf.len() < want {
                    match sock.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let body = String::from_utf8_lossy(&buf[head_end.min(buf.len())..]).to_string();
                let mut words = head.split_whitespace();
                let method = words.next().unwrap_or("GET").to_string();
                let target = words.next().unwrap_or("/").to_string();
                let reply = route(&method, &target, &head, &body);
                let mut out = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n", reply.status, reply.body.len());
                for (k, v) in &reply.headers {
                    out.push_str(&format!("{k}: {v}\r\n"));
                }
                out.push_str("\r\n");
                out.push_str(&reply.body);
                let _ = sock.write_all(out.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}

fn client(base: &str, session: Option<&str>) -> ApiClient {
    ApiClient::new(&ApiConfig { base_url: base.into(), session_cookie: session.map(String::from), timeout_secs: 5 }).unwrap()
}

#[tokio::test]
async fn me_is_none_without_session() {
    let base = spawn_backend().await;
    assert_eq!(client(&base, None).me().await.unwrap(), None);
    let me = client(&base, Some("good")).me().await.unwrap().unwrap();
    assert_eq!(me.display_name(), "Ada Lovelace");
}

#[tokio::test]
async fn unauthorized_is_a_typed_result() {
    let base = spawn_backend().await;
    let err = client(&base, None).home().await.unwrap_err();
    assert!(err.is_unauthenticated());
}

#[tokio::test]
async fn gateway_failure_is_unavailable() {
    let base = spawn_backend().await;
    let err = client(&base, None).contests().await.unwrap_err();
    assert!(matches!(err, DashboardError::Unavailable(_)));
    assert_eq!(err.user_message(), "Oops! Something went wrong. Please try again later.");
}

#[tokio::test]
async fn users_page_reads_last_link() {
    let base = spawn_backend().await;
    let q = UsersQuery { contest_id: Some("c1".into()), ..Default::default() }.with_page(2);
    let page = client(&base, None).users(&q).await.unwrap();
    assert_eq!(page.page, 2);
    assert_eq!(page.last_page, LastPageHint::Exact(7));
    assert_eq!(page.users[0].is_new, Some(true));
    assert_eq!(page.links.len(), 3);
}

#[tokio::test]
async fn users_next_only_is_approximate() {
    let base = spawn_backend().await;
    let q = UsersQuery::default().with_search("next");
    let page = client(&base, None).users(&q).await.unwrap();
    assert_eq!(page.last_page, LastPageHint::AtLeast(2));
}

#[tokio::test]
async fn users_without_link_is_single_page() {
    let base = spawn_backend().await;
    let page = client(&base, None).users(&UsersQuery::default()).await.unwrap();
    assert_eq!(page.last_page, LastPageHint::Exact(1));
    assert_eq!(page.users[0].age, Some(40));
}

#[tokio::test]
async fn backend_validation_maps_to_invalid_input() {
    let base = spawn_backend().await;
    let q = HistogramQuery::new(HistogramPath::Users, "age", BinSpec::Count(4));
    let err = client(&base, None).histogram(&q).await.unwrap_err();
    assert!(matches!(err, DashboardError::InvalidInput(ref body) if body.contains("bin_count")));
    assert_eq!(err.user_message(), "Oops! Invalid input.");
}

#[tokio::test]
async fn invalid_bins_never_reach_the_backend() {
    // nothing listens on port 9; a request would be Unavailable, not InvalidInput
    let c = client("http://127.0.0.1:9", None);
    let q = HistogramQuery::new(HistogramPath::Users, "age", BinSpec::Count(1));
    assert!(matches!(c.histogram(&q).await, Err(DashboardError::InvalidInput(_))));
}

#[tokio::test]
async fn histogram_feeds_transform() {
    let base = spawn_backend().await;
    let q = HistogramQuery::new(HistogramPath::DailyWalk, "steps", BinSpec::Size(5000))
        .with_scope(QueryScope::Contest("c1".into()));
    let resp = client(&base, None).histogram(&q).await.unwrap();
    let table = transform(&resp.data, &q.field);
    assert_eq!(table.to_rows()[1], ("0-4999".to_string(), "3".to_string()));
    assert_eq!(table.to_rows()[2], (">5000".to_string(), "9".to_string()));
    assert_eq!(resp.unit, "steps");
}

#[tokio::test]
async fn distance_graph_is_in_miles() {
    let base = spawn_backend().await;
    let s = client(&base, None).home_graph(GraphMetric::DistanceDaily, &QueryScope::All, false).await.unwrap();
    assert_eq!(s.points.len(), 1);
    assert_eq!(s.points[0].value, 10.0);
}

#[tokio::test]
async fn median_steps_by_zip() {
    let base = spawn_backend().await;
    let m = client(&base, None).users_by_zip_median_steps(Some("c1"), false).await.unwrap();
    assert_eq!(m.all, Some(4000.0));
    assert_eq!(m.by_zip.get("94112"), Some(&None));
}

#[tokio::test]
async fn unknown_endpoint_is_not_found() {
    let base = spawn_backend().await;
    let err = client(&base, None).users_by_zip(None, false).await.unwrap_err();
    assert!(matches!(err, DashboardError::NotFound(_)));
}

#[tokio::test]
async fn all_users_follows_next_links_until_exact_last() {
    let base = spawn_backend().await;
    let users = client(&base, None).all_users(&UsersQuery::default().with_search("chain")).await.unwrap();
    let names: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["chain1", "chain2", "chain3"]);
}

#[tokio::test]
async fn all_users_stops_on_an_empty_page() {
    let base = spawn_backend().await;
    let users = client(&base, None).all_users(&UsersQuery::default().with_search("runaway")).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "Di");
}

#[tokio::test]
async fn custom_bins_with_empty_top_bucket_decode() {
    let base = spawn_backend().await;
    let q = HistogramQuery::new(HistogramPath::Users, "age", BinSpec::Custom(vec![18, 30, 45, 60]));
    let resp = client(&base, None).histogram(&q).await.unwrap();
    let table = transform(&resp.data, &q.field);
    assert_eq!(table.rows.last().unwrap().label, ">60");
    assert_eq!(table.rows.last().unwrap().count, 0);
}

#[tokio::test]
async fn distance_histogram_has_float_bins() {
    let base = spawn_backend().await;
    let q = HistogramQuery::new(HistogramPath::IntentionalWalk, "distance", BinSpec::Count(4));
    let resp = client(&base, None).histogram(&q).await.unwrap();
    assert_eq!(resp.bin_size, Some(3.0));
    let labels: Vec<String> = transform(&resp.data, &q.field).rows.into_iter().map(|r| r.label).collect();
    assert_eq!(labels, vec!["0-2", "3-5", ">6"]);
}

#[tokio::test]
async fn survey_upload_posts_the_form() {
    let base = spawn_backend().await;
    let survey = SurveyUpload::new("survey.csv", SURVEY.as_bytes().to_vec(), "Email address", "ID").unwrap();
    let out = client(&base, Some("good")).export_users_with_ids("c1", false, &survey).await.unwrap();
    assert!(String::from_utf8(out).unwrap().contains("S-1"));
}

#[tokio::test]
async fn survey_upload_joins_locally_when_post_is_refused() {
    let base = spawn_backend().await;
    let survey = SurveyUpload::new("survey.csv", SURVEY.as_bytes().to_vec(), "0", "1").unwrap();
    let out = client(&base, Some("good")).export_users_with_ids("legacy", false, &survey).await.unwrap();
    let expected = merge_survey_ids(CONTEST_EXPORT.as_bytes(), SURVEY.as_bytes(), survey.columns).unwrap();
    assert_eq!(out, expected);
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().nth(1), Some("Ann,ANN@example.org,31,S-1"));
}

#[tokio::test]
async fn contest_export_requires_a_contest() {
    let c = client("http://127.0.0.1:9", None);
    assert!(matches!(c.contest_users_csv("", false).await, Err(DashboardError::InvalidInput(_))));
}

#[test]
fn exports_land_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let users = vec![UserRow { name: "Ann".into(), email: "ann@example.org".into(), age: Some(31), ..Default::default() }];
    let csv = dir.path().join("users.csv");
    export_users_csv(&csv, &users).unwrap();
    let text = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.lines().nth(1).unwrap().starts_with("Ann,ann@example.org,31,"));

    let table = transform(&[HistogramBin { bin_idx: None, bin_start: 18.0, bin_end: Some(30.0), count: 2 }], "age");
    let hist = dir.path().join("age.csv");
    export_histogram_csv(&hist, &table).unwrap();
    assert_eq!(std::fs::read_to_string(&hist).unwrap(), "Age,Count\n>18,2\n");

    let json_path = dir.path().join("users.json");
    export_json(&json_path, &users).unwrap();
    let back: Vec<UserRow> = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(back, users);
}
