use crate::tui::app::{QueryKey, Request, Response, ZipMetric};
use futures::future::try_join_all;
use iw_dashboard_core::{ApiClient, GraphMetric, Result, Ticket};
use std::sync::mpsc::Sender;

pub type Delivery = (Ticket<QueryKey>, Result<Response>);

/// Run `req` on the tokio runtime; the result comes back over `tx` tagged with its ticket.
pub fn dispatch(client: &ApiClient, ticket: Ticket<QueryKey>, req: Request, tx: Sender<Delivery>) {
    let client = client.clone();
    tokio::spawn(async move {
        let result = run(&client, req).await;
        // receiver gone means the UI already quit
        let _ = tx.send((ticket, result));
    });
}

pub async fn run(client: &ApiClient, req: Request) -> Result<Response> {
    match req {
        Request::Me => client.me().await.map(Response::Me),
        Request::Home => client.home().await.map(Response::Home),
        Request::Contests => client.contests().await.map(Response::Contests),
        Request::Graphs { scope, is_tester } => {
            let fetches = GraphMetric::ALL.iter().map(|m| client.home_graph(*m, &scope, is_tester));
            try_join_all(fetches).await.map(Response::Graphs)
        }
        Request::Users(q) => client.users(&q).await.map(Response::Users),
        Request::Histogram(q) => {
            let resp = client.histogram(&q).await?;
            Ok(Response::Histogram(q, resp))
        }
        Request::Zip { metric, contest_id, is_tester } => {
            let contest_id = contest_id.as_deref();
            match metric {
                ZipMetric::Signups => client.users_by_zip(contest_id, is_tester).await.map(Response::ZipCounts),
                ZipMetric::Active => client.users_by_zip_active(contest_id, is_tester).await.map(Response::ZipCounts),
                ZipMetric::MedianSteps => {
                    client.users_by_zip_median_steps(contest_id, is_tester).await.map(Response::ZipMedian)
                }
            }
        }
    }
}
