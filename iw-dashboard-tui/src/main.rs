mod tui;

use clap::{Args, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::{io, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tui::app::{App, Focus};
use tui::events::handle_key;
use tui::fetch::{dispatch, Delivery};
use tui::session::Session;
use tui::ui::render;
use iw_dashboard_common::{Config, LoggingConfig};
use iw_dashboard_core::export::{
    export_histogram_csv, export_json, export_users_csv, print_histogram, print_summary, print_users_page,
};
use iw_dashboard_core::histogram::{chart_title, transform};
use iw_dashboard_core::query::field_unit;
use iw_dashboard_core::series::HomeSummary;
use iw_dashboard_core::survey::{CONTEST_EXPORT_FILE, SURVEY_EXPORT_FILE};
use iw_dashboard_core::{
    ApiClient, BinSpec, HistogramPath, HistogramQuery, OrderBy, QueryScope, SurveyUpload, UsersQuery,
};

#[derive(Parser)]
#[command(name = "iw-dashboard", version, about = "Admin dashboard for the walking contest backend")]
struct Cli {
    /// Backend base URL, overrides [api] base_url
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Value of the `sessionid` cookie, overrides [api] session_cookie
    #[arg(long, global = true)]
    session: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive dashboard (default)
    Tui,
    /// One page of the users listing
    Users {
        #[command(flatten)]
        filter: UsersArgs,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        json: bool,
    },
    /// Histogram of one field
    Histogram {
        #[command(flatten)]
        hist: HistogramArgs,
        #[arg(long)]
        json: bool,
    },
    /// Headline totals and contests
    Summary {
        #[arg(long)]
        save: bool,
    },
    /// List contests
    Contests,
    Export {
        #[command(subcommand)]
        target: ExportTarget,
    },
    /// Print shell completions
    Completions { shell: clap_complete::Shell },
}

#[derive(Subcommand)]
enum ExportTarget {
    /// Contest-wide users CSV from the backend, with daily steps
    Contest {
        #[arg(long)]
        contest: String,
        #[arg(long)]
        tester: bool,
        #[arg(long)]
        output: Option<String>,
    },
    /// Contest users CSV with IDs joined from a survey CSV by email
    Survey {
        #[arg(long)]
        contest: String,
        /// Survey CSV containing an email and an ID column
        #[arg(long)]
        file: PathBuf,
        /// Email column, by header name or zero-based index
        #[arg(long)]
        email_col: String,
        /// ID column, by header name or zero-based index
        #[arg(long)]
        id_col: String,
        #[arg(long)]
        tester: bool,
        #[arg(long)]
        output: Option<String>,
    },
    /// Every page of the users listing
    Users {
        #[command(flatten)]
        filter: UsersArgs,
        #[arg(long)]
        format: Option<String>,
        #[arg(long)]
        output: Option<String>,
    },
    Histogram {
        #[command(flatten)]
        hist: HistogramArgs,
        #[arg(long)]
        format: Option<String>,
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Args, Clone)]
struct UsersArgs {
    #[arg(long)]
    contest: Option<String>,
    #[arg(long)]
    query: Option<String>,
    /// Sort field, `-field` for descending
    #[arg(long, allow_hyphen_values = true)]
    order_by: Option<String>,
    #[arg(long)]
    tester: bool,
}

impl UsersArgs {
    fn to_query(&self) -> UsersQuery {
        UsersQuery {
            contest_id: self.contest.clone(),
            is_tester: self.tester,
            order_by: self.order_by.as_deref().and_then(OrderBy::parse),
            query: self.query.clone().filter(|q| !q.trim().is_empty()),
            page: 1,
        }
    }
}

#[derive(Args, Clone)]
struct HistogramArgs {
    /// users | dailywalk | intentionalwalk | leaderboard
    path: String,
    /// age | steps | distance
    field: String,
    #[arg(long, conflicts_with_all = ["bin_count", "bin_custom"])]
    bin_size: Option<u32>,
    #[arg(long, conflicts_with = "bin_custom")]
    bin_count: Option<u32>,
    /// Comma separated bin edges, e.g. 18,30,45,60
    #[arg(long)]
    bin_custom: Option<String>,
    #[arg(long, conflicts_with_all = ["start", "end"])]
    contest: Option<String>,
    #[arg(long, requires = "end")]
    start: Option<chrono::NaiveDate>,
    #[arg(long, requires = "start")]
    end: Option<chrono::NaiveDate>,
    #[arg(long)]
    tester: bool,
}

impl HistogramArgs {
    fn to_query(&self) -> anyhow::Result<HistogramQuery> {
        let path = HistogramPath::parse(&self.path)?;
        let bins = match (self.bin_size, self.bin_count, self.bin_custom.as_deref()) {
            (Some(n), _, _) => BinSpec::Size(n),
            (_, Some(n), _) => BinSpec::Count(n),
            (_, _, Some(s)) => BinSpec::parse_custom(s)?,
            _ => anyhow::bail!("one of --bin-size, --bin-count or --bin-custom is required"),
        };
        let scope = match (&self.contest, self.start, self.end) {
            (Some(id), _, _) => QueryScope::Contest(id.clone()),
            (None, Some(start), Some(end)) => QueryScope::DateRange { start, end },
            _ => QueryScope::All,
        };
        let mut q = HistogramQuery::new(path, self.field.clone(), bins).with_scope(scope);
        q.is_tester = self.tester;
        q.validate()?;
        Ok(q)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load().unwrap_or_default();
    if let Some(url) = cli.base_url { config.api.base_url = url; }
    if let Some(s) = cli.session { config.api.session_cookie = Some(s); }
    let command = cli.command.unwrap_or(Commands::Tui);
    if let Commands::Completions { shell } = command {
        clap_complete::generate(shell, &mut Cli::command(), "iw-dashboard", &mut io::stdout());
        return Ok(());
    }
    let interactive = matches!(command, Commands::Tui);
    init_logging(&config.logging, interactive)?;
    let client = ApiClient::new(&config.api)?;
    match command {
        Commands::Tui => run_tui(client, config).await?,
        Commands::Users { filter, page, json } => run_users(&client, filter.to_query().with_page(page), json).await?,
        Commands::Histogram { hist, json } => run_histogram(&client, hist.to_query()?, json).await?,
        Commands::Summary { save } => run_summary(&client, save, &config).await?,
        Commands::Contests => run_contests(&client).await?,
        Commands::Export { target } => run_export(&client, target, &config).await?,
        Commands::Completions { .. } => {}
    }
    Ok(())
}

/// The TUI owns the terminal, so its logs go to a file; headless commands log to stderr.
fn init_logging(cfg: &LoggingConfig, to_file: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    if to_file {
        let path = cfg.log_path();
        if let Some(parent) = path.parent() { std::fs::create_dir_all(parent)?; }
        let file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(std::sync::Mutex::new(file)))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
    Ok(())
}

async fn run_tui(client: ApiClient, config: Config) -> anyhow::Result<()> {
    let today = chrono::Local::now().date_naive();
    let mut app = App::new(config, today);
    if let Some(s) = Session::load() { app.restore_from_session(&s); }
    if !client.has_session() {
        app.status_msg = "No session cookie configured".into();
    }
    app.start();

    // SIGTERM / SIGHUP still restore the terminal through the normal exit path
    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit = quit.clone();
        ctrlc::set_handler(move || quit.store(true, Ordering::SeqCst))?;
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel::<Delivery>();
    let tick = Duration::from_millis(66); // 15Hz
    let result = loop {
        for (ticket, req) in app.take_requests() {
            dispatch(&client, ticket, req, tx.clone());
        }
        while let Ok((ticket, result)) = rx.try_recv() {
            app.apply(ticket, result);
        }
        app.tick();
        if let Err(e) = terminal.draw(|f| render(f, &app)) { break Err(e.into()); }
        match poll_input(&mut app, tick) {
            Ok(()) => {}
            Err(e) => break Err(e),
        }
        if app.should_quit || quit.load(Ordering::SeqCst) { break Ok(()); }
    };
    if let Err(e) = app.to_session().save() {
        tracing::warn!(error = %e, "could not save session");
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    result
}

fn poll_input(app: &mut App, tick: Duration) -> anyhow::Result<()> {
    // event::poll blocks; keep it off the runtime's worker threads
    let ready = tokio::task::block_in_place(|| event::poll(tick))?;
    if !ready { return Ok(()); }
    match event::read()? {
        Event::Key(key) => handle_key(app, key),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollDown => {
                if app.focus == Focus::Sidebar { app.sidebar_down(); } else { app.scroll_users(1); }
            }
            MouseEventKind::ScrollUp => {
                if app.focus == Focus::Sidebar { app.sidebar_up(); } else { app.scroll_users(-1); }
            }
            _ => {}
        },
        _ => {}
    }
    Ok(())
}

async fn run_users(client: &ApiClient, query: UsersQuery, json: bool) -> anyhow::Result<()> {
    let page = client.users(&query).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&page.users)?);
    } else {
        print_users_page(&page);
    }
    Ok(())
}

async fn run_histogram(client: &ApiClient, query: HistogramQuery, json: bool) -> anyhow::Result<()> {
    let resp = client.histogram(&query).await?;
    let table = transform(&resp.data, &query.field);
    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }
    let unit = if resp.unit.is_empty() { field_unit(&query.field).unwrap_or("") } else { resp.unit.as_str() };
    print_histogram(&chart_title(query.path.as_str(), &query.field, unit), &table, 40);
    Ok(())
}

async fn run_summary(client: &ApiClient, save: bool, config: &Config) -> anyhow::Result<()> {
    let (home, contests) = tokio::try_join!(client.home(), client.contests())?;
    let summary = HomeSummary::from(&home);
    print_summary(&summary, &contests);
    if save {
        let out_dir = Path::new(&config.export.output_dir);
        std::fs::create_dir_all(out_dir)?;
        let out_path = out_dir.join("summary.json");
        let doc = serde_json::json!({ "home": home, "summary": summary, "contests": contests });
        export_json(&out_path, &doc)?;
        println!("Summary saved to {}", out_path.display());
    }
    Ok(())
}

async fn run_contests(client: &ApiClient) -> anyhow::Result<()> {
    let contests = client.contests().await?;
    if contests.is_empty() {
        println!("No contests.");
    }
    for c in &contests {
        println!("{:<38} {}", c.contest_id, c.label());
    }
    Ok(())
}

fn output_path(output: Option<String>, config: &Config, default_name: &str) -> anyhow::Result<PathBuf> {
    let out_path = match output {
        Some(o) => PathBuf::from(o),
        None => Path::new(&config.export.output_dir).join(default_name),
    };
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() { std::fs::create_dir_all(parent)?; }
    }
    Ok(out_path)
}

async fn run_export(client: &ApiClient, target: ExportTarget, config: &Config) -> anyhow::Result<()> {
    match target {
        ExportTarget::Contest { contest, tester, output } => {
            let bytes = client.contest_users_csv(&contest, tester).await?;
            let out_path = output_path(output, config, CONTEST_EXPORT_FILE)?;
            std::fs::write(&out_path, &bytes)?;
            println!("Exported contest {contest} to {}", out_path.display());
        }
        ExportTarget::Survey { contest, file, email_col, id_col, tester, output } => {
            let survey = SurveyUpload::from_path(&file, &email_col, &id_col)?;
            let bytes = client.export_users_with_ids(&contest, tester, &survey).await?;
            let out_path = output_path(output, config, SURVEY_EXPORT_FILE)?;
            std::fs::write(&out_path, &bytes)?;
            println!("Exported contest {contest} with survey IDs to {}", out_path.display());
        }
        ExportTarget::Users { filter, format, output } => {
            let format = format.unwrap_or_else(|| config.export.format.clone());
            let users = client.all_users(&filter.to_query()).await?;
            let out_path = output_path(output, config, &format!("users.{format}"))?;
            match format.as_str() {
                "json" => export_json(&out_path, &users)?,
                "csv" => export_users_csv(&out_path, &users)?,
                _ => anyhow::bail!("Unknown format: {format} (use json or csv)"),
            }
            println!("Exported {} users to {}", users.len(), out_path.display());
        }
        ExportTarget::Histogram { hist, format, output } => {
            let format = format.unwrap_or_else(|| config.export.format.clone());
            let query = hist.to_query()?;
            let resp = client.histogram(&query).await?;
            let table = transform(&resp.data, &query.field);
            let default_name = format!("{}-{}.{format}", query.path.as_str(), query.field);
            let out_path = output_path(output, config, &default_name)?;
            match format.as_str() {
                "json" => export_json(&out_path, &table)?,
                "csv" => export_histogram_csv(&out_path, &table)?,
                _ => anyhow::bail!("Unknown format: {format} (use json or csv)"),
            }
            println!("Exported to {}", out_path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn histogram_args_build_a_validated_query() {
        let cli = Cli::try_parse_from(["iw-dashboard", "histogram", "users", "age", "--bin-custom", "18,30,45", "--contest", "c1"]).unwrap();
        let Some(Commands::Histogram { hist, .. }) = cli.command else { panic!("expected histogram") };
        let q = hist.to_query().unwrap();
        assert_eq!(q.bins, BinSpec::Custom(vec![18, 30, 45]));
        assert_eq!(q.scope, QueryScope::Contest("c1".into()));
    }

    #[test]
    fn histogram_args_reject_bad_bins() {
        let cli = Cli::try_parse_from(["iw-dashboard", "histogram", "leaderboard", "steps", "--bin-count", "1"]).unwrap();
        let Some(Commands::Histogram { hist, .. }) = cli.command else { panic!("expected histogram") };
        assert!(hist.to_query().is_err());
        assert!(Cli::try_parse_from(["iw-dashboard", "histogram", "users", "age", "--bin-size", "5", "--bin-count", "3"]).is_err());
    }

    #[test]
    fn users_args_parse_order() {
        let cli = Cli::try_parse_from(["iw-dashboard", "users", "--order-by", "-dw_steps", "--page", "3"]).unwrap();
        let Some(Commands::Users { filter, page, .. }) = cli.command else { panic!("expected users") };
        let q = filter.to_query().with_page(page);
        assert_eq!(q.order_by.unwrap().as_param(), "-dw_steps");
        assert_eq!(q.page, 3);
    }

    #[test]
    fn survey_export_needs_both_columns() {
        let cli = Cli::try_parse_from([
            "iw-dashboard", "export", "survey", "--contest", "c1", "--file", "s.csv", "--email-col", "Email", "--id-col", "2",
        ])
        .unwrap();
        let Some(Commands::Export { target: ExportTarget::Survey { email_col, id_col, tester, .. } }) = cli.command else {
            panic!("expected survey export")
        };
        assert_eq!((email_col.as_str(), id_col.as_str(), tester), ("Email", "2", false));
        assert!(Cli::try_parse_from(["iw-dashboard", "export", "survey", "--contest", "c1", "--file", "s.csv"]).is_err());
    }

    #[test]
    fn output_path_defaults_to_export_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.export.output_dir = dir.path().join("out").to_string_lossy().into_owned();
        let p = output_path(None, &config, "users.csv").unwrap();
        assert!(p.ends_with("out/users.csv"));
        assert!(dir.path().join("out").is_dir());
    }
}
