use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Sparkline, Table, Wrap},
};
use iw_dashboard_core::auth::login_url;
use iw_dashboard_core::models::UserRow;
use iw_dashboard_core::pagination::page_query;
use iw_dashboard_core::series::{fmt_grouped, METERS_PER_MILE};
use iw_dashboard_core::PageLinkToken;
use crate::tui::app::{App, Focus, Load, View, USER_COLUMNS};
use crate::tui::theme::Theme;

pub fn render(frame: &mut Frame, app: &App) {
    let theme = &app.theme;
    let area = frame.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
        .split(area);
    render_topbar(frame, app, chunks[0], theme);
    // auto-hide the sidebar on narrow terminals
    let show_sidebar = app.sidebar_visible && area.width >= 80;
    let sidebar_w = if show_sidebar { app.sidebar_width } else { 0 };
    let mid = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(sidebar_w), Constraint::Min(0)])
        .split(chunks[1]);
    if show_sidebar { render_sidebar(frame, app, mid[0], theme); }
    render_main(frame, app, mid[1], theme);
    render_bottombar(frame, app, chunks[2], theme);
    match app.view {
        View::Help => render_help(frame, app, area),
        View::Login => render_login(frame, app, area, theme),
        _ => {}
    }
}

fn render_topbar(frame: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let who = match app.auth.user() {
        Some(me) => Span::styled(format!("[{}]", me.display_name()), Style::default().fg(theme.success)),
        None if app.auth.is_resolved() => Span::styled("[signed out]", Style::default().fg(theme.error)),
        None => Span::styled("[...]", Style::default().fg(theme.muted)),
    };
    let scope = match app.users_query.contest_id.as_deref() {
        Some(id) => app
            .contests
            .ready()
            .and_then(|cs| cs.iter().find(|c| c.contest_id == id))
            .map_or_else(|| format!("contest {id}"), |c| c.label()),
        None => "all contests".into(),
    };
    let testers = if app.show_testers { " | TESTERS" } else { "" };
    let info = format!(" {} | {}{testers}", app.config.api.base_url, scope);
    let line = Line::from(vec![who, Span::raw(info)]);
    frame.render_widget(Paragraph::new(line).style(Style::default().bg(theme.bg).fg(theme.fg)), area);
}

fn render_sidebar(frame: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let focused = app.focus == Focus::Sidebar;
    let block = Block::default().borders(Borders::ALL).title("Contests")
        .border_style(if focused { Style::default().fg(theme.highlight) } else { Style::default() });
    let inner_w = area.width.saturating_sub(4) as usize;
    let mut items = vec![ListItem::new(marker_line(app.users_query.contest_id.is_none(), "All contests", inner_w, theme))];
    match &app.contests {
        Load::Ready(contests) => items.extend(contests.iter().map(|c| {
            let active = app.users_query.contest_id.as_deref() == Some(c.contest_id.as_str());
            ListItem::new(marker_line(active, &c.label(), inner_w, theme))
        })),
        Load::Failed(msg) => items.push(ListItem::new(Span::styled(truncate(msg, inner_w), Style::default().fg(theme.error)))),
        Load::Loading | Load::Idle => items.push(ListItem::new(Span::styled("loading...", Style::default().fg(theme.muted)))),
    }
    let mut state = ListState::default();
    state.select(Some(app.sidebar_selected.min(items.len().saturating_sub(1))));
    let list = List::new(items).block(block).highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    frame.render_stateful_widget(list, area, &mut state);
}

fn marker_line(active: bool, label: &str, width: usize, theme: &Theme) -> Line<'static> {
    let mark = if active { Span::styled("\u{25cf} ", Style::default().fg(theme.accent)) } else { Span::raw("  ") };
    Line::from(vec![mark, Span::raw(truncate(label, width.saturating_sub(2)))])
}

fn render_main(frame: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let view = match app.view {
        View::Help | View::Login => app.prev_view,
        v => v,
    };
    match view {
        View::Users => render_users(frame, app, area, theme),
        View::Histogram => render_histogram(frame, app, area, theme),
        View::Zip => render_zip(frame, app, area, theme),
        _ => render_home(frame, app, area, theme),
    }
}

/// Message for a panel that has nothing to draw yet.
fn placeholder<T>(load: &Load<T>) -> Option<String> {
    match load {
        Load::Idle => Some("Press r to load.".into()),
        Load::Loading => Some("Loading...".into()),
        Load::Failed(msg) => Some(msg.clone()),
        Load::Ready(_) => None,
    }
}

fn render_placeholder(frame: &mut Frame, area: Rect, title: String, msg: String, theme: &Theme, failed: bool) {
    let style = if failed { Style::default().fg(theme.error) } else { Style::default().fg(theme.muted) };
    frame.render_widget(Paragraph::new(Span::styled(msg, style)).block(Block::default().borders(Borders::ALL).title(title)).wrap(Wrap { trim: false }), area);
}

fn render_home(frame: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);
    let headline = match &app.summary {
        Load::Ready(s) => Line::from(vec![
            Span::styled(s.users.clone(), Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
            Span::raw(" have walked "),
            Span::styled(s.steps.clone(), Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
            Span::raw(" / "),
            Span::styled(s.distance.clone(), Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
            Span::raw(" so far..."),
        ]),
        other => Line::from(placeholder(other).unwrap_or_default()),
    };
    frame.render_widget(Paragraph::new(headline).block(Block::default().borders(Borders::ALL).title("Overall (1)")), rows[0]);

    let Some(series) = app.graphs.ready() else {
        let failed = matches!(app.graphs, Load::Failed(_));
        render_placeholder(frame, rows[1], "Overall Trends".into(), placeholder(&app.graphs).unwrap_or_default(), theme, failed);
        return;
    };
    let grid = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(1, 3), Constraint::Ratio(1, 3)])
        .split(rows[1]);
    for (i, s) in series.iter().enumerate() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)])
            .split(grid[i / 2 % 3]);
        let cell = cols[i % 2];
        let latest = s.latest().map_or("-".into(), |p| fmt_grouped(p.value, if s.metric.is_distance() { 1 } else { 0 }));
        let title = format!("{} | latest {latest}", s.metric.title());
        if s.is_empty() {
            render_placeholder(frame, cell, title, "No data available.".into(), theme, false);
            continue;
        }
        // newest values on the right, clipped to what fits
        let values = s.sparkline_values();
        let fit = cell.width.saturating_sub(2) as usize;
        let visible = &values[values.len().saturating_sub(fit)..];
        frame.render_widget(
            Sparkline::default()
                .block(Block::default().borders(Borders::ALL).title(title))
                .data(visible)
                .style(Style::default().fg(theme.accent)),
            cell,
        );
    }
}

fn render_users(frame: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
        .split(area);
    let search = if app.searching {
        Line::from(vec![Span::styled(" / ", Style::default().fg(theme.highlight)), Span::raw(format!("{}_", app.search_input))])
    } else if !app.search_input.is_empty() {
        Line::from(format!(" search: {}  (Esc clears)", app.search_input))
    } else {
        Line::from(Span::styled(" / to search by name or email", Style::default().fg(theme.muted)))
    };
    frame.render_widget(Paragraph::new(search), rows[0]);

    let title = format!("Users (2) {}", page_query(app.pages.page, &app.users_query.filter_params()));
    match &app.users {
        Load::Ready(page) if !page.users.is_empty() => {
            let contest = app.users_query.contest_id.is_some();
            frame.render_widget(users_table(app, &page.users, contest, rows[1], theme, title), rows[1]);
        }
        Load::Ready(_) => render_placeholder(frame, rows[1], title, "No users found.".into(), theme, false),
        other => {
            let failed = matches!(other, Load::Failed(_));
            render_placeholder(frame, rows[1], title, placeholder(other).unwrap_or_default(), theme, failed);
        }
    }
    frame.render_widget(Paragraph::new(pagination_line(app, theme)), rows[2]);
}

fn users_table<'a>(app: &App, users: &'a [UserRow], contest: bool, area: Rect, theme: &Theme, title: String) -> Table<'a> {
    let order = app.users_query.order_by.as_ref();
    let mut headers: Vec<Cell> = USER_COLUMNS.iter().enumerate().map(|(i, (field, label))| {
        let arrow = match order {
            Some(o) if o.field == *field => if o.descending { "\u{25bc}" } else { "\u{25b2}" },
            _ => "",
        };
        let style = if i == app.sort_col { Style::default().fg(theme.highlight).add_modifier(Modifier::BOLD) } else { Style::default().add_modifier(Modifier::BOLD) };
        Cell::from(format!("{label}{arrow}")).style(style)
    }).collect();
    if contest {
        headers.push(Cell::from("New").style(Style::default().add_modifier(Modifier::BOLD)));
        headers.push(Cell::from("Active").style(Style::default().add_modifier(Modifier::BOLD)));
    }
    let height = area.height.saturating_sub(3) as usize;
    let opt = |v: Option<u64>| v.map_or("-".to_string(), |n| fmt_grouped(n as f64, 0));
    let rows: Vec<Row> = users.iter().skip(app.users_scroll).take(height).map(|u| {
        let mut cells = vec![
            Cell::from(truncate(&u.name, 22)),
            Cell::from(truncate(&u.email, 28)),
            Cell::from(u.age.map_or("-".into(), |a| a.to_string())),
            Cell::from(u.zip.clone().unwrap_or_else(|| "-".into())),
            Cell::from(u.signup_label()),
            Cell::from(opt(u.dw_count)),
            Cell::from(opt(u.dw_steps)),
            Cell::from(u.dw_distance.map_or("-".into(), |m| format!("{:.1}", m / METERS_PER_MILE))),
            Cell::from(opt(u.iw_count)),
            Cell::from(opt(u.iw_steps)),
            Cell::from(u.iw_time.map_or("-".into(), fmt_secs)),
        ];
        if contest {
            cells.push(flag_cell(u.is_new, theme));
            cells.push(flag_cell(u.is_active, theme));
        }
        Row::new(cells)
    }).collect();
    let mut widths = vec![
        Constraint::Min(16), Constraint::Min(20), Constraint::Length(4), Constraint::Length(6),
        Constraint::Length(13), Constraint::Length(5), Constraint::Length(10), Constraint::Length(7),
        Constraint::Length(6), Constraint::Length(9), Constraint::Length(8),
    ];
    if contest { widths.extend([Constraint::Length(4), Constraint::Length(7)]); }
    Table::new(rows, widths)
        .header(Row::new(headers))
        .block(Block::default().borders(Borders::ALL).title(title))
}

fn flag_cell(v: Option<bool>, theme: &Theme) -> Cell<'static> {
    match v {
        Some(true) => Cell::from("yes").style(Style::default().fg(theme.success)),
        Some(false) => Cell::from("no").style(Style::default().fg(theme.muted)),
        None => Cell::from("-"),
    }
}

fn pagination_line(app: &App, theme: &Theme) -> Line<'static> {
    let mut spans = vec![Span::raw(" ")];
    for token in app.pages.tokens() {
        let span = match token {
            PageLinkToken::Current(n) => Span::styled(format!("[{n}]"), Style::default().fg(theme.highlight).add_modifier(Modifier::BOLD)),
            PageLinkToken::Prev(None) | PageLinkToken::Next(None) => Span::styled(token.label(), Style::default().fg(theme.muted)),
            PageLinkToken::Ellipsis => Span::styled(token.label(), Style::default().fg(theme.muted)),
            _ => Span::raw(token.label()),
        };
        spans.push(span);
        spans.push(Span::raw(" "));
    }
    let exact = app.users.ready().map_or(true, |p| p.last_page.is_exact());
    if !exact {
        spans.push(Span::styled("(more pages may follow) ", Style::default().fg(theme.warning)));
    }
    spans.push(Span::styled("n/p page  g/G first/last  </> column  o order", Style::default().fg(theme.muted)));
    Line::from(spans)
}

fn render_histogram(frame: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let preset = app.histogram_presets.get(app.histogram_preset);
    let preset_label = preset.map_or(String::new(), |p| format!("{}/{}", p.path.as_str(), p.field));
    let nav = format!(" [{}/{}] {preset_label}  h/l preset", app.histogram_preset + 1, app.histogram_presets.len());
    let Some(h) = app.histogram.ready() else {
        let failed = matches!(app.histogram, Load::Failed(_));
        render_placeholder(frame, area, format!("Histogram (3){nav}"), placeholder(&app.histogram).unwrap_or_default(), theme, failed);
        return;
    };
    let title = format!("{} (3){nav}", h.title);
    if !h.table.has_data() {
        render_placeholder(frame, area, title, "No data available.".into(), theme, false);
        return;
    }
    let bars: Vec<Bar> = h.table.rows.iter().map(|r| {
        Bar::default().value(r.count).label(Line::from(r.label.clone())).text_value(r.count.to_string())
    }).collect();
    let n = bars.len().max(1) as u16;
    let bar_width = (area.width.saturating_sub(2) / n).saturating_sub(1).clamp(1, 12);
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(1)
        .bar_style(Style::default().fg(theme.accent))
        .value_style(Style::default().fg(theme.bg).bg(theme.accent));
    frame.render_widget(chart, area);
}

fn render_zip(frame: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let title = format!("{} (4)  m metric", app.zip_metric.title());
    let Some(z) = app.zip.ready() else {
        let failed = matches!(app.zip, Load::Failed(_));
        render_placeholder(frame, area, title, placeholder(&app.zip).unwrap_or_default(), theme, failed);
        return;
    };
    if z.cells.is_empty() {
        render_placeholder(frame, area, title, "No data available.".into(), theme, false);
        return;
    }
    let bar_w = area.width.saturating_sub(30) as usize;
    let rows: Vec<Row> = z.cells.iter().map(|c| {
        let filled = (c.ratio * bar_w as f64).round() as usize;
        Row::new([
            Cell::from(c.zip.clone()),
            Cell::from(fmt_grouped(c.value, 0)),
            Cell::from("\u{2588}".repeat(filled)).style(Style::default().fg(theme.heat(c.ratio))),
        ])
    }).collect();
    let header = Row::new(["Zip", "Value", "Intensity"].map(|h| Cell::from(h).style(Style::default().add_modifier(Modifier::BOLD))));
    let table = Table::new(rows, [Constraint::Length(8), Constraint::Length(12), Constraint::Min(10)])
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(format!("{title}  scale 0..{}", fmt_grouped(z.upper_limit, 0))));
    frame.render_widget(table, area);
}

fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let text = vec![
        Line::from(Span::styled("Keybindings", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  q        Quit"),
        Line::from("  ?        Toggle help"),
        Line::from("  Tab      Switch focus (contests / main)"),
        Line::from("  `        Toggle contest sidebar"),
        Line::from("  1 2 3 4  Home / Users / Histogram / Zip"),
        Line::from("  r        Reload current view"),
        Line::from("  t        Toggle testers"),
        Line::from("  E        Export current view to CSV"),
        Line::from("  j/k      Move / scroll"),
        Line::from("  Enter    Apply contest filter"),
        Line::from("  [ ]      Sidebar width"),
        Line::from(""),
        Line::from(Span::styled("Users", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  /        Search (applies after typing stops)"),
        Line::from("  n/p      Next / previous page"),
        Line::from("  g/G      First / last page"),
        Line::from("  < >      Select column"),
        Line::from("  o        Sort by column, again to reverse"),
        Line::from(""),
        Line::from(Span::styled("Histogram / Zip", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  h/l      Previous / next histogram"),
        Line::from("  m        Next zip metric"),
    ];
    let popup = centered_rect(50, 70, area);
    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(text).scroll((app.help_scroll as u16, 0)).block(Block::default().borders(Borders::ALL).title("Help (?)")), popup);
}

fn render_login(frame: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let popup = centered_rect(60, 30, area);
    frame.render_widget(Clear, popup);
    let text = vec![
        Line::from(Span::styled("Please log in to view this page.", Style::default().fg(theme.warning).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(format!("Sign in at {}", login_url(&app.config.api.base_url))),
        Line::from("then set [api] session_cookie or IW_DASHBOARD_SESSION."),
        Line::from(""),
        Line::from("Enter: retry   q: quit"),
    ];
    frame.render_widget(Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Login required")).wrap(Wrap { trim: false }), popup);
}

fn render_bottombar(frame: &mut Frame, app: &App, area: Rect, theme: &Theme) {
    let bar_text = format!(" {} | q:quit ?:help Tab:focus 1-4:views r:reload t:testers E:export", app.status_msg);
    frame.render_widget(Paragraph::new(bar_text).style(Style::default().bg(theme.bg).fg(theme.fg)), area);
}

fn centered_rect(px: u16, py: u16, r: Rect) -> Rect {
    let v = Layout::default().direction(Direction::Vertical).constraints([Constraint::Percentage((100-py)/2), Constraint::Percentage(py), Constraint::Percentage((100-py)/2)]).split(r);
    Layout::default().direction(Direction::Horizontal).constraints([Constraint::Percentage((100-px)/2), Constraint::Percentage(px), Constraint::Percentage((100-px)/2)]).split(v[1])[1]
}

fn fmt_secs(s: u64) -> String {
    if s < 60 { format!("{s}s") } else if s < 3600 { format!("{}m", s / 60) } else { format!("{:.1}h", s as f64 / 3600.0) }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max { s.to_owned() } else { format!("{}\u{2026}", s.chars().take(max.saturating_sub(1)).collect::<String>()) }
}
