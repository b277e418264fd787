use crate::tui::app::{App, Focus, View};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use iw_dashboard_core::export::{export_histogram_csv, export_users_csv};
use std::path::PathBuf;

pub fn handle_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }
    // typed text goes to the search box before any shortcut
    if app.searching {
        handle_search(app, key);
        return;
    }
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('?') => {
            app.toggle_help();
            return;
        }
        KeyCode::Char('j') | KeyCode::Down if app.view == View::Help => {
            app.help_scroll += 1;
            return;
        }
        KeyCode::Char('k') | KeyCode::Up if app.view == View::Help => {
            app.help_scroll = app.help_scroll.saturating_sub(1);
            return;
        }
        KeyCode::Enter if app.view == View::Login => {
            app.retry_login();
            return;
        }
        _ if matches!(app.view, View::Help | View::Login) => {
            if key.code == KeyCode::Esc && app.view == View::Help {
                app.toggle_help();
            }
            return;
        }
        KeyCode::Tab => {
            app.cycle_focus();
            return;
        }
        KeyCode::Char('`') => {
            app.sidebar_visible = !app.sidebar_visible;
            return;
        }
        KeyCode::Char('1') => return app.set_view(View::Home),
        KeyCode::Char('2') => return app.set_view(View::Users),
        KeyCode::Char('3') => return app.set_view(View::Histogram),
        KeyCode::Char('4') => return app.set_view(View::Zip),
        KeyCode::Char('r') => {
            app.refresh();
            return;
        }
        KeyCode::Char('t') => {
            app.toggle_testers();
            return;
        }
        KeyCode::Char('E') => {
            export_current(app);
            return;
        }
        _ => {}
    }
    match app.focus {
        Focus::Sidebar => handle_sidebar(app, key),
        Focus::Main => handle_main(app, key),
    }
}

fn handle_search(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.searching = false,
        KeyCode::Enter => app.search_submit(),
        KeyCode::Backspace => app.search_pop(),
        KeyCode::Char(c) => app.search_push(c),
        _ => {}
    }
}

fn handle_sidebar(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('[') => {
            app.sidebar_width = app.sidebar_width.saturating_sub(1).max(15);
        }
        KeyCode::Char(']') => {
            app.sidebar_width = (app.sidebar_width + 1).min(60);
        }
        KeyCode::Char('j') | KeyCode::Down => app.sidebar_down(),
        KeyCode::Char('k') | KeyCode::Up => app.sidebar_up(),
        KeyCode::Enter => {
            app.select_contest();
            app.focus = Focus::Main;
        }
        KeyCode::Esc => app.focus = Focus::Main,
        _ => {}
    }
}

fn handle_main(app: &mut App, key: KeyEvent) {
    match app.view {
        View::Users => handle_users(app, key),
        View::Histogram => match key.code {
            KeyCode::Right | KeyCode::Char('l') => app.cycle_histogram(true),
            KeyCode::Left | KeyCode::Char('h') => app.cycle_histogram(false),
            _ => {}
        },
        View::Zip => {
            if key.code == KeyCode::Char('m') {
                app.cycle_zip_metric();
            }
        }
        View::Home | View::Help | View::Login => {}
    }
}

fn handle_users(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.scroll_users(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_users(-1),
        KeyCode::PageDown => app.scroll_users(10),
        KeyCode::PageUp => app.scroll_users(-10),
        KeyCode::Char('n') | KeyCode::Right => app.next_page(),
        KeyCode::Char('p') | KeyCode::Left => app.prev_page(),
        KeyCode::Char('g') => app.goto_page(1),
        KeyCode::Char('G') => app.last_page(),
        KeyCode::Char('/') => {
            app.searching = true;
        }
        KeyCode::Char('>') => app.sort_column_next(),
        KeyCode::Char('<') => app.sort_column_prev(),
        KeyCode::Char('o') => app.toggle_order(),
        KeyCode::Esc if !app.search_input.is_empty() => {
            app.search_input.clear();
            app.search.cancel();
            app.apply_search("");
        }
        _ => {}
    }
}

/// Write what the current view shows to `[export] output_dir`.
fn export_current(app: &mut App) {
    let out_dir = PathBuf::from(&app.config.export.output_dir);
    if let Err(e) = std::fs::create_dir_all(&out_dir) {
        app.status_msg = format!("export dir error: {e}");
        return;
    }
    let result = match app.view {
        View::Users => app.users.ready().map(|page| {
            let path = out_dir.join(format!("users-page-{}.csv", page.page));
            export_users_csv(&path, &page.users).map(|_| path)
        }),
        View::Histogram => app.histogram.ready().map(|h| {
            let preset = &app.histogram_presets[app.histogram_preset];
            let path = out_dir.join(format!("{}-{}.csv", preset.path.as_str(), preset.field));
            export_histogram_csv(&path, &h.table).map(|_| path)
        }),
        _ => None,
    };
    app.status_msg = match result {
        Some(Ok(path)) => format!("exported to {}", path.display()),
        Some(Err(e)) => format!("export error: {e}"),
        None => "nothing to export here".into(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use iw_dashboard_common::Config;

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn app() -> App {
        App::new(Config::default(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    }

    #[test]
    fn q_types_into_search_instead_of_quitting() {
        let mut a = app();
        a.set_view(View::Users);
        press(&mut a, KeyCode::Char('/'));
        press(&mut a, KeyCode::Char('q'));
        assert!(!a.should_quit);
        assert_eq!(a.search_input, "q");
        assert!(a.search.is_pending());
        press(&mut a, KeyCode::Esc);
        press(&mut a, KeyCode::Char('q'));
        assert!(a.should_quit);
    }

    #[test]
    fn number_keys_switch_views() {
        let mut a = app();
        press(&mut a, KeyCode::Char('3'));
        assert_eq!(a.view, View::Histogram);
        press(&mut a, KeyCode::Char('?'));
        assert_eq!(a.view, View::Help);
        press(&mut a, KeyCode::Char('2'));
        assert_eq!(a.view, View::Help);
        press(&mut a, KeyCode::Esc);
        assert_eq!(a.view, View::Histogram);
    }

    #[test]
    fn sidebar_width_is_clamped() {
        let mut a = app();
        a.focus = Focus::Sidebar;
        for _ in 0..100 {
            press(&mut a, KeyCode::Char(']'));
        }
        assert_eq!(a.sidebar_width, 60);
    }

    #[test]
    fn export_without_data_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = app();
        a.config.export.output_dir = dir.path().to_string_lossy().into_owned();
        press(&mut a, KeyCode::Char('E'));
        assert_eq!(a.status_msg, "nothing to export here");
    }
}
