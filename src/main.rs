mod config;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::KeyEvent;
use tokio::sync::mpsc;

use hoihoi_logs::{LogBuffer, SessionController, SessionStatus, SessionUpdate, write_export};
use hoihoi_remote::{Connector, WebSocketConnector};
use hoihoi_tui::{
    Action, AppState, Event, EventHandler, HelpOverlay, KeyBindings, KeyContext, LogViewerScreen,
    Screen, SessionView, TargetSelectScreen, Tui, install_panic_hook,
};

use crate::config::AppConfig;

/// How long quitting waits for the stop request to be sent
const STOP_FLUSH_LIMIT: Duration = Duration::from_secs(2);

/// hoihoi - tail Nutanix CVM logs live through a Log Hoihoi backend
#[derive(Parser, Debug)]
#[command(name = "hoihoi")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: platform config dir)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend URL, e.g. http://hoihoi.local:7776
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    /// CVM address to tail on
    #[arg(long)]
    host: Option<String>,

    /// Log name from the catalog (skips the picker)
    #[arg(long, value_name = "NAME")]
    log: Option<String>,

    /// Start tailing right away
    #[arg(long)]
    start: bool,

    /// Keep at most this many lines (0 = unlimited)
    #[arg(long)]
    max_lines: Option<usize>,

    /// Directory export files are written to
    #[arg(long, value_name = "DIR")]
    export_dir: Option<PathBuf>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.log_file.as_deref())?;

    let result = run_app(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

async fn run_app(args: Args) -> Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(url) = args.server {
        config.server.url = url;
    }
    if let Some(max_lines) = args.max_lines {
        config.buffer.max_lines = Some(max_lines);
    }
    let export_dir = args.export_dir.unwrap_or_else(|| config.export_dir());
    let host = args.host.or_else(|| config.tail.host.clone()).unwrap_or_default();
    let initial_log = args.log.or_else(|| config.tail.log.clone());

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();

    let mut state = AppState::new(
        std::mem::take(&mut config.logs),
        host,
        config.view_settings(),
        action_tx.clone(),
    );

    let buffer = LogBuffer::new(config.buffer_capacity());
    let (mut controller, mut transport_rx) =
        SessionController::new(config.client_config(), WebSocketConnector::new(), buffer);

    if let Some(name) = &initial_log {
        if !state.select_source_by_name(name) {
            anyhow::bail!("Log '{}' not found in the log catalog", name);
        }
        controller.change_target(state.selected_target());
        state.navigate_to(Screen::LogViewer);
        if args.start {
            let _ = action_tx.send(Action::StartTail);
        }
    }

    install_panic_hook();
    let mut tui = Tui::new()?;
    let mut events = EventHandler::new(Duration::from_millis(100));
    let keybindings = KeyBindings::new();

    render(&mut tui, &mut state, &controller)?;

    // Lines arrive faster than the terminal can usefully redraw; they are drawn on the next tick
    let mut lines_pending = false;

    loop {
        let redraw = tokio::select! {
            Some(event) = events.next() => {
                match event {
                    Event::Key(key) => {
                        dispatch_key(&state, &keybindings, &action_tx, &key);
                        true
                    }
                    Event::Tick => std::mem::take(&mut lines_pending),
                    Event::Resize(_, _) => true,
                    Event::Error(e) => {
                        state.show_error(e);
                        true
                    }
                }
            }

            Some(event) = transport_rx.recv() => {
                match controller.handle_event(event) {
                    SessionUpdate::Unchanged => false,
                    SessionUpdate::LinesAppended(_) => {
                        state.on_lines_appended(controller.buffer());
                        lines_pending = true;
                        false
                    }
                    SessionUpdate::StatusChanged(status) => {
                        report_status(&mut state, &controller, status);
                        true
                    }
                }
            }

            Some(action) = action_rx.recv() => {
                handle_action(&mut state, &mut controller, &export_dir, action);
                true
            }
        };

        if state.should_quit {
            break;
        }

        if redraw {
            lines_pending = false;
            render(&mut tui, &mut state, &controller)?;
        }
    }

    // The stop request must reach the backend before the runtime goes away
    events.shutdown();
    controller.shutdown(STOP_FLUSH_LIMIT).await;
    tui.restore()?;

    Ok(())
}

fn dispatch_key(
    state: &AppState,
    keybindings: &KeyBindings,
    action_tx: &mpsc::UnboundedSender<Action>,
    key: &KeyEvent,
) {
    let action = if state.ui_state.search_active && state.current_screen == Screen::LogViewer {
        keybindings.get_filter_input_action(key)
    } else {
        let context = match state.current_screen {
            Screen::TargetSelect => KeyContext::ListNavigation,
            Screen::LogViewer => KeyContext::LogViewer,
        };
        keybindings.get_action(context, key)
    };

    let Some(action) = action else {
        return;
    };

    if state.ui_state.help_visible {
        match action {
            Action::ToggleHelp | Action::GoBack => {
                let _ = action_tx.send(Action::ToggleHelp);
            }
            Action::Quit => {
                let _ = action_tx.send(Action::Quit);
            }
            _ => {}
        }
        return;
    }

    if state.ui_state.notice.is_some() {
        let _ = action_tx.send(Action::DismissNotice);
    }
    let _ = action_tx.send(action);
}

/// Surface session transitions as notices
fn report_status<C: Connector>(
    state: &mut AppState,
    controller: &SessionController<C>,
    status: SessionStatus,
) {
    match (status, controller.last_error()) {
        (_, Some(err)) => state.show_error(err.to_string()),
        (SessionStatus::Active, None) => {
            let name = controller
                .session_target()
                .map(|t| t.source_name.as_str())
                .unwrap_or_default();
            state.show_notice(format!("Tailing {}", name));
        }
        _ => {}
    }
}

fn handle_action<C: Connector>(
    state: &mut AppState,
    controller: &mut SessionController<C>,
    export_dir: &Path,
    action: Action,
) {
    match action {
        Action::Quit => {
            state.should_quit = true;
        }
        Action::GoBack => {
            if !state.go_back() {
                state.should_quit = true;
            }
        }
        Action::ListUp => {
            state.list_up();
        }
        Action::ListDown => {
            state.list_down();
        }
        Action::ListSelect => {
            if state.current_screen == Screen::TargetSelect {
                if let Some(index) = state.selected_index() {
                    let _ = state.action_tx.send(Action::SelectSource(index));
                }
            }
        }
        Action::SelectSource(index) => {
            if !state.select_source(index) {
                return;
            }
            let target = state.selected_target();
            let running_other = controller
                .session_target()
                .is_some_and(|running| running.source_name != target.source_name);
            controller.change_target(target);
            if running_other {
                state.show_notice("Stop and start again to switch logs");
            }
            // Return to the viewer we came from, or open it
            let came_from_viewer = state.screen_stack.last() == Some(&Screen::LogViewer);
            if !(came_from_viewer && state.go_back()) {
                state.navigate_to(Screen::LogViewer);
            }
        }
        Action::OpenTargetPicker => {
            state.navigate_to(Screen::TargetSelect);
        }

        // Session
        Action::StartTail => start_tail(state, controller),
        Action::ToggleTail => {
            if controller.is_running() {
                controller.stop();
                state.show_notice("Stopped");
            } else {
                start_tail(state, controller);
            }
        }
        Action::ClearLogs => {
            controller.clear();
            state.on_buffer_cleared(controller.buffer());
        }
        Action::ExportLogs => {
            let lines = controller.buffer().all();
            let now = chrono::Local::now().naive_local();
            match write_export(export_dir, &state.export_prefix(), &lines, now) {
                Ok(summary) => {
                    state.show_notice(format!(
                        "Exported {} lines to {}",
                        summary.lines,
                        summary.path.display()
                    ));
                }
                Err(e) => {
                    tracing::warn!("export failed: {}", e);
                    state.show_error(format!("Export failed: {}", e));
                }
            }
        }

        // Filter
        Action::OpenSearch => {
            state.start_search();
        }
        Action::CloseSearch => {
            state.cancel_search();
        }
        Action::SearchInput(c) => {
            state.search_input_char(c);
        }
        Action::SearchBackspace => {
            state.search_input_backspace();
        }
        Action::SearchClear => {
            state.ui_state.search_input.clear();
        }
        Action::ApplyFilter => {
            state.apply_filter();
        }
        Action::ClearFilter => {
            state.clear_filter();
        }

        // Scrolling
        Action::ScrollUp(n) => state.scroll_up(n),
        Action::ScrollDown(n) => state.scroll_down(n),
        Action::ScrollToTop => state.scroll_to_top(),
        Action::ScrollToBottom => state.scroll_to_bottom(),
        Action::PageUp => state.page_up(),
        Action::PageDown => state.page_down(),
        Action::ToggleAutoScroll => state.toggle_auto_scroll(),
        Action::ToggleSourceNames => {
            state.ui_state.show_source_names = !state.ui_state.show_source_names;
        }

        Action::ToggleHelp => {
            state.ui_state.help_visible = !state.ui_state.help_visible;
        }
        Action::DismissNotice => {
            state.dismiss_notice();
        }
    }
}

fn start_tail<C: Connector>(state: &mut AppState, controller: &mut SessionController<C>) {
    let target = state.selected_target();
    match controller.start(target) {
        Ok(()) => {
            if let Some(err) = controller.last_error() {
                state.show_error(err.to_string());
            } else if controller.status() == SessionStatus::Connecting {
                let url = &controller.config().base_url;
                state.show_notice(format!("Connecting to {}", url));
            }
        }
        Err(e) => {
            state.show_error(e.to_string());
        }
    }
}

fn render<C: Connector>(
    tui: &mut Tui,
    state: &mut AppState,
    controller: &SessionController<C>,
) -> Result<()> {
    let session = SessionView {
        status: controller.status(),
        running: controller.is_running(),
        target: controller.session_target().unwrap_or(controller.target()),
        last_error: controller.last_error().map(|e| e.to_string()),
        buffer: controller.buffer(),
    };

    tui.terminal().draw(|frame| {
        match state.current_screen {
            Screen::TargetSelect => TargetSelectScreen::render(frame, state),
            Screen::LogViewer => LogViewerScreen::render(frame, state, &session),
        }

        if state.ui_state.help_visible {
            HelpOverlay::render(frame);
        }
    })?;

    Ok(())
}
