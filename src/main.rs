use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Terminal,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fuzzwatch::app::{App, View};
use fuzzwatch::data::duration::parse_duration;
use fuzzwatch::probe::ResourceSampler;
use fuzzwatch::{
    events, ui, ApiServer, JsonExport, PollScheduler, Settings, SnapshotConsumer, SnapshotHandle,
    TextReport,
};

#[derive(Parser, Debug)]
#[command(name = "fuzzwatch")]
#[command(version, about = "Monitor for AFL/AFL++ fuzzing campaigns")]
struct Args {
    /// Campaign root: an AFL output directory or a single instance directory
    root: PathBuf,

    /// Config file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print one report and exit
    #[arg(long, conflicts_with_all = ["headless", "serve"])]
    once: bool,

    /// Write the campaign as JSON to this file (rewritten every cycle)
    #[arg(long)]
    json: Option<PathBuf>,

    /// Serve /api/stats and /health on this address (e.g. 127.0.0.1:8080)
    #[arg(long)]
    serve: Option<String>,

    /// Run without the terminal UI until interrupted
    #[arg(long)]
    headless: bool,

    /// Shell command run with a summary on stdin when new crashes appear
    #[arg(long)]
    notify: Option<String>,

    /// Include dead instances in campaign totals
    #[arg(long)]
    show_dead: bool,

    /// Poll interval (e.g. "5s", "500ms")
    #[arg(short, long)]
    interval: Option<String>,

    /// How recently a status file must change for an instance to count as starting
    #[arg(long)]
    recency_window: Option<String>,

    /// Directory for delta state between runs
    #[arg(long, conflicts_with = "no_state")]
    state_dir: Option<PathBuf>,

    /// Do not persist delta state between runs
    #[arg(long)]
    no_state: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write logs to this file (the terminal UI logs nowhere otherwise)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let mut settings = Settings::load(args.config.as_deref())
        .with_context(|| "Failed to load configuration")?;
    apply_args(&mut settings, &args)?;

    if args.once {
        return run_once(&args, &settings);
    }

    run_watch(&args, &settings)
}

/// Command-line flags override every other configuration layer.
fn apply_args(settings: &mut Settings, args: &Args) -> Result<()> {
    if let Some(ref interval) = args.interval {
        settings.interval = parse_duration(interval)?;
        if settings.interval.is_zero() {
            anyhow::bail!("Poll interval must be greater than zero");
        }
    }
    if let Some(ref window) = args.recency_window {
        settings.recency_window = parse_duration(window)?;
    }
    if args.show_dead {
        settings.show_dead = true;
    }
    if let Some(ref command) = args.notify {
        settings.notify_command = Some(command.clone());
    }
    if let Some(ref dir) = args.state_dir {
        settings.state_dir = Some(dir.clone());
    }
    if args.no_state {
        settings.persist_state = false;
    }
    if let Some(ref addr) = args.serve {
        settings.listen_addr = Some(addr.clone());
    }
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    let interactive = !args.once && !args.headless;
    let level = match args.verbose {
        0 if args.headless => "info",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fuzzwatch={}", level)));

    if let Some(ref path) = args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else if !interactive {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}

fn build_scheduler(args: &Args, settings: &Settings) -> PollScheduler {
    PollScheduler::builder(&args.root)
        .settings(settings)
        .sampler(Arc::new(ResourceSampler::new()))
        .build()
}

/// One cycle, one report. A root-level failure is returned as an error.
fn run_once(args: &Args, settings: &Settings) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut scheduler = build_scheduler(args, settings);
        scheduler.run_once().await?;
        let published = scheduler.handle().load();

        let mut report = TextReport::new(io::stdout());
        report.consume(&published)?;

        if let Some(ref path) = args.json {
            JsonExport::new(path).consume(&published)?;
        }
        Ok::<(), anyhow::Error>(())
    })
}

/// Keep polling until interrupted, feeding the TUI, server and export.
fn run_watch(args: &Args, settings: &Settings) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let mut scheduler = build_scheduler(args, settings);
    let snapshots = scheduler.handle();

    // The first cycle must succeed or there is nothing to show
    rt.block_on(scheduler.tick())?;
    let running = scheduler.start();

    let server = match settings.listen_addr {
        Some(ref addr) => {
            let server = rt.block_on(ApiServer::bind(addr, snapshots.clone()))?;
            info!(addr = %server.local_addr()?, "HTTP surface enabled");
            Some(server.spawn())
        }
        None => None,
    };

    let export = args
        .json
        .as_ref()
        .map(|path| spawn_consumer(Box::new(JsonExport::new(path)), snapshots.clone()));

    let result = if args.headless {
        info!(root = %args.root.display(), "Watching campaign, press Ctrl-C to stop");
        rt.block_on(tokio::signal::ctrl_c())
            .with_context(|| "Failed to wait for Ctrl-C")
    } else {
        run_tui(snapshots, args.root.clone(), settings.interval)
    };

    rt.block_on(running.shutdown())?;
    if let Some(task) = export {
        task.abort();
    }
    if let Some(task) = server {
        task.abort();
    }

    result
}

/// Feed every published view to a consumer until the task is aborted.
fn spawn_consumer(mut consumer: Box<dyn SnapshotConsumer>, snapshots: SnapshotHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut cycles = snapshots.subscribe();
        loop {
            if let Err(e) = consumer.consume(&snapshots.load()) {
                warn!(consumer = consumer.name(), error = %e, "Consumer failed");
            }
            if cycles.changed().await.is_err() {
                break;
            }
        }
    })
}

/// Run the TUI against the published view
fn run_tui(snapshots: SnapshotHandle, root: PathBuf, refresh_interval: Duration) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    let mut app = App::new(snapshots, root);
    let _ = app.reload_data();

    let result = run_app(&mut terminal, &mut app, refresh_interval);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    refresh_interval: Duration,
) -> Result<()> {
    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 12;

    // Redraw at least this often so the "Updated ... ago" age keeps moving
    let poll_timeout = refresh_interval.min(Duration::from_millis(100));

    while app.running {
        terminal.draw(|frame| {
            let area = frame.area();

            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let centered =
                    ratatui::layout::Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5);
                frame.render_widget(paragraph, centered);
                return;
            }

            let chunks = Layout::vertical([
                Constraint::Length(1), // Header bar
                Constraint::Length(1), // Tabs
                Constraint::Min(8),    // Content
                Constraint::Length(1), // Status bar
            ])
            .split(area);

            ui::common::render_header(frame, app, chunks[0]);
            ui::common::render_tabs(frame, app, chunks[1]);

            match app.current_view {
                View::Instances => ui::instances::render(frame, app, chunks[2]),
                View::Warnings => ui::warnings::render(frame, app, chunks[2]),
            }

            ui::common::render_status_bar(frame, app, chunks[3]);

            if app.show_detail_overlay {
                ui::detail::render_overlay(frame, app, area);
            }

            if app.show_help {
                ui::common::render_help(frame, app, area);
            }
        })?;

        if let Some(event) = events::poll_event(poll_timeout)? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => {
                    // Content starts after header (1) + tabs (1) + table header (1)
                    events::handle_mouse_event(app, mouse, 3);
                }
                Event::Resize(_, _) => {
                    // Terminal will redraw on next iteration
                }
                _ => {}
            }
        }

        // Cheap when nothing changed: compares the cycle counter
        app.reload_data();
    }

    Ok(())
}
