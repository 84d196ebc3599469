use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use phone_shell::actor::content::configured_source;
use phone_shell::actor::dock::{self, DockLayout};
use phone_shell::actor::gesture::PointerEvent;
use phone_shell::actor::overlay::{KeyPress, OverlayController, OverlayHandle};
use phone_shell::actor::visibility;
use phone_shell::common::config::{Config, config_file};
use phone_shell::common::log;
use phone_shell::model::nav::Action;
use phone_shell::model::{Locale, ModalState, SheetState};
use phone_shell::sys::geometry::Size;
use phone_shell::sys::host::{HostPage, HostSurface, LayoutSnapshot};
use phone_shell::sys::time::SystemClock;
use phone_shell::ui::chrome::ChromeControl;
use phone_shell::ui::hosts::Dismiss;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

const DEFAULT_VIEWPORT: Size = Size::new(1280.0, 800.0);
const SETTLE: Duration = Duration::from_millis(20);

#[derive(Parser)]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Check the configuration file and exit.
    #[arg(long)]
    validate: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the visibility policy and launcher offset for a page layout.
    Inspect {
        /// Current page path, e.g. /store/checkout.
        #[arg(long)]
        route: String,
        /// JSON layout snapshot of the host page.
        #[arg(long, value_name = "FILE")]
        layout: PathBuf,
    },
    /// Drive the overlay from line commands on stdin, printing each frame.
    Run {
        #[arg(long, default_value = "/")]
        route: String,
        #[arg(long, value_name = "FILE")]
        layout: Option<PathBuf>,
        /// Host page language, e.g. es-MX.
        #[arg(long)]
        lang: Option<String>,
    },
}

enum Line {
    Action(Action),
    Key(String),
    Press(ChromeControl),
    Dismiss(Dismiss),
    Swipe(f64),
    Route(String),
    Lang(String),
    Quit,
}

fn parse_line(line: &str) -> anyhow::Result<Option<Line>> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    let line = match (cmd, arg) {
        ("open", None) => Line::Action(Action::OpenPhone),
        ("close", None) => Line::Action(Action::ClosePhone),
        ("lock", None) => Line::Action(Action::LockPhone),
        ("unlock", None) => Line::Action(Action::UnlockPhone),
        ("home", None) => Line::Action(Action::GoHome),
        ("pop", None) => Line::Action(Action::PopRoute),
        ("touch", None) => Line::Action(Action::Touch),
        ("back", None) => Line::Press(ChromeControl::Back),
        ("sheet", Some(id)) => Line::Action(Action::SetSheet(Some(SheetState {
            id: id.to_string(),
            title: None,
            payload: serde_json::Value::Null,
        }))),
        ("modal", Some(id)) => Line::Action(Action::SetModal(Some(ModalState {
            id: id.to_string(),
            title: None,
            body: None,
            dismissible: words.next() != Some("sticky"),
        }))),
        ("dismiss", Some(what)) => Line::Dismiss(match what {
            "sheet" => Dismiss::Sheet,
            "modal" => Dismiss::Modal,
            "backdrop" => Dismiss::ModalBackdrop,
            _ => bail!("dismiss takes sheet, modal or backdrop, not '{what}'"),
        }),
        ("app", Some(id)) => Line::Action(Action::OpenApp {
            app_id: id.to_string(),
            view: words.next().map(str::to_string),
            params: None,
        }),
        ("locale", Some(tag)) => {
            let locale: Locale = tag.parse().with_context(|| format!("unknown locale '{tag}'"))?;
            Line::Action(Action::SetLocale(locale))
        }
        ("key", Some(key)) => Line::Key(key.to_string()),
        ("swipe", Some(dy)) => Line::Swipe(dy.parse().with_context(|| format!("bad swipe distance '{dy}'"))?),
        ("route", Some(path)) => Line::Route(path.to_string()),
        ("lang", Some(tag)) => Line::Lang(tag.to_string()),
        ("quit" | "exit", None) => Line::Quit,
        _ => bail!("unrecognized command: {line}"),
    };
    Ok(Some(line))
}

fn swipe(handle: &OverlayHandle, dy: f64) {
    let start = DEFAULT_VIEWPORT.height / 2.0;
    handle.pointer(PointerEvent::Down { y: start });
    handle.pointer(PointerEvent::Move { y: start + dy / 2.0 });
    handle.pointer(PointerEvent::Up { y: start + dy });
}

fn load_page(layout: Option<&Path>) -> anyhow::Result<HostPage> {
    Ok(match layout {
        Some(path) => HostPage::from_snapshot(
            LayoutSnapshot::read(path).with_context(|| format!("reading layout {}", path.display()))?,
        ),
        None => HostPage::new(DEFAULT_VIEWPORT),
    })
}

fn inspect(config: &Config, route: &str, layout: &Path) -> anyhow::Result<()> {
    let page = load_page(Some(layout))?;
    let policy = visibility::evaluate(&config.settings.visibility, route, &page);
    let dock = DockLayout {
        hidden: !policy.enabled,
        offset: dock::resolve(&config.settings.dock, &page),
    };
    let report = json!({ "policy": policy, "dock": dock, "viewport": page.viewport() });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn drive(config: Config, route: String, layout: Option<PathBuf>, lang: Option<String>) -> anyhow::Result<()> {
    let page = Arc::new(load_page(layout.as_deref())?);
    let (route_tx, route_rx) = watch::channel(route);
    let content = configured_source(&config.settings);
    let controller = OverlayController::new(config, Arc::new(SystemClock), lang.as_deref());
    let token = CancellationToken::new();
    let (handle, _frames, task) = controller.spawn(page, route_rx, content, token.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let parsed = match parse_line(&line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e:#}");
                continue;
            }
        };
        match parsed {
            Line::Action(action) => handle.dispatch(action),
            Line::Key(key) => handle.key(KeyPress::new(key)),
            Line::Press(control) => handle.press(control),
            Line::Dismiss(how) => handle.dismiss(how),
            Line::Swipe(dy) => swipe(&handle, dy),
            Line::Route(path) => {
                route_tx.send_replace(path);
                // Give the visibility monitor a frame to react before printing.
                tokio::time::sleep(SETTLE).await;
            }
            Line::Lang(tag) => handle.host_language(tag),
            Line::Quit => break,
        }
        let Some(snapshot) = handle.snapshot().await else {
            break;
        };
        println!("{}", serde_json::to_string(&snapshot.frame)?);
    }

    handle.shutdown();
    token.cancel();
    task.await.context("overlay task panicked")?;
    Ok(())
}

fn main() {
    let opt = Cli::parse();
    log::init_logging();

    let config_path = opt.config.clone().or_else(config_file);
    let config = match config_path.as_deref().map(Config::read_or_default).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("{e:#}");
            process::exit(1);
        }
    };

    if opt.validate {
        let issues = config.validate();
        if issues.is_empty() {
            println!("Config validation passed");
        } else {
            for issue in issues {
                eprintln!("{issue}");
            }
            process::exit(1);
        }
        return;
    }

    let result = match opt.command {
        Some(Commands::Inspect { route, layout }) => inspect(&config, &route, &layout),
        Some(Commands::Run { route, layout, lang }) => block_on(drive(config, route, layout, lang)),
        None => block_on(drive(config, "/".to_string(), None, None)),
    };
    if let Err(e) = result {
        eprintln!("{e:#}");
        process::exit(1);
    }
}

fn block_on(fut: impl Future<Output = anyhow::Result<()>>) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting runtime")?
        .block_on(fut)
}
