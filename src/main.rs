use std::fs;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use profview::bindings::MemoryView;
use profview::browser::{Browser, MemoryBrowser};
use profview::bus::ShellEvent;
use profview::config::Config;
use profview::logging::{self, obj, v_str, Domain};
use profview::render::{MemorySurfaces, RenderDispatcher, TextContent, TraceFileWriter, ViewMode};
use profview::shell::{Shell, ShellSettings};
use profview::transport::HttpTransport;
use tokio::sync::mpsc;

const TITLE: &str = "Profiler";

/// `profview [#FRAGMENT] [VIEW] [NAME=VALUE ...]`
///
/// Loads options from PROFVIEW_FRAGMENT, optionally navigates to another
/// fragment and switches view, applies form edits, requests the profile and
/// prints what the page would show.
#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let events = events_from_args(&args)?;

    logging::info(
        Domain::System,
        "start",
        obj(&[
            ("run_id", v_str(logging::run_id())),
            ("backend", v_str(&cfg.backend)),
        ]),
    );

    let transport = Arc::new(HttpTransport::new(&cfg.backend, cfg.timeout())?);
    let browser = MemoryBrowser::new(&cfg.fragment, &cfg.search, TITLE);
    let dispatcher = RenderDispatcher::new(MemorySurfaces::default(), TraceFileWriter::new(&cfg.out_dir));
    let settings = ShellSettings {
        failure_policy: cfg.stale_failures,
        checking_for: cfg.checking_for(),
    };
    let mut shell = Shell::new(transport, browser, MemoryView::default(), dispatcher, settings);

    let (tx, rx) = mpsc::unbounded_channel();
    shell.start();
    for event in events {
        tx.send(event).context("event channel closed")?;
    }
    drop(tx);
    shell.run(rx).await;

    let options = shell.options().clone();
    let (browser, _, dispatcher) = shell.into_parts();
    let surfaces = dispatcher.surfaces();

    match surfaces.view_mode {
        Some(ViewMode::Text) => match &surfaces.text {
            TextContent::Markup(html) => {
                println!("{}", html);
                for url in &browser.opened {
                    println!("opened: {}", url);
                }
            }
            other => println!("{}", other.as_str()),
        },
        Some(ViewMode::Svg) => {
            fs::create_dir_all(&cfg.out_dir)?;
            let path = cfg.out_dir.join("pprof.svg");
            fs::write(&path, &surfaces.svg)?;
            match surfaces.svg_size {
                Some(size) => println!("svg {}x{} -> {}", size.width, size.height, path.display()),
                None => println!("svg -> {}", path.display()),
            }
        }
        Some(ViewMode::Catapult) => {
            let writer = dispatcher.viewer();
            let events = writer.last_summary.as_ref().map_or(0, |s| s.events);
            println!("trace ({} events) -> {}", events, writer.path().display());
        }
        None => bail!("no profile was rendered"),
    }

    logging::info(
        Domain::System,
        "done",
        obj(&[
            ("view", v_str(&options.view)),
            ("fragment", v_str(&browser.fragment())),
        ]),
    );
    Ok(())
}

fn events_from_args(args: &[String]) -> Result<Vec<ShellEvent>> {
    let mut events = Vec::new();
    let mut edits = args.iter().peekable();
    if let Some(fragment) = edits.next_if(|a| a.starts_with('#')) {
        events.push(ShellEvent::Navigated { fragment: fragment.clone() });
    }
    if let Some(view) = edits.next_if(|a| !a.contains('=')) {
        events.push(ShellEvent::ViewClicked { view: view.clone() });
    }
    let mut edited = false;
    for arg in edits {
        let Some((name, value)) = arg.split_once('=') else {
            bail!("expected NAME=VALUE, got {:?}", arg);
        };
        events.push(ShellEvent::FieldEdited {
            name: name.to_string(),
            value: value.to_string(),
        });
        edited = true;
    }
    if edited {
        events.push(ShellEvent::ProfileClicked);
    }
    Ok(events)
}
