//! HttpTransport against the fixture backend on a loopback port.

use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use profview::bindings::MemoryView;
use profview::browser::MemoryBrowser;
use profview::codec::{OptionsCodec, CHECK_ROUTE};
use profview::coordinator::{FailurePolicy, RequestCoordinator, Settlement, OFFLINE_TEXT};
use profview::fixture_server::{FixtureServer, NOT_GENERATED_TEXT, PPROF_FILE, TEXT_FILE, TIMELINE_FILE};
use profview::format::OutputFormat;
use profview::options::Options;
use profview::render::{MemorySurfaces, RecordingTraceViewer, RenderDispatcher, TextContent, TraceFileWriter, ViewMode};
use profview::shell::{Shell, ShellSettings};
use profview::transport::{HttpTransport, Transport, TransportError};

fn spawn_backend(dir: &Path) -> String {
    let server = FixtureServer::bind("127.0.0.1:0", dir).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.serve_forever());
    format!("http://{}", addr)
}

fn write_fixtures(dir: &Path) {
    std::fs::write(dir.join(TEXT_FILE), "node name | requested bytes\n_TFProfRoot (--/1.2KB)").unwrap();
    std::fs::write(dir.join(PPROF_FILE), "<svg viewBox=\"0 0 320 200\"><g/></svg>").unwrap();
    std::fs::write(
        dir.join(TIMELINE_FILE),
        r#"{"traceEvents":[{"pid":0,"ph":"X","name":"MatMul"},{"pid":1,"ph":"X","name":"Add"}]}"#,
    )
    .unwrap();
}

fn with_view(view: &str) -> Options {
    Options {
        view: view.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn check_and_profile_routes() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let transport = HttpTransport::new(&spawn_backend(dir.path()), Duration::from_secs(5)).unwrap();

    let check = transport.get(CHECK_ROUTE).await.unwrap();
    assert!(check.is_success());
    assert_eq!(check.body, "ok");

    let codec = OptionsCodec::new();
    let text = transport.get(&codec.profile_path(&with_view("scope"))).await.unwrap();
    assert!(text.body.starts_with("node name"));

    let missing = transport.get("/nowhere").await.unwrap();
    assert_eq!(missing.status, 404);
    assert!(!missing.is_success());
}

#[tokio::test]
async fn missing_fixture_reports_not_generated() {
    let dir = tempfile::tempdir().unwrap();
    let transport = HttpTransport::new(&spawn_backend(dir.path()), Duration::from_secs(5)).unwrap();
    let reply = transport
        .get(&OptionsCodec::new().profile_path(&with_view("code")))
        .await
        .unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, NOT_GENERATED_TEXT);
}

#[tokio::test]
async fn closed_port_maps_to_offline() {
    let port = {
        let probe = TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };
    let transport = HttpTransport::new(&format!("http://127.0.0.1:{}", port), Duration::from_secs(2)).unwrap();
    match transport.get(CHECK_ROUTE).await {
        Err(TransportError::Offline(_)) => {}
        other => panic!("expected offline, got {:?}", other),
    }

    let mut coordinator = RequestCoordinator::new(Arc::new(transport), OptionsCodec::new(), FailurePolicy::Surface);
    let mut dispatcher = RenderDispatcher::new(MemorySurfaces::default(), RecordingTraceViewer::default());
    let mut browser = MemoryBrowser::default();
    let settled = coordinator.request_profile(&mut dispatcher, &mut browser).await;
    assert_eq!(settled, Settlement::Failed { stale: false });
    assert_eq!(dispatcher.surfaces().text, TextContent::Plain(OFFLINE_TEXT.into()));
    assert!(!browser.is_loading());
}

#[tokio::test]
async fn shell_over_http_renders_each_view() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let out = tempfile::tempdir().unwrap();
    let transport = Arc::new(HttpTransport::new(&spawn_backend(dir.path()), Duration::from_secs(5)).unwrap());

    let mut shell = Shell::new(
        transport,
        MemoryBrowser::new("", "", "Profiler"),
        MemoryView::default(),
        RenderDispatcher::new(MemorySurfaces::default(), TraceFileWriter::new(out.path())),
        ShellSettings::default(),
    );
    shell.start();
    shell.run_until_idle().await;

    let writer = shell.dispatcher().viewer();
    assert_eq!(writer.last_summary.as_ref().map(|s| (s.events, s.processes)), Some((2, 2)));
    assert!(std::fs::read_to_string(writer.path()).unwrap().contains("MatMul"));

    shell.publish(profview::bus::ShellEvent::ViewClicked { view: "pprof".into() });
    shell.run_until_idle().await;
    let surfaces = shell.dispatcher().surfaces();
    assert_eq!(surfaces.view_mode, Some(ViewMode::Svg));
    assert_eq!(surfaces.svg_size.map(|b| (b.width, b.height)), Some((320.0, 200.0)));

    shell.publish(profview::bus::ShellEvent::ViewClicked { view: "code".into() });
    shell.run_until_idle().await;
    assert!(shell.dispatcher().surfaces().text.as_str().contains("_TFProfRoot"));
    assert_eq!(
        shell.settlements().last(),
        Some(&Settlement::Rendered { format: OutputFormat::Text })
    );
}
