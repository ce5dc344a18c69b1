//! End-to-end flows through the shell with in-process collaborators.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use profview::bindings::MemoryView;
use profview::browser::{Browser, MemoryBrowser};
use profview::bus::ShellEvent;
use profview::codec::OptionsCodec;
use profview::coordinator::{FailurePolicy, Settlement};
use profview::format::OutputFormat;
use profview::options::Options;
use profview::render::{MemorySurfaces, RecordingTraceViewer, RenderDispatcher, TextContent, ViewMode};
use profview::shell::{Shell, ShellSettings};
use profview::transport::{FixtureTransport, Reply, Transport, TransportError};
use url::form_urlencoded;

type TestShell = Shell<MemoryBrowser, MemoryView, MemorySurfaces, RecordingTraceViewer>;

fn requested_view(path: &str) -> String {
    let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");
    form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "options")
        .map(|(_, v)| OptionsCodec::new().decode(&v).view)
        .unwrap_or_default()
}

fn shell(transport: Arc<dyn Transport>, fragment: &str, policy: FailurePolicy) -> TestShell {
    Shell::new(
        transport,
        MemoryBrowser::new(fragment, "", "Profiler"),
        MemoryView::default(),
        RenderDispatcher::new(MemorySurfaces::default(), RecordingTraceViewer::default()),
        ShellSettings {
            failure_policy: policy,
            checking_for: Duration::from_millis(10),
        },
    )
}

fn fragment_for(view: &str) -> String {
    OptionsCodec::new().encode_fragment(&Options {
        view: view.to_string(),
        ..Default::default()
    })
}

/// Replies after a per-view delay so responses arrive out of issue order.
struct SlowByView {
    delays: Vec<(&'static str, u64)>,
}

#[async_trait]
impl Transport for SlowByView {
    async fn get(&self, path: &str) -> Result<Reply, TransportError> {
        let view = requested_view(path);
        let delay = self
            .delays
            .iter()
            .find(|(v, _)| *v == view)
            .map_or(0, |(_, ms)| *ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        match view.as_str() {
            "pprof" => Ok(Reply::ok("<svg width=\"40pt\" height=\"30pt\"></svg>")),
            "graph" => Ok(Reply::ok("{\"traceEvents\":[{\"pid\":1}]}")),
            "op" => Err(TransportError::Timeout),
            other => Ok(Reply::ok(format!("{} listing", other))),
        }
    }
}

#[tokio::test]
async fn hosted_pprof_link_opens_window_and_renders_notice() {
    let transport = Arc::new(FixtureTransport::always("https://example.com/trace"));
    let mut shell = shell(transport, &fragment_for("pprof"), FailurePolicy::Surface);
    shell.start();
    shell.run_until_idle().await;

    let surfaces = shell.dispatcher().surfaces();
    assert_eq!(surfaces.view_mode, Some(ViewMode::Text));
    match &surfaces.text {
        TextContent::Markup(html) => {
            assert!(html.contains("href=\"https://example.com/trace\""));
            assert!(html.contains("target=\"_blank\""));
        }
        other => panic!("expected markup, got {:?}", other),
    }
    assert!(surfaces.svg.is_empty());
    assert_eq!(shell.browser().opened, vec!["https://example.com/trace".to_string()]);
    assert!(!shell.browser().is_loading());
    assert_eq!(shell.settlements(), &[Settlement::Rendered { format: OutputFormat::Html }]);
}

#[tokio::test]
async fn newer_view_wins_when_older_reply_arrives_last() {
    let transport = Arc::new(SlowByView {
        delays: vec![("code", 80), ("pprof", 5)],
    });
    let mut shell = shell(transport, &fragment_for("code"), FailurePolicy::Surface);
    shell.start();
    shell.dispatch_pending();
    assert_eq!(shell.in_flight(), 1);

    shell.publish(ShellEvent::ViewClicked { view: "pprof".into() });
    shell.run_until_idle().await;

    assert_eq!(
        shell.settlements(),
        &[Settlement::Rendered { format: OutputFormat::Svg }, Settlement::Discarded]
    );
    let surfaces = shell.dispatcher().surfaces();
    assert_eq!(surfaces.view_mode, Some(ViewMode::Svg));
    assert_eq!(surfaces.text, TextContent::Empty);
    assert_eq!(surfaces.svg_size.map(|b| (b.width, b.height)), Some((40.0, 30.0)));
    assert_eq!(shell.browser().loading_transitions, vec![true, false]);
}

#[tokio::test]
async fn stale_timeout_follows_failure_policy() {
    for (policy, expect_offline) in [(FailurePolicy::Surface, true), (FailurePolicy::DiscardStale, false)] {
        let transport = Arc::new(SlowByView {
            delays: vec![("op", 60), ("scope", 5)],
        });
        let mut shell = shell(transport, &fragment_for("op"), policy);
        shell.start();
        shell.dispatch_pending();
        shell.publish(ShellEvent::ViewClicked { view: "scope".into() });
        shell.run_until_idle().await;

        let shown = shell.dispatcher().surfaces().text.as_str().to_string();
        if expect_offline {
            assert_eq!(shown, "The server seems to be offline.");
        } else {
            assert_eq!(shown, "scope listing");
        }
        assert!(!shell.browser().is_loading());
    }
}

#[tokio::test]
async fn graph_view_hands_trace_to_viewer_with_restrictions() {
    let transport = Arc::new(SlowByView { delays: vec![] });
    let fragment = OptionsCodec::new().encode_fragment(&Options {
        view: "graph".into(),
        select: vec!["bytes".into(), "params".into()],
        order_by: "bytes".into(),
        ..Default::default()
    });
    let mut shell = shell(transport, &fragment, FailurePolicy::Surface);
    shell.start();
    shell.run_until_idle().await;

    assert_eq!(shell.options().select, vec!["micros"]);
    assert_eq!(shell.options().order_by, "micros");
    let viewer = shell.dispatcher().viewer();
    assert_eq!(viewer.renders, 1);
    assert_eq!(viewer.summary.as_ref().map(|s| s.events), Some(1));
    assert_eq!(shell.dispatcher().surfaces().view_mode, Some(ViewMode::Catapult));
}

#[tokio::test]
async fn edits_then_profile_round_trip_through_fragment() {
    let transport = Arc::new(FixtureTransport::new(|path| Ok(Reply::ok(requested_view(path)))));
    let mut shell = shell(transport.clone(), &fragment_for("scope"), FailurePolicy::Surface);
    shell.start();
    shell.run_until_idle().await;

    for (name, value) in [
        ("min_micros", "12.5"),
        ("hide_name_regexes", "^_SOURCE, save/.*"),
        ("select", "bytes, micros"),
        ("account_displayed_op_only", "false"),
    ] {
        shell.publish(ShellEvent::FieldEdited {
            name: name.into(),
            value: value.into(),
        });
    }
    shell.publish(ShellEvent::ProfileClicked);
    shell.run_until_idle().await;

    let expected = Options {
        view: "scope".into(),
        select: vec!["bytes".into(), "micros".into()],
        min_micros: 12.5,
        hide_name_regexes: vec!["^_SOURCE".into(), "save/.*".into()],
        account_displayed_op_only: false,
        ..Default::default()
    };
    assert_eq!(shell.options(), &expected);
    assert_eq!(OptionsCodec::new().decode_fragment(&shell.browser().fragment()), expected);
    assert_eq!(transport.requests().len(), 2);
    assert_eq!(shell.dispatcher().surfaces().text, TextContent::Plain("scope".into()));
}

#[tokio::test]
async fn title_click_resets_to_defaults() {
    let transport = Arc::new(FixtureTransport::always("{}"));
    let mut shell = shell(transport, &fragment_for("code"), FailurePolicy::Surface);
    shell.start();
    shell.run_until_idle().await;

    shell.publish(ShellEvent::TitleClicked);
    shell.run_until_idle().await;

    assert_eq!(shell.options(), &Options::default());
    assert_eq!(shell.bindings().header.selected(), Some("graph"));
}

#[tokio::test]
async fn unknown_fragment_keys_survive_a_save() {
    let raw = r#"{"view":"code","trace_steps":[1,2],"max_depth":"deep"}"#;
    let fragment = urlencoding::encode(raw).into_owned();
    let transport = Arc::new(FixtureTransport::always("ok"));
    let mut shell = shell(transport, &fragment, FailurePolicy::Surface);
    shell.start();
    shell.run_until_idle().await;

    assert_eq!(shell.options().max_depth, 10000.0);
    shell.publish(ShellEvent::ViewClicked { view: "op".into() });
    shell.run_until_idle().await;

    let saved = urlencoding::decode(&shell.browser().fragment()).unwrap().into_owned();
    assert!(saved.contains("\"trace_steps\":[1,2]"));
    assert!(saved.contains("\"view\":\"op\""));
}

#[tokio::test]
async fn outside_navigation_replaces_options_and_requests() {
    let transport = Arc::new(FixtureTransport::new(|path| {
        Ok(Reply::ok(match requested_view(path).as_str() {
            "pprof" => "<svg viewBox=\"0 0 64 48\"><g/></svg>".to_string(),
            other => format!("{} listing", other),
        }))
    }));
    let mut shell = shell(transport.clone(), &fragment_for("code"), FailurePolicy::Surface);
    shell.start();
    shell.run_until_idle().await;
    assert_eq!(shell.dispatcher().surfaces().text, TextContent::Plain("code listing".into()));

    let raw = r#"{"view":"pprof","min_bytes":2048,"trace_steps":[4]}"#;
    shell.navigate(&urlencoding::encode(raw));
    shell.run_until_idle().await;

    assert_eq!(transport.requests().len(), 2);
    assert_eq!(shell.options().view, "pprof");
    assert_eq!(shell.options().min_bytes, 2048.0);
    assert_eq!(shell.options().select, vec!["micros"]);
    assert_eq!(shell.options().extra.get("trace_steps"), Some(&serde_json::json!([4])));
    assert_eq!(shell.bindings().header.selected(), Some("pprof"));

    let surfaces = shell.dispatcher().surfaces();
    assert_eq!(surfaces.view_mode, Some(ViewMode::Svg));
    assert_eq!(surfaces.text, TextContent::Empty);
    assert_eq!(surfaces.svg_size.map(|b| (b.width, b.height)), Some((64.0, 48.0)));
    assert_eq!(
        shell.settlements().last(),
        Some(&Settlement::Rendered { format: OutputFormat::Svg })
    );
}
