//! The application object: owns the event bus and every collaborator, turns
//! interaction events into option changes and requests, and drives the
//! single-threaded loop over events, in-flight fetches and chores.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use crate::bindings::ViewBindings;
use crate::browser::Browser;
use crate::bus::{EventBus, ShellEvent};
use crate::codec::{OptionsCodec, CHECK_ROUTE};
use crate::coordinator::{Completion, FailurePolicy, RequestCoordinator, Settlement};
use crate::logging::{self, obj, v_num, v_str, Domain, TimingScope};
use crate::options::{Options, VIEW_GRAPH};
use crate::render::{DisplaySurfaces, RenderDispatcher, TraceViewer};
use crate::transport::{Reply, Transport, TransportError};

const TRACING_SUFFIX: &str = " (Tracing)";

#[derive(Debug, Clone, Copy)]
pub struct ShellSettings {
    pub failure_policy: FailurePolicy,
    /// How long the liveness-check indicator stays up.
    pub checking_for: Duration,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            checking_for: Duration::from_secs(5),
        }
    }
}

enum Chore {
    CheckReplied(Result<Reply, TransportError>),
    CheckingElapsed,
}

pub struct Shell<B, F, S, V> {
    bus: EventBus,
    codec: OptionsCodec,
    coordinator: RequestCoordinator,
    transport: Arc<dyn Transport>,
    browser: B,
    bindings: F,
    dispatcher: RenderDispatcher<S, V>,
    settings: ShellSettings,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
    chores: FuturesUnordered<BoxFuture<'static, Chore>>,
    settlements: Vec<Settlement>,
}

impl<B, F, S, V> Shell<B, F, S, V>
where
    B: Browser,
    F: ViewBindings,
    S: DisplaySurfaces,
    V: TraceViewer,
{
    pub fn new(
        transport: Arc<dyn Transport>,
        browser: B,
        bindings: F,
        dispatcher: RenderDispatcher<S, V>,
        settings: ShellSettings,
    ) -> Self {
        let codec = OptionsCodec::new();
        Self {
            bus: EventBus::new(),
            codec,
            coordinator: RequestCoordinator::new(Arc::clone(&transport), codec, settings.failure_policy),
            transport,
            browser,
            bindings,
            dispatcher,
            settings,
            in_flight: FuturesUnordered::new(),
            chores: FuturesUnordered::new(),
            settlements: Vec::new(),
        }
    }

    pub fn options(&self) -> &Options {
        self.coordinator.options()
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn bindings(&self) -> &F {
        &self.bindings
    }

    pub fn dispatcher(&self) -> &RenderDispatcher<S, V> {
        &self.dispatcher
    }

    /// Every settlement so far, in arrival order.
    pub fn settlements(&self) -> &[Settlement] {
        &self.settlements
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Page load: the liveness check when the page was opened with a profile
    /// context, then the first refresh from the fragment.
    pub fn start(&mut self) {
        if self.browser.search().contains("profile=") {
            self.begin_liveness_check();
        }
        self.bus.publish(ShellEvent::FragmentChanged);
    }

    /// Address-bar navigation from outside the page. Queued like any other
    /// event; the options are rebuilt only if the fragment text changes.
    pub fn navigate(&mut self, fragment: &str) -> u64 {
        self.bus.publish(ShellEvent::Navigated {
            fragment: fragment.to_string(),
        })
    }

    pub fn publish(&mut self, event: ShellEvent) -> u64 {
        self.bus.publish(event)
    }

    /// Handles queued events until the bus is empty. Events raised by a
    /// handler are handled after it, in order.
    pub fn dispatch_pending(&mut self) {
        while let Some((seq, event)) = self.bus.pop() {
            logging::debug(
                Domain::Shell,
                "event",
                obj(&[("seq", json!(seq)), ("name", v_str(event.name()))]),
            );
            self.handle(event);
        }
    }

    fn handle(&mut self, event: ShellEvent) {
        match event {
            ShellEvent::TitleClicked => self.save(&Options::default()),
            ShellEvent::ViewClicked { view } => {
                let mut next = self.coordinator.options().clone();
                next.view = view;
                if next.view == VIEW_GRAPH {
                    next.normalize();
                } else {
                    self.bindings.read_fields_into(&mut next);
                }
                self.coordinator.set_options(next);
                let current = self.coordinator.options().clone();
                self.save(&current);
            }
            ShellEvent::ProfileClicked => {
                self.bindings.read_fields_into(self.coordinator.options_mut());
                self.coordinator.options_mut().normalize();
                let current = self.coordinator.options().clone();
                self.save(&current);
            }
            ShellEvent::FieldEdited { name, value } => {
                if let Err(err) = self.bindings.edit_field(&name, &value) {
                    logging::warn(
                        Domain::Shell,
                        "edit_rejected",
                        obj(&[("field", v_str(&name)), ("error", v_str(&err.to_string()))]),
                    );
                    return;
                }
                self.crawl_without_request();
            }
            ShellEvent::FragmentChanged => self.refresh(),
            ShellEvent::Navigated { fragment } => self.replace_fragment(&fragment),
        }
    }

    /// Writes options to the fragment. A changed fragment raises
    /// `FragmentChanged`, which refreshes and requests.
    fn save(&mut self, options: &Options) {
        let fragment = self.codec.encode_fragment(options);
        self.replace_fragment(&fragment);
    }

    /// Browser hashchange semantics: only a changed fragment is announced.
    fn replace_fragment(&mut self, fragment: &str) {
        if self.browser.set_fragment(fragment) {
            self.bus.publish(ShellEvent::FragmentChanged);
        } else {
            logging::debug(Domain::Shell, "fragment_unchanged", obj(&[]));
        }
    }

    fn refresh(&mut self) {
        let mut next = self.codec.decode_fragment(&self.browser.fragment());
        next.normalize();
        self.bindings.write_fields_from(&next);
        self.coordinator.set_options(next);

        let ticket = self.coordinator.begin(&mut self.browser);
        let timing = TimingScope::new(
            Domain::Transport,
            "fetch",
            &[("format", v_str(ticket.format().as_str()))],
        );
        let fetch = self.coordinator.fetch(ticket);
        self.in_flight.push(
            async move {
                let completion = fetch.await;
                drop(timing);
                completion
            }
            .boxed(),
        );
    }

    fn crawl_without_request(&mut self) {
        self.bindings.read_fields_into(self.coordinator.options_mut());
        self.coordinator.options_mut().normalize();
        let current = self.coordinator.options().clone();
        self.bindings.write_fields_from(&current);
    }

    fn settle(&mut self, completion: Completion) {
        let settlement = self.coordinator.settle(completion, &mut self.dispatcher, &mut self.browser);
        self.settlements.push(settlement);
    }

    fn begin_liveness_check(&mut self) {
        self.browser.set_checking(true);
        let title = self.browser.title();
        self.browser.set_title(&format!("{}{}", title, TRACING_SUFFIX));

        let transport = Arc::clone(&self.transport);
        self.chores
            .push(async move { Chore::CheckReplied(transport.get(CHECK_ROUTE).await) }.boxed());
        let wait = self.settings.checking_for;
        self.chores.push(
            async move {
                tokio::time::sleep(wait).await;
                Chore::CheckingElapsed
            }
            .boxed(),
        );
    }

    fn finish_chore(&mut self, chore: Chore) {
        match chore {
            Chore::CheckReplied(Ok(reply)) => logging::info(
                Domain::Shell,
                "check_reply",
                obj(&[
                    ("status", v_num(reply.status as f64)),
                    ("body", v_str(reply.body.trim())),
                ]),
            ),
            Chore::CheckReplied(Err(err)) => logging::warn(
                Domain::Shell,
                "check_failed",
                obj(&[("error", v_str(&err.to_string()))]),
            ),
            Chore::CheckingElapsed => {
                self.browser.set_checking(false);
                let title = self.browser.title();
                let restored = title.split(' ').next().unwrap_or_default().to_string();
                self.browser.set_title(&restored);
            }
        }
    }

    /// Handles queued events and settles every in-flight fetch, leaving
    /// chores pending. Returns once nothing is queued or in flight.
    pub async fn run_until_idle(&mut self) {
        loop {
            self.dispatch_pending();
            match self.in_flight.next().await {
                Some(completion) => self.settle(completion),
                None => break,
            }
        }
    }

    /// The event loop. Runs until `events` closes and every fetch and chore
    /// has finished.
    pub async fn run(&mut self, mut events: mpsc::UnboundedReceiver<ShellEvent>) {
        let mut open = true;
        loop {
            self.dispatch_pending();
            if !open && self.bus.is_empty() && self.in_flight.is_empty() && self.chores.is_empty() {
                break;
            }
            tokio::select! {
                received = events.recv(), if open => match received {
                    Some(event) => {
                        self.bus.publish(event);
                    }
                    None => open = false,
                },
                Some(completion) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.settle(completion);
                }
                Some(chore) = self.chores.next(), if !self.chores.is_empty() => {
                    self.finish_chore(chore);
                }
                else => break,
            }
        }
        logging::info(
            Domain::Shell,
            "stopped",
            obj(&[("settled", json!(self.settlements.len()))]),
        );
    }

    pub fn into_parts(self) -> (B, F, RenderDispatcher<S, V>) {
        (self.browser, self.bindings, self.dispatcher)
    }
}
