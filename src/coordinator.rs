//! Request coordination: one authoritative response per generation.
//!
//! A request is split in three so the only suspension point borrows nothing:
//! `begin` bumps the generation and builds a [`Ticket`], `fetch` performs the
//! transport call, `settle` drops stale completions and renders the rest.
//! Superseded fetches are never aborted; their completions are ignored.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::json;

use crate::browser::Browser;
use crate::codec::OptionsCodec;
use crate::format::{hosted_graph_notice, hosted_graph_url, OutputFormat};
use crate::logging::{self, fingerprint, obj, v_num, v_str, Domain};
use crate::options::Options;
use crate::render::{DisplaySurfaces, RenderDispatcher, TraceViewer};
use crate::transport::{Reply, Transport, TransportError};

pub const SERVER_ERROR_TEXT: &str = "The server returned an error.";
pub const OFFLINE_TEXT: &str = "The server seems to be offline.";

/// Identifies one issued request. Only the coordinator creates these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// What to do with a transport failure whose request was superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Always show the offline message, even for a superseded request.
    #[default]
    Surface,
    /// Apply the same staleness check as successful replies.
    DiscardStale,
}

impl FailurePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "surface" => Some(FailurePolicy::Surface),
            "discard" | "discard_stale" => Some(FailurePolicy::DiscardStale),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ticket {
    generation: Generation,
    format: OutputFormat,
    path: String,
}

impl Ticket {
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug)]
pub struct Completion {
    ticket: Ticket,
    outcome: Result<Reply, TransportError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Rendered { format: OutputFormat },
    /// Superseded; nothing rendered, loading flag untouched.
    Discarded,
    /// Offline message shown. `stale` marks a superseded request that still
    /// surfaced under [`FailurePolicy::Surface`].
    Failed { stale: bool },
}

pub struct RequestCoordinator {
    transport: Arc<dyn Transport>,
    codec: OptionsCodec,
    current: Options,
    generation: u64,
    failure_policy: FailurePolicy,
}

impl RequestCoordinator {
    pub fn new(transport: Arc<dyn Transport>, codec: OptionsCodec, failure_policy: FailurePolicy) -> Self {
        Self {
            transport,
            codec,
            current: Options::default(),
            generation: 0,
            failure_policy,
        }
    }

    pub fn options(&self) -> &Options {
        &self.current
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.current
    }

    /// Replaces the current options without issuing a request.
    pub fn set_options(&mut self, next: Options) {
        self.current = next;
    }

    fn is_current(&self, generation: Generation) -> bool {
        generation.0 == self.generation
    }

    /// Invalidates every earlier request and marks the page as loading.
    pub fn begin<B: Browser + ?Sized>(&mut self, browser: &mut B) -> Ticket {
        self.generation += 1;
        let generation = Generation(self.generation);
        browser.set_loading(true);

        let format = OutputFormat::for_view(&self.current.view);
        let path = self.codec.profile_path(&self.current);
        logging::info(
            Domain::Request,
            "issued",
            obj(&[
                ("generation", json!(generation.0)),
                ("view", v_str(&self.current.view)),
                ("format", v_str(format.as_str())),
                ("options", v_str(&fingerprint(&self.codec.encode(&self.current)))),
            ]),
        );
        Ticket { generation, format, path }
    }

    /// The transport call. Holds no borrow of the coordinator, so several
    /// fetches can be in flight and complete in any order.
    pub fn fetch(&self, ticket: Ticket) -> BoxFuture<'static, Completion> {
        let transport = Arc::clone(&self.transport);
        async move {
            let outcome = transport.get(&ticket.path).await;
            Completion { ticket, outcome }
        }
        .boxed()
    }

    pub fn settle<S, V, B>(
        &mut self,
        completion: Completion,
        dispatcher: &mut RenderDispatcher<S, V>,
        browser: &mut B,
    ) -> Settlement
    where
        S: DisplaySurfaces,
        V: TraceViewer,
        B: Browser + ?Sized,
    {
        let Completion { ticket, outcome } = completion;
        let current = self.is_current(ticket.generation);

        let reply = match outcome {
            Ok(reply) => reply,
            Err(err) => {
                if !current && self.failure_policy == FailurePolicy::DiscardStale {
                    logging::debug(
                        Domain::Request,
                        "stale_failure_discarded",
                        obj(&[
                            ("generation", json!(ticket.generation.0)),
                            ("error", v_str(&err.to_string())),
                        ]),
                    );
                    return Settlement::Discarded;
                }
                logging::warn(
                    Domain::Request,
                    "transport_failed",
                    obj(&[
                        ("generation", json!(ticket.generation.0)),
                        ("stale", json!(!current)),
                        ("error", v_str(&err.to_string())),
                    ]),
                );
                dispatcher.render(OFFLINE_TEXT, OutputFormat::Text);
                browser.set_loading(false);
                return Settlement::Failed { stale: !current };
            }
        };

        if !current {
            logging::debug(
                Domain::Request,
                "stale_discarded",
                obj(&[
                    ("generation", json!(ticket.generation.0)),
                    ("latest", json!(self.generation)),
                ]),
            );
            return Settlement::Discarded;
        }

        let (mut format, mut payload) = if reply.is_success() {
            (ticket.format, reply.body)
        } else {
            logging::warn(
                Domain::Request,
                "backend_error",
                obj(&[
                    ("generation", json!(ticket.generation.0)),
                    ("status", v_num(reply.status as f64)),
                ]),
            );
            (OutputFormat::Text, SERVER_ERROR_TEXT.to_string())
        };

        if let Some(url) = hosted_graph_url(format, &payload).map(str::to_string) {
            browser.open_window(&url);
            format = OutputFormat::Html;
            payload = hosted_graph_notice(&url);
        }

        dispatcher.render(&payload, format);
        browser.set_loading(false);
        Settlement::Rendered { format }
    }

    /// begin → fetch → settle, sequentially.
    pub async fn request_profile<S, V, B>(
        &mut self,
        dispatcher: &mut RenderDispatcher<S, V>,
        browser: &mut B,
    ) -> Settlement
    where
        S: DisplaySurfaces,
        V: TraceViewer,
        B: Browser + ?Sized,
    {
        let ticket = self.begin(browser);
        let completion = self.fetch(ticket).await;
        self.settle(completion, dispatcher, browser)
    }
}
