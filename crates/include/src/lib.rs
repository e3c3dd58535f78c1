//! A streaming include: fetches its `src` and streams the parsed markup
//! into its own destination as the response arrives.
//!
//! Attribute changes follow image-element rules: every `src` change starts
//! a new load, a `crossorigin` change only when the computed value changes.
//! A load requested while disconnected waits for [`StreamingInclude::connect`],
//! and several attribute changes before the next [`StreamingInclude::parsed`]
//! call collapse into one fetch.

pub mod attributes;
pub mod watch;

use core_types::{AbortSignal, RequestId};
use dom_stream::{Destination, ReplayConfig, ReplaySink};
use net::FetchOptions;
use runtime_net::SourceInput;
use runtime_parse::{StreamConfig, StreamError, StreamOutcome, StreamSummary, stream_into};
use std::fmt;
use std::sync::{Arc, Mutex};
use url::Url;

pub use crate::attributes::{CrossOrigin, reflect_url};
pub use crate::watch::{WatchedResource, resource_watch, subresource};

#[derive(Debug)]
pub enum IncludeError {
    /// `src` is set but does not parse as a URL; raised before any work.
    InvalidSrc(String),
    Stream(StreamError),
    Aborted,
}

impl fmt::Display for IncludeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncludeError::InvalidSrc(src) => write!(f, "invalid src: {src}"),
            IncludeError::Stream(err) => write!(f, "{err}"),
            IncludeError::Aborted => write!(f, "load aborted"),
        }
    }
}

impl std::error::Error for IncludeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IncludeError::Stream(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StreamError> for IncludeError {
    fn from(err: StreamError) -> Self {
        IncludeError::Stream(err)
    }
}

/// Outcome of the most recent load.
#[derive(Debug)]
pub enum LoadState {
    /// No `src`: nothing to load, which counts as success.
    Idle,
    /// Requested but not run yet.
    Pending,
    Loaded(StreamSummary),
    Failed(IncludeError),
}

impl LoadState {
    pub fn is_pending(&self) -> bool {
        matches!(self, LoadState::Pending)
    }

    pub fn error(&self) -> Option<&IncludeError> {
        match self {
            LoadState::Failed(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct PendingLoad {
    url: Url,
    cross_origin: CrossOrigin,
}

pub struct StreamingInclude<D: Destination> {
    src: Option<String>,
    crossorigin: Option<String>,
    base: Option<Url>,
    connected: bool,
    replay: ReplaySink<D>,
    config: StreamConfig,
    fetch: FetchOptions,
    pending: Option<PendingLoad>,
    abort: Option<AbortSignal>,
    state: LoadState,
    resources: Arc<Mutex<Vec<WatchedResource>>>,
    generation: RequestId,
}

impl<D: Destination> StreamingInclude<D> {
    pub fn new(destination: D) -> Self {
        Self {
            src: None,
            crossorigin: None,
            base: None,
            connected: false,
            replay: ReplaySink::new(destination),
            config: StreamConfig::default(),
            fetch: FetchOptions::default(),
            pending: None,
            abort: None,
            state: LoadState::Idle,
            resources: Arc::new(Mutex::new(Vec::new())),
            generation: 0,
        }
    }

    /// Base URL relative `src` values resolve against.
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_stream_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_replay_config(mut self, config: ReplayConfig) -> Self {
        let destination = self.replay.into_destination();
        self.replay = ReplaySink::with_config(destination, config);
        self
    }

    pub fn with_fetch_options(mut self, options: FetchOptions) -> Self {
        self.fetch = options;
        self
    }

    pub fn src(&self) -> String {
        reflect_url(self.src.as_deref(), self.base.as_ref())
    }

    pub fn src_attribute(&self) -> Option<&str> {
        self.src.as_deref()
    }

    /// Always starts a new load, even when the value is unchanged.
    pub fn set_src(&mut self, value: &str) {
        self.src = Some(value.to_string());
        self.init_load();
    }

    pub fn remove_src(&mut self) {
        self.src = None;
        self.init_load();
    }

    pub fn cross_origin(&self) -> CrossOrigin {
        CrossOrigin::from_attribute(self.crossorigin.as_deref())
    }

    /// `None` removes the attribute.
    pub fn set_cross_origin(&mut self, value: Option<&str>) {
        let before = self.cross_origin();
        self.crossorigin = value.map(str::to_string);
        if self.cross_origin() != before {
            self.init_load();
        }
    }

    pub fn connect(&mut self) {
        self.connected = true;
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Number of loads started so far; each (re)load bumps it.
    pub fn generation(&self) -> RequestId {
        self.generation
    }

    /// Signal of the current load, for aborting it from another thread
    /// while [`parsed`](Self::parsed) is streaming.
    pub fn abort_handle(&self) -> Option<AbortSignal> {
        self.abort.clone()
    }

    /// Cancel the current load. Content streamed so far stays in place.
    pub fn abort(&mut self) {
        if let Some(signal) = &self.abort {
            signal.abort();
        }
        if self.pending.take().is_some() {
            self.state = LoadState::Failed(IncludeError::Aborted);
        }
    }

    /// Run the pending load when connected, then report the last outcome.
    pub fn parsed(&mut self) -> &LoadState {
        if self.connected
            && let Some(pending) = self.pending.take()
        {
            self.state = self.run(pending);
        }
        &self.state
    }

    /// Outcome so far, without starting a pending load.
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn destination(&self) -> &D {
        self.replay.destination()
    }

    pub fn replay(&self) -> &ReplaySink<D> {
        &self.replay
    }

    /// Subresources the streamed content started loading, in insertion order.
    pub fn resources(&self) -> Vec<WatchedResource> {
        self.resources
            .lock()
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    fn init_load(&mut self) {
        if let Some(previous) = self.abort.take() {
            previous.abort();
        }
        self.pending = None;
        self.replay.reset();
        if let Ok(mut list) = self.resources.lock() {
            list.clear();
        }

        if self.src.is_none() {
            self.state = LoadState::Idle;
            return;
        }
        let src = self.src();
        let url = match Url::parse(&src) {
            Ok(url) => url,
            Err(_) => {
                log::debug!(target: "include", "rejecting src {src:?}");
                self.state = LoadState::Failed(IncludeError::InvalidSrc(src));
                return;
            }
        };
        self.generation += 1;
        self.abort = Some(AbortSignal::new());
        self.pending = Some(PendingLoad {
            url,
            cross_origin: self.cross_origin(),
        });
        self.state = LoadState::Pending;
    }

    fn run(&mut self, pending: PendingLoad) -> LoadState {
        let abort = self.abort.get_or_insert_with(AbortSignal::new).clone();
        if abort.is_aborted() {
            return LoadState::Failed(IncludeError::Aborted);
        }
        self.replay.set_monitor(resource_watch(
            Some(pending.url.clone()),
            Arc::clone(&self.resources),
        ));
        let options = FetchOptions {
            credentials: pending.cross_origin.credentials(),
            ..self.fetch.clone()
        };
        log::debug!(
            target: "include",
            "load {} ({})",
            pending.url,
            pending.cross_origin.as_str()
        );
        let input = SourceInput::Url {
            url: pending.url.to_string(),
            options,
        };
        let result = stream_into(
            self.generation,
            input,
            &mut self.replay,
            &self.config,
            &abort,
        );
        self.replay.clear_monitor();
        match result {
            Ok(summary) if summary.outcome == StreamOutcome::Completed => {
                LoadState::Loaded(summary)
            }
            Ok(_) => LoadState::Failed(IncludeError::Aborted),
            Err(err) => {
                log::warn!(target: "include", "load of {} failed: {err}", pending.url);
                LoadState::Failed(err.into())
            }
        }
    }
}

impl<D: Destination> fmt::Debug for StreamingInclude<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingInclude")
            .field("src", &self.src)
            .field("crossorigin", &self.crossorigin)
            .field("connected", &self.connected)
            .field("generation", &self.generation)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
