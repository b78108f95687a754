use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use pulldown_cmark::{html, Options, Parser};
use thiserror::Error;

use crate::config::PreviewOptions;

pub mod display;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("markdown conversion failed: {0}")]
    Conversion(String),
}

/// Markdown to (unsanitised) HTML.
pub trait MarkdownConverter {
    fn to_html(&self, markdown: &str) -> Result<String, RenderError>;
}

#[derive(Debug, Clone, Copy)]
pub struct CmarkConverter {
    options: Options,
}

impl CmarkConverter {
    pub fn new(preview: &PreviewOptions) -> Self {
        let mut options = Options::empty();
        if preview.tables {
            options.insert(Options::ENABLE_TABLES);
        }
        if preview.strikethrough {
            options.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if preview.tasklists {
            options.insert(Options::ENABLE_TASKLISTS);
        }
        Self { options }
    }
}

impl Default for CmarkConverter {
    fn default() -> Self {
        Self::new(&PreviewOptions::default())
    }
}

impl MarkdownConverter for CmarkConverter {
    fn to_html(&self, markdown: &str) -> Result<String, RenderError> {
        let parser = Parser::new_ext(markdown, self.options);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }
}

/// Converts and sanitises. A conversion failure degrades to the escaped
/// source text.
pub fn render_preview<C: MarkdownConverter + ?Sized>(converter: &C, source: &str) -> String {
    match converter.to_html(source) {
        Ok(html) => sanitize(&html),
        Err(err) => {
            tracing::warn!(?err, "markdown render failed, showing raw text");
            format!("<pre>{}</pre>", ammonia::clean_text(source))
        }
    }
}

/// Default ammonia policy plus disabled task-list checkboxes.
pub fn sanitize(html: &str) -> String {
    let mut builder = ammonia::Builder::default();
    builder
        .add_tags(&["input"])
        .add_tag_attributes("input", &["type", "checked", "disabled"]);
    builder.clean(html).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub generation: u64,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub generation: u64,
    pub source: String,
    pub html: String,
}

/// Tracks the displayed HTML and which buffer value it belongs to.
#[derive(Debug, Clone, Default)]
pub struct PreviewState {
    html: String,
    rendered_source: Option<String>,
    in_flight: Option<RenderRequest>,
    next_generation: u64,
}

impl PreviewState {
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn is_current(&self, buffer: &str) -> bool {
        self.rendered_source.as_deref() == Some(buffer)
    }

    pub fn is_rendering(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Issues a request unless the preview already shows, or is already
    /// rendering, exactly this buffer.
    pub fn request_for(&mut self, buffer: &str) -> Option<RenderRequest> {
        if self.is_current(buffer) {
            return None;
        }
        if let Some(pending) = &self.in_flight {
            if pending.source == buffer {
                return None;
            }
        }
        self.next_generation += 1;
        let request = RenderRequest {
            generation: self.next_generation,
            source: buffer.to_string(),
        };
        self.in_flight = Some(request.clone());
        Some(request)
    }

    /// Accepts a finished render only if it was computed for `current`.
    pub fn accept(&mut self, outcome: RenderOutcome, current: &str) -> bool {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|pending| pending.generation <= outcome.generation)
        {
            self.in_flight = None;
        }
        if outcome.source != current {
            tracing::debug!(
                generation = outcome.generation,
                "discarding stale preview render"
            );
            return false;
        }
        self.html = outcome.html;
        self.rendered_source = Some(outcome.source);
        true
    }

    /// Renders synchronously on the calling thread.
    pub fn render_now<C: MarkdownConverter + ?Sized>(&mut self, converter: &C, buffer: &str) {
        self.html = render_preview(converter, buffer);
        self.rendered_source = Some(buffer.to_string());
        self.in_flight = None;
    }
}

/// Background renderer. Queued requests are coalesced so only the newest one
/// is rendered.
pub struct PreviewWorker {
    requests: Option<Sender<RenderRequest>>,
    results: Receiver<RenderOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl PreviewWorker {
    pub fn spawn<C>(converter: C) -> Result<Self>
    where
        C: MarkdownConverter + Send + 'static,
    {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<RenderRequest>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<RenderOutcome>();
        let handle = thread::Builder::new()
            .name("preview-render".into())
            .spawn(move || {
                while let Ok(mut request) = request_rx.recv() {
                    while let Ok(newer) = request_rx.try_recv() {
                        request = newer;
                    }
                    let html = render_preview(&converter, &request.source);
                    let outcome = RenderOutcome {
                        generation: request.generation,
                        source: request.source,
                        html,
                    };
                    if result_tx.send(outcome).is_err() {
                        break;
                    }
                }
                tracing::debug!("preview worker stopped");
            })
            .context("spawning preview render thread")?;
        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            handle: Some(handle),
        })
    }

    pub fn submit(&self, request: RenderRequest) -> bool {
        match &self.requests {
            Some(tx) => tx.send(request).is_ok(),
            None => false,
        }
    }

    pub fn try_recv(&self) -> Option<RenderOutcome> {
        self.results.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<RenderOutcome> {
        match self.results.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for PreviewWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("preview worker panicked");
            }
        }
    }
}
