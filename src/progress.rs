//! Live progress message for long-running operations.
//!
//! One tracker instance exists per inbound request. It posts a placeholder
//! message, edits it in place as named steps change status (rate limited,
//! fire and forget), and finally replaces it with the operation's result or
//! an error notice. Nothing in here may abort the caller's workflow: every
//! network failure is absorbed and logged.

use crate::delivery::deliver;
use crate::transport::ChatTransport;
use crate::{ChatRef, MessageHandle};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Only the most recently inserted steps are kept.
pub const MAX_TRACKED_STEPS: usize = 10;

/// Shown before the first step arrives.
const PLACEHOLDER: &str = "⏳ <i>Processing…</i>";

/// Prefixed to the final message when the operation failed.
const ERROR_HEADER: &str = "⚠️ <b>Something went wrong</b>";

/// Status of one tracked step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl StepStatus {
    fn glyph(self) -> &'static str {
        match self {
            StepStatus::Pending => "⏳",
            StepStatus::InProgress => "🔄",
            StepStatus::Completed => "✅",
            StepStatus::Error => "❌",
        }
    }
}

/// One named step within a tracked operation.
#[derive(Debug, Clone)]
pub struct ProgressStep {
    pub name: String,
    pub status: StepStatus,
    pub details: Option<String>,
    pub timestamp: Instant,
}

/// Insertion-ordered step sequence bounded to [`MAX_TRACKED_STEPS`].
///
/// Updating an existing name replaces the step in place, keeping its
/// position; a new name appends and evicts the oldest entry by insertion
/// order once the cap is reached.
#[derive(Debug, Default)]
struct StepList {
    steps: VecDeque<ProgressStep>,
}

impl StepList {
    fn upsert(&mut self, step: ProgressStep) {
        if let Some(existing) = self.steps.iter_mut().find(|s| s.name == step.name) {
            *existing = step;
            return;
        }
        self.steps.push_back(step);
        if self.steps.len() > MAX_TRACKED_STEPS {
            self.steps.pop_front();
        }
    }

    fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &ProgressStep> {
        self.steps.iter()
    }
}

/// Progress reporting handle given to request handlers.
///
/// The `Disabled` variant satisfies the whole contract with no side
/// effects, so call sites never branch on whether progress reporting is
/// turned on.
pub enum Progress {
    Live(ProgressTracker),
    Disabled,
}

impl Progress {
    pub fn live(
        transport: Arc<dyn ChatTransport>,
        chat: ChatRef,
        min_edit_interval: Duration,
    ) -> Self {
        Progress::Live(ProgressTracker::new(transport, chat, min_edit_interval))
    }

    pub fn disabled() -> Self {
        Progress::Disabled
    }

    pub async fn start(&mut self) {
        if let Progress::Live(tracker) = self {
            tracker.start().await;
        }
    }

    pub async fn update(&mut self, name: &str, status: StepStatus, details: Option<&str>) {
        if let Progress::Live(tracker) = self {
            tracker.update(name, status, details).await;
        }
    }

    pub async fn complete(&mut self, final_text: &str) {
        if let Progress::Live(tracker) = self {
            tracker.complete(final_text).await;
        }
    }

    pub async fn error(&mut self, error_text: &str) {
        if let Progress::Live(tracker) = self {
            tracker.error(error_text).await;
        }
    }
}

/// Per-request progress state machine: `idle → active → terminal`.
pub struct ProgressTracker {
    transport: Arc<dyn ChatTransport>,
    chat: ChatRef,
    steps: StepList,
    handle: Option<MessageHandle>,
    started_at: Instant,
    last_edit: Option<Instant>,
    start_failed: bool,
    terminal: bool,
    min_edit_interval: Duration,
}

impl ProgressTracker {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        chat: ChatRef,
        min_edit_interval: Duration,
    ) -> Self {
        Self {
            transport,
            chat,
            steps: StepList::default(),
            handle: None,
            started_at: Instant::now(),
            last_edit: None,
            start_failed: false,
            terminal: false,
            min_edit_interval,
        }
    }

    /// Post the placeholder message. A failed send leaves the tracker
    /// without a handle: updates become no-ops, while the terminal
    /// render still goes out as a fresh message so the final text is
    /// never lost to a cosmetic failure.
    pub async fn start(&mut self) {
        if self.terminal || self.handle.is_some() {
            return;
        }
        match deliver(self.transport.as_ref(), self.chat, PLACEHOLDER).await {
            Ok(handle) => self.handle = Some(handle),
            Err(err) => {
                self.start_failed = true;
                tracing::warn!(error = %err, "progress placeholder send failed");
            }
        }
    }

    /// Upsert a step and re-render the progress message if the rate limit
    /// allows. The edit is spawned fire-and-forget; its failure is logged
    /// and never reaches the caller.
    pub async fn update(&mut self, name: &str, status: StepStatus, details: Option<&str>) {
        if self.terminal || self.start_failed {
            return;
        }
        self.steps.upsert(ProgressStep {
            name: name.to_string(),
            status,
            details: details.map(str::to_string),
            timestamp: Instant::now(),
        });

        let Some(handle) = self.handle else {
            return;
        };

        let now = Instant::now();
        if let Some(last) = self.last_edit {
            if now.duration_since(last) < self.min_edit_interval {
                return;
            }
        }
        self.last_edit = Some(now);

        let transport = Arc::clone(&self.transport);
        let chat = self.chat;
        let text = self.render();
        tokio::spawn(async move {
            if let Err(err) = transport.edit_message(chat, handle, &text, true).await {
                tracing::debug!(error = %err, "progress edit dropped");
            }
        });
    }

    /// Replace the progress message with the operation's result.
    /// Idempotent: only the first terminal call renders.
    pub async fn complete(&mut self, final_text: &str) {
        self.finalize(final_text.to_string()).await;
    }

    /// Replace the progress message with an error notice.
    pub async fn error(&mut self, error_text: &str) {
        self.finalize(format!("{ERROR_HEADER}\n\n{error_text}")).await;
    }

    async fn finalize(&mut self, text: String) {
        if self.terminal {
            return;
        }
        self.terminal = true;

        // Terminal renders bypass the rate limit: the final state must
        // always become visible.
        match self.handle {
            Some(handle) => {
                if let Err(err) = self
                    .transport
                    .edit_message(self.chat, handle, &text, true)
                    .await
                {
                    tracing::warn!(error = %err, "final progress edit failed, sending new message");
                    if let Err(err) = deliver(self.transport.as_ref(), self.chat, &text).await {
                        tracing::warn!(error = %err, "final progress fallback send failed");
                    }
                }
            }
            None => {
                if let Err(err) = deliver(self.transport.as_ref(), self.chat, &text).await {
                    tracing::warn!(error = %err, "final progress send failed");
                }
            }
        }
    }

    /// Render the current step sequence as platform markup.
    fn render(&self) -> String {
        if self.steps.is_empty() {
            return PLACEHOLDER.to_string();
        }

        let mut out = String::new();
        for step in self.steps.iter() {
            out.push_str(step.status.glyph());
            out.push(' ');
            out.push_str(&step.name);
            if let Some(details) = &step.details {
                out.push_str(&format!(" <i>({details})</i>"));
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&format!(
            "<i>⏱ {}</i>",
            format_elapsed(self.started_at.elapsed())
        ));
        out
    }
}

/// `Ns` under a minute, `Nm Ss` from there on.
fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
