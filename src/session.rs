//! One dashboard session: the poll task, the log tailer and the input/render
//! loop, all torn down together.

use std::io;
use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

use klances_k8s::ClusterSource;
use klances_logs::{LogStore, LogTailer};
use klances_state::{PollTimer, PollTrigger, ResourcePoller, SelectionFilter, StateStore, StoreReader};
use klances_tui::{
    Action, Event, EventHandler, KeyBindings, KeyContext, RenderScheduler, Renderer,
    TerminalRenderer, UiState,
};
use klances_types::ClusterError;

use crate::config::Config;

pub struct Session<S> {
    source: Arc<S>,
    config: Config,
    context: String,
}

impl<S: ClusterSource> Session<S> {
    pub fn new(source: Arc<S>, config: Config, context: impl Into<String>) -> Self {
        Self {
            source,
            config,
            context: context.into(),
        }
    }

    /// Run until the user quits, `cancel` fires or the cluster rejects our
    /// credentials.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        self.run_with(cancel, TerminalRenderer::new).await
    }

    /// [`Session::run`] drawing through the renderer built by `open_renderer`.
    /// Nothing is started when that fails.
    async fn run_with<R, F>(self, cancel: CancellationToken, open_renderer: F) -> Result<()>
    where
        R: Renderer,
        F: FnOnce() -> io::Result<R>,
    {
        let renderer = open_renderer().context("Failed to set up the terminal")?;

        // Whatever way the loop ends, the poll task and log streams stop
        let _teardown = cancel.clone().drop_guard();

        let store = StateStore::new();
        let reader = store.reader();
        let selection = SelectionFilter::new();
        selection.set_selection(self.config.namespaces.iter().cloned());
        let logs = LogStore::new(self.config.log_capacity);
        let refresh = Arc::new(Notify::new());
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();

        let tailer = LogTailer::new(
            Arc::clone(&self.source),
            logs.clone(),
            self.config.tailer(),
            cancel.child_token(),
            fatal_tx.clone(),
        );
        let poll_loop = PollLoop {
            poller: ResourcePoller::new(Arc::clone(&self.source)),
            timer: PollTimer::new(self.config.poll_interval(), Arc::clone(&refresh)),
            store,
            selection: selection.clone(),
            tailer,
            fatal: fatal_tx,
        };
        let poll_task = tokio::spawn(poll_loop.run(cancel.clone()));

        let mut scheduler = RenderScheduler::new(
            renderer,
            reader.clone(),
            selection.clone(),
            logs,
            self.config.log_window,
        )
        .with_context(self.context.as_str());

        let mut events = EventHandler::new(self.config.frame_interval(), cancel.clone());
        let keybindings = KeyBindings::new();
        let mut controls = Controls::new(reader, selection, refresh);

        tracing::debug!(context = %self.context, "Session started");

        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),

                Some(err) = fatal_rx.recv() => {
                    break Err(anyhow!(err).context("Lost access to the cluster"));
                }

                event = events.next() => match event {
                    Some(Event::Tick) => {
                        scheduler.set_cursor(controls.cursor());
                        if let Err(err) = scheduler.on_tick() {
                            break Err(anyhow!(err).context("Failed to draw the dashboard"));
                        }
                    }
                    Some(Event::Key(key)) => {
                        scheduler.set_notice(None);
                        let Some(action) = keybindings.get_action(KeyContext::Dashboard, &key) else {
                            continue;
                        };
                        if controls.apply(action).is_break() {
                            break Ok(());
                        }
                        // Cursor moves show up without waiting for a state change
                        scheduler.set_cursor(controls.cursor());
                    }
                    Some(Event::Resize(_, _)) => scheduler.invalidate(),
                    Some(Event::Error(err)) => {
                        tracing::warn!(error = %err, "Failed to read terminal input");
                        scheduler.set_notice(Some(format!("input error: {}", err)));
                    }
                    None => break Ok(()),
                },
            }
        };

        // Teardown: poll task and every log stream, then the terminal
        cancel.cancel();
        events.shutdown().await;
        if let Err(err) = poll_task.await {
            tracing::error!(error = %err, "Poll task panicked");
        }
        scheduler.wait_idle().await;
        drop(scheduler);

        tracing::debug!("Session ended");
        result
    }
}

/// Owner of the state store: polls, commits, prunes the selection and
/// reconciles log streams, once per tick.
struct PollLoop<S> {
    poller: ResourcePoller<S>,
    timer: PollTimer,
    store: StateStore,
    selection: SelectionFilter,
    tailer: LogTailer<S>,
    fatal: mpsc::UnboundedSender<ClusterError>,
}

impl<S: ClusterSource> PollLoop<S> {
    async fn run(mut self, cancel: CancellationToken) {
        loop {
            let trigger = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                trigger = self.timer.tick() => trigger,
            };
            if trigger == PollTrigger::Refresh {
                tracing::debug!("Refresh requested");
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.poller.poll_if_idle() => result,
            };
            let Some(result) = result else {
                continue;
            };

            // Partial failures are logged by the store as it keeps the old data
            if let Some(err) = result.fatal_error() {
                tracing::error!(error = %err, "Cluster rejected our credentials");
                let _ = self.fatal.send(err.clone());
                break;
            }

            let snapshot = self.store.apply(result);
            let pruned = self.selection.prune(&snapshot);
            if !pruned.is_empty() {
                tracing::debug!(?pruned, "Removed namespaces dropped from the selection");
            }
            self.tailer.reconcile(&snapshot, &self.selection);
        }

        self.tailer.shutdown().await;
        tracing::debug!("Poll loop stopped");
    }
}

/// Applies user actions to the shared state
struct Controls {
    reader: StoreReader,
    selection: SelectionFilter,
    refresh: Arc<Notify>,
    ui: UiState,
}

impl Controls {
    fn new(reader: StoreReader, selection: SelectionFilter, refresh: Arc<Notify>) -> Self {
        Self {
            reader,
            selection,
            refresh,
            ui: UiState::new(),
        }
    }

    fn apply(&mut self, action: Action) -> ControlFlow<()> {
        match action {
            Action::Quit => return ControlFlow::Break(()),
            Action::Refresh => self.refresh.notify_one(),
            Action::ClearSelection => self.selection.clear(),
            Action::ToggleNamespace => {
                let snapshot = self.reader.current();
                if let Some(namespace) = snapshot.namespaces().get(self.ui.cursor) {
                    let selected = self.selection.toggle_namespace(&namespace.name);
                    tracing::debug!(namespace = %namespace.name, selected, "Toggled namespace");
                }
            }
            Action::CursorUp => self.ui.cursor_up(),
            Action::CursorDown => {
                let len = self.reader.current().namespaces().len();
                self.ui.cursor_down(len);
            }
        }
        ControlFlow::Continue(())
    }

    /// Cursor position, kept inside the current namespace list
    fn cursor(&mut self) -> usize {
        self.ui.clamp(self.reader.current().namespaces().len());
        self.ui.cursor
    }
}
