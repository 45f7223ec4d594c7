use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use klances_logs::LogStore;
use klances_state::{SelectionFilter, StoreReader};

use super::{DashboardView, Renderer};

/// What a scheduler tick did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// A redraw was dispatched
    Rendered,
    /// Nothing changed since the last dispatched redraw
    Unchanged,
    /// The previous redraw is still running, this tick is dropped
    Busy,
}

/// Everything the view depends on, compared tick to tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Marker {
    store_version: u64,
    selection_generation: u64,
    log_generation: u64,
    cursor: usize,
    notice_generation: u64,
}

/// Pushes the current state to a [`Renderer`], at most once per tick and only
/// when something changed.
pub struct RenderScheduler<R> {
    context: String,
    store: StoreReader,
    selection: SelectionFilter,
    logs: LogStore,
    log_window: usize,
    cursor: usize,
    notice: Option<String>,
    notice_generation: u64,
    last: Option<Marker>,
    renderer: Arc<Mutex<R>>,
    in_flight: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<io::Error>>>,
}

impl<R: Renderer> RenderScheduler<R> {
    /// `log_window` is the number of lines per pod handed to the renderer
    pub fn new(
        renderer: R,
        store: StoreReader,
        selection: SelectionFilter,
        logs: LogStore,
        log_window: usize,
    ) -> Self {
        Self {
            context: String::new(),
            store,
            selection,
            logs,
            log_window,
            cursor: 0,
            notice: None,
            notice_generation: 0,
            last: None,
            renderer: Arc::new(Mutex::new(renderer)),
            in_flight: Arc::new(AtomicBool::new(false)),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Set the cluster context shown in the header
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    /// Show or clear a notice in the status bar
    pub fn set_notice(&mut self, notice: Option<String>) {
        if self.notice != notice {
            self.notice = notice;
            self.notice_generation += 1;
        }
    }

    /// Force a redraw on the next tick, e.g. after a terminal resize
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    /// Whether no redraw is running
    pub fn is_idle(&self) -> bool {
        !self.in_flight.load(Ordering::Acquire)
    }

    /// Frame tick: dispatch a redraw if anything changed and none is running.
    ///
    /// Returns the error of the previous redraw if it failed.
    pub fn on_tick(&mut self) -> io::Result<TickOutcome> {
        if let Some(err) = self.failure.lock().take() {
            self.last = None;
            return Err(err);
        }

        let marker = self.marker();
        if self.last == Some(marker) {
            return Ok(TickOutcome::Unchanged);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!("Redraw still running, dropping frame");
            return Ok(TickOutcome::Busy);
        }

        let view = self.build_view();
        self.last = Some(marker);

        let renderer = Arc::clone(&self.renderer);
        let in_flight = Arc::clone(&self.in_flight);
        let failure = Arc::clone(&self.failure);
        tokio::task::spawn_blocking(move || {
            let result = renderer.lock().render(&view);
            if let Err(err) = result {
                tracing::error!(error = %err, "Redraw failed");
                *failure.lock() = Some(err);
            }
            in_flight.store(false, Ordering::Release);
        });

        Ok(TickOutcome::Rendered)
    }

    /// Wait for a running redraw to finish
    pub async fn wait_idle(&self) {
        while !self.is_idle() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn marker(&self) -> Marker {
        Marker {
            store_version: self.store.version(),
            selection_generation: self.selection.generation(),
            log_generation: self.logs.generation(),
            cursor: self.cursor,
            notice_generation: self.notice_generation,
        }
    }

    fn build_view(&self) -> DashboardView {
        let snapshot = self.store.current();
        let pods = self.selection.filtered_pods(&snapshot);
        let keys: Vec<_> = pods.iter().map(|pod| pod.key()).collect();

        DashboardView {
            context: self.context.clone(),
            selection: self.selection.filtered_namespace_ids(),
            logs: self.logs.window(&keys, self.log_window),
            faults: self.logs.faults(&keys),
            cursor: self.cursor,
            notice: self.notice.clone(),
            pods,
            snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use klances_state::{PollResult, StateStore};
    use klances_types::{NamespaceInfo, NamespacePhase, PodInfo, PodKey};
    use std::sync::mpsc;

    /// Records every view it is asked to draw
    #[derive(Clone, Default)]
    struct Recorder {
        views: Arc<Mutex<Vec<DashboardView>>>,
    }

    impl Renderer for Recorder {
        fn render(&mut self, view: &DashboardView) -> io::Result<()> {
            self.views.lock().push(view.clone());
            Ok(())
        }
    }

    /// Blocks each draw until the test lets it go
    struct Gated {
        release: mpsc::Receiver<()>,
        calls: Arc<Mutex<u32>>,
    }

    impl Renderer for Gated {
        fn render(&mut self, _view: &DashboardView) -> io::Result<()> {
            *self.calls.lock() += 1;
            let _ = self.release.recv();
            Ok(())
        }
    }

    struct Failing;

    impl Renderer for Failing {
        fn render(&mut self, _view: &DashboardView) -> io::Result<()> {
            Err(io::Error::other("terminal gone"))
        }
    }

    fn populated_store() -> StateStore {
        let mut store = StateStore::new();
        store.apply(PollResult {
            nodes: Ok(vec![]),
            namespaces: Ok(vec![
                NamespaceInfo::new("default", NamespacePhase::Active),
                NamespaceInfo::new("kube", NamespacePhase::Active),
            ]),
            pods: Ok(vec![
                PodInfo::new("default", "pod-a"),
                PodInfo::new("kube", "pod-b"),
            ]),
        });
        store
    }

    fn scheduler<R: Renderer>(renderer: R, store: &StateStore) -> RenderScheduler<R> {
        RenderScheduler::new(
            renderer,
            store.reader(),
            SelectionFilter::new(),
            LogStore::new(100),
            2,
        )
    }

    async fn tick<R: Renderer>(scheduler: &mut RenderScheduler<R>) -> TickOutcome {
        let outcome = scheduler.on_tick().unwrap();
        scheduler.wait_idle().await;
        outcome
    }

    #[tokio::test]
    async fn test_unchanged_ticks_render_once() {
        let store = populated_store();
        let recorder = Recorder::default();
        let mut scheduler = scheduler(recorder.clone(), &store);

        assert_eq!(scheduler.on_tick().unwrap(), TickOutcome::Rendered);
        scheduler.wait_idle().await;
        assert_eq!(scheduler.on_tick().unwrap(), TickOutcome::Unchanged);
        scheduler.wait_idle().await;

        assert_eq!(recorder.views.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_each_input_triggers_redraw() {
        let mut store = populated_store();
        let recorder = Recorder::default();
        let selection = SelectionFilter::new();
        let logs = LogStore::new(100);
        let mut scheduler = RenderScheduler::new(
            recorder.clone(),
            store.reader(),
            selection.clone(),
            logs.clone(),
            2,
        );

        assert_eq!(tick(&mut scheduler).await, TickOutcome::Rendered);

        selection.toggle_namespace("kube");
        assert_eq!(tick(&mut scheduler).await, TickOutcome::Rendered);

        logs.append(&PodKey::new("kube", "pod-b"), "hello");
        assert_eq!(tick(&mut scheduler).await, TickOutcome::Rendered);

        scheduler.set_cursor(1);
        assert_eq!(tick(&mut scheduler).await, TickOutcome::Rendered);

        store.apply(PollResult {
            nodes: Ok(vec![]),
            namespaces: Ok(vec![]),
            pods: Ok(vec![]),
        });
        assert_eq!(tick(&mut scheduler).await, TickOutcome::Rendered);
        assert_eq!(tick(&mut scheduler).await, TickOutcome::Unchanged);

        assert_eq!(recorder.views.lock().len(), 5);
    }

    #[tokio::test]
    async fn test_view_contents() {
        let store = populated_store();
        let recorder = Recorder::default();
        let selection = SelectionFilter::new();
        let logs = LogStore::new(100);
        let mut scheduler = RenderScheduler::new(
            recorder.clone(),
            store.reader(),
            selection.clone(),
            logs.clone(),
            2,
        )
        .with_context("prod");

        selection.set_selection(["kube"]);
        let pod_b = PodKey::new("kube", "pod-b");
        for i in 0..5 {
            logs.append(&pod_b, format!("line {}", i));
        }
        logs.append(&PodKey::new("default", "pod-a"), "hidden");
        scheduler.set_cursor(1);

        scheduler.on_tick().unwrap();
        scheduler.wait_idle().await;

        let views = recorder.views.lock();
        let view = &views[0];
        assert_eq!(view.context, "prod");
        assert_eq!(view.pods.len(), 1);
        assert_eq!(view.pods[0].key(), pod_b);
        assert_eq!(view.logs.len(), 1);
        let texts: Vec<&str> = view.logs[&pod_b].iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["line 3", "line 4"]);
        assert_eq!(view.focused_namespace(), Some("kube"));
    }

    #[tokio::test]
    async fn test_notice_changes_redraw() {
        let store = populated_store();
        let recorder = Recorder::default();
        let mut scheduler = scheduler(recorder.clone(), &store);
        assert_eq!(tick(&mut scheduler).await, TickOutcome::Rendered);

        scheduler.set_notice(Some("input error".to_string()));
        assert_eq!(tick(&mut scheduler).await, TickOutcome::Rendered);
        scheduler.set_notice(Some("input error".to_string()));
        assert_eq!(tick(&mut scheduler).await, TickOutcome::Unchanged);
        scheduler.set_notice(None);
        assert_eq!(tick(&mut scheduler).await, TickOutcome::Rendered);

        let views = recorder.views.lock();
        let notices: Vec<Option<&str>> = views.iter().map(|v| v.notice.as_deref()).collect();
        assert_eq!(notices, vec![None, Some("input error"), None]);
    }

    #[tokio::test]
    async fn test_busy_renderer_drops_tick() {
        let store = populated_store();
        let (release, gate) = mpsc::channel();
        let calls = Arc::new(Mutex::new(0));
        let mut scheduler = scheduler(
            Gated {
                release: gate,
                calls: Arc::clone(&calls),
            },
            &store,
        );

        assert_eq!(scheduler.on_tick().unwrap(), TickOutcome::Rendered);
        scheduler.set_cursor(1);
        assert_eq!(scheduler.on_tick().unwrap(), TickOutcome::Busy);
        assert!(!scheduler.is_idle());

        release.send(()).unwrap();
        scheduler.wait_idle().await;

        // The dropped change is picked up by the next free tick
        assert_eq!(scheduler.on_tick().unwrap(), TickOutcome::Rendered);
        release.send(()).unwrap();
        scheduler.wait_idle().await;
        assert_eq!(*calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_failed_redraw_reported_next_tick() {
        let store = populated_store();
        let mut scheduler = scheduler(Failing, &store);

        assert_eq!(scheduler.on_tick().unwrap(), TickOutcome::Rendered);
        scheduler.wait_idle().await;

        let err = scheduler.on_tick().unwrap_err();
        assert_eq!(err.to_string(), "terminal gone");

        // The failed frame is retried
        assert_eq!(scheduler.on_tick().unwrap(), TickOutcome::Rendered);
    }
}
