use std::io;
use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// What the session loop reacts to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Frame tick, drives the render scheduler
    Tick,
    Key(KeyEvent),
    Resize(u16, u16),
    /// Reading terminal input failed
    Error(String),
}

/// Merges frame ticks with terminal input into one channel of [`Event`]s
pub struct EventHandler {
    receiver: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EventHandler {
    /// Read the real terminal and tick every `frame_interval`.
    ///
    /// The handler stops with `cancel`, or with [`EventHandler::shutdown`].
    pub fn new(frame_interval: Duration, cancel: CancellationToken) -> Self {
        Self::with_input(EventStream::new(), frame_interval, cancel)
    }

    /// Like [`EventHandler::new`], reading terminal events from `input`
    pub fn with_input<I>(input: I, frame_interval: Duration, cancel: CancellationToken) -> Self
    where
        I: Stream<Item = io::Result<CrosstermEvent>> + Send + Unpin + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(pump(input, frame_interval, sender, cancel.clone()));

        Self {
            receiver,
            cancel,
            task,
        }
    }

    /// Receive the next event, `None` once the handler stopped
    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Stop reading and wait for the reader task
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn pump<I>(
    mut input: I,
    frame_interval: Duration,
    sender: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
) where
    I: Stream<Item = io::Result<CrosstermEvent>> + Unpin,
{
    let mut ticks = tokio::time::interval(frame_interval);
    // A late frame is dropped, never replayed in a burst
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticks.tick() => Some(Event::Tick),
            read = input.next() => match read {
                Some(Ok(event)) => translate(event),
                Some(Err(err)) => Some(Event::Error(err.to_string())),
                None => {
                    // Without input there is no way to quit, so the handler ends
                    tracing::warn!("Terminal input closed");
                    break;
                }
            },
        };

        if let Some(event) = event {
            if sender.send(event).is_err() {
                break;
            }
        }
    }

    tracing::debug!("Terminal event reader stopped");
}

/// Keep key presses and resizes; releases, repeats, mouse and focus changes
/// mean nothing to the dashboard.
fn translate(event: CrosstermEvent) -> Option<Event> {
    match event {
        CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
        CrosstermEvent::Resize(width, height) => Some(Event::Resize(width, height)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEventState, KeyModifiers};
    use futures::stream;

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_translate_keeps_presses_and_resizes() {
        let press = key(KeyCode::Char('q'), KeyEventKind::Press);
        assert_eq!(translate(CrosstermEvent::Key(press)), Some(Event::Key(press)));
        assert_eq!(
            translate(CrosstermEvent::Resize(80, 24)),
            Some(Event::Resize(80, 24))
        );

        let release = key(KeyCode::Char('q'), KeyEventKind::Release);
        assert_eq!(translate(CrosstermEvent::Key(release)), None);
        assert_eq!(translate(CrosstermEvent::FocusLost), None);
    }

    #[tokio::test]
    async fn test_input_and_errors_reach_the_channel() {
        let space = key(KeyCode::Char(' '), KeyEventKind::Press);
        let input = stream::iter(vec![
            Ok(CrosstermEvent::Key(key(KeyCode::Char(' '), KeyEventKind::Release))),
            Ok(CrosstermEvent::Key(space)),
            Err(io::Error::other("device lost")),
        ])
        .chain(stream::pending());

        let mut events =
            EventHandler::with_input(input, Duration::from_secs(3600), CancellationToken::new());

        // The first tick fires right away, the key release is dropped
        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(events.next().await);
        }
        assert!(received.contains(&Some(Event::Tick)));
        assert!(received.contains(&Some(Event::Key(space))));
        assert!(received.contains(&Some(Event::Error("device lost".to_string()))));

        events.shutdown().await;
    }

    #[tokio::test]
    async fn test_closed_input_ends_the_handler() {
        let mut events = EventHandler::with_input(
            stream::empty::<io::Result<CrosstermEvent>>(),
            Duration::from_secs(3600),
            CancellationToken::new(),
        );

        // At most the first tick gets through before the input is seen closed
        let mut received = Vec::new();
        while let Some(event) = events.next().await {
            received.push(event);
        }
        assert!(received.iter().all(|event| *event == Event::Tick));
        assert!(received.len() <= 1);
    }
}
