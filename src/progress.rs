//! Terminal progress for a running split, fed from the event bus.

use sf_core::events::{Event, EventBus, EventPayload, SplitState};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One line describing `event`, or `None` if it is not worth showing.
pub fn render(event: &Event) -> Option<String> {
    match &event.payload {
        EventPayload::StateChanged { to, .. } => match to {
            SplitState::Probing => Some("probing duration...".into()),
            SplitState::Planning => Some("planning parts...".into()),
            SplitState::Processing { .. } => Some(format!("{to}...")),
            SplitState::Idle | SplitState::Complete | SplitState::Errored => None,
        },
        EventPayload::Progress { percent, .. } => Some(format!("[{percent:>3}%]")),
        EventPayload::SegmentCompleted { index, name, bytes, .. } => {
            Some(format!("  part {} done: {name} ({bytes} bytes)", index + 1))
        }
        EventPayload::Failed { error, .. } => Some(format!("failed: {error}")),
    }
}

/// Print rendered events to stderr until the split reaches a terminal state
/// or `stop` fires. Events already queued when `stop` fires are still shown.
pub fn spawn_reporter(events: &EventBus, stop: CancellationToken) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                biased;
                r = rx.recv() => r,
                _ = stop.cancelled() => break,
            };
            match received {
                Ok(event) => {
                    if let Some(line) = render(&event) {
                        eprintln!("{line}");
                    }
                    if is_terminal(&event) {
                        return;
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::debug!("progress reporter skipped {n} events"),
                Err(RecvError::Closed) => return,
            }
        }

        while let Ok(event) = rx.try_recv() {
            if let Some(line) = render(&event) {
                eprintln!("{line}");
            }
        }
    })
}

fn is_terminal(event: &Event) -> bool {
    matches!(
        event.payload,
        EventPayload::StateChanged { to, .. } if to.is_terminal()
    )
}
