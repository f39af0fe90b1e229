use tokio::sync::mpsc;
use tokio::time::{self, Duration};

// ── Timer events ────────────────────────────────────────────────────────────

/// Events emitted by the per-question countdown into the host's event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// One second elapsed; `remaining` is the value to broadcast.
    Tick { remaining: u32 },
    /// The countdown reached zero. Emitted exactly once per started timer.
    Expired,
}

// ── QuestionTimer ───────────────────────────────────────────────────────────

/// The single countdown driving question progression in multiplayer mode.
///
/// At most one countdown is live: `start` cancels any prior one. The timer
/// never touches game state itself; it only emits events into the channel,
/// so all mutation stays on the host's event loop.
#[derive(Debug, Default)]
pub struct QuestionTimer {
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl QuestionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a countdown of `seconds`, emitting a `Tick` after each elapsed
    /// second and a final `Expired` when the count reaches zero.
    pub fn start(&mut self, seconds: u32, event_tx: mpsc::Sender<TimerEvent>) {
        self.cancel();

        let handle = tokio::spawn(async move {
            let mut remaining = seconds;
            let mut interval = time::interval(Duration::from_secs(1));
            // The first interval tick completes immediately; skip it so the
            // first emitted tick lands one second after start.
            interval.tick().await;

            loop {
                interval.tick().await;
                remaining = remaining.saturating_sub(1);
                if event_tx.send(TimerEvent::Tick { remaining }).await.is_err() {
                    return; // receiver gone, session is tearing down
                }
                if remaining == 0 {
                    let _ = event_tx.send(TimerEvent::Expired).await;
                    return;
                }
            }
        });

        self.handle = Some(handle);
    }

    /// Stop the countdown without emitting `Expired`. Safe when no timer is
    /// running.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for QuestionTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Collect events until `Expired` or the channel closes.
    async fn collect_until_expired(rx: &mut mpsc::Receiver<TimerEvent>) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            let done = ev == TimerEvent::Expired;
            events.push(ev);
            if done {
                break;
            }
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_down_then_expires_once() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut timer = QuestionTimer::new();
        timer.start(3, tx);

        let events = collect_until_expired(&mut rx).await;
        assert_eq!(
            events,
            vec![
                TimerEvent::Tick { remaining: 2 },
                TimerEvent::Tick { remaining: 1 },
                TimerEvent::Tick { remaining: 0 },
                TimerEvent::Expired,
            ]
        );

        // Nothing after Expired: the sender is dropped with the task done.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_expiry() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut timer = QuestionTimer::new();
        timer.start(30, tx);

        // Let one tick through, then cancel.
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev, TimerEvent::Tick { remaining: 29 });
        timer.cancel();

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_cancels_prior_countdown() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut timer = QuestionTimer::new();
        timer.start(100, tx.clone());
        timer.start(2, tx);

        let events = collect_until_expired(&mut rx).await;
        assert_eq!(
            events,
            vec![
                TimerEvent::Tick { remaining: 1 },
                TimerEvent::Tick { remaining: 0 },
                TimerEvent::Expired,
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_without_start_is_safe() {
        let mut timer = QuestionTimer::new();
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_running_reflects_lifecycle() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut timer = QuestionTimer::new();
        assert!(!timer.is_running());

        timer.start(1, tx);
        assert!(timer.is_running());

        let _ = collect_until_expired(&mut rx).await;
        // Give the finished task a tick to settle.
        tokio::task::yield_now().await;
        assert!(!timer.is_running());
    }
}
