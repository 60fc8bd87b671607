//! Single-slot timers. Arming cancels whatever was pending first, so a
//! callback can only ever be outstanding once; timers re-arm, never stack.

use std::time::Duration;

use tokio::sync::mpsc;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
pub struct SlotTimer {
    pending: Option<tokio::task::JoinHandle<()>>,
}

impl SlotTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm<F>(&mut self, after: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            callback();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for SlotTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Debounced search input: every keystroke re-arms the slot timer, and only
/// the query that survives the quiet window is submitted. An empty query is
/// submitted too, telling the consumer to clear the result list.
pub struct SearchBox {
    timer: SlotTimer,
    queries: mpsc::UnboundedSender<String>,
}

impl SearchBox {
    pub fn new(queries: mpsc::UnboundedSender<String>) -> Self {
        Self { timer: SlotTimer::new(), queries }
    }

    pub fn input(&mut self, query: &str) {
        let query = query.trim().to_owned();
        let queries = self.queries.clone();
        self.timer.arm(SEARCH_DEBOUNCE, move || {
            let _ = queries.send(query);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rearming_cancels_the_pending_callback() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = SlotTimer::new();

        let first = tx.clone();
        timer.arm(Duration::from_millis(500), move || {
            let _ = first.send(1);
        });
        tokio::time::advance(Duration::from_millis(300)).await;

        let second = tx.clone();
        timer.arm(Duration::from_millis(500), move || {
            let _ = second.send(2);
        });

        assert_eq!(rx.recv().await, Some(2));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_callback() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u8>();
        let mut timer = SlotTimer::new();
        timer.arm(Duration::from_millis(500), move || {
            let _ = tx.send(1);
        });
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_last_query_of_a_burst_is_submitted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut search = SearchBox::new(tx);

        search.input("a");
        tokio::time::advance(Duration::from_millis(100)).await;
        search.input("an");
        tokio::time::advance(Duration::from_millis(100)).await;
        search.input("ann");

        assert_eq!(rx.recv().await.as_deref(), Some("ann"));
        assert!(rx.try_recv().is_err());
    }
}
