//! Events emitted when the local chain changes, for subscribers.

use nis_types::{Block, ChainScore};

/// Chain-level events that observers can subscribe to via the
/// [`ChainEventBus`].
#[derive(Clone, Debug)]
pub enum ChainEvent {
    /// Blocks were committed on top of the common block, replacing whatever
    /// local blocks followed it. `score` is the new chain score.
    BlocksCommitted { blocks: Vec<Block>, score: ChainScore },
}

/// Synchronous fan-out event bus.
///
/// Listeners run inline on the committing thread while the update lock is
/// held; keep handlers fast.
pub struct ChainEventBus {
    listeners: Vec<Box<dyn Fn(&ChainEvent) + Send + Sync>>,
}

impl ChainEventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&ChainEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &ChainEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for ChainEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn committed(score: u64) -> ChainEvent {
        ChainEvent::BlocksCommitted {
            blocks: Vec::new(),
            score: ChainScore::new(score),
        }
    }

    #[test]
    fn emit_calls_all_listeners() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut bus = ChainEventBus::new();

        let c1 = Arc::clone(&counter);
        bus.subscribe(Box::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = Arc::clone(&counter);
        bus.subscribe(Box::new(move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        }));

        bus.emit(&committed(1));
        assert_eq!(counter.load(Ordering::SeqCst), 11);
        assert_eq!(bus.listener_count(), 2);
    }

    #[test]
    fn emit_with_no_listeners_is_noop() {
        ChainEventBus::default().emit(&committed(0));
    }

    #[test]
    fn listener_sees_new_score() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut bus = ChainEventBus::new();
        let s = Arc::clone(&seen);
        bus.subscribe(Box::new(move |event| {
            let ChainEvent::BlocksCommitted { score, .. } = event;
            if *score == ChainScore::new(42) {
                s.fetch_add(1, Ordering::SeqCst);
            }
        }));
        bus.emit(&committed(42));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
