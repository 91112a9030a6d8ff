//! Cancellable one-shot timers keyed by purpose.
//!
//! At most one timer per purpose is live. Starting a timer cancels the
//! previous one of the same purpose, and every firing carries a generation so
//! a firing that raced with its own cancellation can be recognised and dropped.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerPurpose {
    HoldTick,
    Ringing,
    DeniedReset,
    SettleReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub purpose: TimerPurpose,
    pub generation: u64,
}

pub struct Timers {
    fired_tx: mpsc::UnboundedSender<TimerFired>,
    live: HashMap<TimerPurpose, (u64, CancellationToken)>,
    next_generation: u64,
}

impl Timers {
    pub fn new(fired_tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            fired_tx,
            live: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn start(&mut self, purpose: TimerPurpose, after: Duration) {
        self.cancel(purpose);

        self.next_generation += 1;
        let fired = TimerFired {
            purpose,
            generation: self.next_generation,
        };
        let token = CancellationToken::new();
        self.live.insert(purpose, (fired.generation, token.clone()));

        let tx = self.fired_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    let _ = tx.send(fired);
                }
            }
        });
    }

    pub fn cancel(&mut self, purpose: TimerPurpose) {
        if let Some((_, token)) = self.live.remove(&purpose) {
            token.cancel();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, (_, token)) in self.live.drain() {
            token.cancel();
        }
    }

    pub fn is_live(&self, purpose: TimerPurpose) -> bool {
        self.live.contains_key(&purpose)
    }

    /// Accepts a firing if it belongs to the live timer of its purpose,
    /// retiring that timer. Stale firings return `false`.
    pub fn accept(&mut self, fired: TimerFired) -> bool {
        match self.live.get(&fired.purpose) {
            Some((generation, _)) if *generation == fired.generation => {
                self.live.remove(&fired.purpose);
                true
            }
            _ => false,
        }
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
