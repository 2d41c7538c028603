//! # Scheduler
//!
//! Single time source and timer facility of the tower.
//!
//! `now()` is frozen at the start of every event loop turn so all decisions
//! taken while handling one message agree on the current instant. Timers are
//! tokio tasks that post a [`TowerEvent::TimerFired`] back into the mailbox;
//! they never touch tower state themselves. A cancelled timer whose fire
//! notification is already queued is recognised as stale and dropped.

use super::types::{TimerAction, TowerEvent};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::trace;

pub type TimerId = u64;

/// Cancellation token of an armed timer
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    task: AbortHandle,
}

impl TimerHandle {
    pub fn id(&self) -> TimerId {
        self.id
    }
}

#[derive(Debug)]
pub struct Scheduler {
    mailbox: mpsc::UnboundedSender<TowerEvent>,
    epoch: DateTime<Utc>,
    origin: Instant,
    now: DateTime<Utc>,
    next_timer_id: TimerId,
    armed: HashSet<TimerId>,
}

impl Scheduler {
    /// Wall-clock `epoch` corresponds to the tokio instant at construction
    pub fn new(mailbox: mpsc::UnboundedSender<TowerEvent>, epoch: DateTime<Utc>) -> Self {
        Self {
            mailbox,
            epoch,
            origin: Instant::now(),
            now: epoch,
            next_timer_id: 1,
            armed: HashSet::new(),
        }
    }

    /// Current instant, stable for the whole turn
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Advance `now()` to the current clock reading
    pub fn begin_turn(&mut self) {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.now = self.epoch + elapsed;
    }

    /// Run `action` on the event loop after `delay`. A zero delay still
    /// runs on a later turn.
    pub fn set_timeout(&mut self, delay: Duration, action: TimerAction) -> TimerHandle {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        self.armed.insert(id);

        trace!(timer_id = id, ?action, delay_ms = delay.as_millis() as u64, "Timer armed");

        let mailbox = self.mailbox.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The loop may already be gone during shutdown
            let _ = mailbox.send(TowerEvent::TimerFired {
                timer_id: id,
                action,
            });
        });

        TimerHandle {
            id,
            task: task.abort_handle(),
        }
    }

    /// Idempotent
    pub fn cancel(&mut self, handle: TimerHandle) {
        if self.armed.remove(&handle.id) {
            trace!(timer_id = handle.id, "Timer cancelled");
        }
        handle.task.abort();
    }

    /// Consume a fire notification. False when the timer was cancelled in
    /// the meantime.
    pub fn take_fired(&mut self, timer_id: TimerId) -> bool {
        self.armed.remove(&timer_id)
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    pub fn mailbox(&self) -> &mpsc::UnboundedSender<TowerEvent> {
        &self.mailbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PsTimer;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_now_is_frozen_until_next_turn() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::new(tx, epoch());
        scheduler.begin_turn();
        assert_eq!(scheduler.now(), epoch());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(scheduler.now(), epoch());

        scheduler.begin_turn();
        assert_eq!(scheduler.now(), epoch() + chrono::Duration::seconds(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_into_mailbox() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::new(tx, epoch());
        let action = TimerAction::Ps {
            ps_id: 3,
            timer: PsTimer::LateArrival,
        };
        let handle = scheduler.set_timeout(Duration::from_secs(2), action);

        match rx.recv().await {
            Some(TowerEvent::TimerFired { timer_id, action }) => {
                assert_eq!(timer_id, handle.id());
                assert_eq!(action, TimerAction::Ps { ps_id: 3, timer: PsTimer::LateArrival });
                assert!(scheduler.take_fired(timer_id));
                assert!(!scheduler.take_fired(timer_id));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_is_stale() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::new(tx, epoch());
        let handle = scheduler.set_timeout(Duration::ZERO, TimerAction::Bury { ps_id: 1 });
        let id = handle.id();

        tokio::task::yield_now().await;
        scheduler.cancel(handle);

        // The notification may have been queued before the cancel
        if let Ok(TowerEvent::TimerFired { timer_id, .. }) = rx.try_recv() {
            assert_eq!(timer_id, id);
        }
        assert!(!scheduler.take_fired(id));
        assert_eq!(scheduler.armed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent_for_fresh_ids() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::new(tx, epoch());
        let first = scheduler.set_timeout(Duration::from_secs(60), TimerAction::Bury { ps_id: 1 });
        let second = scheduler.set_timeout(Duration::from_secs(60), TimerAction::Bury { ps_id: 2 });
        assert_ne!(first.id(), second.id());
        scheduler.cancel(first);
        assert_eq!(scheduler.armed_count(), 1);
        scheduler.cancel(second);
        assert_eq!(scheduler.armed_count(), 0);
    }
}
