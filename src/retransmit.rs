//! Context wide queue of flights awaiting an answer.
//!
//! The peers own the flights themselves; the queue only knows when each one is
//! due and how many more attempts it gets.

use std::time::Instant;

use crate::peer::Session;
use crate::timer::ExponentialBackoff;

#[derive(Debug)]
struct Entry {
    session: Session,
    fire_at: Instant,
    backoff: ExponentialBackoff,
}

#[derive(Debug, Default)]
pub(crate) struct RetransmitQueue {
    entries: Vec<Entry>,
}

impl RetransmitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the timer for a freshly sent flight. Replaces any earlier entry for the session.
    pub fn schedule(&mut self, session: Session, now: Instant, backoff: ExponentialBackoff) {
        let fire_at = now + backoff.rto();
        self.requeue(session, fire_at, backoff);
    }

    /// Put an entry back after a retransmission.
    pub fn requeue(&mut self, session: Session, fire_at: Instant, backoff: ExponentialBackoff) {
        self.cancel(&session);
        trace!("Retransmit for {:?} at {:?}", session, fire_at);
        self.entries.push(Entry {
            session,
            fire_at,
            backoff,
        });
    }

    pub fn cancel(&mut self, session: &Session) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.session != *session);
        self.entries.len() != before
    }

    /// The earliest deadline in the queue.
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.fire_at).min()
    }

    /// Remove and return every entry due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(Session, ExponentialBackoff)> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|e| e.fire_at <= now);
        self.entries = pending;

        due.sort_by_key(|e| e.fire_at);
        due.into_iter().map(|e| (e.session, e.backoff)).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::rng::SeededRng;

    fn session(port: u16) -> Session {
        Session::new(([127, 0, 0, 1], port).into(), 0)
    }

    #[test]
    fn earliest_deadline_wins() {
        let mut rng = SeededRng::new(Some(1));
        let now = Instant::now();
        let mut q = RetransmitQueue::new();
        assert_eq!(q.poll_timeout(), None);

        let slow = ExponentialBackoff::new(Duration::from_secs(4), 2, &mut rng);
        let fast = ExponentialBackoff::new(Duration::from_secs(1), 2, &mut rng);
        let fast_at = now + fast.rto();

        q.schedule(session(1), now, slow);
        q.schedule(session(2), now, fast);

        assert_eq!(q.poll_timeout(), Some(fast_at));
    }

    #[test]
    fn schedule_replaces() {
        let mut rng = SeededRng::new(Some(1));
        let now = Instant::now();
        let mut q = RetransmitQueue::new();

        let b = ExponentialBackoff::new(Duration::from_secs(1), 2, &mut rng);
        q.schedule(session(1), now, b.clone());
        q.schedule(session(1), now + Duration::from_secs(10), b.clone());
        assert_eq!(q.len(), 1);
        assert_eq!(q.poll_timeout(), Some(now + Duration::from_secs(10) + b.rto()));

        assert!(q.cancel(&session(1)));
        assert!(!q.cancel(&session(1)));
        assert_eq!(q.poll_timeout(), None);
    }

    #[test]
    fn take_due_leaves_future_entries() {
        let mut rng = SeededRng::new(Some(1));
        let now = Instant::now();
        let mut q = RetransmitQueue::new();

        let b = ExponentialBackoff::new(Duration::from_secs(1), 2, &mut rng);
        q.requeue(session(1), now + Duration::from_secs(2), b.clone());
        q.requeue(session(2), now + Duration::from_secs(1), b.clone());
        q.requeue(session(3), now + Duration::from_secs(9), b);

        let due = q.take_due(now + Duration::from_secs(5));
        let order: Vec<_> = due.iter().map(|(s, _)| s.addr.port()).collect();
        assert_eq!(order, vec![2, 1]);

        assert_eq!(q.len(), 1);
        assert_eq!(q.poll_timeout(), Some(now + Duration::from_secs(9)));
    }
}
