/// Number of sequence numbers below the highest one that are still tracked.
const WINDOW_SIZE: u64 = 64;

/// Sliding anti-replay window over the record sequence numbers of one epoch.
///
/// Bit `n` of `seen` stands for sequence number `highest - n`.
#[derive(Debug, Default, Clone)]
pub struct ReplayWindow {
    highest: Option<u64>,
    seen: u64,
}

impl ReplayWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a record with `seqno` may be processed.
    ///
    /// Does not record anything. Call [`ReplayWindow::mark`] once the record
    /// authenticated.
    pub fn is_fresh(&self, seqno: u64) -> bool {
        let Some(highest) = self.highest else {
            return true;
        };
        match highest.checked_sub(seqno) {
            None => true,
            Some(age) => age < WINDOW_SIZE && self.seen & (1 << age) == 0,
        }
    }

    /// Record `seqno` as received, sliding the window forward if it is new.
    pub fn mark(&mut self, seqno: u64) {
        let Some(highest) = self.highest else {
            self.highest = Some(seqno);
            self.seen = 1;
            return;
        };

        if seqno > highest {
            let shift = seqno - highest;
            self.seen = if shift < WINDOW_SIZE { self.seen << shift } else { 0 };
            self.seen |= 1;
            self.highest = Some(seqno);
        } else if highest - seqno < WINDOW_SIZE {
            self.seen |= 1 << (highest - seqno);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(w: &mut ReplayWindow, seqno: u64) -> bool {
        let fresh = w.is_fresh(seqno);
        if fresh {
            w.mark(seqno);
        }
        fresh
    }

    #[test]
    fn first_record_may_be_zero() {
        let mut w = ReplayWindow::new();
        assert!(accept(&mut w, 0));
        assert!(!accept(&mut w, 0));
        assert!(accept(&mut w, 1));
    }

    #[test]
    fn reordered_records_inside_window() {
        let mut w = ReplayWindow::new();
        assert!(accept(&mut w, 10));
        assert!(accept(&mut w, 7));
        assert!(!accept(&mut w, 7));
        assert!(accept(&mut w, 9));
        assert!(!accept(&mut w, 10));
    }

    #[test]
    fn window_edge() {
        let mut w = ReplayWindow::new();
        assert!(accept(&mut w, 100));
        assert!(!w.is_fresh(36));
        assert!(accept(&mut w, 37));
        assert!(!accept(&mut w, 37));
    }

    #[test]
    fn checking_does_not_consume() {
        let mut w = ReplayWindow::new();
        w.mark(5);
        assert!(w.is_fresh(6));
        assert!(w.is_fresh(6));
        assert!(w.is_fresh(4));
    }

    #[test]
    fn jump_clears_history() {
        let mut w = ReplayWindow::new();
        assert!(accept(&mut w, 1));
        assert!(accept(&mut w, 500));
        assert!(accept(&mut w, 499));
        assert!(!accept(&mut w, 1));
        assert!(!accept(&mut w, 500));
    }
}
