use chrono::{DateTime, Duration, Utc};

use super::FilterState;

#[derive(Debug, Clone)]
struct PendingQuery {
    query: String,
    due_at: DateTime<Utc>,
}

/// Holds the filter currently in force plus at most one text query waiting for its
/// quiet period. Non-text predicates bypass the timer.
#[derive(Debug, Clone)]
pub struct FilterDebouncer {
    applied: FilterState,
    pending: Option<PendingQuery>,
    quiet_period: Duration,
}

impl FilterDebouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            applied: FilterState::default(),
            pending: None,
            quiet_period,
        }
    }

    pub fn applied(&self) -> &FilterState {
        &self.applied
    }

    pub fn pending_query(&self) -> Option<&str> {
        self.pending.as_ref().map(|pending| pending.query.as_str())
    }

    /// Records a keystroke; restarts the quiet period.
    pub fn set_query(&mut self, query: impl Into<String>, now: DateTime<Utc>) {
        self.pending = Some(PendingQuery {
            query: query.into(),
            due_at: now + self.quiet_period,
        });
    }

    /// Applies a non-text predicate change immediately. A pending query keeps waiting.
    pub fn update<F>(&mut self, change: F)
    where
        F: FnOnce(&mut FilterState),
    {
        let query = self.applied.search_query.clone();
        change(&mut self.applied);
        self.applied.search_query = query;
    }

    /// Replaces the whole filter at once, e.g. when loading a saved filter.
    pub fn replace(&mut self, state: FilterState) {
        self.pending = None;
        self.applied = state;
    }

    /// Fires the timer when due. Returns `true` when the applied filter changed.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        match &self.pending {
            Some(pending) if now >= pending.due_at => self.flush(),
            _ => false,
        }
    }

    /// Applies the pending query right away (search submit).
    pub fn flush(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) if pending.query != self.applied.search_query => {
                self.applied.search_query = pending.query;
                true
            }
            _ => false,
        }
    }

    /// Drops the pending query; it will never be applied.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap()
    }

    #[test]
    fn query_applies_only_after_quiet_period() {
        let mut debouncer = FilterDebouncer::new(Duration::milliseconds(300));
        debouncer.set_query("ad", t0());
        assert!(!debouncer.poll(t0() + Duration::milliseconds(100)));
        debouncer.set_query("ada", t0() + Duration::milliseconds(200));
        assert!(!debouncer.poll(t0() + Duration::milliseconds(400)));
        assert!(debouncer.poll(t0() + Duration::milliseconds(500)));
        assert_eq!(debouncer.applied().search_query, "ada");
        assert_eq!(debouncer.pending_query(), None);
    }

    #[test]
    fn cancelled_query_never_fires() {
        let mut debouncer = FilterDebouncer::new(Duration::milliseconds(300));
        debouncer.set_query("lin", t0());
        debouncer.cancel();
        assert!(!debouncer.poll(t0() + Duration::seconds(5)));
        assert_eq!(debouncer.applied().search_query, "");
    }

    #[test]
    fn other_predicates_apply_immediately_without_flushing_query() {
        let mut debouncer = FilterDebouncer::new(Duration::milliseconds(300));
        debouncer.set_query("grace", t0());
        debouncer.update(|state| {
            state.rating_min = 4.0;
            state.search_query = "ignored".to_string();
        });
        assert_eq!(debouncer.applied().rating_min, 4.0);
        assert_eq!(debouncer.applied().search_query, "");
        assert_eq!(debouncer.pending_query(), Some("grace"));
    }

    #[test]
    fn flush_applies_pending_query_early() {
        let mut debouncer = FilterDebouncer::new(Duration::milliseconds(300));
        debouncer.set_query("hopper", t0());
        assert!(debouncer.flush());
        assert_eq!(debouncer.applied().search_query, "hopper");
        assert!(!debouncer.flush());
    }
}
