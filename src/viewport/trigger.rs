use crate::error::{AppError, Result};

/// Identity of the sentinel element the host is reporting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SentinelId(pub u64);

/// One visibility report from the host for a sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityEntry {
    pub sentinel: SentinelId,
    /// Visible fraction of the sentinel's area, `0.0..=1.0`.
    pub intersection_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerGate {
    pub loading: bool,
    pub has_more: bool,
}

type LoadMore = Box<dyn FnMut() + Send>;

/// Calls `on_load_more` once each time the observed sentinel crosses into view.
pub struct ViewportTrigger {
    threshold: f64,
    target: Option<SentinelId>,
    visible: bool,
    on_load_more: Option<LoadMore>,
}

impl ViewportTrigger {
    pub fn new<F>(threshold: f64, on_load_more: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AppError::Config(format!(
                "viewport threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        Ok(Self {
            threshold,
            target: None,
            visible: false,
            on_load_more: Some(Box::new(on_load_more)),
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Starts observing `sentinel`, replacing any previous target.
    pub fn observe(&mut self, sentinel: SentinelId) {
        if self.target != Some(sentinel) {
            self.target = Some(sentinel);
            self.visible = false;
        }
    }

    /// Releases the observation; nothing fires afterwards.
    pub fn disconnect(&mut self) {
        self.target = None;
        self.visible = false;
        self.on_load_more = None;
    }

    pub fn is_connected(&self) -> bool {
        self.on_load_more.is_some() && self.target.is_some()
    }

    /// Feeds a host visibility report. Returns whether `on_load_more` ran.
    pub fn on_visibility(&mut self, entry: VisibilityEntry, gate: TriggerGate) -> bool {
        if self.target != Some(entry.sentinel) {
            return false;
        }
        let Some(on_load_more) = self.on_load_more.as_mut() else {
            return false;
        };

        let now_visible = if self.threshold == 0.0 {
            entry.intersection_ratio > 0.0
        } else {
            entry.intersection_ratio >= self.threshold
        };
        let entered = now_visible && !self.visible;
        self.visible = now_visible;

        if entered && !gate.loading && gate.has_more {
            on_load_more();
            return true;
        }

        false
    }
}

impl std::fmt::Debug for ViewportTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportTrigger")
            .field("threshold", &self.threshold)
            .field("target", &self.target)
            .field("visible", &self.visible)
            .field("connected", &self.on_load_more.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const SENTINEL: SentinelId = SentinelId(1);
    const OPEN: TriggerGate = TriggerGate {
        loading: false,
        has_more: true,
    };

    fn counting_trigger(threshold: f64) -> (ViewportTrigger, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut trigger = ViewportTrigger::new(threshold, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        trigger.observe(SENTINEL);
        (trigger, calls)
    }

    fn entry(ratio: f64) -> VisibilityEntry {
        VisibilityEntry {
            sentinel: SENTINEL,
            intersection_ratio: ratio,
        }
    }

    #[test]
    fn test_fires_on_entering_view() {
        let (mut trigger, calls) = counting_trigger(0.5);

        assert!(!trigger.on_visibility(entry(0.2), OPEN));
        assert!(trigger.on_visibility(entry(0.6), OPEN));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_does_not_fire_while_loading() {
        let (mut trigger, calls) = counting_trigger(0.0);
        let loading = TriggerGate {
            loading: true,
            has_more: true,
        };

        assert!(!trigger.on_visibility(entry(1.0), loading));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_does_not_fire_without_more_pages() {
        let (mut trigger, calls) = counting_trigger(0.0);
        let exhausted = TriggerGate {
            loading: false,
            has_more: false,
        };

        assert!(!trigger.on_visibility(entry(1.0), exhausted));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fires_once_while_continuously_visible() {
        let (mut trigger, calls) = counting_trigger(0.1);

        trigger.on_visibility(entry(0.5), OPEN);
        trigger.on_visibility(entry(0.8), OPEN);
        trigger.on_visibility(entry(1.0), OPEN);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        trigger.on_visibility(entry(0.0), OPEN);
        trigger.on_visibility(entry(0.5), OPEN);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_ignores_entries_for_other_sentinels() {
        let (mut trigger, calls) = counting_trigger(0.0);

        trigger.observe(SentinelId(2));
        assert!(!trigger.on_visibility(entry(1.0), OPEN));
        assert!(trigger.on_visibility(
            VisibilityEntry {
                sentinel: SentinelId(2),
                intersection_ratio: 1.0
            },
            OPEN
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disconnect_stops_callbacks() {
        let (mut trigger, calls) = counting_trigger(0.0);

        trigger.disconnect();
        trigger.observe(SENTINEL);
        assert!(!trigger.on_visibility(entry(1.0), OPEN));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!trigger.is_connected());
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        assert!(ViewportTrigger::new(1.5, || {}).is_err());
        assert!(ViewportTrigger::new(-0.1, || {}).is_err());
        assert!(ViewportTrigger::new(f64::NAN, || {}).is_err());
    }
}
