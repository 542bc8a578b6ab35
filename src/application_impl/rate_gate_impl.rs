use crate::domain_port::RateGate;
use dashmap::DashMap;

/// Fixed-window per-client counter. Coarse on purpose; the ingress filter
/// only needs a yes/no answer per request.
pub struct FixedWindowRateGate {
    windows: DashMap<String, Window>,
    max_requests: u32,
    window_ms: i64,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at_ms: i64,
    count: u32,
}

impl FixedWindowRateGate {
    pub fn new(max_requests: u32, window_ms: i64) -> Self {
        FixedWindowRateGate {
            windows: DashMap::new(),
            max_requests,
            window_ms,
        }
    }
}

impl RateGate for FixedWindowRateGate {
    fn allow(&self, client: &str, now_ms: i64) -> bool {
        let mut entry = self
            .windows
            .entry(client.to_string())
            .or_insert(Window {
                started_at_ms: now_ms,
                count: 0,
            });

        if now_ms - entry.started_at_ms >= self.window_ms {
            entry.started_at_ms = now_ms;
            entry.count = 0;
        }

        entry.count += 1;
        entry.count <= self.max_requests
    }
}

/// Gate used when rate limiting is switched off in settings.
pub struct OpenGate;

impl RateGate for OpenGate {
    fn allow(&self, _client: &str, _now_ms: i64) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denies_above_limit_within_window() {
        let gate = FixedWindowRateGate::new(3, 60_000);
        assert!(gate.allow("10.0.0.1", 0));
        assert!(gate.allow("10.0.0.1", 10));
        assert!(gate.allow("10.0.0.1", 20));
        assert!(!gate.allow("10.0.0.1", 30));
    }

    #[test]
    fn window_resets_after_elapse() {
        let gate = FixedWindowRateGate::new(1, 1_000);
        assert!(gate.allow("10.0.0.1", 0));
        assert!(!gate.allow("10.0.0.1", 500));
        assert!(gate.allow("10.0.0.1", 1_500));
    }

    #[test]
    fn clients_are_counted_independently() {
        let gate = FixedWindowRateGate::new(1, 60_000);
        assert!(gate.allow("10.0.0.1", 0));
        assert!(gate.allow("10.0.0.2", 0));
        assert!(!gate.allow("10.0.0.1", 10));
    }
}
