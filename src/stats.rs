/// Running counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PingStatistics {
    pub transmitted: u64,
    pub received: u64,
    rtt_min: Option<f64>,
    rtt_max: Option<f64>,
    rtt_sum: f64,
}

impl PingStatistics {
    pub fn record_transmit(&mut self) {
        self.transmitted += 1;
    }

    pub fn record_reply(&mut self, rtt_ms: f64) {
        self.received += 1;
        self.rtt_sum += rtt_ms;
        self.rtt_min = Some(self.rtt_min.map_or(rtt_ms, |m| m.min(rtt_ms)));
        self.rtt_max = Some(self.rtt_max.map_or(rtt_ms, |m| m.max(rtt_ms)));
    }

    /// Percentage of transmitted requests that got no reply; 0 before any.
    pub fn loss_percent(&self) -> f64 {
        if self.transmitted == 0 {
            return 0.0;
        }
        self.transmitted.saturating_sub(self.received) as f64 / self.transmitted as f64 * 100.0
    }

    /// `(min, avg, max)` round-trip in milliseconds, if any reply arrived.
    pub fn rtt(&self) -> Option<(f64, f64, f64)> {
        let (min, max) = (self.rtt_min?, self.rtt_max?);
        Some((min, self.rtt_sum / self.received as f64, max))
    }
}
