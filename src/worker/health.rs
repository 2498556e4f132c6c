use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerHealthStats {
    pub consecutive_errors: u32,
    pub operation_count: u64,
    /// Milliseconds
    pub average_operation_time: f64,
    pub is_healthy: bool,
}

/// Consecutive-failure and timing bookkeeping for one worker
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    max_consecutive_errors: u32,
    error_reset_time: Duration,
    consecutive_errors: u32,
    operation_count: u64,
    total_time: Duration,
    last_error: Option<Instant>,
}

impl HealthMonitor {
    pub fn new(max_consecutive_errors: u32, error_reset_time: Duration) -> Self {
        Self {
            max_consecutive_errors,
            error_reset_time,
            consecutive_errors: 0,
            operation_count: 0,
            total_time: Duration::ZERO,
            last_error: None,
        }
    }

    pub fn record_operation(&mut self, duration: Duration) {
        self.record_operation_at(duration, Instant::now());
    }

    /// Count a finished operation; clears the error streak once the reset window
    /// since the last error has passed.
    pub fn record_operation_at(&mut self, duration: Duration, now: Instant) {
        self.operation_count += 1;
        self.total_time += duration;

        if let Some(last_error) = self.last_error
            && self.window_elapsed(last_error, now)
        {
            self.consecutive_errors = 0;
        }
    }

    pub fn record_error(&mut self) {
        self.record_error_at(Instant::now());
    }

    /// Count a failure. A streak whose last error is older than the reset window
    /// starts over.
    pub fn record_error_at(&mut self, now: Instant) {
        self.consecutive_errors = self.consecutive_errors_at(now) + 1;
        self.last_error = Some(now);
    }

    pub fn is_healthy(&self) -> bool {
        self.is_healthy_at(Instant::now())
    }

    /// Healthy below the threshold, or once the reset window has passed since the
    /// last error, even if no operation ran in between
    pub fn is_healthy_at(&self, now: Instant) -> bool {
        self.consecutive_errors_at(now) < self.max_consecutive_errors
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors_at(Instant::now())
    }

    pub fn consecutive_errors_at(&self, now: Instant) -> u32 {
        match self.last_error {
            Some(last_error) if self.window_elapsed(last_error, now) => 0,
            _ => self.consecutive_errors,
        }
    }

    /// Average duration in milliseconds, 0 when nothing was recorded
    pub fn average_operation_time(&self) -> f64 {
        if self.operation_count == 0 {
            return 0.0;
        }
        self.total_time.as_secs_f64() * 1000.0 / self.operation_count as f64
    }

    pub fn stats(&self) -> WorkerHealthStats {
        WorkerHealthStats {
            consecutive_errors: self.consecutive_errors(),
            operation_count: self.operation_count,
            average_operation_time: self.average_operation_time(),
            is_healthy: self.is_healthy(),
        }
    }

    fn window_elapsed(&self, last_error: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_error) > self.error_reset_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESET: Duration = Duration::from_secs(60);

    #[test]
    fn test_threshold_and_reset_window() {
        let mut monitor = HealthMonitor::new(3, RESET);
        let start = Instant::now();

        for _ in 0..3 {
            monitor.record_error_at(start);
        }
        assert!(!monitor.is_healthy());

        // still inside the window: the streak survives a successful call
        monitor.record_operation_at(Duration::from_millis(5), start + Duration::from_secs(30));
        assert_eq!(monitor.consecutive_errors(), 3);
        assert!(!monitor.is_healthy());

        let after_window = start + RESET + Duration::from_millis(1);
        monitor.record_operation_at(Duration::from_millis(5), after_window);
        assert_eq!(monitor.consecutive_errors(), 0);
        assert!(monitor.is_healthy());
    }

    #[test]
    fn test_window_expiry_without_operations() {
        let mut monitor = HealthMonitor::new(2, RESET);
        let start = Instant::now();
        monitor.record_error_at(start);
        monitor.record_error_at(start);
        assert!(!monitor.is_healthy_at(start + Duration::from_secs(59)));

        let later = start + RESET + Duration::from_secs(1);
        assert!(monitor.is_healthy_at(later));
        assert_eq!(monitor.consecutive_errors_at(later), 0);

        // a new failure after the window starts a fresh streak
        monitor.record_error_at(later);
        assert_eq!(monitor.consecutive_errors_at(later), 1);
        assert!(monitor.is_healthy_at(later));
    }

    #[test]
    fn test_below_threshold_is_healthy() {
        let mut monitor = HealthMonitor::new(3, RESET);
        monitor.record_error();
        monitor.record_error();
        assert!(monitor.is_healthy());
        monitor.record_error();
        assert!(!monitor.is_healthy());
    }

    #[test]
    fn test_average_operation_time() {
        let mut monitor = HealthMonitor::new(3, RESET);
        assert_eq!(monitor.average_operation_time(), 0.0);

        monitor.record_operation(Duration::from_millis(10));
        monitor.record_operation(Duration::from_millis(30));

        let stats = monitor.stats();
        assert_eq!(stats.operation_count, 2);
        assert!((stats.average_operation_time - 20.0).abs() < 1e-9);
        assert!(stats.is_healthy);
    }

    #[test]
    fn test_real_clock_reset() {
        let mut monitor = HealthMonitor::new(1, Duration::from_millis(20));
        monitor.record_error();
        assert!(!monitor.is_healthy());

        std::thread::sleep(Duration::from_millis(40));
        monitor.record_operation(Duration::from_millis(1));
        assert!(monitor.is_healthy());
    }
}
