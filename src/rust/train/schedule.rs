/// Learning rate that rises linearly from 0 to `base_lr` over `warmup_steps`, then
/// decays linearly back to 0 at `total_steps`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearWarmupSchedule {
    pub base_lr: f64,
    pub warmup_steps: usize,
    pub total_steps: usize,
}

impl LinearWarmupSchedule {
    pub fn new(base_lr: f64, warmup_steps: usize, total_steps: usize) -> Self {
        Self {
            base_lr,
            warmup_steps,
            total_steps,
        }
    }

    /// Multiplier applied to `base_lr` at `step` (0-based optimizer steps taken so far).
    pub fn factor(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return step as f64 / self.warmup_steps.max(1) as f64;
        }
        let remaining = self.total_steps.saturating_sub(step) as f64;
        let decay_span = self.total_steps.saturating_sub(self.warmup_steps).max(1) as f64;
        (remaining / decay_span).max(0.0)
    }

    pub fn learning_rate(&self, step: usize) -> f64 {
        self.base_lr * self.factor(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_without_warmup() {
        let schedule = LinearWarmupSchedule::new(5e-5, 0, 100);
        assert_eq!(schedule.learning_rate(0), 5e-5);
        assert!((schedule.factor(50) - 0.5).abs() < 1e-12);
        assert_eq!(schedule.factor(100), 0.0);
        assert_eq!(schedule.factor(150), 0.0);
    }

    #[test]
    fn test_with_warmup() {
        let schedule = LinearWarmupSchedule::new(1.0, 10, 110);
        assert_eq!(schedule.factor(0), 0.0);
        assert!((schedule.factor(5) - 0.5).abs() < 1e-12);
        assert_eq!(schedule.factor(10), 1.0);
        assert!((schedule.factor(60) - 0.5).abs() < 1e-12);
        assert_eq!(schedule.factor(110), 0.0);
    }

    #[test]
    fn test_degenerate_totals() {
        let schedule = LinearWarmupSchedule::new(1.0, 0, 0);
        assert_eq!(schedule.factor(0), 0.0);
        let schedule = LinearWarmupSchedule::new(1.0, 5, 5);
        assert_eq!(schedule.factor(5), 0.0);
    }
}
