//! Peak-threshold silence detection over streamed chunks.

/// Counts consecutive silent samples across chunks.
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    threshold: f32,
    limit_samples: u64,
    silent_samples: u64,
}

impl SilenceDetector {
    /// `timeout_secs` of continuous silence at `sample_rate` trips the detector.
    pub fn new(threshold: f32, timeout_secs: f32, sample_rate: u32) -> Self {
        let limit_samples = (f64::from(timeout_secs.max(0.0)) * f64::from(sample_rate)) as u64;
        Self {
            threshold,
            limit_samples,
            silent_samples: 0,
        }
    }

    /// Whether every sample's magnitude is at or below the threshold.
    pub fn is_silent(&self, chunk: &[f32]) -> bool {
        chunk.iter().all(|s| s.abs() <= self.threshold)
    }

    /// Feed a chunk. Returns `true` once the silent run reaches the timeout.
    pub fn observe(&mut self, chunk: &[f32]) -> bool {
        if self.is_silent(chunk) {
            self.silent_samples += chunk.len() as u64;
        } else {
            self.silent_samples = 0;
        }
        self.timed_out()
    }

    pub fn timed_out(&self) -> bool {
        self.silent_samples >= self.limit_samples
    }

    /// Length of the current silent run in samples.
    pub fn silent_samples(&self) -> u64 {
        self.silent_samples
    }

    pub fn reset(&mut self) {
        self.silent_samples = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_timeout_of_silence() {
        // 1 second at 100 Hz, 25-sample chunks.
        let mut detector = SilenceDetector::new(0.01, 1.0, 100);
        let quiet = [0.005_f32; 25];
        assert!(!detector.observe(&quiet));
        assert!(!detector.observe(&quiet));
        assert!(!detector.observe(&quiet));
        assert!(detector.observe(&quiet));
    }

    #[test]
    fn speech_resets_the_run() {
        let mut detector = SilenceDetector::new(0.01, 1.0, 100);
        let quiet = [0.0_f32; 50];
        let mut loud = [0.0_f32; 50];
        loud[10] = 0.5;
        assert!(!detector.observe(&quiet));
        assert!(!detector.observe(&loud));
        assert_eq!(detector.silent_samples(), 0);
        assert!(!detector.observe(&quiet));
        assert!(detector.observe(&quiet));
    }

    #[test]
    fn threshold_is_inclusive() {
        let detector = SilenceDetector::new(0.003, 2.0, 16_000);
        assert!(detector.is_silent(&[0.003, -0.003]));
        assert!(!detector.is_silent(&[0.0031]));
    }
}
