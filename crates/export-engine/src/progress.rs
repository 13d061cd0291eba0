//! Progress aggregation for one export session.

use kinetype_export_model::progress::{ExportPhase, ExportProgress};

/// Caller-supplied progress sink.
pub type ProgressSink<'a> = &'a (dyn Fn(ExportProgress) + Send + Sync);

/// Turns phase-scoped observations into one monotonic progress signal.
///
/// The only state kept is the last value reported, so a late or coarser
/// observation is clamped up to it rather than moving progress backwards.
pub struct ProgressReporter<'a> {
    sink: Option<ProgressSink<'a>>,
    last: Option<ExportProgress>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: ProgressSink<'a>) -> Self {
        Self {
            sink: Some(sink),
            last: None,
        }
    }

    /// Reporter that only tracks the last value.
    pub fn silent() -> Self {
        Self {
            sink: None,
            last: None,
        }
    }

    /// Clamp, remember and forward one observation.
    pub fn report(&mut self, mut progress: ExportProgress) {
        let floor = self.last_percent();
        progress.percent = progress.percent.clamp(floor, 100.0);
        if let Some(sink) = self.sink {
            sink(progress.clone());
        }
        self.last = Some(progress);
    }

    /// Report the start of `phase`.
    pub fn phase(&mut self, phase: ExportPhase, message: impl Into<String>) {
        self.report(ExportProgress::at_phase_start(phase).with_message(message));
    }

    /// Report `current` of `total` items done in `phase`.
    pub fn counted(&mut self, phase: ExportPhase, current: u64, total: u64) {
        self.report(ExportProgress::counted(phase, current, total));
    }

    pub fn last(&self) -> Option<&ExportProgress> {
        self.last.as_ref()
    }

    pub fn last_percent(&self) -> f64 {
        self.last.as_ref().map(|p| p.percent).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    #[test]
    fn test_reports_are_forwarded_in_order() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: ExportProgress| seen.lock().unwrap().push(p.percent);
        let mut reporter = ProgressReporter::new(&sink);

        reporter.phase(ExportPhase::Preparing, "start");
        reporter.counted(ExportPhase::Capturing, 1, 2);
        reporter.counted(ExportPhase::Capturing, 2, 2);

        assert_eq!(*seen.lock().unwrap(), vec![0.0, 45.0, 85.0]);
        assert_eq!(reporter.last().unwrap().current, Some(2));
    }

    #[test]
    fn test_never_moves_backwards() {
        let mut reporter = ProgressReporter::silent();
        reporter.counted(ExportPhase::Capturing, 10, 10);
        assert_eq!(reporter.last_percent(), 85.0);

        // A stale capture observation after encoding began.
        reporter.counted(ExportPhase::Capturing, 3, 10);
        assert_eq!(reporter.last_percent(), 85.0);
        assert_eq!(reporter.last().unwrap().current, Some(3));
    }

    #[test]
    fn test_starts_at_zero() {
        let reporter = ProgressReporter::silent();
        assert!(reporter.last().is_none());
        assert_eq!(reporter.last_percent(), 0.0);
    }

    fn phase() -> impl Strategy<Value = ExportPhase> {
        prop_oneof![
            Just(ExportPhase::Preparing),
            Just(ExportPhase::Capturing),
            Just(ExportPhase::Encoding),
            Just(ExportPhase::Composing),
            Just(ExportPhase::Finalizing),
        ]
    }

    proptest! {
        #[test]
        fn prop_forwarded_percent_is_monotone_and_bounded(
            steps in prop::collection::vec((phase(), 0u64..50, 1u64..50), 1..40)
        ) {
            let seen = Mutex::new(Vec::new());
            let sink = |p: ExportProgress| seen.lock().unwrap().push(p.percent);
            let mut reporter = ProgressReporter::new(&sink);
            for (phase, current, total) in steps {
                reporter.counted(phase, current.min(total), total);
            }
            let seen = seen.into_inner().unwrap();
            prop_assert!(seen.windows(2).all(|w| w[0] <= w[1]));
            prop_assert!(seen.iter().all(|p| (0.0..=100.0).contains(p)));
        }
    }
}
