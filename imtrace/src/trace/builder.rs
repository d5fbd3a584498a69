use std::cmp::Ordering;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::frame::{Frame, ScanSelection};
use crate::data::point::{extract_points, MobilityPoint};
use crate::task::{CancelToken, TaskStatus};
use crate::tolerance::MzTolerance;
use crate::trace::ion_trace::IonTrace;
use crate::trace::ranges::MzRangeSet;

/// Fatal conditions raised by the range allocator. Each one means the
/// disjointness invariant can no longer be guaranteed, so the run aborts.
#[derive(Debug, Error)]
pub enum TraceBuildError {
    #[error("incorrect range [{lower}, {upper}] for m/z {mz}")]
    MalformedWindow { lower: f64, upper: f64, mz: f64 },
    /// The clamped window collapsed to zero width without an upper
    /// neighbor to join. Reported separately from [`Self::MalformedWindow`]
    /// because the upstream algorithm never defined this case.
    #[error("zero-width range at {bound} for m/z {mz} with no upper neighbor to join")]
    DegenerateTouch { bound: f64, mz: f64 },
}

/// Configuration for [`TraceBuilderTask`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceBuilderConfig {
    pub mz_tolerance: MzTolerance,
    /// Minimum number of points for a trace to be accepted.
    pub min_total_signals: usize,
    /// Minimum number of distinct retention times among a trace's points.
    pub min_retention_times: usize,
    pub scan_selection: ScanSelection,
}

impl Default for TraceBuilderConfig {
    fn default() -> Self {
        TraceBuilderConfig {
            mz_tolerance: MzTolerance::default(),
            min_total_signals: 7,
            min_retention_times: 2,
            scan_selection: ScanSelection::default(),
        }
    }
}

/// An open trace: the seed m/z of its interval plus the points assigned so
/// far.
#[derive(Clone, Debug, Default)]
struct TraceAccumulator {
    seed_mz: f64,
    points: Vec<MobilityPoint>,
}

/// Builds ion mobility traces from a set of frames.
///
/// Points stream through a set of disjoint open m/z intervals in ascending
/// intensity order, so low-intensity points seed narrow intervals first and
/// high-intensity points are absorbed into existing ones where possible. A
/// point that matches no interval opens a new one spanning its tolerance
/// window, clamped against the nearest neighbors on both sides.
///
/// One task owns one range-to-trace mapping. Runs over different raw files
/// use independent tasks and may execute on separate threads without any
/// coordination.
#[derive(Clone, Debug)]
pub struct TraceBuilderTask {
    config: TraceBuilderConfig,
    cancel: CancelToken,
    status: TaskStatus,
    error_message: Option<String>,
    progress: f64,
    ranges: MzRangeSet,
    traces: Vec<TraceAccumulator>,
}

impl TraceBuilderTask {
    pub fn new(config: TraceBuilderConfig) -> Self {
        Self::with_cancel(config, CancelToken::new())
    }

    /// Creates a task whose run can be canceled through `cancel`.
    pub fn with_cancel(config: TraceBuilderConfig, cancel: CancelToken) -> Self {
        TraceBuilderTask {
            config,
            cancel,
            status: TaskStatus::Waiting,
            error_message: None,
            progress: 0.0,
            ranges: MzRangeSet::new(),
            traces: Vec::new(),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Fraction of the work finished so far, in [0, 1]. Split evenly
    /// between the allocation pass and the finalization pass.
    pub fn finished_percentage(&self) -> f64 {
        self.progress
    }

    /// Runs the builder over `frames` and returns the accepted traces in
    /// ascending order of representative m/z.
    ///
    /// Cancellation yields `Ok` with an empty output and status
    /// [`TaskStatus::Canceled`]; nothing built so far is committed. Scans
    /// without peak lists set status [`TaskStatus::Error`] and are skipped,
    /// but processing continues with the remaining scans.
    pub fn run(&mut self, frames: &[Frame]) -> Result<Vec<IonTrace>, TraceBuildError> {
        self.status = TaskStatus::Processing;
        if self.cancel.is_canceled() {
            self.status = TaskStatus::Canceled;
            return Ok(Vec::new());
        }
        let extraction = extract_points(frames, &self.config.scan_selection);
        if !extraction.missing_peak_lists.is_empty() {
            self.status = TaskStatus::Error;
            self.error_message = Some(format!(
                "{} scans do not have a peak list (first: scan #{})",
                extraction.missing_peak_lists.len(),
                extraction.missing_peak_lists[0]
            ));
        }
        info!("start m/z range calculation");
        let step = if extraction.points.is_empty() {
            0.0
        } else {
            0.5 / extraction.points.len() as f64
        };
        for point in extraction.points {
            if self.cancel.is_canceled() {
                self.status = TaskStatus::Canceled;
                return Ok(Vec::new());
            }
            if let Err(error) = self.assign_point(point) {
                self.status = TaskStatus::Error;
                self.error_message = Some(error.to_string());
                return Err(error);
            }
            self.progress += step;
        }
        let accepted = self.finish_traces();
        if self.status == TaskStatus::Canceled {
            return Ok(Vec::new());
        }
        self.progress = 1.0;
        if self.status != TaskStatus::Error {
            self.status = TaskStatus::Finished;
        }
        Ok(accepted)
    }

    /// Assigns one point: append to the containing interval's trace, or
    /// open a new interval clamped against the nearest neighbors so that
    /// no two intervals ever overlap.
    fn assign_point(&mut self, point: MobilityPoint) -> Result<(), TraceBuildError> {
        if let Some(slot) = self.ranges.find(point.mz) {
            self.traces[self.ranges.trace(slot)].points.push(point);
            return Ok(());
        }
        let (window_lower, window_upper) = self.config.mz_tolerance.bounds(point.mz);
        let plus = self.ranges.find(window_upper);
        let minus = self.ranges.find(window_lower);
        let lower = match minus {
            Some(slot) => self.ranges.upper(slot),
            None => window_lower,
        };
        let upper = match plus {
            Some(slot) => self.ranges.lower(slot),
            None => window_upper,
        };
        if lower < upper {
            let trace = self.traces.len();
            self.traces.push(TraceAccumulator { seed_mz: point.mz, points: vec![point] });
            self.ranges.insert(lower, upper, trace);
        } else if lower == upper {
            // The window collapsed onto the facing bound of the upper
            // neighbor; the point joins that trace instead of opening a
            // zero-width interval.
            match plus {
                Some(slot) => self.traces[self.ranges.trace(slot)].points.push(point),
                None => return Err(TraceBuildError::DegenerateTouch { bound: lower, mz: point.mz }),
            }
        } else {
            return Err(TraceBuildError::MalformedWindow { lower, upper, mz: point.mz });
        }
        Ok(())
    }

    /// One pass over the completed intervals: apply the acceptance
    /// thresholds and aggregate the surviving traces. Rejected traces are
    /// dropped silently.
    fn finish_traces(&mut self) -> Vec<IonTrace> {
        let step = if self.ranges.is_empty() { 0.0 } else { 0.5 / self.ranges.len() as f64 };
        let slots: Vec<(f64, f64, usize)> = self.ranges.iter().collect();
        let mut accepted = Vec::new();
        for (lower, upper, trace_index) in slots {
            if self.cancel.is_canceled() {
                self.status = TaskStatus::Canceled;
                return Vec::new();
            }
            self.progress += step;
            let accumulator = std::mem::take(&mut self.traces[trace_index]);
            if accumulator.points.len() < self.config.min_total_signals {
                continue;
            }
            if count_distinct_retention_times(&accumulator.points) < self.config.min_retention_times
            {
                continue;
            }
            debug!("build ion trace for m/z range ({lower}, {upper})");
            accepted.push(IonTrace::from_points(accumulator.seed_mz, accumulator.points));
        }
        accepted.sort_by(|a, b| a.mz.partial_cmp(&b.mz).unwrap_or(Ordering::Equal));
        accepted
    }
}

fn count_distinct_retention_times(points: &[MobilityPoint]) -> usize {
    let mut times: Vec<f32> = points.iter().map(|p| p.retention_time).collect();
    times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    times.dedup();
    times.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::{MobilityScan, MobilityType, PeakList};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn permissive_config(absolute_tolerance: f64) -> TraceBuilderConfig {
        TraceBuilderConfig {
            mz_tolerance: MzTolerance::new(absolute_tolerance, 0.0),
            min_total_signals: 1,
            min_retention_times: 1,
            scan_selection: ScanSelection::default(),
        }
    }

    fn single_peak_scan(scan_number: i32, mobility: f64, mz: f64, intensity: f64) -> MobilityScan {
        MobilityScan::new(scan_number, mobility, Some(PeakList::new(vec![mz], vec![intensity])))
    }

    fn frame(frame_id: i32, retention_time: f32, scans: Vec<MobilityScan>) -> Frame {
        Frame::new(frame_id, retention_time, 1, MobilityType::Tims, scans)
    }

    /// Three points at ±0.01 Th absolute tolerance: the first opens
    /// (99.99, 100.01), the second clamps against it and opens
    /// (100.01, 100.025), the third falls into the first interval.
    #[test]
    fn test_neighbor_clamping_keeps_intervals_disjoint() {
        let frames = vec![frame(
            1,
            10.0,
            vec![
                single_peak_scan(1, 1.3, 100.000, 10.0),
                single_peak_scan(2, 1.2, 100.015, 20.0),
                single_peak_scan(3, 1.1, 100.005, 30.0),
            ],
        )];
        let mut task = TraceBuilderTask::new(permissive_config(0.01));
        let traces = task.run(&frames).unwrap();
        assert_eq!(task.status(), TaskStatus::Finished);
        assert_eq!(traces.len(), 2);
        assert!(task.ranges.is_disjoint());
        assert_eq!(task.ranges.len(), 2);
        assert_eq!(traces[0].mz, 100.000);
        assert_eq!(traces[0].len(), 2);
        assert_eq!(
            traces[0].points.iter().map(|p| p.scan_number).collect::<Vec<i32>>(),
            vec![1, 3]
        );
        assert_eq!(traces[1].mz, 100.015);
        assert_eq!(traces[1].len(), 1);
    }

    #[test]
    fn test_touching_window_joins_the_upper_neighbor() {
        let mut task = TraceBuilderTask::new(permissive_config(0.01));
        task.ranges.insert(99.0, 100.0, 0);
        task.ranges.insert(100.0, 101.0, 1);
        task.traces.push(TraceAccumulator { seed_mz: 99.5, points: Vec::new() });
        task.traces.push(TraceAccumulator { seed_mz: 100.5, points: Vec::new() });
        // 100.0 sits exactly on the shared bound; both clamps collapse the
        // window, so the point goes to the upper neighbor's trace.
        let point = MobilityPoint {
            mz: 100.0,
            intensity: 5.0,
            retention_time: 1.0,
            mobility: 1.0,
            frame_id: 1,
            scan_number: 1,
        };
        task.assign_point(point).unwrap();
        assert_eq!(task.traces[0].points.len(), 0);
        assert_eq!(task.traces[1].points.len(), 1);
        assert_eq!(task.ranges.len(), 2);
    }

    #[test]
    fn test_zero_tolerance_is_a_degenerate_touch() {
        let mut task = TraceBuilderTask::new(permissive_config(0.0));
        let point = MobilityPoint {
            mz: 100.0,
            intensity: 5.0,
            retention_time: 1.0,
            mobility: 1.0,
            frame_id: 1,
            scan_number: 1,
        };
        let error = task.assign_point(point).unwrap_err();
        assert!(matches!(error, TraceBuildError::DegenerateTouch { .. }));
    }

    #[test]
    fn test_error_messages_name_the_offending_values() {
        let malformed = TraceBuildError::MalformedWindow { lower: 100.2, upper: 100.1, mz: 100.15 };
        assert_eq!(malformed.to_string(), "incorrect range [100.2, 100.1] for m/z 100.15");
        let touch = TraceBuildError::DegenerateTouch { bound: 100.0, mz: 100.0 };
        assert!(touch.to_string().contains("m/z 100"));
    }

    #[test]
    fn test_every_point_lands_in_exactly_one_trace() {
        let mut scans = Vec::new();
        for scan_number in 0..20 {
            scans.push(single_peak_scan(
                scan_number,
                1.5 - scan_number as f64 * 0.01,
                100.0 + (scan_number % 5) as f64 * 0.05,
                10.0 + scan_number as f64,
            ));
        }
        let frames = vec![frame(1, 10.0, scans)];
        let mut task = TraceBuilderTask::new(permissive_config(0.01));
        let traces = task.run(&frames).unwrap();
        let total: usize = traces.iter().map(|t| t.len()).sum();
        assert_eq!(total, 20);
        // every input peak appears exactly once across all traces
        let mut seen: Vec<(i32, f64)> =
            traces.iter().flat_map(|t| t.points.iter().map(|p| (p.scan_number, p.mz))).collect();
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        seen.dedup();
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn test_randomized_intervals_stay_disjoint() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let tolerance = rng.gen_range(0.001..0.05);
            let mut scans = Vec::new();
            for scan_number in 0..200 {
                scans.push(single_peak_scan(
                    scan_number,
                    1.0,
                    rng.gen_range(100.0..101.0),
                    rng.gen_range(1.0..1000.0),
                ));
            }
            let frames = vec![frame(1, 10.0, scans)];
            let mut task = TraceBuilderTask::new(permissive_config(tolerance));
            task.run(&frames).unwrap();
            assert!(task.ranges.is_disjoint());
        }
    }

    #[test]
    fn test_double_run_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut scans = Vec::new();
        for scan_number in 0..100 {
            scans.push(single_peak_scan(
                scan_number,
                1.0,
                rng.gen_range(200.0..200.5),
                rng.gen_range(1.0..100.0),
            ));
        }
        let frames = vec![frame(1, 10.0, scans)];
        let mut first = TraceBuilderTask::new(permissive_config(0.02));
        let mut second = TraceBuilderTask::new(permissive_config(0.02));
        let traces_first = first.run(&frames).unwrap();
        let traces_second = second.run(&frames).unwrap();
        let bounds_first: Vec<(f64, f64)> =
            first.ranges.iter().map(|(lower, upper, _)| (lower, upper)).collect();
        let bounds_second: Vec<(f64, f64)> =
            second.ranges.iter().map(|(lower, upper, _)| (lower, upper)).collect();
        assert_eq!(bounds_first, bounds_second);
        assert_eq!(traces_first.len(), traces_second.len());
        for (a, b) in traces_first.iter().zip(traces_second.iter()) {
            assert_eq!(a.mz, b.mz);
            assert_eq!(a.points, b.points);
        }
    }

    #[test]
    fn test_acceptance_thresholds_filter_traces() {
        // two clusters: five points near 100.0, one point at 105.0
        let mut scans = Vec::new();
        for scan_number in 0..5 {
            scans.push(single_peak_scan(scan_number, 1.0, 100.0, 10.0 + scan_number as f64));
        }
        scans.push(single_peak_scan(10, 0.9, 105.0, 50.0));
        let frames =
            vec![frame(1, 10.0, scans.clone()), frame(2, 20.0, vec![scans[0].clone()])];
        let mut config = permissive_config(0.01);
        config.min_total_signals = 2;
        config.min_retention_times = 1;
        let mut task = TraceBuilderTask::new(config);
        let traces = task.run(&frames).unwrap();
        assert!(traces.iter().all(|t| t.len() >= 2));
        assert!(traces.iter().all(|t| (t.mz - 105.0).abs() > 1.0));
    }

    #[test]
    fn test_min_retention_times_requires_distinct_values() {
        // six points, all in one frame: one distinct retention time
        let scans: Vec<MobilityScan> =
            (0..6).map(|i| single_peak_scan(i, 1.0, 100.0, 10.0 + i as f64)).collect();
        let frames = vec![frame(1, 10.0, scans)];
        let mut config = permissive_config(0.01);
        config.min_total_signals = 2;
        config.min_retention_times = 2;
        let mut task = TraceBuilderTask::new(config);
        let traces = task.run(&frames).unwrap();
        assert!(traces.is_empty());
    }

    #[test]
    fn test_canceled_task_commits_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut task = TraceBuilderTask::with_cancel(permissive_config(0.01), cancel);
        let frames =
            vec![frame(1, 10.0, vec![single_peak_scan(1, 1.0, 100.0, 10.0)])];
        let traces = task.run(&frames).unwrap();
        assert!(traces.is_empty());
        assert_eq!(task.status(), TaskStatus::Canceled);
    }

    #[test]
    fn test_missing_peak_list_sets_error_but_continues() {
        let frames = vec![frame(
            1,
            10.0,
            vec![
                MobilityScan::new(1, 1.2, None),
                single_peak_scan(2, 1.1, 100.0, 10.0),
            ],
        )];
        let mut task = TraceBuilderTask::new(permissive_config(0.01));
        let traces = task.run(&frames).unwrap();
        assert_eq!(task.status(), TaskStatus::Error);
        assert!(task.error_message().unwrap().contains("scan #1"));
        assert_eq!(traces.len(), 1);
    }

    #[test]
    fn test_progress_reaches_one_on_finish() {
        let frames =
            vec![frame(1, 10.0, vec![single_peak_scan(1, 1.0, 100.0, 10.0)])];
        let mut task = TraceBuilderTask::new(permissive_config(0.01));
        task.run(&frames).unwrap();
        assert_eq!(task.finished_percentage(), 1.0);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = TraceBuilderConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: TraceBuilderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.min_total_signals, config.min_total_signals);
        assert_eq!(back.min_retention_times, config.min_retention_times);
        assert_eq!(back.mz_tolerance.absolute, config.mz_tolerance.absolute);
    }
}
