use std::cmp::Ordering;

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::frame::Frame;
use crate::mobilogram::profile::{Mobilogram, MobilogramPoint};
use crate::tolerance::MzTolerance;

/// Configuration for per-frame mobilogram building.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MobilogramConfig {
    pub mz_tolerance: MzTolerance,
    /// A mobilogram is kept only if it holds more than this many points.
    pub min_signals: usize,
}

impl Default for MobilogramConfig {
    fn default() -> Self {
        MobilogramConfig { mz_tolerance: MzTolerance::default(), min_signals: 7 }
    }
}

/// Builds mobilograms from one frame's scans.
///
/// Every peak of the frame is a candidate seed, visited in ascending
/// intensity order. A seed gathers all points within m/z tolerance of its
/// own m/z whose scan number is not yet represented, so the first point per
/// scan wins. Kept mobilograms consume their member points; consumed points
/// neither seed nor join later mobilograms. The full point collection is
/// scanned once per seed, which is quadratic and only acceptable because it
/// stays within a single frame.
///
/// Returned mobilograms are calculated and sorted by median m/z.
pub fn build_mobilograms(frame: &Frame, config: &MobilogramConfig) -> Vec<Mobilogram> {
    let points = extract_frame_points(frame);
    debug!("frame {}: {} candidate points", frame.frame_id, points.len());
    let mut consumed = vec![false; points.len()];
    let mut mobilograms = Vec::new();
    for seed_index in 0..points.len() {
        if consumed[seed_index] {
            continue;
        }
        let seed_mz = points[seed_index].mz;
        let mut mobilogram = Mobilogram::new(frame.mobility_type);
        let mut members = vec![seed_index];
        mobilogram.add_point(points[seed_index]);
        for (index, point) in points.iter().enumerate() {
            if consumed[index] || index == seed_index {
                continue;
            }
            if config.mz_tolerance.within(seed_mz, point.mz)
                && !mobilogram.contains_scan(point.scan_number)
            {
                mobilogram.add_point(*point);
                members.push(index);
            }
        }
        if mobilogram.len() > config.min_signals {
            for index in members {
                consumed[index] = true;
            }
            mobilogram.calc();
            mobilograms.push(mobilogram);
        }
    }
    mobilograms.sort_by(|a, b| {
        a.median_mz()
            .unwrap_or(0.0)
            .partial_cmp(&b.median_mz().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal)
    });
    mobilograms
}

/// Builds mobilograms for every frame independently, in parallel. Returns
/// (frame id, mobilograms) pairs in the input frame order.
pub fn build_mobilograms_per_frame(
    frames: &[Frame],
    config: &MobilogramConfig,
) -> Vec<(i32, Vec<Mobilogram>)> {
    frames
        .par_iter()
        .map(|frame| (frame.frame_id, build_mobilograms(frame, config)))
        .collect()
}

/// One frame's peaks as mobilogram points, ascending by intensity with
/// deterministic tie breaks. Scans without a peak list are skipped.
fn extract_frame_points(frame: &Frame) -> Vec<MobilogramPoint> {
    let mut points = Vec::new();
    for scan in &frame.scans {
        let peaks = match &scan.peaks {
            Some(peaks) => peaks,
            None => {
                warn!("scan #{} does not have a peak list", scan.scan_number);
                continue;
            }
        };
        for (mz, intensity) in peaks.mz.iter().zip(peaks.intensity.iter()) {
            points.push(MobilogramPoint {
                mz: *mz,
                intensity: *intensity,
                mobility: scan.mobility,
                scan_number: scan.scan_number,
            });
        }
    }
    points.sort_by(|a, b| {
        a.intensity
            .partial_cmp(&b.intensity)
            .unwrap_or(Ordering::Equal)
            .then(a.scan_number.cmp(&b.scan_number))
            .then(a.mz.partial_cmp(&b.mz).unwrap_or(Ordering::Equal))
    });
    points
}
