use std::cmp::Ordering;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::data::frame::{Frame, ScanSelection};

/// One centroided signal, resolved in retention time and ion mobility.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MobilityPoint {
    pub mz: f64,
    pub intensity: f64,
    /// Retention time of the parent frame in seconds.
    pub retention_time: f32,
    pub mobility: f64,
    pub frame_id: i32,
    pub scan_number: i32,
}

/// Result of flattening a set of frames into one point sequence.
#[derive(Clone, Debug, Default)]
pub struct PointExtraction {
    /// All extracted points, ascending by intensity.
    pub points: Vec<MobilityPoint>,
    /// Scan numbers that carried no peak list and were skipped.
    pub missing_peak_lists: Vec<i32>,
}

/// Flattens frames into one intensity-ordered point sequence.
///
/// Frames that are not stored or fail the selection contribute nothing.
/// Scans without a peak list are recorded in `missing_peak_lists` and
/// skipped; the remaining scans are still processed. Intensity ties are
/// broken by scan number, then m/z, so the ordering is deterministic.
pub fn extract_points(frames: &[Frame], selection: &ScanSelection) -> PointExtraction {
    info!("start data point extraction over {} frames", frames.len());
    let mut extraction = PointExtraction::default();
    for frame in frames {
        if !frame.stored || !selection.matches(frame) {
            continue;
        }
        for scan in &frame.scans {
            let peaks = match &scan.peaks {
                Some(peaks) => peaks,
                None => {
                    warn!("scan #{} does not have a peak list", scan.scan_number);
                    extraction.missing_peak_lists.push(scan.scan_number);
                    continue;
                }
            };
            for (mz, intensity) in peaks.mz.iter().zip(peaks.intensity.iter()) {
                extraction.points.push(MobilityPoint {
                    mz: *mz,
                    intensity: *intensity,
                    retention_time: frame.retention_time,
                    mobility: scan.mobility,
                    frame_id: frame.frame_id,
                    scan_number: scan.scan_number,
                });
            }
        }
    }
    extraction.points.sort_by(compare_by_intensity);
    info!("extracted {} ims data points", extraction.points.len());
    extraction
}

pub(crate) fn compare_by_intensity(a: &MobilityPoint, b: &MobilityPoint) -> Ordering {
    a.intensity
        .partial_cmp(&b.intensity)
        .unwrap_or(Ordering::Equal)
        .then(a.scan_number.cmp(&b.scan_number))
        .then(a.mz.partial_cmp(&b.mz).unwrap_or(Ordering::Equal))
}
