use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::data::point::MobilityPoint;

/// A finalized ion mobility trace: one m/z interval's points plus the
/// aggregates derived from them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IonTrace {
    /// Representative m/z, the value of the point that opened the interval.
    pub mz: f64,
    /// Retention time of the maximum intensity point, in seconds.
    pub retention_time: f32,
    /// Mobility of the maximum intensity point.
    pub mobility: f64,
    pub maximum_intensity: f64,
    pub mz_range: (f64, f64),
    pub retention_time_range: (f32, f32),
    pub mobility_range: (f64, f64),
    pub intensity_range: (f64, f64),
    pub scan_numbers: BTreeSet<i32>,
    pub frame_ids: BTreeSet<i32>,
    /// Member points, ascending by scan number.
    pub points: Vec<MobilityPoint>,
}

impl IonTrace {
    /// Aggregates `points` into a finalized trace. `seed_mz` is the m/z of
    /// the point that opened the interval and becomes the representative
    /// value. `points` must not be empty.
    pub fn from_points(seed_mz: f64, mut points: Vec<MobilityPoint>) -> IonTrace {
        debug_assert!(!points.is_empty());
        points.sort_by(|a, b| {
            a.scan_number
                .cmp(&b.scan_number)
                .then(a.mz.partial_cmp(&b.mz).unwrap_or(Ordering::Equal))
        });
        let first = points[0];
        let mut trace = IonTrace {
            mz: seed_mz,
            retention_time: first.retention_time,
            mobility: first.mobility,
            maximum_intensity: f64::MIN,
            mz_range: (first.mz, first.mz),
            retention_time_range: (first.retention_time, first.retention_time),
            mobility_range: (first.mobility, first.mobility),
            intensity_range: (first.intensity, first.intensity),
            scan_numbers: BTreeSet::new(),
            frame_ids: BTreeSet::new(),
            points: Vec::new(),
        };
        for point in &points {
            trace.scan_numbers.insert(point.scan_number);
            trace.frame_ids.insert(point.frame_id);
            span_f64(&mut trace.mz_range, point.mz);
            span_f64(&mut trace.mobility_range, point.mobility);
            span_f64(&mut trace.intensity_range, point.intensity);
            span_f32(&mut trace.retention_time_range, point.retention_time);
            if trace.maximum_intensity < point.intensity {
                trace.maximum_intensity = point.intensity;
                trace.retention_time = point.retention_time;
                trace.mobility = point.mobility;
            }
        }
        trace.points = points;
        trace
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn span_f64(range: &mut (f64, f64), value: f64) {
    if value < range.0 {
        range.0 = value;
    }
    if value > range.1 {
        range.1 = value;
    }
}

fn span_f32(range: &mut (f32, f32), value: f32) {
    if value < range.0 {
        range.0 = value;
    }
    if value > range.1 {
        range.1 = value;
    }
}
