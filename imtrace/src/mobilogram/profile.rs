use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::frame::MobilityType;

/// One signal inside a mobilogram.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MobilogramPoint {
    pub mz: f64,
    pub intensity: f64,
    pub mobility: f64,
    pub scan_number: i32,
}

/// Intensity over mobility for one m/z neighborhood within a single frame.
///
/// Points are keyed by scan number and iterated in scan order. The derived
/// values (median m/z, median mobility, highest point) are `None` until
/// [`Mobilogram::calc`] has run; adding points invalidates them again.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mobilogram {
    points: BTreeMap<i32, MobilogramPoint>,
    mobility_type: MobilityType,
    mz_range: Option<(f64, f64)>,
    mobility_range: Option<(f64, f64)>,
    median_mz: Option<f64>,
    median_mobility: Option<f64>,
    highest: Option<MobilogramPoint>,
}

impl Mobilogram {
    pub fn new(mobility_type: MobilityType) -> Self {
        Mobilogram {
            points: BTreeMap::new(),
            mobility_type,
            mz_range: None,
            mobility_range: None,
            median_mz: None,
            median_mobility: None,
            highest: None,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn mobility_type(&self) -> MobilityType {
        self.mobility_type
    }

    pub fn contains_scan(&self, scan_number: i32) -> bool {
        self.points.contains_key(&scan_number)
    }

    /// Median m/z over all points; `None` until [`Mobilogram::calc`] ran.
    pub fn median_mz(&self) -> Option<f64> {
        self.median_mz
    }

    /// Median mobility over all points; `None` until [`Mobilogram::calc`]
    /// ran.
    pub fn median_mobility(&self) -> Option<f64> {
        self.median_mobility
    }

    /// The maximum intensity point; `None` until [`Mobilogram::calc`] ran.
    pub fn highest_point(&self) -> Option<MobilogramPoint> {
        self.highest
    }

    pub fn maximum_intensity(&self) -> Option<f64> {
        self.highest.map(|point| point.intensity)
    }

    pub fn mz_range(&self) -> Option<(f64, f64)> {
        self.mz_range
    }

    pub fn mobility_range(&self) -> Option<(f64, f64)> {
        self.mobility_range
    }

    /// Scan numbers in ascending order.
    pub fn scan_numbers(&self) -> impl Iterator<Item = i32> + '_ {
        self.points.keys().copied()
    }

    /// Points in ascending scan order.
    pub fn points(&self) -> impl Iterator<Item = &MobilogramPoint> {
        self.points.values()
    }

    /// Adds a point, keyed by scan number; a later point for the same scan
    /// replaces the earlier one. The m/z and mobility ranges grow
    /// incrementally, the derived values go stale until the next
    /// [`Mobilogram::calc`].
    pub fn add_point(&mut self, point: MobilogramPoint) {
        self.mz_range = Some(span(self.mz_range, point.mz));
        self.mobility_range = Some(span(self.mobility_range, point.mobility));
        self.points.insert(point.scan_number, point);
        self.median_mz = None;
        self.median_mobility = None;
        self.highest = None;
    }

    /// Recomputes the derived values. Call once after all points have been
    /// added.
    pub fn calc(&mut self) {
        if self.points.is_empty() {
            return;
        }
        self.median_mz = Some(median(self.points.values().map(|p| p.mz).collect()));
        self.median_mobility = Some(median(self.points.values().map(|p| p.mobility).collect()));
        self.highest = self
            .points
            .values()
            .max_by(|a, b| a.intensity.partial_cmp(&b.intensity).unwrap_or(Ordering::Equal))
            .copied();
    }

    /// Mobility distance between two adjacent scans, estimated from the
    /// first two points.
    fn mobility_step(&self) -> Option<f64> {
        let mut points = self.points.values();
        let first = points.next()?;
        let second = points.next()?;
        Some(
            ((first.mobility - second.mobility)
                / (first.scan_number - second.scan_number) as f64)
                .abs(),
        )
    }

    /// Fills every missing scan number between the first and last present
    /// scan with a synthetic zero-intensity point at extrapolated
    /// mobility, then recomputes the derived values. Returns the inserted
    /// points. Mobilograms with three or fewer points are left untouched.
    pub fn fill_missing_scans(&mut self) -> Vec<MobilogramPoint> {
        if self.points.len() <= 3 {
            return Vec::new();
        }
        let step = match self.mobility_step() {
            Some(step) => step,
            None => return Vec::new(),
        };
        if self.median_mz.is_none() {
            self.calc();
        }
        let mz = match self.median_mz {
            Some(mz) => mz,
            None => return Vec::new(),
        };
        let existing: Vec<(i32, f64)> =
            self.points.values().map(|p| (p.scan_number, p.mobility)).collect();
        let mut inserted = Vec::new();
        for window in existing.windows(2) {
            let (left_scan, left_mobility) = window[0];
            let (right_scan, _) = window[1];
            for scan_number in left_scan + 1..right_scan {
                let offset = (scan_number - left_scan) as f64;
                inserted.push(MobilogramPoint {
                    mz,
                    intensity: 0.0,
                    mobility: left_mobility - step * offset,
                    scan_number,
                });
            }
        }
        for point in &inserted {
            self.add_point(*point);
        }
        self.calc();
        inserted
    }

    /// Inserts zero-intensity boundary points next to gaps wider than
    /// `min_gap` scans, then recomputes the derived values. One point goes
    /// directly after the left edge of the gap, one directly before the
    /// right edge, both at extrapolated mobility. Only measured points
    /// (intensity > 0) anchor a gap, so repeating the call with the same
    /// threshold inserts nothing new.
    pub fn fill_edges(&mut self, min_gap: i32) {
        let step = match self.mobility_step() {
            Some(step) => step,
            None => return,
        };
        if self.median_mz.is_none() {
            self.calc();
        }
        let mz = match self.median_mz {
            Some(mz) => mz,
            None => return,
        };
        let existing: Vec<(i32, f64, f64)> =
            self.points.values().map(|p| (p.scan_number, p.mobility, p.intensity)).collect();
        let mut inserted = Vec::new();
        for window in existing.windows(2) {
            let (left_scan, left_mobility, left_intensity) = window[0];
            let (right_scan, _, _) = window[1];
            let gap = right_scan - left_scan;
            if gap > min_gap && left_intensity > 0.0 {
                inserted.push(MobilogramPoint {
                    mz,
                    intensity: 0.0,
                    mobility: left_mobility - step,
                    scan_number: left_scan + 1,
                });
                inserted.push(MobilogramPoint {
                    mz,
                    intensity: 0.0,
                    mobility: left_mobility - step * (gap - 1) as f64,
                    scan_number: left_scan + gap - 1,
                });
            }
        }
        for point in &inserted {
            self.add_point(*point);
        }
        self.calc();
    }
}

fn span(range: Option<(f64, f64)>, value: f64) -> (f64, f64) {
    match range {
        Some((lower, upper)) => (lower.min(value), upper.max(value)),
        None => (value, value),
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
