use serde::{Deserialize, Serialize};

/// Ion mobility separation mode of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MobilityType {
    None,
    Tims,
    DriftTube,
    TravelingWave,
    Faims,
}

/// Centroided peaks of one mobility scan, stored columnar.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PeakList {
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl PeakList {
    /// Creates a new `PeakList` instance. Both vectors must have the same
    /// length.
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>) -> Self {
        debug_assert_eq!(mz.len(), intensity.len());
        PeakList { mz, intensity }
    }

    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }
}

/// One mobility-resolved scan inside a frame.
///
/// `peaks` is `None` when no centroided mass list has been attached to the
/// scan yet, e.g. because the noise reduction step did not run on it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MobilityScan {
    pub scan_number: i32,
    /// Inverse ion mobility of this scan.
    pub mobility: f64,
    pub peaks: Option<PeakList>,
}

impl MobilityScan {
    pub fn new(scan_number: i32, mobility: f64, peaks: Option<PeakList>) -> Self {
        MobilityScan { scan_number, mobility, peaks }
    }
}

/// A collection of mobility scans acquired at one retention time.
///
/// `stored` marks frames whose scan data has been committed to backing
/// storage. Frames still being acquired carry no usable peak lists and are
/// skipped by the extractor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Frame {
    pub frame_id: i32,
    /// Retention time in seconds.
    pub retention_time: f32,
    pub ms_level: u8,
    pub mobility_type: MobilityType,
    pub stored: bool,
    pub scans: Vec<MobilityScan>,
}

impl Frame {
    /// Creates a new `Frame` instance.
    ///
    /// # Examples
    ///
    /// ```
    /// use imtrace::data::frame::{Frame, MobilityScan, MobilityType, PeakList};
    ///
    /// let scan = MobilityScan::new(1, 1.2, Some(PeakList::new(vec![100.0], vec![50.0])));
    /// let frame = Frame::new(1, 10.0, 1, MobilityType::Tims, vec![scan]);
    /// assert_eq!(frame.scans.len(), 1);
    /// ```
    pub fn new(
        frame_id: i32,
        retention_time: f32,
        ms_level: u8,
        mobility_type: MobilityType,
        scans: Vec<MobilityScan>,
    ) -> Self {
        Frame { frame_id, retention_time, ms_level, mobility_type, stored: true, scans }
    }
}

/// Predicate over frames, mirroring the scan selection filters of the
/// acquisition layer. `None` fields match everything.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScanSelection {
    pub ms_level: Option<u8>,
    pub retention_time_range: Option<(f32, f32)>,
    pub frame_id_range: Option<(i32, i32)>,
}

impl ScanSelection {
    pub fn matches(&self, frame: &Frame) -> bool {
        if let Some(ms_level) = self.ms_level {
            if frame.ms_level != ms_level {
                return false;
            }
        }
        if let Some((lower, upper)) = self.retention_time_range {
            if frame.retention_time < lower || frame.retention_time > upper {
                return false;
            }
        }
        if let Some((lower, upper)) = self.frame_id_range {
            if frame.frame_id < lower || frame.frame_id > upper {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(frame_id: i32, retention_time: f32, ms_level: u8) -> Frame {
        Frame::new(frame_id, retention_time, ms_level, MobilityType::Tims, Vec::new())
    }

    #[test]
    fn test_default_selection_matches_everything() {
        let selection = ScanSelection::default();
        assert!(selection.matches(&frame(1, 0.0, 1)));
        assert!(selection.matches(&frame(99, 1234.5, 2)));
    }

    #[test]
    fn test_ms_level_filter() {
        let selection = ScanSelection { ms_level: Some(1), ..Default::default() };
        assert!(selection.matches(&frame(1, 0.0, 1)));
        assert!(!selection.matches(&frame(1, 0.0, 2)));
    }

    #[test]
    fn test_retention_time_range_is_inclusive() {
        let selection =
            ScanSelection { retention_time_range: Some((10.0, 20.0)), ..Default::default() };
        assert!(selection.matches(&frame(1, 10.0, 1)));
        assert!(selection.matches(&frame(1, 20.0, 1)));
        assert!(!selection.matches(&frame(1, 20.1, 1)));
    }
}
