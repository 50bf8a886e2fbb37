//! Warnings about geometry that could only be approximated
//!
//! Soft failures never abort a run. They are collected into the solve
//! report and logged. [`check`] runs after solving and looks for
//! annotations that still collide, which happens when the user forces a
//! distance.

use std::fmt;

use log::warn;

use crate::error::InputLocation;
use crate::geometry::spans_overlap;
use crate::model::{Place, Score, StaffNo};

/// A warning about geometry that was clamped or left imperfect
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutWarning {
    pub category: WarningCategory,
    pub location: Option<InputLocation>,
    pub message: String,
}

/// Category of soft failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningCategory {
    /// Aligned objects hit the minimum squeeze scale
    Squeeze,
    /// Cross-staff notes whose neighbor staff is not on the line
    CrossStaff,
    /// Placed annotations overlap
    Overlap,
}

impl fmt::Display for WarningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningCategory::Squeeze => write!(f, "squeeze"),
            WarningCategory::CrossStaff => write!(f, "cross-staff"),
            WarningCategory::Overlap => write!(f, "overlap"),
        }
    }
}

impl fmt::Display for LayoutWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}: {}", location, self.category, self.message),
            None => write!(f, "{}: {}", self.category, self.message),
        }
    }
}

impl LayoutWarning {
    /// Create a warning and log it
    pub fn new(
        category: WarningCategory,
        location: Option<&InputLocation>,
        message: impl Into<String>,
    ) -> Self {
        let warning = Self {
            category,
            location: location.cloned(),
            message: message.into(),
        };
        warn!("{}", warning);
        warning
    }
}

/// Look for placed annotations that overlap on any staff and side
pub fn check(score: &Score) -> Vec<LayoutWarning> {
    let mut warnings = Vec::new();
    for line in 0..score.line_count() {
        for staff in score.staffs_on_line(line) {
            for place in [Place::Above, Place::Below, Place::Between] {
                check_overlaps(score, line, staff, place, &mut warnings);
            }
        }
    }
    warnings
}

fn check_overlaps(
    score: &Score,
    line: usize,
    staff: StaffNo,
    place: Place,
    warnings: &mut Vec<LayoutWarning>,
) {
    let placed: Vec<_> = score
        .measures_of(line, staff)
        .into_iter()
        .filter_map(|id| score.measures.get(id.0))
        .flat_map(|m| m.stuff.iter())
        .filter(|s| s.place == place)
        .filter_map(|s| s.placement.map(|p| (s, p)))
        .collect();

    for (i, (a, pa)) in placed.iter().enumerate() {
        for (b, pb) in placed.iter().skip(i + 1) {
            let horizontal = spans_overlap(pa.west, pa.east, pb.west, pb.east);
            let vertical = spans_overlap(pa.south, pa.north, pb.south, pb.north);
            if horizontal && vertical {
                warnings.push(LayoutWarning::new(
                    WarningCategory::Overlap,
                    Some(&b.location),
                    format!(
                        "{} mark on staff {} overlaps a {} mark",
                        b.kind.key(),
                        staff.0,
                        a.kind.key()
                    ),
                ));
            }
        }
    }
}
