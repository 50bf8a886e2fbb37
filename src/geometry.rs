//! Shared geometry: units, boxes, lines and the least-squares fit

/// One printer's point, in inches
pub const POINT: f64 = 1.0 / 72.0;

/// Distance between a staff line and the adjacent space at staff scale 1.0
pub const STEPSIZE: f64 = 3.0 * POINT;

/// Tolerance for floating-point comparisons of coordinates
pub const FUDGE: f64 = 0.001;

/// Standard padding between adjacent printed items
pub const STDPAD: f64 = POINT;

/// Half the height of a five-line staff, in steps
pub const HALF_STAFF_STEPS: f64 = 4.0;

/// An axis-aligned box
///
/// Depending on context `west`/`east` are absolute or relative to a group's
/// X, and `north`/`south` are relative to a staff center line or a note.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Extent {
    pub west: f64,
    pub east: f64,
    pub north: f64,
    pub south: f64,
}

impl Extent {
    pub fn new(west: f64, east: f64, north: f64, south: f64) -> Self {
        Self {
            west,
            east,
            north,
            south,
        }
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Shift horizontally and vertically
    pub fn translate(&self, dx: f64, dy: f64) -> Extent {
        Extent::new(self.west + dx, self.east + dx, self.north + dy, self.south + dy)
    }

    /// Smallest box containing both
    pub fn union(&self, other: &Extent) -> Extent {
        Extent::new(
            self.west.min(other.west),
            self.east.max(other.east),
            self.north.max(other.north),
            self.south.min(other.south),
        )
    }

    /// Horizontal intersection, ignoring round-off sized contact
    pub fn overlaps_x(&self, other: &Extent) -> bool {
        spans_overlap(self.west, self.east, other.west, other.east)
    }

    /// Vertical intersection, ignoring round-off sized contact
    pub fn overlaps_y(&self, other: &Extent) -> bool {
        spans_overlap(self.south, self.north, other.south, other.north)
    }

    pub fn overlaps(&self, other: &Extent) -> bool {
        self.overlaps_x(other) && self.overlaps_y(other)
    }
}

/// True if the open intervals intersect by more than [`FUDGE`]
pub fn spans_overlap(lo1: f64, hi1: f64, lo2: f64, hi2: f64) -> bool {
    lo1 < hi2 - FUDGE && lo2 < hi1 - FUDGE
}

/// The affine equation `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Line {
    pub slope: f64,
    pub intercept: f64,
}

impl Line {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    pub fn horizontal(y: f64) -> Self {
        Self::new(0.0, y)
    }

    /// Line through two points; vertical input yields a horizontal line at the mean
    pub fn through(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        if (x2 - x1).abs() < f64::EPSILON {
            return Self::horizontal((y1 + y2) / 2.0);
        }
        let slope = (y2 - y1) / (x2 - x1);
        Self::new(slope, y1 - slope * x1)
    }

    pub fn y_at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Same slope, moved vertically
    pub fn shifted(&self, dy: f64) -> Self {
        Self::new(self.slope, self.intercept + dy)
    }

    /// Angle above horizontal in degrees
    pub fn angle_degrees(&self) -> f64 {
        self.slope.atan().to_degrees()
    }
}

/// Ordinary least-squares fit of `y` on `x`
///
/// Returns `None` for fewer than two points or when every `x` is the same.
pub fn least_squares(points: &[(f64, f64)]) -> Option<Line> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, y) in points {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }
    if sxx < f64::EPSILON {
        return None;
    }
    let slope = sxy / sxx;
    Some(Line::new(slope, mean_y - slope * mean_x))
}

/// Scale a slope toward zero and clamp it to a maximum angle
pub fn attenuate_slope(slope: f64, factor: f64, max_angle_degrees: f64) -> f64 {
    let limit = max_angle_degrees.to_radians().tan().abs();
    (slope * factor).clamp(-limit, limit)
}
