//! Horizontal squeezing of aligned objects
//!
//! Objects sharing an alignment tag must sit on one level, so neighbors
//! that overlap horizontally are shortened instead of stacked. Trailing
//! extenders are trimmed first. A single remaining overlap is resolved by
//! scaling both objects by one shared factor; several overlaps are removed
//! right to left, one object at a time.

use log::warn;

use crate::geometry::FUDGE;

/// One aligned object: an anchor X and widths on either side of it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedItem {
    pub anchor: f64,
    pub left: f64,
    pub right: f64,
    /// Part of `right` that may be dropped when crowded
    pub extender: f64,
    pub scale: f64,
}

impl AlignedItem {
    pub fn new(anchor: f64, left: f64, right: f64) -> Self {
        Self {
            anchor,
            left,
            right,
            extender: 0.0,
            scale: 1.0,
        }
    }

    pub fn with_extender(mut self, extender: f64) -> Self {
        self.extender = extender.clamp(0.0, self.right);
        self
    }

    pub fn west(&self) -> f64 {
        self.anchor - self.left * self.scale
    }

    pub fn east(&self) -> f64 {
        self.anchor + self.right * self.scale
    }
}

/// Outcome of squeezing one aligned set
#[derive(Debug, Clone, PartialEq)]
pub struct Squeeze {
    pub items: Vec<AlignedItem>,
    /// Some object would have needed a scale below the floor
    pub hit_floor: bool,
}

fn overlap(a: &AlignedItem, b: &AlignedItem) -> f64 {
    a.east() - b.west()
}

fn overlapping_pairs(items: &[AlignedItem]) -> Vec<usize> {
    (0..items.len().saturating_sub(1))
        .filter(|&i| overlap(&items[i], &items[i + 1]) > FUDGE)
        .collect()
}

/// Squeeze an aligned set so neighbors no longer overlap
///
/// Items are sorted by anchor first. `min_scale` bounds every scale factor.
pub fn squeeze(mut items: Vec<AlignedItem>, min_scale: f64) -> Squeeze {
    items.sort_by(|a, b| a.anchor.total_cmp(&b.anchor));
    let mut hit_floor = false;

    if overlapping_pairs(&items).is_empty() {
        return Squeeze { items, hit_floor };
    }

    // Extenders first
    for i in overlapping_pairs(&items) {
        let excess = overlap(&items[i], &items[i + 1]);
        let trim = excess.min(items[i].extender);
        items[i].right -= trim;
        items[i].extender -= trim;
    }

    let remaining = overlapping_pairs(&items);
    if remaining.len() == 1 {
        let i = remaining[0];
        let (a, b) = (items[i], items[i + 1]);
        let gap = b.anchor - a.anchor;
        let widths = a.right + b.left;
        let mut s = if widths > 0.0 { gap / widths } else { 1.0 };
        if s < min_scale {
            s = min_scale;
            hit_floor = true;
        }
        let s = s.min(1.0);
        items[i].scale = s;
        items[i + 1].scale = s;
    } else if !remaining.is_empty() {
        for i in (0..items.len() - 1).rev() {
            let limit = items[i + 1].west();
            let item = &mut items[i];
            if item.east() - limit <= FUDGE || item.right <= 0.0 {
                continue;
            }
            let mut s = (limit - item.anchor) / item.right;
            if s < min_scale {
                s = min_scale;
                hit_floor = true;
            }
            item.scale = s.min(item.scale);
        }
    }

    if hit_floor {
        warn!(
            "aligned objects near x={:.3} cannot be squeezed below scale {:.2}",
            items.first().map(|i| i.anchor).unwrap_or_default(),
            min_scale
        );
    }
    Squeeze { items, hit_floor }
}
