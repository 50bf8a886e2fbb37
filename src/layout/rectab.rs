//! Rectangle table: greedy outward stacking of boxes around one reference line
//!
//! Every object's horizontal extent is fixed, so placement is a 1-D search
//! along the outward axis. Boxes are stored as distances from the staff
//! center line (or the between-staff baseline), growing away from it, so one
//! algorithm serves every side.
//!
//! A query starts at its minimum clearance. While the candidate collides
//! with a relevant box not yet used as a boundary, it moves to the innermost
//! such boundary further out. Each step retires one boundary, so the search
//! always ends.

use log::trace;

use crate::geometry::{spans_overlap, Extent};
use crate::model::Place;

/// A placed box in outward-distance coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub west: f64,
    pub east: f64,
    /// Distance of the edge facing the reference line
    pub inner: f64,
    /// Distance of the edge facing away
    pub outer: f64,
}

impl Rect {
    fn overlaps(&self, other: &Rect) -> bool {
        spans_overlap(self.west, self.east, other.west, other.east)
            && spans_overlap(self.inner, self.outer, other.inner, other.outer)
    }
}

/// Horizontal span and height of one box to be placed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub west: f64,
    pub east: f64,
    pub height: f64,
}

impl Span {
    pub fn new(west: f64, east: f64, height: f64) -> Self {
        Self { west, east, height }
    }

    fn relevant(&self, rect: &Rect) -> bool {
        spans_overlap(self.west, self.east, rect.west, rect.east)
    }

    fn collides_at(&self, rect: &Rect, distance: f64) -> bool {
        self.relevant(rect) && spans_overlap(distance, distance + self.height, rect.inner, rect.outer)
    }
}

/// Scratch table for one (staff, side) unit of work
#[derive(Debug, Clone)]
pub struct RectTable {
    place: Place,
    rects: Vec<Rect>,
}

impl RectTable {
    pub fn new(place: Place) -> Self {
        Self {
            place,
            rects: Vec::new(),
        }
    }

    /// Table for between-staff objects, seeded with a zero-height baseline
    pub fn between(width: f64) -> Self {
        let mut table = Self::new(Place::Between);
        table.rects.push(Rect {
            west: 0.0,
            east: width,
            inner: 0.0,
            outer: 0.0,
        });
        table
    }

    pub fn place(&self) -> Place {
        self.place
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Convert a box in staff coordinates to outward distances
    pub fn to_distance(&self, north: f64, south: f64) -> (f64, f64) {
        let (inner, outer) = match self.place {
            Place::Above | Place::Between => (south, north),
            Place::Below => (-north, -south),
        };
        (inner.min(outer), inner.max(outer))
    }

    /// Convert a near-edge distance and height back to (north, south)
    pub fn to_bounds(&self, distance: f64, height: f64) -> (f64, f64) {
        match self.place {
            Place::Above | Place::Between => (distance + height, distance),
            Place::Below => (-distance, -distance - height),
        }
    }

    /// Add an obstacle that is already positioned, such as a group's box
    pub fn seed(&mut self, extent: &Extent) {
        let (inner, outer) = self.to_distance(extent.north, extent.south);
        self.rects.push(Rect {
            west: extent.west,
            east: extent.east,
            inner,
            outer,
        });
    }

    /// Place one box as close as `min_clearance` allows; returns its near-edge distance
    pub fn stack_one(&mut self, west: f64, east: f64, height: f64, min_clearance: f64) -> f64 {
        self.stack_group(&[Span::new(west, east, height)], min_clearance)
    }

    /// Place a batch of boxes on one shared level; returns the level's distance
    pub fn stack_group(&mut self, spans: &[Span], min_clearance: f64) -> f64 {
        let distance = self.find_level(spans, min_clearance);
        self.append(spans, distance);
        distance
    }

    /// Place boxes at a given distance without checking for collisions
    pub fn place_at(&mut self, spans: &[Span], distance: f64) -> f64 {
        self.append(spans, distance);
        distance
    }

    fn append(&mut self, spans: &[Span], distance: f64) {
        self.rects.extend(spans.iter().map(|s| Rect {
            west: s.west,
            east: s.east,
            inner: distance,
            outer: distance + s.height,
        }));
    }

    fn find_level(&self, spans: &[Span], min_clearance: f64) -> f64 {
        // Query-local scratch state, one entry per table row
        let relevant: Vec<bool> = self
            .rects
            .iter()
            .map(|r| spans.iter().any(|s| s.relevant(r)))
            .collect();
        let mut tried: Vec<bool> = self
            .rects
            .iter()
            .zip(&relevant)
            .map(|(r, &rel)| rel && r.outer <= min_clearance)
            .collect();

        let mut distance = min_clearance;
        loop {
            let collides = self.rects.iter().enumerate().any(|(i, r)| {
                relevant[i] && !tried[i] && spans.iter().any(|s| s.collides_at(r, distance))
            });
            if !collides {
                return distance;
            }
            let next = (0..self.rects.len())
                .filter(|&i| relevant[i] && !tried[i])
                .min_by(|&a, &b| self.rects[a].outer.total_cmp(&self.rects[b].outer));
            let Some(i) = next else {
                return distance;
            };
            tried[i] = true;
            if self.rects[i].outer > distance {
                trace!(
                    "stacking {:?}: moving from {:.4} to {:.4}",
                    self.place,
                    distance,
                    self.rects[i].outer
                );
                distance = self.rects[i].outer;
            }
        }
    }

    /// Outermost distance reached by any box, at least zero
    pub fn outermost(&self) -> f64 {
        self.rects.iter().map(|r| r.outer).fold(0.0, f64::max)
    }

    /// Pairs of boxes overlapping beyond the tolerance
    pub fn overlapping_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..self.rects.len() {
            for j in i + 1..self.rects.len() {
                if self.rects[i].overlaps(&self.rects[j]) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }
}
