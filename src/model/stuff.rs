//! Floating annotations ("stuff") that need vertical placement

use crate::error::InputLocation;
use crate::fonts::Font;

use super::GroupId;

/// Kinds of annotation, as named in stacking orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkType {
    /// Ties and slurs
    Curve,
    /// Musical symbols such as fermatas
    Mussym,
    /// Octave marks
    Octave,
    /// Dynamic marks and hairpins
    Dynamic,
    Text,
    Chord,
    /// Chord grids
    Grid,
    Lyrics,
    Ending,
    Rehearsal,
    Pedal,
}

impl MarkType {
    pub const ALL: [MarkType; 11] = [
        Self::Curve,
        Self::Mussym,
        Self::Octave,
        Self::Dynamic,
        Self::Text,
        Self::Chord,
        Self::Grid,
        Self::Lyrics,
        Self::Ending,
        Self::Rehearsal,
        Self::Pedal,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Curve => "curve",
            Self::Mussym => "mussym",
            Self::Octave => "octave",
            Self::Dynamic => "dynamic",
            Self::Text => "text",
            Self::Chord => "chord",
            Self::Grid => "grid",
            Self::Lyrics => "lyrics",
            Self::Ending => "ending",
            Self::Rehearsal => "rehearsal",
            Self::Pedal => "pedal",
        }
    }

    pub fn from_key(key: &str) -> Option<MarkType> {
        Self::ALL.iter().copied().find(|m| m.key() == key)
    }
}

/// Region an annotation is placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Place {
    #[default]
    Above,
    Below,
    /// Between this staff and the next one down
    Between,
}

/// Horizontal anchoring of text at its X
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Justify {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PedalMark {
    Down,
    Bounce,
    Up,
}

impl PedalMark {
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Down => "Ped.",
            Self::Bounce => "*Ped.",
            Self::Up => "*",
        }
    }
}

/// What an annotation prints
#[derive(Debug, Clone, PartialEq)]
pub enum StuffContent {
    Text {
        text: String,
        font: Font,
        /// Point size; `None` uses the size parameter
        size: Option<f64>,
        justify: Justify,
        /// Trailing width (dashes, extender lines) that may be trimmed when crowded
        extender: f64,
    },
    /// Crescendo or decrescendo wedge spanning `start_x..end_x`
    Hairpin,
    Pedal(PedalMark),
    Ending {
        label: String,
    },
    Rehearsal {
        label: String,
    },
    Grid {
        name: String,
        strings: u8,
        frets: u8,
    },
    /// Tie or slur between two groups
    Curve {
        from: GroupId,
        to: GroupId,
    },
}

/// A user-specified distance from the staff, in steps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dist {
    pub steps: f64,
    /// Place exactly here, ignoring collisions
    pub forced: bool,
}

/// Objects sharing a tag are placed on one common level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlignTag(pub u32);

/// Final position of an annotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub west: f64,
    pub east: f64,
    /// Relative to the staff center line, or to the baseline for `Between`
    pub north: f64,
    pub south: f64,
    /// Horizontal squeeze applied to fit among aligned neighbors
    pub scale: f64,
}

impl Placement {
    /// Edge facing the staff or baseline
    pub fn near_edge(&self, place: Place) -> f64 {
        match place {
            Place::Above | Place::Between => self.south,
            Place::Below => self.north,
        }
    }
}

/// A floating annotation
#[derive(Debug, Clone, PartialEq)]
pub struct Stuff {
    pub kind: MarkType,
    pub place: Place,
    pub start_x: f64,
    /// End of a spanning mark (hairpins, endings, octave lines)
    pub end_x: Option<f64>,
    pub content: StuffContent,
    pub dist: Option<Dist>,
    pub align: Option<AlignTag>,
    pub location: InputLocation,
    pub placement: Option<Placement>,
}

impl Stuff {
    pub fn new(kind: MarkType, place: Place, start_x: f64, content: StuffContent) -> Self {
        Self {
            kind,
            place,
            start_x,
            end_x: None,
            content,
            dist: None,
            align: None,
            location: InputLocation::default(),
            placement: None,
        }
    }

    /// Left-justified text in the default font
    pub fn text(kind: MarkType, place: Place, x: f64, text: impl Into<String>) -> Self {
        Self::new(
            kind,
            place,
            x,
            StuffContent::Text {
                text: text.into(),
                font: Font::Roman,
                size: None,
                justify: Justify::Left,
                extender: 0.0,
            },
        )
    }

    pub fn hairpin(place: Place, start_x: f64, end_x: f64) -> Self {
        Self::new(MarkType::Dynamic, place, start_x, StuffContent::Hairpin).until(end_x)
    }

    pub fn pedal(x: f64, mark: PedalMark) -> Self {
        Self::new(MarkType::Pedal, Place::Below, x, StuffContent::Pedal(mark))
    }

    pub fn curve(place: Place, from: GroupId, to: GroupId) -> Self {
        Self::new(MarkType::Curve, place, 0.0, StuffContent::Curve { from, to })
    }

    pub fn until(mut self, end_x: f64) -> Self {
        self.end_x = Some(end_x);
        self
    }

    pub fn with_dist(mut self, steps: f64) -> Self {
        self.dist = Some(Dist {
            steps,
            forced: false,
        });
        self
    }

    pub fn with_forced_dist(mut self, steps: f64) -> Self {
        self.dist = Some(Dist {
            steps,
            forced: true,
        });
        self
    }

    pub fn aligned(mut self, tag: AlignTag) -> Self {
        self.align = Some(tag);
        self
    }

    pub fn with_location(mut self, location: InputLocation) -> Self {
        self.location = location;
        self
    }

    pub fn is_forced(&self) -> bool {
        self.dist.is_some_and(|d| d.forced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_keys_round_trip() {
        for mark in MarkType::ALL {
            assert_eq!(MarkType::from_key(mark.key()), Some(mark));
        }
        assert_eq!(MarkType::from_key("fermata"), None);
    }

    #[test]
    fn test_near_edge_by_place() {
        let p = Placement {
            west: 0.0,
            east: 1.0,
            north: 0.5,
            south: 0.2,
            scale: 1.0,
        };
        assert_eq!(p.near_edge(Place::Above), 0.2);
        assert_eq!(p.near_edge(Place::Below), 0.5);
    }

    #[test]
    fn test_forced_dist() {
        let s = Stuff::text(MarkType::Text, Place::Above, 1.0, "rit.").with_forced_dist(3.0);
        assert!(s.is_forced());
        assert!(!Stuff::text(MarkType::Text, Place::Above, 1.0, "rit.").with_dist(3.0).is_forced());
    }
}
