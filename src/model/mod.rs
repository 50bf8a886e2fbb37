//! Document model: groups, notes, annotations and the score arena
//!
//! Groups live in one arena owned by [`Score`] and are addressed by
//! [`GroupId`]. Voice order is expressed with explicit `prev`/`next`
//! handles that continue across bar lines.

mod group;
mod note;
mod score;
mod stuff;

pub use group::{
    BeamRole, Group, GroupContent, GroupValue, StemDir, Syllable, TupletGeometry, TupletMark,
    TupletRole, NOTE_HALF_HEIGHT_STEPS, NOTE_HALF_WIDTH_STEPS, SMALL_FACTOR,
};
pub use note::{Accidental, Note, NoteStaff};
pub use score::{Element, Score, ScoreBuilder, StaffMeasure, Traversal};
pub use stuff::{
    AlignTag, Dist, Justify, MarkType, PedalMark, Place, Placement, Stuff, StuffContent,
};

/// Handle of a group in the score arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub usize);

/// Staff number, counted from 1 at the top of the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StaffNo(pub u16);

/// Voice number within a staff, counted from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceNo(pub u8);

/// Handle of one staff's measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeasureId(pub usize);
