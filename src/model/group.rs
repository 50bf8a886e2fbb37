//! Groups: one musical event in a voice

use crate::context::StaffFrame;
use crate::error::InputLocation;
use crate::fonts::Font;
use crate::geometry::{Extent, Line, POINT, STEPSIZE};

use super::note::{Note, NoteStaff};
use super::stuff::Place;
use super::{GroupId, StaffNo, VoiceNo};

/// Half the width of a notehead, in steps
pub const NOTE_HALF_WIDTH_STEPS: f64 = 1.3;

/// Half the height of a notehead, in steps
pub const NOTE_HALF_HEIGHT_STEPS: f64 = 1.0;

/// What a group contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupContent {
    #[default]
    Notes,
    Rest,
    Space,
    Syllable,
}

/// Grace notes are beamed and solved separately from normal notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupValue {
    Grace,
    #[default]
    Normal,
}

/// Position of a group within a beamed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BeamRole {
    #[default]
    None,
    Start,
    Inside,
    End,
    /// A single group carrying its own beam (e.g. a slashed alternation)
    Lone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StemDir {
    #[default]
    Up,
    Down,
}

impl StemDir {
    /// +1 for up, -1 for down
    pub fn sign(&self) -> f64 {
        match self {
            Self::Up => 1.0,
            Self::Down => -1.0,
        }
    }

    pub fn opposite(&self) -> StemDir {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

/// Position of a group within a tuplet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TupletRole {
    #[default]
    None,
    Start,
    Inside,
    End,
    Lone,
}

/// Tuplet information attached to a group
#[derive(Debug, Clone, PartialEq)]
pub struct TupletMark {
    pub role: TupletRole,
    /// Above or below; `Between` is treated as above
    pub side: Place,
    /// User override of the bracket angle, in degrees
    pub forced_angle: Option<f64>,
    /// Printed number, e.g. "3"
    pub number: String,
    pub bracketed: bool,
}

impl TupletMark {
    pub fn new(role: TupletRole, side: Place, number: impl Into<String>) -> Self {
        Self {
            role,
            side,
            forced_angle: None,
            number: number.into(),
            bracketed: true,
        }
    }

    pub fn with_angle(mut self, degrees: f64) -> Self {
        self.forced_angle = Some(degrees);
        self
    }
}

/// Hook length of a tuplet bracket toward the staff, in inches
const BRACKET_HOOK: f64 = 3.0 * POINT;

/// Solved tuplet bracket, relative to the staff center line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TupletGeometry {
    pub line: Line,
    /// Absolute X of the bracket ends
    pub west: f64,
    pub east: f64,
    /// Vertical center of the printed number
    pub number_y: f64,
    pub number_height: f64,
    /// +1 above the staff, -1 below
    pub sign: f64,
}

impl TupletGeometry {
    /// Box covering the bracket, its hooks and the number
    pub fn extent(&self) -> Extent {
        let (y1, y2) = (self.line.y_at(self.west), self.line.y_at(self.east));
        let half = self.number_height / 2.0;
        let hook = self.sign * BRACKET_HOOK;
        let ys = [y1, y2, y1 - hook, y2 - hook, self.number_y - half, self.number_y + half];
        let north = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let south = ys.iter().copied().fold(f64::INFINITY, f64::min);
        Extent::new(self.west, self.east, north, south)
    }
}

/// One lyric syllable
#[derive(Debug, Clone, PartialEq)]
pub struct Syllable {
    pub text: String,
    pub verse: u8,
    pub place: Place,
    pub font: Font,
    /// Point size; `None` uses the lyrics size parameter
    pub size: Option<f64>,
}

impl Syllable {
    pub fn new(text: impl Into<String>, verse: u8, place: Place) -> Self {
        Self {
            text: text.into(),
            verse,
            place,
            font: Font::Roman,
            size: None,
        }
    }
}

/// One musical event in a voice
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub staff: StaffNo,
    pub voice: VoiceNo,
    pub location: InputLocation,

    pub content: GroupContent,
    pub value: GroupValue,
    pub beam: BeamRole,
    pub stem_dir: StemDir,
    /// The user chose the stem direction
    pub stem_dir_forced: bool,
    /// User-forced stem length in steps beyond the outermost note; 0 means no stem
    pub forced_stem: Option<f64>,
    /// User-forced beam angle in degrees, read from the first group of a run
    pub forced_beam_angle: Option<f64>,
    pub notes: Vec<Note>,
    /// 1 = whole, 2 = half, 4 = quarter, 8 = eighth, ...
    pub basic_time: u16,
    pub dots: u8,
    /// Tremolo slashes or alternation beams
    pub slashes: u8,
    /// Cue-size notes
    pub small: bool,
    /// Absolute X of the group's center
    pub x: f64,
    /// Horizontal extent relative to `x`
    pub west: f64,
    pub east: f64,
    /// Vertical position of a rest, in steps above the center line
    pub rest_steps: f64,
    /// Clef printed just before this group: `west`/`east` relative to `x`,
    /// `north`/`south` relative to the center line
    pub clef_before: Option<Extent>,
    pub syllable: Option<Syllable>,
    pub tuplet: Option<TupletMark>,

    /// Previous group in the same staff and voice, across measures
    pub prev: Option<GroupId>,
    /// Next group in the same staff and voice, across measures
    pub next: Option<GroupId>,

    /// Solved stem length in inches
    pub stem_len: f64,
    /// Solved vertical extent relative to the center line
    pub north: f64,
    pub south: f64,
    /// Solved beam equation shared by every member of the run
    pub beam_line: Option<Line>,
    pub tuplet_geometry: Option<TupletGeometry>,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            staff: StaffNo(1),
            voice: VoiceNo(1),
            location: InputLocation::default(),
            content: GroupContent::Notes,
            value: GroupValue::Normal,
            beam: BeamRole::None,
            stem_dir: StemDir::Up,
            stem_dir_forced: false,
            forced_stem: None,
            forced_beam_angle: None,
            notes: Vec::new(),
            basic_time: 4,
            dots: 0,
            slashes: 0,
            small: false,
            x: 0.0,
            west: -NOTE_HALF_WIDTH_STEPS * STEPSIZE,
            east: NOTE_HALF_WIDTH_STEPS * STEPSIZE,
            rest_steps: 0.0,
            clef_before: None,
            syllable: None,
            tuplet: None,
            prev: None,
            next: None,
            stem_len: 0.0,
            north: 0.0,
            south: 0.0,
            beam_line: None,
            tuplet_geometry: None,
        }
    }
}

impl Group {
    /// A chord of notes at an absolute X
    pub fn chord(x: f64, notes: Vec<Note>) -> Self {
        Self {
            x,
            notes,
            ..Self::default()
        }
    }

    /// A single note
    pub fn note(x: f64, steps_up: i32) -> Self {
        Self::chord(x, vec![Note::at(steps_up)])
    }

    pub fn rest(x: f64) -> Self {
        Self {
            x,
            content: GroupContent::Rest,
            ..Self::default()
        }
    }

    pub fn space(x: f64) -> Self {
        Self {
            x,
            content: GroupContent::Space,
            ..Self::default()
        }
    }

    pub fn syllable(x: f64, syllable: Syllable) -> Self {
        Self {
            x,
            content: GroupContent::Syllable,
            syllable: Some(syllable),
            ..Self::default()
        }
    }

    pub fn with_time(mut self, basic_time: u16) -> Self {
        self.basic_time = basic_time;
        self
    }

    pub fn eighth(self) -> Self {
        self.with_time(8)
    }

    pub fn with_beam(mut self, role: BeamRole) -> Self {
        self.beam = role;
        self
    }

    pub fn with_stem(mut self, dir: StemDir) -> Self {
        self.stem_dir = dir;
        self
    }

    /// Stem direction chosen by the user
    pub fn with_forced_dir(mut self, dir: StemDir) -> Self {
        self.stem_dir = dir;
        self.stem_dir_forced = true;
        self
    }

    pub fn with_stem_len(mut self, steps: f64) -> Self {
        self.forced_stem = Some(steps);
        self
    }

    pub fn with_beam_angle(mut self, degrees: f64) -> Self {
        self.forced_beam_angle = Some(degrees);
        self
    }

    pub fn with_dots(mut self, dots: u8) -> Self {
        self.dots = dots;
        self
    }

    pub fn with_slashes(mut self, slashes: u8) -> Self {
        self.slashes = slashes;
        self
    }

    pub fn with_width(mut self, west: f64, east: f64) -> Self {
        self.west = west;
        self.east = east;
        self
    }

    pub fn with_rest_steps(mut self, steps: f64) -> Self {
        self.rest_steps = steps;
        self
    }

    pub fn with_clef_before(mut self, clef: Extent) -> Self {
        self.clef_before = Some(clef);
        self
    }

    pub fn with_tuplet(mut self, tuplet: TupletMark) -> Self {
        self.tuplet = Some(tuplet);
        self
    }

    pub fn with_location(mut self, location: InputLocation) -> Self {
        self.location = location;
        self
    }

    pub fn grace(mut self) -> Self {
        self.value = GroupValue::Grace;
        self
    }

    pub fn cue(mut self) -> Self {
        self.small = true;
        self
    }

    pub fn is_notes(&self) -> bool {
        self.content == GroupContent::Notes && !self.notes.is_empty()
    }

    pub fn is_grace(&self) -> bool {
        self.value == GroupValue::Grace
    }

    pub fn has_stem(&self) -> bool {
        self.is_notes() && self.basic_time >= 2
    }

    /// Number of flags when unbeamed, or beams when beamed
    pub fn flags(&self) -> u8 {
        match self.basic_time {
            t if t >= 8 => (t.trailing_zeros() as u8).saturating_sub(2),
            _ => 0,
        }
    }

    pub fn is_beamed(&self) -> bool {
        self.beam != BeamRole::None
    }

    /// Absolute X where the stem is drawn
    pub fn stem_x(&self, step: f64) -> f64 {
        let offset = NOTE_HALF_WIDTH_STEPS * step * self.size_factor();
        match self.stem_dir {
            StemDir::Up => self.x + offset,
            StemDir::Down => self.x - offset,
        }
    }

    /// Scale applied to grace and cue notes
    pub fn size_factor(&self) -> f64 {
        if self.is_grace() || self.small {
            SMALL_FACTOR
        } else {
            1.0
        }
    }

    pub fn has_cross_staff_notes(&self) -> bool {
        self.notes.iter().any(Note::is_cross_staff)
    }

    /// Every note is printed on another staff
    pub fn all_notes_elsewhere(&self) -> bool {
        !self.notes.is_empty() && self.notes.iter().all(Note::is_cross_staff)
    }

    /// The stem points toward notes printed on another staff
    pub fn stem_toward_other_staff(&self) -> bool {
        self.notes.iter().any(|n| {
            matches!(
                (n.staff, self.stem_dir),
                (NoteStaff::Above, StemDir::Up) | (NoteStaff::Below, StemDir::Down)
            )
        })
    }

    /// Y of a note relative to this group's staff center line
    pub fn note_y(&self, note: &Note, frame: &StaffFrame) -> Option<f64> {
        let offset = match note.staff {
            NoteStaff::Own => 0.0,
            NoteStaff::Above => frame.above?,
            NoteStaff::Below => frame.below?,
        };
        Some(offset + note.steps_up as f64 * frame.step)
    }

    /// Y of every note, lowest first; `None` while a cross-staff note is unresolved
    pub fn note_ys(&self, frame: &StaffFrame) -> Option<Vec<f64>> {
        let mut ys = self
            .notes
            .iter()
            .map(|n| self.note_y(n, frame))
            .collect::<Option<Vec<f64>>>()?;
        ys.sort_by(|a, b| a.total_cmp(b));
        Some(ys)
    }

    /// Y of notes on the group's own staff, lowest first
    pub fn own_note_ys(&self, frame: &StaffFrame) -> Vec<f64> {
        let mut ys: Vec<f64> = self
            .notes
            .iter()
            .filter(|n| !n.is_cross_staff())
            .map(|n| n.steps_up as f64 * frame.step)
            .collect();
        ys.sort_by(|a, b| a.total_cmp(b));
        ys
    }

    /// (base, outer) note Y for the stem: the stem starts at `base` and protrudes past `outer`
    pub fn stem_span(&self, frame: &StaffFrame) -> Option<(f64, f64)> {
        let ys = self.note_ys(frame)?;
        let (low, high) = (*ys.first()?, *ys.last()?);
        Some(match self.stem_dir {
            StemDir::Up => (low, high),
            StemDir::Down => (high, low),
        })
    }

    /// Outer note position in steps, measured beyond the center line in the stem direction
    pub fn outer_steps(&self, frame: &StaffFrame) -> Option<f64> {
        let (_, outer) = self.stem_span(frame)?;
        Some(outer / frame.step * self.stem_dir.sign())
    }

    /// Y of the stem tip implied by the current stem length
    pub fn stem_tip(&self, frame: &StaffFrame) -> Option<f64> {
        let (base, _) = self.stem_span(frame)?;
        Some(base + self.stem_dir.sign() * self.stem_len)
    }

    /// Half height of this group's rest glyph, in steps
    pub fn rest_half_height_steps(&self) -> f64 {
        match self.basic_time {
            0..=2 => 1.0,
            4 => 3.0,
            8 => 2.0,
            16 => 3.0,
            32 => 4.0,
            _ => 5.0,
        }
    }

    /// Recompute `north`/`south` from notes, stem, flags and accidentals
    pub fn set_vertical_bounds(&mut self, frame: &StaffFrame) {
        let step = frame.step * self.size_factor();
        match self.content {
            GroupContent::Notes => {
                let ys = self
                    .note_ys(frame)
                    .unwrap_or_else(|| self.own_note_ys(frame));
                let (Some(&low), Some(&high)) = (ys.first(), ys.last()) else {
                    self.north = 0.0;
                    self.south = 0.0;
                    return;
                };
                let mut north = high + NOTE_HALF_HEIGHT_STEPS * step;
                let mut south = low - NOTE_HALF_HEIGHT_STEPS * step;
                if self.has_stem() && self.stem_len > 0.0 {
                    let tip = match self.stem_dir {
                        StemDir::Up => low + self.stem_len,
                        StemDir::Down => high - self.stem_len,
                    };
                    north = north.max(tip);
                    south = south.min(tip);
                }
                for note in &self.notes {
                    if let (Some(acc), Some(y)) = (note.accidental_box, self.note_y(note, frame)) {
                        north = north.max(y + acc.north);
                        south = south.min(y + acc.south);
                    }
                }
                self.north = north;
                self.south = south;
            }
            GroupContent::Rest => {
                let y = self.rest_steps * frame.step;
                let half = self.rest_half_height_steps() * step;
                self.north = y + half;
                self.south = y - half;
            }
            GroupContent::Space | GroupContent::Syllable => {}
        }
    }

    /// Box of the group relative to the center line, with absolute X
    pub fn extent(&self) -> Extent {
        Extent::new(self.x + self.west, self.x + self.east, self.north, self.south)
    }
}

/// Scale of grace and cue notes relative to normal notes
pub const SMALL_FACTOR: f64 = 0.66;
