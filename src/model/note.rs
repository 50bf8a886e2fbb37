//! Notes within a group

use crate::geometry::Extent;

/// Accidentals printed before a note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accidental {
    Sharp,
    Flat,
    Natural,
    DoubleSharp,
    DoubleFlat,
}

/// Which staff a note is physically printed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteStaff {
    /// The staff the group belongs to
    #[default]
    Own,
    /// The staff immediately above (cross-staff stem)
    Above,
    /// The staff immediately below (cross-staff stem)
    Below,
}

/// One notehead of a group
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Pitch letter `a` through `g`
    pub letter: char,
    pub octave: i8,
    pub accidentals: Vec<Accidental>,
    /// Vertical offset in steps above the center line of the staff the note is on
    pub steps_up: i32,
    pub staff: NoteStaff,
    /// Accidental glyph box: `west`/`east` relative to the group's X,
    /// `north`/`south` relative to the note's Y
    pub accidental_box: Option<Extent>,
}

impl Note {
    /// A note at a vertical position on its own staff
    pub fn at(steps_up: i32) -> Self {
        // Treble clef: the center line is B4
        let diatonic = 4 * 7 + 6 + steps_up;
        let letter = ['c', 'd', 'e', 'f', 'g', 'a', 'b'][diatonic.rem_euclid(7) as usize];
        Self {
            letter,
            octave: diatonic.div_euclid(7) as i8,
            accidentals: Vec::new(),
            steps_up,
            staff: NoteStaff::Own,
            accidental_box: None,
        }
    }

    /// Attach an accidental with its glyph box
    pub fn with_accidental(mut self, accidental: Accidental, glyph: Extent) -> Self {
        self.accidentals.push(accidental);
        self.accidental_box = Some(glyph);
        self
    }

    /// Print this note on a neighboring staff
    pub fn on_staff(mut self, staff: NoteStaff) -> Self {
        self.staff = staff;
        self
    }

    pub fn is_cross_staff(&self) -> bool {
        self.staff != NoteStaff::Own
    }
}
