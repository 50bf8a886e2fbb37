//! The score arena and its builder

use std::collections::{BTreeSet, HashMap};

use log::warn;

use crate::error::LayoutError;
use crate::params::ParamDelta;

use super::group::{BeamRole, Group, GroupContent};
use super::stuff::Stuff;
use super::{GroupId, MeasureId, StaffNo, VoiceNo};

/// One entry of the document's element sequence
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// A configuration change taking effect at this position
    Params(ParamDelta),
    /// One staff's content for one measure
    Staff(MeasureId),
    Bar,
    /// Start of a new score line
    ScoreBreak,
}

/// One staff's content for one measure
#[derive(Debug, Clone, PartialEq)]
pub struct StaffMeasure {
    pub staff: StaffNo,
    /// Score line this measure is printed on, counted from 0
    pub line: usize,
    /// Groups per voice, index 0 holding voice 1
    pub voices: Vec<Vec<GroupId>>,
    /// Syllable groups of every verse
    pub lyrics: Vec<GroupId>,
    pub stuff: Vec<Stuff>,
    /// Absolute Y of the staff center line, once staffs are placed
    pub y: Option<f64>,
}

impl StaffMeasure {
    fn new(staff: StaffNo, line: usize) -> Self {
        Self {
            staff,
            line,
            voices: Vec::new(),
            lyrics: Vec::new(),
            stuff: Vec::new(),
            y: None,
        }
    }

    pub fn voice(&self, voice: VoiceNo) -> &[GroupId] {
        self.voices
            .get(usize::from(voice.0).saturating_sub(1))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every group of every voice, in voice order
    pub fn all_groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.voices.iter().flatten().copied()
    }
}

/// Strategies for walking to the next group of a voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// Next group of the same value kind, skipping embedded grace or normal groups
    NextInBeam,
    /// Next group with the same content kind
    NextSameContent,
    /// Next group that is not a space
    NextNonSpace,
}

/// A document whose horizontal layout is complete
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Score {
    pub groups: Vec<Group>,
    pub measures: Vec<StaffMeasure>,
    pub elements: Vec<Element>,
    /// Width available to between-staff baselines
    pub page_width: f64,
}

impl Score {
    pub fn get(&self, id: GroupId) -> Result<&Group, LayoutError> {
        self.groups.get(id.0).ok_or(LayoutError::InvalidHandle { id })
    }

    pub fn get_mut(&mut self, id: GroupId) -> Result<&mut Group, LayoutError> {
        self.groups
            .get_mut(id.0)
            .ok_or(LayoutError::InvalidHandle { id })
    }

    pub fn measure(&self, id: MeasureId) -> Result<&StaffMeasure, LayoutError> {
        self.measures
            .get(id.0)
            .ok_or_else(|| LayoutError::internal(format!("measure {} out of range", id.0)))
    }

    pub fn measure_mut(&mut self, id: MeasureId) -> Result<&mut StaffMeasure, LayoutError> {
        self.measures
            .get_mut(id.0)
            .ok_or_else(|| LayoutError::internal(format!("measure {} out of range", id.0)))
    }

    /// Next group after `id` according to a traversal strategy
    pub fn next(&self, id: GroupId, traversal: Traversal) -> Option<GroupId> {
        let current = self.groups.get(id.0)?;
        let mut cursor = current.next;
        while let Some(next_id) = cursor {
            let next = self.groups.get(next_id.0)?;
            let matches = match traversal {
                Traversal::NextInBeam => next.value == current.value,
                Traversal::NextSameContent => next.content == current.content,
                Traversal::NextNonSpace => next.content != GroupContent::Space,
            };
            if matches {
                return Some(next_id);
            }
            cursor = next.next;
        }
        None
    }

    /// Groups of a beamed run, starting at its first member
    pub fn beam_run(&self, first: GroupId) -> Result<Vec<GroupId>, LayoutError> {
        let head = self.get(first)?;
        if head.beam == BeamRole::Lone {
            return Ok(vec![first]);
        }
        let mut members = vec![first];
        let mut cursor = first;
        loop {
            let Some(next) = self.next(cursor, Traversal::NextInBeam) else {
                return Err(LayoutError::unterminated_beam(&head.location));
            };
            let group = self.get(next)?;
            match group.beam {
                BeamRole::Inside => members.push(next),
                BeamRole::End => {
                    members.push(next);
                    return Ok(members);
                }
                BeamRole::None | BeamRole::Start | BeamRole::Lone => {
                    return Err(LayoutError::unterminated_beam(&head.location));
                }
            }
            cursor = next;
        }
    }

    /// Groups linked between two groups of one voice, exclusive of both ends
    pub fn between(&self, from: GroupId, to: GroupId) -> Vec<GroupId> {
        let mut found = Vec::new();
        let mut cursor = self.groups.get(from.0).and_then(|g| g.next);
        while let Some(id) = cursor {
            if id == to {
                return found;
            }
            found.push(id);
            cursor = self.groups.get(id.0).and_then(|g| g.next);
        }
        Vec::new()
    }

    /// Number of score lines
    pub fn line_count(&self) -> usize {
        self.measures.iter().map(|m| m.line + 1).max().unwrap_or(0)
    }

    /// Staffs printed on a score line, top first
    pub fn staffs_on_line(&self, line: usize) -> Vec<StaffNo> {
        self.measures
            .iter()
            .filter(|m| m.line == line)
            .map(|m| m.staff)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Measures of one staff on one score line, in document order
    pub fn measures_of(&self, line: usize, staff: StaffNo) -> Vec<MeasureId> {
        self.measures
            .iter()
            .enumerate()
            .filter(|(_, m)| m.line == line && m.staff == staff)
            .map(|(i, _)| MeasureId(i))
            .collect()
    }

    /// Measure containing a group
    pub fn measure_of(&self, id: GroupId) -> Option<MeasureId> {
        self.measures
            .iter()
            .position(|m| m.all_groups().any(|g| g == id) || m.lyrics.contains(&id))
            .map(MeasureId)
    }
}

/// Builds a [`Score`], assigning handles and linking voices
#[derive(Debug, Default)]
pub struct ScoreBuilder {
    score: Score,
    line: usize,
    last_in_voice: HashMap<(StaffNo, VoiceNo), GroupId>,
}

impl ScoreBuilder {
    pub fn new() -> Self {
        Self {
            score: Score {
                page_width: 8.0,
                ..Score::default()
            },
            ..Self::default()
        }
    }

    pub fn page_width(mut self, width: f64) -> Self {
        self.score.page_width = width;
        self
    }

    /// Record a configuration change at the current position
    pub fn params(&mut self, delta: ParamDelta) -> &mut Self {
        self.score.elements.push(Element::Params(delta));
        self
    }

    /// Start one staff's measure at the current position
    pub fn measure(&mut self, staff: StaffNo) -> MeasureId {
        let id = MeasureId(self.score.measures.len());
        self.score.measures.push(StaffMeasure::new(staff, self.line));
        self.score.elements.push(Element::Staff(id));
        id
    }

    /// Append a group to a voice of a measure, linking it to the voice's previous group
    pub fn add_group(&mut self, measure: MeasureId, voice: VoiceNo, mut group: Group) -> GroupId {
        let id = GroupId(self.score.groups.len());
        let Some(staff) = self.score.measures.get(measure.0).map(|m| m.staff) else {
            warn!("group {} added to missing measure {}, left unlinked", id.0, measure.0);
            self.score.groups.push(group);
            return id;
        };
        group.staff = staff;
        group.voice = voice;
        group.prev = self.last_in_voice.insert((staff, voice), id);
        if let Some(prev) = group.prev {
            if let Some(prev_group) = self.score.groups.get_mut(prev.0) {
                prev_group.next = Some(id);
            }
        }
        self.score.groups.push(group);

        let slot = usize::from(voice.0).saturating_sub(1);
        let m = &mut self.score.measures[measure.0];
        if m.voices.len() <= slot {
            m.voices.resize_with(slot + 1, Vec::new);
        }
        m.voices[slot].push(id);
        id
    }

    /// Append a lyric syllable group to a measure
    pub fn add_syllable(&mut self, measure: MeasureId, mut group: Group) -> GroupId {
        let id = GroupId(self.score.groups.len());
        group.content = GroupContent::Syllable;
        let Some(m) = self.score.measures.get_mut(measure.0) else {
            warn!("syllable {} added to missing measure {}, left unlinked", id.0, measure.0);
            self.score.groups.push(group);
            return id;
        };
        group.staff = m.staff;
        m.lyrics.push(id);
        self.score.groups.push(group);
        id
    }

    pub fn add_stuff(&mut self, measure: MeasureId, stuff: Stuff) -> &mut Self {
        if let Some(m) = self.score.measures.get_mut(measure.0) {
            m.stuff.push(stuff);
        }
        self
    }

    pub fn bar(&mut self) -> &mut Self {
        self.score.elements.push(Element::Bar);
        self
    }

    /// Start a new score line
    pub fn score_break(&mut self) -> &mut Self {
        self.score.elements.push(Element::ScoreBreak);
        self.line += 1;
        self
    }

    pub fn build(self) -> Score {
        self.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Note, Place, Syllable};

    fn beamed_voice() -> (Score, Vec<GroupId>) {
        let mut b = ScoreBuilder::new();
        let m = b.measure(StaffNo(1));
        let ids = vec![
            b.add_group(m, VoiceNo(1), Group::note(1.0, 0).eighth().with_beam(BeamRole::Start)),
            b.add_group(m, VoiceNo(1), Group::note(1.2, 1).eighth().grace()),
            b.add_group(m, VoiceNo(1), Group::note(1.5, 2).eighth().with_beam(BeamRole::End)),
        ];
        (b.build(), ids)
    }

    #[test]
    fn test_group_in_missing_measure_keeps_a_valid_handle() {
        let mut b = ScoreBuilder::new();
        let stray = b.add_group(MeasureId(5), VoiceNo(1), Group::note(1.0, 0));
        let m = b.measure(StaffNo(1));
        let placed = b.add_group(m, VoiceNo(1), Group::note(2.0, 0));
        let score = b.build();

        assert_ne!(stray, placed);
        assert!(score.get(stray).is_ok());
        assert_eq!(score.measure_of(stray), None);
        assert_eq!(score.measures[0].voice(VoiceNo(1)), [placed].as_slice());
        assert_eq!(score.get(placed).unwrap().prev, None);
    }

    #[test]
    fn test_builder_links_voice() {
        let (score, ids) = beamed_voice();
        assert_eq!(score.groups[ids[0].0].next, Some(ids[1]));
        assert_eq!(score.groups[ids[2].0].prev, Some(ids[1]));
        assert_eq!(score.measures[0].voice(VoiceNo(1)), ids.as_slice());
        assert!(score.measures[0].voice(VoiceNo(2)).is_empty());
    }

    #[test]
    fn test_next_in_beam_skips_grace() {
        let (score, ids) = beamed_voice();
        assert_eq!(score.next(ids[0], Traversal::NextInBeam), Some(ids[2]));
        assert_eq!(score.next(ids[0], Traversal::NextNonSpace), Some(ids[1]));
        assert_eq!(score.beam_run(ids[0]).unwrap(), vec![ids[0], ids[2]]);
        assert_eq!(score.between(ids[0], ids[2]), vec![ids[1]]);
    }

    #[test]
    fn test_next_same_content_skips_rests() {
        let mut b = ScoreBuilder::new();
        let m = b.measure(StaffNo(1));
        let a = b.add_group(m, VoiceNo(1), Group::note(0.5, 0));
        b.add_group(m, VoiceNo(1), Group::rest(1.0));
        let c = b.add_group(m, VoiceNo(1), Group::chord(1.5, vec![Note::at(1)]));
        let score = b.build();
        assert_eq!(score.next(a, Traversal::NextSameContent), Some(c));
    }

    #[test]
    fn test_unterminated_beam() {
        let mut b = ScoreBuilder::new();
        let m = b.measure(StaffNo(1));
        let a = b.add_group(m, VoiceNo(1), Group::note(1.0, 0).eighth().with_beam(BeamRole::Start));
        b.add_group(m, VoiceNo(1), Group::note(1.5, 0).eighth().with_beam(BeamRole::Inside));
        let score = b.build();
        assert!(matches!(
            score.beam_run(a),
            Err(LayoutError::UnterminatedBeam { .. })
        ));
    }

    #[test]
    fn test_voices_link_across_measures_and_lines() {
        let mut b = ScoreBuilder::new();
        let m1 = b.measure(StaffNo(1));
        let a = b.add_group(m1, VoiceNo(1), Group::note(1.0, 0));
        b.bar().score_break();
        let m2 = b.measure(StaffNo(1));
        let c = b.add_group(m2, VoiceNo(1), Group::note(0.5, 0));
        b.add_syllable(m2, Group::syllable(0.5, Syllable::new("la", 1, Place::Below)));
        let score = b.build();
        assert_eq!(score.groups[a.0].next, Some(c));
        assert_eq!(score.line_count(), 2);
        assert_eq!(score.measures_of(1, StaffNo(1)), vec![m2]);
        assert_eq!(score.measure_of(c), Some(m2));
        assert_eq!(score.measures[m2.0].lyrics.len(), 1);
    }

    #[test]
    fn test_invalid_handle() {
        let score = Score::default();
        assert!(matches!(
            score.get(GroupId(4)),
            Err(LayoutError::InvalidHandle { id: GroupId(4) })
        ));
    }
}
