//! Visual stacking order of mark types

use crate::model::MarkType;

/// Priority of each mark type when stacking outward from a staff
///
/// Lower priorities are placed first, so they end up closer to the staff.
/// Mark types that share a priority form one tier and are placed together.
/// Mark types the order does not mention are placed last, one tier each.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StackOrder {
    priorities: Vec<(MarkType, u32)>,
}

impl StackOrder {
    /// Build an order; a repeated mark type keeps its last priority
    pub fn new(priorities: impl IntoIterator<Item = (MarkType, u32)>) -> Self {
        let mut order = Self::default();
        for (mark, priority) in priorities {
            order.priorities.retain(|(m, _)| *m != mark);
            order.priorities.push((mark, priority));
        }
        order
    }

    pub fn default_above() -> Self {
        use MarkType::*;
        Self::new([
            (Curve, 1),
            (Mussym, 2),
            (Octave, 3),
            (Dynamic, 4),
            (Text, 4),
            (Chord, 4),
            (Grid, 4),
            (Lyrics, 5),
            (Ending, 6),
            (Rehearsal, 7),
            (Pedal, 8),
        ])
    }

    pub fn default_below() -> Self {
        use MarkType::*;
        Self::new([
            (Curve, 1),
            (Mussym, 2),
            (Octave, 3),
            (Dynamic, 4),
            (Text, 4),
            (Chord, 4),
            (Grid, 4),
            (Lyrics, 5),
            (Pedal, 6),
            (Ending, 7),
            (Rehearsal, 8),
        ])
    }

    pub fn default_between() -> Self {
        use MarkType::*;
        Self::new([
            (Mussym, 1),
            (Dynamic, 2),
            (Text, 2),
            (Chord, 2),
            (Grid, 2),
            (Lyrics, 3),
        ])
    }

    pub fn priority(&self, mark: MarkType) -> Option<u32> {
        self.priorities
            .iter()
            .find(|(m, _)| *m == mark)
            .map(|(_, p)| *p)
    }

    /// Mark types grouped by shared priority, in placement order
    pub fn tiers(&self) -> Vec<Vec<MarkType>> {
        let mut listed: Vec<u32> = self.priorities.iter().map(|(_, p)| *p).collect();
        listed.sort_unstable();
        listed.dedup();

        let mut tiers: Vec<Vec<MarkType>> = listed
            .iter()
            .map(|priority| {
                MarkType::ALL
                    .iter()
                    .copied()
                    .filter(|mark| self.priority(*mark) == Some(*priority))
                    .collect()
            })
            .collect();

        for mark in MarkType::ALL {
            if self.priority(mark).is_none() {
                tiers.push(vec![mark]);
            }
        }
        tiers
    }
}
