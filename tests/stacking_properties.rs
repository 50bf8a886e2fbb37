//! Property tests for annotation stacking and beam stems

use proptest::prelude::*;

use score_vertical::context::{Pass, SolveContext};
use score_vertical::geometry::{FUDGE, STEPSIZE};
use score_vertical::layout::RectTable;
use score_vertical::model::{BeamRole, Group, Place, ScoreBuilder, StaffNo, StemDir, VoiceNo};
use score_vertical::stems::required_protrusion;
use score_vertical::{solve, ApproxFontMetrics, ParamState};

const TOLERANCE: f64 = 1e-9;

fn boxes() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    prop::collection::vec((0.0..10.0f64, 0.05..3.0f64, 0.01..1.0f64), 1..24)
}

fn place() -> impl Strategy<Value = Place> {
    prop_oneof![Just(Place::Above), Just(Place::Below), Just(Place::Between)]
}

proptest! {
    #[test]
    fn test_stacked_boxes_never_overlap(
        place in place(),
        items in boxes(),
        clearance in 0.0..0.5f64,
    ) {
        let mut table = RectTable::new(place);
        for &(west, width, height) in &items {
            let d = table.stack_one(west, west + width, height, clearance);
            prop_assert!(d >= clearance);
        }
        prop_assert!(table.overlapping_pairs().is_empty());
    }

    #[test]
    fn test_isolated_box_sits_at_clearance(
        items in boxes(),
        clearance in 0.0..0.5f64,
        height in 0.01..1.0f64,
    ) {
        let mut table = RectTable::new(Place::Above);
        for &(west, width, h) in &items {
            table.stack_one(west, west + width, h, clearance);
        }
        // Every stacked box ends before x = 13
        let d = table.stack_one(20.0, 21.0, height, clearance);
        prop_assert_eq!(d, clearance);
    }

    #[test]
    fn test_beamed_stems_meet_member_requirements(
        steps in prop::collection::vec(-8i32..=8, 2..7),
        down in any::<bool>(),
    ) {
        let dir = if down { StemDir::Down } else { StemDir::Up };
        let mut b = ScoreBuilder::new();
        let m = b.measure(StaffNo(1));
        let n = steps.len();
        let ids: Vec<_> = steps
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let role = match i {
                    0 => BeamRole::Start,
                    i if i + 1 == n => BeamRole::End,
                    _ => BeamRole::Inside,
                };
                let group = Group::note(1.0 + 0.4 * i as f64, s)
                    .eighth()
                    .with_beam(role)
                    .with_stem(dir);
                b.add_group(m, VoiceNo(1), group)
            })
            .collect();
        let mut score = b.build();
        solve(&mut score).expect("Should solve");

        let params = ParamState::new();
        let fonts = ApproxFontMetrics::default();
        let ctx = SolveContext::new(&params, &fonts, Pass::First, StaffNo(1));
        for id in ids {
            let group = score.get(id).unwrap();
            prop_assert!(group.stem_len >= 0.0);
            let needed = required_protrusion(&ctx, group);
            prop_assert!(
                group.stem_len >= needed - FUDGE * STEPSIZE - TOLERANCE,
                "stem {} shorter than required {}",
                group.stem_len,
                needed
            );
        }
    }
}
