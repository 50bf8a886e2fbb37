//! Integration tests for the score-vertical solver

use float_cmp::approx_eq;
use pretty_assertions::assert_eq;

use score_vertical::geometry::{STDPAD, STEPSIZE};
use score_vertical::layout::RectTable;
use score_vertical::model::{
    Accidental, AlignTag, BeamRole, Group, GroupId, MarkType, MeasureId, Note, NoteStaff, Place,
    Score, ScoreBuilder, StaffNo, StemDir, Stuff, TupletMark, TupletRole, VoiceNo,
};
use score_vertical::{
    solve, solve_with_config, ApproxFontMetrics, Extent, LayoutError, Line, ParamDelta, ParamName,
    ParamState, StaffFrame, VerticalConfig,
};

const TOLERANCE: f64 = 1e-9;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn beamed_run(steps: &[i32]) -> (Score, Vec<GroupId>) {
    beamed_run_of(8, steps)
}

fn beamed_run_of(basic_time: u16, steps: &[i32]) -> (Score, Vec<GroupId>) {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let ids = steps
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let role = match i {
                0 => BeamRole::Start,
                i if i + 1 == steps.len() => BeamRole::End,
                _ => BeamRole::Inside,
            };
            let group = Group::note(1.0 + 0.5 * i as f64, s)
                .with_time(basic_time)
                .with_beam(role);
            b.add_group(m, VoiceNo(1), group)
        })
        .collect();
    (b.build(), ids)
}

fn beam_of(score: &Score, id: GroupId) -> Line {
    score.get(id).unwrap().beam_line.expect("beam line")
}

fn stem_of(score: &Score, id: GroupId) -> f64 {
    score.get(id).unwrap().stem_len
}

#[test]
fn test_equal_pitches_give_flat_beam() {
    init_logging();
    let (mut score, ids) = beamed_run(&[-4, -4, -4]);
    solve(&mut score).expect("Should solve");

    let line = score.get(ids[0]).unwrap().beam_line.expect("beam line");
    assert_eq!(line.slope, 0.0);
    let first = score.get(ids[0]).unwrap().stem_len;
    assert!(approx_eq!(f64, first, 7.0 * STEPSIZE, epsilon = TOLERANCE));
    for id in &ids {
        let group = score.get(*id).unwrap();
        assert_eq!(group.beam_line, Some(line));
        assert!(approx_eq!(f64, group.stem_len, first, epsilon = TOLERANCE));
    }
}

#[test]
fn test_equal_pitch_quarters_give_flat_beam() {
    let (mut score, ids) = beamed_run_of(4, &[-4, -4, -4]);
    solve(&mut score).expect("Should solve");

    let line = beam_of(&score, ids[0]);
    assert_eq!(line.slope, 0.0);
    for id in &ids {
        assert!(approx_eq!(f64, stem_of(&score, *id), 7.0 * STEPSIZE, epsilon = TOLERANCE));
    }
}

#[test]
fn test_stem_lengths_reach_the_beam_line() {
    let (mut score, ids) = beamed_run(&[-5, -3, -1, 0]);
    solve(&mut score).expect("Should solve");

    let frame = StaffFrame::new(STEPSIZE);
    for id in ids {
        let group = score.get(id).unwrap();
        let line = group.beam_line.expect("beam line");
        let tip = group.stem_tip(&frame).unwrap();
        assert!(
            approx_eq!(f64, tip, line.y_at(group.stem_x(STEPSIZE)), epsilon = TOLERANCE),
            "stem of {:?} ends off the beam",
            id
        );
    }
}

#[test]
fn test_both_ends_forced_to_zero_prints_no_beam() {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let ids = [
        Group::note(1.0, 0).eighth().with_beam(BeamRole::Start).with_stem_len(0.0),
        Group::note(1.5, 2).eighth().with_beam(BeamRole::Inside),
        Group::note(2.0, 4).eighth().with_beam(BeamRole::End).with_stem_len(0.0),
    ]
    .map(|g| b.add_group(m, VoiceNo(1), g));
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    for id in ids {
        let group = score.get(id).unwrap();
        assert_eq!(group.stem_len, 0.0);
        assert_eq!(group.beam_line, None);
    }
}

#[test]
fn test_unterminated_beam_is_an_error() {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    b.add_group(m, VoiceNo(1), Group::note(1.0, 0).eighth().with_beam(BeamRole::Start));
    b.add_group(m, VoiceNo(1), Group::note(1.5, 0).eighth().with_beam(BeamRole::Inside));
    let mut score = b.build();

    let err = solve(&mut score).unwrap_err();
    assert!(matches!(err, LayoutError::UnterminatedBeam { .. }));
    assert!(!err.is_internal());
}

#[test]
fn test_invalid_handle() {
    let score = ScoreBuilder::new().build();
    let err = score.get(GroupId(99)).unwrap_err();
    assert!(matches!(err, LayoutError::InvalidHandle { .. }));
    assert!(err.is_internal());
}

#[test]
fn test_tuplet_disagreeing_candidates_flatten() {
    init_logging();
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let tuplet = |role| TupletMark::new(role, Place::Above, "3");
    let first = b.add_group(
        m,
        VoiceNo(1),
        Group::note(1.0, 0).with_time(1).with_tuplet(tuplet(TupletRole::Start)),
    );
    b.add_group(
        m,
        VoiceNo(1),
        Group::note(2.0, 4).with_time(1).with_tuplet(tuplet(TupletRole::Inside)),
    );
    b.add_group(
        m,
        VoiceNo(1),
        Group::rest(3.0)
            .with_time(1)
            .with_rest_steps(-8.0)
            .with_tuplet(tuplet(TupletRole::End)),
    );
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    let geometry = score.get(first).unwrap().tuplet_geometry.expect("bracket");
    assert_eq!(geometry.line.slope, 0.0);
    // Clear of the highest member and at least the minimum distance out
    assert!(geometry.line.y_at(2.0) > 5.0 * STEPSIZE);
    assert!(geometry.line.y_at(1.0) >= 6.0 * STEPSIZE - TOLERANCE);
}

#[test]
fn test_aligned_marks_share_one_level() {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    // A high note under the second mark only
    b.add_group(m, VoiceNo(1), Group::note(1.0, -4));
    b.add_group(m, VoiceNo(1), Group::note(3.0, 10));
    let tag = AlignTag(1);
    b.add_stuff(m, Stuff::text(MarkType::Dynamic, Place::Above, 1.0, "p").aligned(tag));
    b.add_stuff(m, Stuff::text(MarkType::Dynamic, Place::Above, 3.0, "f").aligned(tag));
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    let measure = score.measure(score_vertical::model::MeasureId(0)).unwrap();
    let placements: Vec<_> = measure
        .stuff
        .iter()
        .map(|s| s.placement.expect("placed"))
        .collect();
    assert!(approx_eq!(f64, placements[0].south, placements[1].south, epsilon = TOLERANCE));
    assert!(placements[1].south > 10.0 * STEPSIZE);
}

#[test]
fn test_rect_table_stacks_overlapping_box_outward() {
    let mut table = RectTable::new(Place::Above);
    let a = table.stack_one(0.0, 2.0, 0.2, 0.1);
    let b = table.stack_one(1.0, 3.0, 0.2, 0.1);
    assert_eq!(a, 0.1);
    assert!(b >= a + 0.2);
    assert!(table.overlapping_pairs().is_empty());
}

#[test]
fn test_toml_params_change_stem_length() {
    let params = ParamState::from_toml("[score]\nstemlen = 5.0\n\n[staff.2]\nstemlen = 6.0\n")
        .expect("Should parse");
    let config = VerticalConfig::new().with_params(params);

    let mut b = ScoreBuilder::new();
    let m1 = b.measure(StaffNo(1));
    let one = b.add_group(m1, VoiceNo(1), Group::note(1.0, -4));
    let m2 = b.measure(StaffNo(2));
    let two = b.add_group(m2, VoiceNo(1), Group::note(1.0, -4));
    let mut score = b.build();
    solve_with_config(&mut score, &config, &ApproxFontMetrics::default()).expect("Should solve");

    assert!(approx_eq!(f64, score.get(one).unwrap().stem_len, 5.0 * STEPSIZE, epsilon = TOLERANCE));
    assert!(approx_eq!(f64, score.get(two).unwrap().stem_len, 6.0 * STEPSIZE, epsilon = TOLERANCE));
}

#[test]
fn test_staffs_stack_downward() {
    let mut b = ScoreBuilder::new();
    for staff in [StaffNo(1), StaffNo(2)] {
        let m = b.measure(staff);
        b.add_group(m, VoiceNo(1), Group::note(1.0, 0));
    }
    let mut score = b.build();
    let report = solve(&mut score).expect("Should solve");

    assert_eq!(report.staff(0, StaffNo(1)).map(|p| p.y), Some(0.0));
    let lower = report.staff(0, StaffNo(2)).expect("second staff").y;
    // staffsep plus two half staffs
    assert!(lower <= -18.0 * STEPSIZE + TOLERANCE);
}

#[test]
fn test_cross_staff_stem_solved_in_second_pass() {
    init_logging();
    let mut b = ScoreBuilder::new();
    let upper = b.measure(StaffNo(1));
    b.add_group(upper, VoiceNo(1), Group::note(1.0, 0));
    let lower = b.measure(StaffNo(2));
    let chord = Group::chord(
        1.0,
        vec![Note::at(0), Note::at(-4).on_staff(NoteStaff::Above)],
    );
    let id = b.add_group(lower, VoiceNo(1), chord);
    let mut score = b.build();

    let report = solve(&mut score).expect("Should solve");
    assert!(report.deferred > 0);

    let distance = -report.staff(0, StaffNo(2)).expect("second staff").y;
    let group = score.get(id).unwrap();
    // The stem reaches the upper staff's note and protrudes past it
    assert!(group.stem_len > distance - 4.0 * STEPSIZE);
    assert!(report
        .warnings
        .iter()
        .all(|w| w.category != score_vertical::WarningCategory::CrossStaff));
}

#[test]
fn test_cross_staff_without_neighbor_warns() {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let chord = Group::chord(
        1.0,
        vec![Note::at(0), Note::at(2).on_staff(NoteStaff::Above)],
    );
    let id = b.add_group(m, VoiceNo(1), chord);
    let mut score = b.build();

    let report = solve(&mut score).expect("Should solve");
    assert!(report
        .warnings
        .iter()
        .any(|w| w.category == score_vertical::WarningCategory::CrossStaff));
    // Falls back to the own-staff note
    let group = score.get(id).unwrap();
    assert!(approx_eq!(f64, group.stem_len, 7.0 * STEPSIZE, epsilon = TOLERANCE));
}

#[test]
fn test_beam_clears_note_of_other_voice() {
    init_logging();
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let start = Group::note(1.0, -4).eighth().with_beam(BeamRole::Start);
    let first = b.add_group(m, VoiceNo(1), start);
    b.add_group(m, VoiceNo(1), Group::note(1.5, -4).eighth().with_beam(BeamRole::End));
    b.add_group(m, VoiceNo(2), Group::note(1.25, 4).with_stem(StemDir::Down));
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    // Beam underside above the voice-2 notehead top at 5 steps
    let line = beam_of(&score, first);
    assert!(line.y_at(1.25) - STEPSIZE >= 5.0 * STEPSIZE + STDPAD - TOLERANCE);
}

#[test]
fn test_one_forced_end_pivots_the_beam() {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let ids = [
        Group::note(1.0, -4).eighth().with_beam(BeamRole::Start).with_stem_len(10.0),
        Group::note(1.5, -4).eighth().with_beam(BeamRole::Inside),
        Group::note(2.0, -4).eighth().with_beam(BeamRole::End),
    ]
    .map(|g| b.add_group(m, VoiceNo(1), g));
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    assert!(approx_eq!(f64, stem_of(&score, ids[0]), 10.0 * STEPSIZE, epsilon = TOLERANCE));
    assert!(approx_eq!(f64, stem_of(&score, ids[1]), 8.5 * STEPSIZE, epsilon = TOLERANCE));
    assert!(approx_eq!(f64, stem_of(&score, ids[2]), 7.0 * STEPSIZE, epsilon = TOLERANCE));
}

#[test]
fn test_one_forced_end_with_forced_angle_shifts_the_beam() {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let ids = [
        Group::note(1.0, -4)
            .eighth()
            .with_beam(BeamRole::Start)
            .with_stem_len(10.0)
            .with_beam_angle(0.0),
        Group::note(1.5, -4).eighth().with_beam(BeamRole::Inside),
        Group::note(2.0, -4).eighth().with_beam(BeamRole::End),
    ]
    .map(|g| b.add_group(m, VoiceNo(1), g));
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    assert_eq!(beam_of(&score, ids[0]).slope, 0.0);
    for id in ids {
        assert!(approx_eq!(f64, stem_of(&score, id), 10.0 * STEPSIZE, epsilon = TOLERANCE));
    }
}

#[test]
fn test_forced_beam_angle_is_kept() {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let ids = [
        Group::note(1.0, -4).eighth().with_beam(BeamRole::Start).with_beam_angle(10.0),
        Group::note(1.5, -4).eighth().with_beam(BeamRole::Inside),
        Group::note(2.0, -4).eighth().with_beam(BeamRole::End),
    ]
    .map(|g| b.add_group(m, VoiceNo(1), g));
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    let line = beam_of(&score, ids[0]);
    assert!(approx_eq!(f64, line.slope, 10f64.to_radians().tan(), epsilon = TOLERANCE));
    // The rising beam rests on the first stem
    assert!(approx_eq!(f64, stem_of(&score, ids[0]), 7.0 * STEPSIZE, epsilon = TOLERANCE));
    assert!(stem_of(&score, ids[2]) > 7.0 * STEPSIZE);
}

#[test]
fn test_beam_on_center_line_nudged_off_it() {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let head = b.add_group(
        m,
        VoiceNo(1),
        Group::note(1.0, 8).eighth().with_beam(BeamRole::Start).with_stem(StemDir::Down),
    );
    let tail = b.add_group(
        m,
        VoiceNo(1),
        Group::note(1.5, 9).eighth().with_beam(BeamRole::End).with_stem(StemDir::Down),
    );
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    // Both ends clamp to the center line, then the first end drops a step
    let line = beam_of(&score, head);
    let head_x = score.get(head).unwrap().stem_x(STEPSIZE);
    let tail_x = score.get(tail).unwrap().stem_x(STEPSIZE);
    assert!(approx_eq!(f64, line.y_at(head_x), -STEPSIZE, epsilon = TOLERANCE));
    assert!(approx_eq!(f64, line.y_at(tail_x), 0.0, epsilon = TOLERANCE));
}

#[test]
fn test_beam_clears_embedded_grace_stem() {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let start = Group::note(1.0, -4).eighth().with_beam(BeamRole::Start);
    let first = b.add_group(m, VoiceNo(1), start);
    let grace = b.add_group(m, VoiceNo(1), Group::note(1.25, 4).eighth().grace());
    b.add_group(m, VoiceNo(1), Group::note(1.5, -4).eighth().with_beam(BeamRole::End));
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    let grace = score.get(grace).unwrap();
    assert!(grace.stem_len > 0.0);
    let line = beam_of(&score, first);
    assert!(line.y_at(1.25) - STEPSIZE >= grace.north + STDPAD - TOLERANCE);
}

#[test]
fn test_beam_clears_clef_before_last_group() {
    let clef = Extent::new(-0.1, 0.0, 8.0 * STEPSIZE, -8.0 * STEPSIZE);
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let start = Group::note(1.0, -4).eighth().with_beam(BeamRole::Start);
    let first = b.add_group(m, VoiceNo(1), start);
    b.add_group(
        m,
        VoiceNo(1),
        Group::note(1.5, -4).eighth().with_beam(BeamRole::End).with_clef_before(clef),
    );
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    let line = beam_of(&score, first);
    assert!(line.y_at(1.4) - STEPSIZE >= 8.0 * STEPSIZE + STDPAD - TOLERANCE);
}

#[test]
fn test_embedded_rest_moves_with_beam_on_two_step_grid() {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let start = Group::note(1.0, -4).eighth().with_beam(BeamRole::Start);
    let first = b.add_group(m, VoiceNo(1), start);
    let rest = b.add_group(m, VoiceNo(1), Group::rest(1.25).eighth().with_beam(BeamRole::Inside));
    b.add_group(m, VoiceNo(1), Group::note(1.5, -4).eighth().with_beam(BeamRole::End));
    b.add_group(m, VoiceNo(2), Group::note(1.25, 4).with_stem(StemDir::Down));
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    let steps = score.get(rest).unwrap().rest_steps;
    assert!(approx_eq!(f64, steps, 4.0, epsilon = TOLERANCE));
    let line = beam_of(&score, first);
    assert!(approx_eq!(f64, line.y_at(1.25), 7.0 * STEPSIZE, epsilon = TOLERANCE));
}

#[test]
fn test_beam_clears_member_accidental() {
    let sharp = Extent::new(-0.15, -0.05, 12.0 * STEPSIZE, 8.0 * STEPSIZE);
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let start = Group::note(1.0, -4).eighth().with_beam(BeamRole::Start);
    let first = b.add_group(m, VoiceNo(1), start);
    let last = Group::chord(1.5, vec![Note::at(-4).with_accidental(Accidental::Sharp, sharp)])
        .eighth()
        .with_beam(BeamRole::End);
    b.add_group(m, VoiceNo(1), last);
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    // Accidental top sits at -4 + 12 steps
    let line = beam_of(&score, first);
    assert!(line.y_at(1.4) - STEPSIZE >= 8.0 * STEPSIZE + STDPAD - TOLERANCE);
}

#[test]
fn test_forced_ends_with_negative_interior_stem_is_an_error() {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    [
        Group::note(1.0, -4).eighth().with_beam(BeamRole::Start).with_stem_len(1.0),
        Group::note(1.5, 8).eighth().with_beam(BeamRole::Inside),
        Group::note(2.0, -4).eighth().with_beam(BeamRole::End).with_stem_len(1.0),
    ]
    .map(|g| b.add_group(m, VoiceNo(1), g));
    let mut score = b.build();

    let err = solve(&mut score).unwrap_err();
    assert!(matches!(err, LayoutError::NegativeStem { .. }));
    assert!(!err.is_internal());
}

fn low_pair(voice: VoiceNo, cue: bool) -> f64 {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let note = |x: f64, role| {
        let g = Group::note(x, -12).eighth().with_beam(role);
        if cue {
            g.cue()
        } else {
            g
        }
    };
    let first = b.add_group(m, voice, note(1.0, BeamRole::Start));
    b.add_group(m, voice, note(1.5, BeamRole::End));
    let mut score = b.build();
    solve(&mut score).expect("Should solve");
    beam_of(&score, first).y_at(1.0)
}

#[test]
fn test_cue_and_third_voice_beams_may_cross_center() {
    assert!(approx_eq!(f64, low_pair(VoiceNo(1), false), 0.0, epsilon = TOLERANCE));
    assert!(low_pair(VoiceNo(1), true) < 0.0);
    assert!(approx_eq!(f64, low_pair(VoiceNo(3), false), -5.0 * STEPSIZE, epsilon = TOLERANCE));
}

fn forced_down_pair(with_other_voice: bool) -> f64 {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let first = b.add_group(
        m,
        VoiceNo(1),
        Group::note(1.0, 12).eighth().with_beam(BeamRole::Start).with_forced_dir(StemDir::Down),
    );
    b.add_group(
        m,
        VoiceNo(1),
        Group::note(1.5, 12).eighth().with_beam(BeamRole::End).with_forced_dir(StemDir::Down),
    );
    if with_other_voice {
        b.add_group(m, VoiceNo(2), Group::note(3.0, -4).with_stem(StemDir::Down));
    }
    let mut score = b.build();
    solve(&mut score).expect("Should solve");
    beam_of(&score, first).y_at(1.0)
}

#[test]
fn test_forced_direction_against_voice_skips_center_clamp() {
    assert!(approx_eq!(f64, forced_down_pair(true), 5.0 * STEPSIZE, epsilon = TOLERANCE));
    assert!(approx_eq!(f64, forced_down_pair(false), 0.0, epsilon = TOLERANCE));
}

#[test]
fn test_forced_end_with_all_notes_on_other_staff_waits_for_staff_positions() {
    let mut b = ScoreBuilder::new();
    let upper = b.measure(StaffNo(1));
    b.add_group(upper, VoiceNo(1), Group::note(1.0, 0));
    let lower = b.measure(StaffNo(2));
    let above = |x: f64| {
        Group::chord(x, vec![Note::at(-2).on_staff(NoteStaff::Above)])
            .eighth()
            .with_stem(StemDir::Down)
    };
    let first = b.add_group(
        lower,
        VoiceNo(1),
        above(1.0).with_beam(BeamRole::Start).with_stem_len(3.0),
    );
    let last = b.add_group(lower, VoiceNo(1), above(1.5).with_beam(BeamRole::End));
    let mut score = b.build();

    let report = solve(&mut score).expect("Should solve");
    assert!(report.deferred > 0);
    assert!(approx_eq!(f64, stem_of(&score, first), 3.0 * STEPSIZE, epsilon = TOLERANCE));
    assert!(approx_eq!(f64, stem_of(&score, last), 7.0 * STEPSIZE, epsilon = TOLERANCE));
}

#[test]
fn test_mid_line_param_change_applies_to_later_marks() {
    let mut b = ScoreBuilder::new();
    let m1 = b.measure(StaffNo(1));
    b.add_stuff(m1, Stuff::text(MarkType::Text, Place::Above, 1.0, "dolce"));
    b.bar();
    b.params(ParamDelta::staff(StaffNo(1)).set(ParamName::Dist, 6.0));
    let m2 = b.measure(StaffNo(1));
    b.add_stuff(m2, Stuff::text(MarkType::Text, Place::Above, 3.0, "dolce"));
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    let south = |m: MeasureId| {
        score.measure(m).unwrap().stuff[0]
            .placement
            .expect("placed")
            .south
    };
    assert!(approx_eq!(f64, south(m1), 6.0 * STEPSIZE, epsilon = TOLERANCE));
    assert!(approx_eq!(f64, south(m2), 10.0 * STEPSIZE, epsilon = TOLERANCE));
}

#[test]
fn test_forced_tuplet_angle_kept_at_min_dist() {
    let mut b = ScoreBuilder::new();
    let m = b.measure(StaffNo(1));
    let tuplet = |role| TupletMark::new(role, Place::Above, "3").with_angle(10.0);
    let roles = [TupletRole::Start, TupletRole::Inside, TupletRole::End];
    let ids: Vec<GroupId> = roles
        .into_iter()
        .enumerate()
        .map(|(i, role)| {
            let group = Group::note(1.0 + i as f64, -8).with_tuplet(tuplet(role));
            b.add_group(m, VoiceNo(1), group)
        })
        .collect();
    let mut score = b.build();
    solve(&mut score).expect("Should solve");

    let geometry = score.get(ids[0]).unwrap().tuplet_geometry.expect("bracket");
    assert!(approx_eq!(f64, geometry.line.slope, 10f64.to_radians().tan(), epsilon = TOLERANCE));
    let low_end = geometry.line.y_at(geometry.west);
    assert!(approx_eq!(f64, low_end, 6.0 * STEPSIZE, epsilon = TOLERANCE));
    for id in ids {
        let group = score.get(id).unwrap();
        assert!(geometry.line.y_at(group.x) >= group.north + STDPAD - TOLERANCE);
    }
}
