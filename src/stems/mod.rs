//! Stem and beam solving for one staff measure
//!
//! Grace groups are solved before normal groups so beams can clear
//! embedded grace stems. In the first pass, runs and groups whose stems
//! depend on another staff's position are handed to the [`Schedule`].

mod beam;
mod length;

pub use beam::{solve_beam, BEAM_SPACING_STEPS, BEAM_THICKNESS_STEPS};
pub use length::{enlarged_for_marks, group_stem_length, required_protrusion, StemParams};

use crate::context::{Pass, SolveContext, StaffFrame};
use crate::driver::{Schedule, Work};
use crate::error::LayoutError;
use crate::model::{BeamRole, GroupId, GroupValue, MeasureId, Score};

use length::solving_span;

/// Solve every stem and beam starting in one measure
pub fn solve_measure(
    score: &mut Score,
    ctx: &SolveContext<'_>,
    measure: MeasureId,
    schedule: &mut Schedule,
) -> Result<(), LayoutError> {
    let groups: Vec<GroupId> = score.measure(measure)?.all_groups().collect();
    // Beams clear the other voice, which may not be solved yet
    for &id in &groups {
        score.get_mut(id)?.set_vertical_bounds(&ctx.frame);
    }
    for value in [GroupValue::Grace, GroupValue::Normal] {
        for &id in &groups {
            let group = score.get(id)?;
            if group.value != value {
                continue;
            }
            match group.beam {
                BeamRole::Start | BeamRole::Lone => {
                    let run = score.beam_run(id)?;
                    if ctx.pass == Pass::First && run_needs_second_pass(score, &run, &ctx.frame)? {
                        schedule.defer(Work::Beam(id), &run);
                        set_own_bounds(score, ctx, &run)?;
                        continue;
                    }
                    solve_beam(score, ctx, &run)?;
                }
                BeamRole::Inside | BeamRole::End => {}
                BeamRole::None => {
                    if ctx.pass == Pass::First
                        && (group.stem_toward_other_staff() || group.all_notes_elsewhere())
                    {
                        schedule.defer(Work::Group(id), &[id]);
                        set_own_bounds(score, ctx, &[id])?;
                        continue;
                    }
                    solve_group(score, ctx, id)?;
                }
            }
        }
    }
    Ok(())
}

/// Stem length and bounds of a group outside any beamed run
pub fn solve_group(score: &mut Score, ctx: &SolveContext<'_>, id: GroupId) -> Result<(), LayoutError> {
    let length = group_stem_length(ctx, score.get(id)?);
    let group = score.get_mut(id)?;
    group.stem_len = length;
    group.beam_line = None;
    group.set_vertical_bounds(&ctx.frame);
    Ok(())
}

/// A run needs absolute staff positions before it can be solved
pub fn run_needs_second_pass(
    score: &Score,
    run: &[GroupId],
    frame: &StaffFrame,
) -> Result<bool, LayoutError> {
    let mut all_elsewhere = true;
    for &id in run {
        let group = score.get(id)?;
        if !group.is_notes() {
            continue;
        }
        if group.stem_toward_other_staff() {
            return Ok(true);
        }
        if !group.own_note_ys(frame).is_empty() {
            all_elsewhere = false;
        }
        if solving_span(group, frame).is_none() {
            return Ok(true);
        }
    }
    let (Some(&first), Some(&last)) = (run.first(), run.last()) else {
        return Ok(false);
    };
    let end_forced = score.get(first)?.forced_stem.is_some() || score.get(last)?.forced_stem.is_some();
    Ok(all_elsewhere && end_forced)
}

/// Provisional bounds from own-staff notes for deferred groups
fn set_own_bounds(score: &mut Score, ctx: &SolveContext<'_>, ids: &[GroupId]) -> Result<(), LayoutError> {
    for &id in ids {
        let group = score.get_mut(id)?;
        group.stem_len = 0.0;
        group.set_vertical_bounds(&ctx.frame);
    }
    Ok(())
}
