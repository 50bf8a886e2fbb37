//! Beam line solver
//!
//! Fits one line to the stem tips of a beamed run and then adjusts it by a
//! fixed sequence of heuristics: pattern-based flattening, attenuation,
//! center-line clamping, single-end forcing, nudging, near-flat snapping and
//! collision shifts. The final line sets every member's stem length.

use std::collections::BTreeSet;

use log::{debug, trace};

use crate::context::SolveContext;
use crate::error::LayoutError;
use crate::geometry::{attenuate_slope, least_squares, Line, FUDGE, STDPAD};
use crate::model::{Group, GroupContent, GroupId, Score, StemDir, VoiceNo};
use crate::params::ParamName;

use super::length::{required_protrusion, solving_span};

/// Thickness of one beam in steps
pub const BEAM_THICKNESS_STEPS: f64 = 1.0;
/// Distance between adjacent beams in steps
pub const BEAM_SPACING_STEPS: f64 = 1.5;

/// Runs shorter than this many steps get the wider flattening cutoff
const SHORT_RUN_STEPS: f64 = 12.0;

/// One note-bearing member of a run
#[derive(Debug, Clone, Copy)]
struct Member {
    id: GroupId,
    /// Stem X
    x: f64,
    /// Outer note Y
    outer: f64,
    /// Desired stem tip Y
    tip: f64,
    /// Outer note position in whole steps
    position: i64,
}

/// Which steps the user forced
#[derive(Debug, Clone, Copy, Default)]
struct Forcing {
    first: Option<f64>,
    last: Option<f64>,
    slope: Option<f64>,
}

impl Forcing {
    fn any(&self) -> bool {
        self.first.is_some() || self.last.is_some() || self.slope.is_some()
    }
}

/// Solve one beamed run, setting stem lengths, bounds and the shared beam line
///
/// Returns the beam line, or `None` when the run prints no beam.
pub fn solve_beam(
    score: &mut Score,
    ctx: &SolveContext<'_>,
    run: &[GroupId],
) -> Result<Option<Line>, LayoutError> {
    let (Some(&first_id), Some(&last_id)) = (run.first(), run.last()) else {
        return Ok(None);
    };
    let dir = score.get(first_id)?.stem_dir;
    for &id in run {
        score.get_mut(id)?.stem_dir = dir;
    }
    let sign = dir.sign();
    let step = ctx.step();

    let members = collect_members(score, ctx, run)?;
    let (Some(head), Some(tail)) = (members.first().copied(), members.last().copied()) else {
        clear_stems(score, ctx, run)?;
        return Ok(None);
    };

    let first = score.get(first_id)?;
    let forcing = Forcing {
        first: first.forced_stem.filter(|_| head.id == first_id),
        last: score.get(last_id)?.forced_stem.filter(|_| tail.id == last_id),
        slope: first.forced_beam_angle.map(|deg| deg.to_radians().tan()),
    };
    let voice = Some(first.voice);
    let forced_tip = |m: &Member, steps: f64| m.outer + sign * steps * step;

    // Both ends forced: the line goes through the two forced tips
    if let (Some(f1), Some(f2)) = (forcing.first, forcing.last) {
        if f1 <= 0.0 && f2 <= 0.0 {
            debug!("beam at x={:.3}: both ends forced to zero, no beam", head.x);
            clear_stems(score, ctx, run)?;
            return Ok(None);
        }
        let line = if head.id == tail.id {
            Line::horizontal(forced_tip(&head, f1.max(f2)))
        } else {
            Line::through(head.x, forced_tip(&head, f1), tail.x, forced_tip(&tail, f2))
        };
        assign_stems(score, ctx, run, line, true)?;
        return Ok(Some(line));
    }

    let points: Vec<(f64, f64)> = members.iter().map(|m| (m.x, m.tip)).collect();
    let fitted = least_squares(&points).unwrap_or_else(|| Line::horizontal(head.tip));

    let positions: Vec<i64> = members.iter().map(|m| m.position).collect();
    let shaped_slope = if has_flat_shape(&positions, dir) {
        0.0
    } else {
        fitted.slope
    };
    let slope = match forcing.slope {
        Some(forced) => forced,
        None => attenuate_slope(
            shaped_slope,
            ctx.number(voice, ParamName::BeamSlopeFactor),
            ctx.number(voice, ParamName::BeamSlopeMaxAngle),
        ),
    };
    debug!(
        "beam at x={:.3}..{:.3}: fitted slope {:.4}, using {:.4}",
        head.x, tail.x, fitted.slope, slope
    );

    let mut line = fit_intercept(slope, &members, sign);
    if !is_clamp_exempt(score, run, dir)? {
        line = clamp_to_center(line, head.x, tail.x, sign);
    }

    // Exactly one end forced
    match (forcing.first, forcing.last) {
        (Some(f), None) => {
            let tip = forced_tip(&head, f);
            line = if forcing.slope.is_some() || head.id == tail.id {
                line.shifted(tip - line.y_at(head.x))
            } else {
                Line::through(head.x, tip, tail.x, line.y_at(tail.x))
            };
        }
        (None, Some(f)) => {
            let tip = forced_tip(&tail, f);
            line = if forcing.slope.is_some() || head.id == tail.id {
                line.shifted(tip - line.y_at(tail.x))
            } else {
                Line::through(head.x, line.y_at(head.x), tail.x, tip)
            };
        }
        _ => {}
    }

    if forcing.slope.is_none() && head.id != tail.id {
        line = nudge_off_center(line, &head, &tail, shaped_slope, dir, step, &forcing);
        if forcing.first.is_none() && forcing.last.is_none() {
            line = snap_near_flat(line, &head, &tail, members.len(), sign, step);
        }
    }

    line = clear_obstacles(score, ctx, run, line, dir)?;
    assign_stems(score, ctx, run, line, forcing.any())?;
    Ok(Some(line))
}

fn collect_members(
    score: &Score,
    ctx: &SolveContext<'_>,
    run: &[GroupId],
) -> Result<Vec<Member>, LayoutError> {
    let step = ctx.step();
    let mut members = Vec::with_capacity(run.len());
    for &id in run {
        let group = score.get(id)?;
        if !group.is_notes() {
            continue;
        }
        let Some((_, outer)) = solving_span(group, &ctx.frame) else {
            continue;
        };
        members.push(Member {
            id,
            x: group.stem_x(step),
            outer,
            tip: outer + group.stem_dir.sign() * required_protrusion(ctx, group),
            position: (outer / step).round() as i64,
        });
    }
    Ok(members)
}

/// Patterns that print best with a horizontal beam
///
/// Equal outer notes, a pitch sequence that repeats over whole periods, or a
/// notch: equal interior notes with an end pulled back from the stem side.
fn has_flat_shape(positions: &[i64], dir: StemDir) -> bool {
    let n = positions.len();
    if n < 2 || positions[0] == positions[n - 1] {
        return true;
    }
    let repeats = (1..=n / 2)
        .any(|k| n % k == 0 && (k..n).all(|i| positions[i] == positions[i % k]));
    if repeats {
        return true;
    }
    if n < 3 {
        return false;
    }
    let interior = &positions[1..n - 1];
    let level = interior[0];
    if interior.iter().any(|&p| p != level) {
        return false;
    }
    let toward_tip = |p: i64| match dir {
        StemDir::Up => p - level,
        StemDir::Down => level - p,
    };
    let (a, b) = (toward_tip(positions[0]), toward_tip(positions[n - 1]));
    a <= 0 && b <= 0 && (a < 0 || b < 0)
}

/// Intercept at which no member's stem falls short of its requirement
fn fit_intercept(slope: f64, members: &[Member], sign: f64) -> Line {
    let intercepts = members.iter().map(|m| m.tip - slope * m.x);
    let intercept = if sign > 0.0 {
        intercepts.fold(f64::NEG_INFINITY, f64::max)
    } else {
        intercepts.fold(f64::INFINITY, f64::min)
    };
    Line::new(slope, intercept)
}

/// Keep each end of the beam from crossing the center line
fn clamp_to_center(line: Line, x1: f64, x2: f64, sign: f64) -> Line {
    let clamp = |y: f64| if sign * y < 0.0 { 0.0 } else { y };
    let (y1, y2) = (clamp(line.y_at(x1)), clamp(line.y_at(x2)));
    if (x2 - x1).abs() < FUDGE {
        let y = if sign > 0.0 { y1.max(y2) } else { y1.min(y2) };
        return Line::horizontal(y);
    }
    Line::through(x1, y1, x2, y2)
}

/// Voices and stem choices where the center-line rule does not apply
fn is_clamp_exempt(score: &Score, run: &[GroupId], dir: StemDir) -> Result<bool, LayoutError> {
    let mut all_elsewhere = true;
    for &id in run {
        let group = score.get(id)?;
        if group.small {
            return Ok(true);
        }
        if group.is_notes() && !group.all_notes_elsewhere() {
            all_elsewhere = false;
        }
    }
    if all_elsewhere {
        return Ok(true);
    }
    let Some(&first_id) = run.first() else {
        return Ok(true);
    };
    let first = score.get(first_id)?;
    if first.voice == VoiceNo(3) {
        return Ok(true);
    }
    let against_voice = matches!(
        (first.voice, dir),
        (VoiceNo(1), StemDir::Down) | (VoiceNo(2), StemDir::Up)
    );
    Ok(first.stem_dir_forced && against_voice && !other_voice_groups(score, run, false)?.is_empty())
}

/// Give a beam lying on the center line back some slope
fn nudge_off_center(
    line: Line,
    head: &Member,
    tail: &Member,
    slope: f64,
    dir: StemDir,
    step: f64,
    forcing: &Forcing,
) -> Line {
    let (mut y1, mut y2) = (line.y_at(head.x), line.y_at(tail.x));
    if slope.abs() < f64::EPSILON || y1.abs() >= FUDGE || y2.abs() >= FUDGE {
        return line;
    }
    let move_last = (slope > 0.0) == (dir == StemDir::Up);
    if move_last && forcing.last.is_none() {
        y2 += dir.sign() * step;
    } else if !move_last && forcing.first.is_none() {
        y1 += dir.sign() * step;
    } else {
        return line;
    }
    trace!("beam at x={:.3}: nudged off the center line", head.x);
    Line::through(head.x, y1, tail.x, y2)
}

/// Endpoint difference below which a beam prints as horizontal
fn flatten_cutoff(count: usize, length: f64, step: f64) -> f64 {
    if count <= 2 {
        step * 0.25
    } else if length < SHORT_RUN_STEPS * step {
        step * 0.5
    } else {
        step * 0.25
    }
}

fn snap_near_flat(
    line: Line,
    head: &Member,
    tail: &Member,
    count: usize,
    sign: f64,
    step: f64,
) -> Line {
    let (y1, y2) = (line.y_at(head.x), line.y_at(tail.x));
    let diff = (y2 - y1).abs();
    if diff > 0.0 && diff < flatten_cutoff(count, tail.x - head.x, step) {
        let y = if sign > 0.0 { y1.max(y2) } else { y1.min(y2) };
        return Line::horizontal(y);
    }
    line
}

/// Depth of the beam stack inward from the line
fn beam_depth(score: &Score, run: &[GroupId], step: f64) -> Result<f64, LayoutError> {
    let mut beams = 1u8;
    let mut factor: f64 = 1.0;
    for &id in run {
        let group = score.get(id)?;
        beams = beams.max(group.flags());
        factor = factor.min(group.size_factor());
    }
    Ok((BEAM_THICKNESS_STEPS + f64::from(beams - 1) * BEAM_SPACING_STEPS) * step * factor)
}

/// Horizontal span and stem-side edge of an obstacle
#[derive(Debug, Clone, Copy)]
struct Obstacle {
    west: f64,
    east: f64,
    edge: f64,
}

impl Obstacle {
    fn of(group: &Group, sign: f64) -> Self {
        Self {
            west: group.x + group.west.min(0.0),
            east: group.x + group.east.max(0.0),
            edge: if sign > 0.0 { group.north } else { group.south },
        }
    }

    /// Outward shift the line needs to clear this obstacle
    fn shift_needed(&self, line: &Line, depth: f64, sign: f64) -> f64 {
        [self.west, self.east]
            .iter()
            .map(|&x| STDPAD - sign * (line.y_at(x) - sign * depth - self.edge))
            .fold(0.0, f64::max)
    }
}

fn worst_shift(obstacles: &[Obstacle], line: &Line, depth: f64, sign: f64) -> f64 {
    obstacles
        .iter()
        .map(|o| o.shift_needed(line, depth, sign))
        .fold(0.0, f64::max)
}

/// Groups of the other voice sitting under the run
fn other_voice_groups(
    score: &Score,
    run: &[GroupId],
    in_range_only: bool,
) -> Result<Vec<GroupId>, LayoutError> {
    let (Some(&first_id), Some(&last_id)) = (run.first(), run.last()) else {
        return Ok(Vec::new());
    };
    let first = score.get(first_id)?;
    let other = match first.voice {
        VoiceNo(1) => VoiceNo(2),
        VoiceNo(2) => VoiceNo(1),
        _ => return Ok(Vec::new()),
    };
    let (lo, hi) = (first.x, score.get(last_id)?.x);
    let measures: BTreeSet<_> = run.iter().filter_map(|&id| score.measure_of(id)).collect();

    let mut found = Vec::new();
    for measure in measures {
        for &id in score.measure(measure)?.voice(other) {
            let group = score.get(id)?;
            if !(group.is_notes() || group.content == GroupContent::Rest) {
                continue;
            }
            if !in_range_only || (group.x >= lo - FUDGE && group.x <= hi + FUDGE) {
                found.push(id);
            }
        }
    }
    Ok(found)
}

/// Shift the line outward past embedded graces, clefs, the other voice and accidentals
fn clear_obstacles(
    score: &mut Score,
    ctx: &SolveContext<'_>,
    run: &[GroupId],
    mut line: Line,
    dir: StemDir,
) -> Result<Line, LayoutError> {
    let (Some(&first_id), Some(&last_id)) = (run.first(), run.last()) else {
        return Ok(line);
    };
    let sign = dir.sign();
    let step = ctx.step();
    let depth = beam_depth(score, run, step)?;
    let embedded = score.between(first_id, last_id);

    let mut graces = Vec::new();
    let mut rests = Vec::new();
    for &id in &embedded {
        let group = score.get(id)?;
        if group.is_grace() && group.is_notes() {
            graces.push(Obstacle::of(group, sign));
        } else if group.content == GroupContent::Rest {
            rests.push(id);
        }
    }
    line = line.shifted(sign * worst_shift(&graces, &line, depth, sign));

    let mut clefs = Vec::new();
    for &id in embedded.iter().chain(std::iter::once(&last_id)) {
        let group = score.get(id)?;
        if let Some(clef) = group.clef_before {
            clefs.push(Obstacle {
                west: group.x + clef.west,
                east: group.x + clef.east,
                edge: if sign > 0.0 { clef.north } else { clef.south },
            });
        }
    }
    line = line.shifted(sign * worst_shift(&clefs, &line, depth, sign));

    let mut others = Vec::new();
    for id in other_voice_groups(score, run, true)? {
        others.push(Obstacle::of(score.get(id)?, sign));
    }
    let mut shift = worst_shift(&others, &line, depth, sign);
    if shift > 0.0 && !rests.is_empty() {
        let grid = 2.0 * step;
        shift = (shift / grid).ceil() * grid;
        for &id in &rests {
            let rest = score.get_mut(id)?;
            rest.rest_steps += sign * shift / step;
            rest.set_vertical_bounds(&ctx.frame);
        }
    }
    if shift > 0.0 {
        trace!("beam: shifted {:.3} to clear the other voice", shift);
    }
    line = line.shifted(sign * shift);

    for &id in run.iter().skip(1) {
        let group = score.get(id)?;
        let mut accidentals = Vec::new();
        for note in &group.notes {
            let (Some(acc), Some(y)) = (note.accidental_box, group.note_y(note, &ctx.frame)) else {
                continue;
            };
            accidentals.push(Obstacle {
                west: group.x + acc.west,
                east: group.x + acc.east,
                edge: y + if sign > 0.0 { acc.north } else { acc.south },
            });
        }
        line = line.shifted(sign * worst_shift(&accidentals, &line, depth, sign));
    }
    Ok(line)
}

/// Set every member's stem from the final line
fn assign_stems(
    score: &mut Score,
    ctx: &SolveContext<'_>,
    run: &[GroupId],
    line: Line,
    forced: bool,
) -> Result<(), LayoutError> {
    let step = ctx.step();
    for &id in run {
        let group = score.get_mut(id)?;
        group.beam_line = Some(line);
        group.stem_len = 0.0;
        if group.is_notes() {
            if let Some((base, _)) = solving_span(group, &ctx.frame) {
                let raw = group.stem_dir.sign() * (line.y_at(group.stem_x(step)) - base);
                if raw < -FUDGE && forced {
                    return Err(LayoutError::negative_stem(&group.location, raw));
                }
                group.stem_len = raw.max(0.0);
            }
        }
        group.set_vertical_bounds(&ctx.frame);
    }
    Ok(())
}

fn clear_stems(score: &mut Score, ctx: &SolveContext<'_>, run: &[GroupId]) -> Result<(), LayoutError> {
    for &id in run {
        let group = score.get_mut(id)?;
        group.stem_len = 0.0;
        group.beam_line = None;
        group.set_vertical_bounds(&ctx.frame);
    }
    Ok(())
}
