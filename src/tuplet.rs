//! Tuplet bracket solver
//!
//! The bracket slope is chosen from two candidate regressions: one over
//! every member and one over note members only. Disagreeing or degenerate
//! candidates give a horizontal bracket. A user angle replaces both
//! candidates and is never flattened. The line is then placed clear of
//! the members, kept a minimum distance from the center line, and pushed
//! out past accidentals and the number box.

use log::debug;

use crate::context::SolveContext;
use crate::error::LayoutError;
use crate::fonts::Font;
use crate::geometry::{attenuate_slope, least_squares, spans_overlap, Line, FUDGE, POINT, STDPAD};
use crate::model::{GroupId, Place, Score, Traversal, TupletGeometry, TupletRole};
use crate::params::ParamName;

/// Point size of tuplet numbers
pub const TUPLET_NUMBER_SIZE: f64 = 11.0;

/// Ends closer than this in height are made level
const FLATTEN_DIFF: f64 = 2.0 * POINT;

/// Members of the tuplet starting at `first`, skipping spaces and grace notes
pub fn tuplet_members(score: &Score, first: GroupId) -> Result<Vec<GroupId>, LayoutError> {
    let head = score.get(first)?;
    let role = head.tuplet.as_ref().map(|t| t.role);
    if role == Some(TupletRole::Lone) {
        return Ok(vec![first]);
    }
    let mut members = vec![first];
    let mut cursor = first;
    loop {
        let Some(next) = score.next(cursor, Traversal::NextNonSpace) else {
            return Err(LayoutError::unterminated_tuplet(&head.location));
        };
        cursor = next;
        let group = score.get(next)?;
        if group.is_grace() {
            continue;
        }
        match group.tuplet.as_ref().map(|t| t.role) {
            Some(TupletRole::Inside) => members.push(next),
            Some(TupletRole::End) => {
                members.push(next);
                return Ok(members);
            }
            _ => return Err(LayoutError::unterminated_tuplet(&head.location)),
        }
    }
}

/// Sample point of a member: X and its edge on the bracket side
type Sample = (f64, f64);

/// Candidate slope from one set of samples; `None` when degenerate
fn candidate_slope(samples: &[Sample], sign: f64) -> Option<f64> {
    if samples.len() < 2 || is_concave(samples, sign) {
        return None;
    }
    least_squares(samples).map(|line| line.slope)
}

/// Every interior sample lies staff-ward of the chord through the ends
fn is_concave(samples: &[Sample], sign: f64) -> bool {
    let (Some(&(x1, y1)), Some(&(x2, y2))) = (samples.first(), samples.last()) else {
        return false;
    };
    if samples.len() < 3 {
        return false;
    }
    let chord = Line::through(x1, y1, x2, y2);
    samples[1..samples.len() - 1]
        .iter()
        .all(|&(x, y)| sign * (y - chord.y_at(x)) < -FUDGE)
}

/// Pick between the all-member and notes-only candidates
fn choose_slope(all: Option<f64>, notes: Option<f64>) -> f64 {
    match (all, notes) {
        (Some(a), Some(b)) if a * b > 0.0 => {
            if a.abs() <= b.abs() {
                a
            } else {
                b
            }
        }
        _ => 0.0,
    }
}

/// Solve the bracket of the tuplet made of `members`
pub fn solve_tuplet(
    score: &mut Score,
    ctx: &SolveContext<'_>,
    members: &[GroupId],
) -> Result<Option<TupletGeometry>, LayoutError> {
    let (Some(&first_id), Some(&last_id)) = (members.first(), members.last()) else {
        return Ok(None);
    };
    let first = score.get(first_id)?;
    let Some(mark) = first.tuplet.clone() else {
        return Ok(None);
    };
    let sign = match mark.side {
        Place::Above | Place::Between => 1.0,
        Place::Below => -1.0,
    };
    let voice = Some(first.voice);
    let step = ctx.step();
    let west = first.x + first.west;
    let last = score.get(last_id)?;
    let east = last.x + last.east;

    let mut all = Vec::with_capacity(members.len());
    let mut notes = Vec::with_capacity(members.len());
    for &id in members {
        let group = score.get(id)?;
        let sample = (group.x, if sign > 0.0 { group.north } else { group.south });
        all.push(sample);
        if group.is_notes() {
            notes.push(sample);
        }
    }

    let slope = match mark.forced_angle {
        Some(degrees) => degrees.to_radians().tan(),
        None => {
            let all_slope = candidate_slope(&all, sign);
            let note_slope = if notes.is_empty() {
                all_slope
            } else {
                candidate_slope(&notes, sign)
            };
            let chosen = choose_slope(all_slope, note_slope);
            debug!(
                "tuplet at x={:.3}: candidates {:?} / {:?}, chose {:.4}",
                west, all_slope, note_slope, chosen
            );
            attenuate_slope(
                chosen,
                ctx.number(voice, ParamName::TupletSlopeFactor),
                ctx.number(voice, ParamName::TupletSlopeMaxAngle),
            )
        }
    };

    // Clear every member's box edges
    let mut intercept = if sign > 0.0 { f64::NEG_INFINITY } else { f64::INFINITY };
    for &id in members {
        let group = score.get(id)?;
        let edge = if sign > 0.0 { group.north } else { group.south };
        for x in [group.x + group.west, group.x + group.east] {
            let b = edge + sign * STDPAD - slope * x;
            intercept = if sign > 0.0 { intercept.max(b) } else { intercept.min(b) };
        }
    }
    let mut line = Line::new(slope, intercept);

    let min_dist = ctx.number(voice, ParamName::TupletMinDist) * step;
    let (mut y1, mut y2) = (line.y_at(west), line.y_at(east));
    if sign * y1 < min_dist {
        y1 = sign * min_dist;
    }
    if sign * y2 < min_dist {
        y2 = sign * min_dist;
    }
    if mark.forced_angle.is_none() && (y2 - y1).abs() < FLATTEN_DIFF {
        let y = if sign > 0.0 { y1.max(y2) } else { y1.min(y2) };
        y1 = y;
        y2 = y;
    }
    line = if mark.forced_angle.is_some() {
        // keep the user's angle, lifting the whole bracket
        let lift = [(west, y1), (east, y2)]
            .iter()
            .map(|&(x, y)| sign * (y - line.y_at(x)))
            .fold(0.0, f64::max);
        line.shifted(sign * lift)
    } else {
        Line::through(west, y1, east, y2)
    };

    // Accidental boxes of every member
    let mut accidentals = Vec::new();
    for &id in members {
        let group = score.get(id)?;
        for note in &group.notes {
            let (Some(acc), Some(y)) = (note.accidental_box, group.note_y(note, &ctx.frame)) else {
                continue;
            };
            let edge = y + if sign > 0.0 { acc.north } else { acc.south };
            accidentals.push((group.x + acc.west, group.x + acc.east, edge));
        }
    }
    let shift = accidentals
        .iter()
        .flat_map(|&(w, e, edge)| [w, e].map(|x| STDPAD - sign * (line.y_at(x) - edge)))
        .fold(0.0, f64::max);
    line = line.shifted(sign * shift);

    // Number box against accidental overlap
    let size = TUPLET_NUMBER_SIZE;
    let width = ctx.fonts.width(Font::BoldItalic, size, &mark.number);
    let height = ctx.fonts.height(Font::BoldItalic, size, &mark.number);
    let mid = (west + east) / 2.0;
    let mut number_y = line.y_at(mid);
    let number_shift = accidentals
        .iter()
        .filter(|&&(w, e, _)| spans_overlap(mid - width / 2.0, mid + width / 2.0, w, e))
        .map(|&(_, _, edge)| STDPAD - sign * (number_y - sign * height / 2.0 - edge))
        .fold(0.0, f64::max);
    if number_shift > 0.0 {
        line = line.shifted(sign * number_shift);
        number_y = line.y_at(mid);
    }

    let geometry = TupletGeometry {
        line,
        west,
        east,
        number_y,
        number_height: height,
        sign,
    };
    for &id in members {
        score.get_mut(id)?.tuplet_geometry = Some(geometry);
    }
    Ok(Some(geometry))
}
