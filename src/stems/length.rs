//! Stem protrusion and per-group stem length

use log::trace;

use crate::context::{SolveContext, StaffFrame};
use crate::model::{Group, StemDir};
use crate::params::ParamName;

/// Protrusion needed by a flagged stem: base plus one step per flag
const FLAG_BASE_STEPS: f64 = 5.0;
const FLAG_SPACING_STEPS: f64 = 1.0;

/// Space taken by each tremolo slash along the stem
const SLASH_SPACING_STEPS: f64 = 1.5;
/// Protrusion below which slashes would touch the notehead
const SLASH_BASE_STEPS: f64 = 3.0;

/// Extra room for dots next to a down-stem flag
const DOT_CLEARANCE_STEPS: f64 = 1.0;

/// Stem-length parameters for one voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StemParams {
    /// Default protrusion in steps
    pub stemlen: f64,
    pub shorten_max: f64,
    pub shorten_begin: f64,
    pub shorten_end: f64,
    pub min_fraction: f64,
}

impl StemParams {
    pub fn resolve(ctx: &SolveContext<'_>, group: &Group) -> Self {
        let voice = Some(group.voice);
        let shorten = if group.is_beamed() {
            ParamName::StemShortenBeamed
        } else {
            ParamName::StemShortenUnbeamed
        };
        Self {
            stemlen: ctx.number(voice, ParamName::StemLen),
            shorten_max: ctx.number(voice, shorten),
            shorten_begin: ctx.number(voice, ParamName::StemShortenBegin),
            shorten_end: ctx.number(voice, ParamName::StemShortenEnd),
            min_fraction: ctx.number(voice, ParamName::StemMinFraction),
        }
    }

    /// Protrusion in steps for an outer note at `outer_steps` beyond the center line
    ///
    /// Unchanged up to `shorten_begin`, reduced by the full maximum from
    /// `shorten_end` on and interpolated in between. Never below the
    /// minimum fraction of the default.
    pub fn shortened(&self, outer_steps: f64) -> f64 {
        let shorten = if outer_steps <= self.shorten_begin {
            0.0
        } else if outer_steps >= self.shorten_end || self.shorten_end <= self.shorten_begin {
            self.shorten_max
        } else {
            self.shorten_max * (outer_steps - self.shorten_begin)
                / (self.shorten_end - self.shorten_begin)
        };
        (self.stemlen - shorten).max(self.stemlen * self.min_fraction)
    }
}

/// Enlarge a protrusion so flags, slashes and dots have room
pub fn enlarged_for_marks(group: &Group, protrusion: f64, outer_on_line: bool) -> f64 {
    let mut needed = protrusion;
    let flags = f64::from(group.flags());
    if !group.is_beamed() && flags > 0.0 {
        needed = needed.max(FLAG_BASE_STEPS + flags * FLAG_SPACING_STEPS);
    }
    if group.slashes > 0 {
        let base = if flags > 0.0 {
            FLAG_BASE_STEPS + flags * FLAG_SPACING_STEPS
        } else {
            SLASH_BASE_STEPS
        };
        needed = needed.max(base + f64::from(group.slashes) * SLASH_SPACING_STEPS);
    }
    if group.dots > 0
        && group.stem_dir == StemDir::Down
        && flags > 0.0
        && !group.is_beamed()
        && outer_on_line
    {
        needed += DOT_CLEARANCE_STEPS;
    }
    needed
}

/// Note span used for stem computations, falling back to own-staff notes
pub fn solving_span(group: &Group, frame: &StaffFrame) -> Option<(f64, f64)> {
    if let Some(span) = group.stem_span(frame) {
        return Some(span);
    }
    let ys = group.own_note_ys(frame);
    let (low, high) = (*ys.first()?, *ys.last()?);
    Some(match group.stem_dir {
        StemDir::Up => (low, high),
        StemDir::Down => (high, low),
    })
}

/// Protrusion in inches a group needs beyond its outer note
pub fn required_protrusion(ctx: &SolveContext<'_>, group: &Group) -> f64 {
    let step = ctx.step();
    let Some((_, outer)) = solving_span(group, &ctx.frame) else {
        return 0.0;
    };
    let outer_steps = outer / step * group.stem_dir.sign();
    let params = StemParams::resolve(ctx, group);
    let on_line = (outer / step).round() as i64 % 2 == 0;
    let steps = enlarged_for_marks(group, params.shortened(outer_steps), on_line);
    steps * step * group.size_factor()
}

/// Stem length in inches for a group that is not part of a beamed run
pub fn group_stem_length(ctx: &SolveContext<'_>, group: &Group) -> f64 {
    if !group.has_stem() {
        return 0.0;
    }
    let Some((base, outer)) = solving_span(group, &ctx.frame) else {
        return 0.0;
    };
    let span = (outer - base).abs();
    let length = match group.forced_stem {
        Some(forced) if forced <= 0.0 => 0.0,
        Some(forced) => forced * ctx.step() + span,
        None => required_protrusion(ctx, group) + span,
    };
    trace!(
        "stem at x={:.3}: span {:.3}, length {:.3}",
        group.x,
        span,
        length
    );
    length
}
