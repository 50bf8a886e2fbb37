//! Two-pass driver
//!
//! Pass 1 replays configuration records in document order and solves every
//! stem, beam and tuplet that depends only on its own staff, then places
//! annotations and stacks the staffs of each score line. Work that needs
//! another staff's position is collected on a [`Schedule`] and drained in
//! pass 2, once absolute staff positions are known.

use std::collections::{HashMap, HashSet};

use log::{debug, info};

use crate::context::{Pass, SolveContext, StaffFrame};
use crate::diagnostics::{self, LayoutWarning, WarningCategory};
use crate::error::LayoutError;
use crate::fonts::FontMetrics;
use crate::geometry::{HALF_STAFF_STEPS, STEPSIZE};
use crate::layout::{place_staff, StaffExtents};
use crate::model::{Element, GroupId, MeasureId, NoteStaff, Score, StaffNo, TupletRole};
use crate::params::{MeasureParams, ParamName, ParamResolver, ParamState};
use crate::stems;
use crate::tuplet::{solve_tuplet, tuplet_members};

/// One unit of deferred work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Work {
    /// An unbeamed group with a cross-staff stem
    Group(GroupId),
    /// A beamed run, by its first group
    Beam(GroupId),
    /// A tuplet, by its first group
    Tuplet(GroupId),
    /// Annotation placement of one staff on one score line
    Annotations(usize, StaffNo),
}

/// Worklist of items deferred to the second pass
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    work: Vec<Work>,
    deferred: HashSet<GroupId>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer a unit of work covering some groups
    pub fn defer(&mut self, work: Work, groups: &[GroupId]) {
        if !self.work.contains(&work) {
            debug!("deferring {:?} to the second pass", work);
            self.work.push(work);
        }
        self.deferred.extend(groups.iter().copied());
    }

    pub fn is_deferred(&self, id: GroupId) -> bool {
        self.deferred.contains(&id)
    }

    pub fn work(&self) -> &[Work] {
        &self.work
    }

    pub fn len(&self) -> usize {
        self.work.len()
    }

    pub fn is_empty(&self) -> bool {
        self.work.is_empty()
    }
}

/// Final vertical position of one staff on one score line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaffPosition {
    pub line: usize,
    pub staff: StaffNo,
    /// Absolute Y of the center line; staff 1 of each line is at 0
    pub y: f64,
    pub extents: StaffExtents,
}

/// Summary of a solve run
#[derive(Debug, Clone, Default)]
pub struct SolveReport {
    pub warnings: Vec<LayoutWarning>,
    pub staffs: Vec<StaffPosition>,
    /// Number of work items solved in the second pass
    pub deferred: usize,
}

impl SolveReport {
    /// Position of a staff on a score line
    pub fn staff(&self, line: usize, staff: StaffNo) -> Option<&StaffPosition> {
        self.staffs
            .iter()
            .find(|p| p.line == line && p.staff == staff)
    }
}

/// Parameter states in effect at each measure
struct Replay {
    states: Vec<ParamState>,
    /// Index into `states`, per measure
    at: Vec<usize>,
    /// Measures in document order
    order: Vec<MeasureId>,
}

impl Replay {
    fn new(score: &Score, initial: &ParamState) -> Self {
        let mut states = vec![initial.clone()];
        let mut at = vec![0; score.measures.len()];
        let mut order = Vec::with_capacity(score.measures.len());
        for element in &score.elements {
            match element {
                Element::Params(delta) => {
                    let next = states[states.len() - 1].apply(delta);
                    states.push(next);
                }
                Element::Staff(mid) => {
                    if let Some(slot) = at.get_mut(mid.0) {
                        *slot = states.len() - 1;
                    }
                    order.push(*mid);
                }
                Element::Bar | Element::ScoreBreak => {}
            }
        }
        Self { states, at, order }
    }

    fn state(&self, mid: MeasureId) -> &ParamState {
        let index = self.at.get(mid.0).copied().unwrap_or(0);
        &self.states[index]
    }
}

impl MeasureParams for Replay {
    fn at(&self, measure: MeasureId) -> &dyn ParamResolver {
        self.state(measure)
    }
}

/// Absolute layout of one score line, filled in after staff placement
#[derive(Debug, Default)]
struct LineFrames {
    y: HashMap<(usize, StaffNo), f64>,
}

impl LineFrames {
    fn frame(&self, score: &Score, line: usize, staff: StaffNo, step: f64) -> StaffFrame {
        let staffs = score.staffs_on_line(line);
        let own = self.y.get(&(line, staff)).copied();
        let index = staffs.iter().position(|s| *s == staff);
        let neighbor = |i: Option<usize>| {
            let other = i.and_then(|i| staffs.get(i))?;
            Some(self.y.get(&(line, *other))? - own?)
        };
        let above = neighbor(index.and_then(|i| i.checked_sub(1)));
        let below = neighbor(index.map(|i| i + 1));
        StaffFrame::new(step).with_neighbors(above, below)
    }
}

/// Runs both passes over a score
pub struct Driver<'a> {
    initial: &'a ParamState,
    fonts: &'a dyn FontMetrics,
    lint: bool,
}

impl<'a> Driver<'a> {
    pub fn new(initial: &'a ParamState, fonts: &'a dyn FontMetrics) -> Self {
        Self {
            initial,
            fonts,
            lint: true,
        }
    }

    /// Enable or disable the final overlap check
    pub fn with_lint(mut self, lint: bool) -> Self {
        self.lint = lint;
        self
    }

    pub fn run(&self, score: &mut Score) -> Result<SolveReport, LayoutError> {
        let replay = Replay::new(score, self.initial);
        let mut schedule = Schedule::new();
        let mut report = SolveReport::default();

        info!("pass 1: {} measures", replay.order.len());
        for &mid in &replay.order {
            let ctx = self.context(&replay, score, mid, Pass::First, None)?;
            stems::solve_measure(score, &ctx, mid, &mut schedule)?;
        }
        for &mid in &replay.order {
            let ctx = self.context(&replay, score, mid, Pass::First, None)?;
            self.solve_tuplets(score, &ctx, mid, &mut schedule)?;
        }

        let mut extents = HashMap::new();
        for line in 0..score.line_count() {
            for staff in score.staffs_on_line(line) {
                let ctx = self.line_context(&replay, score, line, staff, Pass::First, None)?;
                let placed =
                    place_staff(score, &ctx, &replay, line, staff, &mut report.warnings)?;
                extents.insert((line, staff), placed);
            }
        }
        let frames = self.place_staffs(score, &replay, &extents, &mut report)?;

        let mut deferred_units: Vec<(usize, StaffNo)> = schedule
            .deferred
            .iter()
            .filter_map(|&id| {
                let mid = score.measure_of(id)?;
                let m = score.measures.get(mid.0)?;
                Some((m.line, m.staff))
            })
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        deferred_units.sort();
        for (line, staff) in deferred_units {
            schedule.defer(Work::Annotations(line, staff), &[]);
        }

        if !schedule.is_empty() {
            info!("pass 2: {} deferred items", schedule.len());
            for &work in schedule.work() {
                self.run_deferred(score, &replay, &frames, work, &mut report)?;
            }
        }
        report.deferred = schedule.len();

        if self.lint {
            report.warnings.extend(diagnostics::check(score));
        }
        Ok(report)
    }

    fn context<'s>(
        &'s self,
        replay: &'s Replay,
        score: &Score,
        mid: MeasureId,
        pass: Pass,
        frames: Option<(&LineFrames, usize)>,
    ) -> Result<SolveContext<'s>, LayoutError> {
        let staff = score.measure(mid)?.staff;
        let state: &dyn ParamResolver = replay.state(mid);
        let ctx = SolveContext::new(state, self.fonts, pass, staff);
        Ok(match frames {
            Some((frames, line)) => {
                let frame = frames.frame(score, line, staff, ctx.step());
                ctx.with_frame(frame)
            }
            None => ctx,
        })
    }

    /// Context for a whole (line, staff) unit, using the state at its first measure
    fn line_context<'s>(
        &'s self,
        replay: &'s Replay,
        score: &Score,
        line: usize,
        staff: StaffNo,
        pass: Pass,
        frames: Option<&LineFrames>,
    ) -> Result<SolveContext<'s>, LayoutError> {
        let Some(&first) = score.measures_of(line, staff).first() else {
            return Err(LayoutError::internal(format!(
                "staff {} has no measure on line {}",
                staff.0, line
            )));
        };
        self.context(replay, score, first, pass, frames.map(|f| (f, line)))
    }

    fn solve_tuplets(
        &self,
        score: &mut Score,
        ctx: &SolveContext<'_>,
        mid: MeasureId,
        schedule: &mut Schedule,
    ) -> Result<(), LayoutError> {
        let groups: Vec<GroupId> = score.measure(mid)?.all_groups().collect();
        for id in groups {
            let opens = score
                .get(id)?
                .tuplet
                .as_ref()
                .is_some_and(|t| matches!(t.role, TupletRole::Start | TupletRole::Lone));
            if !opens {
                continue;
            }
            let members = tuplet_members(score, id)?;
            if ctx.pass == Pass::First && members.iter().any(|m| schedule.is_deferred(*m)) {
                schedule.defer(Work::Tuplet(id), &members);
                continue;
            }
            solve_tuplet(score, ctx, &members)?;
        }
        Ok(())
    }

    /// Stack the staffs of every score line from the top down
    fn place_staffs(
        &self,
        score: &mut Score,
        replay: &Replay,
        extents: &HashMap<(usize, StaffNo), StaffExtents>,
        report: &mut SolveReport,
    ) -> Result<LineFrames, LayoutError> {
        let mut frames = LineFrames::default();
        for line in 0..score.line_count() {
            let mut previous: Option<(StaffNo, f64, f64)> = None;
            for staff in score.staffs_on_line(line) {
                let Some(&placed) = extents.get(&(line, staff)) else {
                    continue;
                };
                let Some(&first) = score.measures_of(line, staff).first() else {
                    continue;
                };
                let state = replay.state(first);
                let step = STEPSIZE * state.number(staff, None, ParamName::StaffScale);
                let y = match previous {
                    None => 0.0,
                    Some((upper, upper_y, upper_step)) => {
                        let upper_extents = extents.get(&(line, upper)).copied().unwrap_or(placed);
                        let sep = state.number(upper, None, ParamName::StaffSep) * upper_step;
                        let minimum = sep + HALF_STAFF_STEPS * (upper_step + step);
                        let needed = upper_extents.south + upper_extents.between + placed.north;
                        upper_y - minimum.max(needed)
                    }
                };
                debug!("line {} staff {} at y={:.3}", line, staff.0, y);
                frames.y.insert((line, staff), y);
                for mid in score.measures_of(line, staff) {
                    score.measure_mut(mid)?.y = Some(y);
                }
                report.staffs.push(StaffPosition {
                    line,
                    staff,
                    y,
                    extents: placed,
                });
                previous = Some((staff, y, step));
            }
        }
        Ok(frames)
    }

    fn run_deferred(
        &self,
        score: &mut Score,
        replay: &Replay,
        frames: &LineFrames,
        work: Work,
        report: &mut SolveReport,
    ) -> Result<(), LayoutError> {
        let group_unit = |score: &Score, id: GroupId| -> Result<(MeasureId, usize), LayoutError> {
            let mid = score
                .measure_of(id)
                .ok_or_else(|| LayoutError::internal(format!("group {} has no measure", id.0)))?;
            Ok((mid, score.measure(mid)?.line))
        };

        match work {
            Work::Group(id) | Work::Beam(id) | Work::Tuplet(id) => {
                let (mid, line) = group_unit(score, id)?;
                let ctx = self.context(replay, score, mid, Pass::Second, Some((frames, line)))?;
                match work {
                    Work::Group(_) => {
                        self.warn_missing_neighbor(score, &ctx, &[id], report)?;
                        stems::solve_group(score, &ctx, id)?;
                    }
                    Work::Beam(_) => {
                        let run = score.beam_run(id)?;
                        self.warn_missing_neighbor(score, &ctx, &run, report)?;
                        stems::solve_beam(score, &ctx, &run)?;
                    }
                    _ => {
                        let members = tuplet_members(score, id)?;
                        solve_tuplet(score, &ctx, &members)?;
                    }
                }
            }
            Work::Annotations(line, staff) => {
                let ctx =
                    self.line_context(replay, score, line, staff, Pass::Second, Some(frames))?;
                let placed = place_staff(score, &ctx, replay, line, staff, &mut report.warnings)?;
                if let Some(position) = report
                    .staffs
                    .iter_mut()
                    .find(|p| p.line == line && p.staff == staff)
                {
                    position.extents = placed;
                }
            }
        }
        Ok(())
    }

    fn warn_missing_neighbor(
        &self,
        score: &Score,
        ctx: &SolveContext<'_>,
        ids: &[GroupId],
        report: &mut SolveReport,
    ) -> Result<(), LayoutError> {
        for &id in ids {
            let group = score.get(id)?;
            let missing = group.notes.iter().any(|n| match n.staff {
                NoteStaff::Own => false,
                NoteStaff::Above => ctx.frame.above.is_none(),
                NoteStaff::Below => ctx.frame.below.is_none(),
            });
            if missing {
                report.warnings.push(LayoutWarning::new(
                    WarningCategory::CrossStaff,
                    Some(&group.location),
                    format!(
                        "staff {} has cross-staff notes but no neighboring staff on its line",
                        group.staff.0
                    ),
                ));
            }
        }
        Ok(())
    }
}
