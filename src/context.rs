//! Explicit solving context threaded through every solver call

use crate::fonts::FontMetrics;
use crate::geometry::STEPSIZE;
use crate::params::{ParamName, ParamResolver};
use crate::model::{StaffNo, VoiceNo};

/// Which of the two solving passes is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Staff positions are unknown; cross-staff work is deferred
    First,
    /// Staffs are placed and neighbor offsets are available
    Second,
}

/// Vertical frame of one staff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaffFrame {
    /// Step size of this staff in inches
    pub step: f64,
    /// Center line of the staff above, relative to this staff's center line
    pub above: Option<f64>,
    /// Center line of the staff below, relative to this staff's center line
    pub below: Option<f64>,
}

impl StaffFrame {
    pub fn new(step: f64) -> Self {
        Self {
            step,
            above: None,
            below: None,
        }
    }

    pub fn with_neighbors(mut self, above: Option<f64>, below: Option<f64>) -> Self {
        self.above = above;
        self.below = below;
        self
    }
}

/// Everything a solver may consult for one staff
pub struct SolveContext<'a> {
    pub params: &'a dyn ParamResolver,
    pub fonts: &'a dyn FontMetrics,
    pub pass: Pass,
    pub staff: StaffNo,
    pub frame: StaffFrame,
}

impl<'a> SolveContext<'a> {
    pub fn new(
        params: &'a dyn ParamResolver,
        fonts: &'a dyn FontMetrics,
        pass: Pass,
        staff: StaffNo,
    ) -> Self {
        let scale = params.number(staff, None, ParamName::StaffScale);
        Self {
            params,
            fonts,
            pass,
            staff,
            frame: StaffFrame::new(STEPSIZE * scale),
        }
    }

    pub fn with_frame(mut self, frame: StaffFrame) -> Self {
        self.frame = frame;
        self
    }

    /// Step size of the staff in inches
    pub fn step(&self) -> f64 {
        self.frame.step
    }

    /// Numeric parameter for this staff and an optional voice
    pub fn number(&self, voice: Option<VoiceNo>, name: ParamName) -> f64 {
        self.params.number(self.staff, voice, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::ApproxFontMetrics;
    use crate::params::{ParamDelta, ParamState};

    #[test]
    fn test_step_follows_staff_scale() {
        let params =
            ParamState::new().apply(&ParamDelta::staff(StaffNo(2)).set(ParamName::StaffScale, 0.5));
        let fonts = ApproxFontMetrics::default();
        let ctx = SolveContext::new(&params, &fonts, Pass::First, StaffNo(2));
        assert_eq!(ctx.step(), STEPSIZE * 0.5);
        let ctx = SolveContext::new(&params, &fonts, Pass::First, StaffNo(1));
        assert_eq!(ctx.step(), STEPSIZE);
    }
}
