//! Score Vertical - vertical layout core of a music typesetter
//!
//! This library computes stem lengths, beam and tuplet-bracket lines, and
//! collision-free placement of annotations (dynamics, text, lyrics, pedal
//! marks, curves) around each staff. Horizontal positions are assigned
//! upstream; everything here works in inches relative to each staff's
//! center line.
//!
//! # Example
//!
//! ```rust
//! use score_vertical::model::{Group, ScoreBuilder, StaffNo, VoiceNo};
//! use score_vertical::solve;
//!
//! let mut builder = ScoreBuilder::new();
//! let m = builder.measure(StaffNo(1));
//! let id = builder.add_group(m, VoiceNo(1), Group::note(1.0, -2));
//! let mut score = builder.build();
//!
//! solve(&mut score).unwrap();
//! assert!(score.get(id).unwrap().stem_len > 0.0);
//! ```

pub mod context;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod fonts;
pub mod geometry;
pub mod layout;
pub mod model;
pub mod params;
pub mod stems;
pub mod tuplet;

pub use context::{Pass, SolveContext, StaffFrame};
pub use diagnostics::{LayoutWarning, WarningCategory};
pub use driver::{Driver, Schedule, SolveReport, StaffPosition, Work};
pub use error::{InputLocation, LayoutError};
pub use fonts::{ApproxFontMetrics, Font, FontMetrics};
pub use geometry::{Extent, Line};
pub use params::{
    MeasureParams, ParamDelta, ParamName, ParamResolver, ParamState, ParamValue, ParamsError,
};

/// Configuration for a complete solve run
#[derive(Debug, Clone)]
pub struct VerticalConfig {
    /// Parameter state in effect before the first document record
    pub params: ParamState,
    /// Check placed annotations for remaining overlaps
    pub lint: bool,
}

impl Default for VerticalConfig {
    fn default() -> Self {
        Self {
            params: ParamState::new(),
            lint: true,
        }
    }
}

impl VerticalConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial parameter state
    pub fn with_params(mut self, params: ParamState) -> Self {
        self.params = params;
        self
    }

    /// Enable or disable the overlap check
    pub fn with_lint(mut self, lint: bool) -> Self {
        self.lint = lint;
        self
    }
}

/// Solve a score with default parameters and estimated font metrics
pub fn solve(score: &mut model::Score) -> Result<SolveReport, LayoutError> {
    solve_with_config(score, &VerticalConfig::default(), &ApproxFontMetrics::default())
}

/// Solve a score with custom configuration and font metrics
///
/// # Example
///
/// ```rust
/// use score_vertical::model::{Group, ScoreBuilder, StaffNo, VoiceNo};
/// use score_vertical::{solve_with_config, ApproxFontMetrics, ParamState, VerticalConfig};
///
/// let params = ParamState::from_toml("[score]\nstemlen = 6.0\n").unwrap();
/// let config = VerticalConfig::new().with_params(params);
///
/// let mut builder = ScoreBuilder::new();
/// let m = builder.measure(StaffNo(1));
/// builder.add_group(m, VoiceNo(1), Group::note(1.0, 0));
/// let mut score = builder.build();
///
/// let report = solve_with_config(&mut score, &config, &ApproxFontMetrics::default()).unwrap();
/// assert_eq!(report.staffs.len(), 1);
/// ```
pub fn solve_with_config(
    score: &mut model::Score,
    config: &VerticalConfig,
    fonts: &dyn FontMetrics,
) -> Result<SolveReport, LayoutError> {
    Driver::new(&config.params, fonts)
        .with_lint(config.lint)
        .run(score)
}
