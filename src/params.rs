//! Parameter resolution
//!
//! Every numeric or enumerated setting the solvers need is looked up through
//! [`ParamResolver`], keyed by staff, voice and parameter name. The concrete
//! [`ParamState`] layers voice overrides over staff overrides over score
//! values over built-in defaults. Documents change parameters mid-stream
//! with [`ParamDelta`] records; the driver replays them in document order and
//! each replay produces a new immutable state.
//!
//! An initial state can be loaded from TOML:
//!
//! ```toml
//! [score]
//! stemlen = 6.5
//! aboveorder = { curve = 1, dynamic = 2, text = 2 }
//!
//! [staff.2]
//! staffscale = 0.75
//!
//! [voice.1.2]
//! stemlen = 8
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::layout::order::StackOrder;
use crate::model::{MarkType, MeasureId, StaffNo, VoiceNo};

/// Errors that can occur when loading parameters
#[derive(Error, Debug)]
pub enum ParamsError {
    #[error("Failed to read parameter file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse parameter TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Unknown parameter '{0}'")]
    UnknownParam(String),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidValue { name: String, reason: String },
    #[error("Invalid scope '{0}': expected a positive staff or voice number")]
    InvalidScope(String),
}

/// Names of every parameter the core consults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamName {
    StaffScale,
    /// Default stem protrusion beyond the outermost note, in steps
    StemLen,
    /// Maximum shortening of beamed stems, in steps
    StemShortenBeamed,
    /// Maximum shortening of unbeamed stems, in steps
    StemShortenUnbeamed,
    /// Outer-note position (steps beyond the center line in the stem direction) where shortening starts
    StemShortenBegin,
    /// Position where shortening reaches its maximum
    StemShortenEnd,
    /// Shortened stems never fall below this fraction of the default
    StemMinFraction,
    BeamSlopeFactor,
    BeamSlopeMaxAngle,
    TupletSlopeFactor,
    TupletSlopeMaxAngle,
    /// Minimum distance of tuplet bracket ends from the center line, in steps
    TupletMinDist,
    Dist,
    DynDist,
    ChordDist,
    LyricsDist,
    /// Distance between adjacent staff edges, in steps
    StaffSep,
    /// Default text size in points
    Size,
    LyricsSize,
    /// Smallest scale an aligned object may be squeezed to
    AlignMinScale,
    AboveOrder,
    BelowOrder,
    BetweenOrder,
}

impl ParamName {
    pub const ALL: [ParamName; 23] = [
        Self::StaffScale,
        Self::StemLen,
        Self::StemShortenBeamed,
        Self::StemShortenUnbeamed,
        Self::StemShortenBegin,
        Self::StemShortenEnd,
        Self::StemMinFraction,
        Self::BeamSlopeFactor,
        Self::BeamSlopeMaxAngle,
        Self::TupletSlopeFactor,
        Self::TupletSlopeMaxAngle,
        Self::TupletMinDist,
        Self::Dist,
        Self::DynDist,
        Self::ChordDist,
        Self::LyricsDist,
        Self::StaffSep,
        Self::Size,
        Self::LyricsSize,
        Self::AlignMinScale,
        Self::AboveOrder,
        Self::BelowOrder,
        Self::BetweenOrder,
    ];

    /// Key used in configuration files
    pub fn key(&self) -> &'static str {
        match self {
            Self::StaffScale => "staffscale",
            Self::StemLen => "stemlen",
            Self::StemShortenBeamed => "stemshorten_beamed",
            Self::StemShortenUnbeamed => "stemshorten_unbeamed",
            Self::StemShortenBegin => "stemshorten_begin",
            Self::StemShortenEnd => "stemshorten_end",
            Self::StemMinFraction => "stem_min_fraction",
            Self::BeamSlopeFactor => "beamslope_factor",
            Self::BeamSlopeMaxAngle => "beamslope_max_angle",
            Self::TupletSlopeFactor => "tupletslope_factor",
            Self::TupletSlopeMaxAngle => "tupletslope_max_angle",
            Self::TupletMinDist => "tuplet_min_dist",
            Self::Dist => "dist",
            Self::DynDist => "dyndist",
            Self::ChordDist => "chorddist",
            Self::LyricsDist => "lyricsdist",
            Self::StaffSep => "staffsep",
            Self::Size => "size",
            Self::LyricsSize => "lyricssize",
            Self::AlignMinScale => "align_min_scale",
            Self::AboveOrder => "aboveorder",
            Self::BelowOrder => "beloworder",
            Self::BetweenOrder => "betweenorder",
        }
    }

    pub fn from_key(key: &str) -> Option<ParamName> {
        Self::ALL.iter().copied().find(|name| name.key() == key)
    }

    /// Built-in value used when no scope sets the parameter
    pub fn default_value(&self) -> ParamValue {
        use ParamValue::Number;
        match self {
            Self::StaffScale => Number(1.0),
            Self::StemLen => Number(7.0),
            Self::StemShortenBeamed => Number(1.0),
            Self::StemShortenUnbeamed => Number(2.0),
            Self::StemShortenBegin => Number(1.0),
            Self::StemShortenEnd => Number(6.0),
            Self::StemMinFraction => Number(0.5),
            Self::BeamSlopeFactor => Number(0.7),
            Self::BeamSlopeMaxAngle => Number(20.0),
            Self::TupletSlopeFactor => Number(0.7),
            Self::TupletSlopeMaxAngle => Number(20.0),
            Self::TupletMinDist => Number(6.0),
            Self::Dist => Number(2.0),
            Self::DynDist => Number(2.0),
            Self::ChordDist => Number(3.0),
            Self::LyricsDist => Number(2.0),
            Self::StaffSep => Number(10.0),
            Self::Size => Number(12.0),
            Self::LyricsSize => Number(12.0),
            Self::AlignMinScale => Number(0.75),
            Self::AboveOrder => ParamValue::Order(StackOrder::default_above()),
            Self::BelowOrder => ParamValue::Order(StackOrder::default_below()),
            Self::BetweenOrder => ParamValue::Order(StackOrder::default_between()),
        }
    }

    fn is_order(&self) -> bool {
        matches!(self, Self::AboveOrder | Self::BelowOrder | Self::BetweenOrder)
    }
}

/// A resolved parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Order(StackOrder),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Order(_) => None,
        }
    }

    pub fn as_order(&self) -> Option<&StackOrder> {
        match self {
            Self::Order(order) => Some(order),
            Self::Number(_) => None,
        }
    }
}

/// The scope a parameter value applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Score,
    Staff(StaffNo),
    Voice(StaffNo, VoiceNo),
}

/// Lookup service for per-staff, per-voice parameters
pub trait ParamResolver {
    /// Resolve a parameter, honoring scope overrides
    ///
    /// `voice` is `None` for staff-wide settings.
    fn resolve(&self, staff: StaffNo, voice: Option<VoiceNo>, name: ParamName) -> ParamValue;

    /// Resolve a numeric parameter, falling back to its default for mistyped values
    fn number(&self, staff: StaffNo, voice: Option<VoiceNo>, name: ParamName) -> f64 {
        self.resolve(staff, voice, name)
            .as_number()
            .or_else(|| name.default_value().as_number())
            .unwrap_or(0.0)
    }

    /// Resolve a stacking order parameter
    fn order(&self, staff: StaffNo, name: ParamName) -> StackOrder {
        match self.resolve(staff, None, name) {
            ParamValue::Order(order) => order,
            ParamValue::Number(_) => name
                .default_value()
                .as_order()
                .cloned()
                .unwrap_or_default(),
        }
    }
}

/// Parameters in effect at each measure of a document
pub trait MeasureParams {
    fn at(&self, measure: MeasureId) -> &dyn ParamResolver;
}

/// A single state covers every measure
impl MeasureParams for ParamState {
    fn at(&self, _measure: MeasureId) -> &dyn ParamResolver {
        self
    }
}

/// A configuration-state record: changes to one scope at one document position
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDelta {
    pub scope: Scope,
    /// `None` removes the scope's own value so the outer scope shows through
    pub changes: Vec<(ParamName, Option<ParamValue>)>,
}

impl ParamDelta {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            changes: Vec::new(),
        }
    }

    pub fn score() -> Self {
        Self::new(Scope::Score)
    }

    pub fn staff(staff: StaffNo) -> Self {
        Self::new(Scope::Staff(staff))
    }

    pub fn voice(staff: StaffNo, voice: VoiceNo) -> Self {
        Self::new(Scope::Voice(staff, voice))
    }

    /// Set a numeric value
    pub fn set(mut self, name: ParamName, value: f64) -> Self {
        self.changes.push((name, Some(ParamValue::Number(value))));
        self
    }

    /// Set a stacking order
    pub fn set_order(mut self, name: ParamName, order: StackOrder) -> Self {
        self.changes.push((name, Some(ParamValue::Order(order))));
        self
    }

    /// Revert a parameter to the enclosing scope's value
    pub fn unset(mut self, name: ParamName) -> Self {
        self.changes.push((name, None));
        self
    }
}

/// Layered parameter table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamState {
    values: HashMap<(Scope, ParamName), ParamValue>,
}

/// TOML structure for deserializing parameter files
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlParams {
    #[serde(default)]
    score: HashMap<String, toml::Value>,
    #[serde(default)]
    staff: HashMap<String, HashMap<String, toml::Value>>,
    #[serde(default)]
    voice: HashMap<String, HashMap<String, HashMap<String, toml::Value>>>,
}

impl ParamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load parameters from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ParamsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load parameters from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ParamsError> {
        let parsed: TomlParams = toml::from_str(content)?;
        let mut state = ParamState::new();

        state.load_table(Scope::Score, &parsed.score)?;
        for (staff, table) in &parsed.staff {
            let staff_no = parse_number::<u16>(staff)?;
            state.load_table(Scope::Staff(StaffNo(staff_no)), table)?;
        }
        for (staff, voices) in &parsed.voice {
            let staff_no = parse_number::<u16>(staff)?;
            for (voice, table) in voices {
                let voice_no = parse_number::<u8>(voice)?;
                state.load_table(Scope::Voice(StaffNo(staff_no), VoiceNo(voice_no)), table)?;
            }
        }
        Ok(state)
    }

    fn load_table(
        &mut self,
        scope: Scope,
        table: &HashMap<String, toml::Value>,
    ) -> Result<(), ParamsError> {
        for (key, value) in table {
            let name =
                ParamName::from_key(key).ok_or_else(|| ParamsError::UnknownParam(key.clone()))?;
            let value = convert_value(name, value)?;
            self.values.insert((scope, name), value);
        }
        Ok(())
    }

    /// Set one value directly
    pub fn set(&mut self, scope: Scope, name: ParamName, value: ParamValue) {
        self.values.insert((scope, name), value);
    }

    /// Return the state after applying a configuration record
    pub fn apply(&self, delta: &ParamDelta) -> ParamState {
        let mut next = self.clone();
        for (name, value) in &delta.changes {
            match value {
                Some(value) => {
                    next.values.insert((delta.scope, *name), value.clone());
                }
                None => {
                    next.values.remove(&(delta.scope, *name));
                }
            }
        }
        next
    }

    /// Value set directly on a scope, without inheritance
    pub fn get(&self, scope: Scope, name: ParamName) -> Option<&ParamValue> {
        self.values.get(&(scope, name))
    }
}

impl ParamResolver for ParamState {
    fn resolve(&self, staff: StaffNo, voice: Option<VoiceNo>, name: ParamName) -> ParamValue {
        voice
            .and_then(|v| self.get(Scope::Voice(staff, v), name))
            .or_else(|| self.get(Scope::Staff(staff), name))
            .or_else(|| self.get(Scope::Score, name))
            .cloned()
            .unwrap_or_else(|| name.default_value())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str) -> Result<T, ParamsError> {
    key.parse::<T>()
        .map_err(|_| ParamsError::InvalidScope(key.to_string()))
}

fn convert_value(name: ParamName, value: &toml::Value) -> Result<ParamValue, ParamsError> {
    if name.is_order() {
        let table = value.as_table().ok_or_else(|| ParamsError::InvalidValue {
            name: name.key().to_string(),
            reason: "expected a table of mark type priorities".to_string(),
        })?;
        let mut priorities = Vec::with_capacity(table.len());
        for (mark, priority) in table {
            let mark_type = MarkType::from_key(mark).ok_or_else(|| ParamsError::InvalidValue {
                name: name.key().to_string(),
                reason: format!("unknown mark type '{}'", mark),
            })?;
            let priority = priority
                .as_integer()
                .filter(|p| *p > 0)
                .ok_or_else(|| ParamsError::InvalidValue {
                    name: name.key().to_string(),
                    reason: format!("priority of '{}' must be a positive integer", mark),
                })?;
            priorities.push((mark_type, priority as u32));
        }
        return Ok(ParamValue::Order(StackOrder::new(priorities)));
    }

    let number = match value {
        toml::Value::Float(f) => *f,
        toml::Value::Integer(i) => *i as f64,
        _ => {
            return Err(ParamsError::InvalidValue {
                name: name.key().to_string(),
                reason: "expected a number".to_string(),
            })
        }
    };
    Ok(ParamValue::Number(number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_overrides() {
        let state = ParamState::new();
        assert_eq!(state.number(StaffNo(1), None, ParamName::StemLen), 7.0);
        assert_eq!(state.number(StaffNo(3), Some(VoiceNo(2)), ParamName::StaffSep), 10.0);
    }

    #[test]
    fn test_scope_precedence() {
        let mut state = ParamState::new();
        state.set(Scope::Score, ParamName::StemLen, ParamValue::Number(6.0));
        state.set(Scope::Staff(StaffNo(2)), ParamName::StemLen, ParamValue::Number(5.0));
        state.set(
            Scope::Voice(StaffNo(2), VoiceNo(1)),
            ParamName::StemLen,
            ParamValue::Number(4.0),
        );

        assert_eq!(state.number(StaffNo(1), None, ParamName::StemLen), 6.0);
        assert_eq!(state.number(StaffNo(2), None, ParamName::StemLen), 5.0);
        assert_eq!(state.number(StaffNo(2), Some(VoiceNo(2)), ParamName::StemLen), 5.0);
        assert_eq!(state.number(StaffNo(2), Some(VoiceNo(1)), ParamName::StemLen), 4.0);
    }

    #[test]
    fn test_apply_is_non_destructive() {
        let base = ParamState::new();
        let delta = ParamDelta::staff(StaffNo(1)).set(ParamName::StaffScale, 0.5);
        let next = base.apply(&delta);

        assert_eq!(base.number(StaffNo(1), None, ParamName::StaffScale), 1.0);
        assert_eq!(next.number(StaffNo(1), None, ParamName::StaffScale), 0.5);

        let reverted = next.apply(&ParamDelta::staff(StaffNo(1)).unset(ParamName::StaffScale));
        assert_eq!(reverted.number(StaffNo(1), None, ParamName::StaffScale), 1.0);
    }

    #[test]
    fn test_parse_toml_scopes() {
        let toml_str = r#"
[score]
stemlen = 6.5
dist = 3

[staff.2]
staffscale = 0.75

[voice.1.2]
stemlen = 8
"#;
        let state = ParamState::from_toml(toml_str).expect("Should parse");
        assert_eq!(state.number(StaffNo(1), None, ParamName::StemLen), 6.5);
        assert_eq!(state.number(StaffNo(1), None, ParamName::Dist), 3.0);
        assert_eq!(state.number(StaffNo(2), None, ParamName::StaffScale), 0.75);
        assert_eq!(state.number(StaffNo(1), Some(VoiceNo(2)), ParamName::StemLen), 8.0);
    }

    #[test]
    fn test_parse_toml_order() {
        let toml_str = r#"
[score]
aboveorder = { chord = 1, lyrics = 2 }
"#;
        let state = ParamState::from_toml(toml_str).expect("Should parse");
        let order = state.order(StaffNo(1), ParamName::AboveOrder);
        let tiers = order.tiers();
        assert_eq!(tiers[0], vec![MarkType::Chord]);
        assert_eq!(tiers[1], vec![MarkType::Lyrics]);
    }

    #[test]
    fn test_unknown_param_rejected() {
        let result = ParamState::from_toml("[score]\nstemlenn = 3\n");
        assert!(matches!(result, Err(ParamsError::UnknownParam(ref k)) if k == "stemlenn"));
    }

    #[test]
    fn test_bad_scope_rejected() {
        let result = ParamState::from_toml("[staff.top]\nstemlen = 3\n");
        assert!(matches!(result, Err(ParamsError::InvalidScope(_))));
    }

    #[test]
    fn test_invalid_toml_error() {
        assert!(ParamState::from_toml("this is not valid toml {{{{").is_err());
    }

    #[test]
    fn test_key_round_trip() {
        for name in ParamName::ALL {
            assert_eq!(ParamName::from_key(name.key()), Some(name));
        }
    }
}
