use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ArgumentError, ClientError, ObsError};

// ---------------------------------------------------------------------------
// ObsKind
// ---------------------------------------------------------------------------

/// One of the five observation encodings an environment can emit.
///
/// The kind requested at reset time fixes the [`ObsVariant`] and, for dense
/// kinds, the vector length of every later outcome on that env or slot.
///
/// # Example
///
/// ```
/// use snakepool_core::types::ObsKind;
///
/// let kind: ObsKind = "DENSE28_EGO".parse().unwrap();
/// assert_eq!(kind, ObsKind::Dense28Ego);
/// assert_eq!(kind.dense_len(), Some(28));
/// assert_eq!(ObsKind::RawState.dense_len(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum ObsKind {
    RawState,
    Dense32,
    Dense11,
    Dense28Ego,
    Raycasts19,
}

impl ObsKind {
    /// Every kind, in wire enum order.
    pub const ALL: [Self; 5] = [
        Self::RawState,
        Self::Dense32,
        Self::Dense11,
        Self::Dense28Ego,
        Self::Raycasts19,
    ];

    /// Canonical PascalCase name used by the JSON transport.
    pub const fn name(self) -> &'static str {
        match self {
            Self::RawState => "RawState",
            Self::Dense32 => "Dense32",
            Self::Dense11 => "Dense11",
            Self::Dense28Ego => "Dense28Ego",
            Self::Raycasts19 => "Raycasts19",
        }
    }

    /// Protobuf enum value name.
    pub const fn proto_name(self) -> &'static str {
        match self {
            Self::RawState => "RAW_STATE",
            Self::Dense32 => "DENSE32",
            Self::Dense11 => "DENSE11",
            Self::Dense28Ego => "DENSE28_EGO",
            Self::Raycasts19 => "RAYCASTS19",
        }
    }

    /// Protobuf enum number.
    pub const fn proto_value(self) -> i32 {
        match self {
            Self::RawState => 0,
            Self::Dense32 => 1,
            Self::Dense11 => 2,
            Self::Dense28Ego => 3,
            Self::Raycasts19 => 4,
        }
    }

    pub const fn from_proto_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::RawState),
            1 => Some(Self::Dense32),
            2 => Some(Self::Dense11),
            3 => Some(Self::Dense28Ego),
            4 => Some(Self::Raycasts19),
            _ => None,
        }
    }

    /// Fixed dense arity, or `None` for [`RawState`](Self::RawState).
    pub const fn dense_len(self) -> Option<usize> {
        match self {
            Self::RawState => None,
            Self::Dense32 => Some(32),
            Self::Dense11 => Some(11),
            Self::Dense28Ego => Some(28),
            Self::Raycasts19 => Some(19),
        }
    }

    pub const fn is_raw(self) -> bool {
        matches!(self, Self::RawState)
    }
}

impl fmt::Display for ObsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObsKind {
    type Err = ArgumentError;

    /// Accepts the PascalCase and the protobuf spelling, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "rawstate" => Ok(Self::RawState),
            "dense32" => Ok(Self::Dense32),
            "dense11" => Ok(Self::Dense11),
            "dense28ego" => Ok(Self::Dense28Ego),
            "raycasts19" => Ok(Self::Raycasts19),
            _ => Err(ArgumentError::UnknownObsKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for ObsKind {
    type Error = ArgumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObsKind> for &'static str {
    fn from(kind: ObsKind) -> Self {
        kind.name()
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// The three discrete actions, relative to the current heading.
///
/// Serialized as its integer index.
///
/// # Example
///
/// ```
/// use snakepool_core::types::Action;
///
/// assert_eq!(" turnright ".parse::<Action>().unwrap(), Action::TurnRight);
/// assert_eq!(Action::try_from(2).unwrap(), Action::TurnLeft);
/// assert!(Action::try_from(3).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
#[repr(u8)]
pub enum Action {
    Straight = 0,
    TurnRight = 1,
    TurnLeft = 2,
}

impl Action {
    pub const ALL: [Self; 3] = [Self::Straight, Self::TurnRight, Self::TurnLeft];

    pub const fn index(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Straight => "Straight",
            Self::TurnRight => "TurnRight",
            Self::TurnLeft => "TurnLeft",
        }
    }

    /// Convert a slice of raw indices, failing on the first out-of-range one.
    pub fn from_indices(indices: &[i64]) -> Result<Vec<Self>, ArgumentError> {
        indices.iter().map(|&i| Self::try_from(i)).collect()
    }
}

impl TryFrom<i64> for Action {
    type Error = ArgumentError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Straight),
            1 => Ok(Self::TurnRight),
            2 => Ok(Self::TurnLeft),
            _ => Err(ArgumentError::ActionOutOfRange { value }),
        }
    }
}

impl From<Action> for u8 {
    fn from(action: Action) -> Self {
        action.index()
    }
}

impl From<Action> for i32 {
    fn from(action: Action) -> Self {
        Self::from(action.index())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(index) = trimmed.parse::<i64>() {
            return Self::try_from(index);
        }
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ArgumentError::UnknownAction(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Direction / Point
// ---------------------------------------------------------------------------

/// Absolute heading of the snake in a raw observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Direction {
    Right,
    Down,
    Left,
    Up,
}

impl Direction {
    /// Wire spelling (`"RIGHT"`, `"DOWN"`, `"LEFT"`, `"UP"`).
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Right => "RIGHT",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
            Self::Up => "UP",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Direction {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Right, Self::Down, Self::Left, Self::Up]
            .into_iter()
            .find(|d| d.wire_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ArgumentError::UnknownDirection(s.to_string()))
    }
}

impl TryFrom<String> for Direction {
    type Error = ArgumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Direction> for &'static str {
    fn from(dir: Direction) -> Self {
        dir.wire_name()
    }
}

/// Grid cell coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// Structured grid state carried by [`ObsKind::RawState`].
///
/// `body` excludes the head and is ordered from the segment behind the head
/// to the tail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawState {
    pub cols: u32,
    pub rows: u32,
    pub step: u32,
    pub head: Point,
    pub dir: Direction,
    pub food: Point,
    pub body: Vec<Point>,
}

/// Transport-independent observation.
#[derive(Debug, Clone, PartialEq)]
pub enum ObsVariant {
    Dense(Vec<f32>),
    Raw(RawState),
}

impl ObsVariant {
    pub fn as_dense(&self) -> Option<&[f32]> {
        match self {
            Self::Dense(values) => Some(values),
            Self::Raw(_) => None,
        }
    }

    pub const fn as_raw(&self) -> Option<&RawState> {
        match self {
            Self::Raw(raw) => Some(raw),
            Self::Dense(_) => None,
        }
    }

    pub const fn is_dense(&self) -> bool {
        matches!(self, Self::Dense(_))
    }

    pub const fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// Short variant label used in diagnostics.
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::Dense(_) => "dense",
            Self::Raw(_) => "raw",
        }
    }

    /// Whether this observation has the variant and arity `kind` requires.
    pub fn matches_kind(&self, kind: ObsKind) -> bool {
        match (self, kind.dense_len()) {
            (Self::Dense(values), Some(len)) => values.len() == len,
            (Self::Raw(_), None) => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

pub const SIGNAL_COUNT: usize = 6;

/// Names of the per-step signals, in wire order.
pub const SIGNAL_NAMES: [&str; SIGNAL_COUNT] = [
    "eat_food",
    "death",
    "step_cost",
    "toward_food",
    "turning",
    "timeout",
];

/// The six per-step signals in the order of [`SIGNAL_NAMES`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Signals([f32; SIGNAL_COUNT]);

impl Signals {
    pub const ZERO: Self = Self([0.0; SIGNAL_COUNT]);

    pub const fn new(values: [f32; SIGNAL_COUNT]) -> Self {
        Self(values)
    }

    pub const fn as_array(&self) -> &[f32; SIGNAL_COUNT] {
        &self.0
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub const fn eat_food(&self) -> f32 {
        self.0[0]
    }

    pub const fn death(&self) -> f32 {
        self.0[1]
    }

    pub const fn step_cost(&self) -> f32 {
        self.0[2]
    }

    pub const fn toward_food(&self) -> f32 {
        self.0[3]
    }

    pub const fn turning(&self) -> f32 {
        self.0[4]
    }

    pub const fn timeout(&self) -> f32 {
        self.0[5]
    }

    /// Look up a signal by its name in [`SIGNAL_NAMES`].
    pub fn get(&self, name: &str) -> Option<f32> {
        SIGNAL_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.0[i])
    }

    /// Whether every signal is within `tol` of zero.
    pub fn is_zero(&self, tol: f64) -> bool {
        self.0.iter().all(|v| f64::from(*v).abs() <= tol)
    }

    pub fn iter_named(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        SIGNAL_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

impl TryFrom<&[f32]> for Signals {
    type Error = ObsError;

    fn try_from(values: &[f32]) -> Result<Self, Self::Error> {
        <[f32; SIGNAL_COUNT]>::try_from(values)
            .map(Self)
            .map_err(|_| {
                ObsError::malformed(
                    "signals",
                    format!("expected {SIGNAL_COUNT} values, got {}", values.len()),
                )
            })
    }
}

// ---------------------------------------------------------------------------
// DeathCause
// ---------------------------------------------------------------------------

/// Why an environment terminated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DeathCause {
    #[default]
    None,
    Wall,
    SelfCollision,
    Timeout,
}

impl DeathCause {
    /// Wire spelling (`""`, `"wall"`, `"self"`, `"timeout"`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Wall => "wall",
            Self::SelfCollision => "self",
            Self::Timeout => "timeout",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for DeathCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeathCause {
    type Err = ObsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::None, Self::Wall, Self::SelfCollision, Self::Timeout]
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ObsError::malformed("death", format!("unknown death cause '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// StepOutcome
// ---------------------------------------------------------------------------

/// One environment's result for a reset or step, canonicalized.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub obs: ObsVariant,
    pub signals: Signals,
    pub done: bool,
    pub score: u32,
    pub length: u32,
    pub death: DeathCause,
    pub steps: u32,
    /// Raw frame for rendering, present only when the client asked for it.
    pub render: Option<RawState>,
}

// ---------------------------------------------------------------------------
// EnvSpec
// ---------------------------------------------------------------------------

/// Static description of the server's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSpec {
    pub cols: u32,
    pub rows: u32,
    pub timeout_mult: u32,
    pub supported_obs: Vec<ObsKind>,
    pub reward_signals: Vec<String>,
}

impl EnvSpec {
    pub fn supports(&self, kind: ObsKind) -> bool {
        self.supported_obs.contains(&kind)
    }

    /// Pre-flight check run before a reset is issued for `kind`.
    pub fn ensure_supports(&self, kind: ObsKind) -> Result<(), ClientError> {
        if self.supports(kind) {
            Ok(())
        } else {
            Err(ClientError::UnsupportedObsKind {
                kind,
                supported: self.supported_obs.clone(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
