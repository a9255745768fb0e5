//! Error taxonomy for the simulation core.
//!
//! Only two kinds of failure are values: content problems found while loading
//! levels, templates and configuration ([`SimError`]), and the recoverable
//! "this move cannot happen" signal ([`MoveError`]). Invalid queries return
//! `Option`/empty results and broken invariants panic, so neither shows up here.

use thiserror::Error;

/// Errors surfaced while loading content or configuration.
///
/// Every variant names the offending identifier, glyph or coordinate so a
/// level designer can find the problem without a debugger.
#[derive(Debug, Error)]
pub enum SimError {
    /// A map contained no rows at all
    #[error("Level map is empty")]
    EmptyMap,

    /// Map rows of unequal length
    #[error("Level map row {row} has width {found}, expected {expected}")]
    RaggedMap {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Glyph not present in the legend
    #[error("Unknown map glyph '{glyph}' at ({x}, {y})")]
    UnknownGlyph { glyph: char, x: i32, y: i32 },

    /// Required start/end marker absent
    #[error("Level is missing its {0} marker")]
    MissingMarker(&'static str),

    /// Start/end marker placed more than once
    #[error("Duplicate {marker} marker at ({x}, {y})")]
    DuplicateMarker { marker: &'static str, x: i32, y: i32 },

    /// Two movement-blocking entities would share a tile
    #[error("Two blocking entities spawned on ({x}, {y})")]
    OverlappingBlockers { x: i32, y: i32 },

    /// A spawn marker or factory call referenced a template nobody defined
    #[error("Unknown entity template '{0}'")]
    UnknownTemplate(String),

    /// The same template id was defined twice
    #[error("Duplicate entity template '{0}'")]
    DuplicateTemplate(String),

    /// A template parsed but its values make no sense
    #[error("Invalid entity template '{id}': {reason}")]
    InvalidTemplate { id: String, reason: String },

    /// Two templates claim the same map marker glyph
    #[error("Map marker '{glyph}' is claimed by both '{first}' and '{second}'")]
    MarkerConflict {
        glyph: char,
        first: String,
        second: String,
    },

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Referenced a level index that does not exist
    #[error("No level with index {0}")]
    NoSuchLevel(usize),

    /// Malformed JSON in a definition or config document
    #[error("Malformed definition: {0}")]
    Definition(#[from] serde_json::Error),

    /// Anything raised by outer layers (file access and the like)
    #[error("Content loading failed: {0}")]
    Other(#[from] anyhow::Error),
}

/// Recoverable reasons a single step cannot be taken.
///
/// Systems catch these and skip the action; the player sees a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("The way to ({x}, {y}) is blocked")]
    Blocked { x: i32, y: i32 },

    #[error("({x}, {y}) lies outside the level")]
    OutOfBounds { x: i32, y: i32 },

    #[error("Not enough action points ({have}/{need})")]
    InsufficientActionPoints { have: u32, need: u32 },

    #[error("Entity has no position")]
    NoPosition,
}

pub type Result<T> = std::result::Result<T, SimError>;

/// Turns a content error into a short message suitable for the message log.
pub fn handle_error(error: &SimError) -> String {
    match error {
        SimError::MissingMarker(marker) => format!("The level has no {marker} stairs"),
        SimError::UnknownTemplate(id) => format!("Nothing is known about '{id}'"),
        SimError::Definition(e) if e.is_syntax() => {
            format!("Definition file is not valid JSON (line {})", e.line())
        }
        _ => error.to_string(),
    }
}

impl MoveError {
    /// Blocked moves are routine; the rest hint at a caller mistake.
    pub fn is_blocked(&self) -> bool {
        matches!(self, MoveError::Blocked { .. })
    }
}
