//! Node placement.
//!
//! Two arrangements: a fixed two-column layout (root on the left, fields
//! stacked on the right) and a radial layout (fields evenly spaced on a
//! circle around the root, first node at the top, clockwise in input order).

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Root position in the column layout.
pub const COLUMN_ROOT: Position = Position { x: 50.0, y: 300.0 };
/// X coordinate of the field column.
pub const FIELD_COLUMN_X: f64 = 450.0;
/// Y coordinate of the first field row.
pub const FIELD_ROW_START_Y: f64 = 50.0;
/// Vertical distance between field rows.
pub const FIELD_ROW_SPACING: f64 = 100.0;

/// Root position in the radial layout.
pub const RADIAL_CENTER: Position = Position { x: 600.0, y: 400.0 };
/// Distance of every sub-node from the root.
pub const RADIAL_RADIUS: f64 = 300.0;
/// Angle of the first sub-node, in radians (straight up).
pub const RADIAL_START_ANGLE: f64 = -PI / 2.0;

/// A 2D canvas position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Node arrangement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Root left, fields stacked in a right-hand column.
    Columns,
    /// Fields on a circle around the root.
    #[default]
    Radial,
}

impl Layout {
    /// Root position and one position per sub-node, in input order.
    pub fn positions(&self, count: usize) -> (Position, Vec<Position>) {
        match self {
            Self::Columns => (COLUMN_ROOT, column_positions(count)),
            Self::Radial => (RADIAL_CENTER, radial_positions(count)),
        }
    }
}

impl std::str::FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "columns" | "column" => Ok(Self::Columns),
            "radial" => Ok(Self::Radial),
            other => Err(format!("unknown layout: {other}")),
        }
    }
}

fn column_positions(count: usize) -> Vec<Position> {
    (0..count)
        .map(|i| Position::new(FIELD_COLUMN_X, FIELD_ROW_START_Y + i as f64 * FIELD_ROW_SPACING))
        .collect()
}

fn radial_positions(count: usize) -> Vec<Position> {
    if count == 0 {
        return Vec::new();
    }
    let step = 2.0 * PI / count as f64;
    (0..count)
        .map(|i| {
            let angle = RADIAL_START_ANGLE + i as f64 * step;
            Position::new(
                snap(RADIAL_CENTER.x + RADIAL_RADIUS * angle.cos()),
                snap(RADIAL_CENTER.y + RADIAL_RADIUS * angle.sin()),
            )
        })
        .collect()
}

// Round to a thousandth so trigonometric noise (and -0.0) never leaks into
// positions or fingerprints.
fn snap(v: f64) -> f64 {
    let snapped = (v * 1000.0).round() / 1000.0;
    if snapped == 0.0 {
        0.0
    } else {
        snapped
    }
}
