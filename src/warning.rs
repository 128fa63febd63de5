//! Warning classification.
//!
//! The most urgent candidate of a frame is mapped to a discrete
//! `(Severity, Direction)` pair, and that pair to message text through a
//! fixed table. Candidates whose box covers no more than
//! `close_area_ratio` of the frame produce no warning.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::proximity::ScoredCandidate;
use crate::AlertThresholds;

/// Escalation level, least severe first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Caution,
    Step,
    Stop,
}

impl Severity {
    /// Tier for an area ratio. Thresholds are strict and checked most severe
    /// first, so a ratio sitting exactly on a boundary lands in the lower tier.
    pub fn from_area_ratio(area_ratio: f32, thresholds: &AlertThresholds) -> Option<Self> {
        if area_ratio > thresholds.stop_area_ratio {
            Some(Severity::Stop)
        } else if area_ratio > thresholds.step_area_ratio {
            Some(Severity::Step)
        } else if area_ratio > thresholds.close_area_ratio {
            Some(Severity::Caution)
        } else {
            None
        }
    }

    fn index(self) -> usize {
        match self {
            Severity::Caution => 0,
            Severity::Step => 1,
            Severity::Stop => 2,
        }
    }
}

/// Where the obstacle sits horizontally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Left,
    Center,
    Right,
}

impl Direction {
    /// Direction from the box center as a fraction of frame width.
    ///
    /// The center zone is closed: offsets of exactly `half_width` are `Center`.
    pub fn from_center_x_percent(center_x_percent: f32, half_width: f32) -> Self {
        let offset = center_x_percent - 0.5;
        if offset < -half_width {
            Direction::Left
        } else if offset > half_width {
            Direction::Right
        } else {
            Direction::Center
        }
    }

    fn index(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Center => 1,
            Direction::Right => 2,
        }
    }
}

/// Message text around the label: `prefix + label + suffix`.
#[derive(Clone, Copy)]
struct Template {
    prefix: &'static str,
    suffix: &'static str,
}

const fn t(prefix: &'static str, suffix: &'static str) -> Template {
    Template { prefix, suffix }
}

/// Indexed by `[severity][direction]` (Left, Center, Right).
const MESSAGE_TABLE: [[Template; 3]; 3] = [
    // Caution
    [
        t("Move right! ", " on left"),
        t("Caution ahead! ", ""),
        t("Move left! ", " on right"),
    ],
    // Step
    [
        t("Move right! ", " on left"),
        t("Step back! ", " ahead"),
        t("Move left! ", " on right"),
    ],
    // Stop
    [
        t("STOP! Move right! ", " on left"),
        t("STOP! Step back! ", " ahead"),
        t("STOP! Move left! ", " on right"),
    ],
];

/// Render the spoken text for a severity and direction.
pub fn message_text(severity: Severity, direction: Direction, label: &str) -> String {
    let template = MESSAGE_TABLE[severity.index()][direction.index()];
    format!("{}{}{}", template.prefix, label, template.suffix)
}

/// A classified, speakable warning.
///
/// Two warnings are equal when their text is equal. Different tiers can share
/// wording (a left-side `Caution` and `Step` read the same) and are then the
/// same warning for dedup purposes.
#[derive(Clone, Debug, Serialize)]
pub struct Warning {
    text: String,
    severity: Severity,
    direction: Direction,
}

impl Warning {
    pub fn new(severity: Severity, direction: Direction, label: &str) -> Self {
        Self {
            text: message_text(severity, direction, label),
            severity,
            direction,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl PartialEq for Warning {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Warning {}

impl Hash for Warning {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Classify the frame's most urgent candidate.
pub fn classify(
    candidate: &ScoredCandidate,
    label: &str,
    thresholds: &AlertThresholds,
) -> Option<Warning> {
    let severity = Severity::from_area_ratio(candidate.area_ratio, thresholds)?;
    let direction = Direction::from_center_x_percent(
        candidate.center_x_percent(),
        thresholds.center_zone_half_width,
    );
    Some(Warning::new(severity, direction, label))
}
