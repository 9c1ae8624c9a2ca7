//! Feature styling
//!
//! A pure mapping from `(status, priority, selected, show_labels, kind)` to a
//! [`StyleDescriptor`]. Unknown statuses and priorities fall back to defaults;
//! nothing in here can fail.

use crate::GeometryKind;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 8-bit RGBA color, independent of any UI toolkit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[inline]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Move each channel `amount` (0..=1) of the way towards white
    pub fn brighten(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);
        let lift = |c: u8| (c as f32 + (255.0 - c as f32) * amount).round() as u8;
        Self {
            r: lift(self.r),
            g: lift(self.g),
            b: lift(self.b),
            a: self.a,
        }
    }
}

/// Workflow status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Status {
    Pending,
    InProgress,
    Review,
    Completed,
    OnHold,
    Cancelled,
    Unknown,
}

impl Status {
    pub const KNOWN: [Status; 6] = [
        Status::Pending,
        Status::InProgress,
        Status::Review,
        Status::Completed,
        Status::OnHold,
        Status::Cancelled,
    ];

    /// Lenient parse: case-insensitive, `-` and spaces read as `_`
    pub fn parse(raw: &str) -> Self {
        match normalize(raw).as_str() {
            "pending" => Status::Pending,
            "in_progress" => Status::InProgress,
            "review" => Status::Review,
            "completed" => Status::Completed,
            "on_hold" => Status::OnHold,
            "cancelled" | "canceled" => Status::Cancelled,
            _ => Status::Unknown,
        }
    }

    pub fn color(self) -> Rgba {
        match self {
            Status::Pending => Rgba::rgb(245, 166, 35),
            Status::InProgress => Rgba::rgb(33, 150, 243),
            Status::Review => Rgba::rgb(156, 39, 176),
            Status::Completed => Rgba::rgb(67, 160, 71),
            Status::OnHold => Rgba::rgb(255, 112, 67),
            Status::Cancelled => Rgba::rgb(211, 47, 47),
            Status::Unknown => Rgba::rgb(158, 158, 158),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::InProgress => "In progress",
            Status::Review => "Review",
            Status::Completed => "Completed",
            Status::OnHold => "On hold",
            Status::Cancelled => "Cancelled",
            Status::Unknown => "Unknown",
        }
    }
}

/// Priority tier of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
    Unknown,
}

impl Priority {
    pub fn parse(raw: &str) -> Self {
        match normalize(raw).as_str() {
            "low" => Priority::Low,
            "medium" | "normal" => Priority::Medium,
            "high" => Priority::High,
            "critical" | "urgent" => Priority::Critical,
            _ => Priority::Unknown,
        }
    }

    /// Marker radius in pixels for point features
    pub fn marker_radius(self) -> f32 {
        match self {
            Priority::Low => 5.0,
            Priority::Medium => 7.0,
            Priority::High => 9.0,
            Priority::Critical => 12.0,
            Priority::Unknown => DEFAULT_MARKER_RADIUS,
        }
    }
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

const DEFAULT_MARKER_RADIUS: f32 = 6.0;
const BASE_STROKE_WIDTH: f32 = 2.0;
const FILL_ALPHA: u8 = 60;
const SELECTED_FILL_ALPHA: u8 = 130;
const OUTLINE: Rgba = Rgba::rgb(33, 33, 33);

/// How a feature stands out beyond its stroke
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Emphasis {
    /// Filled circle of this radius in pixels (points)
    Radius(f32),
    /// Fill opacity for lines and polygons
    FillAlpha(u8),
}

/// Everything a renderer needs to draw one feature
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StyleDescriptor {
    pub color: Rgba,
    pub stroke_color: Rgba,
    pub stroke_width: f32,
    pub emphasis: Emphasis,
    pub show_label: bool,
}

impl StyleDescriptor {
    /// Fill color derived from the base color and emphasis
    pub fn fill_color(&self) -> Rgba {
        match self.emphasis {
            Emphasis::Radius(_) => self.color,
            Emphasis::FillAlpha(alpha) => self.color.with_alpha(alpha),
        }
    }
}

/// Stateless styler
pub struct FeatureStyler;

impl FeatureStyler {
    /// Compute the style of one feature
    ///
    /// Selection doubles the stroke width and brightens the outline; the base
    /// status color is never altered.
    pub fn style(
        status: &str,
        priority: &str,
        selected: bool,
        show_labels: bool,
        kind: GeometryKind,
    ) -> StyleDescriptor {
        Self::style_parsed(
            Status::parse(status),
            Priority::parse(priority),
            selected,
            show_labels,
            kind,
        )
    }

    pub fn style_parsed(
        status: Status,
        priority: Priority,
        selected: bool,
        show_labels: bool,
        kind: GeometryKind,
    ) -> StyleDescriptor {
        let color = status.color();

        let (stroke_color, stroke_width) = match (kind.is_shape(), selected) {
            // Lines and polygons are outlined in their own color
            (true, false) => (color, BASE_STROKE_WIDTH),
            (true, true) => (color.brighten(0.45), BASE_STROKE_WIDTH * 2.0),
            (false, false) => (OUTLINE, BASE_STROKE_WIDTH / 2.0),
            (false, true) => (OUTLINE.brighten(0.9), BASE_STROKE_WIDTH),
        };

        let emphasis = if kind.is_shape() {
            Emphasis::FillAlpha(if selected {
                SELECTED_FILL_ALPHA
            } else {
                FILL_ALPHA
            })
        } else {
            Emphasis::Radius(priority.marker_radius())
        };

        StyleDescriptor {
            color,
            stroke_color,
            stroke_width,
            emphasis,
            show_label: show_labels,
        }
    }
}
