//! Selection tool state machine
//!
//! Translates raw pointer events (already converted to display units by the host)
//! into either a spatial query or a point selection. Only one tool is ever active;
//! switching tools mid-draw drops the in-progress shape without emitting anything.

use crate::utils;

use geo::{Coord, Rect};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which selection tool the user picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ToolMode {
    #[default]
    None,
    Box,
    Radius,
}

/// A completed selection shape in display units
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DrawShape {
    /// Rectangle spanned by two opposite corners, in any order
    Box { p1: Coord<f64>, p2: Coord<f64> },
    /// Circle with a great-circle radius in meters around a display-unit center
    Radius { center: Coord<f64>, radius_m: f64 },
}

impl DrawShape {
    /// Build a radius shape from a center and an edge point, both in display units
    pub fn radius_from_edge(center: Coord<f64>, edge: Coord<f64>) -> Self {
        let radius_m = utils::haversine_distance(
            utils::mercator_to_lon_lat(center),
            utils::mercator_to_lon_lat(edge),
        );
        DrawShape::Radius { center, radius_m }
    }
}

/// Build the selection rectangle from the clicked corners
///
/// Takes exactly the first two points; fewer than two yields `None`.
pub fn box_from_points(points: &[Coord<f64>]) -> Option<Rect<f64>> {
    match points {
        [p1, p2, ..] => Some(utils::rect_from_corners(*p1, *p2)),
        _ => None,
    }
}

/// Raw pointer input in display units
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Press and release without dragging
    Click { at: Coord<f64>, multi: bool },
    /// Start of a drag
    Press { at: Coord<f64> },
    Move { at: Coord<f64> },
    /// End of a drag
    Release { at: Coord<f64> },
}

/// What the host should do in response to a pointer event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction {
    /// Run a spatial query and replace the selection with its result
    Query(DrawShape),
    /// Hit-test at `at` within `tolerance` display units
    PointSelect {
        at: Coord<f64>,
        tolerance: f64,
        multi: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum DrawState {
    #[default]
    Idle,
    Box {
        first: Option<Coord<f64>>,
    },
    Radius {
        center: Option<Coord<f64>>,
        edge: Option<Coord<f64>>,
    },
}

/// Owns the active tool and its in-progress drawing
#[derive(Debug, Clone, Default)]
pub struct InteractionManager {
    state: DrawState,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl InteractionManager {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn mode(&self) -> ToolMode {
        match self.state {
            DrawState::Idle => ToolMode::None,
            DrawState::Box { .. } => ToolMode::Box,
            DrawState::Radius { .. } => ToolMode::Radius,
        }
    }

    /// Activate a tool
    ///
    /// Picking the active tool again toggles back to idle. Picking another tool
    /// discards whatever was being drawn.
    pub fn select_tool(&mut self, tool: ToolMode) -> ToolMode {
        let current = self.mode();
        if self.is_drawing() {
            tracing::debug!(from = ?current, to = ?tool, "Cancelling in-progress draw");
        }

        self.state = if tool == current {
            DrawState::Idle
        } else {
            match tool {
                ToolMode::None => DrawState::Idle,
                ToolMode::Box => DrawState::Box { first: None },
                ToolMode::Radius => DrawState::Radius {
                    center: None,
                    edge: None,
                },
            }
        };
        self.mode()
    }

    /// Abort any drawing and return to idle
    pub fn cancel(&mut self) {
        self.state = DrawState::Idle;
    }

    /// True once the first point of a shape has been placed
    pub fn is_drawing(&self) -> bool {
        match self.state {
            DrawState::Idle => false,
            DrawState::Box { first } => first.is_some(),
            DrawState::Radius { center, .. } => center.is_some(),
        }
    }

    /// True while a tool is active; the map should not pan on drag then
    #[inline]
    pub fn captures_drag(&self) -> bool {
        self.mode() != ToolMode::None
    }

    /// Feed one pointer event
    ///
    /// `tolerance` is the hit radius in display units used for idle clicks.
    pub fn handle(&mut self, event: PointerEvent, tolerance: f64) -> Option<Interaction> {
        match (self.state, event) {
            (DrawState::Idle, PointerEvent::Click { at, multi }) => {
                Some(Interaction::PointSelect {
                    at,
                    tolerance,
                    multi,
                })
            }
            (DrawState::Idle, _) => None,

            (DrawState::Box { first: None }, PointerEvent::Click { at, .. }) => {
                self.state = DrawState::Box { first: Some(at) };
                None
            }
            (DrawState::Box { first: Some(p1) }, PointerEvent::Click { at, .. }) => {
                self.state = DrawState::Idle;
                let rect = box_from_points(&[p1, at])?;
                Some(Interaction::Query(DrawShape::Box {
                    p1: rect.min(),
                    p2: rect.max(),
                }))
            }
            (DrawState::Box { .. }, _) => None,

            (DrawState::Radius { .. }, PointerEvent::Press { at }) => {
                self.state = DrawState::Radius {
                    center: Some(at),
                    edge: Some(at),
                };
                None
            }
            (DrawState::Radius { center: Some(c), .. }, PointerEvent::Move { at }) => {
                self.state = DrawState::Radius {
                    center: Some(c),
                    edge: Some(at),
                };
                None
            }
            (DrawState::Radius { center: Some(c), .. }, PointerEvent::Release { at }) => {
                self.state = DrawState::Idle;
                Some(Interaction::Query(DrawShape::radius_from_edge(c, at)))
            }
            (DrawState::Radius { .. }, _) => None,
        }
    }

    /// Shape being drawn, for rendering a rubber band under the pointer
    pub fn preview(&self, pointer: Option<Coord<f64>>) -> Option<DrawShape> {
        match self.state {
            DrawState::Box { first: Some(p1) } => {
                pointer.map(|p2| DrawShape::Box { p1, p2 })
            }
            DrawState::Radius {
                center: Some(center),
                edge,
            } => {
                let edge = pointer.or(edge)?;
                Some(DrawShape::radius_from_edge(center, edge))
            }
            _ => None,
        }
    }
}
