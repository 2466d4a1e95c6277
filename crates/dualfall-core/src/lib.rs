//! Two-polarity falling-block simulation engine.
//!
//! A rectangular grid holds cells of polarity 0 and 1. The polarity-0 mass
//! sits along the top edge and the polarity-1 mass along the bottom; shapes
//! of either polarity fall towards their own mass. Every move goes through
//! the intent pipeline ([`IntentSet`]): propose per-cell moves, filter them
//! against bounds, same-polarity collisions and group cohesion, then apply the
//! survivors atomically. Landing shapes can complete rows, which flip polarity
//! and may split off part of a mass as a new falling shape.
//!
//! [`Simulation`] wraps the grid and its [`GroupLedger`] and exposes the
//! command surface: `tick`, `rotate_cw`/`rotate_ccw`, `move_left`/`move_right`,
//! `drop` and `place_figure`.

pub mod cascade;
mod config;
mod error;
mod grid;
mod groups;
mod intent;
pub mod lateral;
pub mod rotation;
pub mod shape;
mod simulation;


pub use config::SimulationConfig;
pub use error::{InvariantViolation, ParseGridError, SimulationError};
pub use grid::{Coords, Grid, Polarity, Size};
pub use groups::{GroupId, GroupLedger, ShapeId};
pub use intent::{Applied, Intent, IntentSet, Verdict};
pub use lateral::Side;
pub use rotation::Rotation;
pub use shape::{import_shape, ShapeCatalog, ShapeDescriptor};
pub use simulation::{GroupEntry, Outcome, Placed, Simulation, Snapshot, Step};
