//! Buffer replenishment.
//!
//! Each configured pattern is either Idle (ready count at or above its
//! minimum) or Filling (a search is closing the gap). The controller scans
//! all patterns on a fixed cadence, sequentially or one thread per pattern.

mod controller;

pub use controller::{BufferState, ControllerStats, Evaluation, ReplenishmentController};
