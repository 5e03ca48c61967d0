//! Theia core: shared library for the installation's processes.
//!
//! The curator process folds camera motion events into a decaying
//! [`grid::AttentionGrid`] and points every head at the grid's focus; each
//! head daemon runs a [`stepper::StepperState`] seek loop and reports every
//! physical step over the [`bus`]. This crate holds everything both sides
//! agree on: geometry, topology, the message model, wire protocol, and the
//! command surface.

pub mod bus;
pub mod command;
pub mod error;
pub mod geom;
pub mod grid;
pub mod installation;
pub mod messages;
pub mod metrics;
pub mod stepper;

pub use error::{Error, Result};
