//! Simulation Loop
//!
//! The iteration clock, its builder and the read-only view observers receive.

pub mod builder;
pub mod clock;
pub mod diagnostics;
pub mod view;

pub use builder::{LayerSource, ModelBuilder};
pub use clock::{ClockState, SimulationClock, DEFAULT_RADICALISATION_THRESHOLD};
pub use diagnostics::Diagnostics;
pub use view::ModelView;
