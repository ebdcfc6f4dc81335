//! Link routing into the spatializer
//!
//! `slots` and `inputs` hold the fixed slot model; `router` reconciles the
//! live link set against it.

pub mod inputs;
pub mod router;
pub mod slots;

pub use inputs::FilterInputs;
pub use slots::{Allocation, StereoSlotAllocator};
