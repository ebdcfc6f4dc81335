//! Graph server collaborator
//!
//! The engine never talks to a media server directly. Everything it needs
//! (link creation and destruction, control binding, one-way parameter sets,
//! sync barriers) goes through [`GraphBackend`]. Registry notifications flow
//! the other way, as [`LoopMessage`](crate::engine::LoopMessage)s on the
//! event loop channel.

pub mod memory;
#[cfg(test)]
pub(crate) mod recording;

pub use memory::{SimControl, SimulatedGraph};

use crate::error::GraphError;
use crate::registry::ObjectId;

/// Token pairing a sync request with its completion
pub type SyncToken = u32;

/// Calls the engine makes into the graph server
///
/// All methods are invoked on the event loop thread. Mutations are requests:
/// their effect is observed later through registry events, never assumed.
pub trait GraphBackend {
    /// Handle used to set parameters on a bound node
    type Control;

    /// Ask the server to link two ports
    fn create_link(&mut self, output_port: ObjectId, input_port: ObjectId)
        -> Result<ObjectId, GraphError>;

    /// Ask the server to destroy a link
    fn destroy_link(&mut self, link: ObjectId) -> Result<(), GraphError>;

    /// Bind a control handle to a node
    fn bind_control(&mut self, node: ObjectId) -> Option<Self::Control>;

    /// One-way parameter set; no acknowledgment is awaited
    fn set_parameter(&mut self, control: &Self::Control, name: &str, value: f32);

    /// Issue a sync barrier; completion arrives as `LoopMessage::SyncDone`
    fn sync(&mut self) -> SyncToken;
}
