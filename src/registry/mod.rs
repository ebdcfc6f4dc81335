//! Local mirror of the graph server's object registry

pub mod mirror;
pub mod props;
pub mod types;

pub use mirror::RegistryMirror;
pub use props::Properties;
pub use types::{
    Direction, LinkRecord, LinkRole, NodeRecord, ObjectId, PortRecord, RegistryEvent,
};
