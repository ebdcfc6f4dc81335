//! Backend that only records what the engine asked for

use std::collections::HashSet;

use super::{GraphBackend, SyncToken};
use crate::error::GraphError;
use crate::registry::ObjectId;

/// First id handed out for links the engine creates
pub const CREATED_LINK_BASE: ObjectId = 10_000;

/// A link mutation not yet answered by a registry event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    Created { id: ObjectId, output: ObjectId, input: ObjectId },
    Destroyed(ObjectId),
}

#[derive(Debug, Default)]
pub struct RecordingGraph {
    pub created: Vec<(ObjectId, ObjectId)>,
    pub destroyed: Vec<ObjectId>,
    pub params: Vec<(ObjectId, String, f32)>,
    pub syncs: Vec<SyncToken>,
    /// Nodes whose control binding fails
    pub unbindable: HashSet<ObjectId>,
    pending: Vec<Pending>,
    next_link: ObjectId,
}

impl RecordingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value set for `name`
    pub fn param(&self, name: &str) -> Option<f32> {
        self.params
            .iter()
            .rev()
            .find(|(_, n, _)| n == name)
            .map(|(_, _, v)| *v)
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Forget recorded requests; pending mutations are kept
    pub fn clear(&mut self) {
        self.created.clear();
        self.destroyed.clear();
        self.params.clear();
    }

    /// Mutations in request order, for feeding back as events
    pub fn take_pending(&mut self) -> Vec<Pending> {
        std::mem::take(&mut self.pending)
    }
}

impl GraphBackend for RecordingGraph {
    type Control = ObjectId;

    fn create_link(&mut self, output_port: ObjectId, input_port: ObjectId) -> Result<ObjectId, GraphError> {
        let id = CREATED_LINK_BASE + self.next_link;
        self.next_link += 1;
        self.created.push((output_port, input_port));
        self.pending.push(Pending::Created {
            id,
            output: output_port,
            input: input_port,
        });
        Ok(id)
    }

    fn destroy_link(&mut self, link: ObjectId) -> Result<(), GraphError> {
        self.destroyed.push(link);
        self.pending.push(Pending::Destroyed(link));
        Ok(())
    }

    fn bind_control(&mut self, node: ObjectId) -> Option<ObjectId> {
        (!self.unbindable.contains(&node)).then_some(node)
    }

    fn set_parameter(&mut self, control: &ObjectId, name: &str, value: f32) {
        self.params.push((*control, name.to_string(), value));
    }

    fn sync(&mut self) -> SyncToken {
        let token = self.syncs.len() as SyncToken + 1;
        self.syncs.push(token);
        token
    }
}
