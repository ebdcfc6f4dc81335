//! In-process graph server
//!
//! Holds nodes, ports and links in memory and reports every change as a
//! registry event on the event loop channel, in the order the changes were
//! made. Used by the demo binary and end-to-end tests.

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{GraphBackend, SyncToken};
use crate::engine::LoopMessage;
use crate::error::GraphError;
use crate::registry::props::keys;
use crate::registry::{Direction, ObjectId, Properties, RegistryEvent};

/// Control handle bound to a simulated node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimControl {
    pub node: ObjectId,
}

#[derive(Debug, Clone, Copy)]
struct SimPort {
    node: ObjectId,
    direction: Direction,
    channel: u32,
}

#[derive(Debug, Clone, Copy)]
struct SimLink {
    output: ObjectId,
    input: ObjectId,
}

struct Inner {
    next_id: ObjectId,
    sync_seq: SyncToken,
    nodes: BTreeMap<ObjectId, Properties>,
    ports: BTreeMap<ObjectId, SimPort>,
    links: BTreeMap<ObjectId, SimLink>,
    params: HashMap<(ObjectId, String), f32>,
    param_writes: usize,
    events: Sender<LoopMessage>,
}

impl Inner {
    fn allocate_id(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn emit(&self, event: RegistryEvent) {
        if self.events.send(LoopMessage::Registry(event)).is_err() {
            tracing::debug!("Event loop gone, dropping registry event");
        }
    }

    fn create_link(&mut self, output: ObjectId, input: ObjectId) -> Result<ObjectId, GraphError> {
        match self.ports.get(&output) {
            Some(port) if port.direction == Direction::Output => {}
            _ => return Err(GraphError::UnknownPort(output)),
        }
        match self.ports.get(&input) {
            Some(port) if port.direction == Direction::Input => {}
            _ => return Err(GraphError::UnknownPort(input)),
        }
        if self.links.values().any(|l| l.output == output && l.input == input) {
            return Err(GraphError::Rejected(format!("link {} -> {} exists", output, input)));
        }

        let id = self.allocate_id();
        self.links.insert(id, SimLink { output, input });
        self.emit(RegistryEvent::LinkAdded {
            id,
            props: Properties::new()
                .with(keys::LINK_OUTPUT_PORT, output.to_string())
                .with(keys::LINK_INPUT_PORT, input.to_string()),
        });
        Ok(id)
    }

    fn destroy_link(&mut self, id: ObjectId) -> Result<(), GraphError> {
        self.links.remove(&id).ok_or(GraphError::UnknownLink(id))?;
        self.emit(RegistryEvent::LinkRemoved(id));
        Ok(())
    }
}

/// Shared handle to the simulated graph
#[derive(Clone)]
pub struct SimulatedGraph {
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedGraph {
    /// Create an empty graph reporting into `events`
    pub fn new(events: Sender<LoopMessage>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 1,
                sync_seq: 0,
                nodes: BTreeMap::new(),
                ports: BTreeMap::new(),
                links: BTreeMap::new(),
                params: HashMap::new(),
                param_writes: 0,
                events,
            })),
        }
    }

    /// Add a node with arbitrary properties
    pub fn add_node(&self, props: Properties) -> ObjectId {
        let mut inner = self.inner.lock();
        let id = inner.allocate_id();
        inner.nodes.insert(id, props.clone());
        inner.emit(RegistryEvent::NodeAdded { id, props });
        id
    }

    /// Add a port to an existing node
    pub fn add_port(
        &self,
        node: ObjectId,
        direction: Direction,
        channel: u32,
    ) -> Result<ObjectId, GraphError> {
        let mut inner = self.inner.lock();
        if !inner.nodes.contains_key(&node) {
            return Err(GraphError::UnknownNode(node));
        }

        let id = inner.allocate_id();
        inner.ports.insert(id, SimPort { node, direction, channel });
        inner.emit(RegistryEvent::PortAdded {
            id,
            props: Properties::new()
                .with(keys::NODE_ID, node.to_string())
                .with(keys::PORT_DIRECTION, direction.as_str())
                .with(keys::PORT_ID, channel.to_string()),
        });
        Ok(id)
    }

    /// Add a node together with `inputs` input and `outputs` output ports
    pub fn add_node_with_ports(
        &self,
        props: Properties,
        inputs: u32,
        outputs: u32,
    ) -> Result<(ObjectId, Vec<ObjectId>, Vec<ObjectId>), GraphError> {
        let node = self.add_node(props);
        let ins = (0..inputs)
            .map(|ch| self.add_port(node, Direction::Input, ch))
            .collect::<Result<Vec<_>, _>>()?;
        let outs = (0..outputs)
            .map(|ch| self.add_port(node, Direction::Output, ch))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((node, ins, outs))
    }

    /// Remove a node; its links and ports go first
    pub fn remove_node(&self, node: ObjectId) -> Result<(), GraphError> {
        let mut inner = self.inner.lock();
        if !inner.nodes.contains_key(&node) {
            return Err(GraphError::UnknownNode(node));
        }

        let ports: Vec<ObjectId> = inner
            .ports
            .iter()
            .filter(|(_, p)| p.node == node)
            .map(|(id, _)| *id)
            .collect();
        let links: Vec<ObjectId> = inner
            .links
            .iter()
            .filter(|(_, l)| ports.contains(&l.output) || ports.contains(&l.input))
            .map(|(id, _)| *id)
            .collect();

        for id in links {
            inner.destroy_link(id)?;
        }
        for id in ports {
            inner.ports.remove(&id);
            inner.emit(RegistryEvent::PortRemoved(id));
        }
        inner.nodes.remove(&node);
        inner.emit(RegistryEvent::NodeRemoved(node));
        Ok(())
    }

    /// Link two ports as an outside client would
    pub fn link(&self, output: ObjectId, input: ObjectId) -> Result<ObjectId, GraphError> {
        self.inner.lock().create_link(output, input)
    }

    pub fn unlink(&self, link: ObjectId) -> Result<(), GraphError> {
        self.inner.lock().destroy_link(link)
    }

    /// Current links as `(id, output port, input port)`
    pub fn links(&self) -> Vec<(ObjectId, ObjectId, ObjectId)> {
        self.inner
            .lock()
            .links
            .iter()
            .map(|(id, l)| (*id, l.output, l.input))
            .collect()
    }

    pub fn has_link(&self, output: ObjectId, input: ObjectId) -> bool {
        self.inner
            .lock()
            .links
            .values()
            .any(|l| l.output == output && l.input == input)
    }

    /// Last value set for a parameter on a node
    pub fn parameter(&self, node: ObjectId, name: &str) -> Option<f32> {
        self.inner.lock().params.get(&(node, name.to_string())).copied()
    }

    /// Total parameter sets received
    pub fn param_writes(&self) -> usize {
        self.inner.lock().param_writes
    }

    pub fn port_channel(&self, port: ObjectId) -> Option<u32> {
        self.inner.lock().ports.get(&port).map(|p| p.channel)
    }
}

impl GraphBackend for SimulatedGraph {
    type Control = SimControl;

    fn create_link(&mut self, output_port: ObjectId, input_port: ObjectId) -> Result<ObjectId, GraphError> {
        self.link(output_port, input_port)
    }

    fn destroy_link(&mut self, link: ObjectId) -> Result<(), GraphError> {
        self.unlink(link)
    }

    fn bind_control(&mut self, node: ObjectId) -> Option<SimControl> {
        self.inner
            .lock()
            .nodes
            .contains_key(&node)
            .then_some(SimControl { node })
    }

    fn set_parameter(&mut self, control: &SimControl, name: &str, value: f32) {
        let mut inner = self.inner.lock();
        inner.params.insert((control.node, name.to_string()), value);
        inner.param_writes += 1;
    }

    fn sync(&mut self) -> SyncToken {
        let mut inner = self.inner.lock();
        inner.sync_seq += 1;
        let token = inner.sync_seq;
        if inner.events.send(LoopMessage::SyncDone(token)).is_err() {
            tracing::debug!("Event loop gone, dropping sync completion");
        }
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn drain(rx: &crossbeam_channel::Receiver<LoopMessage>) -> Vec<RegistryEvent> {
        rx.try_iter()
            .filter_map(|msg| match msg {
                LoopMessage::Registry(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_link_lifecycle_emits_events() {
        let (tx, rx) = unbounded();
        let graph = SimulatedGraph::new(tx);
        let (_, _, outs) = graph
            .add_node_with_ports(Properties::new().with(keys::NODE_NAME, "src"), 0, 2)
            .unwrap();
        let (_, ins, _) = graph
            .add_node_with_ports(Properties::new().with(keys::NODE_NAME, "dst"), 2, 0)
            .unwrap();
        assert_eq!(drain(&rx).len(), 2 + 4);

        let link = graph.link(outs[0], ins[0]).unwrap();
        assert!(graph.has_link(outs[0], ins[0]));
        assert!(matches!(graph.link(outs[0], ins[0]), Err(GraphError::Rejected(_))));
        assert!(matches!(graph.link(ins[0], outs[0]), Err(GraphError::UnknownPort(_))));

        graph.unlink(link).unwrap();
        assert_eq!(graph.unlink(link), Err(GraphError::UnknownLink(link)));

        let events = drain(&rx);
        assert!(matches!(events[0], RegistryEvent::LinkAdded { id, .. } if id == link));
        assert_eq!(events[1], RegistryEvent::LinkRemoved(link));
    }

    #[test]
    fn test_remove_node_order() {
        let (tx, rx) = unbounded();
        let graph = SimulatedGraph::new(tx);
        let (src, _, outs) = graph.add_node_with_ports(Properties::new(), 0, 1).unwrap();
        let (_, ins, _) = graph.add_node_with_ports(Properties::new(), 1, 0).unwrap();
        let link = graph.link(outs[0], ins[0]).unwrap();
        drain(&rx);

        graph.remove_node(src).unwrap();
        assert_eq!(
            drain(&rx),
            vec![
                RegistryEvent::LinkRemoved(link),
                RegistryEvent::PortRemoved(outs[0]),
                RegistryEvent::NodeRemoved(src),
            ]
        );
        assert!(graph.links().is_empty());
    }

    #[test]
    fn test_sync_queued_behind_events() {
        let (tx, rx) = unbounded();
        let mut graph = SimulatedGraph::new(tx);
        graph.add_node(Properties::new());
        let token = graph.sync();

        let messages: Vec<_> = rx.try_iter().collect();
        assert!(matches!(messages[0], LoopMessage::Registry(_)));
        assert!(matches!(messages[1], LoopMessage::SyncDone(t) if t == token));
    }

    #[test]
    fn test_parameters_recorded() {
        let (tx, _rx) = unbounded();
        let mut graph = SimulatedGraph::new(tx);
        let node = graph.add_node(Properties::new());
        let control = graph.bind_control(node).unwrap();
        assert!(graph.bind_control(999).is_none());

        graph.set_parameter(&control, "spk1:Azimuth", 90.0);
        graph.set_parameter(&control, "spk1:Azimuth", 45.0);
        assert_eq!(graph.parameter(node, "spk1:Azimuth"), Some(45.0));
        assert_eq!(graph.param_writes(), 2);
    }
}
