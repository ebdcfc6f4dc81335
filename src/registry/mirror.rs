//! Cache of node, port and link metadata built from registry events
//!
//! Port lookups are linear scans over the port cache. Port counts on a
//! desktop graph are small, so O(ports) per lookup is fine.

use std::collections::HashMap;

use super::props::Properties;
use super::types::{Direction, LinkRecord, NodeRecord, ObjectId, PortRecord};

/// Owning maps of registry metadata
pub struct RegistryMirror {
    nodes: HashMap<ObjectId, NodeRecord>,
    ports: HashMap<ObjectId, PortRecord>,
    links: HashMap<ObjectId, LinkRecord>,
    /// Media class of sink candidates
    sink_class: String,
    default_sink: Option<ObjectId>,
}

impl RegistryMirror {
    pub fn new(sink_class: impl Into<String>) -> Self {
        Self {
            nodes: HashMap::new(),
            ports: HashMap::new(),
            links: HashMap::new(),
            sink_class: sink_class.into(),
            default_sink: None,
        }
    }

    /// Cache (or replace) a node
    pub fn on_node_added(&mut self, id: ObjectId, props: &Properties) -> &NodeRecord {
        let record = NodeRecord::from_props(props);

        if self.default_sink.is_none() && self.is_sink(&record) {
            tracing::info!("Default sink is node {} ({:?})", id, record.label());
            self.default_sink = Some(id);
        }

        self.nodes.insert(id, record);
        &self.nodes[&id]
    }

    pub fn on_node_removed(&mut self, id: ObjectId) -> Option<NodeRecord> {
        let removed = self.nodes.remove(&id);

        if self.default_sink == Some(id) {
            self.default_sink = self
                .nodes
                .iter()
                .filter(|(_, node)| self.is_sink(node))
                .map(|(id, _)| *id)
                .min();
            tracing::info!("Default sink removed, now {:?}", self.default_sink);
        }

        removed
    }

    /// Cache a port; ports with incomplete metadata are ignored
    pub fn on_port_added(&mut self, id: ObjectId, props: &Properties) -> Option<PortRecord> {
        match PortRecord::from_props(id, props) {
            Some(port) => {
                self.ports.insert(id, port);
                Some(port)
            }
            None => {
                tracing::debug!("Port {} without node/direction/id, ignored", id);
                None
            }
        }
    }

    pub fn on_port_removed(&mut self, id: ObjectId) -> Option<PortRecord> {
        self.ports.remove(&id)
    }

    /// Cache a link record decided by the router
    pub fn on_link_added(&mut self, record: LinkRecord) {
        self.links.insert(record.id, record);
    }

    pub fn on_link_removed(&mut self, id: ObjectId) -> Option<LinkRecord> {
        self.links.remove(&id)
    }

    pub fn node(&self, id: ObjectId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    pub fn port(&self, id: ObjectId) -> Option<&PortRecord> {
        self.ports.get(&id)
    }

    pub fn link(&self, id: ObjectId) -> Option<&LinkRecord> {
        self.links.get(&id)
    }

    pub fn link_mut(&mut self, id: ObjectId) -> Option<&mut LinkRecord> {
        self.links.get_mut(&id)
    }

    pub fn links(&self) -> impl Iterator<Item = &LinkRecord> {
        self.links.values()
    }

    pub fn links_mut(&mut self) -> impl Iterator<Item = &mut LinkRecord> {
        self.links.values_mut()
    }

    pub fn ports(&self) -> impl Iterator<Item = &PortRecord> {
        self.ports.values()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn default_sink(&self) -> Option<ObjectId> {
        self.default_sink
    }

    /// Port of `node` with the given direction and channel
    pub fn find_port(&self, node: ObjectId, direction: Direction, channel: u32) -> Option<ObjectId> {
        self.ports
            .values()
            .filter(|p| p.node_id == node && p.direction == direction && p.channel == channel)
            .map(|p| p.global_id)
            .min()
    }

    pub fn output_port(&self, node: ObjectId, channel: u32) -> Option<ObjectId> {
        self.find_port(node, Direction::Output, channel)
    }

    pub fn input_port(&self, node: ObjectId, channel: u32) -> Option<ObjectId> {
        self.find_port(node, Direction::Input, channel)
    }

    /// Ids of cached links whose output belongs to `node`
    pub fn links_from_node(&self, node: ObjectId) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self
            .links
            .values()
            .filter(|l| l.out_node == node)
            .map(|l| l.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Ids of cached links ending in an input port of `node`
    pub fn links_into_node(&self, node: ObjectId) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self
            .links
            .values()
            .filter(|l| {
                self.ports
                    .get(&l.in_port)
                    .is_some_and(|p| p.node_id == node && p.is_input())
            })
            .map(|l| l.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn is_sink(&self, node: &NodeRecord) -> bool {
        node.media_class.as_deref() == Some(self.sink_class.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::props::keys;
    use crate::registry::types::LinkRole;

    fn port_props(node: u32, dir: &str, channel: u32) -> Properties {
        Properties::new()
            .with(keys::NODE_ID, node.to_string())
            .with(keys::PORT_DIRECTION, dir)
            .with(keys::PORT_ID, channel.to_string())
    }

    fn sink_props(name: &str) -> Properties {
        Properties::new()
            .with(keys::NODE_NAME, name)
            .with(keys::MEDIA_CLASS, "Audio/Sink")
    }

    #[test]
    fn test_port_lookup() {
        let mut mirror = RegistryMirror::new("Audio/Sink");
        mirror.on_port_added(100, &port_props(5, "out", 0));
        mirror.on_port_added(101, &port_props(5, "out", 1));
        mirror.on_port_added(102, &port_props(5, "in", 0));

        assert_eq!(mirror.output_port(5, 0), Some(100));
        assert_eq!(mirror.output_port(5, 1), Some(101));
        assert_eq!(mirror.input_port(5, 0), Some(102));
        assert_eq!(mirror.input_port(5, 1), None);
        assert_eq!(mirror.output_port(6, 0), None);

        mirror.on_port_removed(101);
        assert_eq!(mirror.output_port(5, 1), None);
    }

    #[test]
    fn test_default_sink_fallback() {
        let mut mirror = RegistryMirror::new("Audio/Sink");
        mirror.on_node_added(10, &sink_props("speakers"));
        mirror.on_node_added(12, &sink_props("headphones"));
        mirror.on_node_added(11, &Properties::new().with(keys::NODE_NAME, "vlc"));
        assert_eq!(mirror.default_sink(), Some(10));

        mirror.on_node_removed(10);
        assert_eq!(mirror.default_sink(), Some(12));

        mirror.on_node_removed(12);
        assert_eq!(mirror.default_sink(), None);
    }

    #[test]
    fn test_links_into_node() {
        let mut mirror = RegistryMirror::new("Audio/Sink");
        mirror.on_port_added(100, &port_props(5, "out", 0));
        mirror.on_port_added(200, &port_props(9, "in", 0));
        mirror.on_port_added(300, &port_props(8, "in", 0));

        for (id, in_port) in [(1, 200), (2, 300)] {
            mirror.on_link_added(LinkRecord {
                id,
                out_port: 100,
                in_port,
                out_node: 5,
                role: LinkRole::Passthrough,
            });
        }

        assert_eq!(mirror.links_into_node(9), vec![1]);
        assert_eq!(mirror.links_from_node(5), vec![1, 2]);
        assert!(mirror.on_link_removed(1).is_some());
        assert!(mirror.on_link_removed(1).is_none());
    }
}
