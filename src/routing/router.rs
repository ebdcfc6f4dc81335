//! Link routing
//!
//! Every link the registry reports passes through here. Links into the
//! spatializer are pinned to the stereo slot of their source node: channel 0
//! must land on the slot's even input and channel 1 on its odd input.
//! Misplaced links are moved if the right input is free and dropped if it is
//! not. Links from the spatializer's own output back into its input, and
//! links from output channels beyond stereo, are destroyed.
//!
//! All mutations are requests to the graph server. Their outcome shows up
//! later as more link events, which go through the same rules.

use super::slots::{input_of, sibling_input, slot_of_input, Allocation};
use crate::backend::GraphBackend;
use crate::constants::{LINKED_RADIUS, LINKED_WIDTH};
use crate::control::wrap360;
use crate::engine::Engine;
use crate::registry::types::link_endpoints;
use crate::registry::{LinkRecord, LinkRole, NodeRecord, ObjectId, PortRecord, Properties};

/// Spread of first-connect azimuths around the listener
pub fn default_azimuth(slot: usize, slot_count: usize) -> f32 {
    if slot_count == 0 {
        return 0.0;
    }
    wrap360(360.0 * slot as f32 / slot_count as f32)
}

impl<B: GraphBackend> Engine<B> {
    pub(crate) fn on_link_added(&mut self, id: ObjectId, props: &Properties) {
        let Some((out_port_id, in_port_id)) = link_endpoints(props) else {
            tracing::debug!("Link {} without port ids, ignored", id);
            return;
        };

        let out_port = self.mirror.port(out_port_id).copied();
        let in_port = self.mirror.port(in_port_id).copied();
        let (Some(out_port), Some(in_port)) = (out_port, in_port) else {
            tracing::info!(
                "Link {} ({} -> {}) references unknown ports, dropped",
                id,
                out_port_id,
                in_port_id
            );
            return;
        };

        if self.is_feedback(&out_port, &in_port) {
            tracing::info!("Destroying feedback link {} (spatializer output into its input)", id);
            self.destroy_link(id);
            return;
        }

        let mut record = LinkRecord {
            id,
            out_port: out_port_id,
            in_port: in_port_id,
            out_node: out_port.node_id,
            role: LinkRole::Passthrough,
        };

        if out_port.channel >= 2 {
            tracing::info!(
                "Rejecting link {}: output channel {} of node {} is not stereo",
                id,
                out_port.channel,
                out_port.node_id
            );
            record.role = LinkRole::Rejected;
            self.mirror.on_link_added(record);
            self.destroy_link(id);
            return;
        }

        match self.filter_input_of(&in_port) {
            Some(actual) => self.route_filter_link(record, out_port.channel as usize, actual),
            None => self.mirror.on_link_added(record),
        }
    }

    pub(crate) fn on_link_removed(&mut self, id: ObjectId) {
        let Some(link) = self.mirror.on_link_removed(id) else {
            return;
        };
        let Some(index) = link.filter_input() else {
            return;
        };

        self.inputs.release(index);
        tracing::info!("Link {} removed, filter input {} free", id, index);

        let slot = slot_of_input(index);
        self.apply_connection_state(slot);

        // bypassed sources keep their slot
        if !self.inputs.is_occupied(sibling_input(index)) && !self.channels[slot].bypass {
            self.slots.free(link.out_node);
        }
        self.mark_changed();
    }

    /// Index of the filter input `port` is, if it is one
    fn filter_input_of(&self, port: &PortRecord) -> Option<usize> {
        let spatializer = self.spatializer.as_ref()?;
        let index = port.channel as usize;
        (port.node_id == spatializer.node && port.is_input() && index < self.inputs.len())
            .then_some(index)
    }

    fn is_feedback(&self, out_port: &PortRecord, in_port: &PortRecord) -> bool {
        let from_output = self
            .mirror
            .node(out_port.node_id)
            .is_some_and(|n| n.name_contains(&self.config.spatializer_output));
        let into_input = self
            .mirror
            .node(in_port.node_id)
            .is_some_and(|n| n.name_contains(&self.config.spatializer_input));
        from_output && into_input
    }

    fn route_filter_link(&mut self, mut record: LinkRecord, channel: usize, actual: usize) {
        let node = record.out_node;
        let channels = &self.channels;
        let Some(allocation) = self.slots.allocate_where(node, |slot| !channels[slot].bypass) else {
            tracing::warn!("No free stereo slot for node {}, destroying link {}", node, record.id);
            self.destroy_link(record.id);
            return;
        };

        let slot = allocation.slot;
        let expected = input_of(slot, channel);

        let Some(target_port) = self.inputs.port(expected) else {
            tracing::warn!(
                "Filter input {} not discovered yet, destroying link {}",
                expected,
                record.id
            );
            self.abandon(allocation, node);
            self.destroy_link(record.id);
            return;
        };

        if self.channels[slot].bypass {
            tracing::info!("Slot {} is bypassed, destroying link {}", slot, record.id);
            self.abandon(allocation, node);
            self.destroy_link(record.id);
            return;
        }

        if actual != expected {
            if self.inputs.is_occupied(expected) {
                tracing::info!(
                    "Stray link {} from node {} channel {}: input {} taken, destroying",
                    record.id,
                    node,
                    channel,
                    expected
                );
                self.abandon(allocation, node);
                self.destroy_link(record.id);
            } else {
                tracing::info!(
                    "Moving link {} from node {} channel {}: input {} -> {}",
                    record.id,
                    node,
                    channel,
                    actual,
                    expected
                );
                self.destroy_link(record.id);
                if !self.create_link(record.out_port, target_port) {
                    self.abandon(allocation, node);
                }
            }
            return;
        }

        record.role = LinkRole::FilterInput(expected);
        self.mirror.on_link_added(record);
        self.inputs.occupy(expected);
        tracing::info!(
            "Accepted link {} from node {} into slot {} input {}",
            record.id,
            node,
            slot,
            expected
        );

        let label = self
            .mirror
            .node(node)
            .and_then(NodeRecord::label)
            .map(str::to_string);
        let channel_state = &mut self.channels[slot];
        channel_state.source_node = Some(node);
        channel_state.label = label;
        channel_state.apply_linked_pose();

        self.apply_connection_state(slot);
        self.publish(slot, true);
        self.mark_changed();
    }

    /// Undo a slot claimed for a link that is being destroyed
    fn abandon(&mut self, allocation: Allocation, node: ObjectId) {
        if allocation.fresh {
            self.slots.free(node);
        }
    }

    /// Reconcile a slot's playing flag with its filter input occupancy
    pub(crate) fn apply_connection_state(&mut self, slot: usize) {
        let Some(channel) = self.channels.get(slot) else {
            return;
        };
        let was_playing = channel.playing;
        let bypass = channel.bypass;
        let pose_initialized = channel.pose_initialized;
        let connected = bypass || self.inputs.slot_connected(slot);

        if was_playing == connected && !bypass {
            return;
        }

        self.channels[slot].playing = connected;
        self.mark_changed();

        if !connected {
            tracing::info!("Slot {} disconnected", slot);
            self.channels[slot].label = None;
            self.mute(slot);
            return;
        }

        if !was_playing && !pose_initialized {
            let azimuth = default_azimuth(slot, self.channels.len());
            let channel = &mut self.channels[slot];
            channel.azimuth = azimuth;
            channel.radius = LINKED_RADIUS;
            channel.width = LINKED_WIDTH;
            channel.pose_initialized = true;
            self.publish(slot, true);
        }
    }

    /// Route a slot's source straight to the default sink, or back through
    /// the spatializer
    pub(crate) fn set_bypass(&mut self, slot: usize, enabled: bool) {
        self.channels[slot].bypass = enabled;
        self.mark_changed();
        tracing::info!("Slot {} bypass {}", slot, if enabled { "on" } else { "off" });

        let source = self.channels[slot].source_node;
        if let Some(node) = source {
            self.retire_links_from(node);
        }

        if enabled {
            match source {
                Some(node) => self.link_to_sink(node),
                None => tracing::debug!("Slot {} has no source to bypass", slot),
            }
            self.apply_connection_state(slot);
            return;
        }

        if let Some(node) = source {
            if self.slots.claim(slot, node) {
                self.link_to_filter(slot, node);
            } else {
                tracing::warn!("Slot {} is taken, cannot relink node {}", slot, node);
            }
        }
        self.apply_connection_state(slot);
        self.publish(slot, true);
    }

    /// Destroy every link into the spatializer and clear all routing state
    pub(crate) fn unlink_all_filter_inputs(&mut self) {
        let Some(node) = self.spatializer_node() else {
            tracing::debug!("No spatializer bound, nothing to unlink");
            return;
        };

        let links = self.mirror.links_into_node(node);
        tracing::info!("Removing {} link(s) into the spatializer", links.len());
        for id in links {
            if !self.retire(id) {
                continue;
            }
            self.destroy_link(id);
        }

        self.inputs.release_all();
        for slot in 0..self.channels.len() {
            // bypassed sources keep their slot
            if !self.channels[slot].bypass {
                self.slots.release(slot);
            }
            self.apply_connection_state(slot);
        }
        self.mark_changed();
    }

    /// Mark a cached link as awaiting removal; false if it already was
    fn retire(&mut self, id: ObjectId) -> bool {
        let Some(link) = self.mirror.link_mut(id) else {
            return false;
        };
        if link.role == LinkRole::Retiring {
            return false;
        }

        if let Some(index) = link.filter_input() {
            self.inputs.release(index);
        }
        link.role = LinkRole::Retiring;
        true
    }

    fn retire_links_from(&mut self, node: ObjectId) {
        let mut touched = Vec::new();
        for id in self.mirror.links_from_node(node) {
            if let Some(index) = self.mirror.link(id).and_then(LinkRecord::filter_input) {
                touched.push(slot_of_input(index));
            }
            if self.retire(id) {
                self.destroy_link(id);
            }
        }

        touched.sort_unstable();
        touched.dedup();
        for slot in touched {
            self.apply_connection_state(slot);
            if !self.inputs.slot_connected(slot) && !self.channels[slot].bypass {
                self.slots.free(node);
            }
        }
    }

    fn link_to_sink(&mut self, node: ObjectId) {
        let Some(sink) = self.mirror.default_sink() else {
            tracing::warn!("No default sink to bypass node {} into", node);
            return;
        };

        for channel in 0..2 {
            let out = self.mirror.output_port(node, channel);
            let input = self.mirror.input_port(sink, channel);
            match (out, input) {
                (Some(out), Some(input)) => {
                    self.create_link(out, input);
                }
                _ => tracing::debug!("No channel {} pair from node {} to sink {}", channel, node, sink),
            }
        }
    }

    fn link_to_filter(&mut self, slot: usize, node: ObjectId) {
        for parity in 0..2 {
            let index = input_of(slot, parity);
            let out = self.mirror.output_port(node, parity as u32);
            let input = self.inputs.port(index);
            if let (Some(out), Some(input)) = (out, input) {
                // claimed until the link shows up
                if self.create_link(out, input) {
                    self.inputs.occupy(index);
                }
            }
        }
    }
}
