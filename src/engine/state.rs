//! Engine: the state owned by the event loop thread

use super::clock::{Clock, MonotonicClock};
use super::sync::SyncCoordinator;
use crate::backend::{GraphBackend, SyncToken};
use crate::config::{AppConfig, RoutingConfig};
use crate::control::{ChannelSnapshot, ParamSink, ParameterPublisher, PublishOutcome, SourceChannel};
use crate::registry::{LinkRole, ObjectId, Properties, RegistryEvent, RegistryMirror};
use crate::routing::{FilterInputs, StereoSlotAllocator};

/// The bound spatializer node and its control handle
pub struct Spatializer<C> {
    pub node: ObjectId,
    /// `None` when binding failed; parameter pushes are then skipped
    pub control: Option<C>,
}

/// Forwards parameter sets to the backend through the bound control handle
struct ControlTarget<'a, B: GraphBackend> {
    backend: &'a mut B,
    control: &'a B::Control,
}

impl<B: GraphBackend> ParamSink for ControlTarget<'_, B> {
    fn set_param(&mut self, name: &str, value: f32) {
        self.backend.set_parameter(self.control, name, value);
    }
}

/// Routing and publishing state
///
/// Every method runs on the event loop thread; nothing here is shared.
pub struct Engine<B: GraphBackend> {
    pub(crate) config: RoutingConfig,
    pub(crate) backend: B,
    pub(crate) mirror: RegistryMirror,
    pub(crate) spatializer: Option<Spatializer<B::Control>>,
    pub(crate) inputs: FilterInputs,
    pub(crate) slots: StereoSlotAllocator,
    pub(crate) channels: Vec<SourceChannel>,
    pub(crate) publisher: ParameterPublisher,
    pub(crate) sync: SyncCoordinator,
    clock: Box<dyn Clock>,
    changed: bool,
}

impl<B: GraphBackend> Engine<B> {
    pub fn new(config: &AppConfig, backend: B) -> Self {
        Self::with_clock(config, backend, Box::new(MonotonicClock))
    }

    pub fn with_clock(config: &AppConfig, backend: B, clock: Box<dyn Clock>) -> Self {
        let routing = config.routing.clone();
        let slot_count = routing.slot_count;

        Self {
            mirror: RegistryMirror::new(routing.sink_media_class.clone()),
            inputs: FilterInputs::new(routing.filter_inputs()),
            slots: StereoSlotAllocator::new(slot_count),
            channels: (0..slot_count).map(SourceChannel::new).collect(),
            publisher: ParameterPublisher::new(&config.publisher),
            sync: SyncCoordinator::new(),
            spatializer: None,
            config: routing,
            backend,
            clock,
            changed: false,
        }
    }

    /// Apply one registry notification
    pub fn handle_event(&mut self, event: RegistryEvent) {
        match event {
            RegistryEvent::NodeAdded { id, props } => self.on_node_added(id, &props),
            RegistryEvent::NodeRemoved(id) => self.on_node_removed(id),
            RegistryEvent::PortAdded { id, props } => self.on_port_added(id, &props),
            RegistryEvent::PortRemoved(id) => self.on_port_removed(id),
            RegistryEvent::LinkAdded { id, props } => self.on_link_added(id, &props),
            RegistryEvent::LinkRemoved(id) => self.on_link_removed(id),
        }
    }

    /// Request the startup barrier
    pub fn start_sync(&mut self) -> SyncToken {
        let token = self.backend.sync();
        self.sync.begin(token);
        tracing::debug!("Sync {} requested", token);
        token
    }

    /// Barrier completion; the first matching one triggers stale link cleanup
    pub fn on_sync_done(&mut self, token: SyncToken) {
        if !self.sync.complete(token) {
            tracing::debug!("Ignoring sync completion {}", token);
            return;
        }

        tracing::info!("Initial registry sync done");
        if self.spatializer.is_some() {
            self.unlink_all_filter_inputs();
        }
    }

    pub fn snapshots(&self) -> Vec<ChannelSnapshot> {
        self.channels.iter().map(SourceChannel::snapshot).collect()
    }

    /// True if observable state changed since the last call
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    pub fn channel(&self, slot: usize) -> Option<&SourceChannel> {
        self.channels.get(slot)
    }

    pub fn channels(&self) -> &[SourceChannel] {
        &self.channels
    }

    pub fn spatializer_node(&self) -> Option<ObjectId> {
        self.spatializer.as_ref().map(|s| s.node)
    }

    pub fn mirror(&self) -> &RegistryMirror {
        &self.mirror
    }

    pub fn slots(&self) -> &StereoSlotAllocator {
        &self.slots
    }

    pub fn inputs(&self) -> &FilterInputs {
        &self.inputs
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn slot_count(&self) -> usize {
        self.channels.len()
    }

    pub(crate) fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Push a channel's parameters through the publisher
    pub(crate) fn publish(&mut self, slot: usize, force: bool) -> PublishOutcome {
        let now = self.clock.now();
        let Some(channel) = self.channels.get_mut(slot) else {
            return PublishOutcome::Inactive;
        };

        let control = self.spatializer.as_ref().and_then(|s| s.control.as_ref());
        let mut target = control.map(|control| ControlTarget {
            backend: &mut self.backend,
            control,
        });
        let sink = target.as_mut().map(|t| t as &mut dyn ParamSink);

        let outcome = self.publisher.publish(channel, force, now, sink);
        tracing::trace!("Publish slot {}: {:?}", slot, outcome);
        outcome
    }

    /// Zero a slot's mixer gains
    pub(crate) fn mute(&mut self, slot: usize) {
        let Some(channel) = self.channels.get_mut(slot) else {
            return;
        };
        let Some(control) = self.spatializer.as_ref().and_then(|s| s.control.as_ref()) else {
            return;
        };

        let mut target = ControlTarget {
            backend: &mut self.backend,
            control,
        };
        self.publisher.mute(channel, &mut target);
    }

    /// Request link creation; failures are logged
    pub(crate) fn create_link(&mut self, output_port: ObjectId, input_port: ObjectId) -> bool {
        match self.backend.create_link(output_port, input_port) {
            Ok(id) => {
                tracing::debug!("Requested link {} ({} -> {})", id, output_port, input_port);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to link {} -> {}: {}", output_port, input_port, e);
                false
            }
        }
    }

    /// Request link destruction; failures are logged and otherwise ignored
    pub(crate) fn destroy_link(&mut self, link: ObjectId) {
        if let Err(e) = self.backend.destroy_link(link) {
            tracing::warn!("Failed to destroy link {}: {}", link, e);
        }
    }

    fn on_node_added(&mut self, id: ObjectId, props: &Properties) {
        let record = self.mirror.on_node_added(id, props);
        let is_spatializer = record.name.as_deref() == Some(self.config.spatializer_input.as_str());
        tracing::debug!("Node {} added ({:?})", id, record.name);

        if is_spatializer {
            self.bind_spatializer(id);
        }
    }

    fn on_node_removed(&mut self, id: ObjectId) {
        if self.spatializer_node() == Some(id) {
            self.unbind_spatializer(id);
        } else {
            self.release_source(id);
        }
        self.mirror.on_node_removed(id);
    }

    fn on_port_added(&mut self, id: ObjectId, props: &Properties) {
        let Some(port) = self.mirror.on_port_added(id, props) else {
            return;
        };

        if port.is_input() && Some(port.node_id) == self.spatializer_node() {
            if self.inputs.set_port(port.channel as usize, id) {
                tracing::info!("Filter input {} is port {}", port.channel, id);
            } else {
                tracing::debug!("Spatializer port {} beyond configured inputs", port.channel);
            }
        }
    }

    fn on_port_removed(&mut self, id: ObjectId) {
        self.mirror.on_port_removed(id);
        if let Some(index) = self.inputs.forget_port(id) {
            tracing::info!("Filter input {} port {} removed", index, id);
        }
    }

    /// A node matching the spatializer's name appeared
    fn bind_spatializer(&mut self, id: ObjectId) {
        if let Some(old) = self.spatializer_node() {
            if old != id {
                tracing::warn!("Spatializer node {} replaced by {}", old, id);
            }
            self.unbind_spatializer(old);
        }

        tracing::info!("Binding spatializer node {}", id);
        let control = self.backend.bind_control(id);
        if control.is_none() {
            tracing::warn!("Could not bind control for spatializer node {}", id);
        }
        self.spatializer = Some(Spatializer { node: id, control });

        self.inputs.reset();
        self.slots.clear();
        for slot in 0..self.channels.len() {
            self.channels[slot].reset();
            self.channels[slot].active = true;
            self.mute(slot);
        }

        // ports reported before the node
        let known: Vec<(usize, ObjectId)> = self
            .mirror
            .ports()
            .filter(|p| p.node_id == id && p.is_input())
            .map(|p| (p.channel as usize, p.global_id))
            .collect();
        for (index, port) in known {
            if self.inputs.set_port(index, port) {
                tracing::info!("Filter input {} is port {}", index, port);
            }
        }

        self.mark_changed();
    }

    fn unbind_spatializer(&mut self, id: ObjectId) {
        tracing::info!("Spatializer node {} removed", id);
        self.spatializer = None;

        for link in self.mirror.links_mut() {
            if link.filter_input().is_some() {
                link.role = LinkRole::Passthrough;
            }
        }
        self.inputs.reset();
        self.slots.clear();
        for channel in &mut self.channels {
            channel.active = false;
            channel.playing = false;
        }

        self.mark_changed();
    }

    /// A source node went away; drop bypass and slot state it held
    fn release_source(&mut self, id: ObjectId) {
        for slot in 0..self.channels.len() {
            if self.channels[slot].source_node != Some(id) {
                continue;
            }
            self.channels[slot].source_node = None;
            if self.channels[slot].bypass {
                self.channels[slot].bypass = false;
                self.apply_connection_state(slot);
            }
            self.mark_changed();
        }

        if let Some(slot) = self.slots.slot_of(id) {
            if !self.inputs.slot_connected(slot) {
                self.slots.free(id);
            }
        }
    }
}
