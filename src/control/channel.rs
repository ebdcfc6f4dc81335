//! Per-slot source channel state

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::constants::*;
use crate::registry::ObjectId;

/// Parameters of the last accepted publish
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishedParams {
    pub azimuth: f32,
    pub elevation: f32,
    pub radius: f32,
    pub width: f32,
    pub gain: f32,
}

impl PublishedParams {
    /// True when any value moved past its threshold
    pub fn differs(&self, other: &PublishedParams, pose_epsilon: f32, gain_epsilon: f32) -> bool {
        (self.azimuth - other.azimuth).abs() > pose_epsilon
            || (self.elevation - other.elevation).abs() > pose_epsilon
            || (self.radius - other.radius).abs() > pose_epsilon
            || (self.width - other.width).abs() > pose_epsilon
            || (self.gain - other.gain).abs() > gain_epsilon
    }
}

/// Pose and routing state of one stereo slot
#[derive(Debug, Clone)]
pub struct SourceChannel {
    pub slot: usize,
    /// Center azimuth in degrees, [0, 360)
    pub azimuth: f32,
    /// Degrees, [-90, 90]
    pub elevation: f32,
    /// Percent of the maximum distance
    pub radius: f32,
    /// Stereo spread in degrees
    pub width: f32,
    pub bypass: bool,
    /// A spatializer is bound
    pub active: bool,
    /// Linked (or bypassed) and audible
    pub playing: bool,
    pub pose_initialized: bool,
    pub label: Option<String>,
    /// Source node last routed through this slot
    pub source_node: Option<ObjectId>,
    pub(crate) last_published: Option<PublishedParams>,
    pub(crate) last_publish_at: Option<Instant>,
}

impl SourceChannel {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            azimuth: 0.0,
            elevation: 0.0,
            radius: IDLE_RADIUS,
            width: IDLE_WIDTH,
            bypass: false,
            active: false,
            playing: false,
            pose_initialized: false,
            label: None,
            source_node: None,
            last_published: None,
            last_publish_at: None,
        }
    }

    /// Back to idle defaults, keeping the slot index
    pub fn reset(&mut self) {
        *self = Self::new(self.slot);
    }

    /// Pose applied when a source is freshly linked
    pub fn apply_linked_pose(&mut self) {
        self.azimuth = LINKED_AZIMUTH;
        self.elevation = LINKED_ELEVATION;
        self.width = LINKED_WIDTH;
        self.radius = LINKED_RADIUS;
        self.pose_initialized = true;
    }

    /// Forget the last publish so the next one goes out unconditionally
    pub fn invalidate_publish(&mut self) {
        self.last_published = None;
        self.last_publish_at = None;
    }

    pub fn last_published(&self) -> Option<&PublishedParams> {
        self.last_published.as_ref()
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            slot: self.slot,
            azimuth: self.azimuth,
            elevation: self.elevation,
            radius: self.radius,
            width: self.width,
            bypass: self.bypass,
            active: self.active,
            playing: self.playing,
            label: self.label.clone(),
            source_node: self.source_node,
        }
    }
}

/// Read-only view of a channel for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub slot: usize,
    pub azimuth: f32,
    pub elevation: f32,
    pub radius: f32,
    pub width: f32,
    pub bypass: bool,
    pub active: bool,
    pub playing: bool,
    pub label: Option<String>,
    pub source_node: Option<ObjectId>,
}
