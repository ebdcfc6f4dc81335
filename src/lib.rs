//! # Spatial Mixer
//!
//! Keeps a media server's audio graph wired into a multi-channel 3D
//! spatializer and pushes per-source position parameters into it.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────┐         ┌──────────────────────────────┐
//! │   Graph server (registry)    │         │  Presentation layer (UI)     │
//! │  node/port/link add/remove   │         │  position, width, bypass...  │
//! └──────────────┬───────────────┘         └──────────────┬───────────────┘
//!                │ RegistryEvent                          │ Command
//!                │                          ┌─────────────┴──────────────┐
//!                │                          │ LoopInvoker (blocks until  │
//!                │                          │ the loop ran the command)  │
//!                ▼                          └─────────────┬──────────────┘
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                  EventLoop thread (sole owner of state)              │
//! │  ┌──────────────────────────────────────────────────────────────┐   │
//! │  │                           Engine                              │   │
//! │  │  RegistryMirror ─► LinkRouter ─► StereoSlotAllocator          │   │
//! │  │                        │            FilterInputs [0..2S)       │   │
//! │  │                        ▼                                       │   │
//! │  │                 ParameterPublisher ─► SourceChannel[S]        │   │
//! │  │  SyncCoordinator (startup cleanup barrier)                    │   │
//! │  └──────────────────────────────────────────────────────────────┘   │
//! └───────────────┬──────────────────────────────────┬───────────────────┘
//!                 │ create/destroy link,              │ state changed
//!                 │ set parameter                     ▼
//!                 ▼                          ChannelSnapshot[S] (RwLock)
//!          GraphBackend                      + listener (WebSocket push)
//! ```

pub mod backend;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod registry;
pub mod routing;
pub mod ui;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Node name of the spatializer's input side
    pub const SPATIALIZER_INPUT_NAME: &str = "effect_input.multi_spatial";

    /// Node name of the spatializer's output side
    pub const SPATIALIZER_OUTPUT_NAME: &str = "effect_output.multi_spatial";

    /// Media class of nodes eligible as the bypass sink
    pub const SINK_MEDIA_CLASS: &str = "Audio/Sink";

    /// Default number of stereo slots
    pub const DEFAULT_SLOT_COUNT: usize = 4;

    /// Upper bound for configurable slots
    pub const MAX_SLOT_COUNT: usize = 16;

    /// Minimum interval between parameter pushes for one channel
    pub const PUBLISH_THROTTLE_MS: u64 = 40;

    /// Default HTTP port for the control surface
    pub const DEFAULT_HTTP_PORT: u16 = 8080;

    /// Pose applied when a source is freshly linked
    pub const LINKED_AZIMUTH: f32 = 0.0;
    pub const LINKED_ELEVATION: f32 = 0.0;
    pub const LINKED_WIDTH: f32 = 25.0;
    pub const LINKED_RADIUS: f32 = 55.0;

    /// Channel defaults before any source was seen
    pub const IDLE_RADIUS: f32 = 50.0;
    pub const IDLE_WIDTH: f32 = 20.0;

    /// Command value domains
    pub const MIN_RADIUS_PCT: f32 = 8.0;
    pub const MAX_RADIUS_PCT: f32 = 100.0;
    pub const MAX_ELEVATION: f32 = 90.0;
    pub const MAX_WIDTH: f32 = 90.0;

    /// Width changes below this are ignored
    pub const WIDTH_STEP: f32 = 0.2;
}
