//! Source channels and the spatializer parameter publisher

pub mod channel;
pub mod params;

pub use channel::{ChannelSnapshot, PublishedParams, SourceChannel};
pub use params::{wrap360, ParamSink, ParameterPublisher, PublishOutcome};
