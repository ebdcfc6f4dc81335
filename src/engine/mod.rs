//! Event loop, engine state and cross-thread command invocation

pub mod clock;
pub mod commands;
pub mod event_loop;
pub mod invoker;
pub mod state;
pub mod sync;


pub use clock::{Clock, ManualClock, MonotonicClock};
pub use commands::Command;
pub use event_loop::{
    loop_channel, EventLoop, LoopHandle, LoopMessage, Request, SharedSnapshots, StateListener,
};
pub use invoker::LoopInvoker;
pub use state::{Engine, Spatializer};
pub use sync::SyncCoordinator;
