//! The single event loop thread
//!
//! Registry events, sync completions and marshaled commands all arrive on
//! one channel and are handled strictly in arrival order by the thread that
//! owns the [`Engine`]. After each message that changed observable state the
//! channel snapshots are republished and the state listener is called.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::commands::Command;
use super::state::Engine;
use super::invoker::LoopInvoker;
use crate::backend::{GraphBackend, SyncToken};
use crate::control::ChannelSnapshot;
use crate::error::{CommandError, Error, Result};
use crate::registry::RegistryEvent;

/// A command awaiting execution, with its reply slot
pub struct Request {
    pub command: Command,
    pub reply: Sender<std::result::Result<(), CommandError>>,
}

/// Everything the event loop handles
pub enum LoopMessage {
    Registry(RegistryEvent),
    SyncDone(SyncToken),
    Invoke(Request),
    /// Answered once everything queued before it was handled
    Barrier(Sender<()>),
    Shutdown,
}

/// Latest channel state, readable from any thread
pub type SharedSnapshots = Arc<RwLock<Vec<ChannelSnapshot>>>;

/// Called on the loop thread whenever channel state changed
pub type StateListener = Box<dyn FnMut(&[ChannelSnapshot]) + Send>;

/// Create the event loop channel
pub fn loop_channel() -> (Sender<LoopMessage>, Receiver<LoopMessage>) {
    unbounded()
}

pub struct EventLoop<B: GraphBackend> {
    engine: Engine<B>,
    rx: Receiver<LoopMessage>,
    snapshots: SharedSnapshots,
    listener: Option<StateListener>,
}

impl<B: GraphBackend> EventLoop<B> {
    pub fn new(engine: Engine<B>, rx: Receiver<LoopMessage>) -> Self {
        let snapshots = Arc::new(RwLock::new(engine.snapshots()));
        Self {
            engine,
            rx,
            snapshots,
            listener: None,
        }
    }

    /// Register the state-changed listener
    pub fn on_state_changed(mut self, listener: StateListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn snapshots(&self) -> SharedSnapshots {
        self.snapshots.clone()
    }

    /// Handle messages until shutdown or until every sender is gone
    pub fn run(mut self) -> Engine<B> {
        tracing::info!("Event loop running");
        while let Ok(message) = self.rx.recv() {
            if !self.dispatch(message) {
                break;
            }
        }
        tracing::info!("Event loop stopped");
        self.engine
    }

    /// Run the loop on a dedicated thread
    pub fn spawn(self, tx: Sender<LoopMessage>) -> Result<LoopHandle<B>>
    where
        B: Send + 'static,
        B::Control: Send + 'static,
    {
        let snapshots = self.snapshots();
        let thread = thread::Builder::new()
            .name("graph-loop".into())
            .spawn(move || self.run())
            .map_err(Error::Io)?;

        let invoker = LoopInvoker::new(tx.clone(), Some(thread.thread().id()));
        Ok(LoopHandle {
            thread,
            tx,
            invoker,
            snapshots,
        })
    }

    /// Handle one message; false stops the loop
    fn dispatch(&mut self, message: LoopMessage) -> bool {
        match message {
            LoopMessage::Registry(event) => {
                tracing::trace!("Registry event: {:?}", event);
                self.engine.handle_event(event);
                self.refresh();
            }
            LoopMessage::SyncDone(token) => {
                self.engine.on_sync_done(token);
                self.refresh();
            }
            LoopMessage::Invoke(request) => {
                let result = self.engine.execute(request.command);
                if let Err(e) = &result {
                    tracing::warn!("Command failed: {}", e);
                }
                // publish before replying so the caller sees its own change
                self.refresh();
                let _ = request.reply.send(result);
            }
            LoopMessage::Barrier(reply) => {
                let _ = reply.send(());
            }
            LoopMessage::Shutdown => return false,
        }
        true
    }

    fn refresh(&mut self) {
        if !self.engine.take_changed() {
            return;
        }

        let snapshots = self.engine.snapshots();
        *self.snapshots.write() = snapshots.clone();
        if let Some(listener) = self.listener.as_mut() {
            listener(&snapshots);
        }
    }
}

/// Running event loop thread
pub struct LoopHandle<B: GraphBackend> {
    thread: JoinHandle<Engine<B>>,
    tx: Sender<LoopMessage>,
    invoker: LoopInvoker,
    snapshots: SharedSnapshots,
}

impl<B: GraphBackend> LoopHandle<B> {
    pub fn invoker(&self) -> LoopInvoker {
        self.invoker.clone()
    }

    pub fn snapshots(&self) -> SharedSnapshots {
        self.snapshots.clone()
    }

    /// Stop the loop after the messages already queued and return the engine
    pub fn shutdown(self) -> Option<Engine<B>> {
        if self.tx.send(LoopMessage::Shutdown).is_err() {
            tracing::debug!("Event loop already stopped");
        }
        match self.thread.join() {
            Ok(engine) => Some(engine),
            Err(_) => {
                tracing::error!("Event loop thread panicked");
                None
            }
        }
    }
}
