//! Blocking cross-thread command invocation
//!
//! Any thread may hold a [`LoopInvoker`]. `invoke` queues the command behind
//! whatever registry events are already pending and blocks until the event
//! loop has executed it, so the caller observes the state after its command.

use crossbeam_channel::{bounded, Sender};
use std::thread::{self, ThreadId};

use super::commands::Command;
use super::event_loop::{LoopMessage, Request};
use crate::error::CommandError;

#[derive(Clone)]
pub struct LoopInvoker {
    tx: Sender<LoopMessage>,
    loop_thread: Option<ThreadId>,
}

impl LoopInvoker {
    pub fn new(tx: Sender<LoopMessage>, loop_thread: Option<ThreadId>) -> Self {
        Self { tx, loop_thread }
    }

    /// Run `command` on the event loop and wait for its result
    pub fn invoke(&self, command: Command) -> Result<(), CommandError> {
        self.check_thread()?;

        let (reply, done) = bounded(1);
        self.tx
            .send(LoopMessage::Invoke(Request { command, reply }))
            .map_err(|_| CommandError::LoopClosed)?;
        done.recv().map_err(|_| CommandError::LoopClosed)?
    }

    /// Returns once every message queued before it has been handled
    pub fn barrier(&self) -> Result<(), CommandError> {
        self.check_thread()?;

        let (reply, done) = bounded(1);
        self.tx
            .send(LoopMessage::Barrier(reply))
            .map_err(|_| CommandError::LoopClosed)?;
        done.recv().map_err(|_| CommandError::LoopClosed)
    }

    pub fn set_position(&self, slot: usize, azimuth: f32, radius: f32) -> Result<(), CommandError> {
        self.invoke(Command::SetPosition { slot, azimuth, radius })
    }

    pub fn set_elevation(&self, slot: usize, elevation: f32) -> Result<(), CommandError> {
        self.invoke(Command::SetElevation { slot, elevation })
    }

    pub fn set_width(&self, slot: usize, width: f32) -> Result<(), CommandError> {
        self.invoke(Command::SetWidth { slot, width })
    }

    pub fn set_bypass(&self, slot: usize, enabled: bool) -> Result<(), CommandError> {
        self.invoke(Command::SetBypass { slot, enabled })
    }

    pub fn unlink_all(&self) -> Result<(), CommandError> {
        self.invoke(Command::UnlinkAll)
    }

    // waiting on ourselves would never return
    fn check_thread(&self) -> Result<(), CommandError> {
        if self.loop_thread == Some(thread::current().id()) {
            return Err(CommandError::Reentrant);
        }
        Ok(())
    }
}
