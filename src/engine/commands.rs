//! Control surface commands
//!
//! Commands are executed on the event loop thread, either directly or
//! marshaled there by [`LoopInvoker`](super::LoopInvoker). Values are clamped
//! into their domains before they reach the channel.

use serde::{Deserialize, Serialize};

use super::state::Engine;
use crate::backend::GraphBackend;
use crate::constants::*;
use crate::control::wrap360;
use crate::error::CommandError;

/// A request from the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Azimuth in degrees (wrapped), radius in percent
    SetPosition { slot: usize, azimuth: f32, radius: f32 },
    SetElevation { slot: usize, elevation: f32 },
    SetWidth { slot: usize, width: f32 },
    SetBypass { slot: usize, enabled: bool },
    /// Destroy every link into the spatializer
    UnlinkAll,
}

impl Command {
    /// Slot the command addresses, if any
    pub fn slot(&self) -> Option<usize> {
        match self {
            Command::SetPosition { slot, .. }
            | Command::SetElevation { slot, .. }
            | Command::SetWidth { slot, .. }
            | Command::SetBypass { slot, .. } => Some(*slot),
            Command::UnlinkAll => None,
        }
    }
}

impl<B: GraphBackend> Engine<B> {
    /// Run a command; a no-op while no spatializer is bound
    pub fn execute(&mut self, command: Command) -> Result<(), CommandError> {
        if let Some(slot) = command.slot() {
            let count = self.channels.len();
            if slot >= count {
                return Err(CommandError::InvalidSlot { slot, count });
            }
        }

        if self.spatializer.is_none() {
            tracing::debug!("No spatializer bound, ignoring {:?}", command);
            return Ok(());
        }

        match command {
            Command::SetPosition { slot, azimuth, radius } => {
                let channel = &mut self.channels[slot];
                channel.azimuth = wrap360(azimuth);
                channel.radius = radius.clamp(MIN_RADIUS_PCT, MAX_RADIUS_PCT);
                self.publish(slot, false);
            }
            Command::SetElevation { slot, elevation } => {
                self.channels[slot].elevation = elevation.clamp(-MAX_ELEVATION, MAX_ELEVATION);
                self.publish(slot, false);
            }
            Command::SetWidth { slot, width } => {
                let width = width.clamp(0.0, MAX_WIDTH);
                if (width - self.channels[slot].width).abs() < WIDTH_STEP {
                    return Ok(());
                }
                self.channels[slot].width = width;
                self.publish(slot, false);
            }
            Command::SetBypass { slot, enabled } => self.set_bypass(slot, enabled),
            Command::UnlinkAll => self.unlink_all_filter_inputs(),
        }

        self.mark_changed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_slot() {
        assert_eq!(Command::SetWidth { slot: 2, width: 10.0 }.slot(), Some(2));
        assert_eq!(Command::UnlinkAll.slot(), None);
    }

    #[test]
    fn test_command_json() {
        let command: Command =
            serde_json::from_str(r#"{"type":"set_bypass","slot":1,"enabled":true}"#).unwrap();
        assert_eq!(command, Command::SetBypass { slot: 1, enabled: true });
    }
}
