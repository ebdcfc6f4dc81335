//! Filter input arena
//!
//! The spatializer exposes `2 * slots` input ports addressed by their
//! `port.id`. Index parity is load-bearing (even = left, odd = right), so the
//! table is a fixed indexed array rather than a map.

use crate::registry::ObjectId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FilterInput {
    /// Global id of the spatializer's input port, once discovered
    port: Option<ObjectId>,
    /// Claimed by an accepted (or pending) link
    occupied: bool,
}

/// Discovered ports and occupancy of the spatializer's inputs
pub struct FilterInputs {
    inputs: Box<[FilterInput]>,
}

impl FilterInputs {
    pub fn new(count: usize) -> Self {
        Self {
            inputs: vec![FilterInput::default(); count].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Record the port backing input `index`; out-of-range indices are ignored
    pub fn set_port(&mut self, index: usize, port: ObjectId) -> bool {
        match self.inputs.get_mut(index) {
            Some(input) => {
                input.port = Some(port);
                true
            }
            None => false,
        }
    }

    pub fn port(&self, index: usize) -> Option<ObjectId> {
        self.inputs.get(index).and_then(|input| input.port)
    }

    /// Forget a port by its global id
    pub fn forget_port(&mut self, port: ObjectId) -> Option<usize> {
        let index = self.inputs.iter().position(|input| input.port == Some(port))?;
        self.inputs[index].port = None;
        Some(index)
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        self.inputs.get(index).is_some_and(|input| input.occupied)
    }

    pub fn occupy(&mut self, index: usize) {
        if let Some(input) = self.inputs.get_mut(index) {
            input.occupied = true;
        }
    }

    pub fn release(&mut self, index: usize) {
        if let Some(input) = self.inputs.get_mut(index) {
            input.occupied = false;
        }
    }

    /// Either input of `slot` occupied
    pub fn slot_connected(&self, slot: usize) -> bool {
        self.is_occupied(slot * 2) || self.is_occupied(slot * 2 + 1)
    }

    pub fn release_all(&mut self) {
        self.inputs.iter_mut().for_each(|input| input.occupied = false);
    }

    /// Forget ports and occupancy
    pub fn reset(&mut self) {
        self.inputs.iter_mut().for_each(|input| *input = FilterInput::default());
    }

    /// Occupancy per input, in index order
    pub fn occupancy(&self) -> Vec<bool> {
        self.inputs.iter().map(|input| input.occupied).collect()
    }
}
