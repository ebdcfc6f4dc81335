//! Startup sync barrier
//!
//! The initial registry burst is followed by a sync request. Its completion
//! means every pre-existing object has been reported, which is when stale
//! spatializer links left over from a previous run get cleaned up. The
//! cleanup fires at most once per process.

use crate::backend::SyncToken;

#[derive(Debug, Default)]
pub struct SyncCoordinator {
    pending: Option<SyncToken>,
    done: bool,
}

impl SyncCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the token of an outstanding sync request
    pub fn begin(&mut self, token: SyncToken) {
        self.pending = Some(token);
    }

    /// True exactly once: for the first completion matching the pending token
    pub fn complete(&mut self, token: SyncToken) -> bool {
        if self.done || self.pending != Some(token) {
            return false;
        }
        self.pending = None;
        self.done = true;
        true
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn pending(&self) -> Option<SyncToken> {
        self.pending
    }
}
