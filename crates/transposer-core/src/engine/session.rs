//! Scoped ownership of one engine session.

use super::StretchEngine;
use crate::error::{Error, Result};
use tracing::{debug, warn};

/// Pipeline position of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Created,
    Configured,
    Studying,
    Stretching,
    Processing,
    Draining,
    Done,
    Failed,
}

impl PipelineState {
    /// Forward transitions allowed by the two-pass protocol.
    fn can_advance_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Created, Configured)
                | (Configured, Studying)
                | (Studying, Stretching)
                | (Stretching, Processing)
                | (Processing, Draining)
                | (Draining, Done)
        )
    }
}

/// Owns an engine for one request and releases it on drop.
///
/// The guard tracks the pipeline state so misuse surfaces as
/// [`Error::Protocol`] instead of undefined engine behaviour.
pub struct EngineSession<E: StretchEngine> {
    engine: E,
    state: PipelineState,
    sample_rate: u32,
}

impl<E: StretchEngine> EngineSession<E> {
    pub fn new(engine: E, sample_rate: u32) -> Self {
        debug!(
            sample_rate,
            channels = engine.channel_count(),
            "Engine session created"
        );
        Self {
            engine,
            state: PipelineState::Created,
            sample_rate,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Move to the next pipeline state.
    pub fn advance(&mut self, next: PipelineState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(Error::Protocol(format!(
                "cannot move from {:?} to {:?}",
                self.state, next
            )));
        }
        debug!(from = ?self.state, to = ?next, "Pipeline state change");
        self.state = next;
        Ok(())
    }

    /// Mark the session failed. Reachable from any state.
    pub fn fail(&mut self) {
        self.state = PipelineState::Failed;
    }
}

impl<E: StretchEngine> Drop for EngineSession<E> {
    fn drop(&mut self) {
        match self.state {
            PipelineState::Done => debug!("Engine session released"),
            state => warn!(?state, "Engine session released before completion"),
        }
    }
}
