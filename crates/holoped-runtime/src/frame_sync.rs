//! [`FrameSynchronizer`] – applies staged telemetry on the render thread.
//!
//! The synchronizer is the only component allowed to create or move
//! rendering handles.  Once per tick it takes a single
//! [`LifecycleSignal`] from the [`StagedAgentStore`] and acts on it:
//!
//! | Signal | Action |
//! |---|---|
//! | `CreateNeeded` | spawn a handle per agent, scale it by the agent's radius, place it, start its animation |
//! | `UpdateNeeded` | move every existing handle to the agent's latest pose |
//! | `Idle` | nothing |
//!
//! Since the signal is consumed once per tick and the tick runs on one
//! thread, creation and update can never overlap for the same agent.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut sync = FrameSynchronizer::builder()
//!     .surface(my_surface)
//!     .origin(SharedOrigin::default())
//!     .build()?;
//! let report = sync.tick(&store)?;
//! ```

use std::collections::HashMap;

use holoped_kernel::{AgentFrame, LifecycleSignal, OriginFrame, StagedAgentStore, WorldTransform};
use holoped_types::{AgentId, AgentRecord, AgentType, HoloError};
use tracing::{debug, error, info};

use crate::config::SessionConfig;
use crate::surface::{OriginProvider, RenderSurface};

// ─────────────────────────────────────────────────────────────────────────────
// TickReport
// ─────────────────────────────────────────────────────────────────────────────

/// What a single [`FrameSynchronizer::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Handles created this tick.
    pub created: usize,
    /// Handles moved this tick.
    pub updated: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.created == 0 && self.updated == 0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Fluent builder for [`FrameSynchronizer`].
///
/// Both the rendering surface and the origin provider are required;
/// [`build`][Self::build] is the startup validation point for them.
pub struct FrameSynchronizerBuilder<S, O> {
    surface: Option<S>,
    origin: Option<O>,
    config: SessionConfig,
}

impl<S: RenderSurface, O: OriginProvider> FrameSynchronizerBuilder<S, O> {
    pub fn surface(mut self, surface: S) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn origin(mut self, origin: O) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the collaborators and configuration.
    ///
    /// # Errors
    ///
    /// - [`HoloError::MissingCollaborator`] – no surface or no origin
    ///   provider was supplied.
    /// - [`HoloError::Config`] – the [`SessionConfig`] is invalid.
    pub fn build(self) -> Result<FrameSynchronizer<S, O>, HoloError> {
        let surface = self
            .surface
            .ok_or_else(|| HoloError::MissingCollaborator("render surface".to_string()))?;
        let origin = self
            .origin
            .ok_or_else(|| HoloError::MissingCollaborator("origin provider".to_string()))?;
        self.config.validate()?;

        Ok(FrameSynchronizer {
            surface,
            origin,
            config: self.config,
            handles: HashMap::new(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FrameSynchronizer
// ─────────────────────────────────────────────────────────────────────────────

/// Per-tick consumer of the [`StagedAgentStore`].
///
/// Owns every rendering handle: a handle exists for an agent if and only if
/// the agent went through the creation phase.
pub struct FrameSynchronizer<S: RenderSurface, O: OriginProvider> {
    surface: S,
    origin: O,
    config: SessionConfig,
    handles: HashMap<AgentId, S::Handle>,
}

impl<S: RenderSurface, O: OriginProvider> FrameSynchronizer<S, O> {
    pub fn builder() -> FrameSynchronizerBuilder<S, O> {
        FrameSynchronizerBuilder {
            surface: None,
            origin: None,
            config: SessionConfig::default(),
        }
    }

    /// Run one tick: take at most one lifecycle signal and act on it.
    ///
    /// # Errors
    ///
    /// Returns [`HoloError::Render`] for the first agent the surface failed to
    /// spawn.  Every other agent in the frame is still created.
    pub fn tick(&mut self, store: &StagedAgentStore) -> Result<TickReport, HoloError> {
        match store.take_lifecycle_signal() {
            LifecycleSignal::Idle => Ok(TickReport::default()),
            LifecycleSignal::CreateNeeded(frame) => self.create(&frame),
            LifecycleSignal::UpdateNeeded(frame) => Ok(self.update(&frame)),
        }
    }

    /// Animation rate for `agent`, or `None` for agents that are not
    /// animated.
    pub fn animation_rate(&self, agent: &AgentRecord) -> Option<f32> {
        match agent.agent_type {
            AgentType::Pedestrian => {
                Some(self.config.base_speed + agent.speed() * self.config.speed_multiplier)
            }
            AgentType::Other => None,
        }
    }

    /// Express a tracked world transform (e.g. the headset) in backend
    /// coordinates relative to the current origin.
    pub fn export_pose(&self, world: &WorldTransform) -> WorldTransform {
        self.origin.origin().to_backend(world, self.config.scale)
    }

    pub fn handle(&self, id: AgentId) -> Option<&S::Handle> {
        self.handles.get(&id)
    }

    /// Number of agents that currently own a rendering handle.
    pub fn created_count(&self) -> usize {
        self.handles.len()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn create(&mut self, frame: &AgentFrame) -> Result<TickReport, HoloError> {
        let origin: OriginFrame = self.origin.origin();
        let mut report = TickReport::default();
        let mut first_failure = None;

        for agent in &frame.agents {
            if self.handles.contains_key(&agent.id) {
                continue;
            }
            let mut handle = match self.surface.spawn(agent) {
                Ok(handle) => handle,
                Err(e) => {
                    error!(agent = %agent.id, error = %e, "failed to spawn agent");
                    first_failure.get_or_insert(e);
                    continue;
                }
            };
            self.surface.set_scale(&mut handle, agent.radius);
            let transform = origin.to_world(&agent.pose, self.config.scale);
            self.surface.set_transform(&mut handle, &transform);
            if let Some(rate) = self.animation_rate(agent) {
                self.surface.set_animation_rate(&mut handle, rate);
            }
            self.handles.insert(agent.id, handle);
            report.created += 1;
        }

        info!(created = report.created, sequence = frame.sequence, "agents created");
        match first_failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    fn update(&mut self, frame: &AgentFrame) -> TickReport {
        let origin = self.origin.origin();
        let mut report = TickReport::default();

        for agent in &frame.agents {
            if let Some(handle) = self.handles.get_mut(&agent.id) {
                let transform = origin.to_world(&agent.pose, self.config.scale);
                self.surface.set_transform(handle, &transform);
                report.updated += 1;
            }
        }

        debug!(updated = report.updated, sequence = frame.sequence, "agents updated");
        report
    }
}
