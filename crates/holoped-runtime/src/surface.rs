//! Collaborator seams owned by the host application.
//!
//! - [`RenderSurface`] – creates and moves the visible representation of an
//!   agent.  Only the frame synchronizer calls it, always from the render
//!   thread.
//! - [`OriginProvider`] – supplies the user-placed origin.  [`SharedOrigin`]
//!   is a ready-made thread-safe cell for placement flows running elsewhere.

use std::sync::{Arc, PoisonError, RwLock};

use holoped_kernel::{OriginFrame, WorldTransform};
use holoped_types::{AgentRecord, HoloError};

/// The host's rendering layer.
pub trait RenderSurface {
    /// Opaque per-agent rendering resource.
    type Handle;

    /// Allocate the visible representation of `agent`.
    fn spawn(&mut self, agent: &AgentRecord) -> Result<Self::Handle, HoloError>;

    /// Apply a uniform scale.
    fn set_scale(&mut self, handle: &mut Self::Handle, scale: f32);

    /// Move `handle` to `transform`.
    fn set_transform(&mut self, handle: &mut Self::Handle, transform: &WorldTransform);

    /// Set the playback rate of the walking animation.
    fn set_animation_rate(&mut self, handle: &mut Self::Handle, rate: f32);
}

/// Read-only access to the session origin.
pub trait OriginProvider {
    fn origin(&self) -> OriginFrame;
}

/// Origin cell shared between a placement flow and the render thread.
///
/// Clone it cheaply – all clones see the same origin.
#[derive(Debug, Clone, Default)]
pub struct SharedOrigin {
    inner: Arc<RwLock<OriginFrame>>,
}

impl SharedOrigin {
    pub fn new(origin: OriginFrame) -> Self {
        Self {
            inner: Arc::new(RwLock::new(origin)),
        }
    }

    /// Replace the origin, e.g. after the user drags it somewhere else.
    pub fn place(&self, origin: OriginFrame) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = origin;
    }
}

impl OriginProvider for SharedOrigin {
    fn origin(&self) -> OriginFrame {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}
