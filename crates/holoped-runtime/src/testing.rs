//! Shared fixtures for the runtime's unit tests.

use std::sync::Arc;

use holoped_kernel::{ReadinessGate, StagedAgentStore, WorldTransform};
use holoped_types::{AgentId, AgentRecord, HoloError, Pose2D, TelemetryBatch, Vec3};

use crate::surface::RenderSurface;

/// Everything the surface was told about one agent.
#[derive(Debug, Clone, Default)]
pub struct RecordedHandle {
    pub scale: f32,
    pub position: Vec3,
    pub animation_rate: Option<f32>,
    pub moves: usize,
}

/// Surface that records calls instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub spawned: usize,
    fail_on: Option<AgentId>,
}

impl RecordingSurface {
    pub fn failing_on(id: AgentId) -> Self {
        Self {
            spawned: 0,
            fail_on: Some(id),
        }
    }
}

impl RenderSurface for RecordingSurface {
    type Handle = RecordedHandle;

    fn spawn(&mut self, agent: &AgentRecord) -> Result<RecordedHandle, HoloError> {
        if self.fail_on == Some(agent.id) {
            return Err(HoloError::Render {
                agent: agent.id,
                details: "prefab missing".to_string(),
            });
        }
        self.spawned += 1;
        Ok(RecordedHandle::default())
    }

    fn set_scale(&mut self, handle: &mut RecordedHandle, scale: f32) {
        handle.scale = scale;
    }

    fn set_transform(&mut self, handle: &mut RecordedHandle, transform: &WorldTransform) {
        handle.position = transform.position;
        handle.moves += 1;
    }

    fn set_animation_rate(&mut self, handle: &mut RecordedHandle, rate: f32) {
        handle.animation_rate = Some(rate);
    }
}

/// A store whose gate is already open.
pub fn ready_store() -> StagedAgentStore {
    let gate = Arc::new(ReadinessGate::new());
    gate.set_telemetry_connected();
    gate.set_mapping_finished();
    gate.set_origin_set();
    StagedAgentStore::new(gate)
}

/// A batch placing every agent at backend `(x, 0)` moving at `x` along X.
pub fn tagged_batch(ids: &[i32], x: f32) -> TelemetryBatch {
    TelemetryBatch {
        ids: ids.iter().copied().map(AgentId).collect(),
        radii: vec![0.3; ids.len()],
        poses: vec![Pose2D::new(Vec3::new(x, 0.0, 0.0), 0.0); ids.len()],
        velocities: vec![Vec3::new(x, 0.0, 0.0); ids.len()],
        goal_positions: vec![Vec3::zero(); ids.len()],
    }
}
