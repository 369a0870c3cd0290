use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Geometry primitives
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector (position, velocity or goal).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    /// Euclidean length.
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `yaw_rad` around the +Z axis.
    pub fn from_yaw(yaw_rad: f32) -> Self {
        let half = yaw_rad * 0.5;
        Self::new(half.cos(), 0.0, 0.0, half.sin())
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Agents
// ────────────────────────────────────────────────────────────────────────────

/// Stable identity the simulation backend assigns to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub i32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Planar pose reported by the backend: a position plus a heading around +Z.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2D {
    pub position: Vec3,
    pub heading_rad: f32,
}

impl Pose2D {
    pub fn new(position: Vec3, heading_rad: f32) -> Self {
        Self {
            position,
            heading_rad,
        }
    }

    /// The heading expressed as a rotation in the backend frame.
    pub fn orientation(&self) -> Quaternion {
        Quaternion::from_yaw(self.heading_rad)
    }
}

/// What kind of entity an agent represents.  Only pedestrians are animated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    #[default]
    Pedestrian,
    Other,
}

/// Motion policy the backend simulates the agent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Reciprocal velocity obstacles.
    #[default]
    Rvo,
    Other,
}

/// State the client keeps for one simulated agent.
///
/// Rendering handles are deliberately absent: they are owned by the frame
/// synchronizer and never touched by the ingestion path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub pose: Pose2D,
    pub velocity: Vec3,
    pub goal_position: Vec3,
    pub radius: f32,
    /// Fixed at registration; update batches do not refresh it.
    pub pref_speed: f32,
    pub agent_type: AgentType,
    pub policy: Policy,
}

impl AgentRecord {
    /// A freshly registered agent: identity and radius only, no pose yet.
    pub fn registered(id: AgentId, radius: f32) -> Self {
        Self {
            id,
            pose: Pose2D::default(),
            velocity: Vec3::zero(),
            goal_position: Vec3::zero(),
            radius,
            pref_speed: 0.0,
            agent_type: AgentType::default(),
            policy: Policy::default(),
        }
    }

    /// Current speed (magnitude of the velocity vector).
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Telemetry
// ────────────────────────────────────────────────────────────────────────────

/// One delivered telemetry update covering every known agent.
///
/// The arrays are parallel: entry `i` of every field describes the same
/// agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetryBatch {
    pub ids: Vec<AgentId>,
    pub radii: Vec<f32>,
    pub poses: Vec<Pose2D>,
    pub velocities: Vec<Vec3>,
    pub goal_positions: Vec<Vec3>,
}

impl TelemetryBatch {
    /// Number of agents the batch describes.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Check that the parallel arrays line up and that no id repeats.
    ///
    /// # Errors
    ///
    /// Returns [`HoloError::MalformedBatch`] describing the first problem found.
    pub fn validate(&self) -> Result<(), HoloError> {
        let n = self.ids.len();
        let lengths = [
            ("radii", self.radii.len()),
            ("poses", self.poses.len()),
            ("velocities", self.velocities.len()),
            ("goal_positions", self.goal_positions.len()),
        ];
        for (field, len) in lengths {
            if len != n {
                return Err(HoloError::MalformedBatch(format!(
                    "{field} has {len} entries but ids has {n}"
                )));
            }
        }

        let mut seen = HashSet::with_capacity(n);
        for id in &self.ids {
            if !seen.insert(*id) {
                return Err(HoloError::MalformedBatch(format!("duplicate id {id}")));
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Readiness signals
// ────────────────────────────────────────────────────────────────────────────

/// The three one-shot preconditions that must all hold before agents appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadinessSignal {
    /// The telemetry subscription is established.
    TelemetryConnected,
    /// The user accepted the spatial mapping.
    MappingFinished,
    /// The user placed the origin.
    OriginSet,
}

/// Point-in-time copy of the three readiness flags.
///
/// Flags only ever go from `false` to `true`, so merging snapshots with
/// [`raise`][Self::raise] never loses a signal no matter how many arrive
/// between two reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadinessSnapshot {
    pub telemetry_connected: bool,
    pub mapping_finished: bool,
    pub origin_set: bool,
}

impl ReadinessSnapshot {
    pub fn is_ready(&self) -> bool {
        self.telemetry_connected && self.mapping_finished && self.origin_set
    }

    pub fn contains(&self, signal: ReadinessSignal) -> bool {
        match signal {
            ReadinessSignal::TelemetryConnected => self.telemetry_connected,
            ReadinessSignal::MappingFinished => self.mapping_finished,
            ReadinessSignal::OriginSet => self.origin_set,
        }
    }

    /// Raise the flag for `signal`.  Returns `true` if it was not set yet.
    pub fn raise(&mut self, signal: ReadinessSignal) -> bool {
        let flag = match signal {
            ReadinessSignal::TelemetryConnected => &mut self.telemetry_connected,
            ReadinessSignal::MappingFinished => &mut self.mapping_finished,
            ReadinessSignal::OriginSet => &mut self.origin_set,
        };
        !std::mem::replace(flag, true)
    }

    /// The signals whose flags are raised.
    pub fn signals(&self) -> impl Iterator<Item = ReadinessSignal> + '_ {
        [
            ReadinessSignal::TelemetryConnected,
            ReadinessSignal::MappingFinished,
            ReadinessSignal::OriginSet,
        ]
        .into_iter()
        .filter(|signal| self.contains(*signal))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type spanning telemetry ingestion, rendering, and startup
/// configuration.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HoloError {
    #[error("Population Mismatch: expected {expected} agents, batch carries {actual}")]
    PopulationMismatch { expected: usize, actual: usize },

    #[error("Unknown Agent: {0} is not part of the fixed population")]
    UnknownAgent(AgentId),

    #[error("Malformed Batch: {0}")]
    MalformedBatch(String),

    #[error("Missing Collaborator: {0}")]
    MissingCollaborator(String),

    #[error("Render Fault on {agent}: {details}")]
    Render { agent: AgentId, details: String },

    #[error("Telemetry Feed Error: {0}")]
    Feed(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}
