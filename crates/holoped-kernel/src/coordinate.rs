//! Coordinate remapping between the simulation backend and the headset world.
//!
//! The backend reports positions in a Z-up frame measured in its own units;
//! the headset world is Y-up and every position is relative to a user-placed
//! [`OriginFrame`].  The remapping is fixed and must match the backend
//! bit-for-bit:
//!
//! * position: `(x / scale, z / scale, y / scale) + origin.position`
//! * rotation: `(-q.x, q.z, -q.y, q.w)` of `q = origin.rotation * source`
//!
//! [`OriginFrame::to_backend`] goes the other way for transforms tracked on
//! the headset (e.g. the wearer's own pose) that are reported back.
//!
//! # Example
//!
//! ```rust
//! use holoped_kernel::coordinate::{OriginFrame, DEFAULT_SCALE};
//! use holoped_types::{Pose2D, Quaternion, Vec3};
//!
//! let origin = OriginFrame::new(Vec3::new(10.0, 0.0, 0.0), Quaternion::identity());
//! let pose = Pose2D::new(Vec3::new(0.0, 0.0, 12.0), 0.0);
//!
//! let world = origin.to_world(&pose, DEFAULT_SCALE);
//! assert!((world.position.x - 10.0).abs() < 1e-5);
//! assert!((world.position.y - 1.0).abs() < 1e-5);
//! assert!(world.position.z.abs() < 1e-5);
//! ```

use holoped_types::{Pose2D, Quaternion, Vec3};

/// Backend units per headset world unit.
pub const DEFAULT_SCALE: f32 = 12.0;

/// A world-space position and orientation ready to apply to a rendering
/// handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldTransform {
    pub position: Vec3,
    pub rotation: Quaternion,
}

impl WorldTransform {
    pub fn new(position: Vec3, rotation: Quaternion) -> Self {
        Self { position, rotation }
    }
}

/// The user-placed reference frame all agent positions are relative to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OriginFrame {
    pub position: Vec3,
    pub rotation: Quaternion,
}

impl Default for OriginFrame {
    fn default() -> Self {
        Self::identity()
    }
}

impl OriginFrame {
    pub fn new(position: Vec3, rotation: Quaternion) -> Self {
        Self { position, rotation }
    }

    /// Origin at the world origin with no rotation.
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Map a backend pose into the headset world.
    pub fn to_world(&self, pose: &Pose2D, scale: f32) -> WorldTransform {
        WorldTransform {
            position: remap_axes(pose.position, scale).add(self.position),
            rotation: self.reflect(pose.orientation()),
        }
    }

    /// Map a headset-world transform into the backend's convention.
    ///
    /// The position is first expressed relative to the origin (translation
    /// and rotation removed), then remapped with the same axis swap as
    /// [`to_world`][Self::to_world].
    pub fn to_backend(&self, world: &WorldTransform, scale: f32) -> WorldTransform {
        let local = self
            .rotation
            .conjugate()
            .rotate(world.position.sub(self.position));
        WorldTransform {
            position: remap_axes(local, scale),
            rotation: self.reflect(world.rotation),
        }
    }

    fn reflect(&self, source: Quaternion) -> Quaternion {
        let q = self.rotation.mul(source);
        Quaternion::new(q.w, -q.x, q.z, -q.y)
    }
}

/// Swap Y and Z and divide by `scale`.
fn remap_axes(v: Vec3, scale: f32) -> Vec3 {
    Vec3::new(v.x / scale, v.z / scale, v.y / scale)
}
