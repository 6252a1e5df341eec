use crate::error::TfResult;
use crate::time::TfTime;
use crate::{frame_id, FrameIdString};
use bincode::de::Decoder;
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use compact_str::CompactString;
use glam::{DMat4, DQuat, DVec3, Vec3};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Quaternions with a norm below this cannot be renormalized and are rejected.
const MIN_QUAT_NORM: f64 = 1e-9;

/// A rigid transform: translation plus unit quaternion rotation.
///
/// Used as the pose of a child frame expressed in its parent frame: composing
/// `A * B` chains a parent-of-B relation `A` on top of `B`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: DVec3,
    pub rotation: DQuat,
}

impl Transform {
    pub const IDENTITY: Self = Transform {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    pub fn new(translation: DVec3, rotation: DQuat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Builds a transform from raw translation and `(x, y, z, w)` quaternion parts.
    pub fn from_parts(translation: [f64; 3], rotation: [f64; 4]) -> Self {
        Self {
            translation: DVec3::from_array(translation),
            rotation: DQuat::from_xyzw(rotation[0], rotation[1], rotation[2], rotation[3]),
        }
    }

    /// Returns the transform with its rotation scaled back to unit length, or
    /// `None` when the quaternion norm is too close to zero to normalize.
    pub fn renormalized(self) -> Option<Self> {
        let norm = self.rotation.length();
        if norm < MIN_QUAT_NORM {
            return None;
        }
        Some(Self {
            translation: self.translation,
            rotation: self.rotation / norm,
        })
    }

    /// The algebraic inverse: `t' = -(q⁻¹ · t)`, `q' = q⁻¹`.
    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.conjugate();
        Self {
            translation: -(inv_rotation * self.translation),
            rotation: inv_rotation,
        }
    }

    /// Interpolates between two transforms: linear for the translation,
    /// spherical (SLERP) for the rotation. `s` is clamped to `[0, 1]`.
    pub fn interpolate(&self, other: &Self, s: f64) -> Self {
        let s = s.clamp(0.0, 1.0);
        Self {
            translation: self.translation.lerp(other.translation, s),
            rotation: self.rotation.slerp(other.rotation, s),
        }
    }

    /// Applies the transform to a point: the point is translated first, then
    /// the translated point is rotated by the unit quaternion.
    pub fn apply_to_point(&self, point: DVec3) -> DVec3 {
        self.rotation * (point + self.translation)
    }

    /// Single-precision variant of [`Transform::apply_to_point`]. The result is
    /// computed in f64 and then narrowed to f32, a lossy step that matches the
    /// precision visualization and fast paths actually need.
    pub fn apply_to_point32(&self, point: DVec3) -> Vec3 {
        self.apply_to_point(point).as_vec3()
    }

    /// The transform as a row-major 4x4 homogeneous matrix.
    pub fn to_matrix(&self) -> [[f64; 4]; 4] {
        DMat4::from_rotation_translation(self.rotation, self.translation)
            .transpose()
            .to_cols_array_2d()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            translation: self.translation + self.rotation * rhs.translation,
            rotation: self.rotation * rhs.rotation,
        }
    }
}

impl Encode for Transform {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.translation.to_array().encode(encoder)?;
        self.rotation.to_array().encode(encoder)?;
        Ok(())
    }
}

impl Decode for Transform {
    fn decode<D: Decoder>(decoder: &mut D) -> Result<Self, DecodeError> {
        let translation = <[f64; 3]>::decode(decoder)?;
        let rotation = <[f64; 4]>::decode(decoder)?;
        Ok(Self::from_parts(translation, rotation))
    }
}

/// Builds the rotation taking unit vector `start` to unit vector `end` about
/// the axis orthogonal to both.
///
/// Uses the half-angle form `q = normalize(1 + start·end, start × end)`, which
/// stays well conditioned near 0°, instead of recovering the angle through
/// `asin` of the cross-product magnitude. The anti-parallel case has no unique
/// axis and is special-cased to a half turn about an arbitrary orthogonal one.
/// Degenerate (near-zero) inputs yield the identity rotation.
pub fn rotation_between(start: DVec3, end: DVec3) -> DQuat {
    let start_len = start.length();
    let end_len = end.length();
    if start_len < MIN_QUAT_NORM || end_len < MIN_QUAT_NORM {
        return DQuat::IDENTITY;
    }
    let start = start / start_len;
    let end = end / end_len;

    let dot = start.dot(end);
    if dot < -1.0 + 1e-9 {
        return DQuat::from_axis_angle(start.any_orthonormal_vector(), std::f64::consts::PI);
    }

    let cross = start.cross(end);
    DQuat::from_xyzw(cross.x, cross.y, cross.z, 1.0 + dot).normalize()
}

/// A timestamped transform reported for one parent/child edge.
///
/// Records are immutable once appended to a history; a correction is a new
/// record at a newer timestamp, never a mutation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StampedTransform {
    pub transform: Transform,
    pub stamp: TfTime,
    pub parent_frame: FrameIdString,
    pub child_frame: FrameIdString,
    /// Provenance of the report. Diagnostic only, never consulted by lookups.
    pub authority: CompactString,
    pub is_static: bool,
}

impl StampedTransform {
    pub fn new(
        parent_frame: &str,
        child_frame: &str,
        stamp: TfTime,
        transform: Transform,
        authority: &str,
        is_static: bool,
    ) -> TfResult<Self> {
        Ok(Self {
            transform,
            stamp,
            parent_frame: frame_id(parent_frame)?,
            child_frame: frame_id(child_frame)?,
            authority: CompactString::from(authority),
            is_static,
        })
    }
}

impl Encode for StampedTransform {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.transform.encode(encoder)?;
        self.stamp.encode(encoder)?;
        self.parent_frame.as_str().encode(encoder)?;
        self.child_frame.as_str().encode(encoder)?;
        self.authority.as_str().encode(encoder)?;
        self.is_static.encode(encoder)?;
        Ok(())
    }
}

impl Decode for StampedTransform {
    fn decode<D: Decoder>(decoder: &mut D) -> Result<Self, DecodeError> {
        let transform = Transform::decode(decoder)?;
        let stamp = TfTime::decode(decoder)?;
        let parent_frame = String::decode(decoder)?;
        let child_frame = String::decode(decoder)?;
        let authority = String::decode(decoder)?;
        let is_static = bool::decode(decoder)?;
        let parent_frame = FrameIdString::from(&parent_frame)
            .map_err(|_| DecodeError::OtherString("parent frame name too long".to_string()))?;
        let child_frame = FrameIdString::from(&child_frame)
            .map_err(|_| DecodeError::OtherString("child frame name too long".to_string()))?;
        Ok(Self {
            transform,
            stamp,
            parent_frame,
            child_frame,
            authority: CompactString::from(authority),
            is_static,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn assert_vec_eq(actual: DVec3, expected: DVec3) {
        assert_relative_eq!(actual.x, expected.x, epsilon = 1e-9);
        assert_relative_eq!(actual.y, expected.y, epsilon = 1e-9);
        assert_relative_eq!(actual.z, expected.z, epsilon = 1e-9);
    }

    #[test]
    fn test_compose_translation_through_rotation() {
        // A rotates 90° about Z, B translates along its own X.
        let a = Transform::new(DVec3::ZERO, DQuat::from_rotation_z(FRAC_PI_2));
        let b = Transform::new(DVec3::new(1.0, 0.0, 0.0), DQuat::IDENTITY);
        let ab = a * b;
        assert_vec_eq(ab.translation, DVec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = Transform::new(
            DVec3::new(1.0, -2.0, 3.0),
            DQuat::from_axis_angle(DVec3::new(1.0, 1.0, 0.0).normalize(), 0.7),
        );
        let round_trip = t * t.inverse();
        assert_vec_eq(round_trip.translation, DVec3::ZERO);
        assert_relative_eq!(round_trip.rotation.w.abs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_inverse_matches_conjugate_form() {
        let q = DQuat::from_rotation_z(FRAC_PI_2);
        let t = Transform::new(DVec3::new(2.0, 0.0, 0.0), q);
        let inv = t.inverse();
        assert_eq!(inv.rotation, q.conjugate());
        assert_vec_eq(inv.translation, -(q.conjugate() * DVec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_apply_to_point_translates_then_rotates() {
        let t = Transform::new(DVec3::new(1.0, 0.0, 0.0), DQuat::from_rotation_z(FRAC_PI_2));
        // (1,0,0) + (1,0,0) = (2,0,0), rotated 90° about Z -> (0,2,0)
        let out = t.apply_to_point(DVec3::new(1.0, 0.0, 0.0));
        assert_vec_eq(out, DVec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_apply_to_point32_narrows() {
        let t = Transform::new(DVec3::new(0.1, 0.2, 0.3), DQuat::IDENTITY);
        let out = t.apply_to_point32(DVec3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(out.x, 1.1_f32, epsilon = 1e-6);
        assert_relative_eq!(out.y, 1.2_f32, epsilon = 1e-6);
        assert_relative_eq!(out.z, 1.3_f32, epsilon = 1e-6);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let a = Transform::new(DVec3::ZERO, DQuat::IDENTITY);
        let b = Transform::new(DVec3::new(0.0, 0.0, 2.0), DQuat::from_rotation_z(FRAC_PI_2));
        let mid = a.interpolate(&b, 0.5);
        assert_vec_eq(mid.translation, DVec3::new(0.0, 0.0, 1.0));
        let expected = DQuat::from_rotation_z(FRAC_PI_4);
        assert_relative_eq!(mid.rotation.dot(expected).abs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_renormalized() {
        let t = Transform::from_parts([0.0; 3], [0.0, 0.0, 0.0, 2.0]);
        let n = t.renormalized().unwrap();
        assert_relative_eq!(n.rotation.length(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(n.rotation.w, 1.0, epsilon = 1e-12);

        let degenerate = Transform::from_parts([0.0; 3], [0.0, 0.0, 0.0, 0.0]);
        assert!(degenerate.renormalized().is_none());
    }

    #[test]
    fn test_to_matrix_row_major() {
        let t = Transform::new(DVec3::new(4.0, 5.0, 6.0), DQuat::from_rotation_z(FRAC_PI_2));
        let m = t.to_matrix();
        // translation lives in the last column of each row
        assert_relative_eq!(m[0][3], 4.0, epsilon = 1e-9);
        assert_relative_eq!(m[1][3], 5.0, epsilon = 1e-9);
        assert_relative_eq!(m[2][3], 6.0, epsilon = 1e-9);
        // 90° about Z: first row is (0, -1, 0)
        assert_relative_eq!(m[0][0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(m[0][1], -1.0, epsilon = 1e-9);
        assert_relative_eq!(m[1][0], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_between_maps_start_to_end() {
        let start = DVec3::new(1.0, 0.0, 0.0);
        let end = DVec3::new(0.0, 1.0, 0.0);
        let q = rotation_between(start, end);
        assert_vec_eq(q * start, end);

        // non-axis-aligned, non-unit inputs
        let start = DVec3::new(1.0, 2.0, -0.5);
        let end = DVec3::new(-0.3, 0.4, 2.0);
        let q = rotation_between(start, end);
        assert_vec_eq(q * start.normalize(), end.normalize());
    }

    #[test]
    fn test_rotation_between_parallel() {
        let v = DVec3::new(0.0, 0.0, 1.0);
        let q = rotation_between(v, v);
        assert_vec_eq(q * v, v);
        assert_relative_eq!(q.dot(DQuat::IDENTITY).abs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_between_anti_parallel() {
        let start = DVec3::new(1.0, 0.0, 0.0);
        let end = DVec3::new(-1.0, 0.0, 0.0);
        let q = rotation_between(start, end);
        assert_vec_eq(q * start, end);
        // a half turn
        let (_, angle) = q.to_axis_angle();
        assert_relative_eq!(angle, PI, epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_between_degenerate_input() {
        assert_eq!(
            rotation_between(DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0)),
            DQuat::IDENTITY
        );
    }

    #[test]
    fn test_stamped_transform_rejects_bad_names() {
        assert!(StampedTransform::new(
            "",
            "child",
            TfTime::ZERO,
            Transform::IDENTITY,
            "test",
            false
        )
        .is_err());
        let long = "f".repeat(65);
        assert!(StampedTransform::new(
            &long,
            "child",
            TfTime::ZERO,
            Transform::IDENTITY,
            "test",
            false
        )
        .is_err());
    }

    #[test]
    fn test_bincode_round_trip() {
        let tf = StampedTransform::new(
            "world",
            "robot",
            TfTime::from_sec_nanos(3, 500_000_000),
            Transform::new(DVec3::new(1.0, 2.0, 3.0), DQuat::from_rotation_z(0.25)),
            "odometry",
            true,
        )
        .unwrap();
        let bytes = bincode::encode_to_vec(&tf, bincode::config::standard()).unwrap();
        let (decoded, _): (StampedTransform, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard()).unwrap();
        assert_eq!(decoded.stamp, tf.stamp);
        assert_eq!(decoded.parent_frame, tf.parent_frame);
        assert_eq!(decoded.child_frame, tf.child_frame);
        assert_eq!(decoded.authority, tf.authority);
        assert_eq!(decoded.is_static, tf.is_static);
        assert_eq!(decoded.transform, tf.transform);
    }
}
