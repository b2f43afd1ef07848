//! Vertex attribute packing.
//!
//! Converts f32 data into the compact formats the engine stores in vertex
//! buffers:
//! - f32 → snorm16 (signed normalized, -1.0 to 1.0)
//! - f32 → f16 (IEEE 754 binary16)
//! - tangent frame (mat3) → quaternion, optionally as snorm16x4

use cgmath::{InnerSpace, Matrix3, Quaternion, Vector3};
use half::f16;

/// Largest magnitude representable by a snorm16 component.
pub const SNORM16_MAX: f32 = 32767.0;

/// Convert f32 to a signed normalized 16-bit integer.
///
/// The input is clamped to `[-1.0, 1.0]` before rounding, so `-1.0` maps to
/// `-32767` rather than `i16::MIN`.
#[inline]
pub fn pack_snorm16(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * SNORM16_MAX).round() as i16
}

#[inline]
pub fn unpack_snorm16(value: i16) -> f32 {
    (value as f32 / SNORM16_MAX).max(-1.0)
}

#[inline]
pub fn pack_snorm16x4(values: [f32; 4]) -> [i16; 4] {
    values.map(pack_snorm16)
}

/// Convert f32 to the bit pattern of an IEEE 754 half-float.
#[inline]
pub fn pack_half(value: f32) -> u16 {
    f16::from_f32(value).to_bits()
}

#[inline]
pub fn unpack_half(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

#[inline]
pub fn pack_half2(values: [f32; 2]) -> [u16; 2] {
    values.map(pack_half)
}

#[inline]
pub fn pack_half4(values: [f32; 4]) -> [u16; 4] {
    values.map(pack_half)
}

/// Encode an orthonormal tangent frame as a quaternion.
///
/// `frame` holds the tangent, bitangent and normal as its columns. Only the
/// tangent and normal contribute to the rotation; the bitangent only decides
/// handedness. The returned quaternion always has `|w| >= 1/32767` so that
/// the sign of `w` survives snorm16 storage, and `w` is negative exactly when
/// the frame is reflected.
pub fn pack_tangent_frame(frame: Matrix3<f32>) -> Quaternion<f32> {
    let tangent = frame.x;
    let bitangent = frame.y;
    let normal = frame.z;

    let rotation = Matrix3::from_cols(tangent, normal.cross(tangent), normal);
    let mut q = Quaternion::from(rotation).normalize();
    if q.s < 0.0 {
        q = -q;
    }

    let bias = 1.0 / SNORM16_MAX;
    if q.s < bias {
        q.s = bias;
        let factor = (1.0 - bias as f64 * bias as f64).sqrt() as f32;
        q.v *= factor;
    }

    if normal.cross(tangent).dot(bitangent) < 0.0 {
        q = -q;
    }
    q
}

/// [`pack_tangent_frame`] followed by snorm16 packing in xyzw order.
pub fn pack_tangent_frame_snorm16(frame: Matrix3<f32>) -> [i16; 4] {
    quat_to_snorm16(pack_tangent_frame(frame))
}

#[inline]
pub fn quat_to_snorm16(q: Quaternion<f32>) -> [i16; 4] {
    pack_snorm16x4([q.v.x, q.v.y, q.v.z, q.s])
}

/// Rotate the +Z axis by a packed tangent quaternion, recovering the normal.
pub fn tangent_frame_normal(q: Quaternion<f32>) -> Vector3<f32> {
    q * Vector3::unit_z()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn snorm16_endpoints() {
        assert_eq!(pack_snorm16(1.0), 32767);
        assert_eq!(pack_snorm16(-1.0), -32767);
        assert_eq!(pack_snorm16(0.0), 0);
    }

    #[test]
    fn snorm16_clamps_before_rounding() {
        assert_eq!(pack_snorm16(3.5), 32767);
        assert_eq!(pack_snorm16(-42.0), -32767);
        assert_eq!(pack_snorm16(f32::INFINITY), 32767);
        assert_eq!(pack_snorm16(0.5), 16384);
    }

    #[test]
    fn snorm16_unpack_is_close() {
        for v in [-1.0, -0.25, 0.0, 0.3, 1.0] {
            assert_relative_eq!(unpack_snorm16(pack_snorm16(v)), v, epsilon = 1.0 / 32767.0);
        }
    }

    #[test]
    fn half_known_bit_patterns() {
        assert_eq!(pack_half(1.0), 0x3C00);
        assert_eq!(pack_half(-2.0), 0xC000);
        assert_eq!(pack_half(0.0), 0);
        assert_eq!(pack_half4([1.0, 0.5, 0.0, -1.0]), [0x3C00, 0x3800, 0, 0xBC00]);
        assert_eq!(unpack_half(0x3800), 0.5);
    }

    #[test]
    fn identity_frame_packs_to_identity_quaternion() {
        let frame = Matrix3::from_cols(Vector3::unit_x(), Vector3::unit_y(), Vector3::unit_z());
        let q = pack_tangent_frame(frame);
        assert_relative_eq!(q.s, 1.0, epsilon = 1e-6);
        assert_eq!(pack_tangent_frame_snorm16(frame), [0, 0, 0, 32767]);
    }

    #[test]
    fn reflected_frame_has_negative_w() {
        let frame = Matrix3::from_cols(Vector3::unit_x(), -Vector3::unit_y(), Vector3::unit_z());
        let q = pack_tangent_frame(frame);
        assert!(q.s < 0.0);
        let normal = tangent_frame_normal(q);
        assert_relative_eq!(normal.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(normal.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(normal.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn w_is_biased_away_from_zero() {
        // 180 degree rotation about Y: w would be exactly zero.
        let frame = Matrix3::from_cols(-Vector3::unit_x(), Vector3::unit_y(), -Vector3::unit_z());
        let q = pack_tangent_frame(frame);
        assert!(q.s >= 1.0 / SNORM16_MAX);
        assert_relative_eq!(q.magnitude(), 1.0, epsilon = 1e-5);
        assert!(quat_to_snorm16(q)[3] > 0);
    }
}
