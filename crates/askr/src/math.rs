//! Math types and glam re-exports.
//!
//! We re-export [glam](https://docs.rs/glam) types so users don't need to
//! depend on it directly.

pub use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, Vec4};

/// Blend two matrices column by column: `a * (1 - t) + b * t`.
///
/// Exact at the endpoints. Not a rigid interpolation: blending two rotations
/// shrinks the basis vectors in between.
pub fn lerp_mat4(a: &Mat4, b: &Mat4, t: f32) -> Mat4 {
    let s = 1.0 - t;
    Mat4::from_cols(
        a.x_axis * s + b.x_axis * t,
        a.y_axis * s + b.y_axis * t,
        a.z_axis * s + b.z_axis * t,
        a.w_axis * s + b.w_axis * t,
    )
}
