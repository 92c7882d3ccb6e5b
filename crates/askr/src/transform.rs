//! # Transforms — Local, World and Render Space
//!
//! Entities position themselves with a [`LocalTransform`] relative to their
//! parent. [`transform_system`] composes those into a [`WorldTransform`] per
//! entity, parents before children:
//!
//! ```text
//! world(root)  = local(root)
//! world(child) = world(parent) * local(child)
//! ```
//!
//! Entities that want smooth rendering also carry a [`PreviousTransform`].
//! The propagation pass snapshots the old world matrix into it, and
//! [`interpolate_transforms`] blends previous and current by the clock's
//! alpha into a [`RenderTransform`] the renderer reads.

use serde::{Deserialize, Serialize};

use crate::ecs::{Entity, World};
use crate::math::{EulerRot, Mat4, Quat, Vec3, lerp_mat4};
use crate::time::Time;

/// Position, rotation and scale relative to the parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl LocalTransform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::IDENTITY
        }
    }

    /// The 4x4 model matrix: translate * rotate * scale.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Local -Z.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Local +X.
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Local +Y.
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Rotation as XYZ Euler angles, in radians.
    pub fn euler(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }

    pub fn set_euler(&mut self, radians: Vec3) {
        self.rotation = Quat::from_euler(EulerRot::XYZ, radians.x, radians.y, radians.z);
    }

    /// Rotate so that [`forward`](Self::forward) points at `target`.
    ///
    /// Does nothing when `target` is the current position.
    pub fn look_at(&mut self, target: Vec3) {
        let Some(dir) = (target - self.position).try_normalize() else {
            return;
        };
        // look_at_rh degenerates when looking straight up or down.
        let up = if dir.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(self.position, target, up);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        self.rotation = rotation.normalize();
    }
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// World-space matrix written by [`transform_system`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldTransform {
    pub matrix: Mat4,
}

impl WorldTransform {
    pub fn position(&self) -> Vec3 {
        self.matrix.w_axis.truncate()
    }

    pub fn scale(&self) -> Vec3 {
        self.matrix.to_scale_rotation_translation().0
    }

    pub fn rotation(&self) -> Quat {
        self.matrix.to_scale_rotation_translation().1
    }
}

/// World matrix from before the latest propagation pass.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PreviousTransform {
    pub matrix: Mat4,
}

/// Interpolated matrix for rendering. Created by [`interpolate_transforms`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderTransform {
    pub matrix: Mat4,
}

/// Recompute every [`WorldTransform`] from its [`LocalTransform`] and parent.
///
/// Entities are processed in ascending hierarchy depth, so a parent's world
/// matrix is final before any child reads it. Entities without a `Hierarchy`
/// count as roots. So do children of a parent outside this pass (one with a
/// `WorldTransform` but no `LocalTransform`), whose matrix would be stale.
pub fn transform_system(world: &mut World, _dt: f64) {
    let mut order: Vec<(Entity, u32)> = world
        .view::<(&LocalTransform, &WorldTransform)>()
        .iter()
        .map(|(entity, _)| (entity, world.depth(entity)))
        .collect();
    order.sort_by_key(|&(_, depth)| depth);

    for (entity, _) in order {
        let current = world.get::<WorldTransform>(entity).matrix;
        if let Some(previous) = world.try_get_mut::<PreviousTransform>(entity) {
            previous.matrix = current;
        }

        let local = world.get::<LocalTransform>(entity).matrix();
        let parent = world.parent(entity);
        let matrix = match world.try_get::<WorldTransform>(parent) {
            Some(parent_world) if world.has::<LocalTransform>(parent) => parent_world.matrix * local,
            _ => local,
        };
        world.get_mut::<WorldTransform>(entity).matrix = matrix;
    }
}

/// Blend [`PreviousTransform`] toward [`WorldTransform`] by `alpha` into each
/// entity's [`RenderTransform`]. `alpha` is clamped to `[0, 1]`.
///
/// The blend is column-wise, which is exact for pure translation but shrinks
/// rotating bases. See [`interpolate_transforms_decomposed`] for the rigid
/// variant.
pub fn interpolate_transforms(world: &mut World, alpha: f64) {
    let t = alpha.clamp(0.0, 1.0) as f32;
    let blended: Vec<(Entity, Mat4)> = world
        .view::<(&PreviousTransform, &WorldTransform)>()
        .iter()
        .map(|(entity, (previous, current))| (entity, lerp_mat4(&previous.matrix, &current.matrix, t)))
        .collect();
    write_render_transforms(world, blended);
}

/// Like [`interpolate_transforms`] but decomposes both matrices and blends
/// position and scale linearly and rotation spherically.
pub fn interpolate_transforms_decomposed(world: &mut World, alpha: f64) {
    let t = alpha.clamp(0.0, 1.0) as f32;
    let blended: Vec<(Entity, Mat4)> = world
        .view::<(&PreviousTransform, &WorldTransform)>()
        .iter()
        .map(|(entity, (previous, current))| {
            let (s0, r0, p0) = previous.matrix.to_scale_rotation_translation();
            let (s1, r1, p1) = current.matrix.to_scale_rotation_translation();
            let matrix = Mat4::from_scale_rotation_translation(s0.lerp(s1, t), r0.slerp(r1, t), p0.lerp(p1, t));
            (entity, matrix)
        })
        .collect();
    write_render_transforms(world, blended);
}

fn write_render_transforms(world: &mut World, blended: Vec<(Entity, Mat4)>) {
    for (entity, matrix) in blended {
        match world.try_get_mut::<RenderTransform>(entity) {
            Some(render) => render.matrix = matrix,
            None => {
                world.emplace(entity, RenderTransform { matrix });
            }
        }
    }
}

/// Engine `PreRender` system: interpolates with the alpha published in [`Time`].
pub fn interpolation_system(world: &mut World, _dt: f64) {
    let alpha = world.get_resource::<Time>().map_or(1.0, Time::alpha);
    interpolate_transforms(world, alpha);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    fn spawn(world: &mut World, position: Vec3) -> Entity {
        let e = world.create();
        world.emplace(e, LocalTransform::from_position(position));
        world.emplace(e, WorldTransform::default());
        e
    }

    #[test]
    fn local_defaults_to_identity() {
        let t = LocalTransform::default();
        assert_eq!(t.matrix(), Mat4::IDENTITY);
        assert_eq!(WorldTransform::default().matrix, Mat4::IDENTITY);
        assert!(approx(t.forward(), Vec3::NEG_Z));
        assert!(approx(t.right(), Vec3::X));
        assert!(approx(t.up(), Vec3::Y));
    }

    #[test]
    fn euler_roundtrip() {
        let mut t = LocalTransform::default();
        let angles = Vec3::new(0.3, -0.5, 1.1);
        t.set_euler(angles);
        assert!(approx(t.euler(), angles));
    }

    #[test]
    fn look_at_points_forward_at_target() {
        let mut t = LocalTransform::from_position(Vec3::new(0.0, 5.0, 10.0));
        t.look_at(Vec3::ZERO);
        let expected = (Vec3::ZERO - t.position).normalize();
        assert!(approx(t.forward(), expected));

        // Straight down still yields a valid rotation.
        let mut down = LocalTransform::from_position(Vec3::new(0.0, 10.0, 0.0));
        down.look_at(Vec3::ZERO);
        assert!(approx(down.forward(), Vec3::NEG_Y));

        // Looking at itself changes nothing.
        let mut same = LocalTransform::from_position(Vec3::ONE);
        same.look_at(Vec3::ONE);
        assert_eq!(same.rotation, Quat::IDENTITY);
    }

    #[test]
    fn world_transform_decomposes() {
        let local = LocalTransform::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_z(0.5), Vec3::splat(2.0));
        let wt = WorldTransform { matrix: local.matrix() };
        assert!(approx(wt.position(), local.position));
        assert!(approx(wt.scale(), local.scale));
        assert!(wt.rotation().angle_between(local.rotation) < 1e-4);
    }

    #[test]
    fn root_world_equals_local() {
        let mut world = World::new();
        let e = spawn(&mut world, Vec3::new(10.0, 20.0, 0.0));
        transform_system(&mut world, 0.0);
        assert_eq!(
            world.get::<WorldTransform>(e).matrix,
            Mat4::from_translation(Vec3::new(10.0, 20.0, 0.0))
        );
    }

    #[test]
    fn five_level_chain_propagates_in_depth_order() {
        let mut world = World::new();
        let mut nodes = Vec::new();
        for i in 0..5 {
            let e = spawn(&mut world, Vec3::X);
            if i > 0 {
                world.set_parent(e, nodes[i - 1]).unwrap();
            }
            nodes.push(e);
        }

        transform_system(&mut world, 0.0);
        for (i, &e) in nodes.iter().enumerate() {
            let x = world.get::<WorldTransform>(e).position().x;
            assert!((x - (i + 1) as f32).abs() < 1e-5, "level {i}: x = {x}");
        }
    }

    #[test]
    fn children_processed_even_when_created_before_parent() {
        let mut world = World::new();
        let child = spawn(&mut world, Vec3::new(5.0, 0.0, 0.0));
        let parent = spawn(&mut world, Vec3::new(50.0, 0.0, 0.0));
        world.set_parent(child, parent).unwrap();

        transform_system(&mut world, 0.0);
        assert!(approx(world.get::<WorldTransform>(child).position(), Vec3::new(55.0, 0.0, 0.0)));
    }

    #[test]
    fn parent_scale_and_rotation_apply_to_child() {
        let mut world = World::new();
        let parent = world.create();
        world.emplace(
            parent,
            LocalTransform::new(Vec3::ZERO, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2), Vec3::splat(2.0)),
        );
        world.emplace(parent, WorldTransform::default());
        let child = spawn(&mut world, Vec3::X);
        world.set_parent(child, parent).unwrap();

        transform_system(&mut world, 0.0);
        assert!(approx(world.get::<WorldTransform>(child).position(), Vec3::new(0.0, 2.0, 0.0)));
    }

    #[test]
    fn parent_without_world_transform_is_ignored() {
        let mut world = World::new();
        let parent = world.create();
        world.emplace(parent, LocalTransform::from_position(Vec3::splat(100.0)));
        let child = spawn(&mut world, Vec3::X);
        world.set_parent(child, parent).unwrap();

        transform_system(&mut world, 0.0);
        assert!(approx(world.get::<WorldTransform>(child).position(), Vec3::X));
    }

    #[test]
    fn parent_outside_the_pass_is_not_composed() {
        let mut world = World::new();
        let parent = world.create();
        world.emplace(parent, WorldTransform {
            matrix: Mat4::from_translation(Vec3::splat(100.0)),
        });
        let child = spawn(&mut world, Vec3::X);
        world.set_parent(child, parent).unwrap();

        transform_system(&mut world, 0.0);
        assert!(approx(world.get::<WorldTransform>(child).position(), Vec3::X));
        // The parent's matrix was never recomputed.
        assert!(approx(world.get::<WorldTransform>(parent).position(), Vec3::splat(100.0)));
    }

    #[test]
    fn previous_transform_captures_last_frame() {
        let mut world = World::new();
        let e = spawn(&mut world, Vec3::ZERO);
        world.emplace(e, PreviousTransform::default());
        transform_system(&mut world, 0.0);

        world.get_mut::<LocalTransform>(e).position = Vec3::new(3.0, 0.0, 0.0);
        transform_system(&mut world, 0.0);

        assert_eq!(world.get::<PreviousTransform>(e).matrix, Mat4::IDENTITY);
        assert!(approx(world.get::<WorldTransform>(e).position(), Vec3::new(3.0, 0.0, 0.0)));
    }

    fn moving_entity(world: &mut World) -> Entity {
        let e = world.create();
        world.emplace(e, PreviousTransform { matrix: Mat4::from_translation(Vec3::ZERO) });
        world.emplace(e, WorldTransform { matrix: Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)) });
        e
    }

    #[test]
    fn interpolation_endpoints() {
        let mut world = World::new();
        let e = moving_entity(&mut world);

        interpolate_transforms(&mut world, 0.0);
        assert_eq!(world.get::<RenderTransform>(e).matrix, world.get::<PreviousTransform>(e).matrix);

        interpolate_transforms(&mut world, 1.0);
        assert_eq!(world.get::<RenderTransform>(e).matrix, world.get::<WorldTransform>(e).matrix);

        interpolate_transforms(&mut world, 0.25);
        assert!(approx(world.get::<RenderTransform>(e).matrix.w_axis.truncate(), Vec3::new(2.5, 0.0, 0.0)));
    }

    #[test]
    fn interpolation_clamps_alpha_and_leaves_world_alone() {
        let mut world = World::new();
        let e = moving_entity(&mut world);
        let before = *world.get::<WorldTransform>(e);

        interpolate_transforms(&mut world, 7.0);
        assert_eq!(world.get::<RenderTransform>(e).matrix, before.matrix);
        interpolate_transforms(&mut world, -3.0);
        assert_eq!(world.get::<RenderTransform>(e).matrix, world.get::<PreviousTransform>(e).matrix);
        assert_eq!(*world.get::<WorldTransform>(e), before);
    }

    #[test]
    fn interpolation_skips_entities_without_previous() {
        let mut world = World::new();
        let e = spawn(&mut world, Vec3::ONE);
        interpolate_transforms(&mut world, 0.5);
        assert!(!world.has::<RenderTransform>(e));
    }

    #[test]
    fn naive_and_decomposed_diverge_under_rotation() {
        let mut world = World::new();
        let e = world.create();
        world.emplace(e, PreviousTransform { matrix: Mat4::IDENTITY });
        world.emplace(
            e,
            WorldTransform { matrix: Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2) },
        );

        interpolate_transforms(&mut world, 0.5);
        let naive = world.get::<RenderTransform>(e).matrix;
        // Column blend of two unit bases 90° apart has length sqrt(0.5).
        assert!((naive.x_axis.truncate().length() - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);

        interpolate_transforms_decomposed(&mut world, 0.5);
        let rigid = world.get::<RenderTransform>(e).matrix;
        assert!((rigid.x_axis.truncate().length() - 1.0).abs() < 1e-5);
        let (_, rotation, _) = rigid.to_scale_rotation_translation();
        assert!((rotation.to_axis_angle().1 - std::f32::consts::FRAC_PI_4).abs() < 1e-4);
    }

    #[test]
    fn interpolation_system_reads_time_alpha() {
        let mut world = World::new();
        let e = moving_entity(&mut world);
        let mut time = Time::new(1.0 / 60.0);
        time.set_alpha(0.5);
        world.insert_resource(time);

        interpolation_system(&mut world, 0.0);
        assert!(approx(world.get::<RenderTransform>(e).matrix.w_axis.truncate(), Vec3::new(5.0, 0.0, 0.0)));
    }
}
