//! Fixed-function transform state.
//!
//! Tracks the model-view and projection matrices plus everything derived
//! from them: the composite (projection ∘ model-view), its inverse for
//! CPU-side unprojection, and the W range used for W-buffered depth.
//!
//! Matrices follow glam's column-vector convention. Two named default
//! profiles reproduce the conventions of the era's toolchains; loading either
//! keeps the subsystem in "default" mode, where a depth-format change
//! re-derives the defaults. Supplying any user matrix switches to user mode
//! and stops that implicit re-derivation.

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

/// The two built-in matrix/viewport conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultProfile {
    /// Identity model-view with a projection that maps framebuffer pixels
    /// directly; depth scaled to the surface's maximum depth value.
    ScreenSpace,
    /// Direct3D-style look-at camera with a perspective projection folded
    /// into the standard viewport transform.
    D3d,
}

/// Who owns the current matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixMode {
    Default(DefaultProfile),
    User,
}

/// Parameters the default derivations depend on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultMatrixParams {
    pub framebuffer_width: f32,
    pub framebuffer_height: f32,
    /// Maximum storable depth value for the active depth format/mode.
    pub max_depth: f32,
}

/// Matrices and viewport vectors produced by a default profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedDefaults {
    pub model_view: Mat4,
    pub projection: Mat4,
    pub viewport_offset: [f32; 4],
    pub viewport_scale: [f32; 4],
}

/// Pure derivation of a default profile's matrices and viewport vectors.
pub fn derive_defaults(profile: DefaultProfile, params: &DefaultMatrixParams) -> DerivedDefaults {
    let w = params.framebuffer_width;
    let h = params.framebuffer_height;
    match profile {
        DefaultProfile::ScreenSpace => DerivedDefaults {
            model_view: Mat4::IDENTITY,
            projection: Mat4::from_cols(
                Vec4::new(w, 0.0, 0.0, 0.0),
                Vec4::new(0.0, -h / 2.0, 0.0, 0.0),
                Vec4::new(0.0, 0.0, params.max_depth, 0.0),
                Vec4::new(w, h / 2.0, 0.0, 1.0),
            ),
            viewport_offset: [w / 2.0, h / 2.0, 0.0, 0.0],
            viewport_scale: [w / 2.0, -h / 2.0, params.max_depth, 0.0],
        },
        DefaultProfile::D3d => {
            let model_view = look_at_lh(
                Vec3::new(0.0, 0.0, -7.0),
                Vec3::ZERO,
                Vec3::new(0.0, 1.0, 0.0),
            );
            let projection =
                projection_viewport(std::f32::consts::FRAC_PI_4, 1.0, 200.0, params);
            DerivedDefaults {
                model_view,
                projection,
                // Half-pixel sampling offset; depth range is carried entirely
                // by the projection matrix.
                viewport_offset: [0.531_25, 0.531_25, 0.0, 0.0],
                viewport_scale: [0.0, -0.0, 0.0, 0.0],
            }
        }
    }
}

/// Direct3D-style left-handed look-at view matrix.
pub fn look_at_lh(eye: Vec3, at: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_lh(eye, at, up)
}

/// Direct3D-style left-handed perspective projection (depth 0..1).
pub fn perspective_fov_lh(fov_y: f32, aspect: f32, z_near: f32, z_far: f32) -> Mat4 {
    Mat4::perspective_lh(fov_y, aspect, z_near, z_far)
}

/// Direct3D-style left-handed orthographic projection (depth 0..1).
pub fn orthographic_lh(
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
    z_near: f32,
    z_far: f32,
) -> Mat4 {
    Mat4::orthographic_lh(left, right, bottom, top, z_near, z_far)
}

/// The standard viewport transform: NDC to screen pixels with depth scaled
/// to the surface's maximum depth value. One builder covers all four
/// depth-format/mode variants through `max_depth`.
pub fn standard_viewport(width: f32, height: f32, max_depth: f32) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(width / 2.0, 0.0, 0.0, 0.0),
        Vec4::new(0.0, -height / 2.0, 0.0, 0.0),
        Vec4::new(0.0, 0.0, max_depth, 0.0),
        Vec4::new(width / 2.0, height / 2.0, 0.0, 1.0),
    )
}

/// Perspective projection composed with the standard viewport transform,
/// yielding the single matrix the fixed-function pipeline expects.
pub fn projection_viewport(
    fov_y: f32,
    z_near: f32,
    z_far: f32,
    params: &DefaultMatrixParams,
) -> Mat4 {
    let viewport = standard_viewport(
        params.framebuffer_width,
        params.framebuffer_height,
        params.max_depth,
    );
    let aspect = params.framebuffer_width / params.framebuffer_height;
    viewport * perspective_fov_lh(fov_y, aspect, z_near, z_far)
}

/// Tracked transform state.
#[derive(Debug, Clone)]
pub struct TransformState {
    mode: MatrixMode,
    model_view: Mat4,
    projection: Mat4,
    composite: Mat4,
    inverse_composite: Mat4,
    w_near: f32,
    w_far: f32,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            mode: MatrixMode::Default(DefaultProfile::ScreenSpace),
            model_view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            composite: Mat4::IDENTITY,
            inverse_composite: Mat4::IDENTITY,
            w_near: 0.0,
            w_far: 0.0,
        }
    }
}

impl TransformState {
    pub fn mode(&self) -> MatrixMode {
        self.mode
    }

    pub fn model_view(&self) -> &Mat4 {
        &self.model_view
    }

    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    pub fn composite(&self) -> &Mat4 {
        &self.composite
    }

    pub fn inverse_composite(&self) -> &Mat4 {
        &self.inverse_composite
    }

    pub fn w_near(&self) -> f32 {
        self.w_near
    }

    pub fn w_far(&self) -> f32 {
        self.w_far
    }

    /// Stores a caller-supplied model-view matrix and switches to user mode.
    pub fn set_model_view(&mut self, m: Mat4) {
        self.model_view = m;
        self.mode = MatrixMode::User;
        self.recompute();
    }

    /// Stores a caller-supplied projection matrix and switches to user mode.
    pub fn set_projection(&mut self, m: Mat4) {
        self.projection = m;
        self.mode = MatrixMode::User;
        self.recompute();
    }

    /// Loads a default profile's matrices, staying in default mode.
    pub fn load_defaults(&mut self, profile: DefaultProfile, defaults: &DerivedDefaults) {
        self.model_view = defaults.model_view;
        self.projection = defaults.projection;
        self.mode = MatrixMode::Default(profile);
        self.recompute();
    }

    fn recompute(&mut self) {
        self.composite = self.projection * self.model_view;
        self.inverse_composite = self.composite.inverse();

        // W-buffering range, from the projection matrix alone.
        // https://developer.download.nvidia.com/assets/gamedev/docs/W_buffering2.pdf
        let m22 = self.projection.z_axis.z;
        let m23 = self.projection.z_axis.w;
        let m32 = self.projection.w_axis.z;
        let m33 = self.projection.w_axis.w;
        self.w_near = m33 - m32 / m22 * m23;
        self.w_far = (m33 - m32) / (m22 - m23) * m23 + m33;
    }

    /// Projects a world-space point to screen space on the CPU.
    pub fn project_point(&self, world: Vec3) -> Vec3 {
        let clip = self.composite * world.extend(1.0);
        clip.xyz() / clip.w
    }

    /// Unprojects a screen-space point back to world space.
    pub fn unproject_point(&self, screen: Vec3) -> Vec3 {
        let world = self.inverse_composite * screen.extend(1.0);
        world.xyz() / world.w
    }

    /// Unprojects a screen-space point onto the plane `z = world_z`.
    pub fn unproject_point_at_z(&self, screen: Vec3, world_z: f32) -> Vec3 {
        let near = self.unproject_point(Vec3::new(screen.x, screen.y, 0.0));
        let far = self.unproject_point(Vec3::new(screen.x, screen.y, 1.0));
        let dz = far.z - near.z;
        if dz.abs() < f32::EPSILON {
            return Vec3::new(near.x, near.y, world_z);
        }
        let t = (world_z - near.z) / dz;
        let p = near + (far - near) * t;
        Vec3::new(p.x, p.y, world_z)
    }
}
