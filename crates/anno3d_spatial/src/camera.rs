//! Perspective and orthographic cameras.
//!
//! Conventions follow OpenGL: right handed, the camera looks down its local
//! -Z axis and normalized device coordinates span [-1, 1] on every axis with
//! +Y pointing up.

use glam::{Mat4, Vec2, Vec3};

use crate::Ray;

/// Pixel size of the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// Convert a pixel position (origin top left, +y down) to NDC.
    pub fn to_ndc(&self, position: Vec2) -> Vec2 {
        let width = self.width.max(1.0);
        let height = self.height.max(1.0);
        Vec2::new(
            position.x / width * 2.0 - 1.0,
            -(position.y / height * 2.0 - 1.0),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub zoom: f32,
    /// Camera-to-world transform.
    pub world: Mat4,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            fov: 50.0,
            aspect: 1.0,
            near: 0.1,
            far: 2000.0,
            zoom: 1.0,
            world: Mat4::IDENTITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrthographicCamera {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
    pub zoom: f32,
    /// Camera-to-world transform.
    pub world: Mat4,
}

impl Default for OrthographicCamera {
    fn default() -> Self {
        Self {
            left: -1.0,
            right: 1.0,
            top: 1.0,
            bottom: -1.0,
            near: 0.1,
            far: 2000.0,
            zoom: 1.0,
            world: Mat4::IDENTITY,
        }
    }
}

/// The camera used for projecting geometry into screen space.
#[derive(Debug, Clone, PartialEq)]
pub enum Camera {
    Perspective(PerspectiveCamera),
    Orthographic(OrthographicCamera),
}

impl Camera {
    /// Perspective camera at `eye` looking at `target`.
    pub fn perspective_looking_at(fov: f32, aspect: f32, eye: Vec3, target: Vec3) -> Self {
        Self::Perspective(PerspectiveCamera {
            fov,
            aspect,
            world: Mat4::look_at_rh(eye, target, Vec3::Y).inverse(),
            ..PerspectiveCamera::default()
        })
    }

    /// Orthographic camera at `eye` looking at `target`, spanning `half_height`
    /// above and below the view axis.
    pub fn orthographic_looking_at(half_height: f32, aspect: f32, eye: Vec3, target: Vec3) -> Self {
        Self::Orthographic(OrthographicCamera {
            left: -half_height * aspect,
            right: half_height * aspect,
            top: half_height,
            bottom: -half_height,
            world: Mat4::look_at_rh(eye, target, Vec3::Y).inverse(),
            ..OrthographicCamera::default()
        })
    }

    pub fn is_perspective(&self) -> bool {
        matches!(self, Self::Perspective(_))
    }

    pub fn world_matrix(&self) -> Mat4 {
        match self {
            Self::Perspective(camera) => camera.world,
            Self::Orthographic(camera) => camera.world,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.world_matrix().w_axis.truncate()
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.world_matrix().inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        match self {
            Self::Perspective(c) => {
                let half = (c.fov.to_radians() * 0.5).tan() / c.zoom;
                Mat4::perspective_rh_gl(2.0 * half.atan(), c.aspect, c.near, c.far)
            }
            Self::Orthographic(c) => {
                let dx = (c.right - c.left) / (2.0 * c.zoom);
                let dy = (c.top - c.bottom) / (2.0 * c.zoom);
                let cx = (c.right + c.left) / 2.0;
                let cy = (c.top + c.bottom) / 2.0;
                Mat4::orthographic_rh_gl(cx - dx, cx + dx, cy - dy, cy + dy, c.near, c.far)
            }
        }
    }

    /// World to clip transform.
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Half the visible image height in world units at `distance`.
    ///
    /// Zoom is ignored for perspective cameras and the distance is ignored
    /// for orthographic ones.
    pub fn height_at(&self, distance: f32) -> f32 {
        match self {
            Self::Perspective(c) => (c.fov.to_radians() / 2.0).tan() * distance,
            Self::Orthographic(c) => (c.bottom - c.top).abs() / 2.0 / c.zoom,
        }
    }

    /// Half the visible image width in world units at `distance`.
    pub fn width_at(&self, distance: f32) -> f32 {
        match self {
            Self::Perspective(c) => self.height_at(distance) * c.aspect,
            Self::Orthographic(c) => (c.right - c.left).abs() / 2.0 / c.zoom,
        }
    }

    fn unproject(&self, ndc: Vec3) -> Vec3 {
        (self.world_matrix() * self.projection_matrix().inverse()).project_point3(ndc)
    }

    /// World space ray through the NDC position.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        match self {
            Self::Perspective(_) => {
                let origin = self.position();
                let through = self.unproject(ndc.extend(0.5));
                Ray::new(origin, through - origin)
            }
            Self::Orthographic(c) => {
                let z = (c.near + c.far) / (c.near - c.far);
                let origin = self.unproject(ndc.extend(z));
                let direction = c.world.transform_vector3(Vec3::NEG_Z);
                Ray::new(origin, direction)
            }
        }
    }
}
