use glam::{Mat4, Vec3, Vec4};
use thiserror::Error;

/// How a camera maps view space to clip space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Projection {
    /// Objects farther from the camera appear smaller. `fov_y` is in radians.
    Perspective { fov_y: f32, aspect: f32 },
    /// Parallel projection of a box `2 * half_width` wide and
    /// `2 * half_height` tall centered on the view axis.
    Orthographic { half_width: f32, half_height: f32 },
}

/// Camera assumes a right-handed system with the +Z axis going _out_ of the
/// screen rather than in, matching the rest of the renderer.
///
/// The following transforms points from local space to clip space:
///  `V_clip = M_projection * M_view * M_model * M_local`
///
/// WebGPU clip space has depth in [0, 1], which the frustum planes extracted by
/// `frustum()` also assume.
#[derive(Clone, Debug)]
pub struct Camera {
    /// The position of the camera in world space.
    eye: Vec3,
    /// The target position the camera should look at.
    target: Vec3,
    /// The camera's up direction.
    up: Vec3,
    /// A world space direction vector indicating which direction is considered
    /// straight up.
    world_up: Vec3,
    projection: Projection,
    /// Fragments closer than `z_near` are clipped.
    z_near: f32,
    /// Fragments further than `z_far` are clipped.
    z_far: f32,
    viewport_width: f32,
    viewport_height: f32,
}

impl Camera {
    /// Create a perspective camera at `eye` looking at `target`.
    ///
    /// The aspect ratio is set to one if either viewport dimension is zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y: f32,
        z_near: f32,
        z_far: f32,
        viewport_width: u32,
        viewport_height: u32,
    ) -> Self {
        let aspect = if viewport_width > 0 && viewport_height > 0 {
            viewport_width as f32 / viewport_height as f32
        } else {
            1.0
        };

        let mut camera = Self {
            eye,
            target,
            up: up.normalize_or_zero(),
            world_up: up.normalize_or_zero(),
            projection: Projection::Perspective { fov_y, aspect },
            z_near,
            z_far,
            viewport_width: viewport_width as f32,
            viewport_height: viewport_height as f32,
        };

        camera.reorient(eye, target);
        camera
    }

    /// Create an unconfigured camera looking down -Z from the origin. Callers
    /// are expected to follow up with `look_at` and a projection setter.
    pub fn unconfigured() -> Self {
        Self::new(
            Vec3::ZERO,
            Vec3::NEG_Z,
            Vec3::Y,
            std::f32::consts::FRAC_PI_2,
            0.1,
            100.0,
            1,
            1,
        )
    }

    /// Place the camera at `eye` looking at `target`, using `up` as the new
    /// world up axis.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.world_up = up.normalize_or_zero();
        self.reorient(eye, target);
    }

    /// Reorient the camera to be located at `eye` and look at `target`. Both
    /// points are should be in world space.
    ///
    /// Calling `reorient` will rebuild the camera's local coordinate system
    /// using the Gram-Schimdt process.
    pub fn reorient(&mut self, new_eye: Vec3, new_target: Vec3) {
        self.eye = new_eye;
        self.target = new_target;

        // NOTE: This direction goes from target to eye because by convention
        // the camera looks down its own negative Z axis.
        let new_direction = (self.eye - self.target).normalize_or_zero();
        let new_right = Vec3::cross(self.world_up, new_direction).normalize_or_zero();
        self.up = Vec3::cross(new_direction, new_right);
    }

    /// Switch to a perspective projection. `fov_y` is in radians.
    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, z_near: f32, z_far: f32) {
        self.projection = Projection::Perspective { fov_y, aspect };
        self.z_near = z_near;
        self.z_far = z_far;
    }

    /// Switch to an orthographic projection centered on the view axis.
    pub fn set_orthographic(&mut self, half_width: f32, half_height: f32, z_near: f32, z_far: f32) {
        self.projection = Projection::Orthographic {
            half_width,
            half_height,
        };
        self.z_near = z_near;
        self.z_far = z_far;
    }

    /// Get the camera's view matrix.
    ///
    /// A view matrix transforms coordinates from world space to view space,
    /// with the eye located at (0, 0, 0) and looking down the -Z axis.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Get the camera's projection matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y, aspect } => {
                Mat4::perspective_rh(fov_y, aspect, self.z_near, self.z_far)
            }
            Projection::Orthographic {
                half_width,
                half_height,
            } => Mat4::orthographic_rh(
                -half_width,
                half_width,
                -half_height,
                half_height,
                self.z_near,
                self.z_far,
            ),
        }
    }

    /// Get the camera's view projection matrix. The view projection matrix will
    /// transform points from world space to clip space.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get the planes bounding everything this camera can see.
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection_matrix())
    }

    /// Check if a box given by its world space `center` and `half_size` is at
    /// least partially inside the view frustum.
    pub fn test_box_in_frustum(&self, center: Vec3, half_size: Vec3) -> bool {
        self.frustum().intersects_box(center, half_size)
    }

    /// Resize the camera's viewport. Perspective cameras pick up the new
    /// aspect ratio.
    pub fn set_viewport_size(
        &mut self,
        new_width: u32,
        new_height: u32,
    ) -> Result<(), InvalidCameraSize> {
        if new_width > 0 && new_height > 0 {
            if let Projection::Perspective { aspect, .. } = &mut self.projection {
                *aspect = new_width as f32 / new_height as f32;
            }

            self.viewport_width = new_width as f32;
            self.viewport_height = new_height as f32;
            Ok(())
        } else {
            Err(InvalidCameraSize(new_width, new_height))
        }
    }

    /// Get the position of the camera in world space.
    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    /// Get the point at which the camera is focused on.
    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Get the normalized direction the camera is looking in.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }

    /// Get the camera's up axis.
    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Get the world up axis (not the camera's up axis).
    pub fn world_up(&self) -> Vec3 {
        self.world_up
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn z_near(&self) -> f32 {
        self.z_near
    }

    pub fn z_far(&self) -> f32 {
        self.z_far
    }

    /// Get the camera viewport width in pixels.
    pub fn viewport_width(&self) -> f32 {
        self.viewport_width
    }

    /// Get the camera viewport height in pixels.
    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }
}

#[derive(Debug, Error)]
#[error("camera viewport width and height must be larger than zero but width was {} and height was {}", .0, .1)]
pub struct InvalidCameraSize(u32, u32);

/// Six planes bounding a view volume. Each plane is stored as `(normal, d)`
/// with the normal pointing into the volume, so a point `p` is inside when
/// `normal.dot(p) + d >= 0` for every plane.
#[derive(Copy, Clone, Debug)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract the frustum planes from a view projection matrix that produces
    /// clip space depth in [0, 1].
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let r0 = view_projection.row(0);
        let r1 = view_projection.row(1);
        let r2 = view_projection.row(2);
        let r3 = view_projection.row(3);

        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(|plane| {
            let length = plane.truncate().length();
            if length > 0.0 {
                plane / length
            } else {
                plane
            }
        });

        Self { planes }
    }

    /// Conservative box test: returns false only when the box lies entirely
    /// on the outside of at least one plane.
    pub fn intersects_box(&self, center: Vec3, half_size: Vec3) -> bool {
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            let radius = normal.abs().dot(half_size.abs());
            normal.dot(center) + plane.w >= -radius
        })
    }
}
