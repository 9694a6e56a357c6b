use glam::{Mat4, Vec3};

/// An axis aligned bounding box stored as a center point and the distance from
/// the center to each face.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub half_size: Vec3,
}

impl Aabb {
    pub fn new(center: Vec3, half_size: Vec3) -> Self {
        Self { center, half_size }
    }

    /// Create the smallest box containing both `min` and `max`.
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: (min + max) * 0.5,
            half_size: (max - min).abs() * 0.5,
        }
    }

    /// Create the smallest box containing every point in `points`. An empty
    /// slice produces a zero sized box at the origin.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut iter = points.into_iter();

        let Some(first) = iter.next() else {
            return Self::default();
        };

        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Self::from_min_max(min, max)
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half_size
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_size
    }

    /// Get the eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min(), self.max());

        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    /// Transform this box by `matrix` and return the axis aligned box that
    /// encloses the result.
    ///
    /// The enclosing box is computed from all eight transformed corners, so
    /// rotations grow the box rather than clipping it.
    pub fn transform(&self, matrix: &Mat4) -> Self {
        Self::from_points(
            self.corners()
                .into_iter()
                .map(|corner| matrix.transform_point3(corner)),
        )
    }

    /// Get a sphere that fully encloses this box.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere {
            center: self.center,
            radius: self.half_size.length(),
        }
    }
}

/// A sphere used for cheap overlap tests.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Check if this sphere touches or overlaps `other`.
    pub fn overlaps_sphere(&self, other: &BoundingSphere) -> bool {
        let reach = self.radius + other.radius;
        self.center.distance_squared(other.center) <= reach * reach
    }
}
