use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::renderer::device::{DepthTarget, TextureHandle};

/// The kinds of dynamic lights the renderer understands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LightType {
    /// Emits in every direction from a point, fading out at `max_distance`.
    Point,
    /// Emits a cone along the light's forward direction.
    Spot,
    /// Parallel rays along the light's forward direction, no falloff.
    Directional,
}

impl LightType {
    /// Integer code shaders use to tell light types apart. Zero is reserved
    /// for "no light".
    pub fn shader_code(self) -> u32 {
        match self {
            LightType::Point => 1,
            LightType::Spot => 2,
            LightType::Directional => 3,
        }
    }
}

/// Shadow information produced by the most recent shadow pass for a light.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShadowView {
    /// Transforms world space positions into the light's clip space.
    pub view_projection: Mat4,
    /// Depth texture holding the shadow map.
    pub texture: TextureHandle,
    /// Region of `texture` covered by this light in UV space as
    /// `(u, v, width, height)`. Lights with their own target use the whole
    /// texture.
    pub region: Vec4,
}

impl ShadowView {
    pub const FULL_REGION: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);
}

/// A light placed in the scene.
#[derive(Debug)]
pub struct LightEntity {
    pub light_type: LightType,
    /// World transform. The light sits at the translation and shines along
    /// its local -Z axis.
    pub model: Mat4,
    pub color: Vec3,
    pub intensity: f32,
    pub near_distance: f32,
    /// Distance past which the light contributes nothing.
    pub max_distance: f32,
    /// Spot light cone angles in degrees, `(inner, outer)`.
    pub cone_angles: Vec2,
    /// Width of the region covered by a directional light's shadow map.
    pub area: f32,
    pub cast_shadows: bool,
    pub shadow_bias: f32,
    /// Offscreen depth target owned by this light. Allocated the first time
    /// the light renders its own shadow map and reused afterwards.
    shadow_target: Option<DepthTarget>,
    shadow_view: Option<ShadowView>,
}

impl LightEntity {
    pub const DEFAULT_SHADOW_BIAS: f32 = 0.001;

    /// Create a light of `light_type` at the origin with neutral settings.
    pub fn new(light_type: LightType) -> Self {
        Self {
            light_type,
            model: Mat4::IDENTITY,
            color: Vec3::ONE,
            intensity: 1.0,
            near_distance: 0.1,
            max_distance: 100.0,
            cone_angles: Vec2::new(30.0, 40.0),
            area: 50.0,
            cast_shadows: false,
            shadow_bias: Self::DEFAULT_SHADOW_BIAS,
            shadow_target: None,
            shadow_view: None,
        }
    }

    /// Create a point light at `position`.
    pub fn point(position: Vec3, color: Vec3, intensity: f32, max_distance: f32) -> Self {
        Self {
            model: Mat4::from_translation(position),
            color,
            intensity,
            max_distance,
            ..Self::new(LightType::Point)
        }
    }

    /// Create a spot light at `position` shining towards `target`.
    pub fn spot(position: Vec3, target: Vec3, color: Vec3, cone_angles: Vec2) -> Self {
        let mut light = Self {
            color,
            cone_angles,
            ..Self::new(LightType::Spot)
        };
        light.aim(position, target);
        light
    }

    /// Create a directional light placed at `position` shining towards
    /// `target`. The position only matters for shadow rendering.
    pub fn directional(position: Vec3, target: Vec3, color: Vec3, area: f32) -> Self {
        let mut light = Self {
            color,
            area,
            ..Self::new(LightType::Directional)
        };
        light.aim(position, target);
        light
    }

    /// Move the light to `position` and rotate it so it shines at `target`.
    pub fn aim(&mut self, position: Vec3, target: Vec3) {
        let direction = (target - position).normalize_or_zero();
        let rotation = if direction == Vec3::ZERO {
            Quat::IDENTITY
        } else {
            Quat::from_rotation_arc(Vec3::NEG_Z, direction)
        };

        self.model = Mat4::from_rotation_translation(rotation, position);
    }

    /// Enable shadow casting with the given depth bias.
    pub fn with_shadows(mut self, bias: f32) -> Self {
        self.cast_shadows = true;
        self.shadow_bias = bias;
        self
    }

    /// World space position of the light.
    pub fn position(&self) -> Vec3 {
        self.model.transform_point3(Vec3::ZERO)
    }

    /// The light's local +Z axis in world space. This points back towards the
    /// light, away from the surfaces it shines on.
    pub fn front(&self) -> Vec3 {
        self.model.transform_vector3(Vec3::Z).normalize_or_zero()
    }

    /// The direction the light shines in.
    pub fn direction(&self) -> Vec3 {
        -self.front()
    }

    /// Light color pre-multiplied by intensity.
    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }

    /// Cosines of the inner and outer spot cone angles.
    pub fn cone_cosines(&self) -> Vec2 {
        Vec2::new(
            self.cone_angles.x.to_radians().cos(),
            self.cone_angles.y.to_radians().cos(),
        )
    }

    /// The shadow map this light owns, if one has been allocated.
    pub fn shadow_target(&self) -> Option<&DepthTarget> {
        self.shadow_target.as_ref()
    }

    pub(crate) fn set_shadow_target(&mut self, target: DepthTarget) {
        self.shadow_target = Some(target);
    }

    /// Give up ownership of the light's shadow target so it can be released.
    pub fn take_shadow_target(&mut self) -> Option<DepthTarget> {
        self.shadow_view = None;
        self.shadow_target.take()
    }

    /// Shadow information from the most recent shadow pass, if this light
    /// currently casts shadows.
    ///
    /// Lights with shadow casting disabled never report a shadow view, even
    /// if an earlier frame produced one.
    pub fn shadow_view(&self) -> Option<&ShadowView> {
        if self.cast_shadows {
            self.shadow_view.as_ref()
        } else {
            None
        }
    }

    pub(crate) fn set_shadow_view(&mut self, view: Option<ShadowView>) {
        self.shadow_view = view;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aimed_light_points_at_target() {
        let light = LightEntity::spot(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::ZERO,
            Vec3::ONE,
            Vec2::new(20.0, 30.0),
        );

        assert!(light.position().abs_diff_eq(Vec3::new(0.0, 10.0, 0.0), 1e-5));
        assert!(light.direction().abs_diff_eq(Vec3::NEG_Y, 1e-5));
        assert!(light.front().abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn cone_cosines_use_degrees() {
        let mut light = LightEntity::new(LightType::Spot);
        light.cone_angles = Vec2::new(0.0, 60.0);

        let cosines = light.cone_cosines();
        assert!((cosines.x - 1.0).abs() < 1e-6);
        assert!((cosines.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn radiance_scales_color() {
        let light = LightEntity::point(Vec3::ZERO, Vec3::new(1.0, 0.5, 0.0), 2.0, 10.0);
        assert_eq!(Vec3::new(2.0, 1.0, 0.0), light.radiance());
    }

    #[test]
    fn disabled_shadows_hide_stale_shadow_view() {
        let mut light = LightEntity::new(LightType::Spot).with_shadows(0.01);
        light.set_shadow_view(Some(ShadowView {
            view_projection: Mat4::IDENTITY,
            texture: TextureHandle::default(),
            region: ShadowView::FULL_REGION,
        }));
        assert!(light.shadow_view().is_some());

        light.cast_shadows = false;
        assert!(light.shadow_view().is_none());
    }
}
