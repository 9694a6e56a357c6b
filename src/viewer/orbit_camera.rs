use std::time::Duration;

use glam::{Quat, Vec2};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::camera::Camera;

/// Arc-ball camera controller. The camera's target is the pivot point, and
/// dragging with the left mouse button held rotates the camera around it.
/// The mouse wheel moves closer or further away.
#[derive(Debug)]
pub struct OrbitCameraController {
    /// Horizontal panning speed modifier.
    horizontal_speed: f32,
    /// Vertical panning speed modifier.
    vertical_speed: f32,
    /// Allows mouse motion to contribute to the camera controller when set to
    /// true, otherwise mouse motion is ignored.
    allow_mouse_look: bool,
    /// Amount of mouse motion since the last call to update.
    mouse_motion: Option<Vec2>,
    /// The amount of scroll units that the mouse has moved since the last call
    /// to update.
    mouse_scroll: Option<f32>,
    /// Adjusts the mouse wheel scroll speed by the given amount.
    scroll_speed_modifier: f32,
    /// Minimum view distance from target.
    min_distance: f32,
    /// Maximum view distance from target.
    max_distance: Option<f32>,
}

impl OrbitCameraController {
    /// Pixels of scrolling that count as one line of mouse wheel movement.
    const PIXELS_PER_LINE: f32 = 40.0;

    pub fn new() -> Self {
        Self {
            horizontal_speed: 25.0,
            vertical_speed: 25.0,
            allow_mouse_look: false,
            mouse_motion: None,
            mouse_scroll: None,
            scroll_speed_modifier: 25.0,
            min_distance: 1.0,
            max_distance: Some(60.0),
        }
    }

    /// Updates the controller with a window event. Returns `true` if `event`
    /// was used.
    pub fn process_input(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                self.allow_mouse_look = *state == ElementState::Pressed;
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(position) => {
                        position.y as f32 / Self::PIXELS_PER_LINE
                    }
                };
                self.process_mouse_wheel(lines);
                true
            }
            _ => false,
        }
    }

    /// Accumulates mouse motion until `update_camera` is called.
    pub fn process_mouse_motion(&mut self, delta: Vec2) {
        if self.allow_mouse_look {
            self.mouse_motion = Some(self.mouse_motion.unwrap_or_default() + delta);
        }
    }

    /// Accumulates wheel movement until `update_camera` is called. Positive
    /// values move towards the target.
    pub fn process_mouse_wheel(&mut self, lines: f32) {
        self.mouse_scroll = Some(self.mouse_scroll.unwrap_or_default() + lines);
    }

    /// Applies accumulated input to `camera`.
    pub fn update_camera(&mut self, camera: &mut Camera, delta: Duration) {
        let pivot = camera.target();
        let delta_secs = delta.as_secs_f32();
        let motion = self.mouse_motion.take().unwrap_or_default();
        let scroll = self.mouse_scroll.take().unwrap_or_default();

        // Convert the mouse motion to an amount of rotation. The height of the
        // viewport is 180 degrees, and the width of the viewport is 360 degrees.
        let x_view_angles = std::f32::consts::TAU / camera.viewport_width().max(1.0);
        let y_view_angles = std::f32::consts::PI / camera.viewport_height().max(1.0);

        let x_angle = motion.x * x_view_angles * self.horizontal_speed * delta_secs;
        let y_angle = motion.y * y_view_angles * self.vertical_speed * delta_secs;

        // Rotate camera around the world up axis (horizontal mouse movement).
        let x_rotation = Quat::from_axis_angle(camera.world_up(), x_angle);
        let camera_pos_1 = x_rotation * (camera.eye() - pivot) + pivot;

        // Rotate camera around its right axis (vertical mouse movement).
        let forward = (pivot - camera_pos_1).normalize_or_zero();
        let right = forward.cross(camera.world_up()).normalize_or_zero();
        let y_rotation = Quat::from_axis_angle(right, y_angle);
        let camera_pos_2 = y_rotation * (camera_pos_1 - pivot) + pivot;

        // Do not use the vertical rotation contribution if it brings the
        // camera nearly parallel with the up vector.
        let new_forward = (pivot - camera_pos_2).normalize_or_zero();
        let camera_pos = if new_forward.dot(camera.world_up()).abs() < 0.99 {
            camera_pos_2
        } else {
            camera_pos_1
        };

        // Move closer or further away from the target.
        let forward = (pivot - camera_pos).normalize_or_zero();
        let camera_pos = camera_pos + forward * scroll * self.scroll_speed_modifier * delta_secs;

        // Don't get too close or too far from the target. Moving past the
        // pivot flips the offset, which also counts as too close.
        let pivot_to_camera = camera_pos - pivot;
        let distance = if pivot_to_camera.dot(-forward) <= 0.0 {
            0.0
        } else {
            pivot_to_camera.length()
        };
        let direction = -forward;

        let camera_pos = if distance <= self.min_distance {
            pivot + direction * self.min_distance
        } else {
            match self.max_distance {
                Some(max_distance) if distance >= max_distance => {
                    pivot + direction * max_distance
                }
                _ => camera_pos,
            }
        };

        camera.reorient(camera_pos, pivot);
    }
}

impl Default for OrbitCameraController {
    fn default() -> Self {
        Self::new()
    }
}
