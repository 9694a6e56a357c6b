use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::settings::{RenderMode, RenderSettings};

/// Keys that change render settings:
///
///  F1  wireframe          F2  bounding boxes
///  1   flat               2   textured          3   lit
///  M   light pass mode    T   shadow policy
///  P   shadow map overlay H   shadow sampling
pub fn apply_key(settings: &mut RenderSettings, key: KeyCode) -> bool {
    match key {
        KeyCode::F1 => settings.wireframe = !settings.wireframe,
        KeyCode::F2 => settings.show_boundaries = !settings.show_boundaries,
        KeyCode::Digit1 => settings.render_mode = RenderMode::Flat,
        KeyCode::Digit2 => settings.render_mode = RenderMode::Textured,
        KeyCode::Digit3 => settings.render_mode = RenderMode::Lights,
        KeyCode::KeyM => settings.toggle_light_pass(),
        KeyCode::KeyP => settings.show_shadowmaps = !settings.show_shadowmaps,
        KeyCode::KeyH => settings.show_shadows = !settings.show_shadows,
        KeyCode::KeyT => settings.toggle_shadow_policy(),
        _ => return false,
    }

    true
}

/// Apply a window event to `settings`. Only fresh key presses count, so
/// holding a key down does not keep toggling. Returns true if a setting
/// changed.
pub fn process_input(settings: &mut RenderSettings, event: &WindowEvent) -> bool {
    match event {
        WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(key),
                    state: ElementState::Pressed,
                    repeat: false,
                    ..
                },
            ..
        } => apply_key(settings, *key),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{LightPassMode, ShadowPolicy};

    #[test]
    fn toggles_flip_back_and_forth() {
        let mut settings = RenderSettings::default();

        assert!(apply_key(&mut settings, KeyCode::F1));
        assert!(settings.wireframe);
        apply_key(&mut settings, KeyCode::F1);
        assert!(!settings.wireframe);

        apply_key(&mut settings, KeyCode::KeyM);
        assert_eq!(LightPassMode::SinglePass, settings.light_pass);

        apply_key(&mut settings, KeyCode::KeyT);
        assert_eq!(ShadowPolicy::Atlas, settings.shadow_policy);

        apply_key(&mut settings, KeyCode::KeyH);
        assert!(!settings.show_shadows);
    }

    #[test]
    fn mode_keys_leave_other_settings_alone() {
        let mut settings = RenderSettings {
            show_boundaries: true,
            show_shadowmaps: true,
            ..Default::default()
        };

        apply_key(&mut settings, KeyCode::Digit1);
        assert_eq!(RenderMode::Flat, settings.render_mode);
        apply_key(&mut settings, KeyCode::Digit2);
        assert_eq!(RenderMode::Textured, settings.render_mode);
        apply_key(&mut settings, KeyCode::Digit3);

        assert_eq!(
            RenderSettings {
                show_boundaries: true,
                show_shadowmaps: true,
                ..Default::default()
            },
            settings
        );
    }

    #[test]
    fn unbound_keys_change_nothing() {
        let mut settings = RenderSettings::default();

        assert!(!apply_key(&mut settings, KeyCode::KeyQ));
        assert_eq!(RenderSettings::default(), settings);
    }
}
