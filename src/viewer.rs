//! Interactive window showing the demo scene.
pub mod controls;
pub mod demo_scene;
pub mod orbit_camera;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use image::DynamicImage;
use tracing::{debug, error, info, warn};
use winit::{
    event::{DeviceEvent, ElementState, Event, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{Key, NamedKey},
    window::WindowBuilder,
};

use crate::camera::Camera;
use crate::gpu::textures::{checker_image, sky_gradient_image};
use crate::gpu::WgpuDevice;
use crate::renderer::{FrameStats, Renderer};
use crate::settings::RenderSettings;
use demo_scene::{DemoScene, SKY_TEXTURE};
use orbit_camera::OrbitCameraController;

/// Shader atlas location relative to the content directory.
pub const SHADER_ATLAS: &str = "shaders.atlas";

/// How often the window title is refreshed with frame statistics.
const TITLE_REFRESH: Duration = Duration::from_secs(1);

/// Open a window and draw the demo scene until the window is closed or
/// escape is pressed.
pub fn run(settings: RenderSettings) -> anyhow::Result<()> {
    info!("creating main window for rendering");

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Scenery")
            .build(&event_loop)?,
    );

    let mut gpu = pollster::block_on(WgpuDevice::new(window.clone(), Path::new(SHADER_ATLAS)))?;

    let sky = sky_gradient_image(512, 256, [40, 90, 170], [200, 220, 235], [60, 55, 50]);
    gpu.register_image(SKY_TEXTURE, &DynamicImage::ImageRgba8(sky));
    let checker = checker_image(256, 8, [220, 220, 220, 255], [90, 90, 90, 255]);
    let checker = gpu.register_image("checker", &DynamicImage::ImageRgba8(checker));

    let mut demo = DemoScene::new(&gpu, Some(checker));
    let mut renderer = Renderer::new(settings);
    let mut orbit = OrbitCameraController::new();

    let size = window.inner_size();
    let mut camera = Camera::new(
        Vec3::new(0.0, 4.0, 12.0),
        Vec3::ZERO,
        Vec3::Y,
        45_f32.to_radians(),
        0.1,
        200.0,
        size.width,
        size.height,
    );

    let started = Instant::now();
    let mut last_frame = Instant::now();
    let mut last_title = Instant::now();

    info!("starting main window event loop");

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == gpu.window().id() => {
            match event {
                WindowEvent::CloseRequested
                | WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            logical_key: Key::Named(NamedKey::Escape),
                            state: ElementState::Pressed,
                            ..
                        },
                    ..
                } => elwt.exit(),
                WindowEvent::Resized(new_size) => {
                    resize(&mut gpu, &mut camera, new_size.width, new_size.height);
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let new_size = gpu.window().inner_size();
                    resize(&mut gpu, &mut camera, new_size.width, new_size.height);
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let delta = now - last_frame;
                    last_frame = now;

                    orbit.update_camera(&mut camera, delta);
                    renderer.update(delta);
                    demo.animate(started.elapsed().as_secs_f32());
                    renderer.render_scene(&mut demo.scene, &camera, &mut gpu);

                    if now - last_title >= TITLE_REFRESH {
                        last_title = now;
                        gpu.window()
                            .set_title(&window_title(renderer.last_frame_stats()));
                    }

                    match gpu.finish_frame() {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            warn!("surface lost or outdated, re-applying the window size");
                            let size = gpu.window().inner_size();
                            gpu.resize(size.width, size.height);
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            error!("graphics device is out of memory");
                            elwt.exit();
                        }
                        Err(err) => warn!("skipping frame: {err}"),
                    }
                }
                event => {
                    if controls::process_input(renderer.settings_mut(), &event) {
                        info!("render settings changed: {:?}", renderer.settings());
                    } else {
                        orbit.process_input(&event);
                    }
                }
            }
        }
        Event::DeviceEvent {
            event: DeviceEvent::MouseMotion { delta: (x, y) },
            ..
        } => orbit.process_mouse_motion(Vec2::new(x as f32, y as f32)),
        Event::AboutToWait => gpu.window().request_redraw(),
        Event::LoopExiting => {
            debug!("releasing gpu resources");
            renderer.release(&mut gpu);
            demo.scene.release_gpu_resources(&mut gpu);
        }
        _ => {}
    })?;

    Ok(())
}

/// Window title showing what the last frame drew.
fn window_title(stats: FrameStats) -> String {
    format!(
        "Scenery - {} draws, {} culled, {} shadow maps",
        stats.draw_calls, stats.culled_meshes, stats.shadow_maps
    )
}

fn resize(gpu: &mut WgpuDevice, camera: &mut Camera, width: u32, height: u32) {
    gpu.resize(width, height);

    if let Err(err) = camera.set_viewport_size(width, height) {
        warn!("{err}");
    }
}
