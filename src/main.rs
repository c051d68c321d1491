//! Taquin viewer: renders a model with the software rasterizer and presents
//! the framebuffer in a window

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use log::{debug, error, info, warn};
use macroquad::prelude::*;

use taquin::app::{Control, Viewer};
use taquin::config::{load_config, RenderConfig};
use taquin::rasterizer::{render_scene, Framebuffer, ShadingModel};
use taquin::world::{Mesh, Scene};
use taquin::{DEFAULT_HEIGHT, DEFAULT_WIDTH, VERSION};

#[derive(Parser, Debug)]
#[command(version, about = "CPU software rasterizer viewer")]
struct Args {
    /// OBJ model to display (a textured cube when omitted)
    model: Option<PathBuf>,

    /// RON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Shader pair to render with
    #[arg(short, long, value_enum)]
    shading: Option<ShadingModel>,

    /// Start in wireframe mode
    #[arg(short, long)]
    wireframe: bool,
}

fn window_conf() -> Conf {
    Conf {
        window_title: format!("Taquin v{}", VERSION),
        window_width: DEFAULT_WIDTH as i32,
        window_height: DEFAULT_HEIGHT as i32,
        window_resizable: true,
        high_dpi: true,
        ..Default::default()
    }
}

/// Config file first, command line on top
fn resolve_config(args: Args) -> RenderConfig {
    let mut config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load {}: {}, using defaults", path.display(), e);
                RenderConfig::default()
            }
        },
        None => RenderConfig::default(),
    };

    if args.model.is_some() {
        config.model = args.model;
    }
    if let Some(shading) = args.shading {
        config.shading = shading;
    }
    if args.wireframe {
        config.wireframe = true;
    }
    config
}

/// Load `path`, or fall back to the procedural cube
fn load_model(scene: &mut Scene, path: Option<&Path>) -> Arc<Mesh> {
    if let Some(path) = path {
        match scene.load_mesh(path) {
            Ok(mesh) => return mesh,
            Err(e) => error!("Failed to load {}: {}", path.display(), e),
        }
    }
    scene.add_mesh(Mesh::cube(2.0))
}

/// Map this frame's input to viewer controls
fn poll_controls(last_mouse: &mut (f32, f32)) -> Vec<Control> {
    let mut controls = Vec::new();

    let mouse = mouse_position();
    let (dx, dy) = (mouse.0 - last_mouse.0, mouse.1 - last_mouse.1);
    *last_mouse = mouse;
    if dx != 0.0 || dy != 0.0 {
        controls.push(Control::Orbit { dx, dy });
    }

    let wheel = mouse_wheel().1;
    if wheel != 0.0 {
        controls.push(Control::Zoom(wheel.signum()));
    }

    if is_mouse_button_pressed(MouseButton::Left) {
        controls.push(Control::ToggleNormalMap);
    }
    if is_mouse_button_pressed(MouseButton::Right) {
        controls.push(Control::ToggleWireframe);
    }

    let keys = [
        (KeyCode::Left, Control::ShiftLeft),
        (KeyCode::Right, Control::ShiftRight),
        (KeyCode::Up, Control::LightUp),
        (KeyCode::Down, Control::LightDown),
        (KeyCode::C, Control::ToggleAutoRotate),
        (KeyCode::V, Control::ReverseRotation),
        (KeyCode::R, Control::ResetOrientation),
        (KeyCode::Space, Control::ToggleSpin),
        (KeyCode::S, Control::CycleShading),
    ];
    for (key, control) in keys {
        if is_key_pressed(key) {
            controls.push(control);
        }
    }

    controls
}

#[cfg(not(target_arch = "wasm32"))]
fn open_model_dialog(scene: &mut Scene, viewer: &mut Viewer, model_size: f32) {
    let dialog = rfd::FileDialog::new().add_filter("Wavefront OBJ", &["obj"]);
    let Some(path) = dialog.pick_file() else { return };

    match scene.load_mesh(&path) {
        Ok(mesh) => {
            if let Err(e) = viewer.show_model(scene, mesh, model_size) {
                error!("Failed to show {}: {}", path.display(), e);
            }
        }
        Err(e) => error!("Failed to load {}: {}", path.display(), e),
    }
}

/// Draw the framebuffer scaled to fit the window, keeping its aspect ratio
fn present(fb: &Framebuffer) {
    // Sizes come from a validated config and always fit
    let (Ok(width), Ok(height)) = (u16::try_from(fb.width), u16::try_from(fb.height)) else {
        return;
    };
    let texture = Texture2D::from_rgba8(width, height, &fb.pixels);
    texture.set_filter(FilterMode::Nearest);

    let scale = (screen_width() / fb.width as f32).min(screen_height() / fb.height as f32);
    let draw_w = fb.width as f32 * scale;
    let draw_h = fb.height as f32 * scale;

    clear_background(BLACK);
    draw_texture_ex(
        &texture,
        (screen_width() - draw_w) * 0.5,
        (screen_height() - draw_h) * 0.5,
        WHITE,
        DrawTextureParams {
            dest_size: Some(Vec2::new(draw_w, draw_h)),
            ..Default::default()
        },
    );
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = resolve_config(Args::parse());

    if let Some(threads) = config.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
            warn!("Failed to configure {} render threads: {}", threads, e);
        }
    }

    let mut scene = config.build_scene();
    let mut viewer = Viewer::new(config.camera_distance, config.shading);
    let mesh = load_model(&mut scene, config.model.as_deref());
    if let Err(e) = viewer.show_model(&mut scene, mesh, config.model_size) {
        error!("Failed to set up the scene: {}", e);
        return;
    }

    let settings = config.raster_settings();
    let mut fb = Framebuffer::new(config.width, config.height);
    let mut rng = ::rand::rng();
    let mut last_mouse = mouse_position();

    info!("=== Taquin v{} === {}x{}, shading {}", VERSION, fb.width, fb.height, config.shading);

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        for control in poll_controls(&mut last_mouse) {
            viewer.apply(control, &mut scene);
        }

        #[cfg(not(target_arch = "wasm32"))]
        if is_key_pressed(KeyCode::O) {
            open_model_dialog(&mut scene, &mut viewer, config.model_size);
        }

        if let Some(fps) = viewer.update(get_frame_time(), &mut rng) {
            info!("FPS = {:.1}", fps);
        }

        if let Err(e) = viewer.place_camera(&mut scene) {
            error!("Camera update failed: {}", e);
            break;
        }

        match render_scene(&mut fb, &scene, viewer.background(), &settings) {
            Ok(stats) => debug!(
                "{} triangles, {} clipped, {} culled, {} fragments",
                stats.triangles, stats.clipped, stats.culled, stats.fragments
            ),
            Err(e) => {
                error!("Render failed: {}", e);
                break;
            }
        }

        present(&fb);
        next_frame().await;
    }
}
