//! Windowed demo: draws an indexed, vertex-colored quad
//!
//! Exercises the full backend path: instance and device setup, swapchain
//! negotiation, staged geometry upload, and the frames-in-flight loop with
//! resize recovery. Configuration comes from `triangle_app.toml` next to the
//! binary when present, defaults otherwise.

use ember_engine::prelude::*;

const CONFIG_FILE: &str = "triangle_app.toml";

/// A unit quad centered on the origin, one color per corner
const QUAD_VERTICES: [Vertex; 4] = [
    Vertex {
        position: [-0.5, -0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        position: [0.5, 0.5, 0.0],
        color: [0.0, 0.0, 1.0],
    },
    Vertex {
        position: [-0.5, 0.5, 0.0],
        color: [1.0, 1.0, 1.0],
    },
];

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

fn main() {
    ember_engine::logging::init();

    if let Err(e) = run() {
        log::error!("fatal: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config();

    let mut window = GlfwWindow::new(
        &config.application_name,
        WindowMode::Windowed {
            width: 800,
            height: 600,
        },
    )?;

    let mut graphics =
        GraphicsContext::new(&mut window, config, &QUAD_VERTICES, Some(&QUAD_INDICES))?;

    while !window.should_close() {
        window.poll_events();
        graphics.begin_frame(&mut window)?;
        graphics.end_frame()?;
    }

    graphics.shutdown()?;
    Ok(())
}

/// Read the config file if it exists; fall back to defaults otherwise
fn load_config() -> RendererConfig {
    match RendererConfig::from_toml_file(CONFIG_FILE) {
        Ok(config) => config,
        Err(e) => {
            log::debug!("using default renderer config ({e})");
            RendererConfig {
                application_name: "triangle".to_string(),
                vertex_shader: "triangle_vert.spv".to_string(),
                fragment_shader: "triangle_frag.spv".to_string(),
                ..RendererConfig::default()
            }
        }
    }
}
