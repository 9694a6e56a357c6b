use std::path::Path;

use scenery::settings::RenderSettings;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(err) = tracing_log::LogTracer::init() {
        eprintln!("failed to initialize LogTracer: {err}");
    }

    // Log INFO+ by default. RUST_LOG overrides, e.g. `RUST_LOG=scenery=trace`.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wgpu_core=warn,wgpu_hal=warn"));

    let stdout_subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(stdout_subscriber) {
        eprintln!("failed to install stdout global tracing subscriber: {err}");
    }

    let settings = match std::env::args().nth(1) {
        Some(path) => match RenderSettings::load(Path::new(&path)) {
            Ok(settings) => {
                info!("loaded render settings from {path}");
                settings
            }
            Err(err) => {
                error!("cannot load render settings from {path}: {err:#}");
                std::process::exit(1);
            }
        },
        None => RenderSettings::default(),
    };

    if let Err(err) = scenery::viewer::run(settings) {
        error!("{err:#}");
        std::process::exit(1);
    }
}
