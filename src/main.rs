use std::{env, fs, sync::Arc};

use anyhow::{Context, Result, bail};
use log::info;
use worker::{
    ModelClient, WorkerConfig,
    pixels::{RgbaSource, stretch_preview},
    solve::Corners,
};

const USAGE: &str = "usage: flatten <image> x0 y0 x1 y1 x2 y2 x3 y3";
const EXPORT_SIDE: u32 = 1024;
const OUTPUT: &str = "flattened.png";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some((path, coords)) = args.split_first().filter(|(_, c)| c.len() == 8) else {
        bail!(USAGE);
    };

    let mut corners: Corners = [[0.; 2]; 4];
    for (i, coord) in coords.iter().enumerate() {
        corners[i / 2][i % 2] = coord
            .parse()
            .with_context(|| format!("invalid coordinate {coord:?}\n{USAGE}"))?;
    }

    let config = load_config()?;
    let source = Arc::new(RgbaSource::open(path).with_context(|| format!("cannot read {path}"))?);
    info!(width = source.width(), height = source.height(); "loaded {path}");

    let progress = |message: &str| eprintln!("{message}");
    let mut client = ModelClient::spawn(config)?;

    let solved = client.solve(corners, progress).await?;
    info!(
        candidate = solved.candidate,
        initial_loss = solved.initial_loss,
        final_loss = solved.final_loss;
        "solved perspective"
    );

    let preview = stretch_preview(&*source, &solved.solution)?;
    let aspect_ratio = client.predict_stretch(&preview, progress).await?;
    info!(aspect_ratio = aspect_ratio; "predicted aspect ratio");

    let png = client
        .export_image(&solved.solution, source, aspect_ratio, EXPORT_SIDE, progress)
        .await?;
    fs::write(OUTPUT, png).with_context(|| format!("cannot write {OUTPUT}"))?;
    eprintln!("wrote {OUTPUT}");

    client.shutdown()?;
    Ok(())
}

/// Reads `FLATTEN_CONFIG` if set, then applies the `FLATTEN_MODELS` and `FLATTEN_SEED` overrides.
fn load_config() -> Result<WorkerConfig> {
    let mut config = match env::var("FLATTEN_CONFIG") {
        Ok(path) => WorkerConfig::from_json_file(&path)
            .with_context(|| format!("cannot load the configuration at {path}"))?,
        Err(_) => WorkerConfig::default(),
    };

    if let Ok(dir) = env::var("FLATTEN_MODELS") {
        config = config.with_model_dir(dir);
    }
    if let Ok(seed) = env::var("FLATTEN_SEED") {
        let seed = seed
            .parse()
            .with_context(|| format!("FLATTEN_SEED must be an integer, got {seed:?}"))?;
        config = config.with_seed(seed);
    }

    Ok(config)
}
