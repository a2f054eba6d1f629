//! Writes a small synthetic chest X-ray tree for smoke runs:
//!
//! ```text
//! <output>/NORMAL/normal-000.jpeg ...
//! <output>/PNEUMONIA/pneumonia-000.jpeg ...
//! ```
//!
//! Usage: `generate-synthetic [output_dir] [images_per_class]`

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use image::{GrayImage, ImageFormat, Luma};
use log::{info, LevelFilter};
use pneumonia_classifier::labels::{NORMAL, PNEUMONIA};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DEFAULT_OUTPUT: &str = "data/images/test";
const DEFAULT_PER_CLASS: usize = 20;
const SEED: u64 = 12345;

/// Normal scans are bright with a little noise; pneumonia scans are darker with
/// a few bright opaque patches.
fn synthetic_scan(rng: &mut StdRng, pneumonia: bool) -> GrayImage {
    let width = rng.random_range(96..=320);
    let height = rng.random_range(96..=320);
    let base: f64 = if pneumonia { 70.0 } else { 190.0 };

    let patches: Vec<(f64, f64, f64)> = if pneumonia {
        (0..rng.random_range(1..=3))
            .map(|_| {
                (
                    rng.random_range(0.2..0.8) * width as f64,
                    rng.random_range(0.2..0.8) * height as f64,
                    rng.random_range(0.08..0.2) * width.min(height) as f64,
                )
            })
            .collect()
    } else {
        Vec::new()
    };

    let noise: Vec<f64> = (0..width * height).map(|_| rng.random_range(-20.0..20.0)).collect();

    GrayImage::from_fn(width, height, |x, y| {
        let mut value = base + noise[(y * width + x) as usize];
        for &(cx, cy, radius) in &patches {
            let distance = ((x as f64 - cx).powi(2) + (y as f64 - cy).powi(2)).sqrt();
            if distance < radius {
                value += 80.0 * (1.0 - distance / radius);
            }
        }
        Luma([value.clamp(0.0, 255.0) as u8])
    })
}

fn write_class(rng: &mut StdRng, root: &Path, category: &str, count: usize) -> anyhow::Result<()> {
    let dir = root.join(category);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
    for i in 0..count {
        let path = dir.join(format!("{}-{:03}.jpeg", category.to_lowercase(), i));
        synthetic_scan(rng, category == PNEUMONIA)
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("Failed to write {:?}", path))?;
    }
    info!("Wrote {} {} images to {:?}", count, category, dir);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let mut args = std::env::args().skip(1);
    let output = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let per_class = match args.next() {
        Some(n) => n.parse::<usize>().with_context(|| format!("Invalid image count {:?}", n))?,
        None => DEFAULT_PER_CLASS,
    };

    let mut rng = StdRng::seed_from_u64(SEED);
    for category in [NORMAL, PNEUMONIA] {
        write_class(&mut rng, &output, category, per_class)?;
    }
    Ok(())
}
