//! Dominant color extraction.
//!
//! Picks a primary color, a secondary color and a ranked palette out of an image:
//!
//! 1. Stride-sample the image on a bounded grid ([`sampler`]).
//! 2. Place every sample in an HSV cone ([`cone`]).
//! 3. Cluster the cone points with k-means++ and Lloyd iteration ([`kmeans`]).
//! 4. Score the clusters by saturation, value, size and distance ([`scoring`]).
//! 5. Assemble a [`ColorPalette`] ([`output`]).
//!
//! ```
//! use dominant_color_wasm::{DominantColor, ExtractorConfig};
//! use image::{Rgb, RgbImage};
//!
//! let img = RgbImage::from_fn(100, 100, |_, y| if y < 90 { Rgb([220, 30, 30]) } else { Rgb([20, 40, 230]) });
//! let palette = DominantColor::new(ExtractorConfig::default())?.extract_seeded(&img, 2, 0)?;
//!
//! assert_eq!(palette.primary.hex(), "DC1E1E");
//! assert_eq!(palette.secondary.map(|c| c.hex()), Some("1428E6".to_string()));
//! assert!(palette.palette.is_empty());
//! # Ok::<(), dominant_color_wasm::ExtractError>(())
//! ```

use std::path::Path;

use js_sys::{Array, Object, Reflect};
use rand::{Rng, SeedableRng, rngs::StdRng};
use wasm_bindgen::prelude::*;

pub mod config;
pub mod cone;
pub mod error;
pub mod kmeans;
pub mod output;
pub mod sampler;
pub mod scoring;

pub use config::ExtractorConfig;
pub use error::{ExtractError, Result};
pub use output::{Color, ColorPalette};
pub use sampler::Raster;
pub use scoring::{ClusterScore, ScoredClusters};

use kmeans::KMeans;
use sampler::Sampler;
use scoring::ColorScorer;

/// At least primary and secondary.
pub const MIN_COLOR_COUNT: usize = 2;

/// Color count used when the caller has no preference.
pub const DEFAULT_COLOR_COUNT: usize = 2;

/// Number of clusters actually formed for a requested color count.
pub fn effective_color_count(requested: usize) -> usize {
    requested.max(MIN_COLOR_COUNT)
}

/// Extractor bound to one validated configuration.
#[derive(Debug, Clone, Default)]
pub struct DominantColor {
    config: ExtractorConfig,
}

impl DominantColor {
    /// # Errors
    ///
    /// `InvalidParameter` if the configuration does not validate.
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract the palette of `raster` into `color_count` clusters.
    ///
    /// A `color_count` below 2 is raised to 2. The result depends only on the
    /// raster, the configuration and the state of `rng`.
    ///
    /// # Errors
    ///
    /// - `ImageAccess` if a sampled pixel cannot be read
    /// - `InsufficientData` if the raster has no pixels
    pub fn extract<R: Raster + ?Sized, G: Rng>(
        &self,
        raster: &R,
        color_count: usize,
        rng: &mut G,
    ) -> Result<ColorPalette> {
        let scored = self.score(raster, color_count, rng)?;
        Ok(output::build_palette(&scored))
    }

    /// [`extract`](Self::extract) with a `StdRng` seeded from `seed`.
    pub fn extract_seeded<R: Raster + ?Sized>(
        &self,
        raster: &R,
        color_count: usize,
        seed: u64,
    ) -> Result<ColorPalette> {
        self.extract(raster, color_count, &mut StdRng::seed_from_u64(seed))
    }

    /// Run the pipeline up to scoring and return every cluster's score record.
    pub fn score<R: Raster + ?Sized, G: Rng>(
        &self,
        raster: &R,
        color_count: usize,
        rng: &mut G,
    ) -> Result<ScoredClusters> {
        let k = effective_color_count(color_count);
        if k != color_count {
            tracing::debug!(requested = color_count, k, "Clamped color count");
        }

        // ----------------------
        // 1. Sample
        // ----------------------
        let points = Sampler::from_config(&self.config).collect(raster)?;
        tracing::debug!(
            width = raster.width(),
            height = raster.height(),
            points = points.len(),
            "Sampled image"
        );

        // ----------------------
        // 2. Cluster
        // ----------------------
        let clustering = KMeans::new(k)?
            .with_max_iterations(self.config.max_iterations)
            .fit(&points, rng)?;
        let clusters = clustering.clusters();

        // ----------------------
        // 3. Score
        // ----------------------
        ColorScorer::new(&self.config)
            .score(&clusters)
            .ok_or(ExtractError::InsufficientData {
                points: points.len(),
                required: 1,
            })
    }

    /// Decode an encoded image (PNG, JPEG, ...) and extract its palette.
    pub fn extract_bytes(&self, input: &[u8], color_count: usize, seed: u64) -> Result<ColorPalette> {
        let img = image::load_from_memory(input)
            .map_err(|e| ExtractError::image_load("unable to decode image", e))?;
        self.extract_seeded(&img, color_count, seed)
    }

    /// Open an image file and extract its palette.
    pub fn extract_file(&self, path: &Path, color_count: usize, seed: u64) -> Result<ColorPalette> {
        let img = image::open(path).map_err(|e| {
            ExtractError::image_load(format!("could not load image from {}", path.display()), e)
        })?;
        self.extract_seeded(&img, color_count, seed)
    }
}

// ------------------------------------------------------------
// WebAssembly entry point
// ------------------------------------------------------------

/// Extract dominant colors from an encoded image.
///
/// Returns `{ primary, secondary, palette }` where every color is
/// `{ color: "RRGGBB", score }` and `secondary` is `null` for single-color images.
/// Without a `seed` one is drawn from the platform's entropy source.
#[wasm_bindgen]
pub fn dominant_colors(
    input: Vec<u8>,
    color_count: usize,
    seed: Option<u32>,
) -> std::result::Result<Object, JsValue> {
    let seed = match seed {
        Some(seed) => seed as u64,
        None => getrandom::u64()
            .map_err(|e| JsValue::from_str(&format!("Unable to seed random source: {e}")))?,
    };

    let palette = DominantColor::default()
        .extract_bytes(&input, color_count, seed)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let palette_js = Array::new();
    for color in &palette.palette {
        palette_js.push(&color_to_js(color)?.into());
    }
    let secondary_js = match &palette.secondary {
        Some(color) => color_to_js(color)?.into(),
        None => JsValue::NULL,
    };

    let result = Object::new();
    let primary_js: JsValue = color_to_js(&palette.primary)?.into();
    Reflect::set(&result, &JsValue::from_str("primary"), &primary_js)?;
    Reflect::set(&result, &JsValue::from_str("secondary"), &secondary_js)?;
    Reflect::set(&result, &JsValue::from_str("palette"), &palette_js)?;

    Ok(result)
}

fn color_to_js(color: &Color) -> std::result::Result<Object, JsValue> {
    let obj = Object::new();
    Reflect::set(&obj, &JsValue::from_str("color"), &JsValue::from_str(&color.hex()))?;
    Reflect::set(&obj, &JsValue::from_str("score"), &JsValue::from_f64(color.score()))?;
    Ok(obj)
}
