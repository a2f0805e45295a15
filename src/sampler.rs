//! Grid sampling of a decoded image into cone points.
//!
//! The image is never resized. Instead it is walked with a fractional stride of
//! `max(width / sampleWidth, 1)` by `max(height / sampleHeight, 1)`, so at most
//! `sampleWidth * sampleHeight` pixels are read.

use image::{DynamicImage, GenericImageView, RgbImage, RgbaImage};
use palette::Srgb;

use crate::cone::{ConePoint, to_cone_point};
use crate::{ExtractError, ExtractorConfig, Result};

/// A decoded image that can be read pixel by pixel.
///
/// Indexed images must already be resolved to RGB.
pub trait Raster {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Pixel at `(x, y)`, or `None` when it cannot be read.
    fn pixel_at(&self, x: u32, y: u32) -> Option<Srgb<u8>>;
}

impl Raster for RgbImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn pixel_at(&self, x: u32, y: u32) -> Option<Srgb<u8>> {
        self.get_pixel_checked(x, y)
            .map(|p| Srgb::new(p.0[0], p.0[1], p.0[2]))
    }
}

// alpha is ignored: a transparent pixel still reports its stored color
impl Raster for RgbaImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn pixel_at(&self, x: u32, y: u32) -> Option<Srgb<u8>> {
        self.get_pixel_checked(x, y)
            .map(|p| Srgb::new(p.0[0], p.0[1], p.0[2]))
    }
}

impl Raster for DynamicImage {
    fn width(&self) -> u32 {
        GenericImageView::width(self)
    }

    fn height(&self) -> u32 {
        GenericImageView::height(self)
    }

    fn pixel_at(&self, x: u32, y: u32) -> Option<Srgb<u8>> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let p = self.get_pixel(x, y);
        Some(Srgb::new(p.0[0], p.0[1], p.0[2]))
    }
}

impl<T: Raster + ?Sized> Raster for &T {
    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }

    fn pixel_at(&self, x: u32, y: u32) -> Option<Srgb<u8>> {
        (**self).pixel_at(x, y)
    }
}

/// Walks a raster on a bounded grid.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    target_width: u32,
    target_height: u32,
    value_distance_multiplier: f64,
}

impl Sampler {
    pub fn new(target_width: u32, target_height: u32, value_distance_multiplier: f64) -> Self {
        Self {
            target_width: target_width.max(1),
            target_height: target_height.max(1),
            value_distance_multiplier,
        }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(
            config.sample_width,
            config.sample_height,
            config.value_distance_multiplier,
        )
    }

    /// Horizontal and vertical stride for an image of the given size.
    pub fn strides(&self, width: u32, height: u32) -> (f64, f64) {
        (
            (width as f64 / self.target_width as f64).max(1.0),
            (height as f64 / self.target_height as f64).max(1.0),
        )
    }

    /// Number of columns and rows visited in an image of the given size.
    ///
    /// Counted in integers so a stride that rounds down cannot add a column.
    pub fn grid(&self, width: u32, height: u32) -> (u32, u32) {
        (width.min(self.target_width), height.min(self.target_height))
    }

    /// Lazily sample `raster` row by row.
    ///
    /// Each item fails with `ImageAccess` if the raster cannot read the pixel;
    /// collecting into `Result<Vec<_>>` stops at the first such failure.
    pub fn sample<'r, R: Raster + ?Sized>(&self, raster: &'r R) -> Samples<'r, R> {
        let (width, height) = (raster.width(), raster.height());
        let (x_step, y_step) = self.strides(width, height);
        let (columns, rows) = self.grid(width, height);

        Samples {
            raster,
            width,
            height,
            columns,
            rows,
            x_step,
            y_step,
            column: 0,
            row: 0,
            value_distance_multiplier: self.value_distance_multiplier,
        }
    }

    /// Sample every grid point, failing on the first unreadable pixel.
    pub fn collect<R: Raster + ?Sized>(&self, raster: &R) -> Result<Vec<ConePoint>> {
        self.sample(raster).collect()
    }
}

/// Iterator over the cone points of a sampled raster.
pub struct Samples<'r, R: ?Sized> {
    raster: &'r R,
    width: u32,
    height: u32,
    columns: u32,
    rows: u32,
    x_step: f64,
    y_step: f64,
    column: u32,
    row: u32,
    value_distance_multiplier: f64,
}

impl<R: Raster + ?Sized> Iterator for Samples<'_, R> {
    type Item = Result<ConePoint>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.columns == 0 || self.row >= self.rows {
            return None;
        }

        let px = (self.column as f64 * self.x_step).floor() as u32;
        let py = (self.row as f64 * self.y_step).floor() as u32;

        self.column += 1;
        if self.column == self.columns {
            self.column = 0;
            self.row += 1;
        }

        let item = match self.raster.pixel_at(px, py) {
            Some(rgb) => Ok(to_cone_point(rgb, self.value_distance_multiplier)),
            None => Err(ExtractError::ImageAccess {
                x: px,
                y: py,
                width: self.width,
                height: self.height,
            }),
        };
        Some(item)
    }
}
