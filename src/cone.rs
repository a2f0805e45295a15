//! Mapping of colors into the HSV cone used as clustering space.
//!
//! Hue sets the angle around the axis, `saturation * value` the distance from it
//! and value the height. Muted and dark colors therefore sit close to the axis
//! whatever their hue, which matters because hue is unstable near zero
//! saturation or value.

use std::f64::consts::TAU;

use palette::{FromColor, Hsv, Srgb, encoding};

use crate::kmeans::Point;

/// HSV with every channel in `[0, 1]` (hue included).
pub type HsvColor = Hsv<encoding::Srgb, f64>;

/// A sampled pixel placed in cone space, carrying its original color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConePoint {
    pub position: [f64; 3],
    pub hsv: HsvColor,
    pub rgb: Srgb<u8>,
}

impl ConePoint {
    /// Hue as a fraction of a full turn
    pub fn hue(&self) -> f64 {
        hue_fraction(&self.hsv)
    }

    pub fn saturation(&self) -> f64 {
        self.hsv.saturation
    }

    pub fn value(&self) -> f64 {
        self.hsv.value
    }
}

impl Point for ConePoint {
    fn position(&self) -> [f64; 3] {
        self.position
    }
}

pub fn rgb_to_hsv(rgb: Srgb<u8>) -> HsvColor {
    HsvColor::from_color(rgb.into_format::<f64>())
}

fn hue_fraction(hsv: &HsvColor) -> f64 {
    hsv.hue.into_positive_degrees() / 360.0
}

/// Cone coordinates of an HSV color.
pub fn cone_position(hsv: &HsvColor, value_distance_multiplier: f64) -> [f64; 3] {
    let radius = hsv.saturation * hsv.value;
    let angle = hue_fraction(hsv) * TAU;

    [
        angle.sin() * radius,
        angle.cos() * radius,
        hsv.value * value_distance_multiplier,
    ]
}

pub fn to_cone_point(rgb: Srgb<u8>, value_distance_multiplier: f64) -> ConePoint {
    let hsv = rgb_to_hsv(rgb);

    ConePoint {
        position: cone_position(&hsv, value_distance_multiplier),
        hsv,
        rgb,
    }
}
