//! Photometric operators: pixel values change, vertices pass through

use image::RgbImage;
use image::imageops;
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::{Operator, OperatorClass, Range, Sample};
use crate::error::{AugmentError, Result};

/// Below this sigma a blur is invisible at 8 bits
const MIN_BLUR_SIGMA: f64 = 0.05;

#[inline]
fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Apply `f` to every channel value
fn map_channels(img: &mut RgbImage, f: impl Fn(u8) -> u8) {
    for px in img.pixels_mut() {
        for c in px.0.iter_mut() {
            *c = f(*c);
        }
    }
}

/// Brightness: multiply every channel by a drawn factor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Multiply {
    pub factor: Range,
}

impl Operator for Multiply {
    fn name(&self) -> &'static str {
        "multiply"
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::Photometric
    }

    fn apply(&self, mut sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        let factor = self.factor.draw_within(self.name(), rng, 0.0, f64::MAX)?;
        map_channels(&mut sample.rgb, |v| to_u8(v as f64 * factor));
        Ok(sample)
    }
}

/// Gaussian blur with a drawn sigma
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianBlur {
    pub sigma: Range,
}

impl Operator for GaussianBlur {
    fn name(&self) -> &'static str {
        "gaussian_blur"
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::Photometric
    }

    fn apply(&self, mut sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        let sigma = self.sigma.draw_within(self.name(), rng, 0.0, f64::MAX)?;
        if sigma >= MIN_BLUR_SIGMA {
            let sigma = sigma as f32;
            if !sigma.is_finite() {
                return Err(AugmentError::invalid(
                    self.name(),
                    format!("sigma {sigma} is out of range"),
                ));
            }
            sample.rgb = imageops::blur(&sample.rgb, sigma);
        }
        Ok(sample)
    }
}

/// Zero-mean gaussian noise; `scale` is the standard deviation in 0-255 units
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdditiveGaussianNoise {
    pub scale: Range,
    /// Independent noise per channel instead of one value per pixel
    #[serde(default)]
    pub per_channel: bool,
}

impl Operator for AdditiveGaussianNoise {
    fn name(&self) -> &'static str {
        "additive_gaussian_noise"
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::Photometric
    }

    fn apply(&self, mut sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        let scale = self.scale.draw_within(self.name(), rng, 0.0, 255.0)?;
        if scale == 0.0 {
            return Ok(sample);
        }

        for px in sample.rgb.pixels_mut() {
            if self.per_channel {
                for c in px.0.iter_mut() {
                    let n: f64 = rng.sample(StandardNormal);
                    *c = to_u8(*c as f64 + n * scale);
                }
            } else {
                let n: f64 = rng.sample(StandardNormal);
                for c in px.0.iter_mut() {
                    *c = to_u8(*c as f64 + n * scale);
                }
            }
        }
        Ok(sample)
    }
}

/// Contrast around mid-grey: `v' = 127.5 + alpha * (v - 127.5)`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearContrast {
    pub alpha: Range,
}

impl Operator for LinearContrast {
    fn name(&self) -> &'static str {
        "linear_contrast"
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::Photometric
    }

    fn apply(&self, mut sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        let alpha = self.alpha.draw_within(self.name(), rng, 0.0, f64::MAX)?;
        map_channels(&mut sample.rgb, |v| to_u8(127.5 + alpha * (v as f64 - 127.5)));
        Ok(sample)
    }
}

/// Blend toward luma; 0 keeps colour, 1 is fully grey
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Desaturate {
    pub amount: Range,
}

impl Operator for Desaturate {
    fn name(&self) -> &'static str {
        "desaturate"
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::Photometric
    }

    fn apply(&self, mut sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        let amount = self.amount.draw_within(self.name(), rng, 0.0, 1.0)?;
        for px in sample.rgb.pixels_mut() {
            let [r, g, b] = px.0.map(f64::from);
            let luma = 0.299 * r + 0.587 * g + 0.114 * b;
            px.0 = [r, g, b].map(|c| to_u8(c + amount * (luma - c)));
        }
        Ok(sample)
    }
}
