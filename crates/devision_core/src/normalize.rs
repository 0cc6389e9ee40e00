//! Image decoding and percentile normalization applied before every prediction.

use crate::error::{Error, Result};
use image::DynamicImage;
use ndarray::{Array3, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

const EPS: f32 = 1e-20;

/// Percentile bounds mapped to 0 and 1 respectively.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalization {
    pub low: f32,
    pub high: f32,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            low: 1.0,
            high: 99.8,
        }
    }
}

impl Normalization {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.low)
            || !(0.0..=100.0).contains(&self.high)
            || self.low >= self.high
        {
            return Err(Error::Config(format!(
                "normalization percentiles must satisfy 0 <= low < high <= 100, got {} and {}",
                self.low, self.high
            )));
        }
        Ok(())
    }

    /// Rescale each channel so its `low` percentile maps to 0 and its `high`
    /// percentile to 1, computed over the row and column axes. Values outside
    /// the range are not clipped.
    pub fn apply(&self, image: ArrayView3<f32>) -> Array3<f32> {
        let mut out = image.to_owned();
        for mut channel in out.axis_iter_mut(Axis(2)) {
            let mut values: Vec<f32> = channel.iter().copied().collect();
            if values.is_empty() {
                continue;
            }
            values.sort_by(f32::total_cmp);
            let mi = percentile(&values, self.low);
            let ma = percentile(&values, self.high);
            let scale = ma - mi + EPS;
            channel.mapv_inplace(|v| (v - mi) / scale);
        }
        out
    }
}

/// Linear-interpolated percentile of already sorted values.
fn percentile(sorted: &[f32], q: f32) -> f32 {
    let last = sorted.len() - 1;
    let pos = (f64::from(q) / 100.0 * last as f64).clamp(0.0, last as f64);
    let lo = (pos.floor() as usize).min(last);
    let hi = (pos.ceil() as usize).min(last);
    let frac = (pos - lo as f64) as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Decode an image file into a `(row, col, channel)` float array.
pub fn load_image(path: &Path) -> Result<Array3<f32>> {
    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image_to_array(&img))
}

/// Grayscale images yield one channel, anything with colour three.
pub fn image_to_array(img: &DynamicImage) -> Array3<f32> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    if img.color().has_color() {
        let rgb = img.to_rgb32f();
        Array3::from_shape_fn((h, w, 3), |(r, c, ch)| rgb.get_pixel(c as u32, r as u32)[ch])
    } else {
        let luma = img.to_luma32f();
        Array3::from_shape_fn((h, w, 1), |(r, c, _)| luma.get_pixel(c as u32, r as u32)[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use ndarray::Array3;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(50.0, 2.0)]
    #[case(100.0, 4.0)]
    #[case(12.5, 0.5)]
    fn percentile_interpolates_linearly(#[case] q: f32, #[case] expected: f32) {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(percentile(&values, q), expected, epsilon = 1e-6);
    }

    #[test]
    fn percentile_stays_in_bounds_past_f32_precision() {
        // 2^24 + 3 values: (len - 1) is not representable as f32
        let values: Vec<f32> = (0..(1usize << 24) + 3).map(|i| i as f32).collect();
        assert_eq!(percentile(&values, 100.0), *values.last().unwrap());
        assert_eq!(percentile(&values, 0.0), 0.0);
        assert_eq!(percentile(&values, 150.0), *values.last().unwrap());
    }

    #[test]
    fn full_percentile_range_on_large_image_does_not_panic() {
        let img = Array3::<f32>::zeros((4100, 4100, 1));
        let out = Normalization {
            low: 0.0,
            high: 100.0,
        }
        .apply(img.view());
        assert_eq!(out.dim(), (4100, 4100, 1));
    }

    #[test]
    fn full_range_maps_min_to_zero_and_max_to_one() {
        let img = Array3::from_shape_vec((2, 2, 1), vec![10.0, 20.0, 30.0, 50.0]).unwrap();
        let norm = Normalization {
            low: 0.0,
            high: 100.0,
        };
        let out = norm.apply(img.view());
        assert_abs_diff_eq!(out[[0, 0, 0]], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out[[0, 1, 0]], 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(out[[1, 1, 0]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn channels_are_normalized_independently() {
        let mut img = Array3::<f32>::zeros((1, 3, 2));
        for c in 0..3 {
            img[[0, c, 0]] = c as f32;
            img[[0, c, 1]] = 100.0 * c as f32 + 7.0;
        }
        let out = Normalization {
            low: 0.0,
            high: 100.0,
        }
        .apply(img.view());
        for ch in 0..2 {
            assert_abs_diff_eq!(out[[0, 0, ch]], 0.0, epsilon = 1e-6);
            assert_abs_diff_eq!(out[[0, 2, ch]], 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn constant_image_does_not_divide_by_zero() {
        let img = Array3::from_elem((3, 3, 1), 5.0f32);
        let out = Normalization::default().apply(img.view());
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn default_percentiles_do_not_clip_outliers() {
        let mut values = vec![0.0f32; 1000];
        values[999] = 1000.0;
        let img = Array3::from_shape_vec((10, 100, 1), values).unwrap();
        let out = Normalization::default().apply(img.view());
        assert!(out[[9, 99, 0]] > 1.0);
    }

    #[rstest]
    #[case(1.0, 99.8, true)]
    #[case(50.0, 50.0, false)]
    #[case(-1.0, 10.0, false)]
    #[case(10.0, 101.0, false)]
    fn validate_checks_bounds(#[case] low: f32, #[case] high: f32, #[case] ok: bool) {
        assert_eq!(Normalization { low, high }.validate().is_ok(), ok);
    }

    #[test]
    fn grayscale_and_colour_channel_counts() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 2, Luma([255])));
        let arr = image_to_array(&gray);
        assert_eq!(arr.dim(), (2, 4, 1));
        assert_abs_diff_eq!(arr[[1, 3, 0]], 1.0, epsilon = 1e-6);

        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 5, Rgb([0, 255, 0])));
        let arr = image_to_array(&rgb);
        assert_eq!(arr.dim(), (5, 3, 3));
        assert_abs_diff_eq!(arr[[4, 2, 1]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn load_image_reports_missing_file() {
        let err = load_image(Path::new("/definitely/not/here.tif")).unwrap_err();
        assert!(matches!(err, Error::ImageLoad { .. }));
    }
}
