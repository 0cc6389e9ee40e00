use devision_core::{LabelMask, Normalization, normalize::load_image};
use eframe::egui::ColorImage;
use image::{RgbaImage, imageops::FilterType};
use ndarray::{ArrayView3, Axis};
use std::path::Path;

/// Percentile-stretched preview of a source image, scaled to `size`².
pub fn source_preview(
    path: &Path,
    normalization: Normalization,
    size: u32,
) -> devision_core::error::Result<ColorImage> {
    let image = load_image(path)?;
    let stretched = normalization.apply(image.view());
    let rgba = to_rgba(stretched.view());
    let thumb = image::imageops::resize(&rgba, size, size, FilterType::Triangle);
    Ok(to_color_image(thumb))
}

/// Label mask with one colour per object, scaled to `size`².
pub fn mask_preview(labels: &LabelMask, size: u32) -> ColorImage {
    let (rows, cols) = labels.dim();
    let rgba = RgbaImage::from_fn(cols as u32, rows as u32, |x, y| {
        image::Rgba(label_colour(labels[[y as usize, x as usize]]))
    });
    let thumb = image::imageops::resize(&rgba, size, size, FilterType::Nearest);
    to_color_image(thumb)
}

fn to_rgba(image: ArrayView3<f32>) -> RgbaImage {
    let (rows, cols, channels) = image.dim();
    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    RgbaImage::from_fn(cols as u32, rows as u32, |x, y| {
        let px = image.index_axis(Axis(0), y as usize);
        let px = px.index_axis(Axis(0), x as usize);
        if channels >= 3 {
            image::Rgba([to_u8(px[0]), to_u8(px[1]), to_u8(px[2]), 255])
        } else {
            let g = to_u8(px.mean().unwrap_or(0.0));
            image::Rgba([g, g, g, 255])
        }
    })
}

/// Background is black; objects get a stable bright colour from their label.
fn label_colour(label: u32) -> [u8; 4] {
    if label == 0 {
        return [0, 0, 0, 255];
    }
    let h = label.wrapping_mul(0x9E37_79B9);
    let channel = |shift: u32| 64 + ((h >> shift) & 0xFF) as u8 % 192;
    [channel(0), channel(8), channel(16), 255]
}

fn to_color_image(img: RgbaImage) -> ColorImage {
    let size = [img.width() as usize, img.height() as usize];
    ColorImage::from_rgba_unmultiplied(size, img.as_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, array};
    use rstest::rstest;

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(65_535)]
    fn objects_are_never_drawn_black(#[case] label: u32) {
        let [r, g, b, a] = label_colour(label);
        assert!(r >= 64 && g >= 64 && b >= 64);
        assert_eq!(a, 255);
    }

    #[test]
    fn background_is_black() {
        assert_eq!(label_colour(0), [0, 0, 0, 255]);
    }

    #[test]
    fn mask_preview_has_requested_size() {
        let img = mask_preview(&array![[0u32, 1], [2, 2]], 16);
        assert_eq!(img.size, [16, 16]);
    }

    #[test]
    fn grayscale_values_are_clamped() {
        let arr = Array3::from_shape_vec((1, 3, 1), vec![-0.5, 0.5, 2.0]).unwrap();
        let rgba = to_rgba(arr.view());
        assert_eq!(rgba.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(rgba.get_pixel(1, 0).0, [128, 128, 128, 255]);
        assert_eq!(rgba.get_pixel(2, 0).0, [255, 255, 255, 255]);
    }
}
