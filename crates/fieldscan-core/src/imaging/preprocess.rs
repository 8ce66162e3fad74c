use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::{filter, morphology};

use crate::config::PreprocessOptions;

/// Normalize a cropped region for recognition.
///
/// grayscale -> optional median smoothing -> sharpen or mean-threshold
/// binarization -> optional stroke thickening. Output dimensions always equal
/// input dimensions, so token coordinates stay relative to the crop.
pub fn preprocess(crop: &RgbImage, options: &PreprocessOptions) -> GrayImage {
    let mut gray = imageops::grayscale(crop);

    if options.median_radius > 0 {
        gray = filter::median_filter(&gray, options.median_radius, options.median_radius);
    }

    if options.binarize {
        gray = binarize_mean(&gray);
    } else if options.sharpen {
        gray = filter::sharpen3x3(&gray);
    }

    if options.dilate {
        // Text is dark on a light background: eroding the light pixels widens strokes.
        gray = morphology::erode(&gray, Norm::LInf, 1);
    }

    gray
}

fn binarize_mean(gray: &GrayImage) -> GrayImage {
    let count = u64::from(gray.width()) * u64::from(gray.height());
    if count == 0 {
        return gray.clone();
    }
    let sum: u64 = gray.pixels().map(|p| u64::from(p.0[0])).sum();
    let mean = (sum / count) as u8;

    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        *pixel = if pixel.0[0] > mean { Luma([255]) } else { Luma([0]) };
    }
    out
}
