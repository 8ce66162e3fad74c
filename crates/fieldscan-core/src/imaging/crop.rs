use image::{imageops, RgbImage};

use crate::model::Region;

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)` inside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

/// Pad `region` by `tolerance` on every side and clamp to the page.
///
/// Returns `None` when nothing of the padded region lies on the page.
pub fn crop_bounds(
    page_width: u32,
    page_height: u32,
    region: &Region,
    tolerance: u32,
) -> Option<CropRect> {
    let t = i64::from(tolerance);
    let x0 = region.x.saturating_sub(t).max(0);
    let y0 = region.y.saturating_sub(t).max(0);
    let x1 = region
        .x
        .saturating_add(region.w)
        .saturating_add(t)
        .min(i64::from(page_width));
    let y1 = region
        .y
        .saturating_add(region.h)
        .saturating_add(t)
        .min(i64::from(page_height));

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    // All four values are within 0..=page dimension here.
    Some(CropRect {
        x0: x0 as u32,
        y0: y0 as u32,
        x1: x1 as u32,
        y1: y1 as u32,
    })
}

/// Copy the tolerance-padded region out of a rendered page.
///
/// `None` means the region has no pixels on this page; callers record it as
/// "no text" rather than failing.
pub fn crop_region(page: &RgbImage, region: &Region, tolerance: u32) -> Option<RgbImage> {
    let (width, height) = page.dimensions();
    let rect = crop_bounds(width, height, region, tolerance)?;
    Some(imageops::crop_imm(page, rect.x0, rect.y0, rect.width(), rect.height()).to_image())
}
