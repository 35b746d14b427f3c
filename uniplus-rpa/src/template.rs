//! Grayscale template matching (zero-normalized cross-correlation).
//!
//! This is the primary locate strategy: find the screen region most similar
//! to a reference image and report its center plus a similarity score in
//! `[-1, 1]`. Pure pixel math, no screen access, so it is unit-testable.

use image::{GrayImage, RgbaImage};

use crate::screen::{Frame, ScreenPoint, TemplateHit};

/// Convert a captured RGBA frame to grayscale for matching.
pub fn frame_to_gray(frame: &Frame) -> Option<GrayImage> {
    let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())?;
    Some(image::imageops::grayscale(&rgba))
}

/// Slide `needle` over `haystack` and return the best-scoring position.
///
/// Returns `None` when the needle does not fit inside the haystack or either
/// image is empty. Flat (zero-variance) windows score 0 so a blank region
/// never outranks a real match.
pub fn best_match(haystack: &GrayImage, needle: &GrayImage) -> Option<TemplateHit> {
    let (hw, hh) = haystack.dimensions();
    let (nw, nh) = needle.dimensions();
    if nw == 0 || nh == 0 || nw > hw || nh > hh {
        return None;
    }

    let n = (nw * nh) as f64;
    let needle_px: Vec<f64> = needle.pixels().map(|p| p.0[0] as f64).collect();
    let needle_mean = needle_px.iter().sum::<f64>() / n;
    let needle_dev: Vec<f64> = needle_px.iter().map(|v| v - needle_mean).collect();
    let needle_norm = needle_dev.iter().map(|v| v * v).sum::<f64>().sqrt();
    if needle_norm == 0.0 {
        return None;
    }

    let mut best: Option<(u32, u32, f64)> = None;
    for y in 0..=(hh - nh) {
        for x in 0..=(hw - nw) {
            let mut window = Vec::with_capacity(needle_px.len());
            for ny in 0..nh {
                for nx in 0..nw {
                    window.push(haystack.get_pixel(x + nx, y + ny).0[0] as f64);
                }
            }
            let mean = window.iter().sum::<f64>() / n;
            let mut dot = 0.0;
            let mut norm = 0.0;
            for (w, nd) in window.iter().zip(&needle_dev) {
                let wd = w - mean;
                dot += wd * nd;
                norm += wd * wd;
            }
            let score = if norm == 0.0 {
                0.0
            } else {
                dot / (norm.sqrt() * needle_norm)
            };
            match best {
                Some((_, _, s)) if s >= score => {}
                _ => best = Some((x, y, score)),
            }
        }
    }

    best.map(|(x, y, score)| TemplateHit {
        point: ScreenPoint::new((x + nw / 2) as i32, (y + nh / 2) as i32),
        score: score as f32,
    })
}
