use image::{DynamicImage, GrayImage, Luma};

use crate::error::Result;
use crate::features::{Computed, DescriptorExtractor, Descriptors, KeyPoint};
use crate::frame::Frame;
use crate::vision::preprocessing;

/// Oriented grid of grey samples around each keypoint, zero-mean and unit-norm.
/// Keypoints whose grid leaves the frame are dropped.
pub struct PatchExtractor {
    /// Samples per side
    pub grid: u32,
    /// Lower bound for the sampling half-width
    pub min_radius: f32,
}

impl Default for PatchExtractor {
    fn default() -> Self {
        Self {
            grid: 8,
            min_radius: 4.0,
        }
    }
}

impl PatchExtractor {
    fn sample(&self, gray: &GrayImage, keypoint: &KeyPoint) -> Option<Vec<f32>> {
        let (width, height) = gray.dimensions();
        let radius = (keypoint.size / 2.0).max(self.min_radius);
        let step = if self.grid > 1 {
            2.0 * radius / (self.grid - 1) as f32
        } else {
            0.0
        };
        let (sin, cos) = keypoint.angle.to_radians().sin_cos();

        let mut values = Vec::with_capacity((self.grid * self.grid) as usize);
        for j in 0..self.grid {
            for i in 0..self.grid {
                let u = -radius + i as f32 * step;
                let v = -radius + j as f32 * step;
                let sx = (keypoint.x + u * cos - v * sin).round();
                let sy = (keypoint.y + u * sin + v * cos).round();
                if sx < 0.0 || sy < 0.0 || sx >= width as f32 || sy >= height as f32 {
                    return None;
                }
                values.push(gray.get_pixel(sx as u32, sy as u32)[0] as f32);
            }
        }

        let mean = values.iter().sum::<f32>() / values.len() as f32;
        values.iter_mut().for_each(|v| *v -= mean);
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            values.iter_mut().for_each(|v| *v /= norm);
        }
        Some(values)
    }
}

impl DescriptorExtractor<DynamicImage> for PatchExtractor {
    fn compute(&self, frame: &DynamicImage, keypoints: &[KeyPoint]) -> Result<Computed> {
        let gray = preprocessing::to_grayscale(frame);
        let mut computed = Computed::new((self.grid * self.grid) as usize);

        for (index, keypoint) in keypoints.iter().enumerate() {
            if let Some(row) = self.sample(&gray, keypoint) {
                computed.push(index, *keypoint, &row)?;
            }
        }

        Ok(computed)
    }
}

/// Mean and standard deviation of the grey levels in each keypoint's window,
/// scaled to `[0, 1]`. The window is clipped to the frame, so nothing is dropped.
#[derive(Default)]
pub struct MomentsExtractor;

impl DescriptorExtractor<DynamicImage> for MomentsExtractor {
    fn compute(&self, frame: &DynamicImage, keypoints: &[KeyPoint]) -> Result<Computed> {
        let gray = preprocessing::to_grayscale(frame);
        let (width, height) = gray.dimensions();
        let mut descriptors = Descriptors::new(2);

        for keypoint in keypoints {
            let radius = (keypoint.size / 2.0).max(1.0);
            let x0 = (keypoint.x - radius).floor().max(0.0) as u32;
            let y0 = (keypoint.y - radius).floor().max(0.0) as u32;
            let x1 = ((keypoint.x + radius).ceil().max(0.0) as u32).min(width);
            let y1 = ((keypoint.y + radius).ceil().max(0.0) as u32).min(height);

            let mut count = 0u32;
            let mut sum = 0.0f64;
            let mut sum_sq = 0.0f64;
            for y in y0..y1 {
                for x in x0..x1 {
                    let v = gray.get_pixel(x, y)[0] as f64 / 255.0;
                    sum += v;
                    sum_sq += v * v;
                    count += 1;
                }
            }

            let row = if count == 0 {
                [0.0, 0.0]
            } else {
                let mean = sum / count as f64;
                let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
                [mean as f32, variance.sqrt() as f32]
            };
            descriptors.push_row(&row)?;
        }

        Ok(Computed::complete(keypoints, descriptors))
    }
}

/// Render a descriptor table as a grey image, one pixel row per descriptor,
/// stretched to the full grey range
pub fn descriptor_image(descriptors: &Descriptors) -> DynamicImage {
    let (rows, cols) = (descriptors.rows(), descriptors.cols());
    if rows == 0 || cols == 0 {
        return DynamicImage::empty();
    }

    let data = descriptors.as_slice();
    let (min, max) = data
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let span = max - min;

    let image = GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        let v = data[y as usize * cols + x as usize];
        let level = if span > f32::EPSILON {
            (v - min) / span * 255.0
        } else {
            0.0
        };
        Luma([level.round() as u8])
    });
    DynamicImage::ImageLuma8(image)
}
