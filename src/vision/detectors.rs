use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::corners::corners_fast9;
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::features::{FeatureDetector, Features, KeyPoint, Point, Region};
use crate::vision::preprocessing;

/// Diameter of the FAST test circle
const FAST_DIAMETER: f32 = 7.0;

/// FAST-9 corners as point features
pub struct FastDetector {
    pub threshold: u8,
    /// Keep only the strongest corners (0 = keep all)
    pub max_features: usize,
}

impl Default for FastDetector {
    fn default() -> Self {
        Self {
            threshold: 20,
            max_features: 500,
        }
    }
}

impl FeatureDetector<DynamicImage> for FastDetector {
    fn detect(&self, frame: &DynamicImage) -> Result<Features> {
        let gray = preprocessing::to_grayscale(frame);
        let mut corners = corners_fast9(&gray, self.threshold);

        if self.max_features > 0 && corners.len() > self.max_features {
            corners.sort_by(|a, b| b.score.total_cmp(&a.score));
            corners.truncate(self.max_features);
            corners.sort_by_key(|c| (c.y, c.x));
        }

        let keypoints = corners
            .into_iter()
            .map(|corner| KeyPoint {
                x: corner.x as f32,
                y: corner.y as f32,
                size: FAST_DIAMETER,
                angle: 0.0,
                response: corner.score,
            })
            .collect();
        Ok(Features::Points(keypoints))
    }
}

/// Outer borders of the bright shapes of a binarised frame
pub struct ContourDetector {
    pub threshold: u8,
    pub min_points: usize,
}

impl Default for ContourDetector {
    fn default() -> Self {
        Self {
            threshold: 128,
            min_points: 8,
        }
    }
}

impl FeatureDetector<DynamicImage> for ContourDetector {
    fn detect(&self, frame: &DynamicImage) -> Result<Features> {
        let binary = preprocessing::binarize(&preprocessing::to_grayscale(frame), self.threshold);
        let regions = find_contours::<i32>(&binary)
            .into_iter()
            .filter(|contour| matches!(contour.border_type, BorderType::Outer))
            .filter(|contour| contour.points.len() >= self.min_points)
            .map(|contour| {
                Region::new(
                    contour
                        .points
                        .into_iter()
                        .map(|p| Point { x: p.x, y: p.y })
                        .collect(),
                )
            })
            .collect();
        Ok(Features::Regions(regions))
    }
}

/// Connected bright components, each reported by its boundary pixels
pub struct ComponentDetector {
    pub threshold: u8,
    pub min_area: u32,
}

impl Default for ComponentDetector {
    fn default() -> Self {
        Self {
            threshold: 128,
            min_area: 10,
        }
    }
}

impl FeatureDetector<DynamicImage> for ComponentDetector {
    fn detect(&self, frame: &DynamicImage) -> Result<Features> {
        let binary = preprocessing::binarize(&preprocessing::to_grayscale(frame), self.threshold);
        Ok(Features::Regions(find_components(&binary, self.min_area)))
    }
}

/// Label connected components (white pixels) and collect each one's boundary
pub fn find_components(binary: &GrayImage, min_area: u32) -> Vec<Region> {
    let labeled = connected_components(binary, Connectivity::Eight, Luma([0]));
    let (width, height) = labeled.dimensions();

    // label -> (pixel count, boundary points)
    let mut regions: BTreeMap<u32, (u32, Vec<Point>)> = BTreeMap::new();

    for (x, y, label) in labeled.enumerate_pixels() {
        let label_val = label[0];
        if label_val == 0 {
            continue;
        }

        let on_boundary = x == 0
            || y == 0
            || x + 1 == width
            || y + 1 == height
            || labeled.get_pixel(x - 1, y)[0] != label_val
            || labeled.get_pixel(x + 1, y)[0] != label_val
            || labeled.get_pixel(x, y - 1)[0] != label_val
            || labeled.get_pixel(x, y + 1)[0] != label_val;

        let entry = regions.entry(label_val).or_insert_with(|| (0, Vec::new()));
        entry.0 += 1;
        if on_boundary {
            entry.1.push(Point {
                x: x as i32,
                y: y as i32,
            });
        }
    }

    regions
        .into_values()
        .filter(|(count, _)| *count >= min_area)
        .map(|(_, boundary)| Region::new(boundary))
        .collect()
}
