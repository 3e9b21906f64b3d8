//! Two-phase feature pipelines: a detector finds features on a frame, an
//! extractor turns the frame and its features into a descriptor table.
//!
//! Strategies are resolved by name through a [`StrategyRegistry`] rather than
//! a global factory, so tests and callers can inject their own.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::frame::Frame;

/// A localized point feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the meaningful neighbourhood
    pub size: f32,
    /// Orientation in degrees, `[0, 360)`
    pub angle: f32,
    pub response: f32,
}

impl KeyPoint {
    pub fn new(x: f32, y: f32, size: f32) -> Self {
        Self {
            x,
            y,
            size,
            angle: 0.0,
            response: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Ellipse fitted to a region, semi-axes in pixels and angle in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub center_x: f32,
    pub center_y: f32,
    pub semi_major: f32,
    pub semi_minor: f32,
    pub angle: f32,
}

impl Ellipse {
    pub fn area(&self) -> f32 {
        std::f32::consts::PI * self.semi_major * self.semi_minor
    }
}

/// A closed boundary, as a sequence of points
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Region {
    pub points: Vec<Point>,
}

impl Region {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Fit an ellipse from the second moments of the boundary points.
    ///
    /// Points spread evenly on an ellipse boundary have variance `a²/2` along
    /// each principal axis, which gives the semi-axes.
    pub fn fit_ellipse(&self) -> Ellipse {
        if self.points.is_empty() {
            return Ellipse {
                center_x: 0.0,
                center_y: 0.0,
                semi_major: 0.0,
                semi_minor: 0.0,
                angle: 0.0,
            };
        }

        let n = self.points.len() as f64;
        let (sum_x, sum_y) = self
            .points
            .iter()
            .fold((0.0f64, 0.0f64), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
        let (cx, cy) = (sum_x / n, sum_y / n);

        let (mut sxx, mut syy, mut sxy) = (0.0f64, 0.0f64, 0.0f64);
        for p in &self.points {
            let dx = p.x as f64 - cx;
            let dy = p.y as f64 - cy;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }
        sxx /= n;
        syy /= n;
        sxy /= n;

        let mean = (sxx + syy) / 2.0;
        let spread = (((sxx - syy) / 2.0).powi(2) + sxy * sxy).sqrt();
        let major_var = mean + spread;
        let minor_var = (mean - spread).max(0.0);

        let angle = (0.5 * (2.0 * sxy).atan2(sxx - syy)).to_degrees();

        Ellipse {
            center_x: cx as f32,
            center_y: cy as f32,
            semi_major: (2.0 * major_var).sqrt() as f32,
            semi_minor: (2.0 * minor_var).sqrt() as f32,
            angle: angle.rem_euclid(360.0) as f32,
        }
    }

    /// Normalize to point-scale-orientation form: the keypoint sits at the
    /// ellipse centre, its size is the diameter of the circle with the
    /// ellipse's area.
    pub fn to_keypoint(&self) -> KeyPoint {
        let ellipse = self.fit_ellipse();
        let diameter = 2.0 * (ellipse.semi_major * ellipse.semi_minor).sqrt();
        KeyPoint {
            x: ellipse.center_x,
            y: ellipse.center_y,
            size: diameter.max(1.0),
            angle: ellipse.angle,
            response: 0.0,
        }
    }
}

/// What a detector found
#[derive(Debug, Clone, PartialEq)]
pub enum Features {
    Points(Vec<KeyPoint>),
    Regions(Vec<Region>),
}

impl Features {
    pub fn len(&self) -> usize {
        match self {
            Features::Points(points) => points.len(),
            Features::Regions(regions) => regions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point features as-is; regions are normalized one keypoint per region
    pub fn to_keypoints(&self) -> Vec<KeyPoint> {
        match self {
            Features::Points(points) => points.clone(),
            Features::Regions(regions) => regions.iter().map(Region::to_keypoint).collect(),
        }
    }
}

/// Row-per-feature descriptor table.
///
/// The row count is tracked on its own, so a zero-width table still has one
/// row per feature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Descriptors {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Descriptors {
    pub fn new(cols: usize) -> Self {
        Self {
            rows: 0,
            cols,
            data: Vec::new(),
        }
    }

    pub fn from_rows(cols: usize, rows: Vec<Vec<f32>>) -> Result<Self> {
        let mut table = Self::new(cols);
        for row in rows {
            table.push_row(&row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: &[f32]) -> Result<()> {
        if row.len() != self.cols {
            return Err(anyhow::anyhow!(
                "descriptor row has {} columns, table expects {}",
                row.len(),
                self.cols
            )
            .into());
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    fn push_zero_row(&mut self) {
        self.data.extend(std::iter::repeat(0.0).take(self.cols));
        self.rows += 1;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows() {
            return None;
        }
        let start = index * self.cols;
        Some(&self.data[start..start + self.cols])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Extractor output: for every kept keypoint, its index in the input slice,
/// the keypoint as the extractor refined it, and one descriptor row
#[derive(Debug, Clone, PartialEq)]
pub struct Computed {
    pub indices: Vec<usize>,
    pub keypoints: Vec<KeyPoint>,
    pub descriptors: Descriptors,
}

impl Computed {
    pub fn new(cols: usize) -> Self {
        Self {
            indices: Vec::new(),
            keypoints: Vec::new(),
            descriptors: Descriptors::new(cols),
        }
    }

    /// Output that kept every input keypoint unchanged
    pub fn complete(keypoints: &[KeyPoint], descriptors: Descriptors) -> Self {
        Self {
            indices: (0..keypoints.len()).collect(),
            keypoints: keypoints.to_vec(),
            descriptors,
        }
    }

    /// Record the row for input keypoint `index`
    pub fn push(&mut self, index: usize, keypoint: KeyPoint, row: &[f32]) -> Result<()> {
        self.descriptors.push_row(row)?;
        self.indices.push(index);
        self.keypoints.push(keypoint);
        Ok(())
    }
}

pub trait FeatureDetector<F>: Send + Sync {
    fn detect(&self, frame: &F) -> Result<Features>;
}

/// Computes descriptors for keypoints.
///
/// An extractor may drop keypoints it cannot describe and may refine the ones
/// it keeps (position, size, angle). Each kept row is tied to its input
/// keypoint through `Computed::indices`, in increasing order.
pub trait DescriptorExtractor<F>: Send + Sync {
    fn compute(&self, frame: &F, keypoints: &[KeyPoint]) -> Result<Computed>;
}

/// Re-align extractor output to the input keypoints.
///
/// Dropped keypoints get an all-zero row so row `i` always describes input
/// keypoint `i`. The zero rows carry no information; callers that care must
/// treat them as missing. Output whose indices are out of range, not
/// increasing, or not one per row is rejected.
pub fn align_descriptors(input: &[KeyPoint], computed: Computed) -> Result<Descriptors> {
    let Computed {
        indices,
        descriptors,
        ..
    } = computed;

    if indices.len() != descriptors.rows() {
        return Err(anyhow::anyhow!(
            "extractor returned {} rows for {} kept keypoints",
            descriptors.rows(),
            indices.len()
        )
        .into());
    }
    if let Some(bad) = indices
        .iter()
        .enumerate()
        .find(|(i, index)| **index >= input.len() || (*i > 0 && indices[i - 1] >= **index))
    {
        return Err(anyhow::anyhow!(
            "extractor returned keypoint index {} out of order or out of range ({} inputs)",
            bad.1,
            input.len()
        )
        .into());
    }

    if indices.len() == input.len() {
        return Ok(descriptors);
    }

    let mut aligned = Descriptors::new(descriptors.cols());
    let mut kept = indices.iter().enumerate().peekable();
    for position in 0..input.len() {
        match kept.next_if(|(_, index)| **index == position) {
            Some((row, _)) => {
                let values = descriptors.row(row).unwrap_or(&[]);
                aligned.data.extend_from_slice(values);
                aligned.rows += 1;
            }
            None => aligned.push_zero_row(),
        }
    }

    debug!(
        dropped = input.len() - indices.len(),
        total = input.len(),
        "zero-filled descriptor rows for dropped keypoints"
    );

    Ok(aligned)
}

/// Named detectors and extractors
pub struct StrategyRegistry<F> {
    detectors: HashMap<String, Arc<dyn FeatureDetector<F>>>,
    extractors: HashMap<String, Arc<dyn DescriptorExtractor<F>>>,
}

impl<F> Clone for StrategyRegistry<F> {
    fn clone(&self) -> Self {
        Self {
            detectors: self.detectors.clone(),
            extractors: self.extractors.clone(),
        }
    }
}

impl<F: Frame> StrategyRegistry<F> {
    pub fn new() -> Self {
        Self {
            detectors: HashMap::new(),
            extractors: HashMap::new(),
        }
    }

    pub fn with_detector(mut self, name: &str, detector: impl FeatureDetector<F> + 'static) -> Self {
        self.register_detector(name, Arc::new(detector));
        self
    }

    pub fn with_extractor(mut self, name: &str, extractor: impl DescriptorExtractor<F> + 'static) -> Self {
        self.register_extractor(name, Arc::new(extractor));
        self
    }

    pub fn register_detector(&mut self, name: &str, detector: Arc<dyn FeatureDetector<F>>) {
        self.detectors.insert(name.to_uppercase(), detector);
    }

    pub fn register_extractor(&mut self, name: &str, extractor: Arc<dyn DescriptorExtractor<F>>) {
        self.extractors.insert(name.to_uppercase(), extractor);
    }

    pub fn detector(&self, name: &str) -> Result<Arc<dyn FeatureDetector<F>>> {
        self.detectors
            .get(&name.to_uppercase())
            .cloned()
            .ok_or_else(|| PipelineError::UnknownStrategy {
                kind: "detector",
                name: name.to_string(),
            })
    }

    pub fn extractor(&self, name: &str) -> Result<Arc<dyn DescriptorExtractor<F>>> {
        self.extractors
            .get(&name.to_uppercase())
            .cloned()
            .ok_or_else(|| PipelineError::UnknownStrategy {
                kind: "extractor",
                name: name.to_string(),
            })
    }

    /// Sorted names of the registered detectors
    pub fn detector_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.detectors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Sorted names of the registered extractors
    pub fn extractor_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.extractors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run a named detector against a frame
    pub fn detect(&self, name: &str, frame: F) -> Result<Detected<F>> {
        let features = self.detector(name)?.detect(&frame)?;
        debug!(detector = name, found = features.len(), "detected features");
        Ok(Detected::from_frame_then_features(frame, features))
    }
}

impl<F: Frame> Default for StrategyRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// A frame paired with the features detected on it
#[derive(Debug, Clone, PartialEq)]
pub struct Detected<F> {
    frame: F,
    features: Features,
}

impl<F: Frame> Detected<F> {
    pub fn from_frame_then_features(frame: F, features: Features) -> Self {
        Self { frame, features }
    }

    pub fn from_features_then_frame(features: Features, frame: F) -> Self {
        Self::from_frame_then_features(frame, features)
    }

    pub fn frame(&self) -> &F {
        &self.frame
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    /// Keep the features, pair them with another frame
    pub fn with_frame(self, frame: F) -> Self {
        Self::from_features_then_frame(self.features, frame)
    }

    /// End the pipeline early, yielding the features and discarding the frame
    pub fn into_features(self) -> Features {
        self.features
    }

    pub fn into_parts(self) -> (F, Features) {
        (self.frame, self.features)
    }

    /// Run a named extractor; the table has exactly one row per feature
    pub fn extract(&self, registry: &StrategyRegistry<F>, name: &str) -> Result<Descriptors> {
        let extractor = registry.extractor(name)?;
        let keypoints = self.features.to_keypoints();
        let computed = extractor.compute(&self.frame, &keypoints)?;
        align_descriptors(&keypoints, computed)
    }
}
