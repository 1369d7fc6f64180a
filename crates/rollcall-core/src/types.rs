use serde::{Deserialize, Serialize};

/// Fixed-length face feature vector produced by the external recognition
/// capability. Compared positionally; probe and gallery must come from the
/// same recognition model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance to another embedding.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

/// One enrolled gallery entry: canonical identity name plus one embedding.
/// Several entries may share a `name` (one per enrollment photo); they are
/// kept separate, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownIdentity {
    pub name: String,
    pub embedding: Embedding,
}

/// Face bounding box, axis-aligned, in whatever coordinate space the
/// detector ran in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Map back to full-frame coordinates when detection ran on a
    /// downscaled frame.
    pub fn scaled(&self, factor: f32) -> BoundingBox {
        BoundingBox {
            x1: self.x1 * factor,
            y1: self.y1 * factor,
            x2: self.x2 * factor,
            y2: self.y2 * factor,
        }
    }
}

/// Six ordered 2-D points around one eye, outer corner first, following
/// the contour to the inner corner and back. The order is load-bearing for
/// the aspect-ratio formula in [`crate::liveness`].
pub type EyeContour = [(f32, f32); 6];

/// Per-face eye landmarks for one frame. Not persisted anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeLandmarks {
    pub left_eye: EyeContour,
    pub right_eye: EyeContour,
}
