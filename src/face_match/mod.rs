//! Face matching
//!
//! Compares face embeddings against a single reference face by Euclidean
//! distance. The reference is taken from a still image once at startup and
//! never changes afterwards.

use image::RgbImage;

use crate::error::{Result, VisionError};
use crate::ml::{FaceAnalyzer, FaceEmbedding};

mod pipeline;

pub use pipeline::{
    finish_face_match, run_face_match, start_face_match, FaceMatchExit, FaceMatchPipeline,
    FaceResult, FrameThrottle, RunSummary,
};

/// Default maximum distance for a match
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Euclidean distance between two embeddings, `None` if their lengths differ
pub fn euclidean_distance(a: &FaceEmbedding, b: &FaceEmbedding) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let sum: f32 = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| (x - y) * (x - y))
        .sum();
    Some(sum.sqrt())
}

/// Whether two embeddings belong to the same face.
///
/// Returns `None` (no decision) when either embedding is missing or the
/// lengths differ; otherwise `Some(distance < tolerance)`.
pub fn embeddings_match(
    reference: Option<&FaceEmbedding>,
    candidate: Option<&FaceEmbedding>,
    tolerance: f32,
) -> Option<bool> {
    let distance = euclidean_distance(reference?, candidate?)?;
    Some(distance < tolerance)
}

/// Outcome of comparing one face against the reference
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchVerdict {
    pub matched: bool,
    pub distance: f32,
}

impl MatchVerdict {
    pub fn label(&self) -> &'static str {
        if self.matched {
            "Match"
        } else {
            "No Match"
        }
    }
}

/// Holds the reference embedding for the whole run
#[derive(Debug)]
pub struct FaceMatcher {
    reference: FaceEmbedding,
    tolerance: f32,
}

impl FaceMatcher {
    pub fn new(reference: FaceEmbedding, tolerance: f32) -> Self {
        Self {
            reference,
            tolerance,
        }
    }

    /// Extract the reference embedding from a still image.
    ///
    /// Fails with [`VisionError::NoFaceInReference`] when no face is found.
    /// With several faces the first one is used.
    pub fn from_reference<A: FaceAnalyzer + ?Sized>(
        analyzer: &mut A,
        image: &RgbImage,
        tolerance: f32,
    ) -> Result<Self> {
        let mut faces = analyzer.analyze(image)?;
        if faces.is_empty() {
            return Err(VisionError::NoFaceInReference);
        }
        if faces.len() > 1 {
            log::warn!(
                "Reference image contains {} faces, using the first one",
                faces.len()
            );
        }

        let reference = faces.swap_remove(0).embedding;
        log::info!("Reference image face encoding extracted.");
        Ok(Self::new(reference, tolerance))
    }

    pub fn reference(&self) -> &FaceEmbedding {
        &self.reference
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Compare a face against the reference, `None` on length mismatch
    pub fn compare(&self, candidate: &FaceEmbedding) -> Option<MatchVerdict> {
        let matched = embeddings_match(Some(&self.reference), Some(candidate), self.tolerance)?;
        Some(MatchVerdict {
            matched,
            distance: euclidean_distance(&self.reference, candidate)?,
        })
    }
}
