use super::{validate, DistanceEngine, DistanceKind, EMBEDDING_DIM};
use crate::error::DistanceError;

/// Scalar distance engine with no allocation beyond the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableEngine;

impl DistanceEngine for PortableEngine {
    fn kind(&self) -> DistanceKind {
        DistanceKind::Portable
    }

    fn compute_range(
        &self,
        matrix: &[Vec<f32>],
        ai: usize,
        bi: usize,
        end: usize,
    ) -> Result<Vec<f32>, DistanceError> {
        validate(matrix, ai, bi, end)?;

        let query = &matrix[ai];
        Ok(matrix[bi..end]
            .iter()
            .map(|row| euclidean_distance(query, row))
            .collect())
    }
}

/// Euclidean distance over the first [`EMBEDDING_DIM`] elements of `a` and `b`.
///
/// Squares are summed in `f32`; the square root is taken in `f64`. Both
/// slices must already have passed `validate`.
pub(crate) fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for (x, y) in a[..EMBEDDING_DIM].iter().zip(&b[..EMBEDDING_DIM]) {
        let t = x - y;
        sum += t * t;
    }
    (sum as f64).sqrt() as f32
}
