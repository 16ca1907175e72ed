use embedrt_inference::NativeBuffer;
use ndarray::{s, Array2, ArrayView1, Axis};
use tracing::trace;

use super::{validate, DistanceEngine, DistanceKind, EMBEDDING_DIM};
use crate::error::DistanceError;

/// Packed distance engine.
///
/// Copies the query row and the range rows into one contiguous
/// `(rows + 1) x 512` block, then computes every distance with array
/// operations over that block. The block is scratch memory scoped to a single
/// call.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceleratedEngine;

impl DistanceEngine for AcceleratedEngine {
    fn kind(&self) -> DistanceKind {
        DistanceKind::Accelerated
    }

    fn compute_range(
        &self,
        matrix: &[Vec<f32>],
        ai: usize,
        bi: usize,
        end: usize,
    ) -> Result<Vec<f32>, DistanceError> {
        validate(matrix, ai, bi, end)?;
        if bi == end {
            return Ok(Vec::new());
        }

        let packed = pack(matrix, ai, bi, end);
        trace!("Packed {} rows for distance computation", packed.nrows());
        NativeBuffer::scoped("distance scratch", packed, packed_distances)
            .map_err(|e| DistanceError::Scratch(e.to_string()))
    }
}

/// Row 0 is the query, rows `1..` are `matrix[bi..end]`.
fn pack(matrix: &[Vec<f32>], ai: usize, bi: usize, end: usize) -> Array2<f32> {
    let mut packed = Array2::<f32>::zeros((end - bi + 1, EMBEDDING_DIM));
    packed.row_mut(0).assign(&ArrayView1::from(&matrix[ai][..EMBEDDING_DIM]));
    for (k, row) in matrix[bi..end].iter().enumerate() {
        packed.row_mut(k + 1).assign(&ArrayView1::from(&row[..EMBEDDING_DIM]));
    }
    packed
}

fn packed_distances(packed: &Array2<f32>) -> Vec<f32> {
    let query = packed.row(0);
    let mut diff = &packed.slice(s![1.., ..]) - &query;
    diff.mapv_inplace(|t| t * t);
    diff.sum_axis(Axis(1))
        .iter()
        .map(|&sum| (sum as f64).sqrt() as f32)
        .collect()
}
