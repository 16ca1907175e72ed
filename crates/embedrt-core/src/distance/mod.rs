//! Batch Euclidean distance over 512-dimensional embeddings.
//!
//! Two interchangeable engines implement [`DistanceEngine`]:
//! - [`PortableEngine`]: a plain scalar loop, no extra allocation
//! - [`AcceleratedEngine`]: packs the rows into one contiguous ndarray block
//!   and computes all distances with vectorized array operations
//!
//! Both validate inputs the same way and agree to within float rounding, so
//! callers pick one through [`DistanceKind`] (usually from configuration).

mod accelerated;
mod portable;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DistanceError;

pub use accelerated::AcceleratedEngine;
pub use portable::PortableEngine;

/// Length of every embedding vector.
pub const EMBEDDING_DIM: usize = 512;

/// Computes distances from one vector to a contiguous range of vectors.
pub trait DistanceEngine: Send + Sync {
    /// Which implementation this is.
    fn kind(&self) -> DistanceKind;

    /// Distances from `matrix[ai]` to each of `matrix[bi..end]`.
    ///
    /// `result[k]` belongs to row `bi + k`. An empty range returns an empty
    /// vector; the query row itself, if inside the range, yields exactly `0.0`.
    fn compute_range(
        &self,
        matrix: &[Vec<f32>],
        ai: usize,
        bi: usize,
        end: usize,
    ) -> Result<Vec<f32>, DistanceError>;
}

/// Selects a [`DistanceEngine`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceKind {
    #[default]
    Portable,
    Accelerated,
}

impl DistanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceKind::Portable => "portable",
            DistanceKind::Accelerated => "accelerated",
        }
    }
}

impl fmt::Display for DistanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portable" | "scalar" => Ok(DistanceKind::Portable),
            "accelerated" | "packed" => Ok(DistanceKind::Accelerated),
            other => Err(format!("unknown distance engine '{}'", other)),
        }
    }
}

/// Returns the engine for `kind`.
pub fn engine_for(kind: DistanceKind) -> Box<dyn DistanceEngine> {
    match kind {
        DistanceKind::Portable => Box::new(PortableEngine),
        DistanceKind::Accelerated => Box::new(AcceleratedEngine),
    }
}

/// Checks indices and the length of every row the computation will read.
pub(crate) fn validate(matrix: &[Vec<f32>], ai: usize, bi: usize, end: usize) -> Result<(), DistanceError> {
    let len = matrix.len();
    if ai >= len {
        return Err(DistanceError::IndexOutOfRange { index: ai, len });
    }
    if bi > end || end > len {
        return Err(DistanceError::InvalidRange { start: bi, end, len });
    }

    std::iter::once(ai)
        .chain(bi..end)
        .try_for_each(|row| match matrix[row].len() {
            EMBEDDING_DIM => Ok(()),
            actual => Err(DistanceError::DimensionMismatch {
                row,
                expected: EMBEDDING_DIM,
                actual,
            }),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::portable::euclidean_distance;
    use pretty_assertions::assert_eq;

    /// Deterministic pseudo-random matrix.
    fn matrix(rows: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (0..rows)
            .map(|_| {
                (0..EMBEDDING_DIM)
                    .map(|_| {
                        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                        ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
                    })
                    .collect()
            })
            .collect()
    }

    fn unit(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[axis] = 1.0;
        v
    }

    fn engines() -> Vec<Box<dyn DistanceEngine>> {
        vec![engine_for(DistanceKind::Portable), engine_for(DistanceKind::Accelerated)]
    }

    #[test]
    fn test_unit_vectors() {
        let m = vec![unit(0), unit(1)];
        for engine in engines() {
            let d = engine.compute_range(&m, 0, 0, 2).unwrap();
            assert_eq!(d.len(), 2);
            assert_eq!(d[0], 0.0, "{}", engine.kind());
            assert!((d[1] - 2f32.sqrt()).abs() < 1e-6, "{}: got {}", engine.kind(), d[1]);
        }
    }

    #[test]
    fn test_self_distance_is_exact_zero() {
        let m = matrix(8, 7);
        for engine in engines() {
            for ai in 0..m.len() {
                assert_eq!(engine.compute_range(&m, ai, ai, ai + 1).unwrap(), vec![0.0]);
            }
        }
    }

    #[test]
    fn test_empty_range() {
        let m = matrix(4, 1);
        for engine in engines() {
            assert_eq!(engine.compute_range(&m, 1, 2, 2).unwrap(), Vec::<f32>::new());
            assert_eq!(engine.compute_range(&m, 0, 4, 4).unwrap(), Vec::<f32>::new());
        }
    }

    #[test]
    fn test_engines_agree() {
        let m = matrix(64, 42);
        let portable = PortableEngine.compute_range(&m, 3, 0, 64).unwrap();
        let accelerated = AcceleratedEngine.compute_range(&m, 3, 0, 64).unwrap();

        assert_eq!(portable.len(), accelerated.len());
        for (k, (p, a)) in portable.iter().zip(&accelerated).enumerate() {
            let scale = p.abs().max(f32::MIN_POSITIVE);
            assert!((p - a).abs() / scale <= 1e-5, "row {k}: portable {p}, accelerated {a}");
        }
    }

    #[test]
    fn test_result_index_maps_to_source_row() {
        let m = matrix(10, 9);
        for engine in engines() {
            let d = engine.compute_range(&m, 0, 4, 9).unwrap();
            assert_eq!(d.len(), 5);
            for (k, dist) in d.iter().enumerate() {
                let expected = euclidean_distance(&m[0], &m[4 + k]);
                assert!((dist - expected).abs() <= 1e-5 * expected.max(1.0));
            }
        }
    }

    #[test]
    fn test_index_errors() {
        let m = matrix(3, 2);
        for engine in engines() {
            assert_eq!(
                engine.compute_range(&m, 3, 0, 1),
                Err(DistanceError::IndexOutOfRange { index: 3, len: 3 })
            );
            assert_eq!(
                engine.compute_range(&m, 0, 2, 1),
                Err(DistanceError::InvalidRange { start: 2, end: 1, len: 3 })
            );
            assert_eq!(
                engine.compute_range(&m, 0, 0, 4),
                Err(DistanceError::InvalidRange { start: 0, end: 4, len: 3 })
            );
        }
    }

    #[test]
    fn test_short_vector_rejected() {
        let mut m = matrix(3, 5);
        m[2].truncate(100);
        for engine in engines() {
            assert_eq!(
                engine.compute_range(&m, 0, 0, 3),
                Err(DistanceError::DimensionMismatch {
                    row: 2,
                    expected: EMBEDDING_DIM,
                    actual: 100
                })
            );
            // Rows outside the query and range are never read.
            assert!(engine.compute_range(&m, 0, 0, 2).is_ok());
        }
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("portable".parse::<DistanceKind>().unwrap(), DistanceKind::Portable);
        assert_eq!("Accelerated".parse::<DistanceKind>().unwrap(), DistanceKind::Accelerated);
        assert!("gpu".parse::<DistanceKind>().is_err());
        assert_eq!(engine_for(DistanceKind::Accelerated).kind(), DistanceKind::Accelerated);
    }
}
