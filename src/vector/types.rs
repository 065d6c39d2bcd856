//! Core types shared by the brute-force and HNSW search paths.
//!
//! Distances are Euclidean. The internal distance function tolerates
//! mismatched vector lengths by comparing as +infinity; the public
//! index API rejects dimension mismatches up front instead.

use thiserror::Error;

/// Type-safe wrapper for vector dimensions.
///
/// All vectors in one index share a dimension, fixed at construction
/// by the active embedding backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Errors that can occur during vector index operations.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors come from the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error(
        "Parallel array length mismatch: {vectors} vectors but {documents} documents\nSuggestion: Every vector must have exactly one document"
    )]
    LengthMismatch { vectors: usize, documents: usize },

    #[error("Cannot query an empty index\nSuggestion: Add vectors before querying")]
    EmptyIndex,

    #[error("Index has been closed and can no longer be used")]
    Closed,

    #[error("Query k must be greater than zero")]
    InvalidK,
}

/// Result type alias for vector index operations.
pub type VectorResult<T> = Result<T, VectorError>;

/// Euclidean distance between two vectors.
///
/// Mismatched lengths compare as +infinity so internal callers never
/// panic; the index API validates dimensions before any distance is
/// computed.
pub(crate) fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_construction() {
        let dim = VectorDimension::new(384).unwrap();
        assert_eq!(dim.get(), 384);

        assert!(VectorDimension::new(0).is_err());
    }

    #[test]
    fn test_dimension_validation() {
        let dim = VectorDimension::new(3).unwrap();
        assert!(dim.validate_vector(&[1.0, 2.0, 3.0]).is_ok());

        let err = dim.validate_vector(&[1.0, 2.0]).unwrap_err();
        match err {
            VectorError::DimensionMismatch { expected, actual } => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("Expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_euclidean_distance() {
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean_distance(&[1.0, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_mismatched_lengths_are_infinitely_far() {
        assert_eq!(euclidean_distance(&[1.0], &[1.0, 2.0]), f32::INFINITY);
    }
}
