//! Cosine ranking over a [`VectorIndex`].

use std::cmp::Ordering;
use std::collections::HashSet;

use rocketnotes_core::{Error, IndexedChunk, Result, VectorIndex};

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::InvalidInput(format!(
            "Vector dimension mismatch: {} != {}",
            a.len(),
            b.len()
        )));
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let a_norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let b_norm: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if a_norm == 0.0 || b_norm == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (a_norm * b_norm))
}

/// A chunk and its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedChunk<'a> {
    pub chunk: &'a IndexedChunk,
    pub score: f32,
}

/// Every document's best chunk, best first.
///
/// Chunks whose dimension differs from the query are ignored.
pub fn rank_documents<'a>(index: &'a VectorIndex, query: &[f32]) -> Vec<RankedChunk<'a>> {
    let mut ranked: Vec<RankedChunk<'a>> = index
        .chunks
        .iter()
        .filter_map(|chunk| {
            cosine_similarity(&chunk.vector, query)
                .ok()
                .map(|score| RankedChunk { chunk, score })
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut seen = HashSet::new();
    ranked.retain(|r| seen.insert(r.chunk.document_id.as_str()));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chunk(document_id: &str, vector: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            document_id: document_id.to_string(),
            title: document_id.to_string(),
            content: String::new(),
            vector,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).is_err());
    }

    #[test]
    fn test_rank_keeps_best_chunk_per_document() {
        let index = VectorIndex {
            user_id: "u1".into(),
            model: "mock".into(),
            dimension: 2,
            built_at: Utc::now(),
            chunks: vec![
                chunk("d1", vec![0.0, 1.0]),
                chunk("d2", vec![0.8, 0.2]),
                chunk("d1", vec![1.0, 0.1]),
                chunk("d3", vec![1.0, 0.0, 0.0]),
            ],
        };

        let ranked = rank_documents(&index, &[1.0, 0.0]);
        let ids: Vec<&str> = ranked.iter().map(|r| r.chunk.document_id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2"]);
        assert_eq!(ranked[0].chunk.vector, vec![1.0, 0.1]);
    }
}
