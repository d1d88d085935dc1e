use std::path::Path;
use std::sync::Arc;

use super::RerankError;

/// Scores each document's relevance to a query. Higher is more relevant.
pub trait RelevanceScorer {
    /// One score per document, in input order.
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f64>, RerankError>;
}

pub type SharedScorer = Arc<dyn RelevanceScorer + Send + Sync>;

// ═══════════════════════════════════════════════════════════
// ONNX cross-encoder, behind `onnx-rerank` feature
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-rerank")]
mod onnx {
    use super::{RelevanceScorer, RerankError};
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// Longest `(query, document)` pair fed to the model, in tokens.
    const MAX_SEQ_LEN: usize = 512;

    /// Cross-encoder (e.g. bge-reranker-v2-m3) exported to ONNX.
    ///
    /// Requires two files in the model directory:
    /// - `model.onnx`: inputs `input_ids`, `attention_mask`; output logits `[1, 1]`
    /// - `tokenizer.json`: HuggingFace tokenizer definition
    ///
    /// `Session::run` needs `&mut self`, hence the Mutex.
    pub struct OnnxCrossEncoder {
        session: Mutex<Session>,
        tokenizer: tokenizers::Tokenizer,
    }

    impl OnnxCrossEncoder {
        pub fn load(model_dir: &Path) -> Result<Self, RerankError> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(RerankError::ModelNotFound(model_path));
            }
            if !tokenizer_path.exists() {
                return Err(RerankError::ModelNotFound(tokenizer_path));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| RerankError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| RerankError::ModelInit(e.to_string()))?
                .commit_from_file(&model_path)
                .map_err(|e: ort::Error| RerankError::ModelInit(format!("ONNX load failed: {e}")))?;

            let mut tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| RerankError::ModelInit(format!("Tokenizer load failed: {e}")))?;
            tokenizer
                .with_truncation(Some(tokenizers::TruncationParams {
                    max_length: MAX_SEQ_LEN,
                    ..Default::default()
                }))
                .map_err(|e| RerankError::ModelInit(format!("Tokenizer truncation: {e}")))?;

            tracing::info!(model_dir = %model_dir.display(), "ONNX cross-encoder loaded");

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
            })
        }

        /// Relevance of one pair, squashed to (0, 1).
        fn infer(&self, query: &str, document: &str) -> Result<f64, RerankError> {
            use ort::value::TensorRef;

            let encoding = self
                .tokenizer
                .encode((query, document), true)
                .map_err(|e| RerankError::Tokenization(e.to_string()))?;

            let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            let attention_mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect();
            let seq_len = input_ids.len();

            let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
                .map_err(|e| RerankError::Scoring(e.to_string()))?;
            let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask)
                .map_err(|e| RerankError::Scoring(e.to_string()))?;

            let ids_tensor = TensorRef::from_array_view(&ids_array)
                .map_err(|e| RerankError::Scoring(e.to_string()))?;
            let mask_tensor = TensorRef::from_array_view(&mask_array)
                .map_err(|e| RerankError::Scoring(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| RerankError::Scoring("Session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor])
                .map_err(|e| RerankError::Scoring(format!("ONNX inference failed: {e}")))?;

            let (_shape, logits) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| RerankError::Scoring(format!("Output extraction: {e}")))?;

            let logit = logits
                .first()
                .copied()
                .ok_or_else(|| RerankError::Scoring("Model returned no logits".to_string()))?;

            Ok(sigmoid(f64::from(logit)))
        }
    }

    impl RelevanceScorer for OnnxCrossEncoder {
        fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f64>, RerankError> {
            documents.iter().map(|d| self.infer(query, d)).collect()
        }
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }
}

#[cfg(feature = "onnx-rerank")]
pub use onnx::OnnxCrossEncoder;

/// Production scorer loaded from `model_dir`.
pub fn load_scorer(model_dir: &Path) -> Result<SharedScorer, RerankError> {
    #[cfg(feature = "onnx-rerank")]
    {
        Ok(Arc::new(OnnxCrossEncoder::load(model_dir)?))
    }
    #[cfg(not(feature = "onnx-rerank"))]
    {
        tracing::error!(model_dir = %model_dir.display(), "Built without onnx-rerank");
        Err(RerankError::ModelUnavailable)
    }
}

/// Mock scorer for testing: returns preset scores, or fails.
pub struct MockScorer {
    scores: Result<Vec<f64>, String>,
}

impl MockScorer {
    pub fn new(scores: &[f64]) -> Self {
        Self {
            scores: Ok(scores.to_vec()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            scores: Err(reason.to_string()),
        }
    }
}

impl RelevanceScorer for MockScorer {
    fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f64>, RerankError> {
        let scores = self.scores.as_ref().map_err(|r| RerankError::Scoring(r.clone()))?;
        if scores.len() != documents.len() {
            return Err(RerankError::Scoring(format!(
                "expected {} documents, got {}",
                scores.len(),
                documents.len()
            )));
        }
        Ok(scores.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_preset_scores() {
        let scorer = MockScorer::new(&[0.1, 0.8]);
        let docs = vec!["a".to_string(), "b".to_string()];
        assert_eq!(scorer.score("q", &docs).unwrap(), vec![0.1, 0.8]);
    }

    #[test]
    fn mock_rejects_mismatched_batch() {
        let scorer = MockScorer::new(&[0.1]);
        let docs = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(scorer.score("q", &docs), Err(RerankError::Scoring(_))));
    }

    #[cfg(not(feature = "onnx-rerank"))]
    #[test]
    fn load_without_feature_reports_unavailable() {
        assert!(matches!(
            load_scorer(Path::new("/nonexistent")),
            Err(RerankError::ModelUnavailable)
        ));
    }

    #[cfg(feature = "onnx-rerank")]
    #[test]
    fn load_missing_model_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        match OnnxCrossEncoder::load(dir.path()) {
            Err(RerankError::ModelNotFound(path)) => assert!(path.ends_with("model.onnx")),
            other => panic!("expected ModelNotFound, got {:?}", other.err()),
        }
    }
}
