use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankRequest {
    pub query: String,
    pub documents: Vec<String>,
}

/// `indices[i]` is the input position of the i-th most relevant document and
/// `scores[i]` its score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RerankResponse {
    pub scores: Vec<f64>,
    pub indices: Vec<usize>,
}

/// Order scores from most to least relevant. Equal scores keep input order.
pub fn rank(scores: &[f64]) -> RerankResponse {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    // sort_by is stable
    indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    RerankResponse {
        scores: indices.iter().map(|&i| scores[i]).collect(),
        indices,
    }
}
