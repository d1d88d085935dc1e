//! Retrieval chunks for a parsed policy.
//!
//! `full_text` is split on the full-width period `。`; each sentence is
//! prefixed with the source file, product name, filing code and target
//! audience so the chunk carries its product identity into any embedding.
//! Every listed benefit becomes one more chunk of its own.

use serde::Serialize;

use crate::pipeline::structuring::ParsedDocument;

const SENTENCE_DELIMITER: char = '。';

/// Audience label used when the model gave none.
pub const UNRESTRICTED_AUDIENCE: &str = "不限";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Sentence,
    Benefit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyChunk {
    pub content: String,
    pub chunk_index: usize,
    pub kind: ChunkKind,
}

pub struct PolicyChunker;

impl PolicyChunker {
    /// Sentence chunks in text order, then benefit chunks in list order.
    pub fn chunk(&self, document: &ParsedDocument, source_file: &str) -> Vec<PolicyChunk> {
        let metadata = &document.metadata;
        let code = metadata.product_code.as_deref().unwrap_or_default();
        let audience = metadata
            .target_audience
            .as_deref()
            .unwrap_or(UNRESTRICTED_AUDIENCE);

        let sentences = document
            .full_text
            .split(SENTENCE_DELIMITER)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|sentence| {
                let content = format!(
                    "來源: {source_file} | 商品: {} | 文號: {code} | 對象: {audience} | 內容: {sentence}",
                    metadata.product_name
                );
                (content, ChunkKind::Sentence)
            });

        let benefits = metadata.benefits.iter().map(|benefit| {
            let content = format!("商品: {} | 給付項目: {benefit}", metadata.product_name);
            (content, ChunkKind::Benefit)
        });

        let chunks: Vec<PolicyChunk> = sentences
            .chain(benefits)
            .enumerate()
            .map(|(chunk_index, (content, kind))| PolicyChunk {
                content,
                chunk_index,
                kind,
            })
            .collect();

        tracing::debug!(source = source_file, chunks = chunks.len(), "Policy chunked");
        chunks
    }
}
