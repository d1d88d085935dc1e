pub mod extraction;
pub mod structuring;
pub mod batch;
pub mod chunking; // Metadata-prefixed retrieval chunks
pub mod processor; // Single-document parse with freeform metadata
pub mod diagnostic; // Artifact dump, enabled by POLICY_EXTRACT_DUMP_DIR
