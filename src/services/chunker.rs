//! Fixed-window text chunking.

use crate::models::{ChunkBatch, ChunkingConfig, Document, DocumentChunk};

/// Splits document text into bounded windows.
///
/// Windows are measured in characters: a budget of `n` tokens becomes
/// `n * chars_per_token` characters. Cuts fall on exact character offsets, so
/// without overlap the chunks concatenate back to the original text and there
/// are `ceil(chars / window)` of them.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Default budget in tokens
    token_size: usize,
    chars_per_token: usize,
    /// Overlap in tokens
    overlap: usize,
}

impl TextChunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            token_size: (config.chunk_token_size as usize).max(1),
            chars_per_token: (config.chars_per_token as usize).max(1),
            overlap: config.chunk_overlap as usize,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&ChunkingConfig::default())
    }

    pub fn default_token_size(&self) -> usize {
        self.token_size
    }

    /// Chunk every document, keeping one batch per document (possibly empty).
    ///
    /// Documents must already carry an id.
    pub fn chunk(&self, documents: &[Document], token_size: Option<usize>) -> Vec<ChunkBatch> {
        documents
            .iter()
            .filter_map(|document| {
                let document_id = document.id.clone()?;
                let chunks = self.chunk_document(document, token_size);
                Some(ChunkBatch {
                    document_id,
                    chunks,
                })
            })
            .collect()
    }

    /// Chunk a single document. Returns nothing for empty text or a missing id.
    pub fn chunk_document(&self, document: &Document, token_size: Option<usize>) -> Vec<DocumentChunk> {
        let Some(document_id) = document.id.as_deref() else {
            return Vec::new();
        };

        self.split(&document.text, token_size)
            .into_iter()
            .enumerate()
            .map(|(idx, text)| {
                DocumentChunk::from_document(document_id, &document.metadata, text, idx as u32)
            })
            .collect()
    }

    /// Window and step in characters for the given budget.
    fn window(&self, token_size: Option<usize>) -> (usize, usize) {
        let tokens = token_size.unwrap_or(self.token_size).max(1);
        let window = tokens.saturating_mul(self.chars_per_token);
        let overlap = self.overlap.min(tokens - 1).saturating_mul(self.chars_per_token);
        (window, window.saturating_sub(overlap).max(1))
    }

    fn split(&self, text: &str, token_size: Option<usize>) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let (window, step) = self.window(token_size);

        // Byte offset of every char boundary, plus the end of the text
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total_chars = boundaries.len() - 1;

        let mut chunks = Vec::with_capacity(total_chars.div_ceil(step));
        let mut start: usize = 0;
        loop {
            let end = start.saturating_add(window).min(total_chars);
            chunks.push(text[boundaries[start]..boundaries[end]].to_string());
            if end >= total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Estimate the number of tokens in a text (~4 characters per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
