use std::sync::Arc;

use log::info;

use crate::domain::chunk::{Chunk, ComparisonRequestInfo, ComparisonResult, PaperSummary};
use crate::domain::error::Error;
use crate::domain::summarizer::Summarizer;
use crate::domain::vector_repository::VectorRepository;

/// Cross-document comparison: fetch both documents, summarize each, then
/// narrate the comparison.
///
/// The caller receives either a complete result or an error; there is no
/// state where one summary exists without the other.
pub struct ComparisonService {
    index: Arc<dyn VectorRepository>,
    summarizer: Arc<dyn Summarizer>,
    max_context_chars: usize,
}

impl ComparisonService {
    pub fn new(
        index: Arc<dyn VectorRepository>,
        summarizer: Arc<dyn Summarizer>,
        max_context_chars: usize,
    ) -> Self {
        Self {
            index,
            summarizer,
            max_context_chars,
        }
    }

    pub async fn compare(
        &self,
        source_doc_id_1: &str,
        source_doc_id_2: &str,
    ) -> Result<ComparisonResult, Error> {
        info!("Comparing '{}' and '{}'", source_doc_id_1, source_doc_id_2);

        let (chunks_1, chunks_2) = tokio::try_join!(
            self.index.get_by_document(source_doc_id_1),
            self.index.get_by_document(source_doc_id_2),
        )?;

        // Both absences are reported together, before any summarization
        // call happens.
        let mut missing = Vec::new();
        if chunks_1.is_empty() {
            missing.push(source_doc_id_1.to_string());
        }
        if chunks_2.is_empty() {
            missing.push(source_doc_id_2.to_string());
        }
        if !missing.is_empty() {
            return Err(Error::DocumentNotFound(missing));
        }

        let text_1 = concat_chunk_texts(&chunks_1, self.max_context_chars);
        let text_2 = concat_chunk_texts(&chunks_2, self.max_context_chars);

        let (summary_1, summary_2) = tokio::try_join!(
            self.summarizer.summarize(&text_1),
            self.summarizer.summarize(&text_2),
        )?;
        let comparison = self.summarizer.compare(&summary_1, &summary_2).await?;

        Ok(ComparisonResult {
            paper1_summary: paper_summary(&chunks_1[0], summary_1),
            paper2_summary: paper_summary(&chunks_2[0], summary_2),
            comparison,
            request_info: ComparisonRequestInfo {
                source_doc_id_1: source_doc_id_1.to_string(),
                source_doc_id_2: source_doc_id_2.to_string(),
                model_used: self.summarizer.model_name().to_string(),
            },
        })
    }
}

fn paper_summary(first_chunk: &Chunk, summary: String) -> PaperSummary {
    PaperSummary {
        source_doc_id: first_chunk.source_doc_id.clone(),
        journal: first_chunk.journal.clone(),
        publish_year: first_chunk.publish_year,
        summary,
    }
}

/// Concatenates chunk texts (already in `chunk_index` order) up to the
/// character budget, cutting at a chunk boundary. Only when the very first
/// chunk alone exceeds the budget is it cut mid-text, at a char boundary.
pub fn concat_chunk_texts(chunks: &[Chunk], max_chars: usize) -> String {
    let mut out = String::new();
    for chunk in chunks {
        let addition = if out.is_empty() {
            chunk.text.len()
        } else {
            chunk.text.len() + 2
        };
        if !out.is_empty() && out.len() + addition > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        if out.is_empty() && chunk.text.len() > max_chars {
            let mut cut = max_chars;
            while cut > 0 && !chunk.text.is_char_boundary(cut) {
                cut -= 1;
            }
            out.push_str(&chunk.text[..cut]);
            break;
        }
        out.push_str(&chunk.text);
    }
    out
}
