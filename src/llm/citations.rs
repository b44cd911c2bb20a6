//! Citation-aware answer generation.
//!
//! Retrieved chunks are numbered `[1]..[n]` in retrieval order and the model
//! is told to cite only those markers. Duplicate sources get distinct markers.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::RagError;
use crate::llm::semantic_search::RetrievedChunk;
use crate::providers::traits::{CompletionProvider, GenerationParams};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub marker: String,
    pub source_document: String,
    pub page_number: u32,
}

/// Marker -> source, in the order chunks were shown to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CitationMap {
    entries: Vec<Citation>,
}

impl CitationMap {
    fn push(&mut self, source_document: &str, page_number: u32) -> String {
        let marker = format!("[{}]", self.entries.len() + 1);
        self.entries.push(Citation {
            marker: marker.clone(),
            source_document: source_document.to_string(),
            page_number,
        });
        marker
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, marker: &str) -> Option<&Citation> {
        self.entries.iter().find(|c| c.marker == marker)
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.get(marker).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Citation> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitedAnswer {
    pub answer: String,
    pub citations: CitationMap,
}

/// Builds the single user prompt and the citation map that goes with it.
pub fn build_prompt(query: &str, retrieved: &[RetrievedChunk]) -> (String, CitationMap) {
    let mut citations = CitationMap::default();
    let mut context = String::new();

    for chunk in retrieved {
        let marker = citations.push(&chunk.source_document, chunk.page_number);
        context.push_str(&format!(
            "{} {}\n(Source: {}, page {})\n\n",
            marker, chunk.chunk_text, chunk.source_document, chunk.page_number
        ));
    }

    let prompt = format!(
        "Use the context below to answer the user's question.\n\n\
         Context:\n{}\n\n\
         Question: {}\n\n\
         Instructions: Provide a clear answer based only on the context above. \
         Include inline citations like [1], [2] that match the sources. \
         Do not invent references: only cite markers that appear in the context.",
        context, query
    );

    (prompt, citations)
}

/// Every `[n]` marker in `text`, in order of appearance.
pub fn extract_markers(text: &str) -> Vec<String> {
    let mut markers = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let digits = after.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 && after[digits..].starts_with(']') {
            markers.push(format!("[{}]", &after[..digits]));
            rest = &after[digits + 1..];
        } else {
            rest = after;
        }
    }
    markers
}

pub struct CitationGenerator {
    provider: Arc<dyn CompletionProvider>,
    params: GenerationParams,
}

impl CitationGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, params: GenerationParams) -> Self {
        Self { provider, params }
    }

    pub async fn generate(&self, query: &str, retrieved: &[RetrievedChunk]) -> Result<CitedAnswer, RagError> {
        let (prompt, citations) = build_prompt(query, retrieved);

        let answer = self.provider
            .generate(&prompt, &self.params)
            .await
            .map_err(RagError::Generation)?;

        let unknown: Vec<String> = extract_markers(&answer)
            .into_iter()
            .filter(|m| !citations.contains(m))
            .collect();
        if !unknown.is_empty() {
            log::warn!("Answer cites markers not in the context: {}", unknown.join(", "));
        }

        Ok(CitedAnswer { answer, citations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::CannedCompleter;
    use pretty_assertions::assert_eq;

    fn retrieved(document: &str, page: u32, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk_text: text.to_string(),
            source_document: document.to_string(),
            page_number: page,
            distance: 0.0,
        }
    }

    #[test]
    fn markers_are_contiguous_even_for_duplicate_sources() {
        let chunks = vec![
            retrieved("paperA.pdf", 2, "alpha"),
            retrieved("paperA.pdf", 2, "beta"),
            retrieved("paperB.pdf", 7, "gamma"),
        ];
        let (_, citations) = build_prompt("q", &chunks);

        let markers: Vec<&str> = citations.iter().map(|c| c.marker.as_str()).collect();
        assert_eq!(markers, vec!["[1]", "[2]", "[3]"]);
        assert_eq!(citations.len(), chunks.len());
        assert_eq!(
            citations.get("[3]"),
            Some(&Citation {
                marker: "[3]".to_string(),
                source_document: "paperB.pdf".to_string(),
                page_number: 7,
            })
        );
        let (first, second) = (citations.get("[1]").unwrap(), citations.get("[2]").unwrap());
        assert_eq!(
            (&first.source_document, first.page_number),
            (&second.source_document, second.page_number)
        );
    }

    #[test]
    fn prompt_contains_context_question_and_rules() {
        let (prompt, _) = build_prompt(
            "How do switches help?",
            &[retrieved("paperA.pdf", 1, "Switch access lets users scan.")],
        );

        assert!(prompt.contains("[1] Switch access lets users scan.\n(Source: paperA.pdf, page 1)\n\n"));
        assert!(prompt.contains("Question: How do switches help?"));
        assert!(prompt.contains("only on the context"));
        assert!(prompt.contains("Do not invent references"));
    }

    #[test]
    fn extracts_numeric_markers_only() {
        assert_eq!(
            extract_markers("Yes [1], see [12] and [a] or [] or [3"),
            vec!["[1]".to_string(), "[12]".to_string()]
        );
        assert!(extract_markers("no citations").is_empty());
    }

    #[tokio::test]
    async fn returns_answer_and_citation_map() {
        let completer = Arc::new(CannedCompleter::answering("Scanning helps [1]."));
        let generator = CitationGenerator::new(completer.clone(), GenerationParams::default());

        let cited = generator
            .generate("q", &[retrieved("paperA.pdf", 1, "alpha"), retrieved("paperB.pdf", 4, "beta")])
            .await
            .unwrap();

        assert_eq!(cited.answer, "Scanning helps [1].");
        assert_eq!(cited.citations.len(), 2);
        assert!(extract_markers(&cited.answer).iter().all(|m| cited.citations.contains(m)));

        let sent = completer.prompts.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, GenerationParams { max_output_tokens: 500, temperature: 0.3 });
    }

    #[tokio::test]
    async fn malformed_response_is_fatal() {
        let generator = CitationGenerator::new(Arc::new(CannedCompleter::malformed()), GenerationParams::default());
        assert!(matches!(
            generator.generate("q", &[retrieved("a.pdf", 1, "x")]).await,
            Err(RagError::Generation(_))
        ));
    }

    #[test]
    fn citation_map_serializes_as_ordered_list() {
        let (_, citations) = build_prompt("q", &[retrieved("a.pdf", 1, "x")]);
        assert_eq!(
            serde_json::to_value(&citations).unwrap(),
            serde_json::json!([{ "marker": "[1]", "source_document": "a.pdf", "page_number": 1 }])
        );
    }
}
