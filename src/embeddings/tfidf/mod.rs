
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use bincode::{Decode, Encode};
use fancy_regex::Regex;
use itertools::Itertools;
use tracing::{debug, warn};

use super::{EmbeddingKind, Embedder, normalize_dimension};
use crate::Result;

/// Words of two or more word characters, matched after lowercasing
static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("token pattern is a valid regex"));

/// Deterministic fallback embedder: a TF-IDF vectorizer limited to `dimension` features.
///
/// `embed` fits a fresh vocabulary on every batch, so vectors from separate calls are not
/// comparable. Use [`TfIdfEmbedder::fit`] and keep the vocabulary to embed later queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TfIdfEmbedder {
    dimension: usize,
}

/// A fitted vocabulary: column terms in lexicographic order with their smoothed idf
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct TfIdfVocabulary {
    terms: Vec<String>,
    idf: Vec<f32>,
    dimension: usize,
}

impl TfIdfEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Learn the vocabulary and idf weights of a batch
    #[inline]
    pub fn fit(&self, texts: &[String]) -> TfIdfVocabulary {
        let documents = texts.iter().map(|t| tokenize(t)).collect::<Vec<_>>();

        let mut term_counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &documents {
            for token in tokens {
                *term_counts.entry(token.as_str()).or_insert(0) += 1;
            }
            for token in tokens.iter().map(String::as_str).collect::<BTreeSet<_>>() {
                *document_frequency.entry(token).or_insert(0) += 1;
            }
        }

        // Most frequent terms win; BTreeMap order breaks count ties alphabetically.
        let terms = term_counts
            .iter()
            .sorted_by(|a, b| b.1.cmp(a.1))
            .take(self.dimension)
            .map(|(term, _)| *term)
            .sorted()
            .collect::<Vec<_>>();

        let n_documents = documents.len() as f32;
        let idf = terms
            .iter()
            .map(|term| {
                let df = document_frequency.get(term).copied().unwrap_or(0) as f32;
                ((1.0 + n_documents) / (1.0 + df)).ln() + 1.0
            })
            .collect::<Vec<_>>();

        if term_counts.len() > terms.len() {
            debug!(
                "TF-IDF vocabulary truncated from {} to {} terms",
                term_counts.len(),
                terms.len()
            );
        }

        TfIdfVocabulary {
            terms: terms.into_iter().map(str::to_string).collect(),
            idf,
            dimension: self.dimension,
        }
    }
}

impl Embedder for TfIdfEmbedder {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.len() == 1 {
            warn!("TF-IDF fitted on a single text; the vector is not comparable with other batches");
        }
        Ok(self.fit(texts).transform(texts))
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn kind(&self) -> EmbeddingKind {
        EmbeddingKind::TfIdf
    }
}

impl TfIdfVocabulary {
    #[inline]
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// L2-normalized tf-idf rows, padded to the configured dimension. Unknown terms are ignored.
    #[inline]
    pub fn transform(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut rows = texts
            .iter()
            .map(|text| {
                let mut row = vec![0.0_f32; self.terms.len()];
                for token in tokenize(text) {
                    if let Ok(column) = self.terms.binary_search(&token) {
                        row[column] += 1.0;
                    }
                }

                for (value, idf) in row.iter_mut().zip(&self.idf) {
                    *value *= idf;
                }

                let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for value in &mut row {
                        *value /= norm;
                    }
                }
                row
            })
            .collect::<Vec<_>>();

        normalize_dimension(&mut rows, self.dimension);
        rows
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .filter_map(|m| m.ok())
        .map(|m| m.as_str().to_string())
        .collect()
}
