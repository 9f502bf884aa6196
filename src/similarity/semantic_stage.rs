//! Optional semantic similarity stage (spec §4.4): embeds code via an
//! external model and reports cosine similarity. Gated behind the
//! `semantic` feature; without it (or if the backing model fails to load)
//! every query reports [`SemanticOutcome::Unavailable`] rather than failing
//! the kernel — this is a `Degradation`, never a fatal error (spec §7).

use crate::core::model::Construct;

/// Outcome of attempting the semantic stage for one pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SemanticOutcome {
    /// Cosine similarity in `[0,1]`.
    Score(f64),
    /// The embedding backend is not compiled in or failed to initialize.
    Unavailable,
}

#[cfg(feature = "semantic")]
mod backend {
    use super::*;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use once_cell::sync::OnceCell;
    use parking_lot::Mutex;
    use tracing::warn;

    static MODEL: OnceCell<Mutex<Option<TextEmbedding>>> = OnceCell::new();

    fn model() -> &'static Mutex<Option<TextEmbedding>> {
        MODEL.get_or_init(|| {
            let init = TextEmbedding::try_new(
                InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
            );
            match init {
                Ok(m) => Mutex::new(Some(m)),
                Err(e) => {
                    warn!(error = %e, "semantic stage unavailable: failed to initialize embedding model");
                    Mutex::new(None)
                }
            }
        })
    }

    pub fn similarity(a: &Construct, b: &Construct) -> SemanticOutcome {
        let mut guard = model().lock();
        let Some(model) = guard.as_mut() else {
            return SemanticOutcome::Unavailable;
        };
        let texts = vec![a.normalized_text.clone(), b.normalized_text.clone()];
        match model.embed(texts, None) {
            Ok(embeddings) if embeddings.len() == 2 => {
                SemanticOutcome::Score(cosine(&embeddings[0], &embeddings[1]).clamp(0.0, 1.0))
            }
            Ok(_) => SemanticOutcome::Unavailable,
            Err(e) => {
                warn!(error = %e, "semantic stage embedding call failed");
                SemanticOutcome::Unavailable
            }
        }
    }

    fn cosine(a: &[f32], b: &[f32]) -> f64 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            (dot / (norm_a * norm_b)) as f64
        }
    }
}

/// Attempt the semantic similarity stage for one construct pair.
pub fn semantic_similarity(a: &Construct, b: &Construct) -> SemanticOutcome {
    #[cfg(feature = "semantic")]
    {
        backend::similarity(a, b)
    }
    #[cfg(not(feature = "semantic"))]
    {
        let _ = (a, b);
        SemanticOutcome::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ConstructKind, Construct};
    use std::path::PathBuf;

    fn construct(text: &str) -> Construct {
        Construct {
            id: "c1".into(),
            file: PathBuf::from("a.py"),
            range: (0, 1),
            language: "python".into(),
            kind: ConstructKind::Function,
            normalized_text: text.into(),
            tokens: text.split_whitespace().map(String::from).collect(),
            structure_hash: 0,
        }
    }

    #[test]
    fn without_feature_always_unavailable() {
        let a = construct("def foo(): return 1");
        let b = construct("def bar(): return 2");
        assert_eq!(semantic_similarity(&a, &b), SemanticOutcome::Unavailable);
    }
}
