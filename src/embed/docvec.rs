// Document embeddings with an explicit corpus-mean fallback.
//
// A document's embedding is the mean of its in-vocabulary token vectors. A
// malformed result — wrong dimensionality, a non-finite component, or no
// in-vocabulary tokens at all — is replaced by the corpus mean of the valid
// document embeddings. The fallback is logged and flagged on the record,
// never hidden.

use tracing::warn;

use super::word2vec::WordEmbeddings;

/// One document's embedding and whether it came from the fallback path.
#[derive(Debug, Clone)]
pub struct DocEmbedding {
    pub vector: Vec<f64>,
    pub fallback: bool,
}

fn malformed_reason(vector: &Option<Vec<f64>>, dim: usize) -> Option<&'static str> {
    match vector {
        None => Some("no in-vocabulary tokens"),
        Some(v) if v.len() != dim => Some("wrong dimensionality"),
        Some(v) if v.iter().any(|x| !x.is_finite()) => Some("non-finite component"),
        Some(_) => None,
    }
}

/// Embed every document; malformed results fall back to the corpus mean of
/// the valid ones.
pub fn embed_documents(
    embeddings: &WordEmbeddings,
    token_lists: &[Vec<String>],
) -> Vec<DocEmbedding> {
    let dim = embeddings.dim();
    let raw: Vec<Option<Vec<f64>>> = token_lists
        .iter()
        .map(|tokens| embeddings.mean_of(tokens))
        .collect();

    // Corpus mean over the well-formed embeddings.
    let mut mean = vec![0.0f64; dim];
    let mut valid = 0usize;
    for vector in &raw {
        if malformed_reason(vector, dim).is_none() {
            let v = vector.as_ref().expect("well-formed embedding present");
            for (m, x) in mean.iter_mut().zip(v) {
                *m += x;
            }
            valid += 1;
        }
    }
    if valid > 0 {
        for m in &mut mean {
            *m /= valid as f64;
        }
    }

    raw.into_iter()
        .enumerate()
        .map(|(doc, vector)| match malformed_reason(&vector, dim) {
            None => DocEmbedding {
                vector: vector.expect("well-formed embedding present"),
                fallback: false,
            },
            Some(reason) => {
                warn!(doc, reason, "Document embedding malformed, using corpus mean");
                DocEmbedding {
                    vector: mean.clone(),
                    fallback: true,
                }
            }
        })
        .collect()
}

/// Mean over all document embeddings (fallbacks included, since they already
/// equal the corpus mean).
pub fn corpus_mean(doc_embeddings: &[DocEmbedding]) -> Vec<f64> {
    let Some(first) = doc_embeddings.first() else {
        return Vec::new();
    };
    let mut mean = vec![0.0f64; first.vector.len()];
    for emb in doc_embeddings {
        for (m, x) in mean.iter_mut().zip(&emb.vector) {
            *m += x;
        }
    }
    for m in &mut mean {
        *m /= doc_embeddings.len() as f64;
    }
    mean
}
