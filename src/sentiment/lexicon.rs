// Sentiment lexicon — eight emotion categories plus two polarity classes,
// NRC word-emotion association style.
//
// The lexicon is an external immutable resource: loadable from the NRC TSV
// format, with a compact built-in default for tests and offline runs. Member
// terms are stemmed with the same algorithm as the normalizer so lookups
// match the processed vocabulary.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::normalize::stem_term;
use crate::embed::word2vec::WordEmbeddings;
use crate::error::{PipelineError, Result};

/// Emotion and polarity categories. The two groups are normalized
/// independently and never mixed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Category {
    Anger,
    Anticipation,
    Disgust,
    Fear,
    Joy,
    Sadness,
    Surprise,
    Trust,
    Negative,
    Positive,
}

impl Category {
    pub const EMOTIONS: [Category; 8] = [
        Category::Anger,
        Category::Anticipation,
        Category::Disgust,
        Category::Fear,
        Category::Joy,
        Category::Sadness,
        Category::Surprise,
        Category::Trust,
    ];

    pub const SENTIMENTS: [Category; 2] = [Category::Negative, Category::Positive];

    pub const ALL: [Category; 10] = [
        Category::Anger,
        Category::Anticipation,
        Category::Disgust,
        Category::Fear,
        Category::Joy,
        Category::Sadness,
        Category::Surprise,
        Category::Trust,
        Category::Negative,
        Category::Positive,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Anger => "anger",
            Category::Anticipation => "anticipation",
            Category::Disgust => "disgust",
            Category::Fear => "fear",
            Category::Joy => "joy",
            Category::Sadness => "sadness",
            Category::Surprise => "surprise",
            Category::Trust => "trust",
            Category::Negative => "negative",
            Category::Positive => "positive",
        }
    }

    fn from_label(label: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.label() == label)
    }
}

/// Category → member-term sets. Terms may belong to several categories.
#[derive(Debug, Clone)]
pub struct Lexicon {
    members: HashMap<Category, HashSet<String>>,
}

impl Lexicon {
    /// Load from the NRC word-association TSV format:
    /// `term<TAB>category<TAB>0|1` — only rows flagged 1 are members.
    /// Unknown category labels fail the read.
    pub fn from_nrc_tsv(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut members: HashMap<Category, HashSet<String>> = HashMap::new();

        for (i, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let (term, label, flag) = match (fields.next(), fields.next(), fields.next()) {
                (Some(t), Some(l), Some(f)) => (t, l, f),
                _ => {
                    return Err(PipelineError::Parse {
                        row: i + 1,
                        reason: format!("expected term<TAB>category<TAB>flag, got '{line}'"),
                    })
                }
            };
            let category = Category::from_label(label).ok_or_else(|| PipelineError::Parse {
                row: i + 1,
                reason: format!("unknown category '{label}'"),
            })?;
            if flag.trim() == "1" {
                members
                    .entry(category)
                    .or_default()
                    .insert(term.trim().to_string());
            }
        }

        info!(
            terms = members.values().map(HashSet::len).sum::<usize>(),
            path = %path.display(),
            "Loaded sentiment lexicon"
        );
        Ok(Self { members })
    }

    /// Compact built-in default, enough for offline runs and tests.
    pub fn builtin() -> Self {
        let entries: [(Category, &[&str]); 10] = [
            (
                Category::Anger,
                &[
                    "anger", "furious", "outrage", "hostile", "attack", "insult", "hate",
                    "violent", "rage", "threat",
                ],
            ),
            (
                Category::Anticipation,
                &[
                    "anticipate", "expect", "await", "plan", "prepare", "hope", "forecast",
                    "upcoming", "future", "ready",
                ],
            ),
            (
                Category::Disgust,
                &[
                    "disgust", "filthy", "rotten", "vile", "repulsive", "nasty", "corrupt",
                    "shameful", "sickening", "foul",
                ],
            ),
            (
                Category::Fear,
                &[
                    "fear", "afraid", "terror", "panic", "danger", "threat", "crisis", "alarm",
                    "risk", "abandon", "flee",
                ],
            ),
            (
                Category::Joy,
                &[
                    "joy", "happy", "delight", "celebrate", "cheer", "smile", "welcome",
                    "success", "triumph", "love",
                ],
            ),
            (
                Category::Sadness,
                &[
                    "sad", "grief", "sorrow", "mourn", "despair", "loss", "abandon", "lonely",
                    "tragedy", "suffering",
                ],
            ),
            (
                Category::Surprise,
                &[
                    "surprise", "sudden", "unexpected", "astonish", "shock", "stun", "amaze",
                    "abrupt", "startle", "wonder",
                ],
            ),
            (
                Category::Trust,
                &[
                    "trust", "reliable", "honest", "faith", "loyal", "support", "protect",
                    "secure", "assure", "partner",
                ],
            ),
            (
                Category::Negative,
                &[
                    "bad", "terrible", "awful", "hate", "crisis", "danger", "loss", "corrupt",
                    "threat", "violent", "abandon", "fear", "sad",
                ],
            ),
            (
                Category::Positive,
                &[
                    "good", "great", "excellent", "love", "welcome", "success", "support",
                    "protect", "hope", "trust", "happy", "celebrate",
                ],
            ),
        ];

        let members = entries
            .into_iter()
            .map(|(category, words)| {
                (
                    category,
                    words.iter().map(|w| w.to_string()).collect::<HashSet<_>>(),
                )
            })
            .collect();
        Self { members }
    }

    /// Run every member term through the normalizer's stemmer so lookups
    /// match stemmed vocabulary terms.
    pub fn stemmed(self) -> Self {
        let members = self
            .members
            .into_iter()
            .map(|(category, words)| {
                (
                    category,
                    words.iter().map(|w| stem_term(w)).collect::<HashSet<_>>(),
                )
            })
            .collect();
        Self { members }
    }

    /// Every category a term belongs to (possibly none, possibly several),
    /// in canonical category order.
    pub fn categories_of(&self, term: &str) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| {
                self.members
                    .get(c)
                    .is_some_and(|words| words.contains(term))
            })
            .collect()
    }

    pub fn members(&self, category: Category) -> Option<&HashSet<String>> {
        self.members.get(&category)
    }

    /// Mean embedding of the category's member terms present in the trained
    /// vocabulary; the zero vector when none are present. A defined
    /// fallback, not an error.
    pub fn category_vector(&self, category: Category, embeddings: &WordEmbeddings) -> Vec<f64> {
        let dim = embeddings.dim();
        let mut sum = vec![0.0f64; dim];
        let mut hits = 0usize;

        if let Some(words) = self.members.get(&category) {
            // Fixed summation order keeps the vector bit-identical across runs.
            let mut words: Vec<&String> = words.iter().collect();
            words.sort();
            for word in words {
                if let Some(vector) = embeddings.vector(word) {
                    for (s, v) in sum.iter_mut().zip(&vector) {
                        *s += v;
                    }
                    hits += 1;
                }
            }
        }

        if hits > 0 {
            for s in &mut sum {
                *s /= hits as f64;
            }
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_covers_all_categories() {
        let lexicon = Lexicon::builtin();
        for category in Category::ALL {
            assert!(
                lexicon.members(category).is_some_and(|m| !m.is_empty()),
                "missing members for {category:?}"
            );
        }
    }

    #[test]
    fn terms_can_belong_to_multiple_categories() {
        let lexicon = Lexicon::builtin();
        let cats = lexicon.categories_of("abandon");
        assert!(cats.contains(&Category::Fear));
        assert!(cats.contains(&Category::Sadness));
        assert!(cats.contains(&Category::Negative));
        assert!(lexicon.categories_of("notaword").is_empty());
    }

    #[test]
    fn stemming_maps_members_to_vocabulary_form() {
        let lexicon = Lexicon::builtin().stemmed();
        // "celebrate" stems to "celebr", matching a stemmed vocabulary.
        assert!(lexicon
            .categories_of("celebr")
            .contains(&Category::Joy));
    }

    #[test]
    fn nrc_tsv_round_trip() {
        let path = std::env::temp_dir().join("refract_lexicon.tsv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "calm\ttrust\t1").unwrap();
        writeln!(file, "calm\tanger\t0").unwrap();
        writeln!(file, "calm\tpositive\t1").unwrap();
        drop(file);

        let lexicon = Lexicon::from_nrc_tsv(&path).unwrap();
        let cats = lexicon.categories_of("calm");
        assert_eq!(cats, vec![Category::Trust, Category::Positive]);
    }

    #[test]
    fn nrc_tsv_rejects_unknown_category() {
        let path = std::env::temp_dir().join("refract_lexicon_bad.tsv");
        std::fs::write(&path, "calm\tserenity\t1\n").unwrap();
        assert!(matches!(
            Lexicon::from_nrc_tsv(&path),
            Err(PipelineError::Parse { row: 1, .. })
        ));
    }
}
