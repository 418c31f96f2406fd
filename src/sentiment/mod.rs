// Sentiment and emotion scoring — lexicon path and embedding path.

pub mod aggregate;
pub mod lexicon;
pub mod scorer;

pub use aggregate::{aggregate, GroupKey};
pub use lexicon::{Category, Lexicon};
pub use scorer::{score_embedding, score_lexicon, ScoreRecord};
