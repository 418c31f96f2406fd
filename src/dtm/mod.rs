// Document-term matrix construction — vocabulary trimming, sparse counts,
// and derived weighting variants.

pub mod matrix;
pub mod vocab;

pub use matrix::{DocTermMatrix, Weighting};
pub use vocab::Vocabulary;
