// Topic-model engine — seeded Gibbs fitting with covariate-conditioned
// prevalence, model-selection diagnostics, and post-fit queries.

pub mod model;
pub mod prevalence;
pub mod search;

pub use model::{FitOptions, Initialization, TopicModel};
pub use prevalence::{Covariate, EffectCurve, EffectPoint, PrevalenceDesign, PrevalenceFit};
pub use search::KDiagnostics;
