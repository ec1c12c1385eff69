//! Score bookkeeping on the terminal side of the network.

mod analysis;
mod inliner;
mod weight_overrides;


pub use analysis::{ConstraintAnalysis, ConstraintMatch, Indictment, ScoreExplanation};
pub use inliner::{ConstraintLedger, ScoreInliner};
pub use weight_overrides::ConstraintWeightOverrides;
