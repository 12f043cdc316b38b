pub mod fuzzy;
pub mod normalize;

pub use fuzzy::{best_match, weighted_ratio, MatchResult};
pub use normalize::normalize;
