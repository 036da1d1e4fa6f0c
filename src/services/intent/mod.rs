pub mod classifier;
pub mod extractor;
pub mod lexicon;

pub use classifier::{classify, matched_keywords, rank_experts};
pub use extractor::IntentExtractor;
