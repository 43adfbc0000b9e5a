//! Text normalization, tokenization and the fuzzy search index.
//!
//! - [`normalize`] - script/width/case folding to canonical text
//! - [`tokenizer`] - reading-aware tokenization and the [`Analyzer`] that owns it
//! - [`fuzzy`] - approximate substring scoring
//! - [`index`] - the lazily rebuilt in-memory index

pub mod config;
pub mod fuzzy;
pub mod index;
pub mod normalize;
pub mod tokenizer;

pub use index::{SearchHit, SearchIndex, SearchRecord};
pub use normalize::normalize;
pub use tokenizer::{Analyzer, ReadingDictionary, Segmenter, TokenizeError, Tokenizer, TokenizerMode};
