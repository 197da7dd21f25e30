// src/error.rs
//! Error taxonomy of the curation core.
//!
//! Only two typed errors exist: a raw record that cannot become a canonical item, and a
//! configuration that cannot be compiled. Everything past a successful `Pipeline::new`
//! is total over well-formed items.

use thiserror::Error;

/// A raw record with no usable identity. The pipeline skips it and counts it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedItemError {
    #[error("item from `{source_name}` has neither title nor url")]
    MissingTitleAndUrl { source_name: String },

    #[error("item from `{source_name}` has no usable url and its title normalizes to nothing")]
    NoIdentity { source_name: String },
}

/// Invalid configuration, detected before any run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("category `{0}` is defined more than once")]
    DuplicateCategory(String),

    #[error("category `{name}` has min_items {min} greater than max_items {max}")]
    MinAboveMax { name: String, min: usize, max: usize },

    #[error("category name must not be empty")]
    EmptyCategoryName,

    #[error("ranking weight `{name}` must be finite and >= 0 (got {value})")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("fallback for `{source_type}` points to unknown or disabled category `{category}`")]
    UnknownFallback {
        source_type: String,
        category: String,
    },

    #[error("days_to_look_back {value} exceeds the maximum of {max}")]
    LookbackTooLarge { value: u32, max: u32 },

    #[error("unknown source type `{0}` in configuration")]
    UnknownSourceType(String),

    #[error("category `{category}` keyword `{keyword}` does not compile: {reason}")]
    InvalidKeyword {
        category: String,
        keyword: String,
        reason: String,
    },
}
