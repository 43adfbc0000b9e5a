//! Search tuning constants

/// Default dissimilarity threshold; 0 = exact only, 1 = everything matches
pub const DEFAULT_THRESHOLD: f64 = 0.4;

/// Maximum allowed query length in characters
pub const MAX_QUERY_LENGTH: usize = 1000;
