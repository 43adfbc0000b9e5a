//! Approximate substring matching.
//!
//! The dissimilarity of a pattern against a value is the smallest edit
//! distance between the pattern and any substring of the value, divided by
//! the pattern length. A match anywhere in the value counts the same.

/// Lowercased query, ready to be scored against field values
#[derive(Debug, Clone)]
pub struct Pattern {
    chars: Vec<char>,
}

impl Pattern {
    pub fn new(query: &str) -> Self {
        Self {
            chars: query.to_lowercase().chars().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// 0.0 for an exact substring hit, up to 1.0 for nothing in common
    pub fn score(&self, value: &[char]) -> f64 {
        if self.chars.is_empty() {
            return 1.0;
        }
        let distance = substring_distance(&self.chars, value);
        distance as f64 / self.chars.len() as f64
    }
}

/// Minimum edit distance between `pattern` and any substring of `text`.
///
/// Row `i` of the table holds the cost of matching `pattern[..i]` against a
/// suffix of the text read so far; starting a match is free at every position.
pub fn substring_distance(pattern: &[char], text: &[char]) -> usize {
    let m = pattern.len();
    if m == 0 {
        return 0;
    }

    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr: Vec<usize> = vec![0; m + 1];
    let mut best = m;

    for &tc in text {
        curr[0] = 0;
        for i in 1..=m {
            let substitution = prev[i - 1] + usize::from(pattern[i - 1] != tc);
            curr[i] = substitution.min(prev[i] + 1).min(curr[i - 1] + 1);
        }
        best = best.min(curr[m]);
        if best == 0 {
            break;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    best
}
