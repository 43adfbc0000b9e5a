use std::env;
use std::path::{Path, PathBuf};

use crate::search::TokenizerMode;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const DATABASE_FOLDER: &str = "GLOSSARY_DATABASE_FOLDER";
    /// One of "morphological" (also "kuromoji"), "tiny", "script", "jieba", "trigram".
    pub const TOKENIZER: &str = "GLOSSARY_TOKENIZER";
    /// Tab-separated `surface<TAB>reading` file loaded into the tokenizer.
    pub const READINGS_PATH: &str = "GLOSSARY_READINGS_PATH";
    pub const SEARCH_THRESHOLD: &str = "GLOSSARY_SEARCH_THRESHOLD";
}

/// Default values
pub mod defaults {
    pub const DATABASE_FOLDER: &str = "./data";
    pub const DATABASE_FILENAME: &str = "terms.db";
    pub const SEARCH_THRESHOLD: f64 = crate::search::config::DEFAULT_THRESHOLD;
}

/// Resolve the database file inside a database folder
pub fn database_path(folder: &Path) -> PathBuf {
    folder.join(defaults::DATABASE_FILENAME)
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_folder: PathBuf,
    pub tokenizer: TokenizerMode,
    pub readings_path: Option<PathBuf>,
    /// 0 = exact only, 1 = anything matches
    pub search_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_folder: PathBuf::from(defaults::DATABASE_FOLDER),
            tokenizer: TokenizerMode::default(),
            readings_path: None,
            search_threshold: defaults::SEARCH_THRESHOLD,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Invalid values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_folder = lookup(env_vars::DATABASE_FOLDER)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(defaults::DATABASE_FOLDER));

        let tokenizer = match lookup(env_vars::TOKENIZER) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                log::warn!(
                    "[CONFIG] Unknown {} value '{}', using {}",
                    env_vars::TOKENIZER,
                    raw,
                    TokenizerMode::default()
                );
                TokenizerMode::default()
            }),
            None => TokenizerMode::default(),
        };

        let readings_path = lookup(env_vars::READINGS_PATH)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let search_threshold = match lookup(env_vars::SEARCH_THRESHOLD) {
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => v.clamp(0.0, 1.0),
                _ => {
                    log::warn!(
                        "[CONFIG] Invalid {} value '{}', using {}",
                        env_vars::SEARCH_THRESHOLD,
                        raw,
                        defaults::SEARCH_THRESHOLD
                    );
                    defaults::SEARCH_THRESHOLD
                }
            },
            None => defaults::SEARCH_THRESHOLD,
        };

        Self {
            database_folder,
            tokenizer,
            readings_path,
            search_threshold,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        database_path(&self.database_folder)
    }
}
