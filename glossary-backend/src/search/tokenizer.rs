//! Reading-aware tokenization.
//!
//! A [`Tokenizer`] splits width-folded text into units with a [`Segmenter`]
//! and emits every unit's canonical surface followed by its reading. Readings
//! come from the [`ReadingDictionary`] first (user overrides), then from the
//! segmenter itself: the default morphological segmenter reads every word it
//! knows from the bundled IPADIC dictionary. Dictionary entries also match
//! whole Han runs, so a multi-kanji entry still applies when the segmenter
//! splits the run. Each call is independent; nothing is carried between calls.
//!
//! The tokenizer is owned by an [`Analyzer`], which may be created before the
//! tokenizer is available (dictionary still loading) and reports
//! [`TokenizeError::NotReady`] until one is installed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use jieba_rs::Jieba;
use lindera::dictionary::{DictionaryKind, load_dictionary_from_kind};
use lindera::mode::Mode;
use lindera::segmenter::Segmenter as LinderaSegmenter;
use lindera::tokenizer::Tokenizer as LinderaTokenizer;
use once_cell::sync::OnceCell;
use strum::{AsRefStr, Display, EnumString};

use super::normalize::{fold_width, normalize};

/// Position of the reading among IPADIC's per-word features
const IPADIC_READING: usize = 7;

#[derive(Debug, thiserror::Error)]
pub enum TokenizeError {
    #[error("tokenizer is not ready yet")]
    NotReady,
    #[error("a tokenizer is already installed")]
    AlreadyInstalled,
    #[error("morphological analysis failed: {0}")]
    Morphology(String),
    #[error("failed to read reading dictionary {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed reading dictionary {path} at line {line}: {reason}")]
    Dictionary {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// How text is split into units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TokenizerMode {
    /// IPADIC morphological analysis; every known word carries its reading
    #[default]
    #[strum(serialize = "kuromoji", serialize = "lindera", to_string = "morphological")]
    Morphological,
    /// TinySegmenter's statistical word boundaries, no readings
    Tiny,
    /// Runs of a single script (Han, kana, alphanumeric)
    Script,
    /// Script runs with Han runs split further by the jieba dictionary
    Jieba,
    /// Consecutive three-character chunks of each word
    Trigram,
}

/// One segmented word, reading in any kana form if the segmenter knows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub surface: String,
    pub reading: Option<String>,
}

impl Unit {
    pub fn surface(surface: impl Into<String>) -> Self {
        Self {
            surface: surface.into(),
            reading: None,
        }
    }
}

pub trait Segmenter: Send + Sync {
    /// Split width-folded text into units. May return units without any
    /// letters, which the tokenizer drops.
    fn segment(&self, text: &str) -> Result<Vec<Unit>, TokenizeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Han,
    Kana,
    Alnum,
    Separator,
}

fn script_of(c: char) -> Script {
    match c {
        // Katakana middle dot and double hyphen separate words
        '\u{30A0}' | '\u{30FB}' => Script::Separator,
        '\u{3005}' | '\u{3006}' | '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}' | '\u{20000}'..='\u{2FFFF}' => Script::Han,
        '\u{3041}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' | '\u{31F0}'..='\u{31FF}' => Script::Kana,
        c if c.is_alphanumeric() => Script::Alnum,
        _ => Script::Separator,
    }
}

/// Split on script changes; separators end a run and are dropped
fn script_runs(text: &str) -> Vec<(Script, &str)> {
    let mut runs = Vec::new();
    let mut current: Option<(Script, usize)> = None;

    for (idx, c) in text.char_indices() {
        let script = script_of(c);
        match current {
            Some((run_script, _)) if run_script == script => {}
            Some((run_script, start)) => {
                if run_script != Script::Separator {
                    runs.push((run_script, &text[start..idx]));
                }
                current = Some((script, idx));
            }
            None => current = Some((script, idx)),
        }
    }
    if let Some((run_script, start)) = current {
        if run_script != Script::Separator {
            runs.push((run_script, &text[start..]));
        }
    }
    runs
}

/// Word segmentation and readings from the IPADIC dictionary bundled into
/// the binary
pub struct MorphologicalSegmenter {
    tokenizer: LinderaTokenizer,
}

impl MorphologicalSegmenter {
    pub fn ipadic() -> Result<Self, TokenizeError> {
        let dictionary = load_dictionary_from_kind(DictionaryKind::IPADIC)
            .map_err(|e| TokenizeError::Morphology(e.to_string()))?;
        let segmenter = LinderaSegmenter::new(Mode::Normal, dictionary, None);
        Ok(Self {
            tokenizer: LinderaTokenizer::new(segmenter),
        })
    }
}

impl Segmenter for MorphologicalSegmenter {
    fn segment(&self, text: &str) -> Result<Vec<Unit>, TokenizeError> {
        let mut tokens = self
            .tokenizer
            .tokenize(text)
            .map_err(|e| TokenizeError::Morphology(e.to_string()))?;

        let mut units = Vec::with_capacity(tokens.len());
        for token in tokens.iter_mut() {
            let surface = token.text.to_string();
            // Unknown words carry a single "UNK" feature; "*" marks a missing one
            let reading = token
                .details()
                .get(IPADIC_READING)
                .filter(|r| !r.is_empty() && **r != "*")
                .map(|r| r.to_string());
            units.push(Unit { surface, reading });
        }
        Ok(units)
    }
}

#[derive(Debug, Default)]
pub struct TinySegmenter;

impl Segmenter for TinySegmenter {
    fn segment(&self, text: &str) -> Result<Vec<Unit>, TokenizeError> {
        Ok(tinysegmenter::tokenize(text)
            .into_iter()
            .map(Unit::surface)
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct ScriptSegmenter;

impl Segmenter for ScriptSegmenter {
    fn segment(&self, text: &str) -> Result<Vec<Unit>, TokenizeError> {
        Ok(script_runs(text)
            .into_iter()
            .map(|(_, run)| Unit::surface(run))
            .collect())
    }
}

pub struct JiebaSegmenter {
    jieba: Jieba,
}

impl JiebaSegmenter {
    /// Loads the bundled jieba dictionary
    pub fn new() -> Self {
        Self {
            jieba: Jieba::new(),
        }
    }
}

impl Default for JiebaSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for JiebaSegmenter {
    fn segment(&self, text: &str) -> Result<Vec<Unit>, TokenizeError> {
        let mut units = Vec::new();
        for (script, run) in script_runs(text) {
            if script == Script::Han {
                units.extend(self.jieba.cut(run, false).into_iter().map(Unit::surface));
            } else {
                units.push(Unit::surface(run));
            }
        }
        Ok(units)
    }
}

#[derive(Debug, Default)]
pub struct TrigramSegmenter;

impl Segmenter for TrigramSegmenter {
    fn segment(&self, text: &str) -> Result<Vec<Unit>, TokenizeError> {
        let mut units = Vec::new();
        for word in text.split_whitespace() {
            let chars: Vec<char> = word.chars().collect();
            units.extend(
                chars
                    .chunks(3)
                    .map(|chunk| Unit::surface(chunk.iter().collect::<String>())),
            );
        }
        Ok(units)
    }
}

/// Surface form to reading, both stored in canonical form
#[derive(Debug, Clone, Default)]
pub struct ReadingDictionary {
    entries: HashMap<String, String>,
}

impl ReadingDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, S, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, R)>,
        S: AsRef<str>,
        R: AsRef<str>,
    {
        let mut dict = Self::new();
        for (surface, reading) in pairs {
            dict.insert(surface.as_ref(), reading.as_ref());
        }
        dict
    }

    /// Load a tab-separated `surface<TAB>reading` file.
    /// Blank lines and lines starting with `#` are skipped.
    pub fn load(path: &Path) -> Result<Self, TokenizeError> {
        let content = std::fs::read_to_string(path).map_err(|source| TokenizeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, TokenizeError> {
        let mut dict = Self::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = |reason: &str| TokenizeError::Dictionary {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: reason.to_string(),
            };
            let (surface, reading) = line
                .split_once('\t')
                .ok_or_else(|| malformed("expected surface<TAB>reading"))?;
            if surface.trim().is_empty() || reading.trim().is_empty() {
                return Err(malformed("empty surface or reading"));
            }
            dict.insert(surface, reading);
        }
        Ok(dict)
    }

    pub fn insert(&mut self, surface: &str, reading: &str) {
        self.entries.insert(normalize(surface), normalize(reading));
    }

    pub fn get(&self, canonical_surface: &str) -> Option<&str> {
        self.entries.get(canonical_surface).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct Tokenizer {
    mode: TokenizerMode,
    segmenter: Box<dyn Segmenter>,
    readings: ReadingDictionary,
}

impl Tokenizer {
    /// Build the segmenter for `mode`. Only the morphological mode can fail,
    /// when its dictionary does not load.
    pub fn new(mode: TokenizerMode) -> Result<Self, TokenizeError> {
        let segmenter: Box<dyn Segmenter> = match mode {
            TokenizerMode::Morphological => Box::new(MorphologicalSegmenter::ipadic()?),
            TokenizerMode::Tiny => Box::new(TinySegmenter),
            TokenizerMode::Script => Box::new(ScriptSegmenter),
            TokenizerMode::Jieba => Box::new(JiebaSegmenter::new()),
            TokenizerMode::Trigram => Box::new(TrigramSegmenter),
        };
        Ok(Self::with_segmenter(mode, segmenter))
    }

    pub fn with_segmenter(mode: TokenizerMode, segmenter: Box<dyn Segmenter>) -> Self {
        Self {
            mode,
            segmenter,
            readings: ReadingDictionary::new(),
        }
    }

    pub fn with_readings(mut self, readings: ReadingDictionary) -> Self {
        self.readings = readings;
        self
    }

    pub fn mode(&self) -> TokenizerMode {
        self.mode
    }

    /// Dictionary override first, then the segmenter's own reading
    fn reading_of(&self, canonical: &str, unit: &Unit) -> Option<String> {
        self.readings
            .get(canonical)
            .map(str::to_string)
            .or_else(|| unit.reading.as_deref().map(normalize))
    }

    /// Surface units plus their readings, canonical, deduplicated in first-seen order
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>, TokenizeError> {
        let folded = fold_width(text);
        let mut tokens: Vec<String> = Vec::new();

        for unit in self.segmenter.segment(&folded)? {
            let surface = normalize(&unit.surface);
            if !surface.chars().any(char::is_alphanumeric) {
                continue;
            }
            let reading = self.reading_of(&surface, &unit);
            push_unique(&mut tokens, surface);
            if let Some(reading) = reading {
                push_unique(&mut tokens, reading);
            }
        }

        for (script, run) in script_runs(&folded) {
            if script != Script::Han {
                continue;
            }
            let canonical = normalize(run);
            if let Some(reading) = self.readings.get(&canonical) {
                let reading = reading.to_string();
                push_unique(&mut tokens, canonical);
                push_unique(&mut tokens, reading);
            }
        }
        Ok(tokens)
    }

    /// Units joined back together, each replaced by its reading where one is
    /// known, in canonical form. Separators survive only if the segmenter
    /// emits them as units.
    pub fn reading_form(&self, text: &str) -> Result<String, TokenizeError> {
        let folded = fold_width(text);
        let mut out = String::with_capacity(folded.len());
        for unit in self.segmenter.segment(&folded)? {
            let surface = normalize(&unit.surface);
            match self.reading_of(&surface, &unit) {
                Some(reading) => out.push_str(&reading),
                None => out.push_str(&unit.surface),
            }
        }
        Ok(normalize(&out))
    }
}

fn push_unique(tokens: &mut Vec<String>, token: String) {
    if !tokens.contains(&token) {
        tokens.push(token);
    }
}

/// Owner of the normalizer's tokenizer
#[derive(Default)]
pub struct Analyzer {
    tokenizer: OnceCell<Tokenizer>,
}

impl Analyzer {
    /// Analyzer without a tokenizer; [`Analyzer::tokenize`] fails until one is installed
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn ready(tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer: OnceCell::with_value(tokenizer),
        }
    }

    pub fn install(&self, tokenizer: Tokenizer) -> Result<(), TokenizeError> {
        self.tokenizer
            .set(tokenizer)
            .map_err(|_| TokenizeError::AlreadyInstalled)
    }

    pub fn is_ready(&self) -> bool {
        self.tokenizer.get().is_some()
    }

    pub fn normalize(&self, text: &str) -> String {
        normalize(text)
    }

    fn tokenizer(&self) -> Result<&Tokenizer, TokenizeError> {
        self.tokenizer.get().ok_or(TokenizeError::NotReady)
    }

    pub fn tokenize(&self, text: &str) -> Result<Vec<String>, TokenizeError> {
        self.tokenizer()?.tokenize(text)
    }

    pub fn reading_form(&self, text: &str) -> Result<String, TokenizeError> {
        self.tokenizer()?.reading_form(text)
    }
}
