//! The immutable knowledge corpus
//!
//! A corpus is built once (from the embedded data or a JSON file) and then
//! shared by reference; nothing mutates it afterwards.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, Result};

use super::entry::{Category, KnowledgeEntry};

const BUILTIN_CORPUS: &str = include_str!("builtin.json");

/// Validated, id-indexed set of knowledge entries
#[derive(Debug, Clone)]
pub struct KnowledgeCorpus {
    entries: Vec<KnowledgeEntry>,
    index: HashMap<String, usize>,
}

impl KnowledgeCorpus {
    /// Build a corpus, rejecting empty or duplicate ids and blank keywords
    pub fn new(entries: Vec<KnowledgeEntry>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entries.len());

        for (position, entry) in entries.iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(Error::CorpusInvalid(format!(
                    "entry at position {} has an empty id",
                    position
                )));
            }
            if entry.keywords.iter().any(|keyword| keyword.trim().is_empty()) {
                return Err(Error::CorpusInvalid(format!(
                    "entry '{}' has a blank keyword",
                    entry.id
                )));
            }
            if index.insert(entry.id.clone(), position).is_some() {
                return Err(Error::CorpusInvalid(format!("duplicate id '{}'", entry.id)));
            }
        }

        let corpus = Self { entries, index };
        let dangling = corpus.dangling_links();
        if !dangling.is_empty() {
            debug!(count = dangling.len(), "Corpus has links to unknown entries");
        }

        Ok(corpus)
    }

    /// The hand-authored corpus shipped with Chronos
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_CORPUS)
    }

    /// Parse a JSON array of entries
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: Vec<KnowledgeEntry> = serde_json::from_str(json)
            .map_err(|e| Error::CorpusInvalid(format!("not a JSON array of entries: {}", e)))?;
        Self::new(entries)
    }

    /// Load a corpus from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let corpus = Self::from_json_str(&contents)?;
        info!(path = %path.display(), entries = corpus.len(), "Loaded knowledge corpus");
        Ok(corpus)
    }

    /// Load from `path` when given, otherwise the built-in corpus
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&KnowledgeEntry> {
        self.index.get(id).map(|&position| &self.entries[position])
    }

    /// Like `get`, but a missing id is an error
    pub fn require(&self, id: &str) -> Result<&KnowledgeEntry> {
        self.get(id).ok_or_else(|| Error::EntryNotFound(id.to_string()))
    }

    /// Entries in authoring order
    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Titles of the entries `entry` links to, skipping unknown ids
    pub fn related_titles<'a>(&'a self, entry: &KnowledgeEntry) -> Vec<&'a str> {
        entry
            .related_ids
            .iter()
            .filter_map(|id| self.get(id))
            .map(|related| related.title.as_str())
            .collect()
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &KnowledgeEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.category == category)
    }

    /// `(source, target)` pairs whose target is not in the corpus
    pub fn dangling_links(&self) -> Vec<(&str, &str)> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .flat_map(|entry| {
                entry
                    .related_ids
                    .iter()
                    .map(move |target| (entry.id.as_str(), target.as_str()))
            })
            .filter(|(_, target)| !self.contains(target))
            .filter(|pair| seen.insert(*pair))
            .collect()
    }
}
