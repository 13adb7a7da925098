//! Rule loading and the per-process rule cache

use crate::rules::Rule;
use crate::{RuleError, RuleResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Rule documents compiled into the binary, keyed by source id
const BUNDLED_RULES: &[(u32, &str)] = &[
    (1, include_str!("../../rules/rule1.json")),
    (2, include_str!("../../rules/rule2.json")),
    (3, include_str!("../../rules/rule3.json")),
];

/// Where rule documents come from
#[derive(Debug, Clone)]
enum RuleOrigin {
    Bundled,
    Directory(PathBuf),
    Documents(HashMap<u32, String>),
}

/// Loads rules by source id and caches them for the life of the store
///
/// The first lookup of an id parses the document and publishes it; every
/// later lookup returns the same `Arc`. When two callers race on an unseen
/// id, both parse but only the first insert is kept and returned to both.
#[derive(Debug)]
pub struct RuleStore {
    origin: RuleOrigin,
    cache: RwLock<HashMap<u32, Arc<Rule>>>,
}

impl RuleStore {
    /// Store backed by the rules compiled into the binary
    pub fn bundled() -> Self {
        Self::with_origin(RuleOrigin::Bundled)
    }

    /// Store reading `rule<ID>.json` files from a directory
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self::with_origin(RuleOrigin::Directory(dir.into()))
    }

    /// Store backed by in-memory JSON documents
    pub fn from_documents<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        let documents = documents
            .into_iter()
            .map(|(id, doc)| (id, doc.into()))
            .collect();
        Self::with_origin(RuleOrigin::Documents(documents))
    }

    fn with_origin(origin: RuleOrigin) -> Self {
        Self {
            origin,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the rule for a source id, loading it on first use
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<Rule>)` - The cached rule instance
    /// * `Err(RuleError::UnknownSource)` - No rule exists for this id
    /// * `Err(RuleError)` - The rule exists but could not be read or parsed
    pub fn get_rule(&self, source_id: u32) -> RuleResult<Arc<Rule>> {
        if let Some(rule) = self.read_cache().get(&source_id) {
            return Ok(Arc::clone(rule));
        }

        let rule = Arc::new(self.load(source_id)?);

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        let winner = cache.entry(source_id).or_insert(rule);
        Ok(Arc::clone(winner))
    }

    /// Returns true if a rule for this id has already been loaded
    pub fn is_cached(&self, source_id: u32) -> bool {
        self.read_cache().contains_key(&source_id)
    }

    /// Lists the bundled source ids with their base URL
    pub fn bundled_sources() -> Vec<(u32, String)> {
        BUNDLED_RULES
            .iter()
            .filter_map(|(id, doc)| {
                serde_json::from_str::<Rule>(doc)
                    .ok()
                    .map(|rule| (*id, rule.url))
            })
            .collect()
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u32, Arc<Rule>>> {
        self.cache.read().unwrap_or_else(|e| e.into_inner())
    }

    fn load(&self, source_id: u32) -> RuleResult<Rule> {
        let document = match &self.origin {
            RuleOrigin::Bundled => BUNDLED_RULES
                .iter()
                .find(|(id, _)| *id == source_id)
                .map(|(_, doc)| doc.to_string())
                .ok_or(RuleError::UnknownSource(source_id))?,
            RuleOrigin::Directory(dir) => {
                let path = dir.join(format!("rule{}.json", source_id));
                match std::fs::read_to_string(&path) {
                    Ok(doc) => doc,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(RuleError::UnknownSource(source_id));
                    }
                    Err(source) => return Err(RuleError::Io { id: source_id, source }),
                }
            }
            RuleOrigin::Documents(documents) => documents
                .get(&source_id)
                .cloned()
                .ok_or(RuleError::UnknownSource(source_id))?,
        };

        tracing::debug!("Parsing rule for source {}", source_id);
        serde_json::from_str(&document).map_err(|source| RuleError::Malformed {
            id: source_id,
            source,
        })
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::bundled()
    }
}
