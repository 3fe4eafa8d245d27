//! Bundle planning
//!
//! Splits the files required by a set of entry modules into one bundle per
//! entry plus a shared bundle holding the files most entries need.

use crate::registry::{ModuleRegistry, ResolveError, Resolver};
use crate::resolver::{ClosureComputer, DependencyResolver};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default name of the shared bundle
pub const DEFAULT_SHARED_BUNDLE: &str = "r.core";

/// Default promotion threshold (strict majority)
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Errors that can occur while planning bundles
#[derive(Debug, Error)]
pub enum PlanError {
    /// An entry's closure could not be resolved
    #[error("entry '{entry}' failed: {source}")]
    Entry {
        entry: String,
        #[source]
        source: ResolveError,
    },

    /// Nothing to plan
    #[error("no entry modules to plan")]
    NoEntries,

    /// An entry would overwrite the shared bundle
    #[error("entry '{0}' collides with the shared bundle name")]
    BundleNameCollision(String),
}

/// Shared-bundle extraction settings
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerOptions {
    /// Fraction of entries a file must exceed to be shared, in (0, 1]
    pub threshold: f64,

    /// Name the shared bundle is emitted under
    pub shared_bundle_name: String,

    /// File moved to the front of the shared bundle when present
    pub pinned_entry_file: Option<String>,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            shared_bundle_name: DEFAULT_SHARED_BUNDLE.to_string(),
            pinned_entry_file: None,
        }
    }
}

/// Entry name → ordered file list
pub type EntryFileMap = BTreeMap<String, Vec<String>>;

/// Final bundle layout: every file appears in exactly one bundle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BundleMap {
    shared_name: String,
    bundles: BTreeMap<String, Vec<String>>,
}

impl BundleMap {
    /// Assemble from pruned entry lists and the shared file list
    pub fn new(shared_name: impl Into<String>, entries: EntryFileMap, shared: Vec<String>) -> Self {
        let shared_name = shared_name.into();
        let mut bundles = entries;
        bundles.insert(shared_name.clone(), shared);
        Self {
            shared_name,
            bundles,
        }
    }

    pub fn shared_name(&self) -> &str {
        &self.shared_name
    }

    /// Files of the shared bundle
    pub fn shared(&self) -> &[String] {
        self.get(&self.shared_name).unwrap_or(&[])
    }

    pub fn get(&self, bundle: &str) -> Option<&[String]> {
        self.bundles.get(bundle).map(Vec::as_slice)
    }

    /// Bundles in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.bundles.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn bundles(&self) -> &BTreeMap<String, Vec<String>> {
        &self.bundles
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

/// Result of a full planning run
#[derive(Debug)]
pub struct PlanOutcome {
    pub bundles: BundleMap,

    /// Entries left out because their closure failed to resolve
    pub failures: Vec<PlanError>,
}

/// How entry modules are chosen
#[derive(Debug, Clone)]
pub enum EntrySelector {
    /// A fixed list of module names
    Explicit(Vec<String>),

    /// Every registered module id matching the pattern
    Pattern(Regex),
}

impl EntrySelector {
    /// Entry names for `registry`, sorted for pattern matches
    pub fn select(&self, registry: &ModuleRegistry) -> Vec<String> {
        match self {
            EntrySelector::Explicit(names) => names.clone(),
            EntrySelector::Pattern(re) => registry
                .module_ids()
                .into_iter()
                .filter(|id| re.is_match(id))
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Bundle planning operations
pub trait Planner {
    /// Closure file list per distinct entry; fails on the first unresolvable one
    fn plan_entry_file_maps(&self, entries: &[String]) -> Result<EntryFileMap, PlanError>;

    /// Move widely shared files out of the entry lists
    fn extract_shared_bundle(&self, entry_file_maps: EntryFileMap) -> (EntryFileMap, Vec<String>);
}

/// Drives closure computation once per entry and partitions the result
pub struct BundlePlanner<'a, R: Resolver + ?Sized = ModuleRegistry> {
    registry: &'a R,
    resolver: DependencyResolver<'a, R>,
    options: PlannerOptions,
}

impl<'a, R: Resolver + ?Sized> BundlePlanner<'a, R> {
    /// Create a planner with default options
    pub fn new(registry: &'a R) -> Self {
        Self {
            registry,
            resolver: DependencyResolver::new(registry),
            options: PlannerOptions::default(),
        }
    }

    /// Set the planner options
    pub fn with_options(mut self, options: PlannerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    /// Plan every entry, skipping the ones that fail to resolve
    ///
    /// Failed entries are reported in [`PlanOutcome::failures`] and take no
    /// part in scoring.
    pub fn plan(&self, entries: &[String]) -> Result<PlanOutcome, PlanError> {
        if entries.is_empty() {
            return Err(PlanError::NoEntries);
        }
        if let Some(entry) = entries
            .iter()
            .find(|e| **e == self.options.shared_bundle_name)
        {
            return Err(PlanError::BundleNameCollision(entry.clone()));
        }

        let mut maps = EntryFileMap::new();
        let mut failures = Vec::new();
        for entry in self.distinct_entries(entries) {
            match self.entry_files(entry) {
                Ok(files) => {
                    maps.insert(entry.clone(), files);
                }
                Err(err) => {
                    warn!("{}", err);
                    failures.push(err);
                }
            }
        }

        let (maps, shared) = self.extract_shared_bundle(maps);
        info!(
            entries = maps.len(),
            shared = shared.len(),
            failed = failures.len(),
            "planned bundles"
        );

        Ok(PlanOutcome {
            bundles: BundleMap::new(self.options.shared_bundle_name.clone(), maps, shared),
            failures,
        })
    }

    /// Entries in order, dropping any that resolve to an id already listed
    ///
    /// Unresolvable names are kept so their failure gets reported.
    fn distinct_entries<'e>(&self, entries: &'e [String]) -> Vec<&'e String> {
        let mut seen = HashSet::new();
        entries
            .iter()
            .filter(|entry| match self.registry.resolve_module(entry) {
                Ok(id) if !seen.insert(id) => {
                    debug!(entry = entry.as_str(), module = id, "duplicate entry skipped");
                    false
                }
                _ => true,
            })
            .collect()
    }

    fn entry_files(&self, entry: &str) -> Result<Vec<String>, PlanError> {
        self.resolver
            .find_all_dependency_files(entry)
            .map_err(|source| PlanError::Entry {
                entry: entry.to_string(),
                source,
            })
    }
}

impl<R: Resolver + ?Sized> Planner for BundlePlanner<'_, R> {
    fn plan_entry_file_maps(&self, entries: &[String]) -> Result<EntryFileMap, PlanError> {
        self.distinct_entries(entries)
            .into_iter()
            .map(|entry| Ok::<_, PlanError>((entry.clone(), self.entry_files(entry)?)))
            .collect()
    }

    fn extract_shared_bundle(&self, entry_file_maps: EntryFileMap) -> (EntryFileMap, Vec<String>) {
        extract_shared_bundle(entry_file_maps, &self.options)
    }
}

/// Number of entries whose list contains each file
pub fn score_files(entry_file_maps: &EntryFileMap) -> BTreeMap<String, usize> {
    let mut scores: BTreeMap<String, usize> = BTreeMap::new();
    for files in entry_file_maps.values() {
        let unique: HashSet<&str> = files.iter().map(String::as_str).collect();
        for file in unique {
            *scores.entry(file.to_string()).or_default() += 1;
        }
    }
    scores
}

/// Split files shared by more than `threshold` of the entries into a shared list
///
/// The shared list is sorted, with the pinned file (if shared) moved to the
/// front. Pruned entry lists keep their original order.
pub fn extract_shared_bundle(
    mut entry_file_maps: EntryFileMap,
    options: &PlannerOptions,
) -> (EntryFileMap, Vec<String>) {
    let total = entry_file_maps.len();
    if total == 0 {
        return (entry_file_maps, Vec::new());
    }

    let promoted: BTreeSet<String> = score_files(&entry_file_maps)
        .into_iter()
        .filter(|(_, count)| *count as f64 / total as f64 > options.threshold)
        .map(|(file, _)| file)
        .collect();

    for files in entry_file_maps.values_mut() {
        files.retain(|f| !promoted.contains(f));
    }

    let mut shared: Vec<String> = promoted.into_iter().collect();
    if let Some(pinned) = &options.pinned_entry_file {
        if let Some(pos) = shared.iter().position(|f| f == pinned) {
            let file = shared.remove(pos);
            shared.insert(0, file);
        }
    }

    debug!(entries = total, shared = shared.len(), "extracted shared bundle");
    (entry_file_maps, shared)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maps(entries: &[(&str, &[&str])]) -> EntryFileMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_two_entries_share_util() {
        let input = maps(&[("page1", &["util.js", "a.js"]), ("page2", &["util.js", "b.js"])]);
        let (entries, shared) = extract_shared_bundle(input, &PlannerOptions::default());

        assert_eq!(entries["page1"], vec!["a.js"]);
        assert_eq!(entries["page2"], vec!["b.js"]);
        assert_eq!(shared, vec!["util.js"]);
    }

    #[test]
    fn test_half_is_not_a_majority() {
        let input = maps(&[
            ("p1", &["half.js", "a.js"]),
            ("p2", &["half.js"]),
            ("p3", &["c.js"]),
            ("p4", &["d.js"]),
        ]);
        let (entries, shared) = extract_shared_bundle(input, &PlannerOptions::default());

        assert!(shared.is_empty());
        assert_eq!(entries["p1"], vec!["half.js", "a.js"]);
    }

    #[test]
    fn test_shared_sorted_with_pinned_first() {
        let input = maps(&[
            ("p1", &["b.js", "r.core.js", "a.js"]),
            ("p2", &["a.js", "b.js", "r.core.js"]),
        ]);
        let options = PlannerOptions {
            pinned_entry_file: Some("r.core.js".to_string()),
            ..PlannerOptions::default()
        };
        let (_, shared) = extract_shared_bundle(input, &options);
        assert_eq!(shared, vec!["r.core.js", "a.js", "b.js"]);
    }

    #[test]
    fn test_threshold_one_never_promotes() {
        let input = maps(&[("p1", &["x.js"]), ("p2", &["x.js"])]);
        let options = PlannerOptions {
            threshold: 1.0,
            ..PlannerOptions::default()
        };
        let (entries, shared) = extract_shared_bundle(input, &options);
        assert!(shared.is_empty());
        assert_eq!(entries["p2"], vec!["x.js"]);
    }

    #[test]
    fn test_single_entry_moves_everything_to_shared() {
        let input = maps(&[("only", &["z.js", "a.js"])]);
        let (entries, shared) = extract_shared_bundle(input, &PlannerOptions::default());
        assert!(entries["only"].is_empty());
        assert_eq!(shared, vec!["a.js", "z.js"]);
    }

    #[test]
    fn test_score_counts_entries() {
        let input = maps(&[("p1", &["a.js", "b.js"]), ("p2", &["a.js"])]);
        let scores = score_files(&input);
        assert_eq!(scores["a.js"], 2);
        assert_eq!(scores["b.js"], 1);
    }

    #[test]
    fn test_bundle_map_shared_accessor() {
        let map = BundleMap::new("common", maps(&[("p", &["a.js"])]), vec!["u.js".into()]);
        assert_eq!(map.shared(), ["u.js".to_string()]);
        assert_eq!(map.get("p").unwrap(), ["a.js".to_string()]);
        assert_eq!(map.len(), 2);
    }
}
