//! Module registry
//!
//! In-memory index of every AMD module defined in a source tree, the files
//! that define them, and the alias layer used to resolve module references.

use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while resolving a module reference
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Name matches neither a known module id nor an alias
    #[error("module (name=\"{0}\") cannot be resolved")]
    Unresolved(String),

    /// Name resolved, but no module record exists for the result
    #[error("module (name=\"{0}\") does not exist")]
    Unknown(String),
}

impl ResolveError {
    /// The offending module name
    pub fn name(&self) -> &str {
        match self {
            ResolveError::Unresolved(name) | ResolveError::Unknown(name) => name,
        }
    }
}

/// Identifiers that are never resolved as real modules
pub const BASE_RESERVED: [&str; 4] = ["global", "require", "exports", "module"];

/// What the parsing collaborator reports for one module definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Dependency ids in declaration order
    pub dependency_ids: Vec<String>,
}

impl ModuleRecord {
    pub fn new<I, S>(deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dependency_ids: deps.into_iter().map(Into::into).collect(),
        }
    }
}

/// Module definitions extracted from one file, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRecords {
    entries: Vec<(String, ModuleRecord)>,
}

impl ModuleRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the record for `id`; a replaced id keeps its position
    pub fn insert(&mut self, id: String, record: ModuleRecord) {
        match self.entries.iter_mut().find(|(k, _)| *k == id) {
            Some((_, existing)) => *existing = record,
            None => self.entries.push((id, record)),
        }
    }

    /// Record for `id`, appending an empty one if absent
    pub fn get_or_default(&mut self, id: String) -> &mut ModuleRecord {
        let pos = match self.entries.iter().position(|(k, _)| *k == id) {
            Some(pos) => pos,
            None => {
                self.entries.push((id, ModuleRecord::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos].1
    }

    pub fn get(&self, id: &str) -> Option<&ModuleRecord> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, r)| r)
    }

    /// Module ids in declaration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for ModuleRecords {
    type Item = (String, ModuleRecord);
    type IntoIter = std::vec::IntoIter<(String, ModuleRecord)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, ModuleRecord)> for ModuleRecords {
    fn from_iter<T: IntoIterator<Item = (String, ModuleRecord)>>(iter: T) -> Self {
        let mut records = Self::new();
        for (id, record) in iter {
            records.insert(id, record);
        }
        records
    }
}

/// A named AMD module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Module id (unique within a registry)
    pub id: String,

    /// Declared dependencies, deduplicated, first-declared order
    pub dependency_ids: Vec<String>,

    /// Project-relative path of the defining file
    pub file_id: String,
}

impl Module {
    /// Create a module with no dependencies
    pub fn new(id: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dependency_ids: Vec::new(),
            file_id: file_id.into(),
        }
    }

    /// Add a dependency, ignoring duplicates
    pub fn add_dependency(&mut self, dep: impl Into<String>) {
        let dep = dep.into();
        if !self.dependency_ids.contains(&dep) {
            self.dependency_ids.push(dep);
        }
    }
}

/// A source file known to the registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEntry {
    /// Project-relative path
    pub path: String,

    /// Content digest, used only as a change marker
    pub content_hash: String,

    /// Ids of the modules this file defines
    pub defined_module_ids: Vec<String>,
}

/// Alias name → canonical module id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.entries.insert(alias.into(), target.into());
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AliasTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Reserved identifiers: the AMD pseudo-modules plus configured extras
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedNames {
    names: HashSet<String>,
}

impl ReservedNames {
    /// Base reserved set extended with `extra`
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: HashSet<String> = BASE_RESERVED.iter().map(|s| s.to_string()).collect();
        names.extend(extra.into_iter().map(Into::into));
        Self { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ReservedNames {
    fn default() -> Self {
        Self::with_extra(std::iter::empty::<String>())
    }
}

/// Name resolution against a set of known modules
pub trait Resolver {
    /// Canonical module id for `name`: itself if known, else its alias target
    fn resolve_module(&self, name: &str) -> Result<&str, ResolveError>;

    /// Module record for `name` after resolution
    fn get(&self, name: &str) -> Result<&Module, ResolveError>;

    /// Whether `name` is a reserved pseudo-module
    fn is_reserved(&self, name: &str) -> bool;
}

/// Index of modules and files for one build run
///
/// Mutated only while ingesting; every query borrows it immutably.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Module>,
    files: BTreeMap<String, FileEntry>,
    aliases: AliasTable,
    reserved: ReservedNames,
    partial: bool,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new(aliases: AliasTable, reserved: ReservedNames) -> Self {
        Self {
            modules: HashMap::new(),
            files: BTreeMap::new(),
            aliases,
            reserved,
            partial: false,
        }
    }

    /// Record the modules a file defines
    ///
    /// Overwrites the file's previous entry and any module with the same id.
    /// Modules the file used to define are left in place; use
    /// [`ModuleRegistry::remove_file`] or [`ModuleRegistry::reset`] to drop them.
    pub fn ingest(&mut self, file_id: &str, content_hash: &str, records: ModuleRecords) {
        let mut defined = Vec::with_capacity(records.len());

        for (id, record) in records {
            let mut module = Module::new(id.clone(), file_id);
            for dep in record.dependency_ids {
                if !self.reserved.contains(&dep) {
                    module.add_dependency(dep);
                }
            }
            defined.push(id.clone());
            self.modules.insert(id, module);
        }

        debug!(file = file_id, modules = defined.len(), "ingested file");

        self.files.insert(
            file_id.to_string(),
            FileEntry {
                path: file_id.to_string(),
                content_hash: content_hash.to_string(),
                defined_module_ids: defined,
            },
        );
    }

    /// Insert a module record directly, creating its file entry if needed
    pub fn insert_module(&mut self, mut module: Module) {
        module.dependency_ids.retain(|d| !self.reserved.contains(d));
        let entry = self
            .files
            .entry(module.file_id.clone())
            .or_insert_with(|| FileEntry {
                path: module.file_id.clone(),
                ..FileEntry::default()
            });
        if !entry.defined_module_ids.contains(&module.id) {
            entry.defined_module_ids.push(module.id.clone());
        }
        self.modules.insert(module.id.clone(), module);
    }

    /// Insert a file entry as-is
    pub fn insert_file(&mut self, entry: FileEntry) {
        self.files.insert(entry.path.clone(), entry);
    }

    /// Drop a file and the modules it still defines
    ///
    /// Returns the removed entry, if any.
    pub fn remove_file(&mut self, file_id: &str) -> Option<FileEntry> {
        let entry = self.files.remove(file_id)?;
        for id in &entry.defined_module_ids {
            if self
                .modules
                .get(id)
                .is_some_and(|m| m.file_id == file_id)
            {
                self.modules.remove(id);
            }
        }
        Some(entry)
    }

    /// Forget every file and module, keeping aliases and reserved names
    pub fn reset(&mut self) {
        self.modules.clear();
        self.files.clear();
        self.partial = false;
    }

    /// Flag the registry as built from an interrupted scan
    pub fn mark_partial(&mut self) {
        self.partial = true;
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Copy of a module's direct dependency list
    pub fn get_deps(&self, name: &str) -> Result<Vec<String>, ResolveError> {
        Ok(self.get(name)?.dependency_ids.clone())
    }

    /// File path for `name`, falling back to `<name>.js` for unknown modules
    pub fn resolve_path(&self, name: &str) -> String {
        match self.get(name) {
            Ok(module) => module.file_id.clone(),
            Err(_) => format!("{}.js", name),
        }
    }

    /// Module by exact id, without alias resolution
    pub fn module(&self, id: &str) -> Option<&Module> {
        self.modules.get(id)
    }

    /// File entry by path
    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Files in path order
    pub fn files(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.values()
    }

    /// All module ids, sorted
    pub fn module_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn reserved(&self) -> &ReservedNames {
        &self.reserved
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.files.is_empty()
    }
}

impl Resolver for ModuleRegistry {
    fn resolve_module(&self, name: &str) -> Result<&str, ResolveError> {
        if let Some((id, _)) = self.modules.get_key_value(name) {
            return Ok(id.as_str());
        }
        self.aliases
            .get(name)
            .ok_or_else(|| ResolveError::Unresolved(name.to_string()))
    }

    fn get(&self, name: &str) -> Result<&Module, ResolveError> {
        let id = self.resolve_module(name)?;
        self.modules
            .get(id)
            .ok_or_else(|| ResolveError::Unknown(id.to_string()))
    }

    fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }
}
