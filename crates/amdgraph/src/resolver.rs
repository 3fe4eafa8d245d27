//! Dependency resolution
//!
//! Computes the transitive dependency closure of a module and the ordered
//! list of files needed to load it.

use crate::registry::{ModuleRegistry, ResolveError, Resolver};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Insertion-ordered set of module ids reached from one entry module
///
/// Lives for a single resolution call.
#[derive(Debug, Clone)]
pub struct Context {
    name: String,
    list: Vec<String>,
    seen: HashSet<String>,
}

impl Context {
    /// Create an empty context for `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            list: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Entry module this context was created for
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Append `id` unless already present; returns whether it was added
    pub fn push(&mut self, id: &str) -> bool {
        if self.seen.insert(id.to_string()) {
            self.list.push(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.list.iter().map(String::as_str)
    }

    /// Module ids in discovery order
    pub fn into_vec(self) -> Vec<String> {
        self.list
    }
}

/// Closure computation over a module graph
pub trait ClosureComputer {
    /// Every module reachable from `entry`, the entry itself first
    fn find_all_dependency_modules(&self, entry: &str) -> Result<Vec<String>, ResolveError>;

    /// Files for the closure of `entry`, in reverse discovery order
    fn find_all_dependency_files(&self, entry: &str) -> Result<Vec<String>, ResolveError>;
}

/// Resolves dependency closures against a read-only module index
pub struct DependencyResolver<'a, R: Resolver + ?Sized = ModuleRegistry> {
    registry: &'a R,
}

impl<'a, R: Resolver + ?Sized> DependencyResolver<'a, R> {
    /// Create a resolver borrowing `registry`
    pub fn new(registry: &'a R) -> Self {
        Self { registry }
    }

    /// Breadth-first walk from `entry`
    ///
    /// The canonical entry id is pushed before traversal begins, so it is
    /// always at index 0. Every other id is queued at most once per visit;
    /// in a cycle the first discovered position wins.
    pub fn context(&self, entry: &str) -> Result<Context, ResolveError> {
        let entry_id = self.registry.resolve_module(entry)?;
        let root = self.registry.get(entry_id)?;

        let mut context = Context::new(entry_id);
        context.push(entry_id);

        let mut queue: VecDeque<&str> = root.dependency_ids.iter().map(String::as_str).collect();

        while let Some(name) = queue.pop_front() {
            if self.registry.is_reserved(name) || context.has(name) {
                continue;
            }

            let id = self.registry.resolve_module(name)?;
            let module = self.registry.get(id)?;
            if !context.push(id) {
                continue;
            }

            for dep in &module.dependency_ids {
                if !context.has(dep) && !self.registry.is_reserved(dep) {
                    queue.push_back(dep);
                }
            }
        }

        debug!(entry = entry_id, modules = context.len(), "resolved closure");
        Ok(context)
    }
}

impl<R: Resolver + ?Sized> ClosureComputer for DependencyResolver<'_, R> {
    fn find_all_dependency_modules(&self, entry: &str) -> Result<Vec<String>, ResolveError> {
        Ok(self.context(entry)?.into_vec())
    }

    fn find_all_dependency_files(&self, entry: &str) -> Result<Vec<String>, ResolveError> {
        let context = self.context(entry)?;
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        // Latest discovered first: deepest prerequisites lead.
        for id in context.iter().rev() {
            let file = &self.registry.get(id)?.file_id;
            if seen.insert(file.as_str()) {
                files.push(file.clone());
            }
        }

        Ok(files)
    }
}
