//! Integration tests for module resolution and dependency closures

use amdgraph::{
    AliasTable, ClosureComputer, DependencyResolver, ModuleRecord, ModuleRecords, ModuleRegistry,
    ReservedNames, ResolveError, Resolver,
};
use std::collections::{HashMap, HashSet};

fn define(registry: &mut ModuleRegistry, file: &str, id: &str, deps: &[&str]) {
    let mut records = ModuleRecords::new();
    records.insert(id.to_string(), ModuleRecord::new(deps.iter().copied()));
    registry.ingest(file, "", records);
}

fn project() -> ModuleRegistry {
    let aliases: AliasTable = [("$", "vendor/zepto"), ("tpl", "vendor/mustache")]
        .into_iter()
        .collect();
    let mut registry = ModuleRegistry::new(aliases, ReservedNames::with_extra(["jquery"]));
    define(&mut registry, "r.core.js", "r.core", &["global"]);
    define(&mut registry, "vendor/zepto.js", "vendor/zepto", &["r.core"]);
    define(&mut registry, "vendor/mustache.js", "vendor/mustache", &[]);
    define(&mut registry, "ui/view.js", "ui/view", &["$", "tpl", "r.core"]);
    define(&mut registry, "ui/list.js", "ui/list", &["ui/view", "jquery"]);
    define(
        &mut registry,
        "page/index.js",
        "page/index",
        &["require", "exports", "ui/list", "ui/view", "$"],
    );
    registry
}

/// Reachable set computed independently with a recursive walk
fn reachable(registry: &ModuleRegistry, entry: &str) -> HashSet<String> {
    fn walk(registry: &ModuleRegistry, name: &str, seen: &mut HashSet<String>) {
        if registry.is_reserved(name) {
            return;
        }
        let id = registry.resolve_module(name).unwrap().to_string();
        if !seen.insert(id.clone()) {
            return;
        }
        for dep in &registry.get(&id).unwrap().dependency_ids {
            walk(registry, dep, seen);
        }
    }
    let mut seen = HashSet::new();
    walk(registry, entry, &mut seen);
    seen
}

#[test]
fn test_alias_resolution_is_idempotent() {
    let registry = project();
    let names: Vec<String> = registry
        .module_ids()
        .into_iter()
        .map(str::to_string)
        .chain(["$".to_string(), "tpl".to_string()])
        .collect();

    for name in names {
        let once = registry.resolve_module(&name).unwrap();
        let twice = registry.resolve_module(once).unwrap();
        assert_eq!(once, twice, "resolving {} twice changed the result", name);
    }
}

#[test]
fn test_closure_contains_every_reachable_module_once() {
    let registry = project();
    let resolver = DependencyResolver::new(&registry);

    for entry in registry.module_ids() {
        let closure = resolver.find_all_dependency_modules(entry).unwrap();
        let unique: HashSet<String> = closure.iter().cloned().collect();

        assert_eq!(unique.len(), closure.len(), "duplicates in closure of {}", entry);
        assert_eq!(unique, reachable(&registry, entry), "closure of {}", entry);
        assert_eq!(closure[0], entry);
        for reserved in ["global", "require", "exports", "module", "jquery"] {
            assert!(!unique.contains(reserved));
        }
    }
}

#[test]
fn test_closure_breadth_first_order() {
    let registry = project();
    let resolver = DependencyResolver::new(&registry);

    assert_eq!(
        resolver.find_all_dependency_modules("page/index").unwrap(),
        vec![
            "page/index",
            "ui/list",
            "ui/view",
            "vendor/zepto",
            "vendor/mustache",
            "r.core"
        ]
    );
}

#[test]
fn test_files_in_reverse_discovery_order() {
    let registry = project();
    let resolver = DependencyResolver::new(&registry);

    assert_eq!(
        resolver.find_all_dependency_files("page/index").unwrap(),
        vec![
            "r.core.js",
            "vendor/mustache.js",
            "vendor/zepto.js",
            "ui/view.js",
            "ui/list.js",
            "page/index.js"
        ]
    );
}

#[test]
fn test_entry_by_alias() {
    let registry = project();
    let resolver = DependencyResolver::new(&registry);
    assert_eq!(
        resolver.find_all_dependency_modules("$").unwrap(),
        vec!["vendor/zepto", "r.core"]
    );
}

#[test]
fn test_documented_example() {
    let mut registry = ModuleRegistry::default();
    define(&mut registry, "app.js", "app", &["util", "ui"]);
    define(&mut registry, "util.js", "util", &[]);
    define(&mut registry, "ui.js", "ui", &["util"]);
    let resolver = DependencyResolver::new(&registry);

    assert_eq!(
        resolver.find_all_dependency_modules("app").unwrap(),
        vec!["app", "util", "ui"]
    );
    assert_eq!(
        resolver.find_all_dependency_files("app").unwrap(),
        vec!["ui.js", "util.js", "app.js"]
    );
}

#[test]
fn test_two_module_cycle() {
    let mut registry = ModuleRegistry::default();
    define(&mut registry, "a.js", "A", &["B"]);
    define(&mut registry, "b.js", "B", &["A"]);
    let resolver = DependencyResolver::new(&registry);

    assert_eq!(resolver.find_all_dependency_modules("A").unwrap(), vec!["A", "B"]);
    assert_eq!(resolver.find_all_dependency_modules("B").unwrap(), vec!["B", "A"]);
    assert_eq!(
        resolver.find_all_dependency_files("A").unwrap(),
        vec!["b.js", "a.js"]
    );
}

#[test]
fn test_long_chain_does_not_recurse() {
    let mut registry = ModuleRegistry::default();
    let count = 20_000;
    for i in 0..count {
        let id = format!("m{}", i);
        let next = format!("m{}", i + 1);
        let deps: Vec<&str> = if i + 1 < count { vec![next.as_str()] } else { vec![] };
        define(&mut registry, &format!("{}.js", id), &id, &deps);
    }
    let resolver = DependencyResolver::new(&registry);

    let files = resolver.find_all_dependency_files("m0").unwrap();
    assert_eq!(files.len(), count);
    assert_eq!(files.first().map(String::as_str), Some("m19999.js"));
    assert_eq!(files.last().map(String::as_str), Some("m0.js"));
}

#[test]
fn test_unresolved_entry() {
    let registry = project();
    let resolver = DependencyResolver::new(&registry);
    assert_eq!(
        resolver.find_all_dependency_files("page/missing").unwrap_err(),
        ResolveError::Unresolved("page/missing".to_string())
    );
}

#[test]
fn test_dangling_alias_is_unknown() {
    let aliases: AliasTable = [("tpl", "vendor/handlebars")].into_iter().collect();
    let mut registry = ModuleRegistry::new(aliases, ReservedNames::default());
    define(&mut registry, "view.js", "view", &["tpl"]);
    let resolver = DependencyResolver::new(&registry);

    let err = resolver.find_all_dependency_modules("view").unwrap_err();
    assert_eq!(err, ResolveError::Unknown("vendor/handlebars".to_string()));
    assert_eq!(err.name(), "vendor/handlebars");
}

/// Resolver over a plain map, without a registry
struct MapResolver {
    modules: HashMap<String, amdgraph::Module>,
}

impl Resolver for MapResolver {
    fn resolve_module(&self, name: &str) -> Result<&str, ResolveError> {
        self.modules
            .get_key_value(name)
            .map(|(k, _)| k.as_str())
            .ok_or_else(|| ResolveError::Unresolved(name.to_string()))
    }

    fn get(&self, name: &str) -> Result<&amdgraph::Module, ResolveError> {
        let id = self.resolve_module(name)?;
        self.modules
            .get(id)
            .ok_or_else(|| ResolveError::Unknown(id.to_string()))
    }

    fn is_reserved(&self, name: &str) -> bool {
        name == "require"
    }
}

#[test]
fn test_resolver_over_custom_index() {
    let mut modules = HashMap::new();
    let mut main = amdgraph::Module::new("main", "main.js");
    main.add_dependency("require");
    main.add_dependency("lib");
    modules.insert("main".to_string(), main);
    modules.insert("lib".to_string(), amdgraph::Module::new("lib", "lib.js"));

    let index = MapResolver { modules };
    let resolver = DependencyResolver::new(&index);
    assert_eq!(
        resolver.find_all_dependency_files("main").unwrap(),
        vec!["lib.js", "main.js"]
    );
}
