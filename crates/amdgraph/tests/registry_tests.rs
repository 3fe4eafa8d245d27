//! Integration tests for the module registry

use amdgraph::{
    AliasTable, FileEntry, Module, ModuleRecord, ModuleRecords, ModuleRegistry, ReservedNames,
    ResolveError, Resolver,
};

fn registry() -> ModuleRegistry {
    let mut aliases = AliasTable::new();
    aliases.insert("$", "vendor/zepto");
    aliases.insert("tpl", "vendor/mustache");
    let mut registry = ModuleRegistry::new(aliases, ReservedNames::with_extra(["jquery"]));

    let mut records = ModuleRecords::new();
    records.insert("vendor/zepto".into(), ModuleRecord::default());
    registry.ingest("vendor/zepto.js", "z", records);

    let mut records = ModuleRecords::new();
    records.insert("app".into(), ModuleRecord::new(["$", "jquery", "require", "util"]));
    records.insert("util".into(), ModuleRecord::default());
    registry.ingest("app.js", "a", records);
    registry
}

#[test]
fn test_resolution_is_idempotent() {
    let registry = registry();
    for name in ["app", "util", "$", "vendor/zepto"] {
        let id = registry.resolve_module(name).unwrap();
        assert_eq!(registry.resolve_module(id).unwrap(), id);
    }
}

#[test]
fn test_module_id_wins_over_alias() {
    let mut registry = registry();
    registry.insert_module(Module::new("$", "dollar.js"));
    assert_eq!(registry.resolve_module("$").unwrap(), "$");
    assert_eq!(registry.resolve_path("$"), "dollar.js");
}

#[test]
fn test_configured_reserved_names_dropped_from_deps() {
    let registry = registry();
    assert_eq!(registry.get_deps("app").unwrap(), vec!["$", "util"]);
    assert!(registry.is_reserved("jquery"));
    assert!(!registry.is_reserved("util"));
}

#[test]
fn test_get_reports_both_failure_kinds() {
    let registry = registry();
    assert!(matches!(
        registry.get("nope"),
        Err(ResolveError::Unresolved(name)) if name == "nope"
    ));
    assert!(matches!(
        registry.get("tpl"),
        Err(ResolveError::Unknown(name)) if name == "vendor/mustache"
    ));
    assert!(registry.get_deps("nope").is_err());
}

#[test]
fn test_insert_module_creates_file_entry() {
    let mut registry = ModuleRegistry::default();
    let mut module = Module::new("page/index", "page/index.js");
    module.add_dependency("exports");
    module.add_dependency("lib");
    module.add_dependency("lib");
    registry.insert_module(module);

    let file = registry.file("page/index.js").unwrap();
    assert_eq!(file.defined_module_ids, vec!["page/index"]);
    assert_eq!(registry.get_deps("page/index").unwrap(), vec!["lib"]);
}

#[test]
fn test_insert_file_as_is() {
    let mut registry = ModuleRegistry::default();
    registry.insert_file(FileEntry {
        path: "empty.js".into(),
        content_hash: "e3".into(),
        defined_module_ids: Vec::new(),
    });
    assert_eq!(registry.file_count(), 1);
    assert_eq!(registry.module_count(), 0);
    assert!(!registry.is_empty());
}

#[test]
fn test_listing_is_sorted() {
    let registry = registry();
    assert_eq!(registry.module_ids(), vec!["app", "util", "vendor/zepto"]);
    let files: Vec<&str> = registry.files().map(|f| f.path.as_str()).collect();
    assert_eq!(files, vec!["app.js", "vendor/zepto.js"]);
}

#[test]
fn test_resolver_as_trait_object() {
    let registry = registry();
    let resolver: &dyn Resolver = &registry;
    assert_eq!(resolver.get("$").unwrap().file_id, "vendor/zepto.js");
}
