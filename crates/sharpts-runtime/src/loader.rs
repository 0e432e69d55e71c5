//! The module loader interface: both the checker and the evaluator may
//! need to pull another file's exports into the pipeline, but neither
//! owns how a specifier resolves to source text — that is a host
//! concern, deliberately kept off the filesystem. `ModuleLoader` is the
//! seam; `InMemoryLoader` is the one concrete implementation this crate
//! ships, good enough to drive tests and a single-file CLI invocation
//! without ever touching a filesystem.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;
use sharpts_common::Atom;

use crate::value::RuntimeValue;

/// A loaded module's evaluated export bundle. Re-evaluating the same
/// specifier twice would re-run its top-level side effects, so a loader
/// is expected to cache by resolved specifier (`InMemoryLoader` does);
/// `Module` itself is just the resulting read-only export map.
#[derive(Clone, Default)]
pub struct Module {
    exports: FxHashMap<Atom, RuntimeValue>,
}

impl Module {
    pub fn new(exports: FxHashMap<Atom, RuntimeValue>) -> Self {
        Module { exports }
    }

    pub fn get(&self, name: &Atom) -> Option<RuntimeValue> {
        self.exports.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Atom, &RuntimeValue)> {
        self.exports.iter()
    }
}

/// Resolves specifiers and loads module exports. `resolve` alone (no
/// evaluation) backs the checker's static `typeof import(...)` paths;
/// `load` is what the evaluator calls for `import`/`import()`, and is
/// expected to evaluate the target exactly once per resolved path.
pub trait ModuleLoader: Send + Sync {
    /// `resolve(specifier, importerPath) → absolutePath`.
    fn resolve(&self, specifier: &str, importer: &str) -> Result<String, String>;

    fn load(self: Arc<Self>, specifier: &str) -> Result<Module, String>;
}

/// Dynamic `import()` hands its caller a namespace object wrapped in a
/// `Promise`, so `ExprKind::DynamicImport` needs a `RuntimeValue` view of
/// a loaded module's exports; static `import`/`import * as ns` consume
/// `Module` directly through `.get`/`.iter()`.
pub fn module_to_value(module: &Module) -> RuntimeValue {
    let mut props = indexmap::IndexMap::new();
    for (k, v) in module.iter() {
        props.insert(k.clone(), crate::value::PropertySlot::value(v.clone()));
    }
    RuntimeValue::object(crate::value::ObjectData { props, symbol_props: Default::default(), is_fresh_literal: false })
}

/// Resolves relative/bare specifiers against a fixed map of
/// specifier → source text supplied up front. Each entry is lexed,
/// parsed, and evaluated in its own fresh sub-evaluator sharing nothing
/// with the importer except the loader itself — module initialization
/// order is leaves-first because a module's own imports resolve (and
/// therefore evaluate) before its body runs.
pub struct InMemoryLoader {
    sources: FxHashMap<String, String>,
    cache: Mutex<FxHashMap<String, Module>>,
}

impl InMemoryLoader {
    pub fn new(sources: FxHashMap<String, String>) -> Arc<Self> {
        Arc::new(InMemoryLoader { sources, cache: Mutex::new(FxHashMap::default()) })
    }

    fn evaluate(self: &Arc<Self>, specifier: &str, source: &str) -> Result<Module, String> {
        let (statements, diagnostics) = sharpts_parser::parse_program(source);
        if diagnostics.iter().any(|d| d.category == sharpts_common::DiagnosticCategory::Error) {
            return Err(format!("module '{specifier}' failed to parse"));
        }
        let mut evaluator = crate::evaluator::Evaluator::new(self.clone(), crate::evaluator::EvalOptions::default());
        if let Err(e) = evaluator.run_program(&statements) {
            return Err(format!("uncaught exception evaluating module {specifier}: {}", e.display_string()));
        }
        let mut exports = FxHashMap::default();
        for stmt in &statements {
            collect_top_level_exports(&evaluator, stmt, &mut exports);
        }
        Ok(Module::new(exports))
    }
}

fn collect_top_level_exports(
    evaluator: &crate::evaluator::Evaluator,
    stmt: &sharpts_parser::ast::Stmt,
    out: &mut FxHashMap<Atom, RuntimeValue>,
) {
    use sharpts_parser::ast::{ExportDecl, StmtKind};
    let StmtKind::Export(decl) = &stmt.kind else { return };
    match decl {
        ExportDecl::Default(_) => {
            if let Some(v) = evaluator.global.get(&Atom::new("default")) {
                out.insert(Atom::new("default"), v);
            }
        }
        ExportDecl::Declaration(inner) => {
            let name = match &inner.kind {
                StmtKind::Function(f) => f.name.as_ref().map(|n| n.name.clone()),
                StmtKind::Class(c) => c.name.as_ref().map(|n| n.name.clone()),
                StmtKind::Enum(e) => Some(e.name.name.clone()),
                StmtKind::Namespace(n) => Some(n.name.clone()),
                StmtKind::VarDecl { declarators, .. } => {
                    for d in declarators {
                        if let sharpts_parser::ast::BindingPattern::Identifier(ident) = &d.pattern {
                            if let Some(v) = evaluator.global.get(&ident.name) {
                                out.insert(ident.name.clone(), v);
                            }
                        }
                    }
                    None
                }
                _ => None,
            };
            if let Some(name) = name {
                if let Some(v) = evaluator.global.get(&name) {
                    out.insert(name, v);
                }
            }
        }
        ExportDecl::Named { specifiers, .. } => {
            for spec in specifiers {
                if let Some(v) = evaluator.global.get(&spec.local) {
                    out.insert(spec.exported.name.clone(), v);
                }
            }
        }
        ExportDecl::ReExportAll { .. } => {}
    }
}

impl ModuleLoader for InMemoryLoader {
    fn resolve(&self, specifier: &str, importer: &str) -> Result<String, String> {
        if self.sources.contains_key(specifier) {
            return Ok(specifier.to_string());
        }
        // Relative specifiers resolve against the importer's own key, not
        // the filesystem — there is no filesystem here.
        if let Some(base) = importer.rsplit_once('/') {
            let candidate = format!("{}/{}", base.0, specifier.trim_start_matches("./"));
            if self.sources.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(format!("Cannot find module '{specifier}'"))
    }

    fn load(self: Arc<Self>, specifier: &str) -> Result<Module, String> {
        let resolved = self.resolve(specifier, "")?;
        if let Some(cached) = self.cache.lock().expect("loader cache poisoned").get(&resolved) {
            return Ok(cached.clone());
        }
        let source = self.sources.get(&resolved).cloned().ok_or_else(|| format!("Cannot find module '{specifier}'"))?;
        let module = self.evaluate(&resolved, &source)?;
        self.cache.lock().expect("loader cache poisoned").insert(resolved, module.clone());
        Ok(module)
    }
}
