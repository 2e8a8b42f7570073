//! `@name` module loading: search roots, the per-thread cache and the
//! loader itself.

use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::{
    diagnostics::Diagnostic,
    environment::{Environment, EnvironmentRef},
    methods::module_member,
    parser,
    runtime::{Eval, Interpreter},
    value::{Module, Value, ValueKind},
};

pub const MODULE_EXTENSION: &str = "lynx";
pub const DEFAULT_STD_ROOT: &str = "/usr/local/lib/lynx/std";

/// Where `@name` looks for `name.lynx`, in order. Exactly one root may
/// hold the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSearch {
    pub std_root: Option<PathBuf>,
    /// Search the directory of the loading script.
    pub script_dir: bool,
    pub local_root: Option<PathBuf>,
    pub home_root: Option<PathBuf>,
}

impl Default for ModuleSearch {
    fn default() -> Self {
        Self {
            std_root: Some(PathBuf::from(DEFAULT_STD_ROOT)),
            script_dir: true,
            local_root: Some(PathBuf::from("./modules")),
            home_root: dirs::home_dir().map(|home| home.join("modules")),
        }
    }
}

impl ModuleSearch {
    /// Only the loading script's directory.
    pub fn script_dir_only() -> Self {
        Self {
            std_root: None,
            script_dir: true,
            local_root: None,
            home_root: None,
        }
    }

    /// Candidate files for `name`, in search order. A root listed twice is
    /// searched once.
    pub fn candidates(&self, name: &str, script_dir: &Path) -> Vec<PathBuf> {
        let file = format!("{name}.{MODULE_EXTENSION}");
        let script_root = self.script_dir.then(|| script_dir.to_path_buf());
        [
            self.std_root.clone(),
            script_root,
            self.local_root.clone(),
            self.home_root.clone(),
        ]
        .into_iter()
        .flatten()
        .map(|root| root.join(&file))
        .fold(Vec::new(), |mut paths, path| {
            if !paths.contains(&path) {
                paths.push(path);
            }
            paths
        })
    }

    fn locate(&self, name: &str, script_dir: &Path) -> Result<PathBuf, Diagnostic> {
        let (found, tried): (Vec<PathBuf>, Vec<PathBuf>) = self
            .candidates(name, script_dir)
            .into_iter()
            .partition(|path| path.is_file());
        tracing::debug!(module = name, found = found.len(), tried = tried.len(), "module search");
        match found.as_slice() {
            [path] => Ok(path.clone()),
            [] => Err(Diagnostic::runtime(format!(
                "could not find module {name:?} in the following paths: {}",
                display_paths(&tried)
            ))),
            _ => Err(Diagnostic::runtime(format!(
                "module {name:?} conflicts: found in multiple paths: {}",
                display_paths(&found)
            ))),
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    let shown: Vec<String> = paths.iter().map(|path| path.display().to_string()).collect();
    format!("[{}]", shown.join(", "))
}

thread_local! {
    static MODULE_CACHE: RefCell<HashMap<String, Value>> = RefCell::new(HashMap::new());
}

/// Memoized modules, keyed by name. The interpreter is single-threaded,
/// so the table lives per thread and entries are never replaced.
pub struct ModuleCache;

impl ModuleCache {
    pub fn get(name: &str) -> Option<Value> {
        MODULE_CACHE.with(|cache| cache.borrow().get(name).cloned())
    }

    /// Stores `module` unless `name` is already cached, and returns the
    /// cached entry either way.
    pub fn insert_if_absent(name: &str, module: Value) -> Value {
        MODULE_CACHE.with(|cache| {
            cache
                .borrow_mut()
                .entry(name.to_string())
                .or_insert(module)
                .clone()
        })
    }

    pub fn contains(name: &str) -> bool {
        MODULE_CACHE.with(|cache| cache.borrow().contains_key(name))
    }

    pub fn clear() {
        MODULE_CACHE.with(|cache| cache.borrow_mut().clear());
    }
}

impl Interpreter {
    pub(crate) fn load_module(
        &mut self,
        name: &str,
        members: Option<&[String]>,
        env: &EnvironmentRef,
    ) -> Eval<Value> {
        let module = match ModuleCache::get(name) {
            Some(module) => {
                tracing::debug!(module = name, "module cache hit");
                module
            }
            None => {
                tracing::debug!(module = name, "module cache miss");
                let script_dir = env.borrow().dir().to_path_buf();
                let built = self.build_module(name, &script_dir)?;
                ModuleCache::insert_if_absent(name, built)
            }
        };

        let ValueKind::Module(loaded) = module.kind() else {
            return Err(Diagnostic::runtime(format!("{name} is not a module")).into());
        };
        match members {
            None => env.borrow_mut().define(name, module.clone(), true),
            Some(members) => {
                for member in members {
                    let value = module_member(&loaded.env, name, member)?;
                    env.borrow_mut().define(member.clone(), value, true);
                }
            }
        }
        Ok(Value::null())
    }

    fn build_module(&mut self, name: &str, script_dir: &Path) -> Eval<Value> {
        if let Some(start) = self.loading.iter().position(|loading| loading == name) {
            let mut chain = self.loading[start..].to_vec();
            chain.push(name.to_string());
            return Err(Diagnostic::runtime(format!(
                "circular module load: {}",
                chain.join(" -> ")
            ))
            .into());
        }

        let path = self.search.locate(name, script_dir)?;
        let source = fs::read_to_string(&path).map_err(|err| {
            Diagnostic::runtime(format!("could not read module {}: {err}", path.display()))
        })?;
        let program = parser::parse_program(&source).map_err(|err| {
            err.diagnostics().iter().fold(
                Diagnostic::runtime(format!("parse errors in {}", path.display())),
                |acc, diag| acc.with_note(diag.to_string()),
            )
        })?;

        let module_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| script_dir.to_path_buf());
        let module_env = Environment::enclosed_in(&self.globals, module_dir);

        self.loading.push(name.to_string());
        let outcome = self.eval_statements(&program.statements, &module_env);
        self.loading.pop();
        outcome?;

        let members = module_env.borrow().names();
        tracing::debug!(module = name, path = %path.display(), members = members.len(), "module loaded");
        Ok(Value::new(ValueKind::Module(Module {
            name: name.to_string(),
            env: Rc::clone(&module_env),
            members,
        })))
    }
}
