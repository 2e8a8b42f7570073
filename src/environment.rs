use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{diagnostics::Diagnostic, value::Value};

pub type EnvironmentRef = Rc<RefCell<Environment>>;

/// One scope frame. Lookups and assignments walk outward through `parent`;
/// declarations always land in the frame they are made in.
#[derive(Default)]
pub struct Environment {
    parent: Option<EnvironmentRef>,
    bindings: IndexMap<String, Binding>,
    dir: PathBuf,
}

#[derive(Clone)]
pub struct Binding {
    pub value: Value,
    pub constant: bool,
}

impl Environment {
    /// A root frame whose module searches are relative to `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: None,
            bindings: IndexMap::new(),
            dir: dir.into(),
        }))
    }

    /// A child frame inheriting the parent's directory.
    pub fn enclosed(parent: &EnvironmentRef) -> EnvironmentRef {
        let dir = parent.borrow().dir.clone();
        Self::enclosed_in(parent, dir)
    }

    pub fn enclosed_in(parent: &EnvironmentRef, dir: impl Into<PathBuf>) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: Some(Rc::clone(parent)),
            bindings: IndexMap::new(),
            dir: dir.into(),
        }))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Declares `name` in this frame, replacing any binding of the same
    /// name here.
    pub fn define(&mut self, name: impl Into<String>, value: Value, constant: bool) {
        self.bindings.insert(name.into(), Binding { value, constant });
    }

    /// Names declared directly in this frame, in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).map(|binding| binding.value.clone())
    }

    pub fn get(env: &EnvironmentRef, name: &str) -> Option<Value> {
        let mut frame = Rc::clone(env);
        loop {
            let parent = {
                let scope = frame.borrow();
                if let Some(binding) = scope.bindings.get(name) {
                    return Some(binding.value.clone());
                }
                let parent = scope.parent.clone();
                parent
            };
            frame = parent?;
        }
    }

    /// Rebinds the nearest existing `name`. Fails if that binding is
    /// constant or if no frame declares it.
    pub fn assign(env: &EnvironmentRef, name: &str, value: Value) -> Result<(), Diagnostic> {
        let mut frame = Rc::clone(env);
        loop {
            let parent = {
                let mut scope = frame.borrow_mut();
                if let Some(binding) = scope.bindings.get_mut(name) {
                    if binding.constant {
                        return Err(Diagnostic::runtime(format!(
                            "cannot assign to constant: {name}"
                        )));
                    }
                    binding.value = value;
                    return Ok(());
                }
                let parent = scope.parent.clone();
                parent
            };
            match parent {
                Some(parent) => frame = parent,
                None => {
                    return Err(Diagnostic::runtime(format!("undefined variable: {name}")));
                }
            }
        }
    }
}
