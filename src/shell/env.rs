use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

/// A shell variable: one or more string values. Clones share the backing
/// storage, so passing variables around is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    values: Arc<Vec<String>>,
}

impl EnvVar {
    pub fn new(values: Vec<String>) -> Self {
        Self {
            values: values.into(),
        }
    }

    pub fn one(value: impl Into<String>) -> Self {
        Self::new(vec![value.into()])
    }

    pub fn as_list(&self) -> &[String] {
        &self.values
    }

    /// The variable joined into a single word.
    pub fn as_string(&self) -> String {
        self.values.join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() || (self.values.len() == 1 && self.values[0].is_empty())
    }
}

/// Read-only access to variable values.
pub trait Environment {
    /// Get a variable by name.
    fn get(&self, name: &str) -> Option<EnvVar>;

    /// All visible variable names.
    fn get_names(&self) -> Vec<String>;
}

/// The null environment contains nothing.
#[derive(Debug)]
pub struct NullEnv;

impl Environment for NullEnv {
    fn get(&self, _name: &str) -> Option<EnvVar> {
        None
    }

    fn get_names(&self) -> Vec<String> {
        Vec::new()
    }
}

static NULL_ENV: NullEnv = NullEnv;

/// The shared null environment backing every context-free operation context.
/// Always the same instance, so callers may rely on identity.
pub fn null_env() -> &'static NullEnv {
    &NULL_ENV
}

/// The live variable store: a stack of scopes, innermost last. Internally
/// synchronized so one stack can back several nested operations.
#[derive(Debug)]
pub struct EnvStack {
    scopes: Mutex<Vec<IndexMap<String, EnvVar>>>,
}

impl Default for EnvStack {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvStack {
    pub fn new() -> Self {
        Self {
            scopes: Mutex::new(vec![IndexMap::new()]),
        }
    }

    /// A stack seeded from the process environment. `PATH` and `CDPATH` are
    /// split on `:` into list values.
    pub fn from_env() -> Self {
        let stack = Self::new();
        for (name, value) in std::env::vars() {
            if name == "PATH" || name == "CDPATH" {
                stack.set(&name, EnvVar::new(value.split(':').map(String::from).collect()));
            } else {
                stack.set_one(&name, value);
            }
        }
        stack
    }

    /// Set a variable in the innermost scope that already defines it, or
    /// define it in the current scope.
    pub fn set(&self, name: &str, var: EnvVar) {
        let mut scopes = self.scopes.lock().unwrap();
        for scope in scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = var;
                return;
            }
        }
        scopes.last_mut().unwrap().insert(name.to_string(), var);
    }

    pub fn set_one(&self, name: &str, value: impl Into<String>) {
        self.set(name, EnvVar::one(value));
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut scopes = self.scopes.lock().unwrap();
        for scope in scopes.iter_mut().rev() {
            if scope.shift_remove(name).is_some() {
                return true;
            }
        }
        false
    }

    /// Push a scope. Used for local variables in nested evaluations.
    pub fn push(&self) {
        self.scopes.lock().unwrap().push(IndexMap::new());
    }

    /// Pop the innermost scope. Popping the root scope is a programming
    /// error.
    pub fn pop(&self) {
        let mut scopes = self.scopes.lock().unwrap();
        assert!(scopes.len() > 1, "cannot pop the root variable scope");
        scopes.pop();
    }
}

impl Environment for EnvStack {
    fn get(&self, name: &str) -> Option<EnvVar> {
        let scopes = self.scopes.lock().unwrap();
        scopes.iter().rev().find_map(|scope| scope.get(name).cloned())
    }

    fn get_names(&self) -> Vec<String> {
        let scopes = self.scopes.lock().unwrap();
        let mut names = Vec::new();
        for scope in scopes.iter() {
            for name in scope.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_env_is_empty_and_identity_stable() {
        assert!(null_env().get("PATH").is_none());
        assert!(null_env().get_names().is_empty());
        assert!(std::ptr::eq(null_env(), null_env()));
    }

    #[test]
    fn scopes_shadow_and_unwind() {
        let stack = EnvStack::new();
        stack.set_one("x", "outer");
        stack.push();
        stack.set_one("y", "inner only");
        // x exists in the outer scope, so set updates it there.
        stack.set_one("x", "updated");
        stack.pop();
        assert_eq!(stack.get("x").unwrap().as_string(), "updated");
        assert!(stack.get("y").is_none());
    }

    #[test]
    fn remove_unsets() {
        let stack = EnvStack::new();
        stack.set_one("gone", "1");
        assert!(stack.remove("gone"));
        assert!(!stack.remove("gone"));
        assert!(stack.get("gone").is_none());
    }

    #[test]
    #[should_panic(expected = "root variable scope")]
    fn popping_root_scope_panics() {
        EnvStack::new().pop();
    }
}
