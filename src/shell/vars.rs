//! Variable Store
//!
//! The shell state the expansion core reads and mutates:
//! - scalar variables with a local-scope stack (dynamic scoping)
//! - indexed arrays (dense, negative indices count from the end)
//! - associative arrays (insertion-ordered so one expansion sees a stable
//!   enumeration order)
//! - per-variable attributes (nameref, readonly, integer, exported)
//! - positional parameters and the shell globals ($?, $$, $!, $_, ...)
//!
//! The executor owns a ShellVars and lends it to each expansion.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::nameref;

/// Default IFS value: space, tab, newline.
pub const DEFAULT_IFS: &str = " \t\n";

lazy_static::lazy_static! {
    /// Names that arithmetic assignment must never write to.
    static ref SENSITIVE_NAMES: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("PATH");
        s.insert("IFS");
        s.insert("HOME");
        s.insert("SHELL");
        s.insert("ENV");
        s.insert("LD_PRELOAD");
        s.insert("LD_LIBRARY_PATH");
        s
    };
}

/// Per-variable attribute flags (declare -n/-r/-i/-x).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VarAttrs {
    pub nameref: bool,
    pub readonly: bool,
    pub integer: bool,
    pub exported: bool,
}

/// Target scope for a write.
///
/// `Visible` stores into whatever scope a read would find the variable in
/// (innermost local shadowing global, falling back to global); `Local`
/// forces the innermost local scope, as function-local `declare` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Visible,
    Local,
}

/// Why a write was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetError {
    Readonly(String),
}

impl std::fmt::Display for SetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetError::Readonly(name) => write!(f, "{}: readonly variable", name),
        }
    }
}

/// The variable store.
pub struct ShellVars {
    globals: HashMap<String, String>,
    locals: Vec<HashMap<String, String>>,
    arrays: HashMap<String, Vec<String>>,
    assoc: HashMap<String, IndexMap<String, String>>,
    attrs: HashMap<String, VarAttrs>,
    positional: Vec<String>,
    /// $0 - defaults to "den"; the caller may overwrite it with a script name.
    pub shell_name: String,
    pub last_exit_code: i32,
    pub shell_pid: u32,
    pub parent_pid: u32,
    pub last_background_pid: u32,
    /// $_ - last argument of the previous command.
    pub last_arg: String,
    /// $LINENO - maintained by the executor.
    pub line_number: u32,
    started: Instant,
    rng: StdRng,
}

impl Default for ShellVars {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellVars {
    pub fn new() -> Self {
        #[cfg(unix)]
        let parent_pid = std::os::unix::process::parent_id();
        #[cfg(not(unix))]
        let parent_pid = 0;

        Self {
            globals: HashMap::new(),
            locals: Vec::new(),
            arrays: HashMap::new(),
            assoc: HashMap::new(),
            attrs: HashMap::new(),
            positional: Vec::new(),
            shell_name: "den".to_string(),
            last_exit_code: 0,
            shell_pid: std::process::id(),
            parent_pid,
            last_background_pid: 0,
            last_arg: String::new(),
            line_number: 0,
            started: Instant::now(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a store seeded from the process environment.
    /// Only the variables expansion cares about are imported.
    pub fn from_environment() -> Self {
        let mut vars = Self::new();
        for name in ["HOME", "PWD", "OLDPWD", "USER", "IFS", "PATH"] {
            if let Ok(value) = std::env::var(name) {
                vars.globals.insert(name.to_string(), value);
            }
        }
        vars
    }

    /// True if arithmetic assignment must not write to this name.
    pub fn is_sensitive(name: &str) -> bool {
        SENSITIVE_NAMES.contains(name)
    }

    /// Raw scalar lookup without nameref resolution: innermost local scope
    /// first, then globals.
    pub(crate) fn raw_get(&self, name: &str) -> Option<&str> {
        for scope in self.locals.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Some(value.as_str());
            }
        }
        self.globals.get(name).map(|s| s.as_str())
    }

    /// Read a scalar variable, following namerefs. An array name without a
    /// subscript decays to element 0 (bash behavior).
    pub fn get(&self, name: &str) -> Option<String> {
        let target = nameref::resolve(self, name);
        if let Some(value) = self.raw_get(&target) {
            return Some(value.to_string());
        }
        if let Some(elements) = self.arrays.get(&target) {
            return elements.first().cloned();
        }
        if let Some(map) = self.assoc.get(&target) {
            return map.get("0").cloned();
        }
        None
    }

    /// True if a variable is set in any form (scalar, array, or assoc).
    pub fn is_set(&self, name: &str) -> bool {
        let target = nameref::resolve(self, name);
        self.raw_get(&target).is_some()
            || self.arrays.contains_key(&target)
            || self.assoc.contains_key(&target)
    }

    /// Write a scalar variable, following namerefs and honoring readonly.
    pub fn set(&mut self, name: &str, value: &str, scope: Scope) -> Result<(), SetError> {
        let target = nameref::resolve(self, name);
        if self.attributes(&target).readonly {
            return Err(SetError::Readonly(target));
        }
        match scope {
            Scope::Local => {
                if let Some(frame) = self.locals.last_mut() {
                    frame.insert(target, value.to_string());
                } else {
                    self.globals.insert(target, value.to_string());
                }
            }
            Scope::Visible => {
                for frame in self.locals.iter_mut().rev() {
                    if frame.contains_key(&target) {
                        frame.insert(target, value.to_string());
                        return Ok(());
                    }
                }
                self.globals.insert(target, value.to_string());
            }
        }
        Ok(())
    }

    /// Remove a variable from every scope and form.
    pub fn unset(&mut self, name: &str) {
        let target = nameref::resolve(self, name);
        for frame in self.locals.iter_mut() {
            frame.remove(&target);
        }
        self.globals.remove(&target);
        self.arrays.remove(&target);
        self.assoc.remove(&target);
        self.attrs.remove(&target);
    }

    // ========================================================================
    // Indexed arrays
    // ========================================================================

    /// Declare an indexed array, replacing any previous value.
    pub fn declare_array(&mut self, name: &str, elements: Vec<String>) {
        self.arrays.insert(name.to_string(), elements);
    }

    pub fn is_array(&self, name: &str) -> bool {
        let target = nameref::resolve(self, name);
        self.arrays.contains_key(&target)
    }

    /// Read one array element. Negative indices count from the end.
    pub fn get_array(&self, name: &str, index: i64) -> Option<String> {
        let target = nameref::resolve(self, name);
        let elements = self.arrays.get(&target)?;
        let idx = normalize_index(index, elements.len())?;
        elements.get(idx).cloned()
    }

    /// Write one array element, padding intermediate slots with "".
    pub fn set_array(&mut self, name: &str, index: i64, value: &str) -> Result<(), SetError> {
        let target = nameref::resolve(self, name);
        if self.attributes(&target).readonly {
            return Err(SetError::Readonly(target));
        }
        let elements = self.arrays.entry(target).or_default();
        let idx = match normalize_index(index, elements.len()) {
            Some(i) => i,
            None if index >= 0 => index as usize,
            None => return Ok(()), // negative past the front: bad subscript, ignored
        };
        if idx >= elements.len() {
            elements.resize(idx + 1, String::new());
        }
        elements[idx] = value.to_string();
        Ok(())
    }

    /// All elements of an indexed array, in order.
    pub fn array_elements(&self, name: &str) -> Vec<String> {
        let target = nameref::resolve(self, name);
        self.arrays.get(&target).cloned().unwrap_or_default()
    }

    /// Indices of an indexed array (dense, so 0..len).
    pub fn enumerate_indices(&self, name: &str) -> Vec<i64> {
        let target = nameref::resolve(self, name);
        let len = self.arrays.get(&target).map_or(0, |v| v.len());
        (0..len as i64).collect()
    }

    // ========================================================================
    // Associative arrays
    // ========================================================================

    /// Declare an associative array, replacing any previous value.
    pub fn declare_assoc(&mut self, name: &str, pairs: Vec<(String, String)>) {
        let mut map = IndexMap::new();
        for (key, value) in pairs {
            map.insert(key, value);
        }
        self.assoc.insert(name.to_string(), map);
    }

    pub fn is_assoc(&self, name: &str) -> bool {
        let target = nameref::resolve(self, name);
        self.assoc.contains_key(&target)
    }

    pub fn get_assoc(&self, name: &str, key: &str) -> Option<String> {
        let target = nameref::resolve(self, name);
        self.assoc.get(&target)?.get(key).cloned()
    }

    pub fn set_assoc(&mut self, name: &str, key: &str, value: &str) -> Result<(), SetError> {
        let target = nameref::resolve(self, name);
        if self.attributes(&target).readonly {
            return Err(SetError::Readonly(target));
        }
        self.assoc
            .entry(target)
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// All variable names starting with `prefix`, sorted (for ${!prefix@}).
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for frame in &self.locals {
            names.extend(frame.keys().filter(|k| k.starts_with(prefix)).cloned());
        }
        names.extend(self.globals.keys().filter(|k| k.starts_with(prefix)).cloned());
        names.extend(self.arrays.keys().filter(|k| k.starts_with(prefix)).cloned());
        names.extend(self.assoc.keys().filter(|k| k.starts_with(prefix)).cloned());
        names.sort();
        names.dedup();
        names
    }

    /// Keys of an associative array in insertion order.
    pub fn enumerate_keys(&self, name: &str) -> Vec<String> {
        let target = nameref::resolve(self, name);
        self.assoc
            .get(&target)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Values of an associative array in insertion order.
    pub fn assoc_values(&self, name: &str) -> Vec<String> {
        let target = nameref::resolve(self, name);
        self.assoc
            .get(&target)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn attributes(&self, name: &str) -> VarAttrs {
        self.attrs.get(name).copied().unwrap_or_default()
    }

    pub fn set_attributes(&mut self, name: &str, attrs: VarAttrs) {
        self.attrs.insert(name.to_string(), attrs);
    }

    /// Mark a variable as a nameref (declare -n).
    pub fn mark_nameref(&mut self, name: &str) {
        let mut attrs = self.attributes(name);
        attrs.nameref = true;
        self.set_attributes(name, attrs);
    }

    /// Mark a variable readonly (declare -r).
    pub fn mark_readonly(&mut self, name: &str) {
        let mut attrs = self.attributes(name);
        attrs.readonly = true;
        self.set_attributes(name, attrs);
    }

    // ========================================================================
    // Scopes and positional parameters
    // ========================================================================

    /// Push a fresh local scope (function entry).
    pub fn push_local_scope(&mut self) {
        self.locals.push(HashMap::new());
    }

    /// Pop the innermost local scope (function exit).
    pub fn pop_local_scope(&mut self) {
        self.locals.pop();
    }

    pub fn positional_params(&self) -> &[String] {
        &self.positional
    }

    pub fn set_positional_params(&mut self, params: Vec<String>) {
        self.positional = params;
    }

    /// Read one positional parameter ($1 is index 1).
    pub fn positional(&self, number: usize) -> Option<String> {
        if number == 0 {
            return Some(self.shell_name.clone());
        }
        self.positional.get(number - 1).cloned()
    }

    // ========================================================================
    // Shell globals
    // ========================================================================

    pub fn last_exit_code(&self) -> i32 {
        self.last_exit_code
    }

    pub fn set_last_exit_code(&mut self, code: i32) {
        self.last_exit_code = code;
    }

    /// Current IFS: the IFS variable if set (including empty), else default.
    pub fn get_ifs(&self) -> String {
        self.get("IFS").unwrap_or_else(|| DEFAULT_IFS.to_string())
    }

    /// First IFS character, used to join $* and ${!prefix*}.
    /// Unset IFS joins with a space; empty IFS joins with nothing.
    pub fn ifs_separator(&self) -> String {
        match self.get("IFS") {
            None => " ".to_string(),
            Some(ifs) => ifs.chars().next().map(|c| c.to_string()).unwrap_or_default(),
        }
    }

    /// Advance the cached $RANDOM generator.
    pub fn next_random(&mut self) -> u16 {
        self.rng.gen::<u16>() % 32768
    }

    /// Whole seconds since the store was created ($SECONDS).
    pub fn seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

/// Map a possibly negative index onto 0..len.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    if index >= 0 {
        let idx = index as usize;
        if idx < len { Some(idx) } else { None }
    } else {
        let from_end = len as i64 + index;
        if from_end >= 0 { Some(from_end as usize) } else { None }
    }
}
