//! Scopes, name tables and the call stack
//!
//! Scopes live in an arena and refer to their parent by index, so caller and
//! callee frames never hold references into each other. The externals table
//! sits at the root of every lookup and wins for every name it registers.

use crate::error::{RuntimeError, RuntimeResult, StackKind};
use crate::symbol::{Pointer, Symbol};
use std::collections::HashMap;
use std::hash::Hash;

/// Index of a scope inside a [`ScopeArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// One level of bindings
#[derive(Debug, Clone)]
pub struct Scope<K> {
    bindings: HashMap<K, Symbol>,
    parent: Option<ScopeId>,
}

impl<K: Eq + Hash> Scope<K> {
    fn new(parent: Option<ScopeId>) -> Self {
        Self {
            bindings: HashMap::new(),
            parent,
        }
    }

    pub fn get(&self, key: &K) -> Option<&Symbol> {
        self.bindings.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.bindings.contains_key(key)
    }

    pub fn insert(&mut self, key: K, value: Symbol) {
        self.bindings.insert(key, value);
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Stack-shaped arena of scopes. The last pushed scope is the current one.
#[derive(Debug, Clone)]
pub struct ScopeArena<K> {
    scopes: Vec<Scope<K>>,
}

impl<K: Eq + Hash> ScopeArena<K> {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    /// Push a scope chained to `parent` and make it current
    pub fn push(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(Scope::new(parent));
        ScopeId(self.scopes.len() - 1)
    }

    /// Pop the current scope
    pub fn pop(&mut self) -> RuntimeResult<Scope<K>> {
        self.scopes
            .pop()
            .ok_or(RuntimeError::StackUnderflow(StackKind::Scope))
    }

    pub fn current(&self) -> RuntimeResult<ScopeId> {
        if self.scopes.is_empty() {
            Err(RuntimeError::StackUnderflow(StackKind::Scope))
        } else {
            Ok(ScopeId(self.scopes.len() - 1))
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn scope(&self, id: ScopeId) -> &Scope<K> {
        &self.scopes[id.0]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope<K> {
        &mut self.scopes[id.0]
    }

    /// Find the nearest scope, starting at `from`, that binds `key`
    pub fn resolve(&self, from: ScopeId, key: &K) -> Option<ScopeId> {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let scope = self.scope(id);
            if scope.contains(key) {
                return Some(id);
            }
            cursor = scope.parent();
        }
        None
    }

    pub fn lookup(&self, from: ScopeId, key: &K) -> Option<&Symbol> {
        self.resolve(from, key)
            .and_then(|id| self.scope(id).get(key))
    }
}

impl<K: Eq + Hash> Default for ScopeArena<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable table of host-provided names (constants and primitives)
#[derive(Debug, Clone, Default)]
pub struct Externals {
    symbols: HashMap<String, Symbol>,
}

impl Externals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name. Only used while building the table.
    pub fn with(mut self, name: &str, value: Symbol) -> Self {
        self.symbols.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }
}

/// Scope chain rooted at the externals table, keyed by [`Pointer`]
pub struct Environment<'a> {
    externals: &'a Externals,
    arena: ScopeArena<Pointer>,
}

impl<'a> Environment<'a> {
    pub fn new(externals: &'a Externals) -> Self {
        Self {
            externals,
            arena: ScopeArena::new(),
        }
    }

    pub fn push_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.arena.push(parent)
    }

    pub fn pop_scope(&mut self) -> RuntimeResult<()> {
        self.arena.pop().map(|_| ())
    }

    pub fn depth(&self) -> usize {
        self.arena.depth()
    }

    pub fn current_scope(&self) -> RuntimeResult<ScopeId> {
        self.arena.current()
    }

    /// Resolve a pointer: externals first, then the current scope chain
    pub fn lookup(&self, pointer: &Pointer) -> RuntimeResult<Option<Symbol>> {
        if let Some(symbol) = self.externals.get(pointer.name()) {
            return Ok(Some(symbol.clone()));
        }
        let current = self.arena.current()?;
        Ok(self.arena.lookup(current, pointer).cloned())
    }

    /// Bind in the nearest scope that already binds the pointer, else in the
    /// current scope. External names are never writable.
    pub fn put(&mut self, pointer: Pointer, value: Symbol) -> RuntimeResult<()> {
        if self.externals.contains(pointer.name()) {
            return Err(RuntimeError::ExternalReassignment {
                name: pointer.name().to_string(),
            });
        }
        let current = self.arena.current()?;
        let target = self.arena.resolve(current, &pointer).unwrap_or(current);
        self.arena.scope_mut(target).insert(pointer, value);
        Ok(())
    }

    /// Bind directly in a given scope (parameters, declarations)
    pub fn define(&mut self, scope: ScopeId, pointer: Pointer, value: Symbol) -> RuntimeResult<()> {
        if self.externals.contains(pointer.name()) {
            return Err(RuntimeError::ExternalReassignment {
                name: pointer.name().to_string(),
            });
        }
        self.arena.scope_mut(scope).insert(pointer, value);
        Ok(())
    }
}

/// Per-function renaming of source names to small positional ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameTable {
    ids: HashMap<String, u32>,
    names: Vec<String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `name`, allocating the next one on first sight
    pub fn id_of(&mut self, name: &str) -> u32 {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = self.names.len() as u32;
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        id
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

/// Where execution resumes after a call returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnSite {
    pub function: String,
    pub position: usize,
}

/// Stack of return sites; depth equals the current recursion depth
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    sites: Vec<ReturnSite>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, site: ReturnSite) {
        self.sites.push(site);
    }

    pub fn pop(&mut self) -> RuntimeResult<ReturnSite> {
        self.sites
            .pop()
            .ok_or(RuntimeError::StackUnderflow(StackKind::Call))
    }

    pub fn depth(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn top(&self) -> Option<&ReturnSite> {
        self.sites.last()
    }
}
