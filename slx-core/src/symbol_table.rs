//! Hierarchical symbol table with explicit scope open/close.
//!
//! Each scope maps an identifier to a list of symbols, so same-named
//! function overloads can coexist in one scope. Registration runs an
//! override policy callback when the identifier is already bound in the
//! current scope; the callback sees the prior binding and decides whether
//! the new one may join it.

use std::collections::HashMap;

/// Kind of scope, recorded for diagnostics and lookups that care about
/// the enclosing construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    FunctionBody,
    StructBody,
    CodeBlock,
    ForInit,
}

#[derive(Debug, Clone)]
struct Scope<T> {
    kind: ScopeKind,
    bindings: HashMap<String, Vec<T>>,
}

impl<T> Scope<T> {
    fn new(kind: ScopeKind) -> Self {
        Scope {
            kind,
            bindings: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SymbolTable<T> {
    scopes: Vec<Scope<T>>,
}

impl<T> Default for SymbolTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SymbolTable<T> {
    /// Create a table with an open global scope.
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope::new(ScopeKind::Global)],
        }
    }

    pub fn open_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    /// Close the innermost scope. The global scope stays open.
    pub fn close_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// 0 = global scope.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    pub fn current_scope_kind(&self) -> ScopeKind {
        self.scopes.last().map(|s| s.kind).unwrap_or(ScopeKind::Global)
    }

    pub fn in_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Register `symbol` under `name` in the current scope. If the name is
    /// already bound there, `on_override` is consulted for every prior
    /// binding; any rejection fails the whole registration.
    pub fn register<F>(&mut self, name: impl Into<String>, symbol: T, mut on_override: F) -> Result<(), String>
    where
        F: FnMut(&T, &T) -> bool,
    {
        let name = name.into();
        let scope = self.scopes.last_mut().expect("symbol table always has a scope");
        match scope.bindings.get_mut(&name) {
            Some(existing) => {
                if existing.iter().all(|prev| on_override(prev, &symbol)) {
                    existing.push(symbol);
                    Ok(())
                } else {
                    Err(format!("identifier '{}' already declared in this scope", name))
                }
            }
            None => {
                scope.bindings.insert(name, vec![symbol]);
                Ok(())
            }
        }
    }

    /// Innermost binding for `name`. With multiple bindings in the winning
    /// scope, the most recent wins.
    pub fn fetch(&self, name: &str) -> Option<&T> {
        self.fetch_with_depth(name).map(|(symbol, _)| symbol)
    }

    /// Like `fetch`, also reporting the scope depth of the match.
    pub fn fetch_with_depth(&self, name: &str) -> Option<(&T, usize)> {
        for (depth, scope) in self.scopes.iter().enumerate().rev() {
            if let Some(symbols) = scope.bindings.get(name) {
                if let Some(symbol) = symbols.last() {
                    return Some((symbol, depth));
                }
            }
        }
        None
    }

    pub fn fetch_in_current_scope(&self, name: &str) -> Option<&T> {
        self.scopes
            .last()
            .and_then(|scope| scope.bindings.get(name))
            .and_then(|symbols| symbols.last())
    }

    /// All bindings for `name` in the innermost scope that has any, e.g.
    /// the full overload set of a function name.
    pub fn fetch_all(&self, name: &str) -> &[T] {
        for scope in self.scopes.iter().rev() {
            if let Some(symbols) = scope.bindings.get(name) {
                return symbols;
            }
        }
        &[]
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.bindings.contains_key(name))
    }

    pub fn is_declared_in_current_scope(&self, name: &str) -> bool {
        self.scopes
            .last()
            .map(|scope| scope.bindings.contains_key(name))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reject_override(_: &i32, _: &i32) -> bool {
        false
    }

    #[test]
    fn test_shadowing_across_scopes() {
        let mut table: SymbolTable<i32> = SymbolTable::new();
        table.register("x", 1, reject_override).unwrap();
        assert_eq!(table.fetch("x"), Some(&1));

        table.open_scope(ScopeKind::CodeBlock);
        table.register("x", 2, reject_override).unwrap();
        table.register("y", 3, reject_override).unwrap();
        assert_eq!(table.fetch("x"), Some(&2));
        assert_eq!(table.fetch_with_depth("x"), Some((&2, 1)));

        table.close_scope();
        assert_eq!(table.fetch("x"), Some(&1));
        assert_eq!(table.fetch("y"), None);
    }

    #[test]
    fn test_override_policy() {
        let mut table: SymbolTable<i32> = SymbolTable::new();
        table.register("f", 1, reject_override).unwrap();
        // Same scope, rejecting policy.
        assert!(table.register("f", 2, reject_override).is_err());
        // Accepting policy builds an overload set.
        table.register("f", 2, |_, _| true).unwrap();
        assert_eq!(table.fetch_all("f"), &[1, 2]);
        assert_eq!(table.fetch("f"), Some(&2));
    }

    #[test]
    fn test_overload_set_not_merged_across_scopes() {
        let mut table: SymbolTable<i32> = SymbolTable::new();
        table.register("f", 1, |_, _| true).unwrap();
        table.open_scope(ScopeKind::FunctionBody);
        table.register("f", 2, |_, _| true).unwrap();
        // The inner binding shadows the outer set entirely.
        assert_eq!(table.fetch_all("f"), &[2]);
        table.close_scope();
        assert_eq!(table.fetch_all("f"), &[1]);
    }

    #[test]
    fn test_global_scope_never_closes() {
        let mut table: SymbolTable<i32> = SymbolTable::new();
        table.close_scope();
        table.register("x", 1, reject_override).unwrap();
        assert_eq!(table.fetch("x"), Some(&1));
        assert!(table.in_global_scope());
    }
}
