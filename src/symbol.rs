use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    Free,
    /// The name a function literal was bound to, visible only inside its own
    /// body; resolves to the currently-executing closure.
    Function,
}

/// A name binding: where it lives and its dense index within that scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One lexical scope's bindings. Tables nest through `outer`; resolving a
/// local of an enclosing function converts it into a free symbol here, which
/// transitively captures upvalues through every intermediate function.
#[derive(Debug, Default)]
pub struct SymbolTable {
    outer: Option<Rc<RefCell<SymbolTable>>>,
    store: HashMap<String, Symbol>,
    pub free_symbols: Vec<Symbol>,
    pub num_definitions: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_enclosed(outer: Rc<RefCell<SymbolTable>>) -> Self {
        Self {
            outer: Some(outer),
            ..Self::default()
        }
    }

    pub fn outer(&self) -> Option<Rc<RefCell<SymbolTable>>> {
        self.outer.clone()
    }

    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free_symbols.len(),
        };
        self.free_symbols.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// Resolve a name, walking outward. A Local (or Free) binding found in an
    /// enclosing function is converted into a Free binding of `table`;
    /// Global and Builtin bindings are returned as-is.
    pub fn resolve(table: &Rc<RefCell<SymbolTable>>, name: &str) -> Option<Symbol> {
        if let Some(symbol) = table.borrow().store.get(name) {
            return Some(symbol.clone());
        }

        let outer = table.borrow().outer.clone()?;
        let symbol = Self::resolve(&outer, name)?;
        if matches!(symbol.scope, SymbolScope::Global | SymbolScope::Builtin) {
            return Some(symbol);
        }

        Some(table.borrow_mut().define_free(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(table: SymbolTable) -> Rc<RefCell<SymbolTable>> {
        Rc::new(RefCell::new(table))
    }

    #[test]
    fn define_assigns_scopes_and_indices() {
        let global = shared(SymbolTable::new());
        let a = global.borrow_mut().define("a");
        let b = global.borrow_mut().define("b");
        assert_eq!(a.scope, SymbolScope::Global);
        assert_eq!(a.index, 0);
        assert_eq!(b.index, 1);

        let local = shared(SymbolTable::new_enclosed(global));
        let c = local.borrow_mut().define("c");
        assert_eq!(c.scope, SymbolScope::Local);
        assert_eq!(c.index, 0);
    }

    #[test]
    fn resolve_global() {
        let global = shared(SymbolTable::new());
        global.borrow_mut().define("a");
        global.borrow_mut().define("b");

        let a = SymbolTable::resolve(&global, "a").expect("a resolves");
        assert_eq!(a.scope, SymbolScope::Global);
        assert_eq!(a.index, 0);
        assert!(SymbolTable::resolve(&global, "missing").is_none());
    }

    #[test]
    fn resolve_local_and_global_through_nesting() {
        let global = shared(SymbolTable::new());
        global.borrow_mut().define("a");

        let first = shared(SymbolTable::new_enclosed(global));
        first.borrow_mut().define("c");

        let second = shared(SymbolTable::new_enclosed(first));
        second.borrow_mut().define("e");

        let a = SymbolTable::resolve(&second, "a").expect("a");
        assert_eq!(a.scope, SymbolScope::Global);
        let e = SymbolTable::resolve(&second, "e").expect("e");
        assert_eq!(e.scope, SymbolScope::Local);
    }

    #[test]
    fn resolving_an_outer_local_defines_a_free_symbol() {
        let global = shared(SymbolTable::new());
        global.borrow_mut().define("a");

        let first = shared(SymbolTable::new_enclosed(global));
        first.borrow_mut().define("c");

        let second = shared(SymbolTable::new_enclosed(Rc::clone(&first)));
        second.borrow_mut().define("e");

        let c = SymbolTable::resolve(&second, "c").expect("c");
        assert_eq!(c.scope, SymbolScope::Free);
        assert_eq!(c.index, 0);

        // The original binding is recorded for the Closure emission.
        let free = second.borrow().free_symbols.clone();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].name, "c");
        assert_eq!(free[0].scope, SymbolScope::Local);

        // Resolving again returns the same converted symbol.
        let again = SymbolTable::resolve(&second, "c").expect("c again");
        assert_eq!(again, c);
        assert_eq!(second.borrow().free_symbols.len(), 1);
    }

    #[test]
    fn free_conversion_is_transitive() {
        let global = shared(SymbolTable::new());
        global.borrow_mut().define("a");

        let outer_fn = shared(SymbolTable::new_enclosed(global));
        outer_fn.borrow_mut().define("b");

        let middle_fn = shared(SymbolTable::new_enclosed(Rc::clone(&outer_fn)));
        let inner_fn = shared(SymbolTable::new_enclosed(Rc::clone(&middle_fn)));

        // `b` is local to outer_fn, resolved from two functions deeper.
        let b = SymbolTable::resolve(&inner_fn, "b").expect("b");
        assert_eq!(b.scope, SymbolScope::Free);

        // The middle function captured it on the way through.
        let middle_b = middle_fn.borrow().store.get("b").cloned().expect("middle b");
        assert_eq!(middle_b.scope, SymbolScope::Free);
        // inner_fn's free list records the middle's Free symbol, not the
        // original Local.
        assert_eq!(inner_fn.borrow().free_symbols[0].scope, SymbolScope::Free);
    }

    #[test]
    fn builtins_resolve_everywhere_without_capture() {
        let global = shared(SymbolTable::new());
        global.borrow_mut().define_builtin(0, "len");

        let nested = shared(SymbolTable::new_enclosed(Rc::clone(&global)));
        let len = SymbolTable::resolve(&nested, "len").expect("len");
        assert_eq!(len.scope, SymbolScope::Builtin);
        assert_eq!(len.index, 0);
        assert!(nested.borrow().free_symbols.is_empty());
    }

    #[test]
    fn function_name_resolves_inside_own_scope() {
        let global = shared(SymbolTable::new());
        let fn_table = shared(SymbolTable::new_enclosed(global));
        fn_table.borrow_mut().define_function_name("fact");

        let fact = SymbolTable::resolve(&fn_table, "fact").expect("fact");
        assert_eq!(fact.scope, SymbolScope::Function);
        assert_eq!(fact.index, 0);
    }

    #[test]
    fn local_shadows_function_name() {
        let global = shared(SymbolTable::new());
        let fn_table = shared(SymbolTable::new_enclosed(global));
        fn_table.borrow_mut().define_function_name("f");
        fn_table.borrow_mut().define("f");

        let f = SymbolTable::resolve(&fn_table, "f").expect("f");
        assert_eq!(f.scope, SymbolScope::Local);
    }
}
