//! The two-tier symbol table.
//!
//! Four independent maps: global variables, local (current-routine)
//! variables, global type aliases, local type aliases. A name must be
//! unique within its own map and must not collide with the alias map of
//! the same scope. Clearing the local maps between routines is the whole
//! scoping mechanism; there is no deeper nesting.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use inkwell::values::PointerValue;

use crate::ast::types::TypeDesc;
use crate::errors::errors::{CodegenError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Local => "local",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declared name: its canonical type, backend storage and constness.
#[derive(Debug)]
pub struct Symbol<'ctx> {
    pub name: String,
    pub ty: Rc<TypeDesc>,
    pub ptr: PointerValue<'ctx>,
    pub is_const: bool,
}

pub struct SymbolTable<'ctx> {
    globals: HashMap<String, Rc<Symbol<'ctx>>>,
    locals: HashMap<String, Rc<Symbol<'ctx>>>,
    global_aliases: HashMap<String, Rc<TypeDesc>>,
    local_aliases: HashMap<String, Rc<TypeDesc>>,
}

impl<'ctx> SymbolTable<'ctx> {
    pub fn new() -> Self {
        SymbolTable {
            globals: HashMap::new(),
            locals: HashMap::new(),
            global_aliases: HashMap::new(),
            local_aliases: HashMap::new(),
        }
    }

    fn symbols(&self, scope: Scope) -> &HashMap<String, Rc<Symbol<'ctx>>> {
        match scope {
            Scope::Global => &self.globals,
            Scope::Local => &self.locals,
        }
    }

    fn aliases(&self, scope: Scope) -> &HashMap<String, Rc<TypeDesc>> {
        match scope {
            Scope::Global => &self.global_aliases,
            Scope::Local => &self.local_aliases,
        }
    }

    /// Fails if `name` already exists in the scope's symbol map or
    /// collides with an alias of the same scope. Storage is allocated by
    /// the caller only after this check passes.
    pub fn assert_vacant(&self, scope: Scope, name: &str) -> Result<(), CodegenError> {
        if self.symbols(scope).contains_key(name) {
            return Err(ErrorKind::DuplicateName {
                name: name.to_string(),
                scope: scope.as_str(),
            }
            .into());
        }
        if self.aliases(scope).contains_key(name) {
            return Err(ErrorKind::NameAliasCollision {
                name: name.to_string(),
                scope: scope.as_str(),
            }
            .into());
        }
        Ok(())
    }

    pub fn insert(&mut self, scope: Scope, symbol: Symbol<'ctx>) -> Result<Rc<Symbol<'ctx>>, CodegenError> {
        self.assert_vacant(scope, &symbol.name)?;
        let symbol = Rc::new(symbol);
        let map = match scope {
            Scope::Global => &mut self.globals,
            Scope::Local => &mut self.locals,
        };
        map.insert(symbol.name.clone(), Rc::clone(&symbol));
        Ok(symbol)
    }

    pub fn get(&self, scope: Scope, name: &str) -> Option<Rc<Symbol<'ctx>>> {
        self.symbols(scope).get(name).cloned()
    }

    /// Local scope first, then global. Absence is not an error here; the
    /// caller decides whether a miss is fatal.
    pub fn lookup(&self, name: &str) -> Option<Rc<Symbol<'ctx>>> {
        self.get(Scope::Local, name)
            .or_else(|| self.get(Scope::Global, name))
    }

    pub fn insert_alias(
        &mut self,
        scope: Scope,
        name: &str,
        ty: Rc<TypeDesc>,
    ) -> Result<(), CodegenError> {
        if self.aliases(scope).contains_key(name) {
            return Err(ErrorKind::DuplicateAlias {
                name: name.to_string(),
                scope: scope.as_str(),
            }
            .into());
        }
        if self.symbols(scope).contains_key(name) {
            return Err(ErrorKind::AliasNameCollision {
                name: name.to_string(),
                scope: scope.as_str(),
            }
            .into());
        }
        let map = match scope {
            Scope::Global => &mut self.global_aliases,
            Scope::Local => &mut self.local_aliases,
        };
        map.insert(name.to_string(), ty);
        Ok(())
    }

    pub fn get_alias(&self, scope: Scope, name: &str) -> Option<Rc<TypeDesc>> {
        self.aliases(scope).get(name).cloned()
    }

    pub fn lookup_alias(&self, name: &str) -> Option<Rc<TypeDesc>> {
        self.get_alias(Scope::Local, name)
            .or_else(|| self.get_alias(Scope::Global, name))
    }

    /// Clears both local maps. Invoked exactly once per routine, after
    /// its function is fully lowered and verified.
    pub fn reset_locals(&mut self) {
        self.locals.clear();
        self.local_aliases.clear();
    }
}

impl<'ctx> Default for SymbolTable<'ctx> {
    fn default() -> Self {
        SymbolTable::new()
    }
}
