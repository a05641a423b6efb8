use crate::ast::{Identifier, SourceLoc};
use std::collections::HashMap;
use std::fmt;

/// The value types an expression or symbol can have. `Unknown` marks a
/// failed lookup or an already-reported error and suppresses cascading
/// diagnostics.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DataType {
    Int,
    IntArray,
    Void,
    Unknown,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::IntArray => write!(f, "int[]"),
            Self::Void => write!(f, "void"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VarInfo {
    pub data_type: DataType,
    pub is_array: bool,
    pub array_size: Option<i64>,
    pub scope_level: u32,
    pub location: SourceLoc,
}

impl VarInfo {
    /// Type of a bare reference to this symbol: arrays decay to `int[]`.
    pub fn value_type(&self) -> DataType {
        if self.is_array {
            DataType::IntArray
        } else {
            self.data_type
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: Identifier,
    pub data_type: DataType,
}

#[derive(Debug, Clone)]
pub struct FunInfo {
    pub return_type: DataType,
    pub params: Vec<ParamInfo>,
    pub is_defined: bool,
    pub location: SourceLoc,
}

#[derive(Debug, Clone)]
pub enum Symbol {
    Variable(VarInfo),
    Parameter(VarInfo),
    Function(FunInfo),
    Builtin(FunInfo),
}

impl Symbol {
    pub fn as_variable(&self) -> Option<&VarInfo> {
        match self {
            Self::Variable(info) | Self::Parameter(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunInfo> {
        match self {
            Self::Function(info) | Self::Builtin(info) => Some(info),
            _ => None,
        }
    }
}

pub type ScopeId = usize;

#[derive(Debug)]
pub struct Scope {
    level: u32,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    symbols: HashMap<Identifier, Symbol>,
}

/// Tree of lexical scopes backed by an arena. The root scope holds the
/// built-ins and every top-level declaration; lookups walk the parent chain.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub const GLOBAL: ScopeId = 0;

    pub fn new() -> Self {
        let root = Scope {
            level: 0,
            parent: None,
            children: Vec::new(),
            symbols: HashMap::new(),
        };
        Self { scopes: vec![root] }
    }

    pub fn enter_scope(&mut self, parent: ScopeId) -> ScopeId {
        let id = self.scopes.len();
        let level = self.scopes[parent].level + 1;
        self.scopes.push(Scope {
            level,
            parent: Some(parent),
            children: Vec::new(),
            symbols: HashMap::new(),
        });
        self.scopes[parent].children.push(id);
        id
    }

    /// Declares `name` in `scope`. Fails only when the name already exists
    /// in that same scope; shadowing an outer scope is allowed.
    pub fn declare(&mut self, scope: ScopeId, name: &str, symbol: Symbol) -> bool {
        let symbols = &mut self.scopes[scope].symbols;
        if symbols.contains_key(name) {
            return false;
        }
        symbols.insert(name.to_owned(), symbol);
        true
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.lookup_with_scope(scope, name).map(|(_, sym)| sym)
    }

    /// Like [lookup](Self::lookup) but also reports which scope resolved the
    /// name.
    pub fn lookup_with_scope(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, &Symbol)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(symbol) = self.scopes[id].symbols.get(name) {
                return Some((id, symbol));
            }
            current = self.scopes[id].parent;
        }
        None
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.scopes[scope].symbols.get(name)
    }

    pub fn level(&self, scope: ScopeId) -> u32 {
        self.scopes[scope].level
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope].parent
    }

    pub fn children(&self, scope: ScopeId) -> &[ScopeId] {
        &self.scopes[scope].children
    }

    pub fn symbols(&self, scope: ScopeId) -> impl Iterator<Item = (&str, &Symbol)> {
        self.scopes[scope]
            .symbols
            .iter()
            .map(|(name, sym)| (name.as_str(), sym))
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
