use rustc_hash::FxHashMap;
use strum_macros::{Display as StrumDisplay, IntoStaticStr};

use crate::index_type;
use crate::indexvec::IndexVec;

index_type!(SymbolId u32, "sym");

/// Resolved semantic type of a symbol
#[derive(Debug, Clone, PartialEq, Eq, StrumDisplay, IntoStaticStr)]
pub enum ValueType {
    #[strum(serialize = "INTEGER")]
    Integer,
    #[strum(serialize = "LONG")]
    Long,
    #[strum(serialize = "SINGLE")]
    Single,
    #[strum(serialize = "DOUBLE")]
    Double,
    #[strum(serialize = "STRING")]
    String,
    /// A user defined `TYPE`
    #[strum(serialize = "UDT")]
    Udt(String),
}

/// What a freshly allocated slot holds before the first assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum InitValue {
    #[strum(serialize = "zero")]
    Zero,
    /// A null string or array descriptor
    #[strum(serialize = "null")]
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Array { dimensions: u8 },
    /// A routine parameter; storage is provided by the caller
    Parameter,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolScope {
    /// Declared in the main program
    Global,
    /// `DIM SHARED`, visible in every routine
    Shared,
    /// Local to the named SUB or FUNCTION
    Local(String),
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: ValueType,
    pub kind: SymbolKind,
    pub scope: SymbolScope,
}

impl Symbol {
    /// Whether the routine owning this symbol has to allocate storage for it at entry
    pub fn needs_storage(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable | SymbolKind::Array { .. })
    }

    pub fn init_value(&self) -> InitValue {
        match (&self.kind, &self.ty) {
            (SymbolKind::Array { .. }, _) | (_, ValueType::String) => InitValue::Null,
            _ => InitValue::Zero,
        }
    }
}

#[derive(Debug)]
pub struct DuplicateSymbol;

/// The symbol table produced by semantic analysis
///
/// Symbols keep their declaration order; iteration never depends on hashing.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: IndexVec<Symbol, SymbolId>,
    lookup: FxHashMap<(Option<String>, String), SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(symbol: &Symbol) -> (Option<String>, String) {
        let owner = match &symbol.scope {
            SymbolScope::Local(routine) => Some(routine.clone()),
            SymbolScope::Global | SymbolScope::Shared => None,
        };
        (owner, symbol.name.clone())
    }

    pub fn declare(&mut self, symbol: Symbol) -> Result<SymbolId, DuplicateSymbol> {
        let key = Self::key(&symbol);
        if self.lookup.contains_key(&key) {
            return Err(DuplicateSymbol);
        }
        let id = self.symbols.try_push(symbol).map_err(|_| DuplicateSymbol)?;
        self.lookup.insert(key, id);
        Ok(id)
    }

    /// Shorthand for declaring a scalar variable
    pub fn variable(&mut self, name: &str, ty: ValueType, scope: SymbolScope) -> Result<SymbolId, DuplicateSymbol> {
        self.declare(Symbol {
            name: name.into(),
            ty,
            kind: SymbolKind::Variable,
            scope,
        })
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    /// Resolves `name` as seen from inside `routine` (`None` for the main program)
    pub fn resolve(&self, routine: Option<&str>, name: &str) -> Option<&Symbol> {
        routine
            .and_then(|r| self.lookup.get(&(Some(r.to_owned()), name.to_owned())))
            .or_else(|| self.lookup.get(&(None, name.to_owned())))
            .map(|&id| &self.symbols[id])
            .filter(|sym| routine.is_none() || sym.scope != SymbolScope::Global)
    }

    /// Symbols whose storage the given unit allocates at entry, in declaration order.
    /// The main program owns globals and shared symbols, a routine owns its locals.
    pub fn storage_of(&self, routine: Option<&str>) -> Vec<&Symbol> {
        self.symbols
            .as_slice()
            .iter()
            .filter(|sym| {
                sym.needs_storage()
                    && match (&sym.scope, routine) {
                        (SymbolScope::Global | SymbolScope::Shared, None) => true,
                        (SymbolScope::Local(owner), Some(r)) => owner == r,
                        _ => false,
                    }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
