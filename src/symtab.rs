use std::collections::HashMap;

/// Index of a symbol. Stable for the lifetime of the table.
pub type SymbolId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// A user identifier.
    Variable,
    /// A literal or a folded value.
    Constant(i32),
    /// An intermediate result slot, `@t<seq>`.
    Temporary(usize),
    /// A string literal's storage label, `@L<seq>`.
    Label(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Initial value of the storage word.
    pub value: String,
    pub needs_storage: bool,
}

/// Append-only registry of every name, literal and generated slot.
///
/// Names are unique: entering a name that is already present returns the
/// existing index and leaves that entry untouched.
#[derive(Debug, Default)]
pub struct SymTab {
    symbols: Vec<Symbol>,
    index: HashMap<String, SymbolId>,
}

impl SymTab {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, name: &str, kind: SymbolKind, value: &str) -> SymbolId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.symbols.len();
        self.symbols.push(Symbol {
            name: name.into(),
            kind,
            value: value.into(),
            needs_storage: false,
        });
        self.index.insert(name.into(), id);
        id
    }

    pub fn variable(&mut self, name: &str) -> SymbolId {
        self.enter(name, SymbolKind::Variable, "0")
    }

    pub fn constant(&mut self, value: i32) -> SymbolId {
        let name = if value >= 0 {
            format!("@{value}")
        } else {
            format!("@_{}", value.unsigned_abs())
        };
        self.enter(&name, SymbolKind::Constant(value), &value.to_string())
    }

    pub fn temporary(&mut self, seq: usize) -> SymbolId {
        self.enter(&format!("@t{seq}"), SymbolKind::Temporary(seq), "0")
    }

    /// The storage label for a string literal; `literal` keeps its quotes.
    pub fn string(&mut self, seq: usize, literal: &str) -> SymbolId {
        self.enter(&format!("@L{seq}"), SymbolKind::Label(seq), literal)
    }

    /// An already-entered string label holding exactly `literal`.
    pub fn find_string(&self, literal: &str) -> Option<SymbolId> {
        self.symbols
            .iter()
            .position(|sym| matches!(sym.kind, SymbolKind::Label(_)) && sym.value == literal)
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn name(&self, id: SymbolId) -> &str {
        &self.symbols[id].name
    }

    pub fn constant_value(&self, id: SymbolId) -> Option<i32> {
        match self.symbols[id].kind {
            SymbolKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_temp(&self, id: SymbolId) -> bool {
        matches!(self.symbols[id].kind, SymbolKind::Temporary(_))
    }

    pub fn temp_seq(&self, id: SymbolId) -> Option<usize> {
        match self.symbols[id].kind {
            SymbolKind::Temporary(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn mark_storage(&mut self, id: SymbolId) {
        self.symbols[id].needs_storage = true;
    }

    /// Symbols that need a data word, in first-entry order.
    pub fn storage(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|sym| sym.needs_storage)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_deduplicates_by_name() {
        let mut st = SymTab::new();
        let x = st.variable("x");
        let five = st.constant(5);
        assert_eq!(st.variable("x"), x);
        assert_eq!(st.constant(5), five);
        assert_eq!(st.len(), 2);
        assert_eq!(st.enter("x", SymbolKind::Constant(1), "1"), x);
        assert_eq!(st.get(x).kind, SymbolKind::Variable);
    }

    #[test]
    fn constant_names_carry_sign() {
        let mut st = SymTab::new();
        let neg = st.constant(-7);
        let zero = st.constant(0);
        assert_eq!(st.name(neg), "@_7");
        assert_eq!(st.get(neg).value, "-7");
        assert_eq!(st.name(zero), "@0");
        assert_eq!(st.constant_value(neg), Some(-7));
        let min = st.constant(i32::MIN);
        assert_eq!(st.name(min), "@_2147483648");
    }

    #[test]
    fn classification_uses_kind_not_name() {
        let mut st = SymTab::new();
        let t = st.temporary(3);
        let v = st.variable("t3");
        assert!(st.is_temp(t));
        assert!(!st.is_temp(v));
        assert_eq!(st.temp_seq(t), Some(3));
        assert_eq!(st.constant_value(v), None);
    }

    #[test]
    fn strings_found_by_content() {
        let mut st = SymTab::new();
        assert_eq!(st.find_string("\"hi\""), None);
        let l = st.string(0, "\"hi\"");
        st.variable("hi");
        assert_eq!(l, 0);
        assert_eq!(st.find_string("\"hi\""), Some(l));
        assert_eq!(st.find_string("\"ho\""), None);
    }

    #[test]
    fn storage_in_entry_order() {
        let mut st = SymTab::new();
        let a = st.variable("a");
        st.constant(9);
        let b = st.variable("b");
        st.mark_storage(b);
        st.mark_storage(a);
        let names: Vec<_> = st.storage().map(|sym| sym.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
