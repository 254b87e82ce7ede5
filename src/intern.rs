//! Identifier compression.
//!
//! Every rule name and literal that appears in grammar text is interned to a
//! [`Symbol`]. The compressed form of a symbol is a short run of ASCII letters
//! (a base-52 spelling of the number), which is what compiled rule text holds.

use bimap::BiHashMap;

pub type Symbol = u32;

const ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, Default)]
pub struct Identifiers {
    /// Map of all known names to their symbols, and vice versa
    table: BiHashMap<String, Symbol>,
    /// Number of symbols that have ever been created
    akashic_symbol_count: Symbol,
}

impl Identifiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make or get the symbol for `name`.
    pub fn intern<S: AsRef<str>>(&mut self, name: S) -> Symbol {
        let name = name.as_ref();
        if let Some(already) = self.table.get_by_left(name) {
            *already
        } else {
            let id = self.akashic_symbol_count;
            self.table.insert(name.to_owned(), id);

            self.akashic_symbol_count += 1;
            id
        }
    }

    /// The symbol of an already interned name.
    pub fn find(&self, name: &str) -> Option<Symbol> {
        self.table.get_by_left(name).copied()
    }

    pub fn name(&self, symbol: Symbol) -> Option<&str> {
        self.table.get_by_right(&symbol).map(String::as_str)
    }

    /// The compressed token for `name`, interning it if needed.
    pub fn compressed(&mut self, name: &str) -> String {
        encode(self.intern(name))
    }

    /// The name behind a compressed token.
    pub fn uncompressed(&self, token: &str) -> Option<&str> {
        decode(token).and_then(|symbol| self.name(symbol))
    }

    /// Drop `name` from the table. Its symbol is never handed out again.
    pub fn forget(&mut self, name: &str) -> Option<Symbol> {
        self.table.remove_by_left(name).map(|(_, symbol)| symbol)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Spell a symbol as letters.
pub fn encode(mut symbol: Symbol) -> String {
    let mut out = Vec::new();
    loop {
        out.push(ALPHABET[(symbol % 52) as usize]);
        symbol /= 52;
        if symbol == 0 {
            break;
        }
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

/// Read back what [`encode`] wrote. Anything it could not have written is `None`.
pub fn decode(token: &str) -> Option<Symbol> {
    if token.is_empty() || (token.len() > 1 && token.starts_with('a')) {
        return None;
    }
    token.bytes().try_fold(0 as Symbol, |acc, b| {
        let digit = ALPHABET.iter().position(|&a| a == b)? as Symbol;
        acc.checked_mul(52)?.checked_add(digit)
    })
}

#[test]
fn compressed_tokens_are_stable() {
    let mut ids = Identifiers::new();
    let digit = ids.compressed("digit");
    assert_eq!(digit, "a");
    assert_eq!(ids.compressed("digit"), digit);
    assert_eq!(ids.uncompressed(&digit), Some("digit"));

    for n in 0..60 {
        ids.intern(format!("rule{}", n));
    }
    // the 54th symbol needs two letters
    assert_eq!(ids.compressed("rule52"), "bb");
    assert_eq!(ids.uncompressed("bb"), Some("rule52"));
    assert_eq!(decode("ab"), None);
    assert_eq!(decode("a1"), None);
}

#[test]
fn forgotten_names_get_new_symbols() {
    let mut ids = Identifiers::new();
    let old = ids.intern("x");
    assert_eq!(ids.forget("x"), Some(old));
    assert_eq!(ids.find("x"), None);
    assert_eq!(ids.uncompressed(&encode(old)), None);
    assert_ne!(ids.intern("x"), old);
}
