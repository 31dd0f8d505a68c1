// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use lazy_static::lazy_static;
use std::sync::Mutex;
use string_interner::StringInterner;
use string_interner::backend::StringBackend;
use string_interner::symbol::SymbolU32;

/// Names of variables, incarnations, blocks and functions.
///
/// Passification mints a name for every incarnation, and the inference engine
/// keys states and render contexts by name, so names are hashed and compared
/// far more often than printed. Each distinct name is stored once in a
/// process-wide table and handed out as a `Copy` index that lives for the
/// rest of the execution.
///
/// Ordering follows interning order, not lexical order. Code that needs a
/// stable textual order must keep declaration order itself.
#[derive(Clone, Hash, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InternedString(SymbolU32);

lazy_static! {
    static ref INTERNER: Mutex<StringInterner<StringBackend>> =
        Mutex::new(StringInterner::default());
}

impl InternedString {
    pub fn is_empty(&self) -> bool {
        self.map(|s| s.is_empty())
    }

    pub fn len(&self) -> usize {
        self.map(|s| s.len())
    }

    /// Run `f` on the backing text while the table is locked.
    pub fn map<T, F: FnOnce(&str) -> T>(&self, f: F) -> T {
        f(INTERNER.lock().unwrap().resolve(self.0).unwrap())
    }

    pub fn ends_with(&self, pattern: &str) -> bool {
        self.map(|s| s.ends_with(pattern))
    }

    pub fn to_owned_string(&self) -> String {
        self.map(|s| s.to_string())
    }

    /// `x@N`, the name of the `sequence`-th incarnation of `x`.
    pub fn incarnation(self, sequence: usize) -> InternedString {
        format!("{self}@{sequence}").into()
    }

    /// `old(x)`, the name under which states and models keep the entry value
    /// of `x`.
    pub fn old_name(self) -> InternedString {
        format!("old({self})").into()
    }
}

impl std::fmt::Display for InternedString {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        self.map(|s| fmt.write_str(s))
    }
}

/// Print the text rather than the table index.
impl std::fmt::Debug for InternedString {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        self.map(|s| write!(fmt, "{s:?}"))
    }
}

impl<T> From<T> for InternedString
where
    T: AsRef<str>,
{
    fn from(s: T) -> InternedString {
        InternedString(INTERNER.lock().unwrap().get_or_intern(s))
    }
}

impl<T> PartialEq<T> for InternedString
where
    T: AsRef<str>,
{
    fn eq(&self, other: &T) -> bool {
        self.map(|s| s == other.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::InternedString;

    #[test]
    fn incarnations_share_the_entry_of_their_text() {
        let x: InternedString = "x".into();
        let first = x.incarnation(0);
        assert_eq!(first, "x@0");
        assert_eq!(first, InternedString::from("x@0"));
        assert_ne!(first, x.incarnation(1));
        assert_eq!(first.len(), 3);
        assert!(!first.is_empty());
    }

    #[test]
    fn old_names_wrap_the_variable() {
        let g: InternedString = "g".into();
        assert_eq!(g.old_name(), "old(g)");
        assert_eq!(g.old_name().to_owned_string(), "old(g)");
        assert!(InternedString::from("entry_correct").ends_with("_correct"));
    }

    #[test]
    fn order_follows_interning() {
        let early: InternedString = "zz_interned_first".into();
        let late: InternedString = "aa_interned_second".into();
        assert!(early < late);
        assert_eq!(format!("{late}"), "aa_interned_second");
        assert_eq!(format!("{late:?}"), "\"aa_interned_second\"");
    }
}
