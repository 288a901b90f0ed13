//! String primitives
//!
//! Strings are plain lists of `Char`. Every function here checks the kinds
//! of its arguments and fails with a type error instead of coercing.

use crate::error::{RuntimeError, RuntimeResult};
use crate::symbol::{checked_index, ListRef, Symbol};
use std::cmp::Ordering;

/// Collect the bytes of a character list
fn chars(list: &ListRef, context: &str) -> RuntimeResult<Vec<u8>> {
    list.borrow()
        .iter()
        .map(|item| item.as_char(context))
        .collect()
}

fn from_bytes(bytes: impl IntoIterator<Item = u8>) -> Symbol {
    Symbol::list(bytes.into_iter().map(Symbol::Char).collect())
}

/// `strlen(s)`
pub fn strlen(s: &Symbol) -> RuntimeResult<Symbol> {
    let len = s.as_list("strlen")?.borrow().len();
    Ok(Symbol::Int(len as i32))
}

/// `strget(s, i)`: character at `i`
pub fn strget(s: &Symbol, index: &Symbol) -> RuntimeResult<Symbol> {
    let list = s.as_list("strget")?;
    let i = index.as_int("strget index")?;
    let items = list.borrow();
    let slot = checked_index(i, items.len())?;
    items[slot].as_char("strget").map(Symbol::Char)
}

/// `strset(s, i, c)`: overwrite in place, visible through every alias
pub fn strset(s: &Symbol, index: &Symbol, c: &Symbol) -> RuntimeResult<Symbol> {
    let list = s.as_list("strset")?;
    let i = index.as_int("strset index")?;
    let c = c.as_char("strset")?;
    let mut items = list.borrow_mut();
    let slot = checked_index(i, items.len())?;
    items[slot] = Symbol::Char(c);
    Ok(Symbol::Null)
}

/// `strsub(s, from, len)`: fresh copy of `len` characters starting at `from`
pub fn strsub(s: &Symbol, from: &Symbol, len: &Symbol) -> RuntimeResult<Symbol> {
    let bytes = chars(&s.as_list("strsub")?, "strsub")?;
    let from = from.as_int("strsub start")?;
    let len = len.as_int("strsub length")?;
    if len < 0 {
        return Err(RuntimeError::type_mismatch(format!(
            "strsub length must be non-negative, got {}",
            len
        )));
    }
    if len == 0 {
        // An empty slice may start one past the end.
        if from < 0 || from as usize > bytes.len() {
            return Err(RuntimeError::IndexOutOfBounds {
                index: from,
                len: bytes.len(),
            });
        }
        return Ok(Symbol::list(Vec::new()));
    }
    let start = checked_index(from, bytes.len())?;
    let last = from.saturating_add(len - 1);
    checked_index(last, bytes.len())?;
    Ok(from_bytes(bytes[start..=last as usize].iter().copied()))
}

/// `strdup(s)`: fresh copy, no longer aliased with `s`
pub fn strdup(s: &Symbol) -> RuntimeResult<Symbol> {
    let bytes = chars(&s.as_list("strdup")?, "strdup")?;
    Ok(from_bytes(bytes))
}

/// `strcat(a, b)`: fresh string holding `a` followed by `b`
pub fn strcat(a: &Symbol, b: &Symbol) -> RuntimeResult<Symbol> {
    let mut bytes = chars(&a.as_list("strcat")?, "strcat")?;
    bytes.extend(chars(&b.as_list("strcat")?, "strcat")?);
    Ok(from_bytes(bytes))
}

/// `strcmp(a, b)`: -1, 0 or 1 by byte-wise comparison
pub fn strcmp(a: &Symbol, b: &Symbol) -> RuntimeResult<Symbol> {
    let left = chars(&a.as_list("strcmp")?, "strcmp")?;
    let right = chars(&b.as_list("strcmp")?, "strcmp")?;
    let result = match left.cmp(&right) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    };
    Ok(Symbol::Int(result))
}

/// `strmake(n, c)`: string of `n` copies of `c`
pub fn strmake(n: &Symbol, c: &Symbol) -> RuntimeResult<Symbol> {
    let n = n.as_int("strmake length")?;
    let c = c.as_char("strmake")?;
    if n < 0 {
        return Err(RuntimeError::type_mismatch(format!(
            "strmake length must be non-negative, got {}",
            n
        )));
    }
    Ok(from_bytes(std::iter::repeat(c).take(n as usize)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn text(symbol: &Symbol) -> String {
        symbol.as_text().unwrap()
    }

    #[test]
    fn test_strlen_and_strget() {
        let s = Symbol::string("tern");
        assert_eq!(strlen(&s).unwrap(), Symbol::Int(4));
        assert_eq!(strget(&s, &Symbol::Int(2)).unwrap(), Symbol::Char(b'r'));
        assert_eq!(
            strget(&s, &Symbol::Int(4)),
            Err(RuntimeError::IndexOutOfBounds { index: 4, len: 4 })
        );
    }

    #[test]
    fn test_strset_is_visible_through_alias() {
        let s = Symbol::string("cat");
        let alias = s.clone();
        strset(&s, &Symbol::Int(0), &Symbol::Char(b'b')).unwrap();
        assert_eq!(text(&alias), "bat");
    }

    #[test]
    fn test_strset_requires_char() {
        let s = Symbol::string("cat");
        let err = strset(&s, &Symbol::Int(0), &Symbol::Int(98)).unwrap_err();
        assert_eq!(err.code(), "type-mismatch");
    }

    #[rstest]
    #[case(0, 3, "hel")]
    #[case(2, 3, "llo")]
    #[case(4, 1, "o")]
    #[case(5, 0, "")]
    fn test_strsub(#[case] from: i32, #[case] len: i32, #[case] expected: &str) {
        let s = Symbol::string("hello");
        let sub = strsub(&s, &Symbol::Int(from), &Symbol::Int(len)).unwrap();
        assert_eq!(text(&sub), expected);
    }

    #[rstest]
    #[case(3, 3)]
    #[case(-1, 2)]
    #[case(6, 0)]
    fn test_strsub_out_of_range(#[case] from: i32, #[case] len: i32) {
        let s = Symbol::string("hello");
        let err = strsub(&s, &Symbol::Int(from), &Symbol::Int(len)).unwrap_err();
        assert_eq!(err.code(), "index-out-of-bounds");
    }

    #[test]
    fn test_strdup_breaks_aliasing() {
        let s = Symbol::string("ab");
        let copy = strdup(&s).unwrap();
        strset(&copy, &Symbol::Int(0), &Symbol::Char(b'x')).unwrap();
        assert_eq!(text(&s), "ab");
        assert_eq!(text(&copy), "xb");
        assert_ne!(s, copy);
    }

    #[test]
    fn test_strcat() {
        let joined = strcat(&Symbol::string("foo"), &Symbol::string("bar")).unwrap();
        assert_eq!(text(&joined), "foobar");
    }

    #[rstest]
    #[case("abc", "abd", -1)]
    #[case("abc", "abc", 0)]
    #[case("b", "abc", 1)]
    #[case("ab", "abc", -1)]
    fn test_strcmp(#[case] a: &str, #[case] b: &str, #[case] expected: i32) {
        assert_eq!(
            strcmp(&Symbol::string(a), &Symbol::string(b)).unwrap(),
            Symbol::Int(expected)
        );
    }

    #[test]
    fn test_strmake() {
        let s = strmake(&Symbol::Int(3), &Symbol::Char(b'z')).unwrap();
        assert_eq!(text(&s), "zzz");
        assert!(strmake(&Symbol::Int(-1), &Symbol::Char(b'z')).is_err());
    }

    #[test]
    fn test_non_char_list_rejected() {
        let list = Symbol::list(vec![Symbol::Int(1)]);
        assert_eq!(strdup(&list).unwrap_err().code(), "type-mismatch");
    }
}
