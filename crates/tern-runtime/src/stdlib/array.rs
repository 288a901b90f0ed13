//! Array primitives

use crate::error::{RuntimeError, RuntimeResult};
use crate::symbol::Symbol;

/// `arrlen(a)`
pub fn arrlen(array: &Symbol) -> RuntimeResult<Symbol> {
    let len = array.as_list("arrlen")?.borrow().len();
    Ok(Symbol::Int(len as i32))
}

/// `arrmake(n, v)`: `n` copies of `v`. List values are shared, not copied.
pub fn arrmake(n: &Symbol, value: &Symbol) -> RuntimeResult<Symbol> {
    let n = n.as_int("arrmake length")?;
    if n < 0 {
        return Err(RuntimeError::type_mismatch(format!(
            "arrmake length must be non-negative, got {}",
            n
        )));
    }
    Ok(Symbol::list(vec![value.clone(); n as usize]))
}
