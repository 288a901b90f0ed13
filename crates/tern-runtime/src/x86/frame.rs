//! Stack frame layout and the virtual value stack
//!
//! Frame layout relative to `%ebp`:
//! - arguments at `8 + 4*i` (pushed by the caller, first argument lowest)
//! - locals at `-4*(k+1)` for the k-th non-parameter slot
//! - temporaries below the locals

use super::instr::{Operand, Register};

const WORD: i32 = 4;

/// Per-function allocation state
#[derive(Debug, Clone, Default)]
pub(super) struct Frame {
    argc: usize,
    locals: usize,
    /// Scratch registers in claim order
    pool: Vec<Register>,
    in_use: Vec<bool>,
    /// Virtual operand stack, bottom first
    values: Vec<Operand>,
    /// Temporaries currently live in frame slots
    temps: usize,
    max_temps: usize,
}

impl Frame {
    pub(super) fn new(argc: usize, slot_count: usize, pool: &[Register]) -> Self {
        Self {
            argc,
            locals: slot_count.saturating_sub(argc),
            pool: pool.to_vec(),
            in_use: vec![false; pool.len()],
            values: Vec::new(),
            temps: 0,
            max_temps: 0,
        }
    }

    /// Fixed home of a bytecode slot
    pub(super) fn variable(&self, id: u32) -> Operand {
        let id = id as usize;
        if id < self.argc {
            Operand::StackPosition(2 * WORD + WORD * id as i32)
        } else {
            Operand::StackPosition(-WORD * ((id - self.argc) as i32 + 1))
        }
    }

    /// Claim a free scratch register, or a new temporary slot when none is
    /// free, and push it as the new top value
    pub(super) fn allocate(&mut self) -> Operand {
        let operand = match self.in_use.iter().position(|used| !used) {
            Some(i) => {
                self.in_use[i] = true;
                Operand::Register(self.pool[i])
            }
            None => {
                let offset = -WORD * (self.locals + self.temps + 1) as i32;
                self.temps += 1;
                self.max_temps = self.max_temps.max(self.temps);
                Operand::StackPosition(offset)
            }
        };
        self.values.push(operand.clone());
        operand
    }

    pub(super) fn pop(&mut self) -> Option<Operand> {
        let operand = self.values.pop()?;
        self.release(&operand);
        Some(operand)
    }

    /// Pop `n` values, returned in the order they were pushed
    pub(super) fn pop_n(&mut self, n: usize) -> Option<Vec<Operand>> {
        if self.values.len() < n {
            return None;
        }
        let popped = self.values.split_off(self.values.len() - n);
        for operand in popped.iter().rev() {
            self.release(operand);
        }
        Some(popped)
    }

    pub(super) fn peek(&self) -> Option<&Operand> {
        self.values.last()
    }

    /// Bytes reserved below `%ebp` for locals and temporaries
    pub(super) fn size(&self) -> i32 {
        WORD * (self.locals + self.max_temps) as i32
    }

    pub(super) fn depth(&self) -> usize {
        self.values.len()
    }

    // Values are popped in stack order, so a released slot is always the
    // highest live temporary.
    fn release(&mut self, operand: &Operand) {
        match operand {
            Operand::Register(reg) => {
                if let Some(i) = self.pool.iter().position(|r| r == reg) {
                    self.in_use[i] = false;
                }
            }
            Operand::StackPosition(_) => self.temps = self.temps.saturating_sub(1),
            _ => {}
        }
    }
}
