//! x86 operand and instruction model (32-bit, AT&T syntax)

use std::fmt;
use tern_config::ScratchRegister;

/// General-purpose 32-bit register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Eax,
    Ebx,
    Ecx,
    Edx,
    Esi,
    Edi,
    Esp,
    Ebp,
}

impl Register {
    pub fn name(self) -> &'static str {
        match self {
            Register::Eax => "eax",
            Register::Ebx => "ebx",
            Register::Ecx => "ecx",
            Register::Edx => "edx",
            Register::Esi => "esi",
            Register::Edi => "edi",
            Register::Esp => "esp",
            Register::Ebp => "ebp",
        }
    }
}

impl From<ScratchRegister> for Register {
    fn from(reg: ScratchRegister) -> Self {
        match reg {
            ScratchRegister::Ebx => Register::Ebx,
            ScratchRegister::Esi => Register::Esi,
            ScratchRegister::Edi => Register::Edi,
        }
    }
}

/// Low byte of `%eax`, the only byte register `set<cc>` writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRegister {
    Al,
}

/// Instruction operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Byte(ByteRegister),
    /// Memory at `offset(%ebp)`
    StackPosition(i32),
    Immediate(i32),
    /// Address of a data label, as an immediate
    Address(String),
}

impl Operand {
    pub const EAX: Operand = Operand::Register(Register::Eax);
    pub const EDX: Operand = Operand::Register(Register::Edx);
    pub const AL: Operand = Operand::Byte(ByteRegister::Al);

    /// Whether the operand lives in memory; x86 allows at most one per
    /// instruction
    pub fn is_memory(&self) -> bool {
        matches!(self, Operand::StackPosition(_))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(reg) => write!(f, "%{}", reg.name()),
            Operand::Byte(ByteRegister::Al) => f.write_str("%al"),
            Operand::StackPosition(offset) => write!(f, "{}(%ebp)", offset),
            Operand::Immediate(value) => write!(f, "${}", value),
            Operand::Address(label) => write!(f, "${}", label),
        }
    }
}

/// Bitwise operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
}

/// Condition code for `set<cc>` and `j<cc>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    G,
    Ge,
    L,
    Le,
    E,
    Ne,
    Nz,
}

impl Condition {
    pub fn suffix(self) -> &'static str {
        match self {
            Condition::G => "g",
            Condition::Ge => "ge",
            Condition::L => "l",
            Condition::Le => "le",
            Condition::E => "e",
            Condition::Ne => "ne",
            Condition::Nz => "nz",
        }
    }
}

/// One x86 instruction. Two-operand forms are `(source, destination)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum X86Instruction {
    PushL(Operand),
    PopL(Operand),
    MovL(Operand, Operand),
    MovzbL(Operand, Operand),
    AddL(Operand, Operand),
    SubL(Operand, Operand),
    ImulL(Operand, Operand),
    IDivL(Operand),
    Cltd,
    Cmp(Operand, Operand),
    Logical(LogicalOp, Operand, Operand),
    Set(Condition, Operand),
    Jmp(String),
    J(Condition, String),
    Label(String),
    Call(String),
    Ret,
}

impl X86Instruction {
    pub fn is_label(&self) -> bool {
        matches!(self, X86Instruction::Label(_))
    }
}

impl fmt::Display for X86Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use X86Instruction::*;

        match self {
            PushL(op) => write!(f, "pushl {}", op),
            PopL(op) => write!(f, "popl {}", op),
            MovL(src, dst) => write!(f, "movl {}, {}", src, dst),
            MovzbL(src, dst) => write!(f, "movzbl {}, {}", src, dst),
            AddL(src, dst) => write!(f, "addl {}, {}", src, dst),
            SubL(src, dst) => write!(f, "subl {}, {}", src, dst),
            ImulL(src, dst) => write!(f, "imull {}, {}", src, dst),
            IDivL(op) => write!(f, "idivl {}", op),
            Cltd => f.write_str("cltd"),
            Cmp(src, dst) => write!(f, "cmpl {}, {}", src, dst),
            Logical(kind, src, dst) => {
                let mnemonic = match kind {
                    LogicalOp::And => "andl",
                    LogicalOp::Or => "orl",
                    LogicalOp::Xor => "xorl",
                };
                write!(f, "{} {}, {}", mnemonic, src, dst)
            }
            Set(cond, op) => write!(f, "set{} {}", cond.suffix(), op),
            Jmp(label) => write!(f, "jmp {}", label),
            J(cond, label) => write!(f, "j{} {}", cond.suffix(), label),
            Label(name) => write!(f, "{}:", name),
            Call(name) => write!(f, "call {}", name),
            Ret => f.write_str("ret"),
        }
    }
}
