//! Intermediate representation.
//!
//! A translation unit is a list of functions; a function body is a flat,
//! dense, zero-indexed `Vec` of three-address instructions. Jump targets
//! are instruction indices into the same function, the only label form the
//! IR has. Value operands (immediates, variable symbols, struct members,
//! string literals) and binary expressions appear inside instructions, so
//! malformed shapes like a store into an immediate are unrepresentable.

pub mod dump;
pub mod gen;
pub mod serialize;
pub mod ty;

use crate::ast::{BinOp, DataType};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Index of a variable slot within a function (alloca numbering).
pub type VarId = u64;

/// A scalar type plus indirection, attached to IR values by the IR type
/// pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrType {
    pub ty: DataType,
    pub ptr_depth: u16,
}

impl IrType {
    pub fn new(ty: DataType, ptr_depth: u16) -> Self {
        IrType { ty, ptr_depth }
    }

    pub fn scalar(ty: DataType) -> Self {
        IrType { ty, ptr_depth: 0 }
    }
}

/// An immediate value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Imm {
    Bool(bool),
    Char(char),
    Float(f32),
    Int(i32),
}

impl Imm {
    pub fn data_type(self) -> DataType {
        match self {
            Imm::Bool(_) => DataType::Bool,
            Imm::Char(_) => DataType::Char,
            Imm::Float(_) => DataType::Float,
            Imm::Int(_) => DataType::Int,
        }
    }
}

/// A reference to a variable slot, optionally through one level of
/// dereference or address-of, with an SSA index once renaming has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sym {
    pub idx: VarId,
    pub ssa_idx: Option<u32>,
    pub deref: bool,
    pub addr_of: bool,
    pub ty: Option<IrType>,
}

impl Sym {
    pub fn plain(idx: VarId) -> Self {
        Sym {
            idx,
            ssa_idx: None,
            deref: false,
            addr_of: false,
            ty: None,
        }
    }

    pub fn deref(idx: VarId) -> Self {
        Sym {
            deref: true,
            ..Sym::plain(idx)
        }
    }

    pub fn addr_of(idx: VarId) -> Self {
        Sym {
            addr_of: true,
            ..Sym::plain(idx)
        }
    }

    /// A plain scalar reference: the only kind that participates in SSA.
    pub fn is_scalar(&self) -> bool {
        !self.deref && !self.addr_of
    }
}

/// A struct member slot: variable `idx`, field number `field_idx` in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub idx: VarId,
    pub field_idx: u64,
    pub ty: Option<IrType>,
}

/// A string literal operand; `len` is the byte length without terminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrLit {
    pub len: u64,
    pub data: String,
}

impl StrLit {
    pub fn new(data: impl Into<String>) -> Self {
        let data = data.into();
        StrLit {
            len: data.len() as u64,
            data,
        }
    }
}

/// A value operand of an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Imm(Imm),
    Sym(Sym),
    Member(Member),
    Str(StrLit),
}

/// A binary expression over two value operands. Assignment and compound
/// assignment never reach the IR; unaries are expressed through binaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub op: BinOp,
    pub lhs: Value,
    pub rhs: Value,
}

/// The right-hand side of a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rvalue {
    Value(Value),
    Bin(Bin),
}

/// One φ operand per predecessor block of the φ's block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhiOp {
    pub pred_block: u32,
    pub ssa_idx: Option<u32>,
}

/// A φ pseudo-instruction: selects among the predecessors' SSA versions of
/// variable `var`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phi {
    pub var: VarId,
    pub ssa_idx: Option<u32>,
    pub ops: Vec<PhiOp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstrKind {
    /// Reserve a scalar (or pointer, or struct) variable slot.
    Alloca {
        ty: DataType,
        type_name: Option<String>,
        ptr_depth: u16,
        idx: VarId,
    },
    /// Reserve an array slot; arrays stay in memory form.
    AllocaArray {
        ty: DataType,
        dims: Vec<i32>,
        idx: VarId,
    },
    /// `dest <- value`. The destination is always a symbol, possibly a
    /// dereferencing one for writes through pointers or into arrays.
    Store { dest: Sym, value: Rvalue },
    /// Unconditional jump to an instruction index in this function.
    Jump { target: usize },
    /// Conditional jump; the condition is always a binary expression of the
    /// shape produced by the generator (`x != 0` for plain truth tests).
    Cond { cond: Bin, target: usize },
    Ret { value: Option<Value> },
    /// A call with evaluated arguments; `dest` holds the result slot for
    /// non-void callees.
    FnCall {
        name: String,
        args: Vec<Value>,
        dest: Option<Sym>,
    },
    Phi(Phi),
}

bitflags! {
    /// Analysis metadata bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InstrFlags: u32 {
        /// The instruction sits inside some loop body.
        const IN_LOOP = 1 << 0;
        /// The store destination is provably not aliased.
        const NO_ALIAS = 1 << 1;
    }
}

// Flags travel through the binary IR stream as their raw bits.
impl Serialize for InstrFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for InstrFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(InstrFlags::from_bits_truncate(u32::deserialize(
            deserializer,
        )?))
    }
}

/// Register sentinel: `None` means no physical register claimed yet.
pub type ClaimedReg = Option<u16>;

/// One IR instruction with its graph metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instr {
    /// Dense, zero-based ordinal within the containing function; the only
    /// jump target representation.
    pub idx: usize,
    pub kind: InstrKind,
    /// Basic block number, assigned by the CFG builder.
    pub block: u32,
    pub flags: InstrFlags,
    /// Loop nesting depth, assigned alongside `IN_LOOP`.
    pub loop_depth: u32,
    /// Register allocator annotation for downstream code generators.
    pub claimed_reg: ClaimedReg,
}

impl Instr {
    pub fn new(idx: usize, kind: InstrKind) -> Self {
        Instr {
            idx,
            kind,
            block: 0,
            flags: InstrFlags::empty(),
            loop_depth: 0,
            claimed_reg: None,
        }
    }
}

/// A struct type declaration carried at unit level; code generators use it
/// to compute sizes and member offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    pub fields: Vec<TypeDeclField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDeclField {
    pub ty: DataType,
    pub ptr_depth: u16,
    pub dims: Vec<i32>,
}

/// A function: parameter allocas plus the linear body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub ret: IrType,
    pub params: Vec<Instr>,
    pub body: Vec<Instr>,
}

/// A whole translation unit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Unit {
    pub types: Vec<TypeDecl>,
    pub functions: Vec<Function>,
}

/// Check the per-function IR invariants: indices are a dense zero-based
/// enumeration and every jump target names an existing instruction. A
/// violation is a compiler bug, not a user error, so this panics.
pub fn validate(f: &Function) {
    for (pos, instr) in f.body.iter().enumerate() {
        assert_eq!(
            instr.idx, pos,
            "function `{}`: instruction at position {pos} carries idx {}",
            f.name, instr.idx
        );
        match &instr.kind {
            InstrKind::Jump { target } | InstrKind::Cond { target, .. } => {
                assert!(
                    *target < f.body.len(),
                    "function `{}`: unresolved jump target {target} at {pos}",
                    f.name
                );
            }
            _ => {}
        }
    }
}

/// Renumber `body` so that `idx` matches position again, remapping every
/// jump target through the old-index-to-new-index table. Used after any
/// pass that inserts or moves instructions.
pub fn renumber(body: &mut [Instr], old_to_new: &[usize]) {
    for (pos, instr) in body.iter_mut().enumerate() {
        instr.idx = pos;
        match &mut instr.kind {
            InstrKind::Jump { target } | InstrKind::Cond { target, .. } => {
                *target = old_to_new[*target];
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_dense_resolved_body() {
        let f = Function {
            name: "f".into(),
            ret: IrType::scalar(DataType::Void),
            params: vec![],
            body: vec![
                Instr::new(0, InstrKind::Jump { target: 1 }),
                Instr::new(1, InstrKind::Ret { value: None }),
            ],
        };
        validate(&f);
    }

    #[test]
    #[should_panic(expected = "unresolved jump target")]
    fn validate_panics_on_dangling_target() {
        let f = Function {
            name: "f".into(),
            ret: IrType::scalar(DataType::Void),
            params: vec![],
            body: vec![Instr::new(0, InstrKind::Jump { target: 9 })],
        };
        validate(&f);
    }

    #[test]
    #[should_panic(expected = "carries idx")]
    fn validate_panics_on_sparse_indices() {
        let f = Function {
            name: "f".into(),
            ret: IrType::scalar(DataType::Void),
            params: vec![],
            body: vec![Instr::new(3, InstrKind::Ret { value: None })],
        };
        validate(&f);
    }
}
