//! Machine IR
//!
//! A virtual-register MIPS form structurally parallel to the middle-end IR:
//! an `MModule` owns functions, functions own blocks, blocks own
//! instructions, all in index arenas. Operands are `Reg` values tagged as
//! physical, virtual, immediate, or label; a per-function frame tracks slot
//! allocation, and the frame *size* appears in the instruction stream as a
//! pseudo-immediate resolved to a real immediate once register allocation
//! has stopped growing the frame (callers allocate their callees' frames,
//! so the caller-side `$sp` adjustments need the callee's final size).
//!
//! There are no use lists here; machine passes scan operand positions
//! directly. Operand 0 is the def unless the opcode defines nothing.

pub mod emit;
pub mod lower;
pub mod opt;

use smallvec::SmallVec;

/// The MIPS physical register file, in hardware numbering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PhysReg {
    Zero = 0,
    At = 1,
    V0 = 2,
    V1 = 3,
    A0 = 4,
    A1 = 5,
    A2 = 6,
    A3 = 7,
    T0 = 8,
    T1 = 9,
    T2 = 10,
    T3 = 11,
    T4 = 12,
    T5 = 13,
    T6 = 14,
    T7 = 15,
    S0 = 16,
    S1 = 17,
    S2 = 18,
    S3 = 19,
    S4 = 20,
    S5 = 21,
    S6 = 22,
    S7 = 23,
    T8 = 24,
    T9 = 25,
    K0 = 26,
    K1 = 27,
    Gp = 28,
    Sp = 29,
    Fp = 30,
    Ra = 31,
}

impl PhysReg {
    pub fn name(self) -> &'static str {
        use PhysReg::*;
        match self {
            Zero => "$zero",
            At => "$at",
            V0 => "$v0",
            V1 => "$v1",
            A0 => "$a0",
            A1 => "$a1",
            A2 => "$a2",
            A3 => "$a3",
            T0 => "$t0",
            T1 => "$t1",
            T2 => "$t2",
            T3 => "$t3",
            T4 => "$t4",
            T5 => "$t5",
            T6 => "$t6",
            T7 => "$t7",
            S0 => "$s0",
            S1 => "$s1",
            S2 => "$s2",
            S3 => "$s3",
            S4 => "$s4",
            S5 => "$s5",
            S6 => "$s6",
            S7 => "$s7",
            T8 => "$t8",
            T9 => "$t9",
            K0 => "$k0",
            K1 => "$k1",
            Gp => "$gp",
            Sp => "$sp",
            Fp => "$fp",
            Ra => "$ra",
        }
    }
}

/// A machine operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg {
    Phys(PhysReg),
    /// Virtual register; ids inherit the IR value id they were lowered
    /// from, so later passes can reason about provenance.
    Virt(u32),
    Imm(i32),
    /// Frame-size pseudo-immediate of a function: the push (negative) or
    /// pop (positive) `$sp` delta. Resolved after register allocation.
    FrameSize { func: u32, pop: bool },
    Label(String),
}

impl Reg {
    pub fn is_virtual(&self) -> bool {
        matches!(self, Reg::Virt(_))
    }

    pub fn is_imm(&self) -> bool {
        matches!(self, Reg::Imm(_))
    }

    pub fn imm(&self) -> i32 {
        match self {
            Reg::Imm(v) => *v,
            _ => 0,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Reg::Label(s) => s,
            _ => "",
        }
    }
}

pub const ZERO: Reg = Reg::Phys(PhysReg::Zero);
pub const AT: Reg = Reg::Phys(PhysReg::At);
pub const V0: Reg = Reg::Phys(PhysReg::V0);
pub const A0: Reg = Reg::Phys(PhysReg::A0);
pub const SP: Reg = Reg::Phys(PhysReg::Sp);
pub const FP: Reg = Reg::Phys(PhysReg::Fp);
pub const RA: Reg = Reg::Phys(PhysReg::Ra);

/// Machine opcodes, including the two pseudo-instructions (`phi` and the
/// parallel copy) that exist only between lowering and phi elimination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MOp {
    Add,
    Addu,
    Addiu,
    Sub,
    Subu,
    Mul,
    Mult,
    /// Three-operand division pseudo, strength-reduced or expanded later.
    Div,
    /// The raw two-operand `div` writing `hi`/`lo`.
    RawDiv,
    Rem,
    Sll,
    Srl,
    Sra,
    Mfhi,
    Mflo,
    Seq,
    Sne,
    Sgt,
    Sge,
    Slt,
    Slti,
    Sle,
    Xori,
    Jal,
    Jr,
    J,
    La,
    Li,
    Lw,
    Sw,
    Beq,
    Bne,
    Bgez,
    Bgtz,
    Blez,
    Bltz,
    Syscall,
    Phi,
    PCopy,
}

impl MOp {
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            MOp::Jr | MOp::J | MOp::Beq | MOp::Bne | MOp::Bgez | MOp::Bgtz | MOp::Blez | MOp::Bltz
        )
    }

    /// Operand 0 is not a definition.
    pub fn no_def(self) -> bool {
        matches!(
            self,
            MOp::Mult
                | MOp::RawDiv
                | MOp::Jal
                | MOp::Jr
                | MOp::J
                | MOp::Sw
                | MOp::Beq
                | MOp::Bne
                | MOp::Bgez
                | MOp::Bgtz
                | MOp::Blez
                | MOp::Bltz
                | MOp::Syscall
        )
    }

    pub fn mnemonic(self) -> &'static str {
        use MOp::*;
        match self {
            Add => "add",
            Addu => "addu",
            Addiu => "addiu",
            Sub => "sub",
            Subu => "subu",
            Mul => "mul",
            Mult => "mult",
            Div | RawDiv => "div",
            Rem => "rem",
            Sll => "sll",
            Srl => "srl",
            Sra => "sra",
            Mfhi => "mfhi",
            Mflo => "mflo",
            Seq => "seq",
            Sne => "sne",
            Sgt => "sgt",
            Sge => "sge",
            Slt => "slt",
            Slti => "slti",
            Sle => "sle",
            Xori => "xori",
            Jal => "jal",
            Jr => "jr",
            J => "j",
            La => "la",
            Li => "li",
            Lw => "lw",
            Sw => "sw",
            Beq => "beq",
            Bne => "bne",
            Bgez => "bgez",
            Bgtz => "bgtz",
            Blez => "blez",
            Bltz => "bltz",
            Syscall => "syscall",
            Phi => "phi",
            PCopy => "pcopy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MInstId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MBlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MFuncId(pub u32);

#[derive(Debug, Clone)]
pub struct MInstData {
    pub op: MOp,
    pub operands: SmallVec<[Reg; 3]>,
    pub block: MBlockId,
    pub removed: bool,
}

impl MInstData {
    pub fn is_terminator(&self) -> bool {
        self.op.is_terminator()
    }

    pub fn no_def(&self) -> bool {
        self.op.no_def()
    }
}

/// A frame address: base register plus byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MAddr {
    pub base: Reg,
    pub offset: i32,
}

#[derive(Debug, Clone)]
pub struct MBlockData {
    pub func: MFuncId,
    pub insts: Vec<MInstId>,
    pub label: Reg,
    pub loop_depth: u32,
    pub removed: bool,
}

#[derive(Debug, Clone)]
pub struct MFuncData {
    pub name: String,
    pub blocks: Vec<MBlockId>,
    /// Bytes of frame allocated so far; grows during lowering and again
    /// when the allocator spills.
    pub stack_size: i32,
    /// Slot holding `$ra` across calls, for functions that need it.
    pub ret_addr: Option<MAddr>,
}

/// One `.data` entry.
#[derive(Debug, Clone)]
pub enum MGlobalData {
    Word {
        label: String,
        size: i32,
        zero: bool,
        values: Vec<i32>,
    },
    Ascii {
        label: String,
        text: String,
    },
}

/// A lowered compilation unit.
#[derive(Debug, Default)]
pub struct MModule {
    pub inst_arena: Vec<MInstData>,
    pub block_arena: Vec<MBlockData>,
    pub func_arena: Vec<MFuncData>,
    /// Ordered functions; `main` last, as in the IR.
    pub funcs: Vec<MFuncId>,
    pub datas: Vec<MGlobalData>,
    pub changed: bool,
    next_vreg: u32,
}

impl MModule {
    pub fn new(first_vreg: u32) -> Self {
        Self {
            next_vreg: first_vreg,
            ..Default::default()
        }
    }

    pub fn main_func(&self) -> MFuncId {
        *self.funcs.last().expect("module has no functions")
    }

    pub fn inst(&self, id: MInstId) -> &MInstData {
        &self.inst_arena[id.0 as usize]
    }

    pub fn inst_mut(&mut self, id: MInstId) -> &mut MInstData {
        &mut self.inst_arena[id.0 as usize]
    }

    pub fn block(&self, id: MBlockId) -> &MBlockData {
        &self.block_arena[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: MBlockId) -> &mut MBlockData {
        &mut self.block_arena[id.0 as usize]
    }

    pub fn func(&self, id: MFuncId) -> &MFuncData {
        &self.func_arena[id.0 as usize]
    }

    pub fn func_mut(&mut self, id: MFuncId) -> &mut MFuncData {
        &mut self.func_arena[id.0 as usize]
    }

    pub fn operand(&self, inst: MInstId, index: usize) -> &Reg {
        &self.inst(inst).operands[index]
    }

    pub fn set_operand(&mut self, inst: MInstId, index: usize, reg: Reg) {
        self.inst_mut(inst).operands[index] = reg;
    }

    /// A fresh virtual register.
    pub fn new_vreg(&mut self) -> Reg {
        let id = self.next_vreg;
        self.next_vreg += 1;
        Reg::Virt(id)
    }

    pub fn new_func(&mut self, name: &str) -> MFuncId {
        let id = MFuncId(self.func_arena.len() as u32);
        self.func_arena.push(MFuncData {
            name: name.to_string(),
            blocks: Vec::new(),
            stack_size: 0,
            ret_addr: None,
        });
        self.funcs.push(id);
        id
    }

    pub fn new_block(&mut self, func: MFuncId, label: Reg) -> MBlockId {
        let id = MBlockId(self.block_arena.len() as u32);
        self.block_arena.push(MBlockData {
            func,
            insts: Vec::new(),
            label,
            loop_depth: 0,
            removed: false,
        });
        self.func_mut(func).blocks.push(id);
        id
    }

    pub fn remove_block(&mut self, func: MFuncId, block: MBlockId) {
        self.func_mut(func).blocks.retain(|&b| b != block);
        self.block_mut(block).removed = true;
    }

    /// Allocate a frame slot; the address is `$fp`-relative until the
    /// frame-pointer elimination pass rewrites it.
    pub fn alloc_slot(&mut self, func: MFuncId, size: i32) -> MAddr {
        let offset = self.func(func).stack_size;
        self.func_mut(func).stack_size += size;
        MAddr {
            base: FP,
            offset,
        }
    }

    /// The `$sp` delta callers apply around a call into `func`.
    pub fn frame_delta(&self, func: MFuncId, pop: bool) -> i32 {
        if pop {
            self.func(func).stack_size
        } else {
            -self.func(func).stack_size
        }
    }

    pub fn new_inst(&mut self, op: MOp, operands: &[Reg]) -> MInstId {
        let id = MInstId(self.inst_arena.len() as u32);
        self.inst_arena.push(MInstData {
            op,
            operands: SmallVec::from(operands),
            block: MBlockId(u32::MAX),
            removed: false,
        });
        id
    }

    pub fn append_inst(&mut self, block: MBlockId, inst: MInstId) {
        self.inst_mut(inst).block = block;
        self.block_mut(block).insts.push(inst);
    }

    fn inst_pos(&self, block: MBlockId, inst: MInstId) -> usize {
        self.block(block)
            .insts
            .iter()
            .position(|&i| i == inst)
            .expect("instruction not in block")
    }

    pub fn insert_before(&mut self, target: MInstId, inst: MInstId) {
        let block = self.inst(target).block;
        let pos = self.inst_pos(block, target);
        self.inst_mut(inst).block = block;
        self.block_mut(block).insts.insert(pos, inst);
    }

    pub fn insert_after(&mut self, target: MInstId, inst: MInstId) {
        let block = self.inst(target).block;
        let pos = self.inst_pos(block, target);
        self.inst_mut(inst).block = block;
        self.block_mut(block).insts.insert(pos + 1, inst);
    }

    pub fn remove_inst(&mut self, inst: MInstId) {
        if self.inst(inst).removed {
            return;
        }
        let block = self.inst(inst).block;
        if block.0 != u32::MAX {
            self.block_mut(block).insts.retain(|&i| i != inst);
        }
        self.inst_mut(inst).removed = true;
    }

    pub fn replace_inst(&mut self, old: MInstId, new: MInstId) {
        self.insert_after(old, new);
        self.remove_inst(old);
    }

    /// Replace every `FrameSize` pseudo-immediate with the now-final frame
    /// delta. Runs once register allocation has stopped allocating slots.
    pub fn finalize_frames(&mut self) {
        for i in 0..self.inst_arena.len() {
            if self.inst_arena[i].removed {
                continue;
            }
            for j in 0..self.inst_arena[i].operands.len() {
                if let Reg::FrameSize { func, pop } = self.inst_arena[i].operands[j] {
                    let delta = self.frame_delta(MFuncId(func), pop);
                    self.inst_arena[i].operands[j] = Reg::Imm(delta);
                }
            }
        }
    }
}
