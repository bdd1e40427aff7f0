//! A small MIPS machine for the instruction subset the code generator emits.
//!
//! Runs assembly from `main:` until the exit syscall and collects what
//! `print_int` wrote. Memory is word-addressed and reads of untouched words
//! return zero, the way SPIM hands out fresh heap.

use std::collections::HashMap;

use mj_compiler::backend::abi::Register;
use mj_compiler::backend::instruction::{AluOp, AsmItem, MipsInstr};
use mj_compiler::backend::MipsAsm;

const TEXT_BASE: u32 = 0x0040_0000;
const DATA_BASE: u32 = 0x1001_0000;
const HEAP_BASE: u32 = 0x1004_0000;
const STACK_TOP: u32 = 0x7fff_fffc;
const FUEL: usize = 5_000_000;

pub struct Machine {
    text: Vec<MipsInstr>,
    labels: HashMap<String, u32>,
    regs: HashMap<Register, i32>,
    memory: HashMap<u32, i32>,
    lo: i32,
    hi: i32,
    heap: u32,
    pub output: Vec<i32>,
}

impl Machine {
    /// Lay out text and data, resolving `.word` entries against every label.
    pub fn load(asm: &MipsAsm) -> Result<Self, String> {
        let mut text = Vec::new();
        let mut labels = HashMap::new();
        let mut words: Vec<String> = Vec::new();
        let mut in_data = false;

        for item in &asm.items {
            match item {
                AsmItem::Directive(d) if d == ".data" => in_data = true,
                AsmItem::Directive(d) if d == ".text" => in_data = false,
                AsmItem::Directive(d) => {
                    if let Some(list) = d.strip_prefix(".word ") {
                        words.extend(list.split(',').map(|w| w.trim().to_string()));
                    }
                }
                AsmItem::Label(l) => {
                    let addr = if in_data {
                        DATA_BASE + 4 * words.len() as u32
                    } else {
                        TEXT_BASE + 4 * text.len() as u32
                    };
                    if labels.insert(l.clone(), addr).is_some() {
                        return Err(format!("label {} is defined twice", l));
                    }
                }
                AsmItem::Instr { instr, .. } => text.push(instr.clone()),
                AsmItem::Comment(_) | AsmItem::Blank => {}
            }
        }

        let mut memory = HashMap::new();
        for (i, word) in words.iter().enumerate() {
            let value = match word.parse::<i32>() {
                Ok(n) => n,
                Err(_) => {
                    let addr = labels
                        .get(word)
                        .ok_or_else(|| format!(".word names unknown label {}", word))?;
                    *addr as i32
                }
            };
            memory.insert(DATA_BASE + 4 * i as u32, value);
        }

        let mut regs = HashMap::new();
        regs.insert(Register::Sp, STACK_TOP as i32);
        Ok(Self {
            text,
            labels,
            regs,
            memory,
            lo: 0,
            hi: 0,
            heap: HEAP_BASE,
            output: Vec::new(),
        })
    }

    fn reg(&self, r: Register) -> i32 {
        if r == Register::Zero {
            0
        } else {
            self.regs.get(&r).copied().unwrap_or(0)
        }
    }

    fn set(&mut self, r: Register, v: i32) {
        if r != Register::Zero {
            self.regs.insert(r, v);
        }
    }

    fn address(&self, offset: i32, base: Register) -> Result<u32, String> {
        let addr = (self.reg(base) as u32).wrapping_add(offset as u32);
        if addr % 4 != 0 {
            return Err(format!("unaligned access at {:#x}", addr));
        }
        if addr < DATA_BASE {
            return Err(format!("access below the data segment at {:#x}", addr));
        }
        Ok(addr)
    }

    fn target(&self, label: &str) -> Result<usize, String> {
        let addr = *self
            .labels
            .get(label)
            .ok_or_else(|| format!("jump to unknown label {}", label))?;
        Self::index_of(addr)
    }

    fn index_of(addr: u32) -> Result<usize, String> {
        match addr.checked_sub(TEXT_BASE) {
            Some(off) if off % 4 == 0 => Ok((off / 4) as usize),
            _ => Err(format!("jump to {:#x}, outside the text segment", addr)),
        }
    }

    fn return_address(pc: usize) -> i32 {
        (TEXT_BASE + 4 * pc as u32) as i32
    }

    pub fn run(&mut self) -> Result<(), String> {
        let mut pc = self.target("main")?;
        for _ in 0..FUEL {
            let instr = self
                .text
                .get(pc)
                .cloned()
                .ok_or_else(|| format!("ran off the end of the text at {}", pc))?;
            pc += 1;

            match instr {
                MipsInstr::Alu { op, d, a, b } => {
                    let v = alu(op, self.reg(a), self.reg(b));
                    self.set(d, v);
                }
                MipsInstr::AluImm { op, d, a, imm } => {
                    let v = alu(op, self.reg(a), imm);
                    self.set(d, v);
                }
                MipsInstr::Div { a, b } => {
                    let (a, b) = (self.reg(a), self.reg(b));
                    if b == 0 {
                        return Err("division by zero".into());
                    }
                    self.lo = a.wrapping_div(b);
                    self.hi = a.wrapping_rem(b);
                }
                MipsInstr::Mflo { d } => {
                    let v = self.lo;
                    self.set(d, v);
                }
                MipsInstr::Mfhi { d } => {
                    let v = self.hi;
                    self.set(d, v);
                }
                MipsInstr::Move { d, s } => {
                    let v = self.reg(s);
                    self.set(d, v);
                }
                MipsInstr::Li { d, imm } => self.set(d, imm),
                MipsInstr::La { d, label } => {
                    let addr = *self
                        .labels
                        .get(&label)
                        .ok_or_else(|| format!("la of unknown label {}", label))?;
                    self.set(d, addr as i32);
                }
                MipsInstr::Lw { d, offset, base } => {
                    let addr = self.address(offset, base)?;
                    let v = self.memory.get(&addr).copied().unwrap_or(0);
                    self.set(d, v);
                }
                MipsInstr::Sw { s, offset, base } => {
                    let addr = self.address(offset, base)?;
                    let v = self.reg(s);
                    self.memory.insert(addr, v);
                }
                MipsInstr::Beq { a, b, label } => {
                    if self.reg(a) == self.reg(b) {
                        pc = self.target(&label)?;
                    }
                }
                MipsInstr::Bne { a, b, label } => {
                    if self.reg(a) != self.reg(b) {
                        pc = self.target(&label)?;
                    }
                }
                MipsInstr::J { label } => pc = self.target(&label)?,
                MipsInstr::Jal { label } => {
                    self.set(Register::Ra, Self::return_address(pc));
                    pc = self.target(&label)?;
                }
                MipsInstr::Jalr { r } => {
                    let dest = self.reg(r) as u32;
                    self.set(Register::Ra, Self::return_address(pc));
                    pc = Self::index_of(dest)?;
                }
                MipsInstr::Jr { r } => pc = Self::index_of(self.reg(r) as u32)?,
                MipsInstr::Syscall => match self.reg(Register::V0) {
                    1 => {
                        let v = self.reg(Register::A0);
                        self.output.push(v);
                    }
                    9 => {
                        let bytes = self.reg(Register::A0);
                        if bytes < 0 {
                            return Err(format!("sbrk of {} bytes", bytes));
                        }
                        self.set(Register::V0, self.heap as i32);
                        self.heap += (bytes as u32 + 3) & !3;
                    }
                    10 => return Ok(()),
                    11 => {}
                    other => return Err(format!("unsupported syscall {}", other)),
                },
            }
        }
        Err("out of fuel".into())
    }
}

fn alu(op: AluOp, a: i32, b: i32) -> i32 {
    match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Mul => a.wrapping_mul(b),
        AluOp::Slt => i32::from(a < b),
        AluOp::Sle => i32::from(a <= b),
        AluOp::Sgt => i32::from(a > b),
        AluOp::Sge => i32::from(a >= b),
        AluOp::Seq => i32::from(a == b),
        AluOp::Sne => i32::from(a != b),
    }
}

/// Load and run `asm`, returning the printed integers.
pub fn execute(asm: &MipsAsm) -> Result<Vec<i32>, String> {
    let mut machine = Machine::load(asm)?;
    machine.run()?;
    Ok(machine.output)
}
