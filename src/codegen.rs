use crate::symtab::{SymTab, SymbolId};
use std::io::{self, Write};

/// Largest value `ldc` can encode, exclusive.
pub const IMMEDIATE_LIMIT: i32 = 4095;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mult,
    Div,
}

impl Op {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mult => "mult",
            Self::Div => "div",
        }
    }

    fn commutative(self) -> bool {
        matches!(self, Self::Add | Self::Mult)
    }

    /// Compile-time result of `lhs op rhs` in 32-bit word arithmetic.
    /// `None` for a zero divisor.
    pub fn fold(self, lhs: i32, rhs: i32) -> Option<i32> {
        match self {
            Self::Add => Some(lhs.wrapping_add(rhs)),
            Self::Sub => Some(lhs.wrapping_sub(rhs)),
            Self::Mult => Some(lhs.wrapping_mul(rhs)),
            Self::Div if rhs == 0 => None,
            Self::Div => Some(lhs.wrapping_div(rhs)),
        }
    }
}

/// Emitter for the one-accumulator target.
///
/// `acc` lists the symbols whose current value the accumulator is known to
/// hold; empty means unknown. A store adds its target, any load or
/// computation replaces the list. Every load the tracking proves redundant
/// is skipped, so callers must reset it wherever control flow joins.
pub struct CodeGen<W: Write> {
    out: W,
    pub symtab: SymTab,
    acc: Vec<SymbolId>,
    temp_index: usize,
    label_index: usize,
}

impl<W: Write> CodeGen<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            symtab: SymTab::new(),
            acc: Vec::new(),
            temp_index: 0,
            label_index: 0,
        }
    }

    pub fn acc(&self) -> Vec<SymbolId> {
        self.acc.clone()
    }

    pub fn set_acc(&mut self, acc: Vec<SymbolId>) {
        self.acc = acc;
    }

    pub fn forget_acc(&mut self) {
        self.acc.clear();
    }

    fn holds(&self, id: SymbolId) -> bool {
        self.acc.contains(&id)
    }

    /// Copy comment lines (source echo, token trace) into the listing.
    pub fn comments(&mut self, lines: Vec<String>) -> io::Result<()> {
        for line in lines {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    pub fn emit_label(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "{label:<4}:")
    }

    pub fn emit(&mut self, op: &str) -> io::Result<()> {
        writeln!(self.out, "          {op:<4}")
    }

    pub fn emit_operand(&mut self, op: &str, operand: &str) -> io::Result<()> {
        writeln!(self.out, "          {op:<4}      {operand}")
    }

    /// An instruction addressing `id` in memory, which therefore needs a word.
    fn emit_symbol(&mut self, op: &str, id: SymbolId) -> io::Result<()> {
        self.symtab.mark_storage(id);
        writeln!(self.out, "          {op:<4}      {}", self.symtab.name(id))
    }

    pub fn emit_load(&mut self, id: SymbolId) -> io::Result<()> {
        match self.symtab.constant_value(id) {
            Some(value) if (0..IMMEDIATE_LIMIT).contains(&value) => {
                self.emit_operand("ldc", &value.to_string())?;
                self.forget_acc();
            }
            _ if !self.holds(id) => {
                self.emit_symbol("ld", id)?;
                self.acc = vec![id];
            }
            _ => (),
        }
        Ok(())
    }

    fn spill(&mut self) -> io::Result<()> {
        match self.acc.iter().copied().find(|&id| self.symtab.is_temp(id)) {
            Some(temp) => self.emit_symbol("st", temp),
            None => Ok(()),
        }
    }

    /// Emit `left op right` and return the temporary holding the result.
    pub fn binary(&mut self, op: Op, left: SymbolId, right: SymbolId) -> io::Result<SymbolId> {
        if self.holds(left) {
            self.emit_symbol(op.mnemonic(), right)?;
        } else if op.commutative() && self.holds(right) {
            self.emit_symbol(op.mnemonic(), left)?;
        } else {
            self.spill()?;
            self.emit_load(left)?;
            self.emit_symbol(op.mnemonic(), right)?;
        }
        let temp = self.new_temp();
        self.acc = vec![temp];
        Ok(temp)
    }

    pub fn assign(&mut self, target: SymbolId, value: SymbolId) -> io::Result<()> {
        self.emit_load(value)?;
        self.emit_symbol("st", target)?;
        if !self.holds(target) {
            self.acc.push(target);
        }
        Ok(())
    }

    pub fn print_value(&mut self, value: SymbolId) -> io::Result<()> {
        self.emit_load(value)?;
        self.emit("dout")
    }

    pub fn print_string(&mut self, label: SymbolId) -> io::Result<()> {
        self.emit_symbol("ldc", label)?;
        self.emit("sout")?;
        self.forget_acc();
        Ok(())
    }

    pub fn newline(&mut self) -> io::Result<()> {
        self.emit_operand("ldc", "'\\n'")?;
        self.emit("aout")?;
        self.forget_acc();
        Ok(())
    }

    pub fn read_int(&mut self, target: SymbolId) -> io::Result<()> {
        self.emit("din")?;
        self.emit_symbol("st", target)?;
        self.forget_acc();
        Ok(())
    }

    pub fn new_temp(&mut self) -> SymbolId {
        let id = self.symtab.temporary(self.temp_index);
        self.temp_index += 1;
        id
    }

    pub fn temp_mark(&self) -> usize {
        self.temp_index
    }

    /// Free the temporaries allocated since `mark`, except `keep` when it is
    /// one of them: its value is still in use by the caller.
    pub fn release_temps(&mut self, mark: usize, keep: Option<SymbolId>) {
        let live = keep
            .and_then(|id| self.symtab.temp_seq(id))
            .map_or(0, |seq| seq + 1);
        self.temp_index = mark.max(live);
        let symtab = &self.symtab;
        let next = self.temp_index;
        self.acc
            .retain(|&id| symtab.temp_seq(id).map_or(true, |seq| seq < next));
    }

    pub fn new_label(&mut self) -> String {
        let label = format!("@L{}", self.label_index);
        self.label_index += 1;
        label
    }

    /// A string literal's storage label, shared by every identical literal.
    pub fn string_label(&mut self, literal: &str) -> SymbolId {
        match self.symtab.find_string(literal) {
            Some(id) => id,
            None => {
                let seq = self.label_index;
                self.label_index += 1;
                self.symtab.string(seq, literal)
            }
        }
    }

    pub fn jump(&mut self, label: &str) -> io::Result<()> {
        self.emit_operand("ja", label)
    }

    /// Load `cond` and branch to `target` when it is zero.
    pub fn branch_if_zero(&mut self, cond: SymbolId, target: &str) -> io::Result<()> {
        self.emit_load(cond)?;
        self.emit_operand("jz", target)
    }

    /// Head of a post-test loop. The back edge arrives with the condition in
    /// the accumulator, so nothing is known at the label.
    pub fn do_head(&mut self) -> io::Result<String> {
        let start = self.new_label();
        self.emit_label(&start)?;
        self.forget_acc();
        Ok(start)
    }

    pub fn do_tail(&mut self, cond: SymbolId, start: &str) -> io::Result<()> {
        let end = self.new_label();
        self.branch_if_zero(cond, &end)?;
        self.jump(start)?;
        self.emit_label(&end)
    }

    /// Head of a pre-test loop. Both edges into `start` hold `cond`, and
    /// nothing else is known about the back edge.
    pub fn while_head(&mut self, cond: SymbolId, start: &str, end: &str) -> io::Result<()> {
        self.emit_load(cond)?;
        self.emit_label(start)?;
        self.acc = vec![cond];
        self.emit_operand("jz", end)
    }

    pub fn while_tail(&mut self, cond: SymbolId, start: &str, end: &str) -> io::Result<()> {
        self.emit_load(cond)?;
        self.jump(start)?;
        self.emit_label(end)?;
        self.acc = vec![cond];
        Ok(())
    }

    /// Halt, then one data word per symbol that needs storage.
    pub fn end_code(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.emit("halt")?;
        for sym in self.symtab.storage() {
            writeln!(self.out, "{:<9} dw        {}", format!("{}:", sym.name), sym.value)?;
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(out: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(out)
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect()
    }

    #[test]
    fn fold_division() {
        assert_eq!(Op::Div.fold(7, 2), Some(3));
        assert_eq!(Op::Div.fold(-7, 2), Some(-3));
        assert_eq!(Op::Div.fold(1, 0), None);
        assert_eq!(Op::Sub.fold(2, 5), Some(-3));
    }

    #[test]
    fn small_constants_load_immediately() {
        let mut out = Vec::new();
        let mut gen = CodeGen::new(&mut out);
        let five = gen.symtab.constant(5);
        let big = gen.symtab.constant(5000);
        let neg = gen.symtab.constant(-1);
        gen.emit_load(five).unwrap();
        assert!(gen.acc().is_empty());
        gen.emit_load(big).unwrap();
        gen.emit_load(big).unwrap();
        gen.emit_load(neg).unwrap();
        assert!(!gen.symtab.get(five).needs_storage);
        assert!(gen.symtab.get(big).needs_storage);
        drop(gen);
        assert_eq!(lines(&out), vec!["ldc 5", "ld @5000", "ld @_1"]);
    }

    #[test]
    fn binary_reuses_accumulator() {
        let mut out = Vec::new();
        let mut gen = CodeGen::new(&mut out);
        let a = gen.symtab.variable("a");
        let b = gen.symtab.variable("b");
        let t0 = gen.binary(Op::Add, a, b).unwrap();
        let t1 = gen.binary(Op::Mult, b, t0).unwrap();
        assert_ne!(t0, t1);
        assert_eq!(gen.acc(), vec![t1]);
        drop(gen);
        assert_eq!(lines(&out), vec!["ld a", "add b", "mult b"]);
    }

    #[test]
    fn non_commutative_spills_temporary() {
        let mut out = Vec::new();
        let mut gen = CodeGen::new(&mut out);
        let a = gen.symtab.variable("a");
        let b = gen.symtab.variable("b");
        let t0 = gen.binary(Op::Add, a, b).unwrap();
        gen.binary(Op::Sub, a, t0).unwrap();
        drop(gen);
        assert_eq!(
            lines(&out),
            vec!["ld a", "add b", "st @t0", "ld a", "sub @t0"]
        );
    }

    #[test]
    fn released_temporary_is_not_spilled() {
        let mut out = Vec::new();
        let mut gen = CodeGen::new(&mut out);
        let a = gen.symtab.variable("a");
        let b = gen.symtab.variable("b");
        let x = gen.symtab.variable("x");
        let mark = gen.temp_mark();
        let t0 = gen.binary(Op::Add, a, b).unwrap();
        gen.assign(x, t0).unwrap();
        gen.release_temps(mark, None);
        assert_eq!(gen.acc(), vec![x]);
        assert_eq!(gen.new_temp(), t0);
        gen.binary(Op::Sub, a, b).unwrap();
        assert!(!gen.symtab.get(t0).needs_storage);
        drop(gen);
        assert_eq!(lines(&out), vec!["ld a", "add b", "st x", "ld a", "sub b"]);
    }

    #[test]
    fn store_keeps_value_resident() {
        let mut out = Vec::new();
        let mut gen = CodeGen::new(&mut out);
        let a = gen.symtab.variable("a");
        let b = gen.symtab.variable("b");
        let c = gen.symtab.variable("c");
        gen.assign(a, b).unwrap();
        gen.assign(c, b).unwrap();
        gen.assign(b, a).unwrap();
        assert_eq!(gen.acc(), vec![b, a, c]);
        drop(gen);
        assert_eq!(lines(&out), vec!["ld b", "st a", "st c", "st b"]);
    }

    #[test]
    fn release_keeps_live_result() {
        let mut gen = CodeGen::new(io::sink());
        let mark = gen.temp_mark();
        let t0 = gen.new_temp();
        gen.new_temp();
        gen.release_temps(mark, Some(t0));
        assert_eq!(gen.temp_mark(), 1);
        gen.release_temps(mark, None);
        assert_eq!(gen.temp_mark(), 0);
    }

    #[test]
    fn data_section_formatting() {
        let mut out = Vec::new();
        let mut gen = CodeGen::new(&mut out);
        let x = gen.symtab.variable("x");
        let msg = gen.string_label("\"hi\"");
        assert_eq!(gen.string_label("\"hi\""), msg);
        gen.read_int(x).unwrap();
        gen.print_string(msg).unwrap();
        gen.end_code().unwrap();
        drop(gen);
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("\n          halt\nx:        dw        0\n@L0:      dw        \"hi\"\n"));
    }
}
