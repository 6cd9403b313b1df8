use std::collections::HashMap;
use thiserror::Error;

/// Upper bound on executed instructions before a run is abandoned.
pub const STEP_LIMIT: usize = 1_000_000;

#[derive(Error, Debug, PartialEq)]
pub enum RuntimeError {
    #[error("line {}, cannot execute {}", .0, .1)]
    BadInstruction(usize, String),
    #[error("line {}, undefined symbol {}", .0, .1)]
    UndefinedSymbol(usize, String),
    #[error("line {}, divide by zero", .0)]
    DivideByZero(usize),
    #[error("line {}, no input left for din", .0)]
    InputExhausted(usize),
    #[error("no halt after {} steps", .0)]
    StepLimit(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Word {
    Int(i32),
    Str(String),
}

#[derive(Debug)]
struct Instr<'a> {
    line: usize,
    op: &'a str,
    operand: &'a str,
}

#[derive(Default)]
struct Machine<'a> {
    code: Vec<Instr<'a>>,
    labels: HashMap<&'a str, usize>,
    memory: Vec<Word>,
    addresses: HashMap<&'a str, usize>,
}

fn unescape(s: &str) -> String {
    let mut out = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(c) => {
                out.push('\\');
                out.push(c);
            }
            None => out.push('\\'),
        }
    }
    out
}

impl<'a> Machine<'a> {
    fn load(listing: &'a str) -> Result<Self, RuntimeError> {
        let mut m = Machine::default();
        for (i, line) in listing.lines().enumerate() {
            let line_no = i + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('!') {
                continue;
            }
            if line.starts_with(char::is_whitespace) {
                let (op, operand) = trimmed
                    .split_once(char::is_whitespace)
                    .unwrap_or((trimmed, ""));
                m.code.push(Instr {
                    line: line_no,
                    op,
                    operand: operand.trim(),
                });
                continue;
            }
            let (name, rest) = trimmed
                .split_once(':')
                .ok_or_else(|| RuntimeError::BadInstruction(line_no, trimmed.into()))?;
            let (name, rest) = (name.trim(), rest.trim());
            match rest.strip_prefix("dw") {
                _ if rest.is_empty() => {
                    m.labels.insert(name, m.code.len());
                }
                Some(value) => {
                    let value = value.trim();
                    let word = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
                        Some(s) => Word::Str(unescape(s)),
                        None => Word::Int(
                            value
                                .parse()
                                .map_err(|_| RuntimeError::BadInstruction(line_no, value.into()))?,
                        ),
                    };
                    m.addresses.insert(name, m.memory.len());
                    m.memory.push(word);
                }
                None => return Err(RuntimeError::BadInstruction(line_no, trimmed.into())),
            }
        }
        Ok(m)
    }

    fn address(&self, instr: &Instr) -> Result<usize, RuntimeError> {
        self.addresses
            .get(instr.operand)
            .copied()
            .ok_or_else(|| RuntimeError::UndefinedSymbol(instr.line, instr.operand.into()))
    }

    fn word(&self, instr: &Instr) -> Result<i32, RuntimeError> {
        match &self.memory[self.address(instr)?] {
            Word::Int(value) => Ok(*value),
            Word::Str(_) => Err(RuntimeError::BadInstruction(
                instr.line,
                format!("{} {}", instr.op, instr.operand),
            )),
        }
    }

    fn target(&self, instr: &Instr) -> Result<usize, RuntimeError> {
        self.labels
            .get(instr.operand)
            .copied()
            .ok_or_else(|| RuntimeError::UndefinedSymbol(instr.line, instr.operand.into()))
    }

    fn immediate(&self, instr: &Instr) -> Result<i32, RuntimeError> {
        if instr.operand == "'\\n'" {
            return Ok('\n' as i32);
        }
        if let Ok(value) = instr.operand.parse() {
            return Ok(value);
        }
        let mut chars = instr.operand.chars();
        if let (Some('\''), Some(c), Some('\''), None) =
            (chars.next(), chars.next(), chars.next(), chars.next())
        {
            return Ok(c as i32);
        }
        Ok(self.address(instr)? as i32)
    }

    fn exec(&mut self, input: &[i32]) -> Result<String, RuntimeError> {
        let mut output = String::new();
        let mut input = input.iter();
        let mut acc: i32 = 0;
        let mut pc = 0;
        for _ in 0..STEP_LIMIT {
            let Some(instr) = self.code.get(pc) else {
                return Ok(output);
            };
            pc += 1;
            let bad = || RuntimeError::BadInstruction(instr.line, instr.op.into());
            match instr.op {
                "ld" => acc = self.word(instr)?,
                "ldc" => acc = self.immediate(instr)?,
                "st" => {
                    let addr = self.address(instr)?;
                    self.memory[addr] = Word::Int(acc);
                }
                "add" => acc = acc.wrapping_add(self.word(instr)?),
                "sub" => acc = acc.wrapping_sub(self.word(instr)?),
                "mult" => acc = acc.wrapping_mul(self.word(instr)?),
                "div" => match self.word(instr)? {
                    0 => return Err(RuntimeError::DivideByZero(instr.line)),
                    rhs => acc = acc.wrapping_div(rhs),
                },
                "ja" => pc = self.target(instr)?,
                "jz" => {
                    if acc == 0 {
                        pc = self.target(instr)?;
                    }
                }
                "din" => {
                    acc = *input
                        .next()
                        .ok_or(RuntimeError::InputExhausted(instr.line))?;
                }
                "dout" => output.push_str(&acc.to_string()),
                "aout" => output.push(char::from_u32(acc as u32).ok_or_else(bad)?),
                "sout" => match usize::try_from(acc).ok().and_then(|a| self.memory.get(a)) {
                    Some(Word::Str(s)) => output.push_str(s),
                    _ => return Err(bad()),
                },
                "halt" => return Ok(output),
                _ => return Err(bad()),
            }
        }
        Err(RuntimeError::StepLimit(STEP_LIMIT))
    }
}

/// Execute an instruction listing, feeding `din` from `input`, and return
/// everything the program printed.
pub fn run(listing: &str, input: &[i32]) -> Result<String, RuntimeError> {
    Machine::load(listing)?.exec(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_and_output() {
        let listing = "\
!register
; x = 6 * 7;
          ld        x
          mult      @7
          st        x
          dout
          ldc       '\\n'
          aout
          ldc       @L0
          sout

          halt
x:        dw        6
@7:       dw        7
@L0:      dw        \"ok\\tdone\"
";
        assert_eq!(run(listing, &[]), Ok("42\nok\tdone".into()));
    }

    #[test]
    fn branches_and_input() {
        let listing = "          din
@L0 :
          jz        @L1
          dout
          sub       @1
          ja        @L0
@L1 :
          halt
@1:       dw        1
";
        assert_eq!(run(listing, &[3]), Ok("321".into()));
        assert_eq!(run(listing, &[]), Err(RuntimeError::InputExhausted(1)));
    }

    #[test]
    fn runtime_errors() {
        assert_eq!(
            run("          ld        y\n", &[]),
            Err(RuntimeError::UndefinedSymbol(1, "y".into()))
        );
        assert_eq!(
            run("          div       z\nz:        dw        0\n", &[]),
            Err(RuntimeError::DivideByZero(1))
        );
        assert_eq!(
            run("@L0 :\n          ja        @L0\n", &[]),
            Err(RuntimeError::StepLimit(STEP_LIMIT))
        );
    }
}
