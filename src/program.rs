//! The program model: instructions, control-flow edges, and reachability.
//!
//! A [`Program`] is an immutable description of a straight-line-with-branches
//! program: interned variables and constants, an operator set, an ordered
//! instruction list, and for every instruction its successor targets and the
//! set of reachable predecessor instructions. Programs are produced either by
//! the textual front-end ([`parser`][crate::parser]) or directly through the
//! [`ProgramBuilder`] when translating an external IR.

use std::collections::{BTreeSet, VecDeque};

use log::debug;

use crate::interner::Interner;
use crate::types::{Const, Op, Value, Var};

/// What an instruction does, in the categories the transfer function
/// understands.
///
/// Anything else an IR front-end encounters is lowered to [`InstKind::Other`],
/// which the analysis treats as a no-op (a safe over-approximation).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InstKind {
    /// `dest = src` for a plain value.
    Copy { dest: Var, src: Value },
    /// A store through a memory cell modelled as a variable. Aliasing is not
    /// tracked, so this behaves like a copy into `dest`.
    Store { dest: Var, src: Value },
    /// `dest = lhs op rhs`.
    Binary { dest: Var, op: Op, lhs: Value, rhs: Value },
    /// An external call (or the textual `*`): the result is fresh and unknown
    /// on every execution.
    Call { dest: Var },
    /// No analysed effect.
    Other,
}

impl InstKind {
    /// The variable this instruction writes, if any.
    pub fn dest(&self) -> Option<Var> {
        match *self {
            InstKind::Copy { dest, .. }
            | InstKind::Store { dest, .. }
            | InstKind::Binary { dest, .. }
            | InstKind::Call { dest } => Some(dest),
            InstKind::Other => None,
        }
    }
}

/// A control-flow successor: another instruction, or the program exit.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum Target {
    Inst(usize),
    Exit,
}

/// One instruction together with the edge information the CFG builder needs.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub kind: InstKind,
    succs: Vec<Target>,
    /// Reachable predecessor instruction indices.
    preds: BTreeSet<usize>,
    /// Whether the program entry jumps directly to this instruction.
    entry_pred: bool,
    reachable: bool,
}

impl Instruction {
    pub fn successors(&self) -> &[Target] {
        &self.succs
    }

    /// Reachable predecessor instructions. Empty for unreachable instructions.
    pub fn predecessors(&self) -> &BTreeSet<usize> {
        &self.preds
    }

    /// True when the program entry is one of this instruction's predecessors.
    pub fn has_entry_predecessor(&self) -> bool {
        self.entry_pred
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// Total predecessor count, counting the entry edge.
    pub fn predecessor_count(&self) -> usize {
        self.preds.len() + usize::from(self.entry_pred)
    }
}

/// An immutable program: the input to the analysis.
#[derive(Debug, Clone)]
pub struct Program {
    variables: Interner<String>,
    constants: Interner<i64>,
    ops: Vec<Op>,
    instructions: Vec<Instruction>,
    entry: Vec<Target>,
}

impl Program {
    /// Number of instructions, reachable or not.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instruction(&self, index: usize) -> &Instruction {
        &self.instructions[index]
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Where control enters the program.
    pub fn entry(&self) -> &[Target] {
        &self.entry
    }

    /// The operator set of this program, in a fixed order. Never empty.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constants(&self) -> usize {
        self.constants.len()
    }

    pub fn variable_name(&self, var: Var) -> &str {
        self.variables.get(var.index())
    }

    pub fn constant_payload(&self, c: Const) -> i64 {
        *self.constants.get(c.index())
    }

    /// All values of the program: constants first, then variables. This is
    /// the atom order of the expression universe.
    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        let consts = (0..self.constants.len()).map(|i| Value::Const(Const::new(i as u32)));
        let vars = (0..self.variables.len()).map(|i| Value::Var(Var::new(i as u32)));
        consts.chain(vars)
    }
}

/// Builder for [`Program`].
///
/// Interns values on first use, records instructions in order, and on
/// [`finish`][ProgramBuilder::finish] resolves default fall-through edges,
/// runs the reachability traversal, and fills in predecessor sets.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    variables: Interner<String>,
    constants: Interner<i64>,
    ops: Option<Vec<Op>>,
    instructions: Vec<InstKind>,
    succs: Vec<Option<Vec<Target>>>,
    entry: Option<Vec<Target>>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a variable name.
    pub fn var(&mut self, name: impl Into<String>) -> Var {
        Var::new(self.variables.intern(name.into()))
    }

    /// Interns a constant payload.
    pub fn constant(&mut self, payload: i64) -> Const {
        Const::new(self.constants.intern(payload))
    }

    /// Fixes the operator set explicitly. Without this call the builder uses
    /// the operators that occur in the instructions, falling back to `+` so
    /// the set is never empty.
    pub fn ops(&mut self, ops: Vec<Op>) -> &mut Self {
        assert!(!ops.is_empty(), "Operator set must not be empty");
        for (i, op) in ops.iter().enumerate() {
            assert!(!ops[..i].contains(op), "Duplicate operator {}", op);
        }
        self.ops = Some(ops);
        self
    }

    fn push(&mut self, kind: InstKind) -> usize {
        self.instructions.push(kind);
        self.succs.push(None);
        self.instructions.len() - 1
    }

    pub fn copy(&mut self, dest: Var, src: impl Into<Value>) -> usize {
        self.push(InstKind::Copy { dest, src: src.into() })
    }

    pub fn store(&mut self, dest: Var, src: impl Into<Value>) -> usize {
        self.push(InstKind::Store { dest, src: src.into() })
    }

    pub fn binary(&mut self, dest: Var, op: Op, lhs: impl Into<Value>, rhs: impl Into<Value>) -> usize {
        self.push(InstKind::Binary {
            dest,
            op,
            lhs: lhs.into(),
            rhs: rhs.into(),
        })
    }

    pub fn call(&mut self, dest: Var) -> usize {
        self.push(InstKind::Call { dest })
    }

    pub fn other(&mut self) -> usize {
        self.push(InstKind::Other)
    }

    /// Overrides the successors of instruction `index`. Without an override
    /// the instruction falls through to the next one (or the exit).
    pub fn set_successors(&mut self, index: usize, targets: Vec<Target>) {
        self.succs[index] = Some(targets);
    }

    /// Overrides the entry targets. Without an override control enters at the
    /// first instruction (or exits immediately for an empty program).
    pub fn set_entry(&mut self, targets: Vec<Target>) {
        self.entry = Some(targets);
    }

    fn collect_ops(&self) -> Vec<Op> {
        let mut ops = Vec::new();
        for kind in &self.instructions {
            if let InstKind::Binary { op, .. } = kind {
                if !ops.contains(op) {
                    ops.push(*op);
                }
            }
        }
        if ops.is_empty() {
            ops.push(Op::Add);
        }
        ops
    }

    /// Seals the program: resolves fall-through edges, computes reachability
    /// by breadth-first traversal from the entry, and records predecessor
    /// sets for reachable instructions.
    pub fn finish(self) -> Program {
        let n = self.instructions.len();
        let ops = self.ops.clone().unwrap_or_else(|| self.collect_ops());

        let fallthrough = |i: usize| {
            if i + 1 < n {
                Target::Inst(i + 1)
            } else {
                Target::Exit
            }
        };

        let mut instructions: Vec<Instruction> = self
            .instructions
            .into_iter()
            .zip(self.succs)
            .enumerate()
            .map(|(i, (kind, succs))| Instruction {
                kind,
                succs: succs.unwrap_or_else(|| vec![fallthrough(i)]),
                preds: BTreeSet::new(),
                entry_pred: false,
                reachable: false,
            })
            .collect();

        let entry = self.entry.unwrap_or_else(|| {
            if n > 0 {
                vec![Target::Inst(0)]
            } else {
                vec![Target::Exit]
            }
        });

        // BFS from the entry; predecessors are recorded only along edges
        // whose source is itself reachable.
        let mut queue = VecDeque::new();
        for &target in &entry {
            if let Target::Inst(i) = target {
                instructions[i].entry_pred = true;
                if !instructions[i].reachable {
                    instructions[i].reachable = true;
                    queue.push_back(i);
                }
            }
        }
        while let Some(cur) = queue.pop_front() {
            let succs = instructions[cur].succs.clone();
            for target in succs {
                if let Target::Inst(next) = target {
                    instructions[next].preds.insert(cur);
                    if !instructions[next].reachable {
                        instructions[next].reachable = true;
                        queue.push_back(next);
                    }
                }
            }
        }

        let reachable = instructions.iter().filter(|i| i.reachable).count();
        debug!(
            "program sealed: {} instructions ({} reachable), {} variables, {} constants, {} ops",
            n,
            reachable,
            self.variables.len(),
            self.constants.len(),
            ops.len()
        );

        Program {
            variables: self.variables,
            constants: self.constants,
            ops,
            instructions,
            entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line_predecessors() {
        let mut b = ProgramBuilder::new();
        let a = b.var("A");
        let c = b.var("C");
        let five = b.constant(5);
        b.copy(a, five);
        b.binary(c, Op::Add, a, a);
        let program = b.finish();

        assert_eq!(program.len(), 2);
        assert!(program.instruction(0).has_entry_predecessor());
        assert!(program.instruction(0).predecessors().is_empty());
        assert_eq!(
            program.instruction(1).predecessors().iter().copied().collect::<Vec<_>>(),
            vec![0]
        );
        assert_eq!(program.instruction(1).successors(), &[Target::Exit]);
    }

    #[test]
    fn test_unreachable_after_jump() {
        // 0: A = 1; GOTO exit
        // 1: A = 2   (unreachable)
        let mut b = ProgramBuilder::new();
        let a = b.var("A");
        let one = b.constant(1);
        let two = b.constant(2);
        let i0 = b.copy(a, one);
        b.copy(a, two);
        b.set_successors(i0, vec![Target::Exit]);
        let program = b.finish();

        assert!(program.instruction(0).is_reachable());
        assert!(!program.instruction(1).is_reachable());
        assert!(program.instruction(1).predecessors().is_empty());
    }

    #[test]
    fn test_loop_back_to_entry_instruction() {
        // 0: A = A + 1; GOTO 0 or exit
        let mut b = ProgramBuilder::new();
        let a = b.var("A");
        let one = b.constant(1);
        let i0 = b.binary(a, Op::Add, a, one);
        b.set_successors(i0, vec![Target::Inst(0), Target::Exit]);
        let program = b.finish();

        let inst = program.instruction(0);
        assert!(inst.has_entry_predecessor());
        assert!(inst.predecessors().contains(&0));
        assert_eq!(inst.predecessor_count(), 2);
    }

    #[test]
    fn test_ops_collected_in_first_seen_order() {
        let mut b = ProgramBuilder::new();
        let x = b.var("X");
        let y = b.var("Y");
        b.binary(x, Op::Mul, x, y);
        b.binary(y, Op::Add, x, x);
        b.binary(x, Op::Mul, y, y);
        let program = b.finish();
        assert_eq!(program.ops(), &[Op::Mul, Op::Add]);
    }

    #[test]
    fn test_ops_default_nonempty() {
        let mut b = ProgramBuilder::new();
        let x = b.var("X");
        let one = b.constant(1);
        b.copy(x, one);
        let program = b.finish();
        assert_eq!(program.ops(), &[Op::Add]);
    }

    #[test]
    fn test_values_order_constants_first() {
        let mut b = ProgramBuilder::new();
        let x = b.var("X");
        let five = b.constant(5);
        b.copy(x, five);
        let program = b.finish();
        let values: Vec<Value> = program.values().collect();
        assert_eq!(values, vec![Value::Const(five), Value::Var(x)]);
    }

    #[test]
    fn test_dest_per_kind() {
        let mut b = ProgramBuilder::new();
        let x = b.var("X");
        b.call(x);
        b.other();
        let program = b.finish();
        assert_eq!(program.instruction(0).kind.dest(), Some(x));
        assert_eq!(program.instruction(1).kind.dest(), None);
    }
}
