//! The Herbrand equivalence analysis: transfer, confluence, and the
//! fixed-point driver.
//!
//! An [`Analysis`] owns everything one run needs: the expression universe,
//! the normalised CFG, the class registry, and one partition per CFG node.
//! [`run`][Analysis::run] iterates the transfer and confluence functions over
//! the nodes until a full pass changes nothing. Termination is guaranteed:
//! the partition lattice over a fixed finite universe is finite, both
//! functions only ever coarsen relative to their inputs, and the parent map
//! only grows.

use log::debug;

use crate::cfg::{Cfg, NodeKind};
use crate::partition::Partition;
use crate::program::{InstKind, Program};
use crate::registry::{ClassId, ClassRegistry};
use crate::types::Value;
use crate::universe::{Expr, Universe};

/// One analysis run over a program.
pub struct Analysis<'p> {
    program: &'p Program,
    universe: Universe,
    cfg: Cfg,
    registry: ClassRegistry,
    partitions: Vec<Partition>,
}

impl<'p> Analysis<'p> {
    /// Prepares a run: builds the universe and CFG, and initialises the
    /// start node with the partition where every atom is alone in a fresh
    /// class. Every other node starts at TOP.
    pub fn new(program: &'p Program) -> Self {
        let universe = Universe::build(program);
        let cfg = Cfg::build(program);
        let mut registry = ClassRegistry::new();

        let mut partitions = vec![Partition::top(); cfg.len()];
        partitions[Cfg::START] = Partition::initial(&universe, &mut registry);

        Self {
            program,
            universe,
            cfg,
            registry,
            partitions,
        }
    }

    /// Runs to the fixed point. Returns the number of full passes, counting
    /// the final pass that observed no change.
    pub fn run(&mut self) -> usize {
        let mut iterations = 0;
        loop {
            iterations += 1;
            let changed = self.step();
            debug!(
                "iteration {}: {} ({} classes, {} parent entries)",
                iterations,
                if changed { "changed" } else { "stable" },
                self.registry.num_classes(),
                self.registry.num_parents(),
            );
            if !changed {
                return iterations;
            }
        }
    }

    /// One full pass over the nodes in index order, skipping the start node.
    /// Returns whether any node's equivalence relation changed.
    pub fn step(&mut self) -> bool {
        let mut changed = false;
        for node in 1..self.cfg.len() {
            let old = self.partitions[node].clone();
            self.recompute(node);
            if !old.same_partition(&self.partitions[node]) {
                changed = true;
            }
        }
        changed
    }

    /// Recomputes one node's partition from its predecessors.
    fn recompute(&mut self, node: usize) {
        match self.cfg.node(node).kind {
            NodeKind::Start => panic!("The start node is never recomputed"),
            NodeKind::Transfer(_) => self.apply_transfer(node),
            NodeKind::Confluence => self.apply_confluence(node),
            NodeKind::End => {
                if self.cfg.node(node).predecessors().len() > 1 {
                    self.apply_confluence(node)
                } else {
                    self.apply_transfer(node)
                }
            }
        }
    }

    /// Transfer function: copy the sole predecessor's partition and apply the
    /// node's instruction. A single-predecessor end node carries no
    /// instruction and is a plain copy.
    fn apply_transfer(&mut self, node: usize) {
        let pred = self.cfg.node(node).predecessors()[0];
        let mut partition = self.partitions[pred].clone();

        if let (Partition::Classes(ids), NodeKind::Transfer(index)) =
            (&mut partition, self.cfg.node(node).kind)
        {
            let kind = self.program.instruction(index).kind;
            let assigned = match kind {
                InstKind::Copy { src, .. } | InstKind::Store { src, .. } => {
                    Some(ids[self.universe.atom_index(src)])
                }
                InstKind::Binary { op, lhs, rhs, .. } => {
                    Some(ids[self.universe.index_of(Expr::Binary(op, lhs, rhs))])
                }
                // The call result is fresh and unknown; two identical calls
                // never unify.
                InstKind::Call { .. } => Some(self.registry.fresh()),
                InstKind::Other => None,
            };
            if let (Some(id), Some(dest)) = (assigned, kind.dest()) {
                ids[self.universe.atom_index(Value::Var(dest))] = id;
                self.recanonicalise(ids);
            }
        }

        self.partitions[node] = partition;
    }

    /// Restores the congruence-closure invariant after a write: every binary
    /// expression is re-pointed at the canonical class of its operands'
    /// classes, which propagates the write through every compound expression
    /// that mentions the written variable.
    fn recanonicalise(&mut self, ids: &mut [ClassId]) {
        for i in self.universe.binary_indices() {
            let (op, lhs, rhs) = self.universe.binary_at(i);
            let l = ids[self.universe.atom_index(lhs)];
            let r = ids[self.universe.atom_index(rhs)];
            ids[i] = self.registry.lookup_or_create(op, l, r);
        }
    }

    /// Confluence function: meet of the predecessor partitions.
    fn apply_confluence(&mut self, node: usize) {
        let preds = self.cfg.node(node).predecessors().to_vec();
        debug_assert!(preds.len() > 1 || self.cfg.node(node).kind == NodeKind::End);

        // Unreached on every incoming path: stay at TOP.
        if preds.iter().all(|&p| self.partitions[p].is_top()) {
            self.partitions[node] = Partition::top();
            return;
        }

        let n = self.universe.len();
        let mut out: Vec<Option<ClassId>> = vec![None; n];

        for i in 0..n {
            if out[i].is_some() {
                continue;
            }

            // Distinct class ids of expression i across the non-TOP
            // predecessors.
            let mut first = None;
            let mut conflict = false;
            for &p in &preds {
                if let Some(ids) = self.partitions[p].ids() {
                    match first {
                        None => first = Some(ids[i]),
                        Some(f) if f != ids[i] => {
                            conflict = true;
                            break;
                        }
                        Some(_) => {}
                    }
                }
            }

            if !conflict {
                // Agreement keeps the id; the fresh fallback only applies to
                // the degenerate all-TOP case already handled above.
                out[i] = Some(match first {
                    Some(id) => id,
                    None => self.registry.fresh(),
                });
                continue;
            }

            // The expression has conflicting classes: everything equivalent
            // to it along *every* path forms one new class. A TOP predecessor
            // constrains nothing.
            let mut member = vec![true; n];
            for &p in &preds {
                if let Some(ids) = self.partitions[p].ids() {
                    let id = ids[i];
                    for (m, &pid) in member.iter_mut().zip(ids) {
                        *m &= pid == id;
                    }
                }
            }
            let fresh = self.registry.fresh();
            for (j, m) in member.iter().enumerate() {
                if *m {
                    debug_assert!(out[j].is_none(), "Intersection hit an assigned index");
                    out[j] = Some(fresh);
                }
            }
        }

        let ids: Vec<ClassId> = out
            .into_iter()
            .map(|id| id.expect("Every expression is assigned by the meet"))
            .collect();

        // Extend the parent map with the classes this meet produced. Any
        // disagreement with an existing entry is a bug in the analysis, not
        // in the input.
        for i in self.universe.binary_indices() {
            let (op, lhs, rhs) = self.universe.binary_at(i);
            let l = ids[self.universe.atom_index(lhs)];
            let r = ids[self.universe.atom_index(rhs)];
            let canonical = self.registry.lookup_or_record(op, l, r, ids[i]);
            assert_eq!(
                canonical, ids[i],
                "Confluence at node {} violated congruence closure for expression {}",
                node, i
            );
        }

        self.partitions[node] = Partition::Classes(ids);
    }

    /// The partition at a CFG node.
    pub fn partition(&self, node: usize) -> &Partition {
        &self.partitions[node]
    }

    /// The initial partition (the start node's).
    pub fn initial_partition(&self) -> &Partition {
        &self.partitions[Cfg::START]
    }

    /// Whether a node is still unreached.
    pub fn is_top_at(&self, node: usize) -> bool {
        self.partitions[node].is_top()
    }

    /// Everything equivalent to `value` at a node, split into atoms and
    /// binaries. `None` when the node is unreached.
    pub fn class_members_at(&self, node: usize, value: Value) -> Option<(Vec<Value>, Vec<Expr>)> {
        let partition = &self.partitions[node];
        partition.ids()?;
        let index = self.universe.atom_index(value);
        let mut values = Vec::new();
        let mut binaries = Vec::new();
        for i in partition.class_of(index, self.universe.len()) {
            match self.universe.expr_at(i) {
                Expr::Atom(v) => values.push(v),
                binary => binaries.push(binary),
            }
        }
        Some((values, binaries))
    }

    pub fn program(&self) -> &Program {
        self.program
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::program::{ProgramBuilder, Target};
    use crate::types::Op;

    fn equivalent(analysis: &Analysis, node: usize, a: Expr, b: Expr) -> bool {
        let ids = analysis.partition(node).ids().expect("node is reached");
        ids[analysis.universe().index_of(a)] == ids[analysis.universe().index_of(b)]
    }

    #[test]
    fn test_copy_propagates_class() {
        // A = 5; B = A
        let mut b = ProgramBuilder::new();
        let a = b.var("A");
        let bv = b.var("B");
        let five = b.constant(5);
        b.copy(a, five);
        b.copy(bv, a);
        let program = b.finish();

        let mut analysis = Analysis::new(&program);
        analysis.run();

        let node = analysis.cfg().transfer_node_of(1).unwrap();
        assert!(equivalent(
            &analysis,
            node,
            Expr::Atom(a.into()),
            Expr::Atom(five.into())
        ));
        assert!(equivalent(
            &analysis,
            node,
            Expr::Atom(bv.into()),
            Expr::Atom(a.into())
        ));
    }

    #[test]
    fn test_binary_assignment_joins_compound_class() {
        // A = X + Y
        let mut b = ProgramBuilder::new();
        let a = b.var("A");
        let x = b.var("X");
        let y = b.var("Y");
        b.binary(a, Op::Add, x, y);
        let program = b.finish();

        let mut analysis = Analysis::new(&program);
        analysis.run();

        let node = analysis.cfg().transfer_node_of(0).unwrap();
        assert!(equivalent(
            &analysis,
            node,
            Expr::Atom(a.into()),
            Expr::Binary(Op::Add, x.into(), y.into())
        ));
    }

    #[test]
    fn test_call_result_is_fresh_singleton() {
        // A = 5; A = *
        let mut b = ProgramBuilder::new();
        let a = b.var("A");
        let five = b.constant(5);
        b.copy(a, five);
        b.call(a);
        let program = b.finish();

        let mut analysis = Analysis::new(&program);
        analysis.run();

        let node = analysis.cfg().transfer_node_of(1).unwrap();
        let (values, binaries) = analysis
            .class_members_at(node, a.into())
            .expect("node is reached");
        assert_eq!(values, vec![a.into()]);
        assert!(binaries.is_empty());
    }

    #[test]
    fn test_other_inherits_predecessor_partition() {
        let mut b = ProgramBuilder::new();
        let a = b.var("A");
        let five = b.constant(5);
        b.copy(a, five);
        b.other();
        let program = b.finish();

        let mut analysis = Analysis::new(&program);
        analysis.run();

        let before = analysis.cfg().transfer_node_of(0).unwrap();
        let after = analysis.cfg().transfer_node_of(1).unwrap();
        assert!(analysis.partition(before).same_partition(analysis.partition(after)));
    }

    #[test]
    fn test_every_cfg_node_is_reached() {
        // 0: A = 1; GOTO exit
        // 1: A = 2   (unreachable, not in the CFG at all)
        let mut b = ProgramBuilder::new();
        let a = b.var("A");
        let one = b.constant(1);
        let two = b.constant(2);
        let i0 = b.copy(a, one);
        b.copy(a, two);
        b.set_successors(i0, vec![Target::Exit]);
        let program = b.finish();

        let mut analysis = Analysis::new(&program);
        analysis.run();
        assert_eq!(analysis.cfg().transfer_node_of(1), None);
        for node in 1..analysis.cfg().len() {
            assert!(!analysis.is_top_at(node));
        }
    }

    #[test]
    fn test_rerun_is_already_stable() {
        let mut b = ProgramBuilder::new();
        let a = b.var("A");
        let one = b.constant(1);
        let i0 = b.binary(a, Op::Add, a, one);
        b.set_successors(i0, vec![Target::Inst(0), Target::Exit]);
        let program = b.finish();

        let mut analysis = Analysis::new(&program);
        analysis.run();
        // At the fixed point a second run observes no change anywhere.
        assert_eq!(analysis.run(), 1);
    }
}
