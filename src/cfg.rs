//! The normalised control-flow graph.
//!
//! One node per reachable instruction, plus a predecessorless `Start` node
//! and, when the program can exit, an `End` node collecting the exit edges.
//! Any instruction with two or more predecessors gets its own `Confluence`
//! node inserted in front of its `Transfer` node. After this normalisation a
//! node either has a single predecessor and transfer semantics, or several
//! predecessors and confluence semantics, never both.
//!
//! Unreachable instructions are silently omitted.

use log::debug;

use crate::program::{Program, Target};

/// What a CFG node stands for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum NodeKind {
    /// Program entry. Exactly one, no predecessors.
    Start,
    /// One reachable instruction, identified by its instruction index.
    Transfer(usize),
    /// A join in front of a multi-predecessor instruction.
    Confluence,
    /// Program exit. A confluence when it has several predecessors.
    End,
}

/// A node and its predecessor node indices.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    preds: Vec<usize>,
}

impl Node {
    pub fn predecessors(&self) -> &[usize] {
        &self.preds
    }
}

/// The normalised CFG of one program.
#[derive(Debug, Clone)]
pub struct Cfg {
    nodes: Vec<Node>,
    /// Instruction index → its transfer node, for reachable instructions.
    transfer_node: Vec<Option<usize>>,
    end: Option<usize>,
}

impl Cfg {
    /// Index of the start node.
    pub const START: usize = 0;

    pub fn build(program: &Program) -> Self {
        let n = program.len();

        // First pass: allocate node indices in instruction order, a
        // confluence node directly in front of each join's transfer node.
        let mut confluence_node = vec![None; n];
        let mut transfer_node = vec![None; n];
        let mut next = 1;
        for i in 0..n {
            let inst = program.instruction(i);
            if !inst.is_reachable() {
                continue;
            }
            if inst.predecessor_count() > 1 {
                confluence_node[i] = Some(next);
                transfer_node[i] = Some(next + 1);
                next += 2;
            } else {
                transfer_node[i] = Some(next);
                next += 1;
            }
        }

        // Exit edges, in node order: the entry first, then instructions.
        let mut exit_preds = Vec::new();
        if program.entry().contains(&Target::Exit) {
            exit_preds.push(Self::START);
        }
        for i in 0..n {
            let inst = program.instruction(i);
            if inst.is_reachable() && inst.successors().contains(&Target::Exit) {
                exit_preds.push(transfer_node[i].unwrap());
            }
        }
        let end = if exit_preds.is_empty() {
            None
        } else {
            Some(next)
        };

        let mut nodes = vec![Node {
            kind: NodeKind::Start,
            preds: Vec::new(),
        }];

        // Second pass: emit nodes with predecessor lists. Predecessor order
        // is deterministic: the entry edge first, then instruction order.
        for i in 0..n {
            let inst = program.instruction(i);
            if !inst.is_reachable() {
                continue;
            }
            let mut inbound = Vec::new();
            if inst.has_entry_predecessor() {
                inbound.push(Self::START);
            }
            for &p in inst.predecessors() {
                inbound.push(transfer_node[p].unwrap());
            }

            if let Some(conf) = confluence_node[i] {
                debug_assert!(inbound.len() > 1);
                debug_assert_eq!(nodes.len(), conf);
                nodes.push(Node {
                    kind: NodeKind::Confluence,
                    preds: inbound,
                });
                nodes.push(Node {
                    kind: NodeKind::Transfer(i),
                    preds: vec![conf],
                });
            } else {
                debug_assert_eq!(inbound.len(), 1);
                debug_assert_eq!(nodes.len(), transfer_node[i].unwrap());
                nodes.push(Node {
                    kind: NodeKind::Transfer(i),
                    preds: inbound,
                });
            }
        }

        if end.is_some() {
            nodes.push(Node {
                kind: NodeKind::End,
                preds: exit_preds,
            });
        }

        debug!(
            "cfg built: {} nodes ({} confluence), end = {:?}",
            nodes.len(),
            nodes.iter().filter(|n| n.kind == NodeKind::Confluence).count(),
            end
        );

        Cfg {
            nodes,
            transfer_node,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The transfer node of a reachable instruction.
    pub fn transfer_node_of(&self, instruction: usize) -> Option<usize> {
        self.transfer_node[instruction]
    }

    /// The confluence node in front of an instruction, when the instruction
    /// is a join.
    pub fn confluence_node_of(&self, instruction: usize) -> Option<usize> {
        let node = self.transfer_node[instruction]?;
        match self.nodes[node].preds[..] {
            [pred] if self.nodes[pred].kind == NodeKind::Confluence => Some(pred),
            _ => None,
        }
    }

    /// The end node, if the program can exit.
    pub fn end_node(&self) -> Option<usize> {
        self.end
    }
}
