//! Stable textual rendering of programs, CFGs, and partitions.
//!
//! Values and expressions print with their surface names, so output is
//! readable against the input text. A class renders as `[id]{expr, expr, …}`
//! with classes in id order and expressions in universe order; an unreached
//! partition renders as `<TOP ELEMENT>`.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::analysis::Analysis;
use crate::cfg::{Cfg, NodeKind};
use crate::partition::Partition;
use crate::program::{InstKind, Program};
use crate::types::Value;
use crate::universe::{Expr, Universe};

impl Program {
    pub fn value_string(&self, value: Value) -> String {
        match value {
            Value::Const(c) => self.constant_payload(c).to_string(),
            Value::Var(v) => self.variable_name(v).to_string(),
        }
    }

    pub fn expr_string(&self, expr: Expr) -> String {
        match expr {
            Expr::Atom(value) => self.value_string(value),
            Expr::Binary(op, lhs, rhs) => format!(
                "{} {} {}",
                self.value_string(lhs),
                op,
                self.value_string(rhs)
            ),
        }
    }

    pub fn instruction_string(&self, index: usize) -> String {
        match self.instruction(index).kind {
            InstKind::Copy { dest, src } | InstKind::Store { dest, src } => {
                format!("{} = {}", self.variable_name(dest), self.value_string(src))
            }
            InstKind::Binary { dest, op, lhs, rhs } => format!(
                "{} = {} {} {}",
                self.variable_name(dest),
                self.value_string(lhs),
                op,
                self.value_string(rhs)
            ),
            InstKind::Call { dest } => format!("{} = *", self.variable_name(dest)),
            InstKind::Other => "(no effect)".to_string(),
        }
    }

    /// The program in a readable form: value tables, then every instruction
    /// with its predecessors or an unreachable marker.
    pub fn listing(&self) -> String {
        let mut out = String::new();

        let variables: Vec<&str> = (0..self.num_variables())
            .map(|i| self.variable_name(crate::types::Var::new(i as u32)))
            .collect();
        writeln!(out, "Variables: {}", variables.join(", ")).unwrap();

        let constants: Vec<String> = (0..self.num_constants())
            .map(|i| {
                self.constant_payload(crate::types::Const::new(i as u32))
                    .to_string()
            })
            .collect();
        writeln!(out, "Constants: {}", constants.join(", ")).unwrap();

        for (i, inst) in self.instructions().iter().enumerate() {
            write!(out, "[{}] : {}", i, self.instruction_string(i)).unwrap();
            if inst.is_reachable() {
                let mut preds: Vec<String> = Vec::new();
                if inst.has_entry_predecessor() {
                    preds.push("entry".to_string());
                }
                preds.extend(inst.predecessors().iter().map(|p| p.to_string()));
                writeln!(out, "\t[ predecessors: {} ]", preds.join(" ")).unwrap();
            } else {
                writeln!(out, "\t[ unreachable ]").unwrap();
            }
        }
        out
    }
}

/// Describes one CFG node on a single line.
pub fn node_string(cfg: &Cfg, program: &Program, node: usize) -> String {
    let preds: Vec<String> = cfg
        .node(node)
        .predecessors()
        .iter()
        .map(|p| p.to_string())
        .collect();
    match cfg.node(node).kind {
        NodeKind::Start => "START".to_string(),
        NodeKind::Transfer(index) => format!(
            "Transfer => ({}) {} [ preds: {} ]",
            index,
            program.instruction_string(index),
            preds.join(" ")
        ),
        NodeKind::Confluence => format!("Confluence [ preds: {} ]", preds.join(" ")),
        NodeKind::End => format!("END [ preds: {} ]", preds.join(" ")),
    }
}

/// The whole CFG, one node per line.
pub fn cfg_listing(cfg: &Cfg, program: &Program) -> String {
    let mut out = String::new();
    for node in 0..cfg.len() {
        writeln!(out, "[{}] : {}", node, node_string(cfg, program, node)).unwrap();
    }
    out
}

/// Renders one partition.
pub fn partition_string(partition: &Partition, universe: &Universe, program: &Program) -> String {
    let Some(ids) = partition.ids() else {
        return "<TOP ELEMENT>".to_string();
    };

    let mut classes: BTreeMap<_, Vec<usize>> = BTreeMap::new();
    for (index, &id) in ids.iter().enumerate() {
        classes.entry(id).or_default().push(index);
    }

    let rendered: Vec<String> = classes
        .iter()
        .map(|(id, members)| {
            let exprs: Vec<String> = members
                .iter()
                .map(|&i| program.expr_string(universe.expr_at(i)))
                .collect();
            format!("[{}]{{{}}}", id, exprs.join(", "))
        })
        .collect();
    rendered.join(", ")
}

impl Analysis<'_> {
    /// The rendered partition at a node.
    pub fn partition_string(&self, node: usize) -> String {
        partition_string(self.partition(node), self.universe(), self.program())
    }

    /// The full analysis report: the initial partition followed by every
    /// node's description and final partition.
    pub fn report(&self) -> String {
        let mut out = String::new();
        writeln!(out, "Initial partition:").unwrap();
        writeln!(
            out,
            "\t{}",
            partition_string(self.initial_partition(), self.universe(), self.program())
        )
        .unwrap();
        for node in 0..self.cfg().len() {
            writeln!(
                out,
                "[{}] : {}",
                node,
                node_string(self.cfg(), self.program(), node)
            )
            .unwrap();
            writeln!(out, "\t{}", self.partition_string(node)).unwrap();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    #[test]
    fn test_expression_rendering() {
        let program = parse_program("A = B + 5\n").unwrap();
        assert_eq!(program.instruction_string(0), "A = B + 5");
    }

    #[test]
    fn test_top_renders_as_top_element() {
        let program = parse_program("A = 1\n").unwrap();
        let universe = Universe::build(&program);
        assert_eq!(
            partition_string(&Partition::top(), &universe, &program),
            "<TOP ELEMENT>"
        );
    }

    #[test]
    fn test_partition_classes_render_in_id_order() {
        let program = parse_program("A = 5\nB = A\n").unwrap();
        let mut analysis = Analysis::new(&program);
        analysis.run();

        let node = analysis.cfg().transfer_node_of(1).unwrap();
        let text = analysis.partition_string(node);
        // A, B and 5 share one class at the end of the program.
        assert!(text.contains("{5, A, B}"), "unexpected rendering: {}", text);
        // Ids ascend left to right.
        let ids: Vec<u64> = text
            .split(", [")
            .map(|chunk| {
                let chunk = chunk.trim_start_matches('[');
                chunk[..chunk.find(']').unwrap()].parse().unwrap()
            })
            .collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_listing_marks_unreachable() {
        let text = "\
A = 1
GOTO End
B = 2
LABEL End
";
        let program = parse_program(text).unwrap();
        let listing = program.listing();
        assert!(listing.contains("[ unreachable ]"));
        assert!(listing.contains("[0] : A = 1"));
    }
}
