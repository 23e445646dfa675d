//! Graphviz export of the normalised CFG.

use crate::cfg::{Cfg, NodeKind};
use crate::program::Program;

impl Cfg {
    /// Renders the CFG as a Graphviz `digraph`.
    ///
    /// Transfer nodes are boxes labelled with their instruction, confluence
    /// nodes are diamonds, start and end are ovals.
    pub fn to_dot(&self, program: &Program) -> Result<String, std::fmt::Error> {
        use std::fmt::Write as _;

        let mut dot = String::new();
        writeln!(dot, "digraph cfg {{")?;
        writeln!(dot, "node [fontname=\"monospace\"];")?;

        for (i, node) in self.nodes().iter().enumerate() {
            match node.kind {
                NodeKind::Start => {
                    writeln!(dot, "{} [label=\"START\"];", i)?;
                }
                NodeKind::End => {
                    writeln!(dot, "{} [label=\"END\"];", i)?;
                }
                NodeKind::Transfer(index) => {
                    let label = program.instruction_string(index).replace('"', "\\\"");
                    writeln!(dot, "{} [shape=box, label=\"({}) {}\"];", i, index, label)?;
                }
                NodeKind::Confluence => {
                    writeln!(dot, "{} [shape=diamond, label=\"\"];", i)?;
                }
            }
        }

        for (i, node) in self.nodes().iter().enumerate() {
            for &pred in node.predecessors() {
                writeln!(dot, "{} -> {};", pred, i)?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    #[test]
    fn test_dot_mentions_every_node() {
        let text = "\
A = 5
GOTO Then Else
LABEL Then
B = A
GOTO Join
LABEL Else
B = 6
LABEL Join
C = B
";
        let program = parse_program(text).unwrap();
        let cfg = Cfg::build(&program);
        let dot = cfg.to_dot(&program).unwrap();

        assert!(dot.starts_with("digraph cfg {"));
        assert!(dot.contains("label=\"START\""));
        assert!(dot.contains("shape=diamond"));
        assert!(dot.contains("C = B"));
        for (i, node) in cfg.nodes().iter().enumerate() {
            for &pred in node.predecessors() {
                assert!(dot.contains(&format!("{} -> {};", pred, i)));
            }
        }
    }
}
