//! Textual front-end for the analysis.
//!
//! The mini-language has one construct per line:
//!
//! ```text
//! x = e          assignment; e is `v`, `c`, `v op v`, `v op c`, `c op c`,
//!                or `*` (non-deterministic)
//! GOTO L1 L2 …   successors of the preceding assignment, by label
//! LABEL L1 L2 …  attaches labels to the next assignment
//! ```
//!
//! Fall-through to the next line is implicit when `GOTO` is absent. A `GOTO`
//! before the first assignment redirects the program entry; a label defined
//! after the last assignment names the program exit. `*` as an operator and
//! `*` as non-determinism are disambiguated by arity.
//!
//! Operators: `+ - * /`.

use hashbrown::HashMap;
use thiserror::Error;

use crate::program::{Program, ProgramBuilder, Target};
use crate::types::{Op, Value};

/// Everything that can be wrong with an input text.
///
/// The analysis itself reports no recoverable errors; parsing is where all
/// user-visible failures originate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: malformed instruction: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("line {line}: lvalue `{token}` is not a variable")]
    LvalueNotVariable { line: usize, token: String },
    #[error("line {line}: duplicate label `{label}`")]
    DuplicateLabel { line: usize, label: String },
    #[error("line {line}: undefined label `{label}`")]
    UndefinedLabel { line: usize, label: String },
}

impl ParseError {
    fn malformed(line: usize, reason: impl Into<String>) -> Self {
        ParseError::Malformed {
            line,
            reason: reason.into(),
        }
    }
}

/// Parses a program text into the analysed model.
pub fn parse_program(text: &str) -> Result<Program, ParseError> {
    let mut builder = ProgramBuilder::new();
    // Per-instruction jump labels; empty means implicit fall-through.
    let mut gotos: Vec<Vec<(String, usize)>> = Vec::new();
    let mut entry_gotos: Vec<(String, usize)> = Vec::new();
    // Label -> index of the instruction following its `LABEL` line. An index
    // one past the last instruction names the program exit.
    let mut labels: HashMap<String, usize> = HashMap::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = lineno + 1;
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        match tokens[0] {
            "GOTO" => {
                let sink = if gotos.is_empty() {
                    &mut entry_gotos
                } else {
                    gotos.last_mut().unwrap()
                };
                sink.extend(tokens[1..].iter().map(|t| (t.to_string(), line)));
            }
            "LABEL" => {
                for &label in &tokens[1..] {
                    if labels.contains_key(label) {
                        return Err(ParseError::DuplicateLabel {
                            line,
                            label: label.to_string(),
                        });
                    }
                    labels.insert(label.to_string(), gotos.len());
                }
            }
            lvalue => {
                if lvalue.parse::<i64>().is_ok() {
                    return Err(ParseError::LvalueNotVariable {
                        line,
                        token: lvalue.to_string(),
                    });
                }
                if tokens.get(1) != Some(&"=") {
                    return Err(ParseError::malformed(line, "expected `=` after the lvalue"));
                }
                let dest = builder.var(lvalue);

                match &tokens[2..] {
                    [] => return Err(ParseError::malformed(line, "no rvalue specified")),
                    ["*"] => {
                        builder.call(dest);
                    }
                    &[operand] => {
                        let src = parse_value(&mut builder, operand);
                        builder.copy(dest, src);
                    }
                    &[lhs, op, rhs] => {
                        let op = parse_op(op, line)?;
                        let lhs = parse_value(&mut builder, lhs);
                        let rhs = parse_value(&mut builder, rhs);
                        builder.binary(dest, op, lhs, rhs);
                    }
                    _ => {
                        return Err(ParseError::malformed(line, "trailing tokens after the rvalue"))
                    }
                }
                gotos.push(Vec::new());
            }
        }
    }

    let num_instructions = gotos.len();
    let resolve = |pending: &[(String, usize)]| -> Result<Vec<Target>, ParseError> {
        pending
            .iter()
            .map(|(label, line)| match labels.get(label) {
                Some(&index) if index == num_instructions => Ok(Target::Exit),
                Some(&index) => Ok(Target::Inst(index)),
                None => Err(ParseError::UndefinedLabel {
                    line: *line,
                    label: label.clone(),
                }),
            })
            .collect()
    };

    if !entry_gotos.is_empty() {
        builder.set_entry(resolve(&entry_gotos)?);
    }
    for (index, pending) in gotos.iter().enumerate() {
        if !pending.is_empty() {
            builder.set_successors(index, resolve(pending)?);
        }
    }

    Ok(builder.finish())
}

fn parse_value(builder: &mut ProgramBuilder, token: &str) -> Value {
    match token.parse::<i64>() {
        Ok(payload) => builder.constant(payload).into(),
        Err(_) => builder.var(token).into(),
    }
}

fn parse_op(token: &str, line: usize) -> Result<Op, ParseError> {
    let mut chars = token.chars();
    match (chars.next().and_then(Op::from_symbol), chars.next()) {
        (Some(op), None) => Ok(op),
        _ => Err(ParseError::malformed(
            line,
            format!("`{}` is not an operator", token),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::InstKind;

    #[test]
    fn test_parse_straight_line() {
        let program = parse_program("A = 5\nB = A\nC = A + B\n").unwrap();
        assert_eq!(program.len(), 3);
        assert_eq!(program.num_variables(), 3);
        assert_eq!(program.num_constants(), 1);
        assert_eq!(program.ops(), &[Op::Add]);
        assert!(matches!(program.instruction(0).kind, InstKind::Copy { .. }));
        assert!(matches!(
            program.instruction(2).kind,
            InstKind::Binary { op: Op::Add, .. }
        ));
    }

    #[test]
    fn test_star_arity_disambiguation() {
        let program = parse_program("A = *\nB = A * A\n").unwrap();
        assert!(matches!(program.instruction(0).kind, InstKind::Call { .. }));
        assert!(matches!(
            program.instruction(1).kind,
            InstKind::Binary { op: Op::Mul, .. }
        ));
    }

    #[test]
    fn test_diamond_with_labels() {
        // A = 5; if *: B = A+1 else B = A+1; C = B
        let text = "\
A = 5
GOTO Then Else
LABEL Then
B = A + 1
GOTO Join
LABEL Else
B = A + 1
LABEL Join
C = B
";
        let program = parse_program(text).unwrap();
        assert_eq!(program.len(), 4);
        assert_eq!(
            program.instruction(0).successors(),
            &[Target::Inst(1), Target::Inst(2)]
        );
        assert_eq!(program.instruction(1).successors(), &[Target::Inst(3)]);
        assert_eq!(program.instruction(2).successors(), &[Target::Inst(3)]);
        assert_eq!(program.instruction(3).predecessor_count(), 2);
    }

    #[test]
    fn test_trailing_label_is_exit() {
        let text = "\
A = 1
GOTO End
A = 2
LABEL End
";
        let program = parse_program(text).unwrap();
        assert_eq!(program.instruction(0).successors(), &[Target::Exit]);
        assert!(!program.instruction(1).is_reachable());
    }

    #[test]
    fn test_leading_goto_redirects_entry() {
        let text = "\
GOTO Second
A = 1
LABEL Second
A = 2
";
        let program = parse_program(text).unwrap();
        assert_eq!(program.entry(), &[Target::Inst(1)]);
        assert!(!program.instruction(0).is_reachable());
        assert!(program.instruction(1).is_reachable());
    }

    #[test]
    fn test_negative_constant_is_a_copy() {
        let program = parse_program("A = -5\n").unwrap();
        assert!(matches!(program.instruction(0).kind, InstKind::Copy { .. }));
        assert_eq!(program.num_constants(), 1);
    }

    #[test]
    fn test_lvalue_must_be_a_variable() {
        let err = parse_program("5 = A\n").unwrap_err();
        assert!(matches!(err, ParseError::LvalueNotVariable { line: 1, .. }));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let err = parse_program("LABEL L\nA = 1\nLABEL L\n").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateLabel { line: 3, .. }));
    }

    #[test]
    fn test_undefined_label_rejected() {
        let err = parse_program("A = 1\nGOTO Nowhere\n").unwrap_err();
        assert!(matches!(err, ParseError::UndefinedLabel { line: 2, .. }));
    }

    #[test]
    fn test_malformed_lines_rejected() {
        assert!(matches!(
            parse_program("A B C\n").unwrap_err(),
            ParseError::Malformed { .. }
        ));
        assert!(matches!(
            parse_program("A =\n").unwrap_err(),
            ParseError::Malformed { .. }
        ));
        assert!(matches!(
            parse_program("A = B ? C\n").unwrap_err(),
            ParseError::Malformed { .. }
        ));
        assert!(matches!(
            parse_program("A = B + C + D\n").unwrap_err(),
            ParseError::Malformed { .. }
        ));
    }

    #[test]
    fn test_star_rhs_takes_no_operands() {
        let err = parse_program("A = * B\n").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { .. }));
    }
}
