//! SSA Instructions
//!
//! Defines the instruction set of the typed SSA form. Instructions refer to
//! values by SSA name and to blocks by id. Control flow is structural: `For`
//! and `Branch` name the blocks of their construct instead of edge targets.

use super::blocks::SsaBlockId;
use super::types::FunctionType;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Compile-time constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl Constant {
    /// The constant as an integer, when it is one or holds an integral value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Constant::Int(value) => Some(*value),
            Constant::Double(value) if value.fract() == 0.0 && value.is_finite() => {
                Some(*value as i64)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(value) => write!(f, "{}", value),
            Constant::Double(value) => write!(f, "{:?}", value),
            Constant::Bool(value) => write!(f, "{}", value),
        }
    }
}

/// Whether a call site has been resolved to a concrete signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallKind {
    /// Target not yet resolved; only the name is known
    Untyped,
    /// Target resolved to a signature
    Typed(FunctionType),
}

/// SSA instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SsaInstruction {
    // === Dataflow ===
    /// Merge values flowing in from multiple predecessor blocks.
    /// `values` and `sources` are parallel: `values[i]` flows in when
    /// control arrives from `sources[i]`.
    Phi {
        output: String,
        values: Vec<String>,
        sources: Vec<SsaBlockId>,
    },

    /// Bind a compile-time constant to a name
    Assignment { output: String, value: Constant },

    /// Call a function by name, producing zero or more outputs
    FunctionCall {
        function: String,
        kind: CallKind,
        outputs: Vec<String>,
        inputs: Vec<String>,
    },

    // === Matrix Access ===
    /// Read one element of a matrix. Indices are 1-based SSA values.
    SimpleGet {
        output: String,
        matrix: String,
        indices: Vec<String>,
    },

    /// Write one element, producing a new matrix value
    SimpleSet {
        output: String,
        matrix: String,
        indices: Vec<String>,
        value: String,
    },

    // === Control Flow ===
    /// Counted loop over `start : step : end`. Control enters `loop_block`
    /// once per iteration and continues at `end_block` afterwards.
    For {
        start: String,
        step: String,
        end: String,
        loop_block: SsaBlockId,
        end_block: SsaBlockId,
    },

    /// Two-way branch. Control runs `then_block` or `else_block` and
    /// merges at `end_block`.
    Branch {
        condition: String,
        then_block: SsaBlockId,
        else_block: SsaBlockId,
        end_block: SsaBlockId,
    },

    /// Current induction value of the innermost enclosing loop
    Iter { output: String },

    // === Metadata and Checks ===
    /// Original source line marker, no semantic effect
    Line { number: u32 },

    /// Runtime check that two values are equal; aborts when they differ
    ValidateEqual { left: String, right: String },
}

impl SsaInstruction {
    /// SSA names this instruction defines
    pub fn outputs(&self) -> SmallVec<[&str; 2]> {
        let mut result = SmallVec::new();
        match self {
            SsaInstruction::Phi { output, .. }
            | SsaInstruction::Assignment { output, .. }
            | SsaInstruction::SimpleGet { output, .. }
            | SsaInstruction::SimpleSet { output, .. }
            | SsaInstruction::Iter { output } => result.push(output.as_str()),
            SsaInstruction::FunctionCall { outputs, .. } => {
                result.extend(outputs.iter().map(|o| o.as_str()));
            }
            SsaInstruction::For { .. }
            | SsaInstruction::Branch { .. }
            | SsaInstruction::Line { .. }
            | SsaInstruction::ValidateEqual { .. } => {}
        }
        result
    }

    /// SSA names this instruction reads
    pub fn input_variables(&self) -> SmallVec<[&str; 4]> {
        let mut result = SmallVec::new();
        match self {
            SsaInstruction::Phi { values, .. } => {
                result.extend(values.iter().map(|v| v.as_str()));
            }
            SsaInstruction::Assignment { .. }
            | SsaInstruction::Iter { .. }
            | SsaInstruction::Line { .. } => {}
            SsaInstruction::FunctionCall { inputs, .. } => {
                result.extend(inputs.iter().map(|i| i.as_str()));
            }
            SsaInstruction::SimpleGet {
                matrix, indices, ..
            } => {
                result.push(matrix.as_str());
                result.extend(indices.iter().map(|i| i.as_str()));
            }
            SsaInstruction::SimpleSet {
                matrix,
                indices,
                value,
                ..
            } => {
                result.push(matrix.as_str());
                result.extend(indices.iter().map(|i| i.as_str()));
                result.push(value.as_str());
            }
            SsaInstruction::For {
                start, step, end, ..
            } => {
                result.push(start.as_str());
                result.push(step.as_str());
                result.push(end.as_str());
            }
            SsaInstruction::Branch { condition, .. } => {
                result.push(condition.as_str());
            }
            SsaInstruction::ValidateEqual { left, right } => {
                result.push(left.as_str());
                result.push(right.as_str());
            }
        }
        result
    }

    /// Blocks this instruction refers to
    pub fn referenced_blocks(&self) -> SmallVec<[SsaBlockId; 3]> {
        let mut result = SmallVec::new();
        match self {
            SsaInstruction::Phi { sources, .. } => {
                result.extend(sources.iter().copied());
            }
            SsaInstruction::For {
                loop_block,
                end_block,
                ..
            } => {
                result.push(*loop_block);
                result.push(*end_block);
            }
            SsaInstruction::Branch {
                then_block,
                else_block,
                end_block,
                ..
            } => {
                result.push(*then_block);
                result.push(*else_block);
                result.push(*end_block);
            }
            _ => {}
        }
        result
    }

    /// Terminators may only appear as the last instruction of a block
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            SsaInstruction::For { .. } | SsaInstruction::Branch { .. }
        )
    }

    /// Phis may only appear at the head of a block
    pub fn is_phi(&self) -> bool {
        matches!(self, SsaInstruction::Phi { .. })
    }
}

impl fmt::Display for SsaInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SsaInstruction::Phi {
                output,
                values,
                sources,
            } => {
                write!(f, "{} = phi [", output)?;
                for (i, (value, source)) in values.iter().zip(sources.iter()).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", source, value)?;
                }
                write!(f, "]")
            }
            SsaInstruction::Assignment { output, value } => {
                write!(f, "{} = {}", output, value)
            }
            SsaInstruction::FunctionCall {
                function,
                outputs,
                inputs,
                ..
            } => {
                for (i, output) in outputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", output)?;
                }
                if !outputs.is_empty() {
                    write!(f, " = ")?;
                }
                write!(f, "call {}(", function)?;
                for (i, input) in inputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", input)?;
                }
                write!(f, ")")
            }
            SsaInstruction::SimpleGet {
                output,
                matrix,
                indices,
            } => {
                write!(f, "{} = {}(", output, matrix)?;
                for (i, index) in indices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", index)?;
                }
                write!(f, ")")
            }
            SsaInstruction::SimpleSet {
                output,
                matrix,
                indices,
                value,
            } => {
                write!(f, "{} = {}(", output, matrix)?;
                for (i, index) in indices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", index)?;
                }
                write!(f, ") <- {}", value)
            }
            SsaInstruction::For {
                start,
                step,
                end,
                loop_block,
                end_block,
            } => {
                write!(
                    f,
                    "for {}:{}:{} loop {} end {}",
                    start, step, end, loop_block, end_block
                )
            }
            SsaInstruction::Branch {
                condition,
                then_block,
                else_block,
                end_block,
            } => {
                write!(
                    f,
                    "if {} then {} else {} end {}",
                    condition, then_block, else_block, end_block
                )
            }
            SsaInstruction::Iter { output } => write!(f, "{} = iter", output),
            SsaInstruction::Line { number } => write!(f, "line {}", number),
            SsaInstruction::ValidateEqual { left, right } => {
                write!(f, "validate {} == {}", left, right)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_outputs_and_inputs() {
        let call = SsaInstruction::FunctionCall {
            function: "min".to_string(),
            kind: CallKind::Untyped,
            outputs: vec!["m".to_string(), "i".to_string()],
            inputs: vec!["a".to_string(), "e".to_string(), "d".to_string()],
        };
        assert_eq!(call.outputs().as_slice(), ["m", "i"]);
        assert_eq!(call.input_variables().as_slice(), ["a", "e", "d"]);
        assert!(!call.is_terminator());
    }

    #[test]
    fn test_terminator_queries() {
        let for_instr = SsaInstruction::For {
            start: "one".to_string(),
            step: "one".to_string(),
            end: "n".to_string(),
            loop_block: SsaBlockId::new(1),
            end_block: SsaBlockId::new(2),
        };
        assert!(for_instr.is_terminator());
        assert_eq!(for_instr.outputs().len(), 0);
        assert_eq!(for_instr.input_variables().as_slice(), ["one", "one", "n"]);
        assert_eq!(
            for_instr.referenced_blocks().as_slice(),
            [SsaBlockId::new(1), SsaBlockId::new(2)]
        );
    }

    #[test]
    fn test_set_reads_matrix_and_value() {
        let set = SsaInstruction::SimpleSet {
            output: "r2".to_string(),
            matrix: "r1".to_string(),
            indices: vec!["i".to_string()],
            value: "v".to_string(),
        };
        assert_eq!(set.outputs().as_slice(), ["r2"]);
        assert_eq!(set.input_variables().as_slice(), ["r1", "i", "v"]);
    }

    #[test]
    fn test_display() {
        let phi = SsaInstruction::Phi {
            output: "$acc$2".to_string(),
            values: vec!["$acc$1".to_string(), "$acc$3".to_string()],
            sources: vec![SsaBlockId::new(0), SsaBlockId::new(1)],
        };
        assert_eq!(phi.to_string(), "$acc$2 = phi [bb0: $acc$1, bb1: $acc$3]");

        let get = SsaInstruction::SimpleGet {
            output: "v".to_string(),
            matrix: "in".to_string(),
            indices: vec!["i".to_string()],
        };
        assert_eq!(get.to_string(), "v = in(i)");
    }

    #[test]
    fn test_constant_as_integer() {
        assert_eq!(Constant::Int(3).as_integer(), Some(3));
        assert_eq!(Constant::Double(3.0).as_integer(), Some(3));
        assert_eq!(Constant::Double(3.5).as_integer(), None);
        assert_eq!(Constant::Bool(true).as_integer(), None);
    }
}
