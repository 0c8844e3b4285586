// Formula evaluation over piecewise-indexed variable tables
use crate::domain::aqi::bracket;
use crate::domain::error::{PipelineError, PipelineResult};
use evalexpr::{ContextWithMutableVariables, HashMapContext, Node, Operator, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub const INPUT_BINDING: &str = "input";

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct EvalError(pub String);

impl From<EvalError> for PipelineError {
    fn from(err: EvalError) -> Self {
        PipelineError::Eval(err.0)
    }
}

/// Narrow seam around the expression engine: text plus numeric bindings in,
/// a number out. Implementations must not allow side effects.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, bindings: &BTreeMap<String, f64>) -> Result<f64, EvalError>;
}

/// `evalexpr` backed evaluator. The context handed to the engine is read-only,
/// so assignments and other mutating operators fail instead of leaking state.
/// Integer literals are promoted to floats before evaluation, so `5 / 9` is a
/// fraction and not integer division.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArithmeticEvaluator;

impl ExpressionEvaluator for ArithmeticEvaluator {
    fn evaluate(&self, expression: &str, bindings: &BTreeMap<String, f64>) -> Result<f64, EvalError> {
        let mut context = HashMapContext::new();
        for (name, value) in bindings {
            context
                .set_value(name.clone(), Value::Float(*value))
                .map_err(|e| EvalError(e.to_string()))?;
        }

        let mut tree = evalexpr::build_operator_tree(expression).map_err(|e| EvalError(e.to_string()))?;
        promote_int_constants(&mut tree);

        let result = tree
            .eval_number_with_context(&context)
            .map_err(|e| EvalError(e.to_string()))?;
        if result.is_finite() {
            Ok(result)
        } else {
            Err(EvalError(format!("'{}' produced a non-finite result", expression)))
        }
    }
}

fn promote_int_constants(node: &mut Node) {
    if let Operator::Const { value } = node.operator_mut() {
        if let Value::Int(int) = *value {
            *value = Value::Float(int as f64);
        }
    }
    node.children_mut().iter_mut().for_each(promote_int_constants);
}

/// Ordered numeric breakpoints used as a piecewise domain
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableTable(Vec<f64>);

impl VariableTable {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for VariableTable {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// A user formula bound against a base table and auxiliary tables.
///
/// For an input bracketed by `base[i]..=base[i + 1]`, the expression sees
/// `input`, `base_curr`/`base_next`, and for the n-th auxiliary table
/// (numbered from 1) `set{n}_curr = set[i]` and `set{n}_next = set[i + 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaSpec {
    pub expression: String,
    pub base: VariableTable,
    pub sets: Vec<VariableTable>,
}

impl FormulaSpec {
    pub fn new(expression: impl Into<String>, base: VariableTable, sets: Vec<VariableTable>) -> Self {
        Self {
            expression: expression.into(),
            base,
            sets,
        }
    }

    /// Auxiliary tables whose length differs from the base table. These are
    /// warnings: evaluation still runs on whatever indices line up.
    pub fn length_mismatches(&self) -> Vec<PipelineError> {
        self.sets
            .iter()
            .enumerate()
            .filter(|(_, set)| set.len() != self.base.len())
            .map(|(n, set)| PipelineError::VariableTableLengthMismatch {
                set: n + 1,
                expected: self.base.len(),
                actual: set.len(),
            })
            .collect()
    }

    /// Binding set for `input`, or `None` when the base table does not bracket it.
    pub fn bindings(&self, input: f64) -> PipelineResult<Option<BTreeMap<String, f64>>> {
        let mut bindings = BTreeMap::from([(INPUT_BINDING.to_string(), input)]);
        if self.sets.is_empty() {
            return Ok(Some(bindings));
        }

        let Some(i) = bracket(self.base.values(), input) else {
            return Ok(None);
        };
        bindings.insert("base_curr".to_string(), self.base.values()[i]);
        bindings.insert("base_next".to_string(), self.base.values()[i + 1]);

        for (n, set) in self.sets.iter().enumerate() {
            let (Some(curr), Some(next)) = (set.values().get(i), set.values().get(i + 1)) else {
                return Err(PipelineError::VariableTableLengthMismatch {
                    set: n + 1,
                    expected: self.base.len(),
                    actual: set.len(),
                });
            };
            bindings.insert(format!("set{}_curr", n + 1), *curr);
            bindings.insert(format!("set{}_next", n + 1), *next);
        }

        Ok(Some(bindings))
    }

    pub fn evaluate(&self, input: f64, evaluator: &dyn ExpressionEvaluator) -> PipelineResult<Option<f64>> {
        match self.bindings(input)? {
            Some(bindings) => Ok(Some(evaluator.evaluate(&self.expression, &bindings)?)),
            None => Ok(None),
        }
    }
}
