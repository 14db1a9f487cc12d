//! Reference Interpreter
//!
//! Executes structured SSA directly, with MATLAB evaluation rules: 1-based
//! column-major indexing, `start:step:end` iteration counts, and a small
//! set of builtins. Rewrites are checked by running a body before and
//! after a pass on the same arguments and comparing results.
//!
//! Phis resolve against the block control actually arrived from, which for
//! structured constructs is either the block holding the terminator or the
//! tail of the construct body just finished.

use super::blocks::SsaBlockId;
use super::cfg::tail;
use super::functions::FunctionBody;
use super::instance::TypedInstance;
use super::instructions::{Constant, SsaInstruction};
use fxhash::FxHashMap;
use std::fmt;

/// A runtime matrix, column-major
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixValue {
    dims: Vec<usize>,
    data: Vec<f64>,
}

impl MatrixValue {
    pub fn new(dims: Vec<usize>, data: Vec<f64>) -> Result<Self, EvalError> {
        let expected: usize = dims.iter().product();
        if expected != data.len() {
            return Err(EvalError::Internal {
                detail: format!(
                    "matrix data has {} elements for dims {:?}",
                    data.len(),
                    dims
                ),
            });
        }
        Ok(Self { dims, data })
    }

    pub fn empty() -> Self {
        Self {
            dims: vec![0, 0],
            data: Vec::new(),
        }
    }

    pub fn zeros(dims: Vec<usize>) -> Self {
        let len = dims.iter().product();
        Self {
            dims,
            data: vec![0.0; len],
        }
    }

    pub fn row_vector(data: &[f64]) -> Self {
        Self {
            dims: vec![1, data.len()],
            data: data.to_vec(),
        }
    }

    pub fn column_vector(data: &[f64]) -> Self {
        Self {
            dims: vec![data.len(), 1],
            data: data.to_vec(),
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Zero-based storage offset for 1-based subscripts. A single
    /// subscript indexes linearly; trailing subscripts beyond the rank
    /// must be 1.
    fn offset(&self, subscripts: &[usize]) -> Result<usize, EvalError> {
        let out_of_bounds = || EvalError::IndexOutOfBounds {
            subscripts: subscripts.to_vec(),
            dims: self.dims.clone(),
        };

        if subscripts.is_empty() {
            return Err(out_of_bounds());
        }
        if subscripts.len() == 1 {
            let index = subscripts[0];
            if index < 1 || index > self.numel() {
                return Err(out_of_bounds());
            }
            return Ok(index - 1);
        }

        let mut offset = 0;
        let mut stride = 1;
        for (k, &sub) in subscripts.iter().enumerate() {
            let extent = self.dims.get(k).copied().unwrap_or(1);
            if sub < 1 || sub > extent {
                return Err(out_of_bounds());
            }
            offset += (sub - 1) * stride;
            stride *= extent;
        }
        Ok(offset)
    }

    pub fn get(&self, subscripts: &[usize]) -> Result<f64, EvalError> {
        Ok(self.data[self.offset(subscripts)?])
    }

    pub fn set(&mut self, subscripts: &[usize], value: f64) -> Result<(), EvalError> {
        let offset = self.offset(subscripts)?;
        self.data[offset] = value;
        Ok(())
    }
}

/// A runtime value. A `Num` behaves exactly like a 1x1 matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Matrix(MatrixValue),
}

impl Value {
    pub fn scalar(value: f64) -> Self {
        Value::Num(value)
    }

    pub fn as_num(&self) -> Result<f64, EvalError> {
        match self {
            Value::Num(value) => Ok(*value),
            Value::Matrix(m) if m.numel() == 1 => Ok(m.data[0]),
            Value::Matrix(m) => Err(EvalError::ScalarExpected {
                dims: m.dims.clone(),
            }),
        }
    }

    pub fn numel(&self) -> usize {
        match self {
            Value::Num(_) => 1,
            Value::Matrix(m) => m.numel(),
        }
    }

    fn dims(&self) -> Vec<usize> {
        match self {
            Value::Num(_) => vec![1, 1],
            Value::Matrix(m) => m.dims.clone(),
        }
    }

    fn element(&self, linear: usize) -> Result<f64, EvalError> {
        match self {
            Value::Num(value) if linear == 1 => Ok(*value),
            Value::Num(_) => Err(EvalError::IndexOutOfBounds {
                subscripts: vec![linear],
                dims: vec![1, 1],
            }),
            Value::Matrix(m) => m.get(&[linear]),
        }
    }
}

/// Failure of a reference evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    UndefinedVariable { name: String },
    UnknownFunction { name: String },
    WrongArgumentCount { expected: usize, found: usize },
    WrongCallArity { function: String },
    ScalarExpected { dims: Vec<usize> },
    IndexOutOfBounds { subscripts: Vec<usize>, dims: Vec<usize> },
    ValidationFailed { left: f64, right: f64 },
    IterOutsideLoop,
    PhiSourceMissing { output: String, came_from: Option<SsaBlockId> },
    MissingReturn { name: String },
    Internal { detail: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UndefinedVariable { name } => {
                write!(f, "undefined variable `{}`", name)
            }
            EvalError::UnknownFunction { name } => {
                write!(f, "call to unknown function `{}`", name)
            }
            EvalError::WrongArgumentCount { expected, found } => {
                write!(f, "function takes {} arguments, got {}", expected, found)
            }
            EvalError::WrongCallArity { function } => {
                write!(f, "unsupported arity in call to `{}`", function)
            }
            EvalError::ScalarExpected { dims } => {
                write!(f, "expected a scalar, got a {:?} matrix", dims)
            }
            EvalError::IndexOutOfBounds { subscripts, dims } => {
                write!(f, "index {:?} out of bounds for dims {:?}", subscripts, dims)
            }
            EvalError::ValidationFailed { left, right } => {
                write!(f, "runtime validation failed: {} != {}", left, right)
            }
            EvalError::IterOutsideLoop => write!(f, "iter outside any loop"),
            EvalError::PhiSourceMissing { output, came_from } => match came_from {
                Some(block) => write!(f, "phi `{}` has no source for {}", output, block),
                None => write!(f, "phi `{}` executed with no predecessor", output),
            },
            EvalError::MissingReturn { name } => {
                write!(f, "return value `{}` was never assigned", name)
            }
            EvalError::Internal { detail } => write!(f, "internal evaluation error: {}", detail),
        }
    }
}

impl std::error::Error for EvalError {}

/// Run an instance's body on the given arguments
pub fn evaluate(instance: &TypedInstance, args: &[Value]) -> Result<Vec<Value>, EvalError> {
    evaluate_body(instance.body(), args)
}

/// Run a body on the given arguments, returning its declared outputs
pub fn evaluate_body(body: &FunctionBody, args: &[Value]) -> Result<Vec<Value>, EvalError> {
    if args.len() != body.parameters().len() {
        return Err(EvalError::WrongArgumentCount {
            expected: body.parameters().len(),
            found: args.len(),
        });
    }

    let mut evaluator = Evaluator {
        body,
        env: FxHashMap::default(),
        loop_values: Vec::new(),
    };
    for (name, value) in body.parameters().iter().zip(args.iter()) {
        evaluator.env.insert(name.clone(), value.clone());
    }

    evaluator.run_block(body.entry_block(), None)?;

    body.returns()
        .iter()
        .map(|name| {
            evaluator
                .env
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::MissingReturn { name: name.clone() })
        })
        .collect()
}

struct Evaluator<'a> {
    body: &'a FunctionBody,
    env: FxHashMap<String, Value>,
    loop_values: Vec<f64>,
}

impl<'a> Evaluator<'a> {
    fn lookup(&self, name: &str) -> Result<&Value, EvalError> {
        self.env.get(name).ok_or_else(|| EvalError::UndefinedVariable {
            name: name.to_string(),
        })
    }

    fn scalar(&self, name: &str) -> Result<f64, EvalError> {
        self.lookup(name)?.as_num()
    }

    fn subscripts(&self, indices: &[String]) -> Result<Vec<usize>, EvalError> {
        indices
            .iter()
            .map(|index| {
                let value = self.scalar(index)?;
                if value < 1.0 || value.fract() != 0.0 || !value.is_finite() {
                    return Err(EvalError::IndexOutOfBounds {
                        subscripts: vec![value as usize],
                        dims: vec![],
                    });
                }
                Ok(value as usize)
            })
            .collect()
    }

    fn run_block(
        &mut self,
        id: SsaBlockId,
        came_from: Option<SsaBlockId>,
    ) -> Result<(), EvalError> {
        let block = self.body.block(id);
        for instruction in block.instructions() {
            match instruction {
                SsaInstruction::Phi {
                    output,
                    values,
                    sources,
                } => {
                    let from = came_from.ok_or_else(|| EvalError::PhiSourceMissing {
                        output: output.clone(),
                        came_from: None,
                    })?;
                    let position = sources.iter().position(|s| *s == from).ok_or_else(|| {
                        EvalError::PhiSourceMissing {
                            output: output.clone(),
                            came_from: Some(from),
                        }
                    })?;
                    let value = self.lookup(&values[position])?.clone();
                    self.env.insert(output.clone(), value);
                }

                SsaInstruction::Assignment { output, value } => {
                    let num = match value {
                        Constant::Int(v) => *v as f64,
                        Constant::Double(v) => *v,
                        Constant::Bool(v) => {
                            if *v {
                                1.0
                            } else {
                                0.0
                            }
                        }
                    };
                    self.env.insert(output.clone(), Value::Num(num));
                }

                SsaInstruction::FunctionCall {
                    function,
                    outputs,
                    inputs,
                    ..
                } => {
                    let args: Vec<Value> = inputs
                        .iter()
                        .map(|input| self.lookup(input).cloned())
                        .collect::<Result<_, _>>()?;
                    let results = call_builtin(function, &args, outputs.len())?;
                    for (name, value) in outputs.iter().zip(results.into_iter()) {
                        self.env.insert(name.clone(), value);
                    }
                }

                SsaInstruction::SimpleGet {
                    output,
                    matrix,
                    indices,
                } => {
                    let subscripts = self.subscripts(indices)?;
                    let value = match self.lookup(matrix)? {
                        Value::Num(v) => {
                            if subscripts.iter().all(|s| *s == 1) {
                                *v
                            } else {
                                return Err(EvalError::IndexOutOfBounds {
                                    subscripts,
                                    dims: vec![1, 1],
                                });
                            }
                        }
                        Value::Matrix(m) => m.get(&subscripts)?,
                    };
                    self.env.insert(output.clone(), Value::Num(value));
                }

                SsaInstruction::SimpleSet {
                    output,
                    matrix,
                    indices,
                    value,
                } => {
                    let subscripts = self.subscripts(indices)?;
                    let new_value = self.scalar(value)?;
                    let result = match self.lookup(matrix)? {
                        Value::Num(_) => {
                            if subscripts.iter().all(|s| *s == 1) {
                                Value::Num(new_value)
                            } else {
                                return Err(EvalError::IndexOutOfBounds {
                                    subscripts,
                                    dims: vec![1, 1],
                                });
                            }
                        }
                        Value::Matrix(m) => {
                            let mut updated = m.clone();
                            updated.set(&subscripts, new_value)?;
                            Value::Matrix(updated)
                        }
                    };
                    self.env.insert(output.clone(), result);
                }

                SsaInstruction::Iter { output } => {
                    let value = *self
                        .loop_values
                        .last()
                        .ok_or(EvalError::IterOutsideLoop)?;
                    self.env.insert(output.clone(), Value::Num(value));
                }

                SsaInstruction::Line { .. } => {}

                SsaInstruction::ValidateEqual { left, right } => {
                    let left = self.scalar(left)?;
                    let right = self.scalar(right)?;
                    if left != right {
                        return Err(EvalError::ValidationFailed { left, right });
                    }
                }

                SsaInstruction::For {
                    start,
                    step,
                    end,
                    loop_block,
                    end_block,
                } => {
                    let start = self.scalar(start)?;
                    let step = self.scalar(step)?;
                    let end = self.scalar(end)?;
                    let count = iteration_count(start, step, end);

                    let mut from = id;
                    let mut induction = start;
                    for _ in 0..count {
                        self.loop_values.push(induction);
                        let result = self.run_block(*loop_block, Some(from));
                        self.loop_values.pop();
                        result?;
                        from = tail(self.body, *loop_block);
                        induction += step;
                    }
                    return self.run_block(*end_block, Some(from));
                }

                SsaInstruction::Branch {
                    condition,
                    then_block,
                    else_block,
                    end_block,
                } => {
                    let taken = if self.scalar(condition)? != 0.0 {
                        *then_block
                    } else {
                        *else_block
                    };
                    self.run_block(taken, Some(id))?;
                    return self.run_block(*end_block, Some(tail(self.body, taken)));
                }
            }
        }
        Ok(())
    }
}

/// Number of iterations of `start : step : end`
fn iteration_count(start: f64, step: f64, end: f64) -> usize {
    if step == 0.0 {
        return 0;
    }
    let span = (end - start) / step;
    if !span.is_finite() || span < 0.0 {
        return 0;
    }
    span.floor() as usize + 1
}

fn binary_elementwise(
    function: &str,
    left: &Value,
    right: &Value,
    op: impl Fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    let (ln, rn) = (left.numel(), right.numel());
    if ln == 1 && rn == 1 {
        return Ok(Value::Num(op(left.element(1)?, right.element(1)?)));
    }
    let dims = if ln == 1 { right.dims() } else { left.dims() };
    if ln != 1 && rn != 1 && left.dims() != right.dims() {
        return Err(EvalError::Internal {
            detail: format!("size mismatch in call to `{}`", function),
        });
    }
    let count: usize = dims.iter().product();
    let mut data = Vec::with_capacity(count);
    for linear in 1..=count {
        let a = if ln == 1 { left.element(1)? } else { left.element(linear)? };
        let b = if rn == 1 { right.element(1)? } else { right.element(linear)? };
        data.push(op(a, b));
    }
    Ok(Value::Matrix(MatrixValue::new(dims, data)?))
}

fn unary_elementwise(value: &Value, op: impl Fn(f64) -> f64) -> Result<Value, EvalError> {
    match value {
        Value::Num(v) => Ok(Value::Num(op(*v))),
        Value::Matrix(m) => Ok(Value::Matrix(MatrixValue {
            dims: m.dims.clone(),
            data: m.data.iter().map(|v| op(*v)).collect(),
        })),
    }
}

/// Subscript odometer over every position with dimension `dim0` held at 1
fn each_lane(dims: &[usize], dim0: usize, mut visit: impl FnMut(&mut Vec<usize>)) {
    if dims
        .iter()
        .enumerate()
        .any(|(k, extent)| k != dim0 && *extent == 0)
    {
        return;
    }
    let mut subscripts: Vec<usize> = vec![1; dims.len()];
    loop {
        visit(&mut subscripts);
        let mut k = 0;
        loop {
            if k == dims.len() {
                return;
            }
            if k == dim0 {
                k += 1;
                continue;
            }
            subscripts[k] += 1;
            if subscripts[k] <= dims[k] {
                break;
            }
            subscripts[k] = 1;
            k += 1;
        }
    }
}

fn first_non_singleton(dims: &[usize]) -> usize {
    dims.iter().position(|d| *d != 1).unwrap_or(0)
}

/// Reduce `value` along `dim0` (zero-based), writing one scalar per lane
fn reduce_along(
    value: &MatrixValue,
    dim0: usize,
    fold: impl Fn(&[f64]) -> f64,
) -> Result<MatrixValue, EvalError> {
    let mut out_dims = value.dims.clone();
    if dim0 < out_dims.len() {
        out_dims[dim0] = 1;
    }
    let mut out = MatrixValue::zeros(out_dims);
    let extent = value.dims.get(dim0).copied().unwrap_or(1);
    let mut failure = None;
    each_lane(&value.dims, dim0, |subscripts| {
        if failure.is_some() {
            return;
        }
        let mut lane = Vec::with_capacity(extent);
        for j in 1..=extent {
            subscripts[dim0] = j;
            match value.get(subscripts) {
                Ok(v) => lane.push(v),
                Err(e) => {
                    failure = Some(e);
                    return;
                }
            }
        }
        subscripts[dim0] = 1;
        if let Err(e) = out.set(subscripts, fold(&lane)) {
            failure = Some(e);
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

fn as_matrix(value: &Value) -> MatrixValue {
    match value {
        Value::Num(v) => MatrixValue {
            dims: vec![1, 1],
            data: vec![*v],
        },
        Value::Matrix(m) => m.clone(),
    }
}

fn call_builtin(function: &str, args: &[Value], outputs: usize) -> Result<Vec<Value>, EvalError> {
    let arity_error = || EvalError::WrongCallArity {
        function: function.to_string(),
    };

    let result = match function {
        "numel" => {
            let [value] = args else { return Err(arity_error()) };
            vec![Value::Num(value.numel() as f64)]
        }
        "ndims" => {
            let [value] = args else { return Err(arity_error()) };
            vec![Value::Num(value.dims().len() as f64)]
        }
        "size" => match args {
            [value] => {
                let dims: Vec<f64> = value.dims().iter().map(|d| *d as f64).collect();
                vec![Value::Matrix(MatrixValue::row_vector(&dims))]
            }
            [value, dim] => {
                let d = dim.as_num()? as usize;
                let extent = value.dims().get(d.saturating_sub(1)).copied().unwrap_or(1);
                vec![Value::Num(extent as f64)]
            }
            _ => return Err(arity_error()),
        },
        "zeros" | "ones" => {
            let fill = if function == "zeros" { 0.0 } else { 1.0 };
            let dims: Vec<usize> = match args {
                [Value::Matrix(m)] if m.numel() != 1 => {
                    m.data.iter().map(|v| v.round().max(0.0) as usize).collect()
                }
                [value] => {
                    let n = value.as_num()?.round().max(0.0) as usize;
                    vec![n, n]
                }
                _ => args
                    .iter()
                    .map(|v| Ok(v.as_num()?.round().max(0.0) as usize))
                    .collect::<Result<_, EvalError>>()?,
            };
            let len = dims.iter().product();
            vec![Value::Matrix(MatrixValue {
                data: vec![fill; len],
                dims,
            })]
        }

        "plus" => vec![two_arg(args, arity_error, |a, b| {
            binary_elementwise(function, a, b, |x, y| x + y)
        })?],
        "minus" => vec![two_arg(args, arity_error, |a, b| {
            binary_elementwise(function, a, b, |x, y| x - y)
        })?],
        "times" => vec![two_arg(args, arity_error, |a, b| {
            binary_elementwise(function, a, b, |x, y| x * y)
        })?],
        "rdivide" => vec![two_arg(args, arity_error, |a, b| {
            binary_elementwise(function, a, b, |x, y| x / y)
        })?],
        "ldivide" => vec![two_arg(args, arity_error, |a, b| {
            binary_elementwise(function, a, b, |x, y| y / x)
        })?],
        "power" => vec![two_arg(args, arity_error, |a, b| {
            binary_elementwise(function, a, b, |x, y| x.powf(y))
        })?],
        "lt" => vec![compare(args, arity_error, |x, y| x < y)?],
        "le" => vec![compare(args, arity_error, |x, y| x <= y)?],
        "gt" => vec![compare(args, arity_error, |x, y| x > y)?],
        "ge" => vec![compare(args, arity_error, |x, y| x >= y)?],
        "eq" => vec![compare(args, arity_error, |x, y| x == y)?],
        "ne" => vec![compare(args, arity_error, |x, y| x != y)?],

        "uminus" => {
            let [value] = args else { return Err(arity_error()) };
            vec![unary_elementwise(value, |x| -x)?]
        }
        "abs" => {
            let [value] = args else { return Err(arity_error()) };
            vec![unary_elementwise(value, f64::abs)?]
        }
        "sqrt" => {
            let [value] = args else { return Err(arity_error()) };
            vec![unary_elementwise(value, f64::sqrt)?]
        }
        "floor" => {
            let [value] = args else { return Err(arity_error()) };
            vec![unary_elementwise(value, f64::floor)?]
        }

        "sum" => {
            let [value] = args else { return Err(arity_error()) };
            let m = as_matrix(value);
            if m.numel() == 0 {
                vec![Value::Num(0.0)]
            } else {
                let reduced = reduce_along(&m, first_non_singleton(&m.dims), |lane| {
                    lane.iter().sum()
                })?;
                vec![collapse(reduced)]
            }
        }
        "mean" => {
            let [value] = args else { return Err(arity_error()) };
            let m = as_matrix(value);
            if m.numel() == 0 {
                vec![Value::Num(f64::NAN)]
            } else {
                let reduced = reduce_along(&m, first_non_singleton(&m.dims), |lane| {
                    lane.iter().sum::<f64>() / lane.len() as f64
                })?;
                vec![collapse(reduced)]
            }
        }
        "dot" => {
            let [left, right] = args else { return Err(arity_error()) };
            if left.numel() != right.numel() {
                return Err(EvalError::Internal {
                    detail: "dot operands have different lengths".to_string(),
                });
            }
            let mut acc = 0.0;
            for linear in 1..=left.numel() {
                acc += left.element(linear)? * right.element(linear)?;
            }
            vec![Value::Num(acc)]
        }
        "min" => {
            let [value, empty, dim] = args else { return Err(arity_error()) };
            if empty.numel() != 0 {
                return Err(EvalError::Internal {
                    detail: "three-argument min requires an empty second argument".to_string(),
                });
            }
            let m = as_matrix(value);
            let dim = dim.as_num()?;
            if dim < 1.0 || dim.fract() != 0.0 {
                return Err(EvalError::Internal {
                    detail: format!("invalid reduction dimension {}", dim),
                });
            }
            let dim0 = dim as usize - 1;
            let values = reduce_along(&m, dim0, |lane| {
                lane.iter().copied().fold(f64::INFINITY, f64::min)
            })?;
            let indices = reduce_along(&m, dim0, |lane| {
                let mut best = 0;
                for (k, v) in lane.iter().enumerate() {
                    if *v < lane[best] {
                        best = k;
                    }
                }
                (best + 1) as f64
            })?;
            if outputs >= 2 {
                vec![Value::Matrix(values), Value::Matrix(indices)]
            } else {
                vec![Value::Matrix(values)]
            }
        }
        "cumsum" | "cumprod" => {
            let [value] = args else { return Err(arity_error()) };
            let m = as_matrix(value);
            let dim0 = first_non_singleton(&m.dims);
            let extent = m.dims.get(dim0).copied().unwrap_or(1);
            let mut out = MatrixValue::zeros(m.dims.clone());
            let product = function == "cumprod";
            let mut failure = None;
            each_lane(&m.dims, dim0, |subscripts| {
                if failure.is_some() {
                    return;
                }
                let mut acc = if product { 1.0 } else { 0.0 };
                for j in 1..=extent {
                    subscripts[dim0] = j;
                    let element = match m.get(subscripts) {
                        Ok(v) => v,
                        Err(e) => {
                            failure = Some(e);
                            return;
                        }
                    };
                    acc = if product { acc * element } else { acc + element };
                    if let Err(e) = out.set(subscripts, acc) {
                        failure = Some(e);
                        return;
                    }
                }
                subscripts[dim0] = 1;
            });
            if let Some(e) = failure {
                return Err(e);
            }
            vec![Value::Matrix(out)]
        }

        _ => {
            return Err(EvalError::UnknownFunction {
                name: function.to_string(),
            })
        }
    };

    Ok(result)
}

/// MATLAB returns plain scalars from full reductions of vectors
fn collapse(m: MatrixValue) -> Value {
    if m.numel() == 1 {
        Value::Num(m.data[0])
    } else {
        Value::Matrix(m)
    }
}

fn two_arg(
    args: &[Value],
    arity_error: impl Fn() -> EvalError,
    f: impl Fn(&Value, &Value) -> Result<Value, EvalError>,
) -> Result<Value, EvalError> {
    let [left, right] = args else { return Err(arity_error()) };
    f(left, right)
}

fn compare(
    args: &[Value],
    arity_error: impl Fn() -> EvalError,
    predicate: impl Fn(f64, f64) -> bool,
) -> Result<Value, EvalError> {
    two_arg(args, arity_error, |a, b| {
        binary_elementwise("compare", a, b, |x, y| {
            if predicate(x, y) {
                1.0
            } else {
                0.0
            }
        })
    })
}
