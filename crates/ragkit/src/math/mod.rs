//! Arithmetic operations exposed by the math microservice, its tool catalog,
//! and a client for talking to it.

pub mod client;
pub mod tools;

pub use client::MathClient;
pub use tools::{tool_catalog, ToolSpec};

use serde::{Deserialize, Serialize};

/// Supported operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Sqrt,
    Abs,
    Factorial,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
        Operation::Power,
        Operation::Sqrt,
        Operation::Abs,
        Operation::Factorial,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
            Operation::Power => "power",
            Operation::Sqrt => "sqrt",
            Operation::Abs => "abs",
            Operation::Factorial => "factorial",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Operation {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == lower)
            .ok_or(CalcError::UnknownOperation(lower))
    }
}

/// Body of `POST /calculate`. Which operands are required depends on the operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculateRequest {
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exponent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<i64>,
}

impl CalculateRequest {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Default::default()
        }
    }

    pub fn binary(operation: impl Into<String>, a: f64, b: f64) -> Self {
        Self {
            a: Some(a),
            b: Some(b),
            ..Self::new(operation)
        }
    }
}

/// Numeric result; factorials stay integral
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MathValue {
    Int(u64),
    Float(f64),
}

impl std::fmt::Display for MathValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MathValue::Int(v) => write!(f, "{}", v),
            MathValue::Float(v) => f.write_str(&format_float(*v)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathResult {
    pub result: MathValue,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalcError {
    #[error("{0}")]
    MissingParameters(&'static str),

    #[error("Division by zero is not allowed")]
    DivisionByZero,

    #[error("Cannot calculate square root of negative number")]
    NegativeSqrt,

    #[error("Factorial is only defined for non-negative integers")]
    NegativeFactorial,

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Error executing operation: {0}")]
    Overflow(String),
}

impl CalcError {
    /// Caused by the request rather than by evaluation
    pub fn is_client_error(&self) -> bool {
        !matches!(self, CalcError::Overflow(_))
    }
}

/// Floats always carry a fractional part (`8.0`, not `8`)
fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

fn pair(
    a: Option<f64>,
    b: Option<f64>,
    missing: &'static str,
) -> Result<(f64, f64), CalcError> {
    match (a, b) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(CalcError::MissingParameters(missing)),
    }
}

fn finite(op: Operation, result: f64) -> Result<f64, CalcError> {
    if result.is_finite() {
        Ok(result)
    } else {
        Err(CalcError::Overflow(format!("{} result is not finite", op)))
    }
}

const NEED_A_B: &str = "Parameters 'a' and 'b' are required";
const NEED_BASE_EXPONENT: &str = "Parameters 'base' and 'exponent' are required";
const NEED_VALUE: &str = "Parameter 'value' is required";
const NEED_N: &str = "Parameter 'n' is required";

/// Evaluate one calculation request
pub fn evaluate(request: &CalculateRequest) -> Result<MathResult, CalcError> {
    let op: Operation = request.operation.parse()?;
    let float = |result: f64, message: String| MathResult {
        result: MathValue::Float(result),
        message,
    };

    match op {
        Operation::Add => {
            let (a, b) = pair(request.a, request.b, NEED_A_B)?;
            let r = finite(op, a + b)?;
            Ok(float(r, format!("{} + {} = {}", format_float(a), format_float(b), format_float(r))))
        },
        Operation::Subtract => {
            let (a, b) = pair(request.a, request.b, NEED_A_B)?;
            let r = finite(op, a - b)?;
            Ok(float(r, format!("{} - {} = {}", format_float(a), format_float(b), format_float(r))))
        },
        Operation::Multiply => {
            let (a, b) = pair(request.a, request.b, NEED_A_B)?;
            let r = finite(op, a * b)?;
            Ok(float(r, format!("{} × {} = {}", format_float(a), format_float(b), format_float(r))))
        },
        Operation::Divide => {
            let (a, b) = pair(request.a, request.b, NEED_A_B)?;
            if b == 0.0 {
                return Err(CalcError::DivisionByZero);
            }
            let r = finite(op, a / b)?;
            Ok(float(r, format!("{} ÷ {} = {}", format_float(a), format_float(b), format_float(r))))
        },
        Operation::Power => {
            let (base, exponent) = pair(request.base, request.exponent, NEED_BASE_EXPONENT)?;
            let r = finite(op, base.powf(exponent))?;
            Ok(float(
                r,
                format!(
                    "{} ^ {} = {}",
                    format_float(base),
                    format_float(exponent),
                    format_float(r)
                ),
            ))
        },
        Operation::Sqrt => {
            let value = request.value.ok_or(CalcError::MissingParameters(NEED_VALUE))?;
            if value < 0.0 {
                return Err(CalcError::NegativeSqrt);
            }
            let r = finite(op, value.sqrt())?;
            Ok(float(r, format!("√{} = {}", format_float(value), format_float(r))))
        },
        Operation::Abs => {
            let value = request.value.ok_or(CalcError::MissingParameters(NEED_VALUE))?;
            let r = finite(op, value.abs())?;
            Ok(float(r, format!("|{}| = {}", format_float(value), format_float(r))))
        },
        Operation::Factorial => {
            let n = request.n.ok_or(CalcError::MissingParameters(NEED_N))?;
            let n = u64::try_from(n).map_err(|_| CalcError::NegativeFactorial)?;
            let r = (1..=n)
                .try_fold(1u64, |acc, k| acc.checked_mul(k))
                .ok_or_else(|| CalcError::Overflow(format!("factorial of {} is too large", n)))?;
            Ok(MathResult {
                result: MathValue::Int(r),
                message: format!("{}! = {}", n, r),
            })
        },
    }
}
