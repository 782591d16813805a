//! Arithmetic Evaluation
//!
//! Walks an [`ArithExpr`] tree against the variable store. All operations
//! are checked on signed 64-bit integers:
//! - overflow on any op (including unary negation of i64::MIN and
//!   i64::MIN / -1) aborts with Overflow
//! - division/modulo by zero aborts; i64::MIN % -1 yields 0
//! - ** rejects negative exponents; exponents above 62 overflow unless the
//!   base is -1, 0 or 1; 0 ** 0 is 1
//! - shift counts are clamped to 0 then masked to 0..63, so 1 << 63 is
//!   defined and equals i64::MIN
//!
//! Side effects: assignment and ++/-- write the variable store (in the
//! scope a read would find), short-circuited operands and the unselected
//! ternary branch are parsed but never evaluated, and writes to sensitive
//! names are rejected with a warning.

use crate::errors::ArithError;
use crate::shell::nameref::is_valid_name;
use crate::shell::{Scope, ShellOptions, ShellVars};

use super::parser::{
    parse, ArithExpr, AssignOp, BinaryOp, IncDecOp, UnaryOp, VarRef,
};

/// How deep variable values may recursively re-enter evaluation
/// (x=y, y=z, z=3; $((x)) is 3).
const MAX_VALUE_RECURSION: usize = 16;

/// Evaluation environment: the borrowed store plus a warning sink.
pub struct ArithEnv<'a> {
    pub vars: &'a mut ShellVars,
    pub options: ShellOptions,
    pub warnings: &'a mut Vec<String>,
    /// Nesting budget for values that re-enter evaluation; guards against
    /// self-referential values like x="(x)".
    value_depth: usize,
}

impl<'a> ArithEnv<'a> {
    pub fn new(
        vars: &'a mut ShellVars,
        options: ShellOptions,
        warnings: &'a mut Vec<String>,
    ) -> Self {
        Self {
            vars,
            options,
            warnings,
            value_depth: 0,
        }
    }
}

/// Evaluate an expression tree.
pub fn eval(expr: &ArithExpr, env: &mut ArithEnv) -> Result<i64, ArithError> {
    match expr {
        ArithExpr::Number(value) => Ok(*value),

        ArithExpr::Variable(vref) => read_var(vref, env),

        ArithExpr::Unary { op, operand } => {
            let value = eval(operand, env)?;
            match op {
                UnaryOp::Plus => Ok(value),
                UnaryOp::Minus => value.checked_neg().ok_or(ArithError::Overflow),
                UnaryOp::LogicalNot => Ok(if value == 0 { 1 } else { 0 }),
                UnaryOp::BitNot => Ok(!value),
            }
        }

        ArithExpr::IncDec { op, prefix, target } => {
            let old = read_var(target, env)?;
            let new = match op {
                IncDecOp::Inc => old.checked_add(1),
                IncDecOp::Dec => old.checked_sub(1),
            }
            .ok_or(ArithError::Overflow)?;
            write_var(target, new, env)?;
            Ok(if *prefix { new } else { old })
        }

        ArithExpr::Binary { op, left, right } => match op {
            BinaryOp::LogicalAnd => {
                if eval(left, env)? == 0 {
                    return Ok(0);
                }
                Ok(if eval(right, env)? != 0 { 1 } else { 0 })
            }
            BinaryOp::LogicalOr => {
                if eval(left, env)? != 0 {
                    return Ok(1);
                }
                Ok(if eval(right, env)? != 0 { 1 } else { 0 })
            }
            BinaryOp::Comma => {
                eval(left, env)?;
                eval(right, env)
            }
            _ => {
                let lhs = eval(left, env)?;
                let rhs = eval(right, env)?;
                apply_binary(lhs, rhs, *op)
            }
        },

        ArithExpr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            // Only the selected branch runs, so only its side effects occur.
            if eval(cond, env)? != 0 {
                eval(then, env)
            } else {
                eval(otherwise, env)
            }
        }

        ArithExpr::Assign { target, op, value } => {
            let rhs = eval(value, env)?;
            let new = match op {
                AssignOp::Assign => rhs,
                AssignOp::Add => apply_binary(read_var(target, env)?, rhs, BinaryOp::Add)?,
                AssignOp::Sub => apply_binary(read_var(target, env)?, rhs, BinaryOp::Sub)?,
                AssignOp::Mul => apply_binary(read_var(target, env)?, rhs, BinaryOp::Mul)?,
                AssignOp::Div => apply_binary(read_var(target, env)?, rhs, BinaryOp::Div)?,
                AssignOp::Mod => apply_binary(read_var(target, env)?, rhs, BinaryOp::Mod)?,
                AssignOp::Shl => apply_binary(read_var(target, env)?, rhs, BinaryOp::Shl)?,
                AssignOp::Shr => apply_binary(read_var(target, env)?, rhs, BinaryOp::Shr)?,
                AssignOp::And => apply_binary(read_var(target, env)?, rhs, BinaryOp::BitAnd)?,
                AssignOp::Or => apply_binary(read_var(target, env)?, rhs, BinaryOp::BitOr)?,
                AssignOp::Xor => apply_binary(read_var(target, env)?, rhs, BinaryOp::BitXor)?,
            };
            write_var(target, new, env)?;
            Ok(new)
        }
    }
}

/// Parse and evaluate an expression string in one step.
pub fn eval_str(input: &str, env: &mut ArithEnv) -> Result<i64, ArithError> {
    let expr = parse(input)?;
    eval(&expr, env)
}

/// Checked binary operation.
fn apply_binary(left: i64, right: i64, op: BinaryOp) -> Result<i64, ArithError> {
    match op {
        BinaryOp::Add => left.checked_add(right).ok_or(ArithError::Overflow),
        BinaryOp::Sub => left.checked_sub(right).ok_or(ArithError::Overflow),
        BinaryOp::Mul => left.checked_mul(right).ok_or(ArithError::Overflow),
        BinaryOp::Div => {
            if right == 0 {
                Err(ArithError::DivByZero)
            } else {
                left.checked_div(right).ok_or(ArithError::Overflow)
            }
        }
        BinaryOp::Mod => {
            if right == 0 {
                Err(ArithError::DivByZero)
            } else {
                // i64::MIN % -1 is 0 even though the division overflows.
                Ok(left.checked_rem(right).unwrap_or(0))
            }
        }
        BinaryOp::Pow => power(left, right),
        BinaryOp::Shl => Ok(left.wrapping_shl(shift_count(right))),
        BinaryOp::Shr => Ok(left.wrapping_shr(shift_count(right))),
        BinaryOp::Lt => Ok((left < right) as i64),
        BinaryOp::Le => Ok((left <= right) as i64),
        BinaryOp::Gt => Ok((left > right) as i64),
        BinaryOp::Ge => Ok((left >= right) as i64),
        BinaryOp::Eq => Ok((left == right) as i64),
        BinaryOp::Ne => Ok((left != right) as i64),
        BinaryOp::BitAnd => Ok(left & right),
        BinaryOp::BitXor => Ok(left ^ right),
        BinaryOp::BitOr => Ok(left | right),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::Comma => {
            unreachable!("handled with short-circuit evaluation")
        }
    }
}

/// Shift count policy: negatives clamp to 0, then the count is masked to
/// 0..63. This makes 1 << 63 defined (i64::MIN).
fn shift_count(count: i64) -> u32 {
    if count < 0 {
        0
    } else {
        (count & 63) as u32
    }
}

/// Checked exponentiation.
fn power(base: i64, exponent: i64) -> Result<i64, ArithError> {
    if exponent < 0 {
        return Err(ArithError::NegativeExponent);
    }
    match base {
        0 => return Ok(if exponent == 0 { 1 } else { 0 }),
        1 => return Ok(1),
        -1 => return Ok(if exponent % 2 == 0 { 1 } else { -1 }),
        _ => {}
    }
    if exponent > 62 {
        return Err(ArithError::Overflow);
    }
    let mut result: i64 = 1;
    for _ in 0..exponent {
        result = result.checked_mul(base).ok_or(ArithError::Overflow)?;
    }
    Ok(result)
}

/// Resolve a variable reference to its numeric value.
///
/// Lookup order is locals then globals (namerefs resolved by the store).
/// Missing or empty values read as 0. A value that is itself a name or an
/// expression re-enters evaluation, bounded by the env's value budget.
fn read_var(vref: &VarRef, env: &mut ArithEnv) -> Result<i64, ArithError> {
    let value = match read_var_text(vref, env)? {
        Some(text) => text,
        None => return Ok(0),
    };
    value_to_number(&value, env)
}

/// The raw string behind a variable reference, None when unset.
fn read_var_text(vref: &VarRef, env: &mut ArithEnv) -> Result<Option<String>, ArithError> {
    if let Some(index) = &vref.index {
        let idx = eval(index, env)?;
        if env.vars.is_assoc(&vref.name) {
            return Ok(env.vars.get_assoc(&vref.name, &idx.to_string()));
        }
        return Ok(env.vars.get_array(&vref.name, idx));
    }
    match vref.name.as_str() {
        "?" => Ok(Some(env.vars.last_exit_code().to_string())),
        "$" => Ok(Some(env.vars.shell_pid.to_string())),
        "!" => Ok(Some(env.vars.last_background_pid.to_string())),
        "#" => Ok(Some(env.vars.positional_params().len().to_string())),
        name if name.as_bytes().first().is_some_and(|b| b.is_ascii_digit()) => {
            let number: usize = name.parse().unwrap_or(0);
            Ok(env.vars.positional(number))
        }
        name => Ok(env.vars.get(name)),
    }
}

/// Convert a variable's string value to a number, recursively evaluating
/// names and expressions the way bash does (e=1+2; $((e+3)) is 6).
fn value_to_number(value: &str, env: &mut ArithEnv) -> Result<i64, ArithError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    if env.value_depth >= MAX_VALUE_RECURSION {
        return Ok(0);
    }
    env.value_depth += 1;
    let result = value_to_number_inner(trimmed, env);
    env.value_depth -= 1;
    result
}

fn value_to_number_inner(trimmed: &str, env: &mut ArithEnv) -> Result<i64, ArithError> {
    // Plain decimal literals are handled here so -9223372036854775808
    // (i64::MIN) reads back even though its magnitude alone overflows.
    // Leading-zero values fall through and re-parse as octal.
    let (digits, negative) = match trimmed.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };
    if !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !(digits.len() > 1 && digits.starts_with('0'))
    {
        let magnitude = digits
            .parse::<i128>()
            .map_err(|_| ArithError::Overflow)?;
        let signed = if negative { -magnitude } else { magnitude };
        return i64::try_from(signed).map_err(|_| ArithError::Overflow);
    }

    if is_valid_name(trimmed) {
        let vref = VarRef {
            name: trimmed.to_string(),
            index: None,
        };
        let inner = match read_var_text(&vref, env)? {
            Some(text) => text,
            None => return Ok(0),
        };
        return value_to_number(&inner, env);
    }

    // Anything else is an expression: parse and evaluate it.
    let expr = parse(trimmed)?;
    eval(&expr, env)
}

/// Store a new value through a variable reference.
///
/// Sensitive names and readonly variables are rejected with a warning; the
/// expression still yields the computed value.
fn write_var(vref: &VarRef, value: i64, env: &mut ArithEnv) -> Result<(), ArithError> {
    if !is_valid_name(&vref.name) {
        return Err(ArithError::Malformed(vref.name.clone()));
    }
    if ShellVars::is_sensitive(&vref.name) {
        env.warnings.push(format!(
            "{}: restricted: cannot assign from arithmetic",
            vref.name
        ));
        return Ok(());
    }
    let result = if let Some(index) = &vref.index {
        let idx = eval(index, env)?;
        if env.vars.is_assoc(&vref.name) {
            env.vars.set_assoc(&vref.name, &idx.to_string(), &value.to_string())
        } else {
            env.vars.set_array(&vref.name, idx, &value.to_string())
        }
    } else {
        env.vars.set(&vref.name, &value.to_string(), Scope::Visible)
    };
    if let Err(err) = result {
        env.warnings.push(err.to_string());
    }
    Ok(())
}
