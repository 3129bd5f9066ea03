//! Compile time evaluation of constant expressions.
//!
//! Used for array dimensions, attribute arguments and the optimizer's
//! constant folding. Evaluation is symbol free: anything that is not a
//! literal composition yields `None`.

use crate::ast::{BinaryOp, Expr, ExprKind, Literal, LiteralKind, UnaryOp};
use crate::type_denoter::{DataType, ScalarType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Variant {
    Bool(bool),
    Int(i64),
    Real(f64),
}

impl Variant {
    pub fn to_int(self) -> i64 {
        match self {
            Variant::Bool(b) => b as i64,
            Variant::Int(i) => i,
            Variant::Real(r) => r as i64,
        }
    }

    pub fn to_real(self) -> f64 {
        match self {
            Variant::Bool(b) => b as i64 as f64,
            Variant::Int(i) => i as f64,
            Variant::Real(r) => r,
        }
    }

    pub fn to_bool(self) -> bool {
        match self {
            Variant::Bool(b) => b,
            Variant::Int(i) => i != 0,
            Variant::Real(r) => r != 0.0,
        }
    }

    fn is_real(&self) -> bool {
        matches!(self, Variant::Real(_))
    }
}

pub fn evaluate(expr: &Expr) -> Option<Variant> {
    match &expr.kind {
        ExprKind::Literal(literal) => evaluate_literal(literal),
        ExprKind::Bracket(inner) => evaluate(inner),
        ExprKind::Sequence(exprs) => evaluate(exprs.last()?),
        ExprKind::Unary { op, operand } => {
            let value = evaluate(operand)?;
            match op {
                UnaryOp::Plus => Some(value),
                UnaryOp::Minus => Some(match value {
                    Variant::Bool(b) => Variant::Int(-(b as i64)),
                    Variant::Int(i) => Variant::Int(i.wrapping_neg()),
                    Variant::Real(r) => Variant::Real(-r),
                }),
                UnaryOp::LogicalNot => Some(Variant::Bool(!value.to_bool())),
                UnaryOp::BitNot => Some(Variant::Int(!value.to_int())),
                UnaryOp::Inc | UnaryOp::Dec => None,
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let a = evaluate(lhs)?;
            // Logical operators short-circuit.
            match op {
                BinaryOp::LogicalAnd if !a.to_bool() => return Some(Variant::Bool(false)),
                BinaryOp::LogicalOr if a.to_bool() => return Some(Variant::Bool(true)),
                _ => {}
            }
            let b = evaluate(rhs)?;
            evaluate_binary(*op, a, b)
        }
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            if evaluate(cond)?.to_bool() {
                evaluate(then_expr)
            } else {
                evaluate(else_expr)
            }
        }
        ExprKind::Cast { type_spec, operand } => {
            let value = evaluate(operand)?;
            match type_spec.ty.as_base()? {
                DataType::Scalar(ScalarType::Bool) => Some(Variant::Bool(value.to_bool())),
                DataType::Scalar(s) if s.is_integral() => Some(Variant::Int(value.to_int())),
                DataType::Scalar(_) => Some(Variant::Real(value.to_real())),
                _ => None,
            }
        }
        _ => None,
    }
}

fn evaluate_literal(literal: &Literal) -> Option<Variant> {
    match literal.kind {
        LiteralKind::Bool => Some(Variant::Bool(literal.spell == "true")),
        LiteralKind::Int => literal.int_value().map(Variant::Int),
        LiteralKind::Float => literal.float_value().map(Variant::Real),
        LiteralKind::String => None,
    }
}

fn evaluate_binary(op: BinaryOp, a: Variant, b: Variant) -> Option<Variant> {
    use BinaryOp::*;
    if op.is_logical() {
        let value = match op {
            LogicalAnd => a.to_bool() && b.to_bool(),
            _ => a.to_bool() || b.to_bool(),
        };
        return Some(Variant::Bool(value));
    }
    if op.is_comparison() {
        let value = if a.is_real() || b.is_real() {
            let (x, y) = (a.to_real(), b.to_real());
            match op {
                Equal => x == y,
                NotEqual => x != y,
                Less => x < y,
                Greater => x > y,
                LessEqual => x <= y,
                _ => x >= y,
            }
        } else {
            let (x, y) = (a.to_int(), b.to_int());
            match op {
                Equal => x == y,
                NotEqual => x != y,
                Less => x < y,
                Greater => x > y,
                LessEqual => x <= y,
                _ => x >= y,
            }
        };
        return Some(Variant::Bool(value));
    }
    if op.is_bitwise() {
        let (x, y) = (a.to_int(), b.to_int());
        let value = match op {
            BitAnd => x & y,
            BitOr => x | y,
            BitXor => x ^ y,
            ShiftLeft => x.wrapping_shl(y as u32),
            _ => x.wrapping_shr(y as u32),
        };
        return Some(Variant::Int(value));
    }
    // Arithmetic, promoting to real when either side is real.
    if a.is_real() || b.is_real() {
        let (x, y) = (a.to_real(), b.to_real());
        let value = match op {
            Add => x + y,
            Sub => x - y,
            Mul => x * y,
            Div => {
                if y == 0.0 {
                    return None;
                }
                x / y
            }
            Mod => {
                if y == 0.0 {
                    return None;
                }
                x % y
            }
            _ => return None,
        };
        Some(Variant::Real(value))
    } else {
        let (x, y) = (a.to_int(), b.to_int());
        let value = match op {
            Add => x.wrapping_add(y),
            Sub => x.wrapping_sub(y),
            Mul => x.wrapping_mul(y),
            Div => {
                if y == 0 {
                    return None;
                }
                x / y
            }
            Mod => {
                if y == 0 {
                    return None;
                }
                x % y
            }
            _ => return None,
        };
        Some(Variant::Int(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;
    use crate::ast::Stmt;

    fn eval_source(expr: &str) -> Option<Variant> {
        let source = format!("static int dummy_eval_target = {};", expr);
        let (tokens, _) = tokenize(&source, false);
        let mut parser = Parser::new(tokens, None);
        let program = parser.parse_program().expect("parse failed");
        let Stmt::VarDecls(stmt) = &program.global_stmts[0] else {
            panic!("expected var decl");
        };
        evaluate(stmt.var_decls[0].initializer.as_ref().unwrap())
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(eval_source("(1 + 2) * 3"), Some(Variant::Int(9)));
        assert_eq!(eval_source("7 / 2"), Some(Variant::Int(3)));
        assert_eq!(eval_source("1 << 4"), Some(Variant::Int(16)));
    }

    #[test]
    fn test_real_promotion() {
        assert_eq!(eval_source("1 + 0.5"), Some(Variant::Real(1.5)));
        assert_eq!(eval_source("(float)3"), Some(Variant::Real(3.0)));
    }

    #[test]
    fn test_comparison_and_ternary() {
        assert_eq!(eval_source("1 < 2 ? 10 : 20"), Some(Variant::Int(10)));
        assert_eq!(eval_source("!0"), Some(Variant::Bool(true)));
    }

    #[test]
    fn test_division_by_zero_not_constant() {
        assert_eq!(eval_source("1 / 0"), None);
    }

    #[test]
    fn test_non_constant_yields_none() {
        assert_eq!(eval_source("some_variable + 1"), None);
    }

    #[test]
    fn test_logical_short_circuit_ignores_non_constant() {
        assert_eq!(eval_source("0 && unknown_name"), Some(Variant::Bool(false)));
        assert_eq!(eval_source("1 || unknown_name"), Some(Variant::Bool(true)));
    }
}
