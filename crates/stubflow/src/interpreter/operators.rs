//! Binary operators on resolved values.

use std::cmp::Ordering;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::rc::Rc;

use super::EvalError;
use crate::parser::{ArithOp, CompareOp};
use crate::types::{Node, Value};

/// `+ - * / %` on numbers, plus address arithmetic on IP strings.
pub fn arithmetic(op: ArithOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => integer_op(op, *a, *b).map(Value::Int),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (Some(a), Some(b)) = (lhs.as_float(), rhs.as_float()) else {
                return Err(operands(op, lhs, rhs));
            };
            float_op(op, a, b).map(Value::Float)
        }
        (Value::String(address), Value::Int(delta)) => {
            let Ok(ip) = address.parse::<IpAddr>() else {
                return Err(operands(op, lhs, rhs));
            };
            let delta = match op {
                ArithOp::Add => i128::from(*delta),
                ArithOp::Sub => -i128::from(*delta),
                _ => return Err(operands(op, lhs, rhs)),
            };
            offset_address(ip, delta)
                .map(|ip| Value::String(ip.to_string()))
                .ok_or_else(|| EvalError::Message(format!("address {address} out of range")))
        }
        (Value::String(a), Value::String(b)) if op == ArithOp::Sub => {
            match (a.parse::<IpAddr>(), b.parse::<IpAddr>()) {
                (Ok(a), Ok(b)) => address_distance(a, b)
                    .map(Value::Int)
                    .ok_or_else(|| operands(op, lhs, rhs)),
                _ => Err(operands(op, lhs, rhs)),
            }
        }
        _ => Err(operands(op, lhs, rhs)),
    }
}

fn operands(op: ArithOp, lhs: &Value, rhs: &Value) -> EvalError {
    EvalError::Operands {
        op: op.symbol(),
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    }
}

fn integer_op(op: ArithOp, a: i64, b: i64) -> Result<i64, EvalError> {
    if matches!(op, ArithOp::Div | ArithOp::Mod) && b == 0 {
        return Err(EvalError::DivisionByZero);
    }
    let result = match op {
        ArithOp::Add => a.checked_add(b),
        ArithOp::Sub => a.checked_sub(b),
        ArithOp::Mul => a.checked_mul(b),
        ArithOp::Div => a.checked_div(b),
        ArithOp::Mod => a.checked_rem(b),
    };
    result.ok_or(EvalError::Overflow)
}

fn float_op(op: ArithOp, a: f64, b: f64) -> Result<f64, EvalError> {
    if matches!(op, ArithOp::Div | ArithOp::Mod) && b == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    Ok(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
    })
}

fn offset_address(ip: IpAddr, delta: i128) -> Option<IpAddr> {
    match ip {
        IpAddr::V4(v4) => {
            let shifted = i128::from(u32::from(v4)).checked_add(delta)?;
            u32::try_from(shifted)
                .ok()
                .map(|bits| IpAddr::V4(Ipv4Addr::from(bits)))
        }
        IpAddr::V6(v6) => {
            let base = u128::from(v6);
            let shifted = if delta >= 0 {
                base.checked_add(delta.unsigned_abs())?
            } else {
                base.checked_sub(delta.unsigned_abs())?
            };
            Some(IpAddr::V6(Ipv6Addr::from(shifted)))
        }
    }
}

fn address_distance(a: IpAddr, b: IpAddr) -> Option<i64> {
    match (a, b) {
        (IpAddr::V4(a), IpAddr::V4(b)) => Some(i64::from(u32::from(a)) - i64::from(u32::from(b))),
        (IpAddr::V6(a), IpAddr::V6(b)) => {
            let (a, b) = (u128::from(a), u128::from(b));
            if a >= b {
                i64::try_from(a - b).ok()
            } else {
                i64::try_from(b - a).ok().map(|distance| -distance)
            }
        }
        _ => None,
    }
}

/// Juxtaposition.
pub fn concatenate(lhs: Value, rhs: Value, source: &Rc<str>) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (Value::List(_), Value::Nil) => Err(EvalError::Concatenation {
            lhs: "list",
            rhs: "nil",
        }),
        (Value::List(mut a), other) => {
            a.push(Node::new(other, source.clone()));
            Ok(Value::List(a))
        }
        (Value::Map(mut a), Value::Map(b)) => {
            a.extend(b);
            Ok(Value::Map(a))
        }
        (lhs, rhs) => match (lhs.as_text(), rhs.as_text()) {
            (Some(a), Some(b)) => Ok(Value::String(a + &b)),
            _ => Err(EvalError::Concatenation {
                lhs: lhs.type_name(),
                rhs: rhs.type_name(),
            }),
        },
    }
}

/// `== != < <= > >=`
pub fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    match op {
        CompareOp::Eq => Ok(values_equal(lhs, rhs)),
        CompareOp::Ne => Ok(!values_equal(lhs, rhs)),
        _ => {
            let ordering = order(lhs, rhs).ok_or(EvalError::Operands {
                op: op.symbol(),
                lhs: lhs.type_name(),
                rhs: rhs.type_name(),
            })?;
            Ok(match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

fn order(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            lhs.as_float()?.partial_cmp(&rhs.as_float()?)
        }
        _ => None,
    }
}

/// Deep equality with text coercion between ints, strings and booleans.
pub fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            lhs.as_float() == rhs.as_float()
        }
        (Value::String(s), Value::Int(_) | Value::Bool(_))
        | (Value::Int(_) | Value::Bool(_), Value::String(s)) => {
            let other = if matches!(lhs, Value::String(_)) { rhs } else { lhs };
            other.as_text().as_deref() == Some(s.trim())
        }
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|(x, y)| values_equal(&x.value, &y.value))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, x)| {
                    b.get(key)
                        .is_some_and(|y| values_equal(&x.value, &y.value))
                })
        }
        _ => lhs == rhs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_truncates() {
        assert_eq!(
            arithmetic(ArithOp::Div, &Value::Int(7), &Value::Int(2)),
            Ok(Value::Int(3))
        );
        assert_eq!(
            arithmetic(ArithOp::Mod, &Value::Int(7), &Value::Int(0)),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn mixed_numbers_become_floats() {
        assert_eq!(
            arithmetic(ArithOp::Mul, &Value::Int(3), &Value::Float(0.5)),
            Ok(Value::Float(1.5))
        );
    }

    #[test]
    fn address_arithmetic() {
        let ip = Value::from("10.0.0.254");
        assert_eq!(
            arithmetic(ArithOp::Add, &ip, &Value::Int(3)),
            Ok(Value::from("10.0.1.1"))
        );
        assert_eq!(
            arithmetic(ArithOp::Sub, &Value::from("10.0.1.1"), &ip),
            Ok(Value::Int(3))
        );
    }

    #[test]
    fn ipv6_distance_covers_the_whole_range() {
        assert_eq!(
            arithmetic(ArithOp::Sub, &Value::from("ff02::5"), &Value::from("ff02::1")),
            Ok(Value::Int(4))
        );
        assert_eq!(
            arithmetic(ArithOp::Sub, &Value::from("fd00::1"), &Value::from("fd00::a")),
            Ok(Value::Int(-9))
        );
        assert_eq!(
            arithmetic(ArithOp::Add, &Value::from("ff02::ffff"), &Value::Int(1)),
            Ok(Value::from("ff02::1:0"))
        );
    }

    #[test]
    fn equality_coerces_text() {
        assert!(values_equal(&Value::Int(5), &Value::from("5")));
        assert!(values_equal(&Value::from("true"), &Value::Bool(true)));
        assert!(values_equal(&Value::Int(2), &Value::Float(2.0)));
        assert!(!values_equal(&Value::Int(2), &Value::from("two")));
    }

    #[test]
    fn ordering_requires_matching_kinds() {
        assert_eq!(
            compare(CompareOp::Lt, &Value::from("a"), &Value::from("b")),
            Ok(true)
        );
        assert!(compare(CompareOp::Lt, &Value::from("a"), &Value::Int(1)).is_err());
    }
}
