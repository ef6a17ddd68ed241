//! Arithmetic and relational operators. Integer/float mixing promotes
//! to float, matching `examples/original_source/src/builtin/math.c`.

use joy_core::{Context, Heap, JoyError, JoyResult, Payload, Tag};

use crate::dispatch::PrimTable;

pub(crate) fn register(table: &mut PrimTable, symtab: &mut joy_core::SymbolTable) {
    table.register(symtab, "+", add);
    table.register(symtab, "-", sub);
    table.register(symtab, "*", mul);
    table.register(symtab, "/", div);
    table.register(symtab, "rem", rem);
    table.register(symtab, "neg", neg);
    table.register(symtab, "abs", abs);
    table.register(symtab, "min", min);
    table.register(symtab, "max", max);
    table.register(symtab, "and", and);
    table.register(symtab, "or", or);
    table.register(symtab, "not", not);
    table.register(symtab, "=", eq);
    table.register(symtab, "<>", ne);
    table.register(symtab, "<", lt);
    table.register(symtab, ">", gt);
    table.register(symtab, "<=", le);
    table.register(symtab, ">=", ge);
}

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

fn as_num(payload: &Payload, who: &str) -> JoyResult<Num> {
    match payload {
        Payload::Int(v) => Ok(Num::Int(*v)),
        Payload::Float(v) => Ok(Num::Float(*v)),
        Payload::Char(c) => Ok(Num::Int(*c as i64)),
        _ => Err(JoyError::type_error(format!("{who}: expected a number"))),
    }
}

fn push_num(ctx: &mut Context, n: Num) -> JoyResult<()> {
    match n {
        Num::Int(v) => ctx.push(Tag::Integer, Payload::Int(v)),
        Num::Float(v) => ctx.push(Tag::Float, Payload::Float(v)),
    }
}

fn binary_numeric(
    ctx: &mut Context,
    who: &'static str,
    int_op: fn(i64, i64) -> JoyResult<i64>,
    float_op: fn(f64, f64) -> f64,
) -> JoyResult<()> {
    let rhs = ctx.pop_for(who)?;
    let lhs = ctx.pop_for(who)?;
    let a = as_num(&lhs.payload, who)?;
    let b = as_num(&rhs.payload, who)?;
    let result = match (a, b) {
        (Num::Int(x), Num::Int(y)) => Num::Int(int_op(x, y)?),
        (Num::Int(x), Num::Float(y)) => Num::Float(float_op(x as f64, y)),
        (Num::Float(x), Num::Int(y)) => Num::Float(float_op(x, y as f64)),
        (Num::Float(x), Num::Float(y)) => Num::Float(float_op(x, y)),
    };
    push_num(ctx, result)
}

fn add(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    binary_numeric(ctx, "+", |x, y| Ok(x.wrapping_add(y)), |x, y| x + y)
}

fn sub(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    binary_numeric(ctx, "-", |x, y| Ok(x.wrapping_sub(y)), |x, y| x - y)
}

fn mul(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    binary_numeric(ctx, "*", |x, y| Ok(x.wrapping_mul(y)), |x, y| x * y)
}

fn div(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    binary_numeric(
        ctx,
        "/",
        |x, y| {
            if y == 0 {
                Err(JoyError::runtime("/: division by zero"))
            } else {
                Ok(x.div_euclid(y))
            }
        },
        |x, y| x / y,
    )
}

fn rem(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    binary_numeric(
        ctx,
        "rem",
        |x, y| {
            if y == 0 {
                Err(JoyError::runtime("rem: division by zero"))
            } else {
                Ok(x.rem_euclid(y))
            }
        },
        |x, y| x % y,
    )
}

fn neg(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let top = ctx.pop_for("neg")?;
    match as_num(&top.payload, "neg")? {
        Num::Int(v) => ctx.push(Tag::Integer, Payload::Int(-v)),
        Num::Float(v) => ctx.push(Tag::Float, Payload::Float(-v)),
    }
}

fn abs(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let top = ctx.pop_for("abs")?;
    match as_num(&top.payload, "abs")? {
        Num::Int(v) => ctx.push(Tag::Integer, Payload::Int(v.abs())),
        Num::Float(v) => ctx.push(Tag::Float, Payload::Float(v.abs())),
    }
}

fn min(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    binary_numeric(ctx, "min", |x, y| Ok(x.min(y)), f64::min)
}

fn max(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    binary_numeric(ctx, "max", |x, y| Ok(x.max(y)), f64::max)
}

fn as_bool(payload: &Payload, who: &str) -> JoyResult<bool> {
    match payload {
        Payload::Bool(b) => Ok(*b),
        _ => Err(JoyError::type_error(format!("{who}: expected a boolean"))),
    }
}

fn and(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let rhs = ctx.pop_for("and")?;
    let lhs = ctx.pop_for("and")?;
    match (&lhs.payload, &rhs.payload) {
        (Payload::Set(a), Payload::Set(b)) => ctx.push(Tag::Set, Payload::Set(a & b)),
        _ => {
            let a = as_bool(&lhs.payload, "and")?;
            let b = as_bool(&rhs.payload, "and")?;
            ctx.push(Tag::Boolean, Payload::Bool(a && b))
        }
    }
}

fn or(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let rhs = ctx.pop_for("or")?;
    let lhs = ctx.pop_for("or")?;
    match (&lhs.payload, &rhs.payload) {
        (Payload::Set(a), Payload::Set(b)) => ctx.push(Tag::Set, Payload::Set(a | b)),
        _ => {
            let a = as_bool(&lhs.payload, "or")?;
            let b = as_bool(&rhs.payload, "or")?;
            ctx.push(Tag::Boolean, Payload::Bool(a || b))
        }
    }
}

fn not(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let top = ctx.pop_for("not")?;
    match top.payload {
        Payload::Set(s) => ctx.push(Tag::Set, Payload::Set(!s)),
        other => {
            let b = as_bool(&other, "not")?;
            ctx.push(Tag::Boolean, Payload::Bool(!b))
        }
    }
}

fn numeric_cmp(lhs: &Payload, rhs: &Payload, who: &str) -> JoyResult<std::cmp::Ordering> {
    let a = as_num(lhs, who)?;
    let b = as_num(rhs, who)?;
    Ok(match (a, b) {
        (Num::Int(x), Num::Int(y)) => x.cmp(&y),
        (Num::Int(x), Num::Float(y)) => (x as f64).partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        (Num::Float(x), Num::Int(y)) => x.partial_cmp(&(y as f64)).unwrap_or(std::cmp::Ordering::Equal),
        (Num::Float(x), Num::Float(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
    })
}

fn eq(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let rhs = ctx.pop_for("=")?;
    let lhs = ctx.pop_for("=")?;
    let result = values_equal(&lhs.payload, &rhs.payload);
    ctx.push(Tag::Boolean, Payload::Bool(result))
}

fn ne(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let rhs = ctx.pop_for("<>")?;
    let lhs = ctx.pop_for("<>")?;
    let result = !values_equal(&lhs.payload, &rhs.payload);
    ctx.push(Tag::Boolean, Payload::Bool(result))
}

fn values_equal(a: &Payload, b: &Payload) -> bool {
    match (a, b) {
        (Payload::Int(x), Payload::Int(y)) => x == y,
        (Payload::Float(x), Payload::Float(y)) => x == y,
        (Payload::Int(x), Payload::Float(y)) | (Payload::Float(y), Payload::Int(x)) => *x as f64 == *y,
        (Payload::Bool(x), Payload::Bool(y)) => x == y,
        (Payload::Char(x), Payload::Char(y)) => x == y,
        (Payload::Str(x), Payload::Str(y)) => x == y,
        (Payload::Set(x), Payload::Set(y)) => x == y,
        _ => false,
    }
}

fn lt(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let rhs = ctx.pop_for("<")?;
    let lhs = ctx.pop_for("<")?;
    let ord = numeric_cmp(&lhs.payload, &rhs.payload, "<")?;
    ctx.push(Tag::Boolean, Payload::Bool(ord == std::cmp::Ordering::Less))
}

fn gt(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let rhs = ctx.pop_for(">")?;
    let lhs = ctx.pop_for(">")?;
    let ord = numeric_cmp(&lhs.payload, &rhs.payload, ">")?;
    ctx.push(Tag::Boolean, Payload::Bool(ord == std::cmp::Ordering::Greater))
}

fn le(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let rhs = ctx.pop_for("<=")?;
    let lhs = ctx.pop_for("<=")?;
    let ord = numeric_cmp(&lhs.payload, &rhs.payload, "<=")?;
    ctx.push(Tag::Boolean, Payload::Bool(ord != std::cmp::Ordering::Greater))
}

fn ge(ctx: &mut Context, _p: Option<&Heap>, _t: &PrimTable) -> JoyResult<()> {
    let rhs = ctx.pop_for(">=")?;
    let lhs = ctx.pop_for(">=")?;
    let ord = numeric_cmp(&lhs.payload, &rhs.payload, ">=")?;
    ctx.push(Tag::Boolean, Payload::Bool(ord != std::cmp::Ordering::Less))
}

#[cfg(test)]
mod tests {
    use super::*;
    use joy_core::JoyConfig;

    fn ctx_with_table() -> (Context, PrimTable) {
        let mut ctx = Context::new(JoyConfig::default());
        let table = PrimTable::new(&mut ctx.symtab);
        (ctx, table)
    }

    fn run(ctx: &mut Context, table: &PrimTable, name: &str) {
        let id = table.id_by_name(&ctx.symtab, name).unwrap();
        table.invoke(ctx, None, id).unwrap();
    }

    #[test]
    fn one_plus_two_is_three() {
        let (mut ctx, table) = ctx_with_table();
        ctx.push(Tag::Integer, Payload::Int(1)).unwrap();
        ctx.push(Tag::Integer, Payload::Int(2)).unwrap();
        run(&mut ctx, &table, "+");
        match ctx.pop().unwrap().payload {
            Payload::Int(v) => assert_eq!(v, 3),
            _ => panic!("expected integer"),
        }
    }

    #[test]
    fn mixed_int_float_promotes_to_float() {
        let (mut ctx, table) = ctx_with_table();
        ctx.push(Tag::Integer, Payload::Int(1)).unwrap();
        ctx.push(Tag::Float, Payload::Float(0.5)).unwrap();
        run(&mut ctx, &table, "+");
        match ctx.pop().unwrap().payload {
            Payload::Float(v) => assert!((v - 1.5).abs() < f64::EPSILON),
            _ => panic!("expected float"),
        }
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let (mut ctx, table) = ctx_with_table();
        ctx.push(Tag::Integer, Payload::Int(1)).unwrap();
        ctx.push(Tag::Integer, Payload::Int(0)).unwrap();
        let id = table.id_by_name(&ctx.symtab, "/").unwrap();
        let err = table.invoke(&mut ctx, None, id).unwrap_err();
        assert_eq!(err.kind, joy_core::JoyErrorKind::Runtime);
    }

    #[test]
    fn empty_stack_plus_reports_underflow() {
        let (mut ctx, table) = ctx_with_table();
        let id = table.id_by_name(&ctx.symtab, "+").unwrap();
        let err = table.invoke(&mut ctx, None, id).unwrap_err();
        assert_eq!(err.kind, joy_core::JoyErrorKind::StackUnderflow);
        assert!(err.message.contains('+'), "expected the message to name `+`, got {:?}", err.message);
    }
}
