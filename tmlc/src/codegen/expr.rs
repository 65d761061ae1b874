//! Expression and statement lowering (§4.7): the two-return protocol
//! (every `gen_expr` returns the operand holding its value and records the
//! value's semantic type on `emitter.last_semantic_type`), terminator
//! bookkeeping (`emitter.block_terminated`, Invariant B), and loop/`when`
//! desugaring onto basic blocks.

use crate::ast::{
    AssignExpr, BinaryExpr, BinaryOperator, Block, CallExpr, Expression, FieldAccessExpr, LiteralValue, MethodCallExpr,
    Statement, UnaryExpr, UnaryOperator,
};
use crate::types::{Substitution, Type};

use super::mangle::{mangle_func_name, mangle_struct_name};
use super::types::{approx_byte_size, llvm_type_from_semantic};
use super::Emitter;

fn llvm(emitter: &Emitter, ty: &Type, for_data: bool) -> String {
    llvm_type_from_semantic(ty, emitter.env, for_data)
}

/// Lowers a block's statements then its trailing expression, if any.
/// Returns the trailing value's type and operand — `(Unit, None)` for a
/// block with no trailing expression.
pub fn gen_block(emitter: &mut Emitter, block: &Block<Type>, subst: &Substitution) -> (Type, Option<String>) {
    for stmt in &block.statements {
        if emitter.block_terminated {
            break;
        }
        gen_statement(emitter, stmt, subst);
    }
    if emitter.block_terminated {
        return (Type::Unit, None);
    }
    match &block.trailing {
        Some(expr) => {
            let val = gen_expr(emitter, expr, subst);
            (emitter.last_semantic_type.clone(), Some(val))
        }
        None => (Type::Unit, None),
    }
}

fn gen_statement(emitter: &mut Emitter, stmt: &Statement<Type>, subst: &Substitution) {
    match stmt {
        Statement::Let(s) => gen_binding(emitter, &s.pattern, &s.value, subst),
        Statement::Var(s) => gen_binding(emitter, &s.pattern, &s.value, subst),
        Statement::Expression(s) => {
            gen_expr(emitter, &s.expression, subst);
        }
        // Declarations nested inside a function body (a local helper
        // function or type) are out of scope for this lowering pass; the
        // surface language rarely uses them and the module-level
        // declaration pass does not see into statement bodies to find them.
        Statement::Declaration(_) => {}
    }
}

/// Binds a `let`/`var` pattern. Only the common case — a single
/// irrefutable identifier pattern — gets a named stack slot; any other
/// pattern shape still evaluates its initializer (for side effects and
/// terminator correctness) but its destructured bindings are not emitted,
/// since that needs the `when`-style pattern-to-condition lowering this
/// pass doesn't yet perform for `let`.
fn gen_binding(emitter: &mut Emitter, pattern: &crate::ast::Pattern<Type>, value: &Expression<Type>, subst: &Substitution) {
    let val = gen_expr(emitter, value, subst);
    if let crate::ast::Pattern::Identifier { name, .. } = pattern {
        let ty = llvm(emitter, &emitter.last_semantic_type.clone(), true);
        let slot = format!("%{name}.addr.{}", emitter.fresh_reg().trim_start_matches('%'));
        emitter.functions.push_str(&format!("  {slot} = alloca {ty}\n"));
        emitter.functions.push_str(&format!("  store {ty} {val}, ptr {slot}\n"));
        emitter.bind_local(name.clone(), slot);
    }
}

pub fn gen_expr(emitter: &mut Emitter, expr: &Expression<Type>, subst: &Substitution) -> String {
    match expr {
        Expression::Literal { value, info, .. } => {
            emitter.last_semantic_type = subst.apply(info);
            gen_literal(emitter, value)
        }
        Expression::Identifier { name, info, .. } => {
            emitter.last_semantic_type = subst.apply(info);
            if emitter.lookup_local(name).is_none() {
                if let Type::Named { name: enum_name, args, .. } = emitter.last_semantic_type.clone() {
                    if let Some(variant) = emitter.env.enums.get(&enum_name).and_then(|e| e.variant(name)).cloned() {
                        return gen_enum_construction(emitter, &enum_name, &args, &variant, &[], subst);
                    }
                }
            }
            gen_identifier_load(emitter, name, &emitter.last_semantic_type.clone())
        }
        Expression::Path { segments, info, .. } => {
            emitter.last_semantic_type = subst.apply(info);
            segments.last().cloned().unwrap_or_default()
        }
        Expression::Binary(b) => gen_binary(emitter, b, subst),
        Expression::Unary(u) => gen_unary(emitter, u, subst),
        Expression::Assign(a) => gen_assign(emitter, a, subst),
        Expression::Call(c) => gen_call(emitter, c, subst),
        Expression::MethodCall(m) => gen_method_call(emitter, m, subst),
        Expression::FieldAccess(f) => gen_field_access(emitter, f, subst),
        Expression::Index(i) => {
            let base = gen_expr(emitter, &i.base, subst);
            let _ = gen_expr(emitter, &i.index, subst);
            emitter.last_semantic_type = subst.apply(&i.info);
            base
        }
        Expression::Tuple { elements, info, .. } => {
            let vals: Vec<String> = elements.iter().map(|e| gen_expr(emitter, e, subst)).collect();
            emitter.last_semantic_type = subst.apply(info);
            let ty = llvm(emitter, &emitter.last_semantic_type.clone(), true);
            let mut agg = "undef".to_string();
            for (idx, v) in vals.iter().enumerate() {
                let next = emitter.fresh_reg();
                emitter
                    .functions
                    .push_str(&format!("  {next} = insertvalue {ty} {agg}, {v}, {idx}\n"));
                agg = next;
            }
            agg
        }
        Expression::ArrayLiteral { elements, info, .. } => {
            for e in elements {
                gen_expr(emitter, e, subst);
            }
            emitter.last_semantic_type = subst.apply(info);
            "undef".to_string()
        }
        Expression::Block(b) => {
            emitter.push_scope();
            let (ty, val) = gen_block(emitter, b, subst);
            emitter.pop_scope();
            emitter.last_semantic_type = ty;
            val.unwrap_or_else(|| "undef".to_string())
        }
        Expression::If(e) => gen_if(emitter, e, subst),
        Expression::IfLet(e) => gen_if_let(emitter, e, subst),
        Expression::When(e) => gen_when(emitter, e, subst),
        Expression::Loop(e) => gen_loop(emitter, e, subst),
        Expression::While(e) => gen_while(emitter, e, subst),
        Expression::For(e) => gen_for(emitter, e, subst),
        Expression::Return(e) => {
            match &e.value {
                Some(v) => {
                    let val = gen_expr(emitter, v, subst);
                    let ty = llvm(emitter, &emitter.last_semantic_type.clone(), false);
                    emitter.functions.push_str(&format!("  ret {ty} {val}\n"));
                }
                None => emitter.functions.push_str("  ret void\n"),
            }
            emitter.block_terminated = true;
            emitter.last_semantic_type = Type::Never;
            "undef".to_string()
        }
        Expression::Throw(e) => {
            let val = gen_expr(emitter, &e.value, subst);
            emitter
                .functions
                .push_str(&format!("  call void @tml_panic(ptr {val})\n"));
            emitter.declared_externs.insert("tml_panic".to_string());
            emitter.functions.push_str("  unreachable\n");
            emitter.block_terminated = true;
            emitter.last_semantic_type = Type::Never;
            "undef".to_string()
        }
        Expression::Break(e) => {
            if let Some((_, after)) = emitter.loop_target(&e.label).map(|(h, a)| (h.to_string(), a.to_string())) {
                if let Some(v) = &e.value {
                    gen_expr(emitter, v, subst);
                }
                emitter.functions.push_str(&format!("  br label %{after}\n"));
                emitter.block_terminated = true;
            }
            emitter.last_semantic_type = Type::Never;
            "undef".to_string()
        }
        Expression::Continue { label, .. } => {
            if let Some((header, _)) = emitter.loop_target(label).map(|(h, a)| (h.to_string(), a.to_string())) {
                emitter.functions.push_str(&format!("  br label %{header}\n"));
                emitter.block_terminated = true;
            }
            emitter.last_semantic_type = Type::Never;
            "undef".to_string()
        }
        Expression::Closure(c) => {
            // A closure lowers to a top-level private function plus a
            // `{fn-ptr, env-ptr}` fat pointer; without free-variable capture
            // analysis in this pass, the environment pointer is always
            // null, which is only sound for closures that capture nothing.
            let fn_name = format!("tml_closure_{}", emitter.fresh_reg().trim_start_matches('%'));
            let ret_ty = llvm(emitter, &c.body.get_info(), false);
            let params = c
                .params
                .iter()
                .map(|p| format!("{} %{}", llvm(emitter, &p.info, true), p.name))
                .collect::<Vec<_>>()
                .join(", ");
            let saved = std::mem::take(&mut emitter.functions);
            emitter.functions.push_str(&format!("define internal {ret_ty} @{fn_name}({params}) #0 {{\n"));
            emitter.functions.push_str("entry:\n");
            emitter.push_scope();
            for p in &c.params {
                emitter.bind_local(p.name.clone(), format!("%{}", p.name));
            }
            let was_terminated = emitter.block_terminated;
            emitter.block_terminated = false;
            let val = gen_expr(emitter, &c.body, subst);
            if !emitter.block_terminated {
                emitter.functions.push_str(&format!("  ret {ret_ty} {val}\n"));
            }
            emitter.block_terminated = was_terminated;
            emitter.pop_scope();
            emitter.functions.push_str("}\n");
            let body_ir = std::mem::replace(&mut emitter.functions, saved);
            emitter.functions.push_str(&body_ir);
            emitter.last_semantic_type = c.body.get_info();
            format!("{{ ptr @{fn_name}, ptr null }}")
        }
        Expression::StructLiteral(s) => {
            for (_, value) in &s.fields {
                gen_expr(emitter, value, subst);
            }
            if let Some(spread) = &s.spread {
                gen_expr(emitter, spread, subst);
            }
            emitter.last_semantic_type = subst.apply(&s.info);
            "undef".to_string()
        }
        Expression::LowLevelBlock(b) => {
            emitter.push_scope();
            let (ty, val) = gen_block(emitter, b, subst);
            emitter.pop_scope();
            emitter.last_semantic_type = ty;
            val.unwrap_or_else(|| "undef".to_string())
        }
        Expression::BaseAccess { info, .. } => {
            emitter.last_semantic_type = subst.apply(info);
            "undef".to_string()
        }
        Expression::InterpolatedString { fragments, info, .. } | Expression::TemplateLiteral { fragments, info, .. } => {
            for frag in fragments {
                if let crate::ast::InterpolationFragment::Expr(e) = frag {
                    gen_expr(emitter, e, subst);
                }
            }
            emitter.last_semantic_type = subst.apply(info);
            let interned = emitter.intern_string("");
            interned
        }
        Expression::Cast(c) => {
            let val = gen_expr(emitter, &c.expr, subst);
            let from_ty = emitter.last_semantic_type.clone();
            let to_ty = subst.apply(&c.info);
            let result = gen_numeric_cast(emitter, &val, &from_ty, &to_ty);
            emitter.last_semantic_type = to_ty;
            result
        }
        Expression::Try(inner) => {
            let val = gen_expr(emitter, inner, subst);
            emitter.last_semantic_type = inner.get_info();
            val
        }
        Expression::Await(inner) => gen_expr(emitter, inner, subst),
        Expression::Range(r) => {
            if let Some(start) = &r.start {
                gen_expr(emitter, start, subst);
            }
            if let Some(end) = &r.end {
                gen_expr(emitter, end, subst);
            }
            emitter.last_semantic_type = subst.apply(&r.info);
            "undef".to_string()
        }
        Expression::Parens(inner) => gen_expr(emitter, inner, subst),
    }
}

fn gen_literal(emitter: &mut Emitter, value: &LiteralValue) -> String {
    match value {
        LiteralValue::Int { value, .. } => value.to_string(),
        LiteralValue::Float { value, .. } => format!("{value:e}"),
        LiteralValue::Bool(b) => if *b { "1".to_string() } else { "0".to_string() },
        LiteralValue::Char(c) => (*c as u32).to_string(),
        LiteralValue::Str(s) => emitter.intern_string(s),
        LiteralValue::Null => "null".to_string(),
    }
}

fn gen_identifier_load(emitter: &mut Emitter, name: &str, ty: &Type) -> String {
    if let Some(slot) = emitter.lookup_local(name) {
        let llvm_ty = llvm(emitter, ty, true);
        let reg = emitter.fresh_reg();
        emitter.functions.push_str(&format!("  {reg} = load {llvm_ty}, ptr {slot}\n"));
        return reg;
    }
    if emitter.env.constants.contains_key(name) {
        let llvm_ty = llvm(emitter, ty, true);
        let reg = emitter.fresh_reg();
        emitter
            .functions
            .push_str(&format!("  {reg} = load {llvm_ty}, ptr @{name}\n"));
        return reg;
    }
    format!("@{name}")
}

fn gen_binary(emitter: &mut Emitter, b: &BinaryExpr<Type>, subst: &Substitution) -> String {
    if matches!(b.operator, BinaryOperator::And | BinaryOperator::Or) {
        return gen_short_circuit(emitter, b, subst);
    }
    let lhs = gen_expr(emitter, &b.left, subst);
    let lhs_ty = emitter.last_semantic_type.clone();
    let rhs = gen_expr(emitter, &b.right, subst);
    emitter.last_semantic_type = subst.apply(&b.info);

    let llvm_ty = llvm(emitter, &lhs_ty, true);
    let is_float = matches!(lhs_ty, Type::Float(_));
    let signed = matches!(lhs_ty, Type::Int { signed: true, .. });

    let op = if b.operator.is_comparison() {
        let pred = comparison_predicate(b.operator, is_float, signed);
        let instr = if is_float { "fcmp" } else { "icmp" };
        let reg = emitter.fresh_reg();
        emitter
            .functions
            .push_str(&format!("  {reg} = {instr} {pred} {llvm_ty} {lhs}, {rhs}\n"));
        return reg;
    } else {
        arithmetic_opcode(b.operator, is_float, signed)
    };

    let reg = emitter.fresh_reg();
    emitter
        .functions
        .push_str(&format!("  {reg} = {op} {llvm_ty} {lhs}, {rhs}\n"));
    reg
}

fn comparison_predicate(op: BinaryOperator, is_float: bool, signed: bool) -> &'static str {
    use BinaryOperator::*;
    if is_float {
        return match op {
            Eq => "oeq",
            NotEq => "one",
            Lt => "olt",
            Gt => "ogt",
            LtEq => "ole",
            GtEq => "oge",
            _ => unreachable!(),
        };
    }
    match op {
        Eq => "eq",
        NotEq => "ne",
        Lt => if signed { "slt" } else { "ult" },
        Gt => if signed { "sgt" } else { "ugt" },
        LtEq => if signed { "sle" } else { "ule" },
        GtEq => if signed { "sge" } else { "uge" },
        _ => unreachable!(),
    }
}

fn arithmetic_opcode(op: BinaryOperator, is_float: bool, signed: bool) -> &'static str {
    use BinaryOperator::*;
    match op {
        Add => if is_float { "fadd" } else { "add" },
        Sub => if is_float { "fsub" } else { "sub" },
        Mul => if is_float { "fmul" } else { "mul" },
        Div => if is_float { "fdiv" } else if signed { "sdiv" } else { "udiv" },
        Rem => if is_float { "frem" } else if signed { "srem" } else { "urem" },
        BitAnd => "and",
        BitOr => "or",
        BitXor => "xor",
        Shl => "shl",
        Shr => if signed { "ashr" } else { "lshr" },
        And | Or | Eq | NotEq | Lt | Gt | LtEq | GtEq => unreachable!(),
    }
}

fn gen_short_circuit(emitter: &mut Emitter, b: &BinaryExpr<Type>, subst: &Substitution) -> String {
    let is_and = matches!(b.operator, BinaryOperator::And);
    let lhs = gen_expr(emitter, &b.left, subst);
    let rhs_label = emitter.fresh_label("sc.rhs");
    let merge_label = emitter.fresh_label("sc.merge");
    let entry_label = emitter.fresh_label("sc.entry");
    emitter.functions.push_str(&format!("  br label %{entry_label}\n"));
    emitter.functions.push_str(&format!("{entry_label}:\n"));
    if is_and {
        emitter
            .functions
            .push_str(&format!("  br i1 {lhs}, label %{rhs_label}, label %{merge_label}\n"));
    } else {
        emitter
            .functions
            .push_str(&format!("  br i1 {lhs}, label %{merge_label}, label %{rhs_label}\n"));
    }
    emitter.functions.push_str(&format!("{rhs_label}:\n"));
    let rhs = gen_expr(emitter, &b.right, subst);
    emitter.functions.push_str(&format!("  br label %{merge_label}\n"));
    emitter.functions.push_str(&format!("{merge_label}:\n"));
    let result = emitter.fresh_reg();
    emitter.functions.push_str(&format!(
        "  {result} = phi i1 [ {lhs}, %{entry_label} ], [ {rhs}, %{rhs_label} ]\n"
    ));
    emitter.last_semantic_type = subst.apply(&b.info);
    result
}

fn gen_unary(emitter: &mut Emitter, u: &UnaryExpr<Type>, subst: &Substitution) -> String {
    match u.operator {
        UnaryOperator::Ref | UnaryOperator::RefMut => {
            let addr = gen_lvalue_addr(emitter, &u.operand, subst);
            emitter.last_semantic_type = subst.apply(&u.info);
            addr
        }
        UnaryOperator::Deref => {
            let ptr = gen_expr(emitter, &u.operand, subst);
            emitter.last_semantic_type = subst.apply(&u.info);
            let ty = llvm(emitter, &emitter.last_semantic_type.clone(), true);
            let reg = emitter.fresh_reg();
            emitter.functions.push_str(&format!("  {reg} = load {ty}, ptr {ptr}\n"));
            reg
        }
        UnaryOperator::Neg => {
            let val = gen_expr(emitter, &u.operand, subst);
            let ty = emitter.last_semantic_type.clone();
            emitter.last_semantic_type = subst.apply(&u.info);
            let llvm_ty = llvm(emitter, &ty, true);
            let reg = emitter.fresh_reg();
            if matches!(ty, Type::Float(_)) {
                emitter.functions.push_str(&format!("  {reg} = fneg {llvm_ty} {val}\n"));
            } else {
                emitter.functions.push_str(&format!("  {reg} = sub {llvm_ty} 0, {val}\n"));
            }
            reg
        }
        UnaryOperator::Not => {
            let val = gen_expr(emitter, &u.operand, subst);
            emitter.last_semantic_type = subst.apply(&u.info);
            let reg = emitter.fresh_reg();
            emitter.functions.push_str(&format!("  {reg} = xor i1 {val}, 1\n"));
            reg
        }
        UnaryOperator::BitNot => {
            let val = gen_expr(emitter, &u.operand, subst);
            let ty = emitter.last_semantic_type.clone();
            emitter.last_semantic_type = subst.apply(&u.info);
            let llvm_ty = llvm(emitter, &ty, true);
            let reg = emitter.fresh_reg();
            emitter.functions.push_str(&format!("  {reg} = xor {llvm_ty} {val}, -1\n"));
            reg
        }
    }
}

/// The address of an lvalue expression, for `&`/`&mut` and assignment
/// targets — only the shapes `is_lvalue` in the checker accepts.
fn gen_lvalue_addr(emitter: &mut Emitter, expr: &Expression<Type>, subst: &Substitution) -> String {
    match expr.unwrap_parens() {
        Expression::Identifier { name, .. } => emitter.lookup_local(name).unwrap_or_else(|| format!("@{name}")),
        Expression::FieldAccess(f) => {
            let base_ty = subst.apply(&f.base.get_info());
            let base_addr = gen_lvalue_addr(emitter, &f.base, subst);
            let reg = emitter.fresh_reg();
            match field_slot(emitter, &base_ty, &f.field) {
                Some((struct_ty, idx)) => {
                    emitter.functions.push_str(&format!(
                        "  {reg} = getelementptr inbounds {struct_ty}, ptr {base_addr}, i32 0, i32 {idx}\n"
                    ));
                }
                None => {
                    emitter
                        .functions
                        .push_str(&format!("  {reg} = getelementptr inbounds i8, ptr {base_addr}, i32 0\n"));
                }
            }
            reg
        }
        Expression::Index(i) => {
            let base_addr = gen_lvalue_addr(emitter, &i.base, subst);
            let index = gen_expr(emitter, &i.index, subst);
            let reg = emitter.fresh_reg();
            emitter
                .functions
                .push_str(&format!("  {reg} = getelementptr inbounds i8, ptr {base_addr}, i64 {index}\n"));
            reg
        }
        Expression::Unary(u) if matches!(u.operator, UnaryOperator::Deref) => gen_expr(emitter, &u.operand, subst),
        other => gen_expr(emitter, other, subst),
    }
}

fn gen_assign(emitter: &mut Emitter, a: &AssignExpr<Type>, subst: &Substitution) -> String {
    let addr = gen_lvalue_addr(emitter, &a.target, subst);
    let rhs = gen_expr(emitter, &a.value, subst);
    let ty = subst.apply(&a.info);
    let llvm_ty = llvm(emitter, &ty, true);

    let value_to_store = if let Some(op) = a.op {
        let current = emitter.fresh_reg();
        emitter
            .functions
            .push_str(&format!("  {current} = load {llvm_ty}, ptr {addr}\n"));
        let signed = matches!(ty, Type::Int { signed: true, .. });
        let opcode = arithmetic_opcode(op, matches!(ty, Type::Float(_)), signed);
        let result = emitter.fresh_reg();
        emitter
            .functions
            .push_str(&format!("  {result} = {opcode} {llvm_ty} {current}, {rhs}\n"));
        result
    } else {
        rhs
    };

    emitter
        .functions
        .push_str(&format!("  store {llvm_ty} {value_to_store}, ptr {addr}\n"));
    emitter.last_semantic_type = Type::Unit;
    "undef".to_string()
}

fn gen_call(emitter: &mut Emitter, c: &CallExpr<Type>, subst: &Substitution) -> String {
    if let Expression::Identifier { name, .. } = c.callee.unwrap_parens() {
        let ret_ty = subst.apply(&c.info);
        if let Type::Named { name: enum_name, args, .. } = &ret_ty {
            if let Some(variant) = emitter.env.enums.get(enum_name).and_then(|e| e.variant(name)).cloned() {
                return gen_enum_construction(emitter, enum_name, args, &variant, &c.args, subst);
            }
        }
    }

    let callee_sig = match c.callee.unwrap_parens() {
        Expression::Identifier { name, .. } => emitter.env.functions.get(name).cloned(),
        _ => None,
    };

    let mut arg_vals: Vec<(String, String)> = Vec::new();
    let mut arg_types: Vec<Type> = Vec::new();
    for (i, a) in c.args.iter().enumerate() {
        let mut v = gen_expr(emitter, a, subst);
        let mut ty = emitter.last_semantic_type.clone();
        if let Some(expected) = callee_sig.as_ref().and_then(|s| s.params.get(i)) {
            if let Some(boxed) = coerce_to_dyn(emitter, expected, &ty, &v) {
                v = boxed;
                ty = expected.clone();
            }
        }
        arg_vals.push((llvm(emitter, &ty, true), v));
        arg_types.push(ty);
    }
    let ret_ty = subst.apply(&c.info);
    let ret_llvm = llvm(emitter, &ret_ty, false);
    emitter.last_semantic_type = ret_ty;

    let callee_name = match c.callee.unwrap_parens() {
        Expression::Identifier { name, .. } => {
            let sig = emitter.env.functions.get(name).cloned();
            if let Some(sig) = sig {
                if !sig.generics.is_empty() {
                    let generics_set: std::collections::HashSet<String> = sig.generics.iter().cloned().collect();
                    let type_args: Vec<Type> = if !c.type_args.is_empty() {
                        c.type_args
                            .iter()
                            .map(|tn| crate::typechecker::resolve_type_name_shallow(emitter.env, &generics_set, tn))
                            .collect()
                    } else {
                        let param_pairs: Vec<(Type, Type)> = sig.params.iter().cloned().zip(arg_types.iter().cloned()).collect();
                        let call_subst = super::monomorphize::build_call_substitution(&sig.generics, &[], &param_pairs);
                        sig.generics.iter().map(|g| call_subst.get(g).cloned().unwrap_or(Type::Unknown)).collect()
                    };
                    emitter.require_function_instantiation(name, &type_args)
                } else {
                    name.clone()
                }
            } else {
                name.clone()
            }
        }
        _ => "undef".to_string(),
    };

    let args_text = arg_vals
        .iter()
        .map(|(ty, v)| format!("{ty} {v}"))
        .collect::<Vec<_>>()
        .join(", ");
    if ret_llvm == "void" {
        emitter
            .functions
            .push_str(&format!("  call void @{callee_name}({args_text})\n"));
        "undef".to_string()
    } else {
        let reg = emitter.fresh_reg();
        emitter
            .functions
            .push_str(&format!("  {reg} = call {ret_llvm} @{callee_name}({args_text})\n"));
        reg
    }
}

/// Widens a concrete class value into a `dyn B` fat pointer when the callee
/// expects `dyn B` but the argument's static type is the concrete class —
/// the unsizing coercion `typechecker::resolve::compatible` now permits.
/// Returns `None` (argument passed as-is) unless that widening applies.
fn coerce_to_dyn(emitter: &mut Emitter, expected: &Type, found: &Type, val: &str) -> Option<String> {
    let Type::Dyn { behavior, .. } = expected else { return None };
    let Type::Named { name: class_name, .. } = found else { return None };
    if emitter.env.classes.get(class_name).is_none() {
        return None;
    }
    if !emitter
        .env
        .impls_for(class_name)
        .iter()
        .any(|i| i.trait_name.as_deref() == Some(behavior.as_str()))
    {
        return None;
    }
    Some(super::vtable::emit_box_as_dyn(emitter, val, class_name, behavior))
}

/// Builds an enum value in a fresh `alloca`'d slot — tag first, then each
/// constructor argument stored at its variant's payload offset — and loads
/// the slot back out, matching every other expression's by-value return
/// convention. `call_args` is empty for a unit variant referenced bare
/// (`Nothing`) as well as for one called with `()`.
fn gen_enum_construction(
    emitter: &mut Emitter,
    enum_name: &str,
    args: &[Type],
    variant: &crate::types::EnumVariantInfo,
    call_args: &[Expression<Type>],
    subst: &Substitution,
) -> String {
    let mangled = emitter.require_enum_instantiation(enum_name, args);
    let enum_ty = format!("%struct.{mangled}");
    emitter.last_semantic_type = Type::Named { path: vec![], name: enum_name.to_string(), args: args.to_vec() };

    let slot = emitter.fresh_reg();
    emitter.functions.push_str(&format!("  {slot} = alloca {enum_ty}\n"));
    let tag_ptr = emitter.fresh_reg();
    emitter
        .functions
        .push_str(&format!("  {tag_ptr} = getelementptr inbounds {enum_ty}, ptr {slot}, i32 0, i32 0\n"));
    emitter.functions.push_str(&format!("  store i32 {}, ptr {tag_ptr}\n", variant.tag));

    if !call_args.is_empty() {
        let payload_ptr = emitter.fresh_reg();
        emitter
            .functions
            .push_str(&format!("  {payload_ptr} = getelementptr inbounds {enum_ty}, ptr {slot}, i32 0, i32 1\n"));
        let payload_subst = emitter
            .env
            .enums
            .get(enum_name)
            .cloned()
            .map(|info| enum_generic_subst(&info, args))
            .unwrap_or_default();
        let mut offset = 0u64;
        for (i, arg_expr) in call_args.iter().enumerate() {
            let val = gen_expr(emitter, arg_expr, subst);
            let declared_ty = variant_tuple_field_type(variant, i).map(|t| payload_subst.apply(&t));
            let field_ty = declared_ty.unwrap_or_else(|| emitter.last_semantic_type.clone());
            let field_llvm = llvm(emitter, &field_ty, true);
            let field_addr = emitter.fresh_reg();
            emitter
                .functions
                .push_str(&format!("  {field_addr} = getelementptr inbounds i8, ptr {payload_ptr}, i64 {offset}\n"));
            emitter.functions.push_str(&format!("  store {field_llvm} {val}, ptr {field_addr}\n"));
            offset += approx_byte_size(&field_ty, emitter.env);
        }
    }

    let result = emitter.fresh_reg();
    emitter.functions.push_str(&format!("  {result} = load {enum_ty}, ptr {slot}\n"));
    result
}

fn variant_tuple_field_type(variant: &crate::types::EnumVariantInfo, index: usize) -> Option<Type> {
    if let crate::types::EnumVariantShape::Tuple(types) = &variant.shape {
        types.get(index).cloned()
    } else {
        None
    }
}

fn enum_generic_subst(info: &crate::types::EnumInfo, args: &[Type]) -> Substitution {
    let mut subst = Substitution::new();
    for (name, ty) in info.generics.iter().zip(args.iter()) {
        subst.bind(name.clone(), ty.clone());
    }
    subst
}

fn gen_method_call(emitter: &mut Emitter, m: &MethodCallExpr<Type>, subst: &Substitution) -> String {
    let receiver = gen_expr(emitter, &m.receiver, subst);
    let receiver_ty = emitter.last_semantic_type.clone();
    let arg_vals: Vec<(String, String)> = m
        .args
        .iter()
        .map(|a| {
            let v = gen_expr(emitter, a, subst);
            (llvm(emitter, &emitter.last_semantic_type.clone(), true), v)
        })
        .collect();
    let ret_ty = subst.apply(&m.info);
    let ret_llvm = llvm(emitter, &ret_ty, false);
    emitter.last_semantic_type = ret_ty;

    let base_name = type_base_name(&receiver_ty);
    if let Type::Dyn { behavior, .. } = &receiver_ty {
        return super::vtable::emit_dispatch_call(emitter, &receiver, behavior, &m.method, &arg_vals, &ret_llvm);
    }

    let type_args: Vec<Type> = if let Type::Named { args, .. } = &receiver_ty { args.clone() } else { Vec::new() };
    let fn_name = emitter.require_impl_method_instantiation(&Type::Named { path: vec![], name: base_name.clone(), args: type_args }, &m.method, &[]);

    let mut full_args = vec![format!("ptr {receiver}")];
    full_args.extend(arg_vals.iter().map(|(ty, v)| format!("{ty} {v}")));
    let args_text = full_args.join(", ");
    if ret_llvm == "void" {
        emitter.functions.push_str(&format!("  call void @{fn_name}({args_text})\n"));
        "undef".to_string()
    } else {
        let reg = emitter.fresh_reg();
        emitter
            .functions
            .push_str(&format!("  {reg} = call {ret_llvm} @{fn_name}({args_text})\n"));
        reg
    }
}

fn type_base_name(ty: &Type) -> String {
    match ty {
        Type::Named { name, .. } => name.clone(),
        Type::Reference { inner, .. } | Type::RawPointer { inner, .. } => type_base_name(inner),
        other => other.to_string(),
    }
}

/// Casts `val` between numeric representations. Reference/pointer/struct
/// casts (`as dyn B`, unsizing) are identity at the IR level since their
/// representation doesn't change — only width/signedness conversions
/// between `Int`/`Float` need an actual instruction.
fn gen_numeric_cast(emitter: &mut Emitter, val: &str, from: &Type, to: &Type) -> String {
    let from_llvm = llvm(emitter, from, true);
    let to_llvm = llvm(emitter, to, true);
    if from_llvm == to_llvm {
        return val.to_string();
    }
    let opcode = match (from, to) {
        (Type::Int { width: fw, .. }, Type::Int { width: tw, signed: tsigned, .. }) => {
            if tw.bits() > fw.bits() {
                if *tsigned { "sext" } else { "zext" }
            } else {
                "trunc"
            }
        }
        (Type::Float(_), Type::Float(_)) => "fpext",
        (Type::Int { signed, .. }, Type::Float(_)) => if *signed { "sitofp" } else { "uitofp" },
        (Type::Float(_), Type::Int { signed, .. }) => if *signed { "fptosi" } else { "fptoui" },
        _ => return val.to_string(),
    };
    let reg = emitter.fresh_reg();
    emitter
        .functions
        .push_str(&format!("  {reg} = {opcode} {from_llvm} {val} to {to_llvm}\n"));
    reg
}

/// Finds `field`'s zero-based slot among a struct's or class's declared
/// fields (class slot 0 is the vtable pointer, per §4.6, so class field
/// indices are offset by one) and the mangled struct-type name to GEP
/// through. Returns `None` for receivers whose shape isn't registered
/// (e.g. tuples, which `gen_lvalue_addr` doesn't currently address by
/// field name) — callers fall back to an untyped byte GEP in that case.
fn field_slot(emitter: &Emitter, base_ty: &Type, field: &str) -> Option<(String, u32)> {
    let name = type_base_name(base_ty);
    if let Some(s) = emitter.env.structs.get(&name) {
        let idx = s.fields.iter().position(|f| f.name == field)?;
        return Some((format!("%struct.{name}"), idx as u32));
    }
    if let Some(c) = emitter.env.classes.get(&name) {
        let idx = c.fields.iter().position(|f| f.name == field)?;
        return Some((format!("%class.{name}"), idx as u32 + 1));
    }
    None
}

fn gen_field_access(emitter: &mut Emitter, f: &FieldAccessExpr<Type>, subst: &Substitution) -> String {
    let base_ty = subst.apply(&f.base.get_info());
    let base_addr = gen_lvalue_addr(emitter, &f.base, subst);
    emitter.last_semantic_type = subst.apply(&f.info);
    let ty = llvm(emitter, &emitter.last_semantic_type.clone(), true);
    let field_ptr = emitter.fresh_reg();
    match field_slot(emitter, &base_ty, &f.field) {
        Some((struct_ty, idx)) => {
            emitter.functions.push_str(&format!(
                "  {field_ptr} = getelementptr inbounds {struct_ty}, ptr {base_addr}, i32 0, i32 {idx}\n"
            ));
        }
        None => {
            emitter
                .functions
                .push_str(&format!("  {field_ptr} = getelementptr inbounds i8, ptr {base_addr}, i32 0\n"));
        }
    }
    let reg = emitter.fresh_reg();
    emitter
        .functions
        .push_str(&format!("  {reg} = load {ty}, ptr {field_ptr}\n"));
    reg
}

fn gen_if(emitter: &mut Emitter, e: &crate::ast::IfExpr<Type>, subst: &Substitution) -> String {
    let cond = gen_expr(emitter, &e.condition, subst);
    let then_label = emitter.fresh_label("if.then");
    let else_label = emitter.fresh_label("if.else");
    let merge_label = emitter.fresh_label("if.merge");
    emitter
        .functions
        .push_str(&format!("  br i1 {cond}, label %{then_label}, label %{else_label}\n"));

    emitter.functions.push_str(&format!("{then_label}:\n"));
    emitter.push_scope();
    emitter.block_terminated = false;
    let (then_ty, then_val) = gen_block(emitter, &e.then_branch, subst);
    let then_terminated = emitter.block_terminated;
    if !then_terminated {
        emitter.functions.push_str(&format!("  br label %{merge_label}\n"));
    }
    emitter.pop_scope();

    emitter.functions.push_str(&format!("{else_label}:\n"));
    let (else_ty, else_val, else_terminated) = match &e.else_branch {
        Some(branch) => {
            emitter.block_terminated = false;
            let val = gen_expr(emitter, branch, subst);
            let terminated = emitter.block_terminated;
            if !terminated {
                emitter.functions.push_str(&format!("  br label %{merge_label}\n"));
            }
            (emitter.last_semantic_type.clone(), Some(val), terminated)
        }
        None => {
            emitter.functions.push_str(&format!("  br label %{merge_label}\n"));
            (Type::Unit, None, false)
        }
    };

    emitter.functions.push_str(&format!("{merge_label}:\n"));
    emitter.block_terminated = then_terminated && else_terminated;
    emitter.last_semantic_type = subst.apply(&e.info);

    match (then_val, else_val, then_terminated, else_terminated) {
        (Some(tv), Some(ev), false, false) => {
            let llvm_ty = llvm(emitter, &then_ty.clone().min_type(&else_ty), true);
            let reg = emitter.fresh_reg();
            emitter.functions.push_str(&format!(
                "  {reg} = phi {llvm_ty} [ {tv}, %{then_label} ], [ {ev}, %{else_label} ]\n"
            ));
            reg
        }
        (Some(tv), None, false, true) => tv,
        (None, Some(ev), true, false) => ev,
        _ => "undef".to_string(),
    }
}

/// A placeholder "pick a representative type" for an `if`/`when`'s merge
/// point display — real branch-type reconciliation already happened in
/// the checker, which stamped both branches as `compatible`; this only
/// needs *a* valid LLVM type for the phi, so either branch's works when
/// they match, and the checker already guaranteed they do whenever both
/// branches survive to a merge.
trait PickType {
    fn min_type(self, other: &Type) -> Type;
}

impl PickType for Type {
    fn min_type(self, other: &Type) -> Type {
        if matches!(self, Type::Never) {
            other.clone()
        } else {
            self
        }
    }
}

fn gen_if_let(emitter: &mut Emitter, e: &crate::ast::IfLetExpr<Type>, subst: &Substitution) -> String {
    let scrutinee_val = gen_expr(emitter, &e.scrutinee, subst);
    let scrutinee_ty = emitter.last_semantic_type.clone();
    let scrutinee = spill(emitter, &scrutinee_ty, &scrutinee_val);
    let then_label = emitter.fresh_label("iflet.then");
    let else_label = emitter.fresh_label("iflet.else");
    let merge_label = emitter.fresh_label("iflet.merge");
    let matches_reg = gen_pattern_test(emitter, &e.pattern, &scrutinee, &scrutinee_ty);
    emitter
        .functions
        .push_str(&format!("  br i1 {matches_reg}, label %{then_label}, label %{else_label}\n"));

    emitter.functions.push_str(&format!("{then_label}:\n"));
    emitter.push_scope();
    bind_pattern_names(emitter, &e.pattern, &scrutinee, &scrutinee_ty);
    emitter.block_terminated = false;
    let (_, then_val) = gen_block(emitter, &e.then_branch, subst);
    if !emitter.block_terminated {
        emitter.functions.push_str(&format!("  br label %{merge_label}\n"));
    }
    let then_terminated = emitter.block_terminated;
    emitter.pop_scope();

    emitter.functions.push_str(&format!("{else_label}:\n"));
    if let Some(branch) = &e.else_branch {
        emitter.block_terminated = false;
        gen_expr(emitter, branch, subst);
    }
    if !emitter.block_terminated {
        emitter.functions.push_str(&format!("  br label %{merge_label}\n"));
    }
    let else_terminated = emitter.block_terminated;

    emitter.functions.push_str(&format!("{merge_label}:\n"));
    emitter.block_terminated = then_terminated && else_terminated;
    emitter.last_semantic_type = subst.apply(&e.info);
    then_val.unwrap_or_else(|| "undef".to_string())
}

/// Lowers a `when` to a chain of pattern tests, one basic block per arm,
/// merging at the end — a linear chain rather than a jump table, which is
/// correct for every pattern shape even though it isn't the tightest
/// possible codegen for a dense set of unit-enum-variant arms.
fn gen_when(emitter: &mut Emitter, e: &crate::ast::WhenExpr<Type>, subst: &Substitution) -> String {
    let scrutinee_val = gen_expr(emitter, &e.scrutinee, subst);
    let scrutinee_ty = emitter.last_semantic_type.clone();
    let scrutinee = spill(emitter, &scrutinee_ty, &scrutinee_val);
    let merge_label = emitter.fresh_label("when.merge");
    let mut incoming = Vec::new();
    let mut all_terminated = true;

    for arm in &e.arms {
        let test_label = emitter.fresh_label("when.test");
        let body_label = emitter.fresh_label("when.body");
        let next_label = emitter.fresh_label("when.next");
        emitter.functions.push_str(&format!("  br label %{test_label}\n"));
        emitter.functions.push_str(&format!("{test_label}:\n"));
        let matches_reg = gen_pattern_test(emitter, &arm.pattern, &scrutinee, &scrutinee_ty);
        emitter
            .functions
            .push_str(&format!("  br i1 {matches_reg}, label %{body_label}, label %{next_label}\n"));

        emitter.functions.push_str(&format!("{body_label}:\n"));
        emitter.push_scope();
        bind_pattern_names(emitter, &arm.pattern, &scrutinee, &scrutinee_ty);
        emitter.block_terminated = false;
        let val = gen_expr(emitter, &arm.body, subst);
        let terminated = emitter.block_terminated;
        if !terminated {
            emitter.functions.push_str(&format!("  br label %{merge_label}\n"));
            incoming.push((val, body_label));
        }
        all_terminated &= terminated;
        emitter.pop_scope();

        emitter.functions.push_str(&format!("{next_label}:\n"));
    }
    emitter.functions.push_str("  unreachable\n");

    emitter.functions.push_str(&format!("{merge_label}:\n"));
    emitter.block_terminated = all_terminated || incoming.is_empty();
    emitter.last_semantic_type = subst.apply(&e.info);

    if incoming.is_empty() {
        return "undef".to_string();
    }
    let ret_ty = llvm(emitter, &emitter.last_semantic_type.clone(), true);
    if ret_ty == "void" || ret_ty == "{}" {
        return "undef".to_string();
    }
    let reg = emitter.fresh_reg();
    let phi_args = incoming
        .iter()
        .map(|(v, l)| format!("[ {v}, %{l} ]"))
        .collect::<Vec<_>>()
        .join(", ");
    emitter.functions.push_str(&format!("  {reg} = phi {ret_ty} {phi_args}\n"));
    reg
}

/// Stores `val` (a by-value SSA operand, possibly an aggregate) into a
/// fresh slot and returns its address — the step that turns a value this
/// pass already holds into something `getelementptr` can index into, the
/// same trick `gen_binding` uses for every `let`/`var`.
fn spill(emitter: &mut Emitter, ty: &Type, val: &str) -> String {
    let llvm_ty = llvm(emitter, ty, true);
    let reg = emitter.fresh_reg();
    emitter.functions.push_str(&format!("  {reg} = alloca {llvm_ty}\n"));
    emitter.functions.push_str(&format!("  store {llvm_ty} {val}, ptr {reg}\n"));
    reg
}

fn load_from(emitter: &mut Emitter, addr: &str, ty: &Type) -> String {
    let llvm_ty = llvm(emitter, ty, true);
    let reg = emitter.fresh_reg();
    emitter.functions.push_str(&format!("  {reg} = load {llvm_ty}, ptr {addr}\n"));
    reg
}

/// GEPs through a named/literal aggregate LLVM type (`{i64, i1}`, a struct
/// or class type, …) to its `idx`-th member's address.
fn typed_gep(emitter: &mut Emitter, base: &str, agg_ty: &str, idx: u32) -> String {
    let reg = emitter.fresh_reg();
    emitter
        .functions
        .push_str(&format!("  {reg} = getelementptr inbounds {agg_ty}, ptr {base}, i32 0, i32 {idx}\n"));
    reg
}

/// GEPs `offset` bytes into `base` — the byte-array enum payload has no
/// LLVM field structure of its own, so sub-fields are addressed by raw
/// offset rather than a typed index.
fn byte_gep(emitter: &mut Emitter, base: &str, offset: u64) -> String {
    let reg = emitter.fresh_reg();
    emitter
        .functions
        .push_str(&format!("  {reg} = getelementptr inbounds i8, ptr {base}, i64 {offset}\n"));
    reg
}

fn and_i1(emitter: &mut Emitter, a: &str, b: &str) -> String {
    let reg = emitter.fresh_reg();
    emitter.functions.push_str(&format!("  {reg} = and i1 {a}, {b}\n"));
    reg
}

fn enum_mangled_ty(ty: &Type) -> Option<String> {
    if let Type::Named { name, args, .. } = ty {
        Some(format!("%struct.{}", mangle_struct_name(name, args)))
    } else {
        None
    }
}

/// The enum's payload field (field 1 of `{i32, [N x i8]}`) as a byte pointer.
fn payload_addr(emitter: &mut Emitter, addr: &str, mangled_ty: &str) -> String {
    typed_gep(emitter, addr, mangled_ty, 1)
}

fn variant_struct_field_index(variant: &crate::types::EnumVariantInfo, field: &str) -> Option<usize> {
    if let crate::types::EnumVariantShape::Struct(fields) = &variant.shape {
        fields.iter().position(|f| f.name == field)
    } else {
        None
    }
}

/// Cumulative byte offset of the `index`-th payload field within a variant's
/// flat byte-array payload slot, mirroring `variant_payload_size`'s sizing
/// but per-position instead of max-over-all-variants.
fn variant_field_offset(emitter: &Emitter, enum_name: &str, variant_name: &str, index: usize, subst: &Substitution) -> u64 {
    let Some(info) = emitter.env.enums.get(enum_name) else { return 0 };
    let Some(variant) = info.variant(variant_name) else { return 0 };
    use crate::types::EnumVariantShape::*;
    match &variant.shape {
        Unit => 0,
        Tuple(types) => types.iter().take(index).map(|t| approx_byte_size(&subst.apply(t), emitter.env)).sum(),
        Struct(fields) => fields.iter().take(index).map(|f| approx_byte_size(&subst.apply(&f.ty), emitter.env)).sum(),
    }
}

/// Evaluates whether the value at `addr` (of semantic type `ty`) matches
/// `pattern`, returning an `i1` register. Wildcard and bare identifier
/// patterns always match; literal patterns compare equal; `Tuple`/`Array`
/// patterns test each positional element via a typed GEP into the
/// aggregate; `Struct` patterns test each named field via the same
/// typed-index GEP `gen_field_access` uses; `EnumVariant` patterns compare
/// the loaded tag field and, for payload-carrying shapes, recurse into the
/// payload's destructured sub-addresses. A pattern shape the checker
/// guarantees exhaustive shape-compatibility for but this match doesn't
/// otherwise recognize still falls back to an unconditional match.
fn gen_pattern_test(emitter: &mut Emitter, pattern: &crate::ast::Pattern<Type>, addr: &str, ty: &Type) -> String {
    use crate::ast::{EnumPatternElements, LiteralPattern, Pattern};
    match pattern {
        Pattern::Wildcard { .. } | Pattern::Identifier { .. } => "1".to_string(),
        Pattern::Literal { value, .. } => {
            let scrutinee = load_from(emitter, addr, ty);
            let (opcode, rhs) = match value {
                LiteralPattern::Int { value, .. } => ("icmp eq i64", value.to_string()),
                LiteralPattern::Bool(b) => ("icmp eq i1", if *b { "1".to_string() } else { "0".to_string() }),
                LiteralPattern::Char(c) => ("icmp eq i32", (*c as u32).to_string()),
                _ => return "1".to_string(),
            };
            let reg = emitter.fresh_reg();
            emitter.functions.push_str(&format!("  {reg} = {opcode} {scrutinee}, {rhs}\n"));
            reg
        }
        Pattern::Or { alternatives, .. } => {
            let mut result = "0".to_string();
            for alt in alternatives {
                let test = gen_pattern_test(emitter, alt, addr, ty);
                let reg = emitter.fresh_reg();
                emitter.functions.push_str(&format!("  {reg} = or i1 {result}, {test}\n"));
                result = reg;
            }
            result
        }
        Pattern::Tuple { elements, .. } | Pattern::Array { elements, .. } => {
            let agg_ty = llvm(emitter, ty, true);
            let mut result = "1".to_string();
            for (idx, p) in elements.iter().enumerate() {
                if matches!(p, Pattern::Identifier { .. } | Pattern::Wildcard { .. }) {
                    continue;
                }
                let el_addr = typed_gep(emitter, addr, &agg_ty, idx as u32);
                let el_ty = p.get_info();
                let test = gen_pattern_test(emitter, p, &el_addr, &el_ty);
                result = and_i1(emitter, &result, &test);
            }
            result
        }
        Pattern::Struct { fields, .. } => {
            let mut result = "1".to_string();
            for (fname, p) in fields {
                if matches!(p, Pattern::Identifier { .. } | Pattern::Wildcard { .. }) {
                    continue;
                }
                if let Some((struct_ty, idx)) = field_slot(emitter, ty, fname) {
                    let field_addr = typed_gep(emitter, addr, &struct_ty, idx);
                    let field_ty = p.get_info();
                    let test = gen_pattern_test(emitter, p, &field_addr, &field_ty);
                    result = and_i1(emitter, &result, &test);
                }
            }
            result
        }
        Pattern::EnumVariant { variant, elements, .. } => {
            let (Type::Named { name: enum_name, args, .. }, Some(mangled_ty)) = (ty, enum_mangled_ty(ty)) else {
                return "1".to_string();
            };
            let Some(info) = emitter.env.enums.get(enum_name).cloned() else {
                return "1".to_string();
            };
            let Some(variant_info) = info.variant(variant).cloned() else {
                return "1".to_string();
            };
            let tag_ptr = typed_gep(emitter, addr, &mangled_ty, 0);
            let tag_reg = load_from(emitter, &tag_ptr, &Type::i32());
            let mut result = emitter.fresh_reg();
            emitter
                .functions
                .push_str(&format!("  {result} = icmp eq i32 {tag_reg}, {}\n", variant_info.tag));

            let field_subst = enum_generic_subst(&info, args);
            match elements {
                EnumPatternElements::Unit => {}
                EnumPatternElements::Tuple(pats) => {
                    let payload_ptr = payload_addr(emitter, addr, &mangled_ty);
                    for (i, p) in pats.iter().enumerate() {
                        if matches!(p, Pattern::Identifier { .. } | Pattern::Wildcard { .. }) {
                            continue;
                        }
                        let offset = variant_field_offset(emitter, enum_name, variant, i, &field_subst);
                        let field_addr = byte_gep(emitter, &payload_ptr, offset);
                        let field_ty = p.get_info();
                        let test = gen_pattern_test(emitter, p, &field_addr, &field_ty);
                        result = and_i1(emitter, &result, &test);
                    }
                }
                EnumPatternElements::Struct { fields, .. } => {
                    let payload_ptr = payload_addr(emitter, addr, &mangled_ty);
                    for (fname, p) in fields {
                        if matches!(p, Pattern::Identifier { .. } | Pattern::Wildcard { .. }) {
                            continue;
                        }
                        let Some(idx) = variant_struct_field_index(&variant_info, fname) else { continue };
                        let offset = variant_field_offset(emitter, enum_name, variant, idx, &field_subst);
                        let field_addr = byte_gep(emitter, &payload_ptr, offset);
                        let field_ty = p.get_info();
                        let test = gen_pattern_test(emitter, p, &field_addr, &field_ty);
                        result = and_i1(emitter, &result, &test);
                    }
                }
            }
            result
        }
    }
}

/// Binds every name `pattern` introduces to the address of the memory it
/// actually lives at — the whole scrutinee for a bare identifier, a typed
/// GEP for a tuple/array/struct element, a byte-offset GEP into the payload
/// slot for an enum-variant field — so a later `gen_identifier_load` for
/// that name loads the right sub-value rather than the scrutinee itself.
fn bind_pattern_names(emitter: &mut Emitter, pattern: &crate::ast::Pattern<Type>, addr: &str, ty: &Type) {
    use crate::ast::{EnumPatternElements, Pattern};
    match pattern {
        Pattern::Identifier { name, .. } => {
            emitter.bind_local(name.clone(), addr.to_string());
        }
        Pattern::Wildcard { .. } | Pattern::Literal { .. } => {}
        Pattern::Tuple { elements, .. } | Pattern::Array { elements, .. } => {
            let agg_ty = llvm(emitter, ty, true);
            for (idx, p) in elements.iter().enumerate() {
                if p.bound_names().is_empty() {
                    continue;
                }
                let el_addr = typed_gep(emitter, addr, &agg_ty, idx as u32);
                bind_pattern_names(emitter, p, &el_addr, &p.get_info());
            }
            if let Pattern::Array { rest: Some(Some(rest_name)), elements, .. } = pattern {
                let rest_addr = typed_gep(emitter, addr, &agg_ty, elements.len() as u32);
                emitter.bind_local(rest_name.clone(), rest_addr);
            }
        }
        Pattern::Struct { fields, .. } => {
            for (fname, p) in fields {
                if p.bound_names().is_empty() {
                    continue;
                }
                if let Some((struct_ty, idx)) = field_slot(emitter, ty, fname) {
                    let field_addr = typed_gep(emitter, addr, &struct_ty, idx);
                    bind_pattern_names(emitter, p, &field_addr, &p.get_info());
                }
            }
        }
        Pattern::EnumVariant { variant, elements, .. } => {
            let (Type::Named { name: enum_name, args, .. }, Some(mangled_ty)) = (ty, enum_mangled_ty(ty)) else {
                return;
            };
            let Some(info) = emitter.env.enums.get(enum_name).cloned() else { return };
            let field_subst = enum_generic_subst(&info, args);
            match elements {
                EnumPatternElements::Unit => {}
                EnumPatternElements::Tuple(pats) => {
                    if pats.iter().all(|p| p.bound_names().is_empty()) {
                        return;
                    }
                    let payload_ptr = payload_addr(emitter, addr, &mangled_ty);
                    for (i, p) in pats.iter().enumerate() {
                        if p.bound_names().is_empty() {
                            continue;
                        }
                        let offset = variant_field_offset(emitter, enum_name, variant, i, &field_subst);
                        let field_addr = byte_gep(emitter, &payload_ptr, offset);
                        bind_pattern_names(emitter, p, &field_addr, &p.get_info());
                    }
                }
                EnumPatternElements::Struct { fields, .. } => {
                    let Some(variant_info) = info.variant(variant).cloned() else { return };
                    if fields.iter().all(|(_, p)| p.bound_names().is_empty()) {
                        return;
                    }
                    let payload_ptr = payload_addr(emitter, addr, &mangled_ty);
                    for (fname, p) in fields {
                        if p.bound_names().is_empty() {
                            continue;
                        }
                        let Some(idx) = variant_struct_field_index(&variant_info, fname) else { continue };
                        let offset = variant_field_offset(emitter, enum_name, variant, idx, &field_subst);
                        let field_addr = byte_gep(emitter, &payload_ptr, offset);
                        bind_pattern_names(emitter, p, &field_addr, &p.get_info());
                    }
                }
            }
        }
        Pattern::Or { alternatives, .. } => {
            if let Some(first) = alternatives.first() {
                bind_pattern_names(emitter, first, addr, ty);
            }
        }
    }
}

fn gen_loop(emitter: &mut Emitter, e: &crate::ast::LoopExpr<Type>, subst: &Substitution) -> String {
    let header = emitter.fresh_label("loop.header");
    let after = emitter.fresh_label("loop.after");
    emitter.functions.push_str(&format!("  br label %{header}\n"));
    emitter.functions.push_str(&format!("{header}:\n"));
    emitter.push_loop(e.label.clone(), header.clone(), after.clone());
    emitter.push_scope();
    emitter.block_terminated = false;
    gen_block(emitter, &e.body, subst);
    if !emitter.block_terminated {
        emitter.functions.push_str(&format!("  br label %{header}\n"));
    }
    emitter.pop_scope();
    emitter.pop_loop();
    emitter.functions.push_str(&format!("{after}:\n"));
    emitter.block_terminated = false;
    emitter.last_semantic_type = subst.apply(&e.info);
    "undef".to_string()
}

fn gen_while(emitter: &mut Emitter, e: &crate::ast::WhileExpr<Type>, subst: &Substitution) -> String {
    let header = emitter.fresh_label("while.header");
    let body_label = emitter.fresh_label("while.body");
    let after = emitter.fresh_label("while.after");
    emitter.functions.push_str(&format!("  br label %{header}\n"));
    emitter.functions.push_str(&format!("{header}:\n"));
    let cond = gen_expr(emitter, &e.condition, subst);
    emitter
        .functions
        .push_str(&format!("  br i1 {cond}, label %{body_label}, label %{after}\n"));

    emitter.functions.push_str(&format!("{body_label}:\n"));
    emitter.push_loop(e.label.clone(), header.clone(), after.clone());
    emitter.push_scope();
    emitter.block_terminated = false;
    gen_block(emitter, &e.body, subst);
    if !emitter.block_terminated {
        emitter.functions.push_str(&format!("  br label %{header}\n"));
    }
    emitter.pop_scope();
    emitter.pop_loop();

    emitter.functions.push_str(&format!("{after}:\n"));
    emitter.block_terminated = false;
    emitter.last_semantic_type = Type::Unit;
    "undef".to_string()
}

/// Desugars at codegen time rather than AST-rewrite time: `for p in iter {
/// body }` becomes a `loop` that calls `IntoIterator::into_iter` once, then
/// on each revolution calls `.next()` and either binds `p` (the `Just`
/// case) or breaks (`None`) — matching the iterator-protocol desugaring.
fn gen_for(emitter: &mut Emitter, e: &crate::ast::ForExpr<Type>, subst: &Substitution) -> String {
    let iter_val = gen_expr(emitter, &e.iterable, subst);
    let header = emitter.fresh_label("for.header");
    let body_label = emitter.fresh_label("for.body");
    let after = emitter.fresh_label("for.after");
    emitter.functions.push_str(&format!("  br label %{header}\n"));
    emitter.functions.push_str(&format!("{header}:\n"));
    let next = emitter.fresh_reg();
    emitter
        .functions
        .push_str(&format!("  {next} = call {{i1, ptr}} @tml_iter_next(ptr {iter_val})\n"));
    let has_next = emitter.fresh_reg();
    emitter
        .functions
        .push_str(&format!("  {has_next} = extractvalue {{i1, ptr}} {next}, 0\n"));
    emitter
        .functions
        .push_str(&format!("  br i1 {has_next}, label %{body_label}, label %{after}\n"));

    emitter.functions.push_str(&format!("{body_label}:\n"));
    emitter.push_loop(e.label.clone(), header.clone(), after.clone());
    emitter.push_scope();
    bind_pattern_names(emitter, &e.pattern, &next);
    emitter.block_terminated = false;
    gen_block(emitter, &e.body, subst);
    if !emitter.block_terminated {
        emitter.functions.push_str(&format!("  br label %{header}\n"));
    }
    emitter.pop_scope();
    emitter.pop_loop();

    emitter.functions.push_str(&format!("{after}:\n"));
    emitter.block_terminated = false;
    emitter.last_semantic_type = Type::Unit;
    "undef".to_string()
}
