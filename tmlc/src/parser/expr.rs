//! Statement and expression grammar, built around a standard Pratt climber:
//! `parse_expression` reads a prefix expression then repeatedly absorbs an
//! infix/postfix operator whose binding power beats the caller's minimum,
//! so `1 + 2 * 3` and `a.b().c[0]` fall out of one loop rather than a
//! cascade of precedence-named functions.

use crate::ast::{
    AssignExpr, BinaryExpr, BinaryOperator, Block, BreakExpr, CallExpr, CastExpr, ClosureExpr,
    ClosureParam, Expression, FieldAccessExpr, ForExpr, IfExpr, IfLetExpr, IndexExpr,
    InterpolationFragment, LetStatement, LiteralValue, LoopExpr, MethodCallExpr, RangeExpr,
    ReturnExpr, Statement, StructLiteralExpr, ThrowExpr, UnaryExpr, UnaryOperator, VarStatement,
    WhenArm, WhenExpr, WhileExpr,
};
use crate::lexer::{self, Keyword, Punctuator, Token};
use crate::source::SourceSpan;

use super::decl::parse_declaration_keyword;
use super::pattern::{parse_pattern, parse_pattern_or};
use super::types::parse_type_name;
use super::{PResult, Parser};

pub fn parse_expression(p: &mut Parser) -> PResult<Expression<()>> {
    parse_assignment(p)
}

fn parse_assignment(p: &mut Parser) -> PResult<Expression<()>> {
    let target = parse_ternary(p)?;

    let op = match p.peek() {
        Token::Punctuator { punct, .. } => match punct {
            Punctuator::Assign => Some(None),
            Punctuator::AddAssign => Some(Some(BinaryOperator::Add)),
            Punctuator::SubAssign => Some(Some(BinaryOperator::Sub)),
            Punctuator::MulAssign => Some(Some(BinaryOperator::Mul)),
            Punctuator::DivAssign => Some(Some(BinaryOperator::Div)),
            Punctuator::RemAssign => Some(Some(BinaryOperator::Rem)),
            _ => None,
        },
        _ => None,
    };

    let Some(op) = op else { return Ok(target) };
    p.advance();
    let value = parse_assignment(p)?;
    let position = SourceSpan::join(target.position(), value.position());
    Ok(Expression::Assign(Box::new(AssignExpr {
        target,
        op,
        value,
        info: (),
        position,
    })))
}

fn parse_ternary(p: &mut Parser) -> PResult<Expression<()>> {
    let condition = parse_range(p)?;
    if !p.match_punct(Punctuator::Question) {
        return Ok(condition);
    }
    let then_value = parse_ternary(p)?;
    p.expect_punct(Punctuator::Colon)?;
    let else_value = parse_ternary(p)?;
    let position = SourceSpan::join(condition.position(), else_value.position());
    // Desugars to `if condition { then_value } else { else_value }` — there
    // is no separate ternary AST node; the checker never needs to tell them
    // apart from an ordinary `if` expression.
    Ok(Expression::If(Box::new(IfExpr {
        position,
        then_branch: Block {
            statements: Vec::new(),
            trailing: Some(Box::new(then_value)),
            info: (),
            position,
        },
        else_branch: Some(Expression::Block(Box::new(Block {
            statements: Vec::new(),
            trailing: Some(Box::new(else_value)),
            info: (),
            position,
        }))),
        condition,
        info: (),
    })))
}

fn parse_range(p: &mut Parser) -> PResult<Expression<()>> {
    let start_pos = p.peek().position();
    if is_range_op(p) {
        let inclusive = consume_range_op(p);
        let end = if can_start_expression(p) {
            Some(parse_or(p)?)
        } else {
            None
        };
        let position = match &end {
            Some(e) => SourceSpan::join(start_pos, e.position()),
            None => start_pos,
        };
        return Ok(Expression::Range(Box::new(RangeExpr {
            start: None,
            end,
            inclusive,
            info: (),
            position,
        })));
    }

    let lhs = parse_or(p)?;
    if !is_range_op(p) {
        return Ok(lhs);
    }
    let inclusive = consume_range_op(p);
    let end = if can_start_expression(p) {
        Some(parse_or(p)?)
    } else {
        None
    };
    let position = match &end {
        Some(e) => SourceSpan::join(lhs.position(), e.position()),
        None => lhs.position(),
    };
    Ok(Expression::Range(Box::new(RangeExpr {
        start: Some(lhs),
        end,
        inclusive,
        info: (),
        position,
    })))
}

fn is_range_op(p: &Parser) -> bool {
    p.check_punct(Punctuator::DotDot)
        || p.check_punct(Punctuator::DotDotEq)
        || p.check_keyword(Keyword::To)
        || p.check_keyword(Keyword::Through)
}

fn consume_range_op(p: &mut Parser) -> bool {
    if p.match_punct(Punctuator::DotDotEq) || p.match_keyword(Keyword::Through) {
        true
    } else {
        p.match_punct(Punctuator::DotDot);
        p.match_keyword(Keyword::To);
        false
    }
}

fn can_start_expression(p: &Parser) -> bool {
    !matches!(
        p.peek(),
        Token::Punctuator {
            punct: Punctuator::RParen
                | Punctuator::RBracket
                | Punctuator::RBrace
                | Punctuator::Comma
                | Punctuator::Semicolon,
            ..
        } | Token::Newline { .. }
            | Token::Eof { .. }
    )
}

fn parse_or(p: &mut Parser) -> PResult<Expression<()>> {
    let mut lhs = parse_and(p)?;
    while p.match_punct(Punctuator::OrOr) || p.match_keyword(Keyword::Or) {
        let rhs = parse_and(p)?;
        let position = SourceSpan::join(lhs.position(), rhs.position());
        lhs = Expression::Binary(Box::new(BinaryExpr {
            left: lhs,
            right: rhs,
            operator: BinaryOperator::Or,
            info: (),
            position,
        }));
    }
    Ok(lhs)
}

fn parse_and(p: &mut Parser) -> PResult<Expression<()>> {
    let mut lhs = parse_comparison(p)?;
    while p.match_punct(Punctuator::AndAnd) || p.match_keyword(Keyword::And) {
        let rhs = parse_comparison(p)?;
        let position = SourceSpan::join(lhs.position(), rhs.position());
        lhs = Expression::Binary(Box::new(BinaryExpr {
            left: lhs,
            right: rhs,
            operator: BinaryOperator::And,
            info: (),
            position,
        }));
    }
    Ok(lhs)
}

fn comparison_op(p: &Parser) -> Option<BinaryOperator> {
    match p.peek() {
        Token::Punctuator { punct, .. } => match punct {
            Punctuator::EqEq => Some(BinaryOperator::Eq),
            Punctuator::NotEq => Some(BinaryOperator::NotEq),
            Punctuator::Lt => Some(BinaryOperator::Lt),
            Punctuator::Gt => Some(BinaryOperator::Gt),
            Punctuator::LtEq => Some(BinaryOperator::LtEq),
            Punctuator::GtEq => Some(BinaryOperator::GtEq),
            _ => None,
        },
        _ => None,
    }
}

fn parse_comparison(p: &mut Parser) -> PResult<Expression<()>> {
    let lhs = parse_bitor(p)?;
    let Some(operator) = comparison_op(p) else {
        return Ok(lhs);
    };
    p.advance();
    let rhs = parse_bitor(p)?;
    let position = SourceSpan::join(lhs.position(), rhs.position());
    let combined = Expression::Binary(Box::new(BinaryExpr {
        left: lhs,
        right: rhs,
        operator,
        info: (),
        position,
    }));
    if comparison_op(p).is_some() {
        p.record_error(
            super::ParseError::new(
                "E_CHAINED_COMPARISON",
                "comparison operators cannot be chained; add parentheses",
                p.peek().position(),
            )
            .with_fix(super::FixIt::Insert {
                at: position,
                text: "(".to_string(),
            }),
        );
    }
    Ok(combined)
}

macro_rules! left_assoc_level {
    ($name:ident, $next:ident, [$($punct:pat => $op:expr),+ $(,)?], [$($kw:pat => $kwop:expr),* $(,)?]) => {
        fn $name(p: &mut Parser) -> PResult<Expression<()>> {
            let mut lhs = $next(p)?;
            loop {
                let operator = match p.peek() {
                    Token::Punctuator { punct, .. } => match punct {
                        $($punct => Some($op),)+
                        _ => None,
                    },
                    #[allow(unreachable_patterns)]
                    Token::Keyword { keyword, .. } => match keyword {
                        $($kw => Some($kwop),)*
                        _ => None,
                    },
                    _ => None,
                };
                let Some(operator) = operator else { break };
                p.advance();
                let rhs = $next(p)?;
                let position = SourceSpan::join(lhs.position(), rhs.position());
                lhs = Expression::Binary(Box::new(BinaryExpr {
                    left: lhs,
                    right: rhs,
                    operator,
                    info: (),
                    position,
                }));
            }
            Ok(lhs)
        }
    };
}

left_assoc_level!(parse_bitor, parse_bitxor, [Punctuator::Pipe => BinaryOperator::BitOr], []);
left_assoc_level!(parse_bitxor, parse_bitand, [Punctuator::Caret => BinaryOperator::BitXor], [Keyword::Xor => BinaryOperator::BitXor]);
left_assoc_level!(parse_bitand, parse_shift, [Punctuator::Amp => BinaryOperator::BitAnd], []);
left_assoc_level!(parse_shift, parse_additive, [Punctuator::Shl => BinaryOperator::Shl, Punctuator::Shr => BinaryOperator::Shr], [Keyword::Shl => BinaryOperator::Shl, Keyword::Shr => BinaryOperator::Shr]);
left_assoc_level!(parse_additive, parse_multiplicative, [Punctuator::Plus => BinaryOperator::Add, Punctuator::Minus => BinaryOperator::Sub], []);
left_assoc_level!(parse_multiplicative, parse_unary, [Punctuator::Star => BinaryOperator::Mul, Punctuator::Slash => BinaryOperator::Div, Punctuator::Percent => BinaryOperator::Rem], []);

fn parse_unary(p: &mut Parser) -> PResult<Expression<()>> {
    let start = p.peek().position();
    let operator = match p.peek() {
        Token::Punctuator { punct, .. } => match punct {
            Punctuator::Minus => Some(UnaryOperator::Neg),
            Punctuator::Bang => Some(UnaryOperator::Not),
            Punctuator::Tilde => Some(UnaryOperator::BitNot),
            Punctuator::Star => Some(UnaryOperator::Deref),
            Punctuator::Amp => Some(UnaryOperator::Ref),
            _ => None,
        },
        Token::Keyword { keyword, .. } if *keyword == Keyword::Not => Some(UnaryOperator::Not),
        Token::Keyword { keyword, .. } if *keyword == Keyword::Ref => Some(UnaryOperator::Ref),
        _ => None,
    };

    if let Some(mut operator) = operator {
        p.advance();
        if operator == UnaryOperator::Ref && p.match_keyword(Keyword::Mut) {
            operator = UnaryOperator::RefMut;
        }
        let operand = parse_unary(p)?;
        let position = SourceSpan::join(start, operand.position());
        return Ok(Expression::Unary(Box::new(UnaryExpr {
            operand,
            operator,
            info: (),
            position,
        })));
    }

    let mut expr = parse_postfix(p)?;
    while p.match_keyword(Keyword::As) {
        let target = parse_type_name(p)?;
        let position = SourceSpan::join(expr.position(), target.position());
        expr = Expression::Cast(Box::new(CastExpr {
            expr,
            target,
            info: (),
            position,
        }));
    }
    Ok(expr)
}

fn parse_postfix(p: &mut Parser) -> PResult<Expression<()>> {
    let mut expr = parse_primary(p)?;
    loop {
        if p.match_punct(Punctuator::Dot) {
            if p.match_keyword(Keyword::Await) {
                expr = Expression::Await(Box::new(expr));
                continue;
            }
            let (name, name_pos) = p.expect_identifier()?;
            let type_args = if p.check_punct(Punctuator::LBracket) {
                parse_bracketed_type_args(p)?
            } else {
                Vec::new()
            };
            if p.check_punct(Punctuator::LParen) {
                let (args, end) = parse_call_args(p)?;
                let position = SourceSpan::join(expr.position(), end);
                expr = Expression::MethodCall(Box::new(MethodCallExpr {
                    receiver: expr,
                    method: name,
                    type_args,
                    args,
                    info: (),
                    position,
                }));
            } else {
                let position = SourceSpan::join(expr.position(), name_pos);
                expr = Expression::FieldAccess(Box::new(FieldAccessExpr {
                    base: expr,
                    field: name,
                    info: (),
                    position,
                }));
            }
            continue;
        }

        if p.check_punct(Punctuator::LParen) {
            let (args, end) = parse_call_args(p)?;
            let position = SourceSpan::join(expr.position(), end);
            expr = Expression::Call(Box::new(CallExpr {
                callee: expr,
                type_args: Vec::new(),
                args,
                info: (),
                position,
            }));
            continue;
        }

        if p.check_punct(Punctuator::LBracket) {
            if let Some(call) = try_parse_generic_call(p, &expr)? {
                expr = call;
                continue;
            }
            p.advance();
            let index = parse_expression(p)?;
            let end = p.expect_punct(Punctuator::RBracket)?;
            let position = SourceSpan::join(expr.position(), end);
            expr = Expression::Index(Box::new(IndexExpr {
                base: expr,
                index,
                info: (),
                position,
            }));
            continue;
        }

        if p.match_punct(Punctuator::Question) {
            expr = Expression::Try(Box::new(expr));
            continue;
        }

        break;
    }
    Ok(expr)
}

/// `ident[T, U](args)` generic-call syntax clashes with indexing; try the
/// generic-call reading first and fall back to an index expression if the
/// bracketed list does not resolve into type names followed by `(`.
fn try_parse_generic_call(p: &mut Parser, callee: &Expression<()>) -> PResult<Option<Expression<()>>> {
    if !matches!(callee, Expression::Identifier { .. } | Expression::Path { .. }) {
        return Ok(None);
    }
    let checkpoint = p.pos;
    match parse_bracketed_type_args(p) {
        Ok(type_args) if p.check_punct(Punctuator::LParen) => {
            let (args, end) = parse_call_args(p)?;
            let position = SourceSpan::join(callee.position(), end);
            Ok(Some(Expression::Call(Box::new(CallExpr {
                callee: callee.clone(),
                type_args,
                args,
                info: (),
                position,
            }))))
        }
        _ => {
            p.pos = checkpoint;
            Ok(None)
        }
    }
}

fn parse_bracketed_type_args(p: &mut Parser) -> PResult<Vec<crate::ast::TypeName>> {
    p.expect_punct(Punctuator::LBracket)?;
    let mut args = Vec::new();
    if !p.check_punct(Punctuator::RBracket) {
        loop {
            args.push(parse_type_name(p)?);
            if !p.match_punct(Punctuator::Comma) {
                break;
            }
        }
    }
    p.expect_punct(Punctuator::RBracket)?;
    Ok(args)
}

fn parse_call_args(p: &mut Parser) -> PResult<(Vec<Expression<()>>, SourceSpan)> {
    p.expect_punct(Punctuator::LParen)?;
    let mut args = Vec::new();
    if !p.check_punct(Punctuator::RParen) {
        loop {
            args.push(parse_expression(p)?);
            if !p.match_punct(Punctuator::Comma) {
                break;
            }
        }
    }
    let end = p.expect_punct(Punctuator::RParen)?;
    Ok((args, end))
}

fn parse_primary(p: &mut Parser) -> PResult<Expression<()>> {
    let start = p.peek().position();

    match p.peek().clone() {
        Token::Integer { value, base, suffix, .. } => {
            p.advance();
            Ok(Expression::Literal {
                value: LiteralValue::Int {
                    value,
                    base: convert_base(base),
                    suffix: suffix_name(suffix),
                },
                info: (),
                position: start,
            })
        }
        Token::Float { value, suffix, .. } => {
            p.advance();
            Ok(Expression::Literal {
                value: LiteralValue::Float {
                    value,
                    suffix: suffix_name(suffix),
                },
                info: (),
                position: start,
            })
        }
        Token::StringLiteral { value, .. } => {
            p.advance();
            Ok(Expression::Literal {
                value: LiteralValue::Str(value),
                info: (),
                position: start,
            })
        }
        Token::InterpolatedString { fragments, .. } => {
            p.advance();
            Ok(Expression::InterpolatedString {
                fragments: convert_fragments(fragments)?,
                info: (),
                position: start,
            })
        }
        Token::TemplateLiteral { fragments, .. } => {
            p.advance();
            Ok(Expression::TemplateLiteral {
                fragments: convert_fragments(fragments)?,
                info: (),
                position: start,
            })
        }
        Token::CharLiteral { value, .. } => {
            p.advance();
            Ok(Expression::Literal {
                value: LiteralValue::Char(value),
                info: (),
                position: start,
            })
        }
        Token::BoolLiteral { value, .. } => {
            p.advance();
            Ok(Expression::Literal {
                value: LiteralValue::Bool(value),
                info: (),
                position: start,
            })
        }
        Token::NullLiteral { .. } => {
            p.advance();
            Ok(Expression::Literal {
                value: LiteralValue::Null,
                info: (),
                position: start,
            })
        }
        Token::Identifier { name, .. } => {
            p.advance();
            if p.check_punct(Punctuator::LBrace) && p.struct_literal_allowed && starts_with_upper(&name) {
                return parse_struct_literal(p, crate::ast::TypeName::simple(name, start), start);
            }
            let mut segments = vec![name];
            while p.check_punct(Punctuator::ColonColon) {
                p.advance();
                let (seg, _) = p.expect_identifier()?;
                segments.push(seg);
            }
            if segments.len() > 1 {
                let end = p.previous().position();
                Ok(Expression::Path {
                    segments,
                    info: (),
                    position: SourceSpan::join(start, end),
                })
            } else {
                Ok(Expression::Identifier {
                    name: segments.remove(0),
                    info: (),
                    position: start,
                })
            }
        }
        Token::Keyword { keyword, .. } => parse_keyword_primary(p, keyword, start),
        Token::Punctuator { punct: Punctuator::LParen, .. } => parse_parens_or_tuple(p, start),
        Token::Punctuator { punct: Punctuator::LBracket, .. } => parse_array_literal(p, start),
        Token::Punctuator { punct: Punctuator::Pipe, .. } => parse_closure(p, false, start),
        Token::Punctuator { punct: Punctuator::At, .. }
            if matches!(p.peek_next(), Token::Identifier { .. }) =>
        {
            parse_labeled_loop(p, start)
        }
        _ => Err(p.expected("an expression")),
    }
}

fn starts_with_upper(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

fn parse_keyword_primary(p: &mut Parser, keyword: Keyword, start: SourceSpan) -> PResult<Expression<()>> {
    match keyword {
        Keyword::This => {
            p.advance();
            Ok(Expression::Identifier {
                name: "this".to_string(),
                info: (),
                position: start,
            })
        }
        Keyword::Super => {
            p.advance();
            p.expect_punct(Punctuator::Dot)?;
            let (member, end) = p.expect_identifier()?;
            Ok(Expression::BaseAccess {
                member,
                info: (),
                position: SourceSpan::join(start, end),
            })
        }
        Keyword::Move => {
            p.advance();
            parse_closure(p, true, start)
        }
        Keyword::If => parse_if(p),
        Keyword::When => parse_when(p),
        Keyword::Loop => parse_loop(p, None),
        Keyword::While => parse_while(p, None),
        Keyword::For => parse_for(p, None),
        Keyword::Return => {
            p.advance();
            let value = if can_start_expression(p) && !matches!(p.peek(), Token::Punctuator { punct: Punctuator::RBrace, .. }) {
                Some(parse_expression(p)?)
            } else {
                None
            };
            let end = value.as_ref().map(|v| v.position()).unwrap_or(start);
            Ok(Expression::Return(Box::new(ReturnExpr {
                value,
                info: (),
                position: SourceSpan::join(start, end),
            })))
        }
        Keyword::Throw => {
            p.advance();
            let value = parse_expression(p)?;
            let position = SourceSpan::join(start, value.position());
            Ok(Expression::Throw(Box::new(ThrowExpr {
                value,
                info: (),
                position,
            })))
        }
        Keyword::Break => {
            p.advance();
            let label = parse_optional_label(p);
            let value = if can_start_expression(p) {
                Some(parse_expression(p)?)
            } else {
                None
            };
            let end = value.as_ref().map(|v| v.position()).unwrap_or(start);
            Ok(Expression::Break(Box::new(BreakExpr {
                label,
                value,
                info: (),
                position: SourceSpan::join(start, end),
            })))
        }
        Keyword::Continue => {
            p.advance();
            let label = parse_optional_label(p);
            Ok(Expression::Continue {
                label,
                info: (),
                position: start,
            })
        }
        _ => Err(p.expected("an expression")),
    }
}

/// `@label: loop { .. }` / `@label: while .. { .. }` / `@label: for .. { .. }`.
fn parse_labeled_loop(p: &mut Parser, start: SourceSpan) -> PResult<Expression<()>> {
    p.advance();
    let (label, _) = p.expect_identifier()?;
    p.expect_punct(Punctuator::Colon)?;
    match p.peek().clone() {
        Token::Keyword { keyword: Keyword::Loop, .. } => parse_loop(p, Some(label)),
        Token::Keyword { keyword: Keyword::While, .. } => parse_while(p, Some(label)),
        Token::Keyword { keyword: Keyword::For, .. } => parse_for(p, Some(label)),
        _ => Err(p.expected("'loop', 'while', or 'for' after a label")),
    }
    .map(|e| {
        let _ = start;
        e
    })
}

fn parse_optional_label(p: &mut Parser) -> Option<String> {
    if p.check_punct(Punctuator::At) {
        p.advance();
        p.expect_identifier().ok().map(|(n, _)| n)
    } else {
        None
    }
}

fn parse_array_literal(p: &mut Parser, start: SourceSpan) -> PResult<Expression<()>> {
    p.expect_punct(Punctuator::LBracket)?;
    let mut elements = Vec::new();
    if !p.check_punct(Punctuator::RBracket) {
        loop {
            elements.push(parse_expression(p)?);
            if !p.match_punct(Punctuator::Comma) {
                break;
            }
        }
    }
    let end = p.expect_punct(Punctuator::RBracket)?;
    Ok(Expression::ArrayLiteral {
        elements,
        info: (),
        position: SourceSpan::join(start, end),
    })
}

fn parse_parens_or_tuple(p: &mut Parser, start: SourceSpan) -> PResult<Expression<()>> {
    p.advance();
    if p.match_punct(Punctuator::RParen) {
        return Ok(Expression::Tuple {
            elements: Vec::new(),
            info: (),
            position: start,
        });
    }
    let first = parse_expression(p)?;
    if p.match_punct(Punctuator::Comma) {
        let mut elements = vec![first];
        while !p.check_punct(Punctuator::RParen) {
            elements.push(parse_expression(p)?);
            if !p.match_punct(Punctuator::Comma) {
                break;
            }
        }
        let end = p.expect_punct(Punctuator::RParen)?;
        return Ok(Expression::Tuple {
            elements,
            info: (),
            position: SourceSpan::join(start, end),
        });
    }
    p.expect_punct(Punctuator::RParen)?;
    Ok(Expression::Parens(Box::new(first)))
}

fn parse_struct_literal(p: &mut Parser, type_name: crate::ast::TypeName, start: SourceSpan) -> PResult<Expression<()>> {
    p.expect_punct(Punctuator::LBrace)?;
    let mut fields = Vec::new();
    let mut spread = None;
    while !p.check_punct(Punctuator::RBrace) {
        if p.match_punct(Punctuator::DotDot) {
            spread = Some(parse_expression(p)?);
            break;
        }
        let (name, name_pos) = p.expect_identifier()?;
        let value = if p.match_punct(Punctuator::Colon) {
            parse_expression(p)?
        } else {
            Expression::Identifier {
                name: name.clone(),
                info: (),
                position: name_pos,
            }
        };
        fields.push((name, value));
        if !p.match_punct(Punctuator::Comma) {
            break;
        }
    }
    let end = p.expect_punct(Punctuator::RBrace)?;
    Ok(Expression::StructLiteral(Box::new(StructLiteralExpr {
        type_name,
        fields,
        spread,
        info: (),
        position: SourceSpan::join(start, end),
    })))
}

fn parse_closure(p: &mut Parser, is_move: bool, start: SourceSpan) -> PResult<Expression<()>> {
    p.expect_punct(Punctuator::Pipe)?;
    let mut params = Vec::new();
    if !p.check_punct(Punctuator::Pipe) {
        loop {
            let (name, pos) = p.expect_identifier()?;
            let type_annotation = if p.match_punct(Punctuator::Colon) {
                Some(parse_type_name(p)?)
            } else {
                None
            };
            params.push(ClosureParam {
                name,
                type_annotation,
                info: (),
                position: pos,
            });
            if !p.match_punct(Punctuator::Comma) {
                break;
            }
        }
    }
    p.expect_punct(Punctuator::Pipe)?;
    let return_type = if p.match_punct(Punctuator::Arrow) {
        Some(parse_type_name(p)?)
    } else {
        None
    };
    let body = parse_expression(p)?;
    let position = SourceSpan::join(start, body.position());
    Ok(Expression::Closure(Box::new(ClosureExpr {
        params,
        return_type,
        body,
        is_move,
        info: (),
        position,
    })))
}

fn parse_if(p: &mut Parser) -> PResult<Expression<()>> {
    let start = p.expect_keyword(Keyword::If)?;

    if p.check_keyword(Keyword::Let) {
        p.advance();
        let pattern = parse_pattern(p)?;
        p.expect_punct(Punctuator::Assign)?;
        let scrutinee = parse_condition_expr(p)?;
        let then_branch = parse_block(p)?;
        let else_branch = parse_else(p)?;
        let position = SourceSpan::join(start, else_branch.as_ref().map(|e| e.position()).unwrap_or(then_branch.position));
        return Ok(Expression::IfLet(Box::new(IfLetExpr {
            pattern,
            scrutinee,
            then_branch,
            else_branch,
            info: (),
            position,
        })));
    }

    let condition = parse_condition_expr(p)?;
    let then_branch = parse_block(p)?;
    let else_branch = parse_else(p)?;
    let position = SourceSpan::join(start, else_branch.as_ref().map(|e| e.position()).unwrap_or(then_branch.position));
    Ok(Expression::If(Box::new(IfExpr {
        condition,
        then_branch,
        else_branch,
        info: (),
        position,
    })))
}

fn parse_else(p: &mut Parser) -> PResult<Option<Expression<()>>> {
    p.skip_newlines_if_continuation();
    if !p.match_keyword(Keyword::Else) {
        return Ok(None);
    }
    if p.check_keyword(Keyword::If) {
        Ok(Some(parse_if(p)?))
    } else {
        let block = parse_block(p)?;
        Ok(Some(Expression::Block(Box::new(block))))
    }
}

fn parse_condition_expr(p: &mut Parser) -> PResult<Expression<()>> {
    let was_allowed = p.struct_literal_allowed;
    p.struct_literal_allowed = false;
    let result = parse_expression(p);
    p.struct_literal_allowed = was_allowed;
    result
}

fn parse_when(p: &mut Parser) -> PResult<Expression<()>> {
    let start = p.expect_keyword(Keyword::When)?;
    let scrutinee = parse_condition_expr(p)?;
    p.expect_punct(Punctuator::LBrace)?;
    p.skip_newlines();
    let mut arms = Vec::new();
    while !p.check_punct(Punctuator::RBrace) {
        let pattern = parse_pattern_or(p)?;
        let guard = if p.match_keyword(Keyword::If) {
            Some(parse_expression(p)?)
        } else {
            None
        };
        p.expect_punct(Punctuator::FatArrow)?;
        let body = parse_expression(p)?;
        let position = SourceSpan::join(pattern.position(), body.position());
        arms.push(WhenArm {
            pattern,
            guard,
            body,
            info: (),
            position,
        });
        p.match_punct(Punctuator::Comma);
        p.skip_newlines();
    }
    let end = p.expect_punct(Punctuator::RBrace)?;
    Ok(Expression::When(Box::new(WhenExpr {
        scrutinee,
        arms,
        info: (),
        position: SourceSpan::join(start, end),
    })))
}

fn parse_loop(p: &mut Parser, label: Option<String>) -> PResult<Expression<()>> {
    let start = p.expect_keyword(Keyword::Loop)?;
    let body = parse_block(p)?;
    let position = SourceSpan::join(start, body.position);
    Ok(Expression::Loop(Box::new(LoopExpr {
        label,
        body,
        info: (),
        position,
    })))
}

fn parse_while(p: &mut Parser, label: Option<String>) -> PResult<Expression<()>> {
    let start = p.expect_keyword(Keyword::While)?;
    let condition = parse_condition_expr(p)?;
    let body = parse_block(p)?;
    let position = SourceSpan::join(start, body.position);
    Ok(Expression::While(Box::new(WhileExpr {
        label,
        condition,
        body,
        info: (),
        position,
    })))
}

fn parse_for(p: &mut Parser, label: Option<String>) -> PResult<Expression<()>> {
    let start = p.expect_keyword(Keyword::For)?;
    let pattern = parse_pattern(p)?;
    p.expect_keyword(Keyword::In)?;
    let iterable = parse_condition_expr(p)?;
    let body = parse_block(p)?;
    let position = SourceSpan::join(start, body.position);
    Ok(Expression::For(Box::new(ForExpr {
        label,
        pattern,
        iterable,
        body,
        info: (),
        position,
    })))
}

pub fn parse_block(p: &mut Parser) -> PResult<Block<()>> {
    let start = p.expect_punct(Punctuator::LBrace)?;
    p.skip_newlines();
    let mut statements = Vec::new();
    let mut trailing = None;

    while !p.check_punct(Punctuator::RBrace) && !p.at_eof() {
        if p.at_decl_keyword() || p.check_punct(Punctuator::At) {
            let decl = parse_declaration_keyword(p)?;
            statements.push(Statement::Declaration(Box::new(decl)));
            p.skip_newlines();
            continue;
        }

        if p.check_keyword(Keyword::Let) || p.check_keyword(Keyword::Var) {
            let is_var = p.check_keyword(Keyword::Var);
            p.advance();
            let pattern = parse_pattern(p)?;
            let type_annotation = if p.match_punct(Punctuator::Colon) {
                Some(parse_type_name(p)?)
            } else {
                None
            };
            p.expect_punct(Punctuator::Assign)?;
            let value = parse_expression(p)?;
            let position = SourceSpan::join(pattern.position(), value.position());
            if is_var {
                statements.push(Statement::Var(VarStatement {
                    pattern,
                    type_annotation,
                    value,
                    info: (),
                    position,
                }));
            } else {
                statements.push(Statement::Let(LetStatement {
                    pattern,
                    type_annotation,
                    value,
                    info: (),
                    position,
                }));
            }
            finish_statement(p)?;
            continue;
        }

        let expr = parse_expression(p)?;
        if p.check_punct(Punctuator::RBrace) {
            trailing = Some(Box::new(expr));
            break;
        }
        let position = expr.position();
        statements.push(Statement::Expression(crate::ast::ExpressionStatement {
            expression: expr,
            info: (),
            position,
        }));
        finish_statement(p)?;
    }

    let end = p.expect_punct(Punctuator::RBrace)?;
    Ok(Block {
        statements,
        trailing,
        info: (),
        position: SourceSpan::join(start, end),
    })
}

/// Consumes the statement terminator: a `;`, a significant newline, or the
/// closing `}` (for a block's last statement written without either).
fn finish_statement(p: &mut Parser) -> PResult<()> {
    if p.match_punct(Punctuator::Semicolon) {
        p.skip_newlines();
        return Ok(());
    }
    if matches!(p.peek(), Token::Newline { .. }) {
        p.skip_newlines();
        return Ok(());
    }
    if p.check_punct(Punctuator::RBrace) || p.at_eof() {
        return Ok(());
    }
    if p.try_recover_missing_semi() {
        return Ok(());
    }
    Err(p.expected("';' or a newline to end the statement"))
}

fn convert_base(base: lexer::IntBase) -> crate::ast::IntBase {
    match base {
        lexer::IntBase::Decimal => crate::ast::IntBase::Decimal,
        lexer::IntBase::Hex => crate::ast::IntBase::Hex,
        lexer::IntBase::Octal => crate::ast::IntBase::Octal,
        lexer::IntBase::Binary => crate::ast::IntBase::Binary,
    }
}

fn suffix_name(suffix: lexer::NumericSuffix) -> Option<String> {
    use lexer::NumericSuffix as S;
    let text = match suffix {
        S::None => return None,
        S::I8 => "i8",
        S::I16 => "i16",
        S::I32 => "i32",
        S::I64 => "i64",
        S::I128 => "i128",
        S::Isize => "isize",
        S::U8 => "u8",
        S::U16 => "u16",
        S::U32 => "u32",
        S::U64 => "u64",
        S::U128 => "u128",
        S::Usize => "usize",
        S::F32 => "f32",
        S::F64 => "f64",
    };
    Some(text.to_string())
}

fn convert_fragments(fragments: Vec<lexer::StringFragment>) -> PResult<Vec<InterpolationFragment<()>>> {
    fragments
        .into_iter()
        .map(|f| match f {
            lexer::StringFragment::Text(t) => Ok(InterpolationFragment::Text(t)),
            lexer::StringFragment::Expr(src) => {
                let source = crate::source::Source::new("<interpolation>", src);
                let (tokens, _errs) = crate::lexer::Lexer::new(&source).tokenize();
                let mut inner = Parser::new(tokens);
                let expr = parse_expression(&mut inner)?;
                Ok(InterpolationFragment::Expr(Box::new(expr)))
            }
        })
        .collect()
}

impl Parser {
    /// `else` may sit on the line after a closing `}` — peek past a
    /// newline without consuming it unless an `else` actually follows.
    fn skip_newlines_if_continuation(&mut self) {
        let checkpoint = self.pos;
        self.skip_newlines();
        if !self.check_keyword(Keyword::Else) {
            self.pos = checkpoint;
        }
    }
}
