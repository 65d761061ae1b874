//! Type syntax: named types, references, raw pointers, arrays/slices,
//! tuples, function types, and the two behavior-object forms (`dyn B`,
//! `impl B`).

use crate::ast::{GenericParam, TypeName, WhereClauseItem};
use crate::lexer::{Keyword, Punctuator, Token};
use crate::source::SourceSpan;

use super::{PResult, Parser};

pub fn parse_type_name(p: &mut Parser) -> PResult<TypeName> {
    let start = p.peek().position();

    if p.match_punct(Punctuator::Amp) {
        let mutable = p.match_keyword(Keyword::Mut);
        let inner = parse_type_name(p)?;
        return Ok(TypeName::Reference {
            mutable,
            position: SourceSpan::join(start, inner.position()),
            inner: Box::new(inner),
        });
    }

    if p.match_punct(Punctuator::Star) {
        let mutable = p.match_keyword(Keyword::Mut);
        let inner = parse_type_name(p)?;
        return Ok(TypeName::RawPointer {
            mutable,
            position: SourceSpan::join(start, inner.position()),
            inner: Box::new(inner),
        });
    }

    if p.match_keyword(Keyword::Dyn) {
        let behavior = parse_type_name(p)?;
        return Ok(TypeName::Dyn {
            position: SourceSpan::join(start, behavior.position()),
            behavior: Box::new(behavior),
        });
    }

    if p.check_keyword(Keyword::Func) && matches!(p.peek_next(), Token::Punctuator { punct: Punctuator::LParen, .. }) {
        p.advance();
        p.expect_punct(Punctuator::LParen)?;
        let mut params = Vec::new();
        if !p.check_punct(Punctuator::RParen) {
            loop {
                params.push(parse_type_name(p)?);
                if !p.match_punct(Punctuator::Comma) {
                    break;
                }
            }
        }
        let end = p.expect_punct(Punctuator::RParen)?;
        let ret = if p.match_punct(Punctuator::Arrow) {
            parse_type_name(p)?
        } else {
            TypeName::simple("Unit", end)
        };
        return Ok(TypeName::Function {
            position: SourceSpan::join(start, ret.position()),
            params,
            ret: Box::new(ret),
        });
    }

    if p.check_punct(Punctuator::LBracket) {
        p.advance();
        let inner = parse_type_name(p)?;
        if p.match_punct(Punctuator::Semicolon) {
            let (size, _) = parse_array_size(p)?;
            let end = p.expect_punct(Punctuator::RBracket)?;
            return Ok(TypeName::Array {
                position: SourceSpan::join(start, end),
                inner: Box::new(inner),
                size,
            });
        }
        let end = p.expect_punct(Punctuator::RBracket)?;
        return Ok(TypeName::Slice {
            position: SourceSpan::join(start, end),
            inner: Box::new(inner),
        });
    }

    if p.check_punct(Punctuator::LParen) {
        p.advance();
        let mut elements = Vec::new();
        if !p.check_punct(Punctuator::RParen) {
            loop {
                elements.push(parse_type_name(p)?);
                if !p.match_punct(Punctuator::Comma) {
                    break;
                }
            }
        }
        let end = p.expect_punct(Punctuator::RParen)?;
        return Ok(TypeName::Tuple {
            position: SourceSpan::join(start, end),
            elements,
        });
    }

    // named type: possibly dotted path, then optional `[args]`.
    let (first, mut end) = p.expect_identifier()?;
    let mut path = Vec::new();
    let mut name = first;
    while p.check_punct(Punctuator::Dot)
        && matches!(p.peek_next(), Token::Identifier { .. })
    {
        p.advance();
        path.push(name);
        let (next, next_end) = p.expect_identifier()?;
        name = next;
        end = next_end;
    }

    let mut type_args = Vec::new();
    if p.match_punct(Punctuator::LBracket) {
        loop {
            type_args.push(parse_type_name(p)?);
            if !p.match_punct(Punctuator::Comma) {
                break;
            }
        }
        end = p.expect_punct(Punctuator::RBracket)?;
    }

    Ok(TypeName::Named {
        position: SourceSpan::join(start, end),
        path,
        name,
        type_args,
    })
}

fn parse_array_size(p: &mut Parser) -> PResult<(u64, SourceSpan)> {
    match p.peek().clone() {
        Token::Integer { value, position, .. } => {
            p.advance();
            Ok((value as u64, position))
        }
        _ => Err(p.expected("an array size integer")),
    }
}

/// `[T, U: Bound1 + Bound2]` — absent entirely when the item is non-generic.
pub fn parse_generics(p: &mut Parser) -> PResult<Vec<GenericParam>> {
    if !p.match_punct(Punctuator::LBracket) {
        return Ok(Vec::new());
    }
    let mut params = Vec::new();
    loop {
        if p.check_punct(Punctuator::RBracket) {
            break;
        }
        let (name, start) = p.expect_identifier()?;
        let mut bounds = Vec::new();
        let mut end = start;
        if p.match_punct(Punctuator::Colon) {
            loop {
                let bound = parse_type_name(p)?;
                end = bound.position();
                bounds.push(bound);
                if !p.match_punct(Punctuator::Plus) {
                    break;
                }
            }
        }
        params.push(GenericParam {
            name,
            bounds,
            position: SourceSpan::join(start, end),
        });
        if !p.match_punct(Punctuator::Comma) {
            break;
        }
    }
    p.expect_punct(Punctuator::RBracket)?;
    Ok(params)
}

/// `where T: Behavior, U: Other` — absent when there is no clause.
pub fn parse_where_clause(p: &mut Parser) -> PResult<Vec<WhereClauseItem>> {
    if !p.match_keyword(Keyword::Where) {
        return Ok(Vec::new());
    }
    let mut items = Vec::new();
    loop {
        let subject = parse_type_name(p)?;
        p.expect_punct(Punctuator::Colon)?;
        let mut bounds = Vec::new();
        let mut end = subject.position();
        loop {
            let bound = parse_type_name(p)?;
            end = bound.position();
            bounds.push(bound);
            if !p.match_punct(Punctuator::Plus) {
                break;
            }
        }
        items.push(WhereClauseItem {
            position: SourceSpan::join(subject.position(), end),
            subject,
            bounds,
        });
        if !p.match_punct(Punctuator::Comma) {
            break;
        }
    }
    Ok(items)
}
