use crate::ast::{EnumPatternElements, LiteralPattern, Pattern};
use crate::lexer::{Keyword, Punctuator, Token};
use crate::source::SourceSpan;

use super::{PResult, Parser};

/// Parses a full match-arm pattern, including a top-level `A | B` or-pattern
/// (the grammar only allows `|` at the top of an arm, never nested).
pub fn parse_pattern_or(p: &mut Parser) -> PResult<Pattern<()>> {
    let first = parse_pattern(p)?;
    if !p.check_punct(Punctuator::Pipe) {
        return Ok(first);
    }
    let start = first.position();
    let mut alternatives = vec![first];
    while p.match_punct(Punctuator::Pipe) {
        alternatives.push(parse_pattern(p)?);
    }
    let end = alternatives.last().unwrap().position();
    Ok(Pattern::Or {
        position: SourceSpan::join(start, end),
        alternatives,
        info: (),
    })
}

pub fn parse_pattern(p: &mut Parser) -> PResult<Pattern<()>> {
    let start = p.peek().position();

    if p.check_punct(Punctuator::LParen) {
        p.advance();
        let mut elements = Vec::new();
        if !p.check_punct(Punctuator::RParen) {
            loop {
                elements.push(parse_pattern(p)?);
                if !p.match_punct(Punctuator::Comma) {
                    break;
                }
            }
        }
        let end = p.expect_punct(Punctuator::RParen)?;
        return Ok(Pattern::Tuple {
            position: SourceSpan::join(start, end),
            elements,
            info: (),
        });
    }

    if p.check_punct(Punctuator::LBracket) {
        p.advance();
        let mut elements = Vec::new();
        let mut rest = None;
        while !p.check_punct(Punctuator::RBracket) {
            if p.match_punct(Punctuator::DotDot) {
                let name = if let Token::Identifier { name, .. } = p.peek().clone() {
                    p.advance();
                    Some(name)
                } else {
                    None
                };
                rest = Some(name);
            } else {
                elements.push(parse_pattern(p)?);
            }
            if !p.match_punct(Punctuator::Comma) {
                break;
            }
        }
        let end = p.expect_punct(Punctuator::RBracket)?;
        return Ok(Pattern::Array {
            position: SourceSpan::join(start, end),
            elements,
            rest,
            info: (),
        });
    }

    if p.match_keyword(Keyword::Mut) {
        let (name, end) = p.expect_identifier()?;
        return Ok(Pattern::Identifier {
            position: SourceSpan::join(start, end),
            name,
            mutable: true,
            info: (),
        });
    }

    match p.peek().clone() {
        Token::Identifier { name, position } if name == "_" => {
            p.advance();
            Ok(Pattern::Wildcard { position, info: () })
        }
        Token::Identifier { name, position } => {
            p.advance();
            if p.check_punct(Punctuator::LParen) {
                return parse_enum_tuple_pattern(p, Vec::new(), name, position);
            }
            if p.check_punct(Punctuator::LBrace) {
                return parse_struct_or_variant_pattern(p, Vec::new(), name, position);
            }
            if p.check_punct(Punctuator::ColonColon) {
                let mut path = vec![name];
                let mut last_pos = position;
                while p.match_punct(Punctuator::ColonColon) {
                    let (seg, seg_pos) = p.expect_identifier()?;
                    path.push(seg);
                    last_pos = seg_pos;
                }
                let variant = path.pop().unwrap();
                if p.check_punct(Punctuator::LParen) {
                    return parse_enum_tuple_pattern(p, path, variant, last_pos);
                }
                if p.check_punct(Punctuator::LBrace) {
                    return parse_struct_or_variant_pattern(p, path, variant, last_pos);
                }
                return Ok(Pattern::EnumVariant {
                    position: SourceSpan::join(position, last_pos),
                    path,
                    enum_name: None,
                    variant,
                    elements: EnumPatternElements::Unit,
                    info: (),
                });
            }
            Ok(Pattern::Identifier {
                position,
                name,
                mutable: false,
                info: (),
            })
        }
        Token::Integer { value, position, .. } => {
            p.advance();
            Ok(Pattern::Literal {
                position,
                value: LiteralPattern::Int {
                    value,
                    negative: false,
                },
                info: (),
            })
        }
        Token::Punctuator {
            punct: Punctuator::Minus,
            ..
        } => {
            p.advance();
            match p.peek().clone() {
                Token::Integer { value, position, .. } => {
                    p.advance();
                    Ok(Pattern::Literal {
                        position: SourceSpan::join(start, position),
                        value: LiteralPattern::Int {
                            value,
                            negative: true,
                        },
                        info: (),
                    })
                }
                Token::Float { value, position, .. } => {
                    p.advance();
                    Ok(Pattern::Literal {
                        position: SourceSpan::join(start, position),
                        value: LiteralPattern::Float(-value),
                        info: (),
                    })
                }
                _ => Err(p.expected("a numeric literal after '-'")),
            }
        }
        Token::Float { value, position, .. } => {
            p.advance();
            Ok(Pattern::Literal {
                position,
                value: LiteralPattern::Float(value),
                info: (),
            })
        }
        Token::StringLiteral { value, position } => {
            p.advance();
            Ok(Pattern::Literal {
                position,
                value: LiteralPattern::Str(value),
                info: (),
            })
        }
        Token::CharLiteral { value, position } => {
            p.advance();
            Ok(Pattern::Literal {
                position,
                value: LiteralPattern::Char(value),
                info: (),
            })
        }
        Token::BoolLiteral { value, position } => {
            p.advance();
            Ok(Pattern::Literal {
                position,
                value: LiteralPattern::Bool(value),
                info: (),
            })
        }
        Token::NullLiteral { position } => {
            p.advance();
            Ok(Pattern::Literal {
                position,
                value: LiteralPattern::Null,
                info: (),
            })
        }
        _ => Err(p.expected("a pattern")),
    }
}

fn parse_enum_tuple_pattern(
    p: &mut Parser,
    path: Vec<String>,
    variant: String,
    start: SourceSpan,
) -> PResult<Pattern<()>> {
    p.expect_punct(Punctuator::LParen)?;
    let mut elements = Vec::new();
    if !p.check_punct(Punctuator::RParen) {
        loop {
            elements.push(parse_pattern(p)?);
            if !p.match_punct(Punctuator::Comma) {
                break;
            }
        }
    }
    let end = p.expect_punct(Punctuator::RParen)?;
    Ok(Pattern::EnumVariant {
        position: SourceSpan::join(start, end),
        path,
        enum_name: None,
        variant,
        elements: EnumPatternElements::Tuple(elements),
        info: (),
    })
}

/// `Name { x, y: pat, .. }` — could name a struct or an enum's struct-shaped
/// variant; that ambiguity is resolved later once `Name` is resolved against
/// the type environment, so the parser always emits `Pattern::Struct` here.
fn parse_struct_or_variant_pattern(
    p: &mut Parser,
    path: Vec<String>,
    name: String,
    start: SourceSpan,
) -> PResult<Pattern<()>> {
    p.expect_punct(Punctuator::LBrace)?;
    let mut fields = Vec::new();
    let mut has_rest = false;
    while !p.check_punct(Punctuator::RBrace) {
        if p.match_punct(Punctuator::DotDot) {
            has_rest = true;
            break;
        }
        let (field_name, field_pos) = p.expect_identifier()?;
        let pattern = if p.match_punct(Punctuator::Colon) {
            parse_pattern(p)?
        } else {
            Pattern::Identifier {
                position: field_pos,
                name: field_name.clone(),
                mutable: false,
                info: (),
            }
        };
        fields.push((field_name, pattern));
        if !p.match_punct(Punctuator::Comma) {
            break;
        }
    }
    let end = p.expect_punct(Punctuator::RBrace)?;
    Ok(Pattern::Struct {
        position: SourceSpan::join(start, end),
        path,
        name,
        type_args: Vec::new(),
        fields,
        has_rest,
        info: (),
    })
}
