//! One `parse_*` per declaration keyword, dispatched from
//! `parse_declaration` on the leading token. Decorators (`@inline`,
//! `@extern(...)`) are collected ahead of whatever they're attached to and
//! threaded through as a plain `Vec<Decorator>` rather than a typed enum,
//! since new decorators shouldn't need a grammar change to add.

use crate::ast::{
    BehaviorDecl, ClassDecl, ClassFieldDecl, ClassMember, ConstDecl, ConstructorDecl, Decorator,
    DecoratorArg, Declaration, EnumDecl, EnumVariant, EnumVariantPayload, FunctionDecl, ImplDecl,
    ImplItem, InterfaceDecl, MethodDecl, ModuleDecl, NamespaceDecl, Param, PropertyDecl,
    StructDecl, StructField, TypeAliasDecl, UnionDecl, UseDecl, UseItem, UseKind, Visibility,
};
use crate::lexer::{Keyword, Punctuator, Token};
use crate::source::SourceSpan;

use super::expr::{parse_block, parse_expression};
use super::types::{parse_generics, parse_type_name, parse_where_clause};
use super::{PResult, Parser};

pub fn parse_declaration(p: &mut Parser) -> PResult<Declaration<()>> {
    p.skip_trivia();
    let decorators = parse_decorators(p)?;
    let doc = p.collect_doc_comment();
    let visibility = parse_visibility(p);
    parse_declaration_body(p, decorators, doc, visibility)
}

/// Parses a declaration nested inside a block body — locally scoped
/// functions, structs, etc. Visibility modifiers are meaningless there but
/// harmless to accept, so this shares the same body parser.
pub fn parse_declaration_keyword(p: &mut Parser) -> PResult<Declaration<()>> {
    parse_declaration(p)
}

fn parse_decorators(p: &mut Parser) -> PResult<Vec<Decorator>> {
    let mut decorators = Vec::new();
    while p.check_punct(Punctuator::At) {
        let start = p.peek().position();
        p.advance();
        let (name, mut end) = p.expect_identifier()?;
        let mut args = Vec::new();
        if p.match_punct(Punctuator::LParen) {
            if !p.check_punct(Punctuator::RParen) {
                loop {
                    args.push(parse_decorator_arg(p)?);
                    if !p.match_punct(Punctuator::Comma) {
                        break;
                    }
                }
            }
            end = p.expect_punct(Punctuator::RParen)?;
        }
        decorators.push(Decorator {
            name,
            args,
            position: SourceSpan::join(start, end),
        });
        p.skip_trivia();
    }
    Ok(decorators)
}

fn parse_decorator_arg(p: &mut Parser) -> PResult<DecoratorArg> {
    match p.peek().clone() {
        Token::StringLiteral { value, .. } => {
            p.advance();
            Ok(DecoratorArg::Str(value))
        }
        Token::Integer { value, .. } => {
            p.advance();
            Ok(DecoratorArg::Int(value as i64))
        }
        Token::Identifier { name, .. } => {
            p.advance();
            Ok(DecoratorArg::Ident(name))
        }
        _ => Err(p.expected("a decorator argument")),
    }
}

fn parse_visibility(p: &mut Parser) -> Visibility {
    if p.match_keyword(Keyword::Pub) {
        Visibility::Public
    } else if p.match_keyword(Keyword::Protected) {
        Visibility::Protected
    } else if p.match_keyword(Keyword::Private) {
        Visibility::Private
    } else {
        Visibility::Private
    }
}

fn parse_declaration_body(
    p: &mut Parser,
    decorators: Vec<Decorator>,
    doc: Option<String>,
    visibility: Visibility,
) -> PResult<Declaration<()>> {
    match p.peek().clone() {
        Token::Keyword { keyword: Keyword::Func, .. } => {
            let start = p.expect_keyword(Keyword::Func)?;
            parse_function(p, decorators, doc, visibility, false, start).map(Declaration::Function)
        }
        Token::Keyword { keyword: Keyword::Async, .. } => {
            let start = p.advance().position();
            p.expect_keyword(Keyword::Func)?;
            parse_function(p, decorators, doc, visibility, true, start).map(Declaration::Function)
        }
        Token::Keyword { keyword: Keyword::Type, .. } => parse_type_decl(p, doc, visibility),
        Token::Keyword { keyword: Keyword::Struct, .. } => {
            parse_struct(p, doc, visibility).map(Declaration::Struct)
        }
        Token::Keyword { keyword: Keyword::Enum, .. } => {
            parse_enum(p, doc, visibility).map(Declaration::Enum)
        }
        Token::Keyword { keyword: Keyword::Union, .. } => {
            parse_union(p, doc, visibility).map(Declaration::Union)
        }
        Token::Keyword { keyword: Keyword::Class, .. } => {
            parse_class(p, doc, visibility).map(Declaration::Class)
        }
        Token::Keyword { keyword: Keyword::Interface, .. } => {
            parse_interface(p, doc, visibility).map(Declaration::Interface)
        }
        Token::Keyword { keyword: Keyword::Behavior, .. } => {
            parse_behavior(p, doc, visibility).map(Declaration::Behavior)
        }
        Token::Keyword { keyword: Keyword::Impl, .. } => parse_impl(p).map(Declaration::Impl),
        Token::Keyword { keyword: Keyword::Const, .. } => {
            parse_const(p, doc, visibility).map(Declaration::Const)
        }
        Token::Keyword { keyword: Keyword::Use, .. } => parse_use(p).map(Declaration::Use),
        Token::Keyword { keyword: Keyword::Mod, .. } => parse_mod(p).map(Declaration::Module),
        Token::Keyword { keyword: Keyword::Namespace, .. } => {
            parse_namespace(p).map(Declaration::Namespace)
        }
        Token::Keyword { keyword: Keyword::Abstract, .. }
        | Token::Keyword { keyword: Keyword::Sealed, .. } => {
            let mut is_abstract = false;
            let mut is_sealed = false;
            loop {
                if p.match_keyword(Keyword::Abstract) {
                    is_abstract = true;
                } else if p.match_keyword(Keyword::Sealed) {
                    is_sealed = true;
                } else {
                    break;
                }
            }
            p.expect_keyword(Keyword::Class)?;
            parse_class_body(p, doc, visibility, is_abstract, is_sealed).map(Declaration::Class)
        }
        _ => Err(p.expected("a declaration")),
    }
}

fn parse_params(p: &mut Parser) -> PResult<Vec<Param<()>>> {
    p.expect_punct(Punctuator::LParen)?;
    let mut params = Vec::new();
    if !p.check_punct(Punctuator::RParen) {
        loop {
            p.skip_newlines();
            let (name, start) = p.expect_identifier()?;
            let type_annotation = if p.match_punct(Punctuator::Colon) {
                Some(parse_type_name(p)?)
            } else {
                None
            };
            let default = if p.match_punct(Punctuator::Assign) {
                Some(parse_expression(p)?)
            } else {
                None
            };
            let end = default
                .as_ref()
                .map(|e| e.position())
                .or_else(|| type_annotation.as_ref().map(|t| t.position()))
                .unwrap_or(start);
            params.push(Param {
                name,
                type_annotation,
                default,
                info: (),
                position: SourceSpan::join(start, end),
            });
            p.skip_newlines();
            if !p.match_punct(Punctuator::Comma) {
                break;
            }
        }
    }
    p.skip_newlines();
    p.expect_punct(Punctuator::RParen)?;
    Ok(params)
}

fn parse_function(
    p: &mut Parser,
    decorators: Vec<Decorator>,
    doc: Option<String>,
    visibility: Visibility,
    is_async: bool,
    start: SourceSpan,
) -> PResult<FunctionDecl<()>> {
    let (name, _) = p.expect_identifier()?;
    let generics = parse_generics(p)?;
    let params = parse_params(p)?;
    let return_type = if p.match_punct(Punctuator::Arrow) {
        Some(parse_type_name(p)?)
    } else {
        None
    };
    let where_clause = parse_where_clause(p)?;
    let (body, end) = if p.check_punct(Punctuator::LBrace) {
        let block = parse_block(p)?;
        let end = block.position;
        (Some(block), end)
    } else {
        let end = p.expect_punct(Punctuator::Semicolon)?;
        (None, end)
    };
    Ok(FunctionDecl {
        name,
        generics,
        params,
        return_type,
        where_clause,
        body,
        decorators,
        doc,
        visibility,
        is_async,
        info: (),
        position: SourceSpan::join(start, end),
    })
}

/// `type Name[generics] = Target` for a plain alias, or
/// `type Name[generics] = V1 | V2(T) | V3 { x: T }` for a sum type, which
/// desugars directly into an `Enum` declaration — the two forms produce
/// identical semantics, so there is no separate "sum type" AST node.
fn parse_type_decl(p: &mut Parser, doc: Option<String>, visibility: Visibility) -> PResult<Declaration<()>> {
    let start = p.expect_keyword(Keyword::Type)?;
    let (name, _) = p.expect_identifier()?;
    let generics = parse_generics(p)?;
    p.expect_punct(Punctuator::Assign)?;

    if looks_like_sum_type(p) {
        let mut variants = Vec::new();
        loop {
            variants.push(parse_sum_variant(p)?);
            if !p.match_punct(Punctuator::Pipe) {
                break;
            }
        }
        let end = variants.last().unwrap().position;
        return Ok(Declaration::Enum(EnumDecl {
            name,
            generics,
            variants,
            doc,
            visibility,
            info: (),
            position: SourceSpan::join(start, end),
        }));
    }

    let target = parse_type_name(p)?;
    let end = target.position();
    Ok(Declaration::TypeAlias(TypeAliasDecl {
        name,
        generics,
        target,
        doc,
        visibility,
        info: (),
        position: SourceSpan::join(start, end),
    }))
}

/// A sum type's right-hand side is a `Name`/`Name(...)`/`Name { ... }` list
/// joined by `|`; a plain alias names a single type. Disambiguate by
/// checking whether a bare `|` ever follows the first identifier at this
/// position — cheap enough to look ahead token-by-token without a full
/// speculative parse.
fn looks_like_sum_type(p: &Parser) -> bool {
    matches!(p.peek(), Token::Identifier { .. }) && {
        let mut depth = 0i32;
        let mut i = 0usize;
        loop {
            let tok = p.token_at(i);
            match tok {
                Token::Punctuator { punct: Punctuator::LBrace | Punctuator::LParen, .. } => depth += 1,
                Token::Punctuator { punct: Punctuator::RBrace | Punctuator::RParen, .. } => depth -= 1,
                Token::Punctuator { punct: Punctuator::Pipe, .. } if depth == 0 => return true,
                Token::Newline { .. } | Token::Eof { .. } if depth == 0 => return false,
                Token::Punctuator { punct: Punctuator::Semicolon, .. } if depth == 0 => return false,
                _ => {}
            }
            i += 1;
            if i > 2048 {
                return false;
            }
        }
    }
}

fn parse_sum_variant(p: &mut Parser) -> PResult<EnumVariant<()>> {
    let (name, start) = p.expect_identifier()?;
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
        return Ok(EnumVariant {
            name,
            payload: EnumVariantPayload::Tuple(elements),
            doc: None,
            position: SourceSpan::join(start, end),
        });
    }
    if p.check_punct(Punctuator::LBrace) {
        let (fields, end) = parse_struct_fields(p)?;
        return Ok(EnumVariant {
            name,
            payload: EnumVariantPayload::Struct(fields),
            doc: None,
            position: SourceSpan::join(start, end),
        });
    }
    Ok(EnumVariant {
        name,
        payload: EnumVariantPayload::Unit,
        doc: None,
        position: start,
    })
}

fn parse_struct_fields(p: &mut Parser) -> PResult<(Vec<StructField<()>>, SourceSpan)> {
    p.expect_punct(Punctuator::LBrace)?;
    p.skip_newlines();
    let mut fields = Vec::new();
    while !p.check_punct(Punctuator::RBrace) {
        p.skip_trivia();
        let doc = p.collect_doc_comment();
        let visibility = parse_visibility(p);
        let (name, start) = p.expect_identifier()?;
        p.expect_punct(Punctuator::Colon)?;
        let type_annotation = parse_type_name(p)?;
        let end = type_annotation.position();
        fields.push(StructField {
            name,
            type_annotation,
            visibility,
            doc,
            info: (),
            position: SourceSpan::join(start, end),
        });
        if !p.match_punct(Punctuator::Comma) {
            p.skip_newlines();
            continue;
        }
        p.skip_newlines();
    }
    let end = p.expect_punct(Punctuator::RBrace)?;
    Ok((fields, end))
}

fn parse_struct(p: &mut Parser, doc: Option<String>, visibility: Visibility) -> PResult<StructDecl<()>> {
    let start = p.expect_keyword(Keyword::Struct)?;
    let (name, _) = p.expect_identifier()?;
    let generics = parse_generics(p)?;
    let (fields, end) = parse_struct_fields(p)?;
    Ok(StructDecl {
        name,
        generics,
        fields,
        doc,
        visibility,
        info: (),
        position: SourceSpan::join(start, end),
    })
}

fn parse_union(p: &mut Parser, doc: Option<String>, visibility: Visibility) -> PResult<UnionDecl<()>> {
    let start = p.expect_keyword(Keyword::Union)?;
    let (name, _) = p.expect_identifier()?;
    let generics = parse_generics(p)?;
    let (variants, end) = parse_struct_fields(p)?;
    Ok(UnionDecl {
        name,
        generics,
        variants,
        doc,
        visibility,
        info: (),
        position: SourceSpan::join(start, end),
    })
}

fn parse_enum(p: &mut Parser, doc: Option<String>, visibility: Visibility) -> PResult<EnumDecl<()>> {
    let start = p.expect_keyword(Keyword::Enum)?;
    let (name, _) = p.expect_identifier()?;
    let generics = parse_generics(p)?;
    p.expect_punct(Punctuator::LBrace)?;
    p.skip_newlines();
    let mut variants = Vec::new();
    while !p.check_punct(Punctuator::RBrace) {
        p.skip_trivia();
        let doc = p.collect_doc_comment();
        let mut variant = parse_sum_variant(p)?;
        variant.doc = doc;
        variants.push(variant);
        if !p.match_punct(Punctuator::Comma) {
            p.skip_newlines();
            continue;
        }
        p.skip_newlines();
    }
    let end = p.expect_punct(Punctuator::RBrace)?;
    Ok(EnumDecl {
        name,
        generics,
        variants,
        doc,
        visibility,
        info: (),
        position: SourceSpan::join(start, end),
    })
}

fn parse_class(p: &mut Parser, doc: Option<String>, visibility: Visibility) -> PResult<ClassDecl<()>> {
    p.expect_keyword(Keyword::Class)?;
    parse_class_body(p, doc, visibility, false, false)
}

fn parse_class_body(
    p: &mut Parser,
    doc: Option<String>,
    visibility: Visibility,
    is_abstract: bool,
    is_sealed: bool,
) -> PResult<ClassDecl<()>> {
    let start = p.previous().position();
    let (name, _) = p.expect_identifier()?;
    let generics = parse_generics(p)?;
    let extends = if p.match_keyword(Keyword::Extends) {
        Some(parse_type_name(p)?)
    } else {
        None
    };
    let mut implements = Vec::new();
    if p.match_keyword(Keyword::Implements) {
        loop {
            implements.push(parse_type_name(p)?);
            if !p.match_punct(Punctuator::Comma) {
                break;
            }
        }
    }
    p.expect_punct(Punctuator::LBrace)?;
    p.skip_newlines();
    let mut members = Vec::new();
    while !p.check_punct(Punctuator::RBrace) {
        members.push(parse_class_member(p)?);
        p.skip_newlines();
    }
    let end = p.expect_punct(Punctuator::RBrace)?;
    Ok(ClassDecl {
        name,
        generics,
        extends,
        implements,
        members,
        is_abstract,
        is_sealed,
        doc,
        visibility,
        info: (),
        position: SourceSpan::join(start, end),
    })
}

fn parse_class_member(p: &mut Parser) -> PResult<crate::ast::ClassMember<()>> {
    p.skip_trivia();
    let doc = p.collect_doc_comment();
    let visibility = parse_visibility(p);
    let is_static = p.match_keyword(Keyword::Static);
    let is_virtual = p.match_keyword(Keyword::Virtual);
    let is_override = p.match_keyword(Keyword::Override);
    let is_abstract = p.match_keyword(Keyword::Abstract);

    if p.check_keyword(Keyword::This) && matches!(p.peek_next(), Token::Punctuator { punct: Punctuator::LParen, .. }) {
        let start = p.peek().position();
        p.advance();
        let params = parse_params(p)?;
        let body = parse_block(p)?;
        let end = body.position;
        return Ok(ClassMember::Constructor(ConstructorDecl {
            params,
            body,
            visibility,
            info: (),
            position: SourceSpan::join(start, end),
        }));
    }

    if p.check_keyword(Keyword::Func) {
        let start = p.peek().position();
        p.advance();
        let (name, _) = p.expect_identifier()?;
        let generics = parse_generics(p)?;
        let takes_this = p.check_punct(Punctuator::LParen) && matches!(p.peek_next(), Token::Keyword { keyword: Keyword::This, .. } | Token::Keyword { keyword: Keyword::Mut, .. });
        let this_mut = takes_this && matches!(p.peek_next(), Token::Keyword { keyword: Keyword::Mut, .. });
        let params = if takes_this {
            p.advance();
            if this_mut {
                p.advance();
            }
            p.expect_keyword(Keyword::This)?;
            p.match_punct(Punctuator::Comma);
            let mut rest = Vec::new();
            while !p.check_punct(Punctuator::RParen) {
                let (pname, pstart) = p.expect_identifier()?;
                let type_annotation = if p.match_punct(Punctuator::Colon) {
                    Some(parse_type_name(p)?)
                } else {
                    None
                };
                rest.push(Param {
                    name: pname,
                    type_annotation,
                    default: None,
                    info: (),
                    position: pstart,
                });
                if !p.match_punct(Punctuator::Comma) {
                    break;
                }
            }
            p.expect_punct(Punctuator::RParen)?;
            rest
        } else {
            parse_params(p)?
        };
        let return_type = if p.match_punct(Punctuator::Arrow) {
            Some(parse_type_name(p)?)
        } else {
            None
        };
        let where_clause = parse_where_clause(p)?;
        let (body, end) = if p.check_punct(Punctuator::LBrace) {
            let block = parse_block(p)?;
            let end = block.position;
            (Some(block), end)
        } else {
            let end = p.expect_punct(Punctuator::Semicolon)?;
            (None, end)
        };
        return Ok(ClassMember::Method(MethodDecl {
            name,
            generics,
            params,
            return_type,
            where_clause,
            body,
            decorators: Vec::new(),
            doc,
            visibility,
            is_static,
            is_virtual,
            is_override,
            is_abstract,
            takes_this,
            this_mut,
            info: (),
            position: SourceSpan::join(start, end),
        }));
    }

    let start = p.peek().position();
    let (name, _) = p.expect_identifier()?;
    p.expect_punct(Punctuator::Colon)?;
    let type_annotation = parse_type_name(p)?;

    if p.check_punct(Punctuator::LBrace) {
        p.advance();
        p.skip_newlines();
        let mut getter = None;
        let mut setter = None;
        while !p.check_punct(Punctuator::RBrace) {
            let (kind, _) = p.expect_identifier()?;
            match kind.as_str() {
                "get" => getter = Some(parse_block(p)?),
                "set" => {
                    let param = if p.match_punct(Punctuator::LParen) {
                        let (n, _) = p.expect_identifier()?;
                        p.expect_punct(Punctuator::RParen)?;
                        n
                    } else {
                        "value".to_string()
                    };
                    setter = Some((param, parse_block(p)?));
                }
                _ => return Err(p.expected("'get' or 'set'")),
            }
            p.skip_newlines();
        }
        let end = p.expect_punct(Punctuator::RBrace)?;
        return Ok(ClassMember::Property(PropertyDecl {
            name,
            type_annotation,
            getter,
            setter,
            visibility,
            is_static,
            info: (),
            position: SourceSpan::join(start, end),
        }));
    }

    let default = if p.match_punct(Punctuator::Assign) {
        Some(parse_expression(p)?)
    } else {
        None
    };
    let end = default.as_ref().map(|e| e.position()).unwrap_or_else(|| type_annotation.position());
    p.match_punct(Punctuator::Semicolon);
    Ok(ClassMember::Field(ClassFieldDecl {
        name,
        type_annotation,
        default,
        visibility,
        is_static,
        is_mut: true,
        doc,
        info: (),
        position: SourceSpan::join(start, end),
    }))
}

fn parse_interface(p: &mut Parser, doc: Option<String>, visibility: Visibility) -> PResult<InterfaceDecl<()>> {
    let start = p.expect_keyword(Keyword::Interface)?;
    let (name, _) = p.expect_identifier()?;
    let generics = parse_generics(p)?;
    p.expect_punct(Punctuator::LBrace)?;
    p.skip_newlines();
    let mut methods = Vec::new();
    while !p.check_punct(Punctuator::RBrace) {
        methods.push(parse_method_signature(p)?);
        p.skip_newlines();
    }
    let end = p.expect_punct(Punctuator::RBrace)?;
    Ok(InterfaceDecl {
        name,
        generics,
        methods,
        doc,
        visibility,
        info: (),
        position: SourceSpan::join(start, end),
    })
}

fn parse_method_signature(p: &mut Parser) -> PResult<MethodDecl<()>> {
    p.skip_trivia();
    let doc = p.collect_doc_comment();
    let start = p.expect_keyword(Keyword::Func)?;
    let (name, _) = p.expect_identifier()?;
    let generics = parse_generics(p)?;
    let takes_this = p.check_punct(Punctuator::LParen) && matches!(p.peek_next(), Token::Keyword { keyword: Keyword::This, .. });
    let params = if takes_this {
        p.advance();
        p.expect_keyword(Keyword::This)?;
        p.match_punct(Punctuator::Comma);
        let mut rest = Vec::new();
        while !p.check_punct(Punctuator::RParen) {
            let (pname, pstart) = p.expect_identifier()?;
            let type_annotation = if p.match_punct(Punctuator::Colon) {
                Some(parse_type_name(p)?)
            } else {
                None
            };
            rest.push(Param {
                name: pname,
                type_annotation,
                default: None,
                info: (),
                position: pstart,
            });
            if !p.match_punct(Punctuator::Comma) {
                break;
            }
        }
        p.expect_punct(Punctuator::RParen)?;
        rest
    } else {
        parse_params(p)?
    };
    let return_type = if p.match_punct(Punctuator::Arrow) {
        Some(parse_type_name(p)?)
    } else {
        None
    };
    let where_clause = parse_where_clause(p)?;
    let (body, end) = if p.check_punct(Punctuator::LBrace) {
        let block = parse_block(p)?;
        let end = block.position;
        (Some(block), end)
    } else {
        let end = p.expect_punct(Punctuator::Semicolon)?;
        (None, end)
    };
    Ok(MethodDecl {
        name,
        generics,
        params,
        return_type,
        where_clause,
        body,
        decorators: Vec::new(),
        doc,
        visibility: Visibility::Public,
        is_static: false,
        is_virtual: false,
        is_override: false,
        is_abstract: body.is_none(),
        takes_this,
        this_mut: false,
        info: (),
        position: SourceSpan::join(start, end),
    })
}

fn parse_behavior(p: &mut Parser, doc: Option<String>, visibility: Visibility) -> PResult<BehaviorDecl<()>> {
    let start = p.expect_keyword(Keyword::Behavior)?;
    let (name, _) = p.expect_identifier()?;
    let generics = parse_generics(p)?;
    p.expect_punct(Punctuator::LBrace)?;
    p.skip_newlines();
    let mut methods = Vec::new();
    let mut associated_types = Vec::new();
    let mut constants = Vec::new();
    while !p.check_punct(Punctuator::RBrace) {
        if p.check_keyword(Keyword::Type) {
            p.advance();
            let (name, _) = p.expect_identifier()?;
            associated_types.push(name);
            p.match_punct(Punctuator::Semicolon);
        } else if p.check_keyword(Keyword::Const) {
            constants.push(parse_const(p, None, Visibility::Public)?);
        } else {
            methods.push(parse_method_signature(p)?);
        }
        p.skip_newlines();
    }
    let end = p.expect_punct(Punctuator::RBrace)?;
    Ok(BehaviorDecl {
        name,
        generics,
        methods,
        associated_types,
        constants,
        doc,
        visibility,
        info: (),
        position: SourceSpan::join(start, end),
    })
}

fn parse_impl(p: &mut Parser) -> PResult<ImplDecl<()>> {
    let start = p.expect_keyword(Keyword::Impl)?;
    let generics = parse_generics(p)?;
    let first = parse_type_name(p)?;
    let (trait_ref, target) = if p.match_keyword(Keyword::For) {
        (Some(first), parse_type_name(p)?)
    } else {
        (None, first)
    };
    let where_clause = parse_where_clause(p)?;
    p.expect_punct(Punctuator::LBrace)?;
    p.skip_newlines();
    let mut items = Vec::new();
    while !p.check_punct(Punctuator::RBrace) {
        items.push(parse_impl_item(p)?);
        p.skip_newlines();
    }
    let end = p.expect_punct(Punctuator::RBrace)?;
    Ok(ImplDecl {
        generics,
        trait_ref,
        target,
        where_clause,
        items,
        info: (),
        position: SourceSpan::join(start, end),
    })
}

fn parse_impl_item(p: &mut Parser) -> PResult<ImplItem<()>> {
    if p.check_keyword(Keyword::Type) {
        let start = p.peek().position();
        p.advance();
        let (name, _) = p.expect_identifier()?;
        p.expect_punct(Punctuator::Assign)?;
        let target = parse_type_name(p)?;
        let end = target.position();
        p.match_punct(Punctuator::Semicolon);
        return Ok(ImplItem::AssociatedType {
            name,
            target,
            position: SourceSpan::join(start, end),
        });
    }
    if p.check_keyword(Keyword::Const) {
        return parse_const(p, None, Visibility::Public).map(ImplItem::Const);
    }
    let member = parse_class_member(p)?;
    match member {
        ClassMember::Method(m) => Ok(ImplItem::Method(m)),
        _ => Err(p.expected("a method, const, or associated type inside an impl block")),
    }
}

fn parse_const(p: &mut Parser, doc: Option<String>, visibility: Visibility) -> PResult<ConstDecl<()>> {
    let start = p.expect_keyword(Keyword::Const)?;
    let (name, _) = p.expect_identifier()?;
    let type_annotation = if p.match_punct(Punctuator::Colon) {
        Some(parse_type_name(p)?)
    } else {
        None
    };
    p.expect_punct(Punctuator::Assign)?;
    let value = parse_expression(p)?;
    let end = p.expect_punct(Punctuator::Semicolon)?;
    Ok(ConstDecl {
        name,
        type_annotation,
        value,
        visibility,
        doc,
        info: (),
        position: SourceSpan::join(start, end),
    })
}

fn parse_use(p: &mut Parser) -> PResult<UseDecl> {
    let start = p.expect_keyword(Keyword::Use)?;
    let mut base_path = Vec::new();
    let (first, _) = p.expect_identifier()?;
    base_path.push(first);
    while p.match_punct(Punctuator::ColonColon) {
        if p.match_punct(Punctuator::Star) {
            let end = p.previous().position();
            p.match_punct(Punctuator::Semicolon);
            return Ok(UseDecl {
                base_path,
                kind: UseKind::Glob,
                position: SourceSpan::join(start, end),
            });
        }
        if p.check_punct(Punctuator::LBrace) {
            p.advance();
            let mut items = Vec::new();
            if !p.check_punct(Punctuator::RBrace) {
                loop {
                    let mut path = Vec::new();
                    let (seg, _) = p.expect_identifier()?;
                    path.push(seg);
                    while p.match_punct(Punctuator::ColonColon) {
                        let (seg, _) = p.expect_identifier()?;
                        path.push(seg);
                    }
                    let alias = if p.match_keyword(Keyword::As) {
                        Some(p.expect_identifier()?.0)
                    } else {
                        None
                    };
                    items.push(UseItem { path, alias });
                    if !p.match_punct(Punctuator::Comma) {
                        break;
                    }
                }
            }
            let end = p.expect_punct(Punctuator::RBrace)?;
            p.match_punct(Punctuator::Semicolon);
            return Ok(UseDecl {
                base_path,
                kind: UseKind::Group(items),
                position: SourceSpan::join(start, end),
            });
        }
        let (seg, _) = p.expect_identifier()?;
        base_path.push(seg);
    }
    let alias = if p.match_keyword(Keyword::As) {
        Some(p.expect_identifier()?.0)
    } else {
        None
    };
    let end = p.previous().position();
    p.match_punct(Punctuator::Semicolon);
    Ok(UseDecl {
        base_path,
        kind: UseKind::Single { alias },
        position: SourceSpan::join(start, end),
    })
}

fn parse_mod(p: &mut Parser) -> PResult<ModuleDecl<()>> {
    let start = p.expect_keyword(Keyword::Mod)?;
    let (name, name_pos) = p.expect_identifier()?;
    if p.match_punct(Punctuator::Semicolon) {
        return Ok(ModuleDecl {
            name,
            body: None,
            position: SourceSpan::join(start, name_pos),
        });
    }
    p.expect_punct(Punctuator::LBrace)?;
    p.skip_newlines();
    let mut declarations = Vec::new();
    while !p.check_punct(Punctuator::RBrace) {
        declarations.push(parse_declaration(p)?);
        p.skip_newlines();
    }
    let end = p.expect_punct(Punctuator::RBrace)?;
    Ok(ModuleDecl {
        name,
        body: Some(declarations),
        position: SourceSpan::join(start, end),
    })
}

fn parse_namespace(p: &mut Parser) -> PResult<NamespaceDecl<()>> {
    let start = p.expect_keyword(Keyword::Namespace)?;
    let mut path = Vec::new();
    let (first, _) = p.expect_identifier()?;
    path.push(first);
    while p.match_punct(Punctuator::ColonColon) {
        let (seg, _) = p.expect_identifier()?;
        path.push(seg);
    }
    p.expect_punct(Punctuator::LBrace)?;
    p.skip_newlines();
    let mut body = Vec::new();
    while !p.check_punct(Punctuator::RBrace) {
        body.push(parse_declaration(p)?);
        p.skip_newlines();
    }
    let end = p.expect_punct(Punctuator::RBrace)?;
    Ok(NamespaceDecl {
        path,
        body,
        position: SourceSpan::join(start, end),
    })
}
