use crate::source::SourceSpan;

use super::{Block, Expression, GenericParam, TypeName, WhereClauseItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Visibility {
    Private,
    Protected,
    Public,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DecoratorArg {
    Str(String),
    Int(i64),
    Ident(String),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Decorator {
    pub name: String,
    pub args: Vec<DecoratorArg>,
    pub position: SourceSpan,
}

impl Decorator {
    pub fn string_arg(&self, index: usize) -> Option<&str> {
        match self.args.get(index) {
            Some(DecoratorArg::Str(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct Param<T> {
    pub name: String,
    pub type_annotation: Option<TypeName>,
    pub default: Option<Expression<T>>,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionDecl<T> {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param<T>>,
    pub return_type: Option<TypeName>,
    pub where_clause: Vec<WhereClauseItem>,
    pub body: Option<Block<T>>,
    pub decorators: Vec<Decorator>,
    pub doc: Option<String>,
    pub visibility: Visibility,
    pub is_async: bool,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct StructField<T> {
    pub name: String,
    pub type_annotation: TypeName,
    pub visibility: Visibility,
    pub doc: Option<String>,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct StructDecl<T> {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub fields: Vec<StructField<T>>,
    pub doc: Option<String>,
    pub visibility: Visibility,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub enum EnumVariantPayload<T> {
    Unit,
    Tuple(Vec<TypeName>),
    Struct(Vec<StructField<T>>),
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct EnumVariant<T> {
    pub name: String,
    pub payload: EnumVariantPayload<T>,
    pub doc: Option<String>,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct EnumDecl<T> {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub variants: Vec<EnumVariant<T>>,
    pub doc: Option<String>,
    pub visibility: Visibility,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct UnionDecl<T> {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub variants: Vec<StructField<T>>,
    pub doc: Option<String>,
    pub visibility: Visibility,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct MethodDecl<T> {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param<T>>,
    pub return_type: Option<TypeName>,
    pub where_clause: Vec<WhereClauseItem>,
    pub body: Option<Block<T>>,
    pub decorators: Vec<Decorator>,
    pub doc: Option<String>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_abstract: bool,
    /// Whether the method declares a receiver (`this`/`mut this`) at all.
    pub takes_this: bool,
    pub this_mut: bool,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct ClassFieldDecl<T> {
    pub name: String,
    pub type_annotation: TypeName,
    pub default: Option<Expression<T>>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_mut: bool,
    pub doc: Option<String>,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct PropertyDecl<T> {
    pub name: String,
    pub type_annotation: TypeName,
    pub getter: Option<Block<T>>,
    pub setter: Option<(String, Block<T>)>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct ConstructorDecl<T> {
    pub params: Vec<Param<T>>,
    pub body: Block<T>,
    pub visibility: Visibility,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub enum ClassMember<T> {
    Field(ClassFieldDecl<T>),
    Method(MethodDecl<T>),
    Property(PropertyDecl<T>),
    Constructor(ConstructorDecl<T>),
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct ClassDecl<T> {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub extends: Option<TypeName>,
    pub implements: Vec<TypeName>,
    pub members: Vec<ClassMember<T>>,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub doc: Option<String>,
    pub visibility: Visibility,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct InterfaceDecl<T> {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub methods: Vec<MethodDecl<T>>,
    pub doc: Option<String>,
    pub visibility: Visibility,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct ConstDecl<T> {
    pub name: String,
    pub type_annotation: Option<TypeName>,
    pub value: Expression<T>,
    pub visibility: Visibility,
    pub doc: Option<String>,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct BehaviorDecl<T> {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub methods: Vec<MethodDecl<T>>,
    pub associated_types: Vec<String>,
    pub constants: Vec<ConstDecl<T>>,
    pub doc: Option<String>,
    pub visibility: Visibility,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub enum ImplItem<T> {
    Method(MethodDecl<T>),
    AssociatedType {
        name: String,
        target: TypeName,
        position: SourceSpan,
    },
    Const(ConstDecl<T>),
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct ImplDecl<T> {
    pub generics: Vec<GenericParam>,
    /// `None` for an inherent impl (no `for Trait` clause).
    pub trait_ref: Option<TypeName>,
    pub target: TypeName,
    pub where_clause: Vec<WhereClauseItem>,
    pub items: Vec<ImplItem<T>>,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct TypeAliasDecl<T> {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub target: TypeName,
    pub doc: Option<String>,
    pub visibility: Visibility,
    pub info: T,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UseItem {
    pub path: Vec<String>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum UseKind {
    /// `use path::*`
    Glob,
    /// `use path` or `use path as alias`
    Single { alias: Option<String> },
    /// `use path::{a, b as c}`
    Group(Vec<UseItem>),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UseDecl {
    pub base_path: Vec<String>,
    pub kind: UseKind,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct ModuleDecl<T> {
    pub name: String,
    /// `Some` for an inline `mod name { … }`; `None` for a file-backed module.
    pub body: Option<Vec<Declaration<T>>>,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct NamespaceDecl<T> {
    pub path: Vec<String>,
    pub body: Vec<Declaration<T>>,
    pub position: SourceSpan,
}

#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub enum Declaration<T> {
    Function(FunctionDecl<T>),
    Struct(StructDecl<T>),
    Enum(EnumDecl<T>),
    Union(UnionDecl<T>),
    Class(ClassDecl<T>),
    Interface(InterfaceDecl<T>),
    Behavior(BehaviorDecl<T>),
    Impl(ImplDecl<T>),
    TypeAlias(TypeAliasDecl<T>),
    Const(ConstDecl<T>),
    Use(UseDecl),
    Module(ModuleDecl<T>),
    Namespace(NamespaceDecl<T>),
}

impl<T> Declaration<T>
where
    T: Clone,
{
    pub fn position(&self) -> SourceSpan {
        match self {
            Declaration::Function(d) => d.position,
            Declaration::Struct(d) => d.position,
            Declaration::Enum(d) => d.position,
            Declaration::Union(d) => d.position,
            Declaration::Class(d) => d.position,
            Declaration::Interface(d) => d.position,
            Declaration::Behavior(d) => d.position,
            Declaration::Impl(d) => d.position,
            Declaration::TypeAlias(d) => d.position,
            Declaration::Const(d) => d.position,
            Declaration::Use(d) => d.position,
            Declaration::Module(d) => d.position,
            Declaration::Namespace(d) => d.position,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Declaration::Function(d) => Some(&d.name),
            Declaration::Struct(d) => Some(&d.name),
            Declaration::Enum(d) => Some(&d.name),
            Declaration::Union(d) => Some(&d.name),
            Declaration::Class(d) => Some(&d.name),
            Declaration::Interface(d) => Some(&d.name),
            Declaration::Behavior(d) => Some(&d.name),
            Declaration::TypeAlias(d) => Some(&d.name),
            Declaration::Const(d) => Some(&d.name),
            Declaration::Module(d) => Some(&d.name),
            Declaration::Impl(_) | Declaration::Use(_) | Declaration::Namespace(_) => None,
        }
    }
}

/// A fully parsed compilation unit: one source file's top-level declarations.
#[derive(Debug, Clone, lex_derive::LooseEq, serde::Serialize, serde::Deserialize)]
pub struct Module<T> {
    pub name: String,
    pub declarations: Vec<Declaration<T>>,
    pub doc: Option<String>,
}
