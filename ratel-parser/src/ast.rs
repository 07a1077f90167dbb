// Ratel AST Definitions
// Generic tree of typed nodes with source positions

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// Source position information for AST nodes
///
/// `start`/`end` are byte offsets into the original (pre-normalization) source.
/// Line numbers are 1-based, column offsets are 0-based byte columns.
/// `Span::default()` marks synthesized nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub lineno: usize,
    #[serde(default)]
    pub col_offset: usize,
    #[serde(default)]
    pub end_lineno: usize,
    #[serde(default)]
    pub end_col_offset: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            ..Self::default()
        }
    }

    pub fn is_synthesized(&self) -> bool {
        *self == Self::default()
    }
}

/// Top-level module containing all statements of one source file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Module {
    pub body: Vec<Statement>,
    #[serde(default)]
    pub source_id: u32,
    #[serde(flatten)]
    pub span: Span,
}

impl Module {
    pub fn new(body: Vec<Statement>) -> Self {
        Self {
            body,
            source_id: 0,
            span: Span::default(),
        }
    }

    /// Names of every top-level function definition, in source order
    pub fn function_names(&self) -> Vec<&str> {
        self.body
            .iter()
            .filter_map(|stmt| match &stmt.kind {
                StatementKind::FunctionDef(def) => Some(def.name.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(flatten)]
    pub kind: StatementKind,
    #[serde(flatten)]
    pub span: Span,
}

impl Statement {
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn pass() -> Self {
        Self::new(StatementKind::Pass, Span::default())
    }

    /// True for function and class definitions
    pub fn is_definition(&self) -> bool {
        matches!(
            self.kind,
            StatementKind::FunctionDef(_) | StatementKind::ClassDef(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ast_type")]
pub enum StatementKind {
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Import(Import),
    ImportFrom(ImportFrom),
    Assign(Assign),
    AugAssign(AugAssign),
    AnnAssign(AnnAssign),
    Return(Return),
    If(If),
    For(For),
    While(While),
    Assert(Assert),
    Raise(Raise),
    Try(Try),
    With(With),
    Delete(Delete),
    Global(Global),
    Nonlocal(Nonlocal),
    Pass,
    Break,
    Continue,
    Expr(ExprStatement),
}

/// Function definition, `async def` forms included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub args: Vec<Parameter>,
    pub returns: Option<Box<Expression>>,
    pub decorator_list: Vec<Expression>,
    pub body: Vec<Statement>,
    #[serde(default)]
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub arg: String,
    pub annotation: Option<Expression>,
    pub default: Option<Expression>,
    #[serde(default)]
    pub kind: ParameterKind,
    #[serde(flatten)]
    pub span: Span,
}

/// How a parameter binds call arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    #[default]
    Positional,
    /// `*args`
    VarPositional,
    /// `**kwargs`
    VarKeyword,
}

impl ParameterKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ParameterKind::Positional => "",
            ParameterKind::VarPositional => "*",
            ParameterKind::VarKeyword => "**",
        }
    }
}

/// Declaration keyword a class-like definition was written with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    #[default]
    Class,
    Struct,
    Event,
    Interface,
    Contract,
}

impl ClassKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            ClassKind::Class => "class",
            ClassKind::Struct => "struct",
            ClassKind::Event => "event",
            ClassKind::Interface => "interface",
            ClassKind::Contract => "contract",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "class" => Some(ClassKind::Class),
            "struct" => Some(ClassKind::Struct),
            "event" => Some(ClassKind::Event),
            "interface" => Some(ClassKind::Interface),
            "contract" => Some(ClassKind::Contract),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub kind: ClassKind,
    pub bases: Vec<Expression>,
    pub decorator_list: Vec<Expression>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub names: Vec<Alias>,
}

/// `from module import names`; `level` counts the leading dots of a
/// relative import and `module` is empty for `from . import x`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportFrom {
    pub module: String,
    pub names: Vec<Alias>,
    #[serde(default)]
    pub level: u32,
}

/// `a = b = value`; each target receives the value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assign {
    pub targets: Vec<Expression>,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugAssign {
    pub target: Expression,
    pub op: BinaryOperator,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnAssign {
    pub target: Expression,
    pub annotation: Expression,
    pub value: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Return {
    pub value: Option<Expression>,
}

/// `elif` chains are nested `If` statements in `orelse`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct If {
    pub test: Expression,
    pub body: Vec<Statement>,
    pub orelse: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct For {
    pub target: Expression,
    pub iter: Expression,
    pub body: Vec<Statement>,
    #[serde(default)]
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct While {
    pub test: Expression,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assert {
    pub test: Expression,
    pub msg: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raise {
    pub exc: Option<Expression>,
}

/// `try` with its handlers; at least one of `handlers` and `finalbody` is
/// non-empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Try {
    pub body: Vec<Statement>,
    pub handlers: Vec<ExceptHandler>,
    pub orelse: Vec<Statement>,
    pub finalbody: Vec<Statement>,
}

/// `except [type [as name]]:` clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptHandler {
    #[serde(rename = "type")]
    pub typ: Option<Expression>,
    pub name: Option<String>,
    pub body: Vec<Statement>,
    #[serde(flatten)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct With {
    pub items: Vec<WithItem>,
    pub body: Vec<Statement>,
    #[serde(default)]
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithItem {
    pub context_expr: Expression,
    pub optional_vars: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub targets: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Global {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nonlocal {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprStatement {
    pub value: Expression,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    #[serde(flatten)]
    pub kind: ExpressionKind,
    #[serde(flatten)]
    pub span: Span,
}

impl Expression {
    pub fn new(kind: ExpressionKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn name(id: impl Into<String>) -> Self {
        Self::new(ExpressionKind::Name(Name { id: id.into() }), Span::default())
    }

    pub fn int(value: impl Into<BigInt>) -> Self {
        Self::new(
            ExpressionKind::Int(IntegerLiteral {
                value: value.into(),
                format: IntegerFormat::Decimal,
            }),
            Span::default(),
        )
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(ExpressionKind::Bool(BooleanLiteral { value }), Span::default())
    }

    /// Identifier when this is a bare name, `None` otherwise
    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Name(name) => Some(name.id.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match &self.kind {
            ExpressionKind::Int(int) => Some(&int.value),
            _ => None,
        }
    }

    /// Dotted path for `a.b.c` chains of names and attributes
    pub fn dotted_path(&self) -> Option<String> {
        match &self.kind {
            ExpressionKind::Name(name) => Some(name.id.clone()),
            ExpressionKind::Attribute(attr) => attr
                .value
                .dotted_path()
                .map(|base| format!("{}.{}", base, attr.attr)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ast_type")]
pub enum ExpressionKind {
    Name(Name),
    Int(IntegerLiteral),
    Decimal(DecimalLiteral),
    Str(StringLiteral),
    Bool(BooleanLiteral),
    NoneLiteral,
    List(ListDisplay),
    Tuple(TupleDisplay),
    Set(SetDisplay),
    Dict(DictDisplay),
    ListComp(Comprehension),
    SetComp(Comprehension),
    GeneratorExp(Comprehension),
    DictComp(DictComp),
    Attribute(Attribute),
    Subscript(Subscript),
    Call(Call),
    BinOp(BinOp),
    UnaryOp(UnaryOp),
    BoolOp(BoolOp),
    Compare(Compare),
    Await(Await),
    IfExp(IfExp),
    Lambda(Lambda),
    Slice(Slice),
    Starred(Starred),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Name {
    pub id: String,
}

/// Integer literals with format preservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegerLiteral {
    #[serde(with = "bigint_serde")]
    pub value: BigInt,
    #[serde(default)]
    pub format: IntegerFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntegerFormat {
    #[default]
    Decimal,
    Hexadecimal,
    Binary,
    Octal,
}

/// Fixed-point literal, kept as written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecimalLiteral {
    pub value: String,
}

/// String literal; `value` is the raw text between the quotes and `prefix`
/// the letters before them (`b`, `r`, `f` and their combinations)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringLiteral {
    pub value: String,
    #[serde(default)]
    pub quote: QuoteStyle,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuoteStyle {
    #[default]
    Double,
    Single,
    TripleDouble,
    TripleSingle,
}

impl QuoteStyle {
    pub fn delimiter(&self) -> &'static str {
        match self {
            QuoteStyle::Double => "\"",
            QuoteStyle::Single => "'",
            QuoteStyle::TripleDouble => "\"\"\"",
            QuoteStyle::TripleSingle => "'''",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanLiteral {
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDisplay {
    pub elts: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleDisplay {
    pub elts: Vec<Expression>,
}

/// Non-empty `{a, b}`; `{}` is always a dict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDisplay {
    pub elts: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictDisplay {
    pub keys: Vec<Expression>,
    pub values: Vec<Expression>,
}

/// One `for target in iter if cond ...` clause of a comprehension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    pub target: Expression,
    pub iter: Expression,
    pub ifs: Vec<Expression>,
    #[serde(default)]
    pub is_async: bool,
}

/// List, set and generator comprehensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comprehension {
    pub elt: Box<Expression>,
    pub generators: Vec<Generator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictComp {
    pub key: Box<Expression>,
    pub value: Box<Expression>,
    pub generators: Vec<Generator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub value: Box<Expression>,
    pub attr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscript {
    pub value: Box<Expression>,
    pub slice: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub func: Box<Expression>,
    pub args: Vec<Expression>,
    pub keywords: Vec<Keyword>,
}

/// Keyword argument in a call (`name=value`); `arg` is `None` for `**value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expression,
    #[serde(flatten)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinOp {
    pub left: Box<Expression>,
    pub op: BinaryOperator,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mult => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::FloorDiv => "//",
            BinaryOperator::Mod => "%",
            BinaryOperator::Pow => "**",
            BinaryOperator::LShift => "<<",
            BinaryOperator::RShift => ">>",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::BitAnd => "&",
        }
    }

    pub fn from_augmented(symbol: &str) -> Option<Self> {
        let op = match symbol.strip_suffix('=')? {
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Sub,
            "*" => BinaryOperator::Mult,
            "/" => BinaryOperator::Div,
            "//" => BinaryOperator::FloorDiv,
            "%" => BinaryOperator::Mod,
            "**" => BinaryOperator::Pow,
            "<<" => BinaryOperator::LShift,
            ">>" => BinaryOperator::RShift,
            "|" => BinaryOperator::BitOr,
            "^" => BinaryOperator::BitXor,
            "&" => BinaryOperator::BitAnd,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryOp {
    pub op: UnaryOperator,
    pub operand: Box<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    USub,
    UAdd,
    Invert,
}

/// `and`/`or` chains with a flattened operand list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoolOp {
    pub op: BoolOperator,
    pub values: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolOperator {
    And,
    Or,
}

/// Chained comparison `left op0 c0 op1 c1 ...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compare {
    pub left: Box<Expression>,
    pub ops: Vec<CompareOperator>,
    pub comparators: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CompareOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOperator::Eq => "==",
            CompareOperator::NotEq => "!=",
            CompareOperator::Lt => "<",
            CompareOperator::LtE => "<=",
            CompareOperator::Gt => ">",
            CompareOperator::GtE => ">=",
            CompareOperator::In => "in",
            CompareOperator::NotIn => "not in",
            CompareOperator::Is => "is",
            CompareOperator::IsNot => "is not",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Await {
    pub value: Box<Expression>,
}

/// `body if test else orelse`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfExp {
    pub test: Box<Expression>,
    pub body: Box<Expression>,
    pub orelse: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub args: Vec<Parameter>,
    pub body: Box<Expression>,
}

/// `lower:upper:step` inside a subscript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub lower: Option<Box<Expression>>,
    pub upper: Option<Box<Expression>>,
    pub step: Option<Box<Expression>>,
}

/// `*value` in a call, display or assignment target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Starred {
    pub value: Box<Expression>,
}

/// Integers are written as JSON numbers when they fit in 64 bits and as
/// decimal strings otherwise.
mod bigint_serde {
    use num_bigint::BigInt;
    use num_traits::ToPrimitive;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        match value.to_i64() {
            Some(small) => serializer.serialize_i64(small),
            None => serializer.serialize_str(&value.to_string()),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        struct BigIntVisitor;

        impl Visitor<'_> for BigIntVisitor {
            type Value = BigInt;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an integer or a decimal integer string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigInt, E> {
                Ok(BigInt::from(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigInt, E> {
                Ok(BigInt::from(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<BigInt, E> {
                v.parse::<BigInt>()
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(BigIntVisitor)
    }
}
