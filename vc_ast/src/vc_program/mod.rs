// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A module that defines the AST of a loop-free verification program and
//! provides methods for creating nodes of the AST.

mod cmd;
mod contract;
mod eval;
mod expr;
mod graph;
mod writer;

pub use cmd::{AssertCmd, AssertKind, Cmd, IncarnationMap};
pub use contract::{BlockExpr, Condition, ContractBlock, ContractExit, Ensures, Procedure, Requires};
pub use eval::{EvalError, Valuation, Value};
pub use expr::SymbolMap;
pub use graph::{Block, BlockId, GraphError, Implementation, Transfer};

use crate::InternedString;
use num_bigint::BigInt;

/// Program types
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// Boolean
    Bool,

    /// Bit-vector of a given width, e.g. `bv32`
    Bv(usize),

    /// Unbounded integer
    Int,

    /// Map type, e.g. `[int]bool`
    Map { key: Box<Type>, value: Box<Type> },

    /// A user-defined type. The arguments to generic type parameters are
    /// stored in the `type_arguments` field.
    UserDefined { name: InternedString, type_arguments: Vec<Type> },
}

impl Type {
    pub fn bv(width: usize) -> Self {
        Self::Bv(width)
    }

    pub fn map(key: Type, value: Type) -> Self {
        Self::Map { key: Box::new(key), value: Box::new(value) }
    }

    pub fn user_defined(name: InternedString, type_arguments: Vec<Type>) -> Self {
        Self::UserDefined { name, type_arguments }
    }
}

/// Function parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: InternedString,
    pub typ: Type,
}

impl Parameter {
    pub fn new(name: InternedString, typ: Type) -> Self {
        Self { name, typ }
    }
}

/// Literal types
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Literal {
    /// Boolean values: `true`/`false`
    Bool(bool),

    /// Bit-vector values, e.g. `5bv8`
    Bv { width: usize, value: BigInt },

    /// Unbounded integer values, e.g. `1000` or `-456789`
    Int(BigInt),
}

impl Literal {
    pub fn bv(width: usize, value: BigInt) -> Self {
        Self::Bv { width, value }
    }
}

/// Unary operators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Logical negation
    Not,

    /// Arithmetic negative
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Logical AND
    And,

    /// Logical OR
    Or,

    /// Logical implication
    Implies,

    /// Logical equivalence
    Iff,

    /// Equality
    Eq,

    /// Inequality
    Neq,

    /// Less than
    Lt,

    /// Less than or equal
    Lte,

    /// Greater than
    Gt,

    /// Greater than or equal
    Gte,

    /// Addition
    Add,

    /// Subtraction
    Sub,

    /// Multiplication
    Mul,

    /// Division
    Div,

    /// Modulo
    Mod,
}

/// Expr types
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Literal (constant)
    Literal(Literal),

    /// Variable or incarnation
    Symbol { name: InternedString },

    /// Value of the operand in the pre-state of the enclosing procedure: `old(e)`
    Old(Box<Expr>),

    /// Unary operation
    UnaryOp { op: UnaryOp, operand: Box<Expr> },

    /// Binary operation
    BinaryOp { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },

    /// Application of an uninterpreted function
    FunctionCall { symbol: InternedString, arguments: Vec<Expr> },
}

/// Where a variable is declared. Incarnations remember the variable they
/// version and their sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Global,
    InParam,
    OutParam,
    Local,
    Incarnation { original: InternedString, sequence: usize },
}

/// A named, typed storage location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    pub name: InternedString,
    pub typ: Type,
    /// Implicit constraint that holds whenever the variable gets a new value.
    pub where_clause: Option<Expr>,
    pub kind: VariableKind,
}

impl Variable {
    pub fn new(name: InternedString, typ: Type, kind: VariableKind) -> Self {
        Variable { name, typ, where_clause: None, kind }
    }

    pub fn global(name: InternedString, typ: Type) -> Self {
        Self::new(name, typ, VariableKind::Global)
    }

    pub fn in_param(name: InternedString, typ: Type) -> Self {
        Self::new(name, typ, VariableKind::InParam)
    }

    pub fn out_param(name: InternedString, typ: Type) -> Self {
        Self::new(name, typ, VariableKind::OutParam)
    }

    pub fn local(name: InternedString, typ: Type) -> Self {
        Self::new(name, typ, VariableKind::Local)
    }

    pub fn with_where_clause(mut self, where_clause: Expr) -> Self {
        self.where_clause = Some(where_clause);
        self
    }

    pub fn is_incarnation(&self) -> bool {
        matches!(self.kind, VariableKind::Incarnation { .. })
    }

    pub fn to_expr(&self) -> Expr {
        Expr::symbol(self.name)
    }
}

/// Function declaration
/// A function is uninterpreted: it has a signature and no body. Summary
/// placeholders are declared this way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub name: InternedString,
    pub parameters: Vec<Parameter>,
    pub return_type: Type,
}

impl Function {
    pub fn new(name: InternedString, parameters: Vec<Parameter>, return_type: Type) -> Self {
        Function { name, parameters, return_type }
    }
}

/// A whole program: globals, uninterpreted functions, procedure contracts and
/// the implementations that have to satisfy them.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub globals: Vec<Variable>,
    pub functions: Vec<Function>,
    pub procedures: Vec<Procedure>,
    pub implementations: Vec<Implementation>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn add_global(&mut self, global: Variable) {
        self.globals.push(global);
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.push(function);
    }

    pub fn add_procedure(&mut self, procedure: Procedure) {
        self.procedures.push(procedure);
    }

    pub fn add_implementation(&mut self, implementation: Implementation) {
        self.implementations.push(implementation);
    }

    pub fn global(&self, name: InternedString) -> Option<&Variable> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn function(&self, name: InternedString) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn procedure(&self, name: InternedString) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }

    pub fn procedure_mut(&mut self, name: InternedString) -> Option<&mut Procedure> {
        self.procedures.iter_mut().find(|p| p.name == name)
    }

    pub fn implementation(&self, name: InternedString) -> Option<&Implementation> {
        self.implementations.iter().find(|i| i.name == name)
    }
}

/// A closed formula together with the declarations a prover needs to read it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationCondition {
    pub name: InternedString,
    pub formula: Expr,
    /// Every free symbol of `formula` with its type.
    pub symbols: Vec<(InternedString, Type)>,
    /// Every function applied in `formula`.
    pub functions: Vec<Function>,
    /// The symbols among `symbols` that stand for "this block and all its
    /// successors are correct". Empty unless the block-variable encoding is used.
    pub block_variables: Vec<InternedString>,
}

impl VerificationCondition {
    /// The same declarations around a different formula. Used to strengthen a
    /// condition with assumptions over the symbols it already declares.
    pub fn with_formula(&self, formula: Expr) -> Self {
        VerificationCondition {
            name: self.name,
            formula,
            symbols: self.symbols.clone(),
            functions: self.functions.clone(),
            block_variables: self.block_variables.clone(),
        }
    }
}
