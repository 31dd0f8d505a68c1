// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A writer for verification programs.
//! Generates program text with the following format:
//! ```ignore
//! // Global variables:
//! var <var-name1>: <type1>;
//! ...
//!
//! // Functions:
//! function <function1-name>(<arg1>: <type1>, ...): <return-type>;
//! ...
//!
//! // Procedures:
//! procedure <procedure1-name>(<arg1>: <type1>, ...) returns (<ret1>: <type1>, ...);
//!   requires <pre-condition1>;
//!   ...
//!   ensures <post-condition1>;
//!   ...
//!   modifies <var1>, <var2>, ...;
//! ...
//!
//! // Implementations:
//! implementation <procedure1-name>(<arg1>: <type1>, ...) returns (...)
//! {
//!   var <local1>: <type1>;
//!   ...
//!
//!   <label1>:
//!     <cmd1>
//!     ...
//!     goto <label2>, <label3>;
//!   ...
//! }
//! ```
use super::*;
use crate::InternedString;

use std::fmt;
use std::io::Write;

/// A writer for verification programs.
struct Writer<'a, T: Write> {
    writer: &'a mut T,
    indentation: usize,
}

impl<'a, T: Write> Writer<'a, T> {
    fn new(writer: &'a mut T) -> Self {
        Self { writer, indentation: 0 }
    }

    fn newline(&mut self) -> std::io::Result<()> {
        writeln!(self.writer)
    }

    fn increase_indent(&mut self) {
        self.indentation += 2;
    }

    fn decrease_indent(&mut self) {
        self.indentation -= 2;
    }

    fn indent(&mut self) -> std::io::Result<()> {
        write!(self.writer, "{:width$}", "", width = self.indentation)
    }

    fn separated<I, F>(&mut self, items: I, separator: &str, mut f: F) -> std::io::Result<()>
    where
        I: IntoIterator,
        F: FnMut(&mut Self, I::Item) -> std::io::Result<()>,
    {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                write!(self.writer, "{separator}")?;
            }
            f(&mut *self, item)?;
        }
        Ok(())
    }
}

/// Render through a writer into a `fmt::Formatter`.
fn display_with<F>(f: &mut fmt::Formatter<'_>, write: F) -> fmt::Result
where
    F: FnOnce(&mut Writer<Vec<u8>>) -> std::io::Result<()>,
{
    let mut buffer = Vec::new();
    write(&mut Writer::new(&mut buffer)).map_err(|_| fmt::Error)?;
    f.write_str(&String::from_utf8_lossy(&buffer))
}

impl Program {
    pub fn write_to<T: Write>(&self, writer: &mut T) -> std::io::Result<()> {
        let mut writer = Writer::new(writer);

        if !self.globals.is_empty() {
            writeln!(writer.writer, "// Global variables:")?;
            for g in &self.globals {
                write!(writer.writer, "var ")?;
                g.write_to(&mut writer)?;
                writeln!(writer.writer, ";")?;
            }
            writer.newline()?;
        }
        if !self.functions.is_empty() {
            writeln!(writer.writer, "// Functions:")?;
            for f in &self.functions {
                f.write_to(&mut writer)?;
            }
            writer.newline()?;
        }
        if !self.procedures.is_empty() {
            writeln!(writer.writer, "// Procedures:")?;
            for p in &self.procedures {
                p.write_to(&mut writer)?;
            }
            writer.newline()?;
        }
        if !self.implementations.is_empty() {
            writeln!(writer.writer, "// Implementations:")?;
            for i in &self.implementations {
                i.write_to_writer(&mut writer)?;
            }
        }
        Ok(())
    }
}

impl Variable {
    fn write_to<T: Write>(&self, writer: &mut Writer<T>) -> std::io::Result<()> {
        write!(writer.writer, "{}: ", self.name)?;
        self.typ.write_to(writer)?;
        if let Some(where_clause) = &self.where_clause {
            write!(writer.writer, " where ")?;
            where_clause.write_to(writer)?;
        }
        Ok(())
    }
}

fn write_signature<T: Write>(
    writer: &mut Writer<T>,
    keyword: &str,
    name: InternedString,
    in_params: &[Variable],
    out_params: &[Variable],
) -> std::io::Result<()> {
    write!(writer.writer, "{keyword} {name}(")?;
    writer.separated(in_params, ", ", |w, p| p.write_to(w))?;
    write!(writer.writer, ")")?;
    if !out_params.is_empty() {
        write!(writer.writer, " returns (")?;
        writer.separated(out_params, ", ", |w, p| p.write_to(w))?;
        write!(writer.writer, ")")?;
    }
    Ok(())
}

impl Function {
    fn write_to<T: Write>(&self, writer: &mut Writer<T>) -> std::io::Result<()> {
        write!(writer.writer, "function {}(", self.name)?;
        writer.separated(&self.parameters, ", ", |w, p| {
            write!(w.writer, "{}: ", p.name)?;
            p.typ.write_to(w)
        })?;
        write!(writer.writer, "): ")?;
        self.return_type.write_to(writer)?;
        writeln!(writer.writer, ";")
    }
}

impl Procedure {
    fn write_to<T: Write>(&self, writer: &mut Writer<T>) -> std::io::Result<()> {
        write_signature(writer, "procedure", self.name, &self.in_params, &self.out_params)?;
        writeln!(writer.writer, ";")?;
        writer.increase_indent();
        for r in &self.requires {
            writer.indent()?;
            write!(writer.writer, "{}requires ", if r.free { "free " } else { "" })?;
            r.condition.write_to(writer)?;
            writeln!(writer.writer, ";")?;
        }
        for e in &self.ensures {
            writer.indent()?;
            write!(writer.writer, "{}ensures ", if e.free { "free " } else { "" })?;
            for a in &e.attributes {
                write!(writer.writer, "{{:{a}}} ")?;
            }
            e.condition.write_to(writer)?;
            writeln!(writer.writer, ";")?;
        }
        if !self.modifies.is_empty() {
            writer.indent()?;
            write!(writer.writer, "modifies ")?;
            writer.separated(&self.modifies, ", ", |w, m| write!(w.writer, "{m}"))?;
            writeln!(writer.writer, ";")?;
        }
        writer.decrease_indent();
        Ok(())
    }
}

impl Condition {
    fn write_to<T: Write>(&self, writer: &mut Writer<T>) -> std::io::Result<()> {
        match self {
            Condition::Expr(e) => e.write_to(writer),
            Condition::Blocks(be) => {
                write!(writer.writer, "|{{ ")?;
                for b in &be.blocks {
                    write!(writer.writer, "{}: ", b.label)?;
                    for c in &b.cmds {
                        c.write_inline(writer)?;
                        write!(writer.writer, " ")?;
                    }
                    match &b.exit {
                        ContractExit::Goto { targets } => {
                            write!(writer.writer, "goto ")?;
                            writer.separated(targets, ", ", |w, t| {
                                let label = be.blocks.get(*t).map(|b| b.label.to_owned_string());
                                write!(w.writer, "{}", label.unwrap_or_else(|| format!("#{t}")))
                            })?;
                            write!(writer.writer, "; ")?;
                        }
                        ContractExit::Return { value } => {
                            write!(writer.writer, "return ")?;
                            value.write_to(writer)?;
                            write!(writer.writer, "; ")?;
                        }
                    }
                }
                write!(writer.writer, "}}|")
            }
        }
    }
}

impl Implementation {
    pub fn write_to<T: Write>(&self, writer: &mut T) -> std::io::Result<()> {
        self.write_to_writer(&mut Writer::new(writer))
    }

    fn write_to_writer<T: Write>(&self, writer: &mut Writer<T>) -> std::io::Result<()> {
        write_signature(writer, "implementation", self.name, &self.in_params, &self.out_params)?;
        writer.newline()?;
        writeln!(writer.writer, "{{")?;
        writer.increase_indent();
        for l in &self.locals {
            writer.indent()?;
            write!(writer.writer, "var ")?;
            l.write_to(writer)?;
            writeln!(writer.writer, ";")?;
        }
        if !self.locals.is_empty() {
            writer.newline()?;
        }
        // Reachable blocks first, in the order control reaches them.
        let mut order = self.reachable();
        let unreachable: Vec<_> = self.block_ids().filter(|id| !order.contains(id)).collect();
        order.extend(unreachable);
        for id in order {
            self.write_block(id, writer)?;
        }
        writer.decrease_indent();
        writeln!(writer.writer, "}}")?;
        Ok(())
    }

    fn write_block<T: Write>(&self, id: BlockId, writer: &mut Writer<T>) -> std::io::Result<()> {
        let block = self.block(id);
        writer.indent()?;
        writeln!(writer.writer, "{}:", block.label)?;
        writer.increase_indent();
        for c in &block.cmds {
            c.write_to(writer)?;
        }
        writer.indent()?;
        match block.transfer() {
            Transfer::Return => writeln!(writer.writer, "return;")?,
            Transfer::Goto { targets } => {
                write!(writer.writer, "goto ")?;
                writer.separated(targets, ", ", |w, t| write!(w.writer, "{}", self.block(*t).label))?;
                writeln!(writer.writer, ";")?;
            }
        }
        writer.decrease_indent();
        Ok(())
    }
}

impl Cmd {
    fn write_to<T: Write>(&self, writer: &mut Writer<T>) -> std::io::Result<()> {
        if let Cmd::Scope { locals, cmds } = self {
            writer.indent()?;
            writeln!(writer.writer, "{{")?;
            writer.increase_indent();
            for l in locals {
                writer.indent()?;
                write!(writer.writer, "var ")?;
                l.write_to(writer)?;
                writeln!(writer.writer, ";")?;
            }
            for c in cmds {
                c.write_to(writer)?;
            }
            writer.decrease_indent();
            writer.indent()?;
            return writeln!(writer.writer, "}}");
        }
        writer.indent()?;
        self.write_inline(writer)?;
        writer.newline()
    }

    /// The command on a single line, without indentation.
    fn write_inline<T: Write>(&self, writer: &mut Writer<T>) -> std::io::Result<()> {
        match self {
            Cmd::Assert(a) => {
                write!(writer.writer, "assert ")?;
                match &a.kind {
                    AssertKind::Plain => {}
                    AssertKind::Requires { callee } => write!(writer.writer, "{{:requires {callee}}} ")?,
                    AssertKind::Ensures { .. } => write!(writer.writer, "{{:ensures}} ")?,
                }
                a.condition.write_to(writer)?;
                write!(writer.writer, ";")?;
            }
            Cmd::Assume { condition } => {
                write!(writer.writer, "assume ")?;
                condition.write_to(writer)?;
                write!(writer.writer, ";")?;
            }
            Cmd::Assign { pairs } => {
                writer.separated(pairs, ", ", |w, (lhs, _)| write!(w.writer, "{lhs}"))?;
                write!(writer.writer, " := ")?;
                writer.separated(pairs, ", ", |w, (_, rhs)| rhs.write_to(w))?;
                write!(writer.writer, ";")?;
            }
            Cmd::Havoc { vars } => {
                write!(writer.writer, "havoc ")?;
                writer.separated(vars, ", ", |w, v| write!(w.writer, "{v}"))?;
                write!(writer.writer, ";")?;
            }
            Cmd::Call { callee, arguments, outputs } => {
                write!(writer.writer, "call ")?;
                if !outputs.is_empty() {
                    writer.separated(outputs, ", ", |w, o| write!(w.writer, "{o}"))?;
                    write!(writer.writer, " := ")?;
                }
                write!(writer.writer, "{callee}(")?;
                writer.separated(arguments, ", ", |w, a| a.write_to(w))?;
                write!(writer.writer, ");")?;
            }
            Cmd::Comment(text) => write!(writer.writer, "// {text}")?,
            Cmd::Scope { locals, cmds } => {
                write!(writer.writer, "{{ ")?;
                for l in locals {
                    write!(writer.writer, "var ")?;
                    l.write_to(writer)?;
                    write!(writer.writer, "; ")?;
                }
                for c in cmds {
                    c.write_inline(writer)?;
                    write!(writer.writer, " ")?;
                }
                write!(writer.writer, "}}")?;
            }
        }
        Ok(())
    }
}

impl Expr {
    fn write_to<T: Write>(&self, writer: &mut Writer<T>) -> std::io::Result<()> {
        match self {
            Expr::Literal(value) => {
                value.write_to(writer)?;
            }
            Expr::Symbol { name } => {
                write!(writer.writer, "{name}")?;
            }
            Expr::Old(e) => {
                write!(writer.writer, "old(")?;
                e.write_to(writer)?;
                write!(writer.writer, ")")?;
            }
            Expr::UnaryOp { op, operand } => {
                op.write_to(writer)?;
                write!(writer.writer, "(")?;
                operand.write_to(writer)?;
                write!(writer.writer, ")")?;
            }
            Expr::BinaryOp { op, left, right } => {
                write!(writer.writer, "(")?;
                left.write_to(writer)?;
                write!(writer.writer, " ")?;
                op.write_to(writer)?;
                write!(writer.writer, " ")?;
                right.write_to(writer)?;
                write!(writer.writer, ")")?;
            }
            Expr::FunctionCall { symbol, arguments } => {
                write!(writer.writer, "{symbol}(")?;
                writer.separated(arguments, ", ", |w, a| a.write_to(w))?;
                write!(writer.writer, ")")?;
            }
        }
        Ok(())
    }
}

impl Type {
    fn write_to<T: Write>(&self, writer: &mut Writer<T>) -> std::io::Result<()> {
        match self {
            Type::Bool => write!(writer.writer, "bool")?,
            Type::Bv(size) => write!(writer.writer, "bv{size}")?,
            Type::Int => write!(writer.writer, "int")?,
            Type::Map { key, value } => {
                write!(writer.writer, "[")?;
                key.write_to(writer)?;
                write!(writer.writer, "]")?;
                value.write_to(writer)?;
            }
            Type::UserDefined { name, type_arguments } => {
                write!(writer.writer, "{name}")?;
                for t in type_arguments {
                    write!(writer.writer, " ")?;
                    t.write_to(writer)?;
                }
            }
        }
        Ok(())
    }
}

impl Literal {
    fn write_to<T: Write>(&self, writer: &mut Writer<T>) -> std::io::Result<()> {
        match self {
            Literal::Bool(value) => {
                write!(writer.writer, "{}", value)?;
            }
            Literal::Bv { width, value } => {
                write!(writer.writer, "{value}bv{width}")?;
            }
            Literal::Int(value) => {
                write!(writer.writer, "{}", value)?;
            }
        }
        Ok(())
    }
}

impl UnaryOp {
    fn write_to<T: Write>(&self, writer: &mut Writer<T>) -> std::io::Result<()> {
        match self {
            UnaryOp::Not => write!(writer.writer, "!")?,
            UnaryOp::Neg => write!(writer.writer, "-")?,
        }
        Ok(())
    }
}

impl BinaryOp {
    fn write_to<T: Write>(&self, writer: &mut Writer<T>) -> std::io::Result<()> {
        match self {
            BinaryOp::Add => write!(writer.writer, "+")?,
            BinaryOp::Sub => write!(writer.writer, "-")?,
            BinaryOp::Mul => write!(writer.writer, "*")?,
            BinaryOp::Div => write!(writer.writer, "div")?,
            BinaryOp::Mod => write!(writer.writer, "mod")?,
            BinaryOp::And => write!(writer.writer, "&&")?,
            BinaryOp::Or => write!(writer.writer, "||")?,
            BinaryOp::Implies => write!(writer.writer, "==>")?,
            BinaryOp::Iff => write!(writer.writer, "<==>")?,
            BinaryOp::Eq => write!(writer.writer, "==")?,
            BinaryOp::Neq => write!(writer.writer, "!=")?,
            BinaryOp::Lt => write!(writer.writer, "<")?,
            BinaryOp::Gt => write!(writer.writer, ">")?,
            BinaryOp::Lte => write!(writer.writer, "<=")?,
            BinaryOp::Gte => write!(writer.writer, ">=")?,
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_with(f, |w| self.write_to(w))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_with(f, |w| self.write_to(w))
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_with(f, |w| self.write_inline(w))
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_with(f, |w| self.write_to_writer(w))
    }
}
