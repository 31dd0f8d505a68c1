// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An oracle that runs an SMT-LIB 2 solver as a separate process.

use crate::sexp::{self, Sexp};
use crate::{ErrorHandler, Model, Outcome, ProverError, ProverOracle};
use anyhow::Context;
use lazy_static::lazy_static;
use num_bigint::BigInt;
use num_traits::Signed;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, trace};
use vc_ast::{
    BinaryOp, Expr, InternedString, Literal, Type, UnaryOp, Value, VerificationCondition,
};

lazy_static! {
    static ref SIMPLE_SYMBOL: Regex =
        Regex::new(r"^[a-zA-Z~!@$%^&*_+=<>.?/\-][0-9a-zA-Z~!@$%^&*_+=<>.?/\-]*$").unwrap();
}

const RESERVED: &[&str] = &[
    "!", "_", "as", "assert", "BINARY", "DECIMAL", "exists", "forall", "HEXADECIMAL", "let",
    "match", "NUMERAL", "par", "STRING", "true", "false", "not", "and", "or", "ite", "distinct",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SmtLibOptions {
    /// Executable name or path, resolved through `PATH`.
    pub solver: String,
    pub arguments: Vec<String>,
    /// Per-query limit passed to the solver, in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for SmtLibOptions {
    fn default() -> Self {
        SmtLibOptions {
            solver: "z3".to_string(),
            arguments: vec!["-smt2".to_string(), "-in".to_string()],
            timeout_ms: Some(10_000),
        }
    }
}

struct PendingQuery {
    name: String,
    script: String,
    vc: VerificationCondition,
}

/// Starts one solver process per query. The script is written to the
/// solver's standard input and the response read back from its output.
pub struct SmtLibProver {
    options: SmtLibOptions,
    pending: Option<PendingQuery>,
}

impl SmtLibProver {
    pub fn new(options: SmtLibOptions) -> Self {
        SmtLibProver { options, pending: None }
    }

    fn run_solver(&self, script: &str) -> anyhow::Result<String> {
        let path = which::which(&self.options.solver)
            .with_context(|| format!("cannot find solver `{}`", self.options.solver))?;
        let mut child = Command::new(&path)
            .args(&self.options.arguments)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start `{}`", path.display()))?;
        child
            .stdin
            .take()
            .context("solver has no standard input")?
            .write_all(script.as_bytes())
            .context("failed to send the query to the solver")?;
        let output = child.wait_with_output().context("failed to read the solver's answer")?;
        if !output.stderr.is_empty() {
            debug!(stderr = %String::from_utf8_lossy(&output.stderr), "solver reported");
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ProverOracle for SmtLibProver {
    fn begin_check(&mut self, name: &str, vc: &VerificationCondition) -> Result<(), ProverError> {
        if let Some(pending) = &self.pending {
            return Err(ProverError::QueryInFlight(pending.name.clone()));
        }
        let script = script(vc, self.options.timeout_ms)?;
        trace!(query = name, "{script}");
        self.pending = Some(PendingQuery {
            name: name.to_string(),
            script,
            vc: vc.clone(),
        });
        Ok(())
    }

    fn check_outcome(&mut self, handler: &mut dyn ErrorHandler) -> Result<Outcome, ProverError> {
        let pending = self.pending.take().ok_or(ProverError::NoPendingQuery)?;
        let start = Instant::now();
        let response = self.run_solver(&pending.script)?;
        let outcome = interpret(&response, &pending.vc, handler)?;
        debug!(query = %pending.name, %outcome, runtime = ?start.elapsed(), "solver answered");
        Ok(outcome)
    }
}

/// `name` as an SMT-LIB symbol, quoted with bars when needed.
pub(crate) fn quote(name: InternedString) -> String {
    name.map(|s| {
        if SIMPLE_SYMBOL.is_match(s) && !RESERVED.contains(&s) {
            s.to_string()
        } else {
            format!("|{s}|")
        }
    })
}

fn unsupported(what: String) -> ProverError {
    ProverError::Unsupported(what)
}

fn sort(typ: &Type) -> Result<String, ProverError> {
    match typ {
        Type::Bool => Ok("Bool".to_string()),
        Type::Int => Ok("Int".to_string()),
        Type::Bv(width) => Ok(format!("(_ BitVec {width})")),
        Type::Map { key, value } => Ok(format!("(Array {} {})", sort(key)?, sort(value)?)),
        Type::UserDefined { name, type_arguments } if type_arguments.is_empty() => Ok(quote(*name)),
        Type::UserDefined { .. } => Err(unsupported(format!("generic type `{typ}`"))),
    }
}

fn user_sorts(typ: &Type, out: &mut BTreeSet<InternedString>) {
    match typ {
        Type::UserDefined { name, .. } => {
            out.insert(*name);
        }
        Type::Map { key, value } => {
            user_sorts(key, out);
            user_sorts(value, out);
        }
        Type::Bool | Type::Int | Type::Bv(_) => {}
    }
}

fn numeral(value: &BigInt) -> String {
    if value.is_negative() { format!("(- {})", value.abs()) } else { value.to_string() }
}

fn term(e: &Expr) -> Result<String, ProverError> {
    Ok(match e {
        Expr::Literal(Literal::Bool(b)) => b.to_string(),
        Expr::Literal(Literal::Int(i)) => numeral(i),
        Expr::Literal(Literal::Bv { width, value }) => format!("(_ bv{value} {width})"),
        Expr::Symbol { name } => quote(*name),
        Expr::Old(_) => return Err(unsupported(format!("`{e}` survived passification"))),
        Expr::UnaryOp { op: UnaryOp::Not, operand } => format!("(not {})", term(operand)?),
        Expr::UnaryOp { op: UnaryOp::Neg, operand } => format!("(- {})", term(operand)?),
        Expr::BinaryOp { op, left, right } => {
            let operator = match op {
                BinaryOp::And => "and",
                BinaryOp::Or => "or",
                BinaryOp::Implies => "=>",
                BinaryOp::Iff | BinaryOp::Eq => "=",
                BinaryOp::Neq => "distinct",
                BinaryOp::Lt => "<",
                BinaryOp::Lte => "<=",
                BinaryOp::Gt => ">",
                BinaryOp::Gte => ">=",
                BinaryOp::Add => "+",
                BinaryOp::Sub => "-",
                BinaryOp::Mul => "*",
                BinaryOp::Div => "div",
                BinaryOp::Mod => "mod",
            };
            format!("({operator} {} {})", term(left)?, term(right)?)
        }
        Expr::FunctionCall { symbol, arguments } if arguments.is_empty() => quote(*symbol),
        Expr::FunctionCall { symbol, arguments } => {
            let arguments = arguments.iter().map(term).collect::<Result<Vec<_>, _>>()?;
            format!("({} {})", quote(*symbol), arguments.join(" "))
        }
    })
}

/// The script asking the solver for a model of `!vc.formula`.
pub(crate) fn script(vc: &VerificationCondition, timeout_ms: Option<u64>) -> Result<String, ProverError> {
    let mut lines = vec![format!("; {}", vc.name), "(set-option :produce-models true)".to_string()];
    if let Some(timeout) = timeout_ms {
        lines.push(format!("(set-option :timeout {timeout})"));
    }

    let mut sorts = BTreeSet::new();
    vc.symbols.iter().for_each(|(_, t)| user_sorts(t, &mut sorts));
    for f in &vc.functions {
        f.parameters.iter().for_each(|p| user_sorts(&p.typ, &mut sorts));
        user_sorts(&f.return_type, &mut sorts);
    }
    for s in sorts {
        lines.push(format!("(declare-sort {} 0)", quote(s)));
    }
    for (name, typ) in &vc.symbols {
        lines.push(format!("(declare-const {} {})", quote(*name), sort(typ)?));
    }
    for f in &vc.functions {
        let parameters =
            f.parameters.iter().map(|p| sort(&p.typ)).collect::<Result<Vec<_>, _>>()?;
        lines.push(format!(
            "(declare-fun {} ({}) {})",
            quote(f.name),
            parameters.join(" "),
            sort(&f.return_type)?
        ));
    }
    lines.push(format!("(assert (not {}))", term(&vc.formula)?));
    lines.push("(check-sat)".to_string());
    if !vc.symbols.is_empty() {
        let names: Vec<String> = vc.symbols.iter().map(|(n, _)| quote(*n)).collect();
        lines.push(format!("(get-value ({}))", names.join(" ")));
    }
    lines.push("(get-info :reason-unknown)".to_string());
    lines.push(String::new());
    Ok(lines.join("\n"))
}

fn value(sexp: &Sexp) -> Option<Value> {
    match sexp {
        Sexp::Atom(a) if a == "true" => Some(Value::Bool(true)),
        Sexp::Atom(a) if a == "false" => Some(Value::Bool(false)),
        Sexp::Atom(a) => a.parse::<BigInt>().ok().map(Value::Int),
        Sexp::List(items) => match items.as_slice() {
            [Sexp::Atom(minus), operand] if minus == "-" => match value(operand)? {
                Value::Int(i) => Some(Value::Int(-i)),
                Value::Bool(_) => None,
            },
            _ => None,
        },
        Sexp::Str(_) => None,
    }
}

/// Values of the symbols of `vc` found in a `get-value` response. Values the
/// model cannot represent, such as bit-vectors and arrays, are left out.
fn model(response: &[Sexp], vc: &VerificationCondition) -> Model {
    let mut model = Model::new();
    for pairs in response.iter().filter_map(Sexp::as_list) {
        for pair in pairs.iter().filter_map(Sexp::as_list) {
            let [name, v] = pair else { continue };
            let Some(name) = name.as_atom() else { continue };
            let Some((symbol, _)) = vc.symbols.iter().find(|(s, _)| *s == name) else { continue };
            if let Some(v) = value(v) {
                model.insert(*symbol, v);
            }
        }
    }
    model
}

/// Read the solver's answer to a script produced by [script].
pub(crate) fn interpret(
    response: &str,
    vc: &VerificationCondition,
    handler: &mut dyn ErrorHandler,
) -> Result<Outcome, ProverError> {
    let parsed = sexp::parse_all(response).map_err(ProverError::UnexpectedResponse)?;
    let status = parsed
        .iter()
        .filter_map(Sexp::as_atom)
        .find(|a| matches!(*a, "sat" | "unsat" | "unknown"));
    match status {
        Some("unsat") => Ok(Outcome::Correct),
        Some("sat") => {
            let model = model(&parsed, vc);
            handler.on_model(&model.failing_blocks(vc), &model);
            Ok(Outcome::Errors)
        }
        Some(_) => {
            let reason = parsed
                .iter()
                .filter_map(Sexp::as_list)
                .find_map(|items| match items {
                    [Sexp::Atom(key), Sexp::Str(reason) | Sexp::Atom(reason)]
                        if key == ":reason-unknown" =>
                    {
                        Some(reason.as_str())
                    }
                    _ => None,
                })
                .unwrap_or_default();
            debug!(reason, "solver gave up");
            Ok(if reason.contains("timeout") || reason.contains("canceled") {
                Outcome::TimedOut
            } else if reason.contains("memout") || reason.contains("out of memory") {
                Outcome::OutOfMemory
            } else {
                Outcome::Inconclusive
            })
        }
        None => Err(ProverError::UnexpectedResponse(
            response.lines().next().unwrap_or_default().to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CollectingHandler;
    use vc_ast::{Function, Parameter};

    fn vc() -> VerificationCondition {
        let f = Expr::function_call("PSummaryPred", vec![Expr::symbol("x@0")]);
        VerificationCondition {
            name: "P".into(),
            formula: f.implies(Expr::symbol("x@0").gt(Expr::int_constant(-1))),
            symbols: vec![("x@0".into(), Type::Int), ("entry_correct".into(), Type::Bool)],
            functions: vec![Function::new(
                "PSummaryPred".into(),
                vec![Parameter::new("a".into(), Type::Int)],
                Type::Bool,
            )],
            block_variables: vec!["entry_correct".into()],
        }
    }

    #[test]
    fn script_declares_and_negates() {
        let script = script(&vc(), Some(500)).unwrap();
        let expected = "; P
(set-option :produce-models true)
(set-option :timeout 500)
(declare-const x@0 Int)
(declare-const entry_correct Bool)
(declare-fun PSummaryPred (Int) Bool)
(assert (not (=> (PSummaryPred x@0) (> x@0 (- 1)))))
(check-sat)
(get-value (x@0 entry_correct))
(get-info :reason-unknown)
";
        assert_eq!(script, expected);
    }

    #[test]
    fn awkward_names_are_quoted() {
        assert_eq!(quote("x".into()), "x");
        assert_eq!(quote("old(g)".into()), "|old(g)|");
        assert_eq!(quote("and".into()), "|and|");
        assert_eq!(quote("1x".into()), "|1x|");
    }

    #[test]
    fn sat_answer_reports_a_model() {
        let mut handler = CollectingHandler::default();
        let response = "sat\n((|x@0| (- 4)) (entry_correct false))\n(error \"no reason\")\n";
        assert_eq!(interpret(response, &vc(), &mut handler).unwrap(), Outcome::Errors);
        let (labels, model) = &handler.models[0];
        assert_eq!(labels, &vec!["entry_correct".to_string()]);
        assert_eq!(model.element("x@0".into()), Some(&Value::Int((-4).into())));
    }

    #[test]
    fn unknown_answers_are_classified() {
        let mut handler = CollectingHandler::default();
        let timeout = "unknown\n(:reason-unknown \"timeout\")\n";
        assert_eq!(interpret(timeout, &vc(), &mut handler).unwrap(), Outcome::TimedOut);
        let memout = "unknown\n(:reason-unknown \"memout\")\n";
        assert_eq!(interpret(memout, &vc(), &mut handler).unwrap(), Outcome::OutOfMemory);
        let other = "unknown\n(:reason-unknown incomplete)\n";
        assert_eq!(interpret(other, &vc(), &mut handler).unwrap(), Outcome::Inconclusive);
        assert_eq!(interpret("unsat\n", &vc(), &mut handler).unwrap(), Outcome::Correct);
        assert!(handler.models.is_empty());
        assert!(matches!(
            interpret("(error \"boom\")", &vc(), &mut handler),
            Err(ProverError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn second_query_must_wait() {
        let mut prover = SmtLibProver::new(SmtLibOptions::default());
        prover.begin_check("P", &vc()).unwrap();
        assert!(matches!(prover.begin_check("P", &vc()), Err(ProverError::QueryInFlight(_))));
    }

    #[test]
    fn user_types_become_sorts() {
        let reference = Type::user_defined("Ref".into(), vec![]);
        let mut vc = vc();
        vc.symbols = vec![
            ("p".into(), reference.clone()),
            ("heap".into(), Type::map(reference, Type::Int)),
        ];
        let text = script(&vc, None).unwrap();
        assert!(text.contains("(declare-sort Ref 0)\n(declare-const p Ref)\n"));
        assert!(text.contains("(declare-const heap (Array Ref Int))"));

        vc.symbols = vec![("l".into(), Type::user_defined("List".into(), vec![Type::Int]))];
        assert!(matches!(script(&vc, None), Err(ProverError::Unsupported(_))));
    }

    #[test]
    fn outcome_without_query_is_an_error() {
        let mut prover = SmtLibProver::new(SmtLibOptions::default());
        let mut handler = CollectingHandler::default();
        assert!(matches!(prover.check_outcome(&mut handler), Err(ProverError::NoPendingQuery)));
    }
}
