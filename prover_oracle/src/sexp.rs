// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Just enough of an S-expression reader to understand solver responses.

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Sexp {
    /// A symbol or numeral. Quoted symbols are stored without their bars.
    Atom(String),
    Str(String),
    List(Vec<Sexp>),
}

impl Sexp {
    pub(crate) fn as_atom(&self) -> Option<&str> {
        match self {
            Sexp::Atom(a) => Some(a),
            _ => None,
        }
    }

    pub(crate) fn as_list(&self) -> Option<&[Sexp]> {
        match self {
            Sexp::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Read every S-expression in `input`. Comments start with `;`.
pub(crate) fn parse_all(input: &str) -> Result<Vec<Sexp>, String> {
    let mut chars = input.chars().peekable();
    let mut stack: Vec<Vec<Sexp>> = vec![Vec::new()];
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' => stack.push(Vec::new()),
            ')' => {
                let items = stack.pop().ok_or("unbalanced `)`")?;
                let parent = stack.last_mut().ok_or("unbalanced `)`")?;
                parent.push(Sexp::List(items));
            }
            '"' => {
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            text.push('"');
                        }
                        Some('"') => break,
                        Some(c) => text.push(c),
                        None => return Err("unterminated string".to_string()),
                    }
                }
                push(&mut stack, Sexp::Str(text))?;
            }
            '|' => {
                let mut symbol = String::new();
                loop {
                    match chars.next() {
                        Some('|') => break,
                        Some(c) => symbol.push(c),
                        None => return Err("unterminated quoted symbol".to_string()),
                    }
                }
                push(&mut stack, Sexp::Atom(symbol))?;
            }
            c => {
                let mut atom = String::from(c);
                while let Some(next) = chars.peek() {
                    if next.is_whitespace() || matches!(*next, '(' | ')' | ';' | '"' | '|') {
                        break;
                    }
                    atom.push(*next);
                    chars.next();
                }
                push(&mut stack, Sexp::Atom(atom))?;
            }
        }
    }
    match stack.pop() {
        Some(top) if stack.is_empty() => Ok(top),
        _ => Err("unbalanced `(`".to_string()),
    }
}

fn push(stack: &mut [Vec<Sexp>], sexp: Sexp) -> Result<(), String> {
    stack.last_mut().ok_or_else(|| "unbalanced `)`".to_string())?.push(sexp);
    Ok(())
}
