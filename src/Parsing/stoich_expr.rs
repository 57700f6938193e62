//! Symbolic evaluator for stoichiometric amount expressions.
//!
//! Amounts extracted from material formulas are tiny linear/polynomial
//! expressions over single-letter variables, e.g. "1-x", "(0.5)*(2)",
//! "(x)*(1)+(0.07)*(1)". The evaluator canonicalizes them into a
//! sum-of-products form over exact rational coefficients, so "x+1-1"
//! collapses to "x" and "(1)*(0.07)" to "0.07" without intermediate
//! floating point. Floats appear only at printing time, rounded to
//! three decimal places.
//!
//! The canonical string never starts with a negative term when a
//! positive one exists ("1-x", not "-x+1") and `simplify` is
//! idempotent: feeding its output back returns the same string.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ExprError {
    #[error("unexpected character '{0}' in expression")]
    BadToken(char),
    #[error("unbalanced parentheses in expression")]
    UnbalancedParentheses,
    #[error("expression ended unexpectedly")]
    UnexpectedEnd,
    #[error("unexpected token at position {0}")]
    UnexpectedToken(usize),
    #[error("division by zero")]
    DivisionByZero,
    #[error("cannot divide by an expression with several terms")]
    UnsupportedDivision,
    #[error("numeric overflow while evaluating expression")]
    Overflow,
    #[error("expression '{0}' is not a pure number")]
    NotNumeric(String),
}

/// Exact rational number over i64, always kept in lowest terms with a
/// positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ratio {
    num: i64,
    den: i64,
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

impl Ratio {
    pub(crate) const ZERO: Ratio = Ratio { num: 0, den: 1 };
    pub(crate) const ONE: Ratio = Ratio { num: 1, den: 1 };

    fn new(num: i64, den: i64) -> Result<Ratio, ExprError> {
        if den == 0 {
            return Err(ExprError::DivisionByZero);
        }
        let sign = if den < 0 { -1 } else { 1 };
        let g = gcd(num, den);
        Ok(Ratio {
            num: sign * num / g,
            den: sign * den / g,
        })
    }

    fn from_int(n: i64) -> Ratio {
        Ratio { num: n, den: 1 }
    }

    fn add(self, other: Ratio) -> Result<Ratio, ExprError> {
        let num = self
            .num
            .checked_mul(other.den)
            .and_then(|a| other.num.checked_mul(self.den).and_then(|b| a.checked_add(b)))
            .ok_or(ExprError::Overflow)?;
        let den = self.den.checked_mul(other.den).ok_or(ExprError::Overflow)?;
        Ratio::new(num, den)
    }

    fn mul(self, other: Ratio) -> Result<Ratio, ExprError> {
        let num = self.num.checked_mul(other.num).ok_or(ExprError::Overflow)?;
        let den = self.den.checked_mul(other.den).ok_or(ExprError::Overflow)?;
        Ratio::new(num, den)
    }

    fn div(self, other: Ratio) -> Result<Ratio, ExprError> {
        if other.num == 0 {
            return Err(ExprError::DivisionByZero);
        }
        let num = self.num.checked_mul(other.den).ok_or(ExprError::Overflow)?;
        let den = self.den.checked_mul(other.num).ok_or(ExprError::Overflow)?;
        Ratio::new(num, den)
    }

    fn neg(self) -> Ratio {
        Ratio {
            num: -self.num,
            den: self.den,
        }
    }

    fn is_zero(self) -> bool {
        self.num == 0
    }

    fn is_integer(self) -> bool {
        self.den == 1
    }

    pub(crate) fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Parse a decimal literal like "2", "0.05" or ".5" into an exact ratio.
    fn parse_decimal(int_part: &str, frac_part: &str) -> Result<Ratio, ExprError> {
        if frac_part.len() > 12 {
            return Err(ExprError::Overflow);
        }
        let whole: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| ExprError::Overflow)?
        };
        if frac_part.is_empty() {
            return Ok(Ratio::from_int(whole));
        }
        let scale = 10i64
            .checked_pow(frac_part.len() as u32)
            .ok_or(ExprError::Overflow)?;
        let frac: i64 = frac_part.parse().map_err(|_| ExprError::Overflow)?;
        let num = whole
            .checked_mul(scale)
            .and_then(|w| w.checked_add(frac))
            .ok_or(ExprError::Overflow)?;
        Ratio::new(num, scale)
    }
}

/// One product term: an exact coefficient times a monomial over
/// single-letter variables. Negative exponents encode division by a
/// variable ("1/x").
#[derive(Debug, Clone, PartialEq)]
struct Term {
    coeff: Ratio,
    vars: BTreeMap<char, i32>,
}

impl Term {
    fn constant(coeff: Ratio) -> Term {
        Term {
            coeff,
            vars: BTreeMap::new(),
        }
    }

    fn variable(v: char) -> Term {
        let mut vars = BTreeMap::new();
        vars.insert(v, 1);
        Term {
            coeff: Ratio::ONE,
            vars,
        }
    }

    fn total_degree(&self) -> i32 {
        self.vars.values().sum()
    }

    fn same_monomial(&self, other: &Term) -> bool {
        self.vars == other.vars
    }
}

/// Normalized sum of terms. Like monomials are always combined and
/// zero-coefficient terms removed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Poly {
    terms: Vec<Term>,
}

impl Poly {
    fn zero() -> Poly {
        Poly { terms: Vec::new() }
    }

    fn from_term(t: Term) -> Poly {
        let mut p = Poly { terms: vec![t] };
        p.normalize();
        p
    }

    fn normalize(&mut self) {
        let mut merged: Vec<Term> = Vec::new();
        for t in self.terms.drain(..) {
            match merged.iter_mut().find(|m| m.same_monomial(&t)) {
                Some(m) => {
                    // errors cannot occur here if the terms were built
                    // through checked ops, but keep zero on overflow out
                    m.coeff = m.coeff.add(t.coeff).unwrap_or(Ratio::ZERO);
                }
                None => merged.push(t),
            }
        }
        merged.retain(|t| !t.coeff.is_zero());
        // highest total degree first, then lexicographic monomial order
        merged.sort_by(|a, b| {
            b.total_degree()
                .cmp(&a.total_degree())
                .then_with(|| a.vars.cmp(&b.vars))
        });
        self.terms = merged;
    }

    fn add(mut self, other: Poly) -> Poly {
        self.terms.extend(other.terms);
        self.normalize();
        self
    }

    fn neg(mut self) -> Poly {
        for t in &mut self.terms {
            t.coeff = t.coeff.neg();
        }
        self
    }

    fn mul(self, other: &Poly) -> Result<Poly, ExprError> {
        let mut out = Vec::new();
        for a in &self.terms {
            for b in &other.terms {
                let coeff = a.coeff.mul(b.coeff)?;
                let mut vars = a.vars.clone();
                for (v, e) in &b.vars {
                    *vars.entry(*v).or_insert(0) += e;
                }
                vars.retain(|_, e| *e != 0);
                out.push(Term { coeff, vars });
            }
        }
        let mut p = Poly { terms: out };
        p.normalize();
        Ok(p)
    }

    fn div(self, other: &Poly) -> Result<Poly, ExprError> {
        if other.terms.is_empty() {
            return Err(ExprError::DivisionByZero);
        }
        if other.terms.len() > 1 {
            return Err(ExprError::UnsupportedDivision);
        }
        let d = &other.terms[0];
        let mut out = Vec::new();
        for a in &self.terms {
            let coeff = a.coeff.div(d.coeff)?;
            let mut vars = a.vars.clone();
            for (v, e) in &d.vars {
                *vars.entry(*v).or_insert(0) -= e;
            }
            vars.retain(|_, e| *e != 0);
            out.push(Term { coeff, vars });
        }
        let mut p = Poly { terms: out };
        p.normalize();
        Ok(p)
    }

    fn pow(self, exp: u32) -> Result<Poly, ExprError> {
        let mut acc = Poly::from_term(Term::constant(Ratio::ONE));
        for _ in 0..exp {
            acc = acc.mul(&self)?;
        }
        Ok(acc)
    }

    /// Replace a variable by an exact rational value.
    fn substitute(self, var: char, value: Ratio) -> Result<Poly, ExprError> {
        let mut out = Vec::new();
        for mut t in self.terms {
            if let Some(exp) = t.vars.remove(&var) {
                let mut factor = Ratio::ONE;
                if exp >= 0 {
                    for _ in 0..exp {
                        factor = factor.mul(value)?;
                    }
                } else {
                    for _ in 0..(-exp) {
                        factor = factor.div(value)?;
                    }
                }
                t.coeff = t.coeff.mul(factor)?;
            }
            out.push(t);
        }
        let mut p = Poly { terms: out };
        p.normalize();
        Ok(p)
    }

    fn variables(&self) -> Vec<char> {
        let mut vars: Vec<char> = self
            .terms
            .iter()
            .flat_map(|t| t.vars.keys().copied())
            .collect();
        vars.sort_unstable();
        vars.dedup();
        vars
    }

    fn as_constant(&self) -> Option<Ratio> {
        match self.terms.len() {
            0 => Some(Ratio::ZERO),
            1 if self.terms[0].vars.is_empty() => Some(self.terms[0].coeff),
            _ => None,
        }
    }
}

// -------------------------------------------------------------------------
// tokenizer

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(Ratio),
    Var(char),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn is_variable_char(c: char) -> bool {
    c.is_ascii_lowercase() || ('α'..='ω').contains(&c)
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() || c == '.' {
            let start = i;
            let mut seen_dot = false;
            while i < chars.len() && (chars[i].is_ascii_digit() || (chars[i] == '.' && !seen_dot)) {
                if chars[i] == '.' {
                    seen_dot = true;
                }
                i += 1;
            }
            let lit: String = chars[start..i].iter().collect();
            let (int_part, frac_part) = match lit.split_once('.') {
                Some((a, b)) => (a, b),
                None => (lit.as_str(), ""),
            };
            if int_part.is_empty() && frac_part.is_empty() {
                return Err(ExprError::BadToken('.'));
            }
            tokens.push(Token::Num(Ratio::parse_decimal(int_part, frac_part)?));
            // "2x" and "0.5x" carry an implicit multiplication
            if i < chars.len() && (is_variable_char(chars[i]) || chars[i] == '(') {
                tokens.push(Token::Star);
            }
            continue;
        }
        if is_variable_char(c) {
            tokens.push(Token::Var(c));
            i += 1;
            continue;
        }
        let tok = match c {
            '+' => Token::Plus,
            '-' | '−' | '–' => Token::Minus,
            '*' | '∗' | '⋅' | '·' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => return Err(ExprError::BadToken(other)),
        };
        tokens.push(tok);
        i += 1;
    }
    Ok(tokens)
}

// -------------------------------------------------------------------------
// recursive-descent parser

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expr(&mut self) -> Result<Poly, ExprError> {
        let mut acc = match self.peek() {
            // leading sign
            Some(Token::Minus) => {
                self.pos += 1;
                self.term()?.neg()
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.term()?
            }
            _ => self.term()?,
        };
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    acc = acc.add(self.term()?);
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    acc = acc.add(self.term()?.neg());
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<Poly, ExprError> {
        let mut acc = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    acc = acc.mul(&rhs)?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    acc = acc.div(&rhs)?;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<Poly, ExprError> {
        let base = match self.bump() {
            Some(Token::Num(r)) => Poly::from_term(Term::constant(r)),
            Some(Token::Var(v)) => Poly::from_term(Term::variable(v)),
            Some(Token::Minus) => return Ok(self.factor()?.neg()),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.bump() {
                    Some(Token::RParen) => inner,
                    Some(_) => return Err(ExprError::UnexpectedToken(self.pos - 1)),
                    None => return Err(ExprError::UnbalancedParentheses),
                }
            }
            Some(_) => return Err(ExprError::UnexpectedToken(self.pos - 1)),
            None => return Err(ExprError::UnexpectedEnd),
        };
        if self.peek() == Some(Token::Caret) {
            self.pos += 1;
            let exp = match self.bump() {
                Some(Token::Num(r)) if r.is_integer() && r.num >= 0 && r.num <= 16 => r.num as u32,
                _ => return Err(ExprError::UnexpectedToken(self.pos - 1)),
            };
            return base.pow(exp);
        }
        Ok(base)
    }
}

pub(crate) fn parse(input: &str) -> Result<Poly, ExprError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExprError::UnexpectedEnd);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let poly = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::UnexpectedToken(parser.pos));
    }
    Ok(poly)
}

// -------------------------------------------------------------------------
// canonical printing

/// Round to three decimal places and print without trailing zeros:
/// 1/3 -> "0.333", 1/2 -> "0.5", 2/1 -> "2".
fn format_number(r: Ratio) -> String {
    if r.is_integer() {
        return r.num.to_string();
    }
    let rounded = (r.to_f64() * 1000.0).round() / 1000.0;
    format!("{}", rounded)
}

fn format_term_magnitude(t: &Term) -> String {
    let coeff = Ratio {
        num: t.coeff.num.abs(),
        den: t.coeff.den,
    };
    let num_vars: Vec<(char, i32)> = t
        .vars
        .iter()
        .filter(|(_, e)| **e > 0)
        .map(|(v, e)| (*v, *e))
        .collect();
    let den_vars: Vec<(char, i32)> = t
        .vars
        .iter()
        .filter(|(_, e)| **e < 0)
        .map(|(v, e)| (*v, -*e))
        .collect();

    let mut out = String::new();
    if num_vars.is_empty() || coeff != Ratio::ONE {
        out.push_str(&format_number(coeff));
    }
    for (v, e) in &num_vars {
        if !out.is_empty() {
            out.push('*');
        }
        if *e == 1 {
            out.push(*v);
        } else {
            let _ = write!(out, "{}^{}", v, e);
        }
    }
    for (v, e) in &den_vars {
        out.push('/');
        if *e == 1 {
            out.push(*v);
        } else {
            let _ = write!(out, "{}^{}", v, e);
        }
    }
    out
}

fn poly_to_string(p: &Poly) -> String {
    if p.terms.is_empty() {
        return "0".to_string();
    }
    let mut terms: Vec<&Term> = p.terms.iter().collect();
    // never lead with a negative term when a positive one exists
    if terms[0].coeff.num < 0 {
        if let Some(pos) = terms.iter().position(|t| t.coeff.num > 0) {
            let t = terms.remove(pos);
            terms.insert(0, t);
        }
    }
    let mut out = String::new();
    for (i, t) in terms.iter().enumerate() {
        if t.coeff.num < 0 {
            out.push('-');
        } else if i > 0 {
            out.push('+');
        }
        out.push_str(&format_term_magnitude(t));
    }
    out
}

// -------------------------------------------------------------------------
// public entry points

/// Canonicalize an amount expression. Purely numeric input evaluates to a
/// decimal rounded to three places; symbolic input keeps its variables.
pub fn simplify(input: &str) -> Result<String, ExprError> {
    let poly = parse(input)?;
    Ok(poly_to_string(&poly))
}

/// Evaluate an expression that must contain no variables, e.g. "1/3".
pub fn eval_numeric(input: &str) -> Result<f64, ExprError> {
    let poly = parse(input)?;
    poly.as_constant()
        .map(Ratio::to_f64)
        .ok_or_else(|| ExprError::NotNumeric(input.to_string()))
}

/// Evaluate a variable-free expression to an exact rational
/// (numerator, denominator) pair.
pub fn eval_rational(input: &str) -> Result<(i64, i64), ExprError> {
    let poly = parse(input)?;
    poly.as_constant()
        .map(|r| (r.num, r.den))
        .ok_or_else(|| ExprError::NotNumeric(input.to_string()))
}

/// Substitute a numeric value for one variable and re-canonicalize.
/// The value string may itself be any numeric expression ("0.25", "1/3").
pub fn substitute(input: &str, var: char, value: &str) -> Result<String, ExprError> {
    let val = parse(value)?
        .as_constant()
        .ok_or_else(|| ExprError::NotNumeric(value.to_string()))?;
    let poly = parse(input)?.substitute(var, val)?;
    Ok(poly_to_string(&poly))
}

/// Variables occurring in an expression, sorted and deduplicated.
pub fn variables_of(input: &str) -> Result<Vec<char>, ExprError> {
    Ok(parse(input)?.variables())
}
