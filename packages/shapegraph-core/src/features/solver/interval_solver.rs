//! Interval Solver - default in-process oracle
//!
//! Decides conjunctions of constraints whose difference `lhs - rhs` is a
//! linear form in at most one symbolic identifier (`a*x + c op 0`). Each
//! such constraint narrows an integer interval for `x` or adds a
//! disequality. Constraints of any other shape are skipped; the answer is
//! then `Unknown` unless the supported part alone is contradictory.
//!
//! ```text
//! x >= 1, x <= 3, x != 1, x != 3   =>  Sat, model x = 2
//! 2*x == 5                         =>  Unsat (no integer solution)
//! x == y                           =>  Unknown (two identifiers)
//! ```

use super::domain::{CompareOp, Constraint, SolverResult};
use super::ports::SolverOracle;
use crate::features::program_state::value::{SymbolicExpr, SymbolicId, Value};
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use std::collections::{BTreeMap, BTreeSet};

// ═══════════════════════════════════════════════════════════════════════════
// Linear forms
// ═══════════════════════════════════════════════════════════════════════════

/// `Σ coefficient·id + constant`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct LinearForm {
    coefficients: BTreeMap<SymbolicId, BigInt>,
    constant: BigInt,
}

impl LinearForm {
    fn constant(value: BigInt) -> Self {
        Self {
            coefficients: BTreeMap::new(),
            constant: value,
        }
    }

    fn variable(id: SymbolicId) -> Self {
        let mut coefficients = BTreeMap::new();
        coefficients.insert(id, BigInt::one());
        Self {
            coefficients,
            constant: BigInt::zero(),
        }
    }

    fn add(mut self, other: LinearForm) -> Self {
        for (id, coefficient) in other.coefficients {
            let entry = self.coefficients.entry(id).or_insert_with(BigInt::zero);
            *entry += coefficient;
        }
        self.coefficients.retain(|_, c| !c.is_zero());
        self.constant += other.constant;
        self
    }

    fn scale(mut self, factor: &BigInt) -> Self {
        if factor.is_zero() {
            return LinearForm::default();
        }
        for coefficient in self.coefficients.values_mut() {
            *coefficient *= factor;
        }
        self.constant *= factor;
        self
    }

    fn as_constant(&self) -> Option<&BigInt> {
        self.coefficients.is_empty().then_some(&self.constant)
    }

    fn of(value: &Value) -> Option<LinearForm> {
        match value {
            Value::Numeric(n) => Some(LinearForm::constant(n.clone())),
            Value::Unknown => None,
            Value::Symbolic(SymbolicExpr::Ident(id)) => Some(LinearForm::variable(*id)),
            Value::Symbolic(SymbolicExpr::Add(a, b)) => Some(Self::of(a)?.add(Self::of(b)?)),
            Value::Symbolic(SymbolicExpr::Sub(a, b)) => {
                Some(Self::of(a)?.add(Self::of(b)?.scale(&BigInt::from(-1))))
            }
            Value::Symbolic(SymbolicExpr::Mul(a, b)) => {
                let (a, b) = (Self::of(a)?, Self::of(b)?);
                match (a.as_constant(), b.as_constant()) {
                    (Some(c), _) => Some(b.clone().scale(c)),
                    (_, Some(c)) => Some(a.clone().scale(c)),
                    _ => None,
                }
            }
            Value::Address(address) => {
                Some(LinearForm::variable(address.base).add(Self::of(&address.offset)?))
            }
        }
    }
}

fn floor_div(a: &BigInt, b: &BigInt) -> BigInt {
    let q = a / b;
    let r = a % b;
    if !r.is_zero() && (r.is_negative() != b.is_negative()) {
        q - 1
    } else {
        q
    }
}

fn ceil_div(a: &BigInt, b: &BigInt) -> BigInt {
    -floor_div(&-a, b)
}

// ═══════════════════════════════════════════════════════════════════════════
// Per-identifier domain
// ═══════════════════════════════════════════════════════════════════════════

/// Closed integer interval minus a finite set of excluded points
#[derive(Debug, Clone, Default)]
struct IntDomain {
    lower: Option<BigInt>,
    upper: Option<BigInt>,
    excluded: BTreeSet<BigInt>,
}

impl IntDomain {
    fn raise_lower(&mut self, bound: BigInt) {
        if self.lower.as_ref().map_or(true, |l| &bound > l) {
            self.lower = Some(bound);
        }
    }

    fn lower_upper(&mut self, bound: BigInt) {
        if self.upper.as_ref().map_or(true, |u| &bound < u) {
            self.upper = Some(bound);
        }
    }

    fn contains(&self, v: &BigInt) -> bool {
        self.lower.as_ref().map_or(true, |l| v >= l)
            && self.upper.as_ref().map_or(true, |u| v <= u)
            && !self.excluded.contains(v)
    }

    /// Shrink finite endpoints past excluded points
    fn normalize(&mut self) {
        if let Some(lower) = self.lower.as_mut() {
            while self.excluded.contains(lower) {
                *lower += 1;
            }
        }
        if let Some(upper) = self.upper.as_mut() {
            while self.excluded.contains(upper) {
                *upper -= 1;
            }
        }
    }

    fn is_empty(&self) -> bool {
        matches!((&self.lower, &self.upper), (Some(l), Some(u)) if l > u)
    }

    /// Member closest to zero
    fn pick(&self) -> Option<BigInt> {
        if self.is_empty() {
            return None;
        }
        let start = match (&self.lower, &self.upper) {
            (Some(l), _) if l.is_positive() => l.clone(),
            (_, Some(u)) if u.is_negative() => u.clone(),
            _ => BigInt::zero(),
        };
        // at most |excluded| + 1 steps in either direction
        let limit = self.excluded.len() + 1;
        let mut up = start.clone();
        let mut down = start;
        for _ in 0..=limit {
            if self.contains(&up) {
                return Some(up);
            }
            if self.contains(&down) {
                return Some(down);
            }
            up += 1;
            down -= 1;
        }
        None
    }
}

/// Outcome of folding all supported constraints
struct Analysis {
    domains: BTreeMap<SymbolicId, IntDomain>,
    contradiction: bool,
    complete: bool,
}

// ═══════════════════════════════════════════════════════════════════════════
// Solver
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default)]
pub struct IntervalSolver;

impl IntervalSolver {
    pub fn new() -> Self {
        Self
    }

    fn analyze(constraints: &[Constraint]) -> Analysis {
        let mut analysis = Analysis {
            domains: BTreeMap::new(),
            contradiction: false,
            complete: true,
        };

        for constraint in constraints {
            let (Some(lhs), Some(rhs)) = (LinearForm::of(&constraint.lhs), LinearForm::of(&constraint.rhs))
            else {
                analysis.complete = false;
                continue;
            };
            // lhs - rhs op 0
            let form = lhs.add(rhs.scale(&BigInt::from(-1)));

            if let Some(c) = form.as_constant() {
                if !holds(c, constraint.op) {
                    analysis.contradiction = true;
                    return analysis;
                }
                continue;
            }
            if form.coefficients.len() > 1 {
                analysis.complete = false;
                continue;
            }

            let Some((id, a)) = form.coefficients.iter().next() else {
                continue;
            };
            // a*x op k
            let k = -&form.constant;
            let domain = analysis.domains.entry(*id).or_default();
            match constraint.op {
                CompareOp::Eq => {
                    if !(&k % a).is_zero() {
                        analysis.contradiction = true;
                        return analysis;
                    }
                    let v = &k / a;
                    domain.raise_lower(v.clone());
                    domain.lower_upper(v);
                }
                CompareOp::Ne => {
                    if (&k % a).is_zero() {
                        domain.excluded.insert(&k / a);
                    }
                }
                CompareOp::Le => bound_le(domain, a, &k),
                CompareOp::Lt => bound_le(domain, a, &(&k - 1)),
                CompareOp::Ge => bound_ge(domain, a, &k),
                CompareOp::Gt => bound_ge(domain, a, &(&k + 1)),
            }
        }

        for domain in analysis.domains.values_mut() {
            domain.normalize();
            if domain.is_empty() {
                analysis.contradiction = true;
            }
        }
        analysis
    }
}

fn holds(c: &BigInt, op: CompareOp) -> bool {
    let zero = BigInt::zero();
    match op {
        CompareOp::Eq => c == &zero,
        CompareOp::Ne => c != &zero,
        CompareOp::Lt => c < &zero,
        CompareOp::Le => c <= &zero,
        CompareOp::Gt => c > &zero,
        CompareOp::Ge => c >= &zero,
    }
}

/// a*x <= k
fn bound_le(domain: &mut IntDomain, a: &BigInt, k: &BigInt) {
    if a.is_positive() {
        domain.lower_upper(floor_div(k, a));
    } else {
        domain.raise_lower(ceil_div(k, a));
    }
}

/// a*x >= k
fn bound_ge(domain: &mut IntDomain, a: &BigInt, k: &BigInt) {
    if a.is_positive() {
        domain.raise_lower(ceil_div(k, a));
    } else {
        domain.lower_upper(floor_div(k, a));
    }
}

impl SolverOracle for IntervalSolver {
    fn name(&self) -> &'static str {
        "interval"
    }

    fn check(&self, constraints: &[Constraint]) -> SolverResult {
        let analysis = Self::analyze(constraints);
        if analysis.contradiction {
            SolverResult::Unsat
        } else if analysis.complete {
            SolverResult::Sat
        } else {
            SolverResult::Unknown
        }
    }

    fn model_value(&self, constraints: &[Constraint], id: SymbolicId) -> Option<BigInt> {
        let analysis = Self::analyze(constraints);
        if analysis.contradiction {
            return None;
        }
        match analysis.domains.get(&id) {
            Some(domain) => domain.pick(),
            None => Some(BigInt::zero()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Value {
        Value::ident(SymbolicId(0))
    }

    fn y() -> Value {
        Value::ident(SymbolicId(1))
    }

    #[test]
    fn test_interval_contradiction() {
        let solver = IntervalSolver::new();
        let constraints = vec![
            Constraint::gt(x(), Value::from(5)),
            Constraint::lt(x(), Value::from(3)),
        ];
        assert_eq!(solver.check(&constraints), SolverResult::Unsat);
    }

    #[test]
    fn test_scaled_equality() {
        let solver = IntervalSolver::new();
        let two_x = x().times(&Value::from(2));
        assert_eq!(solver.check(&[Constraint::eq(two_x.clone(), Value::from(5))]), SolverResult::Unsat);
        assert_eq!(solver.check(&[Constraint::eq(two_x.clone(), Value::from(6))]), SolverResult::Sat);
        assert_eq!(
            solver.model_value(&[Constraint::eq(two_x, Value::from(6))], SymbolicId(0)),
            Some(BigInt::from(3))
        );
    }

    #[test]
    fn test_negative_coefficient() {
        let solver = IntervalSolver::new();
        // 10 - x >= 8  =>  x <= 2
        let c = Constraint::ge(Value::from(10).minus(&x()), Value::from(8));
        let constraints = vec![c, Constraint::ge(x(), Value::from(2))];
        assert_eq!(solver.model_value(&constraints, SymbolicId(0)), Some(BigInt::from(2)));
        let more = vec![constraints[0].clone(), Constraint::gt(x(), Value::from(2))];
        assert_eq!(solver.check(&more), SolverResult::Unsat);
    }

    #[test]
    fn test_disequalities_exhaust_interval() {
        let solver = IntervalSolver::new();
        let constraints = vec![
            Constraint::ge(x(), Value::from(1)),
            Constraint::le(x(), Value::from(2)),
            Constraint::ne(x(), Value::from(1)),
            Constraint::ne(x(), Value::from(2)),
        ];
        assert_eq!(solver.check(&constraints), SolverResult::Unsat);
    }

    #[test]
    fn test_model_skips_excluded() {
        let solver = IntervalSolver::new();
        let constraints = vec![
            Constraint::ge(x(), Value::from(0)),
            Constraint::ne(x(), Value::from(0)),
            Constraint::ne(x(), Value::from(1)),
        ];
        assert_eq!(solver.model_value(&constraints, SymbolicId(0)), Some(BigInt::from(2)));
        assert_eq!(solver.model_value(&constraints, SymbolicId(9)), Some(BigInt::from(0)));
    }

    #[test]
    fn test_two_identifiers_are_unknown() {
        let solver = IntervalSolver::new();
        assert_eq!(solver.check(&[Constraint::eq(x(), y())]), SolverResult::Unknown);
        // the supported part still refutes
        let constraints = vec![
            Constraint::eq(x(), y()),
            Constraint::eq(Value::from(1), Value::from(2)),
        ];
        assert_eq!(solver.check(&constraints), SolverResult::Unsat);
    }

    #[test]
    fn test_unknown_values_are_skipped() {
        let solver = IntervalSolver::new();
        assert_eq!(
            solver.check(&[Constraint::eq(Value::Unknown, Value::from(1))]),
            SolverResult::Unknown
        );
    }

    #[test]
    fn test_floor_and_ceil_division() {
        assert_eq!(floor_div(&BigInt::from(-7), &BigInt::from(2)), BigInt::from(-4));
        assert_eq!(ceil_div(&BigInt::from(-7), &BigInt::from(2)), BigInt::from(-3));
        assert_eq!(floor_div(&BigInt::from(7), &BigInt::from(-2)), BigInt::from(-4));
        assert_eq!(ceil_div(&BigInt::from(7), &BigInt::from(2)), BigInt::from(4));
    }
}
