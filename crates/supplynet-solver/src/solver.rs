use good_lp::Solution as _;
use good_lp::{Expression, ProblemVariables, ResolutionError, SolverModel, constraint, microlp, variable};
use log::{debug, warn};
use thiserror::Error;

use crate::problem::{Constraint, ConstraintOp, LinearExpr, LpProblem, Sense};
use crate::solution::Solution;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Constraint {constraint} references undeclared variable #{index}")]
    UnknownVariable { constraint: String, index: usize },
    #[error("Non-finite coefficient in {0}")]
    NonFinite(String),
    #[error("Invalid bounds on variable {0}")]
    InvalidBounds(String),
}

/// Hands an [`LpProblem`] to the `microlp` backend of `good_lp`
pub struct Solver {
    /// Tolerance for integrality rounding and feasibility checks
    tolerance: f64,
}

impl Default for Solver {
    fn default() -> Self {
        Self { tolerance: 1e-6 }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Check that every expression only references declared variables and finite numbers
    pub fn validate(&self, problem: &LpProblem) -> Result<(), SolverError> {
        let n = problem.num_variables();

        for v in &problem.variables {
            let upper_ok = v.upper.is_none_or(|u| !u.is_nan() && u >= v.lower);
            if v.lower.is_nan() || !upper_ok {
                return Err(SolverError::InvalidBounds(v.name.clone()));
            }
        }

        check_expr(&problem.objective.expr, n, "objective")?;
        for c in &problem.constraints {
            check_expr(&c.expr, n, &c.name)?;
            if !c.rhs.is_finite() {
                return Err(SolverError::NonFinite(c.name.clone()));
            }
        }
        Ok(())
    }

    /// Solve the problem; blocks until the backend returns
    pub fn solve(&self, problem: &LpProblem) -> Solution {
        if let Err(e) = self.validate(problem) {
            warn!("Problem {} rejected before solving: {}", problem.name, e);
            return Solution::error(e.to_string());
        }

        debug!(
            "Solving {}: {} variables, {} constraints",
            problem.name,
            problem.num_variables(),
            problem.num_constraints()
        );

        let mut vars = ProblemVariables::new();
        let handles: Vec<good_lp::Variable> = problem
            .variables
            .iter()
            .map(|v| {
                let mut def = variable().name(v.name.clone()).min(v.lower);
                if let Some(upper) = v.upper {
                    def = def.max(upper);
                }
                if v.integer {
                    def = def.integer();
                }
                vars.add(def)
            })
            .collect();

        let objective = to_expression(&problem.objective.expr, &handles);
        let unsolved = match problem.objective.sense {
            Sense::Minimize => vars.minimise(objective),
            Sense::Maximize => vars.maximise(objective),
        };

        let mut model = unsolved.using(microlp);
        for c in &problem.constraints {
            // Constant rows never reach the backend
            if c.expr.is_empty() {
                if constant_row_holds(c, self.tolerance) {
                    continue;
                }
                debug!("Problem {} is infeasible: {} cannot hold", problem.name, c.name);
                return Solution::infeasible();
            }
            let lhs = to_expression(&c.expr, &handles);
            let rhs = Expression::from(c.rhs);
            model = model.with(match c.op {
                ConstraintOp::Le => constraint::leq(lhs, rhs),
                ConstraintOp::Ge => constraint::leq(rhs, lhs),
                ConstraintOp::Eq => constraint::eq(lhs, rhs),
            });
        }

        match model.solve() {
            Ok(solved) => {
                let values: Vec<f64> = problem
                    .variables
                    .iter()
                    .zip(&handles)
                    .map(|(v, &h)| {
                        let value = solved.value(h);
                        if v.integer && (value - value.round()).abs() <= self.tolerance {
                            value.round()
                        } else {
                            value
                        }
                    })
                    .collect();
                let objective_value = problem.objective.expr.evaluate(&values);
                debug!("Problem {} solved to optimality: {}", problem.name, objective_value);
                Solution::optimal(values, objective_value)
            }
            Err(ResolutionError::Infeasible) => {
                debug!("Problem {} is infeasible", problem.name);
                Solution::infeasible()
            }
            Err(ResolutionError::Unbounded) => {
                debug!("Problem {} is unbounded", problem.name);
                Solution::unbounded()
            }
            Err(e) => {
                warn!("Solver failed on {}: {}", problem.name, e);
                Solution::error(e.to_string())
            }
        }
    }
}

fn check_expr(expr: &LinearExpr, n: usize, owner: &str) -> Result<(), SolverError> {
    if !expr.constant.is_finite() {
        return Err(SolverError::NonFinite(owner.to_string()));
    }
    for &(var, coef) in &expr.terms {
        if var.index() >= n {
            return Err(SolverError::UnknownVariable {
                constraint: owner.to_string(),
                index: var.index(),
            });
        }
        if !coef.is_finite() {
            return Err(SolverError::NonFinite(owner.to_string()));
        }
    }
    Ok(())
}

fn constant_row_holds(c: &Constraint, tolerance: f64) -> bool {
    let lhs = c.expr.constant;
    match c.op {
        ConstraintOp::Le => lhs <= c.rhs + tolerance,
        ConstraintOp::Ge => lhs >= c.rhs - tolerance,
        ConstraintOp::Eq => (lhs - c.rhs).abs() <= tolerance,
    }
}

fn to_expression(expr: &LinearExpr, handles: &[good_lp::Variable]) -> Expression {
    let mut out = Expression::from(expr.constant);
    for &(var, coef) in &expr.terms {
        out += coef * handles[var.index()];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solution::SolutionStatus;

    #[test]
    fn test_simple_maximization() {
        // Maximize: 3x + 2y
        // Subject to:
        //   x + y <= 4
        //   x <= 3
        //   y <= 3
        // Optimal: x=3, y=1, obj=11
        let mut problem = LpProblem::new("max");
        let x = problem.add_variable("x", 0.0, None);
        let y = problem.add_variable("y", 0.0, None);
        let mut objective = LinearExpr::new();
        objective += (x, 3.0);
        objective += (y, 2.0);
        problem.set_objective(objective, Sense::Maximize);
        problem.add_constraint("sum", LinearExpr::sum([x, y]), ConstraintOp::Le, 4.0);
        problem.add_constraint("x_max", LinearExpr::from(x), ConstraintOp::Le, 3.0);
        problem.add_constraint("y_max", LinearExpr::from(y), ConstraintOp::Le, 3.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 3.0).abs() < 1e-6, "x = {} (expected 3)", solution.values[0]);
        assert!((solution.values[1] - 1.0).abs() < 1e-6, "y = {} (expected 1)", solution.values[1]);
        assert!((solution.objective_value - 11.0).abs() < 1e-6, "obj = {} (expected 11)", solution.objective_value);
    }

    #[test]
    fn test_minimization_with_ge() {
        // Minimize: 2x + 3y
        // Subject to:
        //   x + y >= 4
        //   x <= 3
        //   y <= 3
        // Optimal: x=3, y=1, obj=9
        let mut problem = LpProblem::new("min");
        let x = problem.add_integer_variable("x");
        let y = problem.add_integer_variable("y");
        let mut objective = LinearExpr::new();
        objective += (x, 2.0);
        objective += (y, 3.0);
        problem.set_objective(objective, Sense::Minimize);
        problem.add_constraint("sum", LinearExpr::sum([x, y]), ConstraintOp::Ge, 4.0);
        problem.add_constraint("x_max", LinearExpr::from(x), ConstraintOp::Le, 3.0);
        problem.add_constraint("y_max", LinearExpr::from(y), ConstraintOp::Le, 3.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.values, vec![3.0, 1.0]);
        assert!((solution.objective_value - 9.0).abs() < 1e-6, "obj = {} (expected 9)", solution.objective_value);
        assert!(problem.violations(&solution.values, 1e-6).is_empty());
    }

    #[test]
    fn test_integer_rounding_down() {
        // Maximize x + y with 2x + 2y <= 5: LP optimum 2.5, integer optimum 2
        let mut problem = LpProblem::new("int");
        let x = problem.add_integer_variable("x");
        let y = problem.add_integer_variable("y");
        problem.set_objective(LinearExpr::sum([x, y]), Sense::Maximize);
        problem.add_constraint("cap", LinearExpr::sum([x, y]) * 2.0, ConstraintOp::Le, 5.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value - 2.0).abs() < 1e-6);
        assert!(solution.values.iter().all(|v| v.fract() == 0.0));
    }

    #[test]
    fn test_equality() {
        let mut problem = LpProblem::new("eq");
        let x = problem.add_integer_variable("x");
        let y = problem.add_integer_variable("y");
        let mut objective = LinearExpr::from(x);
        objective += (y, 4.0);
        problem.set_objective(objective, Sense::Minimize);
        problem.add_constraint("balance", LinearExpr::sum([x, y]), ConstraintOp::Eq, 7.0);
        problem.add_constraint("x_cap", LinearExpr::from(x), ConstraintOp::Le, 5.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.values, vec![5.0, 2.0]);
        assert!((solution.objective_value - 13.0).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible() {
        // x >= 5
        // x <= 3
        let mut problem = LpProblem::new("infeasible");
        let x = problem.add_integer_variable("x");
        problem.set_objective(LinearExpr::from(x), Sense::Minimize);
        problem.add_constraint("lower", LinearExpr::from(x), ConstraintOp::Ge, 5.0);
        problem.add_constraint("upper", LinearExpr::from(x), ConstraintOp::Le, 3.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(solution.values.is_empty());
    }

    #[test]
    fn test_unbounded() {
        let mut problem = LpProblem::new("unbounded");
        let x = problem.add_variable("x", 0.0, None);
        problem.set_objective(LinearExpr::from(x), Sense::Maximize);
        problem.add_constraint("lower", LinearExpr::from(x), ConstraintOp::Ge, 1.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Unbounded);
    }

    #[test]
    fn test_constant_rows() {
        let mut problem = LpProblem::new("constant");
        let x = problem.add_integer_variable("x");
        problem.set_objective(LinearExpr::from(x), Sense::Minimize);
        problem.add_constraint("trivial", LinearExpr::new(), ConstraintOp::Eq, 0.0);
        problem.add_constraint("floor", LinearExpr::from(x), ConstraintOp::Ge, 2.0);

        let solution = Solver::new().solve(&problem);
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.values, vec![2.0]);

        problem.add_constraint("impossible", LinearExpr::new(), ConstraintOp::Ge, 1.0);
        let solution = Solver::new().solve(&problem);
        assert_eq!(solution.status, SolutionStatus::Infeasible);
    }

    #[test]
    fn test_rejects_malformed_numbers() {
        let solver = Solver::new();

        let mut problem = LpProblem::new("nan_rhs");
        let x = problem.add_integer_variable("x");
        problem.set_objective(LinearExpr::from(x), Sense::Minimize);
        problem.add_constraint("cap", LinearExpr::from(x), ConstraintOp::Le, f64::NAN);
        assert_eq!(solver.validate(&problem), Err(SolverError::NonFinite("cap".to_string())));
        let solution = solver.solve(&problem);
        assert_eq!(solution.status, SolutionStatus::Error);
        assert!(solution.objective_value.is_nan());

        let mut problem = LpProblem::new("inf_coef");
        let x = problem.add_integer_variable("x");
        problem.set_objective(LinearExpr::from(x) * f64::INFINITY, Sense::Minimize);
        assert_eq!(solver.validate(&problem), Err(SolverError::NonFinite("objective".to_string())));

        let mut problem = LpProblem::new("bounds");
        let x = problem.add_variable("x", 2.0, Some(1.0));
        problem.set_objective(LinearExpr::from(x), Sense::Minimize);
        assert_eq!(solver.validate(&problem), Err(SolverError::InvalidBounds("x".to_string())));
        assert_eq!(solver.solve(&problem).status, SolutionStatus::Error);
    }

    #[test]
    fn test_rejects_unknown_variable() {
        let mut problem = LpProblem::new("broken");
        let mut other = LpProblem::new("other");
        other.add_integer_variable("a");
        let b = other.add_integer_variable("b");
        problem.add_integer_variable("x");
        problem.add_constraint("bad", LinearExpr::from(b), ConstraintOp::Le, 1.0);

        let solver = Solver::new();
        assert_eq!(
            solver.validate(&problem),
            Err(SolverError::UnknownVariable { constraint: "bad".to_string(), index: 1 })
        );
        let solution = solver.solve(&problem);
        assert_eq!(solution.status, SolutionStatus::Error);
        assert!(solution.message.is_some());
    }
}
