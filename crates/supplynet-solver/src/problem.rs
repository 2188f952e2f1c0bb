use std::fmt;
use std::ops::{AddAssign, Mul};

use crate::solution::ConstraintViolation;

/// Handle to a variable declared on an [`LpProblem`]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Declaration of a decision variable
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    /// Restrict the variable to integral values
    pub integer: bool,
    pub lower: f64,
    /// `None` means unbounded above
    pub upper: Option<f64>,
}

/// Sparse linear expression: `sum(coef * var) + constant`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Sum of the given variables, each with coefficient 1
    pub fn sum(vars: impl IntoIterator<Item = VarId>) -> Self {
        Self {
            terms: vars.into_iter().map(|v| (v, 1.0)).collect(),
            constant: 0.0,
        }
    }

    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        self.terms.push((var, coefficient));
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate against a value vector indexed by [`VarId::index`]
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coef)| coef * values.get(var.index()).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

impl From<VarId> for LinearExpr {
    fn from(var: VarId) -> Self {
        Self {
            terms: vec![(var, 1.0)],
            constant: 0.0,
        }
    }
}

impl AddAssign for LinearExpr {
    fn add_assign(&mut self, rhs: LinearExpr) {
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
    }
}

impl AddAssign<(VarId, f64)> for LinearExpr {
    fn add_assign(&mut self, (var, coef): (VarId, f64)) {
        self.add_term(var, coef);
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(mut self, rhs: f64) -> LinearExpr {
        for (_, coef) in &mut self.terms {
            *coef *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

/// Optimization direction
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone)]
pub struct Objective {
    pub expr: LinearExpr,
    pub sense: Sense,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    pub expr: LinearExpr,
    /// Comparison operator
    pub op: ConstraintOp,
    /// Right-hand side value
    pub rhs: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintOp::Le => write!(f, "<="),
            ConstraintOp::Ge => write!(f, ">="),
            ConstraintOp::Eq => write!(f, "="),
        }
    }
}

/// A named mixed-integer linear program, handed to [`crate::Solver`]
#[derive(Debug, Clone)]
pub struct LpProblem {
    pub name: String,
    pub variables: Vec<Variable>,
    pub objective: Objective,
    pub constraints: Vec<Constraint>,
}

impl LpProblem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
            objective: Objective {
                expr: LinearExpr::new(),
                sense: Sense::Minimize,
            },
            constraints: Vec::new(),
        }
    }

    /// Declare an integer variable with domain [0, +inf)
    pub fn add_integer_variable(&mut self, name: impl Into<String>) -> VarId {
        self.push_variable(Variable {
            name: name.into(),
            integer: true,
            lower: 0.0,
            upper: None,
        })
    }

    /// Declare a continuous variable with the given bounds
    pub fn add_variable(&mut self, name: impl Into<String>, lower: f64, upper: Option<f64>) -> VarId {
        self.push_variable(Variable {
            name: name.into(),
            integer: false,
            lower,
            upper,
        })
    }

    fn push_variable(&mut self, variable: Variable) -> VarId {
        self.variables.push(variable);
        VarId(self.variables.len() - 1)
    }

    pub fn set_objective(&mut self, expr: LinearExpr, sense: Sense) {
        self.objective = Objective { expr, sense };
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, expr: LinearExpr, op: ConstraintOp, rhs: f64) {
        self.constraints.push(Constraint {
            name: name.into(),
            expr,
            op,
            rhs,
        });
    }

    pub fn variable(&self, var: VarId) -> Option<&Variable> {
        self.variables.get(var.index())
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Find which constraints and variable bounds are violated by `values`
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<ConstraintViolation> {
        let mut violations = Vec::new();

        for c in &self.constraints {
            let lhs = c.expr.evaluate(values);

            let violation_amount = match c.op {
                ConstraintOp::Le => lhs - c.rhs,
                ConstraintOp::Ge => c.rhs - lhs,
                ConstraintOp::Eq => (lhs - c.rhs).abs(),
            };

            if violation_amount > tolerance {
                let description = match c.op {
                    ConstraintOp::Le => format!("{} exceeds maximum of {:.2} by {:.2}", c.name, c.rhs, violation_amount),
                    ConstraintOp::Ge => format!("{} is below minimum of {:.2} by {:.2}", c.name, c.rhs, violation_amount),
                    ConstraintOp::Eq => format!("{} requires exactly {:.2} but got {:.2}", c.name, c.rhs, lhs),
                };
                violations.push(ConstraintViolation {
                    constraint: c.name.clone(),
                    required: c.rhs,
                    actual: lhs,
                    violation_amount,
                    description,
                });
            }
        }

        for (j, v) in self.variables.iter().enumerate() {
            let value = values.get(j).copied().unwrap_or(0.0);
            if value < v.lower - tolerance {
                violations.push(ConstraintViolation {
                    constraint: format!("{}_lower", v.name),
                    required: v.lower,
                    actual: value,
                    violation_amount: v.lower - value,
                    description: format!("{} is below its lower bound {:.2}", v.name, v.lower),
                });
            }
            if let Some(upper) = v.upper {
                if value > upper + tolerance {
                    violations.push(ConstraintViolation {
                        constraint: format!("{}_upper", v.name),
                        required: upper,
                        actual: value,
                        violation_amount: value - upper,
                        description: format!("{} exceeds its upper bound {:.2}", v.name, upper),
                    });
                }
            }
            if v.integer && (value - value.round()).abs() > tolerance {
                violations.push(ConstraintViolation {
                    constraint: format!("{}_integral", v.name),
                    required: value.round(),
                    actual: value,
                    violation_amount: (value - value.round()).abs(),
                    description: format!("{} is not integral", v.name),
                });
            }
        }

        violations
    }
}
