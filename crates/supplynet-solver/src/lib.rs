mod problem;
mod solution;
mod solver;

pub use problem::{Constraint, ConstraintOp, LinearExpr, LpProblem, Objective, Sense, VarId, Variable};
pub use solution::{ConstraintViolation, Solution, SolutionStatus};
pub use solver::{Solver, SolverError};
