use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info};
use supplynet_solver::{ConstraintOp, ConstraintViolation, LinearExpr, LpProblem, Solution, SolutionStatus, Solver, VarId};
use thiserror::Error;

use crate::report::{DeliveryFlow, FlowPlan, SupplyFlow};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Model has not been solved since it was built or last amended")]
    NotSolved,
    #[error("Not solved to optimality: {0}")]
    SolveFailure(SolutionStatus),
    #[error("No edge {0} -> {1} in the model")]
    UnknownEdge(String, String),
    #[error("Unknown commodity: {0}")]
    UnknownCommodity(String),
    #[error("Duplicate constraint name: {0}")]
    DuplicateConstraint(String),
}

/// Lifecycle of a [`Model`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// Freshly built or amended; no valid solution
    Built,
    /// Terminal outcome of the last solve
    Solved(SolutionStatus),
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::Built => write!(f, "BUILT"),
            ModelState::Solved(status) => write!(f, "{}", status),
        }
    }
}

/// Lookup from network edges to the flow variables created for them
#[derive(Debug, Clone, Default)]
pub(crate) struct FlowIndex {
    /// (source, hub) → aggregate flow
    pub supply: BTreeMap<(String, String), VarId>,
    /// (hub, sink, commodity) → commodity flow
    pub delivery: BTreeMap<(String, String, String), VarId>,
    /// (from, to) → shipping cost per unit
    pub unit_costs: BTreeMap<(String, String), f64>,
    /// (hub, commodity) → handling cost per unit
    pub handling_costs: BTreeMap<(String, String), f64>,
}

/// A supply network flow model together with its latest solution
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    commodities: Vec<String>,
    problem: LpProblem,
    index: FlowIndex,
    state: ModelState,
    solution: Option<Solution>,
}

impl Model {
    pub(crate) fn new(name: String, commodities: Vec<String>, problem: LpProblem, index: FlowIndex) -> Self {
        Self {
            name,
            commodities,
            problem,
            index,
            state: ModelState::Built,
            solution: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commodities(&self) -> &[String] {
        &self.commodities
    }

    pub fn problem(&self) -> &LpProblem {
        &self.problem
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Outcome of the last solve, `None` while the model is in the built state
    pub fn status(&self) -> Option<SolutionStatus> {
        match self.state {
            ModelState::Built => None,
            ModelState::Solved(status) => Some(status),
        }
    }

    pub fn solution(&self) -> Option<&Solution> {
        self.solution.as_ref()
    }

    /// Hand the model to the solver, moving it to a solved state
    pub fn solve(&mut self, solver: &Solver) -> SolutionStatus {
        let solution = solver.solve(&self.problem);
        let status = solution.status;

        match status {
            SolutionStatus::Optimal => info!("{}: optimal cost {}", self.name, solution.objective_value),
            _ => info!("{}: not solved to optimality ({})", self.name, status),
        }

        self.state = ModelState::Solved(status);
        self.solution = Some(solution);
        status
    }

    fn optimal(&self) -> Result<&Solution, ModelError> {
        match (self.state, &self.solution) {
            (ModelState::Solved(SolutionStatus::Optimal), Some(solution)) => Ok(solution),
            (ModelState::Solved(status), _) => Err(ModelError::SolveFailure(status)),
            (ModelState::Built, _) => Err(ModelError::NotSolved),
        }
    }

    /// Total cost of the optimal flow plan
    pub fn objective_value(&self) -> Result<f64, ModelError> {
        self.optimal().map(|s| s.objective_value)
    }

    pub fn supply_flow(&self, source: &str, hub: &str) -> Option<VarId> {
        self.index
            .supply
            .get(&(source.to_string(), hub.to_string()))
            .copied()
    }

    pub fn delivery_flow(&self, hub: &str, sink: &str, commodity: &str) -> Option<VarId> {
        self.index
            .delivery
            .get(&(hub.to_string(), sink.to_string(), commodity.to_string()))
            .copied()
    }

    /// All flow variables carried by an edge: one for a supply edge, one per
    /// commodity for a delivery edge
    pub fn edge_flows(&self, from: &str, to: &str) -> Vec<VarId> {
        if let Some(var) = self.supply_flow(from, to) {
            return vec![var];
        }
        self.commodities
            .iter()
            .filter_map(|c| self.delivery_flow(from, to, c))
            .collect()
    }

    pub fn variable_name(&self, var: VarId) -> Option<&str> {
        self.problem.variable(var).map(|v| v.name.as_str())
    }

    /// Solved value of a flow variable
    pub fn flow(&self, var: VarId) -> Result<f64, ModelError> {
        let solution = self.optimal()?;
        Ok(solution.values.get(var.index()).copied().unwrap_or(0.0))
    }

    /// Add a constraint after the fact; the model must be solved again.
    /// Constraint names are unique within a model.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        expr: LinearExpr,
        op: ConstraintOp,
        rhs: f64,
    ) -> Result<(), ModelError> {
        let name = name.into();
        if self.problem.constraint(&name).is_some() {
            return Err(ModelError::DuplicateConstraint(name));
        }
        debug!("{}: adding constraint {} {} {}", self.name, name, op, rhs);
        self.problem.add_constraint(name, expr, op, rhs);
        self.reset();
        Ok(())
    }

    /// First free name of the form `base`, `base#2`, `base#3`, ...
    fn fresh_name(&self, base: String) -> String {
        if self.problem.constraint(&base).is_none() {
            return base;
        }
        let mut n = 2;
        loop {
            let name = format!("{}#{}", base, n);
            if self.problem.constraint(&name).is_none() {
                return name;
            }
            n += 1;
        }
    }

    /// Cap the total flow on an edge (summed over commodities for delivery edges)
    pub fn cap_edge(&mut self, from: &str, to: &str, max: f64) -> Result<(), ModelError> {
        let vars = self.edge_flows(from, to);
        if vars.is_empty() {
            return Err(ModelError::UnknownEdge(from.to_string(), to.to_string()));
        }
        let name = self.fresh_name(format!("cap[{},{}]", from, to));
        self.add_constraint(name, LinearExpr::sum(vars), ConstraintOp::Le, max)
    }

    /// Forbid any flow on an edge
    pub fn forbid_edge(&mut self, from: &str, to: &str) -> Result<(), ModelError> {
        self.cap_edge(from, to, 0.0)
    }

    /// Cap the flow of a single commodity on a delivery edge
    pub fn cap_delivery(&mut self, hub: &str, sink: &str, commodity: &str, max: f64) -> Result<(), ModelError> {
        if !self.commodities.iter().any(|c| c == commodity) {
            return Err(ModelError::UnknownCommodity(commodity.to_string()));
        }
        let var = self
            .delivery_flow(hub, sink, commodity)
            .ok_or_else(|| ModelError::UnknownEdge(hub.to_string(), sink.to_string()))?;
        let name = self.fresh_name(format!("cap_{}[{},{}]", commodity, hub, sink));
        self.add_constraint(name, LinearExpr::from(var), ConstraintOp::Le, max)
    }

    fn reset(&mut self) {
        self.state = ModelState::Built;
        self.solution = None;
    }

    /// Constraints violated by the optimal solution (empty when the solver is correct)
    pub fn violations(&self, tolerance: f64) -> Result<Vec<ConstraintViolation>, ModelError> {
        let solution = self.optimal()?;
        Ok(self.problem.violations(&solution.values, tolerance))
    }

    /// Non-zero flows of the optimal solution
    pub fn flow_plan(&self) -> Result<FlowPlan, ModelError> {
        let solution = self.optimal()?;
        let value = |var: VarId| solution.values.get(var.index()).copied().unwrap_or(0.0);

        let supply = self
            .index
            .supply
            .iter()
            .filter(|(_, var)| value(**var) > 0.0)
            .map(|((source, hub), var)| SupplyFlow {
                source: source.clone(),
                hub: hub.clone(),
                quantity: value(*var),
                unit_cost: self.index.unit_costs[&(source.clone(), hub.clone())],
            })
            .collect();

        let delivery = self
            .index
            .delivery
            .iter()
            .filter(|(_, var)| value(**var) > 0.0)
            .map(|((hub, sink, commodity), var)| DeliveryFlow {
                hub: hub.clone(),
                sink: sink.clone(),
                commodity: commodity.clone(),
                quantity: value(*var),
                unit_cost: self.index.unit_costs[&(hub.clone(), sink.clone())],
                handling_cost: self.index.handling_costs[&(hub.clone(), commodity.clone())],
            })
            .collect();

        Ok(FlowPlan {
            model: self.name.clone(),
            objective: solution.objective_value,
            supply,
            delivery,
        })
    }
}
