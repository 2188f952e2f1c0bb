use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;
use supplynet_solver::{ConstraintOp, LinearExpr, LpProblem, Sense};
use thiserror::Error;

use crate::model::{FlowIndex, Model};
use crate::network::{Network, Tier};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Translates a [`Network`] into a solver-ready [`Model`]
///
/// Decision variables:
/// - `x[source,hub]`: integer flow on every Source → Hub edge
/// - `y_<commodity>[hub,sink]`: integer flow per Hub → Sink edge and commodity
///
/// Objective (minimized): supply shipping cost, plus hub handling cost and
/// delivery shipping cost for every commodity unit leaving a hub.
///
/// Constraints:
/// - `flow_<hub>`: inbound supply equals outbound delivery over all commodities
/// - `supply_<source>`: outbound supply at most the source capacity
/// - `<commodity>_demand_<sink>`: inbound deliveries at least the demand
#[derive(Debug, Clone, Default)]
pub struct NetworkFlowModelBuilder {
    name: Option<String>,
}

impl NetworkFlowModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the model name (defaults to the network name)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn build(&self, network: &Network) -> Result<Model, BuildError> {
        validate_topology(network)?;
        validate_parameters(network)?;

        let name = self.name.clone().unwrap_or_else(|| network.name.clone());
        let mut problem = LpProblem::new(name.clone());
        let mut index = FlowIndex::default();
        let mut objective = LinearExpr::new();

        for edge in network.supply_edges() {
            let var = problem.add_integer_variable(format!("x[{},{}]", edge.from, edge.to));
            objective += (var, edge.unit_cost);
            index.supply.insert((edge.from.clone(), edge.to.clone()), var);
            index.unit_costs.insert((edge.from.clone(), edge.to.clone()), edge.unit_cost);
        }

        for edge in network.delivery_edges() {
            let handling = &network.handling_costs[&edge.from];
            for commodity in &network.commodities {
                let var = problem.add_integer_variable(format!("y_{}[{},{}]", commodity, edge.from, edge.to));
                objective += (var, handling[commodity] + edge.unit_cost);
                index
                    .delivery
                    .insert((edge.from.clone(), edge.to.clone(), commodity.clone()), var);
                index
                    .handling_costs
                    .insert((edge.from.clone(), commodity.clone()), handling[commodity]);
            }
            index.unit_costs.insert((edge.from.clone(), edge.to.clone()), edge.unit_cost);
        }

        problem.set_objective(objective, Sense::Minimize);

        // Conservation of flow
        for hub in network.nodes_in(Tier::Hub) {
            let mut balance = LinearExpr::sum(
                index
                    .supply
                    .iter()
                    .filter(|((_, to), _)| to == hub)
                    .map(|(_, &var)| var),
            );
            balance += LinearExpr::sum(
                index
                    .delivery
                    .iter()
                    .filter(|((from, _, _), _)| from == hub)
                    .map(|(_, &var)| var),
            ) * -1.0;
            problem.add_constraint(format!("flow_{}", hub), balance, ConstraintOp::Eq, 0.0);
        }

        // Supply capacity
        for source in network.nodes_in(Tier::Source) {
            let outbound = LinearExpr::sum(
                index
                    .supply
                    .iter()
                    .filter(|((from, _), _)| from == source)
                    .map(|(_, &var)| var),
            );
            problem.add_constraint(
                format!("supply_{}", source),
                outbound,
                ConstraintOp::Le,
                network.capacities[source],
            );
        }

        // Demand floors, one per sink and commodity
        for sink in network.nodes_in(Tier::Sink) {
            for commodity in &network.commodities {
                let inbound = LinearExpr::sum(
                    index
                        .delivery
                        .iter()
                        .filter(|((_, to, c), _)| to == sink && c == commodity)
                        .map(|(_, &var)| var),
                );
                problem.add_constraint(
                    format!("{}_demand_{}", commodity, sink),
                    inbound,
                    ConstraintOp::Ge,
                    network.demands[sink][commodity],
                );
            }
        }

        debug!(
            "Built model {}: {} variables, {} constraints",
            name,
            problem.num_variables(),
            problem.num_constraints()
        );

        Ok(Model::new(name, network.commodities.clone(), problem, index))
    }
}

fn topology(message: impl Into<String>) -> BuildError {
    BuildError::InvalidTopology(message.into())
}

fn validate_topology(network: &Network) -> Result<(), BuildError> {
    if network.commodities.is_empty() {
        return Err(topology("no commodities declared"));
    }
    let mut commodities = HashSet::new();
    for commodity in &network.commodities {
        if !commodities.insert(commodity.as_str()) {
            return Err(topology(format!("duplicate commodity {}", commodity)));
        }
    }

    let mut tiers: HashMap<&str, Tier> = HashMap::new();
    for node in &network.nodes {
        if tiers.insert(node.id.as_str(), node.tier).is_some() {
            return Err(topology(format!("duplicate node {}", node.id)));
        }
    }

    let mut seen = HashSet::new();
    let (mut supply_edges, mut delivery_edges) = (0, 0);
    for edge in &network.edges {
        let from = *tiers
            .get(edge.from.as_str())
            .ok_or_else(|| topology(format!("edge {} -> {} references unknown node {}", edge.from, edge.to, edge.from)))?;
        let to = *tiers
            .get(edge.to.as_str())
            .ok_or_else(|| topology(format!("edge {} -> {} references unknown node {}", edge.from, edge.to, edge.to)))?;

        match (from, to) {
            (Tier::Source, Tier::Hub) => supply_edges += 1,
            (Tier::Hub, Tier::Sink) => delivery_edges += 1,
            _ => {
                return Err(topology(format!(
                    "edge {} -> {} connects {} to {}; only source -> hub and hub -> sink are allowed",
                    edge.from, edge.to, from, to
                )));
            }
        }

        if !seen.insert((edge.from.as_str(), edge.to.as_str())) {
            return Err(topology(format!("duplicate edge {} -> {}", edge.from, edge.to)));
        }
    }

    if supply_edges == 0 {
        return Err(topology("no source -> hub edges"));
    }
    if delivery_edges == 0 {
        return Err(topology("no hub -> sink edges"));
    }

    for source in network.nodes_in(Tier::Source) {
        if !network.capacities.contains_key(source) {
            return Err(topology(format!("missing capacity for source {}", source)));
        }
    }
    for key in network.capacities.keys() {
        check_keyed_tier(&tiers, key, Tier::Source, "capacity")?;
    }

    check_commodity_table(network, &tiers, &network.handling_costs, Tier::Hub, "handling cost")?;
    check_commodity_table(network, &tiers, &network.demands, Tier::Sink, "demand")?;

    Ok(())
}

fn check_keyed_tier(tiers: &HashMap<&str, Tier>, key: &str, expected: Tier, what: &str) -> Result<(), BuildError> {
    match tiers.get(key) {
        None => Err(topology(format!("{} given for unknown node {}", what, key))),
        Some(&tier) if tier != expected => Err(topology(format!("{} given for {} node {}", what, tier, key))),
        Some(_) => Ok(()),
    }
}

/// Every node of `tier` needs an entry per commodity, and nothing else may appear
fn check_commodity_table(
    network: &Network,
    tiers: &HashMap<&str, Tier>,
    table: &BTreeMap<String, BTreeMap<String, f64>>,
    tier: Tier,
    what: &str,
) -> Result<(), BuildError> {
    for node in network.nodes_in(tier) {
        let by_commodity = table
            .get(node)
            .ok_or_else(|| topology(format!("missing {} for {} {}", what, tier, node)))?;
        for commodity in &network.commodities {
            if !by_commodity.contains_key(commodity) {
                return Err(topology(format!("missing {} for {} {} and commodity {}", what, tier, node, commodity)));
            }
        }
    }

    for (key, by_commodity) in table {
        check_keyed_tier(tiers, key, tier, what)?;
        for commodity in by_commodity.keys() {
            if !network.commodities.contains(commodity) {
                return Err(topology(format!("{} for {} references unknown commodity {}", what, key, commodity)));
            }
        }
    }
    Ok(())
}

fn check_amount(value: f64, integral: bool, what: impl FnOnce() -> String) -> Result<(), BuildError> {
    if !value.is_finite() || value < 0.0 {
        return Err(BuildError::InvalidParameter(format!("{} must be a non-negative number, got {}", what(), value)));
    }
    if integral && value.fract() != 0.0 {
        return Err(BuildError::InvalidParameter(format!("{} must be a whole quantity, got {}", what(), value)));
    }
    Ok(())
}

fn validate_parameters(network: &Network) -> Result<(), BuildError> {
    for edge in &network.edges {
        check_amount(edge.unit_cost, false, || format!("unit cost of {} -> {}", edge.from, edge.to))?;
    }
    for (source, &capacity) in &network.capacities {
        check_amount(capacity, true, || format!("capacity of {}", source))?;
    }
    for (hub, costs) in &network.handling_costs {
        for (commodity, &cost) in costs {
            check_amount(cost, false, || format!("{} handling cost at {}", commodity, hub))?;
        }
    }
    for (sink, demands) in &network.demands {
        for (commodity, &quantity) in demands {
            check_amount(quantity, true, || format!("{} demand at {}", commodity, sink))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios;

    fn tiny() -> Network {
        let mut network = Network::new("tiny").with_commodities(["light", "dark"]);
        network.add_node("s1", Tier::Source);
        network.add_node("h1", Tier::Hub);
        network.add_node("c1", Tier::Sink);
        network.add_edge("s1", "h1", 2.0);
        network.add_edge("h1", "c1", 3.0);
        network.set_capacity("s1", 10.0);
        network.set_handling_cost("h1", "light", 1.0);
        network.set_handling_cost("h1", "dark", 4.0);
        network.set_demand("c1", "light", 2.0);
        network.set_demand("c1", "dark", 3.0);
        network
    }

    #[test]
    fn test_build_structure() {
        let model = NetworkFlowModelBuilder::new().build(&tiny()).unwrap();
        let problem = model.problem();

        // 1 supply edge + 1 delivery edge x 2 commodities
        assert_eq!(problem.num_variables(), 3);
        assert!(problem.variables.iter().all(|v| v.integer && v.lower == 0.0 && v.upper.is_none()));
        // flow_h1, supply_s1, light_demand_c1, dark_demand_c1
        assert_eq!(problem.num_constraints(), 4);

        let flow = problem.constraint("flow_h1").unwrap();
        assert_eq!(flow.op, ConstraintOp::Eq);
        assert_eq!(flow.rhs, 0.0);
        let supply = problem.constraint("supply_s1").unwrap();
        assert_eq!(supply.op, ConstraintOp::Le);
        assert_eq!(supply.rhs, 10.0);
        let dark = problem.constraint("dark_demand_c1").unwrap();
        assert_eq!(dark.op, ConstraintOp::Ge);
        assert_eq!(dark.rhs, 3.0);

        let x = model.supply_flow("s1", "h1").unwrap();
        let light = model.delivery_flow("h1", "c1", "light").unwrap();
        let dark = model.delivery_flow("h1", "c1", "dark").unwrap();
        assert_eq!(model.variable_name(x), Some("x[s1,h1]"));
        assert_eq!(model.variable_name(dark), Some("y_dark[h1,c1]"));

        // Objective coefficients: shipping for x, handling + shipping for y
        let mut values = vec![0.0; 3];
        values[x.index()] = 5.0;
        values[light.index()] = 2.0;
        values[dark.index()] = 3.0;
        let cost = problem.objective.expr.evaluate(&values);
        assert!((cost - (5.0 * 2.0 + 2.0 * (1.0 + 3.0) + 3.0 * (4.0 + 3.0))).abs() < 1e-9);
        assert!(problem.violations(&values, 1e-9).is_empty());
    }

    #[test]
    fn test_model_name() {
        let model = NetworkFlowModelBuilder::new().build(&tiny()).unwrap();
        assert_eq!(model.name(), "tiny");
        let model = NetworkFlowModelBuilder::new()
            .with_name("renamed")
            .build(&tiny())
            .unwrap();
        assert_eq!(model.name(), "renamed");
        assert_eq!(model.problem().name, "renamed");
    }

    #[test]
    fn test_scenarios_build() {
        for name in scenarios::NAMES {
            let network = scenarios::by_name(name).unwrap();
            let model = NetworkFlowModelBuilder::new().build(&network).unwrap();
            // 6 supply edges + 6 delivery edges x 2 commodities
            assert_eq!(model.problem().num_variables(), 18);
            // 2 hubs + 3 sources + 3 sinks x 2 commodities
            assert_eq!(model.problem().num_constraints(), 11);
        }
    }

    #[test]
    fn test_unknown_node() {
        let mut network = tiny();
        network.add_edge("s1", "h2", 1.0);
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert!(matches!(err, BuildError::InvalidTopology(ref m) if m.contains("h2")), "{}", err);
    }

    #[test]
    fn test_wrong_tier_edge() {
        let mut network = tiny();
        network.add_edge("s1", "c1", 1.0);
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert!(matches!(err, BuildError::InvalidTopology(_)));
    }

    #[test]
    fn test_duplicate_edge() {
        let mut network = tiny();
        network.add_edge("h1", "c1", 9.0);
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert_eq!(err, BuildError::InvalidTopology("duplicate edge h1 -> c1".to_string()));
    }

    #[test]
    fn test_duplicate_node() {
        let mut network = tiny();
        network.add_node("h1", Tier::Sink);
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert!(matches!(err, BuildError::InvalidTopology(_)));
    }

    #[test]
    fn test_empty_edge_sets() {
        let mut network = tiny();
        network.edges.retain(|e| e.from != "s1");
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert_eq!(err, BuildError::InvalidTopology("no source -> hub edges".to_string()));

        let mut network = tiny();
        network.edges.retain(|e| e.from != "h1");
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert_eq!(err, BuildError::InvalidTopology("no hub -> sink edges".to_string()));
    }

    #[test]
    fn test_missing_tables() {
        let mut network = tiny();
        network.capacities.clear();
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert_eq!(err, BuildError::InvalidTopology("missing capacity for source s1".to_string()));

        let mut network = tiny();
        network.handling_costs.get_mut("h1").unwrap().remove("dark");
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert!(matches!(err, BuildError::InvalidTopology(ref m) if m.contains("handling cost")));

        let mut network = tiny();
        network.demands.clear();
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert!(matches!(err, BuildError::InvalidTopology(ref m) if m.contains("demand")));
    }

    #[test]
    fn test_table_keys_must_match_nodes() {
        let mut network = tiny();
        network.set_capacity("h1", 5.0);
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert_eq!(err, BuildError::InvalidTopology("capacity given for hub node h1".to_string()));

        let mut network = tiny();
        network.set_demand("c1", "decaf", 1.0);
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert!(matches!(err, BuildError::InvalidTopology(ref m) if m.contains("decaf")));

        let mut network = tiny();
        network.set_demand("nowhere", "light", 1.0);
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert!(matches!(err, BuildError::InvalidTopology(ref m) if m.contains("nowhere")));
    }

    #[test]
    fn test_commodities_required() {
        let mut network = tiny();
        network.commodities.clear();
        assert!(matches!(
            NetworkFlowModelBuilder::new().build(&network),
            Err(BuildError::InvalidTopology(_))
        ));

        let mut network = tiny();
        network.commodities.push("light".to_string());
        assert!(matches!(
            NetworkFlowModelBuilder::new().build(&network),
            Err(BuildError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_negative_parameters() {
        let mut network = tiny();
        network.set_capacity("s1", -1.0);
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert!(matches!(err, BuildError::InvalidParameter(ref m) if m.contains("capacity of s1")));

        let mut network = tiny();
        network.set_demand("c1", "light", -5.0);
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert!(matches!(err, BuildError::InvalidParameter(_)));

        let mut network = tiny();
        network.set_handling_cost("h1", "dark", -0.5);
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert!(matches!(err, BuildError::InvalidParameter(_)));

        let mut network = tiny();
        network.edges[0].unit_cost = f64::NAN;
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert!(matches!(err, BuildError::InvalidParameter(_)));
    }

    #[test]
    fn test_fractional_quantities() {
        let mut network = tiny();
        network.set_demand("c1", "dark", 2.5);
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert!(matches!(err, BuildError::InvalidParameter(ref m) if m.contains("whole")));

        // Costs may be fractional
        let mut network = tiny();
        network.set_handling_cost("h1", "dark", 2.5);
        assert!(NetworkFlowModelBuilder::new().build(&network).is_ok());
    }

    #[test]
    fn test_topology_checked_before_parameters() {
        let mut network = tiny();
        network.set_capacity("s1", -1.0);
        network.add_edge("s1", "ghost", 1.0);
        let err = NetworkFlowModelBuilder::new().build(&network).unwrap_err();
        assert!(matches!(err, BuildError::InvalidTopology(_)));
    }
}
