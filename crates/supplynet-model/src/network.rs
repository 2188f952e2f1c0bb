use std::collections::BTreeMap;
use std::fmt;

/// Position of a node in the three-tier network
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Supply node with finite capacity (supplier)
    Source,
    /// Intermediate node with per-commodity handling cost (distribution center, roastery)
    Hub,
    /// Demand node with per-commodity requirement (store, cafe)
    Sink,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Source => write!(f, "source"),
            Tier::Hub => write!(f, "hub"),
            Tier::Sink => write!(f, "sink"),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub tier: Tier,
}

impl Node {
    pub fn new(id: impl Into<String>, tier: Tier) -> Self {
        Self { id: id.into(), tier }
    }
}

/// Directed shipping lane with a per-unit cost
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub unit_cost: f64,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, unit_cost: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            unit_cost,
        }
    }
}

/// Complete description of a sourcing → hub → demand network
///
/// Maps are ordered so that building the same network twice declares
/// variables and constraints in the same order.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Network {
    pub name: String,
    /// Demand classes tracked separately from hubs to sinks
    pub commodities: Vec<String>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Source → maximum outbound flow
    pub capacities: BTreeMap<String, f64>,
    /// Hub → commodity → per-unit handling cost
    pub handling_costs: BTreeMap<String, BTreeMap<String, f64>>,
    /// Sink → commodity → minimum inbound quantity
    pub demands: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_commodities<S: Into<String>>(mut self, commodities: impl IntoIterator<Item = S>) -> Self {
        self.commodities = commodities.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_node(&mut self, id: impl Into<String>, tier: Tier) {
        self.nodes.push(Node::new(id, tier));
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>, unit_cost: f64) {
        self.edges.push(Edge::new(from, to, unit_cost));
    }

    pub fn set_capacity(&mut self, source: impl Into<String>, capacity: f64) {
        self.capacities.insert(source.into(), capacity);
    }

    pub fn set_handling_cost(&mut self, hub: impl Into<String>, commodity: impl Into<String>, cost: f64) {
        self.handling_costs
            .entry(hub.into())
            .or_default()
            .insert(commodity.into(), cost);
    }

    pub fn set_demand(&mut self, sink: impl Into<String>, commodity: impl Into<String>, quantity: f64) {
        self.demands
            .entry(sink.into())
            .or_default()
            .insert(commodity.into(), quantity);
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn tier_of(&self, id: &str) -> Option<Tier> {
        self.node(id).map(|n| n.tier)
    }

    /// Node identifiers of one tier, in declaration order
    pub fn nodes_in(&self, tier: Tier) -> impl Iterator<Item = &str> + '_ {
        self.nodes
            .iter()
            .filter(move |n| n.tier == tier)
            .map(|n| n.id.as_str())
    }

    pub fn count(&self, tier: Tier) -> usize {
        self.nodes_in(tier).count()
    }

    /// Source → Hub edges
    pub fn supply_edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges
            .iter()
            .filter(|e| self.tier_of(&e.from) == Some(Tier::Source))
    }

    /// Hub → Sink edges
    pub fn delivery_edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges
            .iter()
            .filter(|e| self.tier_of(&e.from) == Some(Tier::Hub))
    }

    pub fn total_capacity(&self) -> f64 {
        self.capacities.values().sum()
    }

    pub fn total_demand(&self, commodity: &str) -> f64 {
        self.demands
            .values()
            .filter_map(|by_commodity| by_commodity.get(commodity))
            .sum()
    }
}
