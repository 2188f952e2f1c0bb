use std::fmt;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyFlow {
    pub source: String,
    pub hub: String,
    pub quantity: f64,
    pub unit_cost: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryFlow {
    pub hub: String,
    pub sink: String,
    pub commodity: String,
    pub quantity: f64,
    /// Shipping cost per unit on the hub → sink edge
    pub unit_cost: f64,
    /// Handling cost per unit of this commodity at the hub
    pub handling_cost: f64,
}

/// Non-zero flows of an optimal solution
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FlowPlan {
    pub model: String,
    pub objective: f64,
    pub supply: Vec<SupplyFlow>,
    pub delivery: Vec<DeliveryFlow>,
}

impl FlowPlan {
    pub fn source_outbound(&self, source: &str) -> f64 {
        self.supply
            .iter()
            .filter(|f| f.source == source)
            .map(|f| f.quantity)
            .sum()
    }

    pub fn hub_inbound(&self, hub: &str) -> f64 {
        self.supply
            .iter()
            .filter(|f| f.hub == hub)
            .map(|f| f.quantity)
            .sum()
    }

    /// Outbound flow of a hub, summed over commodities
    pub fn hub_outbound(&self, hub: &str) -> f64 {
        self.delivery
            .iter()
            .filter(|f| f.hub == hub)
            .map(|f| f.quantity)
            .sum()
    }

    pub fn sink_inbound(&self, sink: &str, commodity: &str) -> f64 {
        self.delivery
            .iter()
            .filter(|f| f.sink == sink && f.commodity == commodity)
            .map(|f| f.quantity)
            .sum()
    }

    /// Cost recomputed from the listed flows
    pub fn total_cost(&self) -> f64 {
        let supply: f64 = self.supply.iter().map(|f| f.quantity * f.unit_cost).sum();
        let delivery: f64 = self
            .delivery
            .iter()
            .map(|f| f.quantity * (f.unit_cost + f.handling_cost))
            .sum();
        supply + delivery
    }
}

impl fmt::Display for FlowPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model: {}", self.model)?;
        writeln!(f, "Total cost: {:.2}", self.objective)?;
        writeln!(f)?;
        writeln!(f, "Supply:")?;
        for flow in &self.supply {
            writeln!(
                f,
                "  {:15} -> {:15} {:10.0} @ {:.2}",
                flow.source, flow.hub, flow.quantity, flow.unit_cost
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Delivery:")?;
        for flow in &self.delivery {
            writeln!(
                f,
                "  {:15} -> {:15} {:12} {:10.0} @ {:.2} + {:.2}",
                flow.hub, flow.sink, flow.commodity, flow.quantity, flow.unit_cost, flow.handling_cost
            )?;
        }
        Ok(())
    }
}
