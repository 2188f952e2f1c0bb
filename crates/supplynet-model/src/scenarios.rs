//! Built-in example networks
//!
//! Both scenarios share the same shape and numbers: three suppliers with
//! capacities 150/50/100, two hubs, three demand points and two commodities.

use crate::network::{Network, Tier};

pub const NAMES: [&str; 2] = ["fashion", "coffee"];

pub fn by_name(name: &str) -> Option<Network> {
    match name {
        "fashion" => Some(fashion()),
        "coffee" => Some(coffee()),
        _ => None,
    }
}

/// Node names and commodity names for one rendition of the example network
struct Labels<'a> {
    name: &'a str,
    commodities: [&'a str; 2],
    suppliers: [&'a str; 3],
    hubs: [&'a str; 2],
    sinks: [&'a str; 3],
}

const CAPACITIES: [f64; 3] = [150.0, 50.0, 100.0];
/// Supplier × hub
const SUPPLY_COSTS: [[f64; 2]; 3] = [[5.0, 4.0], [6.0, 3.0], [2.0, 7.0]];
/// Hub × commodity
const HANDLING_COSTS: [[f64; 2]; 2] = [[3.0, 5.0], [5.0, 6.0]];
/// Hub × sink
const DELIVERY_COSTS: [[f64; 3]; 2] = [[5.0, 3.0, 6.0], [4.0, 5.0, 2.0]];
/// Commodity × sink
const DEMANDS: [[f64; 3]; 2] = [[20.0, 30.0, 40.0], [20.0, 20.0, 100.0]];

fn example(labels: Labels<'_>) -> Network {
    let mut network = Network::new(labels.name).with_commodities(labels.commodities);

    for supplier in labels.suppliers {
        network.add_node(supplier, Tier::Source);
    }
    for hub in labels.hubs {
        network.add_node(hub, Tier::Hub);
    }
    for sink in labels.sinks {
        network.add_node(sink, Tier::Sink);
    }

    for (s, supplier) in labels.suppliers.iter().enumerate() {
        network.set_capacity(*supplier, CAPACITIES[s]);
        for (h, hub) in labels.hubs.iter().enumerate() {
            network.add_edge(*supplier, *hub, SUPPLY_COSTS[s][h]);
        }
    }

    for (h, hub) in labels.hubs.iter().enumerate() {
        for (c, commodity) in labels.commodities.iter().enumerate() {
            network.set_handling_cost(*hub, *commodity, HANDLING_COSTS[h][c]);
        }
        for (k, sink) in labels.sinks.iter().enumerate() {
            network.add_edge(*hub, *sink, DELIVERY_COSTS[h][k]);
        }
    }

    for (c, commodity) in labels.commodities.iter().enumerate() {
        for (k, sink) in labels.sinks.iter().enumerate() {
            network.set_demand(*sink, *commodity, DEMANDS[c][k]);
        }
    }

    network
}

/// Suppliers → central/local distribution centers → city stores, footwear and apparel
pub fn fashion() -> Network {
    example(Labels {
        name: "Fashion Supply Chain",
        commodities: ["footwear", "apparel"],
        suppliers: ["supplier1", "supplier2", "supplier3"],
        hubs: ["CDC", "LDC"],
        sinks: ["Berlin-CS", "Paris-CS", "LDN-CS"],
    })
}

/// Bean suppliers → roasteries → cafes, light and dark roast
pub fn coffee() -> Network {
    example(Labels {
        name: "Coffee Distribution",
        commodities: ["light", "dark"],
        suppliers: ["supplier1", "supplier2", "supplier3"],
        hubs: ["roastery1", "roastery2"],
        sinks: ["cafe1", "cafe2", "cafe3"],
    })
}
