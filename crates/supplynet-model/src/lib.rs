pub mod builder;
pub mod model;
pub mod network;
pub mod report;
pub mod scenarios;

pub use builder::{BuildError, NetworkFlowModelBuilder};
pub use model::{Model, ModelError, ModelState};
pub use network::{Edge, Network, Node, Tier};
pub use report::{DeliveryFlow, FlowPlan, SupplyFlow};
