pub mod entitlement;
pub mod fleet;
pub mod maintenance;
pub mod revenue;
pub mod stats;
pub mod utilization;
