pub mod anomalies;
pub mod churn;
pub mod opportunity;
