pub mod parameter;
pub mod tabular_agent;
