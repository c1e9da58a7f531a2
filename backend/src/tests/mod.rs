// Test modules

pub mod common;
mod pipeline_scenarios_test;
