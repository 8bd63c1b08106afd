pub mod borehole_field;
pub mod borehole_source;
pub mod energy_balance;
pub mod material_model;
pub mod operator_builder;
pub mod post_processor;
pub mod power_profile;
pub mod time_stepper;
pub mod units;
