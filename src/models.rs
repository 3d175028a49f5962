// src/models.rs

pub mod lead;
pub mod revenue;
pub mod sale_incentive;
