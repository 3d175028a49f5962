// src/services.rs

pub mod aggregation;
pub mod revenue_service;
pub mod ttl_cache;

pub use revenue_service::RevenueService;
