// src/handlers.rs

pub mod revenue;
