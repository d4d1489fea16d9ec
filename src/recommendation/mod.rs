// src/recommendation/mod.rs
mod engine;

pub use engine::{evaluate, Evaluation, Transition};
