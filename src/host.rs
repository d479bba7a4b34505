//! Glue between the simulation and a real machine.

pub mod dispatch;
pub mod pipeline;
pub mod replay;
