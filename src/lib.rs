//! Waypoint Traffic Library
//!
//! Autonomous vehicle navigation and right-of-way negotiation over a
//! directed road graph, runnable headless.

pub mod simulation;
