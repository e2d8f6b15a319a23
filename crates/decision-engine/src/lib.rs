pub mod types;
pub mod blueprint;
pub mod router;
pub mod gate;
pub mod engine;
pub mod probe;
pub mod ranker;

pub use types::*;
pub use blueprint::{Blueprint, BlueprintBuilder, BlueprintRequest, ChainBlueprintBuilder, Leg};
pub use router::{preferred_route, route_candidate, RouteAttempt, Routing};
pub use gate::{evaluate_gate, GateInput, GateRule, GateVerdict};
pub use engine::DecisionEngine;
pub use probe::{needs_probe, probe_alternates, ProbeAttempt, ProbeReport};
pub use ranker::{assign_tag, compare_results, rank_results};
