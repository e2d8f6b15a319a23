//! Shape → Route, with a single Diagonal → Long-Gamma fallback.

use common::{Error, Result, Route, RoutePreference, Shape};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::blueprint::{Blueprint, BlueprintBuilder, BlueprintRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteAttempt {
    pub route: Route,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routing {
    /// Route the blueprint was finally built for.
    pub route: Route,
    pub blueprint: Blueprint,
    pub attempts: Vec<RouteAttempt>,
    pub fallback_used: bool,
}

/// Route before any blueprint has been attempted.
pub fn preferred_route(shape: Shape, preference: RoutePreference) -> Route {
    // Never sell an inverted front, whatever the preference.
    if shape == Shape::Backward {
        return Route::LongGamma;
    }
    match preference {
        RoutePreference::LongGamma => Route::LongGamma,
        RoutePreference::Diagonal => Route::Diagonal,
        RoutePreference::Auto => match shape {
            Shape::Ffbs | Shape::Steep => Route::Diagonal,
            Shape::Backward | Shape::Spike | Shape::Mild | Shape::Flat => Route::LongGamma,
        },
    }
}

/// Build once; a construction failure becomes an errored blueprint, other
/// errors propagate.
fn attempt(
    builder: &dyn BlueprintBuilder,
    route: Route,
    request: &BlueprintRequest<'_>,
) -> Result<Blueprint> {
    match builder.build(route, request) {
        Ok(blueprint) => Ok(blueprint),
        Err(Error::BlueprintConstruction(reason)) => Ok(Blueprint::failed(route, reason)),
        Err(e) => Err(e),
    }
}

pub fn route_candidate(
    shape: Shape,
    preference: RoutePreference,
    builder: &dyn BlueprintBuilder,
    request: &BlueprintRequest<'_>,
) -> Result<Routing> {
    let symbol = request.snapshot.symbol.as_str();
    let route = preferred_route(shape, preference);
    let blueprint = attempt(builder, route, request)?;
    let mut attempts = vec![RouteAttempt {
        route,
        error: blueprint.failure_reason(),
    }];

    if blueprint.is_viable() || route != Route::Diagonal {
        debug!("{} routed {} -> {}", symbol, shape, route);
        return Ok(Routing {
            route,
            blueprint,
            attempts,
            fallback_used: false,
        });
    }

    warn!(
        "{} diagonal blueprint failed ({}); falling back to long gamma",
        symbol,
        attempts[0].error.as_deref().unwrap_or("unknown")
    );
    let fallback = attempt(builder, Route::LongGamma, request)?;
    attempts.push(RouteAttempt {
        route: Route::LongGamma,
        error: fallback.failure_reason(),
    });

    Ok(Routing {
        route: Route::LongGamma,
        blueprint: fallback,
        attempts,
        fallback_used: true,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::blueprint::ChainBlueprintBuilder;
    use common::testing::{contango_snapshot, expiry_for};
    use common::EngineConfig;

    /// Fails every diagonal; counts calls.
    struct NoDiagonals {
        calls: AtomicUsize,
    }

    impl BlueprintBuilder for NoDiagonals {
        fn build(&self, route: Route, request: &BlueprintRequest<'_>) -> Result<Blueprint> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match route {
                Route::Diagonal => Err(Error::BlueprintConstruction("no long leg".into())),
                Route::LongGamma => ChainBlueprintBuilder.build(route, request),
            }
        }
    }

    struct NothingBuilds;

    impl BlueprintBuilder for NothingBuilds {
        fn build(&self, _route: Route, _request: &BlueprintRequest<'_>) -> Result<Blueprint> {
            Err(Error::BlueprintConstruction("empty chain".into()))
        }
    }

    #[test]
    fn test_shape_routing_table() {
        let auto = RoutePreference::Auto;
        assert_eq!(preferred_route(Shape::Backward, auto), Route::LongGamma);
        assert_eq!(preferred_route(Shape::Ffbs, auto), Route::Diagonal);
        assert_eq!(preferred_route(Shape::Steep, auto), Route::Diagonal);
        assert_eq!(preferred_route(Shape::Spike, auto), Route::LongGamma);
        assert_eq!(preferred_route(Shape::Mild, auto), Route::LongGamma);
        assert_eq!(preferred_route(Shape::Flat, auto), Route::LongGamma);
    }

    #[test]
    fn test_preference_never_sells_inverted_front() {
        assert_eq!(preferred_route(Shape::Backward, RoutePreference::Diagonal), Route::LongGamma);
        assert_eq!(preferred_route(Shape::Spike, RoutePreference::Diagonal), Route::Diagonal);
        assert_eq!(preferred_route(Shape::Ffbs, RoutePreference::LongGamma), Route::LongGamma);
    }

    #[test]
    fn test_diagonal_failure_falls_back_once() {
        let snap = contango_snapshot("IWM");
        let config = EngineConfig::default();
        let request = BlueprintRequest {
            snapshot: &snap,
            short_expiry: expiry_for(5),
            short_dte: 5,
            config: &config,
        };
        let builder = NoDiagonals {
            calls: AtomicUsize::new(0),
        };
        let routing = route_candidate(Shape::Steep, RoutePreference::Auto, &builder, &request).unwrap();
        assert!(routing.fallback_used);
        assert_eq!(routing.route, Route::LongGamma);
        assert_eq!(routing.attempts.len(), 2);
        assert!(routing.attempts[0].error.is_some());
        assert!(routing.blueprint.is_viable());
        assert_eq!(builder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_fallback_leaves_errored_blueprint() {
        let snap = contango_snapshot("IWM");
        let config = EngineConfig::default();
        let request = BlueprintRequest {
            snapshot: &snap,
            short_expiry: expiry_for(5),
            short_dte: 5,
            config: &config,
        };
        let routing = route_candidate(Shape::Ffbs, RoutePreference::Auto, &NothingBuilds, &request).unwrap();
        assert!(routing.fallback_used);
        assert_eq!(routing.attempts.len(), 2);
        assert!(!routing.blueprint.is_viable());
    }

    #[test]
    fn test_long_gamma_failure_has_no_fallback() {
        let snap = contango_snapshot("IWM");
        let config = EngineConfig::default();
        let request = BlueprintRequest {
            snapshot: &snap,
            short_expiry: expiry_for(5),
            short_dte: 5,
            config: &config,
        };
        let routing = route_candidate(Shape::Flat, RoutePreference::Auto, &NothingBuilds, &request).unwrap();
        assert!(!routing.fallback_used);
        assert_eq!(routing.attempts.len(), 1);
        assert_eq!(routing.route, Route::LongGamma);
    }
}
