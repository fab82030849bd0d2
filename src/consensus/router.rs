//! Criticality-based routing between the arbiter and the council.
//!
//! Routine and normal proposals go to the single arbiter, important and
//! critical ones to the full council. An unreachable path falls back to the
//! other one; if both are unreachable the route is `Unavailable` and the
//! caller must block.

use crate::consensus::panel::{GovernanceMode, Panel};
use crate::proposal::Criticality;
use std::time::Duration;
use tracing::warn;

/// Routing outcome.
#[derive(Clone, Copy)]
pub enum Route<'a> {
    /// The path criticality asks for
    Primary(&'a Panel),
    /// The other path, because the requested one is unreachable
    Fallback {
        requested: GovernanceMode,
        panel: &'a Panel,
    },
    /// Nothing reachable; safety default applies
    Unavailable { requested: GovernanceMode },
}

impl<'a> Route<'a> {
    /// Panel to convene, if any.
    pub fn panel(&self) -> Option<&'a Panel> {
        match self {
            Route::Primary(panel) | Route::Fallback { panel, .. } => Some(panel),
            Route::Unavailable { .. } => None,
        }
    }

    /// Mode recorded on the decision.
    pub fn mode(&self) -> GovernanceMode {
        match self {
            Route::Primary(panel) | Route::Fallback { panel, .. } => panel.mode(),
            Route::Unavailable { requested } => *requested,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Route::Fallback { .. })
    }
}

/// Chooses a governance path for each proposal.
#[derive(Clone)]
pub struct Router {
    arbiter: Panel,
    council: Panel,
    probe_timeout: Duration,
}

impl Router {
    /// Create a router over the two panels.
    pub fn new(arbiter: Panel, council: Panel, probe_timeout: Duration) -> Self {
        Self {
            arbiter,
            council,
            probe_timeout,
        }
    }

    /// Mode a criticality asks for.
    pub fn requested_mode(criticality: Criticality) -> GovernanceMode {
        match criticality {
            Criticality::Routine | Criticality::Normal => GovernanceMode::Arbiter,
            Criticality::Important | Criticality::Critical => GovernanceMode::Council,
        }
    }

    fn panels_for(&self, mode: GovernanceMode) -> (&Panel, &Panel) {
        match mode {
            GovernanceMode::Arbiter => (&self.arbiter, &self.council),
            GovernanceMode::Council => (&self.council, &self.arbiter),
        }
    }

    /// Route a proposal of the given criticality.
    pub async fn route(&self, criticality: Criticality) -> Route<'_> {
        let requested = Self::requested_mode(criticality);
        let (primary, fallback) = self.panels_for(requested);

        if primary.is_available(self.probe_timeout).await {
            return Route::Primary(primary);
        }
        warn!(mode = %requested, "governance path unavailable, trying fallback");

        if fallback.is_available(self.probe_timeout).await {
            return Route::Fallback {
                requested,
                panel: fallback,
            };
        }
        warn!(mode = %requested, "fallback path unavailable, blocking");

        Route::Unavailable { requested }
    }

    pub fn arbiter(&self) -> &Panel {
        &self.arbiter
    }

    pub fn council(&self) -> &Panel {
        &self.council
    }
}
