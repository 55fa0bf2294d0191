use crate::peer::PeerState;
use tracing::{info, warn};

/// Connectivity is degraded when at least one peer exists and none of them
/// is usable.
pub fn is_degraded<I>(states: I) -> bool
where
    I: IntoIterator<Item = PeerState>,
{
    let mut any = false;
    for state in states {
        if !state.is_down() {
            return false;
        }
        any = true;
    }
    any
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheck {
    pub degraded: bool,
    /// The signal flipped on this check.
    pub changed: bool,
    /// Degraded long enough that the mesh should reconnect on its own.
    pub reconnect_due: bool,
}

/// Tracks the degraded signal across checks.
#[derive(Debug, Default)]
pub struct HealthMonitor {
    degraded: bool,
    consecutive: u32,
    auto_reconnect_after: Option<u32>,
}

impl HealthMonitor {
    pub fn new(auto_reconnect_after: Option<u32>) -> Self {
        Self {
            degraded: false,
            consecutive: 0,
            auto_reconnect_after,
        }
    }

    pub fn check<I>(&mut self, states: I) -> HealthCheck
    where
        I: IntoIterator<Item = PeerState>,
    {
        let degraded = is_degraded(states);
        let changed = degraded != self.degraded;
        self.degraded = degraded;

        if degraded {
            self.consecutive = self.consecutive.saturating_add(1);
        } else {
            self.consecutive = 0;
        }

        if changed && degraded {
            warn!("Connectivity degraded: no usable peer connection");
        } else if changed {
            info!("Connectivity restored");
        }

        let reconnect_due = self
            .auto_reconnect_after
            .is_some_and(|n| n > 0 && self.consecutive >= n);

        HealthCheck {
            degraded,
            changed,
            reconnect_due,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Forgets the streak after a reconnect. The flag itself stays until the
    /// next check so the UI sees the transition.
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }
}
