// src/recommendation/engine.rs
use crate::health::ServiceId;

/// How a recompute moved the recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same value as before, at least one service healthy.
    Unchanged,
    /// Primary -> backup.
    Failover,
    /// Backup -> primary.
    Failback,
    /// Both services unhealthy; the previous value is kept.
    Degraded,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Unchanged => "unchanged",
            Transition::Failover => "failover",
            Transition::Failback => "failback",
            Transition::Degraded => "degraded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub previous: ServiceId,
    pub recommendation: ServiceId,
    pub transition: Transition,
}

impl Evaluation {
    pub fn changed(&self) -> bool {
        self.previous != self.recommendation
    }
}

/// Derive the recommendation from the current health verdicts.
///
/// A healthy primary always wins, so a recovering primary reclaims traffic.
/// With only the backup healthy we fail over. With neither healthy the
/// previous value sticks.
pub fn evaluate(current: ServiceId, primary_healthy: bool, backup_healthy: bool) -> Evaluation {
    let recommendation = if primary_healthy {
        ServiceId::Primary
    } else if backup_healthy {
        ServiceId::Backup
    } else {
        current
    };

    let transition = match (current, recommendation) {
        _ if !primary_healthy && !backup_healthy => Transition::Degraded,
        (ServiceId::Primary, ServiceId::Backup) => Transition::Failover,
        (ServiceId::Backup, ServiceId::Primary) => Transition::Failback,
        _ => Transition::Unchanged,
    };

    Evaluation {
        previous: current,
        recommendation,
        transition,
    }
}
