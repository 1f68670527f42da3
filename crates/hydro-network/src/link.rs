//! Typed link attributes (pipes, pumps, valves).

use hydro_core::CurveId;

/// Base (control-independent) open/closed disposition of a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeStatus {
    Open,
    Closed,
    /// Check valve: flow only permitted from `from` to `to`.
    Cv,
}

/// How a pump's curve is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpMode {
    /// Head-curve pump: head gain is a function of flow via `curve`.
    Head,
    /// Constant-power pump: head gain is `power / (rho * g * Q)`.
    Power,
}

/// The eight EPANET valve kinds. Only `Prv` participates in the
/// Open/Active/Closed reconciliation state machine; the others are fixed
/// minor-loss devices once a direction/setting is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveKind {
    /// Pressure reducing valve.
    Prv,
    /// Pressure sustaining valve.
    Psv,
    /// Pressure breaker valve.
    Pbv,
    /// Flow control valve.
    Fcv,
    /// Throttle control valve.
    Tcv,
    /// General purpose valve (head loss is a curve of flow).
    Gpv,
}

/// The hydraulic role of a link, with the attributes specific to that role.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkKind {
    Pipe {
        length_m: f64,
        diameter_m: f64,
        hw_coefficient: f64,
        minor_loss_k: f64,
        base_status: PipeStatus,
    },
    Pump {
        mode: PumpMode,
        curve: Option<CurveId>,
        power_w: Option<f64>,
        base_status: PipeStatus,
    },
    Valve {
        diameter_m: f64,
        kind: ValveKind,
        minor_loss_k: f64,
        setting: f64,
        base_status: PipeStatus,
    },
}

impl LinkKind {
    pub fn is_pipe(&self) -> bool {
        matches!(self, LinkKind::Pipe { .. })
    }

    pub fn is_pump(&self) -> bool {
        matches!(self, LinkKind::Pump { .. })
    }

    pub fn is_valve(&self) -> bool {
        matches!(self, LinkKind::Valve { .. })
    }

    /// The base status before reconciliation (pump/valve control overlays
    /// are applied on top of this by `hydro-reconciler`).
    pub fn base_status(&self) -> PipeStatus {
        match self {
            LinkKind::Pipe { base_status, .. } => *base_status,
            LinkKind::Pump { base_status, .. } => *base_status,
            LinkKind::Valve { base_status, .. } => *base_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_base_status() {
        let p = LinkKind::Pipe {
            length_m: 100.0,
            diameter_m: 0.3,
            hw_coefficient: 130.0,
            minor_loss_k: 0.0,
            base_status: PipeStatus::Open,
        };
        assert_eq!(p.base_status(), PipeStatus::Open);
        assert!(p.is_pipe());
    }

    #[test]
    fn pump_mode_distinguishes_head_and_power() {
        let p1 = LinkKind::Pump {
            mode: PumpMode::Head,
            curve: None,
            power_w: None,
            base_status: PipeStatus::Open,
        };
        let p2 = LinkKind::Pump {
            mode: PumpMode::Power,
            curve: None,
            power_w: Some(746.0),
            base_status: PipeStatus::Open,
        };
        assert!(p1.is_pump() && p2.is_pump());
        assert_ne!(
            matches!(p1, LinkKind::Pump { mode: PumpMode::Head, .. }),
            matches!(p2, LinkKind::Pump { mode: PumpMode::Head, .. })
        );
    }

    #[test]
    fn valve_kind_prv_is_distinct() {
        let v = LinkKind::Valve {
            diameter_m: 0.2,
            kind: ValveKind::Prv,
            minor_loss_k: 0.0,
            setting: 30.0,
            base_status: PipeStatus::Open,
        };
        assert!(v.is_valve());
        assert_eq!(
            matches!(v, LinkKind::Valve { kind: ValveKind::Prv, .. }),
            true
        );
    }
}
