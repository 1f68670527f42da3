//! Time-based and conditional link controls.

use hydro_core::{LinkId, NodeId};

/// A time-based control: force a link open/closed/active at a clock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeAction {
    Open,
    Closed,
    /// Only meaningful for a valve; sets it active with its configured setting.
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeControl {
    pub link: LinkId,
    pub at_s: f64,
    pub action: TimeAction,
}

/// A conditional control: force a link's status based on a watched node's
/// head crossing a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparator {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionalControl {
    pub link: LinkId,
    pub watch_node: NodeId,
    pub comparator: Comparator,
    pub threshold_head_m: f64,
    pub action: TimeAction,
}

/// All controls bound to the network, queried by the reconciler once per
/// trial.
#[derive(Debug, Clone, Default)]
pub struct Controls {
    pub time_controls: Vec<TimeControl>,
    pub conditional_controls: Vec<ConditionalControl>,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time controls whose clock time exactly matches `t_s` (EPS stepping
    /// guarantees controls land exactly on a reporting step, since the
    /// hydraulic timestep is required to divide the reporting interval
    /// evenly).
    pub fn time_controls_at(&self, t_s: f64) -> impl Iterator<Item = &TimeControl> {
        self.time_controls
            .iter()
            .filter(move |c| (c.at_s - t_s).abs() < 1e-6)
    }

    pub fn conditional_controls_for(&self, link: LinkId) -> impl Iterator<Item = &ConditionalControl> {
        self.conditional_controls.iter().filter(move |c| c.link == link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydro_core::Id;

    #[test]
    fn time_controls_at_matches_exact_time() {
        let mut c = Controls::new();
        c.time_controls.push(TimeControl {
            link: Id::from_index(0),
            at_s: 3600.0,
            action: TimeAction::Closed,
        });
        assert_eq!(c.time_controls_at(3600.0).count(), 1);
        assert_eq!(c.time_controls_at(3601.0).count(), 0);
    }

    #[test]
    fn conditional_controls_filter_by_link() {
        let mut c = Controls::new();
        c.conditional_controls.push(ConditionalControl {
            link: Id::from_index(0),
            watch_node: Id::from_index(1),
            comparator: Comparator::Above,
            threshold_head_m: 10.0,
            action: TimeAction::Closed,
        });
        assert_eq!(c.conditional_controls_for(Id::from_index(0)).count(), 1);
        assert_eq!(c.conditional_controls_for(Id::from_index(5)).count(), 0);
    }
}
