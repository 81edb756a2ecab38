//! Switching between the mutually exclusive full-screen front-ends.
//!
//! A switch stops every service that conflicts with the target, then starts
//! the target. Stops are best-effort: a front-end that already exited makes
//! its kill command fail, and that must not block the switch. Only the final
//! start decides the outcome.
//!
//! When the desktop session is one of the services to stop, the caller may
//! be running inside it. In that case the remaining work (stop the session,
//! start the target) is handed to a detached process before the session goes
//! away, and the switch reports success once the hand-off succeeded.

use super::detach::{Continuation, Detach, DetachPolicy};
use super::registry::Registry;
use super::services::ServiceControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Idle,
    Stopping,
    Starting,
    Done,
    Failed,
}

impl SwitchState {
    fn can_enter(self, next: SwitchState) -> bool {
        use SwitchState::*;
        matches!(
            (self, next),
            (Idle, Stopping)
                | (Idle, Failed)
                | (Stopping, Starting)
                | (Stopping, Done)
                | (Stopping, Failed)
                | (Starting, Done)
                | (Starting, Failed)
        )
    }
}

/// What happened during one switch.
#[derive(Debug, Clone)]
pub struct SwitchReport {
    pub target: String,
    pub state: SwitchState,
    /// Every state visited, starting with `Idle`.
    pub trail: Vec<SwitchState>,
    /// Stop attempts made by this process, in order, with their outcome.
    pub stops: Vec<(String, bool)>,
    pub detached: Option<Continuation>,
    pub started: Option<bool>,
}

impl SwitchReport {
    fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            state: SwitchState::Idle,
            trail: vec![SwitchState::Idle],
            stops: Vec::new(),
            detached: None,
            started: None,
        }
    }

    fn enter(&mut self, next: SwitchState) {
        debug_assert!(
            self.state.can_enter(next),
            "invalid switch transition {:?} -> {:?}",
            self.state,
            next
        );
        log::debug!("switch to {}: {:?} -> {:?}", self.target, self.state, next);
        self.state = next;
        self.trail.push(next);
    }

    pub fn succeeded(&self) -> bool {
        self.state == SwitchState::Done
    }
}

pub struct Switcher<'a> {
    registry: &'a Registry,
    control: &'a dyn ServiceControl,
    detacher: &'a dyn Detach,
    policy: DetachPolicy,
    in_graphical_session: bool,
}

impl<'a> Switcher<'a> {
    pub fn new(
        registry: &'a Registry,
        control: &'a dyn ServiceControl,
        detacher: &'a dyn Detach,
        policy: DetachPolicy,
        in_graphical_session: bool,
    ) -> Self {
        Self {
            registry,
            control,
            detacher,
            policy,
            in_graphical_session,
        }
    }

    /// Switch to the enabled GUI application `app_id`.
    pub fn switch(&self, app_id: &str) -> SwitchReport {
        let mut report = SwitchReport::new(app_id);

        let Some(service) = self.registry.resolve_service(app_id) else {
            log::error!("Unknown application: {}", app_id);
            log::info!(
                "Valid options are: {}",
                self.registry.enabled_gui_ids().join(", ")
            );
            report.enter(SwitchState::Failed);
            return report;
        };
        log::info!("Switching to {} (service: {})...", app_id, service.id);

        report.enter(SwitchState::Stopping);

        let (session, others): (Vec<&String>, Vec<&String>) = self
            .registry
            .conflicts_of(&service.id)
            .iter()
            .partition(|id| {
                self.registry
                    .service(id)
                    .is_some_and(|svc| svc.hosts_session())
            });

        if self
            .policy
            .requires_detach(!session.is_empty(), self.in_graphical_session)
        {
            self.stop_all(&mut report, others);
            let continuation = Continuation {
                start: service.id.clone(),
                stop: session.into_iter().cloned().collect(),
            };
            if self.detacher.detach(&continuation) {
                report.detached = Some(continuation);
                report.enter(SwitchState::Done);
            } else {
                log::error!("Could not hand off the switch to {}", app_id);
                report.enter(SwitchState::Failed);
            }
            return report;
        }

        self.stop_all(&mut report, others.into_iter().chain(session));
        self.start(&mut report, &service.id);
        report
    }

    /// Finish a switch handed off by [`Switcher::switch`]. Runs attached; the
    /// process calling this is already outside the session being stopped.
    pub fn resume(&self, continuation: &Continuation) -> SwitchReport {
        let mut report = SwitchReport::new(&continuation.start);
        if self.registry.service(&continuation.start).is_none() {
            log::error!("Unknown service: {}", continuation.start);
            report.enter(SwitchState::Failed);
            return report;
        }

        report.enter(SwitchState::Stopping);
        self.stop_all(&mut report, continuation.stop.iter());
        self.start(&mut report, &continuation.start);
        report
    }

    fn stop_all<'s>(&self, report: &mut SwitchReport, ids: impl IntoIterator<Item = &'s String>) {
        for id in ids {
            let ok = self.control.stop(id);
            report.stops.push((id.clone(), ok));
        }
    }

    fn start(&self, report: &mut SwitchReport, service_id: &str) {
        report.enter(SwitchState::Starting);
        let ok = self.control.start(service_id);
        report.started = Some(ok);
        if ok {
            report.enter(SwitchState::Done);
        } else {
            log::error!(
                "Switch to {} failed: {} did not start",
                report.target,
                service_id
            );
            report.enter(SwitchState::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::detach::fake::RecordingDetacher;
    use crate::backend::registry::fixture::registry;
    use crate::backend::services::fake::FakeController;
    use crate::backend::services::Action;
    use test_case::test_case;

    fn attached<'a>(
        registry: &'a Registry,
        control: &'a FakeController,
        detacher: &'a RecordingDetacher,
    ) -> Switcher<'a> {
        Switcher::new(registry, control, detacher, DetachPolicy::Never, false)
    }

    fn stops(calls: &[(Action, String)]) -> Vec<&str> {
        calls
            .iter()
            .filter(|(a, _)| *a == Action::Stop)
            .map(|(_, id)| id.as_str())
            .collect()
    }

    #[test_case("kodi", "kodi")]
    #[test_case("retropie", "emulationstation")]
    #[test_case("emulationstation", "emulationstation")]
    #[test_case("desktop", "desktop")]
    fn leaves_only_target_running(app: &str, service: &str) {
        let registry = registry();
        let control = FakeController::with_running(&["kodi", "emulationstation", "desktop"]);
        let detacher = RecordingDetacher::new(true);

        let report = attached(&registry, &control, &detacher).switch(app);

        assert!(report.succeeded());
        assert_eq!(control.running(), [service]);
        assert_eq!(
            report.trail,
            [
                SwitchState::Idle,
                SwitchState::Stopping,
                SwitchState::Starting,
                SwitchState::Done
            ]
        );
    }

    #[test]
    fn switching_twice_is_idempotent() {
        let registry = registry();
        let control = FakeController::with_running(&["desktop"]);
        let detacher = RecordingDetacher::new(true);
        let switcher = attached(&registry, &control, &detacher);

        assert!(switcher.switch("kodi").succeeded());
        let once = control.running();
        let second = switcher.switch("kodi");

        assert!(second.succeeded());
        assert_eq!(control.running(), once);
        // the second run is not short-circuited
        assert_eq!(second.stops.len(), 2);
        assert_eq!(second.started, Some(true));
    }

    #[test]
    fn stop_failure_does_not_block_start() {
        let registry = registry();
        let mut control = FakeController::with_running(&["emulationstation"]);
        control.failing_stops.insert("emulationstation".into());
        let detacher = RecordingDetacher::new(true);

        let report = attached(&registry, &control, &detacher).switch("kodi");

        assert!(report.succeeded());
        assert!(report.stops.contains(&("emulationstation".to_string(), false)));
        assert_eq!(control.calls().last().unwrap(), &(Action::Start, "kodi".to_string()));
    }

    #[test]
    fn start_failure_fails_the_switch() {
        let registry = registry();
        let mut control = FakeController::with_running(&["kodi"]);
        control.failing_starts.insert("emulationstation".into());
        let detacher = RecordingDetacher::new(true);

        let report = attached(&registry, &control, &detacher).switch("retropie");

        assert_eq!(report.state, SwitchState::Failed);
        assert_eq!(report.started, Some(false));
        // kodi was still stopped; nothing is running now
        assert!(control.running().is_empty());
    }

    #[test]
    fn unknown_target_makes_no_calls() {
        let registry = registry();
        let control = FakeController::default();
        let detacher = RecordingDetacher::new(true);
        let switcher = Switcher::new(&registry, &control, &detacher, DetachPolicy::Always, true);

        let report = switcher.switch("not_a_real_app");

        assert_eq!(report.state, SwitchState::Failed);
        assert_eq!(report.trail, [SwitchState::Idle, SwitchState::Failed]);
        assert!(control.calls().is_empty());
        assert!(detacher.handed_off.borrow().is_empty());
    }

    #[test]
    fn cli_app_is_not_a_target() {
        let registry = registry();
        let control = FakeController::default();
        let detacher = RecordingDetacher::new(true);

        let report = attached(&registry, &control, &detacher).switch("moonlight");

        assert!(!report.succeeded());
        assert!(control.calls().is_empty());
    }

    #[test]
    fn desktop_target_stops_both_others_then_starts_as_root() {
        let registry = registry();
        let control = FakeController::with_running(&["kodi"]);
        let detacher = RecordingDetacher::new(true);
        let switcher = Switcher::new(&registry, &control, &detacher, DetachPolicy::Always, true);

        let report = switcher.switch("desktop");

        assert!(report.succeeded());
        // the desktop is not among the services to stop, so nothing detaches
        assert!(detacher.handed_off.borrow().is_empty());
        let calls = control.calls();
        let mut stopped = stops(&calls);
        stopped.sort();
        assert_eq!(stopped, ["emulationstation", "kodi"]);
        assert_eq!(calls.last().unwrap(), &(Action::Start, "desktop".to_string()));
        assert_eq!(
            registry.service("desktop").unwrap().privilege(),
            crate::model::Privilege::Root
        );
    }

    #[test]
    fn leaving_the_desktop_detaches_the_rest() {
        let registry = registry();
        let control = FakeController::with_running(&["desktop", "emulationstation"]);
        let detacher = RecordingDetacher::new(true);
        let switcher = Switcher::new(&registry, &control, &detacher, DetachPolicy::Always, true);

        let report = switcher.switch("kodi");

        assert!(report.succeeded());
        // only the non-session conflict is stopped here
        assert_eq!(
            control.calls(),
            [(Action::Stop, "emulationstation".to_string())]
        );
        let expected = Continuation {
            start: "kodi".into(),
            stop: vec!["desktop".into()],
        };
        assert_eq!(detacher.handed_off.borrow().as_slice(), [expected.clone()]);
        assert_eq!(report.detached, Some(expected));
        assert_eq!(
            report.trail,
            [SwitchState::Idle, SwitchState::Stopping, SwitchState::Done]
        );
    }

    #[test]
    fn failed_hand_off_fails_the_switch() {
        let registry = registry();
        let control = FakeController::default();
        let detacher = RecordingDetacher::new(false);
        let switcher = Switcher::new(&registry, &control, &detacher, DetachPolicy::Always, false);

        let report = switcher.switch("retropie");

        assert_eq!(report.state, SwitchState::Failed);
        assert!(stops(&control.calls()).contains(&"kodi"));
        assert!(!control
            .calls()
            .iter()
            .any(|(a, _)| *a == Action::Start));
    }

    #[test]
    fn auto_policy_stays_attached_on_the_console() {
        let registry = registry();
        let control = FakeController::with_running(&["desktop"]);
        let detacher = RecordingDetacher::new(true);
        let switcher = Switcher::new(&registry, &control, &detacher, DetachPolicy::Auto, false);

        let report = switcher.switch("kodi");

        assert!(report.succeeded());
        assert!(detacher.handed_off.borrow().is_empty());
        assert_eq!(control.running(), ["kodi"]);
    }

    #[test]
    fn resume_stops_then_starts() {
        let registry = registry();
        let control = FakeController::with_running(&["desktop"]);
        let detacher = RecordingDetacher::new(true);
        let switcher = attached(&registry, &control, &detacher);

        let report = switcher.resume(&Continuation {
            start: "kodi".into(),
            stop: vec!["desktop".into()],
        });

        assert!(report.succeeded());
        assert_eq!(
            control.calls(),
            [
                (Action::Stop, "desktop".to_string()),
                (Action::Start, "kodi".to_string())
            ]
        );
        assert_eq!(control.running(), ["kodi"]);
    }

    #[test]
    fn resume_rejects_unknown_service() {
        let registry = registry();
        let control = FakeController::default();
        let detacher = RecordingDetacher::new(true);

        let report = attached(&registry, &control, &detacher).resume(&Continuation {
            start: "steam".into(),
            stop: vec!["desktop".into()],
        });

        assert_eq!(report.state, SwitchState::Failed);
        assert!(control.calls().is_empty());
    }
}
