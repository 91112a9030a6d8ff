//! The async driver for one door panel.
//!
//! A single task owns the `DoorControl` machine. Keypad events, timer
//! firings and the results of spawned verification/actuation calls all arrive
//! on channels and are applied one at a time; observers follow the state
//! through a `watch` channel.

use super::keypad::KeypadLayout;
use super::machine::{DoorControl, Effect, Input, Phase, DEFAULT_SETTLE_WINDOW};
use super::timers::{TimerFired, Timers};
use crate::domain::DoorStatus;
use crate::ports::{DoorActuator, PasscodeVerifier};
use crate::status::StatusUpdate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Events a panel accepts from the outside world.
#[derive(Debug, Clone)]
pub enum PanelEvent {
    Press,
    Release,
    Digit(u8),
    Key(usize),
    Delete,
    Cancel,
    Doorbell,
    Status(StatusUpdate),
    Shutdown,
}

/// What a panel currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    pub phase: Phase,
    pub hold_progress: u8,
    pub entered_digits: usize,
    pub layout: KeypadLayout,
    pub ringing: bool,
    pub preview_key: u64,
    pub status: DoorStatus,
    pub shaking: bool,
    pub notice: Option<String>,
}

impl PanelView {
    fn of(control: &DoorControl) -> Self {
        Self {
            phase: control.phase(),
            hold_progress: control.hold_progress(),
            entered_digits: control.entered_digits(),
            layout: control.layout(),
            ringing: control.is_ringing(),
            preview_key: control.preview_key(),
            status: control.status().clone(),
            shaking: false,
            notice: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PanelConfig {
    pub settle_window: Duration,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            settle_window: DEFAULT_SETTLE_WINDOW,
        }
    }
}

/// The sending side of a running panel.
#[derive(Clone)]
pub struct PanelHandle {
    events: mpsc::UnboundedSender<PanelEvent>,
    view: watch::Receiver<PanelView>,
}

impl PanelHandle {
    /// Returns `false` once the panel has stopped.
    pub fn send(&self, event: PanelEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn view(&self) -> PanelView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PanelView> {
        self.view.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.events.send(PanelEvent::Shutdown);
    }
}

pub struct DoorPanel {
    control: DoorControl,
    verifier: Arc<dyn PasscodeVerifier>,
    actuator: Arc<dyn DoorActuator>,
    timers: Timers,
    events: mpsc::UnboundedReceiver<PanelEvent>,
    fired: mpsc::UnboundedReceiver<TimerFired>,
    results_tx: mpsc::UnboundedSender<Input>,
    results: mpsc::UnboundedReceiver<Input>,
    view: watch::Sender<PanelView>,
}

impl DoorPanel {
    /// Starts a panel task and returns its handle.
    pub fn spawn(
        verifier: Arc<dyn PasscodeVerifier>,
        actuator: Arc<dyn DoorActuator>,
        config: PanelConfig,
    ) -> (PanelHandle, JoinHandle<()>) {
        let control = DoorControl::new(config.settle_window);
        let (events_tx, events) = mpsc::unbounded_channel();
        let (fired_tx, fired) = mpsc::unbounded_channel();
        let (results_tx, results) = mpsc::unbounded_channel();
        let (view, view_rx) = watch::channel(PanelView::of(&control));

        let panel = DoorPanel {
            control,
            verifier,
            actuator,
            timers: Timers::new(fired_tx),
            events,
            fired,
            results_tx,
            results,
            view,
        };
        let task = tokio::spawn(panel.run());

        (
            PanelHandle {
                events: events_tx,
                view: view_rx,
            },
            task,
        )
    }

    async fn run(mut self) {
        info!("Door panel started.");
        loop {
            let input = tokio::select! {
                event = self.events.recv() => match event {
                    None | Some(PanelEvent::Shutdown) => break,
                    Some(event) => Self::input_for(event),
                },
                Some(fired) = self.fired.recv() => {
                    if !self.timers.accept(fired) {
                        continue;
                    }
                    Input::from_timer(fired.purpose)
                },
                Some(result) = self.results.recv() => result,
            };

            let effects = self.control.handle(input);
            let mut view = PanelView::of(&self.control);
            for effect in effects {
                self.execute(effect, &mut view);
            }
            self.view.send_replace(view);
        }

        // In-flight verification/actuation tasks are left to finish on their own.
        self.timers.cancel_all();
        info!("Door panel stopped.");
    }

    fn input_for(event: PanelEvent) -> Input {
        match event {
            PanelEvent::Press => Input::Press,
            PanelEvent::Release => Input::Release,
            PanelEvent::Digit(digit) => Input::Digit(digit),
            PanelEvent::Key(position) => Input::Key(position),
            PanelEvent::Delete => Input::Delete,
            PanelEvent::Cancel => Input::Cancel,
            PanelEvent::Doorbell => Input::Doorbell,
            PanelEvent::Status(update) => Input::Status(update),
            PanelEvent::Shutdown => unreachable!("shutdown is handled by the run loop"),
        }
    }

    fn execute(&mut self, effect: Effect, view: &mut PanelView) {
        match effect {
            Effect::StartTimer(purpose, after) => self.timers.start(purpose, after),
            Effect::CancelTimer(purpose) => self.timers.cancel(purpose),
            Effect::Verify(code) => {
                let verifier = self.verifier.clone();
                let results = self.results_tx.clone();
                tokio::spawn(async move {
                    let result = verifier.verify(&code).await;
                    let _ = results.send(Input::Verification(result));
                });
            }
            Effect::Actuate(action) => {
                let actuator = self.actuator.clone();
                let results = self.results_tx.clone();
                tokio::spawn(async move {
                    let result = actuator.perform(action).await;
                    let _ = results.send(Input::Actuation(result));
                });
            }
            Effect::Shake => view.shaking = true,
            Effect::PlayChime => info!("Doorbell chime."),
            Effect::InvalidatePreview(key) => info!(key, "Camera preview invalidated."),
            Effect::Notify(message) => {
                warn!("{}", message);
                view.notice = Some(message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::machine::{DenialReason, LockState};
    use crate::domain::{LockAction, StatusSnapshot};
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    struct CountingVerifier {
        passcode: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PasscodeVerifier for CountingVerifier {
        async fn verify(&self, candidate: &str) -> PortResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if candidate == self.passcode {
                Ok(())
            } else {
                Err(PortError::InvalidCode)
            }
        }
    }

    #[derive(Default)]
    struct RecordingActuator {
        locks: AtomicUsize,
        unlocks: AtomicUsize,
    }

    #[async_trait]
    impl DoorActuator for RecordingActuator {
        async fn lock(&self) -> PortResult<()> {
            self.locks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn unlock(&self) -> PortResult<()> {
            self.unlocks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        handle: PanelHandle,
        view: watch::Receiver<PanelView>,
        verifier: Arc<CountingVerifier>,
        actuator: Arc<RecordingActuator>,
    }

    fn start() -> Fixture {
        let verifier = Arc::new(CountingVerifier {
            passcode: "123456",
            calls: AtomicUsize::new(0),
        });
        let actuator = Arc::new(RecordingActuator::default());
        let (handle, _task) =
            DoorPanel::spawn(verifier.clone(), actuator.clone(), PanelConfig::default());
        let view = handle.subscribe();
        Fixture {
            handle,
            view,
            verifier,
            actuator,
        }
    }

    async fn wait_for_phase(view: &mut watch::Receiver<PanelView>, phase: Phase) -> PanelView {
        view.wait_for(|v| v.phase == phase).await.unwrap().clone()
    }

    async fn open_keypad(f: &mut Fixture) {
        f.handle.send(PanelEvent::Press);
        wait_for_phase(&mut f.view, Phase::PasscodeEntry).await;
    }

    fn type_code(handle: &PanelHandle, code: &str) {
        for c in code.bytes() {
            handle.send(PanelEvent::Digit(c - b'0'));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn short_hold_returns_to_idle() {
        let mut f = start();
        f.handle.send(PanelEvent::Press);
        tokio::time::sleep(Duration::from_millis(500)).await;

        let progress = f.handle.view().hold_progress;
        assert!(progress > 0 && progress < 100, "progress was {}", progress);

        f.handle.send(PanelEvent::Release);
        let view = wait_for_phase(&mut f.view, Phase::Idle).await;
        assert_eq!(view.hold_progress, 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.handle.view().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn full_hold_takes_one_second() {
        let mut f = start();
        let started = Instant::now();
        open_keypad(&mut f).await;
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn correct_code_while_locked_unlocks_once_then_idles() {
        let mut f = start();
        assert!(f.handle.view().status.locked);
        open_keypad(&mut f).await;

        type_code(&f.handle, "1234567");
        let view = wait_for_phase(&mut f.view, Phase::Settled(LockState::Unlocked)).await;
        assert!(!view.status.locked);
        assert_eq!(f.actuator.unlocks.load(Ordering::SeqCst), 1);
        assert_eq!(f.actuator.locks.load(Ordering::SeqCst), 0);
        assert_eq!(f.verifier.calls.load(Ordering::SeqCst), 1);

        wait_for_phase(&mut f.view, Phase::Idle).await;
        assert_eq!(f.verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_code_is_denied_and_cleared_within_the_window() {
        let mut f = start();
        open_keypad(&mut f).await;

        type_code(&f.handle, "000000");
        let denied = wait_for_phase(&mut f.view, Phase::Denied(DenialReason::InvalidCode)).await;
        let denied_at = Instant::now();
        assert!(denied.shaking);
        assert_eq!(denied.entered_digits, 0);

        wait_for_phase(&mut f.view, Phase::Idle).await;
        let waited = denied_at.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_millis(2100));
        assert_eq!(f.actuator.unlocks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn doorbell_mid_entry_keeps_the_buffer() {
        let mut f = start();
        open_keypad(&mut f).await;
        type_code(&f.handle, "12");
        f.view.wait_for(|v| v.entered_digits == 2).await.unwrap();

        f.handle.send(PanelEvent::Doorbell);
        let ringing = f.view.wait_for(|v| v.ringing).await.unwrap().clone();
        assert_eq!(ringing.phase, Phase::PasscodeEntry);
        assert_eq!(ringing.entered_digits, 2);
        assert_eq!(ringing.preview_key, 1);

        let quiet = f.view.wait_for(|v| !v.ringing).await.unwrap().clone();
        assert_eq!(quiet.phase, Phase::PasscodeEntry);
        assert_eq!(quiet.entered_digits, 2);

        type_code(&f.handle, "3456");
        wait_for_phase(&mut f.view, Phase::Settled(LockState::Unlocked)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn channel_snapshot_overrides_optimistic_unlock() {
        let mut f = start();
        open_keypad(&mut f).await;
        type_code(&f.handle, "123456");
        wait_for_phase(&mut f.view, Phase::Settled(LockState::Unlocked)).await;

        f.handle.send(PanelEvent::Status(StatusUpdate::Snapshot(StatusSnapshot {
            locked: Some(true),
            door_open: Some(false),
            homekit_paired: false,
        })));
        let view = f.view.wait_for(|v| v.status.locked).await.unwrap().clone();
        assert!(view.status.locked);

        // Next toggle follows the confirmed state.
        wait_for_phase(&mut f.view, Phase::Idle).await;
        open_keypad(&mut f).await;
        type_code(&f.handle, "123456");
        wait_for_phase(&mut f.view, Phase::Settled(LockAction::Unlock.into())).await;
        assert_eq!(f.actuator.unlocks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_task() {
        let verifier = Arc::new(CountingVerifier {
            passcode: "123456",
            calls: AtomicUsize::new(0),
        });
        let (handle, task) = DoorPanel::spawn(
            verifier,
            Arc::new(RecordingActuator::default()),
            PanelConfig::default(),
        );
        handle.send(PanelEvent::Press);
        handle.shutdown();
        task.await.unwrap();
        assert!(!handle.send(PanelEvent::Release));
    }
}
