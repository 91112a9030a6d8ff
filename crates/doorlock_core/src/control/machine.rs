//! The door control state machine.
//!
//! `DoorControl` is pure: it consumes one `Input` at a time and returns the
//! `Effect`s the driver must carry out (timers, verification, actuation,
//! feedback). It never sleeps or performs I/O itself.

use super::keypad::{KeypadLayout, PasscodeBuffer};
use super::timers::TimerPurpose;
use crate::domain::{DoorStatus, LockAction};
use crate::ports::PortError;
use crate::status::{StatusMirror, StatusUpdate};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Interval between hold-progress ticks.
pub const HOLD_TICK: Duration = Duration::from_millis(20);
/// Progress gained per tick, in percent. 50 ticks fill the bar (one second).
pub const HOLD_STEP: u8 = 2;
pub const DENIED_WINDOW: Duration = Duration::from_secs(2);
pub const RINGING_WINDOW: Duration = Duration::from_secs(3);
pub const DEFAULT_SETTLE_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocked,
}

impl From<LockAction> for LockState {
    fn from(action: LockAction) -> Self {
        match action {
            LockAction::Lock => LockState::Locked,
            LockAction::Unlock => LockState::Unlocked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    InvalidCode,
    ActuatorUnreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingHold,
    PasscodeEntry,
    Verifying,
    Actuating(LockAction),
    Settled(LockState),
    Denied(DenialReason),
}

#[derive(Debug)]
pub enum Input {
    Press,
    Release,
    HoldTick,
    Digit(u8),
    /// A key pressed by its position on the shuffled keypad.
    Key(usize),
    Delete,
    Cancel,
    Verification(Result<(), PortError>),
    Actuation(Result<(), PortError>),
    Doorbell,
    RingingElapsed,
    DeniedElapsed,
    SettleElapsed,
    Status(StatusUpdate),
}

impl Input {
    pub fn from_timer(purpose: TimerPurpose) -> Self {
        match purpose {
            TimerPurpose::HoldTick => Input::HoldTick,
            TimerPurpose::Ringing => Input::RingingElapsed,
            TimerPurpose::DeniedReset => Input::DeniedElapsed,
            TimerPurpose::SettleReset => Input::SettleElapsed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartTimer(TimerPurpose, Duration),
    CancelTimer(TimerPurpose),
    Verify(String),
    Actuate(LockAction),
    Shake,
    PlayChime,
    /// The camera preview must be re-fetched under the new key.
    InvalidatePreview(u64),
    Notify(String),
}

pub struct DoorControl {
    phase: Phase,
    hold_progress: u8,
    buffer: PasscodeBuffer,
    layout: KeypadLayout,
    ringing: bool,
    preview_key: u64,
    mirror: StatusMirror,
    settle_window: Duration,
}

impl DoorControl {
    pub fn new(settle_window: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            hold_progress: 0,
            buffer: PasscodeBuffer::default(),
            layout: KeypadLayout::ordered(),
            ringing: false,
            preview_key: 0,
            mirror: StatusMirror::default(),
            settle_window,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn hold_progress(&self) -> u8 {
        self.hold_progress
    }

    pub fn entered_digits(&self) -> usize {
        self.buffer.len()
    }

    pub fn layout(&self) -> KeypadLayout {
        self.layout
    }

    pub fn is_ringing(&self) -> bool {
        self.ringing
    }

    pub fn preview_key(&self) -> u64 {
        self.preview_key
    }

    pub fn status(&self) -> &DoorStatus {
        self.mirror.status()
    }

    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Press => self.on_press(),
            Input::Release => self.on_release(),
            Input::HoldTick => self.on_hold_tick(),
            Input::Digit(digit) => self.on_digit(digit),
            Input::Key(position) => match self.layout.digit_at(position) {
                Some(digit) => self.on_digit(digit),
                None => Vec::new(),
            },
            Input::Delete => {
                if self.phase == Phase::PasscodeEntry {
                    self.buffer.pop();
                }
                Vec::new()
            }
            Input::Cancel => {
                if self.phase == Phase::PasscodeEntry {
                    self.buffer.clear();
                    self.enter(Phase::Idle);
                }
                Vec::new()
            }
            Input::Verification(result) => self.on_verification(result),
            Input::Actuation(result) => self.on_actuation(result),
            Input::Doorbell => self.on_doorbell(),
            Input::RingingElapsed => {
                self.ringing = false;
                Vec::new()
            }
            Input::DeniedElapsed => {
                if matches!(self.phase, Phase::Denied(_)) {
                    self.enter(Phase::Idle);
                }
                Vec::new()
            }
            Input::SettleElapsed => {
                if matches!(self.phase, Phase::Settled(_)) {
                    self.enter(Phase::Idle);
                }
                Vec::new()
            }
            Input::Status(update) => {
                self.mirror.apply(update);
                Vec::new()
            }
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "door control transition");
        self.phase = phase;
    }

    fn on_press(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Idle {
            return Vec::new();
        }
        self.hold_progress = 0;
        self.enter(Phase::AwaitingHold);
        vec![Effect::StartTimer(TimerPurpose::HoldTick, HOLD_TICK)]
    }

    fn on_release(&mut self) -> Vec<Effect> {
        if self.phase != Phase::AwaitingHold {
            return Vec::new();
        }
        self.hold_progress = 0;
        self.enter(Phase::Idle);
        vec![Effect::CancelTimer(TimerPurpose::HoldTick)]
    }

    fn on_hold_tick(&mut self) -> Vec<Effect> {
        if self.phase != Phase::AwaitingHold {
            return Vec::new();
        }
        self.hold_progress = self.hold_progress.saturating_add(HOLD_STEP).min(100);
        if self.hold_progress < 100 {
            return vec![Effect::StartTimer(TimerPurpose::HoldTick, HOLD_TICK)];
        }

        self.hold_progress = 0;
        self.buffer.clear();
        self.layout = KeypadLayout::shuffled(&mut rand::thread_rng());
        self.enter(Phase::PasscodeEntry);
        Vec::new()
    }

    fn on_digit(&mut self, digit: u8) -> Vec<Effect> {
        if self.phase != Phase::PasscodeEntry || !self.buffer.push(digit) {
            return Vec::new();
        }
        if !self.buffer.is_complete() {
            return Vec::new();
        }
        self.enter(Phase::Verifying);
        vec![Effect::Verify(self.buffer.as_str().to_string())]
    }

    fn on_verification(&mut self, result: Result<(), PortError>) -> Vec<Effect> {
        if self.phase != Phase::Verifying {
            return Vec::new();
        }
        self.buffer.clear();

        match result {
            Ok(()) => {
                let action = LockAction::toggle_from(self.mirror.status().locked);
                info!(?action, "passcode accepted");
                self.enter(Phase::Actuating(action));
                vec![Effect::Actuate(action)]
            }
            Err(PortError::InvalidCode) => {
                warn!("passcode rejected");
                self.deny(DenialReason::InvalidCode, None)
            }
            Err(e) => {
                warn!("passcode check failed: {}", e);
                self.deny(DenialReason::ActuatorUnreachable, Some(e.to_string()))
            }
        }
    }

    fn on_actuation(&mut self, result: Result<(), PortError>) -> Vec<Effect> {
        let Phase::Actuating(action) = self.phase else {
            return Vec::new();
        };

        match result {
            Ok(()) => {
                self.mirror.apply(StatusUpdate::Actuated(action));
                self.enter(Phase::Settled(action.into()));
                vec![Effect::StartTimer(
                    TimerPurpose::SettleReset,
                    self.settle_window,
                )]
            }
            Err(e) => {
                warn!(?action, "actuation failed: {}", e);
                self.deny(DenialReason::ActuatorUnreachable, Some(e.to_string()))
            }
        }
    }

    fn deny(&mut self, reason: DenialReason, notice: Option<String>) -> Vec<Effect> {
        self.buffer.clear();
        self.enter(Phase::Denied(reason));

        let mut effects = Vec::with_capacity(3);
        if let Some(message) = notice {
            effects.push(Effect::Notify(message));
        }
        effects.push(Effect::Shake);
        effects.push(Effect::StartTimer(TimerPurpose::DeniedReset, DENIED_WINDOW));
        effects
    }

    // Orthogonal to the lock flow: never touches phase or buffer.
    fn on_doorbell(&mut self) -> Vec<Effect> {
        self.ringing = true;
        self.preview_key += 1;
        vec![
            Effect::PlayChime,
            Effect::InvalidatePreview(self.preview_key),
            Effect::StartTimer(TimerPurpose::Ringing, RINGING_WINDOW),
        ]
    }
}

impl Default for DoorControl {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_WINDOW)
    }
}
