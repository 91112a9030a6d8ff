//! Door control: the keypad-driven lock flow and the task that drives it.

pub mod keypad;
pub mod machine;
pub mod panel;
pub mod timers;

pub use keypad::{KeypadLayout, PasscodeBuffer};
pub use machine::{DenialReason, DoorControl, Effect, Input, LockState, Phase};
pub use panel::{DoorPanel, PanelConfig, PanelEvent, PanelHandle, PanelView};
pub use timers::{TimerFired, TimerPurpose, Timers};
