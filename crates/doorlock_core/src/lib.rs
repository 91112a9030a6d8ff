pub mod backoff;
pub mod control;
pub mod domain;
pub mod passcode;
pub mod ports;
pub mod status;

pub use domain::{
    Credential, DoorStatus, LockAction, LogEntry, LogFilter, LogKind, NewLogEntry, NewUser,
    Principal, Settings, SettingsPatch, StatusSnapshot, User, UserPatch, UserRole,
};
pub use ports::{
    AuditLog, CredentialStore, DeviceController, DoorActuator, PasscodeVerifier, PortError,
    PortResult, SettingsStore, UserDirectory,
};
pub use status::{StatusMirror, StatusUpdate};
