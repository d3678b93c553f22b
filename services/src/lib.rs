pub mod attendance;
pub mod directory;
pub mod error;
pub mod notifier;
pub mod qr_session;
pub mod settings;
pub mod storage;
pub mod token;
pub mod verifier;
