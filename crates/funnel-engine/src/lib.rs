//! The cartprobe engine: progression state machine plus the retry and
//! proxy-rotation controller that wraps it.
//!
//! `CheckoutEngine::run` is the single entry point: given a target URL
//! and an action plan, it drives a browser through the purchase funnel
//! and returns exactly one terminal `RunResult`.

pub mod autofill;
pub mod config;
pub mod controller;
pub mod errors;
pub mod fingerprint;
pub mod gates;
pub mod login;
pub mod otp;
pub mod progression;
pub mod proxy;

pub use config::{Credentials, EngineConfig, TestData};
pub use controller::{CheckoutEngine, RunRequest};
pub use errors::EngineFailure;
pub use progression::{AttemptOutcome, AttemptReport, Progression};
pub use proxy::IdentityPool;
