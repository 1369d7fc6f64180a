//! rollcalld — liveness-gated biometric attendance service.
//!
//! Recognizes faces from a live detection feed against an enrolled
//! gallery, requires an eye-blink before accepting a match, and records
//! each identity exactly once in an append-only CSV ledger with a
//! Present/Late status derived from the time of day. Camera capture,
//! face detection, landmark extraction, embedding generation, and
//! rendering live with external collaborators on the other side of a
//! line-delimited JSON protocol.

pub mod config;
pub mod gallery;
pub mod ledger;
pub mod pipeline;
pub mod protocol;
