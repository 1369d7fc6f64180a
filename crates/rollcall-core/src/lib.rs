//! rollcall-core — Per-frame attendance decision components.
//!
//! Identity matching (nearest-neighbour embedding lookup under a distance
//! threshold) and blink liveness (eye-aspect-ratio gating with a frame
//! cooldown). Pure computation over data the detection pipeline already
//! produces; capture, inference, and persistence live with the callers.

pub mod liveness;
pub mod matcher;
pub mod types;

pub use matcher::{EuclideanMatcher, MatchResult, Matcher};
pub use types::{BoundingBox, Embedding, EyeContour, EyeLandmarks, KnownIdentity};
