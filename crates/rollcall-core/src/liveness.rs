//! Active liveness detection via eye-blink gating.
//!
//! A printed photograph or a static image on a screen shows a constant,
//! open-eye geometry frame after frame. A live person blinks involuntarily
//! every few seconds, and during a blink the eye aspect ratio (EAR)
//! collapses toward zero. This module turns the 6-point eye contours
//! already produced by the detection pipeline into that scalar openness
//! signal and debounces threshold crossings into discrete blink events, so
//! one physical blink yields exactly one logical event.
//!
//! # Threat Coverage
//!
//! - **Blocks:** printed photographs, static display images, most paper
//!   masks (no eyelid motion).
//! - **Does not block:** video replay of a blinking subject, high-quality
//!   3D masks with articulated eyelids.

use crate::types::EyeContour;

/// Average EAR below which the eyes count as closed. Open eyes sit around
/// 0.25-0.35 with 68-point landmark models; mid-blink values drop under 0.15.
pub const DEFAULT_EAR_CLOSED_THRESHOLD: f32 = 0.21;

/// Frames one blink event suppresses re-triggering for. At ~30 fps a full
/// blink spans 3-8 frames; 10 covers the slow end.
pub const DEFAULT_BLINK_COOLDOWN_FRAMES: u32 = 10;

/// Eye aspect ratio of a 6-point eye contour.
///
/// With 0-indexed points, vertical spans A = |p1 - p5| and B = |p2 - p4|
/// over horizontal span C = |p0 - p3|: `EAR = (A + B) / (2 C)`.
///
/// Returns `None` for degenerate geometry (coincident eye corners or
/// non-finite coordinates) rather than dividing by zero.
pub fn eye_aspect_ratio(eye: &EyeContour) -> Option<f32> {
    let a = point_distance(eye[1], eye[5]);
    let b = point_distance(eye[2], eye[4]);
    let c = point_distance(eye[0], eye[3]);
    if c == 0.0 {
        return None;
    }
    let ear = (a + b) / (2.0 * c);
    ear.is_finite().then_some(ear)
}

fn point_distance(p: (f32, f32), q: (f32, f32)) -> f32 {
    let dx = p.0 - q.0;
    let dy = p.1 - q.1;
    (dx * dx + dy * dy).sqrt()
}

/// Result of feeding one frame's eye contours to a [`BlinkDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkObservation {
    /// Whether this frame fired a discrete blink event.
    pub blink: bool,
    /// Mean of the two per-eye aspect ratios; `None` when either eye's
    /// geometry was degenerate (no event can fire on such a frame).
    pub average_ear: Option<f32>,
}

impl BlinkObservation {
    fn no_event(average_ear: Option<f32>) -> Self {
        Self {
            blink: false,
            average_ear,
        }
    }
}

/// Debounces raw eye-closure frames into one event per physical blink.
///
/// An event fires on a closed-eye frame seen while the cooldown is zero.
/// Every closed-eye frame re-arms the cooldown to its full width; the
/// counter drains by one per observed frame once the eyes are open again.
/// A closure sustained over many frames therefore produces exactly one
/// event, and the next event needs the cooldown to empty across open-eyed
/// frames first.
#[derive(Debug, Clone)]
pub struct BlinkDetector {
    closed_threshold: f32,
    cooldown_frames: u32,
    cooldown_remaining: u32,
}

impl BlinkDetector {
    pub fn new(closed_threshold: f32, cooldown_frames: u32) -> Self {
        Self {
            closed_threshold,
            cooldown_frames,
            cooldown_remaining: 0,
        }
    }

    /// Feed one frame's eye contours. Call once per frame the subject is
    /// visible; the debounce window is counted in observed frames.
    pub fn observe(&mut self, left_eye: &EyeContour, right_eye: &EyeContour) -> BlinkObservation {
        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
        }

        let average_ear = match (eye_aspect_ratio(left_eye), eye_aspect_ratio(right_eye)) {
            (Some(left), Some(right)) => Some((left + right) / 2.0),
            _ => None,
        };

        let Some(ear) = average_ear else {
            return BlinkObservation::no_event(None);
        };

        if ear < self.closed_threshold {
            let blink = self.cooldown_remaining == 0;
            self.cooldown_remaining = self.cooldown_frames;
            return BlinkObservation { blink, average_ear };
        }

        BlinkObservation::no_event(average_ear)
    }
}
