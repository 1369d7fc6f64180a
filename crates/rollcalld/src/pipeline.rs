//! Per-frame decision orchestration.
//!
//! For every detected face: match the embedding against the gallery; a
//! matched identity must produce one blink event before its attendance row
//! is committed; every face yields exactly one display decision for the
//! rendering collaborator, in detection order. Per-face problems are
//! logged and never stop the frame loop.

use chrono::{Local, NaiveTime};
use rollcall_core::liveness::BlinkDetector;
use rollcall_core::{BoundingBox, Embedding, EuclideanMatcher, EyeLandmarks, KnownIdentity, Matcher};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::ControlFlow;

use crate::config::Config;
use crate::ledger::AttendanceLedger;

/// One face as reported by the detection collaborator for the current
/// frame: bounding box in detection coordinates, identity embedding, and
/// the two 6-point eye contours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
    pub landmarks: EyeLandmarks,
}

/// Verification display state for a recognized face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    /// An attendance row exists for this identity.
    Verified,
    /// Recognized, waiting on the liveness blink.
    BlinkToVerify,
}

/// Which side of the cutoff the frame's wall clock is on; the renderer's
/// color code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    WithinCutoff,
    PastCutoff,
}

/// Display decision for one face, bounding box already scaled to
/// full-frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaceDecision {
    Known {
        bbox: BoundingBox,
        name: String,
        state: VerificationState,
        window: TimeWindow,
    },
    Unknown {
        bbox: BoundingBox,
    },
}

impl FaceDecision {
    /// Label text the renderer draws under the box.
    pub fn label(&self) -> String {
        match self {
            FaceDecision::Known {
                name,
                state: VerificationState::Verified,
                ..
            } => format!("{name}: VERIFIED"),
            FaceDecision::Known {
                name,
                state: VerificationState::BlinkToVerify,
                ..
            } => format!("{name}: BLINK TO VERIFY"),
            FaceDecision::Unknown { .. } => "UNKNOWN IDENTITY".to_string(),
        }
    }
}

/// Per-frame fan-out over detected faces: matcher, blink gate, ledger.
///
/// Blink debounce state is keyed by canonical identity, so one person's
/// cooldown never suppresses another's blink in the same frame. A
/// detector only ticks on frames where its identity is matched and still
/// unrecorded.
pub struct FramePipeline {
    gallery: Vec<KnownIdentity>,
    ledger: AttendanceLedger,
    matcher: EuclideanMatcher,
    detectors: HashMap<String, BlinkDetector>,
    match_threshold: f32,
    ear_closed_threshold: f32,
    blink_cooldown_frames: u32,
    detection_scale: f32,
}

impl FramePipeline {
    pub fn new(config: &Config, gallery: Vec<KnownIdentity>, ledger: AttendanceLedger) -> Self {
        Self {
            gallery,
            ledger,
            matcher: EuclideanMatcher,
            detectors: HashMap::new(),
            match_threshold: config.match_threshold,
            ear_closed_threshold: config.ear_closed_threshold,
            blink_cooldown_frames: config.blink_cooldown_frames,
            detection_scale: config.detection_scale,
        }
    }

    pub fn ledger(&self) -> &AttendanceLedger {
        &self.ledger
    }

    /// Process one frame's detections at the current wall-clock time.
    pub fn process_frame(&mut self, faces: &[DetectedFace]) -> Vec<FaceDecision> {
        self.process_frame_at(faces, Local::now().time())
    }

    /// Process one frame's detections as of the given time of day. Faces
    /// are handled and emitted in detection order.
    pub fn process_frame_at(&mut self, faces: &[DetectedFace], now: NaiveTime) -> Vec<FaceDecision> {
        let window = if now <= self.ledger.cutoff() {
            TimeWindow::WithinCutoff
        } else {
            TimeWindow::PastCutoff
        };
        faces
            .iter()
            .map(|face| self.decide(face, now, window))
            .collect()
    }

    fn decide(&mut self, face: &DetectedFace, now: NaiveTime, window: TimeWindow) -> FaceDecision {
        let bbox = face.bbox.scaled(self.detection_scale);

        let result = self
            .matcher
            .best_match(&face.embedding, &self.gallery, self.match_threshold);
        let name = match (result.matched, result.name) {
            (true, Some(name)) => name,
            _ => return FaceDecision::Unknown { bbox },
        };

        if self.ledger.is_recorded(&name) {
            return FaceDecision::Known {
                bbox,
                name,
                state: VerificationState::Verified,
                window,
            };
        }

        let detector = self.detectors.entry(name.clone()).or_insert_with(|| {
            BlinkDetector::new(self.ear_closed_threshold, self.blink_cooldown_frames)
        });
        let observation = detector.observe(&face.landmarks.left_eye, &face.landmarks.right_eye);

        let mut state = VerificationState::BlinkToVerify;
        if observation.blink {
            match self.ledger.record_at(&name, now) {
                Ok(newly) => {
                    state = VerificationState::Verified;
                    if newly {
                        tracing::info!(
                            name = %name,
                            distance = result.distance,
                            "attendance marked after blink"
                        );
                    }
                }
                Err(error) => {
                    // The subject can blink again on a later frame.
                    tracing::warn!(name = %name, %error, "failed to append attendance row");
                }
            }
        }

        FaceDecision::Known {
            bbox,
            name,
            state,
            window,
        }
    }
}

/// Per-frame face feed, the camera-plus-detection collaborator seam.
/// `None` means the stream is over (acquisition failure, end of input, or
/// a stop message) and ends the session.
///
/// Implementations release the underlying capture resource in `Drop`;
/// [`run_session`] consumes the source so release happens on every exit
/// path.
pub trait FaceStream {
    fn next_faces(&mut self) -> Option<Vec<DetectedFace>>;
}

/// Rendering collaborator seam. `ControlFlow::Break` is the user-quit
/// signal, polled once per presented frame.
pub trait DecisionSink {
    fn present(&mut self, decisions: &[FaceDecision]) -> ControlFlow<()>;
}

/// Frame-at-a-time session loop: block on the next frame, run the
/// decision pipeline to completion, present, repeat. No intra-frame
/// concurrency and no cross-frame pipelining.
pub fn run_session<S, D>(pipeline: &mut FramePipeline, mut source: S, sink: &mut D)
where
    S: FaceStream,
    D: DecisionSink,
{
    let mut frames = 0u64;
    loop {
        let Some(faces) = source.next_faces() else {
            tracing::info!(frames, "face stream ended");
            break;
        };
        frames += 1;
        let decisions = pipeline.process_frame(&faces);
        if sink.present(&decisions).is_break() {
            tracing::info!(frames, "quit requested");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use rollcall_core::EyeContour;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_config() -> Config {
        Config {
            gallery_dir: PathBuf::from("known_faces"),
            ledger_path: PathBuf::from("Attendance.csv"),
            cutoff_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            match_threshold: 0.45,
            ear_closed_threshold: 0.21,
            blink_cooldown_frames: 10,
            detection_scale: 4.0,
        }
    }

    fn eye(vertical: f32) -> EyeContour {
        let half = vertical / 2.0;
        [
            (0.0, 0.0),
            (3.0, half),
            (7.0, half),
            (10.0, 0.0),
            (7.0, -half),
            (3.0, -half),
        ]
    }

    fn open_eyes() -> EyeLandmarks {
        EyeLandmarks {
            left_eye: eye(3.0),
            right_eye: eye(3.0),
        }
    }

    fn closed_eyes() -> EyeLandmarks {
        EyeLandmarks {
            left_eye: eye(1.0),
            right_eye: eye(1.0),
        }
    }

    fn face(values: Vec<f32>, landmarks: EyeLandmarks) -> DetectedFace {
        DetectedFace {
            bbox: BoundingBox {
                x1: 10.0,
                y1: 10.0,
                x2: 20.0,
                y2: 20.0,
            },
            embedding: Embedding::new(values),
            landmarks,
        }
    }

    fn known(name: &str, values: Vec<f32>) -> KnownIdentity {
        KnownIdentity {
            name: name.to_string(),
            embedding: Embedding::new(values),
        }
    }

    fn pipeline_with(dir: &TempDir, gallery: Vec<KnownIdentity>) -> FramePipeline {
        let config = test_config();
        let ledger = AttendanceLedger::open(&dir.path().join("Attendance.csv"), config.cutoff_time)
            .unwrap();
        FramePipeline::new(&config, gallery, ledger)
    }

    fn morning() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 30, 0).unwrap()
    }

    #[test]
    fn test_unknown_face_skips_liveness_and_ledger() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline_with(&dir, vec![known("ALICE", vec![0.0, 0.0])]);

        // Far from ALICE, blinking. Must neither match nor record.
        let probe = face(vec![5.0, 5.0], closed_eyes());
        let decisions = pipeline.process_frame_at(&[probe], morning());
        assert_eq!(decisions.len(), 1);
        assert!(matches!(decisions[0], FaceDecision::Unknown { .. }));
        assert_eq!(decisions[0].label(), "UNKNOWN IDENTITY");
        assert!(pipeline.ledger().is_empty());
    }

    #[test]
    fn test_empty_gallery_marks_every_face_unknown() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline_with(&dir, vec![]);

        let probe = face(vec![0.0, 0.0], closed_eyes());
        let decisions = pipeline.process_frame_at(&[probe], morning());
        assert!(matches!(decisions[0], FaceDecision::Unknown { .. }));
    }

    #[test]
    fn test_matched_face_requires_blink_before_recording() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline_with(&dir, vec![known("ALICE", vec![0.0, 0.0])]);

        // Open eyes: recognized but unrecorded.
        let probe = face(vec![0.1, 0.0], open_eyes());
        let decisions = pipeline.process_frame_at(&[probe], morning());
        match &decisions[0] {
            FaceDecision::Known { name, state, .. } => {
                assert_eq!(name, "ALICE");
                assert_eq!(*state, VerificationState::BlinkToVerify);
            }
            other => panic!("unexpected decision: {other:?}"),
        }
        assert!(!pipeline.ledger().is_recorded("ALICE"));

        // Blink: recorded and verified within the same frame.
        let probe = face(vec![0.1, 0.0], closed_eyes());
        let decisions = pipeline.process_frame_at(&[probe], morning());
        match &decisions[0] {
            FaceDecision::Known { name, state, .. } => {
                assert_eq!(name, "ALICE");
                assert_eq!(*state, VerificationState::Verified);
            }
            other => panic!("unexpected decision: {other:?}"),
        }
        assert!(pipeline.ledger().is_recorded("ALICE"));
        assert_eq!(pipeline.ledger().len(), 1);
    }

    #[test]
    fn test_recorded_identity_stays_verified_without_blinking() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline_with(&dir, vec![known("ALICE", vec![0.0, 0.0])]);

        let blink = face(vec![0.1, 0.0], closed_eyes());
        pipeline.process_frame_at(&[blink], morning());
        assert_eq!(pipeline.ledger().len(), 1);

        // Later frames with open eyes: verified, no second row.
        let calm = face(vec![0.1, 0.0], open_eyes());
        for _ in 0..20 {
            let decisions = pipeline.process_frame_at(&[calm.clone()], morning());
            match &decisions[0] {
                FaceDecision::Known { state, .. } => {
                    assert_eq!(*state, VerificationState::Verified);
                }
                other => panic!("unexpected decision: {other:?}"),
            }
        }
        assert_eq!(pipeline.ledger().len(), 1);
    }

    #[test]
    fn test_sustained_closure_records_once() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline_with(&dir, vec![known("ALICE", vec![0.0, 0.0])]);

        let probe = face(vec![0.1, 0.0], closed_eyes());
        for _ in 0..15 {
            pipeline.process_frame_at(&[probe.clone()], morning());
        }
        assert_eq!(pipeline.ledger().len(), 1);
        assert_eq!(pipeline.ledger().entries().unwrap().len(), 1);
    }

    #[test]
    fn test_cooldowns_are_independent_per_identity() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline_with(
            &dir,
            vec![known("ALICE", vec![0.0, 0.0]), known("BOB", vec![10.0, 10.0])],
        );

        // ALICE blinks on frame 1; BOB on frame 2, well inside ALICE's
        // cooldown window. Both must land in the ledger.
        let alice_blink = face(vec![0.1, 0.0], closed_eyes());
        let bob_calm = face(vec![10.1, 10.0], open_eyes());
        pipeline.process_frame_at(&[alice_blink, bob_calm], morning());

        let alice_calm = face(vec![0.1, 0.0], open_eyes());
        let bob_blink = face(vec![10.1, 10.0], closed_eyes());
        pipeline.process_frame_at(&[alice_calm, bob_blink], morning());

        assert!(pipeline.ledger().is_recorded("ALICE"));
        assert!(pipeline.ledger().is_recorded("BOB"));
    }

    #[test]
    fn test_time_window_follows_cutoff() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline_with(&dir, vec![known("ALICE", vec![0.0, 0.0])]);
        let probe = face(vec![0.1, 0.0], open_eyes());

        let decisions = pipeline.process_frame_at(&[probe.clone()], morning());
        match &decisions[0] {
            FaceDecision::Known { window, .. } => assert_eq!(*window, TimeWindow::WithinCutoff),
            other => panic!("unexpected decision: {other:?}"),
        }

        let late = NaiveTime::from_hms_opt(9, 0, 1).unwrap();
        let decisions = pipeline.process_frame_at(&[probe], late);
        match &decisions[0] {
            FaceDecision::Known { window, .. } => assert_eq!(*window, TimeWindow::PastCutoff),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn test_bbox_is_scaled_to_full_frame() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline_with(&dir, vec![]);
        let probe = face(vec![0.0, 0.0], open_eyes());

        let decisions = pipeline.process_frame_at(&[probe], morning());
        let FaceDecision::Unknown { bbox } = &decisions[0] else {
            panic!("expected unknown");
        };
        assert_eq!(bbox.x1, 40.0);
        assert_eq!(bbox.y2, 80.0);
    }

    #[test]
    fn test_labels_follow_state() {
        let bbox = BoundingBox {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
        };
        let verified = FaceDecision::Known {
            bbox,
            name: "ALICE".into(),
            state: VerificationState::Verified,
            window: TimeWindow::WithinCutoff,
        };
        assert_eq!(verified.label(), "ALICE: VERIFIED");

        let waiting = FaceDecision::Known {
            bbox,
            name: "ALICE".into(),
            state: VerificationState::BlinkToVerify,
            window: TimeWindow::PastCutoff,
        };
        assert_eq!(waiting.label(), "ALICE: BLINK TO VERIFY");
    }

    #[test]
    fn test_empty_frame_yields_no_decisions() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline_with(&dir, vec![known("ALICE", vec![0.0, 0.0])]);
        let decisions = pipeline.process_frame_at(&[], morning());
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_degenerate_landmarks_do_not_kill_the_frame() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline_with(&dir, vec![known("ALICE", vec![0.0, 0.0])]);

        let degenerate = EyeLandmarks {
            left_eye: [(0.0, 0.0); 6],
            right_eye: [(0.0, 0.0); 6],
        };
        let probe = face(vec![0.1, 0.0], degenerate);
        let decisions = pipeline.process_frame_at(&[probe], morning());
        match &decisions[0] {
            FaceDecision::Known { state, .. } => {
                assert_eq!(*state, VerificationState::BlinkToVerify);
            }
            other => panic!("unexpected decision: {other:?}"),
        }
        assert!(pipeline.ledger().is_empty());
    }

    // Session-loop plumbing.

    struct ScriptedStream {
        frames: VecDeque<Vec<DetectedFace>>,
    }

    impl FaceStream for ScriptedStream {
        fn next_faces(&mut self) -> Option<Vec<DetectedFace>> {
            self.frames.pop_front()
        }
    }

    struct RecordingSink {
        presented: Vec<Vec<FaceDecision>>,
        quit_after: Option<usize>,
    }

    impl DecisionSink for RecordingSink {
        fn present(&mut self, decisions: &[FaceDecision]) -> ControlFlow<()> {
            self.presented.push(decisions.to_vec());
            match self.quit_after {
                Some(n) if self.presented.len() >= n => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }
        }
    }

    #[test]
    fn test_session_runs_until_stream_ends() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline_with(&dir, vec![known("ALICE", vec![0.0, 0.0])]);

        let probe = face(vec![0.1, 0.0], closed_eyes());
        let source = ScriptedStream {
            frames: VecDeque::from(vec![vec![probe.clone()], vec![], vec![probe]]),
        };
        let mut sink = RecordingSink {
            presented: Vec::new(),
            quit_after: None,
        };

        run_session(&mut pipeline, source, &mut sink);
        assert_eq!(sink.presented.len(), 3);
        assert_eq!(sink.presented[1].len(), 0);
        assert!(pipeline.ledger().is_recorded("ALICE"));
    }

    #[test]
    fn test_session_stops_on_quit_signal() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline_with(&dir, vec![]);

        let probe = face(vec![0.0, 0.0], open_eyes());
        let source = ScriptedStream {
            frames: VecDeque::from(vec![vec![probe.clone()]; 10]),
        };
        let mut sink = RecordingSink {
            presented: Vec::new(),
            quit_after: Some(2),
        };

        run_session(&mut pipeline, source, &mut sink);
        assert_eq!(sink.presented.len(), 2);
    }
}
