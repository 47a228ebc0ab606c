use tracing::{debug, info, warn};

use super::fallback::FallbackAnimator;
use super::gesture::{classify, Gesture};
use super::mapper::CoordinateMapper;
use super::orientation::{estimate_basis, WorldPose};
use super::presence::{HandMode, HandPresence, Transition};
use super::smooth::HandSmoother;
use crate::config::Config;
use crate::output::{HandPose, HandUpdate};
use crate::pose::landmark::{INDEX_MCP, MIDDLE_MCP};
use crate::pose::{DetectionFrame, HandDetection, Handedness};

/// 片手分の状態（スロット）
pub struct HandSlot {
    hand: Handedness,
    presence: HandPresence,
    smoother: HandSmoother,
}

impl HandSlot {
    fn new(hand: Handedness, config: &Config) -> Self {
        Self {
            hand,
            presence: HandPresence::new(config.hands.lost_timeout_ms),
            smoother: HandSmoother::new(config.hands.smoothing),
        }
    }

    pub fn hand(&self) -> Handedness {
        self.hand
    }

    pub fn mode(&self) -> HandMode {
        self.presence.mode()
    }

    pub fn visible(&self) -> bool {
        self.presence.visible()
    }

    pub fn last_detection_ms(&self) -> Option<u64> {
        self.presence.last_detection_ms()
    }

    /// 平滑化済みポーズ。検出もフォールバックも一度もなければ None
    pub fn pose(&self) -> Option<WorldPose> {
        self.smoother.current()
    }

    fn log_transition(&self, transition: Transition) {
        if let Transition::Changed { from, to } = transition {
            info!("{} hand: {:?} -> {:?}", self.hand.as_str(), from, to);
        }
    }
}

/// 左右2スロットを持ち、1フレーム分のパイプラインを回す
///
/// 検出フレームごとに `process_frame`、フォールバック中は `tick`。
/// どちらもスロットごとに1つずつ `HandUpdate` を返す。
pub struct HandsTracker {
    mapper: CoordinateMapper,
    animator: FallbackAnimator,
    scale: f32,
    draw_landmarks: bool,
    fallback: bool,
    slots: [HandSlot; 2],
}

impl HandsTracker {
    pub fn new(config: &Config) -> Self {
        Self {
            mapper: CoordinateMapper::from_config(&config.mapping),
            animator: FallbackAnimator::new().with_origin(config.mapping.origin),
            scale: config.hands.scale,
            draw_landmarks: config.debug.draw_landmarks,
            fallback: false,
            slots: Handedness::BOTH.map(|hand| HandSlot::new(hand, config)),
        }
    }

    pub fn slot(&self, hand: Handedness) -> &HandSlot {
        &self.slots[hand.slot()]
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// 検出器が使えないセッション。以後 `process_frame` は受け付けない
    pub fn enter_fallback(&mut self) {
        self.fallback = true;
        for slot in &mut self.slots {
            let transition = slot.presence.enter_fallback();
            slot.log_transition(transition);
        }
    }

    /// 検出フレームを1つ処理する。フォールバック中は None
    pub fn process_frame(&mut self, frame: &DetectionFrame, now_ms: u64) -> Option<[HandUpdate; 2]> {
        if self.fallback {
            return None;
        }

        let mut gestures: [Option<Gesture>; 2] = [None; 2];
        for hand in Handedness::BOTH {
            let i = hand.slot();
            // 同じ手が複数あれば最後の使えるものだけ使う
            let detection = frame.latest(hand);
            if detection.is_none() && frame.contains(hand) {
                warn!("{} hand: detection without usable wrist, skipped", hand.as_str());
            }
            gestures[i] = detection.and_then(|d| self.track(d, now_ms));
            if gestures[i].is_none() {
                let transition = self.slots[i].presence.miss(now_ms);
                self.slots[i].log_transition(transition);
            }
        }

        Some(Handedness::BOTH.map(|hand| {
            let gesture = gestures[hand.slot()];
            self.update_for(hand, gesture.is_some(), gesture)
        }))
    }

    /// フォールバックアニメーションを1ステップ進める。フォールバック中以外は None
    pub fn tick(&mut self, elapsed_ms: u64) -> Option<[HandUpdate; 2]> {
        if !self.fallback {
            return None;
        }
        let poses = self.animator.tick(elapsed_ms);
        for (slot, pose) in self.slots.iter_mut().zip(poses.iter()) {
            slot.smoother.set(pose);
        }
        Some(Handedness::BOTH.map(|hand| self.update_for(hand, false, None)))
    }

    /// 検出を反映する。手首が使えなければ None（未検出扱い）
    fn track(&mut self, detection: &HandDetection, now_ms: u64) -> Option<Gesture> {
        let hand = detection.handedness;
        let wrist = detection.wrist()?;

        if self.draw_landmarks {
            debug!("{} hand landmarks: {:?}", hand.as_str(), detection.landmarks);
        }

        let position = self.mapper.map(wrist);
        let basis = match (detection.get(INDEX_MCP), detection.get(MIDDLE_MCP)) {
            (Some(index_mcp), Some(middle_mcp)) => {
                estimate_basis(&self.mapper, wrist, index_mcp, middle_mcp)
            }
            _ => None,
        };
        if basis.is_none() {
            debug!("{} hand: degenerate orientation, keeping previous", hand.as_str());
        }

        let slot = &mut self.slots[hand.slot()];
        slot.smoother.apply(position, basis);
        let transition = slot.presence.observe(now_ms);
        slot.log_transition(transition);

        Some(classify(&detection.landmarks))
    }

    fn update_for(&self, hand: Handedness, detected: bool, gesture: Option<Gesture>) -> HandUpdate {
        let slot = self.slot(hand);
        HandUpdate {
            hand,
            mode: slot.mode(),
            visible: slot.visible(),
            detected,
            pose: slot.pose().map(|p| HandPose::from_world(&p, self.scale)),
            gesture,
        }
    }
}
