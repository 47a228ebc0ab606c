use nalgebra::{UnitQuaternion, Vector3};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::pose::Handedness;
use crate::tracker::{Gesture, HandMode, WorldPose};

/// 描画側に渡す手の位置と回転
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandPose {
    /// 位置 (x, y, z)
    pub position: [f32; 3],
    /// 回転 (クォータニオン: x, y, z, w)
    pub rotation: [f32; 4],
    /// 手モデルのスケール
    pub scale: f32,
}

impl HandPose {
    pub fn new(position: [f32; 3], rotation: [f32; 4], scale: f32) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// 原点、回転なし
    pub fn identity() -> Self {
        Self::new([0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0], 1.0)
    }

    pub fn from_world(pose: &WorldPose, scale: f32) -> Self {
        let q = pose.basis.to_rotation();
        Self::new(
            [pose.position.x, pose.position.y, pose.position.z],
            [q.i, q.j, q.k, q.w],
            scale,
        )
    }

    /// YXZ順のオイラー角（度）。シーングラフの rotation 属性向け
    pub fn euler_degrees(&self) -> [f32; 3] {
        let [x, y, z, w] = self.rotation;
        let q = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(w, x, y, z));
        let m = q.to_rotation_matrix();
        let m = m.matrix();

        // three.js の Euler 'YXZ' と同じ分解
        let m23 = m[(1, 2)].clamp(-1.0, 1.0);
        let rx = (-m23).asin();
        let (ry, rz) = if m23.abs() < 0.999_999 {
            (m[(0, 2)].atan2(m[(2, 2)]), m[(1, 0)].atan2(m[(1, 1)]))
        } else {
            ((-m[(2, 0)]).atan2(m[(0, 0)]), 0.0)
        };
        [rx.to_degrees(), ry.to_degrees(), rz.to_degrees()]
    }

    pub fn position_vector(&self) -> Vector3<f32> {
        Vector3::from(self.position)
    }
}

/// 1スロット・1フレーム分の出力
#[derive(Debug, Clone, PartialEq)]
pub struct HandUpdate {
    pub hand: Handedness,
    pub mode: HandMode,
    pub visible: bool,
    /// このフレームで実際に検出されたか（状態表示用）
    pub detected: bool,
    /// 一度も観測していないスロットでは None
    pub pose: Option<HandPose>,
    /// このフレームで検出された場合のみ
    pub gesture: Option<Gesture>,
}

impl HandUpdate {
    /// 非表示にするだけの更新（セッション停止時）
    pub fn hidden(hand: Handedness) -> Self {
        Self {
            hand,
            mode: HandMode::Lost,
            visible: false,
            detected: false,
            pose: None,
            gesture: None,
        }
    }
}

/// 手スロットの出力先（描画側）
pub trait HandSink: Send {
    fn apply(&mut self, update: &HandUpdate);
}

impl<F> HandSink for F
where
    F: FnMut(&HandUpdate) + Send,
{
    fn apply(&mut self, update: &HandUpdate) {
        self(update)
    }
}

/// 非同期の描画タスクへ送るシンク。受信側が詰まっていれば捨てる
pub struct ChannelSink {
    tx: mpsc::Sender<HandUpdate>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<HandUpdate>) -> Self {
        Self { tx }
    }
}

impl HandSink for ChannelSink {
    fn apply(&mut self, update: &HandUpdate) {
        if self.tx.try_send(update.clone()).is_err() {
            debug!("{} hand update dropped: receiver full or closed", update.hand.as_str());
        }
    }
}

/// ログに出すだけのシンク
///
/// 表示状態が変わったときは info、それ以外は debug。
pub struct LogSink {
    last_visible: Option<bool>,
}

impl LogSink {
    pub fn new() -> Self {
        Self { last_visible: None }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl HandSink for LogSink {
    fn apply(&mut self, update: &HandUpdate) {
        let hand = update.hand.as_str();
        if self.last_visible != Some(update.visible) {
            info!(
                "{} hand: {} ({:?})",
                hand,
                if update.visible { "visible" } else { "hidden" },
                update.mode
            );
            self.last_visible = Some(update.visible);
        }
        if let Some(pose) = &update.pose {
            debug!(
                "{} hand: [{:.2}, {:.2}, {:.2}] detected={} gesture={}",
                hand,
                pose.position[0],
                pose.position[1],
                pose.position[2],
                update.detected,
                update.gesture.map_or("-", Gesture::as_str)
            );
        }
    }
}
