use nalgebra::{UnitQuaternion, Vector3};
use std::f32::consts::PI;

use super::orientation::{HandBasis, WorldPose};
use crate::pose::Handedness;

/// 経過ミリ秒 → アニメーション位相
const TIME_SCALE: f32 = 0.002;
const CENTER_X: f32 = 0.5;
const CENTER_Y: f32 = 1.2;
const CENTER_Z: f32 = -0.5;
const AMPLITUDE_X: f32 = 0.3;
const AMPLITUDE_Y: f32 = 0.2;
const AMPLITUDE_Z: f32 = 0.2;
const YAW_AMPLITUDE_DEG: f32 = 30.0;

/// 検出器が使えないときの待機アニメーション
///
/// 経過時間だけの関数。左右は位相をπずらして対称な動きを避ける。
#[derive(Debug, Clone)]
pub struct FallbackAnimator {
    origin: Vector3<f32>,
}

impl FallbackAnimator {
    pub fn new() -> Self {
        Self {
            origin: Vector3::zeros(),
        }
    }

    /// 座標変換と同じ基準点を足す
    pub fn with_origin(mut self, origin: [f32; 3]) -> Self {
        self.origin = Vector3::from(origin);
        self
    }

    pub fn pose(&self, hand: Handedness, elapsed_ms: u64) -> WorldPose {
        let t = elapsed_ms as f32 * TIME_SCALE;
        let (side, phase) = match hand {
            Handedness::Left => (-1.0, 0.0),
            Handedness::Right => (1.0, PI),
        };

        let position = Vector3::new(
            side * CENTER_X + (t + phase).sin() * AMPLITUDE_X,
            CENTER_Y + (t * 1.5 + phase).cos() * AMPLITUDE_Y,
            CENTER_Z + (t * 0.8 + phase).sin() * AMPLITUDE_Z,
        ) + self.origin;

        let yaw = ((t * 0.7 + phase).sin() * YAW_AMPLITUDE_DEG).to_radians();
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw);

        WorldPose::new(position, HandBasis::from_rotation(&rotation))
    }

    /// 左右スロット分
    pub fn tick(&self, elapsed_ms: u64) -> [WorldPose; 2] {
        Handedness::BOTH.map(|hand| self.pose(hand, elapsed_ms))
    }
}

impl Default for FallbackAnimator {
    fn default() -> Self {
        Self::new()
    }
}
