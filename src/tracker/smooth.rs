use nalgebra::{UnitQuaternion, Vector3};

use super::orientation::{HandBasis, WorldPose};

/// EMAベースの手ポーズ平滑化フィルタ
///
/// 位置: 成分ごとのEMA
/// 回転: NLERP (Normalized Linear Interpolation)
///
/// `smoothing` は慣性の強さ。新しい値の重みは `1 - smoothing`。
pub struct HandSmoother {
    smoothing: f32,
    position: Option<Vector3<f32>>,
    rotation: Option<UnitQuaternion<f32>>,
}

impl HandSmoother {
    /// `smoothing` は [0, 1)。範囲チェックは設定検証側で行う
    pub fn new(smoothing: f32) -> Self {
        Self {
            smoothing,
            position: None,
            rotation: None,
        }
    }

    /// 縮退フレーム (`basis == None`) では回転を更新せず前回値を保持する
    pub fn apply(&mut self, position: Vector3<f32>, basis: Option<HandBasis>) -> WorldPose {
        let alpha = 1.0 - self.smoothing;

        let smoothed_position = match self.position {
            Some(prev) => prev.lerp(&position, alpha),
            None => position,
        };
        self.position = Some(smoothed_position);

        if let Some(basis) = basis {
            let target = basis.to_rotation();
            let rotation = match self.rotation {
                Some(prev) => nlerp_shortest(&prev, &target, alpha),
                None => target,
            };
            self.rotation = Some(rotation);
        }

        self.current_or_identity(smoothed_position)
    }

    /// フィルタを通さずに値を設定する（フォールバックアニメーション用）
    pub fn set(&mut self, pose: &WorldPose) {
        self.position = Some(pose.position);
        self.rotation = Some(pose.basis.to_rotation());
    }

    /// 現在の平滑化済みポーズ。一度も観測していなければ None
    pub fn current(&self) -> Option<WorldPose> {
        self.position.map(|p| self.current_or_identity(p))
    }

    pub fn reset(&mut self) {
        self.position = None;
        self.rotation = None;
    }

    fn current_or_identity(&self, position: Vector3<f32>) -> WorldPose {
        let basis = self
            .rotation
            .as_ref()
            .map(HandBasis::from_rotation)
            .unwrap_or_default();
        WorldPose::new(position, basis)
    }
}

fn nlerp_shortest(
    prev: &UnitQuaternion<f32>,
    target: &UnitQuaternion<f32>,
    t: f32,
) -> UnitQuaternion<f32> {
    // shortest path: dot < 0 なら target を反転
    let target = if prev.coords.dot(&target.coords) < 0.0 {
        UnitQuaternion::new_unchecked(-target.into_inner())
    } else {
        *target
    };
    prev.nlerp(&target, t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn yaw(angle: f32) -> HandBasis {
        HandBasis::from_rotation(&UnitQuaternion::from_euler_angles(0.0, angle, 0.0))
    }

    fn same_rotation(a: &HandBasis, b: &HandBasis) -> bool {
        a.to_rotation().coords.dot(&b.to_rotation().coords).abs() > 1.0 - 1e-5
    }

    #[test]
    fn test_first_frame_passthrough() {
        let mut s = HandSmoother::new(0.8);
        let p = Vector3::new(1.0, 2.0, 3.0);
        let result = s.apply(p, Some(yaw(0.5)));
        assert_eq!(result.position, p);
        assert!(same_rotation(&result.basis, &yaw(0.5)));
    }

    #[test]
    fn test_no_smoothing() {
        let mut s = HandSmoother::new(0.0);
        s.apply(Vector3::zeros(), Some(yaw(0.0)));
        let result = s.apply(Vector3::new(1.0, 2.0, 3.0), Some(yaw(1.0)));
        assert_relative_eq!(result.position, Vector3::new(1.0, 2.0, 3.0), epsilon = 1e-6);
        assert!(same_rotation(&result.basis, &yaw(1.0)));
    }

    #[test]
    fn test_position_smoothing() {
        let mut s = HandSmoother::new(0.5);
        s.apply(Vector3::zeros(), None);
        let result = s.apply(Vector3::new(2.0, 4.0, 6.0), None);
        assert_relative_eq!(result.position, Vector3::new(1.0, 2.0, 3.0), epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_nlerp() {
        let mut s = HandSmoother::new(0.5);
        s.apply(Vector3::zeros(), Some(HandBasis::identity()));
        let result = s.apply(Vector3::zeros(), Some(yaw(std::f32::consts::FRAC_PI_2)));

        // NLERP alpha=0.5 で 90度の半分 = 45度
        let angle = result.basis.to_rotation().angle();
        assert_relative_eq!(angle, std::f32::consts::FRAC_PI_4, epsilon = 1e-4);
    }

    #[test]
    fn test_degenerate_keeps_previous_rotation() {
        let mut s = HandSmoother::new(0.3);
        s.apply(Vector3::zeros(), Some(yaw(0.7)));
        let before = s.current().unwrap().basis;
        let result = s.apply(Vector3::new(1.0, 0.0, 0.0), None);
        assert_eq!(result.basis, before);
    }

    #[test]
    fn test_degenerate_first_frame_identity_basis() {
        let mut s = HandSmoother::new(0.3);
        let result = s.apply(Vector3::new(1.0, 1.0, 1.0), None);
        assert_eq!(result.basis, HandBasis::identity());
        // 以降の最初の有効な向きは補間せずそのまま採用
        let result = s.apply(Vector3::new(1.0, 1.0, 1.0), Some(yaw(1.2)));
        assert!(same_rotation(&result.basis, &yaw(1.2)));
    }

    #[test]
    fn test_higher_smoothing_moves_less() {
        let inputs = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.5, 0.0),
            Vector3::new(-0.5, 1.0, 0.2),
            Vector3::new(0.8, -0.3, 0.1),
        ];
        let mut low = HandSmoother::new(0.2);
        let mut high = HandSmoother::new(0.9);
        let mut prev_low = low.apply(inputs[0], None).position;
        let mut prev_high = high.apply(inputs[0], None).position;
        for &input in &inputs[1..] {
            let l = low.apply(input, None).position;
            let h = high.apply(input, None).position;
            assert!((h - prev_high).norm() < (l - prev_low).norm());
            prev_low = l;
            prev_high = h;
        }
    }

    #[test]
    fn test_constant_input_converges_without_overshoot() {
        let mut s = HandSmoother::new(0.8);
        s.apply(Vector3::zeros(), Some(HandBasis::identity()));
        let target = Vector3::new(1.0, 2.0, -0.5);
        let target_basis = yaw(1.0);
        let mut prev_distance = f32::MAX;
        for _ in 0..100 {
            let result = s.apply(target, Some(target_basis));
            let distance = (result.position - target).norm();
            assert!(distance <= prev_distance + 1e-6);
            // 各成分が目標を越えない
            assert!(result.position.x <= target.x + 1e-6);
            assert!(result.position.y <= target.y + 1e-6);
            assert!(result.position.z >= target.z - 1e-6);
            prev_distance = distance;
        }
        let result = s.current().unwrap();
        assert_relative_eq!(result.position, target, epsilon = 1e-4);
        assert!(same_rotation(&result.basis, &target_basis));
    }

    #[test]
    fn test_reset() {
        let mut s = HandSmoother::new(0.9);
        s.apply(Vector3::new(1.0, 2.0, 3.0), None);
        s.reset();
        assert!(s.current().is_none());
        let p = Vector3::new(4.0, 5.0, 6.0);
        assert_eq!(s.apply(p, None).position, p);
    }

    #[test]
    fn test_set_overrides() {
        let mut s = HandSmoother::new(0.9);
        s.apply(Vector3::zeros(), None);
        let pose = WorldPose::new(Vector3::new(0.5, 1.2, -0.5), yaw(0.4));
        s.set(&pose);
        let current = s.current().unwrap();
        assert_eq!(current.position, pose.position);
    }
}
