use nalgebra::Vector3;

use crate::config::MappingConfig;
use crate::pose::Landmark;

/// 検出器の正規化座標 → ワールド座標変換
///
/// - X: ミラー反転（ユーザー向きカメラで鏡のように動かす）
/// - Y: 上下反転（画像Yは下向き、ワールドYは上向き）
/// - Z: 相対深度をスケールしてオフセット
///
/// クランプはしない。範囲外の値も同じアフィン変換を通す。
#[derive(Debug, Clone)]
pub struct CoordinateMapper {
    x_scale: f32,
    y_scale: f32,
    z_offset: f32,
    z_depth_scale: f32,
    origin: Vector3<f32>,
}

impl CoordinateMapper {
    pub fn new(x_scale: f32, y_scale: f32, z_offset: f32, z_depth_scale: f32) -> Self {
        Self {
            x_scale,
            y_scale,
            z_offset,
            z_depth_scale,
            origin: Vector3::zeros(),
        }
    }

    pub fn from_config(config: &MappingConfig) -> Self {
        Self::new(
            config.x_scale,
            config.y_scale,
            config.z_offset,
            config.z_depth_scale,
        )
        .with_origin(config.origin)
    }

    /// 全位置に加算する基準点（カメラ位置など）
    pub fn with_origin(mut self, origin: [f32; 3]) -> Self {
        self.origin = Vector3::from(origin);
        self
    }

    pub fn map(&self, landmark: &Landmark) -> Vector3<f32> {
        let x = (0.5 - landmark.x) * self.x_scale;
        let y = (1.0 - landmark.y) * self.y_scale;
        let z = self.z_offset + landmark.z * self.z_depth_scale;
        Vector3::new(x, y, z) + self.origin
    }
}

impl Default for CoordinateMapper {
    fn default() -> Self {
        Self::from_config(&MappingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_center_wrist() {
        let mapper = CoordinateMapper::default();
        let p = mapper.map(&Landmark::new(0.5, 0.5, 0.0));
        assert_relative_eq!(p, Vector3::new(0.0, 1.0, -0.5), epsilon = 1e-6);
    }

    #[test]
    fn test_mirror_x() {
        let mapper = CoordinateMapper::default();
        // 画像の左側はワールドの右側
        let p = mapper.map(&Landmark::new(0.0, 0.5, 0.0));
        assert_relative_eq!(p.x, 1.5, epsilon = 1e-6);
        let p = mapper.map(&Landmark::new(1.0, 0.5, 0.0));
        assert_relative_eq!(p.x, -1.5, epsilon = 1e-6);
    }

    #[test]
    fn test_flip_y() {
        let mapper = CoordinateMapper::default();
        assert_relative_eq!(mapper.map(&Landmark::new(0.5, 0.0, 0.0)).y, 2.0, epsilon = 1e-6);
        assert_relative_eq!(mapper.map(&Landmark::new(0.5, 1.0, 0.0)).y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_depth_closer_moves_forward() {
        let mapper = CoordinateMapper::default();
        // 検出器の負のzはカメラに近い → ワールドでは奥方向(-z)から手前へ
        let near = mapper.map(&Landmark::new(0.5, 0.5, -0.2));
        assert_relative_eq!(near.z, -0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_out_of_range_not_clamped() {
        let mapper = CoordinateMapper::default();
        let p = mapper.map(&Landmark::new(1.5, -0.5, 0.0));
        assert_relative_eq!(p.x, -3.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_deterministic() {
        let mapper = CoordinateMapper::default();
        let lm = Landmark::new(0.31, 0.77, -0.05);
        assert_eq!(mapper.map(&lm), mapper.map(&lm));
    }

    #[test]
    fn test_origin_offset() {
        let mapper = CoordinateMapper::new(3.0, 2.0, -0.5, -1.0).with_origin([0.0, 1.6, 0.0]);
        let p = mapper.map(&Landmark::new(0.5, 0.5, 0.0));
        assert_relative_eq!(p, Vector3::new(0.0, 2.6, -0.5), epsilon = 1e-6);
    }
}
