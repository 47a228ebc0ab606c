use nalgebra::{Rotation3, UnitQuaternion, Vector3};

use super::mapper::CoordinateMapper;
use crate::pose::Landmark;

/// これ未満の長さのベクトルは方向として扱わない
const MIN_AXIS_LENGTH: f32 = 1e-5;

/// 手の正規直交基底 (right, up, forward)。右手系
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandBasis {
    pub right: Vector3<f32>,
    pub up: Vector3<f32>,
    pub forward: Vector3<f32>,
}

impl HandBasis {
    pub fn identity() -> Self {
        Self {
            right: Vector3::x(),
            up: Vector3::y(),
            forward: Vector3::z(),
        }
    }

    pub fn from_rotation(rotation: &UnitQuaternion<f32>) -> Self {
        Self {
            right: rotation * Vector3::x(),
            up: rotation * Vector3::y(),
            forward: rotation * Vector3::z(),
        }
    }

    /// 列ベクトル (right, up, forward) の回転行列としてのクォータニオン
    pub fn to_rotation(&self) -> UnitQuaternion<f32> {
        let matrix = Rotation3::from_basis_unchecked(&[self.right, self.up, self.forward]);
        UnitQuaternion::from_rotation_matrix(&matrix)
    }
}

impl Default for HandBasis {
    fn default() -> Self {
        Self::identity()
    }
}

/// ワールド座標での手の位置と向き
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPose {
    pub position: Vector3<f32>,
    pub basis: HandBasis,
}

impl WorldPose {
    pub fn new(position: Vector3<f32>, basis: HandBasis) -> Self {
        Self { position, basis }
    }
}

/// 手首・人差し指MCP・中指MCP から手の向きを推定する
///
/// forward = 手首→中指MCP, right = 手首→人差し指MCP, up = forward × right。
/// right は up × forward で直交化し直す。
/// 点が重なる・一直線上にある場合は None（縮退）。
pub fn estimate_basis(
    mapper: &CoordinateMapper,
    wrist: &Landmark,
    index_mcp: &Landmark,
    middle_mcp: &Landmark,
) -> Option<HandBasis> {
    if !(wrist.is_finite() && index_mcp.is_finite() && middle_mcp.is_finite()) {
        return None;
    }

    let w = mapper.map(wrist);
    let forward = normalized(mapper.map(middle_mcp) - w)?;
    let toward_index = normalized(mapper.map(index_mcp) - w)?;
    let up = normalized(forward.cross(&toward_index))?;
    let right = up.cross(&forward);

    Some(HandBasis { right, up, forward })
}

fn normalized(v: Vector3<f32>) -> Option<Vector3<f32>> {
    let len = v.norm();
    if len.is_finite() && len > MIN_AXIS_LENGTH {
        Some(v / len)
    } else {
        None
    }
}
