//! Taubin λ/μ 网格平滑.
//!
//! 每次迭代先以正系数 `lambda` 向邻居的平均位置收缩, 再以负系数 `mu` 反向膨胀,
//! 整体上是一个低通滤波, 不会像单纯的拉普拉斯平滑那样使网格持续收缩.
//! 拓扑 (三角形个数和绕序) 不变.

use super::mesh::{IndexedMesh, Mesh};
use crate::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 平滑参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SmoothParams {
    /// 迭代次数. 每次迭代包含一次收缩和一次膨胀.
    pub iterations: usize,

    /// 收缩系数, 位于 `(0, 1)`.
    pub lambda: f64,

    /// 膨胀系数, 须满足 `mu < -lambda`.
    pub mu: f64,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            iterations: 30,
            lambda: 0.5,
            mu: -0.53,
        }
    }
}

impl SmoothParams {
    /// 以默认系数迭代 `iterations` 次.
    #[inline]
    pub fn with_iterations(iterations: usize) -> Self {
        Self {
            iterations,
            ..Default::default()
        }
    }
}

/// 每个顶点的邻居下标, 已去重.
fn neighbors(mesh: &IndexedMesh) -> Vec<Vec<usize>> {
    let mut ans = vec![vec![]; mesh.vertices.len()];
    for &[a, b, c] in &mesh.faces {
        for (u, v) in [(a, b), (b, c), (c, a)] {
            ans[u].push(v);
            ans[v].push(u);
        }
    }
    for n in ans.iter_mut() {
        n.sort_unstable();
        n.dedup();
    }
    ans
}

/// 一步拉普拉斯更新: `p' = p + factor * (mean(neighbors) - p)`.
fn laplacian_step(points: &[Vec3], adjacency: &[Vec<usize>], factor: f64) -> Vec<Vec3> {
    points
        .iter()
        .zip(adjacency)
        .map(|(p, adj)| {
            if adj.is_empty() {
                return *p;
            }
            let mut mean = [0.0; 3];
            for &j in adj {
                for i in 0..3 {
                    mean[i] += points[j][i];
                }
            }
            let k = adj.len() as f64;
            [0, 1, 2].map(|i| p[i] + factor * (mean[i] / k - p[i]))
        })
        .collect()
}

impl IndexedMesh {
    /// 对顶点坐标进行 Taubin 平滑, 返回新的网格.
    pub fn smooth(&self, params: &SmoothParams) -> IndexedMesh {
        let adjacency = neighbors(self);
        let mut points = self.vertices.clone();
        for _ in 0..params.iterations {
            points = laplacian_step(&points, &adjacency, params.lambda);
            points = laplacian_step(&points, &adjacency, params.mu);
        }
        IndexedMesh {
            vertices: points,
            faces: self.faces.clone(),
        }
    }
}

impl Mesh {
    /// 先按坐标合并顶点, 再进行 Taubin 平滑, 返回新的网格.
    ///
    /// # 注意
    ///
    /// 只有坐标按位相等的顶点才会被视为同一个顶点. 由
    /// [`marching_cubes`](super::marching_cubes) 生成的网格满足这一点.
    pub fn smooth(&self, params: &SmoothParams) -> Mesh {
        if params.iterations == 0 {
            return self.clone();
        }
        log::debug!(
            "Taubin 平滑: {} 个三角形, {} 次迭代",
            self.len(),
            params.iterations
        );
        self.to_indexed().smooth(params).to_mesh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3x3 顶点的平面网格, 中心顶点被抬高到 `z = 1`.
    fn bump() -> IndexedMesh {
        let mut vertices = vec![];
        for y in 0..3 {
            for x in 0..3 {
                vertices.push([x as f64, y as f64, 0.0]);
            }
        }
        vertices[4][2] = 1.0;
        let mut faces = vec![];
        for y in 0..2 {
            for x in 0..2 {
                let i = y * 3 + x;
                faces.push([i, i + 1, i + 4]);
                faces.push([i, i + 4, i + 3]);
            }
        }
        IndexedMesh { vertices, faces }
    }

    #[test]
    fn test_neighbors() {
        let adj = neighbors(&bump());
        assert_eq!(adj[4].len(), 6);
        assert_eq!(adj[0], vec![1, 3, 4]);
    }

    #[test]
    fn test_smooth_flattens_bump() {
        let m = bump();
        let s = m.smooth(&SmoothParams::with_iterations(10));
        assert_eq!(s.faces, m.faces);
        assert!(s.vertices[4][2] < 0.75);
        assert!(s.vertices[4][2] > -0.25);
    }

    #[test]
    fn test_zero_iterations_is_identity() {
        let m = bump().to_mesh();
        assert_eq!(m.smooth(&SmoothParams::with_iterations(0)), m);
    }

    #[test]
    fn test_flat_mesh_stays_flat() {
        let mut m = bump();
        m.vertices[4][2] = 0.0;
        let s = m.smooth(&SmoothParams::default());
        assert!(s.vertices.iter().all(|p| p[2] == 0.0));
    }
}
