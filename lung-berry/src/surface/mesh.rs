use std::collections::HashMap;

use crate::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 三角形, 三个顶点的物理坐标 `[x, y, z]` (毫米).
pub type Triangle = [Vec3; 3];

#[inline]
pub(crate) fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub(crate) fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub(crate) fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub(crate) fn norm(a: Vec3) -> f64 {
    dot(a, a).sqrt()
}

/// 三角形的 (未归一化) 法向, 模长为面积的两倍.
#[inline]
fn face_normal([a, b, c]: &Triangle) -> Vec3 {
    cross(sub(*b, *a), sub(*c, *a))
}

/// 三角网格 (polygon soup). 三角形之间没有顺序要求,
/// 每个三角形的顶点按右手法则给出法向. 由 [`marching_cubes`](super::marching_cubes)
/// 得到的网格, 法向指向标量值较低的一侧.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mesh {
    triangles: Vec<Triangle>,
}

impl From<Vec<Triangle>> for Mesh {
    #[inline]
    fn from(triangles: Vec<Triangle>) -> Self {
        Self { triangles }
    }
}

impl Mesh {
    /// 空网格.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 三角形个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// 网格是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// 全部三角形.
    #[inline]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_triangles(self) -> Vec<Triangle> {
        self.triangles
    }

    /// 追加一个三角形.
    #[inline]
    pub fn push(&mut self, t: Triangle) {
        self.triangles.push(t);
    }

    /// 将 `other` 的三角形全部追加到末尾.
    #[inline]
    pub fn append(&mut self, other: &mut Mesh) {
        self.triangles.append(&mut other.triangles);
    }

    /// 翻转每个三角形的绕序, 即翻转全部法向.
    pub fn flip(&mut self) {
        for t in self.triangles.iter_mut() {
            t.swap(1, 2);
        }
    }

    /// 有向体积 (立方毫米). 对闭合网格, 法向朝外时为正, 朝内时为负.
    pub fn signed_volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|[a, b, c]| dot(*a, cross(*b, *c)))
            .sum::<f64>()
            / 6.0
    }

    /// 表面积 (平方毫米).
    pub fn area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| norm(face_normal(t)) / 2.0)
            .sum()
    }

    /// 每个三角形的单位法向. 退化三角形的法向为零向量.
    pub fn normals(&self) -> Vec<Vec3> {
        self.triangles
            .iter()
            .map(|t| {
                let n = face_normal(t);
                let l = norm(n);
                if l > 0.0 {
                    n.map(|x| x / l)
                } else {
                    [0.0; 3]
                }
            })
            .collect()
    }

    /// 包围盒 `(min, max)`. 空网格返回 `None`.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut it = self.triangles.iter().flatten();
        let first = *it.next()?;
        Some(it.fold((first, first), |(lo, hi), p| {
            (
                [0, 1, 2].map(|i| lo[i].min(p[i])),
                [0, 1, 2].map(|i| hi[i].max(p[i])),
            )
        }))
    }

    /// 合并坐标完全相同 (按位相等) 的顶点, 得到索引网格.
    ///
    /// 顶点按首次出现的顺序编号, 三角形顺序与顶点绕序保持不变.
    pub fn to_indexed(&self) -> IndexedMesh {
        let mut index = HashMap::with_capacity(self.triangles.len() / 2 + 1);
        let mut vertices = Vec::with_capacity(self.triangles.len() / 2 + 1);
        let faces = self
            .triangles
            .iter()
            .map(|t| {
                t.map(|p| {
                    *index.entry(p.map(f64::to_bits)).or_insert_with(|| {
                        vertices.push(p);
                        vertices.len() - 1
                    })
                })
            })
            .collect();
        IndexedMesh { vertices, faces }
    }
}

/// 顶点共享的索引网格.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexedMesh {
    /// 顶点坐标.
    pub vertices: Vec<Vec3>,

    /// 三角形的三个顶点下标.
    pub faces: Vec<[usize; 3]>,
}

impl IndexedMesh {
    /// 展开为 polygon soup.
    pub fn to_mesh(&self) -> Mesh {
        self.faces
            .iter()
            .map(|f| f.map(|i| self.vertices[i]))
            .collect::<Vec<_>>()
            .into()
    }

    /// 无向边个数.
    pub fn edge_count(&self) -> usize {
        let mut edges: Vec<(usize, usize)> = self
            .faces
            .iter()
            .flat_map(|&[a, b, c]| [(a, b), (b, c), (c, a)])
            .map(|(a, b)| (a.min(b), a.max(b)))
            .collect();
        edges.sort_unstable();
        edges.dedup();
        edges.len()
    }

    /// 网格是否闭合且定向一致, 即每条有向边恰好出现一次, 且其反向边也恰好出现一次.
    pub fn is_closed(&self) -> bool {
        let mut directed: HashMap<(usize, usize), usize> = HashMap::new();
        for &[a, b, c] in &self.faces {
            for e in [(a, b), (b, c), (c, a)] {
                *directed.entry(e).or_default() += 1;
            }
        }
        directed
            .iter()
            .all(|(&(a, b), &n)| n == 1 && directed.get(&(b, a)) == Some(&1))
    }

    /// 欧拉示性数 `V - E + F`.
    pub fn euler_characteristic(&self) -> i64 {
        self.vertices.len() as i64 - self.edge_count() as i64 + self.faces.len() as i64
    }
}
