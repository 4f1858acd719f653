//! 单元立方体的拓扑情形表.
//!
//! 8 个角点的偏移以 `(x, y, z)` 即 `(w, h, z)` 顺序给出:
//!
//! ```text
//!        7 ---- 6
//!       /|     /|         z
//!      4 ---- 5 |         |  y
//!      | 3 ---|-2         | /
//!      |/     |/          |/
//!      0 ---- 1           +---- x
//! ```
//!
//! 每条棱总是从坐标较小的角点指向坐标较大的角点, 因此相邻立方体共享的棱
//! 在两边算出的交点完全一致.
//!
//! 角点值 `>= iso` 即为"高于" (`above`). 情形表不是手写的, 而是在第一次使用时
//! 由面的拓扑生成: 沿着每个面 (从外侧看逆时针) 行走, 每一段连续的高于角点
//! 贡献一条从入口棱到出口棱的线段. 对角歧义的面上, 高于的两个角点因此被分开.
//! 相邻立方体看到的同一个面顺序相反, 得到的线段也相同但方向相反,
//! 整个网格因此是闭合且定向一致的, 法向指向低值一侧.

use once_cell::sync::Lazy;

/// 角点偏移 `[x, y, z]`.
pub(super) const CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

/// 棱的两个端点 `(lo, hi)`.
pub(super) const EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (3, 2),
    (0, 3),
    (4, 5),
    (5, 6),
    (7, 6),
    (4, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// 每条棱所沿的坐标轴, `0, 1, 2` 分别为 `x, y, z`.
pub(super) const EDGE_AXIS: [usize; 12] = [0, 1, 0, 1, 0, 1, 0, 1, 2, 2, 2, 2];

/// 六个面的角点, 从外侧看为逆时针.
const FACES: [[usize; 4]; 6] = [
    [0, 3, 2, 1],
    [4, 5, 6, 7],
    [0, 1, 5, 4],
    [3, 7, 6, 2],
    [0, 4, 7, 3],
    [1, 2, 6, 5],
];

/// 一个立方体内的交线多边形.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Polygon {
    /// 顶点所在的棱. 按此顺序的右手法向指向低值一侧.
    pub edges: Vec<u8>,

    /// 为 `true` 时以 `edges[0]` 为公共顶点扇形三角化;
    /// 否则以多边形顶点的重心为公共顶点.
    pub fan: bool,
}

impl Polygon {
    fn new(mut edges: Vec<u8>) -> Self {
        let n = edges.len();
        // 扇形的对角线不能落在立方体的面上, 否则会与相邻立方体的三角形重叠.
        let apex = (0..n).find(|&k| {
            (2..n - 1).all(|d| !share_face(edges[k], edges[(k + d) % n]))
        });
        match apex {
            Some(k) => {
                edges.rotate_left(k);
                Self { edges, fan: true }
            }
            None => Self { edges, fan: false },
        }
    }

    /// 三角形个数.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        if self.fan {
            self.edges.len() - 2
        } else {
            self.edges.len()
        }
    }
}

/// 全部 256 种情形, 以角点位掩码为下标.
pub(super) static CASES: Lazy<[Vec<Polygon>; 256]> =
    Lazy::new(|| std::array::from_fn(|case| polygons(case as u8)));

/// 连接角点 `a` 和 `b` 的棱.
fn edge_between(a: usize, b: usize) -> usize {
    match EDGES
        .iter()
        .position(|&(lo, hi)| (lo, hi) == (a, b) || (lo, hi) == (b, a))
    {
        Some(e) => e,
        None => unreachable!("角点 {a} 与 {b} 不相邻"),
    }
}

/// 两条棱是否位于同一个面上?
fn share_face(a: u8, b: u8) -> bool {
    let (a0, a1) = EDGES[a as usize];
    let (b0, b1) = EDGES[b as usize];
    FACES
        .iter()
        .any(|f| [a0, a1, b0, b1].iter().all(|c| f.contains(c)))
}

fn polygons(case: u8) -> Vec<Polygon> {
    let above = |c: usize| (case >> c) & 1 == 1;

    // next[entry] = exit.
    let mut next = [None; 12];
    for face in FACES {
        for i in 0..4 {
            let (prev, cur) = (face[(i + 3) % 4], face[i]);
            if !above(cur) || above(prev) {
                continue;
            }
            let mut j = i;
            while above(face[(j + 1) % 4]) {
                j = (j + 1) % 4;
            }
            let entry = edge_between(prev, cur);
            let exit = edge_between(face[j], face[(j + 1) % 4]);
            debug_assert!(next[entry].is_none());
            next[entry] = Some(exit);
        }
    }

    let mut seen = [false; 12];
    let mut ans = vec![];
    for start in 0..12 {
        if seen[start] || next[start].is_none() {
            continue;
        }
        let mut edges = vec![];
        let mut cur = start;
        loop {
            seen[cur] = true;
            edges.push(cur as u8);
            cur = match next[cur] {
                Some(e) => e,
                None => unreachable!("情形 {case:#010b} 的交线不闭合"),
            };
            if cur == start {
                break;
            }
        }
        ans.push(Polygon::new(edges));
    }
    ans
}
