//! 扁平索引空间上的泛洪标记.
//!
//! 所有体素按照行优先规则映射到同一个一维缓冲区, 连通域以整数标签标识.
//! 使用显式的 BFS 队列, 不存在递归深度问题.

use std::collections::VecDeque;

/// 三维偏移 `(dz, dh, dw)`.
pub(super) type Offset = (isize, isize, isize);

/// 扁平缓冲区上的泛洪标记器.
pub(super) struct Flood<'a, T> {
    /// 行优先的类别数据.
    data: &'a [T],

    /// `(z, h, w)`.
    shape: [usize; 3],

    /// 邻接偏移集合.
    offsets: &'a [Offset],

    /// 该类别的体素被标记为 0, 不参与连通.
    background: Option<T>,
}

impl<'a, T: Copy + PartialEq> Flood<'a, T> {
    #[inline]
    pub fn new(
        data: &'a [T],
        shape: [usize; 3],
        offsets: &'a [Offset],
        background: Option<T>,
    ) -> Self {
        debug_assert_eq!(data.len(), shape.iter().product::<usize>());
        Self {
            data,
            shape,
            offsets,
            background,
        }
    }

    /// 扁平索引 -> `(z, h, w)`.
    #[inline]
    fn unflatten(&self, i: usize) -> [usize; 3] {
        let [_, h, w] = self.shape;
        [i / (h * w), (i / w) % h, i % w]
    }

    /// `(z, h, w) + offset`, 越界时返回 `None`.
    #[inline]
    fn step(&self, [z, h, w]: [usize; 3], (dz, dh, dw): Offset) -> Option<usize> {
        let [lz, lh, lw] = self.shape;
        let z = z.checked_add_signed(dz).filter(|&v| v < lz)?;
        let h = h.checked_add_signed(dh).filter(|&v| v < lh)?;
        let w = w.checked_add_signed(dw).filter(|&v| v < lw)?;
        Some((z * lh + h) * lw + w)
    }

    #[inline]
    fn is_background(&self, v: T) -> bool {
        self.background.is_some_and(|b| b == v)
    }

    /// 执行标记, 返回每个体素的标签和标签总数 (不含 0).
    ///
    /// 标签按照每个连通域第一个体素的行优先顺序, 从 1 开始连续编号.
    pub fn run(self) -> (Vec<u32>, u32) {
        const UNVISITED: u32 = u32::MAX;

        let mut labels = vec![UNVISITED; self.data.len()];
        let mut queue = VecDeque::with_capacity(64);
        let mut next = 0u32;

        for seed in 0..self.data.len() {
            if labels[seed] != UNVISITED {
                continue;
            }
            let class = self.data[seed];
            if self.is_background(class) {
                labels[seed] = 0;
                continue;
            }

            next += 1;
            labels[seed] = next;
            queue.push_back(seed);
            while let Some(cur) = queue.pop_front() {
                let pos = self.unflatten(cur);
                for &off in self.offsets {
                    let Some(n) = self.step(pos, off) else {
                        continue;
                    };
                    if labels[n] == UNVISITED && self.data[n] == class {
                        labels[n] = next;
                        queue.push_back(n);
                    }
                }
            }
        }
        debug_assert!(labels.iter().all(|&l| l != UNVISITED));
        (labels, next)
    }
}

#[cfg(test)]
mod tests {
    use super::Flood;

    const N4: [(isize, isize, isize); 4] = [(0, -1, 0), (0, 1, 0), (0, 0, -1), (0, 0, 1)];

    #[test]
    fn test_flood_raster_order() {
        #[rustfmt::skip]
        let data = [
            1, 0, 1,
            1, 0, 1,
            0, 0, 1,
        ];
        let (labels, n) = Flood::new(&data, [1, 3, 3], &N4, Some(0)).run();
        assert_eq!(n, 2);
        assert_eq!(labels, vec![1, 0, 2, 1, 0, 2, 0, 0, 2]);
    }

    #[test]
    fn test_flood_without_background() {
        let data = [1u8, 0, 1];
        let (labels, n) = Flood::new(&data, [1, 1, 3], &N4, None).run();
        assert_eq!(n, 3);
        assert_eq!(labels, vec![1, 2, 3]);
    }
}
