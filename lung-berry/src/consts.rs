//! 通用常量.

/// CT HU 值相关常量.
pub mod hu {
    /// 扫描范围外 (圆形视野之外) 的原始哨兵值. 标定前会被置为 0.
    pub const OUT_OF_SCAN: i16 = -2000;

    /// 空气与软组织的分界. 不小于该值的体素被视为致密组织.
    pub const AIR_TISSUE_THRESHOLD: f32 = -700.0;

    /// 肺表面网格的默认等值面.
    pub const LUNG_SURFACE_ISO: f32 = -500.0;

    /// 掩膜外体素在被遮蔽的扫描中所取的 HU 值.
    pub const MASKED_OUT: f32 = 0.0;
}

/// 分割过程中体素的类别取值.
pub mod class {
    /// 空气 / 肺内部候选.
    pub const AIR: u8 = 0;

    /// 致密组织.
    pub const TISSUE: u8 = 1;

    /// 与 `(0, 0, 0)` 连通的体外区域.
    pub const EXTERIOR: u8 = 2;

    /// 体素是否是空气 (肺内部候选)?
    #[inline]
    pub const fn is_air(p: u8) -> bool {
        matches!(p, AIR)
    }

    /// 体素是否不是空气? 组织和体外区域在后续阶段被视为同一类别.
    #[inline]
    pub const fn is_non_air(p: u8) -> bool {
        matches!(p, TISSUE | EXTERIOR)
    }
}

/// 二值掩膜取值.
pub mod mask {
    /// 背景.
    pub const BACKGROUND: u8 = 0;

    /// 肺.
    pub const LUNG: u8 = 1;
}

/// 连通域标记中预留给背景类别的标签.
pub const BACKGROUND_LABEL: u32 = 0;
