//! Fixed-point congestion windows.
//! 定点数表示的拥塞窗口。

/// Number of fractional bits in a scaled window.
pub const WIN_SCALE_SHIFT: u32 = 10;

/// One packet, in scaled-window units.
pub const WIN_SCALE: u32 = 1 << WIN_SCALE_SHIFT;

/// The smallest value a scaled window may take: two packets.
pub const MIN_SCALED_WINDOW: u32 = 2 << WIN_SCALE_SHIFT;

/// A congestion window counted in 1/1024 packet units.
///
/// Every mutation goes through [`grow`](Self::grow) or
/// [`shrink`](Self::shrink), which keep the value at or above
/// [`MIN_SCALED_WINDOW`].
///
/// 以 1/1024 包为单位计数的拥塞窗口。所有修改都经由 `grow` 或 `shrink`，
/// 保证其值不低于 `MIN_SCALED_WINDOW`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScaledWindow(u32);

impl ScaledWindow {
    pub fn from_packets(packets: u32) -> Self {
        Self(packets.saturating_mul(WIN_SCALE).max(MIN_SCALED_WINDOW))
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(raw.max(MIN_SCALED_WINDOW))
    }

    /// The window in scaled units.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// The window in whole packets, rounded down.
    pub fn packets(self) -> u32 {
        self.0 >> WIN_SCALE_SHIFT
    }

    pub fn grow(&mut self, units: u32) {
        self.0 = self.0.saturating_add(units);
    }

    pub fn shrink(&mut self, units: u32) {
        self.0 = self.0.saturating_sub(units).max(MIN_SCALED_WINDOW);
    }

    /// Whether the window sits on its floor.
    pub fn is_floored(self) -> bool {
        self.0 == MIN_SCALED_WINDOW
    }
}
