//! 时间抽象命名空间。
//!
//! # 教案式说明
//! - **定位（Where）**：位于 `beacon_core::time`，承载守卫引擎对“当前时间”与
//!   “延迟等待”的统一注入口。
//! - **目标（Why）**：重复任务调度器的正确性（顺序执行、取消后不再重排）必须在
//!   CI 中 100% 可复现；直接调用系统时钟会让这类测试退化为靠真实延迟碰运气。
//! - **结构（What）**：[`clock`] 子模块提供 [`Clock`] Trait、生产实现
//!   [`SystemClock`] 与测试用虚拟时钟 [`MockClock`]，仅在 `std` 特性下可用。

pub mod clock;

#[cfg(feature = "std")]
pub use clock::{Clock, MockClock, Sleep, SystemClock};
