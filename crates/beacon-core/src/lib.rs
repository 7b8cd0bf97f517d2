#![cfg_attr(not(feature = "std"), no_std)]
#![doc = "beacon-core: 分层路由导航守卫引擎的核心契约。"]
#![doc = ""]
#![doc = "== 角色定位 =="]
#![doc = "本 Crate 只承载数据模型与最小抽象：路由链（`RouteState`/`RouteNode`）、"]
#![doc = "守卫元数据（`GuardMeta`/`GuardAction`）、时钟注入（`Clock`）与错误分层（`CoreError`）。"]
#![doc = "守卫的差分、编排与重复任务调度均位于实现层 Crate `beacon-guards`。"]
#![doc = ""]
#![doc = "== 兼容性 =="]
#![doc = "默认启用 `std`；关闭后退化为 `no_std + alloc`，时钟抽象随 `std` 一同裁剪。"]

extern crate alloc;

pub mod error;
pub mod future;
pub mod guard;
pub mod route;
pub mod time;

pub use error::{CoreError, ErrorCause, codes};
pub use future::{BoxFuture, LocalBoxFuture};
pub use guard::{
    GuardAction, GuardFuture, GuardHandler, GuardKind, GuardMeta, Transition, TriggerFn,
    WrappedAction,
};
pub use route::{ParamValue, Params, RouteId, RouteNode, RouteState};
#[cfg(feature = "std")]
pub use time::{Clock, MockClock, Sleep, SystemClock};

use alloc::boxed::Box;
use core::fmt;

/// `beacon-core` 中所有错误必须实现的 `no_std` 基础 Trait。
///
/// # 设计背景（Why）
/// - `std::error::Error` 在 `no_std` 环境中不可用，守卫处理器返回的错误需要一个
///   对象安全、与平台无关的抽象来串联根因链。
/// - 该 Trait 是错误类型的“最小公共接口”，供 `ErrorCause` 在 `alloc` 场景下跨模块传递。
///
/// # 契约说明（What）
/// - **前置条件**：实现类型须为 `'static`，若需装入 [`ErrorCause`] 还须 `Send + Sync`。
/// - **后置条件**：`source` 返回引用的生命周期受限于 `self`，防止悬垂。
///
/// # 风险提示（Trade-offs）
/// - Trait 本身不强制 `Send + Sync`，避免对单线程宿主强加负担；线程安全由
///   [`ErrorCause`] 类型别名约束。
pub trait Error: fmt::Debug + fmt::Display {
    /// 返回当前错误的上游来源。
    fn source(&self) -> Option<&(dyn Error + 'static)>;
}

impl<E> Error for Box<E>
where
    E: Error + ?Sized,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        (**self).source()
    }
}
