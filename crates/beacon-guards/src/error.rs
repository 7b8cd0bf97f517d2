//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为守卫引擎对外暴露的错误语义提供集中定义，确保与 `beacon-core::CoreError`
//!   的稳定错误码对齐；
//! - 区分“放行裁决被拒”“提交后守卫失败”“重复任务单次失败”三类路径，
//!   方便观测侧按码值落告警。
//!
//! ## 设计要求（What）
//! - 错误类型实现 `thiserror::Error` 以兼容 `std::error::Error` 生态；
//! - 提供到 [`CoreError`] 的转换函数，便于宿主把引擎错误并入自身的错误分层。

use beacon_core::{CoreError, GuardKind, RouteId, codes};
use thiserror::Error;

use crate::repeat::RepeatTaskId;

/// 守卫引擎错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合守卫执行与重复任务两条关键路径的异常；before 阶段的
///   变体会原样回传给调用方，after 阶段与重复任务的变体只流向上报槽。
/// - **契约 (What)**：
///   - 所有变体 `Send + Sync + 'static`，可安全跨任务传播；
///   - [`EngineError::code`] 返回稳定错误码，码值语义见 `beacon_core::codes`；
///   - `into_core` 把引擎错误降级为核心错误并保留根因链，供宿主 `?` 传播。
/// - **设计权衡 (Trade-offs)**：守卫失败携带槽位与路由标识而非完整转换快照，
///   牺牲少量上下文换取错误体积可控；需要快照时应由上报槽侧自行关联。
#[derive(Debug, Error)]
pub enum EngineError {
    /// 某个节点的守卫动作执行失败。
    ///
    /// - **意图 (Why)**：精确指出失败的槽位与节点，避免“整次导航失败”级别的
    ///   模糊告警。
    /// - **契约 (What)**：`kind.is_before()` 为真时该错误会中止导航；否则它
    ///   只会出现在上报槽。
    #[error("guard `{kind}` failed at route `{route}`: {reason}")]
    Guard {
        kind: GuardKind,
        route: RouteId,
        reason: CoreError,
    },

    /// 某个重复任务的单次执行失败。
    ///
    /// - **契约 (What)**：调度循环吞掉该错误并按原延迟继续重试；错误仅供
    ///   上报槽观测。
    #[error("repeating task `{task}` failed: {reason}")]
    Repeat {
        task: RepeatTaskId,
        reason: CoreError,
    },
}

impl EngineError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Guard { kind, .. } if kind.is_before() => codes::GUARD_BEFORE_REJECTED,
            Self::Guard { .. } => codes::GUARD_AFTER_FAILED,
            Self::Repeat { .. } => codes::REPEAT_HANDLER_FAILED,
        }
    }

    /// 降级为核心错误并保留根因链。
    pub fn into_core(self) -> CoreError {
        match self {
            Self::Guard {
                kind,
                route,
                reason,
            } => CoreError::new(
                if kind.is_before() {
                    codes::GUARD_BEFORE_REJECTED
                } else {
                    codes::GUARD_AFTER_FAILED
                },
                format!("guard `{kind}` failed at route `{route}`"),
            )
            .with_cause(reason),
            Self::Repeat { task, reason } => CoreError::new(
                codes::REPEAT_HANDLER_FAILED,
                format!("repeating task `{task}` failed"),
            )
            .with_cause(reason),
        }
    }
}
