//! # report 模块说明
//!
//! ## 角色定位（Why）
//! - after 阶段守卫与重复任务的失败按契约不回传调用方；若不给它们一个
//!   显式去处，这些失败将彻底不可见。本模块提供上报槽抽象与缺省实现，
//!   把“吞掉”变成“吞掉但可观测”。
//!
//! ## 设计要求（What）
//! - 上报槽必须对象安全且 `Send + Sync`，供管线与调度循环跨任务共享；
//! - 上报是尽力而为的旁路：实现不得阻塞、不得让失败二次传播。

use crate::error::EngineError;

/// 被吞掉的守卫失败的观测出口。
pub trait ReportSink: Send + Sync + 'static {
    /// 上报一次被吞掉的失败。
    fn report(&self, error: &EngineError);
}

/// 缺省上报槽：以 `tracing` WARN 级别落结构化日志。
///
/// # 契约说明（What）
/// - 日志字段携带稳定错误码，便于告警侧按码值聚合；
/// - 未安装 `tracing` 订阅器时事件被静默丢弃，符合旁路定位。
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn report(&self, error: &EngineError) {
        tracing::warn!(code = error.code(), "swallowed guard failure: {error}");
    }
}
