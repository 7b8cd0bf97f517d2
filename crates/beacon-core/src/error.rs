use crate::Error;
use alloc::borrow::Cow;
use alloc::boxed::Box;
use core::fmt;

/// `ErrorCause` 封装底层原因，保持 `Send + Sync` 以方便跨线程传递。
pub type ErrorCause = Box<dyn Error + Send + Sync + 'static>;

/// `CoreError` 提供稳定的错误码与根因链路，是守卫引擎错误分层的最底层。
///
/// # 设计背景（Why）
/// - 守卫处理器、调度循环与宿主路由器分别在不同层次产生故障，需要合流为统一的
///   错误码，以便日志与告警系统执行精确的自动化治理。
/// - 框架兼容 `no_std + alloc` 场景，因此不依赖 `std::error::Error`，而是复用
///   crate 内部的轻量 [`Error`] 抽象。
///
/// # 契约说明（What）
/// - `code`：稳定字符串，使用 [`codes`] 模块或遵循 `<域>.<语义>` 约定的自定义码值。
/// - `message`：面向排障人员的可读描述，避免包含敏感信息。
/// - `cause`：可选底层原因；`source()` 递归暴露完整链路。
///
/// # 风险提示（Trade-offs）
/// - 结构体仅负责承载信息，不执行任何格式化或指标上报逻辑；调用方需自行处理。
#[derive(Debug)]
pub struct CoreError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<ErrorCause>,
}

impl CoreError {
    /// 使用稳定错误码与消息构造核心错误。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层原因并返回新的核心错误。
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 获取描述。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 获取底层原因。
    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|boxed| boxed.as_ref() as &(dyn Error + 'static))
    }
}

/// 守卫引擎的稳定错误码清单。
///
/// # 命名约定（What）
/// - 采用 `<域>.<语义>` 两段式命名，域与引擎组件一一对应；
/// - 码值一经发布即冻结，新增语义请追加新码而非复用旧码。
pub mod codes {
    /// before 阶段守卫拒绝了路由转换，导航应被中止或重定向。
    pub const GUARD_BEFORE_REJECTED: &str = "guard.before_rejected";
    /// after 阶段守卫执行失败；转换已提交，失败仅上报不回传。
    pub const GUARD_AFTER_FAILED: &str = "guard.after_failed";
    /// 重复任务的单次执行失败；调度循环按原延迟继续重试。
    pub const REPEAT_HANDLER_FAILED: &str = "repeat.handler_failed";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_code_and_message() {
        let err = CoreError::new(codes::GUARD_BEFORE_REJECTED, "session expired");
        assert_eq!(
            alloc::format!("{err}"),
            "[guard.before_rejected] session expired"
        );
    }

    #[test]
    fn cause_chain_is_reachable_via_source() {
        let inner = CoreError::new(codes::REPEAT_HANDLER_FAILED, "backend unreachable");
        let outer = CoreError::new(codes::GUARD_AFTER_FAILED, "analytics hook failed")
            .with_cause(inner);
        let source = outer.source().expect("应能取得根因");
        assert!(alloc::format!("{source}").contains("repeat.handler_failed"));
    }
}
