//! # pipeline 模块说明
//!
//! ## 角色定位（Why）
//! - 本模块是引擎对宿主路由器暴露的全部表面：导航放行前的屏障式裁决与
//!   提交后的点火即忘编排。差分、归一化与调度在此被组装成两条固定的
//!   执行路径。
//!
//! ## 核心契约（What）
//! - [`GuardEngine::resolve_before_guards`]：`before_leave`（离开集）、
//!   `before_update`（更新集）、`before_enter`（进入集）三条子管线并发执行，
//!   彼此及内部均无顺序保证；聚合为屏障，任一处理器失败即整体失败，调用方
//!   恰好观测到一个失败信号，应据此中止或重定向导航；
//! - [`GuardEngine::resolve_after_guards`]：按 `after_leave → repeat_in →
//!   after_update → after_enter` 的固定顺序**发起**四个阶段，不等待完成、
//!   不回传失败；失败进入上报槽；
//! - `repeat_in` 的注册表变更在发起期同步完成：函数返回时启停效果已落盘，
//!   顺序导航之间不会交错。
//!
//! ## 实现策略（How）
//! - 三类节点集各配一个包装器接管 `repeat_in` 叶子动作：进入集按触发器缺省
//!   放行启动；停留集仅在声明了触发器时按其取值启停；离开集无条件停止；
//! - after 阶段经 `tokio::spawn` 点火，Future 不被保留——这是刻意的
//!   "发射后不管"，提交后的副作用失败不得反噬已完成的转换。

use core::future;
use std::sync::Arc;
use std::time::Duration;

use beacon_core::{
    BoxFuture, Clock, GuardKind, RouteState, SystemClock, Transition,
};
use futures::future::try_join3;

use crate::action::{ActionLeaf, execute_routes_actions};
use crate::diff::TransitionDiff;
use crate::error::EngineError;
use crate::repeat::{DEFAULT_REPEAT_DELAY, RepeatScheduler};
use crate::report::{ReportSink, TracingSink};

/// `GuardEngineBuilder` 汇集引擎的可注入配置。
///
/// # 契约说明（What）
/// - `clock`：重复任务的延迟来源，缺省为 Tokio 系统时钟；
/// - `report_sink`：被吞掉失败的观测出口，缺省落 `tracing` WARN；
/// - `default_repeat_delay`：`repeat_in` 未声明延迟时的间隔，缺省 5 秒。
pub struct GuardEngineBuilder {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ReportSink>,
    default_repeat_delay: Duration,
}

impl GuardEngineBuilder {
    /// 以缺省配置起步。
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingSink),
            default_repeat_delay: DEFAULT_REPEAT_DELAY,
        }
    }

    /// 注入时钟。
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 注入上报槽。
    pub fn with_report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// 调整缺省重复延迟。
    pub fn with_default_repeat_delay(mut self, delay: Duration) -> Self {
        self.default_repeat_delay = delay;
        self
    }

    /// 构建引擎。
    pub fn build(self) -> GuardEngine {
        let scheduler = RepeatScheduler::new(
            Arc::clone(&self.clock),
            Arc::clone(&self.sink),
            self.default_repeat_delay,
        );
        GuardEngine {
            scheduler,
            sink: self.sink,
        }
    }
}

impl Default for GuardEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 路由转换守卫引擎。
///
/// # 使用契约（What）
/// - **前置条件**：[`Self::resolve_after_guards`] 及其驱动的重复任务依赖
///   `tokio::spawn`，须在 Tokio 运行时上下文中调用；
/// - **后置条件**：引擎自身无导航状态，同一实例可服务任意多次转换；
/// - **线程安全**：`Send + Sync`，可在多线程运行时共享。
pub struct GuardEngine {
    scheduler: RepeatScheduler,
    sink: Arc<dyn ReportSink>,
}

impl GuardEngine {
    /// 返回配置入口。
    pub fn builder() -> GuardEngineBuilder {
        GuardEngineBuilder::new()
    }

    /// 以缺省配置构建引擎。
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// 返回重复任务调度器，供宿主按句柄管理任务。
    pub fn scheduler(&self) -> &RepeatScheduler {
        &self.scheduler
    }

    /// 导航放行裁决：并发执行三条 before 子管线并在屏障处聚合。
    ///
    /// # 契约说明（What）
    /// - **输入**：`to`/`from` 为宿主匹配完成的两个终点快照；
    /// - **输出**：全部处理器成功时返回 `Ok(())`；任一失败时返回携带槽位与
    ///   节点身份的 [`EngineError`]，调用方必须中止或重定向本次导航；
    /// - **顺序**：子管线之间与同类节点之间均无顺序保证，仅有完成屏障。
    pub async fn resolve_before_guards(
        &self,
        to: Arc<RouteState>,
        from: Arc<RouteState>,
    ) -> Result<(), EngineError> {
        let transition = Transition::new(to, from);
        let diff = TransitionDiff::compute(&transition);

        let leave = execute_routes_actions(GuardKind::BeforeLeave, diff.leaved(), None, &transition);
        let update =
            execute_routes_actions(GuardKind::BeforeUpdate, diff.updated(), None, &transition);
        let enter =
            execute_routes_actions(GuardKind::BeforeEnter, diff.entered(), None, &transition);

        try_join3(leave, update, enter).await?;
        Ok(())
    }

    /// 提交后编排：固定顺序发起四个阶段，点火即忘。
    ///
    /// # 契约说明（What）
    /// - 本函数立即返回，不等待任何阶段完成，失败只进入上报槽；
    /// - 四个阶段按 `after_leave → repeat_in → after_update → after_enter`
    ///   顺序发起，实际完成顺序未定义、可交错；
    /// - 返回时 `repeat_in` 的启停效果已生效（注册表变更同步完成）。
    pub fn resolve_after_guards(&self, to: Arc<RouteState>, from: Arc<RouteState>) {
        let transition = Transition::new(to, from);
        let diff = TransitionDiff::compute(&transition);

        self.fire(execute_routes_actions(
            GuardKind::AfterLeave,
            diff.leaved(),
            None,
            &transition,
        ));
        self.repeat_in(&diff, &transition);
        self.fire(execute_routes_actions(
            GuardKind::AfterUpdate,
            diff.updated(),
            None,
            &transition,
        ));
        self.fire(execute_routes_actions(
            GuardKind::AfterEnter,
            diff.entered(),
            None,
            &transition,
        ));
    }

    /// 点火一个 after 阶段：失败转入上报槽，Future 不被保留。
    fn fire(&self, plan: BoxFuture<'static, Result<(), EngineError>>) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(error) = plan.await {
                sink.report(&error);
            }
        });
    }

    /// `repeat_in` 阶段：按节点分类对重复任务做启停。
    ///
    /// # 行为概览（How）
    /// - **进入集**：触发器缺省或为真 → 启动（动作树的每个叶处理器各得一个
    ///   新任务）；
    /// - **停留集**：仅当声明了触发器时评估——真 → 再次启动（不去重，沿袭
    ///   旧行为），假 → 停止；
    /// - **离开集**：无条件停止。
    fn repeat_in(&self, diff: &TransitionDiff, transition: &Transition) {
        let scheduler = self.scheduler.clone();
        let t = transition.clone();
        let entered = move |leaf: ActionLeaf<'_>| -> beacon_core::GuardFuture {
            match leaf {
                ActionLeaf::Handler(handler) => {
                    scheduler.start(Arc::clone(handler), t.clone(), None);
                }
                ActionLeaf::Wrapped(wrapped) => {
                    if wrapped.trigger().is_none_or(|trigger| trigger(&t)) {
                        wrapped.handler().for_each_handler(&mut |handler| {
                            scheduler.start(Arc::clone(handler), t.clone(), wrapped.delay());
                        });
                    }
                }
            }
            Box::pin(future::ready(Ok(())))
        };
        self.fire(execute_routes_actions(
            GuardKind::RepeatIn,
            diff.entered(),
            Some(&entered),
            transition,
        ));

        let scheduler = self.scheduler.clone();
        let t = transition.clone();
        let stayed = move |leaf: ActionLeaf<'_>| -> beacon_core::GuardFuture {
            if let ActionLeaf::Wrapped(wrapped) = leaf {
                if let Some(trigger) = wrapped.trigger() {
                    if trigger(&t) {
                        wrapped.handler().for_each_handler(&mut |handler| {
                            scheduler.start(Arc::clone(handler), t.clone(), wrapped.delay());
                        });
                    } else {
                        wrapped.handler().for_each_handler(&mut |handler| {
                            scheduler.stop(handler);
                        });
                    }
                }
            }
            Box::pin(future::ready(Ok(())))
        };
        self.fire(execute_routes_actions(
            GuardKind::RepeatIn,
            diff.stayed(),
            Some(&stayed),
            transition,
        ));

        let scheduler = self.scheduler.clone();
        let leaved = move |leaf: ActionLeaf<'_>| -> beacon_core::GuardFuture {
            match leaf {
                ActionLeaf::Handler(handler) => {
                    scheduler.stop(handler);
                }
                ActionLeaf::Wrapped(wrapped) => {
                    wrapped.handler().for_each_handler(&mut |handler| {
                        scheduler.stop(handler);
                    });
                }
            }
            Box::pin(future::ready(Ok(())))
        };
        self.fire(execute_routes_actions(
            GuardKind::RepeatIn,
            diff.leaved(),
            Some(&leaved),
            transition,
        ));
    }
}

impl Default for GuardEngine {
    fn default() -> Self {
        Self::new()
    }
}
