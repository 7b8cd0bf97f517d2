//! # action 模块说明
//!
//! ## 角色定位（Why）
//! - 守卫声明有三种形态（单处理器、列表、包装动作），管线若逐处分情况讨论，
//!   形态组合会在每个阶段重复一遍；本模块把任意动作树归一化为统一的执行
//!   计划，管线只面对一个函数。
//!
//! ## 核心契约（What）
//! - [`execute_action`]：缺省动作立即成功；列表展开为并发执行、全成或全败；
//!   包装动作在无包装器介入时退化为执行内部动作（`trigger`/`delay` 被忽略）；
//! - [`execute_routes_actions`]：对一组节点的同名槽位并发执行，失败时携带
//!   槽位与节点身份；
//! - 包装器缝隙：调用方可注入 [`ActionWrapper`] 拦截每个叶子动作，归一化层
//!   对包装器的语义保持无知——重复任务的启停就经由这一缝隙接入。
//!
//! ## 实现策略（How）
//! - 动作树在构造执行计划时即被同步展开：处理器的同步前缀与包装器的副作用
//!   都发生在本层返回之前，随后的 Future 仅承载异步余下部分；
//! - 并发组合使用 `try_join_all`，首个失败即令聚合失败。

use core::future;
use std::sync::Arc;

use beacon_core::{GuardAction, GuardFuture, GuardHandler, GuardKind, RouteNode, Transition};
use beacon_core::{BoxFuture, WrappedAction};
use futures::future::try_join_all;

use crate::error::EngineError;

/// 动作树展开后交给包装器的叶子形态。
///
/// # 契约说明（What）
/// - `Handler`：未附加任何触发条件的裸处理器；
/// - `Wrapped`：携带 `trigger`/`delay` 的包装动作，内部仍可能是子树；
/// - 借用生命周期仅覆盖包装器调用期间，包装器不得将引用带出。
pub enum ActionLeaf<'a> {
    Handler(&'a GuardHandler),
    Wrapped(&'a WrappedAction),
}

/// 包装器：拦截叶子动作并给出替代执行计划。
pub type ActionWrapper = dyn Fn(ActionLeaf<'_>) -> GuardFuture + Send + Sync;

/// 把一个守卫动作归一化为统一的执行计划。
///
/// # 行为概览（How）
/// - `None`：立即成功，路由未声明该槽位不是错误；
/// - `Handler`：有包装器则交包装器定夺，否则直接调用处理器；
/// - `List`：逐元素递归（包装器透传），`try_join_all` 聚合；
/// - `Wrapped`：有包装器则交包装器定夺，否则**丢弃** `trigger`/`delay`、
///   递归执行内部动作——未被专用包装器接住的包装动作退化为普通动作。
pub fn execute_action(
    action: Option<&GuardAction>,
    wrapper: Option<&ActionWrapper>,
    transition: &Transition,
) -> GuardFuture {
    let Some(action) = action else {
        return Box::pin(future::ready(Ok(())));
    };

    match action {
        GuardAction::Handler(handler) => match wrapper {
            Some(wrap) => wrap(ActionLeaf::Handler(handler)),
            None => handler(transition),
        },
        GuardAction::List(actions) => {
            let plans: Vec<GuardFuture> = actions
                .iter()
                .map(|nested| execute_action(Some(nested), wrapper, transition))
                .collect();
            Box::pin(async move {
                try_join_all(plans).await?;
                Ok(())
            })
        }
        GuardAction::Wrapped(wrapped) => match wrapper {
            Some(wrap) => wrap(ActionLeaf::Wrapped(wrapped)),
            None => execute_action(Some(wrapped.handler()), None, transition),
        },
    }
}

/// 对一组节点的同名守卫槽位并发执行。
///
/// # 契约说明（What）
/// - 节点间无顺序保证，聚合为全成或全败；
/// - 失败时错误携带 `kind` 与节点 `RouteId`，保证告警可定位；
/// - 返回的 Future 为 `'static`：包装器与节点引用只在构造期使用。
pub fn execute_routes_actions(
    kind: GuardKind,
    nodes: &[Arc<RouteNode>],
    wrapper: Option<&ActionWrapper>,
    transition: &Transition,
) -> BoxFuture<'static, Result<(), EngineError>> {
    let plans: Vec<_> = nodes
        .iter()
        .map(|node| {
            let plan = execute_action(node.meta().get(kind), wrapper, transition);
            let route = node.id().clone();
            async move {
                plan.await.map_err(|reason| EngineError::Guard {
                    kind,
                    route,
                    reason,
                })
            }
        })
        .collect();

    Box::pin(async move {
        try_join_all(plans).await?;
        Ok(())
    })
}
