#![doc = r#"
# beacon-guards

## 设计动机（Why）
- **定位**：本 crate 实现路由转换守卫引擎：当导航从一条匹配链移动到另一条时，
  对每个节点做“离开 / 进入 / 更新 / 停留”分类，并按既定的并发与顺序纪律
  执行节点声明的守卫动作。
- **架构角色**：数据模型（路由链、守卫元数据、时钟）由 `beacon-core` 契约
  承载；宿主路由器只消费两个入口——放行裁决的 before 编排与提交后的 after
  编排，匹配与渲染均不在本 crate 职责内。
- **设计理念**：before 阶段是屏障式“全成或全败”，after 阶段是点火即忘；
  与节点进入期绑定的重复任务交由显式的调度器对象管理，时钟注入保证其
  行为在测试中逐拍可复现。

## 核心契约（What）
- **输入条件**：宿主传入 `(to, from)` 两个 `RouteState` 快照；节点身份以
  `RouteId` 比较，跨导航稳定；
- **输出保障**：[`GuardEngine::resolve_before_guards`] 在任一 before 守卫失败时
  返回携带稳定错误码的 [`EngineError`]；[`GuardEngine::resolve_after_guards`]
  永不向调用方回传失败，被吞掉的失败一律进入 [`ReportSink`]；
- **前置约束**：after 编排与重复任务依赖 `tokio::spawn`，两者都必须在 Tokio
  运行时上下文中调用。

## 实现策略（How）
- **差分**：`diff` 模块对两条匹配链做按身份的集合代数，参数变更集取双向
  递归结构差分的并集，保证映射型参数的增键与减键都被看到；
- **编排**：`action` 模块把守卫声明归一化为统一的执行计划，管线经由包装器
  缝隙注入重复任务的启停语义，归一化层对其保持无知；
- **调度**：`repeat` 模块维护“任务标识 → 任务”的注册表，每个任务是严格
  顺序执行的自重排循环，取消是协作式的。

## 风险与考量（Trade-offs）
- **挂起的处理器**：单次调用没有超时，挂死的处理器会阻塞其所属任务的后续
  重排，但不影响其他任务与管线本身；
- **重复启动语义**：停留节点的触发器连续为真时会再次启动新任务而非去重，
  这是沿袭旧行为的显式决定（见 `repeat` 模块测试）；需要更严格语义的调用方
  可改持 [`RepeatTaskId`] 句柄逐个停止。
"#]

mod action;
mod diff;
mod error;
mod pipeline;
mod repeat;
mod report;

pub use action::{ActionLeaf, ActionWrapper, execute_action, execute_routes_actions};
pub use diff::{TransitionDiff, double_diff_paths};
pub use error::EngineError;
pub use pipeline::{GuardEngine, GuardEngineBuilder};
pub use repeat::{DEFAULT_REPEAT_DELAY, RepeatScheduler, RepeatTaskId};
pub use report::{ReportSink, TracingSink};
