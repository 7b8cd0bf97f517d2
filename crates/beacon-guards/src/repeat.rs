//! # repeat 模块说明
//!
//! ## 角色定位（Why）
//! - `repeat_in` 守卫允许路由声明“进入期间每隔一段时间做一件事”；本模块
//!   提供承载这类任务的调度器：显式对象持有注册表，任务循环自重排，
//!   取消是协作式标志位。
//!
//! ## 核心契约（What）
//! - [`RepeatScheduler::start`]：每次调用创建独立任务与注册表条目，**不去重**；
//!   返回 [`RepeatTaskId`] 句柄；
//! - [`RepeatScheduler::stop`]：按处理器身份（`Arc` 指针）移除**所有**匹配条目
//!   并置取消标志；在飞行中的调用会跑完，但不再重排；无匹配时为空操作；
//! - 单任务内调用严格顺序、永不重叠：下一次调用只在上一次结局已知且延迟
//!   走完之后发生，这是全系统唯一的硬顺序保证；
//! - 单次调用失败被吞掉并上报，循环按原延迟无退避地重试。
//!
//! ## 实现策略（How）
//! - 注册表为互斥锁保护的有序映射（任务标识 → 任务记录），标识单调发号；
//! - 延迟等待经由注入的 [`Clock`]，测试以虚拟时钟逐拍推进；
//! - 循环在每轮顶部观测取消标志：取消后最多再经历一次在飞行的延迟即退出。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use beacon_core::{Clock, GuardHandler, Transition};

use crate::error::EngineError;
use crate::report::ReportSink;

/// 未显式声明延迟时使用的重复间隔。
pub const DEFAULT_REPEAT_DELAY: Duration = Duration::from_secs(5);

/// 重复任务的句柄标识，单调发号、进程内唯一。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RepeatTaskId(u64);

impl fmt::Display for RepeatTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "repeat-{}", self.0)
    }
}

struct RepeatTask {
    handler: GuardHandler,
    cancelled: AtomicBool,
}

struct SchedulerShared {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ReportSink>,
    default_delay: Duration,
    next_id: AtomicU64,
    tasks: Mutex<BTreeMap<RepeatTaskId, Arc<RepeatTask>>>,
}

/// 重复任务调度器。
///
/// # 设计动机（Why）
/// - 注册表收敛为调度器自有状态而非环境全局量，构造时显式注入时钟与上报槽；
///   多处共享经由克隆（内部 `Arc`）完成。
///
/// # 使用契约（What）
/// - **前置条件**：`start` 依赖 `tokio::spawn`，须在 Tokio 运行时上下文调用；
/// - **后置条件**：`stop`/`stop_task` 返回后对应条目立即从注册表消失，
///   对应循环最迟在下一个观测点退出；
/// - **线程安全**：注册表变更由互斥锁串行化，任务循环各自独立运行。
#[derive(Clone)]
pub struct RepeatScheduler {
    shared: Arc<SchedulerShared>,
}

impl RepeatScheduler {
    /// 以时钟、上报槽与缺省延迟构造调度器。
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn ReportSink>, default_delay: Duration) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                clock,
                sink,
                default_delay,
                next_id: AtomicU64::new(0),
                tasks: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// 启动一个新的重复任务。
    ///
    /// # 行为概览（How）
    /// 1. 发号、登记注册表条目（即使同一处理器已有活跃任务也照常新建）；
    /// 2. 派生任务循环：观测取消标志 → 调用处理器 → 吞掉并上报失败 →
    ///    等待延迟 → 回到观测点；
    /// 3. 循环退出时移除自身条目（若 `stop` 已先行移除则为空操作）。
    pub fn start(
        &self,
        handler: GuardHandler,
        transition: Transition,
        delay: Option<Duration>,
    ) -> RepeatTaskId {
        let id = RepeatTaskId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let task = Arc::new(RepeatTask {
            handler,
            cancelled: AtomicBool::new(false),
        });
        self.shared
            .tasks
            .lock()
            .expect("repeat registry lock poisoned")
            .insert(id, Arc::clone(&task));

        let delay = delay.unwrap_or(self.shared.default_delay);
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            loop {
                if task.cancelled.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(reason) = (task.handler)(&transition).await {
                    shared.sink.report(&EngineError::Repeat { task: id, reason });
                }
                shared.clock.sleep(delay).await;
            }
            shared
                .tasks
                .lock()
                .expect("repeat registry lock poisoned")
                .remove(&id);
        });

        id
    }

    /// 停止给定处理器名下的**所有**任务。
    ///
    /// # 契约说明（What）
    /// - 匹配按 `Arc` 指针身份进行，与声明处共享同一处理器引用即视为同一身份；
    /// - 返回被停止的任务数，无匹配时为 0。
    pub fn stop(&self, handler: &GuardHandler) -> usize {
        let mut tasks = self
            .shared
            .tasks
            .lock()
            .expect("repeat registry lock poisoned");
        let mut stopped = 0;
        tasks.retain(|_, task| {
            if Arc::ptr_eq(&task.handler, handler) {
                task.cancelled.store(true, Ordering::SeqCst);
                stopped += 1;
                false
            } else {
                true
            }
        });
        stopped
    }

    /// 按句柄停止单个任务。
    ///
    /// # 设计说明（Why）
    /// - 按处理器身份停止会波及同处理器的全部任务；持有 [`RepeatTaskId`] 的
    ///   调用方可用本方法获得更严格的一对一语义。
    pub fn stop_task(&self, id: RepeatTaskId) -> bool {
        let removed = self
            .shared
            .tasks
            .lock()
            .expect("repeat registry lock poisoned")
            .remove(&id);
        match removed {
            Some(task) => {
                task.cancelled.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// 当前活跃任务数（供观测与测试）。
    pub fn active_len(&self) -> usize {
        self.shared
            .tasks
            .lock()
            .expect("repeat registry lock poisoned")
            .len()
    }
}

impl fmt::Debug for RepeatScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepeatScheduler")
            .field("active", &self.active_len())
            .field("default_delay", &self.shared.default_delay)
            .finish()
    }
}
