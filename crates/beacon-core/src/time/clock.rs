#![cfg(feature = "std")]

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

/// `Sleep` 为时钟接口返回的统一延迟 Future 类型。
///
/// # 契约说明（What）
/// - Future 完成时表示指定的持续时间已经过去；
/// - 必须满足 `Send + 'static` 以适配多线程调度与跨任务存活；
/// - 返回 `Poll::Pending` 后，实现须在状态变化时唤醒登记的 waker。
pub type Sleep = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// 抽象可注入的时钟，统一“获取当前时间”与“等待指定时间”两种能力。
///
/// # 设计背景（Why）
/// - 重复任务的节拍与取消观测点全部悬挂在延迟等待上；通过 trait 注入时钟，
///   生产环境使用真实时间，测试注入 [`MockClock`] 手动推进。
///
/// # 接口约束（What）
/// - `now` 返回单调时间点；
/// - `sleep` 返回在给定持续时间后完成的 Future，完成前至少等待所给时长。
pub trait Clock: Send + Sync + 'static {
    /// 返回当前的单调时间点。
    fn now(&self) -> Instant;

    /// 返回一个在指定持续时间后完成的睡眠 Future。
    fn sleep(&self, duration: Duration) -> Sleep;
}

/// 基于 Tokio 时间驱动的系统时钟。
///
/// # 契约说明（What）
/// - `now` 直接返回 [`Instant::now`]；
/// - `sleep` 委托 [`tokio::time::sleep`]，需在 Tokio 运行时上下文中使用。
#[derive(Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        // Tokio `sleep` 返回 `!Unpin` Future，统一包裹为 `Sleep` 类型。
        Box::pin(tokio::time::sleep(duration))
    }
}

/// 虚拟时钟：通过手动推进时间，在测试中复现确定性的唤醒序列。
///
/// # 行为概览（How）
/// - 内部维护自构造起的虚拟偏移量与按登记顺序排列的待唤醒列表；
/// - `advance` 增加偏移量并唤醒所有到期的睡眠 Future；
/// - `sleep` 创建绑定本时钟的 Future，遵循标准 `Poll` 契约。
///
/// # 契约说明（What）
/// - `advance` 可多次调用，偏移量单调增加；
/// - 到期唤醒按登记顺序稳定发生，保证测试序列可复现；
/// - 零时长的睡眠在首次轮询时即完成，无需推进。
#[derive(Clone, Debug, Default)]
pub struct MockClock {
    shared: Arc<Mutex<VirtualTime>>,
}

#[derive(Debug)]
struct VirtualTime {
    origin: Instant,
    elapsed: Duration,
    waiters: Vec<Waiter>,
}

impl Default for VirtualTime {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Duration::ZERO,
            waiters: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Waiter {
    deadline: Duration,
    cell: Arc<WaiterCell>,
}

#[derive(Debug, Default)]
struct WaiterCell {
    // (是否到期, 登记的 waker)；两者必须在同一把锁下变更，避免“先查后登”竞态。
    state: Mutex<(bool, Option<Waker>)>,
}

impl MockClock {
    /// 创建起始时间为当前系统时间的虚拟时钟。
    pub fn new() -> Self {
        Self::default()
    }

    /// 手动推进虚拟时钟，唤醒所有到期的睡眠 Future。
    pub fn advance(&self, delta: Duration) {
        if delta.is_zero() {
            return;
        }

        let due = {
            let mut guard = self.shared.lock().expect("mock-clock state lock poisoned");
            guard.elapsed = guard.elapsed.saturating_add(delta);
            let elapsed = guard.elapsed;
            let mut due = Vec::new();
            guard.waiters.retain(|waiter| {
                if waiter.deadline <= elapsed {
                    due.push(Arc::clone(&waiter.cell));
                    false
                } else {
                    true
                }
            });
            due
        };

        // 锁外唤醒，防止 waker 回调重入时钟状态造成死锁。
        for cell in due {
            let waker = {
                let mut state = cell.state.lock().expect("mock-clock waiter lock poisoned");
                state.0 = true;
                state.1.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        }
    }

    /// 返回自起始时间以来的虚拟偏移量。
    pub fn elapsed(&self) -> Duration {
        self.shared
            .lock()
            .expect("mock-clock state lock poisoned")
            .elapsed
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        let guard = self.shared.lock().expect("mock-clock state lock poisoned");
        guard.origin + guard.elapsed
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        let cell = Arc::new(WaiterCell::default());
        {
            let mut guard = self.shared.lock().expect("mock-clock state lock poisoned");
            if duration.is_zero() {
                cell.state
                    .lock()
                    .expect("mock-clock waiter lock poisoned")
                    .0 = true;
            } else {
                let deadline = guard.elapsed.saturating_add(duration);
                guard.waiters.push(Waiter {
                    deadline,
                    cell: Arc::clone(&cell),
                });
            }
        }
        Box::pin(VirtualSleep { cell })
    }
}

struct VirtualSleep {
    cell: Arc<WaiterCell>,
}

impl Future for VirtualSleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self
            .cell
            .state
            .lock()
            .expect("mock-clock waiter lock poisoned");
        if state.0 {
            Poll::Ready(())
        } else {
            state.1 = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}
