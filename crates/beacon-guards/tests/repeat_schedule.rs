//! 重复任务调度集成测试。
//!
//! # 教案式说明
//! - **目标（Why）**：调度器的全部硬契约——顺序执行永不重叠、取消后不再重排、
//!   失败吞掉后按原延迟无限重试、同处理器多任务一次停光——都必须在 CI 中
//!   逐拍复现，不允许依赖真实时间碰运气；
//! - **结构（What）**：所有用例注入 [`MockClock`]，以 `advance` 手动推进延迟，
//!   `settle` 让出调度权驱动任务循环前进一步；
//! - **维护提示（How）**：用例运行在单线程运行时上，`advance` 与 `settle`
//!   必须成对出现——只推时钟不让权，任务循环观测不到唤醒。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use beacon_core::{
    Clock, CoreError, GuardAction, GuardHandler, GuardKind, MockClock, Params, RouteId, RouteNode,
    RouteState, Transition, WrappedAction, codes,
};
use beacon_guards::{EngineError, GuardEngine, RepeatScheduler, ReportSink};

const DELAY: Duration = Duration::from_millis(100);

#[derive(Default)]
struct RecordingSink {
    codes: Mutex<Vec<&'static str>>,
}

impl RecordingSink {
    fn count(&self) -> usize {
        self.codes.lock().unwrap().len()
    }
}

impl ReportSink for RecordingSink {
    fn report(&self, error: &EngineError) {
        self.codes.lock().unwrap().push(error.code());
    }
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn make_scheduler(clock: &MockClock) -> (RepeatScheduler, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    (
        RepeatScheduler::new(
            Arc::new(clock.clone()),
            Arc::clone(&sink) as Arc<dyn ReportSink>,
            DELAY,
        ),
        sink,
    )
}

fn counting_handler(hits: &Arc<AtomicUsize>) -> GuardHandler {
    let hits = Arc::clone(hits);
    Arc::new(move |_| {
        let hits = Arc::clone(&hits);
        Box::pin(async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    })
}

fn rejecting_handler(hits: &Arc<AtomicUsize>) -> GuardHandler {
    let hits = Arc::clone(hits);
    Arc::new(move |_| {
        let hits = Arc::clone(&hits);
        Box::pin(async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::new(codes::REPEAT_HANDLER_FAILED, "still failing"))
        })
    })
}

fn empty_transition() -> Transition {
    let state = Arc::new(RouteState::new(Vec::new(), Params::new()));
    Transition::new(Arc::clone(&state), state)
}

#[tokio::test]
async fn task_repeats_on_each_elapsed_delay() {
    let clock = MockClock::new();
    let (scheduler, _sink) = make_scheduler(&clock);
    let hits = Arc::new(AtomicUsize::new(0));

    scheduler.start(counting_handler(&hits), empty_transition(), Some(DELAY));
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    clock.advance(DELAY);
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    clock.advance(DELAY);
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn stop_after_first_call_prevents_rescheduling() {
    let clock = MockClock::new();
    let (scheduler, _sink) = make_scheduler(&clock);
    let hits = Arc::new(AtomicUsize::new(0));
    let handler = counting_handler(&hits);

    scheduler.start(Arc::clone(&handler), empty_transition(), Some(DELAY));
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert_eq!(scheduler.stop(&handler), 1);
    assert_eq!(scheduler.active_len(), 0);

    clock.advance(DELAY);
    settle().await;
    clock.advance(DELAY);
    settle().await;
    // 已发起的首次调用是允许的上限，此后不再有任何重排。
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_racing_registration_prevents_even_the_first_call() {
    let clock = MockClock::new();
    let (scheduler, _sink) = make_scheduler(&clock);
    let hits = Arc::new(AtomicUsize::new(0));
    let handler = counting_handler(&hits);

    // 单线程运行时上，派生的循环在首次让权前不会运行；
    // 取消标志因此先于第一个观测点落位。
    scheduler.start(Arc::clone(&handler), empty_transition(), Some(DELAY));
    scheduler.stop(&handler);
    settle().await;
    clock.advance(DELAY);
    settle().await;

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.active_len(), 0);
}

#[tokio::test]
async fn rejecting_handler_is_retried_forever_on_the_same_delay() {
    let clock = MockClock::new();
    let (scheduler, sink) = make_scheduler(&clock);
    let hits = Arc::new(AtomicUsize::new(0));
    let handler = rejecting_handler(&hits);

    scheduler.start(Arc::clone(&handler), empty_transition(), Some(DELAY));
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(sink.count(), 1);

    for round in 2..=4 {
        clock.advance(DELAY);
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), round);
        assert_eq!(sink.count(), round);
    }

    scheduler.stop(&handler);
    clock.advance(DELAY);
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn two_starts_for_one_handler_are_both_stopped_by_one_stop() {
    let clock = MockClock::new();
    let (scheduler, _sink) = make_scheduler(&clock);
    let hits = Arc::new(AtomicUsize::new(0));
    let handler = counting_handler(&hits);

    scheduler.start(Arc::clone(&handler), empty_transition(), Some(DELAY));
    scheduler.start(Arc::clone(&handler), empty_transition(), Some(DELAY));
    settle().await;
    assert_eq!(scheduler.active_len(), 2);
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    assert_eq!(scheduler.stop(&handler), 2);
    assert_eq!(scheduler.active_len(), 0);

    clock.advance(DELAY);
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stop_task_only_cancels_the_held_handle() {
    let clock = MockClock::new();
    let (scheduler, _sink) = make_scheduler(&clock);
    let hits = Arc::new(AtomicUsize::new(0));
    let handler = counting_handler(&hits);

    let first = scheduler.start(Arc::clone(&handler), empty_transition(), Some(DELAY));
    scheduler.start(Arc::clone(&handler), empty_transition(), Some(DELAY));
    settle().await;

    assert!(scheduler.stop_task(first));
    assert_eq!(scheduler.active_len(), 1);

    clock.advance(DELAY);
    settle().await;
    // 两次首调 + 幸存任务的一次重排。
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn invocations_of_one_task_never_overlap() {
    let clock = MockClock::new();
    let (scheduler, _sink) = make_scheduler(&clock);
    let hits = Arc::new(AtomicUsize::new(0));
    let inflight = Arc::new(AtomicUsize::new(0));
    let overlapped = Arc::new(AtomicBool::new(false));

    let handler: GuardHandler = {
        let hits = Arc::clone(&hits);
        let inflight = Arc::clone(&inflight);
        let overlapped = Arc::clone(&overlapped);
        let clock = clock.clone();
        Arc::new(move |_| {
            let hits = Arc::clone(&hits);
            let inflight = Arc::clone(&inflight);
            let overlapped = Arc::clone(&overlapped);
            let clock = clock.clone();
            Box::pin(async move {
                if inflight.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlapped.store(true, Ordering::SeqCst);
                }
                hits.fetch_add(1, Ordering::SeqCst);
                // 处理器自身耗时横跨多个节拍，也不得与下一次调用重叠。
                clock.sleep(Duration::from_millis(250)).await;
                inflight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        })
    };

    scheduler.start(handler, empty_transition(), Some(DELAY));
    settle().await;

    for _ in 0..8 {
        clock.advance(DELAY);
        settle().await;
    }

    assert!(!overlapped.load(Ordering::SeqCst));
    assert!(hits.load(Ordering::SeqCst) >= 2);
}

// ---- 经由管线的 repeat_in 生命周期 ----

fn repeat_node(
    name: &'static str,
    hits: &Arc<AtomicUsize>,
    trigger: impl Fn(&Transition) -> bool + Send + Sync + 'static,
) -> Arc<RouteNode> {
    let hits = Arc::clone(hits);
    let action = GuardAction::handler(move |_| {
        let hits = Arc::clone(&hits);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });
    Arc::new(
        RouteNode::new(RouteId::new(vec![name.into()])).with_guard(
            GuardKind::RepeatIn,
            GuardAction::Wrapped(
                WrappedAction::new(action)
                    .with_trigger(trigger)
                    .with_delay(DELAY),
            ),
        ),
    )
}

fn state(matched: Vec<Arc<RouteNode>>) -> Arc<RouteState> {
    Arc::new(RouteState::new(matched, Params::new()))
}

#[tokio::test]
async fn repeat_in_starts_on_enter_and_stops_on_leave() {
    let clock = MockClock::new();
    let engine = GuardEngine::builder()
        .with_clock(Arc::new(clock.clone()))
        .build();
    let hits = Arc::new(AtomicUsize::new(0));
    let node = repeat_node("feed", &hits, |_| true);

    // 进入：启动重复任务。
    engine.resolve_after_guards(state(vec![Arc::clone(&node)]), state(Vec::new()));
    assert_eq!(engine.scheduler().active_len(), 1);
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    clock.advance(DELAY);
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    // 离开：无条件停止。
    engine.resolve_after_guards(state(Vec::new()), state(vec![Arc::clone(&node)]));
    assert_eq!(engine.scheduler().active_len(), 0);

    clock.advance(DELAY);
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stayed_trigger_false_stops_the_task() {
    let clock = MockClock::new();
    let engine = GuardEngine::builder()
        .with_clock(Arc::new(clock.clone()))
        .build();
    let hits = Arc::new(AtomicUsize::new(0));
    let live = Arc::new(AtomicBool::new(true));
    let node = {
        let live = Arc::clone(&live);
        repeat_node("monitor", &hits, move |_| live.load(Ordering::SeqCst))
    };

    engine.resolve_after_guards(state(vec![Arc::clone(&node)]), state(Vec::new()));
    assert_eq!(engine.scheduler().active_len(), 1);

    // 停留且触发器翻假：停止。
    live.store(false, Ordering::SeqCst);
    engine.resolve_after_guards(state(vec![Arc::clone(&node)]), state(vec![Arc::clone(&node)]));
    assert_eq!(engine.scheduler().active_len(), 0);
}

#[tokio::test]
async fn stayed_trigger_true_twice_duplicates_the_task() {
    let clock = MockClock::new();
    let engine = GuardEngine::builder()
        .with_clock(Arc::new(clock.clone()))
        .build();
    let hits = Arc::new(AtomicUsize::new(0));
    let node = repeat_node("ticker", &hits, |_| true);

    engine.resolve_after_guards(state(vec![Arc::clone(&node)]), state(Vec::new()));
    assert_eq!(engine.scheduler().active_len(), 1);

    // 停留且触发器保持为真：再次启动而非幂等跳过——沿袭旧行为的显式决定。
    engine.resolve_after_guards(state(vec![Arc::clone(&node)]), state(vec![Arc::clone(&node)]));
    assert_eq!(engine.scheduler().active_len(), 2);

    // 一次离开将同处理器名下的两个任务全部停掉。
    engine.resolve_after_guards(state(Vec::new()), state(vec![Arc::clone(&node)]));
    assert_eq!(engine.scheduler().active_len(), 0);
}
