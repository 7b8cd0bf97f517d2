use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::future::Future;
use core::time::Duration;

use crate::error::CoreError;
use crate::future::BoxFuture;
use crate::route::RouteState;

/// `Transition` 是参数化一次差分与守卫编排的临时对偶 `(to, from)`。
///
/// # 契约说明（What）
/// - `to`/`from` 均为不可变快照，经 `Arc` 共享给并发执行的守卫；
/// - 克隆开销为两次引用计数递增，处理器可放心捕获进自身 Future。
#[derive(Clone, Debug)]
pub struct Transition {
    to: Arc<RouteState>,
    from: Arc<RouteState>,
}

impl Transition {
    /// 以目的地与出发地构造转换对偶。
    pub fn new(to: Arc<RouteState>, from: Arc<RouteState>) -> Self {
        Self { to, from }
    }

    /// 返回目的地快照。
    pub fn to(&self) -> &Arc<RouteState> {
        &self.to
    }

    /// 返回出发地快照。
    pub fn from(&self) -> &Arc<RouteState> {
        &self.from
    }
}

/// `GuardFuture` 是守卫处理器统一的执行结果形态。
pub type GuardFuture = BoxFuture<'static, Result<(), CoreError>>;

/// `GuardHandler` 是对象安全的守卫处理器。
///
/// # 设计动机（Why）
/// - 处理器存放在路由元数据里并被多次导航共享，必须以 `Arc<dyn Fn>` 擦除；
/// - `Arc` 指针身份同时充当“处理器身份”，重复任务调度器据此做停止匹配。
///
/// # 契约说明（What）
/// - 入参为借用的 [`Transition`]，处理器应在同步前缀克隆所需快照再进入异步体；
/// - 返回的 Future 必须 `Send + 'static`，以便跨任务与线程池调度。
pub type GuardHandler = Arc<dyn Fn(&Transition) -> GuardFuture + Send + Sync>;

/// `TriggerFn` 是重复守卫的启停判定谓词。
pub type TriggerFn = Arc<dyn Fn(&Transition) -> bool + Send + Sync>;

/// `GuardKind` 枚举路由节点可声明的七个守卫槽位。
///
/// # 契约说明（What）
/// - `Before*` 三类参与导航放行裁决，失败会拒绝整次转换；
/// - `After*` 三类在转换提交后触发，失败只上报不回传；
/// - `RepeatIn` 声明与节点“进入期”绑定的重复任务。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum GuardKind {
    BeforeLeave,
    BeforeEnter,
    BeforeUpdate,
    AfterLeave,
    AfterEnter,
    AfterUpdate,
    RepeatIn,
}

impl GuardKind {
    /// 返回稳定的诊断名称。
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeLeave => "before_leave",
            Self::BeforeEnter => "before_enter",
            Self::BeforeUpdate => "before_update",
            Self::AfterLeave => "after_leave",
            Self::AfterEnter => "after_enter",
            Self::AfterUpdate => "after_update",
            Self::RepeatIn => "repeat_in",
        }
    }

    /// 是否属于参与放行裁决的 before 阶段。
    pub fn is_before(&self) -> bool {
        matches!(
            self,
            Self::BeforeLeave | Self::BeforeEnter | Self::BeforeUpdate
        )
    }
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `WrappedAction` 在处理器之外附加启停谓词与重复延迟。
///
/// # 契约说明（What）
/// - `handler` 可以是任意动作树（单处理器、列表或再包装）；
/// - `trigger`/`delay` 仅在管线注入特定包装器（如重复调度包装器）时生效；
///   未被包装器拦截时，动作退化为直接执行内部 `handler`。
pub struct WrappedAction {
    handler: Box<GuardAction>,
    trigger: Option<TriggerFn>,
    delay: Option<Duration>,
}

impl WrappedAction {
    /// 包装一个动作树。
    pub fn new(handler: GuardAction) -> Self {
        Self {
            handler: Box::new(handler),
            trigger: None,
            delay: None,
        }
    }

    /// 附加启停谓词。
    pub fn with_trigger<F>(mut self, trigger: F) -> Self
    where
        F: Fn(&Transition) -> bool + Send + Sync + 'static,
    {
        self.trigger = Some(Arc::new(trigger));
        self
    }

    /// 附加重复延迟。
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 返回内部动作树。
    pub fn handler(&self) -> &GuardAction {
        &self.handler
    }

    /// 返回启停谓词。
    pub fn trigger(&self) -> Option<&TriggerFn> {
        self.trigger.as_ref()
    }

    /// 返回重复延迟。
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }
}

impl fmt::Debug for WrappedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedAction")
            .field("handler", &self.handler)
            .field("has_trigger", &self.trigger.is_some())
            .field("delay", &self.delay)
            .finish()
    }
}

/// `GuardAction` 以显式标签变体表达守卫声明的三种形态。
///
/// # 设计动机（Why）
/// - 三种形态（单处理器 / 列表 / 包装）在旧世界靠运行期类型嗅探区分，移植后
///   改为穷尽匹配的标签变体，消除一整类“形态判断遗漏”的缺陷。
///
/// # 契约说明（What）
/// - `List` 递归展开为并发执行的处理器集合，全成或全败；
/// - `Wrapped` 在无包装器介入时退化为执行内部动作；
/// - 动作树在装载期静态构造，不存在环。
pub enum GuardAction {
    Handler(GuardHandler),
    List(Vec<GuardAction>),
    Wrapped(WrappedAction),
}

impl GuardAction {
    /// 以异步闭包构造单处理器动作。
    ///
    /// # 行为说明（How）
    /// - 闭包的同步前缀在处理器被调用的瞬间执行，返回的 Future 再交由管线调度；
    ///   需要跨 `await` 使用快照时，应在同步前缀克隆 `Transition`。
    pub fn handler<F, Fut>(f: F) -> Self
    where
        F: Fn(&Transition) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        Self::Handler(Arc::new(move |transition| Box::pin(f(transition))))
    }

    /// 以动作列表构造并发组合。
    pub fn list(actions: Vec<GuardAction>) -> Self {
        Self::List(actions)
    }

    /// 深度优先访问动作树展开后的每个叶处理器。
    ///
    /// # 契约说明（What）
    /// - 列表按声明顺序展开，包装动作透传到内部动作树；
    /// - 访问期间不执行处理器，仅交付其 `Arc` 引用。
    pub fn for_each_handler<F>(&self, visit: &mut F)
    where
        F: FnMut(&GuardHandler),
    {
        match self {
            Self::Handler(handler) => visit(handler),
            Self::List(actions) => {
                for action in actions {
                    action.for_each_handler(visit);
                }
            }
            Self::Wrapped(wrapped) => wrapped.handler().for_each_handler(visit),
        }
    }
}

impl fmt::Debug for GuardAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::List(actions) => f.debug_tuple("List").field(actions).finish(),
            Self::Wrapped(wrapped) => f.debug_tuple("Wrapped").field(wrapped).finish(),
        }
    }
}

/// `GuardMeta` 是守卫槽位到动作的类型安全映射。
///
/// # 设计动机（Why）
/// - `BTreeMap` 保持槽位排序，调试输出与遍历顺序确定；
/// - 槽位键为枚举而非字符串，声明错误在编译期即暴露。
#[derive(Debug, Default)]
pub struct GuardMeta {
    entries: BTreeMap<GuardKind, GuardAction>,
}

impl GuardMeta {
    /// 创建空元数据。
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// 登记或覆盖一个守卫动作。
    pub fn insert(&mut self, kind: GuardKind, action: GuardAction) {
        self.entries.insert(kind, action);
    }

    /// 读取守卫动作。
    pub fn get(&self, kind: GuardKind) -> Option<&GuardAction> {
        self.entries.get(&kind)
    }

    /// 遍历已声明的槽位。
    pub fn iter(&self) -> impl Iterator<Item = (&GuardKind, &GuardAction)> {
        self.entries.iter()
    }
}
