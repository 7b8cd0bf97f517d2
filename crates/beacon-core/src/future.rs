use alloc::boxed::Box;
use core::{future::Future, pin::Pin};

/// `BoxFuture` 是 `beacon-core` 在 `no_std + alloc` 下使用的通用 Future 包装。
///
/// # 设计背景（Why）
/// - 守卫处理器以对象安全的形式存放在路由元数据中，必须将其返回的 Future 擦除为
///   统一类型，且不引入具体运行时依赖。
///
/// # 契约说明（What）
/// - 约束 Future 为 `Send + 'a`，可安全跨线程调度。
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// `LocalBoxFuture` 封装 `!Send` Future。
///
/// # 契约说明（What）
/// - 仅需满足 `'a` 生命周期约束，供单线程执行器使用。
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;
