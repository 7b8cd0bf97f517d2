use alloc::borrow::Cow;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::guard::{GuardAction, GuardKind, GuardMeta};

/// `RouteId` 是配置态路由节点的稳定标识。
///
/// # 设计动机（Why）
/// - 同一个配置节点会在多次导航的匹配链中反复出现，差分算法需要一个
///   跨导航可比较的身份；直接依赖指针身份会把契约绑死在共享方式上。
/// - 以有序路径段表达身份，与分层路由“根到叶”的结构天然对应，也便于
///   观测数据落盘与去重。
///
/// # 契约说明（What）
/// - **前置条件**：段序列在路由表装载时即确定，运行期不可变；
/// - **后置条件**：`Eq/Ord/Hash` 语义稳定，可作为集合运算与注册表的主键。
///
/// # 风险提示（Trade-offs）
/// - 段内容不做字符集校验，保持零开销；调用方应在装载路由表前完成规范化。
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RouteId {
    segments: Vec<Cow<'static, str>>,
}

impl RouteId {
    /// 以有序路径段构造标识。空序列表示根路由。
    pub fn new(segments: Vec<Cow<'static, str>>) -> Self {
        Self { segments }
    }

    /// 返回路径段迭代器。
    pub fn segments(&self) -> impl Iterator<Item = &Cow<'static, str>> {
        self.segments.iter()
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/")?;
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, "/")?;
            }
            first = false;
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// `ParamValue` 封装动态路由参数的取值形态。
///
/// # 设计动机（Why）
/// - 宿主路由器传入的参数不一定是扁平字符串：查询结构、批量选择等场景会出现
///   嵌套映射与列表，差分算法必须能对其做递归结构比较。
///
/// # 取舍说明（Trade-offs）
/// - 仅包含最小必要集合（文本/列表/映射），避免在核心契约中引入数值解析歧义；
///   若宿主需要更丰富的类型，可在上层自行编码为文本。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ParamValue {
    Text(Cow<'static, str>),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// 以文本构造参数值。
    pub fn text(value: impl Into<Cow<'static, str>>) -> Self {
        Self::Text(value.into())
    }
}

/// `Params` 是一次导航终点携带的参数快照。
///
/// # 设计动机（Why）
/// - `BTreeMap` 保持键排序，使差分输出与序列化顺序确定，便于测试复现与审计；
/// - 写入频率远低于读取（每次导航装载一次），对数级插入成本可以接受。
///
/// # 前置/后置条件
/// - **前置**：键名由宿主路由器保证与节点声明的参数名一致；
/// - **后置**：迭代结果稳定，可直接参与双向结构差分。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    entries: BTreeMap<String, ParamValue>,
}

impl Params {
    /// 创建空参数快照。
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// 插入或覆盖一个参数。
    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        self.entries.insert(key.into(), value);
    }

    /// 读取参数。
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    /// 是否包含指定键。
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 遍历所有键值对。
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.entries.iter()
    }
}

impl FromIterator<(String, ParamValue)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// `RouteNode` 描述匹配链中的一个层级。
///
/// # 设计动机（Why）
/// - 差分算法只关心三件事：节点身份、节点依赖哪些动态参数、节点声明了哪些守卫。
///   该结构即为这三项的最小承载体，路由匹配细节（正则、优先级）留在宿主侧。
///
/// # 契约说明（What）
/// - `id`：稳定身份，集合运算据此比较；
/// - `param_keys`：节点路径模式声明的动态参数名，有序且装载后不可变；
/// - `meta`：守卫槽位到 [`GuardAction`] 的映射。
///
/// # 使用约束（Pre/Post）
/// - **前置**：节点经 `Arc` 共享给各次导航的匹配链，装载后不再修改；
/// - **后置**：同一配置节点在不同导航中携带相等的 `RouteId`。
#[derive(Debug)]
pub struct RouteNode {
    id: RouteId,
    param_keys: Vec<Cow<'static, str>>,
    meta: GuardMeta,
}

impl RouteNode {
    /// 构造不含守卫声明的节点。
    pub fn new(id: RouteId) -> Self {
        Self {
            id,
            param_keys: Vec::new(),
            meta: GuardMeta::new(),
        }
    }

    /// 声明节点依赖的动态参数名。
    pub fn with_param_keys(mut self, keys: Vec<Cow<'static, str>>) -> Self {
        self.param_keys = keys;
        self
    }

    /// 在指定守卫槽位登记动作。
    pub fn with_guard(mut self, kind: GuardKind, action: GuardAction) -> Self {
        self.meta.insert(kind, action);
        self
    }

    /// 返回稳定身份。
    pub fn id(&self) -> &RouteId {
        &self.id
    }

    /// 返回声明的动态参数名。
    pub fn param_keys(&self) -> impl Iterator<Item = &str> {
        self.param_keys.iter().map(|key| key.as_ref())
    }

    /// 节点是否依赖指定参数。
    pub fn depends_on(&self, name: &str) -> bool {
        self.param_keys.iter().any(|key| key == name)
    }

    /// 返回守卫元数据。
    pub fn meta(&self) -> &GuardMeta {
        &self.meta
    }
}

/// `RouteState` 是一次导航的终点快照：根到叶的匹配链加参数表。
///
/// # 契约说明（What）
/// - `matched`：有序匹配链，根在前叶在后；空链表示“无匹配”，差分对其有定义；
/// - `params`：参数快照，键名空间跨节点共享。
///
/// # 风险提示（Trade-offs）
/// - 结构体自身不可变；导航间的共享通过 `Arc<RouteState>` 完成，避免在守卫
///   并发执行期间出现写竞争。
#[derive(Clone, Debug)]
pub struct RouteState {
    matched: Vec<Arc<RouteNode>>,
    params: Params,
}

impl RouteState {
    /// 以匹配链与参数构造快照。
    pub fn new(matched: Vec<Arc<RouteNode>>, params: Params) -> Self {
        Self { matched, params }
    }

    /// 返回有序匹配链。
    pub fn matched(&self) -> &[Arc<RouteNode>] {
        &self.matched
    }

    /// 返回参数快照。
    pub fn params(&self) -> &Params {
        &self.params
    }
}
