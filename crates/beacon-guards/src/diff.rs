//! # diff 模块说明
//!
//! ## 角色定位（Why）
//! - 守卫编排的一切判断都建立在“这次导航对每个节点意味着什么”之上；
//!   本模块把 `(to, from)` 两条匹配链折算为离开 / 进入 / 停留 / 更新四个
//!   有序节点集，是整条管线中唯一的纯函数层。
//!
//! ## 核心契约（What）
//! - 集合代数按 [`RouteId`] 身份进行：`leaved = from − to`、`entered = to − from`、
//!   `stayed = to ∩ from`；`updated ⊆ stayed`，为依赖参数发生取值变化的停留节点；
//! - 顺序保留：`leaved` 沿 `from` 链顺序，其余沿 `to` 链顺序；
//! - 空链输入产生空集，纯函数、同输入幂等。
//!
//! ## 实现策略（How）
//! - 参数变更集取 **双向** 递归结构差分的并集：映射型参数无论增键还是减键，
//!   单向差分都会漏掉其中一侧，双向并集补齐该盲区；
//! - 变更路径的根段集合与节点声明的参数名求交，决定 `updated` 成员资格。

use std::collections::BTreeSet;
use std::sync::Arc;

use beacon_core::{ParamValue, Params, RouteId, RouteNode, Transition};

/// 一次转换的四向节点分类结果。
///
/// # 契约说明（What）
/// - 四个集合均持有 `Arc<RouteNode>` 克隆，生命周期与本结构绑定；
/// - `entered ∩ leaved = ∅` 恒成立；`updated` 是 `stayed` 的子序列。
#[derive(Debug)]
pub struct TransitionDiff {
    leaved: Vec<Arc<RouteNode>>,
    entered: Vec<Arc<RouteNode>>,
    stayed: Vec<Arc<RouteNode>>,
    updated: Vec<Arc<RouteNode>>,
}

impl TransitionDiff {
    /// 对一次转换求四向分类。
    ///
    /// # 行为概览（How）
    /// 1. 以两条链的 `RouteId` 集合做成员判定，线性扫描保序收集三个基础集合；
    /// 2. 对参数快照求双向结构差分，得到变更路径的根段集合；
    /// 3. 停留节点中声明参数与变更根段相交者进入 `updated`。
    pub fn compute(transition: &Transition) -> Self {
        let to = transition.to().matched();
        let from = transition.from().matched();

        let to_ids: BTreeSet<&RouteId> = to.iter().map(|node| node.id()).collect();
        let from_ids: BTreeSet<&RouteId> = from.iter().map(|node| node.id()).collect();

        let leaved: Vec<Arc<RouteNode>> = from
            .iter()
            .filter(|node| !to_ids.contains(node.id()))
            .cloned()
            .collect();
        let entered: Vec<Arc<RouteNode>> = to
            .iter()
            .filter(|node| !from_ids.contains(node.id()))
            .cloned()
            .collect();
        let stayed: Vec<Arc<RouteNode>> = to
            .iter()
            .filter(|node| from_ids.contains(node.id()))
            .cloned()
            .collect();

        let changed_roots = changed_param_roots(
            transition.from().params(),
            transition.to().params(),
        );
        let updated: Vec<Arc<RouteNode>> = stayed
            .iter()
            .filter(|node| node.param_keys().any(|key| changed_roots.contains(key)))
            .cloned()
            .collect();

        Self {
            leaved,
            entered,
            stayed,
            updated,
        }
    }

    /// 仅出现在 `from` 链中的节点。
    pub fn leaved(&self) -> &[Arc<RouteNode>] {
        &self.leaved
    }

    /// 仅出现在 `to` 链中的节点。
    pub fn entered(&self) -> &[Arc<RouteNode>] {
        &self.entered
    }

    /// 同时出现在两条链中的节点。
    pub fn stayed(&self) -> &[Arc<RouteNode>] {
        &self.stayed
    }

    /// 停留节点中依赖参数发生变化者。
    pub fn updated(&self) -> &[Arc<RouteNode>] {
        &self.updated
    }
}

/// 求两个参数快照之间的变更路径集合（双向并集，已去重）。
///
/// # 契约说明（What）
/// - 路径以根到叶的键序列表示；
/// - 某路径“变更”当且仅当：两侧取值不同，或仅存在于其中一侧；
/// - 仅当两侧同为映射时才向下递归，其余类型不匹配视作该路径整体变更。
pub fn double_diff_paths(a: &Params, b: &Params) -> BTreeSet<Vec<String>> {
    let mut out = BTreeSet::new();
    let mut prefix = Vec::new();
    for (key, value) in a.iter() {
        diff_value(Some(value), b.get(key), key, &mut prefix, &mut out);
    }
    for (key, value) in b.iter() {
        diff_value(Some(value), a.get(key), key, &mut prefix, &mut out);
    }
    out
}

fn diff_value(
    ours: Option<&ParamValue>,
    theirs: Option<&ParamValue>,
    key: &str,
    prefix: &mut Vec<String>,
    out: &mut BTreeSet<Vec<String>>,
) {
    match (ours, theirs) {
        (Some(a), Some(b)) if a == b => {}
        (Some(ParamValue::Map(a)), Some(ParamValue::Map(b))) => {
            prefix.push(key.to_owned());
            for (nested_key, nested_value) in a {
                diff_value(Some(nested_value), b.get(nested_key), nested_key, prefix, out);
            }
            prefix.pop();
        }
        _ => {
            let mut path = prefix.clone();
            path.push(key.to_owned());
            out.insert(path);
        }
    }
}

/// 变更路径的根段集合，即“取值发生变化的顶层参数名”。
fn changed_param_roots(from: &Params, to: &Params) -> BTreeSet<String> {
    double_diff_paths(from, to)
        .into_iter()
        .filter_map(|mut path| {
            if path.is_empty() {
                None
            } else {
                Some(path.swap_remove(0))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::collections::BTreeMap;

    use beacon_core::RouteState;

    fn node(name: &'static str) -> Arc<RouteNode> {
        Arc::new(RouteNode::new(RouteId::new(vec![Cow::Borrowed(name)])))
    }

    fn node_with_key(name: &'static str, key: &'static str) -> Arc<RouteNode> {
        Arc::new(
            RouteNode::new(RouteId::new(vec![Cow::Borrowed(name)]))
                .with_param_keys(vec![Cow::Borrowed(key)]),
        )
    }

    fn state(matched: Vec<Arc<RouteNode>>, params: Params) -> Arc<RouteState> {
        Arc::new(RouteState::new(matched, params))
    }

    fn params(pairs: &[(&str, &'static str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), ParamValue::text(*v)))
            .collect()
    }

    #[test]
    fn disjoint_tails_split_into_leaved_and_entered() {
        let a = node("a");
        let b = node("b");
        let c = node("c");
        let t = Transition::new(
            state(vec![Arc::clone(&a), Arc::clone(&c)], Params::new()),
            state(vec![Arc::clone(&a), Arc::clone(&b)], Params::new()),
        );

        let diff = TransitionDiff::compute(&t);
        let ids = |nodes: &[Arc<RouteNode>]| -> Vec<String> {
            nodes.iter().map(|n| n.id().to_string()).collect()
        };
        assert_eq!(ids(diff.leaved()), ["/b"]);
        assert_eq!(ids(diff.entered()), ["/c"]);
        assert_eq!(ids(diff.stayed()), ["/a"]);
        assert!(diff.updated().is_empty());
    }

    #[test]
    fn stayed_node_updates_only_when_it_depends_on_changed_param() {
        let watcher = node_with_key("detail", "id");
        let bystander = node("list");
        let from = state(
            vec![Arc::clone(&bystander), Arc::clone(&watcher)],
            params(&[("id", "1")]),
        );
        let to = state(
            vec![Arc::clone(&bystander), Arc::clone(&watcher)],
            params(&[("id", "2")]),
        );

        let diff = TransitionDiff::compute(&Transition::new(to, from));
        assert_eq!(diff.updated().len(), 1);
        assert_eq!(diff.updated()[0].id().to_string(), "/detail");
    }

    #[test]
    fn unchanged_params_produce_no_updates() {
        let watcher = node_with_key("detail", "id");
        let from = state(vec![Arc::clone(&watcher)], params(&[("id", "1")]));
        let to = state(vec![Arc::clone(&watcher)], params(&[("id", "1")]));

        let diff = TransitionDiff::compute(&Transition::new(to, from));
        assert!(diff.updated().is_empty());
    }

    #[test]
    fn empty_chains_yield_empty_sets() {
        let t = Transition::new(
            state(Vec::new(), Params::new()),
            state(Vec::new(), Params::new()),
        );
        let diff = TransitionDiff::compute(&t);
        assert!(diff.leaved().is_empty());
        assert!(diff.entered().is_empty());
        assert!(diff.stayed().is_empty());
        assert!(diff.updated().is_empty());
    }

    #[test]
    fn shrinking_map_param_is_seen_by_backward_diff() {
        // 单向差分只会看到新快照里的键；删除的键必须靠反向差分补齐。
        let mut big = BTreeMap::new();
        big.insert("page".to_owned(), ParamValue::text("1"));
        big.insert("sort".to_owned(), ParamValue::text("asc"));
        let mut small = BTreeMap::new();
        small.insert("page".to_owned(), ParamValue::text("1"));

        let mut from = Params::new();
        from.insert("filter", ParamValue::Map(big));
        let mut to = Params::new();
        to.insert("filter", ParamValue::Map(small));

        let changed = double_diff_paths(&from, &to);
        assert!(changed.contains(&vec!["filter".to_owned(), "sort".to_owned()]));
        assert_eq!(changed.len(), 1);
    }

    #[test]
    fn type_mismatch_marks_whole_path_changed() {
        let mut from = Params::new();
        from.insert("q", ParamValue::text("plain"));
        let mut to = Params::new();
        let mut nested = BTreeMap::new();
        nested.insert("term".to_owned(), ParamValue::text("plain"));
        to.insert("q", ParamValue::Map(nested));

        let changed = double_diff_paths(&from, &to);
        assert!(changed.contains(&vec!["q".to_owned()]));
    }
}
