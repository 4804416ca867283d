//! 最短路径计算
//!
//! 对每个源主机在当前边权重上跑一次 Dijkstra，得到到所有其他主机的
//! 最短路径。主机只作为路径端点，不作为中转节点。
//! 等权路径的选择由节点下标顺序决定，调用方不应依赖具体的 tie-break。

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::id::NodeId;
use super::topology::Topology;
use tracing::{debug, trace};

/// 一条主机到主机的路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// 节点序列，首尾为主机；由 `ShortestPathTree::path_to` 构造时至少含一个节点
    pub hops: Vec<NodeId>,
    /// 沿路径的边权重之和
    pub cost: u64,
}

impl Path {
    pub fn src(&self) -> NodeId {
        self.hops[0]
    }

    pub fn dst(&self) -> NodeId {
        self.hops[self.hops.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

/// 单源最短路径树
#[derive(Debug, Clone)]
pub struct ShortestPathTree {
    pub source: NodeId,
    dist: Vec<Option<u64>>,
    prev: Vec<Option<NodeId>>,
}

impl ShortestPathTree {
    pub fn distance(&self, to: NodeId) -> Option<u64> {
        self.dist[to.0]
    }

    /// 回溯得到 source -> `to` 的节点序列；不可达时返回 None。
    pub fn path_to(&self, to: NodeId) -> Option<Path> {
        let cost = self.dist[to.0]?;
        let mut hops = vec![to];
        let mut cur = to;
        while let Some(p) = self.prev[cur.0] {
            hops.push(p);
            cur = p;
        }
        hops.reverse();
        Some(Path { hops, cost })
    }
}

// BinaryHeap 是 max-heap；我们需要最小代价优先，因此反向比较。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frontier {
    cost: u64,
    node: NodeId,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.cost.cmp(&other.cost) {
            Ordering::Equal => self.node.cmp(&other.node),
            ord => ord,
        }
        .reverse()
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 以 `source` 为根跑 Dijkstra
pub fn shortest_path_tree(topo: &Topology, source: NodeId) -> ShortestPathTree {
    let n = topo.node_count();
    let mut dist: Vec<Option<u64>> = vec![None; n];
    let mut prev: Vec<Option<NodeId>> = vec![None; n];
    let mut done = vec![false; n];
    let mut q = BinaryHeap::new();

    dist[source.0] = Some(0);
    q.push(Frontier {
        cost: 0,
        node: source,
    });

    while let Some(Frontier { cost, node }) = q.pop() {
        if done[node.0] {
            continue;
        }
        done[node.0] = true;

        // 主机不转发流量
        if node != source && topo.node(node).is_host() {
            continue;
        }

        for &next in topo.neighbors(node) {
            let Some(w) = topo.weight(node, next) else {
                continue;
            };
            let cand = cost.saturating_add(w);
            if dist[next.0].is_none_or(|d| cand < d) {
                dist[next.0] = Some(cand);
                prev[next.0] = Some(node);
                q.push(Frontier {
                    cost: cand,
                    node: next,
                });
            }
        }
    }

    ShortestPathTree { source, dist, prev }
}

/// 计算所有有序主机对的最短路径。
///
/// 不可达的主机对不出现在结果中；长度小于 2 的路径被丢弃。
#[tracing::instrument(skip(topo))]
pub fn shortest_paths(topo: &Topology) -> Vec<Path> {
    let hosts: Vec<NodeId> = topo.hosts().map(|h| h.id).collect();
    let mut paths = Vec::new();
    let mut unreachable = 0usize;

    for &src in &hosts {
        let tree = shortest_path_tree(topo, src);
        for &dst in &hosts {
            if dst == src {
                continue;
            }
            match tree.path_to(dst) {
                Some(p) if p.len() > 1 => {
                    trace!(path = ?topo.names(&p.hops), cost = p.cost, "最短路径");
                    paths.push(p);
                }
                _ => unreachable += 1,
            }
        }
    }

    debug!(paths = paths.len(), unreachable, "最短路径计算完成");
    paths
}
