//! 已安装规则登记表
//!
//! 记录当前认为在控制器上生效的全部规则，是 teardown 的唯一依据。
//! 只有在对应的控制器调用成功之后才修改。

use std::collections::BTreeSet;

use crate::flow::FlowKey;

#[derive(Debug, Default, Clone)]
pub struct InstalledFlows {
    flows: BTreeSet<FlowKey>,
}

impl InstalledFlows {
    pub fn record(&mut self, key: FlowKey) -> bool {
        self.flows.insert(key)
    }

    pub fn forget(&mut self, key: &FlowKey) -> bool {
        self.flows.remove(key)
    }

    pub fn contains(&self, key: &FlowKey) -> bool {
        self.flows.contains(key)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlowKey> {
        self.flows.iter()
    }

    /// 拷贝出当前条目，便于边遍历边修改登记表
    pub fn to_vec(&self) -> Vec<FlowKey> {
        self.flows.iter().cloned().collect()
    }
}
