//! 流表规则的 XML 载荷模板
//!
//! 生成一条 "按目的 MAC 从指定端口转出" 的 OpenFlow 规则。
//! 控制回路只把结果当作不透明字符串传给控制器。

use crate::net::{MacAddr, PortNo};

pub const DEFAULT_TABLE_ID: u8 = 0;
pub const DEFAULT_PRIORITY: u16 = 2000;

/// IPv4 的 ethernet type
const ETH_TYPE_IPV4: u16 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTemplate {
    pub table_id: u8,
    pub priority: u16,
}

impl Default for FlowTemplate {
    fn default() -> Self {
        Self {
            table_id: DEFAULT_TABLE_ID,
            priority: DEFAULT_PRIORITY,
        }
    }
}

impl FlowTemplate {
    pub fn new(table_id: u8, priority: u16) -> Self {
        Self { table_id, priority }
    }

    pub fn render(&self, flow_id: &str, port: PortNo, mac: &MacAddr) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<flow xmlns="urn:opendaylight:flow:inventory">
    <flow-name>flow_{flow_id}</flow-name>
    <id>{flow_id}</id>
    <table_id>{table_id}</table_id>
    <priority>{priority}</priority>
    <instructions>
        <instruction>
            <order>0</order>
            <apply-actions>
                <action>
                    <order>0</order>
                    <output-action>
                        <output-node-connector>{port}</output-node-connector>
                        <max-length>65535</max-length>
                    </output-action>
                </action>
            </apply-actions>
        </instruction>
    </instructions>
    <match>
        <ethernet-match>
            <ethernet-type>
                <type>{eth_type}</type>
            </ethernet-type>
            <ethernet-destination>
                <address>{mac}</address>
            </ethernet-destination>
        </ethernet-match>
    </match>
</flow>
"#,
            table_id = self.table_id,
            priority = self.priority,
            eth_type = ETH_TYPE_IPV4,
        )
    }
}
