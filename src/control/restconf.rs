//! 基于 RESTCONF 的控制器客户端
//!
//! 拓扑从 operational 数据库读取；规则写入 config 数据库，
//! 计数器从 operational 数据库中对应规则的统计信息读取。

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use super::controller::Controller;
use crate::config::ControllerConfig;
use crate::error::{Error, Result};
use crate::net::TopologyDocument;
use tracing::{debug, info, warn};

const TOPOLOGY_PATH: &str = "/network-topology:network-topology";

pub struct RestconfController {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    table_id: u8,
}

impl RestconfController {
    pub fn new(cfg: &ControllerConfig, table_id: u8) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| Error::Controller(e.to_string()))?;
        Ok(Self {
            client,
            base_url: cfg.base_url(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            table_id,
        })
    }

    fn config_url(&self, tail: &str) -> String {
        format!("{}/restconf/config{}", self.base_url, tail)
    }

    fn operational_url(&self, tail: &str) -> String {
        format!("{}/restconf/operational{}", self.base_url, tail)
    }

    pub fn flow_path(&self, switch: &str, flow_id: &str) -> String {
        flow_path(switch, self.table_id, flow_id)
    }

    fn send(&self, req: reqwest::blocking::RequestBuilder) -> Result<Response> {
        req.basic_auth(&self.username, Some(&self.password))
            .send()
            .map_err(|e| Error::Controller(e.to_string()))
    }
}

/// config/operational 数据库中一条规则的相对路径
pub fn flow_path(switch: &str, table_id: u8, flow_id: &str) -> String {
    format!(
        "/opendaylight-inventory:nodes/node/{switch}/flow-node-inventory:table/{table_id}/flow/{flow_id}"
    )
}

/// 计数器查询得到该状态码时视为“暂不可用”：规则刚下发时
/// operational 数据库里还没有它。其他失败状态都是真正的错误。
pub fn counter_pending(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND
}

/// 从 operational 规则文档中取出包计数；没有统计信息时返回 None。
pub fn parse_packet_count(raw: &str) -> Option<u64> {
    #[derive(Deserialize)]
    struct FlowDocument {
        #[serde(rename = "flow-node-inventory:flow", default)]
        flow: Vec<FlowRecord>,
    }

    #[derive(Deserialize)]
    struct FlowRecord {
        #[serde(rename = "opendaylight-flow-statistics:flow-statistics", default)]
        statistics: Option<FlowStatistics>,
    }

    #[derive(Deserialize)]
    struct FlowStatistics {
        #[serde(rename = "packet-count")]
        packet_count: u64,
    }

    let doc: FlowDocument = serde_json::from_str(raw).ok()?;
    doc.flow
        .into_iter()
        .next()
        .and_then(|f| f.statistics)
        .map(|s| s.packet_count)
}

fn describe_failure(status: StatusCode, resp: Response) -> String {
    let body = resp.text().unwrap_or_default();
    format!("server returned {status}: {}", body.trim())
}

impl Controller for RestconfController {
    fn topology_snapshot(&mut self) -> Result<TopologyDocument> {
        let url = self.operational_url(TOPOLOGY_PATH);
        debug!(url = %url, "获取拓扑");
        let resp = self
            .send(self.client.get(&url))
            .map_err(|e| Error::TopologyUnavailable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::TopologyUnavailable(describe_failure(status, resp)));
        }
        let raw = resp
            .text()
            .map_err(|e| Error::TopologyUnavailable(e.to_string()))?;
        TopologyDocument::from_json(&raw)
    }

    fn install_flow(&mut self, switch: &str, flow_id: &str, payload: &str) -> Result<()> {
        let url = self.config_url(&self.flow_path(switch, flow_id));
        let resp = self.send(
            self.client
                .put(&url)
                .header(CONTENT_TYPE, "application/xml")
                .body(payload.to_string()),
        )?;
        let status = resp.status();
        if status.is_success() {
            info!(switch, flow_id, "➕ 规则已安装");
            Ok(())
        } else {
            let reason = describe_failure(status, resp);
            warn!(switch, flow_id, reason = %reason, "规则安装失败");
            Err(Error::Controller(reason))
        }
    }

    fn delete_flow(&mut self, switch: &str, flow_id: &str) -> Result<()> {
        let url = self.config_url(&self.flow_path(switch, flow_id));
        let resp = self.send(self.client.delete(&url))?;
        let status = resp.status();
        if status.is_success() {
            info!(switch, flow_id, "➖ 规则已删除");
            Ok(())
        } else {
            let reason = describe_failure(status, resp);
            warn!(switch, flow_id, reason = %reason, "规则删除失败");
            Err(Error::Controller(reason))
        }
    }

    fn flow_packet_count(&mut self, switch: &str, flow_id: &str) -> Result<Option<u64>> {
        let url = self.operational_url(&self.flow_path(switch, flow_id));
        let resp = self.send(self.client.get(&url))?;
        let status = resp.status();
        if counter_pending(status) {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Controller(describe_failure(status, resp)));
        }
        let raw = resp.text().map_err(|e| Error::Controller(e.to_string()))?;
        Ok(parse_packet_count(&raw))
    }
}
