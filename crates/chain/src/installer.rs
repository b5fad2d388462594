//! Rule installer (C6, §4.5): emits flow-entry add/delete requests to
//! the SDN controller. Modeled as a trait so the compiler and rewriter
//! can be exercised against a fake backend in tests, instead of one
//! concrete struct hard-wired to a live SDN controller.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use tsa_core::{MatchField, TsaError, FLOW_DEFAULT_PRIORITY};

#[async_trait]
pub trait FlowInstaller: Send + Sync {
    /// Plain VLAN match, steering already-tagged traffic onward.
    async fn install_vlan_match(
        &self,
        dpid: &str,
        vlan: u32,
        out_port: u32,
        in_port: Option<u32>,
    ) -> Result<(), TsaError>;

    /// Tag untagged traffic entering the fabric with `vlan`.
    async fn install_vlan_push(
        &self,
        dpid: &str,
        vlan: u32,
        out_port: u32,
        in_port: Option<u32>,
        fields: &[MatchField],
    ) -> Result<(), TsaError>;

    /// Strip the VLAN tag as traffic leaves the fabric at the final hop.
    async fn install_vlan_pop(
        &self,
        dpid: &str,
        vlan: u32,
        out_port: u32,
        in_port: u32,
    ) -> Result<(), TsaError>;

    /// Delete every flow on `dpid` matching the given full match fields
    /// (used for the first hop of an uninstall, §4.8).
    async fn delete_by_match_fields(&self, dpid: &str, fields: &[MatchField]) -> Result<(), TsaError>;

    /// Delete every flow on `dpid` tagged with `vlan` (used for every
    /// hop after the first during an uninstall, §4.8).
    async fn delete_by_vlan(&self, dpid: &str, vlan: u32) -> Result<(), TsaError>;
}

/// `reqwest`-backed [`FlowInstaller`] talking to the SDN controller's
/// `/stats/flowentry/{add,delete}` endpoints.
pub struct SdnFlowInstaller {
    client: reqwest::Client,
    base_url: String,
}

impl SdnFlowInstaller {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn dpid_decimal(dpid: &str) -> Result<u64, TsaError> {
        u64::from_str_radix(dpid, 16).map_err(|e| TsaError::Config(format!("invalid dpid {}: {}", dpid, e)))
    }

    async fn post(&self, path: &str, body: Value) -> Result<(), TsaError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, body = %body, "posting flow entry");
        self.client.post(&url).json(&body).send().await?.error_for_status()?;
        Ok(())
    }

    async fn add(&self, dpid: &str, match_: BTreeMap<String, String>, actions: Vec<Value>) -> Result<(), TsaError> {
        let body = json!({
            "dpid": Self::dpid_decimal(dpid)?,
            "priority": FLOW_DEFAULT_PRIORITY,
            "match": match_,
            "actions": actions,
        });
        self.post("/stats/flowentry/add", body).await
    }

    async fn delete(&self, dpid: &str, match_: BTreeMap<String, String>) -> Result<(), TsaError> {
        let body = json!({
            "dpid": Self::dpid_decimal(dpid)?,
            "match": match_,
        });
        self.post("/stats/flowentry/delete", body).await
    }
}

fn output_action(port: u32) -> Value {
    json!({"type": "OUTPUT", "port": port.to_string()})
}

fn set_vlan_action(vlan: u32) -> Value {
    json!({"type": "SET_VLAN_VID", "vlan_vid": vlan.to_string()})
}

fn strip_vlan_action() -> Value {
    json!({"type": "STRIP_VLAN"})
}

fn vlan_match(vlan: u32, in_port: Option<u32>) -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert("dl_vlan".to_string(), vlan.to_string());
    if let Some(p) = in_port {
        m.insert("in_port".to_string(), p.to_string());
    }
    m
}

#[async_trait]
impl FlowInstaller for SdnFlowInstaller {
    async fn install_vlan_match(
        &self,
        dpid: &str,
        vlan: u32,
        out_port: u32,
        in_port: Option<u32>,
    ) -> Result<(), TsaError> {
        self.add(dpid, vlan_match(vlan, in_port), vec![output_action(out_port)]).await
    }

    async fn install_vlan_push(
        &self,
        dpid: &str,
        vlan: u32,
        out_port: u32,
        in_port: Option<u32>,
        fields: &[MatchField],
    ) -> Result<(), TsaError> {
        let mut match_ = tsa_core::match_fields::full_match_fields(fields);
        if let Some(p) = in_port {
            match_.insert("in_port".to_string(), p.to_string());
        }
        self.add(
            dpid,
            match_,
            vec![set_vlan_action(vlan), output_action(out_port)],
        )
        .await
    }

    async fn install_vlan_pop(
        &self,
        dpid: &str,
        vlan: u32,
        out_port: u32,
        in_port: u32,
    ) -> Result<(), TsaError> {
        self.add(
            dpid,
            vlan_match(vlan, Some(in_port)),
            vec![strip_vlan_action(), output_action(out_port)],
        )
        .await
    }

    async fn delete_by_match_fields(&self, dpid: &str, fields: &[MatchField]) -> Result<(), TsaError> {
        let match_ = tsa_core::match_fields::full_match_fields(fields);
        self.delete(dpid, match_).await
    }

    async fn delete_by_vlan(&self, dpid: &str, vlan: u32) -> Result<(), TsaError> {
        self.delete(dpid, vlan_match(vlan, None)).await
    }
}
