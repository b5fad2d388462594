//! Shapes of the SDN controller's REST API (§6).

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchPort {
    pub name: String,
    #[serde(default)]
    pub port_no: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchEntry {
    pub dpid: String,
    pub ports: Vec<SwitchPort>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkEndpoint {
    pub dpid: String,
    pub port_no: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkEntry {
    pub src: LinkEndpoint,
    pub dst: LinkEndpoint,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowEntry {
    #[serde(rename = "match")]
    pub match_: std::collections::HashMap<String, String>,
    pub actions: Vec<String>,
}
