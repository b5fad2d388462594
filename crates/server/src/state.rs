//! Server-owned aggregate state (§9: "The server, graph, and store are
//! a single owned aggregate constructed at startup"). One `TsaState`
//! lives for the process lifetime behind the single mutex that
//! serializes command handling (§5).

use serde_json::json;
use tracing::{info, warn};
use tsa_chain::{rewriter, uninstall, ChainCompiler, ChainStore, SdnFlowInstaller};
use tsa_core::{Config, TsaError};
use tsa_graph::GraphStore;
use tsa_topology::{AttachmentRegistry, TopologyLoader};

use crate::commands;
use crate::protocol::{self, Response};

pub struct TsaState {
    pub config: Config,
    pub graph: GraphStore,
    pub registry: AttachmentRegistry,
    pub store: ChainStore,
    pub installer: SdnFlowInstaller,
    http: reqwest::Client,
    topology_loader: TopologyLoader,
}

impl TsaState {
    pub fn new(config: Config) -> Self {
        let topology_loader = TopologyLoader::new(config.sdn_controller_url.clone());
        let installer = SdnFlowInstaller::new(config.sdn_controller_url.clone());
        Self {
            config,
            graph: GraphStore::new(),
            registry: AttachmentRegistry::default(),
            store: ChainStore::new(),
            installer,
            http: reqwest::Client::new(),
            topology_loader,
        }
    }

    /// If the registry isn't ready, refresh C2+C3 once; still not
    /// ready afterwards is `NotReady`. Called once ahead of every
    /// command dispatch, not per-handler.
    pub async fn ensure_ready(&mut self) -> Result<(), TsaError> {
        if self.registry.is_ready() {
            return Ok(());
        }
        self.refresh_topology().await?;
        if !self.registry.is_ready() {
            return Err(TsaError::NotReady);
        }
        Ok(())
    }

    async fn refresh_topology(&mut self) -> Result<(), TsaError> {
        let (graph, switches) = self.topology_loader.load().await?;
        self.graph = graph;

        let config_contents = tokio::fs::read_to_string(&self.config.config_file)
            .await
            .map_err(TsaError::Io)?;
        self.registry = AttachmentRegistry::load(&self.http, &self.config.sdn_controller_url, &switches, &config_contents).await?;

        info!(ready = self.registry.is_ready(), "topology and registry refreshed");
        Ok(())
    }

    pub async fn handle_add_policy_chain(&mut self, body: &str) -> Result<Response, TsaError> {
        let (sender, user_chain, fields) = match commands::parse_chain_command(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "failed to parse add policy chain command");
                return Ok(Response::failed("Failed to add policy chain."));
            }
        };
        let display = display_chain(&sender, &user_chain);

        let pcid = self.store.peek_pcid();
        let dpi_args = json!({
            "policy chain": user_chain.join(","),
            "pcid": pcid.to_string(),
        });
        let dpi_response = protocol::send_request(self.config.dpi_controller_addr, "addpolicychaincommand", dpi_args).await?;
        if !dpi_response.is_success() {
            return Ok(Response::failed(format!("Failed to add policy chain: {}.", display)));
        }

        let chain_with_dpi: Vec<String> = dpi_response
            .data
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let vlan = self.store.alloc_vlan();
        let key = tsa_chain::key::generate(&sender, &user_chain, &fields);

        let mut compiler = ChainCompiler::new(&mut self.graph, &self.registry, &self.installer);
        let record = compiler.compile(&sender, &chain_with_dpi, &fields, vlan).await?;

        let committed_pcid = self.store.alloc_pcid();
        debug_assert_eq!(committed_pcid, pcid, "pcid must not have been consumed elsewhere between peek and commit");
        self.store.insert(key, committed_pcid, record);

        Ok(Response::success(format!(
            "Policy chain: {} was added successfully. vlanId is: {}",
            display, vlan
        )))
    }

    pub async fn handle_remove_policy_chain(&mut self, body: &str) -> Result<Response, TsaError> {
        let (sender, user_chain, fields) = match commands::parse_chain_command(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "failed to parse remove policy chain command");
                return Ok(Response::failed("Failed to remove policy chain."));
            }
        };
        let display = display_chain(&sender, &user_chain);
        let key = tsa_chain::key::generate(&sender, &user_chain, &fields);

        let Some(record) = self.store.get(&key).cloned() else {
            return Ok(Response::failed(format!("Failed to remove policy chain: {}.", display)));
        };
        let pcid = self.store.pcid_of(&key);

        if let Some(pcid) = pcid {
            let dpi_args = json!({
                "policy chain": record.chain.join(","),
                "pcid": pcid.to_string(),
            });
            // Best-effort: removal proceeds locally regardless of this result.
            if let Err(e) = protocol::send_request(self.config.dpi_controller_addr, "removepolicychaincommand", dpi_args).await {
                warn!(error = %e, "DPI controller notification failed, removing locally anyway");
            }
        }

        uninstall::uninstall(&record, &fields, &self.installer).await;
        self.store.remove(&key);

        Ok(Response::success(format!("Policy chain: {} was removed successfully.", display)))
    }

    pub async fn handle_unregister_middlebox(&mut self, middlebox: &str) -> Result<Response, TsaError> {
        let middlebox = middlebox.trim();
        let failures = rewriter::unregister_middlebox(middlebox, &mut self.store, &mut self.graph, &self.registry, &self.installer).await;

        if failures.is_empty() {
            return Ok(Response::success(""));
        }
        let failed_keys: Vec<String> = failures.into_iter().map(|(key, _)| key).collect();
        Ok(Response::failed(format!(
            "Failed to remove middlebox {} from the following policy chains: {}.",
            middlebox,
            failed_keys.join(",")
        )))
    }

    pub async fn handle_replace_dpi_instance(&mut self, body: &str) -> Result<Response, TsaError> {
        let (instance, pcid) = commands::parse_replace_command(body)?;
        match rewriter::replace_dpi_instance(pcid, &instance, &mut self.store, &mut self.graph, &self.registry, &self.installer).await {
            Ok(()) => Ok(Response::success("DPI instance was replaced successfully.")),
            Err(e) => {
                warn!(error = %e, pcid, "replace dpi instance failed");
                Ok(Response::failed("Failed to replace dpi instance."))
            }
        }
    }

    pub async fn forward_to_dpi_controller(&self, command: &str) -> Result<Response, TsaError> {
        protocol::send_request(self.config.dpi_controller_addr, command, json!({})).await?;
        Ok(Response::success(""))
    }
}

fn display_chain(sender: &str, user_chain: &[String]) -> String {
    std::iter::once(sender.to_string()).chain(user_chain.iter().cloned()).collect::<Vec<_>>().join(",")
}
