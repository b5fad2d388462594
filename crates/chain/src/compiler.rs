//! Chain compiler (C7, §4.6): turns `(sender, chain-with-dpi, match
//! fields, vlan, key)` into a sequence of flow installs and a trail.

use tracing::warn;
use tsa_core::{MatchField, TsaError};
use tsa_graph::GraphStore;
use tsa_topology::AttachmentRegistry;

use crate::installer::FlowInstaller;
use crate::record::{sentinel, ChainRecord};

pub struct ChainCompiler<'a> {
    pub graph: &'a mut GraphStore,
    pub registry: &'a AttachmentRegistry,
    pub installer: &'a dyn FlowInstaller,
}

impl<'a> ChainCompiler<'a> {
    pub fn new(graph: &'a mut GraphStore, registry: &'a AttachmentRegistry, installer: &'a dyn FlowInstaller) -> Self {
        Self { graph, registry, installer }
    }

    /// Compile `chain = [dpi_instance, m_i1, ..., m_ik]` for `sender`,
    /// tagged with `vlan` and matched by `fields`. Returns the new
    /// record (§4.6: "Initialize the record for K with (chain, v,
    /// [\"$\"+h])").
    pub async fn compile(
        &mut self,
        sender: &str,
        chain: &[String],
        fields: &[MatchField],
        vlan: u32,
    ) -> Result<ChainRecord, TsaError> {
        let mut record = ChainRecord::new(sender, chain.to_vec(), vlan);

        if let Some(dpi_instance) = chain.first() {
            self.install_to_dpi_instance(&mut record, sender, dpi_instance, fields, vlan).await?;
        }

        for i in 0..chain.len().saturating_sub(1) {
            let is_last_pair = i == chain.len() - 2;
            self.install_between(&mut record, &chain[i], &chain[i + 1], vlan, is_last_pair).await?;
        }

        Ok(record)
    }

    /// Step 1: sender -> DPI instance (§4.6.1).
    async fn install_to_dpi_instance(
        &mut self,
        record: &mut ChainRecord,
        sender: &str,
        instance: &str,
        fields: &[MatchField],
        vlan: u32,
    ) -> Result<(), TsaError> {
        let sender_att = self
            .registry
            .hosts
            .get(sender)
            .cloned()
            .ok_or_else(|| TsaError::NotFound(format!("sender host {}", sender)))?;
        let dst_att = self
            .registry
            .middleboxes
            .get(instance)
            .cloned()
            .ok_or_else(|| TsaError::NotFound(format!("DPI instance {}", instance)))?;

        self.graph.reset_visited();
        let path = self
            .graph
            .path(&sender_att.dpid, &dst_att.dpid)
            .ok_or_else(|| TsaError::NotFound(format!("no path from {} to {}", sender_att.dpid, dst_att.dpid)))?;

        if path.len() == 1 {
            self.try_push(record, &path[0], vlan, dst_att.port, Some(sender_att.port), fields).await;
            return Ok(());
        }

        let mut in_port = Some(sender_att.port);
        for j in 0..path.len() - 1 {
            let out_port = self.graph.port_to(&path[j], &path[j + 1]).unwrap_or(0);
            if j == 0 {
                self.try_push(record, &path[j], vlan, out_port, in_port, fields).await;
            } else {
                self.try_match(record, &path[j], vlan, out_port, in_port).await;
            }
            in_port = self.graph.port_to(&path[j + 1], &path[j]);
        }
        self.try_match(record, path.last().unwrap(), vlan, dst_att.port, in_port).await;
        Ok(())
    }

    /// Step 2/3: `a -> b` leg between consecutive chain members (§4.6.2/3).
    async fn install_between(
        &mut self,
        record: &mut ChainRecord,
        a: &str,
        b: &str,
        vlan: u32,
        is_last_pair: bool,
    ) -> Result<(), TsaError> {
        let Some(src_att) = self.registry.middleboxes.get(a).cloned() else {
            return Ok(());
        };
        let dst_att = self
            .registry
            .middleboxes
            .get(b)
            .cloned()
            .ok_or_else(|| TsaError::NotFound(format!("middlebox {}", b)))?;

        record.install_trail.push(sentinel(a));

        self.graph.reset_visited();
        let path = self
            .graph
            .path(&src_att.dpid, &dst_att.dpid)
            .ok_or_else(|| TsaError::NotFound(format!("no path from {} to {}", src_att.dpid, dst_att.dpid)))?;

        if path.len() == 1 {
            if is_last_pair {
                self.try_pop(record, &path[0], vlan, dst_att.port, src_att.port).await;
            } else {
                self.try_match(record, &path[0], vlan, dst_att.port, Some(src_att.port)).await;
            }
            return Ok(());
        }

        let mut in_port = Some(src_att.port);
        for j in 0..path.len() - 1 {
            let out_port = self.graph.port_to(&path[j], &path[j + 1]).unwrap_or(0);
            self.try_match(record, &path[j], vlan, out_port, in_port).await;
            in_port = self.graph.port_to(&path[j + 1], &path[j]);
        }

        let last_switch = path.last().unwrap();
        if is_last_pair {
            self.try_pop(record, last_switch, vlan, dst_att.port, in_port.unwrap_or(0)).await;
        } else {
            self.try_match(record, last_switch, vlan, dst_att.port, in_port).await;
        }
        Ok(())
    }

    async fn try_push(
        &self,
        record: &mut ChainRecord,
        dpid: &str,
        vlan: u32,
        out_port: u32,
        in_port: Option<u32>,
        fields: &[MatchField],
    ) {
        if let Err(e) = self.installer.install_vlan_push(dpid, vlan, out_port, in_port, fields).await {
            warn!(dpid, error = %e, "failed to install vlan-push rule");
        }
        record.install_trail.push(dpid.to_string());
    }

    async fn try_match(&self, record: &mut ChainRecord, dpid: &str, vlan: u32, out_port: u32, in_port: Option<u32>) {
        if let Err(e) = self.installer.install_vlan_match(dpid, vlan, out_port, in_port).await {
            warn!(dpid, error = %e, "failed to install vlan-match rule");
        }
        record.install_trail.push(dpid.to_string());
    }

    async fn try_pop(&self, record: &mut ChainRecord, dpid: &str, vlan: u32, out_port: u32, in_port: u32) {
        if let Err(e) = self.installer.install_vlan_pop(dpid, vlan, out_port, in_port).await {
            warn!(dpid, error = %e, "failed to install vlan-pop rule");
        }
        record.install_trail.push(dpid.to_string());
    }
}
