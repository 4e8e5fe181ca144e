//! Discovery mesh for the block/proposal/transaction sync side channel.
//!
//! Each node runs a sync daemon that must know every node's device id. The
//! per-node configuration is rendered from an immutable base template by
//! streaming it through [`quick_xml`] and splicing in:
//!
//! - one `<device>` binding per node inside every top-level `<folder>`,
//! - one top-level `<device>` entry per node carrying its address,
//! - a GUI `<apikey>` equal to the cluster name.
//!
//! The node's own entry uses the `dynamic` address; every other node is
//! reached over the cluster's transport (`quic` for co-located clusters, `tcp`
//! for federated ones).

use std::fmt;
use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use serde::Serialize;

use crate::error::ProvisionError;
use crate::topology::{ClusterMode, NodeIndex};

/// Length of a device identifier.
pub const DEVICE_ID_LEN: usize = 63;

const DEFAULT_TEMPLATE: &str = include_str!("../templates/discovery-config.xml");

/// Device identifier issued by the discovery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate a device identifier: exactly 63 characters of upper-case
    /// letters, digits and dashes.
    pub fn parse(raw: &str) -> Result<Self, ProvisionError> {
        let valid_chars = raw
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-');
        if raw.len() != DEVICE_ID_LEN || !valid_chars {
            return Err(ProvisionError::CollaboratorOutput {
                tool: "discovery",
                detail: format!("`{raw}` is not a {DEVICE_ID_LEN}-character device id"),
            });
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport scheme used by every device address of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Quic,
    Tcp,
}

impl Transport {
    pub fn for_mode(mode: ClusterMode) -> Self {
        match mode {
            ClusterMode::Local => Self::Quic,
            ClusterMode::Multi => Self::Tcp,
        }
    }

    pub fn scheme(self) -> &'static str {
        match self {
            Self::Quic => "quic",
            Self::Tcp => "tcp",
        }
    }
}

/// A node as seen by the discovery mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryPeer {
    pub host: String,
    pub port: u16,
    pub device_id: DeviceId,
}

/// Base document the per-node configurations are rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryTemplate {
    source: String,
}

impl DiscoveryTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ProvisionError> {
        std::fs::read_to_string(path).map(Self::new).map_err(|e| {
            ProvisionError::Configuration(format!(
                "failed to read discovery template {}: {e}",
                path.display()
            ))
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check that the root element has a `<gui>` section to carry the API key
    /// and declares every folder in `folders`.
    pub fn check(&self, folders: &[String]) -> Result<(), ProvisionError> {
        let mut reader = Reader::from_str(&self.source);
        let mut depth = 0usize;
        let mut saw_gui = false;
        let mut folder_ids = Vec::new();

        loop {
            let (element, opens) = match reader.read_event().map_err(xml_error)? {
                Event::Eof => break,
                Event::Start(start) => (start, true),
                Event::Empty(empty) => (empty, false),
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    continue;
                }
                _ => continue,
            };
            if depth == 1 {
                match element.name().as_ref() {
                    b"gui" => saw_gui = true,
                    b"folder" => {
                        if let Some(id) = element.try_get_attribute("id").map_err(xml_error)? {
                            folder_ids.push(id.unescape_value().map_err(xml_error)?.into_owned());
                        }
                    }
                    _ => {}
                }
            }
            if opens {
                depth += 1;
            }
        }

        if !saw_gui {
            return Err(ProvisionError::Configuration(
                "discovery template has no <gui> section for the API key".to_owned(),
            ));
        }
        if folder_ids.is_empty() {
            return Err(ProvisionError::Configuration(
                "discovery template declares no <folder>".to_owned(),
            ));
        }
        if let Some(missing) = folders.iter().find(|f| !folder_ids.contains(f)) {
            return Err(ProvisionError::Configuration(format!(
                "discovery template has no `{missing}` folder"
            )));
        }
        Ok(())
    }
}

impl Default for DiscoveryTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

/// Full-mesh discovery configuration of one cluster.
#[derive(Debug, Clone)]
pub struct DiscoveryMesh {
    peers: Vec<DiscoveryPeer>,
    transport: Transport,
    api_key: String,
    folders: Vec<String>,
}

impl DiscoveryMesh {
    /// `peers` must be in node-index order. Every id in `folders` must be
    /// declared by the template a node is rendered from.
    pub fn new(
        peers: Vec<DiscoveryPeer>,
        transport: Transport,
        api_key: impl Into<String>,
        folders: Vec<String>,
    ) -> Self {
        Self {
            peers,
            transport,
            api_key: api_key.into(),
            folders,
        }
    }

    /// Address `node` reaches `peer` (at index `peer_index`) at.
    fn device_address(
        &self,
        node: NodeIndex,
        peer_index: NodeIndex,
        peer: &DiscoveryPeer,
    ) -> String {
        if node == peer_index {
            return "dynamic".to_owned();
        }
        format!("{}://{}:{}", self.transport.scheme(), peer.host, peer.port)
    }

    /// Render the configuration of every node, in index order.
    pub fn render_all(&self, template: &DiscoveryTemplate) -> Result<Vec<String>, ProvisionError> {
        NodeIndex::range(self.peers.len())
            .map(|node| self.render(template, node))
            .collect()
    }

    /// Render the configuration of one node.
    pub fn render(
        &self,
        template: &DiscoveryTemplate,
        node: NodeIndex,
    ) -> Result<String, ProvisionError> {
        template.check(&self.folders)?;

        let mut reader = Reader::from_str(template.as_str());
        reader.config_mut().trim_text(true);
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);

        let mut depth = 0usize;
        let mut saw_root = false;
        let mut in_gui = false;
        // Depth of an existing `<apikey>` being dropped from the template.
        let mut skipping: Option<usize> = None;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Eof => break,
                Event::Start(start) => {
                    depth += 1;
                    saw_root = true;
                    let tag = start.name().as_ref().to_vec();
                    if skipping.is_some() {
                        continue;
                    }
                    if in_gui && tag == b"apikey" {
                        skipping = Some(depth);
                        continue;
                    }
                    if depth == 2 && tag == b"gui" {
                        in_gui = true;
                    }
                    write(&mut writer, Event::Start(start))?;
                }
                Event::End(end) => {
                    let tag = end.name().as_ref().to_vec();
                    if let Some(skip_depth) = skipping {
                        if skip_depth == depth {
                            skipping = None;
                        }
                        depth -= 1;
                        continue;
                    }
                    if depth == 2 && tag == b"folder" {
                        self.write_folder_devices(&mut writer)?;
                    }
                    if depth == 2 && tag == b"gui" {
                        self.write_api_key(&mut writer)?;
                        in_gui = false;
                    }
                    if depth == 1 {
                        self.write_devices(&mut writer, node)?;
                    }
                    write(&mut writer, Event::End(end))?;
                    depth -= 1;
                }
                Event::Empty(empty) => {
                    let tag = empty.name().as_ref().to_vec();
                    if skipping.is_some() || (in_gui && tag == b"apikey") {
                        continue;
                    }
                    let level = depth + 1;
                    if level == 2 && (tag == b"folder" || tag == b"gui") {
                        let end = empty.to_end().into_owned();
                        write(&mut writer, Event::Start(empty))?;
                        if tag == b"folder" {
                            self.write_folder_devices(&mut writer)?;
                        } else {
                            self.write_api_key(&mut writer)?;
                        }
                        write(&mut writer, Event::End(end))?;
                    } else {
                        write(&mut writer, Event::Empty(empty))?;
                    }
                }
                other => {
                    if skipping.is_none() {
                        write(&mut writer, other)?;
                    }
                }
            }
        }

        if !saw_root {
            return Err(ProvisionError::Configuration(
                "discovery template has no root element".to_owned(),
            ));
        }

        String::from_utf8(writer.into_inner()).map_err(xml_error)
    }

    fn write_folder_devices(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), ProvisionError> {
        for peer in &self.peers {
            let device = BytesStart::new("device")
                .with_attributes([("id", peer.device_id.as_str()), ("introducedBy", "")]);
            write(writer, Event::Empty(device))?;
        }
        Ok(())
    }

    fn write_devices(
        &self,
        writer: &mut Writer<Vec<u8>>,
        node: NodeIndex,
    ) -> Result<(), ProvisionError> {
        for (index, peer) in self.peers.iter().enumerate() {
            let device = BytesStart::new("device").with_attributes([
                ("id", peer.device_id.as_str()),
                ("name", peer.host.as_str()),
                ("compression", "always"),
                ("introducer", "false"),
                ("skipIntroductionRemovals", "false"),
                ("introducedBy", ""),
            ]);
            write(writer, Event::Start(device))?;
            let address = self.device_address(node, NodeIndex::new(index), peer);
            write_text_element(writer, "address", &address)?;
            write_text_element(writer, "paused", "false")?;
            write_text_element(writer, "autoAcceptFolders", "false")?;
            write_text_element(writer, "maxSendKbps", "0")?;
            write_text_element(writer, "maxRecvKbps", "0")?;
            write_text_element(writer, "maxRequestKiB", "0")?;
            write(writer, Event::End(BytesEnd::new("device")))?;
        }
        Ok(())
    }

    fn write_api_key(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), ProvisionError> {
        write_text_element(writer, "apikey", &self.api_key)
    }
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> Result<(), ProvisionError> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), ProvisionError> {
    writer.write_event(event).map_err(xml_error)
}

fn xml_error(e: impl fmt::Display) -> ProvisionError {
    ProvisionError::Serialization(format!("discovery config: {e}"))
}
