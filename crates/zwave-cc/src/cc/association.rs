use serde::Serialize;
use serde_json::json;

use crate::cc::unknown_command;
use crate::command_class::ParseScope;
use crate::context::NodeId;
use crate::error::{CcError, Result};
use crate::ids;
use crate::payload::PayloadReader;
use crate::traits::{Fragmentable, PartialReport, ValueReport};
use crate::validate_payload;
use crate::values::{ValueEntry, ValueMetadata};

const SET: u8 = 0x01;
const GET: u8 = 0x02;
const REPORT: u8 = 0x03;
const REMOVE: u8 = 0x04;
const SUPPORTED_GROUPINGS_GET: u8 = 0x05;
const SUPPORTED_GROUPINGS_REPORT: u8 = 0x06;
const SPECIFIC_GROUP_GET: u8 = 0x0B;
const SPECIFIC_GROUP_REPORT: u8 = 0x0C;

/// Group id, max nodes, reports to follow.
const REPORT_HEADER_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssociationCommand {
    Set {
        group_id: u8,
        node_ids: Vec<NodeId>,
    },
    Get {
        group_id: u8,
    },
    Report {
        group_id: u8,
        max_nodes: u8,
        reports_to_follow: u8,
        node_ids: Vec<NodeId>,
    },
    Remove {
        /// 0 removes from every group.
        group_id: u8,
        node_ids: Vec<NodeId>,
    },
    SupportedGroupingsGet,
    SupportedGroupingsReport {
        group_count: u8,
    },
    SpecificGroupGet,
    SpecificGroupReport {
        group_id: u8,
    },
}

impl AssociationCommand {
    pub fn command_id(&self) -> u8 {
        match self {
            Self::Set { .. } => SET,
            Self::Get { .. } => GET,
            Self::Report { .. } => REPORT,
            Self::Remove { .. } => REMOVE,
            Self::SupportedGroupingsGet => SUPPORTED_GROUPINGS_GET,
            Self::SupportedGroupingsReport { .. } => SUPPORTED_GROUPINGS_REPORT,
            Self::SpecificGroupGet => SPECIFIC_GROUP_GET,
            Self::SpecificGroupReport { .. } => SPECIFIC_GROUP_REPORT,
        }
    }

    pub(crate) fn parse(command: u8, body: &[u8], _scope: &ParseScope<'_>) -> Result<Self> {
        let mut reader = PayloadReader::new(body);
        match command {
            SET => {
                let group_id = reader.u8()?;
                validate_payload!(group_id > 0);
                Ok(Self::Set {
                    group_id,
                    node_ids: reader.rest().to_vec(),
                })
            }
            GET => {
                let group_id = reader.u8()?;
                validate_payload!(group_id > 0);
                Ok(Self::Get { group_id })
            }
            REPORT => {
                let group_id = reader.u8()?;
                let max_nodes = reader.u8()?;
                let reports_to_follow = reader.u8()?;
                Ok(Self::Report {
                    group_id,
                    max_nodes,
                    reports_to_follow,
                    node_ids: reader.rest().to_vec(),
                })
            }
            REMOVE => Ok(Self::Remove {
                group_id: reader.u8()?,
                node_ids: reader.rest().to_vec(),
            }),
            SUPPORTED_GROUPINGS_GET => Ok(Self::SupportedGroupingsGet),
            SUPPORTED_GROUPINGS_REPORT => Ok(Self::SupportedGroupingsReport {
                group_count: reader.u8()?,
            }),
            SPECIFIC_GROUP_GET => Ok(Self::SpecificGroupGet),
            SPECIFIC_GROUP_REPORT => Ok(Self::SpecificGroupReport {
                group_id: reader.u8()?,
            }),
            other => Err(unknown_command(ids::ASSOCIATION, other)),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Set { group_id, node_ids } | Self::Remove { group_id, node_ids } => {
                out.push(*group_id);
                out.extend_from_slice(node_ids);
            }
            Self::Get { group_id }
            | Self::SpecificGroupReport { group_id }
            | Self::SupportedGroupingsReport {
                group_count: group_id,
            } => out.push(*group_id),
            Self::Report {
                group_id,
                max_nodes,
                reports_to_follow,
                node_ids,
            } => {
                out.extend_from_slice(&[*group_id, *max_nodes, *reports_to_follow]);
                out.extend_from_slice(node_ids);
            }
            Self::SupportedGroupingsGet | Self::SpecificGroupGet => {}
        }
        Ok(())
    }
}

impl PartialReport for AssociationCommand {
    fn expect_more_messages(&self) -> bool {
        matches!(self, Self::Report { reports_to_follow, .. } if *reports_to_follow > 0)
    }

    fn merge_partial(&mut self, prior: Vec<Self>) -> Result<()> {
        let Self::Report {
            group_id, node_ids, ..
        } = self
        else {
            return Err(CcError::InvalidPayload(
                "only association reports can be merged".into(),
            ));
        };

        let mut merged = Vec::new();
        for part in prior {
            match part {
                Self::Report {
                    group_id: part_group,
                    node_ids: part_nodes,
                    ..
                } if part_group == *group_id => merged.extend(part_nodes),
                other => {
                    return Err(CcError::InvalidPayload(format!(
                        "partial report {other:?} does not belong to group {group_id}"
                    )))
                }
            }
        }
        merged.append(node_ids);
        *node_ids = merged;
        Ok(())
    }
}

impl Fragmentable for AssociationCommand {
    fn fragment(&self, max_payload: usize) -> Result<Vec<Self>> {
        match self {
            Self::Report {
                group_id,
                max_nodes,
                node_ids,
                ..
            } => {
                let per_part = max_payload.saturating_sub(REPORT_HEADER_LEN);
                if per_part == 0 {
                    return Err(CcError::Argument(format!(
                        "{max_payload} bytes cannot hold an association report"
                    )));
                }
                if node_ids.is_empty() {
                    return Ok(vec![self.clone()]);
                }
                let chunks: Vec<&[NodeId]> = node_ids.chunks(per_part).collect();
                let total = chunks.len();
                if total > u8::MAX as usize + 1 {
                    return Err(CcError::Arithmetic(format!(
                        "{total} partial reports exceed the reports-to-follow counter"
                    )));
                }
                Ok(chunks
                    .into_iter()
                    .enumerate()
                    .map(|(index, chunk)| Self::Report {
                        group_id: *group_id,
                        max_nodes: *max_nodes,
                        reports_to_follow: (total - index - 1) as u8,
                        node_ids: chunk.to_vec(),
                    })
                    .collect())
            }
            Self::Set { group_id, node_ids } => {
                let per_part = max_payload.saturating_sub(1);
                if per_part == 0 {
                    return Err(CcError::Argument(format!(
                        "{max_payload} bytes cannot hold an association set"
                    )));
                }
                if node_ids.is_empty() {
                    return Ok(vec![self.clone()]);
                }
                Ok(node_ids
                    .chunks(per_part)
                    .map(|chunk| Self::Set {
                        group_id: *group_id,
                        node_ids: chunk.to_vec(),
                    })
                    .collect())
            }
            _ => Ok(vec![self.clone()]),
        }
    }
}

impl ValueReport for AssociationCommand {
    fn values(&self) -> Vec<ValueEntry> {
        match self {
            Self::Report {
                group_id,
                max_nodes,
                node_ids,
                ..
            } => vec![
                ValueEntry::new("nodeIds", json!(node_ids)).with_key(group_id.to_string()),
                ValueEntry::new("maxNodes", *max_nodes)
                    .with_key(group_id.to_string())
                    .with_metadata(ValueMetadata::read_only("Maximum nodes in group")),
            ],
            Self::SupportedGroupingsReport { group_count } => {
                vec![ValueEntry::new("groupCount", *group_count)]
            }
            _ => Vec::new(),
        }
    }
}
