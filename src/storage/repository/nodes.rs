// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification node registry.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::super::database::{
    all_json, claim_unique, put_json, require_json, Database, StorageError, StorageResult,
    NODES, NODE_NAMES,
};
use crate::blockchain::{BlockchainNode, NodeStatus};
use crate::models::{require_text, Department};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewNode {
    pub name: String,
    pub organization: Department,
    pub endpoint: String,
    #[serde(default = "default_status")]
    pub status: NodeStatus,
}

fn default_status() -> NodeStatus {
    NodeStatus::Active
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NodePatch {
    pub endpoint: Option<String>,
    pub status: Option<NodeStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct NodeFilter {
    pub status: Option<NodeStatus>,
    pub organization: Option<Department>,
}

fn validate_endpoint(endpoint: &str) -> Result<(), String> {
    require_text("endpoint", endpoint, 256)?;
    if endpoint.chars().any(char::is_whitespace) {
        return Err("endpoint must not contain whitespace".to_string());
    }
    Ok(())
}

pub struct NodeRepository<'a> {
    db: &'a Database,
}

impl<'a> NodeRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get(&self, id: &str) -> StorageResult<BlockchainNode> {
        self.db
            .fetch(NODES, id)?
            .ok_or_else(|| StorageError::NotFound(format!("node {id}")))
    }

    /// Sorted by name.
    pub fn list(&self, filter: &NodeFilter) -> StorageResult<Vec<BlockchainNode>> {
        let mut rows: Vec<BlockchainNode> = self.db.fetch_all(NODES)?;
        rows.retain(|n| {
            filter.status.is_none_or(|s| n.status == s)
                && filter.organization.is_none_or(|o| n.organization == o)
        });
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    pub fn active(&self) -> StorageResult<Vec<BlockchainNode>> {
        self.list(&NodeFilter {
            status: Some(NodeStatus::Active),
            organization: None,
        })
    }

    pub fn create(&self, new: NewNode) -> StorageResult<BlockchainNode> {
        require_text("name", &new.name, 64).map_err(StorageError::Validation)?;
        validate_endpoint(&new.endpoint).map_err(StorageError::Validation)?;
        let now = Utc::now();
        let node = BlockchainNode {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            organization: new.organization,
            endpoint: new.endpoint.trim().to_string(),
            status: new.status,
            last_heartbeat_at: None,
            created_at: now,
            updated_at: now,
        };
        self.db.write(|txn| {
            claim_unique(txn, NODE_NAMES, &node.name.to_lowercase(), &node.id, "node name")?;
            put_json(txn, NODES, &node)
        })?;
        Ok(node)
    }

    pub fn update(&self, id: &str, patch: NodePatch) -> StorageResult<BlockchainNode> {
        if let Some(endpoint) = &patch.endpoint {
            validate_endpoint(endpoint).map_err(StorageError::Validation)?;
        }
        self.db.write(|txn| {
            let mut node: BlockchainNode = require_json(txn, NODES, id, "node")?;
            if let Some(endpoint) = patch.endpoint {
                node.endpoint = endpoint.trim().to_string();
            }
            if let Some(status) = patch.status {
                node.status = status;
            }
            node.updated_at = Utc::now();
            put_json(txn, NODES, &node)?;
            Ok(node)
        })
    }

    /// Create one active node per department when the registry is empty.
    ///
    /// Returns the number of nodes created.
    pub fn seed_defaults(&self) -> StorageResult<usize> {
        let now = Utc::now();
        self.db.write(|txn| {
            let existing: Vec<BlockchainNode> = {
                let table = txn.open_table(NODES)?;
                all_json(&table)?
            };
            if !existing.is_empty() {
                return Ok(0);
            }
            for department in Department::ALL {
                let name = format!("{}-node", department.as_str().replace('_', "-"));
                let node = BlockchainNode {
                    id: uuid::Uuid::new_v4().to_string(),
                    endpoint: format!("grpc://{name}.portal.internal:7051"),
                    name,
                    organization: department,
                    status: NodeStatus::Active,
                    last_heartbeat_at: None,
                    created_at: now,
                    updated_at: now,
                };
                claim_unique(txn, NODE_NAMES, &node.name, &node.id, "node name")?;
                put_json(txn, NODES, &node)?;
            }
            Ok(Department::ALL.len())
        })
    }

    /// Stamp every active node's heartbeat and return them.
    pub fn record_heartbeat(&self, at: DateTime<Utc>) -> StorageResult<Vec<BlockchainNode>> {
        self.db.write(|txn| {
            let mut nodes: Vec<BlockchainNode> = {
                let table = txn.open_table(NODES)?;
                all_json(&table)?
            };
            nodes.retain(BlockchainNode::is_active);
            nodes.sort_by(|a, b| a.name.cmp(&b.name));
            for node in &mut nodes {
                node.last_heartbeat_at = Some(at);
                put_json(txn, NODES, &*node)?;
            }
            Ok(nodes)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_is_one_shot() {
        let db = Database::in_memory().unwrap();
        let repo = NodeRepository::new(&db);
        assert_eq!(repo.seed_defaults().unwrap(), Department::ALL.len());
        assert_eq!(repo.seed_defaults().unwrap(), 0);
        assert_eq!(repo.active().unwrap().len(), Department::ALL.len());
        assert!(repo
            .list(&NodeFilter::default())
            .unwrap()
            .iter()
            .any(|n| n.name == "cbi-node"));
    }

    #[test]
    fn names_are_unique_case_insensitively() {
        let db = Database::in_memory().unwrap();
        let repo = NodeRepository::new(&db);
        let new = NewNode {
            name: "Peer-1".into(),
            organization: Department::Nia,
            endpoint: "grpc://peer1:7051".into(),
            status: NodeStatus::Active,
        };
        repo.create(new.clone()).unwrap();
        let mut dup = new;
        dup.name = "peer-1".into();
        assert!(matches!(repo.create(dup), Err(StorageError::AlreadyExists(_))));
    }

    #[test]
    fn inactive_nodes_skip_heartbeat() {
        let db = Database::in_memory().unwrap();
        let repo = NodeRepository::new(&db);
        repo.seed_defaults().unwrap();
        let first = repo.active().unwrap().remove(0);
        repo.update(
            &first.id,
            NodePatch {
                status: Some(NodeStatus::Maintenance),
                endpoint: None,
            },
        )
        .unwrap();

        let beat = repo.record_heartbeat(Utc::now()).unwrap();
        assert_eq!(beat.len(), Department::ALL.len() - 1);
        assert!(beat.iter().all(|n| n.last_heartbeat_at.is_some()));
        assert!(repo.get(&first.id).unwrap().last_heartbeat_at.is_none());
    }
}
