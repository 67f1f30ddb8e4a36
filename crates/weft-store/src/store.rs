use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use weft_core::error::{Result, WeftError};
use weft_core::types::{
    Connection as Edge, CredentialKind, Node, NodeKind, OrgId, Port, Position, Workflow, WorkflowId,
};

use crate::domain::{OrderRecord, OrderStats, ProductSummary, StatusCount, WarehouseRecord};
use crate::vault::Vault;

/// SQLite-backed store for workflow graphs, credentials, and the inventory /
/// order domain tables the built-in tools query.
///
/// Every read and write is filtered by organization. Identifiers are TEXT
/// throughout; callers make no assumptions about their shape.
pub struct WorkflowStore {
    conn: Mutex<Connection>,
    vault: Vault,
}

const SCHEMA: &str = "
    PRAGMA foreign_keys=ON;

    CREATE TABLE IF NOT EXISTS organization (
        id   TEXT PRIMARY KEY,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS user (
        id     TEXT PRIMARY KEY,
        org_id TEXT NOT NULL REFERENCES organization(id),
        email  TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS workflow (
        id          TEXT PRIMARY KEY,
        org_id      TEXT NOT NULL REFERENCES organization(id),
        name        TEXT NOT NULL,
        description TEXT
    );

    CREATE TABLE IF NOT EXISTS node (
        id            TEXT NOT NULL,
        workflow_id   TEXT NOT NULL REFERENCES workflow(id) ON DELETE CASCADE,
        kind          TEXT NOT NULL,
        position_x    REAL NOT NULL DEFAULT 0,
        position_y    REAL NOT NULL DEFAULT 0,
        data          TEXT NOT NULL DEFAULT '{}',
        credential_id TEXT,
        PRIMARY KEY (workflow_id, id)
    );

    CREATE TABLE IF NOT EXISTS connection (
        id           TEXT NOT NULL,
        workflow_id  TEXT NOT NULL REFERENCES workflow(id) ON DELETE CASCADE,
        from_node_id TEXT NOT NULL,
        to_node_id   TEXT NOT NULL,
        from_output  TEXT NOT NULL DEFAULT 'main',
        to_input     TEXT NOT NULL DEFAULT 'main',
        PRIMARY KEY (workflow_id, id)
    );

    CREATE TABLE IF NOT EXISTS credential (
        id              TEXT PRIMARY KEY,
        org_id          TEXT NOT NULL REFERENCES organization(id),
        kind            TEXT NOT NULL,
        name            TEXT NOT NULL,
        encrypted_value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS warehouse (
        id       TEXT PRIMARY KEY,
        org_id   TEXT NOT NULL,
        name     TEXT NOT NULL,
        location TEXT
    );

    CREATE TABLE IF NOT EXISTS product (
        id          TEXT PRIMARY KEY,
        org_id      TEXT NOT NULL,
        name        TEXT NOT NULL,
        sku         TEXT NOT NULL,
        description TEXT
    );

    CREATE TABLE IF NOT EXISTS product_price (
        product_id   TEXT PRIMARY KEY REFERENCES product(id) ON DELETE CASCADE,
        amount_cents INTEGER NOT NULL,
        currency     TEXT NOT NULL DEFAULT 'USD'
    );

    CREATE TABLE IF NOT EXISTS product_stock (
        product_id   TEXT NOT NULL REFERENCES product(id) ON DELETE CASCADE,
        warehouse_id TEXT NOT NULL REFERENCES warehouse(id) ON DELETE CASCADE,
        quantity     INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (product_id, warehouse_id)
    );

    CREATE TABLE IF NOT EXISTS orders (
        id            TEXT PRIMARY KEY,
        org_id        TEXT NOT NULL,
        customer_name TEXT NOT NULL,
        status        TEXT NOT NULL,
        total_cents   INTEGER NOT NULL DEFAULT 0,
        created_at    TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS order_item (
        order_id   TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        product_id TEXT NOT NULL,
        quantity   INTEGER NOT NULL,
        unit_cents INTEGER NOT NULL,
        PRIMARY KEY (order_id, product_id)
    );

    CREATE INDEX IF NOT EXISTS idx_workflow_org ON workflow(org_id);
    CREATE INDEX IF NOT EXISTS idx_credential_org ON credential(org_id);
    CREATE INDEX IF NOT EXISTS idx_product_org ON product(org_id);
    CREATE INDEX IF NOT EXISTS idx_orders_org ON orders(org_id, status);
";

impl WorkflowStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path, vault: Vault) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WeftError::Database(format!("failed to create db directory: {}", e)))?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        debug!(path = %path.display(), "workflow store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            vault,
        })
    }

    /// In-memory database, for tests.
    pub fn in_memory(vault: Vault) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
            vault,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| WeftError::Database(e.to_string()))
    }

    // ── Organizations ────────────────────────────────────────────

    pub fn insert_organization(&self, org: &OrgId, name: &str) -> Result<()> {
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO organization (id, name) VALUES (?1, ?2)",
                params![org.as_str(), name],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn insert_user(&self, id: &str, org: &OrgId, email: &str) -> Result<()> {
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO user (id, org_id, email) VALUES (?1, ?2, ?3)",
                params![id, org.as_str(), email],
            )
            .map_err(db_err)?;
        Ok(())
    }

    // ── Workflows ────────────────────────────────────────────────

    /// Insert or replace a workflow with its nodes and connections.
    pub fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute(
            "INSERT OR REPLACE INTO workflow (id, org_id, name, description)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                workflow.id.as_str(),
                workflow.org_id.as_str(),
                workflow.name,
                workflow.description,
            ],
        )
        .map_err(db_err)?;

        tx.execute(
            "DELETE FROM node WHERE workflow_id = ?1",
            params![workflow.id.as_str()],
        )
        .map_err(db_err)?;
        tx.execute(
            "DELETE FROM connection WHERE workflow_id = ?1",
            params![workflow.id.as_str()],
        )
        .map_err(db_err)?;

        for node in &workflow.nodes {
            tx.execute(
                "INSERT INTO node (id, workflow_id, kind, position_x, position_y, data, credential_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    node.id,
                    workflow.id.as_str(),
                    node.kind.as_str(),
                    node.position.x,
                    node.position.y,
                    node.data.to_string(),
                    node.credential_id,
                ],
            )
            .map_err(db_err)?;
        }

        for conn_row in &workflow.connections {
            tx.execute(
                "INSERT INTO connection (id, workflow_id, from_node_id, to_node_id, from_output, to_input)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    conn_row.id,
                    workflow.id.as_str(),
                    conn_row.from_node_id,
                    conn_row.to_node_id,
                    conn_row.from_output,
                    conn_row.to_input.as_label(),
                ],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Load a workflow, scoped to the organization.
    pub fn load_workflow(&self, org: &OrgId, id: &WorkflowId) -> Result<Workflow> {
        let conn = self.lock()?;

        let (name, description): (String, Option<String>) = conn
            .query_row(
                "SELECT name, description FROM workflow WHERE id = ?1 AND org_id = ?2",
                params![id.as_str(), org.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| WeftError::Database(format!("workflow '{}' not found", id)))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, kind, position_x, position_y, data, credential_id
                 FROM node WHERE workflow_id = ?1 ORDER BY id",
            )
            .map_err(db_err)?;
        let nodes = stmt
            .query_map(params![id.as_str()], |row| {
                let kind_str: String = row.get(1)?;
                let data_str: String = row.get(4)?;
                Ok((
                    row.get::<_, String>(0)?,
                    kind_str,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    data_str,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?
            .into_iter()
            .map(|(node_id, kind_str, x, y, data_str, credential_id)| {
                let kind: NodeKind =
                    serde_json::from_value(serde_json::Value::String(kind_str.clone())).map_err(
                        |_| WeftError::Database(format!("unknown stored node kind '{}'", kind_str)),
                    )?;
                let data = serde_json::from_str(&data_str)
                    .map_err(|e| WeftError::Database(format!("corrupt node data: {}", e)))?;
                Ok(Node {
                    id: node_id,
                    kind,
                    position: Position { x, y },
                    data,
                    credential_id,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, from_node_id, to_node_id, from_output, to_input
                 FROM connection WHERE workflow_id = ?1 ORDER BY id",
            )
            .map_err(db_err)?;
        let connections = stmt
            .query_map(params![id.as_str()], |row| {
                let to_input: String = row.get(4)?;
                Ok(Edge {
                    id: row.get(0)?,
                    from_node_id: row.get(1)?,
                    to_node_id: row.get(2)?,
                    from_output: row.get(3)?,
                    to_input: Port::parse(&to_input),
                })
            })
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(Workflow {
            id: id.clone(),
            org_id: org.clone(),
            name,
            description,
            nodes,
            connections,
        })
    }

    /// Delete a workflow; nodes and connections cascade.
    pub fn delete_workflow(&self, org: &OrgId, id: &WorkflowId) -> Result<bool> {
        let deleted = self
            .lock()?
            .execute(
                "DELETE FROM workflow WHERE id = ?1 AND org_id = ?2",
                params![id.as_str(), org.as_str()],
            )
            .map_err(db_err)?;
        Ok(deleted > 0)
    }

    // ── Credentials ──────────────────────────────────────────────

    /// Store a credential, encrypting the value at rest.
    pub fn insert_credential(
        &self,
        org: &OrgId,
        id: &str,
        kind: CredentialKind,
        name: &str,
        plaintext: &str,
    ) -> Result<()> {
        let encrypted = self.vault.encrypt(plaintext)?;
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO credential (id, org_id, kind, name, encrypted_value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, org.as_str(), kind.as_str(), name, encrypted],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Decrypt a credential on demand, scoped to the organization.
    ///
    /// A credential of another organization, or one that fails to decrypt,
    /// is reported as absent; no decryption detail reaches the caller.
    pub fn secret(&self, org: &OrgId, credential_id: &str) -> Result<String> {
        let encrypted: Option<String> = self
            .lock()?
            .query_row(
                "SELECT encrypted_value FROM credential WHERE id = ?1 AND org_id = ?2",
                params![credential_id, org.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        let encrypted = encrypted.ok_or_else(|| {
            WeftError::Credential(format!("credential '{}' not found", credential_id))
        })?;
        self.vault
            .decrypt(&encrypted)
            .map_err(|_| WeftError::Credential(format!("credential '{}' not found", credential_id)))
    }

    // ── Inventory domain ─────────────────────────────────────────

    pub fn insert_warehouse(
        &self,
        org: &OrgId,
        id: &str,
        name: &str,
        location: Option<&str>,
    ) -> Result<()> {
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO warehouse (id, org_id, name, location) VALUES (?1, ?2, ?3, ?4)",
                params![id, org.as_str(), name, location],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn insert_product(
        &self,
        org: &OrgId,
        id: &str,
        name: &str,
        sku: &str,
        description: Option<&str>,
        price_cents: i64,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO product (id, org_id, name, sku, description)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, org.as_str(), name, sku, description],
        )
        .map_err(db_err)?;
        conn.execute(
            "INSERT OR REPLACE INTO product_price (product_id, amount_cents) VALUES (?1, ?2)",
            params![id, price_cents],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub fn set_stock(&self, product_id: &str, warehouse_id: &str, quantity: i64) -> Result<()> {
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO product_stock (product_id, warehouse_id, quantity)
                 VALUES (?1, ?2, ?3)",
                params![product_id, warehouse_id, quantity],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Read-only product search, name or SKU, scoped to the organization.
    pub fn search_products(
        &self,
        org: &OrgId,
        query: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ProductSummary>> {
        let conn = self.lock()?;
        let pattern = format!("%{}%", query.unwrap_or(""));
        let mut stmt = conn
            .prepare(
                "SELECT p.id, p.name, p.sku, p.description,
                        COALESCE(pp.amount_cents, 0), COALESCE(pp.currency, 'USD'),
                        COALESCE(SUM(ps.quantity), 0)
                 FROM product p
                 LEFT JOIN product_price pp ON pp.product_id = p.id
                 LEFT JOIN product_stock ps ON ps.product_id = p.id
                 WHERE p.org_id = ?1 AND (p.name LIKE ?2 OR p.sku LIKE ?2)
                 GROUP BY p.id
                 ORDER BY p.name
                 LIMIT ?3",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![org.as_str(), pattern, limit as i64], |row| {
                Ok(ProductSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    sku: row.get(2)?,
                    description: row.get(3)?,
                    price_cents: row.get(4)?,
                    currency: row.get(5)?,
                    total_stock: row.get(6)?,
                })
            })
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    pub fn list_warehouses(&self, org: &OrgId) -> Result<Vec<WarehouseRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, name, location FROM warehouse WHERE org_id = ?1 ORDER BY name")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![org.as_str()], |row| {
                Ok(WarehouseRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    location: row.get(2)?,
                })
            })
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    // ── Orders domain ────────────────────────────────────────────

    pub fn insert_order(
        &self,
        org: &OrgId,
        id: &str,
        customer_name: &str,
        status: &str,
        total_cents: i64,
    ) -> Result<()> {
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO orders (id, org_id, customer_name, status, total_cents, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    org.as_str(),
                    customer_name,
                    status,
                    total_cents,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn search_orders(
        &self,
        org: &OrgId,
        query: Option<&str>,
        status: Option<&str>,
        limit: usize,
    ) -> Result<Vec<OrderRecord>> {
        let conn = self.lock()?;
        let pattern = format!("%{}%", query.unwrap_or(""));
        let status_pattern = status.map(|s| s.to_string()).unwrap_or_else(|| "%".into());
        let mut stmt = conn
            .prepare(
                "SELECT id, customer_name, status, total_cents, created_at
                 FROM orders
                 WHERE org_id = ?1 AND (customer_name LIKE ?2 OR id LIKE ?2)
                   AND status LIKE ?3
                 ORDER BY created_at DESC
                 LIMIT ?4",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![org.as_str(), pattern, status_pattern, limit as i64],
                |row| {
                    Ok(OrderRecord {
                        id: row.get(0)?,
                        customer_name: row.get(1)?,
                        status: row.get(2)?,
                        total_cents: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// Update an order's status. Returns the updated record, or `None` when
    /// the order does not exist within the organization — a foreign tenant's
    /// order is indistinguishable from a missing one.
    pub fn update_order_status(
        &self,
        org: &OrgId,
        order_id: &str,
        new_status: &str,
    ) -> Result<Option<OrderRecord>> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE orders SET status = ?1 WHERE id = ?2 AND org_id = ?3",
                params![new_status, order_id, org.as_str()],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Ok(None);
        }
        let record = conn
            .query_row(
                "SELECT id, customer_name, status, total_cents, created_at
                 FROM orders WHERE id = ?1 AND org_id = ?2",
                params![order_id, org.as_str()],
                |row| {
                    Ok(OrderRecord {
                        id: row.get(0)?,
                        customer_name: row.get(1)?,
                        status: row.get(2)?,
                        total_cents: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)?;
        Ok(record)
    }

    pub fn order_stats(&self, org: &OrgId) -> Result<OrderStats> {
        let conn = self.lock()?;
        let (total_orders, revenue_cents): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(total_cents), 0) FROM orders WHERE org_id = ?1",
                params![org.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(db_err)?;

        let mut stmt = conn
            .prepare(
                "SELECT status, COUNT(*) FROM orders WHERE org_id = ?1
                 GROUP BY status ORDER BY status",
            )
            .map_err(db_err)?;
        let by_status = stmt
            .query_map(params![org.as_str()], |row| {
                Ok(StatusCount {
                    status: row.get(0)?,
                    count: row.get(1)?,
                })
            })
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(OrderStats {
            total_orders,
            revenue_cents,
            by_status,
        })
    }
}

fn db_err(e: rusqlite::Error) -> WeftError {
    WeftError::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn store() -> WorkflowStore {
        WorkflowStore::in_memory(Vault::new(TEST_KEY).unwrap()).unwrap()
    }

    fn org(store: &WorkflowStore, id: &str) -> OrgId {
        let org = OrgId::new(id);
        store.insert_organization(&org, id).unwrap();
        org
    }

    #[test]
    fn test_workflow_roundtrip() {
        let store = store();
        let org = org(&store, "org-1");

        let workflow = Workflow {
            id: WorkflowId::new("wf-1"),
            org_id: org.clone(),
            name: "enrich leads".into(),
            description: Some("demo".into()),
            nodes: vec![
                Node::new("t", NodeKind::ManualTrigger),
                Node::new("h", NodeKind::HttpRequest)
                    .with_data(serde_json::json!({"url": "https://api/x", "variableName": "r"})),
                Node::new("m", NodeKind::ChatModel)
                    .with_data(serde_json::json!({"provider": "gemini"}))
                    .with_credential("cred-1"),
            ],
            connections: vec![
                Edge::main("c1", "t", "h"),
                Edge::sub("c2", "m", "h", Port::ChatModel),
            ],
        };
        store.save_workflow(&workflow).unwrap();

        let loaded = store.load_workflow(&org, &workflow.id).unwrap();
        assert_eq!(loaded.name, "enrich leads");
        assert_eq!(loaded.nodes.len(), 3);
        assert_eq!(loaded.connections.len(), 2);

        let model = loaded.node("m").unwrap();
        assert_eq!(model.kind, NodeKind::ChatModel);
        assert_eq!(model.credential_id.as_deref(), Some("cred-1"));
        assert_eq!(model.data_str("provider"), Some("gemini"));

        let sub = loaded.connections.iter().find(|c| c.id == "c2").unwrap();
        assert_eq!(sub.to_input, Port::ChatModel);
    }

    #[test]
    fn test_open_creates_database_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("weft.db");
        let store = WorkflowStore::open(&path, Vault::new(TEST_KEY).unwrap()).unwrap();
        let org = OrgId::new("org-1");
        store.insert_organization(&org, "Acme").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_workflow_is_org_scoped() {
        let store = store();
        let org_a = org(&store, "org-a");
        let org_b = org(&store, "org-b");

        let workflow = Workflow {
            id: WorkflowId::new("wf-1"),
            org_id: org_a.clone(),
            name: "private".into(),
            description: None,
            nodes: vec![],
            connections: vec![],
        };
        store.save_workflow(&workflow).unwrap();

        assert!(store.load_workflow(&org_a, &workflow.id).is_ok());
        assert!(store.load_workflow(&org_b, &workflow.id).is_err());
    }

    #[test]
    fn test_delete_cascades() {
        let store = store();
        let org = org(&store, "org-1");
        let workflow = Workflow {
            id: WorkflowId::new("wf-1"),
            org_id: org.clone(),
            name: "doomed".into(),
            description: None,
            nodes: vec![Node::new("a", NodeKind::Initial)],
            connections: vec![],
        };
        store.save_workflow(&workflow).unwrap();
        assert!(store.delete_workflow(&org, &workflow.id).unwrap());
        assert!(store.load_workflow(&org, &workflow.id).is_err());
    }

    #[test]
    fn test_credential_roundtrip_and_scoping() {
        let store = store();
        let org_a = org(&store, "org-a");
        let org_b = org(&store, "org-b");

        store
            .insert_credential(&org_a, "cred-1", CredentialKind::Gemini, "main key", "sk-secret")
            .unwrap();

        assert_eq!(store.secret(&org_a, "cred-1").unwrap(), "sk-secret");
        // Foreign org sees the credential as absent.
        let err = store.secret(&org_b, "cred-1").unwrap_err();
        assert!(matches!(err, WeftError::Credential(_)));
        assert!(!err.to_string().contains("sk-secret"));
    }

    #[test]
    fn test_product_search() {
        let store = store();
        let org_id = org(&store, "org-1");
        store.insert_warehouse(&org_id, "wh-1", "East", Some("NJ")).unwrap();
        store
            .insert_product(&org_id, "p-1", "Blue Widget", "BW-01", None, 1299)
            .unwrap();
        store
            .insert_product(&org_id, "p-2", "Red Widget", "RW-01", None, 1499)
            .unwrap();
        store.set_stock("p-1", "wh-1", 12).unwrap();

        let all = store.search_products(&org_id, None, 10).unwrap();
        assert_eq!(all.len(), 2);

        let blue = store.search_products(&org_id, Some("Blue"), 10).unwrap();
        assert_eq!(blue.len(), 1);
        assert_eq!(blue[0].total_stock, 12);
        assert_eq!(blue[0].price_cents, 1299);

        let foreign = org(&store, "org-2");
        assert!(store.search_products(&foreign, None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_order_update_is_tenant_guarded() {
        let store = store();
        let org_a = org(&store, "org-a");
        let org_b = org(&store, "org-b");
        store.insert_order(&org_b, "42", "Maya", "pending", 5000).unwrap();

        // Order 42 belongs to org-b; org-a's update must not land.
        let result = store.update_order_status(&org_a, "42", "shipped").unwrap();
        assert!(result.is_none());

        let untouched = store.search_orders(&org_b, None, None, 10).unwrap();
        assert_eq!(untouched[0].status, "pending");

        let updated = store.update_order_status(&org_b, "42", "shipped").unwrap().unwrap();
        assert_eq!(updated.status, "shipped");
    }

    #[test]
    fn test_order_stats() {
        let store = store();
        let org_id = org(&store, "org-1");
        store.insert_order(&org_id, "1", "A", "pending", 1000).unwrap();
        store.insert_order(&org_id, "2", "B", "pending", 2000).unwrap();
        store.insert_order(&org_id, "3", "C", "shipped", 3000).unwrap();

        let stats = store.order_stats(&org_id).unwrap();
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.revenue_cents, 6000);
        assert_eq!(stats.by_status.len(), 2);
        let pending = stats.by_status.iter().find(|s| s.status == "pending").unwrap();
        assert_eq!(pending.count, 2);
    }
}
