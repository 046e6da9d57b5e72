//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking. Rule mutations run inside
//! `BEGIN IMMEDIATE` transactions so that the existence check and the write
//! of a read-modify-write cannot interleave with another writer.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};

use commgate_core::{
    validate_new_rule, CommunicationRule, Group, GroupId, GroupPair, MessageId, MessageRecord,
    NewMessage, NewPrincipal, NewRule, Page, Principal, PrincipalId, RuleDecision, RuleId,
    RuleType,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Directory, MessageLog, RuleQuery, RuleStore};

/// How long a writer waits on another connection's transaction.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const RULE_COLUMNS: &str = "id, group_a, group_b, rule_type, requester_id, target_principal_id,
     decided_by, expires_at, user_specific, reason, status, created_at, updated_at";

const PRINCIPAL_COLUMNS: &str = "id, name, email, group_id, role";

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, subject, body, status, reason, sent_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// Column order follows RULE_COLUMNS.
fn row_to_rule(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommunicationRule> {
    Ok(CommunicationRule {
        id: RuleId(row.get(0)?),
        group_a: GroupId(row.get(1)?),
        group_b: GroupId(row.get(2)?),
        rule_type: parse_column(row, 3)?,
        requester_id: row.get::<_, Option<i64>>(4)?.map(PrincipalId),
        target_principal_id: row.get::<_, Option<i64>>(5)?.map(PrincipalId),
        decided_by: row.get::<_, Option<i64>>(6)?.map(PrincipalId),
        expires_at: row.get(7)?,
        user_specific: row.get(8)?,
        reason: row.get(9)?,
        status: parse_column(row, 10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn row_to_principal(row: &rusqlite::Row<'_>) -> rusqlite::Result<Principal> {
    Ok(Principal {
        id: PrincipalId(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        group_id: GroupId(row.get(3)?),
        role: parse_column(row, 4)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: MessageId(row.get(0)?),
        sender_id: PrincipalId(row.get(1)?),
        receiver_id: PrincipalId(row.get(2)?),
        subject: row.get(3)?,
        body: row.get(4)?,
        status: parse_column(row, 5)?,
        reason: row.get(6)?,
        sent_at: row.get(7)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn group_exists(conn: &Connection, id: GroupId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM groups WHERE id = ?1", params![id.0], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

fn select_rule(conn: &Connection, id: RuleId) -> Result<Option<CommunicationRule>> {
    let sql = format!("SELECT {} FROM communication_rules WHERE id = ?1", RULE_COLUMNS);
    Ok(conn
        .query_row(&sql, params![id.0], row_to_rule)
        .optional()?)
}

/// Build the WHERE clause and bound values for a rule query.
fn rule_query_sql(query: &RuleQuery) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(group) = query.group {
        values.push(Value::Integer(group.0));
        let n = values.len();
        clauses.push(format!("(group_a = ?{n} OR group_b = ?{n})"));
    }
    if let Some(rule_type) = query.rule_type {
        values.push(Value::Text(rule_type.as_str().to_string()));
        clauses.push(format!("rule_type = ?{}", values.len()));
    }
    if let Some(status) = query.status {
        values.push(Value::Text(status.as_str().to_string()));
        clauses.push(format!("status = ?{}", values.len()));
    }
    if query.not_approved {
        clauses.push("status <> 'approved'".to_string());
    }
    if let Some(requester) = query.requester {
        values.push(Value::Integer(requester.0));
        clauses.push(format!("requester_id = ?{}", values.len()));
    }
    if let Some(decider) = query.decided_by {
        values.push(Value::Integer(decider.0));
        clauses.push(format!("decided_by = ?{}", values.len()));
    }
    if let Some(now) = query.granting_at {
        values.push(Value::Integer(now));
        clauses.push(format!(
            "status = 'approved' AND (expires_at IS NULL OR expires_at > ?{})",
            values.len()
        ));
    }

    let mut sql = format!("SELECT {} FROM communication_rules", RULE_COLUMNS);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY id");

    if let Some(page) = query.page {
        values.push(Value::Integer(i64::from(page.limit)));
        values.push(Value::Integer(i64::from(page.offset)));
        sql.push_str(&format!(
            " LIMIT ?{} OFFSET ?{}",
            values.len() - 1,
            values.len()
        ));
    }

    (sql, values)
}

#[async_trait]
impl Directory for SqliteStore {
    async fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
        self.blocking(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name FROM groups WHERE id = ?1",
                    params![id.0],
                    |row| {
                        Ok(Group {
                            id: GroupId(row.get(0)?),
                            name: row.get(1)?,
                        })
                    },
                )
                .optional()?)
        })
        .await
    }

    async fn get_principal(&self, id: PrincipalId) -> Result<Option<Principal>> {
        self.blocking(move |conn| {
            let sql = format!("SELECT {} FROM principals WHERE id = ?1", PRINCIPAL_COLUMNS);
            Ok(conn
                .query_row(&sql, params![id.0], row_to_principal)
                .optional()?)
        })
        .await
    }

    async fn list_principals(&self, group: GroupId) -> Result<Vec<Principal>> {
        self.list_principals_in(&[group]).await
    }

    async fn list_principals_in(&self, groups: &[GroupId]) -> Result<Vec<Principal>> {
        if groups.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = groups.iter().map(|g| g.0).collect();

        self.blocking(move |conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!(
                "SELECT {} FROM principals WHERE group_id IN ({}) ORDER BY id",
                PRINCIPAL_COLUMNS, placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let principals = stmt
                .query_map(params_from_iter(ids.iter()), row_to_principal)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(principals)
        })
        .await
    }

    async fn insert_group(&self, name: &str) -> Result<Group> {
        let name = name.to_string();

        self.blocking(move |conn| {
            let inserted = conn.execute("INSERT INTO groups (name) VALUES (?1)", params![name]);
            match inserted {
                Ok(_) => Ok(Group {
                    id: GroupId(conn.last_insert_rowid()),
                    name,
                }),
                Err(e) if is_constraint_violation(&e) => Err(StoreError::Conflict(format!(
                    "group name {:?} is taken",
                    name
                ))),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn insert_principal(&self, principal: NewPrincipal) -> Result<Principal> {
        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !group_exists(&tx, principal.group_id)? {
                return Err(StoreError::NotFound(format!("group {}", principal.group_id)));
            }

            let inserted = tx.execute(
                "INSERT INTO principals (name, email, group_id, role) VALUES (?1, ?2, ?3, ?4)",
                params![
                    principal.name,
                    principal.email,
                    principal.group_id.0,
                    principal.role.as_str()
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => {
                    return Err(StoreError::Conflict(format!(
                        "email {:?} is taken",
                        principal.email
                    )))
                }
                Err(e) => return Err(e.into()),
            }

            let id = PrincipalId(tx.last_insert_rowid());
            tx.commit()?;

            Ok(Principal {
                id,
                name: principal.name,
                email: principal.email,
                group_id: principal.group_id,
                role: principal.role,
            })
        })
        .await
    }
}

#[async_trait]
impl RuleStore for SqliteStore {
    async fn get_rule(&self, id: RuleId) -> Result<Option<CommunicationRule>> {
        self.blocking(move |conn| select_rule(conn, id)).await
    }

    async fn find_by_pair(&self, pair: GroupPair) -> Result<Vec<CommunicationRule>> {
        self.blocking(move |conn| {
            let sql = format!(
                "SELECT {} FROM communication_rules
                 WHERE group_lo = ?1 AND group_hi = ?2
                 ORDER BY id",
                RULE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rules = stmt
                .query_map(params![pair.lo().0, pair.hi().0], row_to_rule)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rules)
        })
        .await
    }

    async fn find_active_by_group(
        &self,
        group: GroupId,
        now: i64,
    ) -> Result<Vec<CommunicationRule>> {
        self.list_rules(&RuleQuery::new().group(group).granting_at(now))
            .await
    }

    async fn list_rules(&self, query: &RuleQuery) -> Result<Vec<CommunicationRule>> {
        let (sql, values) = rule_query_sql(query);

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rules = stmt
                .query_map(params_from_iter(values.iter()), row_to_rule)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rules)
        })
        .await
    }

    async fn insert_rule(&self, rule: NewRule) -> Result<CommunicationRule> {
        validate_new_rule(&rule)?;
        let pair = rule.pair()?;

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            for group in [rule.group_a, rule.group_b] {
                if !group_exists(&tx, group)? {
                    return Err(StoreError::NotFound(format!("group {}", group)));
                }
            }

            if rule.rule_type == RuleType::Permanent {
                let existing: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM communication_rules
                         WHERE group_lo = ?1 AND group_hi = ?2 AND rule_type = 'permanent'",
                        params![pair.lo().0, pair.hi().0],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(existing) = existing {
                    return Err(StoreError::Conflict(format!(
                        "permanent rule {} already links groups {} and {}",
                        existing,
                        pair.lo(),
                        pair.hi()
                    )));
                }
            }

            let inserted = tx.execute(
                "INSERT INTO communication_rules (
                    group_a, group_b, group_lo, group_hi, rule_type, requester_id,
                    target_principal_id, decided_by, expires_at, user_specific, reason,
                    status, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
                params![
                    rule.group_a.0,
                    rule.group_b.0,
                    pair.lo().0,
                    pair.hi().0,
                    rule.rule_type.as_str(),
                    rule.requester_id.map(|p| p.0),
                    rule.target_principal_id.map(|p| p.0),
                    rule.decided_by.map(|p| p.0),
                    rule.expires_at,
                    rule.user_specific,
                    rule.reason,
                    rule.status.as_str(),
                    rule.created_at,
                ],
            );
            match inserted {
                Ok(_) => {}
                // The partial unique index backs up the check above.
                Err(e) if is_constraint_violation(&e) => {
                    return Err(StoreError::Conflict(format!(
                        "rule violates a constraint on groups {} and {}: {}",
                        pair.lo(),
                        pair.hi(),
                        e
                    )))
                }
                Err(e) => return Err(e.into()),
            }

            let id = RuleId(tx.last_insert_rowid());
            tx.commit()?;

            tracing::debug!(rule_id = %id, rule_type = %rule.rule_type, "inserted rule");
            Ok(rule.into_rule(id))
        })
        .await
    }

    async fn decide_rule(
        &self,
        id: RuleId,
        decision: &RuleDecision,
    ) -> Result<CommunicationRule> {
        let decision = decision.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut rule =
                select_rule(&tx, id)?.ok_or_else(|| StoreError::NotFound(format!("rule {}", id)))?;
            rule.apply_decision(&decision)?;

            tx.execute(
                "UPDATE communication_rules
                 SET status = ?1, decided_by = ?2, reason = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    rule.status.as_str(),
                    rule.decided_by.map(|p| p.0),
                    rule.reason,
                    rule.updated_at,
                    id.0,
                ],
            )?;
            tx.commit()?;

            Ok(rule)
        })
        .await
    }

    async fn delete_rule(&self, id: RuleId) -> Result<bool> {
        self.blocking(move |conn| {
            let removed = conn.execute(
                "DELETE FROM communication_rules WHERE id = ?1",
                params![id.0],
            )?;
            Ok(removed > 0)
        })
        .await
    }
}

#[async_trait]
impl MessageLog for SqliteStore {
    async fn record_message(&self, message: NewMessage) -> Result<MessageRecord> {
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO message_logs (sender_id, receiver_id, subject, body, status, reason, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    message.sender_id.0,
                    message.receiver_id.0,
                    message.subject,
                    message.body,
                    message.status.as_str(),
                    message.reason,
                    message.sent_at,
                ],
            )?;
            let id = MessageId(conn.last_insert_rowid());
            Ok(message.into_record(id))
        })
        .await
    }

    async fn list_sent(&self, principal: PrincipalId, page: Page) -> Result<Vec<MessageRecord>> {
        self.list_messages("sender_id", principal, page).await
    }

    async fn list_received(
        &self,
        principal: PrincipalId,
        page: Page,
    ) -> Result<Vec<MessageRecord>> {
        self.list_messages("receiver_id", principal, page).await
    }
}

impl SqliteStore {
    async fn list_messages(
        &self,
        column: &'static str,
        principal: PrincipalId,
        page: Page,
    ) -> Result<Vec<MessageRecord>> {
        self.blocking(move |conn| {
            let sql = format!(
                "SELECT {} FROM message_logs WHERE {} = ?1
                 ORDER BY sent_at DESC, id DESC
                 LIMIT ?2 OFFSET ?3",
                MESSAGE_COLUMNS, column
            );
            let mut stmt = conn.prepare(&sql)?;
            let messages = stmt
                .query_map(
                    params![principal.0, i64::from(page.limit), i64::from(page.offset)],
                    row_to_message,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(messages)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commgate_core::{DeliveryStatus, Role, RuleStatus};

    async fn seeded() -> (SqliteStore, GroupId, GroupId, Principal) {
        let store = SqliteStore::open_memory().unwrap();
        let eng = store.insert_group("Eng").await.unwrap();
        let hr = store.insert_group("HR").await.unwrap();
        let alice = store
            .insert_principal(NewPrincipal::new("Alice", "alice@x", eng.id, Role::User))
            .await
            .unwrap();
        (store, eng.id, hr.id, alice)
    }

    #[tokio::test]
    async fn test_directory_roundtrip() {
        let (store, eng, hr, alice) = seeded().await;

        assert_eq!(store.get_principal(alice.id).await.unwrap(), Some(alice.clone()));
        assert_eq!(store.get_group(hr).await.unwrap().unwrap().name, "HR");
        assert_eq!(store.list_principals(eng).await.unwrap(), vec![alice]);
        assert!(store.list_principals(hr).await.unwrap().is_empty());
        assert!(store.list_principals_in(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_directory_uniqueness() {
        let (store, eng, _, _) = seeded().await;

        assert!(matches!(
            store.insert_group("Eng").await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store
                .insert_principal(NewPrincipal::new("Al", "alice@x", eng, Role::User))
                .await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store
                .insert_principal(NewPrincipal::new("Zed", "zed@x", GroupId(404), Role::User))
                .await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_and_get_rule() {
        let (store, eng, hr, alice) = seeded().await;

        let rule = store
            .insert_rule(NewRule::temporary(
                alice.id,
                eng,
                hr,
                None,
                "quarterly review",
                Some(10_000),
                1_000,
            ))
            .await
            .unwrap();

        let fetched = store.get_rule(rule.id).await.unwrap().unwrap();
        assert_eq!(fetched, rule);
        assert_eq!(fetched.status, RuleStatus::Pending);
        assert_eq!(fetched.decided_by, None);
    }

    #[tokio::test]
    async fn test_permanent_conflict_either_order() {
        let (store, eng, hr, alice) = seeded().await;

        store
            .insert_rule(NewRule::permanent(eng, hr, alice.id, "", 0))
            .await
            .unwrap();

        let reversed = store
            .insert_rule(NewRule::permanent(hr, eng, alice.id, "", 0))
            .await;
        assert!(matches!(reversed, Err(StoreError::Conflict(_))));

        let pair = GroupPair::new(eng, hr).unwrap();
        assert_eq!(store.find_by_pair(pair).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_rule_unknown_group() {
        let (store, eng, _, alice) = seeded().await;
        let result = store
            .insert_rule(NewRule::permanent(eng, GroupId(77), alice.id, "", 0))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_decide_and_query() {
        let (store, eng, hr, alice) = seeded().await;

        let rule = store
            .insert_rule(NewRule::temporary(alice.id, eng, hr, None, "", Some(5_000), 0))
            .await
            .unwrap();
        assert!(store.find_active_by_group(eng, 1).await.unwrap().is_empty());

        let decided = store
            .decide_rule(rule.id, &RuleDecision::approve(PrincipalId(9), Some("ok".into()), 10))
            .await
            .unwrap();
        assert_eq!(decided.reason, "Approval: ok");
        assert_eq!(store.get_rule(rule.id).await.unwrap(), Some(decided));

        assert_eq!(store.find_active_by_group(eng, 4_999).await.unwrap().len(), 1);
        assert!(store.find_active_by_group(eng, 5_000).await.unwrap().is_empty());

        let by_decider = store
            .list_rules(&RuleQuery::new().decided_by(PrincipalId(9)))
            .await
            .unwrap();
        assert_eq!(by_decider.len(), 1);
    }

    #[tokio::test]
    async fn test_decide_permanent_is_rule_error() {
        let (store, eng, hr, alice) = seeded().await;
        let rule = store
            .insert_rule(NewRule::permanent(eng, hr, alice.id, "", 0))
            .await
            .unwrap();

        let result = store
            .decide_rule(rule.id, &RuleDecision::reject(alice.id, None, 1))
            .await;
        assert!(matches!(result, Err(StoreError::Rule(_))));
    }

    #[tokio::test]
    async fn test_list_rules_paging_and_filters() {
        let (store, eng, hr, alice) = seeded().await;
        let sales = store.insert_group("Sales").await.unwrap().id;

        store
            .insert_rule(NewRule::permanent(eng, hr, alice.id, "", 0))
            .await
            .unwrap();
        for target in [hr, sales, sales] {
            store
                .insert_rule(NewRule::temporary(alice.id, eng, target, None, "", None, 0))
                .await
                .unwrap();
        }

        let temporary = store
            .list_rules(&RuleQuery::new().rule_type(RuleType::Temporary))
            .await
            .unwrap();
        assert_eq!(temporary.len(), 3);

        let touching_sales = store
            .list_rules(&RuleQuery::new().group(sales))
            .await
            .unwrap();
        assert_eq!(touching_sales.len(), 2);

        let paged = store
            .list_rules(&RuleQuery::new().group(eng).page(Page::new(1, 2)))
            .await
            .unwrap();
        let ids: Vec<i64> = paged.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_concurrent_open_of_fresh_file() {
        use std::sync::Barrier;

        for round in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join(format!("fresh-{}.db", round));
            let barrier = Arc::new(Barrier::new(4));

            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let path = path.clone();
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        SqliteStore::open(&path).map(|_| ())
                    })
                })
                .collect();

            for handle in handles {
                let opened = handle.join().unwrap();
                assert!(opened.is_ok(), "round {}: {:?}", round, opened);
            }

            let conn = Connection::open(&path).unwrap();
            let applied: i64 = conn
                .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
                .unwrap();
            assert_eq!(applied, i64::from(migration::CURRENT_VERSION));
        }
    }

    #[tokio::test]
    async fn test_list_rules_not_approved() {
        let (store, eng, hr, alice) = seeded().await;

        let mut ids = Vec::new();
        for _ in 0..3 {
            let rule = store
                .insert_rule(NewRule::temporary(alice.id, eng, hr, None, "", None, 0))
                .await
                .unwrap();
            ids.push(rule.id);
        }
        store
            .decide_rule(ids[1], &RuleDecision::reject(alice.id, None, 1))
            .await
            .unwrap();
        store
            .decide_rule(ids[2], &RuleDecision::approve(alice.id, None, 1))
            .await
            .unwrap();

        let listed: Vec<RuleId> = store
            .list_rules(&RuleQuery::new().not_approved())
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(listed, vec![ids[0], ids[1]]);
    }

    #[tokio::test]
    async fn test_delete_rule() {
        let (store, eng, hr, alice) = seeded().await;
        let rule = store
            .insert_rule(NewRule::permanent(eng, hr, alice.id, "", 0))
            .await
            .unwrap();

        assert!(store.delete_rule(rule.id).await.unwrap());
        assert!(!store.delete_rule(rule.id).await.unwrap());

        // The pair is free again.
        store
            .insert_rule(NewRule::permanent(hr, eng, alice.id, "", 0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_message_log() {
        let (store, _, _, alice) = seeded().await;

        for (at, status) in [(1, DeliveryStatus::Sent), (2, DeliveryStatus::Blocked)] {
            store
                .record_message(NewMessage {
                    sender_id: alice.id,
                    receiver_id: PrincipalId(2),
                    subject: Some("hi".into()),
                    body: "hello".into(),
                    status,
                    reason: None,
                    sent_at: at,
                })
                .await
                .unwrap();
        }

        let sent = store.list_sent(alice.id, Page::default()).await.unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].status, DeliveryStatus::Blocked);
        assert_eq!(
            store
                .list_received(PrincipalId(2), Page::first(1))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_reopen_file_keeps_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commgate.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            let a = store.insert_group("A").await.unwrap();
            let b = store.insert_group("B").await.unwrap();
            store
                .insert_rule(NewRule::permanent(a.id, b.id, PrincipalId(1), "", 0))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.list_rules(&RuleQuery::new()).await.unwrap().len(), 1);
    }
}
