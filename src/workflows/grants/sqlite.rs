use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::access::Role;
use super::domain::{
    Application, ApplicationEvent, ApplicationId, ApplicationStage, Client, ClientId, ClientRole,
    ClientType, DeadlineType, EventId, EventType, Grant, GrantId, GrantMatch, GrantStatus, Invite,
    InviteId, ManagedServiceRequest, MatchId, MatchStatus, Membership, Message, MessageChannel,
    MessageId, ServiceRequestId, ServiceRequestStatus, Tag, TagCategory, TagId, User, UserId,
};
use super::lookups::LookupCatalog;
use super::repository::{
    duplicate_email_message, duplicate_match_message, ApplicationFilter, GrantRepository,
    MatchFilter, MessageFilter, RepositoryError,
};
use super::scoring::FitLevel;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tags (
    category TEXT NOT NULL,
    id TEXT NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (category, id)
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    name TEXT,
    role TEXT NOT NULL,
    is_active INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS grants (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    funder TEXT,
    description TEXT,
    source_url TEXT,
    notes TEXT,
    status TEXT NOT NULL,
    deadline_type TEXT NOT NULL,
    deadline_at TEXT,
    next_deadline_at TEXT,
    last_verified_at TEXT,
    amount_min INTEGER,
    amount_max INTEGER,
    currency TEXT NOT NULL,
    eligibility TEXT NOT NULL,
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS clients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    entity_type TEXT,
    notes TEXT,
    client_type TEXT NOT NULL,
    eligibility TEXT NOT NULL,
    subscription_id TEXT,
    subscription_status TEXT,
    grant_db_access INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS client_users (
    client_id TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    client_role TEXT NOT NULL,
    PRIMARY KEY (client_id, user_id)
);

CREATE TABLE IF NOT EXISTS matches (
    id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    grant_id TEXT NOT NULL REFERENCES grants(id) ON DELETE CASCADE,
    fit_score INTEGER NOT NULL,
    fit_level TEXT NOT NULL,
    reasons TEXT NOT NULL,
    notes TEXT,
    status TEXT NOT NULL,
    owner TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (client_id, grant_id)
);

CREATE TABLE IF NOT EXISTS applications (
    id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    grant_id TEXT NOT NULL REFERENCES grants(id) ON DELETE CASCADE,
    match_id TEXT REFERENCES matches(id) ON DELETE SET NULL,
    stage TEXT NOT NULL,
    internal_deadline TEXT,
    submitted_at TEXT,
    decision_at TEXT,
    amount_requested INTEGER,
    amount_awarded INTEGER,
    assigned_to TEXT,
    cycle_year INTEGER,
    round_label TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS application_events (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    application_id TEXT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
    event_type TEXT NOT NULL,
    from_stage TEXT,
    to_stage TEXT,
    note TEXT,
    actor TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    client_id TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    application_id TEXT REFERENCES applications(id) ON DELETE SET NULL,
    channel TEXT NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    sent_to TEXT NOT NULL,
    sent_at TEXT NOT NULL,
    delivered INTEGER NOT NULL,
    created_by TEXT
);

CREATE TABLE IF NOT EXISTS invites (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    name TEXT,
    client_id TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    client_role TEXT NOT NULL,
    token TEXT NOT NULL UNIQUE,
    expires_at TEXT NOT NULL,
    created_by TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS managed_service_requests (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    client_id TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    message TEXT NOT NULL,
    contact_phone TEXT,
    status TEXT NOT NULL,
    notes TEXT,
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_applications_client ON applications(client_id);
CREATE INDEX IF NOT EXISTS idx_events_application ON application_events(application_id);
CREATE INDEX IF NOT EXISTS idx_messages_client ON messages(client_id);
CREATE INDEX IF NOT EXISTS idx_service_requests_status ON managed_service_requests(status);
"#;

const GRANT_COLUMNS: &str = "id, name, funder, description, source_url, notes, status, \
    deadline_type, deadline_at, next_deadline_at, last_verified_at, amount_min, amount_max, \
    currency, eligibility, created_by, created_at, updated_at";

const CLIENT_COLUMNS: &str = "id, name, entity_type, notes, client_type, eligibility, \
    subscription_id, subscription_status, grant_db_access, created_at, updated_at";

const USER_COLUMNS: &str = "id, email, name, role, is_active, created_at";

const MATCH_COLUMNS: &str = "id, client_id, grant_id, fit_score, fit_level, reasons, notes, \
    status, owner, created_at, updated_at";

const APPLICATION_COLUMNS: &str = "id, client_id, grant_id, match_id, stage, internal_deadline, \
    submitted_at, decision_at, amount_requested, amount_awarded, assigned_to, cycle_year, \
    round_label, created_at, updated_at";

const EVENT_COLUMNS: &str =
    "id, application_id, event_type, from_stage, to_stage, note, actor, created_at";

const MESSAGE_COLUMNS: &str = "id, client_id, application_id, channel, subject, body, sent_to, \
    sent_at, delivered, created_by";

const INVITE_COLUMNS: &str =
    "id, email, name, client_id, client_role, token, expires_at, created_by, created_at";

const SERVICE_REQUEST_COLUMNS: &str = "id, client_id, message, contact_phone, status, notes, \
    created_by, created_at, updated_at";

/// Durable store backed by a single SQLite connection.
///
/// The schema is created on open. Foreign keys carry the cascade rules and
/// `UNIQUE (client_id, grant_id)` guards matches.
pub struct SqliteGrantRepository {
    conn: Mutex<Connection>,
}

impl SqliteGrantRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path.as_ref()).map_err(storage_error)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(storage_error)?;
        Self::initialize(conn)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(storage_error)?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(storage_error)?;
        conn.execute_batch(SCHEMA).map_err(storage_error)?;
        debug!("sqlite grant store schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert every tag of `catalog` that is not stored yet.
    pub fn seed_lookups(&self, catalog: &LookupCatalog) -> Result<usize, RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage_error)?;
        let mut inserted = 0;
        for category in TagCategory::ordered() {
            for tag in catalog.tags(category) {
                inserted += tx
                    .execute(
                        "INSERT OR IGNORE INTO tags (category, id, name) VALUES (?1, ?2, ?3)",
                        params![category.label(), tag.id.as_str(), tag.name],
                    )
                    .map_err(storage_error)?;
            }
        }
        tx.commit().map_err(storage_error)?;
        Ok(inserted)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::Unavailable("sqlite connection mutex poisoned".into()))
    }
}

impl GrantRepository for SqliteGrantRepository {
    fn save_tag(&self, category: TagCategory, tag: Tag) -> Result<(), RepositoryError> {
        self.conn()?
            .execute(
                "INSERT INTO tags (category, id, name) VALUES (?1, ?2, ?3)
                 ON CONFLICT (category, id) DO UPDATE SET name = excluded.name",
                params![category.label(), tag.id.as_str(), tag.name],
            )
            .map_err(storage_error)?;
        Ok(())
    }

    fn lookups(&self) -> Result<LookupCatalog, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT category, id, name FROM tags")
            .map_err(storage_error)?;
        let rows = stmt
            .query_map([], |row| {
                let category = label(row, "category", TagCategory::parse)?;
                let id: String = row.get("id")?;
                Ok((category, Tag {
                    id: TagId(id),
                    name: row.get("name")?,
                }))
            })
            .map_err(storage_error)?;

        let mut catalog = LookupCatalog::new();
        for row in rows {
            let (category, tag) = row.map_err(storage_error)?;
            catalog.insert(category, tag);
        }
        Ok(catalog)
    }

    fn insert_user(&self, user: User) -> Result<User, RepositoryError> {
        insert_user_row(&*self.conn()?, &user)?;
        Ok(user)
    }

    fn fetch_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.as_str()],
                user_from_row,
            )
            .optional()
            .map_err(storage_error)
    }

    fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"),
                params![email],
                user_from_row,
            )
            .optional()
            .map_err(storage_error)
    }

    fn add_membership(&self, membership: Membership) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        ensure_exists(&conn, "clients", "client", membership.client_id.as_str())?;
        ensure_exists(&conn, "users", "user", membership.user_id.as_str())?;
        conn.execute(
            "INSERT INTO client_users (client_id, user_id, client_role) VALUES (?1, ?2, ?3)
             ON CONFLICT (client_id, user_id) DO UPDATE SET client_role = excluded.client_role",
            params![
                membership.client_id.as_str(),
                membership.user_id.as_str(),
                membership.client_role.label(),
            ],
        )
        .map_err(storage_error)?;
        Ok(())
    }

    fn client_members(&self, client_id: &ClientId) -> Result<Vec<User>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT u.id, u.email, u.name, u.role, u.is_active, u.created_at
                 FROM users u JOIN client_users cu ON cu.user_id = u.id
                 WHERE cu.client_id = ?1
                 ORDER BY u.email",
            )
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(params![client_id.as_str()], user_from_row)
            .map_err(storage_error)?;
        collect(rows)
    }

    fn memberships(&self, user_id: &UserId) -> Result<Vec<ClientId>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT client_id FROM client_users WHERE user_id = ?1 ORDER BY client_id")
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(params![user_id.as_str()], |row| {
                row.get::<_, String>(0).map(ClientId)
            })
            .map_err(storage_error)?;
        collect(rows)
    }

    fn insert_grant(&self, grant: Grant) -> Result<Grant, RepositoryError> {
        self.conn()?
            .execute(
                &format!(
                    "INSERT INTO grants ({GRANT_COLUMNS}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, \
                     ?13, ?14, ?15, ?16, ?17, ?18)"
                ),
                params![
                    grant.id.as_str(),
                    grant.name,
                    grant.funder,
                    grant.description,
                    grant.source_url,
                    grant.notes,
                    grant.status.label(),
                    grant.deadline_type.label(),
                    grant.deadline_at.map(date_text),
                    grant.next_deadline_at.map(date_text),
                    grant.last_verified_at.map(timestamp_text),
                    amount_value(grant.amount_min)?,
                    amount_value(grant.amount_max)?,
                    grant.currency,
                    json_text(&grant.eligibility)?,
                    grant.created_by.as_ref().map(UserId::as_str),
                    timestamp_text(grant.created_at),
                    timestamp_text(grant.updated_at),
                ],
            )
            .map_err(storage_error)?;
        Ok(grant)
    }

    fn update_grant(&self, grant: Grant) -> Result<(), RepositoryError> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE grants SET name = ?2, funder = ?3, description = ?4, source_url = ?5,
                    notes = ?6, status = ?7, deadline_type = ?8, deadline_at = ?9,
                    next_deadline_at = ?10, last_verified_at = ?11, amount_min = ?12,
                    amount_max = ?13, currency = ?14, eligibility = ?15, updated_at = ?16
                 WHERE id = ?1",
                params![
                    grant.id.as_str(),
                    grant.name,
                    grant.funder,
                    grant.description,
                    grant.source_url,
                    grant.notes,
                    grant.status.label(),
                    grant.deadline_type.label(),
                    grant.deadline_at.map(date_text),
                    grant.next_deadline_at.map(date_text),
                    grant.last_verified_at.map(timestamp_text),
                    amount_value(grant.amount_min)?,
                    amount_value(grant.amount_max)?,
                    grant.currency,
                    json_text(&grant.eligibility)?,
                    timestamp_text(grant.updated_at),
                ],
            )
            .map_err(storage_error)?;
        expect_row(changed, "grant", &grant.id)
    }

    fn fetch_grant(&self, id: &GrantId) -> Result<Option<Grant>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {GRANT_COLUMNS} FROM grants WHERE id = ?1"),
                params![id.as_str()],
                grant_from_row,
            )
            .optional()
            .map_err(storage_error)
    }

    fn list_grants(&self, status: Option<GrantStatus>) -> Result<Vec<Grant>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {GRANT_COLUMNS} FROM grants
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY deadline_at IS NULL, deadline_at, name, id"
            ))
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(params![status.map(GrantStatus::label)], grant_from_row)
            .map_err(storage_error)?;
        collect(rows)
    }

    fn delete_grant(&self, id: &GrantId) -> Result<(), RepositoryError> {
        let changed = self
            .conn()?
            .execute("DELETE FROM grants WHERE id = ?1", params![id.as_str()])
            .map_err(storage_error)?;
        expect_row(changed, "grant", id)
    }

    fn insert_client(&self, client: Client) -> Result<Client, RepositoryError> {
        insert_client_row(&*self.conn()?, &client)?;
        Ok(client)
    }

    fn update_client(&self, client: Client) -> Result<(), RepositoryError> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE clients SET name = ?2, entity_type = ?3, notes = ?4, client_type = ?5,
                    eligibility = ?6, subscription_id = ?7, subscription_status = ?8,
                    grant_db_access = ?9, updated_at = ?10
                 WHERE id = ?1",
                params![
                    client.id.as_str(),
                    client.name,
                    client.entity_type,
                    client.notes,
                    client.client_type.label(),
                    json_text(&client.eligibility)?,
                    client.subscription_id,
                    client.subscription_status,
                    client.grant_db_access,
                    timestamp_text(client.updated_at),
                ],
            )
            .map_err(storage_error)?;
        expect_row(changed, "client", &client.id)
    }

    fn fetch_client(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"),
                params![id.as_str()],
                client_from_row,
            )
            .optional()
            .map_err(storage_error)
    }

    fn fetch_client_by_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Client>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE subscription_id = ?1"),
                params![subscription_id],
                client_from_row,
            )
            .optional()
            .map_err(storage_error)
    }

    fn list_clients(&self) -> Result<Vec<Client>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {CLIENT_COLUMNS} FROM clients ORDER BY name, id"))
            .map_err(storage_error)?;
        let rows = stmt.query_map([], client_from_row).map_err(storage_error)?;
        collect(rows)
    }

    fn delete_client(&self, id: &ClientId) -> Result<(), RepositoryError> {
        let changed = self
            .conn()?
            .execute("DELETE FROM clients WHERE id = ?1", params![id.as_str()])
            .map_err(storage_error)?;
        expect_row(changed, "client", id)
    }

    fn insert_match(&self, record: GrantMatch) -> Result<GrantMatch, RepositoryError> {
        self.conn()?
            .execute(
                &format!(
                    "INSERT INTO matches ({MATCH_COLUMNS}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    record.id.as_str(),
                    record.client_id.as_str(),
                    record.grant_id.as_str(),
                    record.fit_score,
                    record.fit_level.label(),
                    json_text(&record.reasons)?,
                    record.notes,
                    record.status.label(),
                    record.owner.as_ref().map(UserId::as_str),
                    timestamp_text(record.created_at),
                    timestamp_text(record.updated_at),
                ],
            )
            .map_err(|err| {
                conflict_as(err, || {
                    duplicate_match_message(&record.client_id, &record.grant_id)
                })
            })?;
        Ok(record)
    }

    fn update_match(&self, record: GrantMatch) -> Result<(), RepositoryError> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE matches SET notes = ?2, status = ?3, owner = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    record.id.as_str(),
                    record.notes,
                    record.status.label(),
                    record.owner.as_ref().map(UserId::as_str),
                    timestamp_text(record.updated_at),
                ],
            )
            .map_err(storage_error)?;
        expect_row(changed, "match", &record.id)
    }

    fn fetch_match(&self, id: &MatchId) -> Result<Option<GrantMatch>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?1"),
                params![id.as_str()],
                match_from_row,
            )
            .optional()
            .map_err(storage_error)
    }

    fn list_matches(&self, filter: &MatchFilter) -> Result<Vec<GrantMatch>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MATCH_COLUMNS} FROM matches
                 WHERE (?1 IS NULL OR client_id = ?1) AND (?2 IS NULL OR status = ?2)
                 ORDER BY fit_score DESC, created_at, id"
            ))
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(
                params![
                    filter.client_id.as_ref().map(ClientId::as_str),
                    filter.status.map(MatchStatus::label),
                ],
                match_from_row,
            )
            .map_err(storage_error)?;
        collect(rows)
    }

    fn delete_match(&self, id: &MatchId) -> Result<(), RepositoryError> {
        let changed = self
            .conn()?
            .execute("DELETE FROM matches WHERE id = ?1", params![id.as_str()])
            .map_err(storage_error)?;
        expect_row(changed, "match", id)
    }

    fn insert_application(
        &self,
        application: Application,
        event: ApplicationEvent,
        converts: Option<&MatchId>,
    ) -> Result<Application, RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage_error)?;

        if let Some(match_id) = converts {
            let changed = tx
                .execute(
                    "UPDATE matches SET status = ?2, updated_at = ?3 WHERE id = ?1",
                    params![
                        match_id.as_str(),
                        MatchStatus::Converted.label(),
                        timestamp_text(application.created_at),
                    ],
                )
                .map_err(storage_error)?;
            expect_row(changed, "match", match_id)?;
        }

        tx.execute(
            &format!(
                "INSERT INTO applications ({APPLICATION_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                application.id.as_str(),
                application.client_id.as_str(),
                application.grant_id.as_str(),
                application.match_id.as_ref().map(MatchId::as_str),
                application.stage.label(),
                application.internal_deadline.map(date_text),
                application.submitted_at.map(timestamp_text),
                application.decision_at.map(timestamp_text),
                amount_value(application.amount_requested)?,
                amount_value(application.amount_awarded)?,
                application.assigned_to.as_ref().map(UserId::as_str),
                application.cycle_year,
                application.round_label,
                timestamp_text(application.created_at),
                timestamp_text(application.updated_at),
            ],
        )
        .map_err(storage_error)?;
        insert_event(&tx, &event)?;

        tx.commit().map_err(storage_error)?;
        Ok(application)
    }

    fn update_application(
        &self,
        id: &ApplicationId,
        change: &mut dyn FnMut(&mut Application) -> Option<ApplicationEvent>,
    ) -> Result<Application, RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_error)?;

        let mut application = tx
            .query_row(
                &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
                params![id.as_str()],
                application_from_row,
            )
            .optional()
            .map_err(storage_error)?
            .ok_or_else(|| RepositoryError::not_found("application", id))?;
        let event = change(&mut application);

        let changed = tx
            .execute(
                "UPDATE applications SET match_id = ?2, stage = ?3, internal_deadline = ?4,
                    submitted_at = ?5, decision_at = ?6, amount_requested = ?7,
                    amount_awarded = ?8, assigned_to = ?9, cycle_year = ?10,
                    round_label = ?11, updated_at = ?12
                 WHERE id = ?1",
                params![
                    application.id.as_str(),
                    application.match_id.as_ref().map(MatchId::as_str),
                    application.stage.label(),
                    application.internal_deadline.map(date_text),
                    application.submitted_at.map(timestamp_text),
                    application.decision_at.map(timestamp_text),
                    amount_value(application.amount_requested)?,
                    amount_value(application.amount_awarded)?,
                    application.assigned_to.as_ref().map(UserId::as_str),
                    application.cycle_year,
                    application.round_label,
                    timestamp_text(application.updated_at),
                ],
            )
            .map_err(storage_error)?;
        expect_row(changed, "application", &application.id)?;

        if let Some(event) = &event {
            insert_event(&tx, event)?;
        }

        tx.commit().map_err(storage_error)?;
        Ok(application)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
                params![id.as_str()],
                application_from_row,
            )
            .optional()
            .map_err(storage_error)
    }

    fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {APPLICATION_COLUMNS} FROM applications
                 WHERE (?1 IS NULL OR client_id = ?1)
                   AND (?2 IS NULL OR stage = ?2)
                   AND (?3 IS NULL OR assigned_to = ?3)
                 ORDER BY internal_deadline IS NULL, internal_deadline, updated_at DESC, id"
            ))
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(
                params![
                    filter.client_id.as_ref().map(ClientId::as_str),
                    filter.stage.map(ApplicationStage::label),
                    filter.assigned_to.as_ref().map(UserId::as_str),
                ],
                application_from_row,
            )
            .map_err(storage_error)?;

        let mut applications = collect(rows)?;
        if let Some(allowed) = &filter.client_ids {
            applications.retain(|application| allowed.contains(&application.client_id));
        }
        Ok(applications)
    }

    fn delete_application(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        let changed = self
            .conn()?
            .execute("DELETE FROM applications WHERE id = ?1", params![id.as_str()])
            .map_err(storage_error)?;
        expect_row(changed, "application", id)
    }

    fn stage_counts(&self) -> Result<BTreeMap<ApplicationStage, u64>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT stage, COUNT(*) AS total FROM applications GROUP BY stage")
            .map_err(storage_error)?;
        let rows = stmt
            .query_map([], |row| {
                let stage = label(row, "stage", ApplicationStage::parse)?;
                let total: i64 = row.get("total")?;
                Ok((stage, u64::try_from(total).unwrap_or(0)))
            })
            .map_err(storage_error)?;
        Ok(collect(rows)?.into_iter().collect())
    }

    fn append_event(&self, event: ApplicationEvent) -> Result<ApplicationEvent, RepositoryError> {
        let conn = self.conn()?;
        ensure_exists(&conn, "applications", "application", event.application_id.as_str())?;
        insert_event(&conn, &event)?;
        Ok(event)
    }

    fn list_events(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApplicationEvent>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM application_events
                 WHERE application_id = ?1
                 ORDER BY created_at DESC, seq DESC"
            ))
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(params![application_id.as_str()], event_from_row)
            .map_err(storage_error)?;
        collect(rows)
    }

    fn insert_message(&self, message: Message) -> Result<Message, RepositoryError> {
        self.conn()?
            .execute(
                &format!(
                    "INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    message.id.as_str(),
                    message.client_id.as_str(),
                    message.application_id.as_ref().map(ApplicationId::as_str),
                    message.channel.label(),
                    message.subject,
                    message.body,
                    message.sent_to,
                    timestamp_text(message.sent_at),
                    message.delivered,
                    message.created_by.as_ref().map(UserId::as_str),
                ],
            )
            .map_err(storage_error)?;
        Ok(message)
    }

    fn list_messages(&self, filter: &MessageFilter) -> Result<Vec<Message>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE (?1 IS NULL OR client_id = ?1) AND (?2 IS NULL OR application_id = ?2)
                 ORDER BY sent_at DESC, seq DESC"
            ))
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(
                params![
                    filter.client_id.as_ref().map(ClientId::as_str),
                    filter.application_id.as_ref().map(ApplicationId::as_str),
                ],
                message_from_row,
            )
            .map_err(storage_error)?;
        collect(rows)
    }

    fn insert_invite(&self, invite: Invite) -> Result<Invite, RepositoryError> {
        self.conn()?
            .execute(
                &format!(
                    "INSERT INTO invites ({INVITE_COLUMNS}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    invite.id.as_str(),
                    invite.email,
                    invite.name,
                    invite.client_id.as_str(),
                    invite.client_role.label(),
                    invite.token,
                    timestamp_text(invite.expires_at),
                    invite.created_by.as_ref().map(UserId::as_str),
                    timestamp_text(invite.created_at),
                ],
            )
            .map_err(storage_error)?;
        Ok(invite)
    }

    fn update_invite(&self, invite: Invite) -> Result<(), RepositoryError> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE invites SET name = ?2, client_role = ?3, token = ?4, expires_at = ?5
                 WHERE id = ?1",
                params![
                    invite.id.as_str(),
                    invite.name,
                    invite.client_role.label(),
                    invite.token,
                    timestamp_text(invite.expires_at),
                ],
            )
            .map_err(storage_error)?;
        expect_row(changed, "invite", &invite.id)
    }

    fn fetch_invite(&self, id: &InviteId) -> Result<Option<Invite>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {INVITE_COLUMNS} FROM invites WHERE id = ?1"),
                params![id.as_str()],
                invite_from_row,
            )
            .optional()
            .map_err(storage_error)
    }

    fn fetch_invite_by_token(&self, token: &str) -> Result<Option<Invite>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {INVITE_COLUMNS} FROM invites WHERE token = ?1"),
                params![token],
                invite_from_row,
            )
            .optional()
            .map_err(storage_error)
    }

    fn list_invites(&self, client_id: &ClientId) -> Result<Vec<Invite>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {INVITE_COLUMNS} FROM invites WHERE client_id = ?1
                 ORDER BY created_at DESC, id"
            ))
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(params![client_id.as_str()], invite_from_row)
            .map_err(storage_error)?;
        collect(rows)
    }

    fn delete_invite(&self, id: &InviteId) -> Result<(), RepositoryError> {
        let changed = self
            .conn()?
            .execute("DELETE FROM invites WHERE id = ?1", params![id.as_str()])
            .map_err(storage_error)?;
        expect_row(changed, "invite", id)
    }

    fn accept_invite(&self, invite: &Invite, user: User) -> Result<User, RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage_error)?;

        insert_user_row(&tx, &user)?;
        tx.execute(
            "INSERT INTO client_users (client_id, user_id, client_role) VALUES (?1, ?2, ?3)",
            params![
                invite.client_id.as_str(),
                user.id.as_str(),
                invite.client_role.label(),
            ],
        )
        .map_err(storage_error)?;
        let removed = tx
            .execute("DELETE FROM invites WHERE id = ?1", params![invite.id.as_str()])
            .map_err(storage_error)?;
        expect_row(removed, "invite", &invite.id)?;

        tx.commit().map_err(storage_error)?;
        Ok(user)
    }

    fn insert_signup(&self, client: Client, owner: User) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage_error)?;

        insert_client_row(&tx, &client)?;
        insert_user_row(&tx, &owner)?;
        tx.execute(
            "INSERT INTO client_users (client_id, user_id, client_role) VALUES (?1, ?2, ?3)",
            params![
                client.id.as_str(),
                owner.id.as_str(),
                ClientRole::Owner.label(),
            ],
        )
        .map_err(storage_error)?;

        tx.commit().map_err(storage_error)
    }

    fn insert_service_request(
        &self,
        request: ManagedServiceRequest,
    ) -> Result<ManagedServiceRequest, RepositoryError> {
        let conn = self.conn()?;
        ensure_exists(&conn, "clients", "client", request.client_id.as_str())?;
        conn.execute(
            &format!(
                "INSERT INTO managed_service_requests ({SERVICE_REQUEST_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                request.id.as_str(),
                request.client_id.as_str(),
                request.message,
                request.contact_phone,
                request.status.label(),
                request.notes,
                request.created_by.as_ref().map(UserId::as_str),
                timestamp_text(request.created_at),
                timestamp_text(request.updated_at),
            ],
        )
        .map_err(storage_error)?;
        Ok(request)
    }

    fn update_service_request(
        &self,
        id: &ServiceRequestId,
        change: &mut dyn FnMut(&mut ManagedServiceRequest),
    ) -> Result<ManagedServiceRequest, RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_error)?;

        let mut request = tx
            .query_row(
                &format!(
                    "SELECT {SERVICE_REQUEST_COLUMNS} FROM managed_service_requests \
                     WHERE id = ?1"
                ),
                params![id.as_str()],
                service_request_from_row,
            )
            .optional()
            .map_err(storage_error)?
            .ok_or_else(|| RepositoryError::not_found("service request", id))?;
        change(&mut request);

        tx.execute(
            "UPDATE managed_service_requests SET status = ?2, notes = ?3, updated_at = ?4
             WHERE id = ?1",
            params![
                request.id.as_str(),
                request.status.label(),
                request.notes,
                timestamp_text(request.updated_at),
            ],
        )
        .map_err(storage_error)?;

        tx.commit().map_err(storage_error)?;
        Ok(request)
    }

    fn fetch_service_request(
        &self,
        id: &ServiceRequestId,
    ) -> Result<Option<ManagedServiceRequest>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!(
                    "SELECT {SERVICE_REQUEST_COLUMNS} FROM managed_service_requests \
                     WHERE id = ?1"
                ),
                params![id.as_str()],
                service_request_from_row,
            )
            .optional()
            .map_err(storage_error)
    }

    fn list_service_requests(
        &self,
        status: Option<ServiceRequestStatus>,
    ) -> Result<Vec<ManagedServiceRequest>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SERVICE_REQUEST_COLUMNS} FROM managed_service_requests
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY created_at DESC, seq DESC"
            ))
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(
                params![status.map(ServiceRequestStatus::label)],
                service_request_from_row,
            )
            .map_err(storage_error)?;
        collect(rows)
    }
}

fn insert_user_row(conn: &Connection, user: &User) -> Result<(), RepositoryError> {
    conn.execute(
        &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            user.id.as_str(),
            user.email,
            user.name,
            user.role.label(),
            user.is_active,
            timestamp_text(user.created_at),
        ],
    )
    .map_err(|err| conflict_as(err, || duplicate_email_message(&user.email)))?;
    Ok(())
}

fn insert_client_row(conn: &Connection, client: &Client) -> Result<(), RepositoryError> {
    conn.execute(
        &format!(
            "INSERT INTO clients ({CLIENT_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            client.id.as_str(),
            client.name,
            client.entity_type,
            client.notes,
            client.client_type.label(),
            json_text(&client.eligibility)?,
            client.subscription_id,
            client.subscription_status,
            client.grant_db_access,
            timestamp_text(client.created_at),
            timestamp_text(client.updated_at),
        ],
    )
    .map_err(storage_error)?;
    Ok(())
}

fn insert_event(conn: &Connection, event: &ApplicationEvent) -> Result<(), RepositoryError> {
    conn.execute(
        &format!(
            "INSERT INTO application_events ({EVENT_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        params![
            event.id.as_str(),
            event.application_id.as_str(),
            event.event_type.label(),
            event.from_stage.map(ApplicationStage::label),
            event.to_stage.map(ApplicationStage::label),
            event.note,
            event.actor.as_ref().map(UserId::as_str),
            timestamp_text(event.created_at),
        ],
    )
    .map_err(storage_error)?;
    Ok(())
}

fn ensure_exists(
    conn: &Connection,
    table: &str,
    entity: &'static str,
    id: &str,
) -> Result<(), RepositoryError> {
    let found = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE id = ?1"),
            params![id],
            |_| Ok(()),
        )
        .optional()
        .map_err(storage_error)?;
    found.ok_or_else(|| RepositoryError::not_found(entity, id))
}

fn expect_row(
    changed: usize,
    entity: &'static str,
    id: impl ToString,
) -> Result<(), RepositoryError> {
    if changed == 0 {
        Err(RepositoryError::not_found(entity, id))
    } else {
        Ok(())
    }
}

fn collect<T, I>(rows: I) -> Result<Vec<T>, RepositoryError>
where
    I: Iterator<Item = rusqlite::Result<T>>,
{
    rows.collect::<rusqlite::Result<Vec<T>>>()
        .map_err(storage_error)
}

fn storage_error(err: rusqlite::Error) -> RepositoryError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            RepositoryError::Conflict(message.clone().unwrap_or_else(|| err.to_string()))
        }
        _ => RepositoryError::Unavailable(err.to_string()),
    }
}

/// Like `storage_error`, but reports uniqueness violations with a domain message.
fn conflict_as<F>(err: rusqlite::Error, message: F) -> RepositoryError
where
    F: FnOnce() -> String,
{
    match storage_error(err) {
        RepositoryError::Conflict(_) => RepositoryError::Conflict(message()),
        other => other,
    }
}

fn timestamp_text(value: DateTime<Utc>) -> String {
    // Fixed-width so lexical order equals chronological order.
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn date_text(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn amount_value(value: Option<u64>) -> Result<Option<i64>, RepositoryError> {
    value
        .map(i64::try_from)
        .transpose()
        .map_err(|_| RepositoryError::Unavailable("amount exceeds storable range".into()))
}

fn json_text<T: Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|err| RepositoryError::Unavailable(format!("failed to encode column: {err}")))
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized value '{0}'")]
struct UnrecognizedValue(String);

fn conversion_error<E>(row: &Row<'_>, column: &str, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let index = row.as_ref().column_index(column).unwrap_or_default();
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

fn label<T>(row: &Row<'_>, column: &str, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    parse(&raw).ok_or_else(|| conversion_error(row, column, UnrecognizedValue(raw)))
}

fn optional_label<T>(
    row: &Row<'_>,
    column: &str,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|raw| {
        parse(&raw).ok_or_else(|| conversion_error(row, column, UnrecognizedValue(raw)))
    })
    .transpose()
}

fn timestamp(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| conversion_error(row, column, err))
}

fn optional_timestamp(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|err| conversion_error(row, column, err))
    })
    .transpose()
}

fn optional_date(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|raw| {
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|err| conversion_error(row, column, err))
    })
    .transpose()
}

fn optional_amount(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<u64>> {
    let raw: Option<i64> = row.get(column)?;
    raw.map(|raw| u64::try_from(raw).map_err(|err| conversion_error(row, column, err)))
        .transpose()
}

fn json<T: DeserializeOwned>(row: &Row<'_>, column: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|err| conversion_error(row, column, err))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get("id")?),
        email: row.get("email")?,
        name: row.get("name")?,
        role: label(row, "role", Role::parse)?,
        is_active: row.get("is_active")?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn grant_from_row(row: &Row<'_>) -> rusqlite::Result<Grant> {
    Ok(Grant {
        id: GrantId(row.get("id")?),
        name: row.get("name")?,
        funder: row.get("funder")?,
        description: row.get("description")?,
        source_url: row.get("source_url")?,
        notes: row.get("notes")?,
        status: label(row, "status", GrantStatus::parse)?,
        deadline_type: label(row, "deadline_type", DeadlineType::parse)?,
        deadline_at: optional_date(row, "deadline_at")?,
        next_deadline_at: optional_date(row, "next_deadline_at")?,
        last_verified_at: optional_timestamp(row, "last_verified_at")?,
        amount_min: optional_amount(row, "amount_min")?,
        amount_max: optional_amount(row, "amount_max")?,
        currency: row.get("currency")?,
        eligibility: json(row, "eligibility")?,
        created_by: row.get::<_, Option<String>>("created_by")?.map(UserId),
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: ClientId(row.get("id")?),
        name: row.get("name")?,
        entity_type: row.get("entity_type")?,
        notes: row.get("notes")?,
        client_type: label(row, "client_type", ClientType::parse)?,
        eligibility: json(row, "eligibility")?,
        subscription_id: row.get("subscription_id")?,
        subscription_status: row.get("subscription_status")?,
        grant_db_access: row.get("grant_db_access")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn match_from_row(row: &Row<'_>) -> rusqlite::Result<GrantMatch> {
    Ok(GrantMatch {
        id: MatchId(row.get("id")?),
        client_id: ClientId(row.get("client_id")?),
        grant_id: GrantId(row.get("grant_id")?),
        fit_score: row.get("fit_score")?,
        fit_level: label(row, "fit_level", FitLevel::parse)?,
        reasons: json(row, "reasons")?,
        notes: row.get("notes")?,
        status: label(row, "status", MatchStatus::parse)?,
        owner: row.get::<_, Option<String>>("owner")?.map(UserId),
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        id: ApplicationId(row.get("id")?),
        client_id: ClientId(row.get("client_id")?),
        grant_id: GrantId(row.get("grant_id")?),
        match_id: row.get::<_, Option<String>>("match_id")?.map(MatchId),
        stage: label(row, "stage", ApplicationStage::parse)?,
        internal_deadline: optional_date(row, "internal_deadline")?,
        submitted_at: optional_timestamp(row, "submitted_at")?,
        decision_at: optional_timestamp(row, "decision_at")?,
        amount_requested: optional_amount(row, "amount_requested")?,
        amount_awarded: optional_amount(row, "amount_awarded")?,
        assigned_to: row.get::<_, Option<String>>("assigned_to")?.map(UserId),
        cycle_year: row.get("cycle_year")?,
        round_label: row.get("round_label")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<ApplicationEvent> {
    Ok(ApplicationEvent {
        id: EventId(row.get("id")?),
        application_id: ApplicationId(row.get("application_id")?),
        event_type: label(row, "event_type", EventType::parse)?,
        from_stage: optional_label(row, "from_stage", ApplicationStage::parse)?,
        to_stage: optional_label(row, "to_stage", ApplicationStage::parse)?,
        note: row.get("note")?,
        actor: row.get::<_, Option<String>>("actor")?.map(UserId),
        created_at: timestamp(row, "created_at")?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId(row.get("id")?),
        client_id: ClientId(row.get("client_id")?),
        application_id: row
            .get::<_, Option<String>>("application_id")?
            .map(ApplicationId),
        channel: label(row, "channel", MessageChannel::parse)?,
        subject: row.get("subject")?,
        body: row.get("body")?,
        sent_to: row.get("sent_to")?,
        sent_at: timestamp(row, "sent_at")?,
        delivered: row.get("delivered")?,
        created_by: row.get::<_, Option<String>>("created_by")?.map(UserId),
    })
}

fn invite_from_row(row: &Row<'_>) -> rusqlite::Result<Invite> {
    Ok(Invite {
        id: InviteId(row.get("id")?),
        email: row.get("email")?,
        name: row.get("name")?,
        client_id: ClientId(row.get("client_id")?),
        client_role: label(row, "client_role", ClientRole::parse)?,
        token: row.get("token")?,
        expires_at: timestamp(row, "expires_at")?,
        created_by: row.get::<_, Option<String>>("created_by")?.map(UserId),
        created_at: timestamp(row, "created_at")?,
    })
}

fn service_request_from_row(row: &Row<'_>) -> rusqlite::Result<ManagedServiceRequest> {
    Ok(ManagedServiceRequest {
        id: ServiceRequestId(row.get("id")?),
        client_id: ClientId(row.get("client_id")?),
        message: row.get("message")?,
        contact_phone: row.get("contact_phone")?,
        status: label(row, "status", ServiceRequestStatus::parse)?,
        notes: row.get("notes")?,
        created_by: row.get::<_, Option<String>>("created_by")?.map(UserId),
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}
