//! # Data Model
//!
//! The tracked entity kinds, the generic persisted row shape, and local-id
//! minting for records created while offline.
//!
//! Every domain record serializes to a self-contained JSON payload (the
//! payload carries its own `id`, `owner_id`, and `updated_at`), so a snapshot
//! taken at enqueue time can be replayed against the remote store without
//! consulting the local row again.

use crate::error::{Result, StoreError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Entity Kinds
// ============================================================================

/// The tracked entity kinds.
///
/// Each kind maps to one local table (see [`EntityKind::table_name`]) and one
/// remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A supplement regimen entry
    Supplement,
    /// A grocery purchase log entry (high-volume, log-type)
    Grocery,
    /// A recurring bill
    Bill,
}

impl EntityKind {
    /// All entity kinds, in bootstrap order.
    pub const ALL: [EntityKind; 3] = [EntityKind::Supplement, EntityKind::Grocery, EntityKind::Bill];

    /// String representation used in the queue table and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Supplement => "supplement",
            EntityKind::Grocery => "grocery",
            EntityKind::Bill => "bill",
        }
    }

    /// Local table backing this kind
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Supplement => "supplements",
            EntityKind::Grocery => "groceries",
            EntityKind::Bill => "bills",
        }
    }
}

impl FromStr for EntityKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "supplement" => Ok(EntityKind::Supplement),
            "grocery" => Ok(EntityKind::Grocery),
            "bill" => Ok(EntityKind::Bill),
            _ => Err(StoreError::InvalidKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Local Ids
// ============================================================================

/// Prefix tagging identifiers minted on-device.
///
/// A local id is never presented to the remote store; once the record syncs,
/// the id is replaced wholesale with the server-assigned value.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Mint a fresh local identifier for a record created while offline
pub fn mint_local_id() -> String {
    format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4())
}

/// Check whether an identifier was minted on-device
pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

// ============================================================================
// Stored Record
// ============================================================================

/// Generic persisted row shape shared by all entity tables.
///
/// The payload column holds the full domain record as JSON; `id`, `owner_id`,
/// and `updated_at` are denormalized into real columns for keying and
/// indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Record identifier: either a `local-` tagged id or a server id
    pub id: String,
    /// Owning user, the secondary index key
    pub owner_id: String,
    /// Full domain record as JSON
    pub payload: Value,
    /// Unix timestamp in milliseconds of the last local write
    pub updated_at: i64,
}

impl StoredRecord {
    /// Build a stored record from a self-contained JSON payload.
    ///
    /// The payload must carry `id`, `owner_id` (strings) and `updated_at`
    /// (integer); remote snapshots and queue payloads always do.
    pub fn from_payload(payload: Value) -> Result<Self> {
        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::InvalidPayload("missing string field `id`".to_string()))?
            .to_string();
        let owner_id = payload
            .get("owner_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StoreError::InvalidPayload("missing string field `owner_id`".to_string())
            })?
            .to_string();
        let updated_at = payload
            .get("updated_at")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                StoreError::InvalidPayload("missing integer field `updated_at`".to_string())
            })?;

        Ok(Self {
            id,
            owner_id,
            payload,
            updated_at,
        })
    }

    /// Re-key this record under a different identifier, keeping the payload's
    /// embedded `id` field consistent with the row key.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if let Value::Object(ref mut map) = self.payload {
            map.insert("id".to_string(), Value::String(id.clone()));
        }
        self.id = id;
        self
    }
}

// ============================================================================
// Domain Record Trait
// ============================================================================

/// A domain record that can live in the local store and travel through the
/// sync queue.
pub trait DomainRecord:
    Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    /// The entity kind (and therefore the table) this record belongs to
    const KIND: EntityKind;

    /// Record identifier
    fn id(&self) -> &str;

    /// Replace the record identifier (used by the local-to-server id swap)
    fn set_id(&mut self, id: String);

    /// Owning user
    fn owner_id(&self) -> &str;

    /// Last local write, Unix milliseconds
    fn updated_at(&self) -> i64;

    /// Stamp the last local write
    fn set_updated_at(&mut self, timestamp_ms: i64);

    /// Validate domain constraints. Returns a message on failure.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Serialize into the generic persisted shape
    fn to_stored(&self) -> Result<StoredRecord> {
        Ok(StoredRecord {
            id: self.id().to_string(),
            owner_id: self.owner_id().to_string(),
            payload: serde_json::to_value(self)?,
            updated_at: self.updated_at(),
        })
    }

    /// Deserialize from the generic persisted shape
    fn from_stored(record: &StoredRecord) -> Result<Self> {
        Ok(serde_json::from_value(record.payload.clone())?)
    }
}

// ============================================================================
// Domain Models
// ============================================================================

/// A supplement regimen entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplement {
    pub id: String,
    pub owner_id: String,
    /// Display name, e.g. "Vitamin D3"
    pub name: String,
    /// Dose per intake in milligrams
    pub dose_mg: f64,
    /// Free-form schedule, e.g. "morning", "2x daily"
    pub schedule: String,
    /// Whether the regimen is currently active
    pub active: bool,
    pub updated_at: i64,
}

impl Supplement {
    /// Create a new supplement draft (id assigned by the façade on create)
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>, dose_mg: f64) -> Self {
        Self {
            id: String::new(),
            owner_id: owner_id.into(),
            name: name.into(),
            dose_mg,
            schedule: String::new(),
            active: true,
            updated_at: 0,
        }
    }
}

impl DomainRecord for Supplement {
    const KIND: EntityKind = EntityKind::Supplement;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn set_updated_at(&mut self, timestamp_ms: i64) {
        self.updated_at = timestamp_ms;
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("supplement name must not be empty".to_string());
        }
        if self.dose_mg < 0.0 {
            return Err("dose must not be negative".to_string());
        }
        Ok(())
    }
}

/// A grocery purchase log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grocery {
    pub id: String,
    pub owner_id: String,
    /// Item name as purchased
    pub name: String,
    /// Category, e.g. "produce", "dairy"
    pub category: String,
    /// Price paid, in cents
    pub price_cents: i64,
    /// Purchase time, Unix milliseconds
    pub purchased_at: i64,
    pub updated_at: i64,
}

impl Grocery {
    /// Create a new grocery draft (id assigned by the façade on create)
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        price_cents: i64,
        purchased_at: i64,
    ) -> Self {
        Self {
            id: String::new(),
            owner_id: owner_id.into(),
            name: name.into(),
            category: String::new(),
            price_cents,
            purchased_at,
            updated_at: 0,
        }
    }
}

impl DomainRecord for Grocery {
    const KIND: EntityKind = EntityKind::Grocery;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn set_updated_at(&mut self, timestamp_ms: i64) {
        self.updated_at = timestamp_ms;
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("grocery name must not be empty".to_string());
        }
        if self.price_cents < 0 {
            return Err("price must not be negative".to_string());
        }
        Ok(())
    }
}

/// A recurring bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub owner_id: String,
    /// Display name, e.g. "Electricity"
    pub name: String,
    /// Amount due per cycle, in cents
    pub amount_cents: i64,
    /// Day of month the bill is due (1-31)
    pub due_day: u8,
    /// Whether the bill is paid automatically
    pub autopay: bool,
    pub updated_at: i64,
}

impl Bill {
    /// Create a new bill draft (id assigned by the façade on create)
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        amount_cents: i64,
        due_day: u8,
    ) -> Self {
        Self {
            id: String::new(),
            owner_id: owner_id.into(),
            name: name.into(),
            amount_cents,
            due_day,
            autopay: false,
            updated_at: 0,
        }
    }
}

impl DomainRecord for Bill {
    const KIND: EntityKind = EntityKind::Bill;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn set_updated_at(&mut self, timestamp_ms: i64) {
        self.updated_at = timestamp_ms;
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("bill name must not be empty".to_string());
        }
        if !(1..=31).contains(&self.due_day) {
            return Err("due day must be between 1 and 31".to_string());
        }
        Ok(())
    }
}
