//! Domain records returned by the client.
//!
//! Records keep the stored fields exactly as read; the accessors only
//! interpret well-known fields and never rewrite the map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::store::clock::parse_timestamp;
use crate::store::{Document, Fields};

/// Collection names in the document hierarchy.
pub mod collections {
    /// Top-level collection of user profiles, keyed by uid.
    pub const USERS: &str = "users";
    /// Customers of one user.
    pub const CUSTOMERS: &str = "customers";
    /// Drawings of one user, keyed by customer id.
    pub const DRAWINGS: &str = "drawings";
    /// Backup history of one user.
    pub const BACKUP_HISTORY: &str = "backupHistory";
    /// Bug reports filed by one user.
    pub const BUG_REPORTS: &str = "bugReports";
    /// Top-level collection of public intake forms.
    pub const CUSTOMER_FORMS: &str = "customerForms";
}

/// Well-known field names.
pub mod field {
    /// Account email copied from the session onto the profile.
    pub const EMAIL: &str = "email";
    /// Per-user customer quota on the profile.
    pub const MAX_CUSTOMERS: &str = "maxCustomers";
    /// Creation timestamp.
    pub const CREATED_AT: &str = "createdAt";
    /// Last write timestamp.
    pub const UPDATED_AT: &str = "updatedAt";
    /// Owning customer of a drawing.
    pub const CUSTOMER_ID: &str = "customerId";
    /// Opaque drawing payload.
    pub const DRAWING_DATA: &str = "drawingData";
}

fn timestamp(fields: &Fields, name: &str) -> Option<DateTime<Utc>> {
    fields.get(name).and_then(Value::as_str).and_then(parse_timestamp)
}

/// A user profile document (`users/{uid}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(Fields);

impl Profile {
    /// Wrap stored profile fields.
    #[must_use]
    pub fn new(fields: Fields) -> Self {
        Self(fields)
    }

    /// All stored fields.
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.0
    }

    /// Unwrap into the stored fields.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        self.0
    }

    /// Look up a single field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The email recorded on the profile.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.0.get(field::EMAIL).and_then(Value::as_str)
    }

    /// The user's customer quota, if the profile stores it as a number.
    ///
    /// The number is returned as stored; negative and fractional quotas are
    /// meaningful to the quota check.
    #[must_use]
    pub fn max_customers(&self) -> Option<&Number> {
        match self.0.get(field::MAX_CUSTOMERS)? {
            Value::Number(limit) => Some(limit),
            _ => None,
        }
    }

    /// When the profile was last written.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        timestamp(&self.0, field::UPDATED_AT)
    }
}

impl From<Document> for Profile {
    fn from(doc: Document) -> Self {
        Self(doc.fields)
    }
}

/// A customer record (`users/{uid}/customers/{id}`).
///
/// Serializes as the stored fields with the id alongside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// The generated customer id.
    pub id: String,
    /// The stored fields.
    #[serde(flatten)]
    pub fields: Fields,
}

impl Customer {
    /// Look up a single field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// When the customer was created.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        timestamp(&self.fields, field::CREATED_AT)
    }

    /// When the customer was last written.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        timestamp(&self.fields, field::UPDATED_AT)
    }
}

impl From<Document> for Customer {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            fields: doc.fields,
        }
    }
}

/// One backup history entry (`users/{uid}/backupHistory/{id}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupHistoryEntry {
    /// The generated entry id.
    pub id: String,
    /// The stored backup metadata.
    #[serde(flatten)]
    pub fields: Fields,
}

impl BackupHistoryEntry {
    /// When the backup was recorded.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        timestamp(&self.fields, field::CREATED_AT)
    }
}

impl From<Document> for BackupHistoryEntry {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            fields: doc.fields,
        }
    }
}
