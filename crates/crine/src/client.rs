//! The data-access client.
//!
//! [`Client`] exposes one method per domain operation. Every method except
//! [`Client::save_customer_form`] needs a signed-in principal and works only
//! inside that principal's `users/{uid}` namespace. Each method is a single
//! backend round trip (two for [`Client::add_customer`]); failures from the
//! store are returned unmodified and nothing is retried.

use std::sync::Arc;

use serde_json::{Number, Value};
use tracing::{debug, info, warn};

use crate::config::{Config, DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_CUSTOMERS};
use crate::error::{Error, Result};
use crate::model::{collections, field, BackupHistoryEntry, Customer, Profile};
use crate::session::{Principal, SessionContext};
use crate::store::{
    CollectionPath, Direction, DocumentPath, DocumentStore, Fields, Query, SetMode, WriteData,
};

/// Tunables for a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Customer limit for users whose profile sets no `maxCustomers`.
    pub default_max_customers: u64,
    /// Backup history entries returned when no limit is given.
    pub default_history_limit: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            default_max_customers: DEFAULT_MAX_CUSTOMERS,
            default_history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl From<&Config> for ClientOptions {
    fn from(config: &Config) -> Self {
        Self {
            default_max_customers: config.quota.default_max_customers,
            default_history_limit: config.history.default_limit,
        }
    }
}

/// Typed access to profiles, customers, drawings, backups, bug reports and
/// intake forms.
#[derive(Clone)]
pub struct Client {
    store: Arc<dyn DocumentStore>,
    session: SessionContext,
    options: ClientOptions,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("store", &self.store.name())
            .field("session", &self.session)
            .field("options", &self.options)
            .finish()
    }
}

impl Client {
    /// Create a client with default options.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, session: SessionContext) -> Self {
        Self::with_options(store, session, ClientOptions::default())
    }

    /// Create a client with explicit options.
    #[must_use]
    pub fn with_options(
        store: Arc<dyn DocumentStore>,
        session: SessionContext,
        options: ClientOptions,
    ) -> Self {
        Self {
            store,
            session,
            options,
        }
    }

    /// The session this client reads its principal from.
    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// The options in force.
    #[must_use]
    pub fn options(&self) -> ClientOptions {
        self.options
    }

    /// The signed-in principal, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<Principal> {
        self.session.current_principal()
    }

    /// Check if a principal is signed in.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.session.is_authenticated()
    }

    fn require_principal(&self) -> Result<Principal> {
        self.session.current_principal().ok_or(Error::Unauthenticated)
    }

    fn user_doc(principal: &Principal) -> Result<DocumentPath> {
        CollectionPath::root(collections::USERS)?.doc(&principal.uid)
    }

    fn user_collection(principal: &Principal, name: &str) -> Result<CollectionPath> {
        Self::user_doc(principal)?.collection(name)
    }

    // === Profile ===

    /// Fetch the signed-in user's profile. Returns `None` if none exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a principal, or the store's
    /// error.
    pub async fn get_user_profile(&self) -> Result<Option<Profile>> {
        let principal = self.require_principal()?;
        self.load_profile(&principal).await
    }

    async fn load_profile(&self, principal: &Principal) -> Result<Option<Profile>> {
        let path = Self::user_doc(principal)?;
        let profile = self.store.get(&path).await?.map(Profile::from);
        debug!("Loaded profile {} (present: {})", path, profile.is_some());
        Ok(profile)
    }

    /// Merge `fields` into the signed-in user's profile.
    ///
    /// `email` is always taken from the session (null when the principal has
    /// none) and `updatedAt` is stamped by the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a principal, or the store's
    /// error.
    pub async fn set_user_profile(&self, fields: Fields) -> Result<()> {
        let principal = self.require_principal()?;
        let path = Self::user_doc(&principal)?;

        let email = principal.email.clone().map_or(Value::Null, Value::String);
        let data = WriteData::new(fields)
            .with_field(field::EMAIL, email)
            .with_server_timestamp(field::UPDATED_AT);
        self.store.set(&path, data, SetMode::Merge).await?;

        info!("User profile updated: {}", path);
        Ok(())
    }

    // === Customers ===

    /// Create a customer, enforcing the user's customer quota.
    ///
    /// The quota is the profile's `maxCustomers` taken as stored, so a
    /// negative value blocks every add and a fractional one is compared as
    /// is. The configured default applies when the profile is missing or the
    /// field is absent, null or not a number. The count and the insert are
    /// separate round trips, so concurrent calls for the same user can
    /// together exceed the quota.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a principal,
    /// [`Error::QuotaExceeded`] when the user is at the limit, or the store's
    /// error.
    pub async fn add_customer(&self, fields: Fields) -> Result<String> {
        let principal = self.require_principal()?;

        let profile = self.load_profile(&principal).await?;
        let existing = self.list_customers(&principal).await?.len();

        let limit = self.customer_limit(profile.as_ref());
        if quota_reached(existing, &limit) {
            warn!(
                "Customer limit reached for {}: {} of {}",
                principal.uid, existing, limit
            );
            return Err(Error::QuotaExceeded { limit });
        }

        let collection = Self::user_collection(&principal, collections::CUSTOMERS)?;
        let data = WriteData::new(fields)
            .with_server_timestamp(field::CREATED_AT)
            .with_server_timestamp(field::UPDATED_AT);
        let id = self.store.add(&collection, data).await?;

        info!("Customer added: {}", id);
        Ok(id)
    }

    fn customer_limit(&self, profile: Option<&Profile>) -> Number {
        if let Some(limit) = profile.and_then(Profile::max_customers) {
            return limit.clone();
        }
        if let Some(value) = profile
            .and_then(|p| p.get(field::MAX_CUSTOMERS))
            .filter(|v| !v.is_null())
        {
            warn!("Ignoring non-numeric {} value {}", field::MAX_CUSTOMERS, value);
        }
        Number::from(self.options.default_max_customers)
    }

    /// Update fields of an existing customer and restamp `updatedAt`.
    ///
    /// Fields not named in `fields` are left as they are.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a principal, a not-found
    /// backend error (see [`Error::is_not_found`]) if the customer does not
    /// exist, or any other store error.
    pub async fn update_customer(&self, customer_id: &str, fields: Fields) -> Result<()> {
        let principal = self.require_principal()?;
        let path = Self::user_collection(&principal, collections::CUSTOMERS)?.doc(customer_id)?;

        let data = WriteData::new(fields).with_server_timestamp(field::UPDATED_AT);
        self.store.update(&path, data).await?;

        info!("Customer updated: {}", customer_id);
        Ok(())
    }

    /// Delete a customer. Deleting a missing customer succeeds.
    ///
    /// The customer's drawing is not touched; use [`Client::delete_drawing`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a principal, or the store's
    /// error.
    pub async fn delete_customer(&self, customer_id: &str) -> Result<()> {
        let principal = self.require_principal()?;
        let path = Self::user_collection(&principal, collections::CUSTOMERS)?.doc(customer_id)?;

        self.store.delete(&path).await?;

        info!("Customer deleted: {}", customer_id);
        Ok(())
    }

    /// List the user's customers, newest first by `createdAt`.
    ///
    /// Customers created in the same instant are ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a principal, or the store's
    /// error.
    pub async fn get_customers(&self) -> Result<Vec<Customer>> {
        let principal = self.require_principal()?;
        let customers = self.list_customers(&principal).await?;
        debug!("Customers loaded: {}", customers.len());
        Ok(customers)
    }

    async fn list_customers(&self, principal: &Principal) -> Result<Vec<Customer>> {
        let collection = Self::user_collection(principal, collections::CUSTOMERS)?;
        let query = Query::new().order_by(field::CREATED_AT, Direction::Descending);
        let docs = self.store.query(&collection, &query).await?;
        Ok(docs.into_iter().map(Customer::from).collect())
    }

    /// Fetch one customer. Returns `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a principal, or the store's
    /// error.
    pub async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>> {
        let principal = self.require_principal()?;
        let path = Self::user_collection(&principal, collections::CUSTOMERS)?.doc(customer_id)?;

        Ok(self.store.get(&path).await?.map(Customer::from))
    }

    // === Drawings ===

    /// Store the drawing for a customer, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a principal, or the store's
    /// error.
    pub async fn save_drawing(&self, customer_id: &str, drawing_data: Value) -> Result<()> {
        let principal = self.require_principal()?;
        let path = Self::user_collection(&principal, collections::DRAWINGS)?.doc(customer_id)?;

        let data = WriteData::default()
            .with_field(field::CUSTOMER_ID, Value::String(customer_id.to_string()))
            .with_field(field::DRAWING_DATA, drawing_data)
            .with_server_timestamp(field::UPDATED_AT);
        self.store.set(&path, data, SetMode::Overwrite).await?;

        info!("Drawing saved: {}", customer_id);
        Ok(())
    }

    /// Fetch the drawing payload for a customer. Returns `None` if no
    /// drawing exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a principal, or the store's
    /// error.
    pub async fn get_drawing(&self, customer_id: &str) -> Result<Option<Value>> {
        let principal = self.require_principal()?;
        let path = Self::user_collection(&principal, collections::DRAWINGS)?.doc(customer_id)?;

        let drawing = self.store.get(&path).await?.map(|mut doc| {
            doc.fields
                .remove(field::DRAWING_DATA)
                .unwrap_or(Value::Null)
        });
        Ok(drawing)
    }

    /// Delete the drawing for a customer. Deleting a missing drawing succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a principal, or the store's
    /// error.
    pub async fn delete_drawing(&self, customer_id: &str) -> Result<()> {
        let principal = self.require_principal()?;
        let path = Self::user_collection(&principal, collections::DRAWINGS)?.doc(customer_id)?;

        self.store.delete(&path).await?;

        info!("Drawing deleted: {}", customer_id);
        Ok(())
    }

    // === Backup history ===

    /// Record a backup in the user's history and return the entry id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a principal, or the store's
    /// error.
    pub async fn save_backup_history(&self, info: Fields) -> Result<String> {
        let principal = self.require_principal()?;
        let collection = Self::user_collection(&principal, collections::BACKUP_HISTORY)?;

        let data = WriteData::new(info).with_server_timestamp(field::CREATED_AT);
        let id = self.store.add(&collection, data).await?;

        info!("Backup history saved: {}", id);
        Ok(id)
    }

    /// The most recent backup history entries, newest first.
    ///
    /// `limit` defaults to the configured history limit (10 unless changed).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a principal,
    /// [`Error::InvalidLimit`] for a limit of 0, or the store's error.
    pub async fn get_backup_history(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<BackupHistoryEntry>> {
        let principal = self.require_principal()?;
        let collection = Self::user_collection(&principal, collections::BACKUP_HISTORY)?;

        let limit = limit.unwrap_or(self.options.default_history_limit);
        if limit == 0 {
            return Err(Error::InvalidLimit { limit });
        }
        let query = Query::new()
            .order_by(field::CREATED_AT, Direction::Descending)
            .limit(limit);
        let docs = self.store.query(&collection, &query).await?;

        debug!("Backup history loaded: {} entries", docs.len());
        Ok(docs.into_iter().map(BackupHistoryEntry::from).collect())
    }

    // === Bug reports ===

    /// File a bug report under the user's namespace and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a principal, or the store's
    /// error.
    pub async fn save_bug_report(&self, report: Fields) -> Result<String> {
        let principal = self.require_principal()?;
        let collection = Self::user_collection(&principal, collections::BUG_REPORTS)?;

        let data = WriteData::new(report).with_server_timestamp(field::CREATED_AT);
        let id = self.store.add(&collection, data).await?;

        info!("Bug report saved: {}", id);
        Ok(id)
    }

    // === Public intake forms ===

    /// Submit a public intake form and return its id.
    ///
    /// Needs no signed-in principal; forms go to the top-level
    /// `customerForms` collection.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn save_customer_form(&self, form: Fields) -> Result<String> {
        let collection = CollectionPath::root(collections::CUSTOMER_FORMS)?;

        let data = WriteData::new(form).with_server_timestamp(field::CREATED_AT);
        let id = self.store.add(&collection, data).await?;

        info!("Customer form saved: {}", id);
        Ok(id)
    }
}

/// Check if `count` customers already meet or exceed `limit`.
fn quota_reached(count: usize, limit: &Number) -> bool {
    if let Some(limit) = limit.as_u64() {
        return u64::try_from(count).map_or(true, |count| count >= limit);
    }
    // Any remaining integer is negative.
    if limit.is_i64() {
        return true;
    }
    let count = u32::try_from(count).map_or(f64::INFINITY, f64::from);
    limit.as_f64().map_or(true, |limit| count >= limit)
}
