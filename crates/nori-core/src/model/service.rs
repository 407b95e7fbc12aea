// # Service Records
//
// The persisted shape of one remote image-board service configuration.
//
// ## Identity
//
// A record is either not yet persisted (`Identity::Unassigned`) or persisted
// under a store-assigned `ServiceId`. On the wire the identity is a plain
// integer `id`: negative means unassigned, non-negative means persisted.
//
// ## Credentials
//
// `username` and `passphrase` only mean something when
// `requires_authentication` is set. The write path never writes them
// otherwise, and the read path never exposes them otherwise.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Store-assigned identity of a persisted service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ServiceId(i64);

impl ServiceId {
    /// Create a service id, rejecting negative values
    pub fn new(value: i64) -> Result<Self> {
        if value < 0 {
            return Err(Error::validation(format!(
                "service id must be non-negative, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Raw integer value as stored in the `id` column
    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for ServiceId {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ServiceId> for i64 {
    fn from(id: ServiceId) -> Self {
        id.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a record has been persisted yet
///
/// Selects the insert or update branch of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Identity {
    /// Not yet persisted; upsert inserts
    #[default]
    Unassigned,
    /// Persisted; upsert updates this row
    Persisted(ServiceId),
}

impl Identity {
    /// The persisted id, if any
    pub fn id(self) -> Option<ServiceId> {
        match self {
            Identity::Unassigned => None,
            Identity::Persisted(id) => Some(id),
        }
    }
}

impl From<i64> for Identity {
    fn from(value: i64) -> Self {
        match ServiceId::new(value) {
            Ok(id) => Identity::Persisted(id),
            Err(_) => Identity::Unassigned,
        }
    }
}

impl From<Identity> for i64 {
    fn from(identity: Identity) -> Self {
        match identity {
            Identity::Unassigned => -1,
            Identity::Persisted(id) => id.get(),
        }
    }
}

impl From<ServiceId> for Identity {
    fn from(id: ServiceId) -> Self {
        Identity::Persisted(id)
    }
}

/// Protocol family of a remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ServiceType {
    Danbooru,
    Gelbooru,
    Shimmie,
}

impl TryFrom<i64> for ServiceType {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(ServiceType::Danbooru),
            1 => Ok(ServiceType::Gelbooru),
            2 => Ok(ServiceType::Shimmie),
            other => Err(Error::validation(format!("unknown service type {}", other))),
        }
    }
}

impl From<ServiceType> for i64 {
    fn from(service_type: ServiceType) -> Self {
        match service_type {
            ServiceType::Danbooru => 0,
            ServiceType::Gelbooru => 1,
            ServiceType::Shimmie => 2,
        }
    }
}

/// API variant within a protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ServiceSubtype {
    Danbooru,
    DanbooruLegacy,
    Moebooru,
    Gelbooru,
    Shimmie,
}

impl TryFrom<i64> for ServiceSubtype {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(ServiceSubtype::Danbooru),
            1 => Ok(ServiceSubtype::DanbooruLegacy),
            2 => Ok(ServiceSubtype::Moebooru),
            3 => Ok(ServiceSubtype::Gelbooru),
            4 => Ok(ServiceSubtype::Shimmie),
            other => Err(Error::validation(format!(
                "unknown service subtype {}",
                other
            ))),
        }
    }
}

impl From<ServiceSubtype> for i64 {
    fn from(subtype: ServiceSubtype) -> Self {
        match subtype {
            ServiceSubtype::Danbooru => 0,
            ServiceSubtype::DanbooruLegacy => 1,
            ServiceSubtype::Moebooru => 2,
            ServiceSubtype::Gelbooru => 3,
            ServiceSubtype::Shimmie => 4,
        }
    }
}

/// One configured remote service
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    /// Insert/update selector; `id` on the wire
    #[serde(rename = "id", default)]
    pub identity: Identity,

    /// Display name
    pub name: String,

    /// Base endpoint URL
    pub api_url: String,

    /// Protocol family
    #[serde(rename = "type")]
    pub service_type: ServiceType,

    /// API variant
    pub subtype: ServiceSubtype,

    /// Whether the credentials below are used
    #[serde(default)]
    pub requires_authentication: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// ⚠️ Never log this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

// Custom Debug implementation that hides the passphrase
impl fmt::Debug for ServiceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRecord")
            .field("identity", &self.identity)
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("service_type", &self.service_type)
            .field("subtype", &self.subtype)
            .field("requires_authentication", &self.requires_authentication)
            .field("username", &self.username)
            .field(
                "passphrase",
                &self.passphrase.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

impl ServiceRecord {
    /// Create an unpersisted, unauthenticated record
    pub fn new(
        name: impl Into<String>,
        api_url: impl Into<String>,
        service_type: ServiceType,
        subtype: ServiceSubtype,
    ) -> Self {
        Self {
            identity: Identity::Unassigned,
            name: name.into(),
            api_url: api_url.into(),
            service_type,
            subtype,
            requires_authentication: false,
            username: None,
            passphrase: None,
        }
    }

    /// Set the identity
    pub fn with_identity(mut self, identity: impl Into<Identity>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Attach credentials and mark the service as authenticated
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.requires_authentication = true;
        self.username = Some(username.into());
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Check the constraints every upsert requires
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("service name cannot be empty"));
        }
        if self.api_url.trim().is_empty() {
            return Err(Error::validation("service API URL cannot be empty"));
        }
        Ok(())
    }

    /// Column values an upsert of this record writes
    pub fn to_write(&self) -> ServiceWrite<'_> {
        let credentials = if self.requires_authentication {
            Some(Credentials {
                username: self.username.as_deref(),
                passphrase: self.passphrase.as_deref(),
            })
        } else {
            None
        };

        ServiceWrite {
            name: &self.name,
            api_url: &self.api_url,
            service_type: self.service_type.into(),
            subtype: self.subtype.into(),
            requires_authentication: self.requires_authentication,
            credentials,
        }
    }
}

/// Credential column values
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub username: Option<&'a str>,
    pub passphrase: Option<&'a str>,
}

impl fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("passphrase", &self.passphrase.map(|_| "<REDACTED>"))
            .finish()
    }
}

/// The column values one upsert writes
///
/// `credentials` is `None` when the record is unauthenticated: the
/// `username` and `passphrase` columns must then be left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceWrite<'a> {
    pub name: &'a str,
    pub api_url: &'a str,
    pub service_type: i64,
    pub subtype: i64,
    pub requires_authentication: bool,
    pub credentials: Option<Credentials<'a>>,
}

/// One raw row of the `service_settings` table
#[derive(Clone, PartialEq, Eq)]
pub struct StoredService {
    pub id: i64,
    pub name: String,
    pub api_url: String,
    pub service_type: i64,
    pub subtype: i64,
    pub requires_authentication: bool,
    pub username: Option<String>,
    pub passphrase: Option<String>,
}

impl fmt::Debug for StoredService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredService")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("requires_authentication", &self.requires_authentication)
            .finish_non_exhaustive()
    }
}

impl StoredService {
    /// Build the row a fresh insert produces
    pub fn inserted(id: i64, write: &ServiceWrite<'_>) -> Self {
        let mut row = Self {
            id,
            name: String::new(),
            api_url: String::new(),
            service_type: 0,
            subtype: 0,
            requires_authentication: false,
            username: None,
            passphrase: None,
        };
        row.apply(write);
        row
    }

    /// Apply an update in place, leaving credentials alone when absent
    pub fn apply(&mut self, write: &ServiceWrite<'_>) {
        self.name = write.name.to_string();
        self.api_url = write.api_url.to_string();
        self.service_type = write.service_type;
        self.subtype = write.subtype;
        self.requires_authentication = write.requires_authentication;
        if let Some(credentials) = write.credentials {
            self.username = credentials.username.map(str::to_string);
            self.passphrase = credentials.passphrase.map(str::to_string);
        }
    }

    /// Decode the row into a record
    ///
    /// Credentials are only exposed when the flag column is set. Unknown
    /// type/subtype codes mean the table is corrupt.
    pub fn into_record(self) -> Result<ServiceRecord> {
        let id = ServiceId::new(self.id)
            .map_err(|_| Error::storage(format!("corrupt row: negative id {}", self.id)))?;
        let service_type = ServiceType::try_from(self.service_type)
            .map_err(|e| Error::storage(format!("corrupt row {}: {}", self.id, e)))?;
        let subtype = ServiceSubtype::try_from(self.subtype)
            .map_err(|e| Error::storage(format!("corrupt row {}: {}", self.id, e)))?;

        let (username, passphrase) = if self.requires_authentication {
            (self.username, self.passphrase)
        } else {
            (None, None)
        };

        Ok(ServiceRecord {
            identity: Identity::Persisted(id),
            name: self.name,
            api_url: self.api_url,
            service_type,
            subtype,
            requires_authentication: self.requires_authentication,
            username,
            passphrase,
        })
    }
}
