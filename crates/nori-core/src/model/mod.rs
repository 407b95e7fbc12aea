// # Data Model
//
// Types shared by every store backend and by the change event router.

pub mod service;

pub use service::{
    Credentials, Identity, ServiceId, ServiceRecord, ServiceSubtype, ServiceType, ServiceWrite,
    StoredService,
};
