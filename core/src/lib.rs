//! Client core for the Bizzorg business-management REST backend.
//!
//! # Overview
//! Builds API calls (JSON, URL-encoded and multipart bodies, CSRF header),
//! dispatches them through a pluggable `Transport`, normalizes each outcome
//! into a `ResponseEnvelope`, and marshals envelopes into typed records:
//! `Employee`, `EmployeeGroup`, `ToDoListItem` and `ScheduleItem`.
//!
//! # Design
//! - `ApiCall` never fails on `send`: build and transport errors land in the
//!   envelope. `BizzorgClient` is the layer that turns envelopes and status
//!   codes into `Result`s.
//! - Records hold relationships as `ResourcePath`s and resolve them only on
//!   request.
//! - The logged-in user lives in an explicit `Session`, persisted through a
//!   host-supplied `SessionStore`.
//! - Configuration is layered (defaults, TOML file, `BIZZORG__*` env vars).

pub mod client;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod http;
pub mod marshal;
pub mod models;
pub mod multipart;
pub mod resource;
pub mod session;
pub mod transport;

pub use client::BizzorgClient;
pub use config::{ClientConfig, ConfigError};
pub use dispatch::{ApiCall, CallState};
pub use envelope::ResponseEnvelope;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, ResponseHead, TransportResult};
pub use marshal::{marshal_list, marshal_one, ApiRecord};
pub use models::{
    Draft, Employee, EmployeeGroup, GroupScoped, NewGroup, NewScheduleItem, NewToDoItem, Priority,
    ScheduleItem, ToDoListItem,
};
pub use multipart::UploadablePart;
pub use resource::{Endpoint, ResourcePath, SiteConfig};
pub use session::{MemorySessionStore, Session, SessionStore};
pub use transport::{ReqwestTransport, Transport};
