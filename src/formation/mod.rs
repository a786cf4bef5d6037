//! Client for the Formation REST API.
//!
//! Wraps app catalog, analysis lifecycle and data-store calls behind the
//! [`FormationApi`] trait and keeps the bearer token fresh.

mod auth;
mod client;
mod error;
pub mod models;

pub use auth::{
    expiry_after_login, jwt_expiry, Credentials, LoginPair, TokenState, DEFAULT_EXPIRES_IN_SECS,
    TOKEN_EXPIRY_MARGIN_SECS,
};
pub use client::{
    encode_data_path, FormationApi, FormationClient, DEFAULT_REQUEST_TIMEOUT,
    METADATA_REQUEST_HEADER_PREFIX,
};
pub use error::FormationError;
pub use models::{
    Analysis, AnalysisStatus, App, AppListing, AppParameters, BrowseOptions, CollectionEntry,
    CollectionListing, ControlOperation, DataNode, DataObject, DeleteResult, EntryType,
    LaunchConfig, LaunchRequest, LaunchResponse, Parameter, ParameterGroup, PutRequest, PutResult,
};
