//! # thrum-gold
//!
//! Bindings for `idl/gold.thrift`, kept in the shape the code generator
//! emits. The IDL exercises every feature the runtime supports: required,
//! optional and defaulted fields, nested collections, an enum with gaps in
//! its values, a union, exceptions, a oneway method and service
//! inheritance. The integration tests under `tests/` drive the runtime
//! through these types.

mod exceptions;
mod types;

pub mod admin_directory;
pub mod user_directory;

pub use exceptions::{
    INVALID_REQUEST_SPEC, InvalidRequest, InvalidRequestBuilder,
    USER_NOT_FOUND_SPEC, UserNotFound, UserNotFoundBuilder,
};
pub use types::{
    CONTACT_SPEC, Contact, ContactBuilder, Group, PROFILE_DEFAULT_ACTIVE,
    PROFILE_DEFAULT_SCORE, PROFILE_SPEC, Profile, ProfileBuilder, ROLE_SPEC,
    Role, USER_SPEC, User, UserBuilder,
};
