//! # thrum
//!
//! Async Thrift RPC for Rust.
//!
//! thrum is the runtime that generated Thrift code targets: generated
//! structs encode themselves with [`thrum_protocol`], and generated
//! services are thin typed layers over [`ThriftClient`] and
//! [`ServiceBuilder`]. Every call resolves to exactly one outcome (a
//! success, one of the method's declared exceptions, or an application
//! exception) and is counted per method.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use thrum::prelude::*;
//!
//! // With generated code for your IDL:
//! // let service = my_service::service(MyImpl, BinaryCodec::default(), "users");
//! // let server = ThriftServer::builder()
//! //     .bind("0.0.0.0:9090")
//! //     .build(service)
//! //     .await?;
//! // server.run().await
//! ```

mod blocking;
mod client;
mod error;
mod method;
mod server;
mod service;
pub mod stats;

#[cfg(test)]
mod testing;

pub use blocking::Blocking;
pub use client::{CallError, Sourced, ThriftClient};
pub use error::ThrumError;
pub use method::{
    DeclaredException, HandlerError, MethodResult, NoExceptions, Outcome,
    ThriftMethod,
};
pub use server::{ThriftServer, ThriftServerBuilder};
pub use service::{ServiceBuilder, ThriftService};
pub use stats::{
    Counter, InMemoryStatsReceiver, NullStatsReceiver, StatsReceiver,
};

pub use thrum_protocol as protocol;
pub use thrum_transport as transport;

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::{
        Blocking, CallError, HandlerError, InMemoryStatsReceiver,
        NullStatsReceiver, StatsReceiver, ThriftClient, ThriftServer,
        ThriftService, ThrumError,
    };
    pub use thrum_protocol::{
        ApplicationException, ApplicationExceptionKind, BinaryCodec, Codec,
        ProtocolConfig, ThriftEnum, ThriftException, ThriftStruct,
    };
    pub use thrum_transport::{
        FramedClient, FramedConfig, FramedListener, Loopback, Transport,
    };
}
