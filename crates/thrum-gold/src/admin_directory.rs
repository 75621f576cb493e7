//! `service AdminDirectory extends UserDirectory`.
//!
//! The service table holds every `UserDirectory` handler plus `ban`, and
//! [`AdminDirectoryClient`] derefs to a [`UserDirectoryClient`] sharing
//! the same connection and counters.

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use thrum::{
    Blocking, CallError, DeclaredException, HandlerError, MethodResult,
    Outcome, ServiceBuilder, StatsReceiver, ThriftMethod, ThriftService,
};
use thrum_protocol::{
    BinaryCodec, Codec, FieldSpec, MethodSpec, ProtocolReader, ProtocolWriter,
    Requiredness, Result, ServiceSpec, StructKind, StructSpec, ThriftStruct,
    TypeSpec, read_field, read_struct, require, write_field,
    write_optional_field, write_struct,
};
use thrum_transport::Transport;

use crate::user_directory::{
    self, USER_DIRECTORY_SERVICE, UserDirectory, UserDirectoryClient,
    UserDirectoryIface,
};
use crate::{USER_NOT_FOUND_SPEC, UserNotFound};

pub static BAN_ARGS_SPEC: StructSpec = StructSpec {
    name: "ban_args",
    kind: StructKind::Struct,
    fields: &[
        FieldSpec {
            id: 1,
            name: "id",
            ty: TypeSpec::I32,
            requiredness: Requiredness::Required,
        },
        FieldSpec {
            id: 2,
            name: "reason",
            ty: TypeSpec::String,
            requiredness: Requiredness::Required,
        },
    ],
};

pub static BAN_RESULT_SPEC: StructSpec = StructSpec {
    name: "ban_result",
    kind: StructKind::Struct,
    fields: &[
        FieldSpec {
            id: 0,
            name: "success",
            ty: TypeSpec::Bool,
            requiredness: Requiredness::Optional,
        },
        FieldSpec {
            id: 1,
            name: "not_found",
            ty: TypeSpec::Struct(&USER_NOT_FOUND_SPEC),
            requiredness: Requiredness::Optional,
        },
    ],
};

pub static ADMIN_DIRECTORY_SERVICE: ServiceSpec = ServiceSpec {
    name: "AdminDirectory",
    parent: Some(&USER_DIRECTORY_SERVICE),
    methods: &[MethodSpec {
        name: "ban",
        args: &BAN_ARGS_SPEC,
        result: &BAN_RESULT_SPEC,
        oneway: false,
    }],
};

// ---------------------------------------------------------------------------
// ban
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanArgs {
    pub id: i32,
    pub reason: String,
}

impl ThriftStruct for BanArgs {
    fn spec() -> &'static StructSpec {
        &BAN_ARGS_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "ban_args", |out| {
            write_field(out, 1, &self.id)?;
            write_field(out, 2, &self.reason)
        })
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut id: Option<i32> = None;
        let mut reason: Option<String> = None;
        read_struct(input, |input, field| match field.id {
            1 => read_field(input, field, &mut id),
            2 => read_field(input, field, &mut reason),
            _ => input.skip(field.ttype),
        })?;
        Ok(Self {
            id: require(id, "id", "ban_args")?,
            reason: require(reason, "reason", "ban_args")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanResult {
    pub success: Option<bool>,
    pub not_found: Option<UserNotFound>,
}

impl ThriftStruct for BanResult {
    fn spec() -> &'static StructSpec {
        &BAN_RESULT_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "ban_result", |out| {
            write_optional_field(out, 0, &self.success)?;
            write_optional_field(out, 1, &self.not_found)
        })
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut result = Self::default();
        read_struct(input, |input, field| match field.id {
            0 => read_field(input, field, &mut result.success),
            1 => read_field(input, field, &mut result.not_found),
            _ => input.skip(field.ttype),
        })?;
        Ok(result)
    }
}

/// Declared exceptions of `ban`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BanError {
    #[error(transparent)]
    NotFound(#[from] UserNotFound),
}

impl DeclaredException for BanError {
    fn exception_name(&self) -> &'static str {
        match self {
            BanError::NotFound(_) => "UserNotFound",
        }
    }
}

impl From<UserNotFound> for HandlerError<BanError> {
    fn from(e: UserNotFound) -> Self {
        HandlerError::Declared(e.into())
    }
}

impl MethodResult for BanResult {
    type Success = bool;
    type Error = BanError;

    fn from_success(value: bool) -> Self {
        Self {
            success: Some(value),
            ..Self::default()
        }
    }

    fn from_error(error: BanError) -> Self {
        match error {
            BanError::NotFound(e) => Self {
                not_found: Some(e),
                ..Self::default()
            },
        }
    }

    fn into_outcome(self) -> Outcome<bool, BanError> {
        if let Some(value) = self.success {
            Outcome::Success(value)
        } else if let Some(e) = self.not_found {
            Outcome::Declared(BanError::NotFound(e))
        } else {
            Outcome::Missing
        }
    }
}

pub struct Ban;

impl ThriftMethod for Ban {
    const NAME: &'static str = "ban";
    type Args = BanArgs;
    type Result = BanResult;
    type Success = bool;
    type Error = BanError;
}

// ---------------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------------

pub trait AdminDirectoryIface: UserDirectoryIface {
    fn ban(&self, id: i32, reason: String) -> std::result::Result<bool, HandlerError<BanError>>;
}

pub trait AdminDirectory: UserDirectory {
    fn ban(
        &self,
        id: i32,
        reason: String,
    ) -> impl Future<Output = std::result::Result<bool, HandlerError<BanError>>> + Send;
}

impl<T: AdminDirectoryIface> AdminDirectory for Blocking<T> {
    async fn ban(&self, id: i32, reason: String) -> std::result::Result<bool, HandlerError<BanError>> {
        self.run(move |imp| imp.ban(id, reason)).await
    }
}

/// Adds the inherited `UserDirectory` handlers, then `ban`.
pub fn register<S, C>(builder: ServiceBuilder<C>, imp: Arc<S>) -> ServiceBuilder<C>
where
    S: AdminDirectory,
    C: Codec,
{
    let ban = Arc::clone(&imp);
    user_directory::register(builder, imp).method::<Ban, _, _>(move |args: BanArgs| {
        let imp = Arc::clone(&ban);
        async move { imp.ban(args.id, args.reason).await }
    })
}

pub fn service<S, C>(
    imp: S,
    codec: C,
    service_name: impl Into<String>,
    stats: Arc<dyn StatsReceiver>,
) -> ThriftService<C>
where
    S: AdminDirectory,
    C: Codec,
{
    let builder = ServiceBuilder::new(codec, service_name).stats(stats);
    register(builder, Arc::new(imp)).build(&ADMIN_DIRECTORY_SERVICE)
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// A typed `AdminDirectory` client. Inherited methods are reached through
/// `Deref`.
pub struct AdminDirectoryClient<T, C = BinaryCodec> {
    base: UserDirectoryClient<T, C>,
}

impl<T: Transport, C: Codec> AdminDirectoryClient<T, C> {
    pub fn new(
        transport: T,
        codec: C,
        service_name: impl Into<String>,
        stats: Arc<dyn StatsReceiver>,
    ) -> Self {
        Self {
            base: UserDirectoryClient::with_spec(
                transport,
                codec,
                service_name,
                stats,
                &ADMIN_DIRECTORY_SERVICE,
            ),
        }
    }

    pub async fn ban(&self, id: i32, reason: impl Into<String>) -> std::result::Result<bool, CallError<BanError>> {
        let args = BanArgs {
            id,
            reason: reason.into(),
        };
        self.base.client.call::<Ban>(args).await
    }
}

impl<T, C> Deref for AdminDirectoryClient<T, C> {
    type Target = UserDirectoryClient<T, C>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}
