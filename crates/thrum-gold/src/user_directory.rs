//! `service UserDirectory`.
//!
//! Implement [`UserDirectory`] (async) or [`UserDirectoryIface`] (sync,
//! served through [`Blocking`]), turn it into a [`ThriftService`] with
//! [`service`], and call it with a [`UserDirectoryClient`].

use std::future::Future;
use std::sync::Arc;

use thrum::{
    Blocking, CallError, DeclaredException, HandlerError, MethodResult,
    NoExceptions, Outcome, ServiceBuilder, StatsReceiver, ThriftClient,
    ThriftMethod, ThriftService,
};
use thrum_protocol::{
    BinaryCodec, Codec, FieldSpec, MethodSpec, ProtocolReader, ProtocolWriter,
    Requiredness, Result, ServiceSpec, StructKind, StructSpec, ThriftStruct,
    TypeSpec, read_field, read_struct, require, write_field,
    write_optional_field, write_struct,
};
use thrum_transport::Transport;

use crate::{
    CONTACT_SPEC, Contact, INVALID_REQUEST_SPEC, InvalidRequest, PROFILE_SPEC,
    Profile, USER_NOT_FOUND_SPEC, USER_SPEC, User, UserNotFound,
};

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

pub static GET_USER_ARGS_SPEC: StructSpec = StructSpec {
    name: "get_user_args",
    kind: StructKind::Struct,
    fields: &[FieldSpec {
        id: 1,
        name: "id",
        ty: TypeSpec::I32,
        requiredness: Requiredness::Required,
    }],
};

pub static GET_USER_RESULT_SPEC: StructSpec = StructSpec {
    name: "get_user_result",
    kind: StructKind::Struct,
    fields: &[
        FieldSpec {
            id: 0,
            name: "success",
            ty: TypeSpec::Struct(&USER_SPEC),
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

pub static PUT_USER_ARGS_SPEC: StructSpec = StructSpec {
    name: "put_user_args",
    kind: StructKind::Struct,
    fields: &[
        FieldSpec {
            id: 1,
            name: "user",
            ty: TypeSpec::Struct(&USER_SPEC),
            requiredness: Requiredness::Required,
        },
        FieldSpec {
            id: 2,
            name: "contact",
            ty: TypeSpec::Struct(&CONTACT_SPEC),
            requiredness: Requiredness::Required,
        },
    ],
};

pub static PUT_USER_RESULT_SPEC: StructSpec = StructSpec {
    name: "put_user_result",
    kind: StructKind::Struct,
    fields: &[FieldSpec {
        id: 1,
        name: "invalid",
        ty: TypeSpec::Struct(&INVALID_REQUEST_SPEC),
        requiredness: Requiredness::Optional,
    }],
};

pub static FIND_PROFILE_ARGS_SPEC: StructSpec = StructSpec {
    name: "find_profile_args",
    kind: StructKind::Struct,
    fields: &[FieldSpec {
        id: 1,
        name: "id",
        ty: TypeSpec::I32,
        requiredness: Requiredness::Required,
    }],
};

pub static FIND_PROFILE_RESULT_SPEC: StructSpec = StructSpec {
    name: "find_profile_result",
    kind: StructKind::Struct,
    fields: &[
        FieldSpec {
            id: 0,
            name: "success",
            ty: TypeSpec::Struct(&PROFILE_SPEC),
            requiredness: Requiredness::Optional,
        },
        FieldSpec {
            id: 1,
            name: "not_found",
            ty: TypeSpec::Struct(&USER_NOT_FOUND_SPEC),
            requiredness: Requiredness::Optional,
        },
        FieldSpec {
            id: 2,
            name: "invalid",
            ty: TypeSpec::Struct(&INVALID_REQUEST_SPEC),
            requiredness: Requiredness::Optional,
        },
    ],
};

pub static COUNT_ARGS_SPEC: StructSpec = StructSpec {
    name: "count_args",
    kind: StructKind::Struct,
    fields: &[],
};

pub static COUNT_RESULT_SPEC: StructSpec = StructSpec {
    name: "count_result",
    kind: StructKind::Struct,
    fields: &[FieldSpec {
        id: 0,
        name: "success",
        ty: TypeSpec::I64,
        requiredness: Requiredness::Optional,
    }],
};

pub static TOUCH_ARGS_SPEC: StructSpec = StructSpec {
    name: "touch_args",
    kind: StructKind::Struct,
    fields: &[FieldSpec {
        id: 1,
        name: "id",
        ty: TypeSpec::I32,
        requiredness: Requiredness::Required,
    }],
};

pub static TOUCH_RESULT_SPEC: StructSpec = StructSpec {
    name: "touch_result",
    kind: StructKind::Struct,
    fields: &[],
};

pub static USER_DIRECTORY_SERVICE: ServiceSpec = ServiceSpec {
    name: "UserDirectory",
    parent: None,
    methods: &[
        MethodSpec {
            name: "get_user",
            args: &GET_USER_ARGS_SPEC,
            result: &GET_USER_RESULT_SPEC,
            oneway: false,
        },
        MethodSpec {
            name: "put_user",
            args: &PUT_USER_ARGS_SPEC,
            result: &PUT_USER_RESULT_SPEC,
            oneway: false,
        },
        MethodSpec {
            name: "find_profile",
            args: &FIND_PROFILE_ARGS_SPEC,
            result: &FIND_PROFILE_RESULT_SPEC,
            oneway: false,
        },
        MethodSpec {
            name: "count",
            args: &COUNT_ARGS_SPEC,
            result: &COUNT_RESULT_SPEC,
            oneway: false,
        },
        MethodSpec {
            name: "touch",
            args: &TOUCH_ARGS_SPEC,
            result: &TOUCH_RESULT_SPEC,
            oneway: true,
        },
    ],
};

// ---------------------------------------------------------------------------
// get_user
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetUserArgs {
    pub id: i32,
}

impl ThriftStruct for GetUserArgs {
    fn spec() -> &'static StructSpec {
        &GET_USER_ARGS_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "get_user_args", |out| write_field(out, 1, &self.id))
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut id: Option<i32> = None;
        read_struct(input, |input, field| match field.id {
            1 => read_field(input, field, &mut id),
            _ => input.skip(field.ttype),
        })?;
        Ok(Self {
            id: require(id, "id", "get_user_args")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetUserResult {
    pub success: Option<User>,
    pub not_found: Option<UserNotFound>,
}

impl ThriftStruct for GetUserResult {
    fn spec() -> &'static StructSpec {
        &GET_USER_RESULT_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "get_user_result", |out| {
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

/// Declared exceptions of `get_user`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GetUserError {
    #[error(transparent)]
    NotFound(#[from] UserNotFound),
}

impl DeclaredException for GetUserError {
    fn exception_name(&self) -> &'static str {
        match self {
            GetUserError::NotFound(_) => "UserNotFound",
        }
    }
}

impl From<UserNotFound> for HandlerError<GetUserError> {
    fn from(e: UserNotFound) -> Self {
        HandlerError::Declared(e.into())
    }
}

impl MethodResult for GetUserResult {
    type Success = User;
    type Error = GetUserError;

    fn from_success(value: User) -> Self {
        Self {
            success: Some(value),
            ..Self::default()
        }
    }

    fn from_error(error: GetUserError) -> Self {
        match error {
            GetUserError::NotFound(e) => Self {
                not_found: Some(e),
                ..Self::default()
            },
        }
    }

    fn into_outcome(self) -> Outcome<User, GetUserError> {
        if let Some(value) = self.success {
            Outcome::Success(value)
        } else if let Some(e) = self.not_found {
            Outcome::Declared(GetUserError::NotFound(e))
        } else {
            Outcome::Missing
        }
    }
}

pub struct GetUser;

impl ThriftMethod for GetUser {
    const NAME: &'static str = "get_user";
    type Args = GetUserArgs;
    type Result = GetUserResult;
    type Success = User;
    type Error = GetUserError;
}

// ---------------------------------------------------------------------------
// put_user
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutUserArgs {
    pub user: User,
    pub contact: Contact,
}

impl ThriftStruct for PutUserArgs {
    fn spec() -> &'static StructSpec {
        &PUT_USER_ARGS_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "put_user_args", |out| {
            write_field(out, 1, &self.user)?;
            write_field(out, 2, &self.contact)
        })
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut user: Option<User> = None;
        let mut contact: Option<Contact> = None;
        read_struct(input, |input, field| match field.id {
            1 => read_field(input, field, &mut user),
            2 => read_field(input, field, &mut contact),
            _ => input.skip(field.ttype),
        })?;
        Ok(Self {
            user: require(user, "user", "put_user_args")?,
            contact: require(contact, "contact", "put_user_args")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutUserResult {
    pub invalid: Option<InvalidRequest>,
}

impl ThriftStruct for PutUserResult {
    fn spec() -> &'static StructSpec {
        &PUT_USER_RESULT_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "put_user_result", |out| {
            write_optional_field(out, 1, &self.invalid)
        })
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut result = Self::default();
        read_struct(input, |input, field| match field.id {
            1 => read_field(input, field, &mut result.invalid),
            _ => input.skip(field.ttype),
        })?;
        Ok(result)
    }
}

/// Declared exceptions of `put_user`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PutUserError {
    #[error(transparent)]
    Invalid(#[from] InvalidRequest),
}

impl DeclaredException for PutUserError {
    fn exception_name(&self) -> &'static str {
        match self {
            PutUserError::Invalid(_) => "InvalidRequest",
        }
    }
}

impl From<InvalidRequest> for HandlerError<PutUserError> {
    fn from(e: InvalidRequest) -> Self {
        HandlerError::Declared(e.into())
    }
}

impl MethodResult for PutUserResult {
    type Success = ();
    type Error = PutUserError;

    fn from_success(_: ()) -> Self {
        Self::default()
    }

    fn from_error(error: PutUserError) -> Self {
        match error {
            PutUserError::Invalid(e) => Self { invalid: Some(e) },
        }
    }

    fn into_outcome(self) -> Outcome<(), PutUserError> {
        match self.invalid {
            Some(e) => Outcome::Declared(PutUserError::Invalid(e)),
            None => Outcome::Success(()),
        }
    }
}

pub struct PutUser;

impl ThriftMethod for PutUser {
    const NAME: &'static str = "put_user";
    type Args = PutUserArgs;
    type Result = PutUserResult;
    type Success = ();
    type Error = PutUserError;
}

// ---------------------------------------------------------------------------
// find_profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindProfileArgs {
    pub id: i32,
}

impl ThriftStruct for FindProfileArgs {
    fn spec() -> &'static StructSpec {
        &FIND_PROFILE_ARGS_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "find_profile_args", |out| write_field(out, 1, &self.id))
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut id: Option<i32> = None;
        read_struct(input, |input, field| match field.id {
            1 => read_field(input, field, &mut id),
            _ => input.skip(field.ttype),
        })?;
        Ok(Self {
            id: require(id, "id", "find_profile_args")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindProfileResult {
    pub success: Option<Profile>,
    pub not_found: Option<UserNotFound>,
    pub invalid: Option<InvalidRequest>,
}

impl ThriftStruct for FindProfileResult {
    fn spec() -> &'static StructSpec {
        &FIND_PROFILE_RESULT_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "find_profile_result", |out| {
            write_optional_field(out, 0, &self.success)?;
            write_optional_field(out, 1, &self.not_found)?;
            write_optional_field(out, 2, &self.invalid)
        })
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut result = Self::default();
        read_struct(input, |input, field| match field.id {
            0 => read_field(input, field, &mut result.success),
            1 => read_field(input, field, &mut result.not_found),
            2 => read_field(input, field, &mut result.invalid),
            _ => input.skip(field.ttype),
        })?;
        Ok(result)
    }
}

/// Declared exceptions of `find_profile`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FindProfileError {
    #[error(transparent)]
    NotFound(#[from] UserNotFound),
    #[error(transparent)]
    Invalid(#[from] InvalidRequest),
}

impl DeclaredException for FindProfileError {
    fn exception_name(&self) -> &'static str {
        match self {
            FindProfileError::NotFound(_) => "UserNotFound",
            FindProfileError::Invalid(_) => "InvalidRequest",
        }
    }
}

impl From<UserNotFound> for HandlerError<FindProfileError> {
    fn from(e: UserNotFound) -> Self {
        HandlerError::Declared(e.into())
    }
}

impl From<InvalidRequest> for HandlerError<FindProfileError> {
    fn from(e: InvalidRequest) -> Self {
        HandlerError::Declared(e.into())
    }
}

impl MethodResult for FindProfileResult {
    type Success = Profile;
    type Error = FindProfileError;

    fn from_success(value: Profile) -> Self {
        Self {
            success: Some(value),
            ..Self::default()
        }
    }

    fn from_error(error: FindProfileError) -> Self {
        match error {
            FindProfileError::NotFound(e) => Self {
                not_found: Some(e),
                ..Self::default()
            },
            FindProfileError::Invalid(e) => Self {
                invalid: Some(e),
                ..Self::default()
            },
        }
    }

    fn into_outcome(self) -> Outcome<Profile, FindProfileError> {
        if let Some(value) = self.success {
            Outcome::Success(value)
        } else if let Some(e) = self.not_found {
            Outcome::Declared(FindProfileError::NotFound(e))
        } else if let Some(e) = self.invalid {
            Outcome::Declared(FindProfileError::Invalid(e))
        } else {
            Outcome::Missing
        }
    }
}

pub struct FindProfile;

impl ThriftMethod for FindProfile {
    const NAME: &'static str = "find_profile";
    type Args = FindProfileArgs;
    type Result = FindProfileResult;
    type Success = Profile;
    type Error = FindProfileError;
}

// ---------------------------------------------------------------------------
// count
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountArgs;

impl ThriftStruct for CountArgs {
    fn spec() -> &'static StructSpec {
        &COUNT_ARGS_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "count_args", |_| Ok(()))
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        read_struct(input, |input, field| input.skip(field.ttype))?;
        Ok(Self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountResult {
    pub success: Option<i64>,
}

impl ThriftStruct for CountResult {
    fn spec() -> &'static StructSpec {
        &COUNT_RESULT_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "count_result", |out| {
            write_optional_field(out, 0, &self.success)
        })
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut result = Self::default();
        read_struct(input, |input, field| match field.id {
            0 => read_field(input, field, &mut result.success),
            _ => input.skip(field.ttype),
        })?;
        Ok(result)
    }
}

impl MethodResult for CountResult {
    type Success = i64;
    type Error = NoExceptions;

    fn from_success(value: i64) -> Self {
        Self {
            success: Some(value),
        }
    }

    fn from_error(error: NoExceptions) -> Self {
        match error {}
    }

    fn into_outcome(self) -> Outcome<i64, NoExceptions> {
        match self.success {
            Some(value) => Outcome::Success(value),
            None => Outcome::Missing,
        }
    }
}

pub struct Count;

impl ThriftMethod for Count {
    const NAME: &'static str = "count";
    type Args = CountArgs;
    type Result = CountResult;
    type Success = i64;
    type Error = NoExceptions;
}

// ---------------------------------------------------------------------------
// touch (oneway)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchArgs {
    pub id: i32,
}

impl ThriftStruct for TouchArgs {
    fn spec() -> &'static StructSpec {
        &TOUCH_ARGS_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "touch_args", |out| write_field(out, 1, &self.id))
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut id: Option<i32> = None;
        read_struct(input, |input, field| match field.id {
            1 => read_field(input, field, &mut id),
            _ => input.skip(field.ttype),
        })?;
        Ok(Self {
            id: require(id, "id", "touch_args")?,
        })
    }
}

/// Never sent: oneway calls have no reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchResult;

impl ThriftStruct for TouchResult {
    fn spec() -> &'static StructSpec {
        &TOUCH_RESULT_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "touch_result", |_| Ok(()))
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        read_struct(input, |input, field| input.skip(field.ttype))?;
        Ok(Self)
    }
}

impl MethodResult for TouchResult {
    type Success = ();
    type Error = NoExceptions;

    fn from_success(_: ()) -> Self {
        Self
    }

    fn from_error(error: NoExceptions) -> Self {
        match error {}
    }

    fn into_outcome(self) -> Outcome<(), NoExceptions> {
        Outcome::Success(())
    }
}

pub struct Touch;

impl ThriftMethod for Touch {
    const NAME: &'static str = "touch";
    const ONEWAY: bool = true;
    type Args = TouchArgs;
    type Result = TouchResult;
    type Success = ();
    type Error = NoExceptions;
}

// ---------------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------------

/// The service, implemented synchronously.
///
/// Wrap an implementation in [`Blocking`] to serve it; every call then runs
/// on the blocking thread pool.
pub trait UserDirectoryIface: Send + Sync + 'static {
    fn get_user(&self, id: i32) -> std::result::Result<User, HandlerError<GetUserError>>;

    fn put_user(&self, user: User, contact: Contact) -> std::result::Result<(), HandlerError<PutUserError>>;

    fn find_profile(&self, id: i32) -> std::result::Result<Profile, HandlerError<FindProfileError>>;

    fn count(&self) -> std::result::Result<i64, HandlerError<NoExceptions>>;

    fn touch(&self, id: i32) -> std::result::Result<(), HandlerError<NoExceptions>>;
}

/// The service, implemented asynchronously.
pub trait UserDirectory: Send + Sync + 'static {
    fn get_user(
        &self,
        id: i32,
    ) -> impl Future<Output = std::result::Result<User, HandlerError<GetUserError>>> + Send;

    fn put_user(
        &self,
        user: User,
        contact: Contact,
    ) -> impl Future<Output = std::result::Result<(), HandlerError<PutUserError>>> + Send;

    fn find_profile(
        &self,
        id: i32,
    ) -> impl Future<Output = std::result::Result<Profile, HandlerError<FindProfileError>>> + Send;

    fn count(&self) -> impl Future<Output = std::result::Result<i64, HandlerError<NoExceptions>>> + Send;

    fn touch(&self, id: i32) -> impl Future<Output = std::result::Result<(), HandlerError<NoExceptions>>> + Send;
}

impl<T: UserDirectoryIface> UserDirectory for Blocking<T> {
    async fn get_user(&self, id: i32) -> std::result::Result<User, HandlerError<GetUserError>> {
        self.run(move |imp| imp.get_user(id)).await
    }

    async fn put_user(
        &self,
        user: User,
        contact: Contact,
    ) -> std::result::Result<(), HandlerError<PutUserError>> {
        self.run(move |imp| imp.put_user(user, contact)).await
    }

    async fn find_profile(&self, id: i32) -> std::result::Result<Profile, HandlerError<FindProfileError>> {
        self.run(move |imp| imp.find_profile(id)).await
    }

    async fn count(&self) -> std::result::Result<i64, HandlerError<NoExceptions>> {
        self.run(|imp| imp.count()).await
    }

    async fn touch(&self, id: i32) -> std::result::Result<(), HandlerError<NoExceptions>> {
        self.run(move |imp| imp.touch(id)).await
    }
}

/// Adds a handler for every `UserDirectory` method to `builder`.
///
/// Services extending `UserDirectory` call this before adding their own
/// methods.
pub fn register<S, C>(builder: ServiceBuilder<C>, imp: Arc<S>) -> ServiceBuilder<C>
where
    S: UserDirectory,
    C: Codec,
{
    let get_user = Arc::clone(&imp);
    let put_user = Arc::clone(&imp);
    let find_profile = Arc::clone(&imp);
    let count = Arc::clone(&imp);
    let touch = imp;

    builder
        .method::<GetUser, _, _>(move |args: GetUserArgs| {
            let imp = Arc::clone(&get_user);
            async move { imp.get_user(args.id).await }
        })
        .method::<PutUser, _, _>(move |args: PutUserArgs| {
            let imp = Arc::clone(&put_user);
            async move { imp.put_user(args.user, args.contact).await }
        })
        .method::<FindProfile, _, _>(move |args: FindProfileArgs| {
            let imp = Arc::clone(&find_profile);
            async move { imp.find_profile(args.id).await }
        })
        .method::<Count, _, _>(move |_: CountArgs| {
            let imp = Arc::clone(&count);
            async move { imp.count().await }
        })
        .method::<Touch, _, _>(move |args: TouchArgs| {
            let imp = Arc::clone(&touch);
            async move { imp.touch(args.id).await }
        })
}

/// Builds a [`ThriftService`] answering `UserDirectory` calls with `imp`.
pub fn service<S, C>(
    imp: S,
    codec: C,
    service_name: impl Into<String>,
    stats: Arc<dyn StatsReceiver>,
) -> ThriftService<C>
where
    S: UserDirectory,
    C: Codec,
{
    let builder = ServiceBuilder::new(codec, service_name).stats(stats);
    register(builder, Arc::new(imp)).build(&USER_DIRECTORY_SERVICE)
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// A typed `UserDirectory` client.
pub struct UserDirectoryClient<T, C = BinaryCodec> {
    pub(crate) client: ThriftClient<T, C>,
}

impl<T: Transport, C: Codec> UserDirectoryClient<T, C> {
    pub fn new(
        transport: T,
        codec: C,
        service_name: impl Into<String>,
        stats: Arc<dyn StatsReceiver>,
    ) -> Self {
        Self::with_spec(transport, codec, service_name, stats, &USER_DIRECTORY_SERVICE)
    }

    pub(crate) fn with_spec(
        transport: T,
        codec: C,
        service_name: impl Into<String>,
        stats: Arc<dyn StatsReceiver>,
        spec: &'static ServiceSpec,
    ) -> Self {
        Self {
            client: ThriftClient::new(transport, codec, service_name, stats, spec),
        }
    }

    /// The untyped client underneath.
    pub fn client(&self) -> &ThriftClient<T, C> {
        &self.client
    }

    pub async fn get_user(&self, id: i32) -> std::result::Result<User, CallError<GetUserError>> {
        self.client.call::<GetUser>(GetUserArgs { id }).await
    }

    pub async fn put_user(
        &self,
        user: User,
        contact: Contact,
    ) -> std::result::Result<(), CallError<PutUserError>> {
        self.client.call::<PutUser>(PutUserArgs { user, contact }).await
    }

    pub async fn find_profile(&self, id: i32) -> std::result::Result<Profile, CallError<FindProfileError>> {
        self.client.call::<FindProfile>(FindProfileArgs { id }).await
    }

    pub async fn count(&self) -> std::result::Result<i64, CallError<NoExceptions>> {
        self.client.call::<Count>(CountArgs).await
    }

    /// Fire and forget: resolves once the request is handed to the
    /// transport.
    pub async fn touch(&self, id: i32) -> std::result::Result<(), CallError<NoExceptions>> {
        self.client.call::<Touch>(TouchArgs { id }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_outcome_is_exclusive() {
        let ok = GetUserResult::from_success(User::new(1));
        assert_eq!(ok.into_outcome(), Outcome::Success(User::new(1)));

        let missing = GetUserResult::default();
        assert_eq!(missing.into_outcome(), Outcome::Missing);

        let err = UserNotFound::new(1, "gone");
        let declared = GetUserResult::from_error(err.clone().into());
        assert!(declared.success.is_none());
        assert_eq!(
            declared.into_outcome(),
            Outcome::Declared(GetUserError::NotFound(err))
        );
    }

    #[test]
    fn test_void_result_empty_is_success() {
        assert_eq!(PutUserResult::default().into_outcome(), Outcome::Success(()));
    }

    #[test]
    fn test_exception_names_are_categories() {
        let err = FindProfileError::from(InvalidRequest::new("bad"));
        assert_eq!(err.exception_name(), "InvalidRequest");
        let err = FindProfileError::from(UserNotFound::new(2, "none"));
        assert_eq!(err.exception_name(), "UserNotFound");
    }

    #[test]
    fn test_handler_error_from_exception() {
        let err: HandlerError<GetUserError> = UserNotFound::new(3, "x").into();
        assert!(matches!(err, HandlerError::Declared(GetUserError::NotFound(_))));
    }

    #[test]
    fn test_service_spec_shape() {
        let touch = USER_DIRECTORY_SERVICE.method("touch").unwrap();
        assert!(touch.oneway);
        let put = USER_DIRECTORY_SERVICE.method("put_user").unwrap();
        assert!(put.is_void());
        assert_eq!(put.exceptions().count(), 1);
        let find = USER_DIRECTORY_SERVICE.method("find_profile").unwrap();
        assert!(!find.is_void());
    }
}
