//! End-to-end calls through generated clients and services.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::join_all;
use thrum::prelude::*;
use thrum::NoExceptions;
use thrum::transport::{Service, TransportError};
use thrum_gold::admin_directory::{
    self, AdminDirectoryClient, AdminDirectoryIface, BanError,
};
use thrum_gold::user_directory::{
    self, CountArgs, FindProfileError, GetUserArgs, GetUserError,
    GetUserResult, PutUserError, UserDirectory, UserDirectoryClient,
    UserDirectoryIface,
};
use thrum_gold::{Contact, InvalidRequest, Profile, Role, User, UserNotFound};
use thrum_protocol::{MessageType, ProtocolReader, TMessage};
use tokio::sync::oneshot;

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

/// A synchronous in-memory directory, served through `Blocking`.
#[derive(Default)]
struct Directory {
    users: Mutex<BTreeMap<i32, User>>,
    touched: AtomicUsize,
}

impl Directory {
    fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let dir = Self::default();
        dir.users
            .lock()
            .unwrap()
            .extend(users.into_iter().map(|u| (u.id(), u)));
        dir
    }

    fn lookup(&self, id: i32) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }
}

impl UserDirectoryIface for Directory {
    fn get_user(&self, id: i32) -> Result<User, HandlerError<GetUserError>> {
        self.lookup(id)
            .ok_or_else(|| UserNotFound::new(id, format!("no user {id}")).into())
    }

    fn put_user(&self, user: User, contact: Contact) -> Result<(), HandlerError<PutUserError>> {
        if let Contact::Email(email) = &contact {
            if !email.contains('@') {
                return Err(InvalidRequest::new(format!("bad email {email:?}")).into());
            }
        }
        self.users.lock().unwrap().insert(user.id(), user);
        Ok(())
    }

    fn find_profile(&self, id: i32) -> Result<Profile, HandlerError<FindProfileError>> {
        if id < 0 {
            return Err(InvalidRequest::new("negative id").into());
        }
        let user = self
            .lookup(id)
            .ok_or_else(|| UserNotFound::new(id, "no profile"))?;
        Profile::new(user)
            .copy()
            .roles([Role::Member])
            .build()
            .map_err(HandlerError::internal)
    }

    fn count(&self) -> Result<i64, HandlerError<NoExceptions>> {
        Ok(self.users.lock().unwrap().len() as i64)
    }

    fn touch(&self, _id: i32) -> Result<(), HandlerError<NoExceptions>> {
        self.touched.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl AdminDirectoryIface for Directory {
    fn ban(&self, id: i32, _reason: String) -> Result<bool, HandlerError<BanError>> {
        match self.users.lock().unwrap().remove(&id) {
            Some(_) => Ok(true),
            None => Err(UserNotFound::new(id, "nothing to ban").into()),
        }
    }
}

/// An async implementation that fails in every way a handler can.
struct Faulty;

impl UserDirectory for Faulty {
    async fn get_user(&self, id: i32) -> Result<User, HandlerError<GetUserError>> {
        if id == 0 {
            panic!("id zero");
        }
        Err(HandlerError::internal("database unavailable"))
    }

    async fn put_user(&self, _: User, _: Contact) -> Result<(), HandlerError<PutUserError>> {
        Ok(())
    }

    async fn find_profile(&self, id: i32) -> Result<Profile, HandlerError<FindProfileError>> {
        Err(UserNotFound::new(id, "never").into())
    }

    async fn count(&self) -> Result<i64, HandlerError<NoExceptions>> {
        Ok(0)
    }

    async fn touch(&self, _: i32) -> Result<(), HandlerError<NoExceptions>> {
        Ok(())
    }
}

/// Replies to every call with an empty `get_user` result.
struct Silent;

#[derive(Debug, thiserror::Error)]
#[error("unreachable")]
struct Never;

impl Service for Silent {
    type Error = Never;

    async fn apply(&self, request: Bytes) -> Result<Bytes, Never> {
        let codec = BinaryCodec::default();
        let header = codec
            .reader(&request)
            .read_message_begin()
            .map_err(|_| Never)?;
        let reply = TMessage::new(header.name, MessageType::Reply, header.seq_id);
        codec
            .encode_message(&reply, &GetUserResult::default())
            .map_err(|_| Never)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type LocalClient = UserDirectoryClient<Loopback<ThriftService<BinaryCodec>>>;

fn ann() -> User {
    User::builder().id(1).name("ann").build().unwrap()
}

fn local<S: UserDirectory>(imp: S) -> (LocalClient, Arc<InMemoryStatsReceiver>, Arc<InMemoryStatsReceiver>) {
    let server_stats = Arc::new(InMemoryStatsReceiver::new());
    let client_stats = Arc::new(InMemoryStatsReceiver::new());
    let service = user_directory::service(imp, BinaryCodec::default(), "users", server_stats.clone());
    let client = UserDirectoryClient::new(
        Loopback::new(Arc::new(service)),
        BinaryCodec::default(),
        "users",
        client_stats.clone(),
    );
    (client, client_stats, server_stats)
}

fn directory() -> Blocking<Directory> {
    Blocking::new(Directory::with_users([ann()]))
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_success_is_counted_on_both_sides() {
    let (client, client_stats, server_stats) = local(directory());

    assert_eq!(client.get_user(1).await.unwrap(), ann());

    for stats in [&client_stats, &server_stats] {
        assert_eq!(stats.get("users/get_user/requests"), 1);
        assert_eq!(stats.get("users/get_user/success"), 1);
        assert_eq!(stats.get("users/get_user/failures"), 0);
    }
}

#[tokio::test]
async fn test_declared_exception_reaches_caller_typed() {
    let (client, client_stats, server_stats) = local(directory());

    let err = client.get_user(404).await.unwrap_err();
    let Some(GetUserError::NotFound(ex)) = err.declared() else {
        panic!("expected UserNotFound, got {err:?}");
    };
    assert_eq!(ex.id(), 404);
    assert_eq!(ex.message(), "no user 404");

    for stats in [&client_stats, &server_stats] {
        assert_eq!(stats.get("users/get_user/failures"), 1);
        assert_eq!(stats.get("users/get_user/failures/UserNotFound"), 1);
        assert_eq!(stats.get("users/get_user/success"), 0);
    }
}

#[tokio::test]
async fn test_declared_exception_is_sent_as_reply() {
    let codec = BinaryCodec::default();
    let service = user_directory::service(
        directory(),
        codec.clone(),
        "users",
        Arc::new(NullStatsReceiver),
    );

    let request = codec
        .encode_message(
            &TMessage::new("get_user", MessageType::Call, 7),
            &GetUserArgs { id: 404 },
        )
        .unwrap();
    let reply = service.handle(request).await.unwrap();

    let mut input = codec.reader(&reply);
    let header = input.read_message_begin().unwrap();
    assert_eq!(header.kind, MessageType::Reply);
    assert_eq!(header.seq_id, 7);
    assert_eq!(header.name, "get_user");
    let result = GetUserResult::read(&mut input).unwrap();
    assert!(result.success.is_none());
    assert_eq!(result.not_found.unwrap().id(), 404);
}

#[tokio::test]
async fn test_unknown_method_gets_application_exception() {
    let codec = BinaryCodec::default();
    let service = user_directory::service(
        directory(),
        codec.clone(),
        "users",
        Arc::new(NullStatsReceiver),
    );

    let request = codec
        .encode_message(&TMessage::new("delete_user", MessageType::Call, 3), &CountArgs)
        .unwrap();
    let reply = service.handle(request).await.unwrap();

    let mut input = codec.reader(&reply);
    let header = input.read_message_begin().unwrap();
    assert_eq!(header.kind, MessageType::Exception);
    assert_eq!(header.seq_id, 3);
    let ex = ApplicationException::read(&mut input).unwrap();
    assert_eq!(ex.kind, ApplicationExceptionKind::UnknownMethod);
    assert_eq!(ex.message, "Invalid method name: 'delete_user'");
}

#[tokio::test]
async fn test_handler_failure_is_internal_error_with_service_name() {
    let (client, client_stats, _) = local(Faulty);

    let err = client.get_user(5).await.unwrap_err();
    let CallError::Application(ex) = &err else {
        panic!("expected an application exception, got {err:?}");
    };
    assert_eq!(ex.service_name(), "users");
    assert_eq!(ex.inner().kind, ApplicationExceptionKind::InternalError);
    assert!(ex.inner().message.contains("database unavailable"));
    assert_eq!(client_stats.get("users/get_user/failures/internal_error"), 1);
}

#[tokio::test]
async fn test_handler_panic_is_internal_error() {
    let (client, _, server_stats) = local(Faulty);

    let err = client.get_user(0).await.unwrap_err();
    let ex = err.application().expect("application exception");
    assert_eq!(ex.kind, ApplicationExceptionKind::InternalError);
    assert!(ex.message.contains("id zero"));
    assert_eq!(server_stats.get("users/get_user/failures"), 1);

    // The service keeps answering.
    assert_eq!(client.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_result_is_missing_result() {
    let stats = Arc::new(InMemoryStatsReceiver::new());
    let client = UserDirectoryClient::new(
        Loopback::new(Arc::new(Silent)),
        BinaryCodec::default(),
        "users",
        stats.clone(),
    );

    let err = client.get_user(1).await.unwrap_err();
    let ex = err.application().expect("application exception");
    assert_eq!(ex.kind, ApplicationExceptionKind::MissingResult);
    assert_eq!(ex.message, "get_user failed: unknown result");
    assert_eq!(stats.get("users/get_user/failures/missing_result"), 1);

    // A void method with an empty result simply succeeded.
    client.put_user(User::new(2), Contact::Phone(1)).await.unwrap();
}

#[tokio::test]
async fn test_transport_failure_is_sourced() {
    struct Down;

    impl Transport for Down {
        async fn call(&self, _: Bytes) -> Result<Bytes, TransportError> {
            Err(TransportError::ConnectionClosed("peer reset".into()))
        }
    }

    let stats = Arc::new(InMemoryStatsReceiver::new());
    let client = UserDirectoryClient::new(Down, BinaryCodec::default(), "users", stats.clone());

    let err = client.count().await.unwrap_err();
    assert!(matches!(err, CallError::Transport(_)));
    assert!(err.to_string().contains("(service: users)"));
    assert_eq!(stats.get("users/count/failures/connection_closed"), 1);
}

// ---------------------------------------------------------------------------
// Methods
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_void_method_and_union_argument() {
    let (client, _, _) = local(directory());

    let bo = User::builder().id(2).name("bo").build().unwrap();
    client.put_user(bo.clone(), Contact::Email("bo@example.com".into())).await.unwrap();
    assert_eq!(client.get_user(2).await.unwrap(), bo);

    let err = client
        .put_user(User::new(3), Contact::Email("nope".into()))
        .await
        .unwrap_err();
    assert!(matches!(err.declared(), Some(PutUserError::Invalid(ex)) if ex.reason().contains("nope")));
    assert_eq!(client.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_method_with_two_exceptions() {
    let (client, client_stats, _) = local(directory());

    let profile = client.find_profile(1).await.unwrap();
    assert_eq!(profile.user(), &ann());
    assert_eq!(profile.score(), 1.5);
    assert!(profile.roles().contains(Role::Member));

    let err = client.find_profile(-1).await.unwrap_err();
    assert!(matches!(err.declared(), Some(FindProfileError::Invalid(_))));
    let err = client.find_profile(9).await.unwrap_err();
    assert!(matches!(err.declared(), Some(FindProfileError::NotFound(_))));

    assert_eq!(client_stats.get("users/find_profile/failures/InvalidRequest"), 1);
    assert_eq!(client_stats.get("users/find_profile/failures/UserNotFound"), 1);
}

#[tokio::test]
async fn test_oneway_call_runs_handler_without_reply() {
    let dir = directory();
    let (client, client_stats, _) = local(dir.clone());

    client.touch(1).await.unwrap();
    client.touch(2).await.unwrap();

    assert_eq!(dir.inner().touched.load(Ordering::Relaxed), 2);
    assert_eq!(client_stats.get("users/touch/success"), 2);
}

#[tokio::test]
async fn test_concurrent_calls_are_all_counted() {
    let (client, client_stats, server_stats) = local(directory());

    let results = join_all((0..10).map(|_| client.get_user(1))).await;
    assert!(results.iter().all(|r| matches!(r, Ok(user) if *user == ann())));

    for stats in [&client_stats, &server_stats] {
        assert_eq!(stats.get("users/get_user/requests"), 10);
        assert_eq!(stats.get("users/get_user/success"), 10);
        assert_eq!(stats.get("users/get_user/failures"), 0);
    }
}

// ---------------------------------------------------------------------------
// Inheritance and TCP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_extended_service_serves_inherited_methods() {
    let stats = Arc::new(InMemoryStatsReceiver::new());
    let service = admin_directory::service(directory(), BinaryCodec::default(), "admin", stats.clone());
    let client = AdminDirectoryClient::new(
        Loopback::new(Arc::new(service)),
        BinaryCodec::default(),
        "admin",
        stats.clone(),
    );

    assert_eq!(client.count().await.unwrap(), 1);
    assert!(client.ban(1, "spam").await.unwrap());
    let err = client.ban(1, "again").await.unwrap_err();
    assert!(matches!(err.declared(), Some(BanError::NotFound(_))));
    assert_eq!(client.count().await.unwrap(), 0);

    // Client and server share the receiver, so every call counts twice.
    let snapshot = stats.snapshot();
    assert_eq!(snapshot["admin/count/success"], 4);
    assert_eq!(snapshot["admin/ban/requests"], 4);
}

#[tokio::test]
async fn test_tcp_end_to_end() {
    let service = admin_directory::service(
        directory(),
        BinaryCodec::default(),
        "admin",
        Arc::new(NullStatsReceiver),
    );
    let server = ThriftServer::builder()
        .bind("127.0.0.1:0")
        .build(service)
        .await
        .expect("should bind");
    let addr = server.local_addr().unwrap().to_string();

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));

    let transport = FramedClient::connect(&addr, &FramedConfig::default())
        .await
        .expect("client should connect");
    let client = AdminDirectoryClient::new(
        transport,
        BinaryCodec::default(),
        "admin",
        Arc::new(NullStatsReceiver),
    );

    assert_eq!(client.get_user(1).await.unwrap(), ann());
    let err = client.get_user(2).await.unwrap_err();
    assert!(matches!(err.declared(), Some(GetUserError::NotFound(_))));
    assert!(client.ban(1, "spam").await.unwrap());
    assert_eq!(client.count().await.unwrap(), 0);

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

// ---------------------------------------------------------------------------
// Reply pairing
// ---------------------------------------------------------------------------

/// Answers `get_user(99)` only after a while; every other id at once.
struct Slow;

impl UserDirectory for Slow {
    async fn get_user(&self, id: i32) -> Result<User, HandlerError<GetUserError>> {
        if id == 99 {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(User::new(id))
    }

    async fn put_user(&self, _: User, _: Contact) -> Result<(), HandlerError<PutUserError>> {
        Ok(())
    }

    async fn find_profile(&self, id: i32) -> Result<Profile, HandlerError<FindProfileError>> {
        Err(UserNotFound::new(id, "never").into())
    }

    async fn count(&self) -> Result<i64, HandlerError<NoExceptions>> {
        Ok(0)
    }

    async fn touch(&self, _: i32) -> Result<(), HandlerError<NoExceptions>> {
        Ok(())
    }
}

/// Replies to every call with a sequence id it never sent.
struct Shifted;

impl Service for Shifted {
    type Error = Never;

    async fn apply(&self, request: Bytes) -> Result<Bytes, Never> {
        let codec = BinaryCodec::default();
        let header = codec
            .reader(&request)
            .read_message_begin()
            .map_err(|_| Never)?;
        let reply = TMessage::new(header.name, MessageType::Reply, header.seq_id + 100);
        let result = GetUserResult {
            success: Some(User::new(-1)),
            ..GetUserResult::default()
        };
        codec.encode_message(&reply, &result).map_err(|_| Never)
    }
}

/// Serves `imp` over TCP. The server stops when the returned sender is
/// dropped; the connection already made keeps being served.
async fn tcp<S: UserDirectory>(imp: S) -> (UserDirectoryClient<FramedClient>, oneshot::Sender<()>) {
    let service = user_directory::service(imp, BinaryCodec::default(), "users", Arc::new(NullStatsReceiver));
    let server = ThriftServer::builder()
        .bind("127.0.0.1:0")
        .build(service)
        .await
        .expect("should bind");
    let addr = server.local_addr().unwrap().to_string();

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));

    let transport = FramedClient::connect(&addr, &FramedConfig::default())
        .await
        .expect("client should connect");
    let client = UserDirectoryClient::new(
        transport,
        BinaryCodec::default(),
        "users",
        Arc::new(NullStatsReceiver),
    );
    (client, stop)
}

#[tokio::test]
async fn test_failed_oneway_leaves_no_reply_on_connection() {
    let (client, _stop) = tcp(directory()).await;
    let codec = BinaryCodec::default();
    let transport = client.client().transport();

    // No such method.
    let unknown = codec
        .encode_message(&TMessage::new("nope", MessageType::Oneway, 1), &CountArgs)
        .unwrap();
    transport.send(unknown).await.unwrap();

    // `get_user` without its required id.
    let bad_args = codec
        .encode_message(&TMessage::new("get_user", MessageType::Oneway, 2), &CountArgs)
        .unwrap();
    transport.send(bad_args).await.unwrap();

    assert_eq!(client.get_user(1).await.unwrap(), ann());
    assert_eq!(client.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_cancelled_call_does_not_take_next_reply() {
    let (client, _stop) = tcp(Slow).await;

    let timed_out = tokio::time::timeout(Duration::from_millis(50), client.get_user(99)).await;
    assert!(timed_out.is_err());

    // Sent while the reply to 99 is still on its way.
    assert_eq!(client.get_user(1).await.unwrap(), User::new(1));
    assert_eq!(client.get_user(2).await.unwrap(), User::new(2));
}

#[tokio::test]
async fn test_reply_with_unknown_seq_id_is_rejected() {
    let stats = Arc::new(InMemoryStatsReceiver::new());
    let client = UserDirectoryClient::new(
        Loopback::new(Arc::new(Shifted)),
        BinaryCodec::default(),
        "users",
        stats.clone(),
    );

    let err = client.get_user(1).await.unwrap_err();
    assert_eq!(
        err.application().map(|ex| ex.kind),
        Some(ApplicationExceptionKind::BadSequenceId)
    );
    assert_eq!(stats.get("users/get_user/failures/bad_sequence_id"), 1);
    assert_eq!(stats.get("users/get_user/success"), 0);
}
