use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thrum::NoExceptions;
use thrum::prelude::*;
use thrum_gold::admin_directory::{self, AdminDirectoryClient, AdminDirectoryIface, BanError};
use thrum_gold::user_directory::{
    FindProfileError, GetUserError, PutUserError, UserDirectoryIface,
};
use thrum_gold::{Contact, InvalidRequest, Profile, Role, User, UserNotFound};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Directory {
    users: Mutex<BTreeMap<i32, (User, Contact)>>,
    visits: Mutex<BTreeMap<i32, i64>>,
    banned: AtomicU64,
}

impl Directory {
    fn user(&self, id: i32) -> Result<(User, Contact), UserNotFound> {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| UserNotFound::new(id, format!("no user with id {id}")))
    }
}

impl UserDirectoryIface for Directory {
    fn get_user(&self, id: i32) -> Result<User, HandlerError<GetUserError>> {
        Ok(self.user(id)?.0)
    }

    fn put_user(&self, user: User, contact: Contact) -> Result<(), HandlerError<PutUserError>> {
        if user.name().is_none_or(str::is_empty) {
            return Err(InvalidRequest::new("user name is required").into());
        }
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        users.insert(user.id(), (user, contact));
        Ok(())
    }

    fn find_profile(&self, id: i32) -> Result<Profile, HandlerError<FindProfileError>> {
        let (user, contact) = self.user(id)?;
        let visits = self
            .visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
            .unwrap_or_default();

        let mut builder = Profile::new(user)
            .copy()
            .roles([Role::Member])
            .counters(BTreeMap::from([("visits".to_string(), visits)]));
        if let Contact::Email(email) = contact {
            builder = builder.aliases([email]);
        }
        builder.build().map_err(HandlerError::internal)
    }

    fn count(&self) -> Result<i64, HandlerError<NoExceptions>> {
        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(users.len() as i64)
    }

    fn touch(&self, id: i32) -> Result<(), HandlerError<NoExceptions>> {
        let mut visits = self.visits.lock().unwrap_or_else(PoisonError::into_inner);
        *visits.entry(id).or_default() += 1;
        Ok(())
    }
}

impl AdminDirectoryIface for Directory {
    fn ban(&self, id: i32, reason: String) -> Result<bool, HandlerError<BanError>> {
        self.user(id)?;
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        users.remove(&id);
        self.banned.fetch_add(1, Ordering::Relaxed);
        tracing::info!(id, %reason, "user banned");
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

const SERVICE_NAME: &str = "directory";

async fn start(
    addr: &str,
    stats: Arc<dyn StatsReceiver>,
) -> Result<(std::net::SocketAddr, ThriftServer<ThriftService<BinaryCodec>>), ThrumError> {
    let service = admin_directory::service(
        Blocking::new(Directory::default()),
        BinaryCodec::default(),
        SERVICE_NAME,
        stats,
    );
    let server = ThriftServer::builder().bind(addr).build(service).await?;
    let local = server.local_addr()?;
    Ok((local, server))
}

async fn exercise(client: &AdminDirectoryClient<FramedClient>) -> Result<(), Box<dyn std::error::Error>> {
    let ann = User::builder().id(1).name("ann").build()?;
    let bo = User::builder().id(2).name("bo").build()?;
    client.put_user(ann, Contact::Email("ann@example.com".into())).await?;
    client.put_user(bo, Contact::Phone(5_550_100)).await?;

    if let Err(e) = client.put_user(User::new(3), Contact::Phone(0)).await {
        tracing::info!(error = %e, "put_user rejected");
    }

    client.touch(1).await?;
    client.touch(1).await?;

    println!("get_user(1)     = {}", client.get_user(1).await?);
    match client.get_user(42).await {
        Ok(user) => println!("get_user(42)    = {user}"),
        Err(e) => println!("get_user(42)    failed: {e}"),
    }
    println!("find_profile(1) = {}", client.find_profile(1).await?);
    println!("count()         = {}", client.count().await?);
    println!("ban(2)          = {}", client.ban(2, "spam").await?);
    println!("count()         = {}", client.count().await?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let server_stats = Arc::new(InMemoryStatsReceiver::new());
    let client_stats = Arc::new(InMemoryStatsReceiver::new());

    let bind = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:0".to_string());
    let (addr, server) = start(&bind, server_stats.clone()).await?;
    tracing::info!(%addr, "directory server listening");

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));

    let transport = FramedClient::connect(&addr.to_string(), &FramedConfig::default()).await?;
    let client = AdminDirectoryClient::new(transport, BinaryCodec::default(), SERVICE_NAME, client_stats.clone());
    exercise(&client).await?;

    let _ = stop.send(());
    running.await??;

    let stats = serde_json::json!({
        "client": client_stats.snapshot(),
        "server": server_stats.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
