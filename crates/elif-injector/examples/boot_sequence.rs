//! Boot Sequence Demo
//!
//! Wires a small application graph: a shared logger, a connection pool
//! built eagerly during `build()`, and request-scoped services resolved
//! afterwards. Run with `RUST_LOG=elif_injector=debug` to watch the
//! injector's own log lines.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use elif_injector::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

struct Logger {
    prefix: String,
}

impl Logger {
    fn log(&self, message: &str) {
        println!("[{}] {}", self.prefix, message);
    }
}

struct ConnectionPool {
    size: usize,
}

trait UserRepository: Send + Sync {
    fn find_name(&self, id: u64) -> Option<String>;
}

struct PooledUserRepository {
    pool: Arc<ConnectionPool>,
}

impl UserRepository for PooledUserRepository {
    fn find_name(&self, id: u64) -> Option<String> {
        (id <= self.pool.size as u64).then(|| format!("user-{}", id))
    }
}

struct RequestHandler {
    request_id: u64,
    logger: Arc<Logger>,
    users: Arc<dyn UserRepository>,
}

#[tokio::main]
async fn main() -> Result<(), InjectorError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("🚀 Injector Boot Sequence Demo");

    let config = InjectorConfig::from_env()?.with_eager_init_timeout(Duration::from_secs(5));
    let request_ids = Arc::new(AtomicU64::new(1));

    let mut builder = Injector::builder().with_config(config);
    builder.register_instance_named::<String>("app_name", "demo".to_string());
    builder.register_singleton::<Logger, _>(|ctx| {
        Ok(Arc::new(Logger {
            prefix: ctx.get_named::<String>("app_name")?.to_string(),
        }))
    });
    builder
        .register_eager_singleton::<ConnectionPool, _, _>(|_| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Arc::new(ConnectionPool { size: 10 }))
        })
        .on_create(|pool, ctx| async move {
            ctx.get::<Logger>()?
                .log(&format!("connection pool ready with {} connections", pool.size));
            Ok(())
        });
    builder.register_singleton::<dyn UserRepository, _>(|ctx| {
        Ok(Arc::new(PooledUserRepository {
            pool: ctx.get::<ConnectionPool>()?,
        }) as Arc<dyn UserRepository>)
    });
    builder.register_factory::<RequestHandler, _>(move |ctx| {
        Ok(Arc::new(RequestHandler {
            request_id: request_ids.fetch_add(1, Ordering::SeqCst),
            logger: ctx.get::<Logger>()?,
            users: ctx.get::<dyn UserRepository>()?,
        }))
    });

    let injector = builder.build().await?;
    println!("✅ Injector {} built", injector.id());

    for user_id in [3, 42] {
        let handler = injector.get::<RequestHandler>()?;
        let outcome = handler
            .users
            .find_name(user_id)
            .unwrap_or_else(|| "not found".to_string());
        handler
            .logger
            .log(&format!("request #{} -> {}", handler.request_id, outcome));
    }

    match injector.get::<Duration>() {
        Err(error) => println!("❌ Expected failure: {}", error),
        Ok(_) => println!("Duration was unexpectedly registered"),
    }

    println!("📊 {:?}", injector.get_statistics()?);
    Ok(())
}
