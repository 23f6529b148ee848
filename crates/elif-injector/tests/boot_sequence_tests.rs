//! Integration tests for `build()`: eager singletons, strict registration
//! and configuration loading.

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use elif_injector::config::{EAGER_TIMEOUT_ENV, STRICT_ENV};
use elif_injector::prelude::*;
use serial_test::serial;

struct Logger {
    id: usize,
}

struct Cache {
    logger: Arc<Logger>,
}

struct Mailer {
    logger: Arc<Logger>,
}

struct Scheduler {
    logger: Arc<Logger>,
}

struct ConnectionPool {
    size: usize,
}

struct Migrator {
    pool: Arc<ConnectionPool>,
}

#[tokio::test]
async fn test_logger_shared_across_boot_sequence() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let counter = constructions.clone();

    let mut builder = Injector::builder();
    builder.register_singleton::<Logger, _>(move |_| {
        Ok(Arc::new(Logger {
            id: counter.fetch_add(1, Ordering::SeqCst),
        }))
    });
    builder.register_eager_singleton::<Cache, _, _>(|ctx: ResolutionContext| async move {
        Ok(Arc::new(Cache {
            logger: ctx.get::<Logger>()?,
        }))
    });
    builder.register_eager_singleton::<Mailer, _, _>(|ctx: ResolutionContext| async move {
        Ok(Arc::new(Mailer {
            logger: ctx.get_async::<Logger>().await?,
        }))
    });
    builder.register_eager_singleton::<Scheduler, _, _>(|ctx: ResolutionContext| async move {
        Ok(Arc::new(Scheduler {
            logger: ctx.get::<Logger>()?,
        }))
    });
    let injector = builder.build().await.unwrap();

    let cache = injector.get::<Cache>().unwrap();
    let mailer = injector.get::<Mailer>().unwrap();
    let scheduler = injector.get::<Scheduler>().unwrap();

    assert!(Arc::ptr_eq(&cache.logger, &mailer.logger));
    assert!(Arc::ptr_eq(&mailer.logger, &scheduler.logger));
    // the singleton built during boot survives into the final injector
    assert!(Arc::ptr_eq(&cache.logger, &injector.get::<Logger>().unwrap()));
    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    assert_eq!(cache.logger.id, 0);
}

#[tokio::test]
async fn test_eager_singletons_run_in_registration_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let first = order.clone();
    let second = order.clone();

    let mut builder = Injector::builder();
    builder.register_eager_singleton::<ConnectionPool, _, _>(move |_| {
        let order = first.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            order.lock().unwrap().push("pool");
            Ok(Arc::new(ConnectionPool { size: 8 }))
        }
    });
    builder.register_eager_singleton::<Migrator, _, _>(move |ctx: ResolutionContext| {
        let order = second.clone();
        async move {
            let pool = ctx.get::<ConnectionPool>()?;
            order.lock().unwrap().push("migrator");
            Ok(Arc::new(Migrator { pool }))
        }
    });
    let injector = builder.build().await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["pool", "migrator"]);
    let migrator = injector.get::<Migrator>().unwrap();
    assert_eq!(migrator.pool.size, 8);
    assert!(Arc::ptr_eq(
        &migrator.pool,
        &injector.get::<ConnectionPool>().unwrap()
    ));
}

#[tokio::test]
async fn test_eager_singleton_resolves_synchronously_after_build() {
    let mut builder = Injector::builder();
    builder.register_eager_singleton::<ConnectionPool, _, _>(|_| async {
        tokio::task::yield_now().await;
        Ok(Arc::new(ConnectionPool { size: 4 }))
    });
    let injector = builder.build().await.unwrap();

    assert!(injector.contains::<ConnectionPool>());
    let pool = injector.get::<ConnectionPool>().unwrap();
    assert!(Arc::ptr_eq(&pool, &injector.get::<ConnectionPool>().unwrap()));
    assert_eq!(injector.get_statistics().unwrap().instances, 1);
}

#[tokio::test]
async fn test_eager_hook_runs_once_during_build() {
    let hook_calls = Arc::new(AtomicUsize::new(0));
    let counter = hook_calls.clone();

    let mut builder = Injector::builder();
    builder
        .register_eager_singleton::<ConnectionPool, _, _>(|_| async {
            Ok(Arc::new(ConnectionPool { size: 2 }))
        })
        .on_create(move |pool, _| {
            let counter = counter.clone();
            async move {
                assert_eq!(pool.size, 2);
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
    let injector = builder.build().await.unwrap();

    injector.get::<ConnectionPool>().unwrap();
    injector.get_async::<ConnectionPool>().await.unwrap();
    assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_eager_singleton_aborts_build() {
    let mut builder = Injector::builder();
    builder.register_eager_singleton::<ConnectionPool, _, _>(|_| async {
        Err(InjectorError::construction("ConnectionPool", "database unreachable"))
    });

    let error = builder.build().await.unwrap_err();
    assert!(matches!(error, InjectorError::ConstructionFailed { .. }));
}

#[tokio::test]
async fn test_failing_eager_hook_aborts_build() {
    let mut builder = Injector::builder();
    builder
        .register_eager_singleton::<ConnectionPool, _, _>(|_| async {
            Ok(Arc::new(ConnectionPool { size: 1 }))
        })
        .on_create(|_, _| async { Err(InjectorError::configuration("pool too small")) });

    assert!(builder.build().await.is_err());
}

#[tokio::test]
async fn test_eager_dependency_missing_reports_requester() {
    let mut builder = Injector::builder();
    builder.register_eager_singleton::<Migrator, _, _>(|ctx: ResolutionContext| async move {
        Ok(Arc::new(Migrator {
            pool: ctx.get::<ConnectionPool>()?,
        }))
    });

    let error = builder.build().await.unwrap_err();
    assert_eq!(error.missing_key(), Some(&ServiceKey::of::<ConnectionPool>()));
    assert_eq!(
        error.resolution_trace().unwrap().requested_by,
        Some(ServiceKey::of::<Migrator>())
    );
}

#[tokio::test]
async fn test_eager_singleton_is_not_visible_while_constructing() {
    let mut builder = Injector::builder();
    builder.register_factory::<Migrator, _>(|ctx| {
        Ok(Arc::new(Migrator {
            pool: ctx.get::<ConnectionPool>()?,
        }))
    });
    builder.register_eager_singleton::<ConnectionPool, _, _>(|ctx: ResolutionContext| async move {
        ctx.get::<Migrator>()?;
        Ok(Arc::new(ConnectionPool { size: 1 }))
    });

    let error = builder.build().await.unwrap_err();
    assert_eq!(error.missing_key(), Some(&ServiceKey::of::<ConnectionPool>()));
    assert_eq!(
        error.resolution_trace().unwrap().path,
        vec![ServiceKey::of::<ConnectionPool>(), ServiceKey::of::<Migrator>()]
    );
}

#[tokio::test]
async fn test_eager_constructor_resolving_its_shadowed_binding_is_a_cycle() {
    let mut builder = Injector::builder();
    builder.register_factory::<ConnectionPool, _>(|_| Ok(Arc::new(ConnectionPool { size: 1 })));
    builder.register_eager_singleton::<ConnectionPool, _, _>(|ctx: ResolutionContext| async move {
        let plain = ctx.get::<ConnectionPool>()?;
        Ok(Arc::new(ConnectionPool {
            size: plain.size * 2,
        }))
    });

    let error = builder.build().await.unwrap_err();
    assert!(error.is_circular());
    assert_eq!(
        error.cycle().unwrap(),
        &[ServiceKey::of::<ConnectionPool>(), ServiceKey::of::<ConnectionPool>()][..]
    );
}

#[tokio::test]
async fn test_eager_init_timeout() {
    let config = InjectorConfig::new().with_eager_init_timeout(Duration::from_millis(20));
    let mut builder = Injector::builder().with_config(config);
    builder.register_eager_singleton::<ConnectionPool, _, _>(|_| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Arc::new(ConnectionPool { size: 1 }))
    });

    let error = builder.build().await.unwrap_err();
    assert!(matches!(
        error,
        InjectorError::EagerInitTimeout { ref key, timeout }
            if key.is_type::<ConnectionPool>() && timeout == Duration::from_millis(20)
    ));
}

#[tokio::test]
async fn test_strict_registration_rejects_duplicates() {
    let mut builder = Injector::builder().with_config(InjectorConfig::strict());
    builder.register_instance::<ConnectionPool>(ConnectionPool { size: 1 });
    builder.register_instance::<ConnectionPool>(ConnectionPool { size: 2 });

    let error = builder.build().await.unwrap_err();
    assert!(matches!(error, InjectorError::DuplicateRegistration { .. }));
    assert!(error.to_string().contains("ConnectionPool"));
}

#[tokio::test]
#[serial]
async fn test_config_from_env_drives_build() {
    env::set_var(STRICT_ENV, "true");
    env::remove_var(EAGER_TIMEOUT_ENV);
    let config = InjectorConfig::from_env().unwrap();
    env::remove_var(STRICT_ENV);

    let mut builder = Injector::builder().with_config(config);
    builder.register_factory::<ConnectionPool, _>(|_| Ok(Arc::new(ConnectionPool { size: 1 })));
    builder.register_factory::<ConnectionPool, _>(|_| Ok(Arc::new(ConnectionPool { size: 2 })));

    assert!(builder.build().await.is_err());
}

#[tokio::test]
async fn test_config_from_yaml_drives_build() {
    let config =
        InjectorConfig::from_yaml_str("strict_registration: false\neager_init_timeout_ms: 1000\n")
            .unwrap();

    let mut builder = Injector::builder().with_config(config);
    builder.register_instance::<ConnectionPool>(ConnectionPool { size: 1 });
    builder.register_instance::<ConnectionPool>(ConnectionPool { size: 2 });
    builder.register_eager_singleton::<Migrator, _, _>(|ctx: ResolutionContext| async move {
        Ok(Arc::new(Migrator {
            pool: ctx.get::<ConnectionPool>()?,
        }))
    });

    let injector = builder.build().await.unwrap();
    assert_eq!(injector.get::<Migrator>().unwrap().pool.size, 2);
}
