//! Fixtures for testing the client against an in-memory cluster.

#![allow(dead_code)]

use std::panic::PanicInfo;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Once;
use std::time::Duration;

use anyhow::Context;
use coordkv::Client;
use coordkv::Config;
use coordkv_memcluster::MemCluster;
use lazy_static::lazy_static;
use tracing_appender::non_blocking::WorkerGuard;

use crate::fixtures::logging::init_file_logging;

pub mod logging;

/// A client talking to a [`MemCluster`].
pub type MemClient = Client<MemCluster>;

pub fn init_default_ut_tracing() {
    static START: Once = Once::new();

    START.call_once(|| {
        let mut g = GLOBAL_UT_LOG_GUARD.as_ref().lock().unwrap();
        *g = Some(init_global_tracing("ut", "_log", "DEBUG"));
    });
}

lazy_static! {
    static ref GLOBAL_UT_LOG_GUARD: Arc<Mutex<Option<WorkerGuard>>> = Arc::new(Mutex::new(None));
}

pub fn init_global_tracing(app_name: &str, dir: &str, level: &str) -> WorkerGuard {
    set_panic_hook();

    let (g, sub) = init_file_logging(app_name, dir, level);
    tracing::subscriber::set_global_default(sub).expect("error setting global tracing subscriber");

    tracing::info!("initialized global tracing: in {}/{} at {}", dir, app_name, level);
    g
}

pub fn set_panic_hook() {
    std::panic::set_hook(Box::new(|panic| {
        log_panic(panic);
    }));
}

pub fn log_panic(panic: &PanicInfo) {
    eprintln!("{}", panic);

    if let Some(location) = panic.location() {
        tracing::error!(
            message = %panic,
            panic.file = location.file(),
            panic.line = location.line(),
            panic.column = location.column(),
        );
        eprintln!("{}:{}:{}", location.file(), location.line(), location.column());
    } else {
        tracing::error!(message = %panic);
    }
}

/// A config seeded with `endpoint`, with short timeouts.
pub fn config(endpoint: &str) -> Config {
    Config {
        endpoint: endpoint.to_string(),
        request_timeout: 1000,
        connect_timeout: 200,
        ..Default::default()
    }
}

/// Create a client over `cluster`, seeded with its `seed`-th member. It is not connected yet.
pub fn new_client(cluster: &MemCluster, seed: usize) -> anyhow::Result<MemClient> {
    let endpoint = cluster.member(seed);
    let client = Client::new(config(endpoint.as_str()), cluster.clone())?;
    Ok(client)
}

/// Create a 3-member cluster and a client connected to its leader.
pub async fn new_cluster_and_client() -> anyhow::Result<(MemCluster, MemClient)> {
    let cluster = MemCluster::new(3);
    let client = new_client(&cluster, 0)?;

    let leader = client.connect().await?;
    tracing::info!("--- connected to leader: {}", leader);

    Ok((cluster, client))
}

/// Wait until `f` returns `true`, checking every 10 ms, or fail after `timeout`.
pub async fn wait_for<F>(timeout: Duration, msg: &str, mut f: F) -> anyhow::Result<()>
where F: FnMut() -> bool {
    let fu = async {
        while !f() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };

    tokio::time::timeout(timeout, fu).await.with_context(|| format!("timeout waiting for: {}", msg))?;
    Ok(())
}

pub fn timeout() -> Duration {
    Duration::from_millis(3_000)
}
