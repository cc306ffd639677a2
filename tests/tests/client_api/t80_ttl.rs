use anyhow::Result;
use coordkv::Action;
use coordkv::KeyInfo;
use pretty_assertions::assert_eq;

use crate::fixtures::init_default_ut_tracing;
use crate::fixtures::new_cluster_and_client;
use crate::fixtures::timeout;

/// A key written with a ttl expires, and the expiry is a change that can be watched.
#[async_entry::test(worker_threads = 4, init = "init_default_ut_tracing()", tracing_span = "debug")]
async fn key_expires() -> Result<()> {
    let (cluster, client) = new_cluster_and_client().await?;

    client.set("/t", "v", Some(1)).await?;
    let set_index = cluster.current_index();

    tracing::info!("--- the key reports its ttl");
    {
        let info = client.info("/t").await?.and_then(|x| x.into_key()).unwrap();
        assert!(info.ttl.is_some());
        assert!(info.expiration.is_some());
    }

    tracing::info!("--- wait for the expiry");
    {
        let mut noop = |_v: Option<&str>, _k: &str, _i: &KeyInfo| {};
        let info = tokio::time::timeout(timeout(), client.watch("/t", Some(set_index + 1), &mut noop)).await??;

        assert_eq!(Some(Action::Expire), info.action);
        assert_eq!("/t", info.key);
        assert_eq!(None, info.value);
        assert_eq!(Some("v".to_string()), info.prev_value);
        assert_eq!(set_index + 1, info.index);
    }

    assert_eq!(None, client.get("/t").await?);

    Ok(())
}
