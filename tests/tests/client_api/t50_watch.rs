use std::time::Duration;

use anyhow::Result;
use coordkv::Action;
use coordkv::KeyInfo;
use pretty_assertions::assert_eq;

use crate::fixtures::init_default_ut_tracing;
use crate::fixtures::new_cluster_and_client;
use crate::fixtures::timeout;

/// A watch from a past index returns the first change at or after it, without blocking.
#[async_entry::test(worker_threads = 4, init = "init_default_ut_tracing()", tracing_span = "debug")]
async fn watch_past_change() -> Result<()> {
    let (_cluster, client) = new_cluster_and_client().await?;

    client.set("/w/a", "1", None).await?;
    client.set("/other", "x", None).await?;
    client.set("/w/b", "2", None).await?;

    let mut seen = vec![];
    let info = client
        .watch("/w", Some(2), &mut |v: Option<&str>, k: &str, _i: &KeyInfo| {
            seen.push((k.to_string(), v.map(|x| x.to_string())));
        })
        .await?;

    assert_eq!(3, info.index);
    assert_eq!("/w/b", info.key);
    assert_eq!(Some(Action::Set), info.action);
    assert_eq!(vec![("/w/b".to_string(), Some("2".to_string()))], seen);

    Ok(())
}

/// A watch blocks until the next change under the prefix.
#[async_entry::test(worker_threads = 4, init = "init_default_ut_tracing()", tracing_span = "debug")]
async fn watch_blocks_until_change() -> Result<()> {
    let (cluster, client) = new_cluster_and_client().await?;

    client.set("/w/a", "1", None).await?;
    let next = cluster.current_index() + 1;

    let waiting = {
        let client = client.clone();
        tokio::spawn(async move {
            let mut noop = |_v: Option<&str>, _k: &str, _i: &KeyInfo| {};
            client.watch("/w", Some(next), &mut noop).await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!waiting.is_finished());

    tracing::info!("--- a change outside the prefix does not wake it up");
    {
        client.set("/other", "x", None).await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiting.is_finished());
    }

    tracing::info!("--- delete under the prefix");
    client.delete("/w/a").await?;

    let info = tokio::time::timeout(timeout(), waiting).await???;
    assert_eq!(Some(Action::Delete), info.action);
    assert_eq!("/w/a", info.key);
    assert_eq!(None, info.value);
    assert_eq!(Some("1".to_string()), info.prev_value);
    assert_eq!(next + 1, info.index);

    Ok(())
}
