use anyhow::Result;
use coordkv::ClientError;
use coordkv_memcluster::MemCluster;
use pretty_assertions::assert_eq;

use crate::fixtures::init_default_ut_tracing;
use crate::fixtures::new_client;
use crate::fixtures::new_cluster_and_client;

/// `connect()` learns the members from the seed and switches to the leader.
#[async_entry::test(worker_threads = 4, init = "init_default_ut_tracing()", tracing_span = "debug")]
async fn connect_through_follower() -> Result<()> {
    let cluster = MemCluster::new(3);
    let client = new_client(&cluster, 2)?;

    let leader = client.connect().await?;

    assert_eq!(cluster.member(0), leader);
    assert_eq!(cluster.member(0), client.current_endpoint());
    assert_eq!(cluster.members(), client.members());

    Ok(())
}

/// `connect()` reports every failure as a connection error.
#[async_entry::test(worker_threads = 4, init = "init_default_ut_tracing()", tracing_span = "debug")]
async fn connect_failure() -> Result<()> {
    let cluster = MemCluster::new(3);
    let client = new_client(&cluster, 0)?;

    cluster.set_unreachable(&cluster.member(0), true);

    let res = client.connect().await;
    assert!(matches!(res, Err(ClientError::Connection { .. })), "got: {:?}", res);

    Ok(())
}

/// `machines()` and `leader()` report what the cluster says.
#[async_entry::test(worker_threads = 4, init = "init_default_ut_tracing()", tracing_span = "debug")]
async fn machines_and_leader() -> Result<()> {
    let (cluster, client) = new_cluster_and_client().await?;

    assert_eq!(cluster.members(), client.machines().await?);
    assert_eq!(cluster.member(0).to_string(), client.leader().await?);

    tracing::info!("--- elect member 1");
    cluster.set_leader(&cluster.member(1));

    let want = vec![cluster.member(1), cluster.member(0), cluster.member(2)];
    assert_eq!(want, client.machines().await?);
    assert_eq!(want, client.members());
    assert_eq!(cluster.member(1).to_string(), client.leader().await?);

    Ok(())
}
