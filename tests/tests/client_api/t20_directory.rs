use anyhow::Result;
use coordkv::Lookup;
use maplit::btreemap;
use pretty_assertions::assert_eq;

use crate::fixtures::init_default_ut_tracing;
use crate::fixtures::new_cluster_and_client;

/// Reading a directory returns its direct children.
#[async_entry::test(worker_threads = 4, init = "init_default_ut_tracing()", tracing_span = "debug")]
async fn get_directory() -> Result<()> {
    let (_cluster, client) = new_cluster_and_client().await?;

    client.set("/foo/bar", "baz", None).await?;
    client.set("/foo/qux", "fizz", None).await?;

    tracing::info!("--- values of the children");
    {
        let got = client.get("/foo").await?;
        assert_eq!(
            Some(Lookup::Dir(btreemap! {
                "/foo/bar".to_string() => "baz".to_string(),
                "/foo/qux".to_string() => "fizz".to_string(),
            })),
            got
        );
        assert!(client.exists("/foo").await?);
    }

    tracing::info!("--- sub-directories have no value");
    {
        client.set("/foo/sub/deep", "x", None).await?;

        let got = client.get("/foo").await?.and_then(|x| x.into_dir()).unwrap();
        assert_eq!(
            btreemap! {
                "/foo/bar".to_string() => "baz".to_string(),
                "/foo/qux".to_string() => "fizz".to_string(),
            },
            got
        );

        let infos = client.info("/foo").await?.and_then(|x| x.into_dir()).unwrap();
        assert_eq!(3, infos.len());
        assert!(infos["/foo/sub"].is_dir());
        assert_eq!(None, infos["/foo/sub"].value);
    }

    tracing::info!("--- a directory can not be overwritten");
    {
        let res = client.set("/foo", "v", None).await;
        assert!(
            matches!(res, Err(coordkv::ClientError::UnexpectedStatus { status: 403, .. })),
            "got: {:?}",
            res
        );
    }

    Ok(())
}
