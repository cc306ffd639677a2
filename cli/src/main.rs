use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use coordkv::Client;
use coordkv::Config;
use coordkv::KeyInfo;
use coordkv::Lookup;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Opt {
    #[clap(flatten)]
    pub config: Config,

    /// Send the command to the seed endpoint without asking it for the leader first.
    #[clap(long)]
    pub no_connect: bool,

    #[clap(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Print the value of a key, or the values under a directory as JSON.
    Get { key: String },

    /// Write a key and print the value it replaced, if any.
    Set {
        key: String,
        value: String,

        /// Seconds until the key expires.
        #[clap(long)]
        ttl: Option<u64>,
    },

    /// Write a key only if its current value is `expected`.
    Update {
        key: String,
        value: String,

        #[clap(long)]
        expected: String,

        #[clap(long)]
        ttl: Option<u64>,
    },

    /// Remove a key and print its last value.
    Delete { key: String },

    /// Print `true` if a key or directory exists, `false` otherwise.
    Exists { key: String },

    /// Print everything known about a key as JSON.
    Info { key: String },

    /// Wait for the next change under a prefix and print it as JSON.
    Watch {
        prefix: String,

        #[clap(long)]
        index: Option<u64>,
    },

    /// Print every change under a prefix as JSON, one per line, until interrupted.
    Observe {
        prefix: String,

        #[clap(long)]
        index: Option<u64>,
    },

    /// Print the cluster members, leader first.
    Machines,

    /// Print the address of the leader.
    Leader,
}

fn print_json<T: serde::Serialize + ?Sized>(v: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(v)?);
    Ok(())
}

async fn run(opt: Opt) -> anyhow::Result<bool> {
    let client = Client::http(opt.config.clone()).context("build client")?;

    if !opt.no_connect {
        let leader = client.connect().await?;
        tracing::debug!(leader = display(&leader), "connected");
    }

    match opt.cmd {
        Command::Get { key } => match client.get(&key).await? {
            Some(Lookup::Key(v)) => println!("{}", v),
            Some(Lookup::Dir(d)) => print_json(&d)?,
            None => return Ok(false),
        },
        Command::Set { key, value, ttl } => {
            if let Some(prev) = client.set(&key, &value, ttl).await? {
                println!("{}", prev);
            }
        }
        Command::Update {
            key,
            value,
            expected,
            ttl,
        } => {
            return Ok(client.update(&key, &value, &expected, ttl).await?);
        }
        Command::Delete { key } => match client.delete(&key).await? {
            Some(prev) => println!("{}", prev),
            None => return Ok(false),
        },
        Command::Exists { key } => {
            let exists = client.exists(&key).await?;
            println!("{}", exists);
        }
        Command::Info { key } => match client.info(&key).await? {
            Some(Lookup::Key(info)) => print_json(&info)?,
            Some(Lookup::Dir(d)) => print_json(&d)?,
            None => return Ok(false),
        },
        Command::Watch { prefix, index } => {
            let info = client.watch(&prefix, index, &mut |_v: Option<&str>, _k: &str, _i: &KeyInfo| {}).await?;
            print_json(&info)?;
        }
        Command::Observe { prefix, index } => {
            let observer = client.observe(&prefix, index, |_v: Option<&str>, _k: &str, info: &KeyInfo| {
                match serde_json::to_string(info) {
                    Ok(s) => println!("{}", s),
                    Err(e) => tracing::error!(error = display(&e), "failed to encode change"),
                }
            });

            tokio::select! {
                res = observer.join() => res?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupted");
                    observer.cancel();
                }
            }
        }
        Command::Machines => {
            for m in client.machines().await? {
                println!("{}", m);
            }
        }
        Command::Leader => {
            println!("{}", client.leader().await?);
        }
    }

    Ok(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let options = Opt::parse();

    let found = run(options).await?;
    if !found {
        std::process::exit(1);
    }

    Ok(())
}
