use clap::Parser;
use gsq::{registry, Conf, ExchangeLog, GsqErr, ReplayTransport, ServerQuery};
use std::{fs, path::PathBuf, time::Duration};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "gsq", version, about = "Query a game server and print its status as JSON")]
struct Args {
    /// Protocol alias, e.g. tf2, arma3, bf4, quake3.
    protocol: String,

    /// Server address as host:port.
    address: String,

    #[arg(short, long)]
    players: bool,

    #[arg(short, long)]
    rules: bool,

    /// Socket read timeout in milliseconds.
    #[arg(short, long, default_value_t = 2000)]
    timeout: u64,

    /// Print every packet sent and received.
    #[arg(short, long)]
    debug: bool,

    /// Write the exchange and its result as a replay document.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Answer from a replay document instead of the network.
    #[arg(long, conflicts_with = "record")]
    replay: Option<PathBuf>,

    /// List the known protocol aliases and exit.
    #[arg(long, exclusive = true)]
    list: bool,
}

fn main() -> Result<(), GsqErr> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.list {
        for alias in registry::aliases() {
            println!("{}", alias);
        }
        return Ok(());
    }

    let mut conf = Conf::create_from_str(&args.address)?;
    conf.socket_conf.read_time_out = Some(Duration::from_millis(args.timeout));

    let mut query = match &args.replay {
        Some(path) => {
            let transport = ReplayTransport::from_json(&fs::read_to_string(path)?)?;
            let protocol = registry::lookup(&args.protocol)?.clone();

            ServerQuery::with_transport(protocol, conf, Box::new(transport))
        }
        None => registry::create_with_conf(&args.protocol, conf)?,
    };

    let mut log = ExchangeLog::create();
    query.query_server_logged(args.players, args.rules, &mut log);

    if args.debug {
        eprint!("{}", log);
    }

    if let Some(path) = &args.record {
        let doc = log.to_replay_document(&args.protocol, Some(query.info().clone()));
        fs::write(path, doc.to_json()?)?;
    }

    println!("{}", query.info());
    Ok(())
}
