use ::std::thread;

use ::cascada_client::{
    worker::{run_node, WorkerConfig},
    Session,
};
use ::cascada_common::{
    config::{load_config, Args},
    error::Result,
    tracing::{error, info},
    tracing_subscriber::{self, EnvFilter},
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let Args { config_path } = Args::parse_args();
    let WorkerConfig {
        server_url,
        secret,
        node_count,
        node_name,
        no_work_code,
    } = load_config(&config_path)?;
    let name = node_name
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "cascada-worker".to_owned());
    info!("Start cascada worker {} against {}", name, server_url);

    let mut session = Session::new(&server_url, &secret)?;
    session.register(&name)?;
    session.allocate_nodes(node_count)?;

    thread::scope(|scope| {
        let session = &session;
        for node in session.nodes() {
            scope.spawn(move || match run_node(session, node, no_work_code) {
                Ok(submitted) => {
                    info!("Node {} finished, {} results submitted", node.id(), submitted)
                }
                Err(e) => error!("Node {} stopped: {}", node.id(), e),
            });
        }
    });

    session.unregister()?;
    info!("Cascada worker {} done", name);
    Ok(())
}
