use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use broker::config;
use broker::landing::{self, LandingState};
use broker::pidfile::PidFile;
use broker::socket_server;
use broker_core::{Broker, BrokerMode, BrokerSettings, ProtocolRegistry};
use clap::{Arg, ArgAction, Command};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let matches = Command::new("broker")
        .version(env!("CARGO_PKG_VERSION"))
        .about("RF message broker daemon")
        .arg(
            Arg::new("config")
                .short('C')
                .long("config")
                .value_name("file")
                .help("path to the TOML config file"),
        )
        .arg(
            Arg::new("master_server")
                .short('S')
                .long("master")
                .value_name("ipv4")
                .help("master broker address (ADHOC mode)"),
        )
        .arg(
            Arg::new("master_port")
                .short('P')
                .long("master-port")
                .value_name("port")
                .value_parser(clap::value_parser!(u16))
                .help("master broker port (ADHOC mode)"),
        )
        .arg(
            Arg::new("nodaemon")
                .short('D')
                .long("nodaemon")
                .action(ArgAction::SetTrue)
                .help("run in the foreground with verbose logging"),
        )
        .arg(
            Arg::new("stacktracer")
                .long("stacktracer")
                .action(ArgAction::SetTrue)
                .help("enabled for compatibility; no-op in this build"),
        )
        .arg(
            Arg::new("threadprofiler")
                .long("threadprofiler")
                .action(ArgAction::SetTrue)
                .help("enabled for compatibility; no-op in this build"),
        )
        .get_matches();

    let nodaemon = matches.get_flag("nodaemon");
    let default_level = if nodaemon { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "broker starting");

    let config_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));
    let cfg = match config::load_config_from_path(&config_path) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("FATAL: failed to load config from {:?}: {err}", config_path);
            eprintln!("FATAL: failed to load config from {:?}: {err}", config_path);
            std::process::exit(1);
        }
    };

    let master_addr = resolve_master_addr(&matches);

    let pidfile = if nodaemon {
        None
    } else {
        match PidFile::acquire(&cfg.pid_file) {
            Ok(guard) => Some(guard),
            Err(err) => {
                error!("FATAL: {err}");
                eprintln!("FATAL: {err}");
                std::process::exit(1);
            }
        }
    };

    let mode = if master_addr.is_some() || !cfg.standalone {
        BrokerMode::Adhoc
    } else {
        BrokerMode::Standalone
    };

    let broker = Arc::new(Broker::new(
        BrokerSettings {
            port: cfg.port,
            receive_repeats: cfg.receive_repeats,
            mode,
            node_uuid: uuid::Uuid::new_v4().to_string(),
            watchdog_enabled: cfg.watchdog_enable,
            stats_enabled: cfg.stats_enable,
        },
        // Protocol decoder/encoder plugins are an out-of-core collaborator
        // (PURPOSE & SCOPE): this build runs the socket/broadcast pipeline
        // against whatever set a real deployment registers at startup.
        ProtocolRegistry::new(Vec::new()),
    ));

    let mut handles = Vec::new();
    handles.push(tokio::spawn(broker_core::run_decoder(broker.clone())));
    handles.push(tokio::spawn(broker_core::run_broadcaster(broker.clone(), None)));

    match socket_server::bind_and_serve(broker.clone(), cfg.port).await {
        Ok(addr) => info!(%addr, "client session manager listening"),
        Err(err) => {
            error!("FATAL: failed to bind client socket on port {}: {err}", cfg.port);
            eprintln!("FATAL: failed to bind client socket on port {}: {err}", cfg.port);
            std::process::exit(1);
        }
    }

    if mode == BrokerMode::Adhoc {
        match master_addr {
            Some(addr) => {
                let broker = broker.clone();
                let node_uuid = broker.settings.node_uuid.clone();
                handles.push(tokio::spawn(async move {
                    broker_core::run_clientize(broker, node_uuid, Some(addr), None).await;
                }));
            }
            None => {
                warn!(
                    "ADHOC mode requested but no master address given (-S/-P) and SSDP \
                     discovery is not part of this build; clientize not started"
                );
            }
        }
    }

    if cfg.webserver_enable {
        let state = LandingState {
            webgui_host: "0.0.0.0".to_owned(),
            webgui_port: cfg.webserver_port,
            template_root: format!("{}/{}", cfg.webserver_root, cfg.webgui_template),
        };
        let router = landing::build_router(state);
        match tokio::net::TcpListener::bind(("0.0.0.0", cfg.webserver_port)).await {
            Ok(listener) => {
                info!(port = cfg.webserver_port, "landing page listening");
                handles.push(tokio::spawn(async move {
                    let _ = axum::serve(listener, router).await;
                }));
            }
            Err(err) => warn!("failed to bind landing page port {}: {err}", cfg.webserver_port),
        }
    }

    info!("no hardware receive/send/watchdog workers started: RF hardware modules and the \
           resource sampler are out-of-core collaborators not wired by this build");

    shutdown_signal().await;
    info!("shutdown signal received, stopping broker");
    broker.initiate_shutdown();
    for handle in handles {
        let _ = handle.await;
    }
    if let Some(pidfile) = pidfile {
        pidfile.release();
    }
    info!("broker shut down cleanly");
}

fn resolve_master_addr(matches: &clap::ArgMatches) -> Option<SocketAddr> {
    let ip = matches.get_one::<String>("master_server")?;
    let ip: IpAddr = ip.parse().ok()?;
    let port = matches.get_one::<u16>("master_port").copied().unwrap_or(5000);
    Some(SocketAddr::new(ip, port))
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C"); },
        _ = terminate => { info!("received SIGTERM"); },
    }
}
