mod cache;
mod collectors;
mod config;
mod host;
mod http;
mod logging;
mod metrics;
mod registration;
mod reporter;
mod scheduler;
mod snapshot;
#[cfg(test)]
mod testing;

use axum::serve;
use cache::{BatchCache, Identity};
use clap::Parser;
use collectors::system::SysinfoSampler;
use config::Config;
use host::HostIdentity;
use logging::{trace, Status};
use metrics::Metrics;
use registration::RegistrationRequest;
use reporter::HttpReporter;
use scheduler::{ScheduleConfig, Scheduler};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "sse-reporter")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "/etc/sse/config.json")]
    config: String,
    #[arg(long, default_value = "/var/log/sphire-sse.log")]
    log_file: String,
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_json());
        return;
    }

    if let Err(err) = logging::init(&cli.log_file) {
        eprintln!("{err}");
        std::process::exit(1);
    }
    info!("{}", trace("**** Starting program ****", Status::Ok));

    let cfg = match Config::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => fatal("Initialization failed - could not load configuration.", &err),
    };
    let Some(schedule) = ScheduleConfig::new(
        cfg.settings.reporting.collect_interval_secs,
        cfg.settings.reporting.report_every_n_collections,
    ) else {
        fatal_msg("Initialization failed - invalid reporting schedule.");
    };

    let host = match HostIdentity::discover(&cfg.mothership.url).await {
        Ok(host) => host,
        Err(err) => fatal("Initialization failed, IP Address unattainable.", &err),
    };
    info!(
        hostname = %host.hostname,
        ip_address = %host.ip_address,
        "{}",
        trace("Initialization complete.", Status::Ok)
    );

    let client = reporter::build_client(VERSION);
    let status_url = cfg.status_url();
    if let Err(err) = registration::check_status(&client, &status_url).await {
        fatal("Mothership unreachable.", &err);
    }

    info!("{}", trace("Performing registration.", Status::Ok));
    let request = RegistrationRequest::new(&cfg, &host, VERSION, &cli.log_file, &cli.config);
    match registration::register(&client, &cfg.register_url(VERSION), &request).await {
        Ok(token) => info!(
            token_len = token.0.len(),
            "{}",
            trace("Registration complete.", Status::Ok)
        ),
        Err(err) => fatal("Unable to register this machine.", &err),
    }

    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => fatal("Could not initialize agent metrics.", &err),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = cfg.status.listen.clone().map(|listen| {
        let metrics = metrics.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let app = http::build_router(metrics);
            let addr: SocketAddr = match listen.parse() {
                Ok(addr) => addr,
                Err(err) => {
                    error!(
                        error = %err,
                        listen = %listen,
                        "{}",
                        trace("Invalid status listen address.", Status::Error)
                    );
                    return;
                }
            };

            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(err) => {
                    error!(error = %err, "{}", trace("Could not start status endpoint.", Status::Error));
                    return;
                }
            };
            info!(listen = %addr, "{}", trace("Status endpoint listening.", Status::Ok));

            let server = serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });

            if let Err(err) = server.await {
                error!(error = %err, "{}", trace("Status endpoint failed.", Status::Error));
            }
        })
    });

    let signal_task = tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("{}", trace("Shutdown signal received.", Status::Ok));
        let _ = shutdown_tx.send(true);
    });

    let cache = BatchCache::new(Identity::from(&cfg.identification), VERSION);
    let sampler = SysinfoSampler::new(&cfg.settings);
    let reporter = HttpReporter::new(client, cfg.collector_url());
    let mut scheduler = Scheduler::new(schedule, cache, sampler, reporter, metrics);
    scheduler.run(shutdown_rx).await;

    let _ = signal_task.await;
    if let Some(task) = http_task {
        let _ = task.await;
    }
    info!("{}", trace("**** Exiting program ****", Status::Ok));
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                error!(
                    error = %err,
                    "{}",
                    trace("Could not install SIGTERM handler.", Status::Error)
                );
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(
                error = %err,
                "{}",
                trace("Could not wait for Ctrl+C.", Status::Error)
            );
        }
    }
}

fn fatal(message: &str, err: &dyn std::error::Error) -> ! {
    error!(error = %err, "{}", trace(message, Status::Error));
    eprintln!("{message} {err}");
    fatal_msg("Exiting.")
}

fn fatal_msg(message: &str) -> ! {
    error!("{}", trace(message, Status::Error));
    eprintln!("{message}");
    std::process::exit(1);
}
