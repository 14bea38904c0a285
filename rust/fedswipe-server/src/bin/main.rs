use std::{path::PathBuf, process, sync::Arc};

use rayon::ThreadPoolBuilder;
use structopt::StructOpt;
use tokio::signal;
use tracing_subscriber::*;

use fedswipe_core::model::{DenseInitializer, ModelInitializer};
use fedswipe_server::{
    broadcast::Dispatcher,
    registry::ConnectionRegistry,
    rest,
    services,
    session::Sessions,
    settings::Settings,
    state_machine::StateMachineInitializer,
};

#[macro_use]
extern crate tracing;

#[derive(Debug, StructOpt)]
#[structopt(name = "Coordinator")]
struct Opt {
    /// Path of the configuration file
    #[structopt(short, parse(from_os_str))]
    config_path: PathBuf,
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();

    let settings = Settings::new(opt.config_path).unwrap_or_else(|err| {
        eprintln!("{}", err);
        process::exit(1);
    });
    let Settings {
        api: api_settings,
        aggregation: aggregation_settings,
        model: model_settings,
        log: log_settings,
    } = settings;

    let _fmt_subscriber = FmtSubscriber::builder()
        .with_env_filter(log_settings.filter)
        .with_ansi(true)
        .init();

    let registry = ConnectionRegistry::new();
    let dispatcher = Dispatcher::new(registry.clone());
    let initializer: Arc<dyn ModelInitializer> = Arc::new(DenseInitializer::from(model_settings));

    let (state_machine, requests_tx, event_subscriber) =
        StateMachineInitializer::new(aggregation_settings, initializer, dispatcher.clone())
            .init()
            .unwrap_or_else(|err| {
                error!("failed to initialize state machine: {}", err);
                process::exit(1);
            });

    let thread_pool = ThreadPoolBuilder::new()
        .panic_handler(|_| error!("a decoding task panicked"))
        .build()
        .unwrap_or_else(|err| {
            error!("failed to build the decoding thread pool: {}", err);
            process::exit(1);
        });

    let fetcher = services::fetchers::fetcher(&event_subscriber, registry);
    let submission_handler = services::messages::SubmissionHandler::new(
        requests_tx,
        dispatcher.codec(),
        Arc::new(thread_pool),
    );
    let sessions = Sessions::new(dispatcher.clone(), submission_handler, &event_subscriber);

    tokio::select! {
        _ = state_machine.run() => {
            warn!("shutting down: Service terminated");
        }
        result = rest::serve(api_settings, fetcher, sessions, dispatcher) => {
            if let Err(err) = result {
                error!("{}", err);
            }
            warn!("shutting down: REST server terminated");
        }
        _ = signal::ctrl_c() => {}
    }
}
