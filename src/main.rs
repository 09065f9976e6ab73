use std::io;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use gymlink::{
    Args, DriverScript, fake_backends, real_radio_client, run, scripted_driver_factory,
};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let mut stdout = io::stdout();

    let run_result = async {
        let (settings, maybe_fake_args) = args.into_settings_and_backends()?;
        let (radio, factory) = match maybe_fake_args {
            Some(fake_args) => fake_backends(fake_args),
            None => (
                real_radio_client(),
                scripted_driver_factory(DriverScript::default()),
            ),
        };

        let shutdown = CancellationToken::new();
        tokio::spawn(interrupt_watcher(shutdown.clone()));

        run(settings, &mut stdout, radio, factory, shutdown).await
    }
    .await;

    match run_result {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}

async fn interrupt_watcher(shutdown: CancellationToken) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for interrupt signals");
        return;
    }

    shutdown.cancel();
}
