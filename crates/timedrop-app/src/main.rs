use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use timedrop_app::config::{
    Cli, Commands, ConnectionArgs, ConnectionConfig, UploadArgs, UploadConfig,
};
use timedrop_app::{
    AppError, SubmitResult, TerminalNavigator, UploadSession, app_version, is_https_endpoint,
    logging, render_notification,
};
use timedrop_archive::read_staged_files;
use timedrop_clock::{SystemClock, SystemZone};
use timedrop_contract::cleanup_message;
use timedrop_upload::{CleanupClient, HttpTransport};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => return report(AppError::Runtime(error)),
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(error) => report(error),
    }
}

fn report(error: AppError) -> ExitCode {
    error!(%error, "timedrop failed");
    eprintln!("timedrop: {error}");
    ExitCode::from(2)
}

async fn run(cli: Cli) -> Result<ExitCode, AppError> {
    match cli.command {
        Commands::Upload(args) => upload(args).await,
        Commands::Cleanup(args) => cleanup(args).await,
        Commands::Version => {
            println!("timedrop {}", app_version());
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn upload(args: UploadArgs) -> Result<ExitCode, AppError> {
    let config = UploadConfig::from_args(&args)?;
    let endpoint = config.connection.endpoint.clone();
    if !is_https_endpoint(endpoint.as_str()) {
        warn!(endpoint = %endpoint, "uploading over plain http");
    }

    let files = read_staged_files(&args.files).await?;
    let transport = Arc::new(HttpTransport::new(endpoint.as_str(), config.connection.timeout)?);
    let navigator = Arc::new(TerminalNavigator::new(endpoint));

    let mut session = UploadSession::open(
        &config,
        Arc::new(SystemClock),
        Arc::new(SystemZone),
        transport,
        navigator,
    )?;

    let mut notifications = session.notifications().history();
    let printer = tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(state) => {
                    if let Some(line) = render_notification(&state) {
                        eprintln!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "notifications dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let coordinator = session.coordinator_mut();
    for file in files {
        coordinator.stage_file(file);
    }
    if let Some(expiry) = args.expiry.as_deref() {
        coordinator.on_expiry_field_changed(expiry);
    }
    coordinator.set_archive_name(args.archive_name.clone());
    info!(status = %coordinator.form_view().status_line(), "form ready");

    let result = coordinator.submit().await;
    session.close();
    if printer.await.is_err() {
        warn!("notification printer stopped abnormally");
    }

    match result? {
        SubmitResult::Redirected { .. } => Ok(ExitCode::SUCCESS),
        SubmitResult::Rejected { .. } => Ok(ExitCode::FAILURE),
    }
}

async fn cleanup(args: ConnectionArgs) -> Result<ExitCode, AppError> {
    let config = ConnectionConfig::from_args(&args)?;
    let client = CleanupClient::new(config.endpoint.as_str(), config.timeout)?;
    let response = client.run(&config.csrf_token).await?;

    match cleanup_message(&response) {
        Some(message) => {
            println!("{message}");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("error: cleanup was not successful");
            Ok(ExitCode::FAILURE)
        }
    }
}
