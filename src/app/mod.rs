use crate::api::{ApiCommand, ApiServer};
use crate::audio::MicCapture;
use crate::backend::HttpBackend;
use crate::config::Config;
use crate::session::{BehaviorOptions, SessionHandle, SessionMachine, SessionPhase};
use crate::sidebar::SidebarHandle;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

pub async fn run_service() -> Result<()> {
    info!("Starting Meetnote service");

    let config = Config::load()?;

    let (tx, mut rx) = mpsc::channel::<ApiCommand>(32);

    let backend = Arc::new(
        HttpBackend::new(&config.backend.base_url, config.backend.timeout_seconds)
            .context("Failed to build backend client")?,
    );
    let capture = MicCapture::new(config.audio.sample_rate)
        .context("Failed to initialize microphone capture")?;

    let session = SessionHandle::default();
    let sidebar = SidebarHandle::default();
    let machine = SessionMachine::new(
        Box::new(capture),
        backend,
        session.clone(),
        sidebar.clone(),
        BehaviorOptions {
            auto_analyze: config.behavior.auto_analyze,
            auto_name: config.behavior.auto_name,
        },
    );

    let api_server = ApiServer::new(tx, session, sidebar, &config);
    tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("Control API failed: {}", e);
        }
    });

    machine.refresh_recordings().await;

    info!("Meetnote is ready!");
    info!(
        "Toggle recording with: curl -X POST http://127.0.0.1:{}/session/record",
        config.api.port
    );

    // The machine owns the microphone, so all commands funnel through this
    // loop; artifact calls are spawned internally and never block it long.
    while let Some(command) = rx.recv().await {
        match command {
            ApiCommand::ToggleRecording => match machine.toggle_recording().await {
                Ok(SessionPhase::Recording) => info!("Recording started"),
                Ok(SessionPhase::Transcribing) => info!("Recording stopped, transcribing"),
                Ok(phase) => info!("Session is currently {}", phase.as_str()),
                Err(e) => error!("Failed to toggle recording: {}", e),
            },
            ApiCommand::Summarize => {
                if let Err(e) = machine.summarize().await {
                    error!("Summarize rejected: {}", e);
                }
            }
            ApiCommand::DraftEmail { email_type } => {
                if let Err(e) = machine.draft_email(email_type).await {
                    error!("Email draft rejected: {}", e);
                }
            }
            ApiCommand::RegenerateEmail { style } => {
                if let Err(e) = machine.regenerate_email(style).await {
                    error!("Email regeneration rejected: {}", e);
                }
            }
            ApiCommand::QuickEditEmail { instruction } => {
                if let Err(e) = machine.quick_edit_email(&instruction).await {
                    error!("Quick edit rejected: {}", e);
                }
            }
            ApiCommand::SelectEmailType { email_type } => {
                if let Err(e) = machine.select_email_type(email_type).await {
                    error!("Email type selection failed: {}", e);
                }
            }
            ApiCommand::CopyEmail => {
                if let Err(e) = machine.copy_email().await {
                    error!("Copy failed: {}", e);
                }
            }
            ApiCommand::Chat { question } => {
                if let Err(e) = machine.chat(&question).await {
                    error!("Chat rejected: {}", e);
                }
            }
            ApiCommand::LiveCaption(fragment) => {
                machine.push_live_caption(fragment).await;
            }
            ApiCommand::NewSession => {
                if let Err(e) = machine.new_session().await {
                    error!("Session reset failed: {}", e);
                }
            }
            ApiCommand::LoadRecording { id } => {
                if let Err(e) = machine.load_recording(&id).await {
                    error!("Failed to load recording {}: {}", id, e);
                }
            }
            ApiCommand::DeleteRecording { id } => {
                if let Err(e) = machine.delete_recording(&id).await {
                    error!("Failed to delete recording {}: {}", id, e);
                }
            }
            ApiCommand::RenameRecording { id, name } => {
                if let Err(e) = machine.rename_recording(&id, &name).await {
                    error!("Failed to rename recording {}: {}", id, e);
                }
            }
            ApiCommand::RefreshRecordings => {
                machine.refresh_recordings().await;
            }
        }
    }

    Ok(())
}
