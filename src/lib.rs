pub mod db;
pub mod detector;
pub mod emotion;
pub mod engine;
pub mod intervention;
pub mod provider;
pub mod remediation;
pub mod session;
pub mod settings;
pub mod utils;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
pub(crate) use desktop::AppState;

#[cfg(feature = "desktop")]
mod desktop {
    use std::sync::Arc;

    use log::info;
    use tauri::{Manager, RunEvent};
    use tokio_util::sync::CancellationToken;

    use crate::{
        db::Database,
        detector::DetectorConfig,
        engine::LearningSession,
        provider::{FrameInbox, ProviderLink},
        remediation::remediation_source,
        session::{
            commands::{
                accept_help, answer_question, choose_remediation, close_intervention,
                connect_provider, decline_help, disconnect_provider, get_engagement_state,
                get_settings, get_threshold, recent_samples, remediation_feedback,
                report_capture_error, request_hint, retry_remediation, set_lesson_topic,
                set_threshold, submit_frame, update_settings,
            },
            events::TauriSink,
            load_threshold_cache, spawn_threshold_sync, EngagementController, EventSink,
        },
        settings::{completion_api_key, SettingsStore},
        utils::logging::init_logging,
    };

    pub(crate) struct AppState {
        pub(crate) controller: EngagementController,
        pub(crate) db: Database,
        pub(crate) settings: SettingsStore,
        pub(crate) provider: ProviderLink,
        pub(crate) frames: FrameInbox,
        pub(crate) background: CancellationToken,
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        init_logging();
        info!("LearnSense starting up...");

        let app = tauri::Builder::default()
            .plugin(tauri_plugin_opener::init())
            .setup(|app| {
                let result = (|| -> anyhow::Result<()> {
                    let app_data_dir = app
                        .path()
                        .app_data_dir()
                        .map_err(|err| anyhow::anyhow!(err))?;
                    std::fs::create_dir_all(&app_data_dir)?;

                    let database = Database::new(app_data_dir.join("learnsense.sqlite3"))?;
                    let settings_store = SettingsStore::new(app_data_dir.join("settings.json"))?;
                    let settings = settings_store.get();

                    let events: Arc<dyn EventSink> = Arc::new(TauriSink::new(app.handle().clone()));
                    let remediation = remediation_source(&settings.completion, completion_api_key())?;
                    let session = LearningSession::new(
                        settings.lesson_topic.clone(),
                        DetectorConfig {
                            require_fresh_frame: settings.require_fresh_frame,
                        },
                    );

                    let background = CancellationToken::new();
                    let controller = tauri::async_runtime::block_on({
                        let database = database.clone();
                        let events = events.clone();
                        let background = background.clone();
                        async move {
                            let threshold = load_threshold_cache(&database).await;
                            spawn_threshold_sync(
                                database.clone(),
                                threshold.clone(),
                                events.clone(),
                                background,
                            );

                            let mut controller =
                                EngagementController::new(session, remediation, events, threshold);
                            if settings.telemetry_enabled {
                                controller = controller.with_telemetry(database);
                            }
                            controller.spawn_ticker().await;
                            controller
                        }
                    });

                    app.manage(AppState {
                        controller,
                        db: database,
                        settings: settings_store,
                        provider: ProviderLink::new(),
                        frames: FrameInbox::new(),
                        background,
                    });

                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                get_engagement_state,
                set_lesson_topic,
                connect_provider,
                disconnect_provider,
                submit_frame,
                report_capture_error,
                accept_help,
                decline_help,
                choose_remediation,
                retry_remediation,
                remediation_feedback,
                answer_question,
                close_intervention,
                get_threshold,
                set_threshold,
                recent_samples,
                request_hint,
                get_settings,
                update_settings,
            ])
            .build(tauri::generate_context!())
            .expect("error while building tauri application");

        app.run(|handle, event| {
            if let RunEvent::Exit = event {
                let state = handle.state::<AppState>();
                state.background.cancel();
                tauri::async_runtime::block_on(async {
                    state.provider.disconnect().await;
                    state.controller.cancel_ticker().await;
                });
                info!("LearnSense shut down");
            }
        });
    }
}
