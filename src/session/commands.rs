use tauri::State;

use crate::{
    db::EngagementSample,
    engine::EngagementStatus,
    intervention::{AnswerOutcome, InterventionView},
    provider::open_frame_source,
    remediation::RemediationKind,
    session::EngagementController,
    settings::{provider_api_key, EngagementSettings},
};

use crate::AppState;

const DEFAULT_SAMPLE_LIMIT: u32 = 60;

fn controller_from_state(state: &State<'_, AppState>) -> EngagementController {
    state.controller.clone()
}

#[tauri::command]
pub async fn get_engagement_state(state: State<'_, AppState>) -> Result<EngagementStatus, String> {
    Ok(controller_from_state(&state).status().await)
}

#[tauri::command]
pub async fn set_lesson_topic(state: State<'_, AppState>, topic: String) -> Result<(), String> {
    controller_from_state(&state)
        .set_topic(&topic)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn connect_provider(state: State<'_, AppState>) -> Result<(), String> {
    let controller = controller_from_state(&state);
    let settings = state.settings.get();

    let capture_dir = settings.provider.capture_dir.as_deref();
    let source = match open_frame_source(capture_dir, &state.frames) {
        Ok(source) => source,
        Err(err) => {
            controller.capture_unavailable(&err.to_string()).await;
            return Err(err.to_string());
        }
    };

    state
        .provider
        .connect(
            &settings.provider.socket_url,
            provider_api_key().as_deref(),
            controller,
            source,
        )
        .await
        .map_err(|e| format!("{e:#}"))
}

/// One camera frame from the webview, as base64 JPEG/PNG or a data URL.
#[tauri::command]
pub fn submit_frame(state: State<'_, AppState>, data: String) -> Result<(), String> {
    state.frames.submit_encoded(&data).map_err(|e| e.to_string())
}

/// The webview could not open or lost the camera.
#[tauri::command]
pub fn report_capture_error(state: State<'_, AppState>, reason: String) -> Result<(), String> {
    state.frames.fail(reason);
    Ok(())
}

#[tauri::command]
pub async fn disconnect_provider(state: State<'_, AppState>) -> Result<bool, String> {
    Ok(state.provider.disconnect().await)
}

#[tauri::command]
pub async fn accept_help(state: State<'_, AppState>) -> Result<InterventionView, String> {
    controller_from_state(&state)
        .accept()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn decline_help(state: State<'_, AppState>) -> Result<InterventionView, String> {
    controller_from_state(&state)
        .decline()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn choose_remediation(
    state: State<'_, AppState>,
    kind: RemediationKind,
) -> Result<InterventionView, String> {
    controller_from_state(&state)
        .choose(kind)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn retry_remediation(state: State<'_, AppState>) -> Result<InterventionView, String> {
    controller_from_state(&state)
        .retry()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn remediation_feedback(
    state: State<'_, AppState>,
    satisfied: bool,
) -> Result<InterventionView, String> {
    controller_from_state(&state)
        .feedback(satisfied)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn answer_question(
    state: State<'_, AppState>,
    option: usize,
) -> Result<AnswerOutcome, String> {
    controller_from_state(&state)
        .answer(option)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn close_intervention(state: State<'_, AppState>) -> Result<InterventionView, String> {
    Ok(controller_from_state(&state).force_close().await)
}

#[tauri::command]
pub async fn get_threshold(state: State<'_, AppState>) -> Result<u32, String> {
    Ok(controller_from_state(&state).threshold())
}

/// Writes the configuration record; the running detector picks the new value
/// up through the row-update push.
#[tauri::command]
pub async fn set_threshold(state: State<'_, AppState>, seconds: u32) -> Result<(), String> {
    state
        .db
        .store_threshold(seconds)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn recent_samples(
    state: State<'_, AppState>,
    limit: Option<u32>,
) -> Result<Vec<EngagementSample>, String> {
    let session_id = controller_from_state(&state).session_id().await;
    state
        .db
        .recent_samples(&session_id, limit.unwrap_or(DEFAULT_SAMPLE_LIMIT))
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn request_hint(state: State<'_, AppState>, query: String) -> Result<String, String> {
    controller_from_state(&state)
        .hint(&query)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> Result<EngagementSettings, String> {
    Ok(state.settings.get())
}

/// Persists settings. Provider and completion endpoints apply on the next
/// connect or launch.
#[tauri::command]
pub fn update_settings(
    state: State<'_, AppState>,
    settings: EngagementSettings,
) -> Result<(), String> {
    state.settings.update(settings).map_err(|e| e.to_string())
}
