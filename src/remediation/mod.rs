pub mod client;
pub mod parse;
pub mod prompts;
pub mod types;

use std::sync::Arc;

use log::info;

pub use client::{CompletionClient, ProxyClient, RemediationError, RemediationSource};
pub use types::{PollQuestion, QuizQuestion, RemediationContent, RemediationKind};

use crate::settings::CompletionSettings;

/// The web app proxy when one is configured, the model endpoint otherwise.
pub fn remediation_source(
    settings: &CompletionSettings,
    api_key: Option<String>,
) -> Result<Arc<dyn RemediationSource>, RemediationError> {
    match settings.proxy_base_url.as_deref().map(str::trim) {
        Some(proxy) if !proxy.is_empty() => {
            info!("Remediation content served by proxy at {proxy}");
            Ok(Arc::new(ProxyClient::new(proxy)?))
        }
        _ => {
            info!(
                "Remediation content generated by {} at {}",
                settings.model, settings.base_url
            );
            Ok(Arc::new(CompletionClient::new(
                settings.base_url.clone(),
                settings.model.clone(),
                api_key,
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_proxy_falls_back_to_model_endpoint() {
        let settings = CompletionSettings {
            proxy_base_url: Some("  ".into()),
            ..CompletionSettings::default()
        };
        assert!(remediation_source(&settings, None).is_ok());

        let proxied = CompletionSettings {
            proxy_base_url: Some("http://localhost:3000".into()),
            ..CompletionSettings::default()
        };
        assert!(remediation_source(&proxied, None).is_ok());
    }
}
