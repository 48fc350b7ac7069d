//! Shared application state

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use intake_agent_config::Settings;
use intake_agent_core::{
    AddressValidator, ChoiceClassifier, ConfirmationSender, ProviderDirectory,
};
use intake_agent_services::{
    AddressService, LlmChoiceClassifier, MockProviderDirectory, NoopConfirmationSender,
    WebhookConfirmationSender,
};
use intake_agent_state::StateStore;

use crate::shutdown::ShutdownCoordinator;
use crate::speech::SpeechEngines;

/// Everything a request handler needs, cheaply clonable
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn StateStore>,
    pub validator: Arc<dyn AddressValidator>,
    pub directory: Arc<dyn ProviderDirectory>,
    pub classifier: Option<Arc<dyn ChoiceClassifier>>,
    pub notifier: Arc<dyn ConfirmationSender>,
    pub speech: Arc<dyn SpeechEngines>,
    pub shutdown: Arc<ShutdownCoordinator>,
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Wire the collaborator set from settings. HTTP clients inside the
    /// services are shared process-wide; their failures stay per-call.
    pub fn new(
        settings: Settings,
        store: Arc<dyn StateStore>,
        speech: Arc<dyn SpeechEngines>,
        metrics: PrometheusHandle,
    ) -> Self {
        let validator: Arc<dyn AddressValidator> =
            Arc::new(AddressService::new(&settings.address_validation));

        let classifier: Option<Arc<dyn ChoiceClassifier>> = if settings.classifier.enabled {
            Some(Arc::new(LlmChoiceClassifier::new(settings.classifier.clone())))
        } else {
            None
        };

        let notifier: Arc<dyn ConfirmationSender> = if settings.notifications.enabled {
            Arc::new(WebhookConfirmationSender::new(&settings.notifications))
        } else {
            Arc::new(NoopConfirmationSender)
        };

        Self {
            settings: Arc::new(settings),
            store,
            validator,
            directory: Arc::new(MockProviderDirectory::new()),
            classifier,
            notifier,
            speech,
            shutdown: ShutdownCoordinator::new(),
            metrics,
        }
    }
}
