use log::{debug, info};
use serde_json::Value;

use crate::event::ImageActionEvent;
use crate::forwarder::Forwarder;
use crate::outcome::FilterOutcome;
use crate::settings::Settings;

/// Decides whether an ECR push event should reach the SOCI index generator.
pub struct EventFilter {
    settings: Settings,
    forwarder: Forwarder,
}

impl EventFilter {
    pub fn new(settings: Settings, forwarder: Forwarder) -> Self {
        Self { settings, forwarder }
    }

    /// Entry point for a raw payload that may not even be JSON.
    pub fn handle_payload(&self, payload: &str) -> FilterOutcome {
        match serde_json::from_str::<Value>(payload) {
            Ok(raw) => self.handle(&raw),
            Err(e) => {
                debug!("Event payload is not JSON: {}", e);
                FilterOutcome::bad_request("Invalid event")
            }
        }
    }

    pub fn handle(&self, raw: &Value) -> FilterOutcome {
        let event = match ImageActionEvent::validate(raw) {
            Ok(event) => event,
            Err(e) => return FilterOutcome::bad_request(e.to_string()),
        };
        debug!(
            "Push of {}:{} in account {} (region {:?}, time {:?})",
            event.repository_name(),
            event.image_tag(),
            event.account(),
            event.region(),
            event.time()
        );

        let filters = match self.settings.image_tag_filters() {
            Ok(filters) => filters,
            Err(e) => return FilterOutcome::bad_request(e.to_string()),
        };
        debug!("Evaluating {} image tag filters", filters.len());

        let image_reference = event.image_reference();
        match filters.first_match(&image_reference) {
            Some(filter) => self.forward(raw, &event, filter.pattern()),
            None => FilterOutcome::ok(format!(
                "The given event contained the image \"{}\" with digest \"{}\" \
                 which did not match any SOCI repository image tag filters",
                image_reference,
                event.image_digest()
            )),
        }
    }

    fn forward(&self, raw: &Value, event: &ImageActionEvent, pattern: &str) -> FilterOutcome {
        let lambda_arn = match self.settings.lambda_arn() {
            Ok(arn) => arn,
            Err(e) => return FilterOutcome::bad_request(e.to_string()),
        };

        info!("Invoking SOCI index generator Lambda function");

        match self.forwarder.forward(lambda_arn, raw) {
            Ok(response) if response.is_accepted() => FilterOutcome::ok(format!(
                "Successfully invoked SOCI index generator Lambda function because the given \
                 event contained the image \"{}\" with digest \"{}\" which matched SOCI \
                 repository image tag filter \"{}\". Lambda request id: \"{}\"",
                event.image_reference(),
                event.image_digest(),
                pattern,
                response.request_id
            )),
            Ok(response) => FilterOutcome::internal_error(format!(
                "Failed to invoke SOCI index generator Lambda function. \
                 Lambda status code: \"{}\". Lambda request id: \"{}\"",
                response.status_code,
                response.request_id
            )),
            Err(e) => FilterOutcome::internal_error(format!(
                "Failed to invoke SOCI index generator Lambda function: {}",
                e
            )),
        }
    }
}
