use aws_config::BehaviorVersion;
use aws_sdk_lambda::error::{DisplayErrorContext, SdkError};
use aws_sdk_lambda::operation::invoke::InvokeOutput;
use aws_sdk_lambda::operation::RequestId;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use aws_sdk_lambda::Client;
use log::debug;
use serde_json::Value;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};

/// Status the invoke API returns once an asynchronous invocation is queued.
pub const ACCEPTED_STATUS: i32 = 202;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeResponse {
    pub status_code: i32,
    pub request_id: String,
}

impl InvokeResponse {
    pub fn new(status_code: i32, request_id: Option<&str>) -> Self {
        Self {
            status_code,
            request_id: request_id.unwrap_or_default().to_string(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status_code == ACCEPTED_STATUS
    }
}

impl From<&InvokeOutput> for InvokeResponse {
    fn from(output: &InvokeOutput) -> Self {
        Self::new(output.status_code(), output.request_id())
    }
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("failed to encode event payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("invoke request failed: {0}")]
    Sdk(String),
}

/// Queues an asynchronous invocation of a named function.
pub trait Invoker {
    fn invoke_event(
        &self,
        function_name: &str,
        payload: Vec<u8>,
    ) -> Result<InvokeResponse, InvokeError>;
}

/// Invokes Lambda functions through the AWS SDK, blocking on a current-thread runtime.
pub struct LambdaInvoker {
    client: Client,
    runtime: Runtime,
}

impl LambdaInvoker {
    /// Loads credentials and region from the default provider chain. `endpoint_url`
    /// points the client at a local emulator instead of the regional endpoint.
    pub fn new(endpoint_url: Option<&str>) -> Result<Self, InvokeError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(url) = endpoint_url {
            debug!("Using Lambda endpoint override {}", url);
            loader = loader.endpoint_url(url);
        }
        let sdk_config = runtime.block_on(loader.load());

        Ok(Self {
            client: Client::new(&sdk_config),
            runtime,
        })
    }
}

impl Invoker for LambdaInvoker {
    fn invoke_event(
        &self,
        function_name: &str,
        payload: Vec<u8>,
    ) -> Result<InvokeResponse, InvokeError> {
        debug!("Invoking {} with {} byte payload", function_name, payload.len());

        let request = self
            .client
            .invoke()
            .function_name(function_name)
            .invocation_type(InvocationType::Event)
            .payload(Blob::new(payload))
            .send();

        match self.runtime.block_on(request) {
            Ok(output) => Ok(InvokeResponse::from(&output)),
            // a service error still carries the status and request id Lambda answered with
            Err(SdkError::ServiceError(context)) => Ok(InvokeResponse::new(
                i32::from(context.raw().status().as_u16()),
                context.raw().headers().get("x-amzn-RequestId"),
            )),
            Err(e) => Err(InvokeError::Sdk(DisplayErrorContext(&e).to_string())),
        }
    }
}

/// Hands the original event to the downstream function without waiting for it to run.
pub struct Forwarder {
    invoker: Box<dyn Invoker>,
}

impl Forwarder {
    pub fn new(invoker: Box<dyn Invoker>) -> Self {
        Self { invoker }
    }

    pub fn forward(
        &self,
        function_name: &str,
        event: &Value,
    ) -> Result<InvokeResponse, InvokeError> {
        let payload = serde_json::to_vec(event)?;
        let response = self.invoker.invoke_event(function_name, payload)?;
        debug!(
            "Invoke of {} returned status {} (request id {:?})",
            function_name, response.status_code, response.request_id
        );
        Ok(response)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every invocation and answers with a fixed status.
    #[derive(Debug, Clone)]
    pub struct RecordingInvoker {
        pub status_code: i32,
        pub request_id: String,
        pub calls: Rc<RefCell<Vec<(String, Value)>>>,
    }

    impl RecordingInvoker {
        pub fn answering(status_code: i32) -> Self {
            Self {
                status_code,
                request_id: "3f1f8a1e-6a3c-4d2b-9b0e-2f6c1f0d7a11".to_string(),
                calls: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl Invoker for RecordingInvoker {
        fn invoke_event(
            &self,
            function_name: &str,
            payload: Vec<u8>,
        ) -> Result<InvokeResponse, InvokeError> {
            let event: Value = serde_json::from_slice(&payload)?;
            self.calls.borrow_mut().push((function_name.to_string(), event));
            Ok(InvokeResponse::new(self.status_code, Some(&self.request_id)))
        }
    }
}
