use log::debug;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

pub const ECR_SOURCE: &str = "aws.ecr";
pub const IMAGE_ACTION_DETAIL_TYPE: &str = "ECR Image Action";
pub const PUSH_ACTION: &str = "PUSH";
pub const SUCCESS_RESULT: &str = "SUCCESS";

static ACCOUNT_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{12}$").expect("Invalid account id regex"));

/// Path segments of lowercase alphanumerics, single `.`, `_` or `-` between runs, joined by `/`.
static REPOSITORY_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9]+(?:[._-][a-z0-9]+)*/)*[a-z0-9]+(?:[._-][a-z0-9]+)*$")
        .expect("Invalid repository name regex")
});

static IMAGE_DIGEST_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[A-Fa-f0-9]{32,}$")
        .expect("Invalid image digest regex")
});

static IMAGE_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").expect("Invalid image tag regex")
});

/// Reasons an inbound event is rejected. The display text is returned to the caller verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The event's 'source' must be 'aws.ecr'")]
    WrongSource,
    #[error("The event's 'account' must not be empty")]
    MissingAccount,
    #[error("The event's 'detail-type' must be 'ECR Image Action'")]
    WrongDetailType,
    #[error("The event's 'detail' must be present")]
    MissingDetail,
    #[error("The event's 'detail' must be an object")]
    DetailNotObject,
    #[error("The event's 'detail.action-type' must be 'PUSH'")]
    WrongActionType,
    #[error("The event's 'detail.result' must be 'SUCCESS'")]
    WrongResult,
    #[error("The event's 'detail.repository-name' must not be empty")]
    MissingRepositoryName,
    #[error("The event's 'detail.image-digest' must not be empty")]
    MissingImageDigest,
    #[error("The event's 'account' must be a valid AWS account ID")]
    InvalidAccountId,
    #[error("The event's 'detail.repository-name' must be a valid repository name")]
    InvalidRepositoryName,
    #[error("The event's 'detail.image-digest' must be a valid image digest")]
    InvalidImageDigest,
    #[error("The event's 'detail.image-tag' must be empty or a valid image tag")]
    InvalidImageTag,
}

/// An ECR image push that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageActionEvent {
    account: String,
    repository_name: String,
    image_digest: String,
    image_tag: String,
    region: Option<String>,
    time: Option<String>,
}

impl ImageActionEvent {
    /// Runs every check in order and stops at the first failure.
    pub fn validate(raw: &Value) -> Result<Self, ValidationError> {
        if string_field(raw, "source") != Some(ECR_SOURCE) {
            return Err(ValidationError::WrongSource);
        }

        let account =
            non_empty(string_field(raw, "account")).ok_or(ValidationError::MissingAccount)?;

        if string_field(raw, "detail-type") != Some(IMAGE_ACTION_DETAIL_TYPE) {
            return Err(ValidationError::WrongDetailType);
        }

        let detail = detail_object(raw)?;

        if detail_string(detail, "action-type") != Some(PUSH_ACTION) {
            return Err(ValidationError::WrongActionType);
        }
        if detail_string(detail, "result") != Some(SUCCESS_RESULT) {
            return Err(ValidationError::WrongResult);
        }

        let repository_name = non_empty(detail_string(detail, "repository-name"))
            .ok_or(ValidationError::MissingRepositoryName)?;
        let image_digest = non_empty(detail_string(detail, "image-digest"))
            .ok_or(ValidationError::MissingImageDigest)?;

        if !ACCOUNT_ID_REGEX.is_match(account) {
            return Err(ValidationError::InvalidAccountId);
        }
        if !REPOSITORY_NAME_REGEX.is_match(repository_name) {
            return Err(ValidationError::InvalidRepositoryName);
        }
        if !IMAGE_DIGEST_REGEX.is_match(image_digest) {
            return Err(ValidationError::InvalidImageDigest);
        }

        let image_tag = image_tag(detail)?;

        let event = Self {
            account: account.to_string(),
            repository_name: repository_name.to_string(),
            image_digest: image_digest.to_string(),
            image_tag: image_tag.to_string(),
            region: string_field(raw, "region").map(str::to_string),
            time: string_field(raw, "time").map(str::to_string),
        };
        debug!("Validated event: {:?}", event);

        Ok(event)
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    pub fn image_digest(&self) -> &str {
        &self.image_digest
    }

    /// Empty when the push carried no tag.
    pub fn image_tag(&self) -> &str {
        &self.image_tag
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn time(&self) -> Option<&str> {
        self.time.as_deref()
    }

    /// The `<repository>:<tag>` string the filters are matched against.
    pub fn image_reference(&self) -> String {
        format!("{}:{}", self.repository_name, self.image_tag)
    }
}

fn string_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn detail_string<'a>(detail: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    detail.get(key).and_then(Value::as_str)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn detail_object(raw: &Value) -> Result<&Map<String, Value>, ValidationError> {
    match raw.get("detail") {
        None | Some(Value::Null) => Err(ValidationError::MissingDetail),
        Some(Value::Object(detail)) => Ok(detail),
        Some(_) => Err(ValidationError::DetailNotObject),
    }
}

fn image_tag(detail: &Map<String, Value>) -> Result<&str, ValidationError> {
    let tag = match detail.get("image-tag") {
        None | Some(Value::Null) => "",
        Some(Value::String(tag)) => tag.as_str(),
        Some(_) => return Err(ValidationError::InvalidImageTag),
    };

    if !tag.is_empty() && !IMAGE_TAG_REGEX.is_match(tag) {
        return Err(ValidationError::InvalidImageTag);
    }

    Ok(tag)
}
