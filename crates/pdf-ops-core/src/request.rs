//! Wire types and their conversion into typed operations.
//!
//! [`OperationRequest`] is what callers send: an operation tag, source
//! identifiers and a loose option bag. [`Operation::from_request`] turns it
//! into a [`Job`] whose [`Operation`] carries exactly the options that
//! operation needs, already validated. Nothing downstream sees the bag.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::pdf::Rotation;

/// A request as received from the front end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    pub operation: String,
    #[serde(default, alias = "filePaths")]
    pub sources: Vec<String>,
    #[serde(default)]
    pub options: RequestOptions,
}

/// Operation-dependent options. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl OperationRequest {
    pub fn new(operation: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            operation: operation.into(),
            sources,
            options: RequestOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse a JSON request body.
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| Error::InvalidRequest(format!("malformed request: {e}")))
    }
}

/// Target of `convert-from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetFormat {
    #[default]
    Jpg,
    Docx,
    Pptx,
}

impl TargetFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
        }
    }
}

impl FromStr for TargetFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "docx" => Ok(Self::Docx),
            "pptx" => Ok(Self::Pptx),
            other => Err(Error::InvalidOperands(format!("unsupported target format '{other}'"))),
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of operations, each with its typed options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Merge,
    Split { pages: Vec<i64> },
    Rotate { rotation: Rotation },
    Watermark { text: String },
    Protect { password: String },
    Unlock { password: String },
    Compress,
    ConvertTo,
    ConvertFrom { format: TargetFormat },
}

/// A validated request: typed operation plus its sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub operation: Operation,
    pub sources: Vec<String>,
}

impl Operation {
    /// All operation tags, in the order the front end lists them.
    pub const TAGS: [&'static str; 9] = [
        "merge",
        "split",
        "compress",
        "convert-to",
        "convert-from",
        "rotate",
        "watermark",
        "protect",
        "unlock",
    ];

    /// Validate a request. Performs no I/O.
    ///
    /// Unknown tags, empty source lists and missing required options fail
    /// with [`ErrorKind::InvalidRequest`]; options that are present but
    /// unusable fail with [`ErrorKind::InvalidOperands`].
    pub fn from_request(request: &OperationRequest) -> Result<Job> {
        let tag = request.operation.trim();
        let options = &request.options;

        if tag.is_empty() {
            return Err(Error::InvalidRequest("operation is required".into()));
        }
        if !Self::TAGS.contains(&tag) {
            return Err(Error::UnknownOperation(tag.to_string()));
        }
        if request.sources.is_empty() {
            return Err(Error::InvalidRequest("at least one source is required".into()));
        }
        if let Some(blank) = request.sources.iter().position(|s| s.trim().is_empty()) {
            return Err(Error::InvalidRequest(format!("source {blank} is blank")));
        }

        let operation = match tag {
            "merge" => Self::Merge,
            "split" => Self::Split {
                pages: options.pages.clone().unwrap_or_default(),
            },
            "rotate" => {
                let angle = options.angle.ok_or(Error::MissingOption {
                    operation: "rotate",
                    option: "angle",
                })?;
                Self::Rotate {
                    rotation: Rotation::try_from_degrees(angle)?,
                }
            }
            "watermark" => {
                let text = options.watermark_text.as_deref().ok_or(Error::MissingOption {
                    operation: "watermark",
                    option: "watermarkText",
                })?;
                if text.trim().is_empty() {
                    return Err(Error::InvalidOperands("watermark text must not be blank".into()));
                }
                Self::Watermark {
                    text: text.to_string(),
                }
            }
            "protect" => {
                let password = required_password(options, "protect")?;
                if password.is_empty() {
                    return Err(Error::InvalidOperands("protect password must not be empty".into()));
                }
                Self::Protect { password }
            }
            "unlock" => Self::Unlock {
                password: required_password(options, "unlock")?,
            },
            "compress" => Self::Compress,
            "convert-to" => Self::ConvertTo,
            "convert-from" => Self::ConvertFrom {
                format: options
                    .format
                    .as_deref()
                    .map_or(Ok(TargetFormat::default()), str::parse::<TargetFormat>)?,
            },
            other => return Err(Error::UnknownOperation(other.to_string())),
        };

        Ok(Job {
            operation,
            sources: request.sources.clone(),
        })
    }

    /// The operation's wire tag.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Split { .. } => "split",
            Self::Rotate { .. } => "rotate",
            Self::Watermark { .. } => "watermark",
            Self::Protect { .. } => "protect",
            Self::Unlock { .. } => "unlock",
            Self::Compress => "compress",
            Self::ConvertTo => "convert-to",
            Self::ConvertFrom { .. } => "convert-from",
        }
    }

    /// True when every source is an input; otherwise only the first is.
    pub const fn takes_all_sources(&self) -> bool {
        matches!(self, Self::Merge)
    }

    /// Conversions pass raw bytes through without decoding.
    pub const fn is_conversion(&self) -> bool {
        matches!(self, Self::ConvertTo | Self::ConvertFrom { .. })
    }
}

fn required_password(options: &RequestOptions, operation: &'static str) -> Result<String> {
    options.password.clone().ok_or(Error::MissingOption {
        operation,
        option: "password",
    })
}

/// What the caller gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl Response {
    pub const fn success(result_url: String) -> Self {
        Self {
            success: true,
            result_url: Some(result_url),
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(error: &Error) -> Self {
        Self {
            success: false,
            result_url: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }
}
