// Copyright 2024 ZSoftly Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error and Result implementations.

use std::fmt;
use std::io;

use aws_sdk_ec2::error::SdkError as Ec2SdkError;
use aws_sdk_iam::error::SdkError as IamSdkError;
use aws_sdk_s3::error::SdkError as S3SdkError;
use aws_sdk_ssm::error::SdkError as SsmSdkError;
use aws_sdk_ssooidc::error::SdkError as SsoOidcSdkError;

/// Kind of an error.
///
/// These map to the taxonomy in the design: configuration, auth,
/// agent-channel, storage, grant, validation and IO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing start URL, malformed region, malformed SSO URL.
    Configuration,

    /// Device-code failure, timeout, cancellation, no accounts/roles.
    Auth,

    /// The device-code flow or a poll loop was explicitly cancelled.
    Cancelled,

    /// Send to the agent channel failed.
    AgentChannelSendFailed,

    /// Invocation did not reach a terminal state within the timeout.
    AgentChannelTimedOut,

    /// Object-store bucket/lifecycle/object operation failed.
    Storage,

    /// Role discovery or IAM policy create/attach/detach/delete failed.
    Grant,

    /// Instance ID, region or port failed the compiled-pattern check.
    Validation,

    /// Local file or profile-file read/write failure.
    Io,

    /// Requested resource (instance, account, role, object...) was not found.
    ResourceNotFound,

    /// A query that should return exactly one result returned more than one.
    TooManyItems,

    /// Malformed response from a remote service.
    InvalidResponse,
}

impl ErrorKind {
    /// Short description of the error kind.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "Invalid or missing configuration",
            ErrorKind::Auth => "Authentication failed",
            ErrorKind::Cancelled => "Operation was cancelled",
            ErrorKind::AgentChannelSendFailed => "Failed to send command through the agent channel",
            ErrorKind::AgentChannelTimedOut => "Timed out waiting for the agent channel",
            ErrorKind::Storage => "Object storage operation failed",
            ErrorKind::Grant => "Scoped grant operation failed",
            ErrorKind::Validation => "Input failed validation",
            ErrorKind::Io => "Local I/O failed",
            ErrorKind::ResourceNotFound => "Requested resource was not found",
            ErrorKind::TooManyItems => "Query returned more than one result",
            ErrorKind::InvalidResponse => "Received an invalid response",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Error from a `ztictl` operation.
///
/// Follows a single wrapping layer: a low-level error is captured in
/// `source` and given one semantic `message` naming what the core was
/// trying to do. No deeper wrapping is added on top.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Result of a `ztictl` operation.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new error with just a message.
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Error {
        Error {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new error wrapping a lower-level cause.
    pub fn wrap<S, E>(kind: ErrorKind, message: S, source: E) -> Error
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(ref src) = self.source {
            write!(f, " ({})", src)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Error {
        Error::wrap(ErrorKind::Io, "local I/O operation failed", value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Error {
        Error::wrap(ErrorKind::InvalidResponse, "failed to parse JSON", value)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(value: serde_yaml::Error) -> Error {
        Error::wrap(ErrorKind::Configuration, "failed to parse YAML", value)
    }
}

impl<E, R> From<SsoOidcSdkError<E, R>> for Error
where
    E: std::error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    fn from(value: SsoOidcSdkError<E, R>) -> Error {
        Error::wrap(ErrorKind::Auth, "SSO OIDC request failed", flatten(value))
    }
}

impl<E, R> From<SsmSdkError<E, R>> for Error
where
    E: std::error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    fn from(value: SsmSdkError<E, R>) -> Error {
        Error::wrap(
            ErrorKind::AgentChannelSendFailed,
            "SSM request failed",
            flatten(value),
        )
    }
}

impl<E, R> From<S3SdkError<E, R>> for Error
where
    E: std::error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    fn from(value: S3SdkError<E, R>) -> Error {
        Error::wrap(ErrorKind::Storage, "S3 request failed", flatten(value))
    }
}

impl<E, R> From<IamSdkError<E, R>> for Error
where
    E: std::error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    fn from(value: IamSdkError<E, R>) -> Error {
        Error::wrap(ErrorKind::Grant, "IAM request failed", flatten(value))
    }
}

impl<E, R> From<Ec2SdkError<E, R>> for Error
where
    E: std::error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    fn from(value: Ec2SdkError<E, R>) -> Error {
        Error::wrap(ErrorKind::ResourceNotFound, "EC2 request failed", flatten(value))
    }
}

/// A small stand-in `std::error::Error` for opaque SDK error envelopes we
/// only ever render via `Display`/`Debug` (the AWS SDK's per-operation error
/// types do not uniformly implement `std::error::Error` across the
/// connector-error variants, so we normalize to a string here, the same way
/// the teacher's `From<reqwest::Error>` only keeps `value.to_string()`).
#[derive(Debug)]
struct Opaque(String);

impl fmt::Display for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for Opaque {}

fn flatten(value: impl fmt::Debug) -> Opaque {
    Opaque(format!("{:?}", value))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = Error::new(ErrorKind::Validation, "instance id rejected");
        let rendered = err.to_string();
        assert!(rendered.contains("Input failed validation"));
        assert!(rendered.contains("instance id rejected"));
    }

    #[test]
    fn wrap_preserves_source() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err = Error::wrap(ErrorKind::Io, "failed to read profile file", io_err);
        assert!(std::error::Error::source(&err).is_some());
    }
}
