use http::StatusCode;
use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{} '{}' was not found", kind, name))]
    NotFound { kind: &'static str, name: String },

    #[snafu(display(
        "Too many requests when attempting to {} '{}': '{}'",
        operation,
        name,
        message
    ))]
    TooManyRequests {
        operation: &'static str,
        name: String,
        message: String,
    },

    #[snafu(display("Unable to {} '{}': '{}'", operation, name, source))]
    Api {
        operation: &'static str,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("Unable to create Eviction for Pod '{}': '{}'", name, source))]
    CreateEviction {
        name: String,
        source: serde_json::Error,
    },
}

impl Error {
    /// Sorts an error returned by `kube` into the outcomes a drain reacts to differently.
    pub(crate) fn from_kube(
        err: kube::Error,
        operation: &'static str,
        kind: &'static str,
        name: &str,
    ) -> Self {
        match err {
            kube::Error::Api(response) if response.code == StatusCode::NOT_FOUND.as_u16() => {
                Error::NotFound {
                    kind,
                    name: name.to_string(),
                }
            }
            kube::Error::Api(response)
                if response.code == StatusCode::TOO_MANY_REQUESTS.as_u16() =>
            {
                Error::TooManyRequests {
                    operation,
                    name: name.to_string(),
                    message: response.message,
                }
            }
            err => Error::Api {
                operation,
                name: name.to_string(),
                source: err,
            },
        }
    }

    /// The requested object does not exist (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// The API server is throttling the request (HTTP 429). For evictions this means a PodDisruptionBudget
    /// does not currently allow the Pod to be disrupted.
    pub fn is_too_many_requests(&self) -> bool {
        matches!(self, Error::TooManyRequests { .. })
    }
}
