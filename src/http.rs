// Shared blocking HTTP plumbing for the embedding, language model and
// vector database clients

use std::time::Duration;
use tracing::{debug, error, warn};

use crate::ChatError;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
const DEFAULT_BACKOFF_MS: u64 = 1000;

/// Failure of a single logical request after retries were exhausted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The server answered with a non-success status
    Status(u16),
    /// The request never produced a response (DNS, connect, timeout, IO)
    Transport(String),
    /// Anything ureq reports that retrying will not fix
    Fatal(String),
}

impl std::fmt::Display for RequestError {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(status) => write!(f, "HTTP {}", status),
            Self::Transport(message) => write!(f, "transport error: {}", message),
            Self::Fatal(message) => write!(f, "request failed: {}", message),
        }
    }
}

impl From<RequestError> for ChatError {
    #[inline]
    fn from(error: RequestError) -> Self {
        Self::Network(error.to_string())
    }
}

/// A `ureq` agent with a global timeout and bounded exponential-backoff retries
#[derive(Debug, Clone)]
pub struct RetryingAgent {
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff_ms: u64,
}

impl RetryingAgent {
    #[inline]
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// GET `url` and return the response body
    #[inline]
    pub fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, RequestError> {
        self.execute(url, || {
            let mut request = self.agent.get(url);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    /// Send `body` as JSON with the given method and return the response body
    #[inline]
    pub fn send_json(
        &self,
        method: JsonMethod,
        url: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Result<String, RequestError> {
        self.execute(url, || {
            let mut request = match method {
                JsonMethod::Post => self.agent.post(url),
                JsonMethod::Put => self.agent.put(url),
            };
            request = request.header("Content-Type", "application/json");
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    /// DELETE `url` and return the response body
    #[inline]
    pub fn delete(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, RequestError> {
        self.execute(url, || {
            let mut request = self.agent.delete(url);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn execute<F>(&self, target: &str, mut request_fn: F) -> Result<String, RequestError>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let failure = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 || *status == 429 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                RequestError::Status(*status)
                            } else {
                                debug!("Client error (status {}), not retrying", status);
                                return Err(RequestError::Status(*status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            RequestError::Transport(error.to_string())
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            return Err(RequestError::Fatal(error.to_string()));
                        }
                    };

                    last_error = Some(failure);

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE
                            .saturating_pow(attempt - 1)
                            .saturating_mul(self.backoff_ms);
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", target);

        Err(last_error
            .unwrap_or_else(|| RequestError::Fatal("request failed after retries".to_string())))
    }
}

/// HTTP methods that carry a JSON body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonMethod {
    Post,
    Put,
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_agent(attempts: u32) -> RetryingAgent {
        RetryingAgent::new(Duration::from_secs(5))
            .with_retry_attempts(attempts)
            .with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn get_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header("api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;

        let agent = fast_agent(1);
        let body = agent
            .get(&format!("{}/ping", server.uri()), &[("api-key", "secret")])
            .expect("request should succeed");
        assert_eq!(body, "pong");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let agent = fast_agent(3);
        let result = agent.send_json(
            JsonMethod::Post,
            &format!("{}/missing", server.uri()),
            &[],
            "{}",
        );
        assert_eq!(result, Err(RequestError::Status(404)));
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let agent = fast_agent(2);
        let result = agent.send_json(
            JsonMethod::Put,
            &format!("{}/flaky", server.uri()),
            &[],
            "{}",
        );
        assert_eq!(result, Err(RequestError::Status(503)));
    }

    #[test]
    fn request_error_becomes_network_error() {
        let error: ChatError = RequestError::Status(502).into();
        assert_eq!(error.to_string(), "Network error: HTTP 502");
    }
}
