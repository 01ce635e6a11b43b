//! Document fetcher
//!
//! Retrieves the full resource body as one binary buffer. The downstream
//! decoder needs the complete byte stream, and container-level permission
//! metadata is stripped by re-ingesting raw bytes rather than trusting a
//! restricted native viewer. No retry at this layer; retries belong to the
//! caller.

use std::fs;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("empty response body")]
    EmptyResponse,
}

pub trait Fetch {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking fetcher: `http(s)://` locators go through reqwest, anything else
/// is read from the local filesystem.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self { client: reqwest::blocking::Client::new() }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = if locator.starts_with("http://") || locator.starts_with("https://") {
            let response = self
                .client
                .get(locator)
                .send()
                .and_then(|response| response.error_for_status())
                .map_err(|err| FetchError::Network(err.to_string()))?;

            response
                .bytes()
                .map_err(|err| FetchError::Network(err.to_string()))?
                .to_vec()
        } else {
            fs::read(locator).map_err(|err| {
                FetchError::Network(format!("failed to read {locator}: {err}"))
            })?
        };

        if bytes.is_empty() {
            return Err(FetchError::EmptyResponse);
        }

        log::debug!("fetched {} bytes from {locator}", bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn local_path_is_read_from_the_filesystem() {
        let dir = std::env::temp_dir();
        let path = dir.join("vellum-loader-test.bin");
        let mut file = fs::File::create(&path).expect("temp file should be created");
        file.write_all(b"%PDF-1.5 stub").expect("write should succeed");
        drop(file);

        let fetcher = HttpFetcher::new();
        let bytes = fetcher
            .fetch(path.to_str().expect("temp path should be utf-8"))
            .expect("fetch should succeed");
        assert_eq!(bytes, b"%PDF-1.5 stub");

        fs::remove_file(&path).expect("cleanup should succeed");
    }

    #[test]
    fn missing_local_path_is_a_network_error() {
        let fetcher = HttpFetcher::new();
        let err = fetcher
            .fetch("/nonexistent/vellum/cert.pdf")
            .expect_err("missing file should fail");

        assert!(matches!(err, FetchError::Network(_)));
    }

    #[test]
    fn zero_length_body_is_an_empty_response_error() {
        let dir = std::env::temp_dir();
        let path = dir.join("vellum-loader-empty.bin");
        fs::File::create(&path).expect("temp file should be created");

        let fetcher = HttpFetcher::new();
        let err = fetcher
            .fetch(path.to_str().expect("temp path should be utf-8"))
            .expect_err("empty body should fail");
        assert!(matches!(err, FetchError::EmptyResponse));

        fs::remove_file(&path).expect("cleanup should succeed");
    }
}
