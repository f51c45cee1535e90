use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use std::thread;
use std::time::Duration;

use crate::algorithm::AlgorithmInstance;
use crate::catalog::AlgorithmCatalog;
use crate::config::load_config;
use crate::error::{SdmError, format_service_error};
use crate::experiment::ExperimentRequest;
use crate::hint::{SearchHit, check_query, parse_hits};
use crate::query::{ExperimentQuery, parse_item_count};
use crate::util::{backoff, retriable_status, split_key_basic, urljoin};

const CATALOG_PATH: &str = "clients/algorithms.xml";
const EXPERIMENTS_PATH: &str = "services/sdm/experiments/";
const HINT_PATH: &str = "hint/species";
const ARCHIVE_PATH: &str = "hint/archive";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, typically `http://lifemapper.org`.
    pub url: String,
    /// Optional `<user>:<password>`; anonymous access when absent.
    pub key: Option<String>,
    /// Whether to verify TLS certificates.
    pub verify: bool,
}

/// Blocking client for the Lifemapper SDM services.
///
/// The algorithm catalog is loaded once when the client is built and kept for
/// the life of the client.
#[derive(Debug, Clone)]
pub struct SdmClient {
    url: String,
    key: Option<String>,

    timeout: Duration,
    retry_max: usize,
    sleep_max: Duration,

    catalog: AlgorithmCatalog,
    http: HttpClient,
}

impl SdmClient {
    /// Creates a client using environment variables and/or `.lmclientrc`.
    ///
    /// This is equivalent to `SdmClient::new(None, None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `url`/`key` arguments
    /// - environment variables `LMCLIENT_URL` / `LMCLIENT_KEY`
    /// - config file from `LMCLIENT_RC` or `.lmclientrc`
    /// - the public server, anonymously
    ///
    /// The client starts with the algorithm catalog bundled in the crate; see
    /// [`SdmClient::with_remote_catalog`].
    pub fn new(url: Option<String>, key: Option<String>, verify: Option<bool>) -> Result<Self> {
        let cfg = load_config(url, key, verify)?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("sdmclient-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("sdmclient-rs")),
        );

        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(60));

        if !cfg.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            url: cfg.url,
            key: cfg.key,
            timeout: Duration::from_secs(60),
            retry_max: 5,
            sleep_max: Duration::from_secs(30),
            catalog: AlgorithmCatalog::embedded()?,
            http,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_max(mut self, retry_max: usize) -> Self {
        self.retry_max = retry_max.max(1);
        self
    }

    pub fn with_sleep_max(mut self, sleep_max: Duration) -> Self {
        self.sleep_max = sleep_max;
        self
    }

    pub fn with_catalog(mut self, catalog: AlgorithmCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replaces the bundled catalog with the one published by the server.
    ///
    /// If the server catalog cannot be fetched or parsed, the bundled catalog
    /// is kept and a warning is logged.
    pub fn with_remote_catalog(mut self) -> Self {
        match self.fetch_catalog() {
            Ok(catalog) => self.catalog = catalog,
            Err(e) => log::warn!("using bundled algorithm catalog: {:#}", e),
        }
        self
    }

    /// Downloads and parses the server's algorithm catalog.
    pub fn fetch_catalog(&self) -> Result<AlgorithmCatalog> {
        let url = urljoin(&self.url, CATALOG_PATH);
        let xml = self.api_text("GET", &url, &[], None)?;
        AlgorithmCatalog::from_xml(&xml)
            .with_context(|| format!("invalid algorithm catalog from {}", url))
    }

    pub fn server(&self) -> &str {
        &self.url
    }

    pub fn catalog(&self) -> &AlgorithmCatalog {
        &self.catalog
    }

    pub fn list_algorithm_codes(&self) -> Vec<&str> {
        self.catalog.list_algorithm_codes()
    }

    /// A new algorithm instance with default parameter values.
    pub fn get_algorithm(&self, code: &str) -> Result<AlgorithmInstance, SdmError> {
        self.catalog.get_algorithm_instance(code)
    }

    /// Validates and submits a new experiment, returning the service's XML
    /// description of the created experiment.
    ///
    /// Validation failures are returned as [`SdmError`] before anything is
    /// sent.
    pub fn post_experiment(&self, request: &ExperimentRequest) -> Result<String> {
        request.validate()?;

        let url = urljoin(&self.url, EXPERIMENTS_PATH);
        let body = request.to_xml();
        log::info!(
            "submitting {} experiment for occurrence set {} ({} projection(s))",
            request.algorithm.code(),
            request.occurrence_set_id,
            request.projection_scenarios.len()
        );
        self.api_text("POST", &url, &[], Some(&body))
    }

    /// The service's XML document for one experiment.
    pub fn get_experiment(&self, id: i64) -> Result<String> {
        self.api_text("GET", &self.experiment_url(id), &[], None)
    }

    pub fn delete_experiment(&self, id: i64) -> Result<String> {
        log::info!("deleting experiment {}", id);
        self.api_text("DELETE", &self.experiment_url(id), &[], None)
    }

    /// One page of experiments matching `query`, as returned by the service.
    pub fn list_experiments(&self, query: &ExperimentQuery) -> Result<String> {
        let url = urljoin(&self.url, EXPERIMENTS_PATH);
        self.api_text("GET", &url, &query.to_params(true), None)
    }

    /// Number of experiments matching `query`. Paging fields are ignored.
    pub fn count_experiments(&self, query: &ExperimentQuery) -> Result<u64> {
        let url = urljoin(&self.url, EXPERIMENTS_PATH);
        let xml = self.api_text("GET", &url, &query.to_params(false), None)?;
        parse_item_count(&xml).with_context(|| format!("unexpected count reply from {}", url))
    }

    fn experiment_url(&self, id: i64) -> String {
        format!("{}{}", urljoin(&self.url, EXPERIMENTS_PATH), id)
    }

    /// Searches occurrence sets whose species name starts with `query`.
    ///
    /// `query` must have at least three characters.
    pub fn hint(&self, query: &str, max_returned: Option<usize>) -> Result<Vec<SearchHit>> {
        check_query(query)?;

        let url = self.search_url(HINT_PATH, query)?;

        let mut params = vec![("format", "json".to_string())];
        if let Some(max) = max_returned {
            params.push(("maxReturned", max.to_string()));
        }

        let text = self.api_text("GET", url.as_str(), &params, None)?;
        parse_hits(&text, max_returned)
    }

    /// Searches the public archive for models and projections of species
    /// matching `query`, returning the service's XML reply.
    pub fn search_archive(&self, query: &str, max_returned: Option<usize>) -> Result<String> {
        let url = self.search_url(ARCHIVE_PATH, query)?;
        let params: Vec<_> = max_returned
            .map(|max| ("maxReturned", max.to_string()))
            .into_iter()
            .collect();
        self.api_text("GET", url.as_str(), &params, None)
    }

    fn search_url(&self, path: &str, query: &str) -> Result<Url> {
        let mut url = Url::parse(&urljoin(&self.url, path))
            .with_context(|| format!("invalid server url {}", self.url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("server url cannot be a base: {}", self.url))?
            .push(query.trim());
        Ok(url)
    }

    fn apply_auth(&self, req: RequestBuilder) -> RequestBuilder {
        match self.key.as_deref().and_then(split_key_basic) {
            Some((u, p)) => req.basic_auth(u, Some(p)),
            None => req,
        }
    }

    fn api_text(
        &self,
        method: &str,
        url: &str,
        query: &[(&str, String)],
        body: Option<&str>,
    ) -> Result<String> {
        log::debug!("{} {}", method, url);
        // A POST may have been applied even when the reply is an error, so
        // it is only resent when the connection was never established.
        let idempotent = method != "POST";
        let resp = self.robust_request(idempotent, || {
            let req = match method {
                "GET" => self.http.get(url),
                "DELETE" => self.http.delete(url),
                _ => self.http.post(url),
            };
            let mut req = self.apply_auth(req).timeout(self.timeout).query(query);
            if let Some(body) = body {
                req = req
                    .header(CONTENT_TYPE, "application/xml")
                    .body(body.to_string());
            }
            req.send()
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(format_service_error(status, url, &text));
        }
        resp.text()
            .with_context(|| format!("failed to read response body (url={})", url))
    }

    fn robust_request<F>(&self, idempotent: bool, mut f: F) -> Result<Response>
    where
        F: FnMut() -> std::result::Result<Response, reqwest::Error>,
    {
        let mut tries = 0usize;
        let mut sleep = Duration::from_secs(1).min(self.sleep_max);
        loop {
            match f() {
                Ok(resp) => {
                    let code = resp.status().as_u16();
                    if idempotent && retriable_status(code) {
                        tries += 1;
                        if tries >= self.retry_max {
                            return Ok(resp);
                        }
                        log::warn!(
                            "HTTP {} from server, retrying in {:?} ({}/{})",
                            code,
                            sleep,
                            tries,
                            self.retry_max
                        );
                        thread::sleep(sleep);
                        sleep = backoff(sleep, self.sleep_max);
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    tries += 1;
                    if tries >= self.retry_max || !(idempotent || err.is_connect()) {
                        return Err(err).context("request to server failed");
                    }
                    log::warn!(
                        "request failed ({}), retrying in {:?} ({}/{})",
                        err,
                        sleep,
                        tries,
                        self.retry_max
                    );
                    thread::sleep(sleep);
                    sleep = backoff(sleep, self.sleep_max);
                }
            }
        }
    }
}
