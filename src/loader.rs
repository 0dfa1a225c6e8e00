use crate::errors::{DashboardError, Result};
use crate::preparer::{prepare, PrepareReport};
use crate::types::{Dataset, RawTable};
use csv::ReaderBuilder;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Regional accounts 2012-2022 on data.gouv.fr.
pub const DEFAULT_URL: &str =
    "https://www.data.gouv.fr/fr/datasets/r/3f360fdd-39e5-4dda-9553-3d2a00ceabae";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the semicolon-delimited payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Http { url: String, timeout: Duration },
    File(PathBuf),
}

impl Default for Source {
    fn default() -> Self {
        Source::Http {
            url: DEFAULT_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Source {
    pub fn origin(&self) -> String {
        match self {
            Source::Http { url, .. } => url.clone(),
            Source::File(path) => path.display().to_string(),
        }
    }

    /// Fetch the raw payload. One attempt, no retry.
    pub fn fetch(&self) -> Result<Vec<u8>> {
        match self {
            Source::Http { url, timeout } => {
                info!(%url, timeout_secs = timeout.as_secs(), "fetching dataset");
                let client = reqwest::blocking::Client::builder()
                    .timeout(*timeout)
                    .build()
                    .map_err(|e| DashboardError::unavailable(url.as_str(), e))?;
                let response = client
                    .get(url)
                    .send()
                    .map_err(|e| DashboardError::unavailable(url.as_str(), e))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(DashboardError::unavailable(
                        url.as_str(),
                        format!("HTTP error: {}", status),
                    ));
                }
                let body = response
                    .bytes()
                    .map_err(|e| DashboardError::unavailable(url.as_str(), e))?;
                Ok(body.to_vec())
            }
            Source::File(path) => {
                info!(path = %path.display(), "reading dataset");
                std::fs::read(path).map_err(|e| DashboardError::unavailable(self.origin(), e))
            }
        }
    }
}

/// Parse a semicolon-delimited payload whose first row is the header.
pub fn parse_table(bytes: &[u8], origin: &str) -> Result<RawTable> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| DashboardError::unavailable(origin, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(DashboardError::unavailable(origin, "payload has no header row"));
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        rows.push(result.map_err(|e| DashboardError::unavailable(origin, e))?);
    }
    Ok(RawTable { headers, rows })
}

/// Fetch, parse and prepare in one go.
pub fn load(source: &Source) -> Result<(Dataset, PrepareReport)> {
    let origin = source.origin();
    let bytes = source.fetch()?;
    let raw = parse_table(&bytes, &origin)?;
    info!(rows = raw.rows.len(), columns = raw.headers.len(), "parsed payload");
    prepare(&raw)
}

#[derive(Debug)]
pub struct Loaded {
    pub dataset: Arc<Dataset>,
    pub report: Option<PrepareReport>,
}

/// One-time load of a [`Source`], shared by reference afterwards.
///
/// A failed load leaves the cache empty; whether to call `get` again is up
/// to the caller.
#[derive(Debug)]
pub struct DatasetCache {
    source: Option<Source>,
    cell: OnceCell<Loaded>,
}

impl DatasetCache {
    pub fn new(source: Source) -> Self {
        DatasetCache {
            source: Some(source),
            cell: OnceCell::new(),
        }
    }

    /// A cache that never loads and always hands out `dataset`.
    pub fn preloaded(dataset: Dataset) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(Loaded {
            dataset: Arc::new(dataset),
            report: None,
        });
        DatasetCache { source: None, cell }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> Result<&Loaded> {
        self.cell.get_or_try_init(|| {
            let source = self
                .source
                .as_ref()
                .ok_or_else(|| DashboardError::unavailable("cache", "no source configured"))?;
            match load(source) {
                Ok((dataset, report)) => Ok(Loaded {
                    dataset: Arc::new(dataset),
                    report: Some(report),
                }),
                Err(e) => {
                    warn!(origin = %source.origin(), error = %e, "dataset load failed");
                    Err(e)
                }
            }
        })
    }

    pub fn dataset(&self) -> Result<Arc<Dataset>> {
        Ok(Arc::clone(&self.get()?.dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    const CSV: &str = "exer;reg_name;agregat;montant\n2020;A;TVA;10\n2021;B;Frais de personnel;5\n";

    #[test]
    fn parses_semicolon_payload_with_bom() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(CSV.as_bytes());
        let raw = parse_table(&bytes, "test").unwrap();
        assert_eq!(raw.headers, vec!["exer", "reg_name", "agregat", "montant"]);
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.rows[1].get(2), Some("Frais de personnel"));
    }

    #[test]
    fn empty_payload_is_unavailable() {
        let err = parse_table(b"", "test").unwrap_err();
        assert!(matches!(err, DashboardError::DataUnavailable { .. }));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let source = Source::File(PathBuf::from("/definitely/not/here.csv"));
        let err = load(&source).unwrap_err();
        assert!(matches!(err, DashboardError::DataUnavailable { .. }));
    }

    fn http_source(listener: &TcpListener, timeout: Duration) -> Source {
        Source::Http {
            url: format!("http://{}/comptes.csv", listener.local_addr().unwrap()),
            timeout,
        }
    }

    #[test]
    fn http_error_status_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let source = http_source(&listener, Duration::from_secs(5));
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            stream
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .unwrap();
        });
        match load(&source) {
            Err(DashboardError::DataUnavailable { origin, reason }) => {
                assert_eq!(origin, source.origin());
                assert!(reason.contains("500"), "unexpected reason: {reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn http_server_that_never_answers_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let source = http_source(&listener, Duration::from_millis(300));
        let err = source.fetch().unwrap_err();
        assert!(matches!(err, DashboardError::DataUnavailable { .. }));
        drop(listener);
    }

    #[test]
    fn http_connection_refused_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let source = http_source(&listener, Duration::from_secs(5));
        drop(listener);
        let cache = DatasetCache::new(source);
        assert!(matches!(cache.get(), Err(DashboardError::DataUnavailable { .. })));
        assert!(!cache.is_loaded());
    }

    #[test]
    fn cache_loads_once_and_returns_same_dataset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();
        let cache = DatasetCache::new(Source::File(file.path().to_path_buf()));
        assert!(!cache.is_loaded());

        let first = cache.dataset().unwrap();
        // Changing the file must not trigger a re-read.
        std::fs::write(file.path(), "garbage").unwrap();
        let second = cache.dataset().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 2);
        assert_eq!(cache.get().unwrap().report.as_ref().unwrap().kept_rows, 2);
    }

    #[test]
    fn failed_load_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("later.csv");
        let cache = DatasetCache::new(Source::File(path.clone()));
        assert!(cache.get().is_err());
        assert!(!cache.is_loaded());
        std::fs::write(&path, CSV).unwrap();
        assert_eq!(cache.dataset().unwrap().len(), 2);
    }

    #[test]
    fn preloaded_cache_skips_loading() {
        let cache = DatasetCache::preloaded(Dataset::default());
        assert!(cache.is_loaded());
        assert!(cache.dataset().unwrap().is_empty());
        assert!(cache.get().unwrap().report.is_none());
    }
}
