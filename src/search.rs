//! ISAPI log search (CMSearch) request construction and the end-to-end dump.
//!
//! A log dump is one round trip:
//! 1. POST a `CMSearchDescription` to `/ISAPI/ContentMgmt/logSearch`
//!    (digest-authenticated, see [`crate::client`]).
//! 2. Write the `CMSearchResult` body verbatim to the output target.
//!
//! Only the first result page is fetched. When the device reports more
//! rows than fit in `maxResults`, the payload is still written unmodified
//! and a warning is logged.

use bytes::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Credentials;
use crate::client::IsapiClient;
use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::output::OutputTarget;
use crate::timespan::TimeSpan;

/// Log search resource on the device.
pub const LOG_SEARCH_PATH: &str = "/ISAPI/ContentMgmt/logSearch";

/// CMSearch `metaId` selecting the device's standard log store.
pub const LOG_META_ID: &str = "log.std-cgi.com";

// ── Request ──────────────────────────────────────────────────────────

/// One CMSearch job description.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    search_id: Uuid,
    span: TimeSpan,
    max_results: u32,
}

impl SearchRequest {
    /// A request with a fresh random search ID.
    pub fn new(span: TimeSpan, max_results: u32) -> Self {
        SearchRequest::with_search_id(Uuid::new_v4(), span, max_results)
    }

    /// A request with a caller-chosen search ID.
    pub fn with_search_id(search_id: Uuid, span: TimeSpan, max_results: u32) -> Self {
        SearchRequest {
            search_id,
            span,
            max_results,
        }
    }

    /// The CMSearch job ID.
    pub fn search_id(&self) -> Uuid {
        self.search_id
    }

    /// The window being searched.
    pub fn span(&self) -> &TimeSpan {
        &self.span
    }

    /// Renders the `CMSearchDescription` body.
    ///
    /// Every interpolated value is a UUID, a formatted timestamp or an
    /// integer, so no XML escaping is needed.
    pub fn to_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<CMSearchDescription>
    <searchID>{search_id}</searchID>
    <metaId>{meta_id}</metaId>
    <timeSpanList>
        <timeSpan>
            <startTime>{start}</startTime>
            <endTime>{end}</endTime>
        </timeSpan>
    </timeSpanList>
    <maxResults>{max_results}</maxResults>
</CMSearchDescription>"#,
            search_id = self.search_id,
            meta_id = LOG_META_ID,
            start = self.span.wire_start(),
            end = self.span.wire_end(),
            max_results = self.max_results,
        )
    }
}

// ── Result diagnostics ───────────────────────────────────────────────

/// What a byte scan of a `CMSearchResult` reveals. Used for log messages
/// only; the payload itself is never parsed or altered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSummary {
    /// Number of `<searchMatchItem` elements.
    pub matches: usize,
    /// `responseStatusStrg` was `MORE`: rows beyond this page exist.
    pub more: bool,
}

impl SearchSummary {
    /// Scans a raw payload.
    pub fn scan(payload: &[u8]) -> Self {
        const ITEM: &[u8] = b"<searchMatchItem";
        const STATUS: &[u8] = b"<responseStatusStrg>";

        let matches = count_occurrences(payload, ITEM);
        let more = find(payload, STATUS)
            .map(|pos| &payload[pos + STATUS.len()..])
            .is_some_and(|rest| rest.trim_ascii_start().starts_with(b"MORE"));

        SearchSummary { matches, more }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .filter(|window| *window == needle)
        .count()
}

// ── Orchestration ────────────────────────────────────────────────────

/// Runs one log search and returns the raw response body.
///
/// # Errors
///
/// Everything [`IsapiClient::post_xml`] returns, plus
/// `FetchError::EmptyPayload` when the device answers 2xx with no body.
pub async fn fetch_logs(
    client: &IsapiClient,
    credentials: &Credentials,
    request: &SearchRequest,
) -> Result<Bytes> {
    debug!(
        search_id = %request.search_id(),
        start = %request.span().wire_start(),
        end = %request.span().wire_end(),
        "built log search request"
    );
    let payload = client
        .post_xml(LOG_SEARCH_PATH, &request.to_xml(), credentials)
        .await?;

    if payload.is_empty() {
        return Err(FetchError::EmptyPayload);
    }
    Ok(payload)
}

/// Fetches the logs for `span` and writes them to `output`.
///
/// Nothing is written unless the fetch succeeded. Returns the number of
/// bytes written.
pub async fn run_log_search(
    client: &IsapiClient,
    credentials: &Credentials,
    span: &TimeSpan,
    config: &FetchConfig,
    output: &OutputTarget,
) -> Result<usize> {
    info!(host = %client.base_url(), window = %span, "searching device logs");
    let request = SearchRequest::new(*span, config.max_results);
    let payload = fetch_logs(client, credentials, &request).await?;

    let summary = SearchSummary::scan(&payload);
    info!(
        bytes = payload.len(),
        matches = summary.matches,
        "log search complete"
    );
    if summary.more {
        warn!(
            max_results = config.max_results,
            "device reports more results than were returned; only the first page was saved. \
             Narrow the time window or raise --batch"
        );
    }

    output.write_payload(&payload)?;
    info!(destination = %output, bytes = payload.len(), "raw log payload written");
    Ok(payload.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week() -> TimeSpan {
        TimeSpan::parse("2025-05-01", "2025-05-08").unwrap()
    }

    // ── Request body ─────────────────────────────────────────────────

    #[test]
    fn body_carries_window_and_limits() {
        let id = Uuid::parse_str("6c1f3c2e-8a53-4d4f-9d6c-3f2b1a0e9d7c").unwrap();
        let xml = SearchRequest::with_search_id(id, week(), 256).to_xml();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(xml.contains("<searchID>6c1f3c2e-8a53-4d4f-9d6c-3f2b1a0e9d7c</searchID>"));
        assert!(xml.contains("<metaId>log.std-cgi.com</metaId>"));
        assert!(xml.contains("<startTime>2025-05-01T00:00:00Z</startTime>"));
        assert!(
            xml.contains("<endTime>2025-05-09T00:00:00Z</endTime>"),
            "inclusive end of 2025-05-08 is sent as the next midnight"
        );
        assert!(xml.contains("<maxResults>256</maxResults>"));
        assert!(
            !xml.contains("searchResultPostion"),
            "only the first page is requested"
        );
    }

    #[test]
    fn each_request_gets_a_fresh_search_id() {
        let a = SearchRequest::new(week(), 100);
        let b = SearchRequest::new(week(), 100);
        assert_ne!(a.search_id(), b.search_id());
    }

    // ── Summary scan ─────────────────────────────────────────────────

    #[test]
    fn summary_counts_match_items() {
        let payload = br#"<CMSearchResult>
            <responseStatusStrg>OK</responseStatusStrg>
            <numOfMatches>2</numOfMatches>
            <matchList>
                <searchMatchItem><logDescriptor/></searchMatchItem>
                <searchMatchItem><logDescriptor/></searchMatchItem>
            </matchList>
        </CMSearchResult>"#;
        assert_eq!(
            SearchSummary::scan(payload),
            SearchSummary {
                matches: 2,
                more: false
            }
        );
    }

    #[test]
    fn summary_detects_truncated_page() {
        let payload = b"<CMSearchResult><responseStatusStrg>MORE</responseStatusStrg>\
            <searchMatchItem/></CMSearchResult>";
        assert!(SearchSummary::scan(payload).more);
    }

    #[test]
    fn summary_of_opaque_payload_is_empty() {
        let summary = SearchSummary::scan(b"<Log>...</Log>");
        assert_eq!(summary.matches, 0);
        assert!(!summary.more);
    }

    #[test]
    fn summary_handles_tiny_payloads() {
        assert_eq!(SearchSummary::scan(b"x").matches, 0);
        assert!(!SearchSummary::scan(b"").more);
    }
}
