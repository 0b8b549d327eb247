// Tests for the outbound HTTP contracts, served by a local listener so
// no external endpoint is involved.

use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use copymedia::config::{PlexConfig, RawRule, SeriesRule, validate_series};
use copymedia::meta::NameParser;
use copymedia::notify;
use copymedia::tmdb::{self, TmdbClient};

/// Serve exactly one HTTP request on an ephemeral port. Returns the base
/// URL and a handle resolving to the raw request text.
fn serve_one(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request(&mut stream);
        let response = format!(
            "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
        request
    });
    (format!("http://{addr}"), handle)
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(header_end) = header_end(&data) {
            let headers = String::from_utf8_lossy(&data[..header_end]);
            let content_length = headers
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            if data.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

fn header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

fn rules() -> Vec<SeriesRule> {
    let raw = vec![
        RawRule {
            name: Some("GATE".into()),
            regex: Some(r"(.*)(GATE)( - )(\d{1,})(.*)".into()),
            ..RawRule::default()
        },
        RawRule {
            name: Some("Kimetsu no Yaiba".into()),
            regex: Some(r"(.*)(Kimetsu no Yaiba)( - )(\d{1,})(.*)".into()),
            ..RawRule::default()
        },
    ];
    validate_series(&raw).unwrap()
}

#[test]
fn notification_posts_distinct_names_as_value1() {
    let (url, handle) = serve_one("HTTP/1.1 200 OK", "");
    let rules = rules();
    let matches = vec![
        ("[HorribleSubs] GATE - 24 [1080p].mkv".to_string(), &rules[0]),
        ("[HorribleSubs] GATE - 25 [1080p].mkv".to_string(), &rules[0]),
        (
            "[HorribleSubs] Kimetsu no Yaiba - 26 [1080p].mkv".to_string(),
            &rules[1],
        ),
    ];
    notify::send_match_notification(&matches, &format!("{url}/trigger/ctx/with/key/k")).unwrap();

    let request = handle.join().unwrap();
    assert!(request.starts_with("POST /trigger/ctx/with/key/k "), "{request}");
    // Form-encoded body: duplicates collapse, spaces become '+'.
    assert!(request.contains("value1=GATE+and+Kimetsu+no+Yaiba"), "{request}");
}

#[test]
fn notification_failure_status_is_an_error() {
    let (url, handle) = serve_one("HTTP/1.1 503 Service Unavailable", "");
    let rules = rules();
    let matches = vec![("[HorribleSubs] GATE - 24 [1080p].mkv".to_string(), &rules[0])];
    let result = notify::send_match_notification(&matches, &url);
    handle.join().unwrap();
    assert!(result.is_err());
}

#[test]
fn movie_lookup_sends_query_and_year_and_reads_the_count() {
    let (url, handle) = serve_one("HTTP/1.1 200 OK", r#"{"total_results":3}"#);
    let client = TmdbClient::with_base_url("test-key", &url);
    let parser = NameParser::new().unwrap();

    assert!(tmdb::is_movie(
        "Brave.2012.1080p.BluRay.x264.AC3-HDChina",
        &parser,
        Some(&client)
    ));

    let request = handle.join().unwrap();
    assert!(request.starts_with("GET /search/movie?"), "{request}");
    assert!(request.contains("api_key=test-key"), "{request}");
    assert!(request.contains("query=Brave"), "{request}");
    assert!(request.contains("year=2012"), "{request}");
}

#[test]
fn movie_lookup_with_zero_results_is_not_a_movie() {
    let (url, handle) = serve_one("HTTP/1.1 200 OK", r#"{"total_results":0}"#);
    let client = TmdbClient::with_base_url("test-key", &url);
    let parser = NameParser::new().unwrap();

    assert!(!tmdb::is_movie(
        "Brave.2012.1080p.BluRay.x264.AC3-HDChina",
        &parser,
        Some(&client)
    ));
    handle.join().unwrap();
}

#[test]
fn movie_lookup_failure_fails_open_to_not_a_movie() {
    // Nothing is listening here, so the request fails outright.
    let client = TmdbClient::with_base_url("test-key", "http://127.0.0.1:9");
    let parser = NameParser::new().unwrap();
    assert!(!tmdb::is_movie(
        "Brave.2012.1080p.BluRay.x264.AC3-HDChina",
        &parser,
        Some(&client)
    ));
}

#[test]
fn rescan_requests_hit_the_section_refresh_path() {
    let (url, handle) = serve_one("HTTP/1.1 200 OK", "");
    let plex = PlexConfig {
        url,
        section: "7".to_string(),
    };
    let destinations: BTreeSet<PathBuf> =
        [PathBuf::from("/media/series/GATE")].into_iter().collect();

    notify::trigger_rescans(&plex, &destinations);

    let request = handle.join().unwrap();
    assert!(request.starts_with("GET /library/sections/7/refresh?"), "{request}");
    assert!(request.contains("path=%2Fmedia%2Fseries%2FGATE"), "{request}");
}

#[test]
fn rescan_failures_do_not_abort_the_batch() {
    let plex = PlexConfig {
        url: "http://127.0.0.1:9".to_string(),
        section: "7".to_string(),
    };
    let destinations: BTreeSet<PathBuf> = [PathBuf::from("/media/series/GATE"), PathBuf::from("/media/series/Slime")]
        .into_iter()
        .collect();
    // Every request fails; the batch still runs to completion.
    notify::trigger_rescans(&plex, &destinations);
}
