use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use assert_matches::assert_matches;

use molgen_client::app::{App, Cancellation, ProgressEvent, ProgressSink};
use molgen_client::domain::UploadedStructure;
use molgen_client::error::MolgenError;
use molgen_client::filters::FilterConfig;
use molgen_client::service::GenerationHttpClient;
use molgen_client::state::MoleculeStore;

const RECEPTOR: &str = "ATOM      1  N   MET A   1      38.198  19.582  28.222  1.00 40.00           N\n";

struct Quiet;

impl ProgressSink for Quiet {
    fn event(&self, _event: ProgressEvent) {}
}

/// Accepts one connection, reads the whole request, answers with `status`
/// and `body`, and hands back the raw request text.
fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!(
        "http://{}/generate_molecules/",
        listener.local_addr().unwrap()
    );
    let status = status.to_string();
    let body = body.to_string();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request(&mut stream);
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/x-ndjson\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        String::from_utf8_lossy(&request).into_owned()
    });
    (endpoint, handle)
}

fn read_request(stream: &mut impl Read) -> Vec<u8> {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = find(&data, b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&data[..end]).to_ascii_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let chunked = headers.contains("transfer-encoding: chunked");
            if chunked && data.ends_with(b"0\r\n\r\n") {
                return data;
            }
            if !chunked && data.len() >= end + 4 + length {
                return data;
            }
        }
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            return data;
        }
        data.extend_from_slice(&chunk[..n]);
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn structures() -> Vec<UploadedStructure> {
    vec![UploadedStructure::new("r.pdb", RECEPTOR).unwrap()]
}

fn client(endpoint: &str) -> GenerationHttpClient {
    GenerationHttpClient::new(endpoint, Duration::from_secs(10)).unwrap()
}

#[test]
fn multipart_request_and_streamed_records() {
    let line = r#"{"status":"success","molecule_number":1,"smiles":"CCO","descriptors":{"NumAtoms":3}}"#;
    let body = format!("{line}\n{line}\n{{\"status\":\"failed\",\"molecule_number\":2}}\n");
    let (endpoint, server) = serve_once("200 OK", &body);
    let store = MoleculeStore::new();
    let app = App::new(store.clone(), client(&endpoint));

    let outcome = app
        .run(&structures(), &FilterConfig::default(), &Cancellation::new(), &Quiet)
        .unwrap();

    assert_eq!(outcome.accepted, 1);
    assert_eq!(outcome.duplicates, 1);
    assert_eq!(outcome.rejected, 1);
    assert_eq!(store.len(), 1);

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /generate_molecules/ HTTP/1.1"));
    assert!(request.contains("multipart/form-data; boundary="));
    assert_eq!(request.matches("name=\"protein_file\"").count(), 1);
    assert!(request.contains("name=\"protein_file\"; filename=\"r.pdb\""));
    assert!(request.contains("chemical/x-pdb"));
    assert!(request.contains(RECEPTOR.trim_end()));
    assert!(request.contains("name=\"num_molecules\"\r\n\r\n10\r\n"));
    assert!(request.contains("name=\"mw_min\"\r\n\r\n250\r\n"));
    assert!(request.contains("name=\"mw_max\"\r\n\r\n750\r\n"));
    assert!(request.contains("name=\"logp_max\"\r\n\r\n6\r\n"));
    assert!(request.contains("name=\"num_aromatic_rings_min\"\r\n\r\n0\r\n"));
}

#[test]
fn error_status_maps_to_service_status() {
    let (endpoint, server) = serve_once("500 Internal Server Error", "boom");
    let store = MoleculeStore::new();
    let app = App::new(store.clone(), client(&endpoint));

    let result = app.run(&structures(), &FilterConfig::default(), &Cancellation::new(), &Quiet);

    assert_matches!(
        result,
        Err(MolgenError::ServiceStatus { status: 500, ref message }) if message == "boom"
    );
    server.join().unwrap();
    let state = store.snapshot();
    assert!(!state.loading);
    assert!(state.records.is_empty());
    assert!(state.error.is_some());
}

#[test]
fn unreachable_endpoint_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}/generate_molecules/", listener.local_addr().unwrap());
    drop(listener);

    let store = MoleculeStore::new();
    let app = App::new(store.clone(), client(&endpoint));
    let result = app.run(&structures(), &FilterConfig::default(), &Cancellation::new(), &Quiet);

    assert_matches!(result, Err(MolgenError::ServiceHttp(_)));
    assert!(store.snapshot().error.is_some());
}
