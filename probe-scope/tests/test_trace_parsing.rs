use probe_scope::domain::{ArgType, TraceLogError, Value};
use probe_scope::trace_data::Trace;

#[test]
fn test_parse_trace_from_file_succeeds() {
    let result = Trace::from_file("tests/fixtures/trace.json");
    assert!(result.is_ok(), "Failed to parse trace file: {:?}", result.err());

    let trace = result.unwrap();
    assert!((trace.tsc_rate() - 1e9).abs() < f64::EPSILON);
    assert_eq!(trace.into_entries().count(), 5);
}

#[test]
fn test_parse_trace_resolves_tracepoints() {
    let trace = Trace::from_file("tests/fixtures/trace.json").unwrap();
    let bdev = trace.tracepoint(3).unwrap();
    assert_eq!(bdev.name, "BDEV_IO_START");
    assert_eq!(bdev.args[1].ty, ArgType::Pointer);
    assert!(trace.tracepoint(99).is_none());
}

#[test]
fn test_parse_trace_handles_missing_optional_fields() {
    let trace = Trace::from_file("tests/fixtures/trace.json").unwrap();
    let entries: Vec<_> = trace.into_entries().map(Result::unwrap).collect();

    let last = &entries[4];
    assert_eq!(last.lcore, 2);
    assert_eq!(last.poller, None);
    assert_eq!(last.size, None);
    assert_eq!(last.object_id, None);
    assert_eq!(last.time, None);
    assert_eq!(last.arg("qpair"), Some(&Value::Int(187)));

    let completed = &entries[2];
    assert_eq!(completed.tpoint.name, "RDMA_REQ_COMPLETED");
    assert_eq!(completed.time, Some(500));
    assert_eq!(completed.object_ptr, Some(4096));
}

#[test]
fn test_parse_invalid_file_returns_error() {
    let result = Trace::from_file("nonexistent.json");
    assert!(matches!(result, Err(TraceLogError::Io(_))));
}

#[test]
fn test_parse_invalid_json_returns_error() {
    use std::io::Write;
    use tempfile::NamedTempFile;

    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{{ invalid json").unwrap();

    let result = Trace::from_file(temp_file.path());
    assert!(matches!(result, Err(TraceLogError::Json(_))));
}

#[test]
fn test_unknown_tracepoint_stops_iteration_at_entry() {
    let doc = r#"{"tsc_rate": 1000,
        "tpoints": [{"name": "TCP_REQ_NEW", "id": 1, "new_object": true, "args": []}],
        "entries": [
            {"lcore": 0, "tpoint": 1, "tsc": 1},
            {"lcore": 0, "tpoint": 5, "tsc": 2}
        ]}"#;
    let mut entries = Trace::from_reader(doc.as_bytes()).unwrap().into_entries();
    assert!(entries.next().unwrap().is_ok());
    assert!(matches!(entries.next().unwrap(), Err(TraceLogError::UnknownTracepoint(5))));
    assert!(entries.next().is_none());
}

#[test]
fn test_parse_empty_trace() {
    let trace = Trace::from_reader(r#"{"tsc_rate": 1, "tpoints": [], "entries": []}"#.as_bytes())
        .unwrap();
    assert_eq!(trace.into_entries().count(), 0);
}
