use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use etherparse::PacketBuilder;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("pcapdiff"))
}

fn udp_frame(ttl: u8, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2])
        .ipv4([192, 168, 1, 1], [192, 168, 1, 2], ttl)
        .udp(5000, 6000);
    let mut packet = Vec::<u8>::with_capacity(builder.size(payload.len()));
    builder.write(&mut packet, payload).expect("build frame");
    packet
}

/// Big-endian pcapng with one Ethernet interface; timestamps in microseconds.
fn write_pcapng(path: &Path, packets: &[(u64, Vec<u8>)]) {
    fn block(block_type: u32, body: &[u8]) -> Vec<u8> {
        let total_len = (12 + body.len()) as u32;
        let mut out = Vec::with_capacity(total_len as usize);
        out.extend_from_slice(&block_type.to_be_bytes());
        out.extend_from_slice(&total_len.to_be_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(&total_len.to_be_bytes());
        out
    }

    let mut shb = Vec::new();
    shb.extend_from_slice(&0x1A2B3C4Du32.to_be_bytes());
    shb.extend_from_slice(&1u16.to_be_bytes());
    shb.extend_from_slice(&0u16.to_be_bytes());
    shb.extend_from_slice(&(-1i64).to_be_bytes());

    let mut idb = Vec::new();
    idb.extend_from_slice(&1u16.to_be_bytes());
    idb.extend_from_slice(&0u16.to_be_bytes());
    idb.extend_from_slice(&65535u32.to_be_bytes());

    let mut output = block(0x0A0D0D0A, &shb);
    output.extend_from_slice(&block(1, &idb));
    for (ts_us, data) in packets {
        let mut epb = Vec::new();
        epb.extend_from_slice(&0u32.to_be_bytes());
        epb.extend_from_slice(&((ts_us >> 32) as u32).to_be_bytes());
        epb.extend_from_slice(&(*ts_us as u32).to_be_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_be_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_be_bytes());
        epb.extend_from_slice(data);
        epb.extend(std::iter::repeat_n(0u8, (4 - data.len() % 4) % 4));
        output.extend_from_slice(&block(6, &epb));
    }
    fs::write(path, output).expect("write pcapng");
}

/// Two captures: one identical packet, one with a changed TTL, and one
/// packet only in the first file.
fn differing_pair(dir: &TempDir) -> (PathBuf, PathBuf) {
    let one = dir.path().join("one.pcapng");
    let two = dir.path().join("two.pcapng");
    write_pcapng(
        &one,
        &[
            (1_000_000, udp_frame(64, b"same")),
            (2_000_000, udp_frame(64, b"ttl")),
            (9_000_000, udp_frame(64, b"gone")),
        ],
    );
    write_pcapng(
        &two,
        &[
            (1_000_000, udp_frame(64, b"same")),
            (2_100_000, udp_frame(32, b"ttl")),
        ],
    );
    (one, two)
}

#[test]
fn help_supports_compare_and_diff() {
    cmd().arg("compare").arg("--help").assert().success();
    cmd().arg("diff").arg("--help").assert().success();
}

#[test]
fn missing_input_shows_error_and_hint() {
    let temp = TempDir::new().expect("tempdir");
    let (one, _) = differing_pair(&temp);

    cmd()
        .arg("compare")
        .arg(one)
        .arg(temp.path().join("missing.pcapng"))
        .assert()
        .code(2)
        .stderr(contains("error:").and(contains("hint:")));
}

#[test]
fn non_capture_input_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let (one, _) = differing_pair(&temp);
    let text = temp.path().join("notes.txt");
    fs::write(&text, "not a capture at all, just some words").expect("write text");

    cmd()
        .arg("compare")
        .arg(one)
        .arg(text)
        .assert()
        .failure()
        .stderr(contains("unsupported input format"));
}

#[test]
fn console_summary_reports_breakdown() {
    let temp = TempDir::new().expect("tempdir");
    let (one, two) = differing_pair(&temp);

    cmd()
        .arg("compare")
        .arg(one)
        .arg(two)
        .assert()
        .success()
        .stdout(
            contains("COMPARISON RESULTS")
                .and(contains("Comparison: 3 packets analyzed"))
                .and(contains("Modified packets: 1"))
                .and(contains("Removed packets: 1"))
                .and(contains("ip: ttl")),
        );
}

#[test]
fn quiet_suppresses_console_output() {
    let temp = TempDir::new().expect("tempdir");
    let (one, two) = differing_pair(&temp);

    cmd()
        .arg("compare")
        .arg(one)
        .arg(two)
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicates::str::is_empty());
}

#[test]
fn narrow_window_turns_shifted_packet_into_add_and_remove() {
    let temp = TempDir::new().expect("tempdir");
    let (one, two) = differing_pair(&temp);

    cmd()
        .arg("compare")
        .arg(one)
        .arg(two)
        .arg("-t")
        .arg("0.05")
        .assert()
        .success()
        .stdout(contains("Added packets: 1").and(contains("Removed packets: 2")));
}

#[test]
fn json_export_writes_report() {
    let temp = TempDir::new().expect("tempdir");
    let (one, two) = differing_pair(&temp);
    let report = temp.path().join("out").join("diff.json");

    cmd()
        .arg("compare")
        .arg(one)
        .arg(two)
        .arg("-e")
        .arg("json")
        .arg("-o")
        .arg(&report)
        .arg("--pretty")
        .assert()
        .success()
        .stderr(contains("OK: report written"));

    let json = fs::read_to_string(&report).expect("read report");
    let value: Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(value["report_version"], 1);
    assert_eq!(value["tool"]["name"], "pcapdiff");
    assert_eq!(value["file1"]["filename"], "one.pcapng");
    assert_eq!(value["diff_counts"]["modified"], 1);
    let diffs = value["packet_diffs"].as_array().expect("packet diffs");
    assert_eq!(diffs.len(), 2);
    assert_eq!(diffs[0]["layer_diffs"]["ip"]["ttl"], "modified");
}

#[test]
fn html_and_text_exports_default_to_report_name() {
    let temp = TempDir::new().expect("tempdir");
    let (one, two) = differing_pair(&temp);

    for (format, marker) in [("html", "<table>"), ("txt", "PCAP DIFF REPORT")] {
        cmd()
            .current_dir(temp.path())
            .arg("compare")
            .arg(&one)
            .arg(&two)
            .arg("--export")
            .arg(format)
            .arg("--quiet")
            .assert()
            .success();
        let path = temp.path().join(format!("pcap_diff_report.{format}"));
        let contents = fs::read_to_string(&path).expect("read report");
        assert!(contents.contains(marker), "{format} report missing {marker}");
    }
}

#[test]
fn output_requires_export_format() {
    let temp = TempDir::new().expect("tempdir");
    let (one, two) = differing_pair(&temp);

    cmd()
        .arg("compare")
        .arg(one)
        .arg(two)
        .arg("-o")
        .arg(temp.path().join("report.json"))
        .assert()
        .failure();
}

#[test]
fn report_path_must_differ_from_inputs() {
    let temp = TempDir::new().expect("tempdir");
    let (one, two) = differing_pair(&temp);

    cmd()
        .arg("compare")
        .arg(&one)
        .arg(&two)
        .arg("-e")
        .arg("json")
        .arg("-o")
        .arg(&one)
        .assert()
        .code(2)
        .stderr(contains("report path must differ from inputs"));
}

#[test]
fn fail_on_diff_sets_exit_code() {
    let temp = TempDir::new().expect("tempdir");
    let (one, two) = differing_pair(&temp);

    cmd()
        .arg("compare")
        .arg(&one)
        .arg(&two)
        .arg("--fail-on-diff")
        .arg("--quiet")
        .assert()
        .code(2)
        .stderr(contains("captures differ"));

    cmd()
        .arg("compare")
        .arg(&one)
        .arg(&one)
        .arg("--fail-on-diff")
        .assert()
        .success()
        .stdout(contains("100.0% similar"));
}

#[test]
fn ignore_field_hides_changes() {
    let temp = TempDir::new().expect("tempdir");
    let (one, two) = differing_pair(&temp);

    cmd()
        .arg("compare")
        .arg(one)
        .arg(two)
        .arg("--ignore-field")
        .arg("ip.ttl")
        .assert()
        .success()
        .stdout(contains("Modified packets: 0").and(contains("Unchanged packets: 2")));
}

#[test]
fn glob_input_must_match_one_file() {
    let temp = TempDir::new().expect("tempdir");
    let (one, _) = differing_pair(&temp);
    let pattern = temp.path().join("*.pcapng");

    cmd()
        .arg("compare")
        .arg(&pattern)
        .arg(&one)
        .assert()
        .code(2)
        .stderr(contains("multiple files match pattern"));

    let single = temp.path().join("tw?.pcapng");
    cmd()
        .arg("compare")
        .arg(&one)
        .arg(&single)
        .assert()
        .success();
}

#[test]
fn invalid_time_window_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let (one, two) = differing_pair(&temp);

    cmd()
        .arg("compare")
        .arg(one)
        .arg(two)
        .arg("--time-window=-1")
        .assert()
        .code(2)
        .stderr(contains("error:").and(contains("hint:")));
}
