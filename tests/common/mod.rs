// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;

const BINARY: &str = env!("CARGO_BIN_EXE_linetally");

fn base_command(args: &[&str], isolate_config: bool) -> Command {
    let mut cmd = Command::new(BINARY);
    if isolate_config {
        cmd.arg("--ignore-config");
    }
    cmd.args(args).env("NO_EMOJI", "1");
    cmd
}

fn collect(output: std::process::Output) -> (String, String, i32) {
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Run linetally with given arguments and input via stdin
pub fn run_linetally_with_input(args: &[&str], input: &str) -> (String, String, i32) {
    run_linetally_with_bytes(args, input.as_bytes())
}

pub fn run_linetally_with_bytes(args: &[&str], input: &[u8]) -> (String, String, i32) {
    let mut child = base_command(args, true)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start linetally");

    if let Some(mut stdin) = child.stdin.take() {
        // The process may stop reading early (deadline), so a broken pipe is fine
        let _ = stdin.write_all(input);
    }

    collect(child.wait_with_output().expect("Failed to read output"))
}

/// Start linetally with piped stdio, leaving stdin open for the caller
pub fn spawn_linetally(args: &[&str]) -> std::process::Child {
    base_command(args, true)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start linetally")
}

/// Run linetally with `--input` pointing at a temporary file holding `file_content`
pub fn run_linetally_with_file(args: &[&str], file_content: &[u8]) -> (String, String, i32) {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file
        .write_all(file_content)
        .expect("Failed to write to temp file");
    temp_file.flush().expect("Failed to flush temp file");

    let path = temp_file.path().to_str().unwrap().to_string();
    let mut full_args = args.to_vec();
    full_args.push("--input");
    full_args.push(&path);

    collect(
        base_command(&full_args, true)
            .output()
            .expect("Failed to execute linetally"),
    )
}

/// Run linetally without isolating it from config files
pub fn run_linetally_with_config(args: &[&str], cwd: &std::path::Path) -> (String, String, i32) {
    collect(
        base_command(args, false)
            .current_dir(cwd)
            .env("HOME", cwd)
            .env("XDG_CONFIG_HOME", cwd.join(".config"))
            .stdin(Stdio::null())
            .output()
            .expect("Failed to execute linetally"),
    )
}

/// Parse the JSON summary printed with `--summary-format json`
pub fn parse_json_summary(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout.trim()).expect("summary should be valid JSON")
}

/// Extract a counter from the text summary line, e.g. `total` or `markers`
pub fn extract_count(stdout: &str, label: &str) -> Option<u64> {
    let line = stdout
        .lines()
        .find(|l| l.starts_with("Records processed:"))?;
    let counts = line.trim_start_matches("Records processed:").split(';').next()?;
    counts.split(',').find_map(|part| {
        let mut words = part.split_whitespace();
        let value = words.next()?.parse().ok()?;
        (words.next()? == label).then_some(value)
    })
}

/// Lines `0..n` with every `marker_every`-th line replaced by the marker
pub fn generate_lines(n: usize, marker_every: usize) -> String {
    (0..n)
        .map(|i| {
            if marker_every > 0 && i % marker_every == 0 {
                "error\n".to_string()
            } else {
                format!("record {}\n", i)
            }
        })
        .collect()
}
