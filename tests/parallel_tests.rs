mod common;
use common::*;

#[test]
fn test_parallel_mode_counts_every_record() {
    let input = generate_lines(10_000, 7);
    let (stdout, stderr, exit_code) =
        run_linetally_with_input(&["--concurrency", "4", "--batch-size", "64"], &input);
    assert_eq!(exit_code, 0, "parallel run should succeed: {}", stderr);
    assert_eq!(extract_count(&stdout, "total"), Some(10_000));
    assert_eq!(extract_count(&stdout, "markers"), Some(1429));
    assert!(stdout.contains("Workers: 4"));
}

#[test]
fn test_parallel_sequential_equivalence() {
    let mut input = generate_lines(3_000, 11);
    input.push_str("this line is definitely longer than forty bytes in total\n");
    input.push_str("error\n");

    let args_for = |threads: &'static str| {
        vec![
            "--summary-format",
            "json",
            "--max-line-length",
            "40",
            "--batch-size",
            "50",
            "--concurrency",
            threads,
        ]
    };

    let (seq_stdout, _, seq_exit) = run_linetally_with_input(&args_for("1"), &input);
    let (par_stdout, _, par_exit) = run_linetally_with_input(&args_for("8"), &input);
    assert_eq!(seq_exit, 0);
    assert_eq!(par_exit, 0);

    let seq = parse_json_summary(&seq_stdout);
    let par = parse_json_summary(&par_stdout);
    assert_eq!(seq["summary"], par["summary"]);
    assert_eq!(seq["summary"]["records"], 3_002);
    assert_eq!(seq["summary"]["malformed"], 1);
    assert_eq!(par["workers"], 8);
}

#[test]
fn test_parallel_emit_preserves_input_order() {
    let input: String = (1..=500).map(|i| format!("item{}\n", i)).collect();
    let (stdout, _stderr, exit_code) = run_linetally_with_input(
        &["--emit", "--concurrency", "3", "--batch-size", "7"],
        &input,
    );
    assert_eq!(exit_code, 0);
    let expected: String = (1..=500).map(|i| format!("processing item{}\n", i)).collect();
    assert_eq!(stdout, expected);
}

#[test]
fn test_threads_alias_and_auto_concurrency() {
    let input = generate_lines(100, 0);
    let (stdout, _stderr, exit_code) = run_linetally_with_input(&["--threads", "2"], &input);
    assert_eq!(exit_code, 0);
    assert_eq!(extract_count(&stdout, "total"), Some(100));

    let (stdout, _stderr, exit_code) = run_linetally_with_input(&["--concurrency", "0"], &input);
    assert_eq!(exit_code, 0);
    assert_eq!(extract_count(&stdout, "total"), Some(100));
}

#[test]
fn test_verbose_worker_timings() {
    let input = generate_lines(200, 0);
    let (_stdout, stderr, exit_code) =
        run_linetally_with_input(&["-vv", "--concurrency", "2", "--batch-size", "10"], &input);
    assert_eq!(exit_code, 0);
    assert!(stderr.contains("worker 0:"));
    assert!(stderr.contains("worker 1:"));
}
