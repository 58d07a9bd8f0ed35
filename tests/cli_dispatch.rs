use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_nal2_cli"))
}

#[test]
fn call_with_stub_prints_response_json() {
    let output = cli()
        .args([
            "--stub",
            "call",
            "--function",
            "getMPO_NL2",
            "--params",
            r#"{"type": 1, "AC": [20,25,30,40,50,55,60,65,70], "BC": [20,25,30,40,50,55,60,65,70], "channels": 4, "limiting": 1}"#,
            "--sequence",
            "42",
        ])
        .output()
        .expect("call command");

    assert!(
        output.status.success(),
        "call exited with {:?}",
        output.status.code()
    );
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    let json: Value = serde_json::from_str(&stdout).expect("response JSON");
    assert_eq!(json["sequence_num"], 42);
    assert_eq!(json["function"], "getMPO_NL2");
    assert_eq!(json["return"], 0);
    assert_eq!(json["output_parameters"]["MPO"].as_array().map(Vec::len), Some(19));
}

#[test]
fn unknown_function_exits_with_code_two() {
    let output = cli()
        .args(["--stub", "call", "--function", "NoSuchFunction"])
        .output()
        .expect("call command");

    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    assert!(
        stdout.contains("Unknown function: NoSuchFunction"),
        "unexpected output: {stdout}"
    );
}

#[test]
fn params_can_be_read_from_a_file() {
    let params_path =
        std::env::temp_dir().join(format!("nal2-cli-params-{}.json", std::process::id()));
    std::fs::write(&params_path, r#"{"gender": 1}"#).expect("write params");

    let output = cli()
        .args([
            "--stub",
            "call",
            "--function",
            "SetGender",
            "--params",
            &format!("@{}", params_path.display()),
        ])
        .output()
        .expect("call command");
    let _ = std::fs::remove_file(&params_path);

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("response JSON");
    assert_eq!(json["output_parameters"]["success"], true);
}

#[test]
fn capabilities_lists_every_entry_point_for_the_stub() {
    let output = cli()
        .args(["--stub", "capabilities", "--json"])
        .output()
        .expect("capabilities command");

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("capabilities JSON");
    assert_eq!(json["exposed"].as_array().map(Vec::len), Some(46));
    assert_eq!(json["missing"].as_array().map(Vec::len), Some(0));
}

#[test]
fn capabilities_fails_when_library_is_missing() {
    let output = cli()
        .args(["--library", "/nonexistent/libnal2_missing.so", "capabilities"])
        .output()
        .expect("capabilities command");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr utf8");
    assert!(stderr.contains("loading fitting engine"), "stderr: {stderr}");
}
