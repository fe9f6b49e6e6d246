//! Driver integration tests: run the built binary against temp files and
//! check dumps, diagnostics and exit codes.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn minic(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_minic"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("binary runs")
}

fn write_source(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path.to_string_lossy().into_owned()
}

const SUM: &str = "int sum(int n) {\n    int s = 0;\n    int i = 0;\n    while (i < n) {\n        s = s + i;\n        i = i + 1;\n    }\n    return s;\n}\nint main() { return sum(10); }\n";

#[test]
fn dump_tokens_lists_positions_and_kinds() {
    let dir = TempDir::new().unwrap();
    let src = write_source(&dir, "main.mc", "int main() { return 0; }\n");
    let out = minic(&["dump-tokens", &src], dir.path());
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.starts_with("1:1: int\n"));
    assert!(stdout.contains("1:5: main"));
    assert!(stdout.contains("return"));
}

#[test]
fn dump_ast_simple_omits_positions() {
    let dir = TempDir::new().unwrap();
    let src = write_source(&dir, "main.mc", "int main() { return 0; }\n");
    let out = minic(&["dump-ast-simple", &src], dir.path());
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("FunctionDecl int `main`"));
    assert!(!stdout.contains("<line:"));
}

#[test]
fn dump_ast_includes_positions() {
    let dir = TempDir::new().unwrap();
    let src = write_source(&dir, "main.mc", "int main() { return 0; }\n");
    let out = minic(&["dump-ast", &src], dir.path());
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("<line:1, col:1>"));
}

#[test]
fn dump_ir_prints_function_listing() {
    let dir = TempDir::new().unwrap();
    let src = write_source(&dir, "main.mc", SUM);
    let out = minic(&["dump-ir", &src], dir.path());
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("fun int sum(int t0):"));
    assert!(stdout.contains("fun int main():"));
    assert!(stdout.contains("goto L"));
    assert!(stdout.contains("phi("));
}

#[test]
fn binary_round_trip_matches_the_text_dump() {
    let dir = TempDir::new().unwrap();
    let src = write_source(&dir, "main.mc", SUM);
    let bin = dir.path().join("out.mir");
    let bin_str = bin.to_string_lossy().into_owned();

    let direct = minic(&["dump-ir", "--binary", &bin_str, &src], dir.path());
    assert!(direct.status.success());
    assert!(bin.exists());

    let reread = minic(&["read-ir", &bin_str], dir.path());
    assert!(reread.status.success());
    assert_eq!(direct.stdout, reread.stdout);
}

#[test]
fn compile_error_exits_nonzero_with_position() {
    let dir = TempDir::new().unwrap();
    let src = write_source(&dir, "bad.mc", "void f() { int a[4]; a[4]; }\n");
    let out = minic(&["dump-ir", &src], dir.path());
    assert!(!out.status.success());
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("error at line 1, column 24"));
    assert!(stderr.contains("out of range"));
}

#[test]
fn no_location_flag_drops_the_position() {
    let dir = TempDir::new().unwrap();
    let src = write_source(&dir, "bad.mc", "void f() { int x; *x; }\n");
    let out = minic(&["dump-ir", "--no-location", &src], dir.path());
    assert!(!out.status.success());
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("error: attempt to dereference non-pointer type"));
    assert!(!stderr.contains("line 1"));
}

#[test]
fn warnings_go_to_stderr_and_do_not_fail() {
    let dir = TempDir::new().unwrap();
    let src = write_source(&dir, "warn.mc", "int main() { int unused; return 0; }\n");
    let out = minic(&["dump-ir", &src], dir.path());
    assert!(out.status.success());
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("warning at line 1"));
    assert!(stderr.contains("`unused` is never used"));
}

#[test]
fn no_warnings_flag_silences_them() {
    let dir = TempDir::new().unwrap();
    let src = write_source(&dir, "warn.mc", "int main() { int unused; return 0; }\n");
    let out = minic(&["dump-ir", "--no-warnings", &src], dir.path());
    assert!(out.status.success());
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(!stderr.contains("warning"));
}

#[test]
fn missing_input_file_fails() {
    let dir = TempDir::new().unwrap();
    let out = minic(&["dump-ir", "no-such-file.mc"], dir.path());
    assert!(!out.status.success());
}
