//! End-to-end scenarios: each writes a script to a temp file, runs it
//! through the real `sharpts` binary, and checks stdout byte for byte.

use std::io::Write;
use std::process::Command;

fn run(source: &str) -> (String, String, i32) {
    let mut file = tempfile::Builder::new().suffix(".ts").tempfile().expect("temp file");
    file.write_all(source.as_bytes()).expect("write script");
    let output = Command::new(env!("CARGO_BIN_EXE_sharpts"))
        .arg(file.path())
        .output()
        .expect("run sharpts");
    (
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
        output.status.code().unwrap_or(-1),
    )
}

#[test]
fn narrowing_across_early_return() {
    let (stdout, stderr, code) = run(
        r#"
        function f(x: string | null): string {
          if (x === null) return "was null";
          return x;
        }
        console.log(f("hi"));
        "#,
    );
    assert_eq!(stdout, "hi\n", "stderr was: {stderr}");
    assert_eq!(code, 0);
}

#[test]
fn labeled_break_out_of_nested_loop() {
    let (stdout, stderr, code) = run(
        r#"
        outer: for (let i = 0; i < 3; i++) {
          for (let j = 0; j < 3; j++) {
            if (i === 1 && j === 1) break outer;
            console.log(i + ":" + j);
          }
        }
        "#,
    );
    assert_eq!(stdout, "0:0\n0:1\n0:2\n1:0\n", "stderr was: {stderr}");
    assert_eq!(code, 0);
}

#[test]
fn labeled_continue_reenters_the_labeled_loop_not_an_inner_one() {
    // `continue outer` must skip straight to `outer`'s next iteration
    // rather than terminating it like `break outer` would, and the inner
    // `for-of` must not swallow a label it doesn't own.
    let (stdout, stderr, code) = run(
        r#"
        outer: for (let i = 0; i < 3; i++) {
          for (const j of [0, 1, 2]) {
            if (j === 1) continue outer;
            console.log(i + ":" + j);
          }
        }
        "#,
    );
    assert_eq!(stdout, "0:0\n1:0\n2:0\n", "stderr was: {stderr}");
    assert_eq!(code, 0);
}

#[test]
fn using_disposal_with_pending_error_produces_suppressed_error() {
    let (stdout, stderr, code) = run(
        r#"
        try {
          {
            using r = { [Symbol.dispose]() { throw "disposeErr"; } };
            throw "blockErr";
          }
        } catch (e) {
          console.log(e.name);
          console.log(e.error);
          console.log(e.suppressed);
        }
        "#,
    );
    assert_eq!(stdout, "SuppressedError\nblockErr\ndisposeErr\n", "stderr was: {stderr}");
    assert_eq!(code, 0);
}

#[test]
fn generic_const_parameter_preserves_literal_type() {
    let (stdout, stderr, code) = run(
        r#"
        function id<const T>(x: T): T { return x; }
        let a: "hello" = id("hello");
        console.log(a);
        "#,
    );
    assert_eq!(stdout, "hello\n");
    assert!(!stderr.contains("error"), "stderr was: {stderr}");
    assert_eq!(code, 0);
}

#[test]
fn async_for_await_over_async_generator_sums_to_six() {
    let (stdout, stderr, code) = run(
        r#"
        async function* g() { yield 1; yield 2; yield 3; }
        async function main() {
          let s = 0;
          for await (const v of g()) s += v;
          console.log(s);
        }
        main();
        "#,
    );
    assert_eq!(stdout, "6\n", "stderr was: {stderr}");
    assert_eq!(code, 0);
}

#[test]
fn nested_generic_close_does_not_eat_shift_operator() {
    let (stdout, stderr, code) = run(
        r#"
        interface D { v: number }
        let x: Partial<Readonly<D>> = { v: 42 };
        console.log(x.v);
        console.log(16 >> 2);
        "#,
    );
    assert_eq!(stdout, "42\n4\n", "stderr was: {stderr}");
    assert_eq!(code, 0);
}

#[test]
fn promise_resolve_does_not_double_wrap() {
    let (stdout, stderr, code) = run(
        r#"
        async function main() {
          const v = await Promise.resolve(Promise.resolve(Promise.resolve(5)));
          console.log(v);
        }
        main();
        "#,
    );
    assert_eq!(stdout, "5\n", "stderr was: {stderr}");
    assert_eq!(code, 0);
}

#[test]
fn uncaught_runtime_error_exits_nonzero() {
    let (stdout, stderr, code) = run("null.foo;");
    assert_eq!(stdout, "");
    assert!(stderr.contains("Uncaught"), "stderr was: {stderr}");
    assert_eq!(code, 1);
}

fn run_with_args(source: &str, extra_args: &[&str]) -> (String, String, i32) {
    let mut file = tempfile::Builder::new().suffix(".ts").tempfile().expect("temp file");
    file.write_all(source.as_bytes()).expect("write script");
    let output = Command::new(env!("CARGO_BIN_EXE_sharpts"))
        .args(extra_args)
        .arg(file.path())
        .output()
        .expect("run sharpts");
    (
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
        output.status.code().unwrap_or(-1),
    )
}

#[test]
fn check_only_reports_type_errors_and_does_not_execute() {
    let (stdout, stderr, code) = run_with_args(
        r#"
        let x: number = "not a number";
        console.log("should not print");
        "#,
        &["--check-only"],
    );
    assert_eq!(stdout, "");
    assert!(stderr.contains("error"), "stderr was: {stderr}");
    assert_eq!(code, 1);
}
