use momo::{eval, MomoError};

fn run(source: &str) -> String {
    eval(source, "<test>").expect("script failed").inspect()
}

fn run_err(source: &str) -> MomoError {
    eval(source, "<test>").expect_err("expected an error")
}

#[test]
fn arithmetic() {
    assert_eq!(run("1 + 2"), "3");
    assert_eq!(run("50 / 2 * 2 + 10 - 5"), "55");
    assert_eq!(run("2 + 3.5"), "5.5");
    assert_eq!(run("7 % 4"), "3");
}

#[test]
fn global_bindings() {
    assert_eq!(run("var a = 5; var b = a; var c = a + b + 5; c"), "15");
}

#[test]
fn recursive_factorial() {
    let source = "
        var fact = fn(n) {
            if (n < 2) { 1 } else { n * fact(n - 1) }
        };
        fact(5)
    ";
    assert_eq!(run(source), "120");
}

#[test]
fn closures_capture_enclosing_parameters() {
    let source = "
        var mkAdder = fn(x) { fn(y) { x + y } };
        var addTwo = mkAdder(2);
        addTwo(40)
    ";
    assert_eq!(run(source), "42");
}

#[test]
fn transitive_closure_capture() {
    let source = "
        var outer = fn(a) {
            fn(b) {
                fn(c) { a + b + c }
            }
        };
        outer(1)(2)(4)
    ";
    assert_eq!(run(source), "7");
}

#[test]
fn hash_lookup() {
    assert_eq!(run(r#"var h = {"a": 1, "b": 2}; h["b"]"#), "2");
    assert_eq!(run(r#"var h = {1: "one", true: "yes"}; h[true]"#), "yes");
    assert_eq!(run(r#"{"a": 1}["missing"]"#), "null");
}

#[test]
fn arrays_and_len() {
    assert_eq!(run("var a = [10, 20, 30]; a[1] + len(a)"), "23");
    assert_eq!(run("[1, 2, 3][99]"), "null");
}

#[test]
fn captured_values_are_snapshots() {
    let source = "
        var make = fn() {
            var x = 1;
            var get = fn() { x };
            x = 99;
            get()
        };
        make()
    ";
    assert_eq!(run(source), "1");

    // Boxing through an array shares the mutation.
    let boxed = "
        var make = fn() {
            var cell = [1];
            var get = fn() { cell[0] };
            cell[0] = 99;
            get()
        };
        make()
    ";
    assert_eq!(run(boxed), "99");
}

#[test]
fn loops_with_break_and_continue() {
    let source = "
        var sum = 0;
        for (var i = 0; i < 10; i + 1) {
            if (i % 2 == 0) { continue; }
            if (i > 7) { break; }
            sum = sum + i;
        };
        sum
    ";
    // 1 + 3 + 5 + 7
    assert_eq!(run(source), "16");

    let countdown = "
        var n = 5;
        loop {
            n = n - 1;
            if (n == 0) { break; }
        };
        n
    ";
    assert_eq!(run(countdown), "0");
}

#[test]
fn builtins_compose() {
    let source = "
        var xs = [3, 1, 2];
        sort(xs);
        first(xs) + last(xs) * 10
    ";
    assert_eq!(run(source), "31");

    assert_eq!(run(r#"len("hello" + " " + "world")"#), "11");
    assert_eq!(run("var xs = [1]; push(xs, 2); push(xs, 3); len(tail(xs))"), "2");
    assert_eq!(run("type([])"), "ARRAY");
    assert_eq!(run("empty([])"), "true");
    assert_eq!(run(r#"empty("x")"#), "false");
}

#[test]
fn functions_are_first_class() {
    let source = "
        var twice = fn(f, x) { f(f(x)) };
        var addOne = fn(x) { x + 1 };
        twice(addOne, 40)
    ";
    assert_eq!(run(source), "42");
}

#[test]
fn conditionals_are_expressions() {
    assert_eq!(run("var x = if (1 < 2) { 10 } else { 20 }; x"), "10");
    assert_eq!(run("if (false) { 10 }"), "null");
}

#[test]
fn runtime_errors_surface_from_run() {
    match run_err("1 / 0") {
        MomoError::Runtime(err) => assert!(err.message.contains("division by zero")),
        other => panic!("expected runtime error, got {:?}", other),
    }

    match run_err("var f = fn(a) { a }; f(1, 2)") {
        MomoError::Runtime(err) => {
            assert!(err.message.contains("wrong number of arguments"))
        }
        other => panic!("expected runtime error, got {:?}", other),
    }
}

#[test]
fn compile_errors_carry_positions() {
    match run_err("var a = 1;\nb") {
        MomoError::Compile(err) => {
            assert!(err.message.contains("undefined variable b"));
            assert_eq!(err.file, "<test>");
            assert_eq!(err.line, 2);
            assert_eq!(err.column, 1);
        }
        other => panic!("expected compile error, got {:?}", other),
    }
}

#[test]
fn fibonacci_end_to_end() {
    let source = "
        var fib = fn(n) {
            if (n < 2) { n } else { fib(n - 1) + fib(n - 2) }
        };
        fib(15)
    ";
    assert_eq!(run(source), "610");
}
