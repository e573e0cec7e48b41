//! End-to-end tests for the `Script` facade: loading, invoking, host
//! callables, user data and configuration.

use stackbind::{CallSignature, Libs, Script, ScriptConfig, ScriptError, ValueType};
use std::fs;

const DOUBLE: &str = ": double ( n s -- r ) drop 2 * tostring ;";

fn loaded(source: &str) -> Script {
    let mut script = Script::new();
    script.open_libs(Libs::ALL);
    script.compile_string(source).unwrap();
    script
}

#[test]
fn test_invoke_registered_function() {
    let mut script = Script::new();
    script.open_libs(Libs::ALL);
    script
        .register(
            "double",
            CallSignature::new()
                .with_arg(5_i64)
                .with_arg(String::from("go"))
                .with_ret(ValueType::String),
        )
        .unwrap();
    script.compile_string(DOUBLE).unwrap();

    let out = script.invoke("double").unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out.get::<String>(0).map(String::as_str), Ok("10"));
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_invoke_after_rebinding_arguments() {
    let mut script = Script::new();
    script.open_libs(Libs::ALL);
    script
        .register(
            "double",
            CallSignature::new()
                .with_arg(5_i64)
                .with_arg(String::from("go"))
                .with_ret(ValueType::String),
        )
        .unwrap();
    script.compile_string(DOUBLE).unwrap();

    script.signature_mut("double").unwrap().set_arg(0, 21_i64);
    let out = script.invoke("double").unwrap();
    assert_eq!(out.get::<String>(0).map(String::as_str), Ok("42"));
}

#[test]
fn test_invoke_unregistered_leaves_stack_alone() {
    let mut script = loaded(DOUBLE);
    let err = script.invoke("double").unwrap_err();
    assert!(matches!(err, ScriptError::NotRegistered(ref name) if name == "double"));
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_faulting_call_reports_message() {
    let mut script = loaded(": boom ( -- ) \"bad input\" error ;");
    let err = script
        .call("boom", &CallSignature::new().with_ret(ValueType::Integer))
        .unwrap_err();
    match err {
        ScriptError::InvocationFailed { function, message } => {
            assert_eq!(function, "boom");
            assert_eq!(message, "bad input");
        }
        other => panic!("expected InvocationFailed, got {:?}", other),
    }
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_call_undefined_function() {
    let mut script = loaded("");
    let err = script.call("missing", &CallSignature::new()).unwrap_err();
    assert!(matches!(err, ScriptError::InvocationFailed { .. }));
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_type_error_inside_script() {
    let mut script = loaded(": add ( a b -- c ) + ;");
    let signature = CallSignature::new()
        .with_arg(1_i64)
        .with_arg(String::from("x"))
        .with_ret(ValueType::Integer);
    let err = script.call("add", &signature).unwrap_err();
    match err {
        ScriptError::InvocationFailed { message, .. } => assert!(message.contains("'+'")),
        other => panic!("expected InvocationFailed, got {:?}", other),
    }
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_multiple_returns_in_declared_order() {
    let mut script = loaded(": three ( -- a b c ) 1 \"two\" true ;");
    let signature = CallSignature::new()
        .with_ret(ValueType::Integer)
        .with_ret(ValueType::String)
        .with_ret(ValueType::Boolean);
    let out = script.call("three", &signature).unwrap();
    assert_eq!(out.get::<i64>(0), Ok(&1));
    assert_eq!(out.get::<String>(1).map(String::as_str), Ok("two"));
    assert_eq!(out.get::<bool>(2), Ok(&true));
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_missing_results_read_as_nil() {
    let mut script = loaded(": one ( -- a ) 1 ;");

    let lenient = CallSignature::new()
        .with_ret(ValueType::Integer)
        .with_ret(ValueType::None);
    let out = script.call("one", &lenient).unwrap();
    assert_eq!(out.get::<i64>(0), Ok(&1));
    assert!(!out.value(1).unwrap().has_value());

    let strict = CallSignature::new()
        .with_ret(ValueType::Integer)
        .with_ret(ValueType::Integer);
    let err = script.call("one", &strict).unwrap_err();
    assert!(matches!(
        err,
        ScriptError::ReturnTypeMismatch { position: 2, .. }
    ));
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_extra_results_are_dropped() {
    let mut script = loaded(": many ( -- a b c ) 1 2 3 ;");
    let out = script
        .call("many", &CallSignature::new().with_ret(ValueType::Integer))
        .unwrap();
    assert_eq!(out.get::<i64>(0), Ok(&3));
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_host_function_called_from_script() {
    let mut script = Script::new();
    script.open_libs(Libs::ALL);
    script
        .register_fn(
            "scale",
            CallSignature::new()
                .with_arg(6_i64)
                .with_arg(7_i64)
                .with_ret(ValueType::Integer),
            |call| {
                let a = call.to_integer(1)?;
                let b = call.to_integer(2)?;
                call.push_integer(a * b);
                Ok(())
            },
        )
        .unwrap();
    script.compile_string(": area ( w h -- a ) scale 1 + ;").unwrap();

    let signature = CallSignature::new()
        .with_arg(3_i64)
        .with_arg(4_i64)
        .with_ret(ValueType::Integer);
    let out = script.call("area", &signature).unwrap();
    assert_eq!(out.get::<i64>(0), Ok(&13));

    // The recorded signature invokes the host function directly
    let direct = script.invoke("scale").unwrap();
    assert_eq!(direct.get::<i64>(0), Ok(&42));
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_host_function_with_absent_argument() {
    let mut signature = CallSignature::new();
    signature
        .add_arg(1_i64)
        .add_absent_arg()
        .add_ret(ValueType::Integer);

    let mut script = Script::new();
    script
        .register_fn("next", signature, |call| {
            let n = call.to_integer(1)?;
            call.push_integer(n + 1);
            Ok(())
        })
        .unwrap();

    let out = script.invoke("next").unwrap();
    assert_eq!(out.get::<i64>(0), Ok(&2));
    assert_eq!(script.stack_depth(), 0);

    script.compile_string(": bump ( -- n ) 41 next ;").unwrap();
    let out = script
        .call("bump", &CallSignature::new().with_ret(ValueType::Integer))
        .unwrap();
    assert_eq!(out.get::<i64>(0), Ok(&42));
}

#[test]
fn test_host_function_argument_mismatch() {
    let mut script = Script::new();
    script
        .register_fn(
            "square",
            CallSignature::new().with_arg(0_i64),
            |call| {
                let n = call.to_integer(1)?;
                call.push_integer(n * n);
                Ok(())
            },
        )
        .unwrap();
    script.compile_string(": bad ( -- n ) \"x\" square ;").unwrap();

    let err = script
        .call("bad", &CallSignature::new().with_ret(ValueType::Integer))
        .unwrap_err();
    match err {
        ScriptError::InvocationFailed { message, .. } => {
            assert!(message.contains("square"), "message was: {}", message);
        }
        other => panic!("expected InvocationFailed, got {:?}", other),
    }
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_host_function_name_taken() {
    let mut script = Script::new();
    script
        .register_fn("tick", CallSignature::new(), |_| Ok(()))
        .unwrap();
    let err = script
        .register("tick", CallSignature::new())
        .unwrap_err();
    assert!(matches!(err, ScriptError::AlreadyRegistered(_)));
}

#[test]
fn test_user_data_inside_callback() {
    let mut script = Script::new();
    script.add_user_data("counter", 10_i64);
    script
        .register_fn("bump", CallSignature::new(), |call| {
            let next = {
                let counter = call.user_data_mut::<i64>("counter")?;
                *counter += 1;
                *counter
            };
            call.push_integer(next);
            Ok(())
        })
        .unwrap();
    script.compile_string(": bump-twice ( -- n ) bump drop bump ;").unwrap();

    let out = script
        .call("bump-twice", &CallSignature::new().with_ret(ValueType::Integer))
        .unwrap();
    assert_eq!(out.get::<i64>(0), Ok(&12));
    assert_eq!(*script.user_data::<i64>("counter").unwrap(), 12);
}

#[test]
fn test_user_data_missing_inside_callback() {
    let mut script = Script::new();
    script
        .register_fn("peek", CallSignature::new(), |call| {
            let value = call.user_data::<String>("label")?.clone();
            call.push_string(&value);
            Ok(())
        })
        .unwrap();
    let err = script.invoke("peek").unwrap_err();
    match err {
        ScriptError::InvocationFailed { message, .. } => assert!(message.contains("label")),
        other => panic!("expected InvocationFailed, got {:?}", other),
    }
}

#[test]
fn test_compile_failure_reports_line() {
    let mut script = Script::new();
    let err = script
        .compile_string(": ok ( -- ) ;\n\n: broken ( -- )\n  1 2 +\n")
        .unwrap_err();
    match err {
        ScriptError::CompileFailure { chunk, message } => {
            assert_eq!(chunk, "<string>");
            assert!(message.contains("line "), "message was: {}", message);
        }
        other => panic!("expected CompileFailure, got {:?}", other),
    }
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_compile_runtime_fault_is_compile_failure() {
    let mut script = Script::new();
    script.open_libs(Libs::BASE);
    let err = script.compile_string("\"at load\" error").unwrap_err();
    assert!(matches!(err, ScriptError::CompileFailure { .. }));
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_compile_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("double.sb");
    fs::write(&path, format!("# doubles its first argument\n{}\n", DOUBLE)).unwrap();

    let mut script = Script::open(&path);
    assert_eq!(script.path(), Some(path.as_path()));
    script
        .register(
            "double",
            CallSignature::new()
                .with_arg(8_i64)
                .with_arg(String::from("x"))
                .with_ret(ValueType::String),
        )
        .unwrap();
    script.compile().unwrap();
    let out = script.invoke("double").unwrap();
    assert_eq!(out.get::<String>(0).map(String::as_str), Ok("16"));
}

#[test]
fn test_compile_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.sb");
    let mut script = Script::open(&path);
    let err = script.compile().unwrap_err();
    match err {
        ScriptError::ScriptNotFound { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected ScriptNotFound, got {:?}", other),
    }
}

#[test]
fn test_with_config_restricts_libraries() {
    let config = ScriptConfig::new().with_libs(["base"]);
    let mut script = Script::with_config(&config).unwrap();
    script
        .compile_string(": shout ( s -- s ) upper ; : show ( n -- s ) tostring ;")
        .unwrap();

    let ok = script
        .call(
            "show",
            &CallSignature::new().with_arg(3_i64).with_ret(ValueType::String),
        )
        .unwrap();
    assert_eq!(ok.get::<String>(0).map(String::as_str), Ok("3"));

    let err = script
        .call(
            "shout",
            &CallSignature::new()
                .with_arg(String::from("hi"))
                .with_ret(ValueType::String),
        )
        .unwrap_err();
    match err {
        ScriptError::InvocationFailed { message, .. } => assert!(message.contains("upper")),
        other => panic!("expected InvocationFailed, got {:?}", other),
    }
}

#[test]
fn test_with_config_call_depth() {
    let config = ScriptConfig::new().with_max_call_depth(16);
    let mut script = Script::with_config(&config).unwrap();
    script.compile_string(": forever ( -- ) forever ;").unwrap();
    let err = script.call("forever", &CallSignature::new()).unwrap_err();
    assert!(matches!(err, ScriptError::InvocationFailed { .. }));
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_with_config_rejects_unbounded_depth() {
    let config = ScriptConfig::new().with_max_call_depth(10_000_000);
    assert!(matches!(
        Script::with_config(&config),
        Err(ScriptError::Config(_))
    ));
}

#[test]
fn test_deepest_allowed_recursion_faults_cleanly() {
    let config = ScriptConfig::new().with_max_call_depth(stackbind::MAX_CALL_DEPTH);
    let mut script = Script::with_config(&config).unwrap();
    script.compile_string(": forever ( -- ) forever ;").unwrap();
    let err = script.call("forever", &CallSignature::new()).unwrap_err();
    match err {
        ScriptError::InvocationFailed { message, .. } => {
            assert!(message.contains("call depth"), "message was: {}", message)
        }
        other => panic!("expected InvocationFailed, got {:?}", other),
    }
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_oversized_string_faults_cleanly() {
    let mut script = loaded(": big ( -- s ) \"ab\" 9223372036854775807 rep ;");
    let err = script
        .call("big", &CallSignature::new().with_ret(ValueType::String))
        .unwrap_err();
    assert!(matches!(err, ScriptError::InvocationFailed { .. }));
    assert_eq!(script.stack_depth(), 0);
}

#[test]
fn test_config_file_drives_script() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.sb"), DOUBLE).unwrap();
    let config_path = dir.path().join("stackbind.toml");
    fs::write(&config_path, "script = \"main.sb\"\nlibs = [\"base\"]\n").unwrap();

    let config = ScriptConfig::load(&config_path).unwrap();
    let mut script = Script::with_config(&config).unwrap();
    script.compile().unwrap();
    let signature = CallSignature::new()
        .with_arg(1_i64)
        .with_arg(String::from("x"))
        .with_ret(ValueType::String);
    let out = script.call("double", &signature).unwrap();
    assert_eq!(out.get::<String>(0).map(String::as_str), Ok("2"));
}
