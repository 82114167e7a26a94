//! Integration tests for the `#[static_mock::interceptable]` attribute.

#![cfg(feature = "macros")]

use std::panic;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use static_mock::prelude::*;
use static_mock::HandleResult;

mod sut {
    use static_mock::interceptable;

    #[interceptable]
    pub fn explode() {
        panic!("real body of explode ran");
    }

    #[interceptable]
    pub fn greeting() -> String {
        "hello".to_string()
    }

    /// Calls `greeting` the way production code would.
    pub fn welcome() -> String {
        format!("{}!", greeting())
    }

    #[interceptable]
    pub fn h(s: &str) -> usize {
        s.len()
    }

    #[interceptable]
    pub fn try_parse(s: &str, result: &mut i32) -> bool {
        match s.parse() {
            Ok(v) => {
                *result = v;
                true
            }
            Err(_) => false,
        }
    }

    #[interceptable]
    pub fn three(one: &mut i32, empty_string: &mut String, two: &mut i32) {
        *one = 1;
        *empty_string = String::new();
        *two = 2;
    }

    #[interceptable]
    pub fn divide(a: i64, b: i64) -> Result<i64, String> {
        if b == 0 {
            Err("division by zero".to_string())
        } else {
            Ok(a / b)
        }
    }

    #[interceptable]
    pub fn total(values: &[u32]) -> u32 {
        values.iter().sum()
    }

    #[interceptable(owner = "legacy!billing", name = "charge")]
    pub fn charge_card(amount: u64) -> bool {
        amount < 100
    }

    pub struct Gateway;

    impl Gateway {
        #[interceptable(associated)]
        pub fn authorize(amount: u64, code: &mut u32) -> bool {
            *code = 200;
            amount < 100
        }
    }
}

use sut::{charge_card, divide, explode, greeting, h, three, total, try_parse, Gateway};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Without a scope every function behaves as written.
#[test]
fn test_no_scope_is_transparent() {
    assert_eq!(greeting(), "hello");
    assert_eq!(h("abc"), 3);
    assert_eq!(divide(6, 3), Ok(2));
    assert_eq!(divide(1, 0), Err("division by zero".to_string()));

    let mut value = 0;
    assert!(try_parse("12", &mut value));
    assert_eq!(value, 12);

    let err = panic::catch_unwind(explode).unwrap_err();
    assert_eq!(err.downcast_ref::<&str>(), Some(&"real body of explode ran"));
}

/// An unmatched call inside a scope runs for real and is still logged.
#[test]
fn test_unmocked_call_is_recorded() {
    init_tracing();
    let scope = MockScope::new();

    assert_eq!(h("abc"), 3);
    scope.verify(&h::pattern("abc").unwrap()).unwrap();
    assert_eq!(scope.invocations().unwrap(), vec![h::call("abc").unwrap()]);
}

/// A replacement runs instead of the real body.
#[test]
fn test_replacement_suppresses_real_call() {
    let scope = MockScope::new();
    let was_called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&was_called);
    scope
        .expect(explode::pattern().unwrap())
        .unwrap()
        .returns(move || flag.store(true, Ordering::SeqCst));

    explode();
    assert!(was_called.load(Ordering::SeqCst));
    assert_called!(scope, explode::pattern().unwrap());
}

/// A substitute return value reaches the caller's call site.
#[test]
fn test_return_value_substitution() {
    let scope = MockScope::new();
    scope
        .expect(greeting::pattern().unwrap())
        .unwrap()
        .returns(|| "X".to_string());

    assert_eq!(sut::welcome(), "X!");
}

/// `h("A")` verifies after calling `h("A")` but not after `h("B")`.
#[test]
fn test_exact_value_matching() {
    {
        let scope = MockScope::new();
        scope.expect(h::pattern("A").unwrap()).unwrap();
        assert_eq!(h("A"), 1);
        scope.verify(&h::pattern("A").unwrap()).unwrap();
    }

    let scope = MockScope::new();
    scope.expect(h::pattern("A").unwrap()).unwrap();
    h("B");
    let err = scope.verify(&h::pattern("A").unwrap()).unwrap_err();
    assert!(matches!(err, Error::VerificationFailed { .. }));
    assert!(err.to_string().contains("closest call"));
}

#[test]
fn test_wildcard_matches_any_argument() {
    let scope = MockScope::new();
    scope
        .expect(h::pattern(any::<String>()).unwrap())
        .unwrap()
        .return_value(99_usize);

    assert_eq!(h("x"), 99);
    assert_eq!(h(""), 99);
    assert_called!(scope, h::pattern(any::<String>()).unwrap(), times = 2);
}

#[test]
fn test_output_parameter_substitution() {
    let scope = MockScope::new();
    scope
        .expect(try_parse::pattern("fubar").unwrap())
        .unwrap()
        .returns(|| true)
        .with_output(2_i32);

    let mut value = 0;
    assert!(try_parse("fubar", &mut value));
    assert_eq!(value, 2);

    // Other inputs still reach the real function.
    assert!(try_parse("7", &mut value));
    assert_eq!(value, 7);
    assert!(!try_parse("seven", &mut value));
}

#[test]
fn test_named_outputs_regardless_of_declaration_order() {
    let scope = MockScope::new();
    scope
        .expect(three::pattern().unwrap())
        .unwrap()
        .with_named_output("one", 42_i32)
        .with_named_output("two", 43_i32)
        .with_named_output("empty_string", "v".to_string());

    let (mut one, mut empty_string, mut two) = (0, String::from("unset"), 0);
    three(&mut one, &mut empty_string, &mut two);
    assert_eq!((one, empty_string.as_str(), two), (42, "v", 43));
}

#[test]
#[should_panic(expected = "no output value bound for parameter `result`")]
fn test_missing_output_binding_fails_loudly() {
    let scope = MockScope::new();
    scope
        .expect(try_parse::pattern(any::<String>()).unwrap())
        .unwrap()
        .returns(|| true);

    let mut value = 0;
    try_parse("1", &mut value);
}

#[test]
fn test_disposed_scope_is_isolated() {
    let scope = MockScope::new();
    scope
        .expect(greeting::pattern().unwrap())
        .unwrap()
        .returns(|| "X".to_string());
    assert_eq!(greeting(), "X");

    scope.dispose();
    assert_eq!(greeting(), "hello");
    assert!(matches!(
        scope.verify(&greeting::pattern().unwrap()),
        Err(Error::UseAfterDispose { .. })
    ));
}

#[test]
fn test_verify_without_any_call() {
    let scope = MockScope::new();
    assert!(matches!(
        scope.verify(&greeting::pattern().unwrap()),
        Err(Error::VerificationFailed { closest: None, .. })
    ));
}

#[test]
fn test_nested_scopes_shadow_and_both_record() {
    let outer = MockScope::builder().label("outer").build();
    outer
        .expect(greeting::pattern().unwrap())
        .unwrap()
        .returns(|| "outer".to_string());

    {
        let inner = MockScope::builder().label("inner").build();
        inner
            .expect(greeting::pattern().unwrap())
            .unwrap()
            .returns(|| "inner".to_string());

        assert_eq!(greeting(), "inner");
        assert_called!(inner, greeting::pattern().unwrap(), times = 1);
    }

    assert_eq!(greeting(), "outer");
    assert_called!(outer, greeting::pattern().unwrap(), times = 2);
}

#[test]
fn test_outer_scope_records_when_inner_replacement_panics() {
    let outer = MockScope::builder().label("outer").build();
    let inner = MockScope::builder().label("inner").build();
    inner
        .expect(greeting::pattern().unwrap())
        .unwrap()
        .returns(|| -> String { panic!("inner replacement panicked") });

    let err = panic::catch_unwind(greeting).unwrap_err();
    assert_eq!(err.downcast_ref::<&str>(), Some(&"inner replacement panicked"));
    assert_called!(inner, greeting::pattern().unwrap(), times = 1);
    assert_called!(outer, greeting::pattern().unwrap(), times = 1);
}

#[test]
fn test_nested_scopes_log_reentrant_calls_in_same_order() {
    let outer = MockScope::builder().label("outer").build();
    let inner = MockScope::builder().label("inner").build();
    inner
        .expect(greeting::pattern().unwrap())
        .unwrap()
        .returns(|| format!("len {}", h("four")));

    assert_eq!(greeting(), "len 4");
    let expected = vec![greeting::call().unwrap(), h::call("four").unwrap()];
    assert_eq!(inner.invocations().unwrap(), expected);
    assert_eq!(outer.invocations().unwrap(), expected);
}

#[test]
fn test_replacement_errors_propagate_unchanged() {
    let scope = MockScope::new();
    scope
        .expect(divide::pattern(any::<i64>(), 0_i64).unwrap())
        .unwrap()
        .returns(|| Err::<i64, _>("mocked failure".to_string()));

    assert_eq!(divide(1, 0), Err("mocked failure".to_string()));
    assert_eq!(divide(4, 2), Ok(2));

    scope
        .expect(divide::pattern(4_i64, 2_i64).unwrap())
        .unwrap()
        .returns(|| -> std::result::Result<i64, String> { panic!("replacement panicked") });
    let err = panic::catch_unwind(|| divide(4, 2)).unwrap_err();
    assert_eq!(err.downcast_ref::<&str>(), Some(&"replacement panicked"));

    // A panicking replacement leaves the scope usable.
    scope.verify(&divide::pattern(4_i64, 2_i64).unwrap()).unwrap();
}

#[test]
fn test_replacement_may_call_other_intercepted_functions() {
    let scope = MockScope::new();
    scope
        .expect(greeting::pattern().unwrap())
        .unwrap()
        .returns(|| format!("len {}", h("four")));

    assert_eq!(greeting(), "len 4");
    assert_called!(scope, h::pattern("four").unwrap());
}

#[test]
fn test_slice_inputs_are_matched_by_value() {
    let scope = MockScope::new();
    scope
        .expect(total::pattern(vec![1_u32, 2]).unwrap())
        .unwrap()
        .return_value(0_u32);

    assert_eq!(total(&[1, 2]), 0);
    assert_eq!(total(&[1, 2, 3]), 6);
}

#[test]
fn test_default_owner_is_package_and_module() {
    let shape = h::shape();
    assert_eq!(
        shape.owner(),
        concat!(env!("CARGO_PKG_NAME"), "!", module_path!(), "::sut")
    );
    assert_eq!(shape.function(), "h");
    assert!(std::ptr::eq(&*shape, &*h::shape()));
}

#[test]
fn test_configured_owner_and_name() {
    let shape = charge_card::shape();
    assert_eq!(shape.owner(), "legacy!billing");
    assert_eq!(shape.function(), "charge");

    let scope = MockScope::new();
    scope
        .expect(charge_card::pattern(any::<u64>()).unwrap())
        .unwrap()
        .return_value(true);
    assert!(charge_card(500));
}

#[test]
fn test_mismatched_pattern_is_ambiguous() {
    let scope = MockScope::new();
    let wrong = CallSignature::builder(h::shape().owner(), "h")
        .arg(1_i32)
        .build();

    assert!(matches!(
        scope.expect(wrong.clone()),
        Err(Error::AmbiguousSignature { .. })
    ));
    assert!(matches!(
        scope.verify(&wrong),
        Err(Error::AmbiguousSignature { .. })
    ));
}

#[test]
fn test_observing_expectation_does_not_substitute() {
    let scope = MockScope::new();
    let handle = scope.expect(greeting::pattern().unwrap()).unwrap();
    assert!(!handle.substitutes());

    assert_eq!(greeting(), "hello");
    assert!(matches!(
        static_mock::dispatch(&greeting::call().unwrap()),
        Ok(HandleResult::NotHandled)
    ));
    assert_called!(scope, greeting::pattern().unwrap(), times = 2);
}

#[test]
fn test_expectation_fires_on_every_call() {
    let scope = MockScope::new();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    scope
        .expect(h::pattern(any::<String>()).unwrap())
        .unwrap()
        .returns(move || counter.fetch_add(1, Ordering::SeqCst));

    assert_eq!(h("a"), 0);
    assert_eq!(h("b"), 1);
    assert_eq!(h("c"), 2);
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
fn test_associated_function_is_interceptable() {
    let shape = Gateway::authorize_shape();
    assert_eq!(
        shape.owner(),
        concat!(env!("CARGO_PKG_NAME"), "!", module_path!(), "::sut::Gateway")
    );
    assert_eq!(shape.function(), "authorize");

    let mut code = 0;
    assert!(!Gateway::authorize(500, &mut code));
    assert_eq!(code, 200);

    let scope = MockScope::new();
    scope
        .expect(Gateway::authorize_pattern(any::<u64>()).unwrap())
        .unwrap()
        .returns(|| true)
        .with_output(7_u32);

    assert!(Gateway::authorize(500, &mut code));
    assert_eq!(code, 7);
    assert_called!(scope, Gateway::authorize_pattern(500_u64).unwrap());
    assert_eq!(
        scope.last_call().unwrap(),
        Some(Gateway::authorize_call(&500).unwrap())
    );
}
