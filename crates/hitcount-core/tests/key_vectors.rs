//! Identifier validation vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use hitcount_core::key::validate;
use hitcount_core::limits::{MAX_LENGTH, MIN_LENGTH};
use hitcount_core::{ClientCode, HitcountError, ValidationError};


#[test]
fn key_vectors() {
    for v in vector_loader::load("keys.json") {
        let res = validate(&v.namespace, &v.key);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.reason(), err.reason, "vector={}", v.description);
            assert_eq!(e.field().to_string(), err.field, "vector={}", v.description);
            continue;
        }

        let k = res.expect("expected ok key");
        let ex = v.expect.expect("missing expect block");
        assert_eq!(k.namespace(), ex.namespace, "vector={}", v.description);
        assert_eq!(k.key(), ex.key, "vector={}", v.description);
    }
}

#[test]
fn normalization_is_idempotent() {
    for v in vector_loader::load("keys.json") {
        let Ok(first) = validate(&v.namespace, &v.key) else { continue };
        let again = validate(first.namespace(), first.key()).unwrap();
        assert_eq!(first, again, "vector={}", v.description);
    }
}

#[test]
fn every_length_in_bounds_is_accepted() {
    for len in MIN_LENGTH..=MAX_LENGTH {
        let s = "a".repeat(len);
        assert!(validate(&s, &s).is_ok(), "len={len}");
    }
    for len in (0..MIN_LENGTH).chain([MAX_LENGTH + 1, MAX_LENGTH * 2]) {
        let s = "a".repeat(len);
        let e = validate(&s, "valid").unwrap_err();
        if len < MIN_LENGTH {
            assert!(matches!(e, ValidationError::TooShort { .. }), "len={len}");
        } else {
            assert!(matches!(e, ValidationError::TooLong { .. }), "len={len}");
        }
    }
}

#[test]
fn validation_maps_to_bad_request() {
    let e: HitcountError = validate("ab", "valid").unwrap_err().into();
    assert_eq!(e.client_code(), ClientCode::BadRequest);
    assert!(!e.client_code().is_retryable());
}
