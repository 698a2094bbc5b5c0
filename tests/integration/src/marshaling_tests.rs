//! Marshaling Tests - Strings, Status Codes and Variants
//!
//! These tests exercise the binary value formats shared across libraries:
//! - Length-prefixed UTF-16 strings and their allocator contract
//! - UTF-8 / UTF-16 conversion, including invalid input
//! - Status code packing and classification
//! - Tagged values, including ownership transfer of strings and objects

mod common;

use std::sync::atomic::Ordering;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use bytes::BytesMut;

use common::*;
use comrt::strings::{self, BString};
use comrt::types::facility;
use comrt::variant::{var_type, RawVariant, Variant, VariantDate};
use comrt::{ComError, IUnknown, Severity, StatusCode};

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

/// Test: allocate/free contract for every size class
#[test]
fn test_allocate_free_and_count() {
    init_logging();

    for n in [0usize, 1, 2, 15, 16, 17, 1024, 65_537] {
        let ptr = strings::allocate(n).unwrap();
        unsafe {
            assert_eq!(strings::character_count(ptr), n);
            assert_eq!(strings::byte_length(ptr) as usize, 2 * n);
            strings::free(ptr);
        }
    }
    unsafe { strings::free(std::ptr::null_mut()) };
}

/// Test: UTF-8 -> UTF-16 -> UTF-8 is the identity
#[test]
fn test_utf8_utf16_identity() {
    let long = "long line ".repeat(2_000);
    let samples = [
        "",
        "hello, world",
        "Ünïcödé ßtrïng",
        "中文字符测试",
        "mixed 🦀 crab and 😀 face",
        "𝄞𝄢 musical symbols outside the BMP",
        long.as_str(),
    ];
    for sample in samples {
        let wide = strings::utf8_to_utf16(sample.as_bytes()).unwrap();
        let units: Vec<u16> = sample.encode_utf16().collect();
        assert_eq!(wide.as_units(), units.as_slice());
        assert_eq!(strings::utf16_to_utf8(wide.as_units()).unwrap(), sample);
    }
}

/// Test: a small starting buffer grows and the result is complete
#[test]
fn test_conversion_growth() {
    let text = "αβγδε🦀".repeat(500);
    for capacity in [0, 1, 7, 64] {
        let wide = strings::utf8_to_utf16_with_capacity(text.as_bytes(), capacity).unwrap();
        assert_eq!(wide.to_utf8().unwrap(), text);
        let terminator = unsafe { *wide.as_raw().add(wide.len()) };
        assert_eq!(terminator, 0);
    }
}

/// Test: unpaired surrogates are reported, not replaced
#[test]
fn test_unpaired_surrogates() {
    for units in [&[0xd83d_u16][..], &[0xde00, 0x41][..], &[0x41, 0xd800, 0xd800, 0xdc00][..]] {
        let err = strings::utf16_to_utf8(units).unwrap_err();
        assert!(matches!(err, ComError::Encoding(_)), "{:?}", units);
        assert_eq!(err.status(), StatusCode::INVALID_ARGUMENT);
    }
}

/// Test: the serialized form is little-endian on every host
#[test]
fn test_string_wire_form() {
    let s: BString = "Aé😀".parse().unwrap();
    let mut buf = BytesMut::new();
    strings::encode_wire(s.as_units(), &mut buf).unwrap();
    assert_eq!(
        &buf[..],
        &[8, 0, 0, 0, 0x41, 0x00, 0xe9, 0x00, 0x3d, 0xd8, 0x00, 0xde, 0, 0]
    );
    assert_eq!(strings::utf16le_to_utf8(&buf[4..12]).unwrap(), "Aé😀");

    let decoded = strings::decode_wire(&mut buf.freeze()).unwrap();
    assert_eq!(decoded, s);
}

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Test: packed fields decode to what was encoded
#[test]
fn test_status_fields() {
    let facilities = [0u16, 1, 7, 0x1ff, 0x7fff];
    let codes = [0u16, 1, 0x57, 0xffff];
    for severity in [Severity::Success, Severity::Failure] {
        for facility in facilities {
            for code in codes {
                let status = StatusCode::encode(severity, facility, code);
                assert_eq!(status.decode(), (facility, code));
                assert_eq!(status.severity(), severity);
                assert_ne!(status.succeeded(), status.failed());
                assert_eq!(status.failed(), severity == Severity::Failure);
            }
        }
    }
}

/// Test: well-known values are fixed
#[test]
fn test_well_known_status_values() {
    assert_eq!(StatusCode::OK.bits(), 0);
    assert_eq!(StatusCode::NOT_IMPLEMENTED.bits(), 0x8000_4001);
    assert_eq!(StatusCode::NO_SUCH_INTERFACE.bits(), 0x8000_4002);
    assert_eq!(StatusCode::INVALID_POINTER.bits(), 0x8000_4003);
    assert_eq!(StatusCode::ABORTED.bits(), 0x8000_4004);
    assert_eq!(StatusCode::GENERIC_FAILURE.bits(), 0x8000_4005);
    assert_eq!(StatusCode::OUT_OF_MEMORY.bits(), 0x8007_000e);
    assert_eq!(StatusCode::INVALID_ARGUMENT.bits(), 0x8007_0057);
    assert_eq!(StatusCode::CLASS_NOT_REGISTERED.bits(), 0x8004_0154);
    assert_eq!(
        StatusCode::INVALID_ARGUMENT,
        StatusCode::encode(Severity::Failure, facility::WIN32, 0x57)
    );
    assert_eq!(StatusCode::CLASS_NOT_REGISTERED.to_string(), "0x80040154 (REGDB_E_CLASSNOTREG)");
}

/// Test: errors and statuses map into each other
#[test]
fn test_error_status_mapping() {
    for status in [
        StatusCode::NOT_IMPLEMENTED,
        StatusCode::INVALID_POINTER,
        StatusCode::OUT_OF_MEMORY,
        StatusCode::ABORTED,
    ] {
        assert_eq!(ComError::from(status).status(), status);
    }
    let custom = StatusCode::encode(Severity::Failure, facility::ITF, 0x0200);
    let err = ComError::from(custom);
    assert!(matches!(err, ComError::Generic { status, .. } if status == custom));
    assert_eq!(StatusCode::from(err), custom);
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// Test: I4 -1 survives encode and decode
#[test]
fn test_variant_i4() {
    let mut raw = Variant::from(-1i32).encode();
    assert_eq!(raw.vt, var_type::I4);
    let value = unsafe { Variant::decode(&mut raw) }.unwrap();
    assert_eq!(i32::try_from(value).unwrap(), -1);
}

/// Test: DATE 0.0 is 1899-12-30T00:00:00Z
#[test]
fn test_variant_date_epoch() {
    let mut raw = Variant::Date(VariantDate(0.0)).encode();
    let value = unsafe { Variant::decode(&mut raw) }.unwrap();
    let moment = SystemTime::try_from(value).unwrap();
    // 25569 days separate 1899-12-30 from 1970-01-01.
    assert_eq!(moment + Duration::from_secs(25_569 * 86_400), UNIX_EPOCH);
}

/// Test: strings move through the raw form without copies or leaks
#[test]
fn test_variant_string_transfer() {
    let mut raw = Variant::try_from("transfer").unwrap().encode();
    assert_eq!(raw.vt, var_type::BSTR);
    let bstr = unsafe { raw.data.bstr };
    assert_eq!(unsafe { strings::character_count(bstr) }, 8);

    let value = unsafe { Variant::decode(&mut raw) }.unwrap();
    assert_eq!(raw.vt, var_type::EMPTY);
    match &value {
        Variant::String(s) => assert_eq!(s.as_raw(), bstr),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(String::try_from(value).unwrap(), "transfer");
}

/// Test: objects in variants are released exactly once
#[test]
fn test_variant_object_release() {
    let (counter, drops) = counter_object();
    let unknown = counter.query::<IUnknown>().unwrap();
    drop(counter);

    let mut raw = Variant::Object(unknown).encode();
    let copy = unsafe { Variant::copy_from(&raw) }.unwrap();
    let owned = unsafe { Variant::decode(&mut raw) }.unwrap();
    assert_eq!(copy, owned);

    drop(copy);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(owned);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

/// Test: unsupported tags fail loudly and leave the value alone
#[test]
fn test_variant_unsupported_tags() {
    for vt in [6u16, 9, 12, 14, 0x24, var_type::BSTR | var_type::ARRAY, var_type::I4 | var_type::BYREF] {
        let mut raw = RawVariant::empty();
        raw.vt = vt;
        let err = unsafe { Variant::decode(&mut raw) }.unwrap_err();
        assert!(matches!(err, ComError::UnsupportedVariant(tag) if tag == vt));
        assert_eq!(raw.vt, vt);
    }
}

/// Test: scalar images are host independent
#[test]
fn test_variant_scalar_image() {
    let raw = Variant::F64(1.0).encode();
    let mut buf = BytesMut::new();
    raw.write_scalar(&mut buf).unwrap();
    assert_eq!(&buf[..8], &[5, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(&buf[8..], &1.0f64.to_le_bytes());

    let mut back = RawVariant::read_scalar(&mut buf.freeze()).unwrap();
    assert_eq!(unsafe { Variant::decode(&mut back) }.unwrap(), Variant::F64(1.0));
}
