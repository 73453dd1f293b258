//! Loading compiled grammars: version gate, corruption and reloading.

use canopy::grammars::wren;
use canopy::language::{FORMAT_VERSION, MIN_COMPATIBLE_VERSION};
use canopy::{Language, LoadError, Parser};
use rstest::rstest;

use crate::helpers::source_fixtures::STATEMENTS;

#[test]
fn test_newer_grammar_is_rejected_with_version_mismatch() {
    let mut blob = wren::grammar_blob().to_vec();
    let bumped = FORMAT_VERSION + 1;
    blob[4..6].copy_from_slice(&bumped.to_le_bytes());

    let error = Language::load(&blob).unwrap_err();
    assert_eq!(
        error,
        LoadError::GrammarVersionMismatch {
            found: bumped,
            min: MIN_COMPATIBLE_VERSION,
            max: FORMAT_VERSION,
        }
    );
    assert!(error.to_string().contains("not supported"));
}

#[test]
fn test_bad_magic_is_rejected() {
    let mut blob = wren::grammar_blob().to_vec();
    blob[..4].copy_from_slice(b"WASM");
    assert_eq!(Language::load(&blob).unwrap_err(), LoadError::InvalidMagic);
}

#[rstest]
#[case::empty(0)]
#[case::header(1)]
#[case::quarter(25)]
#[case::half(50)]
#[case::almost_whole(99)]
fn test_truncated_grammar_is_rejected(#[case] percent: usize) {
    let blob = wren::grammar_blob();
    let len = blob.len() * percent / 100;
    let error = Language::load(&blob[..len]).unwrap_err();
    assert!(matches!(error, LoadError::UnexpectedEof { .. }), "{error:?}");
}

#[test]
fn test_reloaded_grammar_parses_identically() {
    let bundled = wren::language();
    let reloaded = Language::load(&bundled.to_blob()).unwrap();
    assert_eq!(reloaded.name(), "wren");
    assert_eq!(reloaded.symbol_count(), bundled.symbol_count());
    assert_eq!(reloaded.state_count(), bundled.state_count());

    let expected = Parser::new(bundled).parse(STATEMENTS, None).to_sexp();
    let actual = Parser::new(reloaded).parse(STATEMENTS, None).to_sexp();
    assert_eq!(actual, expected);
}
