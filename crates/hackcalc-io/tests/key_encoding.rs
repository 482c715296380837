#![cfg(not(target_arch = "wasm32"))]

use std::collections::HashMap;

use hackcalc_io::{encode, encode_char, KeyCode, KeySample};
use proptest::prelude::*;

const MAPPED: &str = "0123456789+-*/Ss=Cc.Nn";

#[test]
fn mapped_characters_are_distinct_except_case_pairs() {
    let mut by_code: HashMap<KeyCode, Vec<char>> = HashMap::new();
    for c in MAPPED.chars() {
        let code = encode_char(c);
        assert_ne!(code, KeyCode::Blank, "{c:?} must be mapped");
        by_code.entry(code).or_default().push(c);
    }

    for (code, chars) in &by_code {
        match chars.len() {
            1 => {}
            2 => {
                let lower: Vec<char> = chars.iter().map(|c| c.to_ascii_lowercase()).collect();
                assert_eq!(lower[0], lower[1], "{code:?} shared by {chars:?}");
            }
            _ => panic!("{code:?} shared by {chars:?}"),
        }
    }
    // 10 digits + 4 operators + sqrt + equal + clear + point + neg.
    assert_eq!(by_code.len(), 19);
}

proptest! {
    #[test]
    fn unmapped_characters_are_blank(c in any::<char>()) {
        prop_assume!(!MAPPED.contains(c));
        prop_assert_eq!(encode_char(c), KeyCode::Blank);
        prop_assert_eq!(encode(&KeySample::char(c)), KeyCode::Blank);
    }

    #[test]
    fn confirm_always_means_equal(c in proptest::option::of(any::<char>())) {
        let sample = KeySample { character: c, confirm: true };
        prop_assert_eq!(encode(&sample), KeyCode::Equal);
    }
}
