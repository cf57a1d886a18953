use callcache::key::{Argument, Arguments, CacheKey, ToArgument, derive_key};
use proptest::prelude::*;

fn leaf() -> impl Strategy<Value = Argument> {
    prop_oneof![
        Just(Argument::Null),
        any::<bool>().prop_map(Argument::Bool),
        any::<i64>().prop_map(Argument::Int),
        any::<u64>().prop_map(Argument::UInt),
        ".{0,12}".prop_map(Argument::Text),
        proptest::collection::vec(any::<u8>(), 0..12).prop_map(Argument::Bytes),
    ]
}

fn argument() -> impl Strategy<Value = Argument> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        proptest::collection::vec(inner, 0..4).prop_map(Argument::Seq)
    })
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

    #[test]
    fn prop_structurally_equal_arguments_share_a_key(args in proptest::collection::vec(argument(), 0..5)) {
        let copy = args.clone();
        prop_assert_eq!(derive_key(&args), derive_key(&copy));
    }

    #[test]
    fn prop_single_string_is_passed_through(s in ".{0,40}") {
        prop_assert_eq!(derive_key(&[s.to_argument()]), CacheKey::Text(s));
    }

    #[test]
    fn prop_swapping_distinct_arguments_changes_the_key(a in any::<i64>(), b in any::<i64>()) {
        prop_assume!(a != b);
        prop_assert_ne!(derive_key(&(a, b).to_arguments()), derive_key(&(b, a).to_arguments()));
    }

    #[test]
    fn prop_integer_widths_agree(v in any::<i32>()) {
        prop_assert_eq!(derive_key(&(v, "x").to_arguments()), derive_key(&(i64::from(v), "x").to_arguments()));
    }
}
