use callcache::cache::ExpiryPolicy;
use chrono::{TimeDelta, Utc};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

    #[test]
    fn prop_ttl_expires_exactly_at_limit(ttl in 1u64..100_000, offset in 0u64..200_000) {
        let policy = ExpiryPolicy { eternal: false, time_to_live: Duration::from_secs(ttl), time_to_idle: Duration::ZERO };
        let t0 = Utc::now();
        let now = t0 + TimeDelta::seconds(i64::try_from(offset).unwrap());
        prop_assert_eq!(policy.is_expired(t0, now, now), offset >= ttl);
    }

    #[test]
    fn prop_eternal_never_expires(ttl in 0u64..1000, tti in 0u64..1000, offset in 0i64..1_000_000) {
        let policy = ExpiryPolicy { eternal: true, time_to_live: Duration::from_secs(ttl), time_to_idle: Duration::from_secs(tti) };
        let t0 = Utc::now();
        prop_assert!(!policy.is_expired(t0, t0, t0 + TimeDelta::seconds(offset)));
    }
}
