//! Address routing properties

use proptest::prelude::*;
use rapidsms_provider::{ErrorKind, Locator, ResourceKind, Router};

fn kind_strategy() -> impl Strategy<Value = ResourceKind> {
    prop::sample::select(ResourceKind::ALL.to_vec())
}

proptest! {
    #[test]
    fn item_locators_round_trip(kind in kind_strategy(), id in 0..i64::MAX) {
        let router = Router::default();
        let locator = Locator::item(kind, id);

        prop_assert_eq!(router.resolve(&router.uri_for(&locator)).unwrap(), locator);
        prop_assert_eq!(router.resolve(&locator.path()).unwrap(), locator);
    }

    #[test]
    fn unknown_segments_are_rejected(segment in "[a-z]{1,12}") {
        prop_assume!(ResourceKind::ALL.iter().all(|kind| kind.path() != segment));
        let err = Router::default().resolve(&segment).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::UnknownResource);
    }

    #[test]
    fn foreign_authorities_are_rejected(authority in "[a-z]{1,8}\\.[a-z]{1,8}") {
        let router = Router::default();
        prop_assume!(authority != router.authority());
        let uri = format!("content://{authority}/message");
        prop_assert!(router.resolve(&uri).is_err());
    }
}

#[test]
fn test_custom_authority() {
    let router = Router::new("org.example.sms");
    let locator = router.resolve("content://org.example.sms/monitor/7").expect("resolve failed");
    assert_eq!(locator, Locator::item(ResourceKind::Monitor, 7));
    assert_eq!(router.uri_for(&locator), "content://org.example.sms/monitor/7");
    assert!(router.resolve("content://org.rapidandroid.provider/monitor/7").is_err());
}

#[test]
fn test_overflowing_id_is_unknown() {
    let err = Router::default()
        .resolve("message/99999999999999999999")
        .expect_err("overflow should fail");
    assert_eq!(err.kind(), ErrorKind::UnknownResource);
}

#[test]
fn test_wrong_scheme_is_unknown() {
    assert!(Router::default().resolve("http://org.rapidandroid.provider/message").is_err());
}
