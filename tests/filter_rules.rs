// tests/filter_rules.rs

use proptest::prelude::*;

use testwatch::errors::TestwatchError;
use testwatch::filter::{TestFilter, DEFAULT_EXCLUDE_PATTERN, DEFAULT_EXCLUDE_TAGS};
use testwatch_test_utils::builders::TestIdentityBuilder;
use testwatch_test_utils::init_tracing;

/// The filter a default config resolves to: no includes, `slow` tag and
/// integration-test class names excluded.
fn default_filter() -> TestFilter {
    TestFilter::from_parts(
        None,
        Some(DEFAULT_EXCLUDE_TAGS.iter().map(|t| t.to_string()).collect()),
        None,
        Some(DEFAULT_EXCLUDE_PATTERN),
        None,
        None,
    )
    .expect("default filter must compile")
}

fn filter(
    include_tags: Option<&[&str]>,
    exclude_tags: Option<&[&str]>,
    include_pattern: Option<&str>,
    exclude_pattern: Option<&str>,
) -> TestFilter {
    let to_vec = |tags: &[&str]| tags.iter().map(|t| t.to_string()).collect::<Vec<_>>();
    TestFilter::from_parts(
        include_tags.map(to_vec),
        exclude_tags.map(to_vec),
        include_pattern,
        exclude_pattern,
        None,
        None,
    )
    .expect("filter must compile")
}

#[test]
fn unfiltered_selects_everything() {
    init_tracing();
    let filter = TestFilter::unfiltered();
    let plain = TestIdentityBuilder::new("com.acme.app.CheckoutTest").build();
    let tagged = TestIdentityBuilder::new("com.acme.app.SlowTest")
        .tag("slow")
        .build();
    assert!(filter.should_run(&plain));
    assert!(filter.should_run(&tagged));
}

#[test]
fn default_filter_excludes_slow_tag() {
    let filter = default_filter();
    let slow = TestIdentityBuilder::new("com.acme.app.MigrationTest")
        .tag("slow")
        .build();
    let fast = TestIdentityBuilder::new("com.acme.app.MigrationTest")
        .tag("fast")
        .build();
    assert!(!filter.should_run(&slow));
    assert!(filter.should_run(&fast));
}

#[test]
fn default_filter_excludes_integration_class_names() {
    let filter = default_filter();
    for excluded in [
        "com.acme.app.OrderIT",
        "com.acme.app.OrderITCase",
        "com.acme.app.ITChecker",
    ] {
        let test = TestIdentityBuilder::new(excluded).build();
        assert!(!filter.should_run(&test), "{excluded} should be excluded");
    }
    for included in ["com.acme.app.OrderTest", "com.acme.app.OrderITCaseHelper"] {
        let test = TestIdentityBuilder::new(included).build();
        assert!(filter.should_run(&test), "{included} should be included");
    }
}

#[test]
fn include_tags_override_exclude_tags() {
    // A test carrying both an included and an excluded tag is selected:
    // within an axis, the include list replaces the exclude list.
    let filter = filter(Some(&["smoke"]), Some(&["slow"]), None, None);
    let both = TestIdentityBuilder::new("com.acme.app.SmokeTest")
        .tag("smoke")
        .tag("slow")
        .build();
    assert!(filter.should_run(&both));

    let only_slow = TestIdentityBuilder::new("com.acme.app.SlowOnlyTest")
        .tag("slow")
        .build();
    assert!(!filter.should_run(&only_slow));
}

#[test]
fn include_tags_require_a_matching_tag() {
    let filter = filter(Some(&["smoke"]), None, None, None);
    let untagged = TestIdentityBuilder::new("com.acme.app.PlainTest").build();
    assert!(!filter.should_run(&untagged));
}

#[test]
fn include_pattern_overrides_exclude_pattern() {
    let filter = filter(None, None, Some(r".*Checkout.*"), Some(DEFAULT_EXCLUDE_PATTERN));
    // Would be excluded by the default pattern, but the include pattern is
    // set and matches.
    let it_class = TestIdentityBuilder::new("com.acme.app.CheckoutIT").build();
    assert!(filter.should_run(&it_class));

    let other = TestIdentityBuilder::new("com.acme.app.OrderTest").build();
    assert!(!filter.should_run(&other));
}

#[test]
fn patterns_match_the_whole_class_name() {
    let filter = filter(None, None, None, Some("Order.*"));
    // Anchored: the exclude only bites when it covers the full name.
    let bare = TestIdentityBuilder::new("OrderTest").build();
    let qualified = TestIdentityBuilder::new("com.acme.app.OrderTest").build();
    assert!(!filter.should_run(&bare));
    assert!(filter.should_run(&qualified));
}

#[test]
fn module_patterns_filter_on_coordinates() {
    let filter = TestFilter::from_parts(None, None, None, None, Some(r".*:core"), None)
        .expect("filter must compile");
    let core_test = TestIdentityBuilder::new("com.acme.core.UtilTest")
        .module("com.acme:core")
        .build();
    let app_test = TestIdentityBuilder::new("com.acme.app.MainTest")
        .module("com.acme:app")
        .build();
    assert!(filter.should_run(&core_test));
    assert!(!filter.should_run(&app_test));
}

#[test]
fn axes_combine_with_and() {
    // Tag axis passes, class axis rejects: the test stays out.
    let filter = filter(Some(&["smoke"]), None, Some(r".*Checkout.*"), None);
    let wrong_class = TestIdentityBuilder::new("com.acme.app.OrderTest")
        .tag("smoke")
        .build();
    let wrong_tag = TestIdentityBuilder::new("com.acme.app.CheckoutTest").build();
    let both_match = TestIdentityBuilder::new("com.acme.app.CheckoutTest")
        .tag("smoke")
        .build();
    assert!(!filter.should_run(&wrong_class));
    assert!(!filter.should_run(&wrong_tag));
    assert!(filter.should_run(&both_match));
}

#[test]
fn empty_lists_and_blank_patterns_count_as_unset() {
    let filter = TestFilter::from_parts(
        Some(Vec::new()),
        Some(vec!["  ".to_string()]),
        Some(""),
        Some("   "),
        None,
        None,
    )
    .expect("filter must compile");
    // Behaves exactly like an unfiltered filter.
    let slow_it = TestIdentityBuilder::new("com.acme.app.OrderIT")
        .tag("slow")
        .build();
    assert!(filter.should_run(&slow_it));
}

#[test]
fn invalid_pattern_is_rejected_at_build_time() {
    let err = TestFilter::from_parts(None, None, Some("(unclosed"), None, None, None)
        .expect_err("invalid regex must be rejected");
    assert!(matches!(err, TestwatchError::PatternError { .. }));
}

proptest! {
    /// Include always beats exclude within the tag axis, whatever the tag.
    #[test]
    fn include_tag_beats_exclude_for_any_tag(tag in "[a-z]{1,10}") {
        let filter = TestFilter::from_parts(
            Some(vec![tag.clone()]),
            Some(vec![tag.clone()]),
            None,
            None,
            None,
            None,
        ).expect("filter must compile");
        let test = TestIdentityBuilder::new("com.acme.app.AnyTest").tag(&tag).build();
        prop_assert!(filter.should_run(&test));
    }

    /// An unfiltered filter never rejects anything.
    #[test]
    fn unset_axes_select_any_class(class in "[A-Za-z][A-Za-z0-9]{0,24}") {
        let test = TestIdentityBuilder::new(&class).build();
        prop_assert!(TestFilter::unfiltered().should_run(&test));
    }

    /// The same pattern used as include and as exclude always disagree.
    #[test]
    fn include_and_exclude_of_same_pattern_are_opposites(
        class in "[A-Za-z][A-Za-z0-9]{0,24}",
    ) {
        let include = TestFilter::from_parts(
            None, None, Some(r"[A-Z].*"), None, None, None,
        ).expect("filter must compile");
        let exclude = TestFilter::from_parts(
            None, None, None, Some(r"[A-Z].*"), None, None,
        ).expect("filter must compile");
        let test = TestIdentityBuilder::new(&class).build();
        prop_assert_ne!(include.should_run(&test), exclude.should_run(&test));
    }
}
