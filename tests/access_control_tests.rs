//! Access pattern integration tests
//!
//! Covers the pattern contract as seen through the public API:
//! - Glob semantics (`**`, `*`, `?`)
//! - Operation restrictions on path patterns
//! - Composite AND/OR voting
//! - Time-gate vetoes
//! - Custom predicates
//!
//! Patterns are validated directly here; evaluator-level merging lives in
//! `evaluator_tests.rs`.

use agent_warden::access_control::{
    AccessContext, AccessDecision, AccessPattern, CompositePattern, CustomPattern, Glob,
    OUTSIDE_WINDOW_REASON, OperationKind, PathPattern, TimeGatedPattern,
};
use chrono::{DateTime, FixedOffset, TimeZone, Utc, Weekday};

// =============================================================================
// Test Helpers
// =============================================================================

fn ctx(resource: &str, operation: OperationKind) -> AccessContext {
    AccessContext::new(resource, operation, "tester")
}

fn ctx_at(resource: &str, operation: OperationKind, at: DateTime<Utc>) -> AccessContext {
    ctx(resource, operation).with_timestamp(at)
}

/// Monday 2024-03-04 at the given UTC hour
fn monday_at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap()
}

fn files(id: &str, globs: &[&str], allow: bool) -> AccessPattern {
    AccessPattern::FileSystem(PathPattern::new(id, globs, allow).unwrap())
}

fn validate(pattern: &AccessPattern, ctx: &AccessContext) -> AccessDecision {
    assert!(pattern.applies_to(ctx), "pattern must apply before validate");
    tokio_test::block_on(pattern.validate(ctx)).unwrap()
}

// =============================================================================
// 1. Glob Semantics
// =============================================================================

mod globs {
    use super::*;

    #[test]
    fn test_double_star_extension() {
        let glob = Glob::new("**/*.tsx").unwrap();
        assert!(glob.is_match("src/components/Button.tsx"));
        assert!(glob.is_match("App.tsx"));
        assert!(!glob.is_match("src/components/Button.ts"));
    }

    #[test]
    fn test_double_star_directory() {
        let glob = Glob::new("**/migrations/**").unwrap();
        assert!(glob.is_match("database/migrations/001.sql"));
        assert!(glob.is_match("migrations/2024/002.sql"));
        assert!(!glob.is_match("database/migration.sql"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let glob = Glob::new("src/*.rs").unwrap();
        assert!(glob.is_match("src/lib.rs"));
        assert!(!glob.is_match("src/access_control/mod.rs"));
    }

    #[test]
    fn test_question_mark_is_one_character() {
        let glob = Glob::new("logs/day-?.log").unwrap();
        assert!(glob.is_match("logs/day-1.log"));
        assert!(!glob.is_match("logs/day-10.log"));
        assert!(!glob.is_match("logs/day-/.log"));
    }

    #[test]
    fn test_dots_are_literal() {
        let glob = Glob::new("public.users").unwrap();
        assert!(glob.is_match("public.users"));
        assert!(!glob.is_match("publicXusers"));
    }

    #[test]
    fn test_empty_glob_rejected() {
        assert!(Glob::new("").is_err());
    }
}

// =============================================================================
// 2. Path Patterns
// =============================================================================

mod path_patterns {
    use super::*;

    #[test]
    fn test_any_glob_matches() {
        let pattern = files("ui", &["**/*.tsx", "**/*.jsx"], true);
        assert!(pattern.applies_to(&ctx("src/App.jsx", OperationKind::Read)));
        assert!(pattern.applies_to(&ctx("src/App.tsx", OperationKind::Read)));
        assert!(!pattern.applies_to(&ctx("src/App.vue", OperationKind::Read)));
    }

    #[test]
    fn test_operation_restriction_is_not_a_denial() {
        let pattern = AccessPattern::FileSystem(
            PathPattern::new("tsx-edit", &["**/*.tsx"], true)
                .unwrap()
                .with_operations([OperationKind::Edit]),
        );
        assert!(pattern.applies_to(&ctx("a/B.tsx", OperationKind::Edit)));
        assert!(!pattern.applies_to(&ctx("a/B.tsx", OperationKind::Delete)));
    }

    #[test]
    fn test_reason_names_pattern_and_glob() {
        let pattern = files("no-secrets", &["secrets/**"], false);
        let decision = validate(&pattern, &ctx("secrets/key.pem", OperationKind::Read));

        assert!(decision.is_denied());
        assert_eq!(decision.source, "no-secrets");
        assert!(decision.reason.contains("no-secrets"));
        assert!(decision.reason.contains("secrets/**"));
    }

    #[test]
    fn test_table_and_endpoint_variants() {
        let table = AccessPattern::Table(PathPattern::new("public", &["public.*"], true).unwrap());
        let endpoint =
            AccessPattern::Endpoint(PathPattern::new("admin", &["api/admin/**"], false).unwrap());

        assert!(validate(&table, &ctx("public.orders", OperationKind::Read)).is_allowed());
        assert!(validate(&endpoint, &ctx("api/admin/users", OperationKind::Execute)).is_denied());
        assert_eq!(table.kind(), "table");
        assert_eq!(endpoint.kind(), "endpoint");
    }

    #[test]
    fn test_empty_glob_list_rejected() {
        let globs: [&str; 0] = [];
        assert!(PathPattern::new("none", &globs, true).is_err());
    }
}

// =============================================================================
// 3. Composite Patterns
// =============================================================================

mod composite {
    use super::*;

    #[test]
    fn test_and_allows_when_every_applicable_child_allows() {
        let pattern: AccessPattern = CompositePattern::and(
            "src-and-rs",
            vec![
                files("src", &["src/**"], true),
                files("rs", &["**/*.rs"], true),
                files("docs", &["docs/**"], false),
            ],
        )
        .unwrap()
        .into();

        // "docs" does not apply and must not vote
        let decision = validate(&pattern, &ctx("src/lib.rs", OperationKind::Edit));
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_and_single_denial_surfaces_reason() {
        let pattern: AccessPattern = CompositePattern::and(
            "guarded",
            vec![
                files("src", &["src/**"], true),
                files("no-gen", &["**/generated/**"], false),
            ],
        )
        .unwrap()
        .into();

        let decision = validate(&pattern, &ctx("src/generated/api.rs", OperationKind::Edit));
        assert!(decision.is_denied());
        assert!(decision.reason.contains("no-gen"));
        assert_eq!(decision.source, "guarded");
    }

    #[test]
    fn test_or_first_allow_wins() {
        let pattern: AccessPattern = CompositePattern::or(
            "either",
            vec![
                files("deny-all", &["**"], false),
                files("allow-md", &["**/*.md"], true),
            ],
        )
        .unwrap()
        .into();

        assert!(validate(&pattern, &ctx("docs/intro.md", OperationKind::Write)).is_allowed());
    }

    #[test]
    fn test_or_aggregates_every_denial() {
        let pattern: AccessPattern = CompositePattern::or(
            "neither",
            vec![
                files("first", &["**"], false),
                files("second", &["**/*.pem"], false),
            ],
        )
        .unwrap()
        .into();

        let decision = validate(&pattern, &ctx("secrets/key.pem", OperationKind::Read));
        assert!(decision.is_denied());
        assert!(decision.reason.contains("first"));
        assert!(decision.reason.contains("second"));
        assert_eq!(decision.metadata["denials"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_applies_when_any_child_applies() {
        let pattern: AccessPattern = CompositePattern::and(
            "mixed",
            vec![files("a", &["a/**"], true), files("b", &["b/**"], true)],
        )
        .unwrap()
        .into();

        assert!(pattern.applies_to(&ctx("b/file", OperationKind::Read)));
        assert!(!pattern.applies_to(&ctx("c/file", OperationKind::Read)));
    }

    #[test]
    fn test_nested_composites() {
        let inner: AccessPattern = CompositePattern::or(
            "inner",
            vec![files("ts", &["**/*.ts"], true), files("tsx", &["**/*.tsx"], true)],
        )
        .unwrap()
        .into();
        let outer: AccessPattern = CompositePattern::and(
            "outer",
            vec![inner, files("no-legacy", &["**/legacy/**"], false)],
        )
        .unwrap()
        .into();

        assert!(validate(&outer, &ctx("src/App.tsx", OperationKind::Edit)).is_allowed());
        assert!(validate(&outer, &ctx("src/legacy/Old.tsx", OperationKind::Edit)).is_denied());
    }

    #[test]
    fn test_no_children_rejected() {
        assert!(CompositePattern::and("empty", vec![]).is_err());
    }
}

// =============================================================================
// 4. Time-Gated Patterns
// =============================================================================

mod time_gated {
    use super::*;

    fn office_hours(base: AccessPattern) -> AccessPattern {
        TimeGatedPattern::new("office", base, 9, 17).unwrap().into()
    }

    #[test]
    fn test_inside_window_delegates() {
        let pattern = office_hours(files("deploy", &["deploy/**"], true));
        let decision = validate(
            &pattern,
            &ctx_at("deploy/prod", OperationKind::Execute, monday_at(10)),
        );
        assert!(decision.is_allowed());
        assert_eq!(decision.source, "deploy");
    }

    #[test]
    fn test_outside_window_vetoes_allowing_base() {
        let pattern = office_hours(files("deploy", &["deploy/**"], true));
        let decision = validate(
            &pattern,
            &ctx_at("deploy/prod", OperationKind::Execute, monday_at(20)),
        );
        assert!(decision.is_denied());
        assert_eq!(decision.reason, OUTSIDE_WINDOW_REASON);
    }

    #[test]
    fn test_end_hour_is_exclusive() {
        let pattern = office_hours(files("deploy", &["deploy/**"], true));
        assert!(
            validate(&pattern, &ctx_at("deploy/x", OperationKind::Execute, monday_at(9)))
                .is_allowed()
        );
        assert!(
            validate(&pattern, &ctx_at("deploy/x", OperationKind::Execute, monday_at(17)))
                .is_denied()
        );
    }

    #[test]
    fn test_window_wraps_midnight() {
        let pattern: AccessPattern =
            TimeGatedPattern::new("night", files("batch", &["jobs/**"], true), 22, 6)
                .unwrap()
                .into();
        assert!(validate(&pattern, &ctx_at("jobs/a", OperationKind::Execute, monday_at(23))).is_allowed());
        assert!(validate(&pattern, &ctx_at("jobs/a", OperationKind::Execute, monday_at(3))).is_allowed());
        assert!(validate(&pattern, &ctx_at("jobs/a", OperationKind::Execute, monday_at(12))).is_denied());
    }

    #[test]
    fn test_weekday_allow_list() {
        let pattern: AccessPattern =
            TimeGatedPattern::new("weekend", files("any", &["**"], true), 0, 24)
                .unwrap()
                .with_weekdays([Weekday::Sat, Weekday::Sun])
                .into();
        let decision = validate(&pattern, &ctx_at("x", OperationKind::Read, monday_at(12)));
        assert!(decision.is_denied());
        assert_eq!(decision.reason, OUTSIDE_WINDOW_REASON);
    }

    #[test]
    fn test_offset_shifts_window() {
        // 08:00 UTC is 10:00 at UTC+2
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let pattern: AccessPattern =
            TimeGatedPattern::new("cest", files("any", &["**"], true), 9, 17)
                .unwrap()
                .with_offset(offset)
                .into();
        assert!(validate(&pattern, &ctx_at("x", OperationKind::Read, monday_at(8))).is_allowed());
    }

    #[test]
    fn test_invalid_window_rejected() {
        assert!(TimeGatedPattern::new("bad", files("any", &["**"], true), 24, 3).is_err());
        assert!(TimeGatedPattern::new("bad", files("any", &["**"], true), 3, 25).is_err());
    }
}

// =============================================================================
// 5. Custom Patterns
// =============================================================================

mod custom {
    use super::*;

    fn critical_guard() -> AccessPattern {
        CustomPattern::from_fn(
            "critical-guard",
            |ctx: &AccessContext| {
                ctx.operation() == OperationKind::Delete && ctx.resource().starts_with("critical/")
            },
            |_: &AccessContext| {
                Ok::<_, String>(AccessDecision::deny(
                    "critical-guard",
                    "Deleting critical files is not allowed",
                ))
            },
        )
        .with_priority(50)
        .into()
    }

    #[test]
    fn test_custom_filter_and_decision() {
        let pattern = critical_guard();
        assert!(!pattern.applies_to(&ctx("critical/db.sqlite", OperationKind::Read)));

        let decision = validate(&pattern, &ctx("critical/db.sqlite", OperationKind::Delete));
        assert!(decision.is_denied());
        assert_eq!(decision.source, "critical-guard");
        assert_eq!(pattern.priority(), 50);
    }

    #[tokio::test]
    async fn test_async_predicate_reads_metadata() {
        let pattern: AccessPattern = CustomPattern::new(
            "ticket-required",
            |_: &AccessContext| true,
            |ctx: AccessContext| async move {
                let has_ticket = ctx.metadata_value("ticket").is_some();
                Ok::<_, String>(AccessDecision::new(has_ticket, "ticket-required", "ticket check"))
            },
        )
        .into();

        let with_ticket = ctx("infra/main.tf", OperationKind::Write).with_metadata("ticket", "OPS-12");
        assert!(pattern.validate(&with_ticket).await.unwrap().is_allowed());

        let without = ctx("infra/main.tf", OperationKind::Write);
        assert!(pattern.validate(&without).await.unwrap().is_denied());
    }

    #[tokio::test]
    async fn test_predicate_error_is_reported() {
        let pattern: AccessPattern = CustomPattern::new(
            "flaky",
            |_: &AccessContext| true,
            |_: AccessContext| async { Err::<AccessDecision, _>("backend unavailable") },
        )
        .into();

        let err = pattern
            .validate(&ctx("x", OperationKind::Read))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("backend unavailable"));
    }

    #[test]
    fn test_custom_inside_composite() {
        let pattern: AccessPattern = CompositePattern::and(
            "safe-delete",
            vec![files("workspace", &["**"], true), critical_guard()],
        )
        .unwrap()
        .into();

        assert!(validate(&pattern, &ctx("critical/x", OperationKind::Delete)).is_denied());
        assert!(validate(&pattern, &ctx("tmp/x", OperationKind::Delete)).is_allowed());
    }
}
