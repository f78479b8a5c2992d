//! Tests for the Relay policy engine.
//!
//! Coverage:
//! 1. Capability gating
//! 2. Deny precedence and rule ordering
//! 3. Default behaviour for unmatched paths
//! 4. Batch authorization
//! 5. Parsing of operations and intents
//! 6. `.` and `..` segments in paths

use super::*;

fn policy(capabilities: Capabilities, rules: &[(Effect, &str)]) -> AccessPolicy {
    AccessPolicy::new("test-command", capabilities).with_rules(
        rules
            .iter()
            .map(|(effect, pattern)| PathRule::new(pattern, *effect).unwrap()),
    )
}

// ============================================================================
// Capability Gate Tests
// ============================================================================

mod capability_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_disabled_write_denies_every_path() {
        let policy = policy(
            Capabilities::read_only(),
            &[(Effect::Allow, "**"), (Effect::Allow, "src/main.rs")],
        );

        for path in ["src/main.rs", "README.md", "a/b/c", ""] {
            let decision = policy.authorize(Operation::Write, Some(path));
            assert!(decision.is_denied(), "write to {path:?} must be denied");
            assert_eq!(decision.reason, REASON_CAPABILITY_DISABLED);
            assert_eq!(decision.matched_rule, None);
        }
    }

    #[test]
    fn test_disabled_capability_without_path() {
        let policy = policy(Capabilities::read_only(), &[]);
        let decision = policy.authorize(Operation::Execute, None);
        assert!(decision.is_denied());
        assert_eq!(decision.reason, "capability disabled");
    }

    #[test]
    fn test_enabled_capability_without_path_allows() {
        let policy = policy(Capabilities::full_access(), &[(Effect::Deny, "**")]);
        let decision = policy.authorize(Operation::Execute, None);
        assert!(decision.allowed);
        assert_eq!(decision.matched_rule, None);
    }

    #[test]
    fn test_capabilities_allows() {
        let caps = Capabilities {
            read_files: true,
            write_files: false,
            execute_shell: true,
        };
        assert!(caps.allows(Operation::Read));
        assert!(!caps.allows(Operation::Write));
        assert!(caps.allows(Operation::Execute));
        assert!(!Capabilities::none().allows(Operation::Read));
    }
}

// ============================================================================
// Rule Evaluation Tests
// ============================================================================

mod rule_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deny_takes_precedence_over_allow() {
        let policy = policy(
            Capabilities::full_access(),
            &[(Effect::Allow, "src/**"), (Effect::Deny, "src/secrets/**")],
        );

        let denied = policy.authorize(Operation::Write, Some("src/secrets/key"));
        assert!(denied.is_denied());
        assert_eq!(denied.matched_rule.as_deref(), Some("src/secrets/**"));

        let allowed = policy.authorize(Operation::Write, Some("src/main.rs"));
        assert!(allowed.allowed);
        assert_eq!(allowed.matched_rule.as_deref(), Some("src/**"));
    }

    #[test]
    fn test_first_deny_in_declaration_order_is_reported() {
        let policy = policy(
            Capabilities::full_access(),
            &[
                (Effect::Allow, "**"),
                (Effect::Deny, "**/*.pem"),
                (Effect::Deny, "**/secrets/**"),
            ],
        );

        let decision = policy.authorize(Operation::Read, Some("config/secrets/key.pem"));
        assert!(decision.is_denied());
        assert_eq!(decision.matched_rule.as_deref(), Some("**/*.pem"));
    }

    #[test]
    fn test_first_allow_is_reported() {
        let policy = policy(
            Capabilities::full_access(),
            &[(Effect::Allow, "src/*.rs"), (Effect::Allow, "src/**")],
        );
        let decision = policy.authorize(Operation::Write, Some("src/lib.rs"));
        assert!(decision.allowed);
        assert_eq!(decision.matched_rule.as_deref(), Some("src/*.rs"));
    }

    #[test]
    fn test_unmatched_path_uses_named_default() {
        assert_eq!(UNMATCHED_PATH_EFFECT, Effect::Allow);

        let empty = policy(Capabilities::full_access(), &[]);
        for path in ["anything", "deep/nested/file.txt", "/etc/passwd"] {
            let decision = empty.authorize(Operation::Write, Some(path));
            assert!(decision.allowed);
            assert_eq!(decision.matched_rule, None);
        }

        let unrelated = policy(Capabilities::full_access(), &[(Effect::Deny, "build/**")]);
        assert!(
            unrelated
                .authorize(Operation::Write, Some("src/main.rs"))
                .allowed
        );
    }

    #[test]
    fn test_deny_rule_blocks_secrets_anywhere() {
        let policy = policy(Capabilities::read_only(), &[(Effect::Deny, "**/secrets/**")]);
        assert!(
            policy
                .authorize(Operation::Read, Some("secrets/key.pem"))
                .is_denied()
        );
        assert!(
            policy
                .authorize(Operation::Read, Some("a/b/secrets/c"))
                .is_denied()
        );
        assert!(
            policy
                .authorize(Operation::Read, Some("secretsx/key.pem"))
                .allowed
        );
    }

    #[test]
    fn test_empty_rule_pattern_rejected() {
        assert_eq!(PathRule::allow("  "), Err(PolicyError::EmptyPattern));
        assert!(matches!(
            PathRule::deny("a//b"),
            Err(PolicyError::InvalidPattern { .. })
        ));
    }
}

// ============================================================================
// Path Traversal Tests
// ============================================================================

mod traversal_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn deploy() -> AccessPolicy {
        policy(
            Capabilities::full_access(),
            &[(Effect::Allow, "deploy/**"), (Effect::Deny, "deploy/prod/**")],
        )
    }

    #[test]
    fn test_parent_segment_cannot_escape_deny() {
        let decision =
            deploy().authorize(Operation::Write, Some("deploy/api/../prod/secrets.yaml"));
        assert!(decision.is_denied());
        assert_eq!(decision.matched_rule.as_deref(), Some("deploy/prod/**"));

        let decision = deploy().authorize(Operation::Read, Some("deploy/./prod/secrets.yaml"));
        assert!(decision.is_denied());
        assert_eq!(decision.matched_rule.as_deref(), Some("deploy/prod/**"));
    }

    #[test]
    fn test_dot_segments_resolve_before_matching() {
        let policy = policy(
            Capabilities::full_access(),
            &[(Effect::Deny, "a/b"), (Effect::Deny, "src/secrets/*")],
        );
        for path in ["a/./b", "a/x/../b", "src/../tests/../src/secrets/x"] {
            assert!(
                policy.authorize(Operation::Write, Some(path)).is_denied(),
                "{path} must be denied"
            );
        }

        let allowed =
            deploy().authorize(Operation::Write, Some("deploy/prod/../api/app.yaml"));
        assert!(allowed.allowed);
        assert_eq!(allowed.matched_rule.as_deref(), Some("deploy/**"));
    }

    #[test]
    fn test_root_escape_fails_closed() {
        let open = policy(Capabilities::full_access(), &[(Effect::Allow, "**")]);
        for path in ["../outside", "deploy/../../etc/passwd", "/../etc/passwd", ".."] {
            let decision = open.authorize(Operation::Read, Some(path));
            assert!(decision.is_denied(), "{path} must be denied");
            assert_eq!(decision.reason, REASON_PATH_ESCAPES_ROOT);
            assert_eq!(decision.matched_rule, None);
        }
    }

    #[test]
    fn test_capability_gate_still_first() {
        let decision = policy(Capabilities::read_only(), &[])
            .authorize(Operation::Write, Some("../outside"));
        assert_eq!(decision.reason, REASON_CAPABILITY_DISABLED);
    }
}

// ============================================================================
// Batch Authorization Tests
// ============================================================================

mod batch_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_authorize_all_allows() {
        let policy = policy(Capabilities::full_access(), &[(Effect::Deny, ".env")]);
        let intents = vec![
            Intent::read("src/lib.rs"),
            Intent::write("src/lib.rs"),
            Intent::execute(),
        ];
        let decisions = authorize_all(&policy, &intents).unwrap();
        assert_eq!(decisions.len(), 3);
        assert!(decisions.iter().all(|d| d.allowed));
    }

    #[test]
    fn test_authorize_all_stops_at_first_denial() {
        let policy = policy(Capabilities::read_only(), &[]);
        let intents = vec![
            Intent::read("src/lib.rs"),
            Intent::write("src/lib.rs"),
            Intent::execute(),
        ];
        let (intent, decision) = authorize_all(&policy, &intents).unwrap_err();
        assert_eq!(intent, Intent::write("src/lib.rs"));
        assert_eq!(decision.reason, REASON_CAPABILITY_DISABLED);
    }
}

// ============================================================================
// Parsing Tests
// ============================================================================

mod parsing_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_operation_from_str() {
        assert_eq!("read".parse::<Operation>().unwrap(), Operation::Read);
        assert_eq!("W".parse::<Operation>().unwrap(), Operation::Write);
        assert_eq!("exec".parse::<Operation>().unwrap(), Operation::Execute);
        assert!(matches!(
            "delete".parse::<Operation>(),
            Err(PolicyError::UnknownOperation(_))
        ));
    }

    #[test]
    fn test_intent_from_str() {
        assert_eq!(
            "write:src/main.rs".parse::<Intent>().unwrap(),
            Intent::write("src/main.rs")
        );
        assert_eq!("execute".parse::<Intent>().unwrap(), Intent::execute());
        assert_eq!("execute:".parse::<Intent>().unwrap(), Intent::execute());
        assert_eq!(Intent::read("a/b").to_string(), "read:a/b");
    }

    #[test]
    fn test_path_rule_serde() {
        let rule: PathRule =
            serde_json::from_str(r#"{"pattern": "src/**", "effect": "deny"}"#).unwrap();
        assert_eq!(rule.effect, Effect::Deny);
        assert_eq!(rule.pattern.as_str(), "src/**");

        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(json, r#"{"pattern":"src/**","effect":"deny"}"#);
    }

    #[test]
    fn test_decision_display() {
        let decision = PermissionDecision::deny("blocked").with_rule("**/secrets/**");
        assert_eq!(decision.to_string(), "DENY (blocked; rule '**/secrets/**')");
        assert_eq!(PermissionDecision::allow("ok").to_string(), "ALLOW (ok)");
    }
}
