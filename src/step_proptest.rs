//! Property-based tests for step transforms and rendering.
//!
//! These tests use proptest to generate random steps and paths and verify
//! that prefixing, undoing and rendering behave the same for every input.

#[cfg(test)]
mod proptest_tests {
    use std::path::PathBuf;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use proptest::prelude::*;

    use crate::step::{join_prefix, Action, Step, Steps};

    fn relative_path() -> impl Strategy<Value = PathBuf> {
        prop::collection::vec("[a-z0-9._]{1,8}", 0..4)
            .prop_map(|segments| segments.iter().collect::<PathBuf>())
    }

    fn any_step() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::Noop),
            "[ -~]{0,20}".prop_map(Step::comment),
            relative_path().prop_map(Step::mkdir),
            relative_path().prop_map(Step::mkdir_create_only),
            relative_path().prop_map(Step::rmdir),
            (relative_path(), "[ -~]{0,20}").prop_map(|(p, c)| Step::write(p, c)),
            (relative_path(), prop::collection::vec(any::<u8>(), 0..32))
                .prop_map(|(p, c)| Step::write_binary(p, c)),
            relative_path().prop_map(Step::remove),
            (relative_path(), relative_path()).prop_map(|(t, l)| Step::symlink(t, l)),
        ]
    }

    // ============================================================================
    // prefix property tests
    // ============================================================================

    proptest! {
        /// Property: prefixing twice equals prefixing once with the joined prefix
        #[test]
        fn prefix_is_associative(step in any_step(), inner in relative_path(), outer in relative_path()) {
            let twice = step.clone().prefix(&inner).prefix(&outer);
            let once = step.prefix(&join_prefix(&outer, &inner));
            prop_assert_eq!(twice, once);
        }

        /// Property: prefixing never changes the action
        #[test]
        fn prefix_preserves_action(step in any_step(), prefix in relative_path()) {
            let action = step.action();
            prop_assert_eq!(step.prefix(&prefix).action(), action);
        }

        /// Property: both ends of a symlink move under the prefix
        #[test]
        fn prefix_moves_both_symlink_ends(
            target in relative_path(),
            link in relative_path(),
            prefix in "[a-z]{1,8}",
        ) {
            match Step::symlink(target, link).prefix(std::path::Path::new(&prefix)) {
                Step::Symlink { target, link } => {
                    prop_assert!(target.starts_with(&prefix));
                    prop_assert!(link.starts_with(&prefix));
                }
                other => prop_assert!(false, "unexpected step {}", other),
            }
        }

        /// Property: undo commutes with prefixing
        #[test]
        fn undo_commutes_with_prefix(step in any_step(), prefix in relative_path()) {
            prop_assert_eq!(
                step.clone().prefix(&prefix).undo(),
                step.undo().prefix(&prefix)
            );
        }
    }

    // ============================================================================
    // teardown property tests
    // ============================================================================

    proptest! {
        /// Property: teardown only removes links and directories
        #[test]
        fn teardown_only_removes(steps in prop::collection::vec(any_step(), 0..20)) {
            let steps = Steps::from(steps);
            let teardown = steps.teardown();
            prop_assert_eq!(teardown.len(), steps.len());
            for step in &teardown {
                prop_assert!(matches!(
                    step.action(),
                    Action::Noop | Action::Rmdir | Action::Remove
                ));
            }
        }

        /// Property: the first created directory is the last removed
        #[test]
        fn teardown_reverses_order(first in relative_path(), rest in prop::collection::vec(any_step(), 0..10)) {
            let mut steps = Steps::from(vec![Step::mkdir(first.clone())]);
            steps.extend(rest);
            let teardown = steps.teardown();
            prop_assert_eq!(teardown.as_slice().last(), Some(&Step::rmdir(first)));
        }
    }

    // ============================================================================
    // shell rendering property tests
    // ============================================================================

    proptest! {
        /// Property: one line per step that is not a no-op
        #[test]
        fn one_line_per_step(steps in prop::collection::vec(any_step(), 0..20)) {
            let steps = Steps::from(steps);
            let expected = steps.iter().filter(|s| s.action() != Action::Noop).count();
            prop_assert_eq!(steps.shell_args().lines().count(), expected);
        }

        /// Property: binary payloads survive the base64 rendering
        #[test]
        fn write_binary_round_trips(content in prop::collection::vec(any::<u8>(), 0..64)) {
            let args = Step::write_binary("report_desc", content.clone()).shell_args();
            let payload = args[1].trim_matches('"');
            prop_assert_eq!(STANDARD.decode(payload).unwrap(), content);
        }
    }
}
