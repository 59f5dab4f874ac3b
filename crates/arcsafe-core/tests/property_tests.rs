//! Property-based tests for core security validation.
//!
//! These tests use proptest to generate arbitrary inputs and verify
//! security properties hold across a wide range of cases.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use arcsafe_core::ErrorKind;
use arcsafe_core::ExtractionError;
use arcsafe_core::QuotaResource;
use arcsafe_core::ThresholdConfig;
use arcsafe_core::copy::CopyBuffer;
use arcsafe_core::copy::copy_with_buffer;
use arcsafe_core::security::PathResolver;
use arcsafe_core::security::RatioBasis;
use arcsafe_core::security::ThresholdEnforcer;
use arcsafe_core::security::validate_symlink;
use arcsafe_core::test_utils::TarTestBuilder;
use arcsafe_core::test_utils::write_archive;
use arcsafe_core::types::DestDir;
use arcsafe_core::types::EntryDescriptor;
use arcsafe_core::types::SafePath;
use proptest::prelude::*;
use std::io::Cursor;
use std::path::Path;
use std::path::PathBuf;
use tempfile::TempDir;

fn create_test_dest() -> (TempDir, DestDir) {
    let temp = TempDir::new().expect("failed to create temp dir");
    let dest = DestDir::new(temp.path()).expect("failed to create dest");
    (temp, dest)
}

proptest! {
    /// Any name with a `..` component is rejected, wherever it sits.
    #[test]
    fn prop_parent_traversal_rejected(
        prefix in "([a-z]+/){0,5}",
        suffix in "([a-z]+/?){0,5}",
        separator in prop::sample::select(vec!["/", "\\"]),
    ) {
        let name = format!("{prefix}..{separator}{suffix}");
        let resolver = PathResolver::new(None);
        let result = resolver.resolve(&name);
        prop_assert!(
            matches!(result, Err(ExtractionError::PathTraversal { .. })),
            "{name:?} should be rejected"
        );
    }

    /// Plain relative names always resolve to a descendant of the root.
    #[test]
    fn prop_valid_relative_paths_confined(
        components in prop::collection::vec("[a-zA-Z0-9_.-]{1,20}", 1..6)
    ) {
        prop_assume!(components.iter().all(|c| c != "." && c != ".."));
        let (_temp, dest) = create_test_dest();
        let resolver = PathResolver::new(Some(dest.clone()));
        let name = components.join("/");

        let safe = resolver.resolve(&name).unwrap();
        let joined = dest.join(&safe);
        prop_assert!(joined.starts_with(dest.as_path()));
        prop_assert!(joined != dest.as_path());
    }

    /// Normalization never produces absolute or `..` components.
    #[test]
    fn prop_normalized_paths_are_relative(name in "[a-z./\\\\]{1,30}") {
        if let Ok(path) = SafePath::normalize(&name) {
            prop_assert!(path.is_relative());
            prop_assert!(
                path.components()
                    .all(|c| matches!(c, std::path::Component::Normal(_)))
            );
        }
    }

    /// Absolute names are rejected.
    #[test]
    fn prop_absolute_names_rejected(rest in "[a-z]{1,10}(/[a-z]{1,10}){0,3}") {
        let resolver = PathResolver::new(None);
        let name = format!("/{rest}");
        prop_assert!(resolver.resolve(&name).is_err());
    }

    /// A symlink target escapes exactly when its `..` count exceeds the
    /// link's directory depth.
    #[test]
    fn prop_symlink_parent_refs(depth in 0usize..6, parents in 0usize..10) {
        let resolver = PathResolver::new(None);
        let mut link_name: Vec<String> = (0..depth).map(|i| format!("d{i}")).collect();
        link_name.push("link".into());
        let link = resolver.resolve(&link_name.join("/")).unwrap();
        let target = PathBuf::from("../".repeat(parents) + "file.txt");

        let result = validate_symlink(&resolver, &link, &target);
        if parents > depth {
            prop_assert!(
                matches!(result, Err(ExtractionError::SymlinkEscape { .. })),
                "expected SymlinkEscape, got {:?}",
                result
            );
        } else {
            prop_assert!(result.is_ok());
        }
    }

    // ========================================================================
    // THRESHOLD ENFORCER PROPERTY TESTS
    // ========================================================================

    /// Object count is enforced exactly for any limit.
    #[test]
    fn prop_object_limit_enforced(max in 1u64..200, entries in 1u64..400) {
        let config = ThresholdConfig::unlimited().with_max_objects(Some(max));
        let mut enforcer = ThresholdEnforcer::new(config, RatioBasis::PerMember(1 << 20));

        let mut accepted = 0;
        for i in 0..entries {
            let entry = EntryDescriptor::file(format!("f{i}"), 1).with_compressed_size(1);
            match enforcer.admit(&entry) {
                Ok(admission) => {
                    enforcer.commit(admission, 1, Path::new("f")).unwrap();
                    accepted += 1;
                }
                Err(err) => {
                    prop_assert_eq!(err.kind(), ErrorKind::ObjectCountExceeded);
                    break;
                }
            }
        }
        prop_assert_eq!(accepted, max.min(entries));
        prop_assert_eq!(enforcer.totals().objects, accepted);
    }

    /// Totals only ever reflect accepted entries and never exceed the limit.
    #[test]
    fn prop_size_limit_never_exceeded(
        max_size in 1000u64..100_000,
        sizes in prop::collection::vec(0u64..5000, 1..50),
    ) {
        let config = ThresholdConfig::unlimited().with_max_size(Some(max_size));
        let mut enforcer = ThresholdEnforcer::new(config, RatioBasis::PerMember(1 << 20));

        for (i, size) in sizes.into_iter().enumerate() {
            let before = enforcer.totals();
            let entry = EntryDescriptor::file(format!("f{i}"), size).with_compressed_size(size);
            match enforcer.admit(&entry) {
                Ok(admission) => enforcer.commit(admission, size, Path::new("f")).unwrap(),
                Err(err) => {
                    prop_assert_eq!(err.kind(), ErrorKind::SizeExceeded);
                    prop_assert_eq!(enforcer.totals(), before);
                    break;
                }
            }
            prop_assert!(enforcer.totals().uncompressed <= max_size);
        }
    }

    /// With every limit breached at once, the object count is reported.
    #[test]
    fn prop_breach_order_is_deterministic(size in 2000u64..1_000_000) {
        let config = ThresholdConfig::unlimited()
            .with_max_objects(Some(0))
            .with_max_size(Some(1000))
            .with_max_ratio(Some(1.0));
        let enforcer = ThresholdEnforcer::new(config, RatioBasis::PerMember(1 << 20));
        let entry = EntryDescriptor::file("bomb", size).with_compressed_size(1);

        let err = enforcer.admit(&entry).unwrap_err();
        prop_assert!(matches!(
            err.quota_resource(),
            Some(QuotaResource::ObjectCount { current: 1, max: 0 })
        ), "expected ObjectCount quota violation");

        let no_count =
            ThresholdEnforcer::new(config.with_max_objects(None), RatioBasis::PerMember(1 << 20));
        prop_assert_eq!(
            no_count.admit(&entry).unwrap_err().kind(),
            ErrorKind::SizeExceeded
        );
    }

    /// Archives within every limit validate with exact totals.
    #[test]
    fn prop_valid_archive_totals(
        files in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 1..20)
    ) {
        let temp = TempDir::new().unwrap();
        let mut builder = TarTestBuilder::new();
        for (i, content) in files.iter().enumerate() {
            builder = builder.add_file(&format!("dir/file{i}.bin"), content);
        }
        let path = write_archive(temp.path(), "a.tar", &builder.build());
        let expected: u64 = files.iter().map(|f| f.len() as u64).sum();

        let report = arcsafe_core::validate(&path, &ThresholdConfig::builtin()).unwrap();
        prop_assert_eq!(report.entries, files.len() as u64);
        prop_assert_eq!(report.uncompressed_bytes, expected);
    }

    /// The checkpoint stops a copy before the chunk that breaches it.
    #[test]
    fn prop_copy_stops_at_limit(
        data in prop::collection::vec(any::<u8>(), 1..200_000),
        limit in 0u64..200_000,
    ) {
        let mut output = Vec::new();
        let mut buffer = CopyBuffer::new();
        let result = copy_with_buffer(&mut Cursor::new(&data), &mut output, &mut buffer, |n| {
            if n > limit {
                Err(ExtractionError::QuotaExceeded {
                    resource: QuotaResource::TotalSize { current: n, max: limit },
                })
            } else {
                Ok(())
            }
        });

        prop_assert!(output.len() as u64 <= limit.min(data.len() as u64));
        if data.len() as u64 <= limit {
            prop_assert_eq!(result.unwrap(), data.len() as u64);
            prop_assert_eq!(output, data);
        } else {
            prop_assert!(result.is_err());
        }
    }
}
