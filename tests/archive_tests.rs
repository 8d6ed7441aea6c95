//! Integration tests for mounting, lookup and extraction across several archives


use modbridge::audit::{MemoryAuditSink, NullAuditSink, Verdict};
use modbridge::{lookup_asset, mount_archives, ArchiveIndex, Error};
use std::fs;
use std::sync::Arc;
use test_utils::{raw_container, raw_payload_offset, TestWorkspace};

fn null_index(paths: &[std::path::PathBuf]) -> ArchiveIndex {
    mount_archives(paths, Arc::new(NullAuditSink))
}

// ============================================================================
// Lookup and extraction
// ============================================================================

mod lookup {
    use super::*;

    #[test]
    fn test_every_listed_name_resolves_and_extracts_exactly() {
        let ws = TestWorkspace::new();
        let a = ws.write_archive(
            "Textures.big",
            &[("Art\\Textures\\tank.dds", "tank texture"), ("Art\\Textures\\jeep.dds", "jeep")],
        );
        let b = ws.write_archive("Audio.big", &[("Audio\\fire.wav", "RIFF....WAVE")]);
        let index = null_index(&[a, b]);

        let names = index.list_names();
        assert_eq!(names.len(), 3);
        for name in &names {
            let location = lookup_asset(&index, name).expect("listed name resolves");
            let bytes = index.extract(name).unwrap();
            assert_eq!(bytes.len(), location.size as usize);

            let raw = fs::read(&location.container).unwrap();
            let start = location.offset as usize;
            assert_eq!(bytes, &raw[start..start + location.size as usize]);
        }
    }

    #[test]
    fn test_lookup_ignores_case_and_separator() {
        let ws = TestWorkspace::new();
        let a = ws.write_archive("INI.big", &[("Data\\INI\\Weapon.ini", "Weapon Rifle\nEnd")]);
        let index = null_index(&[a]);

        assert!(index.exists("data/ini/weapon.ini"));
        assert!(index.exists("DATA\\INI\\WEAPON.INI"));
        assert_eq!(index.extract("data/ini/WEAPON.ini").unwrap(), b"Weapon Rifle\nEnd");
    }

    #[test]
    fn test_missing_name_is_not_found() {
        let ws = TestWorkspace::new();
        let a = ws.write_archive("INI.big", &[("a.ini", "a")]);
        let index = null_index(&[a]);

        assert!(index.lookup("b.ini").is_none());
        assert!(matches!(index.extract("b.ini"), Err(Error::NotFound(name)) if name == "b.ini"));
    }

    #[test]
    fn test_extract_to_and_digest() {
        let ws = TestWorkspace::new();
        let a = ws.write_archive("INI.big", &[("a.ini", "hello world")]);
        let index = null_index(&[a]);

        let mut out = Vec::new();
        assert_eq!(index.extract_to("a.ini", &mut out).unwrap(), 11);
        assert_eq!(out, b"hello world");
        assert_eq!(
            index.digest("a.ini").unwrap(),
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_mount_dir_finds_containers_recursively() {
        let ws = TestWorkspace::new();
        ws.write_archive("data/One.big", &[("one.ini", "1")]);
        ws.write_archive("data/nested/Two.BIG", &[("two.ini", "2")]);
        ws.write_raw("data/readme.txt", b"not an archive");

        let mut index = ArchiveIndex::new(Arc::new(NullAuditSink));
        let report = index.mount_dir(ws.path().join("data"), "big").unwrap();
        assert_eq!(report.mounted.len(), 2);
        assert!(report.is_clean());
        assert!(index.exists("one.ini"));
        assert!(index.exists("two.ini"));
    }
}

// ============================================================================
// Priority overrides
// ============================================================================

mod priority {
    use super::*;

    #[test]
    fn test_priority_container_wins_in_either_order() {
        let ws = TestWorkspace::new();
        let base = ws.write_archive("base.arc", &[("unit.ini", "base")]);
        let patch = ws.write_archive("!!patch.arc", &[("unit.ini", "patched")]);

        let forward = null_index(&[base.clone(), patch.clone()]);
        let backward = null_index(&[patch, base]);

        assert_eq!(forward.extract("unit.ini").unwrap(), b"patched");
        assert_eq!(backward.extract("unit.ini").unwrap(), b"patched");
        assert!(forward.lookup("unit.ini").unwrap().high_priority);
    }

    #[test]
    fn test_first_seen_wins_among_equals() {
        let ws = TestWorkspace::new();
        let a = ws.write_archive("Alpha.big", &[("shared.ini", "alpha")]);
        let b = ws.write_archive("beta.big", &[("shared.ini", "beta")]);

        // containers are processed in case-insensitive name order
        let index = null_index(&[b, a]);
        assert_eq!(index.extract("shared.ini").unwrap(), b"alpha");
    }

    #[test]
    fn test_marked_entry_overrides_plain_entry() {
        let ws = TestWorkspace::new();
        let a = ws.write_archive("a.big", &[("unit.ini", "plain")]);
        let z = ws.write_archive("z.big", &[("!!unit.ini", "marked")]);
        let index = null_index(&[z, a]);

        assert_eq!(index.extract("unit.ini").unwrap(), b"marked");
        assert_eq!(index.list_names(), vec!["unit.ini"]);
    }

    #[test]
    fn test_custom_marker() {
        let ws = TestWorkspace::new();
        let base = ws.write_archive("base.big", &[("unit.ini", "base")]);
        let patch = ws.write_archive("zz_patch.big", &[("unit.ini", "patch")]);
        let bang = ws.write_archive("!!other.big", &[("unit.ini", "bang")]);

        let mut index = ArchiveIndex::new(Arc::new(NullAuditSink)).with_priority_marker("zz_");
        index.mount(&[patch, bang, base]);
        assert_eq!(index.extract("unit.ini").unwrap(), b"patch");
    }
}

// ============================================================================
// Corrupt and invalid input
// ============================================================================

mod corruption {
    use super::*;

    #[test]
    fn test_invalid_container_does_not_block_others() {
        let ws = TestWorkspace::new();
        let good = ws.write_archive("good.big", &[("unit.ini", "ok")]);
        let bad = ws.write_raw("bad.big", b"PK\x03\x04 definitely a zip");
        let missing = ws.path().join("missing.big");

        let sink = Arc::new(MemoryAuditSink::new());
        let index = mount_archives(&[bad, good, missing], sink.clone());

        assert!(index.exists("unit.ini"));
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.verdict == Verdict::Skipped));
        assert_eq!(records[0].reason, "Invalid archive format");
        assert_eq!(records[1].reason, "Archive could not be read");
    }

    #[test]
    fn test_mount_report_lists_failures() {
        let ws = TestWorkspace::new();
        let bad = ws.write_raw("short.big", b"BIG");

        let mut index = ArchiveIndex::new(Arc::new(NullAuditSink));
        let report = index.mount(&[bad.clone()]);
        assert!(!report.is_clean());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, bad);
        assert!(index.is_empty());
    }

    #[test]
    fn test_out_of_bounds_entry_is_skipped_and_audited() {
        let ws = TestWorkspace::new();
        let names = ["good.ini", "bad.ini"];
        let start = raw_payload_offset(&names);
        let bytes = raw_container(&[(start, 4, "good.ini"), (start, 4096, "bad.ini")], b"good");
        let path = ws.write_raw("mixed.big", &bytes);

        let sink = Arc::new(MemoryAuditSink::new());
        let mut index = ArchiveIndex::new(sink.clone());
        let report = index.mount(&[path]);

        assert_eq!(report.skipped_entries, 1);
        assert_eq!(index.extract("good.ini").unwrap(), b"good");
        assert!(!index.exists("bad.ini"));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, "bad.ini");
        assert_eq!(records[0].reason, "Corrupt archive entry");
    }

    #[test]
    fn test_truncated_table_keeps_earlier_entries() {
        let ws = TestWorkspace::new();
        let names = ["first.ini"];
        let start = raw_payload_offset(&names);
        let mut bytes = raw_container(&[(start, 3, "first.ini")], b"one");
        // claim a second entry that is not there
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        let path = ws.write_raw("truncated.big", &bytes);

        let index = null_index(&[path]);
        assert!(index.exists("first.ini"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_container_shrunk_after_mount_is_corrupt() {
        let ws = TestWorkspace::new();
        let path = ws.write_archive("shrink.big", &[("a.ini", "aaaa"), ("b.ini", "bbbbbbbb")]);
        let index = null_index(&[path.clone()]);

        let len = fs::metadata(&path).unwrap().len();
        let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 4).unwrap();

        assert!(matches!(index.extract("b.ini"), Err(Error::CorruptEntry { .. })));
        assert_eq!(index.extract("a.ini").unwrap(), b"aaaa");
    }
}

// ============================================================================
// Shared reads
// ============================================================================

mod concurrency {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_public_types_are_send_sync() {
        assert_send_sync::<ArchiveIndex>();
        assert_send_sync::<modbridge::DefinitionTable>();
        assert_send_sync::<modbridge::UnitDependencyGraph>();
        assert_send_sync::<modbridge::PolicyEngine>();
    }

    #[test]
    fn test_parallel_extraction() {
        let ws = TestWorkspace::new();
        let entries: Vec<(String, Vec<u8>)> = (0..16)
            .map(|i| (format!("asset{:02}.bin", i), vec![i as u8; 1000 + i]))
            .collect();
        let borrowed: Vec<(&str, &[u8])> = entries
            .iter()
            .map(|(n, d)| (n.as_str(), d.as_slice()))
            .collect();
        let path = ws.write_archive("many.big", &borrowed);
        let index = null_index(&[path]);

        std::thread::scope(|scope| {
            for (name, data) in &entries {
                let index = &index;
                scope.spawn(move || {
                    for _ in 0..10 {
                        assert_eq!(&index.extract(name).unwrap(), data);
                    }
                });
            }
        });
    }
}
