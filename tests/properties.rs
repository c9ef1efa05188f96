use std::path::Path;

use proptest::prelude::*;

use jdeploy_sign::signing::digest::decode_hex;
use jdeploy_sign::signing::manifest::{Manifest, ManifestEntry, entry_path, relative_key};

fn arb_segment() -> impl Strategy<Value = String> {
    r"[A-Za-z0-9_][A-Za-z0-9_.\-]{0,11}".prop_filter("dot segments", |s| s != "." && s != "..")
}

fn arb_key() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_segment(), 1..5).prop_map(|segments| segments.join("/"))
}

proptest! {
    #[test]
    fn relative_key_and_entry_path_agree(key in arb_key()) {
        let root = Path::new("bundle");
        let path = root.join(entry_path(&key).unwrap());
        prop_assert_eq!(relative_key(root, &path).unwrap(), key);
    }

    #[test]
    fn traversal_segments_are_rejected(
        prefix in prop::collection::vec(arb_segment(), 0..3),
        suffix in prop::collection::vec(arb_segment(), 0..3),
    ) {
        let mut segments = prefix;
        segments.push("..".to_string());
        segments.extend(suffix);
        prop_assert!(entry_path(&segments.join("/")).is_err());
    }

    #[test]
    fn hex_decoding_inverts_encoding(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let encoded = hex::encode(&bytes);
        prop_assert_eq!(decode_hex(&encoded), Some(bytes.clone()));
        prop_assert_eq!(decode_hex(&format!("  {encoded}\n")), Some(bytes));
    }

    #[test]
    fn manifest_json_preserves_entries(
        entries in prop::collection::btree_map(arb_key(), "[0-9a-f]{64}", 0..8),
        timestamp in proptest::option::of("20[0-9]{2}-0[1-9]-1[0-9]T0[0-9]:00:00Z"),
    ) {
        let mut manifest = Manifest::new();
        manifest.timestamp = timestamp;
        for (key, hash) in entries {
            if key == "timestamp" {
                continue;
            }
            manifest.entries.insert(key, ManifestEntry { hash, signature: "00".to_string() });
        }
        let bytes = manifest.to_json_bytes().unwrap();
        prop_assert_eq!(Manifest::from_json_bytes(&bytes).unwrap(), manifest);
    }
}
