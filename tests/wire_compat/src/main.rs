fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use stealthim_protocol::{
        ChatMessage, DownloadSentinel, EventBatch, FileInfoResponse, FileMetadata, MessageKind,
        UploadAck,
    };

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture, re-serializes it and requires the same JSON
    /// back, field names and string-encoded integers included.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  server: {fixture}\n  rust:   {reserialized}"
        );
        parsed
    }

    #[test]
    fn upload_metadata() {
        let meta: FileMetadata = roundtrip_test("upload_metadata.json");
        assert_eq!(meta.size, 9_007_199_254_740_993);
        assert_eq!(meta.group_id, 12);
        assert_eq!(meta.hash.len(), 64);
    }

    #[test]
    fn upload_acks() {
        let ack: UploadAck = roundtrip_test("upload_ack_metadata.json");
        assert!(ack.result.is_success());
        assert_eq!(ack.block_id, None);

        let ack: UploadAck = roundtrip_test("upload_ack_block.json");
        assert_eq!(ack.block_id, Some(3));

        let ack: UploadAck = roundtrip_test("upload_ack_rejected.json");
        let err = ack.result.into_result().unwrap_err();
        assert_eq!(err.code, 1501);
        assert_eq!(err.msg, "block hash mismatch");
    }

    #[test]
    fn download_sentinels() {
        let ok: DownloadSentinel = roundtrip_test("download_sentinel.json");
        assert!(ok.result.is_success());

        let failed: DownloadSentinel = roundtrip_test("download_sentinel_error.json");
        assert_eq!(failed.result.code, 1401);
    }

    #[test]
    fn file_info() {
        let info: FileInfoResponse = roundtrip_test("file_info.json");
        assert_eq!(info.size.parse::<u64>().unwrap(), 4 * 1024 * 1024);
    }

    #[test]
    fn event_batch() {
        let batch: EventBatch = roundtrip_test("event_batch.json");
        let kinds: Vec<MessageKind> = batch.msg.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            [MessageKind::Text, MessageKind::File, MessageKind::RecallText]
        );
        assert!(batch.msg[0].hash.is_empty());
        assert_eq!(batch.msg[1].hash.len(), 64);
    }

    #[test]
    fn chat_message_unknown_kind_preserved() {
        let json = serde_json::json!({
            "groupid": "1", "msg": "?", "msgid": "5", "time": "0",
            "type": 42, "username": "carol"
        });
        let msg: ChatMessage = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(msg.kind, MessageKind::Unknown(42));
        assert_eq!(serde_json::to_value(&msg).unwrap(), json);
    }
}
