use ensemble::download::{CoordinatorConfig, DownloadStatus, DownloadTask};
use ensemble::linkage::unify;
use ensemble::prelude::*;
use ensemble::search::FederatorConfigBuilder;
use serde_json::json;
use std::time::Duration;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_federator_config_builder() {
        let config = FederatorConfigBuilder::default()
            .debounce(Duration::from_millis(250))
            .min_query_chars(3usize)
            .build()
            .unwrap();

        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.min_query_chars, 3);
        assert!(config.provider_priority.is_empty());
    }

    #[test]
    fn test_federator_config_from_json() {
        let config: FederatorConfig =
            serde_json::from_value(json!({ "debounce_ms": 300, "provider_priority": ["local"] }))
                .unwrap();

        assert_eq!(config.debounce, Duration::from_millis(300));
        assert_eq!(config.min_query_chars, 2);
        assert_eq!(config.provider_priority, vec!["local"]);
    }

    #[test]
    fn test_coordinator_config_defaults() {
        let config: CoordinatorConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.legacy_provider, "tidal");
        assert_eq!(config.completion_threshold, 0.99);
    }

    #[test]
    fn test_qualified_id_string_form() {
        let id = QualifiedId::new("TIDAL", " 5551234 ");
        assert_eq!(id.to_string(), "tidal:5551234");

        let encoded = serde_json::to_string(&id).unwrap();
        assert_eq!(encoded, "\"tidal:5551234\"");

        let decoded: QualifiedId = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, id);
        assert!(serde_json::from_str::<QualifiedId>("\"5551234\"").is_err());
    }

    #[test]
    fn test_task_key_derivation_order() {
        let explicit = TrackDescriptor::titled("a")
            .with_provider("qobuz", "9")
            .with_path("tidal:1");
        assert_eq!(explicit.task_key("tidal").unwrap().to_string(), "qobuz:9");

        let by_path = TrackDescriptor::titled("b").with_path("tidal:5551234");
        assert_eq!(by_path.task_key("legacy").unwrap().to_string(), "tidal:5551234");

        let bare_path = TrackDescriptor::titled("c").with_path("42");
        assert_eq!(bare_path.task_key("tidal").unwrap().to_string(), "tidal:42");

        let nothing = TrackDescriptor::titled("d").with_id("not-numeric");
        assert!(nothing.task_key("tidal").is_err());
    }

    #[test]
    fn test_descriptor_from_unified_match_uses_own_identity() {
        let local = vec![
            TrackMatch::new("8842", "Come Together", "The Beatles")
                .with_album("Abbey Road")
                .with_link(QualifiedId::new("tidal", "5551234")),
        ];
        let merged = unify([("local", local.as_slice())], &ForeignIdLinkage);

        let descriptor = TrackDescriptor::from(&merged[0]);
        assert_eq!(descriptor.task_key("tidal").unwrap().to_string(), "local:8842");
        assert_eq!(descriptor.album.as_deref(), Some("Abbey Road"));
    }

    #[test]
    fn test_raw_field_linkage_dedupes() {
        let local = vec![
            TrackMatch::new("7", "Something", "The Beatles")
                .with_raw(json!({ "source": { "tidal": "123" } })),
        ];
        let remote = vec![TrackMatch::new("123", "Something", "The Beatles")];
        let resolver = RawFieldLinkage::new("local", "source.tidal", "tidal");

        let merged = unify(
            [("local", local.as_slice()), ("tidal", remote.as_slice())],
            &resolver,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id.to_string(), "local:7");

        // the default resolver ignores raw payloads
        let merged = unify(
            [("local", local.as_slice()), ("tidal", remote.as_slice())],
            &ForeignIdLinkage,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_entity_filter_kinds() {
        let filter = EntityFilter::from_kinds([EntityKind::Artist, EntityKind::Track]);
        assert_eq!(filter.kinds(), vec![EntityKind::Track, EntityKind::Artist]);
        assert_eq!(EntityFilter::all().kinds().len(), 3);
    }

    #[test]
    fn test_download_task_serializes() {
        let task = DownloadTask {
            key: QualifiedId::new("tidal", "1"),
            title: "Help!".to_string(),
            artist: None,
            progress: 0.25,
            status: DownloadStatus::Downloading,
            error: None,
        };

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["key"], "tidal:1");
        assert_eq!(value["status"], "downloading");
    }
}
