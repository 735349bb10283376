//! Search federator tests
//!
//! All tests run on a paused clock so debounce windows and provider latency
//! are deterministic.

use ensemble::prelude::*;
use ensemble::search::{FederatorConfigBuilder, Generation};
use std::time::Duration;
use tokio::time::sleep;

mod common;
use common::{Behavior, DEBOUNCE, SETTLE, ScriptedProvider, init_tracing, local_track};

fn track(id: &str, title: &str) -> TrackMatch {
    TrackMatch::new(id, title, "The Beatles")
}

async fn settled(search: &FederatorHandle, query: &str) -> SearchView {
    search
        .wait_for(|v| v.query == query && !v.is_loading())
        .await
        .unwrap()
}

#[cfg(test)]
mod search_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_keystrokes() {
        init_tracing();
        let provider = ScriptedProvider::new("remote")
            .tracks("abbey road", vec![track("1", "Come Together")]);
        let calls = provider.call_log();

        let mut providers = Providers::new();
        providers.add(provider);
        let search = SearchFederator::new(providers).spawn();

        for partial in ["ab", "abb", "abbey", "abbey r", "abbey road"] {
            search.set_query(partial).unwrap();
            sleep(DEBOUNCE / 3).await;
        }

        let view = settled(&search, "abbey road").await;
        assert_eq!(view.results.tracks.len(), 1);
        assert_eq!(view.generation, Generation(1));

        let queries: Vec<String> = calls.lock().iter().map(|(_, q)| q.clone()).collect();
        assert_eq!(queries.len(), 3, "one call per entity kind: {:?}", queries);
        assert!(queries.iter().all(|q| q == "abbey road"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reply_never_overwrites_newer_results() {
        init_tracing();
        let provider = ScriptedProvider::new("remote")
            .tracks("abbey", vec![track("9", "Abbey (stale)")])
            .slow_for("abbey", Duration::from_secs(5))
            .tracks("abbey road", vec![track("1", "Come Together")]);

        let mut providers = Providers::new();
        providers.add(provider);
        let search = SearchFederator::new(providers).spawn();

        search.set_query("abbey").unwrap();
        sleep(SETTLE).await;
        assert_eq!(search.view().query, "abbey");
        assert!(search.view().is_loading());

        search.set_query("abbey road").unwrap();
        let view = settled(&search, "abbey road").await;
        let generation = view.generation;
        assert_eq!(view.results.tracks[0].item.title, "Come Together");

        // the slow reply for "abbey" lands now and must be dropped
        sleep(Duration::from_secs(10)).await;

        let view = search.view();
        assert_eq!(view.generation, generation);
        assert_eq!(view.query, "abbey road");
        let titles: Vec<_> = view.results.tracks.iter().map(|t| t.item.title.as_str()).collect();
        assert_eq!(titles, vec!["Come Together"]);
        assert!(!view.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_increases_per_effective_query() {
        let mut providers = Providers::new();
        providers.add(ScriptedProvider::new("remote"));
        let search = SearchFederator::new(providers).spawn();

        search.set_query("help").unwrap();
        let first = settled(&search, "help").await.generation;

        search.set_query("  help  ").unwrap();
        sleep(SETTLE).await;
        assert_eq!(search.view().generation, first, "same trimmed text is not a new query");

        search.set_query("let it be").unwrap();
        let second = settled(&search, "let it be").await.generation;
        assert!(second > first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_providers_are_isolated() {
        init_tracing();
        let mut providers = Providers::new();
        providers.add(
            ScriptedProvider::new("local").tracks("abbey road", vec![track("t1", "Something")]),
        );
        providers.add(ScriptedProvider::new("broken").behaving(Behavior::Fail));
        providers.add(ScriptedProvider::new("crashy").behaving(Behavior::Panic));
        let search = SearchFederator::new(providers).spawn();

        search.set_query("abbey road").unwrap();
        let view = settled(&search, "abbey road").await;

        assert_eq!(view.results.tracks.len(), 1);
        assert_eq!(view.results.tracks[0].provider_id(), "local");
        assert!(!view.is_provider_loading("broken"));
        assert!(!view.is_provider_loading("crashy"));

        // the federator survives a panicking provider
        search.set_query("something else").unwrap();
        let view = settled(&search, "something else").await;
        assert!(view.results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_query_issues_no_requests() {
        let provider = ScriptedProvider::new("remote");
        let calls = provider.call_log();
        let mut providers = Providers::new();
        providers.add(provider);
        let search = SearchFederator::new(providers).spawn();

        search.set_query("a").unwrap();
        let view = settled(&search, "a").await;

        assert!(view.results.is_empty());
        assert!(calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_provider_is_skipped() {
        let offline = ScriptedProvider::new("offline").unavailable();
        let offline_calls = offline.call_log();

        let mut providers = Providers::new();
        providers.add(ScriptedProvider::new("local").tracks("help", vec![track("1", "Help!")]));
        providers.add(offline);
        let search = SearchFederator::new(providers).spawn();

        search.set_query("help").unwrap();
        sleep(DEBOUNCE + Duration::from_millis(1)).await;
        assert!(!search.view().is_provider_loading("offline"));

        let view = settled(&search, "help").await;
        assert_eq!(view.results.tracks.len(), 1);
        assert!(offline_calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_change_reissues_only_requested_kinds() {
        let provider = ScriptedProvider::new("remote")
            .tracks("abbey road", vec![track("1", "Come Together")])
            .albums("abbey road", vec![AlbumMatch::new("a1", "Abbey Road").with_year(1969)]);
        let calls = provider.call_log();

        let mut providers = Providers::new();
        providers.add(provider);
        let search = SearchFederator::new(providers).spawn();

        search.set_query("abbey road").unwrap();
        let first = settled(&search, "abbey road").await;
        assert_eq!(first.results.tracks.len(), 1);
        assert_eq!(first.results.albums.len(), 1);
        calls.lock().clear();

        search
            .set_entity_filter(EntityFilter::only(EntityKind::Album))
            .unwrap();
        let view = search
            .wait_for(|v| v.generation > first.generation && !v.is_loading())
            .await
            .unwrap();

        assert!(view.results.tracks.is_empty());
        assert_eq!(view.results.albums.len(), 1);
        assert_eq!(view.filter, EntityFilter::only(EntityKind::Album));
        let kinds: Vec<EntityKind> = calls.lock().iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![EntityKind::Album]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_linked_duplicate_is_collapsed_into_local_entry() {
        let remote_id = QualifiedId::new("tidal", "5551234");

        let mut providers = Providers::new();
        providers.add(ScriptedProvider::new("local").tracks(
            "abbey road",
            vec![local_track("8842", "Come Together", Some(remote_id.clone()))],
        ));
        providers.add(
            ScriptedProvider::new("tidal")
                .tracks("abbey road", vec![track("5551234", "Come Together")])
                .with_latency(Duration::from_millis(5)),
        );
        let search = SearchFederator::new(providers).spawn();

        search.set_query("abbey road").unwrap();
        let view = settled(&search, "abbey road").await;

        assert_eq!(view.results.tracks.len(), 1);
        let only = &view.results.tracks[0];
        assert_eq!(only.id.to_string(), "local:8842");
        assert!(only.is_known_as(&remote_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_orders_results() {
        let mut providers = Providers::new();
        providers.add(ScriptedProvider::new("tidal").tracks("help", vec![track("1", "Help!")]));
        providers.add(ScriptedProvider::new("local").tracks("help", vec![track("2", "Help!")]));

        let config = FederatorConfigBuilder::default()
            .provider_priority(vec!["local".to_string()])
            .build()
            .unwrap();
        let search = SearchFederator::new(providers).with_config(config).spawn();

        search.set_query("help").unwrap();
        let view = settled(&search, "help").await;
        let ids: Vec<String> = view.results.tracks.iter().map(|t| t.id.to_string()).collect();
        assert_eq!(ids, vec!["local:2", "tidal:1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_view_is_empty() {
        let mut providers = Providers::new();
        providers.add(ScriptedProvider::new("local"));
        let search = SearchFederator::new(providers).spawn();

        let view = search.view();
        assert_eq!(view.generation, Generation(0));
        assert!(view.results.is_empty());
        assert!(!view.is_loading());
        assert_eq!(view.loading.keys().collect::<Vec<_>>(), vec!["local"]);
    }
}
