//! Minimal embedding example for nori-core
//!
//! This example demonstrates using nori-core as a library in a custom
//! application: the application owns the store, feeds change events to the
//! router and reacts to notifications by re-reading the store.

use nori_core::config::StoreConfig;
use nori_core::traits::ConfigurationStore;
use nori_core::{
    ChangeEvent, ChangeEventRouter, DetectionStatus, Dispatch, Image, Result, RouterConfig,
    ServiceRecord, ServiceSubtype, ServiceType, StoreRegistry, verify_image,
};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    // Store backends are plugged in through the registry
    let registry = StoreRegistry::new();
    nori_core::state::register(&registry);
    nori_store_sqlite::register(&registry);

    let store = registry.create_store(&StoreConfig::Sqlite {
        path: nori_store_sqlite::IN_MEMORY_PATH.to_string(),
    })?;
    let router = ChangeEventRouter::new(Arc::clone(&store), RouterConfig::default())?;

    // Observer: re-read the store on every notification
    let mut changes = router.watch();
    let observer_store = Arc::clone(&store);
    let observer = tokio::spawn(async move {
        while let Some(changed) = changes.next().await {
            match observer_store.list().await {
                Ok(services) => {
                    let names: Vec<_> = services.iter().map(|s| s.name.as_str()).collect();
                    info!("revision {}: {:?}", changed.revision, names);
                }
                Err(e) => info!("re-read failed: {}", e),
            }
        }
    });

    // Insert two services
    let yandere = ServiceRecord::new(
        "yande.re",
        "https://yande.re",
        ServiceType::Danbooru,
        ServiceSubtype::Moebooru,
    );
    let danbooru = ServiceRecord::new(
        "Danbooru",
        "https://danbooru.donmai.us",
        ServiceType::Danbooru,
        ServiceSubtype::Danbooru,
    )
    .with_credentials("alice", "api-key-123");

    let mut yandere_id = None;
    for record in [yandere.clone(), danbooru] {
        if let Dispatch::Applied(changed) = router.dispatch(ChangeEvent::detected(record)).await? {
            yandere_id.get_or_insert(changed.change.id());
        }
    }

    // Events can also arrive as JSON from another process
    let failed: ChangeEvent = serde_json::from_str(
        r#"{"event":"settings_detected","status":2,"settings":{"id":-1,"name":"broken","apiUrl":"https://example.invalid","type":1,"subtype":3}}"#,
    )?;
    let outcome = router.dispatch(failed).await?;
    assert_eq!(outcome, Dispatch::Discarded(DetectionStatus::Failed(2)));

    // Rename, then remove
    if let Some(id) = yandere_id {
        let mut mirror = yandere.with_identity(id);
        mirror.name = "yande.re (mirror)".to_string();
        router.dispatch(ChangeEvent::detected(mirror)).await?;
        router.dispatch(ChangeEvent::remove(id)).await?;
    }

    info!("{} service(s) left", store.count().await?);

    // Image records from an API client go through the contract check
    let image: Image = serde_json::from_value(serde_json::json!({
        "fileUrl": "https://files.yande.re/image/abc/yande.re%20100.jpg",
        "width": 1600, "height": 1200,
        "previewUrl": "https://assets.yande.re/data/preview/ab/c1/abc1.jpg",
        "previewWidth": 0, "previewHeight": 112,
        "sampleUrl": "https://files.yande.re/sample/abc/sample.jpg",
        "sampleWidth": 1500, "sampleHeight": 1125,
        "tags": [{ "name": "scenery", "tagType": "general" }],
        "id": "100",
        "webUrl": "https://yande.re/post/show/100",
        "obscenityRating": "safe",
        "score": 3,
        "md5": "0123456789abcdef0123456789abcdef",
        "createdAt": "2012-08-19T10:00:00Z"
    }))?;
    let warnings = verify_image(&image)?;
    info!("image accepted with {} warning(s)", warnings.len());

    // Dropping the router closes the notification stream
    drop(router);
    let _ = observer.await;

    Ok(())
}
