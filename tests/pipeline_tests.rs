//! Model pipeline integration tests
//!
//! Manifest, downloader, JSON cache blob and transport serialization working
//! against a mock attachments server.

mod common;

use common::fixtures::{language_pair, records};
use common::TestPipeline;
use serde_json::Value;
use translations_bridge_core::{FileType, ModelKey};
use translations_bridge_service::ModelError;
use translations_bridge_store::{JsonFileCacheStore, ModelCacheStore};

#[tokio::test]
async fn test_resolve_and_serialize_language_pair() {
    let files = language_pair("en", "fr", "1.0");
    let pipeline = TestPipeline::new(records(&files)).await;
    pipeline.serve(&files).await;

    let payload = pipeline
        .manager
        .fetch_transport_payload(ModelKey::new("en", "fr", "1.0"))
        .await
        .unwrap();

    assert_eq!(payload.source_language, "en");
    assert_eq!(payload.target_language, "fr");
    assert_eq!(payload.language_model_files.len(), 3);
    for file in &files {
        let transport = &payload.language_model_files[&file.record.file_type];
        assert_eq!(transport.decode().unwrap(), file.content);
        assert_eq!(transport.record.id, file.record.id);
    }

    let blob: Value = serde_json::from_slice(&pipeline.blob().await).unwrap();
    let entry = blob["en-fr-1.0"].as_object().unwrap();
    assert_eq!(entry.len(), 3);
    for file_type in FileType::ALL {
        let path = entry[file_type.as_str()].as_str().unwrap();
        assert!(path.starts_with(pipeline.models_dir().to_str().unwrap()));
    }

    let wire = serde_json::to_value(&payload).unwrap();
    let wire_files = wire["languageModelFiles"].as_object().unwrap();
    assert_eq!(wire_files.len(), 3);
    for key in ["lex", "vocab", "model"] {
        assert!(wire_files[key]["buffer"].is_string());
        assert_eq!(wire_files[key]["record"]["fileType"], key);
    }
}

#[tokio::test]
async fn test_incomplete_manifest_downloads_nothing() {
    let mut files = language_pair("en", "de", "1.0");
    files.retain(|file| file.record.file_type != FileType::Vocab);
    let pipeline = TestPipeline::new(records(&files)).await;
    pipeline.serve(&files).await;

    let err = pipeline
        .manager
        .resolve_models("en", "de", "1.0")
        .await
        .unwrap_err();

    assert!(matches!(err, ModelError::ManifestIncomplete { found: 2, .. }));
    assert_eq!(pipeline.request_count().await, 0);
    assert_eq!(pipeline.manager.download_batches(), 0);
    assert!(pipeline.cache.entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreadable_file_invalidates_then_redownloads() {
    let files = language_pair("en", "fr", "1.0");
    let pipeline = TestPipeline::new(records(&files)).await;
    pipeline.serve(&files).await;
    let key = ModelKey::new("en", "fr", "1.0");

    let resolved = pipeline.manager.resolve(key.clone()).await.unwrap();
    let vocab = resolved.files.path(FileType::Vocab).unwrap().to_path_buf();
    tokio::fs::remove_file(&vocab).await.unwrap();

    let err = pipeline
        .manager
        .serialize_for_transport(&resolved)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ModelError::FileUnreadable { file_type: FileType::Vocab, .. }
    ));
    assert!(pipeline.cache.get(&key).await.unwrap().is_none());

    let payload = pipeline.manager.fetch_transport_payload(key).await.unwrap();
    assert_eq!(payload.language_model_files.len(), 3);
    assert_eq!(pipeline.manager.download_batches(), 2);
    assert!(vocab.exists());
}

#[tokio::test]
async fn test_failed_batch_leaves_cache_blob_untouched() {
    let french = language_pair("en", "fr", "1.0");
    let german = language_pair("en", "de", "1.0");
    let mut all = records(&french);
    all.extend(records(&german));

    let pipeline = TestPipeline::new(all).await;
    pipeline.serve(&french).await;
    pipeline.serve(&german[..2]).await;
    pipeline.fail(&german[2], 503).await;

    pipeline.manager.resolve_models("en", "fr", "1.0").await.unwrap();
    let before = pipeline.blob().await;

    let err = pipeline
        .manager
        .resolve_models("en", "de", "1.0")
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::DownloadFailed(_)));
    assert!(err.is_retryable());

    assert_eq!(pipeline.blob().await, before);
    let entries = pipeline.cache.entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries.contains_key("en-fr-1.0"));
}

#[tokio::test]
async fn test_concurrent_resolves_share_one_batch() {
    let files = language_pair("en", "es", "1.0");
    let pipeline = TestPipeline::new(records(&files)).await;
    for file in &files {
        pipeline.serve_expecting(file, 1).await;
    }

    let manager = pipeline.manager.clone();
    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.resolve_models("en", "es", "1.0").await })
        })
        .collect();

    let mut resolved = Vec::new();
    for task in tasks {
        resolved.push(task.await.unwrap().unwrap());
    }

    assert_eq!(manager.download_batches(), 1);
    assert!(resolved.windows(2).all(|pair| pair[0].files == pair[1].files));

    let again = manager.resolve_models("en", "es", "1.0").await.unwrap();
    assert_eq!(again.files, resolved[0].files);
    assert_eq!(manager.download_batches(), 1);
}

#[tokio::test]
async fn test_reopened_blob_serves_cache_hits() {
    let files = language_pair("en", "it", "1.0");
    let pipeline = TestPipeline::new(records(&files)).await;
    pipeline.serve(&files).await;

    pipeline.manager.resolve_models("en", "it", "1.0").await.unwrap();
    let requests = pipeline.request_count().await;

    let reopened = pipeline.reopen(records(&files)).await;
    let payload = reopened
        .fetch_transport_payload(ModelKey::new("en", "it", "1.0"))
        .await
        .unwrap();

    assert_eq!(payload.language_model_files.len(), 3);
    assert_eq!(reopened.download_batches(), 0);
    assert_eq!(pipeline.request_count().await, requests);
}

#[tokio::test]
async fn test_purge_removes_entries_and_files() {
    let files = language_pair("en", "fr", "1.0");
    let pipeline = TestPipeline::new(records(&files)).await;
    pipeline.serve(&files).await;

    let resolved = pipeline.manager.resolve_models("en", "fr", "1.0").await.unwrap();
    pipeline.manager.purge_all_data().await.unwrap();

    assert!(pipeline.cache.entries().await.unwrap().is_empty());
    for (_, path) in resolved.files.iter() {
        assert!(!path.exists());
    }

    let reopened = JsonFileCacheStore::open(pipeline.store_path()).await.unwrap();
    assert!(reopened.entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_language_pair_is_rejected() {
    let pipeline = TestPipeline::new(Vec::new()).await;

    let err = pipeline
        .manager
        .resolve_models("", "fr", "1.0")
        .await
        .unwrap_err();

    assert!(matches!(err, ModelError::InvalidRequest(_)));
    assert_eq!(pipeline.request_count().await, 0);
}
