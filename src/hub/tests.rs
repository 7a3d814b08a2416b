//! Tests for Hub resolution

use super::*;
use tempfile::TempDir;

fn files(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn test_parse_repo_id_accepts_bare_and_org_names() {
    assert!(HfHubFetcher::parse_repo_id("gpt2").is_ok());
    assert!(HfHubFetcher::parse_repo_id("teknium/OpenHermes-2-Mistral-7B").is_ok());
}

#[test]
fn test_parse_repo_id_rejects_malformed() {
    for bad in ["", "/model", "org/", "a/b/c"] {
        assert!(
            matches!(HfHubFetcher::parse_repo_id(bad), Err(FetchError::InvalidRepoId { .. })),
            "{bad} should be rejected"
        );
    }
}

#[test]
fn test_weight_format_detection() {
    assert_eq!(WeightFormat::from_filename("model.safetensors"), Some(WeightFormat::SafeTensors));
    assert_eq!(WeightFormat::from_filename("pytorch_model.bin"), Some(WeightFormat::PyTorchBin));
    assert_eq!(WeightFormat::from_filename("config.json"), None);
    assert!(WeightFormat::SafeTensors.is_safe());
    assert!(!WeightFormat::PyTorchBin.is_safe());
}

#[test]
fn test_select_weight_layout_prefers_index() {
    let listing = files(&["config.json", "model.safetensors", "model.safetensors.index.json"]);
    assert_eq!(select_weight_layout("m", &listing).unwrap(), WeightLayout::Sharded);
}

#[test]
fn test_select_weight_layout_single() {
    let listing = files(&["config.json", "model.safetensors", "pytorch_model.bin"]);
    assert_eq!(select_weight_layout("m", &listing).unwrap(), WeightLayout::Single);
}

#[test]
fn test_select_weight_layout_refuses_pickle_only() {
    let listing = files(&["config.json", "pytorch_model.bin"]);
    let err = select_weight_layout("m", &listing).unwrap_err();
    assert!(err.is_security_risk());
}

#[test]
fn test_select_weight_layout_no_weights() {
    let err = select_weight_layout("m", &files(&["config.json"])).unwrap_err();
    assert!(matches!(err, FetchError::FileNotFound { .. }));
}

#[test]
fn test_parse_shard_index_dedups_and_sorts() {
    let index = r#"{
        "metadata": {"total_size": 10},
        "weight_map": {
            "a.weight": "model-00002-of-00002.safetensors",
            "b.weight": "model-00001-of-00002.safetensors",
            "c.weight": "model-00001-of-00002.safetensors"
        }
    }"#;
    assert_eq!(
        parse_shard_index(index).unwrap(),
        vec!["model-00001-of-00002.safetensors", "model-00002-of-00002.safetensors"]
    );
}

#[test]
fn test_parse_shard_index_requires_weight_map() {
    assert!(matches!(parse_shard_index("{}"), Err(FetchError::IndexParse { .. })));
    assert!(matches!(parse_shard_index("not json"), Err(FetchError::Json(_))));
}

#[test]
fn test_fetch_model_from_local_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
    std::fs::write(dir.path().join(SAFETENSORS_FILE), b"weights").unwrap();
    std::fs::write(dir.path().join(GENERATION_CONFIG_FILE), "{}").unwrap();

    let fetcher = HfHubFetcher::new();
    let model_id = dir.path().to_str().unwrap();
    let artifact = fetcher.fetch_model(model_id, &FetchOptions::default()).unwrap();

    assert_eq!(artifact.config, dir.path().join(CONFIG_FILE));
    assert_eq!(artifact.weights, vec![dir.path().join(SAFETENSORS_FILE)]);
    assert_eq!(artifact.generation_config, Some(dir.path().join(GENERATION_CONFIG_FILE)));
}

#[test]
fn test_fetch_sharded_model_from_local_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
    std::fs::write(
        dir.path().join(SAFETENSORS_INDEX_FILE),
        r#"{"weight_map": {"a": "s1.safetensors", "b": "s2.safetensors"}}"#,
    )
    .unwrap();
    std::fs::write(dir.path().join("s1.safetensors"), b"1").unwrap();
    std::fs::write(dir.path().join("s2.safetensors"), b"2").unwrap();

    let artifact = HfHubFetcher::new()
        .fetch_model(dir.path().to_str().unwrap(), &FetchOptions::default())
        .unwrap();
    assert_eq!(
        artifact.weights,
        vec![dir.path().join("s1.safetensors"), dir.path().join("s2.safetensors")]
    );
    assert!(artifact.generation_config.is_none());
}

#[test]
fn test_fetch_tokenizer_from_local_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(TOKENIZER_FILE), "{}").unwrap();
    std::fs::write(dir.path().join("tokenizer_config.json"), "{}").unwrap();

    let files = HfHubFetcher::new()
        .fetch_tokenizer(dir.path().to_str().unwrap(), &FetchOptions::default())
        .unwrap();
    assert_eq!(files.tokenizer, dir.path().join(TOKENIZER_FILE));
    assert_eq!(files.side_files, vec![dir.path().join("tokenizer_config.json")]);
}

#[test]
fn test_fetch_tokenizer_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = HfHubFetcher::new()
        .fetch_tokenizer(dir.path().to_str().unwrap(), &FetchOptions::default())
        .unwrap_err();
    assert!(matches!(err, FetchError::FileNotFound { .. }));
}

#[test]
fn test_fetch_options_builder() {
    let options = FetchOptions::new().revision("v2").cache_dir("/tmp/cache");
    assert_eq!(options.revision, "v2");
    assert_eq!(options.cache_dir, Some(std::path::PathBuf::from("/tmp/cache")));
}

#[test]
fn test_with_token_is_authenticated() {
    assert!(HfHubFetcher::with_token("hf_abc").is_authenticated());
}
