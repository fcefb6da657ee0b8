use super::*;
use serde_json::json;

fn builder() -> ScrapeConfigBuilder {
    let endpoint = ExporterEndpoint::new(
        "http://blackbox-exporter:9115",
        "http://blackbox-0.blackbox-endpoints.model.svc.cluster.local:9115",
    )
    .unwrap();
    ScrapeConfigBuilder::new(endpoint)
}

fn probe(job_name: &str, target: &str) -> ProbeSpec {
    ProbeSpec::new(job_name, ["http_2xx"], vec![StaticConfig::new([target])])
}

fn local(jobs: &[ProbeSpec]) -> LocalFileConfig {
    LocalFileConfig {
        scrape_configs: jobs.to_vec(),
    }
}

fn job_names(probes: &[ProbeSpec]) -> Vec<&str> {
    probes.iter().map(|probe| probe.job_name.as_str()).collect()
}

// ============================================================================
// Exporter endpoint
// ============================================================================

#[test]
fn test_probe_path_at_root() {
    let endpoint = ExporterEndpoint::new("http://blackbox:9115", "http://blackbox:9115").unwrap();
    assert_eq!(endpoint.probe_path(), "/probe");
    assert_eq!(endpoint.metrics_path(), "/metrics");
}

#[test]
fn test_probe_path_under_ingress_prefix() {
    let endpoint = ExporterEndpoint::new(
        "http://ingress.example.com/model-blackbox/",
        "http://blackbox:9115",
    )
    .unwrap();
    assert_eq!(endpoint.probe_path(), "/model-blackbox/probe");
}

#[test]
fn test_internal_address_without_scheme() {
    let endpoint = ExporterEndpoint::new("http://external", "http://blackbox-0.local:9115").unwrap();
    assert_eq!(endpoint.internal_address(), "blackbox-0.local:9115");
}

#[test]
fn test_endpoint_rejects_non_http_scheme() {
    let result = ExporterEndpoint::new("https://blackbox:9115", "http://blackbox:9115");
    assert!(matches!(result, Err(ScrapeError::InvalidUrl { .. })));
}

#[test]
fn test_endpoint_rejects_missing_host() {
    assert!(ExporterEndpoint::new("/probe-only-path", "http://blackbox:9115").is_err());
    assert!(ExporterEndpoint::new("http://blackbox:9115", "not a url").is_err());
}

// ============================================================================
// Local file
// ============================================================================

#[test]
fn test_local_file_parse() {
    let text = r#"
scrape_configs:
  - job_name: config_yaml_job
    params:
      module: [http_2xx]
    static_configs:
      - targets: ["target1"]
"#;
    let config = LocalFileConfig::parse(text);
    assert_eq!(job_names(&config.scrape_configs), vec!["config_yaml_job"]);
}

#[test]
fn test_local_file_empty_or_null() {
    assert!(LocalFileConfig::parse("").scrape_configs.is_empty());
    assert!(LocalFileConfig::parse("  \n").scrape_configs.is_empty());
    assert!(LocalFileConfig::parse("~").scrape_configs.is_empty());
    assert!(LocalFileConfig::parse("{}").scrape_configs.is_empty());
}

#[test]
fn test_local_file_malformed_degrades_to_empty() {
    assert!(LocalFileConfig::parse("scrape_configs: [unclosed").scrape_configs.is_empty());
    assert!(LocalFileConfig::parse("scrape_configs: 12").scrape_configs.is_empty());
    assert!(LocalFileConfig::parse("- just\n- a list\n").scrape_configs.is_empty());
}

// ============================================================================
// Merge
// ============================================================================

#[test]
fn test_merge_file_and_relation() {
    let merged = merge_scrape_configs(
        local(&[probe("config_yaml_job", "target1")]),
        &[probe("relation_job", "target2")],
    );
    assert_eq!(job_names(&merged), vec!["config_yaml_job", "relation_job"]);
}

#[test]
fn test_merge_relation_wins_collision() {
    let merged = merge_scrape_configs(
        local(&[probe("A", "from-file")]),
        &[probe("A", "from-relation")],
    );
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].static_configs[0].targets, ["from-relation"]);
}

#[test]
fn test_merge_preserves_first_seen_order() {
    let merged = merge_scrape_configs(
        local(&[probe("A", "a"), probe("B", "b")]),
        &[probe("C", "c"), probe("A", "a2")],
    );
    assert_eq!(job_names(&merged), vec!["A", "B", "C"]);
    assert_eq!(merged[0].static_configs[0].targets, ["a2"]);
}

#[test]
fn test_merge_last_relation_entry_wins() {
    let merged = merge_scrape_configs(
        LocalFileConfig::default(),
        &[probe("dup", "first"), probe("dup", "second")],
    );
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].static_configs[0].targets, ["second"]);
}

#[test]
fn test_merge_duplicate_file_entries() {
    let merged = merge_scrape_configs(
        local(&[probe("dup", "first"), probe("other", "o"), probe("dup", "second")]),
        &[],
    );
    assert_eq!(job_names(&merged), vec!["dup", "other"]);
    assert_eq!(merged[0].static_configs[0].targets, ["second"]);
}

// ============================================================================
// Scrape jobs
// ============================================================================

#[test]
fn test_relabel_pipeline() {
    let relabel = builder().relabel_configs();
    assert_eq!(
        serde_json::to_value(&relabel).unwrap(),
        json!([
            {"source_labels": ["__address__"], "target_label": "__param_target"},
            {"source_labels": ["__param_target"], "target_label": "instance"},
            {"source_labels": ["__param_target"], "target_label": "probe_target"},
            {
                "target_label": "__address__",
                "replacement": "blackbox-0.blackbox-endpoints.model.svc.cluster.local:9115"
            }
        ])
    );
}

#[test]
fn test_every_job_gets_path_and_relabeling() {
    let file = r#"
scrape_configs:
  - job_name: config_yaml_job
    static_configs:
      - targets: ["target1"]
"#;
    let merged = builder().build_scrape_config(file, &[probe("relation_job", "target2")]);

    assert_eq!(merged.scrape_configs.len(), 2);
    for job in &merged.scrape_configs {
        assert_eq!(job.metrics_path, "/probe");
        assert_eq!(job.relabel_configs.len(), 4);
    }
}

#[test]
fn test_input_relabel_configs_replaced() {
    let input: ProbeSpec = serde_json::from_value(json!({
        "job_name": "custom",
        "params": {"module": ["icmp"]},
        "static_configs": [{"targets": ["10.0.0.1"]}],
        "metrics_path": "/somewhere-else",
        "relabel_configs": [{"source_labels": ["foo"], "target_label": "bar"}],
        "scrape_interval": "30s"
    }))
    .unwrap();

    let job = builder().scrape_job(input);
    let rendered = serde_json::to_value(&job).unwrap();

    assert_eq!(rendered["metrics_path"], "/probe");
    assert_eq!(rendered["relabel_configs"].as_array().unwrap().len(), 4);
    assert_eq!(rendered["relabel_configs"][0]["target_label"], "__param_target");
    assert_eq!(rendered["scrape_interval"], "30s");
}

#[test]
fn test_malformed_file_still_yields_relation_jobs() {
    let merged = builder().build_scrape_config("scrape_configs: [", &[probe("relation_job", "t")]);
    assert_eq!(merged.scrape_configs.len(), 1);
    assert_eq!(merged.scrape_configs[0].probe.job_name, "relation_job");
}

#[test]
fn test_rendered_yaml_shape() {
    let merged = builder().build_scrape_config("", &[probe("relation_job", "10.0.0.1")]);
    let yaml = serde_yaml::to_string(&merged).unwrap();
    let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

    let job = &value["scrape_configs"][0];
    assert_eq!(job["job_name"].as_str(), Some("relation_job"));
    assert_eq!(job["params"]["module"][0].as_str(), Some("http_2xx"));
    assert_eq!(job["static_configs"][0]["targets"][0].as_str(), Some("10.0.0.1"));
    assert_eq!(job["metrics_path"].as_str(), Some("/probe"));
    assert_eq!(job["relabel_configs"].as_sequence().map(Vec::len), Some(4));
}

#[test]
fn test_self_scraping_job() {
    let job = builder().self_scraping_job();
    assert_eq!(
        serde_json::to_value(&job).unwrap(),
        json!({
            "metrics_path": "/metrics",
            "static_configs": [
                {"targets": ["blackbox-0.blackbox-endpoints.model.svc.cluster.local:9115"]}
            ]
        })
    );
}
