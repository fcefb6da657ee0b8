//! blackbox-probes-render: scrape job renderer
//!
//! Prints the probing exporter's scrape jobs as YAML to stdout: the
//! exporter's self-monitoring job followed by the local probes file merged
//! with a set of published relation probes.
//!
//! ## Usage
//! ```text
//! blackbox-probes-render [CONFIG_FILE] [RELATION_PROBES_JSON]
//! ```
//!
//! ## Configuration
//! - BLACKBOX_PROBES_CONFIG: configuration file (optional)
//! - BLACKBOX_PROBES__EXPORTER__PORT, BLACKBOX_PROBES__EXPORTER__HOST,
//!   BLACKBOX_PROBES__EXPORTER__EXTERNAL_URL, BLACKBOX_PROBES__PROBES_FILE
//! - BLACKBOX_PROBES_LOG: log filter (default: info, written to stderr)

use tracing::info;

use blackbox_probes::config::Config;
use blackbox_probes::utils::bootstrap::init_tracing;
use blackbox_probes::{MergedScrapeConfig, ProbeSpec, ScrapeConfigBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let config_path = args.next();
    let relation_probes_path = args.next();

    let config = Config::load(config_path.as_deref())?;
    let builder = ScrapeConfigBuilder::new(config.exporter.endpoint()?);

    let relation_probes: Vec<ProbeSpec> = match &relation_probes_path {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };

    let merged = builder.build_scrape_config(&config.probes_text(), &relation_probes);
    let mut scrape_configs = Vec::with_capacity(merged.scrape_configs.len() + 1);
    scrape_configs.push(builder.self_scraping_job());
    scrape_configs.extend(merged.scrape_configs);

    info!(
        jobs = scrape_configs.len(),
        relation_probes = relation_probes.len(),
        "Rendered scrape jobs"
    );

    print!(
        "{}",
        serde_yaml::to_string(&MergedScrapeConfig { scrape_configs })?
    );
    Ok(())
}
