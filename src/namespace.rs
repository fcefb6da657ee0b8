//! Namespacing of provider jobs and modules.
//!
//! Independent providers feeding one exporter pick job and module names
//! without coordinating. Prefixing every name with the provider's topology
//! identifier keeps them apart: two providers can only collide if their
//! identities do.

use crate::probe::{ModuleMap, ProbeSpec};
use crate::topology::TopologyIdentity;

/// Namespace prefix for a provider: `juju_<identifier>_`.
pub fn namespace_prefix(identity: &TopologyIdentity) -> String {
    format!("juju_{}_", identity.identifier())
}

/// Prefix job names and references to the provider's own modules.
///
/// An empty job name becomes the bare prefix. Module references that are
/// not keys of `modules` name globally known modules and are left alone.
pub fn prefix_probes(probes: Vec<ProbeSpec>, modules: &ModuleMap, prefix: &str) -> Vec<ProbeSpec> {
    probes
        .into_iter()
        .map(|mut probe| {
            probe.job_name = format!("{}{}", prefix, probe.job_name);
            if let Some(references) = probe.modules_mut() {
                for module in references.iter_mut() {
                    if modules.contains_key(module.as_str()) {
                        *module = format!("{}{}", prefix, module);
                    }
                }
            }
            probe
        })
        .collect()
}

/// Prefix every module name.
pub fn prefix_modules(modules: ModuleMap, prefix: &str) -> ModuleMap {
    modules
        .into_iter()
        .map(|(name, module)| (format!("{}{}", prefix, name), module))
        .collect()
}

/// Namespace a provider's probes and modules under its topology identity.
pub fn namespace(
    probes: Vec<ProbeSpec>,
    modules: ModuleMap,
    identity: &TopologyIdentity,
) -> (Vec<ProbeSpec>, ModuleMap) {
    let prefix = namespace_prefix(identity);
    let probes = prefix_probes(probes, &modules, &prefix);
    let modules = prefix_modules(modules, &prefix);
    (probes, modules)
}
