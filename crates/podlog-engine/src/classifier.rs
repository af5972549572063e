use podlog_config::PodPatterns;
use podlog_core::{PodCategory, PodDescriptor, PodListing, PodPhase};

/// A single service rule: name fragment → service label.
pub struct ServiceRule {
    pub fragment: String,
    pub service: String,
}

/// Tags pods with a service label and category from their names.
pub struct PodClassifier {
    service_rules: Vec<ServiceRule>,
    test_prefixes: Vec<String>,
    test_fallback_service: String,
    api_rules: Vec<ServiceRule>,
}

impl PodClassifier {
    pub fn new(patterns: &PodPatterns) -> Self {
        let service_rules = patterns
            .service_fragments
            .iter()
            .map(|fragment| ServiceRule {
                fragment: fragment.clone(),
                service: fragment.split('-').next().unwrap_or(fragment).to_string(),
            })
            .collect();
        let api_rules = patterns
            .api_fragments
            .iter()
            .map(|fragment| ServiceRule {
                fragment: fragment.clone(),
                service: fragment
                    .strip_suffix("-api")
                    .unwrap_or(fragment)
                    .to_string(),
            })
            .collect();
        Self {
            service_rules,
            test_prefixes: patterns.test_prefixes.clone(),
            test_fallback_service: patterns.test_fallback_service.clone(),
            api_rules,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&PodPatterns::default())
    }

    /// Classify a single pod name, ignoring its phase.
    pub fn classify_name(&self, name: &str) -> Option<PodDescriptor> {
        if let Some(rule) = self.service_rules.iter().find(|r| name.contains(&r.fragment)) {
            return Some(PodDescriptor {
                name: name.to_string(),
                service: rule.service.clone(),
                category: PodCategory::Service,
            });
        }

        if self.test_prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            // tempest-<service>-<test>-<hash>
            let service = name
                .split('-')
                .nth(1)
                .filter(|s| !s.is_empty())
                .unwrap_or(&self.test_fallback_service);
            return Some(PodDescriptor {
                name: name.to_string(),
                service: service.to_string(),
                category: PodCategory::Test,
            });
        }

        None
    }

    /// Classify a pod listing for error analysis. Keeps listing order; pods
    /// without logs or matching no pattern are dropped.
    pub fn classify(&self, listing: &[PodListing]) -> Vec<PodDescriptor> {
        listing
            .iter()
            .filter(|p| p.phase.has_logs())
            .filter_map(|p| self.classify_name(&p.name))
            .collect()
    }

    /// Select running API pods for request analysis.
    pub fn classify_api(&self, listing: &[PodListing]) -> Vec<PodDescriptor> {
        listing
            .iter()
            .filter(|p| p.phase == PodPhase::Running)
            .filter_map(|p| {
                self.api_rules
                    .iter()
                    .find(|r| p.name.contains(&r.fragment))
                    .map(|r| PodDescriptor {
                        name: p.name.clone(),
                        service: r.service.clone(),
                        category: PodCategory::Service,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(items: &[(&str, PodPhase)]) -> Vec<PodListing> {
        items
            .iter()
            .map(|(name, phase)| PodListing::new(*name, *phase))
            .collect()
    }

    #[test]
    fn test_service_pod() {
        let c = PodClassifier::with_defaults();
        let d = c.classify_name("octavia-worker-7c9f5-abcde").unwrap();
        assert_eq!(d.service, "octavia");
        assert_eq!(d.category, PodCategory::Service);
    }

    #[test]
    fn test_first_fragment_wins() {
        let patterns = PodPatterns {
            service_fragments: vec!["metadata-agent".into(), "neutron-ovn-metadata-agent".into()],
            ..PodPatterns::default()
        };
        let c = PodClassifier::new(&patterns);
        let d = c.classify_name("neutron-ovn-metadata-agent-x1").unwrap();
        assert_eq!(d.service, "metadata");
    }

    #[test]
    fn test_test_pod_service_from_second_segment() {
        let c = PodClassifier::with_defaults();
        let d = c.classify_name("tempest-designate-scenario-x7k2p").unwrap();
        assert_eq!(d.service, "designate");
        assert_eq!(d.category, PodCategory::Test);
    }

    #[test]
    fn test_test_pod_fallback_service() {
        let patterns = PodPatterns {
            test_prefixes: vec!["tempest".into()],
            ..PodPatterns::default()
        };
        let c = PodClassifier::new(&patterns);
        let d = c.classify_name("tempest").unwrap();
        assert_eq!(d.service, "tempest");
        assert_eq!(d.category, PodCategory::Test);
    }

    #[test]
    fn test_service_fragment_beats_test_prefix() {
        let c = PodClassifier::with_defaults();
        let d = c.classify_name("tempest-nova-api-runner").unwrap();
        assert_eq!(d.service, "nova");
        assert_eq!(d.category, PodCategory::Service);
    }

    #[test]
    fn test_unmatched_and_pending_excluded() {
        let c = PodClassifier::with_defaults();
        let pods = c.classify(&listing(&[
            ("rabbitmq-server-0", PodPhase::Running),
            ("nova-api-0", PodPhase::Pending),
            ("glance-api-external-0", PodPhase::Running),
            ("tempest-octavia-tests-abc", PodPhase::Succeeded),
            ("nova-compute-1", PodPhase::Failed),
        ]));
        let names: Vec<&str> = pods.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["glance-api-external-0", "tempest-octavia-tests-abc", "nova-compute-1"]
        );
    }

    #[test]
    fn test_api_pods_running_only() {
        let c = PodClassifier::with_defaults();
        let pods = c.classify_api(&listing(&[
            ("octavia-api-5d8-abc", PodPhase::Running),
            ("octavia-worker-0", PodPhase::Running),
            ("keystone-api-0", PodPhase::Succeeded),
            ("neutron-api-1", PodPhase::Running),
        ]));
        assert_eq!(pods.len(), 2);
        assert_eq!(pods[0].service, "octavia");
        assert_eq!(pods[1].service, "neutron");
    }
}
