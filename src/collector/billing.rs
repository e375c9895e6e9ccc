//! Shared plumbing for the GitHub billing collectors.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use prometheus::core::Desc;

use crate::collector::actions::ActionsCollector;
use crate::collector::packages::PackagesCollector;
use crate::collector::registry::{CollectorRegistry, RegistryError};
use crate::collector::storage::StorageCollector;
use crate::collector::{CollectorError, NAMESPACE, fq_name};
use crate::github::{GithubClient, GithubSettings};

/// Label carrying the organization name.
pub const ORG_LABEL: &str = "org";

/// Dependencies shared by the billing collectors.
#[derive(Debug, Clone)]
pub struct BillingContext {
    pub client: GithubClient,
    pub orgs: Arc<[String]>,
}

impl BillingContext {
    /// Build the shared client and org list.
    ///
    /// Repeated organizations are reported once, in first-seen order.
    pub fn new(settings: &GithubSettings) -> Result<Self, CollectorError> {
        let mut seen = HashSet::new();
        let orgs: Vec<String> = settings
            .orgs
            .iter()
            .filter(|org| seen.insert(org.as_str()))
            .cloned()
            .collect();
        if orgs.len() != settings.orgs.len() {
            tracing::warn!(orgs = ?orgs, "Ignoring repeated GitHub organizations");
        }

        Ok(Self {
            client: GithubClient::new(settings)?,
            orgs: orgs.into(),
        })
    }

    /// Organizations to report on, failing when none are configured.
    pub(crate) fn require_orgs(&self) -> Result<Arc<[String]>, CollectorError> {
        if self.orgs.is_empty() {
            return Err(CollectorError::Config(
                "no GitHub organizations configured".to_string(),
            ));
        }
        Ok(Arc::clone(&self.orgs))
    }
}

/// Register the built-in billing collectors. All are enabled by default.
pub fn register_builtin(
    registry: &mut CollectorRegistry<BillingContext>,
) -> Result<(), RegistryError> {
    registry.register(ActionsCollector::NAME, true, |ctx| {
        ActionsCollector::new(ctx.shared())
    })?;
    registry.register(PackagesCollector::NAME, true, |ctx| {
        PackagesCollector::new(ctx.shared())
    })?;
    registry.register(StorageCollector::NAME, true, |ctx| {
        StorageCollector::new(ctx.shared())
    })?;
    Ok(())
}

/// Descriptor for a billing gauge labeled by organization plus `extra` labels.
pub(crate) fn billing_desc(
    subsystem: &str,
    name: &str,
    help: &str,
    extra: &[&str],
) -> Result<Desc, CollectorError> {
    let labels = std::iter::once(ORG_LABEL)
        .chain(extra.iter().copied())
        .map(str::to_string)
        .collect();
    Ok(Desc::new(
        fq_name(NAMESPACE, subsystem, name),
        help.to_string(),
        labels,
        HashMap::new(),
    )?)
}

/// Run `collect_org` for every organization.
///
/// A failing organization does not stop the others; the first error is
/// returned once all have been attempted.
pub(crate) async fn for_each_org<'a, F, Fut>(
    orgs: &'a [String],
    mut collect_org: F,
) -> Result<(), CollectorError>
where
    F: FnMut(&'a str) -> Fut,
    Fut: Future<Output = Result<(), CollectorError>>,
{
    let mut first_error = None;
    for org in orgs {
        if let Err(e) = collect_org(org).await {
            tracing::warn!(org = %org, error = %e, "Failed to collect organization billing");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_desc_labels() {
        let desc = billing_desc("actions", "minutes_used_breakdown", "help", &["runner"]).unwrap();
        assert_eq!(desc.fq_name, "github_billing_actions_minutes_used_breakdown");
        assert_eq!(
            desc.variable_labels,
            vec!["org".to_string(), "runner".to_string()]
        );
    }

    #[test]
    fn test_repeated_orgs_are_reported_once() {
        let settings = GithubSettings {
            orgs: vec!["acme".into(), "globex".into(), "acme".into()],
            ..Default::default()
        };
        let ctx = BillingContext::new(&settings).unwrap();
        assert_eq!(&*ctx.orgs, ["acme".to_string(), "globex".to_string()]);
    }

    #[test]
    fn test_require_orgs_empty() {
        let ctx = BillingContext::new(&GithubSettings::default()).unwrap();
        let err = ctx.require_orgs().unwrap_err();
        assert!(err.to_string().contains("no GitHub organizations"));
    }

    #[test]
    fn test_register_builtin() {
        let mut registry = CollectorRegistry::new();
        register_builtin(&mut registry).unwrap();

        let resolved = registry.resolve();
        assert_eq!(
            resolved.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["actions", "packages", "storage"]
        );
        assert!(resolved.values().all(|enabled| *enabled));

        // Registering twice collides on the first name
        assert_eq!(
            register_builtin(&mut registry),
            Err(RegistryError::Duplicate("actions".to_string()))
        );
    }

    #[tokio::test]
    async fn test_for_each_org_attempts_all() {
        let orgs = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let seen = std::sync::Mutex::new(Vec::new());

        let result = for_each_org(&orgs, |org| {
            seen.lock().unwrap().push(org.to_string());
            async move {
                if org == "a" {
                    Err(CollectorError::Config("first".to_string()))
                } else if org == "b" {
                    Err(CollectorError::Config("second".to_string()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
        assert!(result.unwrap_err().to_string().contains("first"));
    }
}
