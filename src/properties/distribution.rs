use crate::columns::ColId;
use crate::properties::PhysicalProp;

/// Data distribution across the cluster.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub enum DistributionSpec {
    /// No requirement.
    #[default]
    Any,
    /// One partition on a single host.
    Singleton,
    /// Partitioned by hash of the given columns.
    Hashed(Vec<ColId>),
    /// Partitioned without any placement rule.
    Random,
}

impl PhysicalProp for DistributionSpec {
    fn satisfies(&self, required: &Self) -> bool {
        match (self, required) {
            (_, DistributionSpec::Any) => true,
            (DistributionSpec::Singleton, DistributionSpec::Singleton) => true,
            (DistributionSpec::Hashed(delivered), DistributionSpec::Hashed(cols)) => {
                delivered == cols
            }
            // A singleton trivially meets a hashed requirement: all rows that
            // would co-locate already do.
            (DistributionSpec::Singleton, DistributionSpec::Hashed(_)) => true,
            (DistributionSpec::Singleton, DistributionSpec::Random) => true,
            (DistributionSpec::Hashed(_), DistributionSpec::Random) => true,
            (DistributionSpec::Random, DistributionSpec::Random) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_satisfaction() {
        let hashed = DistributionSpec::Hashed(vec![ColId(1)]);

        assert!(hashed.satisfies(&DistributionSpec::Any));
        assert!(hashed.satisfies(&DistributionSpec::Random));
        assert!(hashed.satisfies(&hashed.clone()));
        assert!(!hashed.satisfies(&DistributionSpec::Hashed(vec![ColId(2)])));
        assert!(!hashed.satisfies(&DistributionSpec::Singleton));

        assert!(DistributionSpec::Singleton.satisfies(&hashed));
        assert!(!DistributionSpec::Random.satisfies(&DistributionSpec::Singleton));
    }
}
