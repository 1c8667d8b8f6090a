//! Registry of named resources and their gates

use sempool_config::{check_capacity, Config};
use sempool_errors::{ConfigError, Error, GateError};
use sempool_types::TierPermits;
use std::collections::HashMap;
use std::sync::Arc;

use crate::availability::GateAvailability;
use crate::gate::PriorityGate;

/// Derive the permits of both tiers from a resource capacity.
///
/// `low = max(1, round(capacity / low_divisor))` and
/// `high = max(1, round(low / high_divisor))`, rounding half away from zero.
/// The reserve is computed from the already rounded low tier.
///
/// # Panics
///
/// Panics if either divisor is zero; [`ResourceRegistry::new`] rejects those.
#[must_use]
pub fn tier_permits(capacity: usize, low_divisor: u32, high_divisor: u32) -> TierPermits {
    let low = divide_rounded(capacity, low_divisor).max(1);
    let high = divide_rounded(low, high_divisor).max(1);
    TierPermits { low, high }
}

fn divide_rounded(value: usize, divisor: u32) -> usize {
    // widened so that 2 * value cannot overflow; the quotient never exceeds value
    let divisor = u128::from(divisor);
    let quotient = (2 * value as u128 + divisor) / (2 * divisor);
    usize::try_from(quotient).unwrap_or(value)
}

/// Named shared resources and their priority gates
///
/// Gates are created eagerly on registration and live as long as the
/// registry. Once the registry is shared with a dispatcher the set of names
/// is closed.
#[derive(Debug)]
pub struct ResourceRegistry {
    low_divisor: u32,
    high_divisor: u32,
    gates: Vec<Arc<PriorityGate>>,
    index: HashMap<String, usize>,
}

impl ResourceRegistry {
    /// Create an empty registry with the given tier weights
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDivisor` if either divisor is zero.
    pub fn new(low_divisor: u32, high_divisor: u32) -> Result<Self, Error> {
        for (field, value) in [("low_divisor", low_divisor), ("high_divisor", high_divisor)] {
            if value == 0 {
                return Err(ConfigError::InvalidDivisor {
                    field: field.to_string(),
                    value,
                }
                .into());
            }
        }

        Ok(Self {
            low_divisor,
            high_divisor,
            gates: Vec::new(),
            index: HashMap::new(),
        })
    }

    /// Build a registry from the `[gate]` weights and `[[resources]]` list
    ///
    /// # Errors
    ///
    /// Returns a configuration error on zero divisors, zero capacities or
    /// duplicate names.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let mut registry = Self::new(config.gate.low_divisor, config.gate.high_divisor)?;
        for entry in &config.resources {
            registry.register(&entry.name, entry.capacity)?;
        }
        Ok(registry)
    }

    /// Register a resource and create its gate
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateResource` if the name is taken and
    /// `ConfigError::InvalidCapacity` if `capacity` is zero or larger than
    /// [`sempool_config::constants::MAX_CAPACITY`].
    pub fn register(&mut self, name: impl Into<String>, capacity: usize) -> Result<(), Error> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(ConfigError::DuplicateResource { name }.into());
        }
        check_capacity(&name, capacity)?;

        let permits = tier_permits(capacity, self.low_divisor, self.high_divisor);
        tracing::debug!(
            resource = %name,
            capacity,
            low = permits.low,
            high = permits.high,
            "registered resource"
        );

        self.index.insert(name.clone(), self.gates.len());
        self.gates
            .push(Arc::new(PriorityGate::new(name, capacity, permits)));
        Ok(())
    }

    /// Look up the gate of a resource
    ///
    /// # Errors
    ///
    /// Returns `GateError::UnknownResource` if the name is not registered.
    pub fn get(&self, name: &str) -> Result<&Arc<PriorityGate>, Error> {
        self.index
            .get(name)
            .map(|&slot| &self.gates[slot])
            .ok_or_else(|| {
                GateError::UnknownResource {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.gates.iter().map(|gate| gate.name())
    }

    /// Permits of both tiers of a resource
    ///
    /// # Errors
    ///
    /// Returns `GateError::UnknownResource` if the name is not registered.
    pub fn capacity(&self, name: &str) -> Result<TierPermits, Error> {
        self.get(name).map(|gate| gate.permits())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Close every gate; dispatches still waiting fail with
    /// `GateError::Closed`
    pub fn close(&self) {
        for gate in &self.gates {
            gate.close();
        }
        tracing::debug!(resources = self.gates.len(), "closed all gates");
    }

    /// Point-in-time view of every gate, in registration order
    #[must_use]
    pub fn availability(&self) -> Vec<GateAvailability> {
        self.gates
            .iter()
            .map(|gate| GateAvailability::of(gate))
            .collect()
    }
}
