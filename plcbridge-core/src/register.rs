//! Running minimum / maximum registers per variable.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use plcbridge_types::{current_timestamp_ms, Register, SampleRecord, Value};

use crate::error::{BridgeError, Result};
use crate::settings::RegisterPolicy;

/// A tracked extreme: the raw reading and its integer interpretation.
#[derive(Debug, Clone, PartialEq)]
struct Extreme {
    value: Value,
    ordinal: i64,
}

/// Register state of a single variable.
///
/// `minimum` and `maximum` only return to unset through [`RegisterAggregator::clear`].
/// `tracking_since` is set once per tracking epoch and shared by both extremes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegisterState {
    minimum: Option<Extreme>,
    maximum: Option<Extreme>,
    tracking_since: Option<u64>,
}

impl RegisterState {
    pub fn minimum(&self) -> Option<&Value> {
        self.minimum.as_ref().map(|e| &e.value)
    }

    pub fn maximum(&self) -> Option<&Value> {
        self.maximum.as_ref().map(|e| &e.value)
    }

    pub fn tracking_since(&self) -> Option<u64> {
        self.tracking_since
    }
}

/// Register values as reported in a sample record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegisterSnapshot {
    pub min: Register<Value>,
    pub max: Register<Value>,
    pub since: Register<u64>,
}

impl RegisterSnapshot {
    /// Copy the register fields into a record.
    pub fn apply_to(self, record: &mut SampleRecord) {
        record.register_min = self.min;
        record.register_max = self.max;
        record.register_timestamp = self.since;
    }
}

/// Per-variable register aggregation.
///
/// Each variable has its own lock, so observing one variable never waits on
/// another, and a clear racing an observe of the same variable serializes.
#[derive(Debug, Default)]
pub struct RegisterAggregator {
    registers: RwLock<BTreeMap<String, Arc<Mutex<RegisterState>>>>,
}

impl RegisterAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&self, key: &str) -> Arc<Mutex<RegisterState>> {
        // Fast path: check if it exists
        {
            let registers = self.registers.read();
            if let Some(state) = registers.get(key) {
                return state.clone();
            }
        }

        // Slow path: create it
        let mut registers = self.registers.write();
        registers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(RegisterState::default())))
            .clone()
    }

    /// Feed one reading through the register of `key`.
    ///
    /// Fails with [`BridgeError::AggregationType`] when the value has no
    /// integer interpretation; the register is left untouched in that case.
    pub fn observe(&self, key: &str, value: &Value, policy: RegisterPolicy) -> Result<RegisterSnapshot> {
        self.observe_at(key, value, policy, current_timestamp_ms())
    }

    /// Like [`observe`](Self::observe) with an explicit wall-clock time.
    pub fn observe_at(
        &self,
        key: &str,
        value: &Value,
        policy: RegisterPolicy,
        now_ms: u64,
    ) -> Result<RegisterSnapshot> {
        if !policy.is_enabled() {
            return Ok(RegisterSnapshot::default());
        }

        let ordinal = value.as_integer().ok_or_else(|| BridgeError::AggregationType {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        let candidate = Extreme {
            value: value.clone(),
            ordinal,
        };

        let cell = self.get_or_create(key);
        let mut state = cell.lock();

        if policy.min && state.minimum.as_ref().map_or(true, |m| ordinal < m.ordinal) {
            state.minimum = Some(candidate.clone());
        }
        if policy.max && state.maximum.as_ref().map_or(true, |m| ordinal > m.ordinal) {
            state.maximum = Some(candidate);
        }
        if state.tracking_since.is_none() {
            state.tracking_since = Some(now_ms);
        }

        Ok(RegisterSnapshot {
            min: if policy.min {
                state.minimum().cloned().into()
            } else {
                Register::NotApplicable
            },
            max: if policy.max {
                state.maximum().cloned().into()
            } else {
                Register::NotApplicable
            },
            since: state.tracking_since.into(),
        })
    }

    /// Reset the register of `key` to fully unset.
    ///
    /// Returns false if the key has never been observed; that is not an error.
    pub fn clear(&self, key: &str) -> bool {
        let registers = self.registers.read();
        match registers.get(key) {
            Some(state) => {
                *state.lock() = RegisterState::default();
                true
            }
            None => false,
        }
    }

    /// Current state of a register, if it was ever observed.
    pub fn state(&self, key: &str) -> Option<RegisterState> {
        self.registers.read().get(key).map(|state| state.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN_ONLY: RegisterPolicy = RegisterPolicy {
        min: true,
        max: false,
    };

    #[test]
    fn first_observation_seeds_both_extremes() {
        let registers = RegisterAggregator::new();
        let snap = registers
            .observe_at("pressure", &Value::Int(10), RegisterPolicy::BOTH, 1_000)
            .unwrap();

        assert_eq!(snap.min, Register::Set(Value::Int(10)));
        assert_eq!(snap.max, Register::Set(Value::Int(10)));
        assert_eq!(snap.since, Register::Set(1_000));
    }

    #[test]
    fn tracks_true_minimum_and_maximum() {
        let registers = RegisterAggregator::new();
        let values = [10, 4, 7, 12, 4, -3, 8];

        let mut snap = RegisterSnapshot::default();
        for (i, v) in values.iter().enumerate() {
            snap = registers
                .observe_at("p", &Value::Int(*v), RegisterPolicy::BOTH, 1_000 + i as u64)
                .unwrap();
        }

        assert_eq!(snap.min, Register::Set(Value::Int(-3)));
        assert_eq!(snap.max, Register::Set(Value::Int(12)));
        assert_eq!(snap.since, Register::Set(1_000));
    }

    #[test]
    fn untracked_extreme_is_not_applicable() {
        let registers = RegisterAggregator::new();
        registers.observe_at("p", &Value::Int(5), MIN_ONLY, 1).unwrap();
        let snap = registers.observe_at("p", &Value::Int(9), MIN_ONLY, 2).unwrap();

        assert_eq!(snap.min, Register::Set(Value::Int(5)));
        assert_eq!(snap.max, Register::NotApplicable);
        assert_eq!(snap.since, Register::Set(1));
    }

    #[test]
    fn disabled_policy_creates_no_state() {
        let registers = RegisterAggregator::new();
        let snap = registers
            .observe_at("temp", &Value::Int(5), RegisterPolicy::NONE, 1)
            .unwrap();

        assert_eq!(snap, RegisterSnapshot::default());
        assert!(registers.state("temp").is_none());
    }

    #[test]
    fn comparison_uses_integer_coercion_but_keeps_raw_value() {
        let registers = RegisterAggregator::new();
        registers
            .observe_at("p", &Value::from("10"), RegisterPolicy::BOTH, 1)
            .unwrap();
        let snap = registers
            .observe_at("p", &Value::Float(9.7), RegisterPolicy::BOTH, 2)
            .unwrap();

        assert_eq!(snap.min, Register::Set(Value::Float(9.7)));
        assert_eq!(snap.max, Register::Set(Value::from("10")));
    }

    #[test]
    fn non_numeric_value_is_rejected_and_state_kept() {
        let registers = RegisterAggregator::new();
        registers.observe_at("p", &Value::Int(3), RegisterPolicy::BOTH, 1).unwrap();

        let err = registers
            .observe_at("p", &Value::from("fault"), RegisterPolicy::BOTH, 2)
            .unwrap_err();
        assert!(matches!(err, BridgeError::AggregationType { .. }));

        let state = registers.state("p").unwrap();
        assert_eq!(state.minimum(), Some(&Value::Int(3)));
        assert_eq!(state.maximum(), Some(&Value::Int(3)));
    }

    #[test]
    fn non_numeric_first_value_does_not_seed() {
        let registers = RegisterAggregator::new();
        assert!(registers
            .observe_at("p", &Value::from("n/a"), RegisterPolicy::BOTH, 1)
            .is_err());
        assert!(registers.state("p").is_none());
    }

    #[test]
    fn clear_then_observe_starts_fresh_epoch() {
        let registers = RegisterAggregator::new();
        registers.observe_at("p", &Value::Int(1), RegisterPolicy::BOTH, 100).unwrap();
        registers.observe_at("p", &Value::Int(50), RegisterPolicy::BOTH, 200).unwrap();

        assert!(registers.clear("p"));
        let state = registers.state("p").unwrap();
        assert!(state.minimum().is_none());
        assert!(state.maximum().is_none());
        assert!(state.tracking_since().is_none());

        let snap = registers.observe_at("p", &Value::Int(20), RegisterPolicy::BOTH, 300).unwrap();
        assert_eq!(snap.min, Register::Set(Value::Int(20)));
        assert_eq!(snap.max, Register::Set(Value::Int(20)));
        assert_eq!(snap.since, Register::Set(300));
    }

    #[test]
    fn clear_unknown_key_is_noop() {
        let registers = RegisterAggregator::new();
        assert!(!registers.clear("missing"));
        assert!(!registers.clear("missing"));
        assert!(registers.state("missing").is_none());
    }

    #[test]
    fn concurrent_clear_and_observe_never_tear() {
        use std::thread;

        let registers = Arc::new(RegisterAggregator::new());
        registers.observe_at("p", &Value::Int(0), RegisterPolicy::BOTH, 1).unwrap();

        let observer = {
            let registers = registers.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    registers
                        .observe_at("p", &Value::Int(i), RegisterPolicy::BOTH, i as u64)
                        .unwrap();
                }
            })
        };
        let clearer = {
            let registers = registers.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    registers.clear("p");
                }
            })
        };

        observer.join().unwrap();
        clearer.join().unwrap();

        // Either fully cleared or a consistent epoch with min <= max.
        let state = registers.state("p").unwrap();
        match (state.minimum(), state.maximum(), state.tracking_since()) {
            (None, None, None) => {}
            (Some(min), Some(max), Some(_)) => {
                assert!(min.as_integer().unwrap() <= max.as_integer().unwrap());
            }
            other => panic!("torn register state: {:?}", other),
        }
    }
}
