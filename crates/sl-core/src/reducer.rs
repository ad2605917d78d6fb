//! Reducers: the stateful objects behind the aggregate clause.
//!
//! Contract, per window: `reset()` once, `update(value)` per row in
//! arrival order, `value()` exactly once. Windows with zero rows are
//! suppressed upstream, so `value()` always observes at least one update
//! in practice; every reducer still returns something sensible without
//! one.

use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::BuildHasherDefault;

use hyperloglogplus::{HyperLogLog, HyperLogLogPlus};

use crate::value::Value;

/// Sketch precision for `uniq`: 2^16 registers.
const UNIQ_PRECISION: u8 = 16;

// ---------------------------------------------------------------------------
// Reducer trait
// ---------------------------------------------------------------------------

pub trait Reducer: Send {
    fn reset(&mut self);
    fn update(&mut self, value: &Value);
    fn value(&mut self) -> Value;
}

// ---------------------------------------------------------------------------
// count
// ---------------------------------------------------------------------------

/// Number of update calls; the argument is ignored.
#[derive(Default)]
pub struct Count {
    count: i64,
}

impl Reducer for Count {
    fn reset(&mut self) {
        self.count = 0;
    }

    fn update(&mut self, _value: &Value) {
        self.count += 1;
    }

    fn value(&mut self) -> Value {
        Value::Int(self.count)
    }
}

// ---------------------------------------------------------------------------
// sum / avg
// ---------------------------------------------------------------------------

/// Arithmetic sum; integer inputs are promoted to float64.
#[derive(Default)]
pub struct Sum {
    sum: f64,
}

impl Reducer for Sum {
    fn reset(&mut self) {
        self.sum = 0.0;
    }

    fn update(&mut self, value: &Value) {
        match value {
            Value::Int(i) => self.sum += *i as f64,
            Value::Float(f) => self.sum += f,
            _ => {}
        }
    }

    fn value(&mut self) -> Value {
        Value::Float(self.sum)
    }
}

#[derive(Default)]
pub struct Avg {
    sum: f64,
    count: i64,
}

impl Reducer for Avg {
    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }

    fn update(&mut self, value: &Value) {
        match value {
            Value::Int(i) => self.sum += *i as f64,
            Value::Float(f) => self.sum += f,
            _ => return,
        }
        self.count += 1;
    }

    fn value(&mut self) -> Value {
        if self.count == 0 {
            return Value::Float(f64::NAN);
        }
        Value::Float(self.sum / self.count as f64)
    }
}

// ---------------------------------------------------------------------------
// min / max
// ---------------------------------------------------------------------------

/// Extremum under natural order, keeping the input type.
pub struct Extremum {
    take_max: bool,
    float_input: bool,
    current: Option<Value>,
}

impl Extremum {
    pub fn min(float_input: bool) -> Self {
        Self {
            take_max: false,
            float_input,
            current: None,
        }
    }

    pub fn max(float_input: bool) -> Self {
        Self {
            take_max: true,
            float_input,
            current: None,
        }
    }

    fn beats(&self, challenger: &Value, incumbent: &Value) -> bool {
        let ord = match (challenger, incumbent) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => {
                a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
            }
            _ => return false,
        };
        if self.take_max {
            ord.is_gt()
        } else {
            ord.is_lt()
        }
    }
}

impl Reducer for Extremum {
    fn reset(&mut self) {
        self.current = None;
    }

    fn update(&mut self, value: &Value) {
        match &self.current {
            None => self.current = Some(value.clone()),
            Some(incumbent) => {
                if self.beats(value, incumbent) {
                    self.current = Some(value.clone());
                }
            }
        }
    }

    fn value(&mut self) -> Value {
        match self.current.take() {
            Some(v) => v,
            // Identity element of the extremum, typed like the input.
            None if self.float_input && self.take_max => Value::Float(f64::NEG_INFINITY),
            None if self.float_input => Value::Float(f64::INFINITY),
            None if self.take_max => Value::Int(i64::MIN),
            None => Value::Int(i64::MAX),
        }
    }
}

// ---------------------------------------------------------------------------
// first / last
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct First {
    first: Option<Value>,
}

impl Reducer for First {
    fn reset(&mut self) {
        self.first = None;
    }

    fn update(&mut self, value: &Value) {
        if self.first.is_none() {
            self.first = Some(value.clone());
        }
    }

    fn value(&mut self) -> Value {
        self.first.take().unwrap_or(Value::Text(String::new()))
    }
}

#[derive(Default)]
pub struct Last {
    last: Option<Value>,
}

impl Reducer for Last {
    fn reset(&mut self) {
        self.last = None;
    }

    fn update(&mut self, value: &Value) {
        self.last = Some(value.clone());
    }

    fn value(&mut self) -> Value {
        self.last.take().unwrap_or(Value::Text(String::new()))
    }
}

// ---------------------------------------------------------------------------
// distinctcount / uniq
// ---------------------------------------------------------------------------

/// Exact distinct count over hashed inputs.
#[derive(Default)]
pub struct DistinctCount {
    seen: HashSet<u64>,
}

impl Reducer for DistinctCount {
    fn reset(&mut self) {
        self.seen.clear();
    }

    fn update(&mut self, value: &Value) {
        self.seen.insert(value.hash_key());
    }

    fn value(&mut self) -> Value {
        Value::Int(self.seen.len() as i64)
    }
}

/// Approximate distinct count via a HyperLogLog++ sketch.
///
/// The hasher is seed-free so replay runs produce identical estimates.
pub struct Uniq {
    sketch: HyperLogLogPlus<u64, BuildHasherDefault<DefaultHasher>>,
}

impl Uniq {
    pub fn new() -> Self {
        Self {
            sketch: new_sketch(),
        }
    }
}

impl Default for Uniq {
    fn default() -> Self {
        Self::new()
    }
}

fn new_sketch() -> HyperLogLogPlus<u64, BuildHasherDefault<DefaultHasher>> {
    // The precision constant is in range, so construction cannot fail.
    match HyperLogLogPlus::new(UNIQ_PRECISION, BuildHasherDefault::default()) {
        Ok(sketch) => sketch,
        Err(_) => unreachable!("uniq sketch precision is fixed and valid"),
    }
}

impl Reducer for Uniq {
    fn reset(&mut self) {
        self.sketch = new_sketch();
    }

    fn update(&mut self, value: &Value) {
        self.sketch.insert(&value.hash_key());
    }

    fn value(&mut self) -> Value {
        Value::Int(self.sketch.count().round() as i64)
    }
}

// ---------------------------------------------------------------------------
// group / reason
// ---------------------------------------------------------------------------

/// Representative value for the window's group: `group(x)` is the
/// group-key projection of `x`, constant within a window, so the first
/// update wins.
#[derive(Default)]
pub struct Representative {
    inner: First,
}

impl Reducer for Representative {
    fn reset(&mut self) {
        self.inner.reset();
    }

    fn update(&mut self, value: &Value) {
        self.inner.update(value);
    }

    fn value(&mut self) -> Value {
        self.inner.value()
    }
}

// `reason` is wired as a `Last` over the synthetic close-reason input; no
// dedicated reducer is needed.

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(reducer: &mut dyn Reducer, values: &[Value]) -> Value {
        reducer.reset();
        for v in values {
            reducer.update(v);
        }
        reducer.value()
    }

    #[test]
    fn count_ignores_arguments() {
        let mut r = Count::default();
        let v = fold(&mut r, &[Value::Text("a".into()), Value::Int(1), Value::Bool(true)]);
        assert_eq!(v, Value::Int(3));
    }

    #[test]
    fn sum_promotes_integers() {
        let mut r = Sum::default();
        let v = fold(&mut r, &[Value::Int(1), Value::Float(0.5), Value::Int(2)]);
        assert_eq!(v, Value::Float(3.5));
    }

    #[test]
    fn avg_of_two() {
        let mut r = Avg::default();
        let v = fold(&mut r, &[Value::Int(1), Value::Int(2)]);
        assert_eq!(v, Value::Float(1.5));
    }

    #[test]
    fn min_max_keep_input_type() {
        let mut min = Extremum::min(false);
        assert_eq!(fold(&mut min, &[Value::Int(4), Value::Int(2), Value::Int(9)]), Value::Int(2));

        let mut max = Extremum::max(true);
        assert_eq!(
            fold(&mut max, &[Value::Float(4.0), Value::Float(9.5)]),
            Value::Float(9.5),
        );
    }

    #[test]
    fn first_and_last_follow_arrival_order() {
        let values = [Value::Int(7), Value::Int(8), Value::Int(9)];
        let mut first = First::default();
        assert_eq!(fold(&mut first, &values), Value::Int(7));
        let mut last = Last::default();
        assert_eq!(fold(&mut last, &values), Value::Int(9));
    }

    #[test]
    fn distinctcount_is_exact() {
        let mut r = DistinctCount::default();
        let v = fold(
            &mut r,
            &[
                Value::Text("a".into()),
                Value::Text("b".into()),
                Value::Text("a".into()),
                Value::Int(1),
            ],
        );
        assert_eq!(v, Value::Int(3));
    }

    #[test]
    fn uniq_is_close_on_small_sets() {
        let mut r = Uniq::new();
        r.reset();
        for i in 0..100i64 {
            r.update(&Value::Int(i));
        }
        let Value::Int(estimate) = r.value() else {
            panic!("uniq must return integer64");
        };
        // Sparse-mode HLL++ is exact at this cardinality.
        assert_eq!(estimate, 100);
    }

    #[test]
    fn uniq_is_deterministic() {
        let run = || {
            let mut r = Uniq::new();
            r.reset();
            for i in 0..1000i64 {
                r.update(&Value::Int(i * 7));
            }
            r.value()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn reset_clears_state() {
        let mut r = Sum::default();
        fold(&mut r, &[Value::Int(5)]);
        let v = fold(&mut r, &[Value::Int(1)]);
        assert_eq!(v, Value::Float(1.0));
    }
}
