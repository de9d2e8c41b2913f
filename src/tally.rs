//! Pure tally functions over a round's collected messages.
//!
//! Everything here is side-effect-free: given a value set and a few round
//! constants, compute the next proposal (or a decision). No locking, no
//! networking, no knowledge of `NodeState` — which is what makes this the
//! easiest part of the crate to unit test.

use crate::value::Value;
use rand::Rng;

/// `⌊N/2⌋ + 1`, the phase-1 majority threshold.
pub fn majority(n: usize) -> usize {
    n / 2 + 1
}

/// Phase-1 tally (spec.md §4.3): counts `own_x` plus every received
/// phase-1 value that is `0` or `1`. `Unknown` never contributes to either
/// count and is never produced as an *input* here, only as an output.
pub fn phase1_tally(own_x: Value, messages: &[(Value, usize)], n: usize) -> Value {
    let (mut count0, mut count1) = (0usize, 0usize);
    for v in std::iter::once(own_x).chain(messages.iter().map(|(v, _)| *v)) {
        match v {
            Value::Zero => count0 += 1,
            Value::One => count1 += 1,
            Value::Unknown => {}
        }
    }

    let maj = majority(n);
    if count0 >= maj {
        Value::Zero
    } else if count1 >= maj {
        Value::One
    } else {
        Value::Unknown
    }
}

/// Outcome of a phase-2 tally: the node's next proposal, and whether this
/// round caused it to decide (in which case `next_x` is the decided value
/// and stays fixed forever after).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase2Outcome {
    pub next_x: Value,
    pub decided: bool,
}

/// Phase-2 tally (spec.md §4.3). Evaluates the five decision rules in
/// order; the first match wins. Rule (e), the randomized escape, is the
/// only place this protocol touches randomness.
pub fn phase2_tally<R: Rng + ?Sized>(
    own_x: Value,
    messages: &[(Value, usize)],
    n: usize,
    f: usize,
    rng: &mut R,
) -> Phase2Outcome {
    let assumed_honest = n.saturating_sub(f);
    let decision_threshold = assumed_honest / 2 + 1;
    let adoption_threshold = assumed_honest / 3 + 1;

    let (mut count0, mut count1) = (0usize, 0usize);
    for v in std::iter::once(own_x).chain(messages.iter().map(|(v, _)| *v)) {
        match v {
            Value::Zero => count0 += 1,
            Value::One => count1 += 1,
            Value::Unknown => {}
        }
    }

    if count0 >= decision_threshold && own_x == Value::Zero {
        Phase2Outcome {
            next_x: Value::Zero,
            decided: true,
        }
    } else if count1 >= decision_threshold && own_x == Value::One {
        Phase2Outcome {
            next_x: Value::One,
            decided: true,
        }
    } else if count0 >= adoption_threshold {
        Phase2Outcome {
            next_x: Value::Zero,
            decided: false,
        }
    } else if count1 >= adoption_threshold {
        Phase2Outcome {
            next_x: Value::One,
            decided: false,
        }
    } else {
        let bit = if rng.gen_bool(0.5) {
            Value::One
        } else {
            Value::Zero
        };
        Phase2Outcome {
            next_x: bit,
            decided: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn msgs(values: &[Value]) -> Vec<(Value, usize)> {
        values.iter().copied().enumerate().map(|(i, v)| (v, i)).collect()
    }

    #[test]
    fn phase1_majority_zero() {
        // n = 5, majority = 3. own_x=0 plus two more zeros reaches it.
        let result = phase1_tally(Value::Zero, &msgs(&[Value::Zero, Value::One, Value::One]), 5);
        assert_eq!(result, Value::Unknown); // only 2 zeros total, short of majority 3
    }

    #[test]
    fn phase1_majority_reached() {
        let result = phase1_tally(
            Value::Zero,
            &msgs(&[Value::Zero, Value::Zero, Value::One]),
            5,
        );
        assert_eq!(result, Value::Zero); // 3 zeros >= majority(5) = 3
    }

    #[test]
    fn phase1_no_majority_yields_unknown() {
        let result = phase1_tally(Value::Zero, &msgs(&[Value::One, Value::One]), 5);
        assert_eq!(result, Value::Unknown);
    }

    #[test]
    fn phase2_decides_when_threshold_met_and_own_value_matches() {
        // n=4, f=1 -> assumed_honest=3, decision_threshold=2.
        let mut rng = StepRng::new(0, 1);
        let outcome = phase2_tally(Value::Zero, &msgs(&[Value::Zero]), 4, 1, &mut rng);
        assert!(outcome.decided);
        assert_eq!(outcome.next_x, Value::Zero);
    }

    #[test]
    fn phase2_does_not_decide_when_own_value_differs() {
        // count0 reaches decision threshold, but own_x is One: rule (a)
        // does not fire, rule (b) cannot (count1 too low), so adoption
        // (rule c) takes over instead.
        let mut rng = StepRng::new(0, 1);
        let outcome = phase2_tally(Value::One, &msgs(&[Value::Zero, Value::Zero]), 4, 1, &mut rng);
        assert!(!outcome.decided);
        assert_eq!(outcome.next_x, Value::Zero);
    }

    #[test]
    fn phase2_adopts_below_decision_but_above_adoption_threshold() {
        // n=10, f=4 -> assumed_honest=6, decision_threshold=4, adoption_threshold=3.
        let mut rng = StepRng::new(0, 1);
        let outcome = phase2_tally(
            Value::Unknown,
            &msgs(&[Value::One, Value::One]),
            10,
            4,
            &mut rng,
        );
        assert!(!outcome.decided);
        assert_eq!(outcome.next_x, Value::One);
    }

    #[test]
    fn phase2_falls_back_to_coin_flip() {
        // Nobody above any threshold: must flip.
        let mut rng_low = StepRng::new(0, 0); // gen_bool(0.5) deterministic via seed
        let outcome = phase2_tally(Value::Unknown, &[], 10, 4, &mut rng_low);
        assert!(!outcome.decided);
        assert!(matches!(outcome.next_x, Value::Zero | Value::One));
    }
}
