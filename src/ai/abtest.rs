//! Deterministic A/B variant assignment (spec §4.3, §9, §11); exact hash
//! grounded in `examples/original_source/src/mcp/text_ai/ab_testing.py`
//! `get_variant_for_user`:
//! `int(md5(f"{test_id}:{user_id}").hexdigest(), 16) % 100 + 1`.

use md5::{Digest, Md5};

use crate::types::{ABTest, ABTestStatus, TestVariant};

/// Lower 64 bits of the MD5 digest, mod 100, 1-based (spec §9: "preserve
/// determinism by explicitly specifying the hash ... changing the hash
/// function is a breaking change").
pub fn assignment_percentage(test_id: &str, user_id: &str) -> u32 {
    let mut hasher = Md5::new();
    hasher.update(format!("{}:{}", test_id, user_id).as_bytes());
    let digest = hasher.finalize();
    let mut low8 = [0u8; 8];
    low8.copy_from_slice(&digest[8..16]);
    let value = u64::from_be_bytes(low8);
    (value % 100) as u32 + 1
}

/// Walks variants in order against cumulative `traffic_percentage`, picking
/// the one whose cumulative range contains the assigned percentage.
/// Deterministic: the same `(test_id, user_id)` always maps to the same
/// variant (spec §8).
pub fn assign_variant<'a>(test: &'a ABTest, user_id: &str) -> Option<&'a TestVariant> {
    if test.status != ABTestStatus::Running {
        return None;
    }
    let percentage = assignment_percentage(&test.test_id, user_id) as f64;
    let mut cumulative = 0.0;
    for variant in &test.variants {
        cumulative += variant.traffic_percentage;
        if percentage <= cumulative {
            return Some(variant);
        }
    }
    test.variants.last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SplitStrategy, TestMetrics};

    fn sample_test() -> ABTest {
        ABTest {
            test_id: "test-1".into(),
            target_decision_type: crate::types::DecisionType::ResultRelevance,
            variants: vec![
                TestVariant {
                    template_id: "a".into(),
                    version: "1".into(),
                    traffic_percentage: 50.0,
                    is_control: true,
                    metrics: TestMetrics::default(),
                },
                TestVariant {
                    template_id: "b".into(),
                    version: "1".into(),
                    traffic_percentage: 50.0,
                    is_control: false,
                    metrics: TestMetrics::default(),
                },
            ],
            status: ABTestStatus::Running,
            split_strategy: SplitStrategy::DeterministicByUserHash,
            min_sample_per_variant: 100,
            max_duration_days: 14,
            success_metric_key: "quality".into(),
            statistical_result: None,
            started_at: None,
        }
    }

    #[test]
    fn assignment_is_stable() {
        let test = sample_test();
        let first = assign_variant(&test, "user-42").map(|v| v.template_id.clone());
        let second = assign_variant(&test, "user-42").map(|v| v.template_id.clone());
        assert_eq!(first, second);
    }

    #[test]
    fn not_running_yields_no_assignment() {
        let mut test = sample_test();
        test.status = ABTestStatus::Paused;
        assert!(assign_variant(&test, "user-42").is_none());
    }

    #[test]
    fn percentage_is_1_based_and_bounded() {
        for i in 0..50 {
            let pct = assignment_percentage("t", &format!("user-{}", i));
            assert!(pct >= 1 && pct <= 100);
        }
    }
}
