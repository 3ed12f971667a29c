//! Observability Spine (C10), spec §4.9.
//!
//! Centralizes the `step=<name> duration_ms=<n> <k=v>... trace_id=<id>`
//! event format so every stage renders it identically. The format is a hard
//! contract (spec §4.9, §8 round-trip properties rely on it being
//! machine-parseable), so it is built once here and called from each stage
//! rather than assembled ad hoc at each call site.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

pub fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Emits one pipeline metric event. `fields` are rendered in order as
/// `key=value` pairs after `duration_ms`.
pub fn emit_event(step: &str, duration: Duration, trace_id: &str, fields: &[(&str, &str)]) {
    let mut line = format!(
        "step={} duration_ms={}",
        step,
        duration.as_millis()
    );
    for (k, v) in fields {
        line.push(' ');
        line.push_str(k);
        line.push('=');
        line.push_str(v);
    }
    line.push_str(" trace_id=");
    line.push_str(trace_id);
    tracing::info!("{}", line);
}

pub fn emit_event_owned(step: &str, duration: Duration, trace_id: &str, fields: &[(&str, String)]) {
    let borrowed: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
    emit_event(step, duration, trace_id, &borrowed);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// A leaf collaborator's health check, bounded to a 1-second ceiling by the
/// caller (spec §4.9).
#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self) -> bool;
}

/// Aggregates leaf health checks: any one unhealthy -> degraded, two or
/// more -> unhealthy.
pub async fn aggregate_health(checks: &[Box<dyn HealthCheck>]) -> (HealthStatus, Vec<(String, bool)>) {
    let mut results = Vec::with_capacity(checks.len());
    for check in checks {
        let ceiling = tokio::time::timeout(Duration::from_secs(1), check.check()).await;
        let ok = ceiling.unwrap_or(false);
        results.push((check.name().to_string(), ok));
    }
    let unhealthy = results.iter().filter(|(_, ok)| !ok).count();
    let status = match unhealthy {
        0 => HealthStatus::Healthy,
        1 => HealthStatus::Degraded,
        _ => HealthStatus::Unhealthy,
    };
    (status, results)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysOk;
    #[async_trait]
    impl HealthCheck for AlwaysOk {
        fn name(&self) -> &str {
            "ok"
        }
        async fn check(&self) -> bool {
            true
        }
    }

    struct AlwaysFail;
    #[async_trait]
    impl HealthCheck for AlwaysFail {
        fn name(&self) -> &str {
            "fail"
        }
        async fn check(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn all_healthy_is_healthy() {
        let checks: Vec<Box<dyn HealthCheck>> = vec![Box::new(AlwaysOk), Box::new(AlwaysOk)];
        let (status, _) = aggregate_health(&checks).await;
        assert_eq!(status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn one_unhealthy_degrades() {
        let checks: Vec<Box<dyn HealthCheck>> = vec![Box::new(AlwaysOk), Box::new(AlwaysFail)];
        let (status, _) = aggregate_health(&checks).await;
        assert_eq!(status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn two_unhealthy_is_unhealthy() {
        let checks: Vec<Box<dyn HealthCheck>> = vec![Box::new(AlwaysFail), Box::new(AlwaysFail)];
        let (status, _) = aggregate_health(&checks).await;
        assert_eq!(status, HealthStatus::Unhealthy);
    }

    #[test]
    fn trace_ids_are_unique() {
        assert_ne!(new_trace_id(), new_trace_id());
    }
}
