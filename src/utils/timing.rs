use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

use crate::utils::logging::TIMING_TARGET;

const ACTION_DETAIL_LIMIT: usize = 300;

#[derive(Debug)]
pub struct ActionTimer {
    action: String,
    detail_in: Option<String>,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

fn single_line(value: &str) -> String {
    let flattened = value.replace('\n', " ");
    if flattened.chars().count() > ACTION_DETAIL_LIMIT {
        flattened.chars().take(ACTION_DETAIL_LIMIT).collect()
    } else {
        flattened
    }
}

impl ActionTimer {
    pub fn new(action: &str, argument: Option<&str>) -> Self {
        ActionTimer {
            action: action.to_string(),
            detail_in: argument.map(single_line),
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        }
    }

    pub fn log_received(&self) {
        info!(
            target: TIMING_TARGET,
            "event=action_received action={} received_at={} argument={:?}",
            self.action,
            self.started_at.to_rfc3339(),
            self.detail_in
        );
    }

    pub fn mark_status(&mut self, status: &str, detail: Option<String>) {
        self.status = status.to_string();
        self.detail = detail.map(|value| single_line(&value));
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=action_completed action={} started_at={} completed_at={} duration_s={:.3} status={} detail={}",
            self.action,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            self.status,
            self.detail.clone().unwrap_or_default()
        );
    }
}

pub fn start_action_timer(action: &str, argument: Option<&str>) -> ActionTimer {
    let timer = ActionTimer::new(action, argument);
    timer.log_received();
    timer
}

pub fn complete_action_timer(timer: &mut ActionTimer, status: &str, detail: Option<String>) {
    timer.mark_status(status, detail);
    timer.log_completed();
}

pub async fn log_llm_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: TIMING_TARGET,
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let status = match &result {
        Ok(_) => "success".to_string(),
        Err(err) => format!("error: {}", single_line(&err.to_string())),
    };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: TIMING_TARGET,
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        metadata_text
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_records_final_status_once() {
        let mut timer = start_action_timer("generate", Some("line one\nline two"));
        assert_eq!(timer.detail_in.as_deref(), Some("line one line two"));
        complete_action_timer(&mut timer, "error", Some("boom".to_string()));
        assert!(timer.completed);
        assert_eq!(timer.status, "error");
    }

    #[test]
    fn long_arguments_are_truncated() {
        let long = "x".repeat(ACTION_DETAIL_LIMIT + 50);
        let timer = ActionTimer::new("set", Some(&long));
        assert_eq!(
            timer.detail_in.map(|value| value.chars().count()),
            Some(ACTION_DETAIL_LIMIT)
        );
    }

    #[tokio::test]
    async fn llm_timing_passes_result_through() {
        let ok: Result<u8, String> =
            log_llm_timing("gemini", "model", "edit_image", None, || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u8, String> = log_llm_timing("gemini", "model", "edit_image", None, || async {
            Err("refused".to_string())
        })
        .await;
        assert_eq!(err, Err("refused".to_string()));
    }
}
