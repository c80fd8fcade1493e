//! Child fan-out
//!
//! 각 작업마다 자식 컨텍스트를 만들고 tokio 태스크로 동시에 실행합니다.
//! 자식의 stats 쓰기는 그 자리에서 부모로 전파되므로 완료 후 집계할 것이 없습니다.

use forgeloop_core::{AgentData, ExecutionContext};
use forgeloop_foundation::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// 하나의 자식 작업
#[derive(Debug, Clone)]
pub struct ChildJob<J> {
    pub name: String,
    pub data: AgentData,
    pub input: J,
}

impl<J> ChildJob<J> {
    /// 작업 이름을 task로 쓰는 기본 작업 메모리
    pub fn new(name: impl Into<String>, input: J) -> Self {
        let name = name.into();
        Self {
            data: AgentData::new(name.clone()),
            name,
            input,
        }
    }

    pub fn with_data(mut self, data: AgentData) -> Self {
        self.data = data;
        self
    }
}

/// 작업마다 자식을 만들어 `f(child, input)`을 동시에 실행
///
/// 각 자식은 자신의 future가 끝나는 즉시 (성공/실패 무관) 완료 처리됩니다.
/// 결과는 작업 순서대로 반환되며, 패닉한 태스크는 `Error::Internal`이 됩니다.
pub async fn fan_out<J, T, F, Fut>(
    ctx: &Arc<ExecutionContext>,
    jobs: Vec<ChildJob<J>>,
    f: F,
) -> Vec<Result<T>>
where
    J: Send + 'static,
    T: Send + 'static,
    F: Fn(Arc<ExecutionContext>, J) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let f = Arc::new(f);
    let mut children = Vec::with_capacity(jobs.len());
    let mut handles = Vec::with_capacity(jobs.len());

    for job in jobs {
        let child = ctx.spawn_child(job.name, job.data);
        let parent = Arc::clone(ctx);
        let task_child = Arc::clone(&child);
        let f = Arc::clone(&f);

        handles.push(tokio::spawn(async move {
            let result = f(Arc::clone(&task_child), job.input).await;
            if let Err(e) = parent.complete_child(&task_child) {
                warn!(child = %task_child.name(), error = %e, "Failed to complete child");
            }
            result
        }));
        children.push(child);
    }

    debug!(context = %ctx.name(), children = children.len(), "Fan-out started");
    let joined = futures::future::join_all(handles).await;

    children
        .iter()
        .zip(joined)
        .map(|(child, joined)| {
            // 패닉한 태스크는 스스로 완료 처리하지 못함
            if !child.is_completed() {
                if let Err(e) = ctx.complete_child(child) {
                    warn!(child = %child.name(), error = %e, "Failed to complete child");
                }
            }
            match joined {
                Ok(result) => result,
                Err(join_error) => Err(Error::Internal(format!(
                    "child '{}' task failed: {join_error}",
                    child.name()
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeloop_foundation::keys;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_results_in_job_order() {
        let root = ExecutionContext::builder("root").build();
        let jobs = (0..5u64)
            .map(|i| ChildJob::new(format!("worker-{i}"), i))
            .collect();

        let results = fan_out(&root, jobs, |child, i| async move {
            tokio::time::sleep(std::time::Duration::from_millis(10 * (5 - i))).await;
            child.incr_counter(keys::INPUT_TOKENS, 500);
            Ok(i * 2)
        })
        .await;

        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![0, 2, 4, 6, 8]);
        assert_eq!(root.get_counter(keys::INPUT_TOKENS), 2500);
        assert_eq!(root.get_counter(keys::CHILDREN_COMPLETED), 5);
        assert!(root.children().iter().all(|c| c.is_completed()));
    }

    #[tokio::test]
    async fn test_failure_and_panic_are_reported() {
        let root = ExecutionContext::builder("root").build();
        let jobs = vec![
            ChildJob::new("ok", 0u8),
            ChildJob::new("fails", 1),
            ChildJob::new("panics", 2),
        ];

        let results = fan_out(&root, jobs, |_child, kind| async move {
            match kind {
                0 => Ok("fine"),
                1 => Err(Error::Step("no".into())),
                _ => panic!("worker blew up"),
            }
        })
        .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Step(_))));
        assert!(matches!(results[2], Err(Error::Internal(_))));
        assert_eq!(root.get_counter(keys::CHILDREN_COMPLETED), 3);
    }
}
