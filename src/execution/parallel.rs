//! Bounded parallel lesson generation

use crate::agent::{AgentExecutor, AgentOutput, AgentTask};
use crate::core::context::LessonGenerationContext;
use crate::core::course::{Curriculum, LessonContent};
use crate::execution::fallback::fallback_lesson;
use crate::execution::StepExecutor;
use crate::validation::{validate_content, GateResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Lessons produced by one fan-out, in the order of the input contexts
#[derive(Debug, Clone)]
pub struct LessonBatch {
    pub lessons: Vec<LessonContent>,
    pub tokens_used: u64,
    /// How many lessons were replaced by templated content
    pub fallbacks: usize,
    /// The batch deadline fired before every lesson finished
    pub timed_out: bool,
}

/// Generated lesson waiting in its slot
struct Generated {
    lesson: LessonContent,
    tokens_used: u64,
}

/// Fans lesson generation out to the content author agent
pub struct ParallelContentExecutor<A> {
    steps: StepExecutor<A>,
}

impl<A> Clone for ParallelContentExecutor<A> {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
        }
    }
}

impl<A: AgentExecutor> ParallelContentExecutor<A> {
    pub fn new(steps: StepExecutor<A>) -> Self {
        Self { steps }
    }

    /// Generate one lesson per context with at most `max_concurrent` agent
    /// calls in flight.
    ///
    /// Each lesson gets a single attempt. A failed or mismatched lesson, or
    /// one still outstanding when the batch deadline fires, is replaced by
    /// [`fallback_lesson`]. The output always has one entry per context, in
    /// input order. `on_lesson(done, total)` runs as each lesson settles.
    pub async fn generate_lessons_parallel(
        &self,
        contexts: &[LessonGenerationContext],
        max_concurrent: usize,
        on_lesson: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> LessonBatch {
        let total = contexts.len();
        let max_concurrent = max_concurrent.max(1);
        info!("Generating {} lesson(s), {} at a time", total, max_concurrent);

        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let slots: Arc<Mutex<Vec<Option<Generated>>>> =
            Arc::new(Mutex::new((0..total).map(|_| None).collect()));
        let settled = AtomicUsize::new(0);

        let mut futures = Vec::with_capacity(total);
        for (position, context) in contexts.iter().enumerate() {
            let sem = semaphore.clone();
            let slots = slots.clone();
            let settled = &settled;
            let steps = &self.steps;
            futures.push(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return;
                };

                let request = steps.request(AgentTask::WriteLesson {
                    context: context.clone(),
                });
                match steps.call_once(&request).await {
                    Ok(response) => match response.output {
                        AgentOutput::Lesson(lesson) if lesson.lesson_id == context.lesson_id => {
                            debug!("Lesson {} generated", context.lesson_id);
                            slots.lock().await[position] = Some(Generated {
                                lesson,
                                tokens_used: response.usage.total(),
                            });
                        }
                        AgentOutput::Lesson(lesson) => warn!(
                            "Lesson {} came back as {}; using fallback",
                            context.lesson_id, lesson.lesson_id
                        ),
                        other => warn!(
                            "Lesson {} returned {} output; using fallback",
                            context.lesson_id,
                            other.kind()
                        ),
                    },
                    Err(e) => warn!("Lesson {} failed: {}; using fallback", context.lesson_id, e),
                }

                let done = settled.fetch_add(1, Ordering::SeqCst) + 1;
                on_lesson(done, total);
            });
        }

        let deadline = self.steps.config().content_batch_timeout();
        let timed_out = timeout(deadline, futures::future::join_all(futures))
            .await
            .is_err();
        if timed_out {
            warn!(
                "Lesson batch exceeded {:?}; keeping {} finished lesson(s)",
                deadline,
                settled.load(Ordering::SeqCst)
            );
        }

        let mut slots = slots.lock().await;
        let mut lessons = Vec::with_capacity(total);
        let mut tokens_used = 0;
        let mut fallbacks = 0;
        for (slot, context) in slots.iter_mut().zip(contexts) {
            match slot.take() {
                Some(generated) => {
                    tokens_used += generated.tokens_used;
                    lessons.push(generated.lesson);
                }
                None => {
                    fallbacks += 1;
                    lessons.push(fallback_lesson(context));
                }
            }
        }

        if fallbacks > 0 {
            warn!("{} of {} lesson(s) use fallback content", fallbacks, total);
        }

        LessonBatch {
            lessons,
            tokens_used,
            fallbacks,
            timed_out,
        }
    }
}

/// Run the content gate on every lesson and merge the verdicts
pub fn validate_lessons(lessons: &[LessonContent], curriculum: &Curriculum) -> GateResult {
    let known = curriculum.lesson_ids();
    GateResult::combine(lessons.iter().map(|lesson| {
        let gate = validate_content(lesson, curriculum, &known);
        if !gate.passed {
            warn!(
                "Lesson {} failed content validation: {}",
                lesson.lesson_id,
                gate.issue_messages().join("; ")
            );
        }
        gate
    }))
}
