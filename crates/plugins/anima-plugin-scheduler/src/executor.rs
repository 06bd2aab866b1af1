//! # Plan Executor
//!
//! Runs the ReWOO steps of a planned action in ascending `step_id`, feeding
//! each step the outputs of the steps before it. The first failing step ends
//! the run; nothing is retried.

use crate::context::StepContext;
use anima_core::{
    AnimaError, PlannedActionEntry, ResultSynthesizer, Result, RunOutcome, ToolExecutor,
};
use handlebars::Handlebars;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of running a plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRun {
    /// Completed, failed at a step, or failed during synthesis
    pub outcome: RunOutcome,
    /// Outputs of the steps that ran, keyed by output variable
    pub step_outputs: BTreeMap<String, Value>,
}

/// Executes multi-step plans against a tool executor
pub struct PlanExecutor {
    tools: Arc<dyn ToolExecutor>,
    synthesizer: Option<Arc<dyn ResultSynthesizer>>,
    handlebars: Handlebars<'static>,
}

impl PlanExecutor {
    /// Create an executor; without a synthesizer the rendered template
    /// itself is the final answer
    pub fn new(tools: Arc<dyn ToolExecutor>) -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Prompts are plain text.
        handlebars.register_escape_fn(handlebars::no_escape);

        Self {
            tools,
            synthesizer: None,
            handlebars,
        }
    }

    /// Use `synthesizer` to answer rendered synthesis prompts
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn ResultSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Run every step of the action's plan
    pub async fn execute(&self, action: &PlannedActionEntry) -> PlanRun {
        let steps = action
            .execution_plan
            .as_ref()
            .map(|plan| plan.ordered_steps())
            .unwrap_or_default();

        let mut ctx = StepContext::new();
        let mut last_output = Value::Null;

        for step in steps {
            let params = ctx.resolve_parameters(&step.parameters);
            debug!(
                action_id = %action.id,
                step_id = step.step_id,
                tool = %step.tool_name,
                "executing plan step"
            );

            match self.tools.execute(&step.tool_name, &params).await {
                Ok(output) => {
                    last_output = output.clone();
                    ctx.bind(step.output_variable.clone(), output);
                }
                Err(e) => {
                    warn!(
                        action_id = %action.id,
                        step_id = step.step_id,
                        tool = %step.tool_name,
                        error = %e,
                        "plan step failed, skipping the rest"
                    );
                    return PlanRun {
                        outcome: RunOutcome::Failed {
                            step_id: step.step_id,
                            tool_name: step.tool_name.clone(),
                            error: e.to_string(),
                        },
                        step_outputs: ctx.into_outputs(),
                    };
                }
            }
        }

        let outcome = match &action.synthesis_prompt_template {
            Some(template) => match self.synthesize(action, template, &ctx).await {
                Ok(answer) => RunOutcome::Completed {
                    output: Value::String(answer),
                },
                Err(e) => {
                    warn!(action_id = %action.id, error = %e, "synthesis failed");
                    RunOutcome::SynthesisFailed {
                        error: e.to_string(),
                    }
                }
            },
            None => RunOutcome::Completed {
                output: last_output,
            },
        };

        info!(
            action_id = %action.id,
            steps = ctx.outputs().len(),
            success = outcome.is_success(),
            "plan finished"
        );
        PlanRun {
            outcome,
            step_outputs: ctx.into_outputs(),
        }
    }

    /// Render the synthesis template over the step outputs and answer it
    async fn synthesize(
        &self,
        action: &PlannedActionEntry,
        template: &str,
        ctx: &StepContext,
    ) -> Result<String> {
        let prompt = self.render_prompt(action, template, ctx)?;
        match &self.synthesizer {
            Some(synthesizer) => synthesizer.synthesize(&prompt).await,
            None => Ok(prompt),
        }
    }

    /// Template data: `label`, `outputs.<var>`, and every output variable at
    /// the top level
    pub fn render_prompt(
        &self,
        action: &PlannedActionEntry,
        template: &str,
        ctx: &StepContext,
    ) -> Result<String> {
        let mut data = Map::new();
        for (variable, value) in ctx.outputs() {
            data.insert(variable.clone(), value.clone());
        }
        data.insert(
            "outputs".to_string(),
            Value::Object(
                ctx.outputs()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
        );
        data.insert("label".to_string(), Value::String(action.label.clone()));

        self.handlebars
            .render_template(template, &Value::Object(data))
            .map_err(|e| AnimaError::template(e.to_string()))
    }
}

impl std::fmt::Debug for PlanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanExecutor")
            .field("synthesizer", &self.synthesizer.is_some())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anima_core::{ReWooPlan, ReWooStep};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Mutex;

    /// Echoes its parameters back; fails for the tool named "broken"
    #[derive(Default)]
    pub(crate) struct RecordingTools {
        pub calls: Mutex<Vec<(String, BTreeMap<String, Value>)>>,
    }

    impl RecordingTools {
        pub fn tool_names(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(name, _)| name.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ToolExecutor for RecordingTools {
        async fn execute(
            &self,
            tool_name: &str,
            parameters: &BTreeMap<String, Value>,
        ) -> Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((tool_name.to_string(), parameters.clone()));
            match tool_name {
                "broken" => Err(AnimaError::tool("service unavailable")),
                "weather" => Ok(json!({"sky": "clear", "temp": 21})),
                "headline" => Ok(json!("markets calm")),
                _ => Ok(Value::Object(
                    parameters.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                )),
            }
        }
    }

    mockall::mock! {
        Synth {}

        #[async_trait]
        impl ResultSynthesizer for Synth {
            async fn synthesize(&self, prompt: &str) -> Result<String>;
        }
    }

    fn action(steps: Vec<ReWooStep>) -> PlannedActionEntry {
        PlannedActionEntry::one_shot("morning brief", Utc::now()).with_plan(ReWooPlan::new(steps))
    }

    #[tokio::test]
    async fn test_steps_run_in_id_order_with_substitution() {
        let tools = Arc::new(RecordingTools::default());
        let executor = PlanExecutor::new(tools.clone());

        let plan = action(vec![
            ReWooStep::new(2, "compose", "E2")
                .with_param("weather", "#E1")
                .with_param("text", "Today: #E1, news: #E3"),
            ReWooStep::new(1, "weather", "E1").with_param("city", "Lisbon"),
        ]);
        let run = executor.execute(&plan).await;

        assert_eq!(tools.tool_names(), vec!["weather", "compose"]);
        let calls = tools.calls.lock().unwrap();
        // Whole reference keeps the object, embedded one is text, later
        // reference stays literal.
        assert_eq!(calls[1].1["weather"], json!({"sky": "clear", "temp": 21}));
        assert_eq!(
            calls[1].1["text"],
            json!(r#"Today: {"sky":"clear","temp":21}, news: #E3"#)
        );
        assert!(run.outcome.is_success());
        assert_eq!(run.step_outputs.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_steps() {
        let tools = Arc::new(RecordingTools::default());
        let executor = PlanExecutor::new(tools.clone());

        let plan = action(vec![
            ReWooStep::new(1, "weather", "E1"),
            ReWooStep::new(2, "broken", "E2"),
            ReWooStep::new(3, "compose", "E3"),
        ]);
        let run = executor.execute(&plan).await;

        assert_eq!(tools.tool_names(), vec!["weather", "broken"]);
        match run.outcome {
            RunOutcome::Failed {
                step_id, tool_name, ..
            } => {
                assert_eq!(step_id, 2);
                assert_eq!(tool_name, "broken");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(run.step_outputs.keys().collect::<Vec<_>>(), vec!["E1"]);
    }

    #[tokio::test]
    async fn test_without_template_last_output_is_result() {
        let executor = PlanExecutor::new(Arc::new(RecordingTools::default()));
        let plan = action(vec![
            ReWooStep::new(1, "weather", "E1"),
            ReWooStep::new(2, "headline", "E2"),
        ]);

        let run = executor.execute(&plan).await;
        assert_eq!(
            run.outcome,
            RunOutcome::Completed {
                output: json!("markets calm")
            }
        );
    }

    #[tokio::test]
    async fn test_synthesis_renders_template_for_synthesizer() {
        let mut synth = MockSynth::new();
        synth
            .expect_synthesize()
            .withf(|prompt| prompt.to_string() == "Brief for morning brief: markets calm / clear")
            .times(1)
            .returning(|_| Ok("Calm markets and clear skies.".to_string()));

        let executor =
            PlanExecutor::new(Arc::new(RecordingTools::default())).with_synthesizer(Arc::new(synth));
        let plan = action(vec![
            ReWooStep::new(1, "weather", "E1"),
            ReWooStep::new(2, "headline", "E2"),
        ])
        .with_synthesis_template("Brief for {{label}}: {{E2}} / {{outputs.E1.sky}}");

        let run = executor.execute(&plan).await;
        assert_eq!(
            run.outcome,
            RunOutcome::Completed {
                output: json!("Calm markets and clear skies.")
            }
        );
    }

    #[tokio::test]
    async fn test_synthesizer_error_is_reported() {
        let mut synth = MockSynth::new();
        synth
            .expect_synthesize()
            .returning(|_| Err(AnimaError::other("model offline")));

        let executor =
            PlanExecutor::new(Arc::new(RecordingTools::default())).with_synthesizer(Arc::new(synth));
        let plan = action(vec![ReWooStep::new(1, "headline", "E1")])
            .with_synthesis_template("{{E1}}");

        let run = executor.execute(&plan).await;
        assert!(matches!(run.outcome, RunOutcome::SynthesisFailed { .. }));
        assert_eq!(run.step_outputs.len(), 1);
    }

    #[tokio::test]
    async fn test_rendered_prompt_is_answer_without_synthesizer() {
        let executor = PlanExecutor::new(Arc::new(RecordingTools::default()));
        let plan = action(vec![ReWooStep::new(1, "headline", "E1")])
            .with_synthesis_template("News & notes: {{E1}}");

        let run = executor.execute(&plan).await;
        assert_eq!(
            run.outcome,
            RunOutcome::Completed {
                output: json!("News & notes: markets calm")
            }
        );
    }
}
