//! Scripted in-memory transport for pipeline tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docskill_shared::{
    ContentPart, Document, DocumentContent, DocumentFormat, DocumentId, ModelTransport, PromptSpec,
    Result, Stage,
};

use crate::scoring::Dimension;

type Responder = Box<dyn Fn() -> Result<String> + Send + Sync>;

struct Rule {
    stage: Stage,
    needle: String,
    respond: Responder,
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub stage: Stage,
    pub instructions: String,
    pub text: String,
}

#[derive(Default)]
struct State {
    queued: HashMap<Stage, VecDeque<Result<String>>>,
    rules: Vec<Rule>,
    calls: Vec<Call>,
}

/// Answers from per-stage queues, then content-matching rules, then a
/// well-formed default for the stage. Records every call.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    state: Mutex<State>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the next answer for `stage`.
    pub fn push(&self, stage: Stage, response: Result<String>) {
        let mut state = self.state.lock().unwrap();
        state.queued.entry(stage).or_default().push_back(response);
    }

    /// Answer every `stage` call whose text content contains `needle`.
    pub fn on(
        &self,
        stage: Stage,
        needle: &str,
        respond: impl Fn() -> Result<String> + Send + Sync + 'static,
    ) {
        self.state.lock().unwrap().rules.push(Rule {
            stage,
            needle: needle.to_string(),
            respond: Box::new(respond),
        });
    }

    pub fn calls(&self, stage: Stage) -> usize {
        self.requests(stage).len()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Every recorded call for `stage`, in call order.
    pub fn requests(&self, stage: Stage) -> Vec<Call> {
        let state = self.state.lock().unwrap();
        state.calls.iter().filter(|c| c.stage == stage).cloned().collect()
    }

    pub fn last_request(&self, stage: Stage) -> Option<String> {
        self.requests(stage).pop().map(|c| c.text)
    }

    pub fn last_instructions(&self, stage: Stage) -> Option<String> {
        self.requests(stage).pop().map(|c| c.instructions)
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    fn model_id(&self) -> &str {
        "scripted/test-model"
    }

    async fn invoke(&self, prompt: &PromptSpec, content: &[ContentPart]) -> Result<String> {
        let text = content
            .iter()
            .map(|p| match p {
                ContentPart::Text { text } => text.clone(),
                ContentPart::Media { media } => format!("[media {}]", media.path.display()),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            stage: prompt.stage,
            instructions: prompt.instructions.clone(),
            text: text.clone(),
        });

        if let Some(response) = state.queued.get_mut(&prompt.stage).and_then(VecDeque::pop_front) {
            return response;
        }
        if let Some(rule) = state
            .rules
            .iter()
            .find(|r| r.stage == prompt.stage && text.contains(&r.needle))
        {
            return (rule.respond)();
        }

        Ok(default_response(prompt.stage))
    }
}

fn default_response(stage: Stage) -> String {
    match stage {
        Stage::Structural => "## 1. Overall structure\nProblem, analysis, recommendation.".into(),
        Stage::Semantic => "## 1. Concept construction\nDefinitions precede use.".into(),
        Stage::Review => sample_review([70.0; 8]),
        Stage::Summary => "# Writing conventions summary\n\n## Structure\nLead with the thesis.".into(),
        Stage::Guidance => {
            "---\nname: test-skill\ndescription: Test guidance.\n---\n\n# Test skill\n".into()
        }
    }
}

/// A reviewer answer with a rationale line per dimension and a JSON block.
pub(crate) fn sample_review(values: [f64; 8]) -> String {
    let entries: Vec<String> = Dimension::ALL
        .iter()
        .zip(values)
        .map(|(d, v)| format!("  \"{}\": {{\"score\": {v}, \"rationale\": \"ok\"}}", d.key()))
        .collect();
    format!("Solid piece overall.\n\n```json\n{{\n{}\n}}\n```\n", entries.join(",\n"))
}

pub(crate) fn text_document(id: &str, text: &str) -> Document {
    Document {
        id: DocumentId::from(id),
        format: DocumentFormat::Markdown,
        content: DocumentContent::Text(text.to_string()),
    }
}
