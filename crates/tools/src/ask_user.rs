//! `ask_user` — put a question to the human driving the session.
//!
//! The tool itself only validates arguments and formats the answer; the
//! actual interaction lives behind [`UserPrompter`], supplied by the
//! front end (the CLI reads from the terminal).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use toolweave_core::error::ToolError;
use toolweave_core::schema::Schema;
use toolweave_core::tool::{Tool, ToolContext, ToolResult, parse_arguments};

/// The user's reply. `choice_index` is the zero-based option picked, or -1
/// for a freeform answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAnswer {
    pub answer: String,
    pub choice_index: i64,
}

impl UserAnswer {
    pub fn freeform(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            choice_index: -1,
        }
    }
}

/// Something that can ask the user a question and wait for the reply.
#[async_trait]
pub trait UserPrompter: Send + Sync {
    async fn ask(
        &self,
        ctx: &ToolContext,
        question: &str,
        options: &[String],
        allow_freeform: bool,
    ) -> Result<UserAnswer, ToolError>;
}

/// Interpret one line typed by the user.
///
/// A number from 1 to `options.len()` picks that option. Anything else is
/// taken verbatim when freeform answers are allowed. `None` means the line
/// is not an acceptable answer and the user should be asked again.
pub fn resolve_answer(line: &str, options: &[String], allow_freeform: bool) -> Option<UserAnswer> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Ok(n) = line.parse::<usize>() {
        if (1..=options.len()).contains(&n) {
            return Some(UserAnswer {
                answer: options[n - 1].clone(),
                choice_index: (n - 1) as i64,
            });
        }
    }
    allow_freeform.then(|| UserAnswer::freeform(line))
}

pub struct AskUserTool {
    prompter: Option<Arc<dyn UserPrompter>>,
}

impl AskUserTool {
    pub fn new(prompter: Option<Arc<dyn UserPrompter>>) -> Self {
        Self { prompter }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct Input {
    question: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default = "default_true")]
    allow_freeform: bool,
}

#[async_trait]
impl Tool for AskUserTool {
    fn name(&self) -> &str {
        "ask_user"
    }

    fn description(&self) -> &str {
        "Ask the user a question and wait for a response. Use to resolve ambiguity before making changes."
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .required("question", Schema::string("Question to ask the user."))
            .property(
                "options",
                Schema::array(
                    "Optional list of choices. If provided, user can pick by number.",
                    Schema::String { description: None },
                ),
            )
            .property(
                "allow_freeform",
                Schema::boolean("Whether user may type a freeform answer (default true)."),
            )
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &str) -> Result<ToolResult, ToolError> {
        let Some(prompter) = self.prompter.as_ref() else {
            return Err(ToolError::failed(self.name(), "not available (no prompter configured)"));
        };

        let input: Input = parse_arguments(arguments)?;
        let question = input.question.trim();
        if question.is_empty() {
            return Err(ToolError::InvalidArguments("missing question".into()));
        }

        let answer = prompter.ask(ctx, question, &input.options, input.allow_freeform).await?;
        let body = serde_json::to_string_pretty(&answer).map_err(|e| ToolError::failed(self.name(), e))?;
        Ok(ToolResult::new(body))
    }
}
