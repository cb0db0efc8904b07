//! Dynamic temperature control through a local tool.
//!
//! Registers a `set_temperature` tool the model can call mid-response; the
//! tool rewrites the session's forwarded `temperature` parameter so the
//! re-issued upstream call samples differently.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::chat::Chat;
use crate::error::BoostError;
use crate::session::{CompletionOptions, Session};

use super::Module;

const CHOOSE_TEMPERATURE_PROMPT: &str = "\
Dynamically adjust your temperature setting during responses using the `set_temperature` tool.

Temperature Guidelines:
- **High (0.8-1.0):** For creative tasks (e.g., creative writing, brainstorming).
- **Medium (0.4-0.7):** For balanced tasks (e.g., summarization, translation, general conversation).
- **Low (0.0-0.3):** For precise tasks (e.g., factual questions, code generation, technical explanations, reasoning).

Begin each response by setting an initial temperature suitable for the overall task. Adjust \
temperature dynamically for different parts of your response to optimize results.";

fn set_temperature_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "temperature": {
                "type": "number",
                "description": "The temperature for the next portion of the response, between 0.0 and 1.0."
            },
            "reason": {
                "type": "string",
                "description": "Short (3-5 words) explanation of why the temperature is being set."
            }
        },
        "required": ["temperature", "reason"]
    })
}

pub struct Autotemp;

#[async_trait]
impl Module for Autotemp {
    fn name(&self) -> &'static str {
        "autotemp"
    }

    fn id_prefix(&self) -> &'static str {
        "autotemp"
    }

    async fn apply(&self, chat: &mut Chat, session: &Arc<Session>) -> Result<(), BoostError> {
        if session.model().contains("qwen3") {
            chat.system("/no_think");
        }

        let tool_session = session.clone();
        session.register_tool(
            "set_temperature",
            "Choose the temperature for the next portion of your response. After calling \
             this tool, you must proceed replying in text.",
            set_temperature_schema(),
            Arc::new(move |args: Value| {
                let session = tool_session.clone();
                Box::pin(async move {
                    let desired = args
                        .get("temperature")
                        .and_then(Value::as_f64)
                        .ok_or_else(|| BoostError::ToolFailed {
                            name: "set_temperature".to_string(),
                            message: "missing 'temperature' argument".to_string(),
                        })?;
                    let reason = args
                        .get("reason")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();

                    let current = session.param("temperature").and_then(|v| v.as_f64());
                    if let Some(current) = current {
                        if (current - desired).abs() < 0.01 {
                            return Ok(format!(
                                "Temperature is already set to {desired}. Are you using the \
                                 tool correctly?"
                            ));
                        }
                    }

                    session.set_param("temperature", json!(desired));
                    session.emit_status(&format!("Temperature {desired}\nReason: {reason}"));
                    Ok(format!(
                        "Temperature is now set to {desired} because: {reason}"
                    ))
                })
            }),
        )?;

        chat.system(CHOOSE_TEMPERATURE_PROMPT);
        session
            .stream_final_completion(chat, CompletionOptions::default())
            .await?;
        Ok(())
    }
}
