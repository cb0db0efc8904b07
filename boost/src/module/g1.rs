//! Step-by-step reasoning loop in the style of g1: the model writes titled
//! reasoning steps and decides per step whether to continue, bounded by the
//! configured maximum; the final answer is streamed separately.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::chat::Chat;
use crate::error::BoostError;
use crate::selection;
use crate::session::{CompletionOptions, Session};

use super::Module;

const DOCS: &str = "\
`g1` - chain-of-thought steps with self-chosen continuation

Asks the model to reason in explicit titled steps, one completion per step,
until it announces a final answer or the step budget runs out.";

const SYSTEM_PROMPT: &str = "\
You are an expert AI assistant that explains your reasoning step by step. For each step, \
provide a title that describes what you're doing in that step, along with the content. \
Decide if you need another step or if you're ready to give the final answer. In your \
response write \"ACTION\" followed by either 'continue' or 'final_answer'. USE AS MANY \
REASONING STEPS AS POSSIBLE. AT LEAST 3. BE AWARE OF YOUR LIMITATIONS AS AN LLM AND WHAT \
YOU CAN AND CANNOT DO. IN YOUR REASONING, INCLUDE EXPLORATION OF ALTERNATIVE ANSWERS. \
CONSIDER YOU MAY BE WRONG, AND IF YOU ARE WRONG IN YOUR REASONING, WHERE IT WOULD BE. \
FULLY TEST ALL OTHER POSSIBILITIES. YOU CAN BE WRONG. WHEN YOU SAY YOU ARE RE-EXAMINING, \
ACTUALLY RE-EXAMINE, AND USE ANOTHER APPROACH TO DO SO. DO NOT JUST SAY YOU ARE \
RE-EXAMINING. USE AT LEAST 3 METHODS TO DERIVE THE ANSWER. USE BEST PRACTICES.";

pub struct G1;

#[async_trait]
impl Module for G1 {
    fn name(&self) -> &'static str {
        "g1"
    }

    fn id_prefix(&self) -> &'static str {
        "g1"
    }

    fn docs(&self) -> Option<&'static str> {
        Some(DOCS)
    }

    async fn apply(&self, chat: &mut Chat, session: &Arc<Session>) -> Result<(), BoostError> {
        let cfg = &session.config().g1;
        debug!(
            "g1: strat={} params={:?} max_steps={}",
            cfg.strat, cfg.strat_params, cfg.max_steps
        );

        let nodes = selection::apply_strategy(chat, &cfg.strat, &cfg.strat_params)?;
        if nodes.len() > 1 {
            warn!("g1: matched multiple nodes, only the first one will be processed");
        }
        let Some(node) = nodes.first() else {
            info!("g1: no nodes matched, skipping");
            session
                .stream_final_completion(chat, CompletionOptions::default())
                .await?;
            return Ok(());
        };

        let mut output = Chat::new("system", SYSTEM_PROMPT);
        output.user(chat.node(*node).content.clone());
        output.assistant(
            "Thank you! I will now think step by step following my instructions, starting at \
             the beginning after decomposing the problem.",
        );

        let mut steps = 0;
        loop {
            session.emit_status(&format!("Step: {}", steps + 1));
            session.emit_advance(&mut output).await?;
            steps += 1;

            if output.tail_node().contains("final_answer") || steps >= cfg.max_steps {
                break;
            }
        }

        output.user(
            "Please provide the final answer based on your reasoning above. You don't have \
             to mention 'ACTION' in your response.",
        );
        session.emit_status("Final Answer");
        session
            .stream_final_completion(&mut output, CompletionOptions::default())
            .await?;
        Ok(())
    }
}
