//! Recursive Certainty Validation: context expansion plus self-validation.
//!
//! Expands the selected question by asking the model to explain every word,
//! generates a completion, challenges it twice, then streams the final
//! answer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::chat::{Chat, Message};
use crate::error::BoostError;
use crate::selection;
use crate::session::{CompletionOptions, Session};

use super::Module;

const DOCS: &str = "\
`rcn` - Recursive Certainty Validation

Expands the context of the input by asking the model to explain the meaning
of every word in the prompt, generates a completion, asks the model to
validate its own answer twice, then requests the final answer.";

const SYSTEM_PROMPT: &str = "\
YOU HAVE LIMITATIONS AS AN LLM. DO NOT OVERCOMPLICATE THINGS. YOU MAKE MISTAKES ALL THE TIME, SO BE CAREFUL IN YOUR REASONING.
WHEN SOLVING PROBLEMS - DECOMPOSE THEM INTO SMALLER PARTS. SOLVE PARTS ONE BY ONE SEQUENTIALLY.
DECLARE THE INITIAL STATE, MODIFY IT ONE STEP AT A TIME. CHECK THE RESULT AFTER EACH MODIFICATION.
DO NOT SAY YOU DOUBLE-CHECKED AND TRIPLE-CHECKED WITHOUT ACTUALLY DOING SO.";

fn expand_prompt(question: &str) -> String {
    format!(
        "Take this question:\n{question}\n\nDescribe the meaning of every word in relation to \
         the question. Paraphrase the question two times. Then provide a solution."
    )
}

pub struct Rcn;

#[async_trait]
impl Module for Rcn {
    fn name(&self) -> &'static str {
        "rcn"
    }

    fn id_prefix(&self) -> &'static str {
        "rcn"
    }

    fn docs(&self) -> Option<&'static str> {
        Some(DOCS)
    }

    async fn apply(&self, chat: &mut Chat, session: &Arc<Session>) -> Result<(), BoostError> {
        let cfg = &session.config().rcn;
        debug!("rcn: strat={} params={:?}", cfg.strat, cfg.strat_params);

        let nodes = selection::apply_strategy(chat, &cfg.strat, &cfg.strat_params)?;
        if nodes.len() > 1 {
            warn!("rcn: matched multiple nodes, only the first one will be processed");
        }
        let Some(node) = nodes.first() else {
            info!("rcn: no nodes matched, skipping");
            session
                .stream_chat_completion(chat, CompletionOptions::default())
                .await?;
            return Ok(());
        };

        let question = chat.node(*node).content.clone();
        let mut output = Chat::from_conversation(&[
            Message::new("system", SYSTEM_PROMPT),
            Message::new("user", expand_prompt(&question)),
        ])?;

        session.advance(&mut output).await?;
        output.user("Are you sure?");
        session.advance(&mut output).await?;
        output.user("Is this your final answer?");
        session.advance(&mut output).await?;
        output.user(
            "Now prepare your final answer. Write it as a response to this message. \
             Do not write anything else.",
        );

        session
            .stream_final_completion(&mut output, CompletionOptions::default())
            .await?;
        Ok(())
    }
}
