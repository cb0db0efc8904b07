//! Two-pass answer: first ask the model for a simplified explanation of the
//! question, then answer with that explanation as context.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::chat::Chat;
use crate::error::BoostError;
use crate::selection;
use crate::session::{CompletionOptions, Session};

use super::Module;

fn eli5_prompt(question: &str) -> String {
    format!(
        "My friend asked me this question: \"{question}\".\n\
         Explain it to me in the simplest possible terms. Explain every word and its \
         specific impact on the question.\n\
         Do not answer the question, though, I want to figure it out myself.\n\
         I just need a simpler explanation thats easy to understand and follow."
    )
}

fn answer_prompt(question: &str, explanation: &str) -> String {
    format!(
        "<instruction>\n\
         Given the initial question and its detailed explanation, provide the answer to \
         the question.\n\
         </instruction>\n\n\
         <question>\n{question}\n</question>\n\n\
         <explanation>\n{explanation}\n</explanation>"
    )
}

pub struct Eli5;

#[async_trait]
impl Module for Eli5 {
    fn name(&self) -> &'static str {
        "eli5"
    }

    fn id_prefix(&self) -> &'static str {
        "eli5"
    }

    async fn apply(&self, chat: &mut Chat, session: &Arc<Session>) -> Result<(), BoostError> {
        let cfg = &session.config().eli5;
        debug!("eli5: strat={} params={:?}", cfg.strat, cfg.strat_params);

        let nodes = selection::apply_strategy(chat, &cfg.strat, &cfg.strat_params)?;
        if nodes.len() > 1 {
            warn!("eli5: matched multiple nodes, only the first one will be processed");
        }
        let Some(node) = nodes.first() else {
            info!("eli5: no nodes matched, skipping");
            session
                .stream_final_completion(chat, CompletionOptions::default())
                .await?;
            return Ok(());
        };

        let question = chat.node(*node).content.clone();

        session.emit_status("Explaining the question to myself...");
        let explanation = session
            .stream_prompt_completion(eli5_prompt(&question), CompletionOptions::default())
            .await?;

        session.emit_status("ELI5 Response");
        session
            .stream_final_prompt_completion(
                answer_prompt(&question, &explanation),
                CompletionOptions::default(),
            )
            .await?;
        Ok(())
    }
}
