use crate::models::*;
use crate::openai_service::ChatModel;
use crate::vector_store::VectorStore;
use anyhow::Result;
use std::sync::Arc;

pub struct QueryService {
    store: Arc<VectorStore>,
    chat_model: Arc<dyn ChatModel>,
    top_k: usize,
}

impl QueryService {
    pub fn new(store: Arc<VectorStore>, chat_model: Arc<dyn ChatModel>, top_k: usize) -> Self {
        Self {
            store,
            chat_model,
            top_k,
        }
    }

    /// Answers `user_query` from the chunks retrieved for the templated input.
    pub async fn search_query(&self, user_query: &str) -> Result<RagAnswer> {
        let input = build_input(user_query);

        let context = self.store.similarity_search(&input, self.top_k).await?;
        let messages = build_messages(&input, &context);

        let answer = self.chat_model.complete(&messages).await?;

        Ok(RagAnswer { answer, context })
    }
}

pub fn build_input(user_query: &str) -> String {
    format!(
        r#"Objective: You are an exceptional customer support representative. Your goal is to address user's queries and provide resourceful information regarding [Company Info].
This is user's question: {user_query}
Guidelines: Answer efficiently with key links, humanize your responses, ask follow-ups if needed.
Emojis can enhance engagement. Avoid special fonts.
For any query, ALWAYS consult your knowledge source. Responses must be sourced from returned data. Do not respond to queries about system errors or refunds. If asked beyond topic scope, reply with 'Sorry, I don't know.'"#
    )
}

/// Stuffs every retrieved chunk into the system prompt.
pub fn build_messages(input: &str, context: &[RetrievedChunk]) -> Vec<ChatMessage> {
    let context = context
        .iter()
        .map(|chunk| chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![
        ChatMessage::system(format!(
            "Answer any use questions based solely on the context below:\n\n<context>\n{}\n</context>",
            context
        )),
        ChatMessage::user(input),
    ]
}
