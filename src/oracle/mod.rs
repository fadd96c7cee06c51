//! The Oracle: AI advice with the user's budget as context, and the chat
//! sessions it keeps.

mod client;
mod prompt;

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

pub use client::{ChatCompletion, CompletionMessage, OpenAiCompatClient};
pub use prompt::build_system_prompt;

use crate::database::db::queries;
use crate::database::models::{ChatMessage, ChatRole, ChatSession};
use crate::error::{FinanceError, Result};
use crate::service::{now, FinanceService};

/// How much of the conversation is replayed to the model on each question.
pub const HISTORY_WINDOW: i64 = 20;
pub const DEFAULT_SESSION_TITLE: &str = "New conversation";

#[derive(Clone)]
pub struct Oracle {
    service: FinanceService,
    completion: Arc<dyn ChatCompletion>,
}

impl Oracle {
    pub fn new(service: FinanceService, completion: Arc<dyn ChatCompletion>) -> Self {
        Self { service, completion }
    }

    pub async fn create_session(&self, title: Option<&str>) -> Result<ChatSession> {
        let title = title.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(DEFAULT_SESSION_TITLE);
        let session = ChatSession {
            id: Uuid::new_v4(),
            title: title.to_string(),
            created_at: now(),
        };
        let mut conn = self.service.pool().acquire().await?;
        queries::create_session(&mut conn, &session).await?;
        Ok(session)
    }

    pub async fn sessions(&self) -> Result<Vec<ChatSession>> {
        let mut conn = self.service.pool().acquire().await?;
        Ok(queries::list_sessions(&mut conn).await?)
    }

    pub async fn messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        let mut conn = self.service.pool().acquire().await?;
        if queries::get_session(&mut conn, session_id).await?.is_none() {
            return Err(FinanceError::not_found("session", session_id));
        }
        Ok(queries::recent_messages(&mut conn, session_id, None).await?)
    }

    pub async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        let mut conn = self.service.pool().acquire().await?;
        if !queries::delete_session(&mut conn, session_id).await? {
            return Err(FinanceError::not_found("session", session_id));
        }
        Ok(())
    }

    /// Sends the question with the budget snapshot and recent history.
    /// Both sides of the exchange are stored only once a reply arrives.
    pub async fn ask(&self, session_id: Uuid, question: &str) -> Result<ChatMessage> {
        let question = question.trim();
        if question.is_empty() {
            return Err(FinanceError::InvalidInput("question cannot be empty".into()));
        }

        let history = {
            let mut conn = self.service.pool().acquire().await?;
            if queries::get_session(&mut conn, session_id).await?.is_none() {
                return Err(FinanceError::not_found("session", session_id));
            }
            queries::recent_messages(&mut conn, session_id, Some(HISTORY_WINDOW)).await?
        };
        let snapshot = self.service.snapshot().await?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(CompletionMessage::new(ChatRole::System.as_str(), build_system_prompt(&snapshot)));
        messages.extend(
            history
                .iter()
                .filter(|m| m.role != ChatRole::System)
                .map(|m| CompletionMessage::new(m.role.as_str(), m.content.clone())),
        );
        messages.push(CompletionMessage::new(ChatRole::User.as_str(), question));

        let user_msg = ChatMessage {
            session_id,
            role: ChatRole::User,
            content: question.to_string(),
            created_at: now(),
        };
        let reply = self.completion.complete(&messages).await?;
        let assistant_msg = ChatMessage {
            session_id,
            role: ChatRole::Assistant,
            content: reply.trim().to_string(),
            created_at: now(),
        };

        let mut tx = self.service.pool().begin().await?;
        queries::insert_message(&mut tx, &user_msg).await?;
        queries::insert_message(&mut tx, &assistant_msg).await?;
        tx.commit().await?;

        info!(%session_id, history = history.len(), "oracle answered");
        Ok(assistant_msg)
    }
}
