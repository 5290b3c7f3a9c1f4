//! Gmail API client for listing, fetching, and marking messages

use async_trait::async_trait;
use google_gmail1::api::{BatchModifyMessagesRequest, Message};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::GmailHub;
use crate::error::Result;
use crate::retry::with_backoff;

const GMAIL_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Base query: unread messages in the inbox
const UNREAD_QUERY: &str = "is:unread in:inbox";

/// Gmail operations the pipeline needs, as a trait for easier testing
#[async_trait]
pub trait MailClient: Send + Sync {
    /// List ids of all unread inbox messages, following pagination
    async fn list_unread_message_ids(&self) -> Result<Vec<String>>;

    /// Fetch one message with full payload (headers + body parts)
    async fn get_message(&self, id: &str) -> Result<Message>;

    /// Clear the UNREAD label on the given messages.
    /// Returns the number of messages modified.
    async fn mark_read(&self, message_ids: &[String]) -> Result<usize>;
}

/// Production Gmail client with retry logic
pub struct ProductionMailClient {
    hub: GmailHub,
    max_retries: u32,
    base_delay: Duration,
    /// Append `newer_than:1d` to the unread query
    last_day_only: bool,
}

impl ProductionMailClient {
    pub fn new(hub: GmailHub, max_retries: u32, base_delay: Duration, last_day_only: bool) -> Self {
        Self {
            hub,
            max_retries,
            base_delay,
            last_day_only,
        }
    }

    fn query(&self) -> String {
        build_query(self.last_day_only)
    }
}

fn build_query(last_day_only: bool) -> String {
    if last_day_only {
        format!("{} newer_than:1d", UNREAD_QUERY)
    } else {
        UNREAD_QUERY.to_string()
    }
}

#[async_trait]
impl MailClient for ProductionMailClient {
    async fn list_unread_message_ids(&self) -> Result<Vec<String>> {
        let query = self.query();
        let mut all_ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.clone();
            let response = with_backoff(
                "messages_list",
                self.max_retries,
                self.base_delay,
                || async {
                    let mut call = self
                        .hub
                        .users()
                        .messages_list("me")
                        .q(&query)
                        .max_results(100);

                    if let Some(t) = token.as_ref() {
                        call = call.page_token(t);
                    }

                    let (_, response) = call.add_scope(GMAIL_SCOPE).doit().await?;
                    Ok(response)
                },
            )
            .await?;

            if let Some(messages) = response.messages {
                for msg_ref in messages {
                    if let Some(id) = msg_ref.id {
                        all_ids.push(id);
                    }
                }
            }

            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        debug!(count = all_ids.len(), query = %query, "listed unread messages");
        Ok(all_ids)
    }

    async fn get_message(&self, id: &str) -> Result<Message> {
        with_backoff("messages_get", self.max_retries, self.base_delay, || async {
            let (_, msg) = self
                .hub
                .users()
                .messages_get("me", id)
                .format("full")
                .add_scope(GMAIL_SCOPE)
                .doit()
                .await?;
            Ok(msg)
        })
        .await
    }

    async fn mark_read(&self, message_ids: &[String]) -> Result<usize> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        // Gmail API allows up to 1000 messages per batch request
        const BATCH_SIZE: usize = 1000;
        let mut total_modified = 0;

        for chunk in message_ids.chunks(BATCH_SIZE) {
            let chunk_vec = chunk.to_vec();

            let result = with_backoff(
                "messages_batch_modify",
                self.max_retries,
                self.base_delay,
                || async {
                    let request = BatchModifyMessagesRequest {
                        ids: Some(chunk_vec.clone()),
                        add_label_ids: None,
                        remove_label_ids: Some(vec!["UNREAD".to_string()]),
                    };

                    self.hub
                        .users()
                        .messages_batch_modify(request, "me")
                        .add_scope(GMAIL_SCOPE)
                        .doit()
                        .await?;

                    Ok(())
                },
            )
            .await;

            // A failed chunk leaves those messages unread; they are already
            // in the processed ledger so the next run skips them anyway
            match result {
                Ok(()) => total_modified += chunk.len(),
                Err(e) => {
                    warn!(
                        chunk_size = chunk.len(),
                        error = %e,
                        "failed to mark chunk as read, leaving unread"
                    );
                }
            }
        }

        Ok(total_modified)
    }
}

#[async_trait]
impl MailClient for Arc<ProductionMailClient> {
    async fn list_unread_message_ids(&self) -> Result<Vec<String>> {
        self.as_ref().list_unread_message_ids().await
    }

    async fn get_message(&self, id: &str) -> Result<Message> {
        self.as_ref().get_message(id).await
    }

    async fn mark_read(&self, message_ids: &[String]) -> Result<usize> {
        self.as_ref().mark_read(message_ids).await
    }
}
