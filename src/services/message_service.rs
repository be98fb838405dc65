use crate::adapters::Backends;
use crate::adapters::directory::{ConnectionLookup, ProfileLookup};
use crate::adapters::storage::MediaSigner;
use crate::adapters::store::{ConversationStore, MessageLog};
use crate::config::MessagingConfig;
use crate::domain::conversation::{Conversation, PairKey};
use crate::domain::message::{Message, NewMessage, OutgoingMessage, normalize_content, require_id};
use crate::domain::pagination::{Page, Paginated};
use crate::domain::view::{ConversationView, MessageView, ProfileCard, ReplyPreview, UNKNOWN_USER_NAME};
use crate::error::{AppError, Result};
use crate::services::conversation_resolver::ConversationResolver;
use backon::{ExponentialBuilder, Retryable};
use futures::future::join_all;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) sent_total: Counter<u64>,
    pub(crate) summary_update_failures: Counter<u64>,
    pub(crate) counters_repaired: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            sent_total: meter
                .u64_counter("parley_messages_sent_total")
                .with_description("Total send attempts by outcome")
                .build(),
            summary_update_failures: meter
                .u64_counter("parley_conversation_summary_update_failures_total")
                .with_description("Sends whose conversation summary update failed after all retries")
                .build(),
            counters_repaired: meter
                .u64_counter("parley_unread_counters_repaired_total")
                .with_description("Unread counters corrected by recomputation from the message log")
                .build(),
        }
    }
}

/// Outcome of walking every conversation with the unread repair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub scanned: u64,
    pub corrected: u64,
    pub failed: u64,
}

#[derive(Clone, Debug)]
pub struct MessageService {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageLog>,
    connections: Arc<dyn ConnectionLookup>,
    profiles: Arc<dyn ProfileLookup>,
    signer: Arc<dyn MediaSigner>,
    resolver: ConversationResolver,
    config: MessagingConfig,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(backends: &Backends, config: MessagingConfig) -> Self {
        Self {
            conversations: Arc::clone(&backends.conversations),
            messages: Arc::clone(&backends.messages),
            connections: Arc::clone(&backends.connections),
            profiles: Arc::clone(&backends.profiles),
            signer: Arc::clone(&backends.signer),
            resolver: ConversationResolver::new(Arc::clone(&backends.conversations)),
            config,
            metrics: Metrics::new(),
        }
    }

    /// Sends a direct message, creating the conversation on first contact.
    ///
    /// Every check runs before anything is written. Once the message is stored the send succeeds,
    /// even if the conversation summary update keeps failing after its retries or the sender's
    /// profile cannot be loaded.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if a required field is blank, the content is too long, the
    /// users are the same or the reply target is not a live message between them.
    /// Returns `AppError::Unauthorized` if the users are not connected.
    /// Returns `AppError::Database` if the message cannot be stored.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, outgoing),
        fields(sender_id = %outgoing.sender_id, receiver_id = %outgoing.receiver_id, message_id = tracing::field::Empty)
    )]
    pub async fn send_message(&self, outgoing: OutgoingMessage) -> Result<MessageView> {
        let sender_id = require_id("senderId", &outgoing.sender_id)?;
        let receiver_id = require_id("receiverId", &outgoing.receiver_id)?;
        let content = normalize_content(&outgoing.content, self.config.max_content_length)?;
        if sender_id == receiver_id {
            return Err(AppError::BadRequest("Cannot send a message to yourself".to_string()));
        }

        if !self.connections.exists_accepted_connection(sender_id, receiver_id).await? {
            self.metrics.sent_total.add(1, &[KeyValue::new("status", "not_connected")]);
            return Err(AppError::Unauthorized("You can only message connected users".to_string()));
        }

        let reply_target = match outgoing.reply_to {
            Some(reply_id) => Some(self.reply_target(sender_id, receiver_id, reply_id).await?),
            None => None,
        };

        let conversation = self.resolver.resolve_direct(sender_id, receiver_id).await?;

        let appended = self
            .messages
            .append(NewMessage {
                id: Uuid::now_v7(),
                conversation_id: conversation.id,
                sender_id: sender_id.to_string(),
                receiver_id: receiver_id.to_string(),
                content,
                message_type: outgoing.message_type,
                media_key: non_blank(outgoing.media_key),
                media_file_name: non_blank(outgoing.media_file_name),
                reply_to: reply_target.as_ref().map(|m| m.id),
            })
            .await;

        let message = match appended {
            Ok(message) => message,
            Err(e) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "failure")]);
                return Err(e);
            }
        };
        tracing::Span::current().record("message_id", tracing::field::display(message.id));
        self.metrics.sent_total.add(1, &[KeyValue::new("status", "success")]);

        self.update_summary(&message).await;

        let cards = self.profile_cards(&[message.sender_id.clone()]).await;
        let replies: HashMap<Uuid, Message> = reply_target.into_iter().map(|m| (m.id, m)).collect();
        Ok(self.message_view(message, &cards, &replies).await)
    }

    /// Active conversations of `user_id`, most recently messaged first.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if the user id is blank.
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_conversations(
        &self,
        user_id: &str,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Paginated<ConversationView>> {
        let user_id = require_id("userId", user_id)?;
        let page = Page::new(page, limit, self.config.conversations_page_size, self.config.max_page_size);

        let (conversations, total) = futures::try_join!(
            self.conversations.list_for_participant(user_id, page),
            self.conversations.count_for_participant(user_id),
        )?;

        let others: Vec<String> = conversations
            .iter()
            .flat_map(|c| c.other_participants(user_id))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let cards = self.profile_cards(&others).await;

        let items = conversations
            .into_iter()
            .map(|conversation| {
                let participants = conversation
                    .other_participants(user_id)
                    .map(|id| cards.get(id).cloned().unwrap_or_else(|| ProfileCard::unknown(id)))
                    .collect();
                let unread_count = conversation.unread_for(user_id);
                ConversationView { conversation, participants, unread_count }
            })
            .collect();

        Ok(Paginated { items, page, total })
    }

    /// Visible messages of a conversation, one page of the newest returned oldest-first.
    ///
    /// # Errors
    /// Returns `AppError::Forbidden` if the conversation does not exist or `user_id` is not in it.
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_messages(
        &self,
        conversation_id: Uuid,
        user_id: &str,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Paginated<MessageView>> {
        let user_id = require_id("userId", user_id)?;
        self.authorize_participant(conversation_id, user_id).await?;
        let page = Page::new(page, limit, self.config.messages_page_size, self.config.max_page_size);

        let (mut messages, total) = futures::try_join!(
            self.messages.list_visible(conversation_id, page),
            self.messages.count_visible(conversation_id),
        )?;
        messages.reverse();

        let senders: Vec<String> =
            messages.iter().map(|m| m.sender_id.clone()).collect::<BTreeSet<_>>().into_iter().collect();
        let reply_ids: Vec<Uuid> =
            messages.iter().filter_map(|m| m.reply_to).collect::<BTreeSet<_>>().into_iter().collect();

        let (cards, replies) = futures::join!(self.profile_cards(&senders), self.messages.find_many(&reply_ids));
        let replies: HashMap<Uuid, Message> = replies?
            .into_iter()
            .filter(|m| !m.is_deleted && m.conversation_id == conversation_id)
            .map(|m| (m.id, m))
            .collect();

        let items = join_all(messages.into_iter().map(|m| self.message_view(m, &cards, &replies))).await;
        Ok(Paginated { items, page, total })
    }

    /// Marks every message addressed to `user_id` in the conversation as read.
    ///
    /// Returns how many messages changed state.
    ///
    /// # Errors
    /// Returns `AppError::Forbidden` if the conversation does not exist or `user_id` is not in it.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn mark_as_read(&self, conversation_id: Uuid, user_id: &str) -> Result<u64> {
        let user_id = require_id("userId", user_id)?;
        self.authorize_participant(conversation_id, user_id).await?;

        let marked = self.conversations.mark_read(conversation_id, user_id, OffsetDateTime::now_utc()).await?;
        tracing::debug!(marked, "Marked messages as read");
        Ok(marked)
    }

    /// Soft-deletes a message. Deleting an already deleted message succeeds without changes.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist.
    /// Returns `AppError::Forbidden` if `user_id` did not send it.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn delete_message(&self, message_id: Uuid, user_id: &str) -> Result<()> {
        let user_id = require_id("userId", user_id)?;
        let message = self
            .messages
            .find(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

        if message.sender_id != user_id {
            return Err(AppError::Forbidden("You can only delete your own messages".to_string()));
        }
        if message.is_deleted {
            return Ok(());
        }

        self.messages.soft_delete(message_id, OffsetDateTime::now_utc()).await
    }

    /// Replaces the content of one of the user's own messages.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if the new content is blank or too long.
    /// Returns `AppError::NotFound` if the message does not exist or was deleted.
    /// Returns `AppError::Forbidden` if `user_id` did not send it.
    #[tracing::instrument(err(level = "warn"), skip(self, content))]
    pub async fn edit_message(&self, message_id: Uuid, user_id: &str, content: &str) -> Result<MessageView> {
        let user_id = require_id("userId", user_id)?;
        let content = normalize_content(content, self.config.max_content_length)?;

        let message = self
            .messages
            .find(message_id)
            .await?
            .filter(|m| !m.is_deleted)
            .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

        if message.sender_id != user_id {
            return Err(AppError::Forbidden("You can only edit your own messages".to_string()));
        }

        let edited = self.messages.edit(message_id, &content, OffsetDateTime::now_utc()).await?;

        let replies: HashMap<Uuid, Message> = match edited.reply_to {
            Some(reply_id) => self
                .messages
                .find(reply_id)
                .await?
                .filter(|m| !m.is_deleted)
                .map(|m| (m.id, m))
                .into_iter()
                .collect(),
            None => HashMap::new(),
        };
        let cards = self.profile_cards(&[edited.sender_id.clone()]).await;
        Ok(self.message_view(edited, &cards, &replies).await)
    }

    /// Total unread messages of `user_id` across their active conversations.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_unread_count(&self, user_id: &str) -> Result<i64> {
        let user_id = require_id("userId", user_id)?;
        self.conversations.unread_total(user_id).await
    }

    /// Recomputes a conversation's unread counters from the message log.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn repair_unread_counts(&self, conversation_id: Uuid) -> Result<BTreeMap<String, i64>> {
        let (counts, _) = self.repair_one(conversation_id).await?;
        Ok(counts)
    }

    /// Repairs every conversation, walking them in id order `batch_size` at a time.
    ///
    /// A failure on one conversation is logged and does not stop the walk.
    ///
    /// # Errors
    /// Returns `AppError::Database` if a batch of ids cannot be listed.
    #[tracing::instrument(err, skip(self))]
    pub async fn repair_all(&self, batch_size: u32) -> Result<RepairReport> {
        let mut report = RepairReport::default();
        let mut cursor = None;

        loop {
            let ids = self.conversations.list_ids(cursor, batch_size.max(1)).await?;
            let Some(last) = ids.last().copied() else {
                break;
            };

            for id in ids {
                report.scanned += 1;
                match self.repair_one(id).await {
                    Ok((_, corrected)) => report.corrected += corrected,
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!(conversation_id = %id, error = %e, "Unread repair failed");
                    }
                }
            }
            cursor = Some(last);
        }

        Ok(report)
    }

    async fn repair_one(&self, conversation_id: Uuid) -> Result<(BTreeMap<String, i64>, u64)> {
        let before = self
            .conversations
            .find(conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Conversation {conversation_id} not found")))?;

        let counts = self.conversations.recount_unread(conversation_id).await?;

        let corrected = counts.iter().filter(|(user_id, count)| before.unread_for(user_id) != **count).count() as u64;
        if corrected > 0 {
            tracing::info!(%conversation_id, corrected, "Corrected drifted unread counters");
            self.metrics.counters_repaired.add(corrected, &[]);
        }

        Ok((counts, corrected))
    }

    async fn authorize_participant(&self, conversation_id: Uuid, user_id: &str) -> Result<Conversation> {
        match self.conversations.find(conversation_id).await? {
            Some(conversation) if conversation.is_participant(user_id) => Ok(conversation),
            _ => Err(AppError::Forbidden("Access denied to this conversation".to_string())),
        }
    }

    /// Looks up a reply target before anything is written for the send.
    ///
    /// Direct conversations are unique per pair, so a live message exchanged between the same two
    /// users necessarily belongs to their conversation.
    async fn reply_target(&self, sender_id: &str, receiver_id: &str, reply_id: Uuid) -> Result<Message> {
        let pair = PairKey::direct(sender_id, receiver_id);
        self.messages
            .find(reply_id)
            .await?
            .filter(|m| !m.is_deleted && PairKey::direct(&m.sender_id, &m.receiver_id) == pair)
            .ok_or_else(|| AppError::BadRequest("replyTo must reference a message in this conversation".to_string()))
    }

    /// Sets the conversation's last message and bumps the receiver's counter, with retries.
    async fn update_summary(&self, message: &Message) {
        let snapshot = message.snapshot();
        let policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.config.summary_retry_base_delay_ms))
            .with_max_times(self.config.summary_retry_attempts);

        let result = (|| async {
            self.conversations.record_message(message.conversation_id, &snapshot, &message.receiver_id).await
        })
        .retry(policy)
        .when(|e| !matches!(e, AppError::NotFound(_)))
        .notify(|e, delay| {
            tracing::debug!(error = %e, ?delay, "Retrying conversation summary update");
        })
        .await;

        if let Err(e) = result {
            self.metrics.summary_update_failures.add(1, &[]);
            tracing::warn!(
                message_id = %message.id,
                conversation_id = %message.conversation_id,
                error = %e,
                "Message stored but conversation summary update failed; unread counter is stale until repaired"
            );
        }
    }

    /// Display cards for `user_ids`; a failing profile lookup degrades to unknown users.
    async fn profile_cards(&self, user_ids: &[String]) -> HashMap<String, ProfileCard> {
        if user_ids.is_empty() {
            return HashMap::new();
        }
        let summaries = match self.profiles.get_summaries(user_ids).await {
            Ok(summaries) => summaries,
            Err(e) => {
                tracing::warn!(error = %e, count = user_ids.len(), "Profile lookup failed, using placeholder profiles");
                HashMap::new()
            }
        };

        let cards = join_all(user_ids.iter().map(|user_id| {
            let summary = summaries.get(user_id);
            async move {
                let card = match summary {
                    Some(summary) => ProfileCard {
                        user_id: user_id.clone(),
                        full_name: summary
                            .full_name
                            .clone()
                            .filter(|n| !n.trim().is_empty())
                            .unwrap_or_else(|| UNKNOWN_USER_NAME.to_string()),
                        profile_image_url: self.sign_optional(summary.profile_image.as_deref()).await,
                        headline: summary.headline.clone(),
                    },
                    None => ProfileCard::unknown(user_id),
                };
                (user_id.clone(), card)
            }
        }))
        .await;

        cards.into_iter().collect()
    }

    async fn message_view(
        &self,
        message: Message,
        cards: &HashMap<String, ProfileCard>,
        replies: &HashMap<Uuid, Message>,
    ) -> MessageView {
        let sender = cards.get(&message.sender_id).cloned().unwrap_or_else(|| ProfileCard::unknown(&message.sender_id));
        let media_url = self.sign_optional(message.media_key.as_deref()).await;
        let reply = message.reply_to.and_then(|id| replies.get(&id)).map(ReplyPreview::from);
        MessageView { message, sender, media_url, reply }
    }

    /// Signs a storage key; signing failures degrade to no URL.
    async fn sign_optional(&self, key: Option<&str>) -> Option<String> {
        let key = key.filter(|k| !k.trim().is_empty())?;
        match self.signer.sign(key).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(error = %e, key, "Failed to sign media URL");
                None
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
