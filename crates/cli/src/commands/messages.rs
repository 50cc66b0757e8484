//! Messaging commands.

use renomarket_client::Marketplace;
use renomarket_client::models::{Conversation, Message, MessageSender};
use renomarket_client::services::MessagingService;
use renomarket_core::{ConversationId, UserId};

use super::CliError;

pub async fn list(market: &Marketplace) -> Result<(), CliError> {
    let conversations = market.messaging().conversations().await?;
    print_conversations(market, &conversations);
    Ok(())
}

pub async fn show(market: &Marketplace, conversation_id: &str) -> Result<(), CliError> {
    let id = ConversationId::new(conversation_id);
    let messages = market.messaging().messages(&id).await?;
    print_messages(market, &messages);
    market.messaging().mark_read(&id).await?;
    Ok(())
}

pub async fn send(market: &Marketplace, conversation_id: &str, content: &str) -> Result<(), CliError> {
    let message = market
        .messaging()
        .send_message(&ConversationId::new(conversation_id), content)
        .await?;
    println!("Message envoyé ({})", message.id);
    Ok(())
}

pub async fn start(market: &Marketplace, recipient_id: &str, content: &str) -> Result<(), CliError> {
    let conversation = market
        .messaging()
        .start_conversation(&UserId::new(recipient_id), content)
        .await?;
    println!("Conversation créée ({})", conversation.id);
    Ok(())
}

pub async fn read(market: &Marketplace, conversation_id: &str) -> Result<(), CliError> {
    market
        .messaging()
        .mark_read(&ConversationId::new(conversation_id))
        .await?;
    println!("Conversation marquée comme lue");
    Ok(())
}

/// Print updates from the polling session until Ctrl-C.
pub async fn watch(market: &Marketplace, conversation_id: Option<String>) {
    let mut session = market.messaging().start_session();

    let mut conversations = session.conversations();
    let mut messages = conversation_id.map(|id| session.select(ConversationId::new(id)));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = conversations.changed(), if messages.is_none() => {
                if changed.is_err() {
                    break;
                }
                if let Some(list) = conversations.borrow_and_update().as_ref() {
                    print_conversations(market, list);
                }
            }
            changed = async {
                match messages.as_mut() {
                    Some(rx) => rx.changed().await,
                    None => std::future::pending().await,
                }
            } => {
                if changed.is_err() {
                    break;
                }
                if let Some(list) = messages.as_mut().and_then(|rx| rx.borrow_and_update().clone()) {
                    print_messages(market, &list);
                }
            }
        }
    }

    session.shutdown().await;
}

fn print_conversations(market: &Marketplace, conversations: &[Conversation]) {
    let me = market.auth().user().map(|user| user.id);

    for conversation in conversations {
        let other = me
            .as_ref()
            .and_then(|me| conversation.other_participant(me))
            .or_else(|| conversation.participants.first())
            .map_or_else(|| "?".to_string(), |p| p.display_name());
        let preview = conversation
            .last_message
            .as_ref()
            .map_or("", |m| m.content.as_str());
        let unread = if conversation.unread_count > 0 {
            format!(" [{} non lu(s)]", conversation.unread_count)
        } else {
            String::new()
        };
        println!("{:<12} {other:<30}{unread} {preview}", conversation.id.as_str());
    }
    println!(
        "-- {} conversation(s), {} message(s) non lu(s)",
        conversations.len(),
        MessagingService::unread_total(conversations)
    );
}

fn print_messages(market: &Marketplace, messages: &[Message]) {
    let me = market.auth().user().map(|user| user.id);

    for message in messages {
        let author = if me.as_ref() == Some(message.sender.id()) {
            "moi".to_string()
        } else {
            match &message.sender {
                MessageSender::Profile(p) => p.display_name(),
                MessageSender::Id(id) => id.to_string(),
            }
        };
        println!(
            "[{}] {author}: {}",
            message.created_at.format("%d/%m %H:%M"),
            message.content
        );
    }
}
